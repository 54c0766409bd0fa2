//! Fixed-width index keys and their ordering.

use std::cmp::Ordering;

/// A key type that serializes to a fixed number of bytes inside node slots.
///
/// Keys are decoded before every comparison, so the encoded form does not
/// need to be order-preserving.
pub trait IndexKey: Copy + Send + Sync + std::fmt::Debug + 'static {
    /// Encoded width in bytes.
    const WIDTH: usize;

    /// Writes the key into `dst`, which is exactly `WIDTH` bytes.
    fn encode(&self, dst: &mut [u8]);

    /// Reads a key back from `src`, which is exactly `WIDTH` bytes.
    fn decode(src: &[u8]) -> Self;
}

macro_rules! impl_index_key_for_int {
    ($($ty:ty),*) => {
        $(
            impl IndexKey for $ty {
                const WIDTH: usize = std::mem::size_of::<$ty>();

                #[inline]
                fn encode(&self, dst: &mut [u8]) {
                    dst.copy_from_slice(&self.to_le_bytes());
                }

                #[inline]
                fn decode(src: &[u8]) -> Self {
                    <$ty>::from_le_bytes(src.try_into().unwrap())
                }
            }
        )*
    };
}

impl_index_key_for_int!(u32, u64, i32, i64);

impl<const N: usize> IndexKey for [u8; N] {
    const WIDTH: usize = N;

    #[inline]
    fn encode(&self, dst: &mut [u8]) {
        dst.copy_from_slice(self);
    }

    #[inline]
    fn decode(src: &[u8]) -> Self {
        src.try_into().unwrap()
    }
}

/// A user-supplied total order over keys.
pub trait KeyComparator<K>: Clone + Send + Sync + 'static {
    /// Compares two keys.
    fn compare(&self, a: &K, b: &K) -> Ordering;
}

/// The natural `Ord`-based comparator.
#[derive(Debug, Clone, Copy, Default)]
pub struct OrdComparator;

impl<K: Ord + Send + Sync + 'static> KeyComparator<K> for OrdComparator {
    #[inline]
    fn compare(&self, a: &K, b: &K) -> Ordering {
        a.cmp(b)
    }
}
