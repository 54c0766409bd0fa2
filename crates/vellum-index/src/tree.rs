//! The B+Tree: descent, point queries, insertion, and deletion.

use crate::context::OpContext;
use crate::header;
use crate::iter::TreeIter;
use crate::key::{IndexKey, KeyComparator, OrdComparator};
use crate::node::{self, InternalMut, InternalRef, LeafMut, LeafRef};
use parking_lot::RwLock;
use std::cmp::Ordering;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{debug, trace};
use vellum_buffer::{BufferFrame, PageStore};
use vellum_common::page::{PageId, HEADER_PAGE_ID};
use vellum_common::types::RecordId;
use vellum_common::{Result, VellumError};

/// Write-descent modes; they differ only in when a node counts as safe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteMode {
    /// Safe when an insertion cannot split the node.
    Insert,
    /// Safe when a removal cannot underflow the node.
    Delete,
}

/// A concurrent, disk-backed B+Tree mapping fixed-width keys to record
/// identifiers. Keys are unique.
///
/// Reads couple latches down the tree one level at a time. Writes hold the
/// root latch for the whole operation and keep the chain of unsafe
/// ancestors write-latched until the structural change resolves, so
/// concurrent operations serialize only where they actually conflict.
pub struct BPlusTree<K: IndexKey, C: KeyComparator<K> = OrdComparator> {
    /// Name of this index in the header page registry.
    name: String,
    /// Backing page store.
    store: Arc<PageStore>,
    /// Total order over keys.
    comparator: C,
    /// Leaf slot capacity.
    leaf_max_size: usize,
    /// Internal slot capacity (children, counting the sentinel).
    internal_max_size: usize,
    /// The root page id, guarded by the tree's root latch.
    root: RwLock<PageId>,
    _key: PhantomData<K>,
}

impl<K: IndexKey, C: KeyComparator<K>> BPlusTree<K, C> {
    /// Opens an index over `store`.
    ///
    /// If the header page already records a root for `name`, the tree
    /// resumes from it; otherwise the tree starts empty and registers
    /// itself on its first insert.
    pub fn new(
        name: impl Into<String>,
        store: Arc<PageStore>,
        comparator: C,
        leaf_max_size: usize,
        internal_max_size: usize,
    ) -> Result<Self> {
        let name = name.into();
        if name.is_empty() || name.len() > header::MAX_NAME_LEN {
            return Err(VellumError::InvalidParameter {
                name: "name".to_string(),
                value: name,
            });
        }
        if leaf_max_size < 2 || leaf_max_size > node::leaf_capacity::<K>() {
            return Err(VellumError::InvalidParameter {
                name: "leaf_max_size".to_string(),
                value: leaf_max_size.to_string(),
            });
        }
        if internal_max_size < 3 || internal_max_size > node::internal_capacity::<K>() {
            return Err(VellumError::InvalidParameter {
                name: "internal_max_size".to_string(),
                value: internal_max_size.to_string(),
            });
        }

        let root = if store.num_disk_pages() == 0 {
            // Fresh file: materialize the header page
            let (page_id, _) = store.new_page()?;
            debug_assert_eq!(page_id, HEADER_PAGE_ID);
            store.unpin_page(page_id, true);
            PageId::INVALID
        } else {
            let frame = store.fetch_page(HEADER_PAGE_ID)?;
            let recorded = {
                let guard = frame.read_data();
                header::get_record(&guard[..], &name)
            };
            store.unpin_page(HEADER_PAGE_ID, false);
            recorded.unwrap_or(PageId::INVALID)
        };

        Ok(Self {
            name,
            store,
            comparator,
            leaf_max_size,
            internal_max_size,
            root: RwLock::new(root),
            _key: PhantomData,
        })
    }

    /// Returns true if the tree holds no pairs.
    pub fn is_empty(&self) -> bool {
        !self.root.read().is_valid()
    }

    /// Returns the current root page id (invalid when empty).
    pub fn root_page_id(&self) -> PageId {
        *self.root.read()
    }

    /// Returns the index name.
    pub fn name(&self) -> &str {
        &self.name
    }

    // -----------------------------------------------------------------------
    // Point query
    // -----------------------------------------------------------------------

    /// Looks up the record stored under `key`.
    pub fn get(&self, key: &K) -> Result<Option<RecordId>> {
        let store = &*self.store;
        let root_latch = self.root.read();
        let root_id = *root_latch;
        if !root_id.is_valid() {
            return Ok(None);
        }

        let frame = store.fetch_page(root_id)?;
        let mut page_id = root_id;
        let mut guard = frame.read_data();
        // Root latch is released once the root page's latch is held
        drop(root_latch);

        loop {
            if node::is_leaf(&guard[..]) {
                let result = LeafRef::<K>::new(&guard[..]).lookup(key, &self.comparator);
                drop(guard);
                store.unpin_page(page_id, false);
                return Ok(result);
            }

            let child_id =
                InternalRef::<K>::new(&guard[..]).lookup_child(key, &self.comparator, false, false);
            let child_frame = match store.fetch_page(child_id) {
                Ok(frame) => frame,
                Err(e) => {
                    drop(guard);
                    store.unpin_page(page_id, false);
                    return Err(e);
                }
            };
            // Latch coupling: child first, then release the parent
            let child_guard = child_frame.read_data();
            drop(guard);
            store.unpin_page(page_id, false);
            page_id = child_id;
            guard = child_guard;
        }
    }

    // -----------------------------------------------------------------------
    // Insertion
    // -----------------------------------------------------------------------

    /// Inserts a pair. Returns `Ok(false)` if the key already exists.
    pub fn insert(&self, key: K, rid: RecordId) -> Result<bool> {
        let store = &*self.store;
        let mut root_latch = self.root.write();

        if !root_latch.is_valid() {
            return self.start_new_tree(&mut root_latch, &key, rid);
        }
        let root_id = *root_latch;

        let mut ctx = OpContext::new(store);
        self.find_leaf_write(root_id, &key, WriteMode::Insert, &mut ctx)?;
        let leaf_pos = ctx.queue.len() - 1;

        {
            let entry = &ctx.queue[leaf_pos];
            let leaf = LeafRef::<K>::new(&entry.guard[..]);
            if leaf.lookup(&key, &self.comparator).is_some() {
                return Ok(false);
            }
        }

        {
            let entry = &mut ctx.queue[leaf_pos];
            if node::size(&entry.guard[..]) < node::max_size(&entry.guard[..]) {
                let mut leaf = LeafMut::<K>::new(&mut entry.guard[..]);
                leaf.insert(&key, rid, &self.comparator);
                entry.dirty = true;
                return ctx.finish().map(|_| true);
            }
        }

        self.split_leaf_and_insert(&mut ctx, leaf_pos, key, rid, &mut root_latch)?;
        ctx.finish()?;
        Ok(true)
    }

    /// First insert on an empty tree: allocate a root leaf and register it.
    fn start_new_tree(&self, root_slot: &mut PageId, key: &K, rid: RecordId) -> Result<bool> {
        let store = &*self.store;
        let (page_id, frame) = store.new_page()?;
        {
            let mut guard = frame.write_data();
            let mut leaf = LeafMut::<K>::init(&mut guard[..], self.leaf_max_size, PageId::INVALID);
            leaf.insert(key, rid, &self.comparator);
        }
        store.unpin_page(page_id, true);
        *root_slot = page_id;
        debug!(root = %page_id, index = %self.name, "started new tree");
        self.update_root_record(page_id)?;
        Ok(true)
    }

    /// Splits a full leaf, placing the pending pair into whichever half
    /// the comparator sends it, then threads the split key up the tree.
    fn split_leaf_and_insert<'a>(
        &'a self,
        ctx: &mut OpContext<'a>,
        leaf_pos: usize,
        key: K,
        rid: RecordId,
        root_slot: &mut PageId,
    ) -> Result<()> {
        let store = &*self.store;
        let (new_id, new_frame) = store.new_page()?;
        let split_key;
        {
            let mut new_guard = new_frame.write_data();
            let entry = &mut ctx.queue[leaf_pos];
            let mut old_leaf = LeafMut::<K>::new(&mut entry.guard[..]);
            let mut new_leaf = LeafMut::<K>::init(
                &mut new_guard[..],
                self.leaf_max_size,
                old_leaf.as_ref().parent_id(),
            );

            old_leaf.split_off_upper_half(&mut new_leaf);
            new_leaf.set_next_page_id(old_leaf.as_ref().next_page_id());
            old_leaf.set_next_page_id(new_id);

            split_key = new_leaf.as_ref().key_at(0);
            if self.comparator.compare(&key, &split_key) == Ordering::Less {
                old_leaf.insert(&key, rid, &self.comparator);
            } else {
                new_leaf.insert(&key, rid, &self.comparator);
            }
            entry.dirty = true;
        }
        // The new leaf is fully formed; drop its latch and pin before
        // touching ancestors so reparenting may refetch it
        store.unpin_page(new_id, true);
        trace!(left = %ctx.queue[leaf_pos].page_id, right = %new_id, "split leaf");

        self.insert_into_parent(ctx, leaf_pos, split_key, new_id, root_slot)
    }

    /// Links a freshly split-off right sibling under the parent of the
    /// node at `pos`, growing a new root or splitting the parent as
    /// needed.
    fn insert_into_parent<'a>(
        &'a self,
        ctx: &mut OpContext<'a>,
        pos: usize,
        key: K,
        right_id: PageId,
        root_slot: &mut PageId,
    ) -> Result<()> {
        let store = &*self.store;
        let left_id = ctx.queue[pos].page_id;
        let left_parent = node::parent_id(&ctx.queue[pos].guard[..]);

        if !left_parent.is_valid() {
            // The split node was the root: grow a new root above the pair
            let (new_root_id, root_frame) = store.new_page()?;
            {
                let mut guard = root_frame.write_data();
                let mut root = InternalMut::<K>::init(
                    &mut guard[..],
                    self.internal_max_size,
                    PageId::INVALID,
                );
                root.populate_new_root(left_id, &key, right_id);
            }
            store.unpin_page(new_root_id, true);

            {
                let entry = &mut ctx.queue[pos];
                node::set_parent_id(&mut entry.guard[..], new_root_id);
                entry.dirty = true;
            }
            self.set_parent_of(ctx, right_id, new_root_id)?;

            *root_slot = new_root_id;
            debug!(root = %new_root_id, "grew new root");
            return self.update_root_record(new_root_id);
        }

        let parent_pos = pos - 1;
        debug_assert_eq!(ctx.queue[parent_pos].page_id, left_parent);

        {
            let entry = &mut ctx.queue[parent_pos];
            if node::size(&entry.guard[..]) < node::max_size(&entry.guard[..]) {
                let mut parent = InternalMut::<K>::new(&mut entry.guard[..]);
                let inserted = parent.insert(&key, right_id, &self.comparator);
                debug_assert!(inserted);
                entry.dirty = true;
                return Ok(());
            }
        }

        // Parent is full: splice the pending separator into its logical
        // slot sequence and split that at the midpoint. The midpoint key
        // is promoted; it travels in the new sibling's slot 0 with its
        // child as the sibling's sentinel child.
        let (new_internal_id, new_frame) = store.new_page()?;
        let (promoted, moved_children) = {
            let entry = &mut ctx.queue[parent_pos];
            let grandparent = node::parent_id(&entry.guard[..]);
            let mut entries = InternalRef::<K>::new(&entry.guard[..]).entries();

            let mut at = entries.len();
            for (i, (slot_key, _)) in entries.iter().enumerate().skip(1) {
                if self.comparator.compare(slot_key, &key) == Ordering::Greater {
                    at = i;
                    break;
                }
            }
            entries.insert(at, (key, right_id));

            let mid = entries.len() / 2;
            let promoted = entries[mid].0;
            let right_half = entries.split_off(mid);

            let mut parent = InternalMut::<K>::new(&mut entry.guard[..]);
            parent.write_entries(&entries);
            entry.dirty = true;

            {
                let mut guard = new_frame.write_data();
                let mut sibling =
                    InternalMut::<K>::init(&mut guard[..], self.internal_max_size, grandparent);
                sibling.write_entries(&right_half);
            }
            store.unpin_page(new_internal_id, true);

            let moved: Vec<PageId> = right_half.iter().map(|(_, child)| *child).collect();
            (promoted, moved)
        };
        trace!(left = %left_parent, right = %new_internal_id, "split internal node");

        for child in moved_children {
            self.set_parent_of(ctx, child, new_internal_id)?;
        }

        self.insert_into_parent(ctx, parent_pos, promoted, new_internal_id, root_slot)
    }

    // -----------------------------------------------------------------------
    // Deletion
    // -----------------------------------------------------------------------

    /// Removes the pair stored under `key`. Absent keys are a no-op.
    pub fn remove(&self, key: &K) -> Result<()> {
        let store = &*self.store;
        let mut root_latch = self.root.write();
        if !root_latch.is_valid() {
            return Ok(());
        }

        let mut ctx = OpContext::new(store);
        self.find_leaf_write(*root_latch, key, WriteMode::Delete, &mut ctx)?;
        let leaf_pos = ctx.queue.len() - 1;

        {
            let entry = &mut ctx.queue[leaf_pos];
            let mut leaf = LeafMut::<K>::new(&mut entry.guard[..]);
            if !leaf.remove(key, &self.comparator) {
                return Ok(());
            }
            entry.dirty = true;
        }

        let (size, min, parent) = {
            let data = &ctx.queue[leaf_pos].guard[..];
            (node::size(data), node::min_size(data), node::parent_id(data))
        };
        if !parent.is_valid() {
            self.adjust_root(&mut ctx, leaf_pos, &mut root_latch)?;
        } else if size < min {
            self.coalesce_or_redistribute(&mut ctx, leaf_pos, &mut root_latch)?;
        }

        ctx.finish()?;
        Ok(())
    }

    /// Repairs the underflowed node at queue position `pos`, preferring to
    /// borrow from a sibling over merging with it.
    fn coalesce_or_redistribute<'a>(
        &'a self,
        ctx: &mut OpContext<'a>,
        pos: usize,
        root_slot: &mut PageId,
    ) -> Result<()> {
        let store = &*self.store;
        let node_id = ctx.queue[pos].page_id;
        let node_parent = node::parent_id(&ctx.queue[pos].guard[..]);

        if !node_parent.is_valid() {
            return self.adjust_root(ctx, pos, root_slot);
        }

        let parent_pos = pos - 1;
        debug_assert_eq!(ctx.queue[parent_pos].page_id, node_parent);

        // Deterministic sibling choice: the left neighbour when one
        // exists, else the right
        let (node_index, sibling_id) = {
            let parent = InternalRef::<K>::new(&ctx.queue[parent_pos].guard[..]);
            let i = parent
                .value_index(node_id)
                .ok_or_else(|| VellumError::PageCorrupted {
                    page_id: node_parent.0,
                    reason: "child pointer missing from parent".to_string(),
                })?;
            let s = if i == 0 { 1 } else { i - 1 };
            (i, parent.child_at(s))
        };

        // Siblings are latched in (node, sibling) order, with the
        // sibling's identity fixed by the parent's slot order
        let sib_frame = store.fetch_page(sibling_id)?;
        let mut sib_guard = sib_frame.write_data();

        if self.redistribute(ctx, pos, parent_pos, node_index, &mut sib_guard[..])? {
            drop(sib_guard);
            store.unpin_page(sibling_id, true);
            return Ok(());
        }

        let parent_underflow =
            self.coalesce(ctx, pos, parent_pos, node_index, sibling_id, &mut sib_guard[..])?;
        drop(sib_guard);
        store.unpin_page(sibling_id, true);

        if parent_underflow {
            self.coalesce_or_redistribute(ctx, parent_pos, root_slot)?;
        }
        Ok(())
    }

    /// Borrows enough entries from the sibling to restore minimum
    /// occupancy, updating the separator in the parent. Returns false when
    /// the sibling cannot spare them.
    fn redistribute<'a>(
        &'a self,
        ctx: &mut OpContext<'a>,
        pos: usize,
        parent_pos: usize,
        node_index: usize,
        sib_data: &mut [u8],
    ) -> Result<bool> {
        let (need, node_is_leaf) = {
            let data = &ctx.queue[pos].guard[..];
            (node::min_size(data) - node::size(data), node::is_leaf(data))
        };
        if node::size(sib_data) < node::min_size(sib_data) + need {
            return Ok(false);
        }

        let node_id = ctx.queue[pos].page_id;
        let mut moved_children: Vec<PageId> = Vec::new();
        {
            let (front, back) = ctx.queue.split_at_mut(pos);
            let parent_entry = &mut front[parent_pos];
            let node_entry = &mut back[0];

            if node_is_leaf {
                let mut node_leaf = LeafMut::<K>::new(&mut node_entry.guard[..]);
                let mut sib_leaf = LeafMut::<K>::new(sib_data);
                if node_index == 0 {
                    // Borrow from the right sibling's front; its new first
                    // key becomes the separator
                    for _ in 0..need {
                        sib_leaf.move_first_to_end_of(&mut node_leaf);
                    }
                    let sep = sib_leaf.as_ref().key_at(0);
                    InternalMut::<K>::new(&mut parent_entry.guard[..]).set_key_at(1, &sep);
                } else {
                    // Borrow from the left sibling's back; this node's new
                    // first key becomes the separator
                    for _ in 0..need {
                        sib_leaf.move_last_to_front_of(&mut node_leaf);
                    }
                    let sep = node_leaf.as_ref().key_at(0);
                    InternalMut::<K>::new(&mut parent_entry.guard[..]).set_key_at(node_index, &sep);
                }
            } else {
                let mut node_int = InternalMut::<K>::new(&mut node_entry.guard[..]);
                let mut sib_int = InternalMut::<K>::new(sib_data);
                if node_index == 0 {
                    for _ in 0..need {
                        moved_children.push(sib_int.as_ref().child_at(0));
                        sib_int.move_first_to_end_of(&mut node_int);
                    }
                    let sep = sib_int.as_ref().key_at(0);
                    InternalMut::<K>::new(&mut parent_entry.guard[..]).set_key_at(1, &sep);
                } else {
                    for _ in 0..need {
                        let last = sib_int.as_ref().size() - 1;
                        moved_children.push(sib_int.as_ref().child_at(last));
                        sib_int.move_last_to_front_of(&mut node_int);
                    }
                    let sep = node_int.as_ref().key_at(0);
                    InternalMut::<K>::new(&mut parent_entry.guard[..]).set_key_at(node_index, &sep);
                }
            }
            node_entry.dirty = true;
            parent_entry.dirty = true;
        }

        for child in moved_children {
            self.set_parent_of(ctx, child, node_id)?;
        }
        trace!(node = %node_id, "redistributed with sibling");
        Ok(true)
    }

    /// Merges the right member of the (node, sibling) pair into the left
    /// member, so the leaf chain fix never needs a predecessor walk. The
    /// vacated page is queued for deletion. Returns whether the parent now
    /// underflows.
    fn coalesce<'a>(
        &'a self,
        ctx: &mut OpContext<'a>,
        pos: usize,
        parent_pos: usize,
        node_index: usize,
        sibling_id: PageId,
        sib_data: &mut [u8],
    ) -> Result<bool> {
        let node_id = ctx.queue[pos].page_id;
        let node_is_leaf = node::is_leaf(&ctx.queue[pos].guard[..]);
        let mut reparent: Vec<PageId> = Vec::new();

        {
            let (front, back) = ctx.queue.split_at_mut(pos);
            let parent_entry = &mut front[parent_pos];
            let node_entry = &mut back[0];

            if node_index == 0 {
                // This node is the left member; it absorbs the right sibling
                if node_is_leaf {
                    let mut node_leaf = LeafMut::<K>::new(&mut node_entry.guard[..]);
                    let sib_leaf = LeafRef::<K>::new(sib_data);
                    node_leaf.append_all_from(&sib_leaf);
                    node_leaf.set_next_page_id(sib_leaf.next_page_id());
                } else {
                    let mut node_int = InternalMut::<K>::new(&mut node_entry.guard[..]);
                    let sib_int = InternalRef::<K>::new(sib_data);
                    reparent.extend((0..sib_int.size()).map(|i| sib_int.child_at(i)));
                    node_int.append_all_from(&sib_int);
                }
                node_entry.dirty = true;
                InternalMut::<K>::new(&mut parent_entry.guard[..]).remove_at(1);
            } else {
                // The left sibling absorbs this node
                if node_is_leaf {
                    let mut sib_leaf = LeafMut::<K>::new(sib_data);
                    let node_leaf = LeafRef::<K>::new(&node_entry.guard[..]);
                    sib_leaf.append_all_from(&node_leaf);
                    sib_leaf.set_next_page_id(node_leaf.next_page_id());
                } else {
                    let mut sib_int = InternalMut::<K>::new(sib_data);
                    let node_int = InternalRef::<K>::new(&node_entry.guard[..]);
                    reparent.extend((0..node_int.size()).map(|i| node_int.child_at(i)));
                    sib_int.append_all_from(&node_int);
                }
                InternalMut::<K>::new(&mut parent_entry.guard[..]).remove_at(node_index);
            }
            parent_entry.dirty = true;
        }

        let (survivor_id, absorbed_id) = if node_index == 0 {
            (node_id, sibling_id)
        } else {
            (sibling_id, node_id)
        };
        for child in reparent {
            self.set_parent_of(ctx, child, survivor_id)?;
        }
        ctx.deleted.push(absorbed_id);
        trace!(survivor = %survivor_id, absorbed = %absorbed_id, "coalesced nodes");

        let parent_data = &ctx.queue[parent_pos].guard[..];
        Ok(node::size(parent_data) < node::min_size(parent_data))
    }

    /// Shrinks the tree at the top after deletions: an internal root with
    /// one child hands the root over to that child; an emptied root leaf
    /// ends the tree.
    fn adjust_root<'a>(
        &'a self,
        ctx: &mut OpContext<'a>,
        pos: usize,
        root_slot: &mut PageId,
    ) -> Result<()> {
        let root_id = ctx.queue[pos].page_id;

        if node::is_leaf(&ctx.queue[pos].guard[..]) {
            if node::size(&ctx.queue[pos].guard[..]) == 0 {
                ctx.deleted.push(root_id);
                *root_slot = PageId::INVALID;
                debug!(root = %root_id, index = %self.name, "tree emptied");
                self.update_root_record(PageId::INVALID)?;
            }
            return Ok(());
        }

        if node::size(&ctx.queue[pos].guard[..]) == 1 {
            let only_child = {
                let entry = &mut ctx.queue[pos];
                let mut root = InternalMut::<K>::new(&mut entry.guard[..]);
                let child = root.remove_and_return_only_child();
                entry.dirty = true;
                child
            };
            ctx.deleted.push(root_id);
            self.set_parent_of(ctx, only_child, PageId::INVALID)?;
            *root_slot = only_child;
            debug!(old = %root_id, new = %only_child, "collapsed root");
            self.update_root_record(only_child)?;
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Descent
    // -----------------------------------------------------------------------

    /// Write-mode descent. Every page on the path is write-latched and
    /// queued; queued ancestors are released as soon as the newly latched
    /// child proves safe for `mode`. On return the queue's back entry is
    /// the target leaf.
    fn find_leaf_write<'a>(
        &'a self,
        root_id: PageId,
        key: &K,
        mode: WriteMode,
        ctx: &mut OpContext<'a>,
    ) -> Result<()> {
        let store = &*self.store;
        let mut page_id = root_id;

        loop {
            let frame = store.fetch_page(page_id)?;
            let guard = frame.write_data();

            let safe = {
                let data = &guard[..];
                match mode {
                    WriteMode::Insert => node::size(data) < node::max_size(data),
                    WriteMode::Delete => node::size(data) > node::min_size(data),
                }
            };
            if safe {
                ctx.release_all();
            }

            let next = if node::is_leaf(&guard[..]) {
                None
            } else {
                Some(
                    InternalRef::<K>::new(&guard[..])
                        .lookup_child(key, &self.comparator, false, false),
                )
            };
            ctx.push(page_id, guard);

            match next {
                None => return Ok(()),
                Some(child) => page_id = child,
            }
        }
    }

    /// Read-mode descent for iterator construction: returns the pinned
    /// target leaf and the starting cursor. `seek` of None descends along
    /// the left edge. The leaf's latch is released before returning; the
    /// pin is kept for the iterator.
    pub(crate) fn find_leaf_read(
        &self,
        seek: Option<&K>,
    ) -> Result<Option<(PageId, &BufferFrame, usize)>> {
        let store = &*self.store;
        let root_latch = self.root.read();
        let root_id = *root_latch;
        if !root_id.is_valid() {
            return Ok(None);
        }

        let mut cur_frame = store.fetch_page(root_id)?;
        let mut page_id = root_id;
        let mut guard = cur_frame.read_data();
        drop(root_latch);

        loop {
            if node::is_leaf(&guard[..]) {
                let leaf = LeafRef::<K>::new(&guard[..]);
                let index = match seek {
                    Some(key) => leaf.key_index(key, &self.comparator),
                    None => 0,
                };
                drop(guard);
                return Ok(Some((page_id, cur_frame, index)));
            }

            let child_id = {
                let internal = InternalRef::<K>::new(&guard[..]);
                match seek {
                    Some(key) => internal.lookup_child(key, &self.comparator, false, false),
                    None => {
                        let first = internal.key_at(0);
                        internal.lookup_child(&first, &self.comparator, true, false)
                    }
                }
            };
            let child_frame = match store.fetch_page(child_id) {
                Ok(frame) => frame,
                Err(e) => {
                    drop(guard);
                    store.unpin_page(page_id, false);
                    return Err(e);
                }
            };
            let child_guard = child_frame.read_data();
            drop(guard);
            store.unpin_page(page_id, false);
            cur_frame = child_frame;
            page_id = child_id;
            guard = child_guard;
        }
    }

    // -----------------------------------------------------------------------
    // Iteration
    // -----------------------------------------------------------------------

    /// Iterates every pair in ascending key order.
    pub fn iter(&self) -> Result<TreeIter<'_, K>> {
        let start = self.find_leaf_read(None)?;
        Ok(TreeIter::new(&self.store, start))
    }

    /// Iterates pairs with keys >= `key` in ascending key order.
    pub fn iter_from(&self, key: &K) -> Result<TreeIter<'_, K>> {
        let start = self.find_leaf_read(Some(key))?;
        Ok(TreeIter::new(&self.store, start))
    }

    // -----------------------------------------------------------------------
    // Shared helpers
    // -----------------------------------------------------------------------

    /// Points a child page at a new parent.
    ///
    /// The child may be latched in this very operation's queue (splits and
    /// merges move pages the descent still holds); those are written
    /// through the held guard instead of re-latching.
    fn set_parent_of<'a>(
        &'a self,
        ctx: &mut OpContext<'a>,
        child_id: PageId,
        parent_id: PageId,
    ) -> Result<()> {
        for entry in ctx.queue.iter_mut() {
            if entry.page_id == child_id {
                node::set_parent_id(&mut entry.guard[..], parent_id);
                entry.dirty = true;
                return Ok(());
            }
        }

        let store = &*self.store;
        let frame = store.fetch_page(child_id)?;
        {
            let mut guard = frame.write_data();
            node::set_parent_id(&mut guard[..], parent_id);
        }
        store.unpin_page(child_id, true);
        Ok(())
    }

    /// Upserts this index's `(name, root)` record in the header page.
    fn update_root_record(&self, root: PageId) -> Result<()> {
        let store = &*self.store;
        let frame = store.fetch_page(HEADER_PAGE_ID)?;
        let ok = {
            let mut guard = frame.write_data();
            header::update_record(&mut guard[..], &self.name, root)
                || header::insert_record(&mut guard[..], &self.name, root)
        };
        store.unpin_page(HEADER_PAGE_ID, true);
        if ok {
            Ok(())
        } else {
            Err(VellumError::HeaderFull(self.name.clone()))
        }
    }

    pub(crate) fn page_store(&self) -> &PageStore {
        &self.store
    }
}
