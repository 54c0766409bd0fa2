//! Debug rendering of the tree structure.
//!
//! Both renderers walk the tree without latching and are meant for
//! quiescent trees only (tests, offline inspection).

use crate::key::{IndexKey, KeyComparator};
use crate::node::{self, InternalRef, LeafRef};
use crate::tree::BPlusTree;
use std::path::Path;
use tracing::warn;
use vellum_common::page::PageId;
use vellum_common::Result;

impl<K: IndexKey, C: KeyComparator<K>> BPlusTree<K, C> {
    /// Writes a GraphViz DOT rendering of the tree to `path`.
    pub fn draw(&self, path: &Path) -> Result<()> {
        if self.is_empty() {
            warn!(index = %self.name(), "drawing an empty tree");
            return Ok(());
        }

        let mut out = String::from("digraph BPlusTree {\n  node [shape=record];\n");
        self.draw_page(self.root_page_id(), &mut out)?;
        out.push_str("}\n");
        std::fs::write(path, out)?;
        Ok(())
    }

    fn draw_page(&self, page_id: PageId, out: &mut String) -> Result<()> {
        let store = self.page_store();
        let frame = store.fetch_page(page_id)?;

        let children = {
            let guard = frame.read_data();
            let data = &guard[..];
            if node::is_leaf(data) {
                let leaf = LeafRef::<K>::new(data);
                let keys: Vec<String> =
                    (0..leaf.size()).map(|i| format!("{:?}", leaf.key_at(i))).collect();
                out.push_str(&format!(
                    "  n_{} [label=\"leaf P{} ({}/{}) | {}\"];\n",
                    page_id.0,
                    page_id.0,
                    leaf.size(),
                    leaf.max_size(),
                    keys.join(" | ")
                ));
                if leaf.next_page_id().is_valid() {
                    out.push_str(&format!(
                        "  n_{} -> n_{} [constraint=false style=dashed];\n",
                        page_id.0,
                        leaf.next_page_id().0
                    ));
                }
                Vec::new()
            } else {
                let internal = InternalRef::<K>::new(data);
                let mut cells = vec![String::from("*")];
                for i in 1..internal.size() {
                    cells.push(format!("{:?}", internal.key_at(i)));
                }
                out.push_str(&format!(
                    "  n_{} [label=\"P{} ({}/{}) | {}\"];\n",
                    page_id.0,
                    page_id.0,
                    internal.size(),
                    internal.max_size(),
                    cells.join(" | ")
                ));

                let children: Vec<PageId> =
                    (0..internal.size()).map(|i| internal.child_at(i)).collect();
                for child in &children {
                    out.push_str(&format!("  n_{} -> n_{};\n", page_id.0, child.0));
                }
                children
            }
        };
        store.unpin_page(page_id, false);

        for child in children {
            self.draw_page(child, out)?;
        }
        Ok(())
    }

    /// Dumps every node to standard output.
    pub fn print(&self) -> Result<()> {
        if self.is_empty() {
            warn!(index = %self.name(), "printing an empty tree");
            return Ok(());
        }
        self.print_page(self.root_page_id())
    }

    fn print_page(&self, page_id: PageId) -> Result<()> {
        let store = self.page_store();
        let frame = store.fetch_page(page_id)?;

        let children = {
            let guard = frame.read_data();
            let data = &guard[..];
            if node::is_leaf(data) {
                let leaf = LeafRef::<K>::new(data);
                let keys: Vec<String> =
                    (0..leaf.size()).map(|i| format!("{:?}", leaf.key_at(i))).collect();
                println!(
                    "leaf {} parent={} next={} [{}]",
                    page_id,
                    leaf.parent_id(),
                    leaf.next_page_id(),
                    keys.join(", ")
                );
                Vec::new()
            } else {
                let internal = InternalRef::<K>::new(data);
                let mut slots = vec![format!("<{}>", internal.child_at(0))];
                for i in 1..internal.size() {
                    slots.push(format!("{:?}:{}", internal.key_at(i), internal.child_at(i)));
                }
                println!(
                    "internal {} parent={} [{}]",
                    page_id,
                    internal.parent_id(),
                    slots.join(", ")
                );
                (0..internal.size()).map(|i| internal.child_at(i)).collect()
            }
        };
        store.unpin_page(page_id, false);

        for child in children {
            self.print_page(child)?;
        }
        Ok(())
    }
}
