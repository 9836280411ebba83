//! # Copy-on-Write B+Tree
//!
//! This module implements the tree algorithms over the node codec and the
//! pager. The tree holds no state of its own beyond the root page id,
//! which it mirrors into the pager's meta page after every mutation.
//!
//! ## Copy-on-Write Protocol
//!
//! No live page is ever overwritten. Every mutating call rebuilds the
//! entire path from the affected leaf up to the root out of fresh nodes,
//! allocates new pages for them, and retires every page it replaced via
//! `delete_page`. Until the pager commits, the previous tree remains the
//! durable one; after a crash it is the tree a reopen observes.
//!
//! ## Insert
//!
//! ```text
//! 1. Descend by separator lookup to the target leaf.
//! 2. Exact key match: rebuild the leaf with the slot replaced.
//!    Otherwise: rebuild the leaf with the new slot inserted.
//!    Either result may exceed a page.
//! 3. Unwinding, each internal node splits the returned child into one,
//!    two, or three page-sized fragments, re-links them in place of the
//!    old slot, and allocates their pages.
//! 4. At the top, the returned root is split the same way; if more than
//!    one fragment remains, a new internal root is built over them.
//! ```
//!
//! ## Delete
//!
//! ```text
//! 1. Descend to the leaf; a missing key changes nothing (None).
//! 2. Rebuild the leaf without the slot.
//! 3. Unwinding, a child at or below the merge low-water mark is merged
//!    with its left (preferred) or right sibling when the merged node
//!    fits a page; the parent collapses the two slots into one.
//! 4. At the top: an internal root with a single child is discarded in
//!    favor of that child (the tree loses a level); a root drained of
//!    every key becomes a fresh empty leaf.
//! ```
//!
//! ## Separator Keys
//!
//! An internal slot's key always equals the first key of the child it
//! points at. Every rebuild re-derives separators from the new children,
//! which is what keeps `Node::lookup`'s step-back rule correct.

use eyre::{bail, ensure, Result};
use log::trace;

use super::node::{Node, NodeKind};
use crate::config::{MAX_ENTRY_SIZE, PAGE_SIZE};
use crate::storage::Pager;

/// Which sibling a shrunken child merges with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Sibling {
    Left,
    Right,
}

#[derive(Debug)]
pub struct BTree<'a> {
    pager: &'a mut Pager,
    root_page: u32,
}

impl<'a> BTree<'a> {
    /// Binds a tree to a pager. A file with no root yet gets a fresh
    /// empty leaf as its initial root.
    pub fn open(pager: &'a mut Pager) -> Result<Self> {
        let root_page = match pager.root_page() {
            0 => {
                let root = Node::empty_leaf();
                let id = pager.create_page(root.page_bytes()?)?;
                pager.set_root_page(id);
                id
            }
            id => id,
        };
        Ok(Self { pager, root_page })
    }

    pub fn root_page(&self) -> u32 {
        self.root_page
    }

    /// Looks up `key`, returning the value through the dirty map first,
    /// so uncommitted writes of this session are visible.
    pub fn search(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.search_in(self.root_page, key)
    }

    fn search_in(&self, page_id: u32, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let node = Node::from_bytes(self.pager.read_page(page_id)?);
        let index = node.lookup(key)?;

        match node.kind() {
            NodeKind::Leaf => {
                if index < node.key_count() && node.key_at(index)? == key {
                    return Ok(Some(node.value_at(index)?.to_vec()));
                }
                Ok(None)
            }
            NodeKind::Internal => self.search_in(node.child(index)?, key),
            NodeKind::Unknown => bail!("corrupt node type at page {}", page_id),
        }
    }

    /// Inserts `key`/`value`, replacing the value if the key exists.
    pub fn insert(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        ensure!(!key.is_empty(), "empty keys are not allowed");
        ensure!(
            key.len() + value.len() <= MAX_ENTRY_SIZE,
            "entry of {} bytes exceeds the {} byte limit",
            key.len() + value.len(),
            MAX_ENTRY_SIZE
        );

        let root = Node::from_bytes(self.pager.read_page(self.root_page)?);
        let updated = self.insert_recursive(&root, key, value)?;

        let parts = updated.split_to_fit()?;
        let new_root = if parts.len() == 1 {
            self.pager.create_page(parts[0].page_bytes()?)?
        } else {
            // The root itself split: raise a new internal root over the
            // fragments.
            let mut root = Node::new(PAGE_SIZE);
            root.set_header(NodeKind::Internal, parts.len() as u16);
            for (i, part) in parts.iter().enumerate() {
                let child = self.pager.create_page(part.page_bytes()?)?;
                root.set_slot(i as u16, child, part.key_at(0)?, &[])?;
            }
            self.pager.create_page(root.page_bytes()?)?
        };

        self.pager.delete_page(self.root_page);
        self.set_root(new_root);
        trace!("insert of {} byte key: root now page {}", key.len(), new_root);
        Ok(())
    }

    fn insert_recursive(&mut self, node: &Node, key: &[u8], value: &[u8]) -> Result<Node> {
        let index = node.lookup(key)?;

        match node.kind() {
            NodeKind::Leaf => {
                if index < node.key_count() && node.key_at(index)? == key {
                    node.leaf_update(index, key, value)
                } else {
                    node.leaf_insert(index, key, value)
                }
            }
            NodeKind::Internal => self.insert_into_child(node, index, key, value),
            NodeKind::Unknown => bail!("corrupt node type during insert"),
        }
    }

    fn insert_into_child(
        &mut self,
        parent: &Node,
        index: u16,
        key: &[u8],
        value: &[u8],
    ) -> Result<Node> {
        let child_ptr = parent.child(index)?;
        let child = Node::from_bytes(self.pager.read_page(child_ptr)?);

        let updated = self.insert_recursive(&child, key, value)?;
        let parts = updated.split_to_fit()?;

        let mut rebuilt = parent.rebuild_links(index, &parts)?;
        for (i, part) in parts.iter().enumerate() {
            let id = self.pager.create_page(part.page_bytes()?)?;
            rebuilt.set_child(index + i as u16, id)?;
        }
        self.pager.delete_page(child_ptr);
        Ok(rebuilt)
    }

    /// Removes `key`. Returns true iff the key existed.
    pub fn remove(&mut self, key: &[u8]) -> Result<bool> {
        ensure!(!key.is_empty(), "empty keys are not allowed");
        ensure!(
            key.len() <= MAX_ENTRY_SIZE,
            "key of {} bytes exceeds the {} byte limit",
            key.len(),
            MAX_ENTRY_SIZE
        );

        let root = Node::from_bytes(self.pager.read_page(self.root_page)?);
        let Some(new_root) = self.delete_recursive(&root, key)? else {
            return Ok(false);
        };

        if new_root.kind() == NodeKind::Internal && new_root.key_count() == 1 {
            // A single-child internal root is redundant: the tree loses
            // one level.
            let child = new_root.child(0)?;
            self.pager.delete_page(self.root_page);
            self.set_root(child);
        } else if new_root.kind() == NodeKind::Internal && new_root.key_count() == 0 {
            // Every key is gone; the tree collapses to an empty leaf.
            let leaf = Node::empty_leaf();
            let id = self.pager.create_page(leaf.page_bytes()?)?;
            self.pager.delete_page(self.root_page);
            self.set_root(id);
        } else {
            let id = self.pager.create_page(new_root.page_bytes()?)?;
            self.pager.delete_page(self.root_page);
            self.set_root(id);
        }
        trace!("remove of {} byte key: root now page {}", key.len(), self.root_page);
        Ok(true)
    }

    fn delete_recursive(&mut self, node: &Node, key: &[u8]) -> Result<Option<Node>> {
        let index = node.lookup(key)?;

        match node.kind() {
            NodeKind::Leaf => {
                if index < node.key_count() && node.key_at(index)? == key {
                    return Ok(Some(node.leaf_delete(index)?));
                }
                Ok(None)
            }
            NodeKind::Internal => self.delete_from_child(node, index, key),
            NodeKind::Unknown => bail!("corrupt node type during delete"),
        }
    }

    fn delete_from_child(
        &mut self,
        parent: &Node,
        index: u16,
        key: &[u8],
    ) -> Result<Option<Node>> {
        let child_ptr = parent.child(index)?;
        let child = Node::from_bytes(self.pager.read_page(child_ptr)?);

        let Some(updated) = self.delete_recursive(&child, key)? else {
            return Ok(None);
        };

        let Some((side, sibling)) = self.select_merge_sibling(parent, index, &updated)? else {
            if updated.key_count() == 0 {
                // The child drained completely and has no sibling to fold
                // into; that only happens under a single-slot parent,
                // which empties in turn and is collapsed further up.
                ensure!(
                    parent.key_count() == 1 && index == 0,
                    "drained child under a parent with {} slots",
                    parent.key_count()
                );
                self.pager.delete_page(child_ptr);
                let mut empty = Node::new(PAGE_SIZE);
                empty.set_header(NodeKind::Internal, 0);
                return Ok(Some(empty));
            }

            let new_child = self.pager.create_page(updated.page_bytes()?)?;
            let mut rebuilt = parent.rebuild_link(index, &updated)?;
            rebuilt.set_child(index, new_child)?;
            self.pager.delete_page(child_ptr);
            return Ok(Some(rebuilt));
        };

        let (sibling_ptr, replace_at, merged) = match side {
            Sibling::Right => (
                parent.child(index + 1)?,
                index,
                Node::merge(&updated, &sibling)?,
            ),
            Sibling::Left => (
                parent.child(index - 1)?,
                index - 1,
                Node::merge(&sibling, &updated)?,
            ),
        };

        let merged_ptr = self.pager.create_page(merged.page_bytes()?)?;
        let mut rebuilt = parent.rebuild_merged_link(replace_at, &merged)?;
        rebuilt.set_child(replace_at, merged_ptr)?;

        debug_assert_ne!(sibling_ptr, child_ptr);
        self.pager.delete_page(child_ptr);
        self.pager.delete_page(sibling_ptr);
        Ok(Some(rebuilt))
    }

    /// Picks a sibling to merge a shrunken child into: the left one when
    /// the combined node fits a page, else the right one, else none. A
    /// child above the low-water mark is never merged.
    fn select_merge_sibling(
        &self,
        parent: &Node,
        child_index: u16,
        child: &Node,
    ) -> Result<Option<(Sibling, Node)>> {
        if !child.below_merge_low_water() {
            return Ok(None);
        }

        if child_index > 0 {
            let sibling = Node::from_bytes(self.pager.read_page(parent.child(child_index - 1)?)?);
            if merged_size(&sibling, child) <= PAGE_SIZE {
                return Ok(Some((Sibling::Left, sibling)));
            }
        }

        if child_index + 1 < parent.key_count() {
            let sibling = Node::from_bytes(self.pager.read_page(parent.child(child_index + 1)?)?);
            if merged_size(&sibling, child) <= PAGE_SIZE {
                return Ok(Some((Sibling::Right, sibling)));
            }
        }

        Ok(None)
    }

    fn set_root(&mut self, page_id: u32) {
        self.root_page = page_id;
        self.pager.set_root_page(page_id);
    }
}

/// Size of two nodes once concatenated: both slot areas but one header.
fn merged_size(a: &Node, b: &Node) -> usize {
    a.size() + b.size() - crate::config::NODE_HEADER_SIZE
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MAX_ENTRY_SIZE;

    #[test]
    fn open_allocates_an_empty_leaf_root() {
        let mut pager = open_pager();

        let tree = BTree::open(&mut pager).unwrap();

        let root = Node::from_bytes(tree.pager.read_page(tree.root_page()).unwrap());
        assert_eq!(root.kind(), NodeKind::Leaf);
        assert_eq!(root.key_count(), 0);
    }

    #[test]
    fn single_insert_makes_a_one_slot_leaf_root() {
        let mut pager = open_pager();
        let mut tree = BTree::open(&mut pager).unwrap();

        tree.insert(b"A", b"a").unwrap();

        let root = Node::from_bytes(tree.pager.read_page(tree.root_page()).unwrap());
        assert_eq!(root.kind(), NodeKind::Leaf);
        assert_eq!(root.key_count(), 1);
        assert_eq!(root.key_at(0).unwrap(), b"A");
        assert_eq!(root.value_at(0).unwrap(), b"a");
    }

    #[test]
    fn search_on_empty_tree_returns_none() {
        let mut pager = open_pager();
        let tree = BTree::open(&mut pager).unwrap();

        assert_eq!(tree.search(b"missing").unwrap(), None);
    }

    #[test]
    fn insert_search_remove_roundtrip() {
        let mut pager = open_pager();
        let mut tree = BTree::open(&mut pager).unwrap();

        tree.insert(b"A", b"a").unwrap();
        tree.insert(b"B", b"b").unwrap();
        tree.insert(b"C", b"c").unwrap();

        assert_eq!(tree.search(b"B").unwrap().unwrap(), b"b");
        assert_eq!(tree.search(b"D").unwrap(), None);

        assert!(tree.remove(b"B").unwrap());
        assert_eq!(tree.search(b"B").unwrap(), None);
        assert_eq!(tree.search(b"A").unwrap().unwrap(), b"a");
        assert_eq!(tree.search(b"C").unwrap().unwrap(), b"c");
    }

    #[test]
    fn remove_missing_key_returns_false() {
        let mut pager = open_pager();
        let mut tree = BTree::open(&mut pager).unwrap();
        tree.insert(b"A", b"a").unwrap();

        assert!(!tree.remove(b"B").unwrap());
        assert_eq!(tree.search(b"A").unwrap().unwrap(), b"a");
    }

    #[test]
    fn empty_key_is_rejected() {
        let mut pager = open_pager();
        let mut tree = BTree::open(&mut pager).unwrap();

        assert!(tree.insert(b"", b"value").is_err());
        assert!(tree.remove(b"").is_err());
    }

    #[test]
    fn oversize_entry_is_rejected() {
        let mut pager = open_pager();
        let mut tree = BTree::open(&mut pager).unwrap();
        let value = vec![0u8; MAX_ENTRY_SIZE];

        assert!(tree.insert(b"key", &value).is_err());
    }

    #[test]
    fn duplicate_key_keeps_the_latest_value() {
        let mut pager = open_pager();
        let mut tree = BTree::open(&mut pager).unwrap();

        tree.insert(b"DUP", b"val1").unwrap();
        tree.insert(b"DUP", b"val2").unwrap();
        tree.insert(b"DUP", b"val3").unwrap();

        assert_eq!(tree.search(b"DUP").unwrap().unwrap(), b"val3");
        assert!(tree.remove(b"DUP").unwrap());
        assert!(!tree.remove(b"DUP").unwrap());
    }

    #[test]
    fn sequential_inserts_split_the_root() {
        let mut pager = open_pager();
        let mut tree = BTree::open(&mut pager).unwrap();
        let value = [b'v'; 99];

        for i in 0u32..1000 {
            tree.insert(&i.to_be_bytes(), &value).unwrap();
        }

        let root = Node::from_bytes(tree.pager.read_page(tree.root_page()).unwrap());
        assert_eq!(root.kind(), NodeKind::Internal);
        for i in 0u32..1000 {
            assert_eq!(
                tree.search(&i.to_be_bytes()).unwrap().unwrap(),
                value.to_vec(),
                "key {} lost after splits",
                i
            );
        }
        verify_subtree(&tree, tree.root_page());
    }

    #[test]
    fn binary_keys_roundtrip() {
        let mut pager = open_pager();
        let mut tree = BTree::open(&mut pager).unwrap();

        for i in 0u32..2000 {
            tree.insert(&i.to_be_bytes(), &[(i % 256) as u8]).unwrap();
        }

        for i in 0u32..2000 {
            assert_eq!(
                tree.search(&i.to_be_bytes()).unwrap().unwrap(),
                vec![(i % 256) as u8]
            );
        }
        assert_eq!(tree.search(&[9, 9, 9, 9]).unwrap(), None);
    }

    #[test]
    fn reverse_order_inserts_stay_ordered() {
        let mut pager = open_pager();
        let mut tree = BTree::open(&mut pager).unwrap();
        let value = [b'v'; 40];

        for key in (100u8..=200).rev() {
            tree.insert(&[key], &value).unwrap();
        }

        for key in 100u8..=200 {
            assert_eq!(tree.search(&[key]).unwrap().unwrap(), value.to_vec());
        }
        verify_subtree(&tree, tree.root_page());
    }

    #[test]
    fn near_maximal_entry_splits_three_ways() {
        let mut pager = open_pager();
        let mut tree = BTree::open(&mut pager).unwrap();
        tree.insert(b"A", b"a").unwrap();
        tree.insert(&[b'M'; 32], &[b'm'; 64]).unwrap();
        tree.insert(b"Z", b"z").unwrap();

        let big_key = vec![b'K'; MAX_ENTRY_SIZE / 2];
        let big_val = vec![b'V'; MAX_ENTRY_SIZE - MAX_ENTRY_SIZE / 2];
        tree.insert(&big_key, &big_val).unwrap();

        let root = Node::from_bytes(tree.pager.read_page(tree.root_page()).unwrap());
        assert_eq!(root.kind(), NodeKind::Internal);
        assert_eq!(root.key_count(), 3);

        assert_eq!(tree.search(b"A").unwrap().unwrap(), b"a");
        assert_eq!(tree.search(&big_key).unwrap().unwrap(), big_val);
        assert_eq!(tree.search(&[b'M'; 32]).unwrap().unwrap(), vec![b'm'; 64]);
        assert_eq!(tree.search(b"Z").unwrap().unwrap(), b"z");
        verify_subtree(&tree, tree.root_page());
    }

    #[test]
    fn removing_every_key_leaves_an_empty_leaf() {
        let mut pager = open_pager();
        let mut tree = BTree::open(&mut pager).unwrap();
        let value = [b'v'; 99];

        for i in 0u32..300 {
            tree.insert(&i.to_be_bytes(), &value).unwrap();
        }
        for i in 0u32..300 {
            assert!(tree.remove(&i.to_be_bytes()).unwrap(), "key {} missing", i);
        }

        let root = Node::from_bytes(tree.pager.read_page(tree.root_page()).unwrap());
        assert_eq!(root.kind(), NodeKind::Leaf);
        assert_eq!(root.key_count(), 0);
        for i in 0u32..300 {
            assert_eq!(tree.search(&i.to_be_bytes()).unwrap(), None);
        }

        // The drained tree must accept new keys again.
        tree.insert(b"again", b"works").unwrap();
        assert_eq!(tree.search(b"again").unwrap().unwrap(), b"works");
    }

    #[test]
    fn removing_in_descending_order_drains_the_tree() {
        let mut pager = open_pager();
        let mut tree = BTree::open(&mut pager).unwrap();
        let value = [b'v'; 99];

        for i in 0u32..300 {
            tree.insert(&i.to_be_bytes(), &value).unwrap();
        }
        for i in (0u32..300).rev() {
            assert!(tree.remove(&i.to_be_bytes()).unwrap());
        }

        let root = Node::from_bytes(tree.pager.read_page(tree.root_page()).unwrap());
        assert_eq!(root.kind(), NodeKind::Leaf);
        assert_eq!(root.key_count(), 0);
    }

    #[test]
    fn alternating_delete_pattern() {
        let mut pager = open_pager();
        let mut tree = BTree::open(&mut pager).unwrap();

        for i in 0u8..100 {
            tree.insert(&[i], &[i]).unwrap();
        }
        for i in (0u8..100).step_by(2) {
            assert!(tree.remove(&[i]).unwrap());
        }

        for i in 0u8..100 {
            let found = tree.search(&[i]).unwrap();
            if i % 2 == 0 {
                assert_eq!(found, None);
            } else {
                assert_eq!(found.unwrap(), vec![i]);
            }
        }

        for i in (1u8..100).step_by(2) {
            assert!(tree.remove(&[i]).unwrap());
        }
        let root = Node::from_bytes(tree.pager.read_page(tree.root_page()).unwrap());
        assert_eq!(root.key_count(), 0);
    }

    #[test]
    fn merges_keep_the_tree_searchable() {
        let mut pager = open_pager();
        let mut tree = BTree::open(&mut pager).unwrap();
        let value = [b'v'; 120];

        for i in 0u32..400 {
            tree.insert(&i.to_be_bytes(), &value).unwrap();
        }
        // Remove a band from the middle so interior nodes shrink and
        // merge while both edges stay populated.
        for i in 100u32..300 {
            assert!(tree.remove(&i.to_be_bytes()).unwrap());
        }

        for i in 0u32..400 {
            let found = tree.search(&i.to_be_bytes()).unwrap();
            if (100..300).contains(&i) {
                assert_eq!(found, None);
            } else {
                assert_eq!(found.unwrap(), value.to_vec());
            }
        }
        verify_subtree(&tree, tree.root_page());
    }

    fn open_pager() -> Pager {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.keep().join("tree.db");
        Pager::open(path).unwrap()
    }

    /// Walks a subtree checking the structural invariants: keys are
    /// non-decreasing within every node, every persisted page is
    /// page-sized, and each separator equals its child's first key.
    fn verify_subtree(tree: &BTree<'_>, page_id: u32) {
        let bytes = tree.pager.read_page(page_id).unwrap();
        assert_eq!(bytes.len(), crate::config::PAGE_SIZE);
        let node = Node::from_bytes(bytes);

        for i in 1..node.key_count() {
            assert!(
                node.key_at(i - 1).unwrap() <= node.key_at(i).unwrap(),
                "keys out of order in page {}",
                page_id
            );
        }

        if node.kind() == NodeKind::Internal {
            for i in 0..node.key_count() {
                let child_id = node.child(i).unwrap();
                let child = Node::from_bytes(tree.pager.read_page(child_id).unwrap());
                assert_eq!(
                    node.key_at(i).unwrap(),
                    child.key_at(0).unwrap(),
                    "separator mismatch for child {} of page {}",
                    i,
                    page_id
                );
                verify_subtree(tree, child_id);
            }
        }
    }
}
