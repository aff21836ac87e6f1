//! AVL tree keyed by a caller-supplied order
//!
//! Nodes live in a slot arena. A [`Handle`] is a slot index plus the slot's
//! generation, so a handle to a removed entry can never alias a newer entry
//! that happens to reuse the same slot.

use std::cmp::Ordering;

use super::{KeyOrder, PriorityQueue};

/// Stable position of an entry inside an [`AvlTree`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle {
    slot: u32,
    generation: u32,
}

#[derive(Debug, Clone)]
struct Node<K, V> {
    key: K,
    value: V,
    parent: Option<usize>,
    left: Option<usize>,
    right: Option<usize>,
    /// Leaf height is 1, an empty subtree is 0
    height: u32,
}

#[derive(Debug, Clone)]
struct Slot<K, V> {
    generation: u32,
    node: Option<Node<K, V>>,
}

/// Height-balanced binary search tree with positional handles
#[derive(Debug, Clone)]
pub struct AvlTree<K, V, O> {
    slots: Vec<Slot<K, V>>,
    free: Vec<usize>,
    root: Option<usize>,
    len: usize,
    order: O,
}

impl<K, V, O: KeyOrder<K>> AvlTree<K, V, O> {
    pub fn new(order: O) -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            root: None,
            len: 0,
            order,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Height of the whole tree (0 when empty)
    pub fn height(&self) -> u32 {
        self.height_of(self.root)
    }

    /// Drop every entry. Outstanding handles become stale.
    pub fn clear(&mut self) {
        for (i, slot) in self.slots.iter_mut().enumerate() {
            if slot.node.take().is_some() {
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(i);
            }
        }
        self.root = None;
        self.len = 0;
    }

    /// Look up the entry a handle was issued for
    pub fn get(&self, handle: Handle) -> Option<(&K, &V)> {
        let i = self.resolve(handle)?;
        let node = self.node(i);
        Some((&node.key, &node.value))
    }

    pub fn contains(&self, handle: Handle) -> bool {
        self.resolve(handle).is_some()
    }

    /// Insert a key/value pair. Keys that compare equal are kept in
    /// insertion order.
    pub fn insert(&mut self, key: K, value: V) -> Handle {
        let mut parent = None;
        let mut go_left = false;
        let mut cur = self.root;
        while let Some(i) = cur {
            parent = Some(i);
            let node = self.node(i);
            go_left = self.order.compare(&key, &node.key) == Ordering::Less;
            cur = if go_left { node.left } else { node.right };
        }

        let idx = self.alloc(Node {
            key,
            value,
            parent,
            left: None,
            right: None,
            height: 1,
        });
        match parent {
            None => self.root = Some(idx),
            Some(p) if go_left => self.node_mut(p).left = Some(idx),
            Some(p) => self.node_mut(p).right = Some(idx),
        }
        self.len += 1;
        self.rebalance_from(parent);
        self.handle_for(idx)
    }

    /// Entry with the smallest key
    pub fn peek_min(&self) -> Option<(&K, &V)> {
        let i = self.min_index()?;
        let node = self.node(i);
        Some((&node.key, &node.value))
    }

    pub fn min_handle(&self) -> Option<Handle> {
        self.min_index().map(|i| self.handle_for(i))
    }

    pub fn delete_min(&mut self) -> Option<(K, V)> {
        let handle = self.min_handle()?;
        self.remove(handle)
    }

    /// Remove the entry at `handle`. Returns `None` for stale handles.
    pub fn remove(&mut self, handle: Handle) -> Option<(K, V)> {
        let z = self.resolve(handle)?;
        let (z_left, z_right, z_parent) = {
            let node = self.node(z);
            (node.left, node.right, node.parent)
        };

        let rebalance_start = match (z_left, z_right) {
            (Some(zl), Some(zr)) => {
                // Two children: the in-order successor takes z's place
                let mut y = zr;
                while let Some(l) = self.node(y).left {
                    y = l;
                }
                let start = if y != zr {
                    let y_parent = self.node(y).parent;
                    let y_right = self.node(y).right;
                    self.replace_child(y_parent, y, y_right);
                    self.node_mut(y).right = Some(zr);
                    self.node_mut(zr).parent = Some(y);
                    y_parent
                } else {
                    Some(y)
                };
                self.replace_child(z_parent, z, Some(y));
                self.node_mut(y).left = Some(zl);
                self.node_mut(zl).parent = Some(y);
                start
            }
            (child, None) | (None, child) => {
                self.replace_child(z_parent, z, child);
                z_parent
            }
        };

        let slot = &mut self.slots[z];
        let node = slot.node.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(z);
        self.len -= 1;

        self.rebalance_from(rebalance_start);
        Some((node.key, node.value))
    }

    /// In-order traversal (explicit stack, no recursion)
    pub fn iter(&self) -> Iter<'_, K, V, O> {
        let mut iter = Iter {
            tree: self,
            stack: Vec::new(),
        };
        iter.push_left(self.root);
        iter
    }

    /// Verify links, ordering and the AVL height property of every node.
    pub fn is_balanced(&self) -> bool {
        let mut count = 0;
        for (i, slot) in self.slots.iter().enumerate() {
            let Some(node) = &slot.node else { continue };
            count += 1;

            let hl = self.height_of(node.left);
            let hr = self.height_of(node.right);
            if hl.abs_diff(hr) > 1 || node.height != 1 + hl.max(hr) {
                return false;
            }
            if let Some(l) = node.left {
                let child = self.node(l);
                if child.parent != Some(i)
                    || self.order.compare(&child.key, &node.key) == Ordering::Greater
                {
                    return false;
                }
            }
            if let Some(r) = node.right {
                let child = self.node(r);
                if child.parent != Some(i)
                    || self.order.compare(&child.key, &node.key) == Ordering::Less
                {
                    return false;
                }
            }
            if node.parent.is_none() && self.root != Some(i) {
                return false;
            }
        }
        count == self.len
    }

    fn node(&self, i: usize) -> &Node<K, V> {
        match &self.slots[i].node {
            Some(node) => node,
            None => unreachable!("tree link points at vacant slot {i}"),
        }
    }

    fn node_mut(&mut self, i: usize) -> &mut Node<K, V> {
        match &mut self.slots[i].node {
            Some(node) => node,
            None => unreachable!("tree link points at vacant slot {i}"),
        }
    }

    fn alloc(&mut self, node: Node<K, V>) -> usize {
        if let Some(i) = self.free.pop() {
            self.slots[i].node = Some(node);
            i
        } else {
            self.slots.push(Slot {
                generation: 0,
                node: Some(node),
            });
            self.slots.len() - 1
        }
    }

    fn handle_for(&self, i: usize) -> Handle {
        Handle {
            slot: i as u32,
            generation: self.slots[i].generation,
        }
    }

    fn resolve(&self, handle: Handle) -> Option<usize> {
        let i = handle.slot as usize;
        let slot = self.slots.get(i)?;
        (slot.generation == handle.generation && slot.node.is_some()).then_some(i)
    }

    fn min_index(&self) -> Option<usize> {
        let mut cur = self.root?;
        while let Some(l) = self.node(cur).left {
            cur = l;
        }
        Some(cur)
    }

    fn height_of(&self, i: Option<usize>) -> u32 {
        i.map_or(0, |i| self.node(i).height)
    }

    fn update_height(&mut self, i: usize) {
        let node = self.node(i);
        let h = 1 + self.height_of(node.left).max(self.height_of(node.right));
        self.node_mut(i).height = h;
    }

    /// Point `parent`'s link (or the root) that referenced `old` at `new`.
    fn replace_child(&mut self, parent: Option<usize>, old: usize, new: Option<usize>) {
        match parent {
            None => self.root = new,
            Some(p) => {
                let node = self.node_mut(p);
                if node.left == Some(old) {
                    node.left = new;
                } else {
                    node.right = new;
                }
            }
        }
        if let Some(c) = new {
            self.node_mut(c).parent = parent;
        }
    }

    fn rotate_left(&mut self, x: usize) -> usize {
        let Some(y) = self.node(x).right else {
            unreachable!("left rotation without right child")
        };
        let y_left = self.node(y).left;
        let x_parent = self.node(x).parent;

        self.node_mut(x).right = y_left;
        if let Some(b) = y_left {
            self.node_mut(b).parent = Some(x);
        }
        self.replace_child(x_parent, x, Some(y));
        self.node_mut(y).left = Some(x);
        self.node_mut(x).parent = Some(y);

        self.update_height(x);
        self.update_height(y);
        y
    }

    fn rotate_right(&mut self, x: usize) -> usize {
        let Some(y) = self.node(x).left else {
            unreachable!("right rotation without left child")
        };
        let y_right = self.node(y).right;
        let x_parent = self.node(x).parent;

        self.node_mut(x).left = y_right;
        if let Some(b) = y_right {
            self.node_mut(b).parent = Some(x);
        }
        self.replace_child(x_parent, x, Some(y));
        self.node_mut(y).right = Some(x);
        self.node_mut(x).parent = Some(y);

        self.update_height(x);
        self.update_height(y);
        y
    }

    /// Trinode restructure of an unbalanced `z` via its taller child and
    /// that child's taller grandchild. Ties prefer the outer grandchild so a
    /// single rotation suffices. Returns the new subtree root.
    fn restructure(&mut self, z: usize) -> usize {
        let (left, right) = {
            let node = self.node(z);
            (node.left, node.right)
        };

        if self.height_of(left) > self.height_of(right) {
            let Some(y) = left else { unreachable!() };
            let (yl, yr) = {
                let node = self.node(y);
                (node.left, node.right)
            };
            if self.height_of(yl) < self.height_of(yr) {
                self.rotate_left(y);
            }
            self.rotate_right(z)
        } else {
            let Some(y) = right else { unreachable!() };
            let (yl, yr) = {
                let node = self.node(y);
                (node.left, node.right)
            };
            if self.height_of(yr) < self.height_of(yl) {
                self.rotate_right(y);
            }
            self.rotate_left(z)
        }
    }

    /// Walk from `start` to the root fixing heights and rotating where the
    /// children's heights differ by more than one.
    fn rebalance_from(&mut self, start: Option<usize>) {
        let mut cur = start;
        while let Some(i) = cur {
            self.update_height(i);
            let node = self.node(i);
            let hl = self.height_of(node.left);
            let hr = self.height_of(node.right);
            let top = if hl.abs_diff(hr) > 1 {
                self.restructure(i)
            } else {
                i
            };
            cur = self.node(top).parent;
        }
    }
}

impl<K, V, O: KeyOrder<K>> PriorityQueue<K, V> for AvlTree<K, V, O> {
    type Handle = Handle;

    fn insert(&mut self, key: K, value: V) -> Handle {
        AvlTree::insert(self, key, value)
    }

    fn peek_min(&self) -> Option<(&K, &V)> {
        AvlTree::peek_min(self)
    }

    fn delete_min(&mut self) -> Option<(K, V)> {
        AvlTree::delete_min(self)
    }

    fn delete(&mut self, handle: Handle) -> Option<(K, V)> {
        self.remove(handle)
    }

    fn len(&self) -> usize {
        self.len
    }
}

/// In-order iterator over `(handle, key, value)`
pub struct Iter<'a, K, V, O> {
    tree: &'a AvlTree<K, V, O>,
    stack: Vec<usize>,
}

impl<K, V, O: KeyOrder<K>> Iter<'_, K, V, O> {
    fn push_left(&mut self, mut cur: Option<usize>) {
        while let Some(i) = cur {
            self.stack.push(i);
            cur = self.tree.node(i).left;
        }
    }
}

impl<'a, K, V, O: KeyOrder<K>> Iterator for Iter<'a, K, V, O> {
    type Item = (Handle, &'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let i = self.stack.pop()?;
        let tree = self.tree;
        let node = tree.node(i);
        self.push_left(node.right);
        Some((tree.handle_for(i), &node.key, &node.value))
    }
}
