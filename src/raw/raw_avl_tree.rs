use core::borrow::Borrow;
use core::cmp::Ordering;

use smallvec::SmallVec;

use super::arena::{Arena, Handle};
use super::node::{AvlNode, Side};

/// One step of a root-to-node descent: the node passed through and the
/// child slot taken from it.
pub(crate) struct Step {
    pub(crate) node: Handle,
    pub(crate) side: Side,
}

/// Stack of descent steps used by the mutating operations.
///
/// AVL trees are height-balanced (depth < 1.45 * log2(n)), so 16 inline
/// steps cover trees of tens of thousands of entries without spilling.
type Path = SmallVec<[Step; 16]>;

/// The core AVL tree backing `AvlTree`.
///
/// Nodes and values live in separate arenas and reference each other by
/// handle; the tree holds the root handle and the element count. Equal keys
/// are allowed and are descended past to the right on insertion, so this is
/// a multimap.
#[derive(Clone)]
pub(crate) struct RawAvlTree<K, V> {
    /// Arena storing all tree nodes.
    nodes: Arena<AvlNode<K>>,
    /// Arena storing all values (separate from nodes so value churn does
    /// not disturb node locality).
    values: Arena<V>,
    /// Handle to the root node, if the tree is non-empty.
    root: Option<Handle>,
    /// Total number of entries in the tree.
    len: usize,
}

impl<K, V> RawAvlTree<K, V> {
    pub(crate) const fn new() -> Self {
        Self {
            nodes: Arena::new(),
            values: Arena::new(),
            root: None,
            len: 0,
        }
    }

    pub(crate) const fn len(&self) -> usize {
        self.len
    }

    pub(crate) const fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub(crate) fn clear(&mut self) {
        self.nodes.clear();
        self.values.clear();
        self.root = None;
        self.len = 0;
    }

    pub(crate) const fn root(&self) -> Option<Handle> {
        self.root
    }

    pub(crate) fn node(&self, handle: Handle) -> &AvlNode<K> {
        self.nodes.get(handle)
    }

    pub(crate) fn value(&self, handle: Handle) -> &V {
        self.values.get(handle)
    }

    pub(crate) fn value_mut(&mut self, handle: Handle) -> &mut V {
        self.values.get_mut(handle)
    }

    /// Removes a node from the arena without touching the tree structure.
    /// Only the draining iterator may call this.
    pub(crate) fn take_node(&mut self, handle: Handle) -> AvlNode<K> {
        self.nodes.take(handle)
    }

    pub(crate) fn take_value(&mut self, handle: Handle) -> V {
        self.values.take(handle)
    }

    /// Depth of the subtree behind `link`; an absent child counts as -1.
    fn link_depth(&self, link: Option<Handle>) -> i8 {
        link.map_or(-1, |handle| self.nodes.get(handle).depth())
    }

    /// Recomputes a node's depth and balance from its children.
    fn update_counters(&mut self, handle: Handle) {
        let node = self.nodes.get(handle);
        let (left, right) = (node.left(), node.right());
        let left_depth = self.link_depth(left);
        let right_depth = self.link_depth(right);
        self.nodes.get_mut(handle).set_counters(1 + left_depth.max(right_depth), right_depth - left_depth);
    }

    /// Rotates `handle` left and returns the new subtree root (its former
    /// right child). Counters are recomputed for exactly the two nodes
    /// whose children changed.
    fn rotate_left(&mut self, handle: Handle) -> Handle {
        let pivot = self.nodes.get(handle).right().expect("`RawAvlTree::rotate_left()` - no right child!");
        let inner = self.nodes.get(pivot).left();
        self.nodes.get_mut(handle).set_child(Side::Right, inner);
        self.nodes.get_mut(pivot).set_child(Side::Left, Some(handle));
        self.update_counters(handle);
        self.update_counters(pivot);
        pivot
    }

    /// Mirror image of [`Self::rotate_left`].
    fn rotate_right(&mut self, handle: Handle) -> Handle {
        let pivot = self.nodes.get(handle).left().expect("`RawAvlTree::rotate_right()` - no left child!");
        let inner = self.nodes.get(pivot).right();
        self.nodes.get_mut(handle).set_child(Side::Left, inner);
        self.nodes.get_mut(pivot).set_child(Side::Right, Some(handle));
        self.update_counters(handle);
        self.update_counters(pivot);
        pivot
    }

    /// Restores the AVL invariant at `handle` after a structural change in
    /// one of its subtrees, returning the (possibly new) subtree root.
    ///
    /// A double rotation is needed only when the taller child leans inward;
    /// otherwise a single rotation suffices. The loop re-checks the
    /// replacement root because a rotation after a removal can leave it one
    /// step from balanced again.
    fn make_balanced(&mut self, mut handle: Handle) -> Handle {
        loop {
            self.update_counters(handle);
            let balance = self.nodes.get(handle).balance();
            if balance >= 2 {
                let right = self.nodes.get(handle).right().expect("`RawAvlTree::make_balanced()` - right-heavy node has no right child!");
                if self.nodes.get(right).balance() < 0 {
                    let straightened = self.rotate_right(right);
                    self.nodes.get_mut(handle).set_child(Side::Right, Some(straightened));
                }
                handle = self.rotate_left(handle);
            } else if balance <= -2 {
                let left = self.nodes.get(handle).left().expect("`RawAvlTree::make_balanced()` - left-heavy node has no left child!");
                if self.nodes.get(left).balance() > 0 {
                    let straightened = self.rotate_left(left);
                    self.nodes.get_mut(handle).set_child(Side::Left, Some(straightened));
                }
                handle = self.rotate_right(handle);
            } else {
                return handle;
            }
        }
    }

    /// Rebalances every node on `path` from the deepest step upward,
    /// storing each rebalanced subtree back into its parent's child slot
    /// (or the root slot for the topmost step).
    fn rebalance_path(&mut self, mut path: Path) {
        while let Some(step) = path.pop() {
            let subtree = self.make_balanced(step.node);
            match path.last() {
                Some(parent) => self.nodes.get_mut(parent.node).set_child(parent.side, Some(subtree)),
                None => self.root = Some(subtree),
            }
        }
    }

    /// Writes `link` into the child slot addressed by the last step of
    /// `path`, or into the root slot if the path is empty.
    fn replace_slot(&mut self, path: &Path, link: Option<Handle>) {
        match path.last() {
            Some(step) => self.nodes.get_mut(step.node).set_child(step.side, link),
            None => self.root = link,
        }
    }
}

impl<K: Ord, V> RawAvlTree<K, V> {
    /// Inserts unconditionally; equal keys descend right, so duplicates are
    /// kept and enumerate in insertion order among themselves.
    pub(crate) fn insert(&mut self, key: K, value: V) {
        let value = self.values.alloc(value);
        let mut path: Path = SmallVec::new();
        let mut current = self.root;

        while let Some(handle) = current {
            let node = self.nodes.get(handle);
            let side = if key < *node.key() { Side::Left } else { Side::Right };
            path.push(Step { node: handle, side });
            current = node.child(side);
        }

        let leaf = self.nodes.alloc(AvlNode::new(key, value));
        self.replace_slot(&path, Some(leaf));
        self.len += 1;
        self.rebalance_path(path);
    }

    /// Inserts only if no equal key is present anywhere on the search path.
    /// On a duplicate the tree is left untouched and the rejected pair is
    /// handed back.
    pub(crate) fn insert_unique(&mut self, key: K, value: V) -> Option<(K, V)> {
        let mut current = self.root;
        while let Some(handle) = current {
            let node = self.nodes.get(handle);
            match key.cmp(node.key()) {
                Ordering::Equal => return Some((key, value)),
                Ordering::Less => current = node.left(),
                Ordering::Greater => current = node.right(),
            }
        }
        self.insert(key, value);
        None
    }

    /// Finds a node with a key equal to `key`.
    pub(crate) fn search<Q>(&self, key: &Q) -> Option<Handle>
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        let mut current = self.root;
        while let Some(handle) = current {
            let node = self.nodes.get(handle);
            match key.cmp(node.key().borrow()) {
                Ordering::Equal => return Some(handle),
                Ordering::Less => current = node.left(),
                Ordering::Greater => current = node.right(),
            }
        }
        None
    }

    /// Finds the node with the largest key `<= key` (predecessor-or-equal).
    ///
    /// The best candidate narrows as the descent proceeds: every node whose
    /// key qualifies displaces the previous candidate, because the search
    /// then continues into its right subtree where any further match is
    /// larger still.
    pub(crate) fn floor<Q>(&self, key: &Q) -> Option<Handle>
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        let mut best = None;
        let mut current = self.root;
        while let Some(handle) = current {
            let node = self.nodes.get(handle);
            if node.key().borrow() <= key {
                best = Some(handle);
                current = node.right();
            } else {
                current = node.left();
            }
        }
        best
    }

    /// Finds the node with the smallest key `>= key` (successor-or-equal).
    pub(crate) fn ceiling<Q>(&self, key: &Q) -> Option<Handle>
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        let mut best = None;
        let mut current = self.root;
        while let Some(handle) = current {
            let node = self.nodes.get(handle);
            if node.key().borrow() >= key {
                best = Some(handle);
                current = node.left();
            } else {
                current = node.right();
            }
        }
        best
    }

    /// Finds the node with the largest key strictly `< key`. Used to pin
    /// down the last entry of an exclusive range.
    pub(crate) fn below<Q>(&self, key: &Q) -> Option<Handle>
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        let mut best = None;
        let mut current = self.root;
        while let Some(handle) = current {
            let node = self.nodes.get(handle);
            if node.key().borrow() < key {
                best = Some(handle);
                current = node.right();
            } else {
                current = node.left();
            }
        }
        best
    }

    /// Removes one entry with a key equal to `key`, if any.
    pub(crate) fn remove<Q>(&mut self, key: &Q) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        let mut path: Path = SmallVec::new();
        let mut current = self.root;
        let target = loop {
            let handle = current?;
            let node = self.nodes.get(handle);
            match key.cmp(node.key().borrow()) {
                Ordering::Equal => break handle,
                Ordering::Less => {
                    path.push(Step { node: handle, side: Side::Left });
                    current = node.left();
                }
                Ordering::Greater => {
                    path.push(Step { node: handle, side: Side::Right });
                    current = node.right();
                }
            }
        };
        Some(self.remove_at(target, path))
    }

    /// Removes and returns the entry [`Self::floor`] would have found, in a
    /// single traversal.
    pub(crate) fn remove_floor<Q>(&mut self, key: &Q) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        let mut path: Path = SmallVec::new();
        let mut best: Option<(Handle, usize)> = None;
        let mut current = self.root;
        while let Some(handle) = current {
            let node = self.nodes.get(handle);
            if node.key().borrow() <= key {
                best = Some((handle, path.len()));
                path.push(Step { node: handle, side: Side::Right });
                current = node.right();
            } else {
                path.push(Step { node: handle, side: Side::Left });
                current = node.left();
            }
        }
        let (target, ancestors) = best?;
        path.truncate(ancestors);
        Some(self.remove_at(target, path))
    }

    /// Removes and returns the entry [`Self::ceiling`] would have found, in
    /// a single traversal.
    pub(crate) fn remove_ceiling<Q>(&mut self, key: &Q) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        let mut path: Path = SmallVec::new();
        let mut best: Option<(Handle, usize)> = None;
        let mut current = self.root;
        while let Some(handle) = current {
            let node = self.nodes.get(handle);
            if node.key().borrow() >= key {
                best = Some((handle, path.len()));
                path.push(Step { node: handle, side: Side::Left });
                current = node.left();
            } else {
                path.push(Step { node: handle, side: Side::Right });
                current = node.right();
            }
        }
        let (target, ancestors) = best?;
        path.truncate(ancestors);
        Some(self.remove_at(target, path))
    }

    /// Removes and returns the minimum entry.
    pub(crate) fn pop_first(&mut self) -> Option<(K, V)> {
        let mut path: Path = SmallVec::new();
        let mut current = self.root?;
        while let Some(left) = self.nodes.get(current).left() {
            path.push(Step { node: current, side: Side::Left });
            current = left;
        }
        Some(self.remove_at(current, path))
    }

    /// Removes and returns the maximum entry.
    pub(crate) fn pop_last(&mut self) -> Option<(K, V)> {
        let mut path: Path = SmallVec::new();
        let mut current = self.root?;
        while let Some(right) = self.nodes.get(current).right() {
            path.push(Step { node: current, side: Side::Right });
            current = right;
        }
        Some(self.remove_at(current, path))
    }

    /// Handle of the minimum node.
    pub(crate) fn first(&self) -> Option<Handle> {
        let mut current = self.root?;
        while let Some(left) = self.nodes.get(current).left() {
            current = left;
        }
        Some(current)
    }

    /// Handle of the maximum node.
    pub(crate) fn last(&self) -> Option<Handle> {
        let mut current = self.root?;
        while let Some(right) = self.nodes.get(current).right() {
            current = right;
        }
        Some(current)
    }

    /// Splices `target` out of the tree and rebalances its ancestors.
    /// `path` must be the descent from the root to (excluding) `target`.
    ///
    /// The two-children case relocates the in-order successor's key and
    /// value into `target`'s slot instead of re-linking nodes, so every
    /// handle held by an ancestor on `path` stays valid throughout.
    fn remove_at(&mut self, target: Handle, mut path: Path) -> (K, V) {
        let node = self.nodes.get(target);
        let (left, right) = (node.left(), node.right());

        let (key, value) = match (left, right) {
            (link, None) | (None, link) => {
                // At most one child: the child (or nothing) takes the slot.
                self.replace_slot(&path, link);
                self.nodes.take(target).into_entry()
            }
            (Some(_), Some(right)) => {
                // Two children: walk to the successor, the leftmost node of
                // the right subtree, extending the path as we go.
                path.push(Step { node: target, side: Side::Right });
                let mut successor = right;
                while let Some(left) = self.nodes.get(successor).left() {
                    path.push(Step { node: successor, side: Side::Left });
                    successor = left;
                }
                let successor = self.nodes.take(successor);
                // The successor has no left child, so its right child (if
                // any) takes its place.
                self.replace_slot(&path, successor.right());
                let (key, value) = successor.into_entry();
                self.nodes.get_mut(target).replace_entry(key, value)
            }
        };

        self.len -= 1;
        // Rebalancing happens strictly after the splice, deepest node first.
        self.rebalance_path(path);
        (key, self.values.take(value))
    }
}
