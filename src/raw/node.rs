use super::arena::Handle;

/// Which child slot of a node a traversal descended into.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum Side {
    Left,
    Right,
}

/// One entry of the AVL tree: a key, a handle to its value in the value
/// arena, and the per-node balancing bookkeeping.
///
/// `depth` is the height of the subtree rooted here (a leaf has depth 0; an
/// absent child contributes -1). `balance` is the right subtree's depth
/// minus the left subtree's. Both are maintained by the tree during
/// rebalancing and never exposed to callers.
///
/// `i8` is plenty: handles index a u32 arena, and an AVL tree over that many
/// elements is at most ~46 levels deep.
#[derive(Clone)]
pub(crate) struct AvlNode<K> {
    key: K,
    value: Handle,
    left: Option<Handle>,
    right: Option<Handle>,
    depth: i8,
    balance: i8,
}

impl<K> AvlNode<K> {
    /// Creates a new leaf node.
    pub(crate) const fn new(key: K, value: Handle) -> Self {
        Self {
            key,
            value,
            left: None,
            right: None,
            depth: 0,
            balance: 0,
        }
    }

    #[inline]
    pub(crate) const fn key(&self) -> &K {
        &self.key
    }

    #[inline]
    pub(crate) const fn value(&self) -> Handle {
        self.value
    }

    #[inline]
    pub(crate) const fn left(&self) -> Option<Handle> {
        self.left
    }

    #[inline]
    pub(crate) const fn right(&self) -> Option<Handle> {
        self.right
    }

    #[inline]
    pub(crate) const fn child(&self, side: Side) -> Option<Handle> {
        match side {
            Side::Left => self.left,
            Side::Right => self.right,
        }
    }

    #[inline]
    pub(crate) const fn set_child(&mut self, side: Side, link: Option<Handle>) {
        match side {
            Side::Left => self.left = link,
            Side::Right => self.right = link,
        }
    }

    #[inline]
    pub(crate) const fn depth(&self) -> i8 {
        self.depth
    }

    #[inline]
    pub(crate) const fn balance(&self) -> i8 {
        self.balance
    }

    #[inline]
    pub(crate) const fn set_counters(&mut self, depth: i8, balance: i8) {
        self.depth = depth;
        self.balance = balance;
    }

    /// Replaces this node's key and value handle, returning the previous
    /// pair. Children and counters are untouched; used when a removed
    /// node's slot inherits its in-order successor's entry.
    pub(crate) fn replace_entry(&mut self, key: K, value: Handle) -> (K, Handle) {
        (core::mem::replace(&mut self.key, key), core::mem::replace(&mut self.value, value))
    }

    /// Consumes the node, yielding its key and value handle.
    pub(crate) fn into_entry(self) -> (K, Handle) {
        (self.key, self.value)
    }
}
