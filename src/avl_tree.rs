//! An ordered multimap backed by an arena-allocated AVL tree.

use core::borrow::Borrow;
use core::fmt;
use core::iter::FusedIterator;
use core::ops::{Bound, RangeBounds};

use smallvec::SmallVec;

use crate::raw::{Handle, RawAvlTree};

/// Validates that the start bound does not exceed the end bound.
///
/// # Panics
///
/// Panics if `start > end` or if `start == end` and both bounds are `Excluded`.
fn validate_range_bounds<T, R>(range: &R)
where
    T: ?Sized + Ord,
    R: RangeBounds<T>,
{
    if let (Bound::Included(start) | Bound::Excluded(start), Bound::Included(end) | Bound::Excluded(end)) =
        (range.start_bound(), range.end_bound())
    {
        let valid =
            if matches!(range.start_bound(), Bound::Excluded(_)) && matches!(range.end_bound(), Bound::Excluded(_)) {
                start < end
            } else {
                start <= end
            };
        assert!(valid, "range start is greater than range end in AvlTree");
    }
}

/// An ordered map based on an [AVL tree] that permits duplicate keys.
///
/// Keys must implement [`Ord`] with a [total order]. Entries are kept in key
/// order at all times, and every mutating operation restores the AVL
/// height-balance invariant before returning, so lookups, insertions,
/// removals and nearest-key queries are all worst-case O(log n).
///
/// Unlike `std::collections::BTreeMap`, [`insert`](AvlTree::insert) never
/// replaces an existing entry: inserting an equal key a second time stores a
/// second entry, making this a multimap. Use
/// [`insert_unique`](AvlTree::insert_unique) for map-like semantics.
///
/// Beyond exact lookup, the tree answers *nearest-key* queries:
/// [`floor`](AvlTree::floor) finds the entry with the largest key less than
/// or equal to a target, [`ceiling`](AvlTree::ceiling) the smallest key
/// greater than or equal to it, and
/// [`remove_floor`](AvlTree::remove_floor) /
/// [`remove_ceiling`](AvlTree::remove_ceiling) combine that search with
/// removal in a single traversal.
///
/// It is a logic error for a key to be modified in such a way that its
/// ordering relative to any other key changes while it is in the map. The
/// behavior resulting from such a logic error is not specified but will not
/// result in undefined behavior; it could include panics, incorrect results,
/// or non-termination.
///
/// This structure is single-writer by construction: all mutation goes
/// through `&mut self`, so the borrow checker rules out the concurrent
/// mutation that would corrupt the balance invariant.
///
/// # Examples
///
/// ```
/// use rootstock::AvlTree;
///
/// let mut deadlines = AvlTree::new();
/// deadlines.insert(30, "timer a");
/// deadlines.insert(10, "timer b");
/// deadlines.insert(30, "timer c"); // duplicate key, kept
///
/// // The next deadline at or after t = 20:
/// assert_eq!(deadlines.ceiling(&20), Some((&30, &"timer a")));
///
/// // Pop every deadline due by t = 30, earliest first.
/// while let Some((due, name)) = deadlines.remove_floor(&30) {
///     println!("t = {due}: fire {name}");
/// }
/// assert!(deadlines.is_empty());
/// ```
///
/// [AVL tree]: https://en.wikipedia.org/wiki/AVL_tree
/// [total order]: https://en.wikipedia.org/wiki/Total_order
pub struct AvlTree<K, V> {
    raw: RawAvlTree<K, V>,
}

impl<K, V> AvlTree<K, V> {
    /// Makes a new, empty `AvlTree`.
    ///
    /// Does not allocate anything on its own.
    ///
    /// # Complexity
    ///
    /// O(1)
    ///
    /// # Examples
    ///
    /// ```
    /// use rootstock::AvlTree;
    ///
    /// let mut tree = AvlTree::new();
    /// tree.insert(1, "a");
    /// ```
    #[must_use]
    pub const fn new() -> AvlTree<K, V> {
        AvlTree { raw: RawAvlTree::new() }
    }

    /// Returns the number of entries in the tree, counting duplicates.
    ///
    /// # Examples
    ///
    /// ```
    /// use rootstock::AvlTree;
    ///
    /// let mut tree = AvlTree::new();
    /// tree.insert(1, "a");
    /// tree.insert(1, "b");
    /// assert_eq!(tree.len(), 2);
    /// ```
    #[must_use]
    pub const fn len(&self) -> usize {
        self.raw.len()
    }

    /// Returns `true` if the tree contains no entries.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// Clears the tree, removing all entries.
    ///
    /// # Complexity
    ///
    /// O(n)
    pub fn clear(&mut self) {
        self.raw.clear();
    }

    /// Gets an iterator over the entries of the tree, sorted by key.
    /// Entries with equal keys are yielded in insertion order.
    ///
    /// Iteration walks the tree with an explicit stack, so deep trees
    /// cannot overflow the call stack.
    ///
    /// # Examples
    ///
    /// ```
    /// use rootstock::AvlTree;
    ///
    /// let tree = AvlTree::from([(3, "c"), (1, "a"), (2, "b")]);
    /// let entries: Vec<_> = tree.iter().collect();
    /// assert_eq!(entries, [(&1, &"a"), (&2, &"b"), (&3, &"c")]);
    /// ```
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter::new(&self.raw)
    }

    /// Gets an iterator over the keys of the tree, in sorted order.
    /// Duplicate keys appear once per entry.
    pub fn keys(&self) -> Keys<'_, K, V> {
        Keys { inner: self.iter() }
    }

    /// Gets an iterator over the values of the tree, in order of their keys.
    pub fn values(&self) -> Values<'_, K, V> {
        Values { inner: self.iter() }
    }
}

impl<K: Ord, V> AvlTree<K, V> {
    /// Inserts an entry into the tree.
    ///
    /// Insertion is unconditional: if the tree already holds one or more
    /// entries with an equal key, the new entry is stored alongside them
    /// rather than replacing them. Equal-keyed entries enumerate in
    /// insertion order.
    ///
    /// # Complexity
    ///
    /// O(log n)
    ///
    /// # Examples
    ///
    /// ```
    /// use rootstock::AvlTree;
    ///
    /// let mut tree = AvlTree::new();
    /// tree.insert(37, "a");
    /// tree.insert(37, "b");
    /// assert_eq!(tree.len(), 2);
    /// ```
    pub fn insert(&mut self, key: K, value: V) {
        self.raw.insert(key, value);
    }

    /// Inserts an entry only if the key is not already present.
    ///
    /// On success returns `None`. If an equal key exists, the tree is left
    /// unchanged and the rejected pair is handed back to the caller.
    ///
    /// # Complexity
    ///
    /// O(log n)
    ///
    /// # Examples
    ///
    /// ```
    /// use rootstock::AvlTree;
    ///
    /// let mut tree = AvlTree::new();
    /// assert_eq!(tree.insert_unique(37, "a"), None);
    /// assert_eq!(tree.insert_unique(37, "b"), Some((37, "b")));
    /// assert_eq!(tree.get(&37), Some(&"a"));
    /// ```
    pub fn insert_unique(&mut self, key: K, value: V) -> Option<(K, V)> {
        self.raw.insert_unique(key, value)
    }

    /// Returns a reference to a value corresponding to the key.
    ///
    /// If multiple entries share the key, one of them is returned; which
    /// one is unspecified.
    ///
    /// The key may be any borrowed form of the tree's key type, but the
    /// ordering on the borrowed form *must* match the ordering on the key
    /// type.
    ///
    /// # Complexity
    ///
    /// O(log n)
    ///
    /// # Examples
    ///
    /// ```
    /// use rootstock::AvlTree;
    ///
    /// let mut tree = AvlTree::new();
    /// tree.insert(1, "a");
    /// assert_eq!(tree.get(&1), Some(&"a"));
    /// assert_eq!(tree.get(&2), None);
    /// ```
    #[must_use]
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        let handle = self.raw.search(key)?;
        Some(self.raw.value(self.raw.node(handle).value()))
    }

    /// Returns the key-value pair corresponding to the supplied key.
    ///
    /// # Complexity
    ///
    /// O(log n)
    #[must_use]
    pub fn get_key_value<Q>(&self, key: &Q) -> Option<(&K, &V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        let handle = self.raw.search(key)?;
        let node = self.raw.node(handle);
        Some((node.key(), self.raw.value(node.value())))
    }

    /// Returns a mutable reference to a value corresponding to the key.
    ///
    /// # Examples
    ///
    /// ```
    /// use rootstock::AvlTree;
    ///
    /// let mut tree = AvlTree::new();
    /// tree.insert(1, "a");
    /// if let Some(value) = tree.get_mut(&1) {
    ///     *value = "b";
    /// }
    /// assert_eq!(tree.get(&1), Some(&"b"));
    /// ```
    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        let handle = self.raw.search(key)?;
        let value = self.raw.node(handle).value();
        Some(self.raw.value_mut(value))
    }

    /// Returns `true` if the tree contains at least one entry with the
    /// specified key.
    ///
    /// # Complexity
    ///
    /// O(log n)
    #[must_use]
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        self.raw.search(key).is_some()
    }

    /// Returns the entry with the largest key less than or equal to `key`
    /// (the predecessor-or-equal), or `None` if every key is greater.
    ///
    /// # Complexity
    ///
    /// O(log n)
    ///
    /// # Examples
    ///
    /// ```
    /// use rootstock::AvlTree;
    ///
    /// let tree = AvlTree::from([(1, "a"), (5, "b"), (9, "c")]);
    /// assert_eq!(tree.floor(&6), Some((&5, &"b")));
    /// assert_eq!(tree.floor(&5), Some((&5, &"b")));
    /// assert_eq!(tree.floor(&0), None);
    /// ```
    #[must_use]
    pub fn floor<Q>(&self, key: &Q) -> Option<(&K, &V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        let handle = self.raw.floor(key)?;
        let node = self.raw.node(handle);
        Some((node.key(), self.raw.value(node.value())))
    }

    /// Returns the entry with the smallest key greater than or equal to
    /// `key` (the successor-or-equal), or `None` if every key is smaller.
    ///
    /// # Complexity
    ///
    /// O(log n)
    ///
    /// # Examples
    ///
    /// ```
    /// use rootstock::AvlTree;
    ///
    /// let tree = AvlTree::from([(1, "a"), (5, "b"), (9, "c")]);
    /// assert_eq!(tree.ceiling(&6), Some((&9, &"c")));
    /// assert_eq!(tree.ceiling(&5), Some((&5, &"b")));
    /// assert_eq!(tree.ceiling(&10), None);
    /// ```
    #[must_use]
    pub fn ceiling<Q>(&self, key: &Q) -> Option<(&K, &V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        let handle = self.raw.ceiling(key)?;
        let node = self.raw.node(handle);
        Some((node.key(), self.raw.value(node.value())))
    }

    /// Removes one entry with a key equal to `key`, returning its value.
    ///
    /// If multiple entries share the key, one of them is removed; which
    /// one is unspecified.
    ///
    /// # Complexity
    ///
    /// O(log n)
    ///
    /// # Examples
    ///
    /// ```
    /// use rootstock::AvlTree;
    ///
    /// let mut tree = AvlTree::new();
    /// tree.insert(1, "a");
    /// assert_eq!(tree.remove(&1), Some("a"));
    /// assert_eq!(tree.remove(&1), None);
    /// ```
    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        self.raw.remove(key).map(|(_, value)| value)
    }

    /// Removes one entry with a key equal to `key`, returning the pair.
    ///
    /// # Complexity
    ///
    /// O(log n)
    pub fn remove_entry<Q>(&mut self, key: &Q) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        self.raw.remove(key)
    }

    /// Removes and returns the entry [`floor`](AvlTree::floor) would have
    /// found, in a single traversal.
    ///
    /// # Complexity
    ///
    /// O(log n)
    ///
    /// # Examples
    ///
    /// ```
    /// use rootstock::AvlTree;
    ///
    /// let mut tree = AvlTree::from([(1, "a"), (5, "b"), (9, "c")]);
    /// assert_eq!(tree.remove_floor(&6), Some((5, "b")));
    /// assert_eq!(tree.remove_floor(&6), Some((1, "a")));
    /// assert_eq!(tree.remove_floor(&6), None);
    /// ```
    pub fn remove_floor<Q>(&mut self, key: &Q) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        self.raw.remove_floor(key)
    }

    /// Removes and returns the entry [`ceiling`](AvlTree::ceiling) would
    /// have found, in a single traversal.
    ///
    /// # Complexity
    ///
    /// O(log n)
    ///
    /// # Examples
    ///
    /// ```
    /// use rootstock::AvlTree;
    ///
    /// let mut tree = AvlTree::from([(1, "a"), (5, "b"), (9, "c")]);
    /// assert_eq!(tree.remove_ceiling(&6), Some((9, "c")));
    /// assert_eq!(tree.remove_ceiling(&6), None);
    /// assert_eq!(tree.len(), 2);
    /// ```
    pub fn remove_ceiling<Q>(&mut self, key: &Q) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        self.raw.remove_ceiling(key)
    }

    /// Returns the entry with the minimum key.
    ///
    /// # Complexity
    ///
    /// O(log n)
    #[must_use]
    pub fn first_key_value(&self) -> Option<(&K, &V)> {
        let handle = self.raw.first()?;
        let node = self.raw.node(handle);
        Some((node.key(), self.raw.value(node.value())))
    }

    /// Returns the entry with the maximum key.
    ///
    /// # Complexity
    ///
    /// O(log n)
    #[must_use]
    pub fn last_key_value(&self) -> Option<(&K, &V)> {
        let handle = self.raw.last()?;
        let node = self.raw.node(handle);
        Some((node.key(), self.raw.value(node.value())))
    }

    /// Removes and returns the entry with the minimum key.
    ///
    /// # Examples
    ///
    /// ```
    /// use rootstock::AvlTree;
    ///
    /// let mut tree = AvlTree::from([(2, "b"), (1, "a")]);
    /// assert_eq!(tree.pop_first(), Some((1, "a")));
    /// assert_eq!(tree.pop_first(), Some((2, "b")));
    /// assert_eq!(tree.pop_first(), None);
    /// ```
    pub fn pop_first(&mut self) -> Option<(K, V)> {
        self.raw.pop_first()
    }

    /// Removes and returns the entry with the maximum key.
    pub fn pop_last(&mut self) -> Option<(K, V)> {
        self.raw.pop_last()
    }

    /// Constructs an iterator over a sub-range of entries in the tree, in
    /// ascending key order.
    ///
    /// The range may be any of the usual range expressions; both endpoints
    /// of an inclusive range are themselves included.
    ///
    /// # Panics
    ///
    /// Panics if range `start > end`, or if range `start == end` and both
    /// bounds are `Excluded`.
    ///
    /// # Complexity
    ///
    /// O(log n) to position, then amortized O(1) per yielded entry.
    ///
    /// # Examples
    ///
    /// ```
    /// use rootstock::AvlTree;
    ///
    /// let tree = AvlTree::from([(1, "a"), (3, "b"), (5, "c"), (8, "d")]);
    /// let keys: Vec<i32> = tree.range(3..=5).map(|(&k, _)| k).collect();
    /// assert_eq!(keys, [3, 5]);
    ///
    /// let all: Vec<i32> = tree.range(..).map(|(&k, _)| k).collect();
    /// assert_eq!(all, [1, 3, 5, 8]);
    /// ```
    pub fn range<Q, R>(&self, range: R) -> Range<'_, K, V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
        R: RangeBounds<Q>,
    {
        Range::new(&self.raw, &range)
    }
}

impl<K, V> Default for AvlTree<K, V> {
    /// Creates an empty `AvlTree`.
    fn default() -> Self {
        AvlTree::new()
    }
}

impl<K: Clone, V: Clone> Clone for AvlTree<K, V> {
    fn clone(&self) -> Self {
        // Handles are arena indices, so a structural clone of the arenas
        // preserves the whole shape.
        AvlTree { raw: self.raw.clone() }
    }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for AvlTree<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K: PartialEq, V: PartialEq> PartialEq for AvlTree<K, V> {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().eq(other.iter())
    }
}

impl<K: Eq, V: Eq> Eq for AvlTree<K, V> {}

impl<K: Ord, V> FromIterator<(K, V)> for AvlTree<K, V> {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut tree = AvlTree::new();
        tree.extend(iter);
        tree
    }
}

impl<K: Ord, V> Extend<(K, V)> for AvlTree<K, V> {
    fn extend<T: IntoIterator<Item = (K, V)>>(&mut self, iter: T) {
        for (key, value) in iter {
            self.insert(key, value);
        }
    }
}

impl<K: Ord, V, const N: usize> From<[(K, V); N]> for AvlTree<K, V> {
    /// Converts a `[(K, V); N]` into an `AvlTree<K, V>`.
    ///
    /// ```
    /// use rootstock::AvlTree;
    ///
    /// let tree = AvlTree::from([(1, 2), (3, 4)]);
    /// assert_eq!(tree.len(), 2);
    /// ```
    fn from(entries: [(K, V); N]) -> Self {
        entries.into_iter().collect()
    }
}

impl<'a, K, V> IntoIterator for &'a AvlTree<K, V> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Iter<'a, K, V> {
        self.iter()
    }
}

impl<K, V> IntoIterator for AvlTree<K, V> {
    type Item = (K, V);
    type IntoIter = IntoIter<K, V>;

    /// Gets an owning iterator over the entries of the tree, sorted by key.
    fn into_iter(self) -> IntoIter<K, V> {
        IntoIter::new(self.raw)
    }
}

/// Pushes `link` and the chain of left children below it onto `stack`.
///
/// This is the workhorse of in-order traversal: the stack always holds the
/// frontier whose top is the next entry in key order.
fn push_left_spine<K, V>(tree: &RawAvlTree<K, V>, stack: &mut SmallVec<[Handle; 16]>, link: Option<Handle>) {
    let mut current = link;
    while let Some(handle) = current {
        stack.push(handle);
        current = tree.node(handle).left();
    }
}

/// An iterator over the entries of an `AvlTree`, sorted by key.
///
/// This `struct` is created by the [`iter`](AvlTree::iter) method on
/// [`AvlTree`]. See its documentation for more.
#[must_use = "iterators are lazy and do nothing unless consumed"]
pub struct Iter<'a, K, V> {
    tree: &'a RawAvlTree<K, V>,
    stack: SmallVec<[Handle; 16]>,
    remaining: usize,
}

impl<'a, K, V> Iter<'a, K, V> {
    fn new(tree: &'a RawAvlTree<K, V>) -> Self {
        let mut stack = SmallVec::new();
        push_left_spine(tree, &mut stack, tree.root());
        Iter {
            tree,
            stack,
            remaining: tree.len(),
        }
    }
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let handle = self.stack.pop()?;
        let node = self.tree.node(handle);
        push_left_spine(self.tree, &mut self.stack, node.right());
        self.remaining -= 1;
        Some((node.key(), self.tree.value(node.value())))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> ExactSizeIterator for Iter<'_, K, V> {
    fn len(&self) -> usize {
        self.remaining
    }
}

impl<K, V> FusedIterator for Iter<'_, K, V> {}

impl<K: fmt::Debug, V> fmt::Debug for Iter<'_, K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Iter").field("remaining", &self.remaining).finish()
    }
}

/// An iterator over the keys of an `AvlTree`.
///
/// This `struct` is created by the [`keys`](AvlTree::keys) method on
/// [`AvlTree`]. See its documentation for more.
#[must_use = "iterators are lazy and do nothing unless consumed"]
pub struct Keys<'a, K, V> {
    inner: Iter<'a, K, V>,
}

impl<'a, K, V> Iterator for Keys<'a, K, V> {
    type Item = &'a K;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(key, _)| key)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for Keys<'_, K, V> {
    fn len(&self) -> usize {
        self.inner.len()
    }
}

impl<K, V> FusedIterator for Keys<'_, K, V> {}

impl<K: fmt::Debug, V> fmt::Debug for Keys<'_, K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keys").field("remaining", &self.inner.remaining).finish()
    }
}

/// An iterator over the values of an `AvlTree`, in order of their keys.
///
/// This `struct` is created by the [`values`](AvlTree::values) method on
/// [`AvlTree`]. See its documentation for more.
#[must_use = "iterators are lazy and do nothing unless consumed"]
pub struct Values<'a, K, V> {
    inner: Iter<'a, K, V>,
}

impl<'a, K, V> Iterator for Values<'a, K, V> {
    type Item = &'a V;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_, value)| value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for Values<'_, K, V> {
    fn len(&self) -> usize {
        self.inner.len()
    }
}

impl<K, V> FusedIterator for Values<'_, K, V> {}

impl<K, V: fmt::Debug> fmt::Debug for Values<'_, K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Values").field("remaining", &self.inner.remaining).finish()
    }
}

/// An iterator over a sub-range of entries in an `AvlTree`.
///
/// This `struct` is created by the [`range`](AvlTree::range) method on
/// [`AvlTree`]. See its documentation for more.
///
/// The sequence is lazy, ordered and finite: the iterator seeks to the lower
/// bound up front and stops for good the first time it passes the upper
/// bound.
#[must_use = "iterators are lazy and do nothing unless consumed"]
pub struct Range<'a, K, V> {
    tree: &'a RawAvlTree<K, V>,
    stack: SmallVec<[Handle; 16]>,
    /// Handle of the last in-range node, resolved up front so iteration
    /// needs no further key comparisons.
    last: Option<Handle>,
    finished: bool,
}

impl<'a, K, V> Range<'a, K, V> {
    fn new<Q, R>(tree: &'a RawAvlTree<K, V>, bounds: &R) -> Self
    where
        K: Borrow<Q> + Ord,
        Q: ?Sized + Ord,
        R: RangeBounds<Q>,
    {
        validate_range_bounds(bounds);

        // Seed the traversal stack with the path to the first in-range
        // node: descend right past nodes below the start bound, pushing
        // every node at or above it.
        let mut stack: SmallVec<[Handle; 16]> = SmallVec::new();
        let mut current = tree.root();
        while let Some(handle) = current {
            let node = tree.node(handle);
            let in_range = match bounds.start_bound() {
                Bound::Included(start) => node.key().borrow() >= start,
                Bound::Excluded(start) => node.key().borrow() > start,
                Bound::Unbounded => true,
            };
            if in_range {
                stack.push(handle);
                current = node.left();
            } else {
                current = node.right();
            }
        }

        let last = match bounds.end_bound() {
            Bound::Included(end) => tree.floor(end),
            Bound::Excluded(end) => tree.below(end),
            Bound::Unbounded => tree.last(),
        };

        // The range is empty when nothing satisfies the start bound, or
        // when the first candidate already lies past the end bound.
        let finished = match stack.last() {
            None => true,
            Some(&first) => {
                last.is_none()
                    || match bounds.end_bound() {
                        Bound::Included(end) => tree.node(first).key().borrow() > end,
                        Bound::Excluded(end) => tree.node(first).key().borrow() >= end,
                        Bound::Unbounded => false,
                    }
            }
        };

        Range {
            tree,
            stack,
            last,
            finished,
        }
    }
}

impl<'a, K, V> Iterator for Range<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let Some(handle) = self.stack.pop() else {
            self.finished = true;
            return None;
        };
        let node = self.tree.node(handle);
        if self.last == Some(handle) {
            // This is the final in-range entry; yield it and stop.
            self.finished = true;
        } else {
            push_left_spine(self.tree, &mut self.stack, node.right());
        }
        Some((node.key(), self.tree.value(node.value())))
    }
}

impl<K, V> FusedIterator for Range<'_, K, V> {}

impl<K, V> fmt::Debug for Range<'_, K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Range").field("finished", &self.finished).finish()
    }
}

/// An owning iterator over the entries of an `AvlTree`, sorted by key.
///
/// This `struct` is created by the [`into_iter`](IntoIterator::into_iter)
/// method on [`AvlTree`] (provided by the [`IntoIterator`] trait).
///
/// # Examples
///
/// ```
/// use rootstock::AvlTree;
///
/// let tree = AvlTree::from([(2, "b"), (1, "a")]);
/// let entries: Vec<_> = tree.into_iter().collect();
/// assert_eq!(entries, [(1, "a"), (2, "b")]);
/// ```
#[must_use = "iterators are lazy and do nothing unless consumed"]
pub struct IntoIter<K, V> {
    tree: RawAvlTree<K, V>,
    stack: SmallVec<[Handle; 16]>,
    remaining: usize,
}

impl<K, V> IntoIter<K, V> {
    fn new(tree: RawAvlTree<K, V>) -> Self {
        let mut stack = SmallVec::new();
        push_left_spine(&tree, &mut stack, tree.root());
        let remaining = tree.len();
        IntoIter {
            tree,
            stack,
            remaining,
        }
    }
}

impl<K, V> Iterator for IntoIter<K, V> {
    type Item = (K, V);

    fn next(&mut self) -> Option<Self::Item> {
        let handle = self.stack.pop()?;
        // Drain the node out of the arena; its children handles remain
        // valid because the arena only blanks the taken slot.
        let node = self.tree.take_node(handle);
        push_left_spine(&self.tree, &mut self.stack, node.right());
        self.remaining -= 1;
        let (key, value) = node.into_entry();
        let value = self.tree.take_value(value);
        Some((key, value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> ExactSizeIterator for IntoIter<K, V> {
    fn len(&self) -> usize {
        self.remaining
    }
}

impl<K, V> FusedIterator for IntoIter<K, V> {}

impl<K, V> fmt::Debug for IntoIter<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IntoIter").field("remaining", &self.remaining).finish()
    }
}
