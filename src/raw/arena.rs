use core::num::NonZero;

/// Index of an element in an [`Arena`].
///
/// Stored as `NonZero<u32>` (the index plus one) so that `Option<Handle>`
/// occupies the same four bytes as `Handle` itself; tree nodes hold two
/// optional child handles, so the niche matters.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(transparent)]
pub(crate) struct Handle(NonZero<u32>);

impl Handle {
    pub(crate) const MAX: usize = (u32::MAX - 1) as usize;

    #[inline]
    pub(crate) const fn from_index(index: usize) -> Self {
        assert!(index <= Self::MAX, "`Handle::from_index()` - `index` > `Handle::MAX`!");
        // `index + 1` cannot be zero and cannot overflow u32 after the assert.
        #[allow(clippy::cast_possible_truncation)]
        match NonZero::new((index + 1) as u32) {
            Some(raw) => Self(raw),
            None => unreachable!(),
        }
    }

    #[inline]
    pub(crate) const fn to_index(self) -> usize {
        (self.0.get() - 1) as usize
    }
}

/// A slot store that owns elements and hands out [`Handle`]s to them.
///
/// Freed slots are recycled through a free list, so handles stay dense even
/// under heavy insert/remove churn. A handle is valid from `alloc` until the
/// matching `take`/`free`; using it afterwards is a logic error and panics.
#[derive(Clone)]
pub(crate) struct Arena<T> {
    slots: Vec<Option<T>>,
    free: Vec<Handle>,
}

impl<T> Arena<T> {
    pub(crate) const fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
        }
    }

    /// Number of live elements (allocated and not yet freed).
    pub(crate) const fn len(&self) -> usize {
        self.slots.len().saturating_sub(self.free.len())
    }

    pub(crate) const fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stores `element` and returns its handle, recycling a freed slot when
    /// one is available.
    pub(crate) fn alloc(&mut self, element: T) -> Handle {
        if let Some(handle) = self.free.pop() {
            self.slots[handle.to_index()] = Some(element);
            handle
        } else {
            // The new slot's index is the pre-push length, which
            // `Handle::from_index` requires to be at most `Handle::MAX`.
            assert!(
                self.slots.len() <= Handle::MAX,
                "`Arena::alloc()` - arena is at maximum capacity ({})",
                Handle::MAX
            );
            self.slots.push(Some(element));
            Handle::from_index(self.slots.len() - 1)
        }
    }

    #[inline]
    pub(crate) fn get(&self, handle: Handle) -> &T {
        self.slots[handle.to_index()].as_ref().expect("`Arena::get()` - `handle` is invalid!")
    }

    #[inline]
    pub(crate) fn get_mut(&mut self, handle: Handle) -> &mut T {
        self.slots[handle.to_index()].as_mut().expect("`Arena::get_mut()` - `handle` is invalid!")
    }

    /// Removes the element behind `handle` and recycles its slot.
    pub(crate) fn take(&mut self, handle: Handle) -> T {
        let element = self.slots[handle.to_index()].take().expect("`Arena::take()` - `handle` is invalid!");
        self.free.push(handle);
        element
    }

    /// Drops every element and invalidates every outstanding handle.
    pub(crate) fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use static_assertions::assert_eq_size;

    // The whole point of the NonZero representation.
    assert_eq_size!(Handle, Option<Handle>);
    assert_eq_size!(Handle, u32);

    #[test]
    fn handle_round_trips_small_indices() {
        for index in [0usize, 1, 2, 1000] {
            assert_eq!(Handle::from_index(index).to_index(), index);
        }
    }

    #[test]
    #[should_panic(expected = "`Handle::from_index()` - `index` > `Handle::MAX`!")]
    fn handle_rejects_out_of_range_index() {
        let _ = Handle::from_index(Handle::MAX + 1);
    }

    #[test]
    fn alloc_reuses_freed_slots() {
        let mut arena: Arena<&str> = Arena::new();
        let a = arena.alloc("a");
        let b = arena.alloc("b");
        assert_eq!(arena.take(a), "a");
        // The freed slot comes back before any new slot is grown.
        let c = arena.alloc("c");
        assert_eq!(a, c);
        assert_eq!(*arena.get(b), "b");
        assert_eq!(*arena.get(c), "c");
        assert_eq!(arena.len(), 2);
    }

    #[test]
    fn clear_resets_everything() {
        let mut arena: Arena<u32> = Arena::new();
        for i in 0..10 {
            arena.alloc(i);
        }
        arena.clear();
        assert!(arena.is_empty());
        assert_eq!(arena.len(), 0);
    }

    proptest! {
        /// Drives the arena with random alloc/take/mutate traffic and checks
        /// it against a plain `Vec` of live (handle, value) pairs.
        #[test]
        fn arena_tracks_live_elements(steps in prop::collection::vec((any::<u32>(), any::<prop::sample::Index>(), 0u8..3), 0..512)) {
            let mut arena: Arena<u32> = Arena::new();
            let mut live: Vec<(Handle, u32)> = Vec::new();

            for (value, which, action) in steps {
                match action {
                    0 => live.push((arena.alloc(value), value)),
                    1 if !live.is_empty() => {
                        let (handle, expected) = live.swap_remove(which.index(live.len()));
                        prop_assert_eq!(arena.take(handle), expected);
                    }
                    2 if !live.is_empty() => {
                        let slot = which.index(live.len());
                        *arena.get_mut(live[slot].0) = value;
                        live[slot].1 = value;
                    }
                    _ => {}
                }

                prop_assert_eq!(arena.len(), live.len());
                for &(handle, expected) in &live {
                    prop_assert_eq!(*arena.get(handle), expected);
                }
            }
        }
    }
}
