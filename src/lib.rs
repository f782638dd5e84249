//! Backing stores for ordered collections and reusable buffers.
//!
//! This crate provides two independent building blocks:
//!
//! - [`AvlTree`], an ordered map backed by a height-balanced binary search
//!   tree that, unlike `BTreeMap`, permits duplicate keys and answers
//!   nearest-key queries ([`floor`](AvlTree::floor) /
//!   [`ceiling`](AvlTree::ceiling)) and combined search-and-remove
//!   operations ([`remove_floor`](AvlTree::remove_floor) /
//!   [`remove_ceiling`](AvlTree::remove_ceiling)) in O(log n).
//! - [`ArrayPool`], a bucketed pool of fixed-length buffers that hands out
//!   reusable `Box<[T]>` allocations grouped into doubling size classes,
//!   with a process-wide shared byte pool.
//!
//! # Example
//!
//! ```
//! use rootstock::AvlTree;
//!
//! let mut tree = AvlTree::new();
//! for key in [5, 3, 8, 1, 4, 7, 9] {
//!     tree.insert(key, key * 10);
//! }
//!
//! // Nearest-key queries: the largest key <= 6 is 5.
//! assert_eq!(tree.floor(&6), Some((&5, &50)));
//!
//! // In-order iteration yields keys in sorted order.
//! let keys: Vec<i32> = tree.keys().copied().collect();
//! assert_eq!(keys, [1, 3, 4, 5, 7, 8, 9]);
//! ```
//!
//! # Implementation
//!
//! Tree nodes live in a slot arena and reference each other by index
//! handle, so the tree performs no per-node pointer chasing across
//! individually boxed allocations and needs no unsafe code. Iteration uses
//! an explicit stack rather than recursion, so arbitrarily deep trees
//! cannot overflow the call stack.

// These forbid rules and lint groups are meant to be very restrictive.
#![forbid(unsafe_code)]
#![forbid(keyword_idents)]
#![forbid(non_ascii_idents)]
#![forbid(unreachable_pub)]
#![warn(clippy::all)]
#![warn(clippy::cargo)]
#![warn(clippy::pedantic)]

mod raw;

pub mod array_pool;
pub mod avl_tree;

pub use array_pool::ArrayPool;
pub use avl_tree::AvlTree;
