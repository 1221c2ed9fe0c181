//! Oblivious primitives: constant-time swap, Waksman shuffle, comparator
//! registry, and the external merge sort used behind a shuffle.

pub mod compare;
pub mod prf;
pub mod shuffle;
pub mod sort;
pub mod swap;

pub use compare::Comparator;
pub use prf::ShuffleRng;
pub use shuffle::{GroupStore, VecGroupStore, shuffle};
pub use sort::{merge_sort, shuffle_sort};
pub use swap::{oblivious_overwrite, oblivious_swap, oblivious_swap_at};
