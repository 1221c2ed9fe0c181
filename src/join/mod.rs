//! The oblivious multi-way band-join pipeline.
//!
//! Phase order (driven by [`executor::execute`]):
//! 1. filters — failing rows get `local_mult = 0`
//! 2. bottom-up — per-tuple subtree match counts
//! 3. top-down — per-tuple output multiplicities
//! 4. distribute-expand — materialize `final_mult` copies per tuple
//! 5. align-concat — reorder so equal row indices join

pub mod align;
pub mod bottom_up;
pub mod combined;
pub mod executor;
pub mod expand;
pub mod filters;
pub mod top_down;

pub use executor::execute;
