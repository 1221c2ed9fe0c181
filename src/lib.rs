//! oblijoin — a data-oblivious multi-way band-join engine.
//!
//! Evaluates `SELECT *` queries with equality and band (inequality) join
//! predicates over small integer tables, producing exactly the rows a
//! conventional engine would while revealing, through observable memory
//! traffic, only the sizes of the inputs.
//!
//! # Prior Art
//!
//! - Krastnikov, S., Kerschbaum, F., Stebila, D. (2020). "Efficient
//!   Oblivious Database Joins." PVLDB, 13(11), 2132–2145.
//!   The multiplicity / expand / align decomposition of the join and the
//!   oblivious distribution and expansion networks follow this paper.
//! - Waksman, A. (1968). "A Permutation Network." Journal of the ACM,
//!   15(1), 159–163. The shuffle's switch network.
//!
//! # Pipeline
//!
//! parse → join tree → filters → bottom-up multiplicities → top-down
//! multiplicities → distribute-expand → align-concat. Every sort inside
//! the phases is an oblivious shuffle followed by a comparison sort, so
//! the access trace depends only on table sizes.
//!
//! ```no_run
//! use oblijoin::{execute, io};
//! use std::path::Path;
//!
//! let tables = io::load_dir(Path::new("inputs"))?;
//! let result = execute("SELECT * FROM r AS r, s AS s WHERE r.k = s.k", &tables)?;
//! io::save_csv(&result, Path::new("result.csv"))?;
//! # Ok::<(), oblijoin::ObliviousJoinError>(())
//! ```

pub mod config;
pub mod constraint;
pub mod debug;
pub mod entry;
pub mod error;
pub mod io;
pub mod join;
pub mod oblivious;
pub mod query;
pub mod table;
pub mod tree;

pub use constraint::{Bound, JoinConstraint};
pub use entry::{Entry, EqualityType, FieldType, MAX_ATTRIBUTES};
pub use error::{ErrorKind, ObliviousJoinError};
pub use join::execute;
pub use query::{ParsedQuery, parse};
pub use table::{Schema, Table};
pub use tree::{JoinTree, JoinTreeNode};
