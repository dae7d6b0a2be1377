//! Core types for partition generation.
//!
//! - [`key`]: primary-key columns, values and lexicographically ordered tuples
//! - [`expr`]: dialect-independent logical filter expressions
//! - [`range`]: per-partition key ranges and their expansion into [`Expr`] trees
//! - [`identifier`]: identifier validation and quoting
//!
//! Nothing here talks to a database or renders SQL; that is left to
//! [`crate::source`] and [`crate::dialect`].

pub mod expr;
pub mod identifier;
pub mod key;
pub mod range;

pub use expr::{CompareOp, Expr};
pub use key::{KeyColumn, KeySchema, KeyTuple, KeyType, KeyValue};
pub use range::{ge_expr, lt_expr, RangePredicate};
