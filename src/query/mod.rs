//! The predicate engine: criteria matching plus sort/skip/limit.
//!
//! Storage and indexes only narrow the candidate set; every query result is
//! decided by [`Criteria::test`] and shaped by a [`Cursor`].

mod compare;
mod criteria;
mod cursor;

pub use compare::{compare, values_equal};
pub use criteria::Criteria;
pub use cursor::{Cursor, QueryOptions, SortOrder};
