//! # roster-id
//!
//! Typed identifiers for the roster assignment engine.
//!
//! Every identifier is a ULID behind a short prefix, e.g.
//! `cand_01HV4Z2WQXKJNM8GPQY6VBKC3D` or `evt_01HV4Z3MXNKPQR9HSTZ7WCLD4E`.
//!
//! - The prefix keeps candidate and event ids from being mixed up, both in
//!   the type system and in the database.
//! - Ids are totally ordered. The assignment engine walks candidates in
//!   ascending id order, which is what makes tie-breaking reproducible.
//! - The canonical string form roundtrips through `parse`/`Display` and serde.

mod error;
mod macros;
mod types;

pub use error::IdError;
pub use types::*;

/// Re-export ulid for callers that need to build ids from raw parts.
pub use ulid::Ulid;
