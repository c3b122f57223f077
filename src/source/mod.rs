//! Reading the source tracker's export.
//!
//! The engine walks the records twice, so readers return a fully
//! materialized `Vec` rather than a stream.

pub mod bugzilla;

pub use bugzilla::{parse_timestamp, read_bugs, read_file};
