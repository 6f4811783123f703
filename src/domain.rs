//! Domain module - records, categories and source constants
//!
//! Everything here is pure data; no I/O happens in the domain layer.

pub mod category;
pub mod constants;
pub mod record;

pub use category::{Category, SourceKind};
pub use record::{CanonicalRecord, ExternalId, RecordDetails};
