//! Infrastructure layer for configuration, logging, HTTP and persistence
//!
//! Everything that touches the network, the filesystem or a database lives
//! here; the crawling layer only sees the seams re-exported below.

pub mod backup_writer;
pub mod config;
pub mod document_store;
pub mod http_client;
pub mod identity;
pub mod logging;
pub mod relational_store;
pub mod sinks;

// Re-export commonly used items
pub use backup_writer::{BackupError, BackupWriter};
pub use config::{ConfigError, HarvestConfig, SourceConfig};
pub use document_store::RedbDocumentStore;
pub use http_client::{FetchError, HttpClient, HttpClientConfig};
pub use identity::IdentityRotator;
pub use logging::{init_logging, init_logging_with_config};
pub use relational_store::{MovieRow, SongRow, SqliteRelationalStore};
pub use sinks::{DocumentSink, RelationalSink, SinkError};
