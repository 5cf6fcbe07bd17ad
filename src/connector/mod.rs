//! Feed connector
//!
//! Key features:
//! - Version strings that tell feeds from indexable documents
//! - Robots-gated, throttled fetches spooled to a per-document cache
//! - Feed parsing for feeds, metadata-enriched ingestion for documents
//! - Carried-down inline bodies indexed without a fetch

mod content_type;
mod core;
mod data_cache;
pub mod errors;
mod process;
pub mod version;

pub use content_type::{effective_content_type, is_xml_content_type};
pub use self::core::{ExistingVersions, FeedConnector};
pub use data_cache::{DataCache, checksum_step};
pub use errors::{ConnectorError, ConnectorResult};
pub use version::{CarriedMetadata, document_version, feed_validators, feed_version};
