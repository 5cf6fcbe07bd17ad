//! Feed parsing and link extraction
//!
//! Recognises RSS, RDF, Atom and sitemap documents, emits a document
//! reference per discovered link and reports the feed's next rescan time.

pub mod dates;
pub mod errors;
mod parser;

pub use errors::{FeedError, FeedResult};
pub use parser::{CONTENT_FILE_PREFIX, FeedKind, FeedParser, FeedSummary};
