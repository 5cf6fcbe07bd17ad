//! robots.txt exclusion
//!
//! Key features:
//! - One robots.txt fetch per host at a time; concurrent callers wait for it
//! - Records cached for 24 hours, evicted by `poll` once idle and stale
//! - `*` wildcards and `$` end anchors in rule paths
//! - Allow rules override disallow rules within the applicable record

mod cache;
mod matcher;
mod parser;

pub use cache::RobotsCache;
pub use matcher::does_path_match;
pub use parser::{ParseOutcome, ParsedRobots, RobotsRecord, is_path_allowed, parse_robots_txt};
