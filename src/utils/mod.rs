pub mod constants;
pub mod string_utils;
pub mod url_utils;

pub use constants::*;
pub use string_utils::{make_readable, pack, pack_list, unpack};
pub use url_utils::{CanonicalizationPolicies, CanonicalizationPolicy, SessionRules, canonicalize};

/// Current wall-clock time in epoch milliseconds
#[must_use]
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
