//! Version strings
//!
//! Two shapes, told apart by the first character:
//! - `+` an indexable document: security, ingest URL and the carried-down
//!   metadata, then the body checksum
//! - `-` a feed: its ETag and Last-Modified, then the body checksum
//!
//! The framework compares version strings for equality only.

use crate::utils::{DEFAULT_AUTHORITY_DENY_TOKEN, pack, pack_list, unpack};

const DELIMITER: char = '+';

/// Metadata carried down from the feeds that link to a document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CarriedMetadata {
    pub pub_dates: Vec<String>,
    pub titles: Vec<String>,
    pub sources: Vec<String>,
    pub categories: Vec<String>,
    pub descriptions: Vec<String>,
    pub author_names: Vec<String>,
    pub author_emails: Vec<String>,
}

impl CarriedMetadata {
    /// Sort every list so parent order never changes the version.
    #[must_use]
    pub fn sorted(mut self) -> Self {
        for values in [
            &mut self.pub_dates,
            &mut self.titles,
            &mut self.sources,
            &mut self.categories,
            &mut self.descriptions,
            &mut self.author_names,
            &mut self.author_emails,
        ] {
            values.sort();
        }
        self
    }
}

/// Version of an indexable document.
///
/// # Arguments
/// * `acls` - Sorted access tokens; when any exist the deny token follows
/// * `ingest_url` - Mapped URL the document is indexed under
/// * `metadata` - Sorted carried-down metadata
/// * `checksum` - Body checksum from the data cache
#[must_use]
pub fn document_version(
    acls: &[String],
    ingest_url: &str,
    metadata: &CarriedMetadata,
    checksum: i64,
) -> String {
    let mut out = String::from("+");
    pack_list(&mut out, acls, DELIMITER);
    if acls.is_empty() {
        out.push('-');
    } else {
        out.push('+');
        pack(&mut out, DEFAULT_AUTHORITY_DENY_TOKEN, DELIMITER);
    }
    pack(&mut out, ingest_url, DELIMITER);
    pack_list(&mut out, &metadata.pub_dates, DELIMITER);
    pack_list(&mut out, &metadata.titles, DELIMITER);
    pack_list(&mut out, &metadata.sources, DELIMITER);
    pack_list(&mut out, &metadata.categories, DELIMITER);
    pack_list(&mut out, &metadata.descriptions, DELIMITER);
    pack_list(&mut out, &metadata.author_names, DELIMITER);
    pack_list(&mut out, &metadata.author_emails, DELIMITER);
    out.push_str(&checksum.to_string());
    out
}

/// Version of a feed
#[must_use]
pub fn feed_version(etag: Option<&str>, last_modified: Option<&str>, checksum: i64) -> String {
    let mut out = String::from("-");
    pack(&mut out, etag.unwrap_or(""), DELIMITER);
    pack(&mut out, last_modified.unwrap_or(""), DELIMITER);
    out.push_str(&checksum.to_string());
    out
}

/// ETag and Last-Modified recorded in a feed version, each `None` when blank.
///
/// Anything other than a feed version yields `(None, None)`.
#[must_use]
pub fn feed_validators(version: &str) -> (Option<String>, Option<String>) {
    if !version.starts_with('-') {
        return (None, None);
    }
    let (etag, next) = unpack(version, 1, DELIMITER);
    let (last_modified, _) = unpack(version, next, DELIMITER);
    let non_empty = |value: String| (!value.is_empty()).then_some(value);
    (non_empty(etag), non_empty(last_modified))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsecured_document_version() {
        let metadata = CarriedMetadata {
            pub_dates: vec!["1704164645000".into()],
            titles: vec!["A+B".into()],
            sources: vec!["http://x/feed".into()],
            ..CarriedMetadata::default()
        };
        let version = document_version(&[], "http://x/a", &metadata, -42);
        assert_eq!(
            version,
            "+0+-http://x/a+1+1704164645000+1+A\\+B+1+http://x/feed+0+0+0+0+-42"
        );
    }

    #[test]
    fn secured_document_version_carries_deny_token() {
        let version = document_version(
            &["tokA".to_string(), "tokB".to_string()],
            "http://x/a",
            &CarriedMetadata::default(),
            7,
        );
        assert!(version.starts_with("+2+tokA+tokB++DEAD_AUTHORITY+http://x/a+"));
        assert!(version.ends_with("0+0+0+0+0+0+0+7"));
    }

    #[test]
    fn feed_version_round_trips_validators() {
        let version = feed_version(Some("\"abc\""), None, 99);
        assert_eq!(version, "-\"abc\"++99");
        assert_eq!(feed_validators(&version), (Some("\"abc\"".into()), None));
        assert_eq!(feed_validators("+0+-x+"), (None, None));
    }

    #[test]
    fn metadata_order_does_not_matter() {
        let a = CarriedMetadata {
            titles: vec!["b".into(), "a".into()],
            ..CarriedMetadata::default()
        }
        .sorted();
        let b = CarriedMetadata {
            titles: vec!["a".into(), "b".into()],
            ..CarriedMetadata::default()
        }
        .sorted();
        assert_eq!(document_version(&[], "u", &a, 0), document_version(&[], "u", &b, 0));
    }
}
