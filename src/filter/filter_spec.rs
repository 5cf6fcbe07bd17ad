//! Immutable per-invocation view of a job specification

use regex::Regex;
use std::collections::{BTreeSet, HashSet};

use super::errors::{FilterError, FilterResult};
use super::mapping::{MappingRule, MappingRules};
use super::specification::{Specification, SpecificationNode, VALUE_YES};
use crate::utils::{
    CanonicalizationPolicies, CanonicalizationPolicy, DEFAULT_FEED_TIMEOUT_MS, MINUTE_MS,
    canonicalize,
};

/// Where a feed item's embedded body comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DechromedMode {
    /// Nothing is embedded; the description is metadata
    #[default]
    None,
    /// The description is the body
    Description,
    /// The content element is the body; the description is metadata
    Content,
}

/// What to do with the linked page itself
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChromedMode {
    /// Fetch and index the page
    #[default]
    Use,
    /// Never index fetched pages
    Skip,
    /// Index feed metadata only
    MetadataOnly,
}

/// Builder for [`FilterSpec`]
#[derive(Debug, Clone, Default)]
pub struct FilterSpecBuilder {
    raw_seeds: Vec<String>,
    mappings: MappingRules,
    excludes: Vec<Regex>,
    policies: CanonicalizationPolicies,
    acls: BTreeSet<String>,
    default_rescan_minutes: Option<i64>,
    minimum_rescan_minutes: Option<i64>,
    bad_feed_rescan_minutes: Option<i64>,
    feed_timeout_ms: Option<u64>,
    dechromed_mode: DechromedMode,
    chromed_mode: ChromedMode,
    warn_on_bad_seed: bool,
}

fn compile(pattern: &str) -> FilterResult<Regex> {
    Regex::new(pattern).map_err(|source| FilterError::BadRegex {
        pattern: pattern.to_string(),
        source,
    })
}

fn parse_number(value: &str) -> FilterResult<i64> {
    value
        .trim()
        .parse()
        .map_err(|_| FilterError::BadNumber(value.to_string()))
}

fn is_yes(value: Option<&String>) -> bool {
    value.is_some_and(|v| v == VALUE_YES)
}

impl FilterSpecBuilder {
    /// Seed feed URL; canonicalized when the spec is built
    #[must_use]
    pub fn seed(mut self, url: impl Into<String>) -> Self {
        self.raw_seeds.push(url.into());
        self
    }

    /// # Errors
    /// See [`MappingRule::new`].
    pub fn map_rule(mut self, pattern: &str, expression: &str) -> FilterResult<Self> {
        self.mappings.add(MappingRule::new(pattern, expression)?);
        Ok(self)
    }

    /// Exclusion regexes, one per line; blank and `#` lines are skipped.
    ///
    /// # Errors
    /// Returns `FilterError::BadRegex` for a line that does not compile.
    pub fn excludes(mut self, list: &str) -> FilterResult<Self> {
        for line in list.lines() {
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            self.excludes.push(compile(line)?);
        }
        Ok(self)
    }

    #[must_use]
    pub fn canonicalization_policy(mut self, policy: CanonicalizationPolicy) -> Self {
        self.policies.add_rule(policy);
        self
    }

    #[must_use]
    pub fn access_token(mut self, token: impl Into<String>) -> Self {
        self.acls.insert(token.into());
        self
    }

    #[must_use]
    pub fn default_rescan_minutes(mut self, minutes: i64) -> Self {
        self.default_rescan_minutes = Some(minutes);
        self
    }

    #[must_use]
    pub fn minimum_rescan_minutes(mut self, minutes: i64) -> Self {
        self.minimum_rescan_minutes = Some(minutes);
        self
    }

    #[must_use]
    pub fn bad_feed_rescan_minutes(mut self, minutes: i64) -> Self {
        self.bad_feed_rescan_minutes = Some(minutes);
        self
    }

    #[must_use]
    pub fn feed_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.feed_timeout_ms = Some(timeout_ms);
        self
    }

    #[must_use]
    pub fn dechromed_mode(mut self, mode: DechromedMode) -> Self {
        self.dechromed_mode = mode;
        self
    }

    #[must_use]
    pub fn chromed_mode(mut self, mode: ChromedMode) -> Self {
        self.chromed_mode = mode;
        self
    }

    /// Log a warning for each seed that cannot be canonicalized
    #[must_use]
    pub fn warn_on_bad_seed(mut self, warn: bool) -> Self {
        self.warn_on_bad_seed = warn;
        self
    }

    #[must_use]
    pub fn build(self) -> FilterSpec {
        let mut seeds = HashSet::new();
        for raw in &self.raw_seeds {
            match canonicalize(&self.policies, None, raw) {
                Some(seed) => {
                    seeds.insert(seed);
                }
                None if self.warn_on_bad_seed => log::warn!("Illegal seed feed '{raw}'"),
                None => {}
            }
        }

        FilterSpec {
            seeds,
            mappings: self.mappings,
            excludes: self.excludes,
            policies: self.policies,
            acls: self.acls,
            default_rescan_minutes: self.default_rescan_minutes,
            minimum_rescan_minutes: self.minimum_rescan_minutes,
            bad_feed_rescan_minutes: self.bad_feed_rescan_minutes,
            feed_timeout_ms: self.feed_timeout_ms.unwrap_or(DEFAULT_FEED_TIMEOUT_MS),
            dechromed_mode: self.dechromed_mode,
            chromed_mode: self.chromed_mode,
        }
    }
}

/// Seeds, link filters, canonicalization and rescan policy of one job
#[derive(Debug, Clone)]
pub struct FilterSpec {
    seeds: HashSet<String>,
    mappings: MappingRules,
    excludes: Vec<Regex>,
    policies: CanonicalizationPolicies,
    acls: BTreeSet<String>,
    default_rescan_minutes: Option<i64>,
    minimum_rescan_minutes: Option<i64>,
    bad_feed_rescan_minutes: Option<i64>,
    feed_timeout_ms: u64,
    dechromed_mode: DechromedMode,
    chromed_mode: ChromedMode,
}

impl FilterSpec {
    #[must_use]
    pub fn builder() -> FilterSpecBuilder {
        FilterSpecBuilder::default()
    }

    /// Interpret a job specification.
    ///
    /// Canonicalization policies are gathered before seeds are
    /// canonicalized, whatever the node order.
    ///
    /// # Errors
    /// Returns an error for an illegal regex, mapping expression or number.
    pub fn from_specification(spec: &Specification, warn_on_bad_seed: bool) -> FilterResult<Self> {
        let mut builder = Self::builder().warn_on_bad_seed(warn_on_bad_seed);
        let mut excludes = "";

        for node in &spec.nodes {
            match node {
                SpecificationNode::Map { pattern, map } if !pattern.is_empty() => {
                    builder = builder.map_rule(pattern, map.as_deref().unwrap_or(""))?;
                }
                SpecificationNode::Exclude { value } => excludes = value.as_str(),
                SpecificationNode::UrlSpec {
                    regexp,
                    reorder,
                    javasessionremoval,
                    aspsessionremoval,
                    phpsessionremoval,
                    bvsessionremoval,
                } => {
                    let policy = CanonicalizationPolicy::new(
                        regexp,
                        is_yes(reorder.as_ref()),
                        is_yes(javasessionremoval.as_ref()),
                        is_yes(aspsessionremoval.as_ref()),
                        is_yes(phpsessionremoval.as_ref()),
                        is_yes(bvsessionremoval.as_ref()),
                    )
                    .map_err(|source| FilterError::BadRegex {
                        pattern: regexp.clone(),
                        source,
                    })?;
                    builder = builder.canonicalization_policy(policy);
                }
                _ => {}
            }
        }
        builder = builder.excludes(excludes)?;

        for node in &spec.nodes {
            builder = match node {
                SpecificationNode::Feed { url } if !url.is_empty() => builder.seed(url.as_str()),
                SpecificationNode::Access { token } => builder.access_token(token.as_str()),
                SpecificationNode::FeedRescan { value } if !value.is_empty() => {
                    builder.default_rescan_minutes(parse_number(value)?)
                }
                SpecificationNode::MinFeedRescan { value } if !value.is_empty() => {
                    builder.minimum_rescan_minutes(parse_number(value)?)
                }
                SpecificationNode::BadFeedRescan { value } if !value.is_empty() => {
                    builder.bad_feed_rescan_minutes(parse_number(value)?)
                }
                SpecificationNode::FeedTimeout { value } if !value.is_empty() => {
                    let seconds = parse_number(value)?;
                    builder.feed_timeout_ms(u64::try_from(seconds.max(0)).unwrap_or(0) * 1000)
                }
                SpecificationNode::DechromedMode { mode } => match mode.as_str() {
                    "none" => builder.dechromed_mode(DechromedMode::None),
                    "description" => builder.dechromed_mode(DechromedMode::Description),
                    "content" => builder.dechromed_mode(DechromedMode::Content),
                    _ => builder,
                },
                SpecificationNode::ChromedMode { mode } => match mode.as_str() {
                    "use" => builder.chromed_mode(ChromedMode::Use),
                    "skip" => builder.chromed_mode(ChromedMode::Skip),
                    "metadata" => builder.chromed_mode(ChromedMode::MetadataOnly),
                    _ => builder,
                },
                _ => builder,
            };
        }

        Ok(builder.build())
    }

    #[must_use]
    pub fn is_seed(&self, canonical_url: &str) -> bool {
        self.seeds.contains(canonical_url)
    }

    /// Canonical seed URLs, sorted
    #[must_use]
    pub fn seeds(&self) -> Vec<String> {
        let mut seeds: Vec<String> = self.seeds.iter().cloned().collect();
        seeds.sort();
        seeds
    }

    /// Access tokens, sorted
    #[must_use]
    pub fn acls(&self) -> Vec<String> {
        self.acls.iter().cloned().collect()
    }

    #[must_use]
    pub fn feed_timeout_ms(&self) -> u64 {
        self.feed_timeout_ms
    }

    #[must_use]
    pub fn dechromed_mode(&self) -> DechromedMode {
        self.dechromed_mode
    }

    #[must_use]
    pub fn chromed_mode(&self) -> ChromedMode {
        self.chromed_mode
    }

    #[must_use]
    pub fn canonicalization_policies(&self) -> &CanonicalizationPolicies {
        &self.policies
    }

    #[must_use]
    pub fn default_rescan_time(&self, now_ms: i64) -> Option<i64> {
        self.default_rescan_minutes.map(|m| m * MINUTE_MS + now_ms)
    }

    #[must_use]
    pub fn minimum_rescan_time(&self, now_ms: i64) -> Option<i64> {
        self.minimum_rescan_minutes.map(|m| m * MINUTE_MS + now_ms)
    }

    #[must_use]
    pub fn bad_feed_rescan_time(&self, now_ms: i64) -> Option<i64> {
        self.bad_feed_rescan_minutes.map(|m| m * MINUTE_MS + now_ms)
    }

    /// Whether a discovered URL may be queued: seeds always may; anything
    /// else must match a mapping rule and no exclusion.
    #[must_use]
    pub fn is_legal_url(&self, url: &str) -> bool {
        if self.seeds.contains(url) {
            return true;
        }
        if !self.mappings.is_match(url) {
            log::debug!("Url '{url}' is illegal because it did not match a mapping rule");
            return false;
        }
        if let Some(pattern) = self.excludes.iter().find(|p| p.is_match(url)) {
            log::debug!(
                "Url '{url}' is illegal because exclude pattern '{}' matched it",
                pattern.as_str()
            );
            return false;
        }
        true
    }

    /// The URL to index a document under; seeds are never indexed
    #[must_use]
    pub fn map_document_url(&self, url: &str) -> Option<String> {
        if self.seeds.contains(url) {
            return None;
        }
        self.mappings.map(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node_json(json: &str) -> Specification {
        Specification::from_json(json).unwrap()
    }

    #[test]
    fn seeds_are_canonicalized_with_policies_from_anywhere_in_the_list() {
        let spec = node_json(
            r#"{"nodes":[
                {"type":"feed","url":"http://example.com/rss?b=1&a=2"},
                {"type":"urlspec","regexp":"","reorder":"yes"}
            ]}"#,
        );
        let filter = FilterSpec::from_specification(&spec, true).unwrap();
        assert!(filter.is_seed("http://example.com/rss?a=2&b=1"));
    }

    #[test]
    fn legality_and_mapping() {
        let filter = FilterSpec::builder()
            .seed("http://example.com/feed.xml")
            .map_rule(r"http://example\.com/(.*)", r#""http://mirror.example.com/", 1"#)
            .unwrap()
            .excludes("# comment\n\n/private/\n")
            .unwrap()
            .build();

        assert!(filter.is_legal_url("http://example.com/feed.xml"));
        assert!(filter.is_legal_url("http://example.com/a.html"));
        assert!(!filter.is_legal_url("http://example.com/private/a.html"));
        assert!(!filter.is_legal_url("http://other.com/a.html"));

        assert_eq!(filter.map_document_url("http://example.com/feed.xml"), None);
        assert_eq!(
            filter.map_document_url("http://example.com/a.html").as_deref(),
            Some("http://mirror.example.com/a.html")
        );
    }

    #[test]
    fn rescan_helpers_and_defaults() {
        let spec = node_json(
            r#"{"nodes":[
                {"type":"feedrescan","value":"60"},
                {"type":"minfeedrescan","value":"15"},
                {"type":"feedtimeout","value":"30"},
                {"type":"dechromedmode","mode":"content"},
                {"type":"access","token":"b"},
                {"type":"access","token":"a"}
            ]}"#,
        );
        let filter = FilterSpec::from_specification(&spec, false).unwrap();
        assert_eq!(filter.default_rescan_time(1_000), Some(3_601_000));
        assert_eq!(filter.minimum_rescan_time(0), Some(900_000));
        assert_eq!(filter.bad_feed_rescan_time(0), None);
        assert_eq!(filter.feed_timeout_ms(), 30_000);
        assert_eq!(filter.dechromed_mode(), DechromedMode::Content);
        assert_eq!(filter.chromed_mode(), ChromedMode::Use);
        assert_eq!(filter.acls(), vec!["a", "b"]);

        assert_eq!(FilterSpec::builder().build().feed_timeout_ms(), 60_000);
    }

    #[test]
    fn bad_numbers_and_regexes_are_errors() {
        let spec = node_json(r#"{"nodes":[{"type":"feedrescan","value":"soon"}]}"#);
        assert!(matches!(
            FilterSpec::from_specification(&spec, false),
            Err(FilterError::BadNumber(_))
        ));
        let spec = node_json(r#"{"nodes":[{"type":"exclude","value":"(unclosed"}]}"#);
        assert!(matches!(
            FilterSpec::from_specification(&spec, false),
            Err(FilterError::BadRegex { .. })
        ));
    }
}
