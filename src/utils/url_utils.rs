//! URL canonicalization for document identifiers.
//!
//! Every link discovered in a feed, and every seed, is turned into a
//! canonical identifier here so that equivalent URLs collapse to one
//! document. Rejection is never an error for the caller: an unusable URL
//! simply yields `None` and a debug log line.

use regex::Regex;
use std::collections::BTreeMap;
use url::Url;

/// Session-stripping and argument-ordering rules for URLs whose raw text
/// matches `pattern` (regex `find` semantics).
#[derive(Debug, Clone)]
pub struct CanonicalizationPolicy {
    pattern: Regex,
    pub reorder: bool,
    pub remove_java_session: bool,
    pub remove_asp_session: bool,
    pub remove_php_session: bool,
    pub remove_bv_session: bool,
}

impl CanonicalizationPolicy {
    /// Create a policy for URLs matching `pattern`
    ///
    /// # Errors
    /// Returns an error if `pattern` is not a valid regular expression.
    pub fn new(
        pattern: &str,
        reorder: bool,
        remove_java_session: bool,
        remove_asp_session: bool,
        remove_php_session: bool,
        remove_bv_session: bool,
    ) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
            reorder,
            remove_java_session,
            remove_asp_session,
            remove_php_session,
            remove_bv_session,
        })
    }

    /// The rules applied when no configured policy matches: strip all four
    /// session schemes, keep argument order.
    #[must_use]
    pub fn fallback() -> SessionRules {
        SessionRules {
            reorder: false,
            remove_java_session: true,
            remove_asp_session: true,
            remove_php_session: true,
            remove_bv_session: true,
        }
    }

    #[must_use]
    pub fn matches(&self, raw_url: &str) -> bool {
        self.pattern.is_match(raw_url)
    }

    #[must_use]
    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    fn rules(&self) -> SessionRules {
        SessionRules {
            reorder: self.reorder,
            remove_java_session: self.remove_java_session,
            remove_asp_session: self.remove_asp_session,
            remove_php_session: self.remove_php_session,
            remove_bv_session: self.remove_bv_session,
        }
    }
}

/// The effective flags used for one canonicalization pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionRules {
    pub reorder: bool,
    pub remove_java_session: bool,
    pub remove_asp_session: bool,
    pub remove_php_session: bool,
    pub remove_bv_session: bool,
}

/// Ordered, first-match-wins list of canonicalization policies.
#[derive(Debug, Clone, Default)]
pub struct CanonicalizationPolicies {
    rules: Vec<CanonicalizationPolicy>,
}

impl CanonicalizationPolicies {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_rule(&mut self, rule: CanonicalizationPolicy) {
        self.rules.push(rule);
    }

    #[must_use]
    pub fn find_match(&self, raw_url: &str) -> Option<&CanonicalizationPolicy> {
        self.rules.iter().find(|rule| rule.matches(raw_url))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Turn a raw, possibly relative URL into a canonical document identifier.
///
/// # Arguments
/// * `policies` - Canonicalization policies; the first whose regex is found
///   in `raw_url` applies, otherwise [`CanonicalizationPolicy::fallback`]
/// * `parent` - Identifier of the document the link was found in, if any
/// * `raw_url` - The link text as found
///
/// # Returns
/// The canonical `scheme://host[:port]path[?query]` string, or `None` when
/// the URL is unusable (bad syntax, no host, scheme other than http/https,
/// non-ASCII after reassembly).
#[must_use]
pub fn canonicalize(
    policies: &CanonicalizationPolicies,
    parent: Option<&str>,
    raw_url: &str,
) -> Option<String> {
    let rules = policies
        .find_match(raw_url)
        .map_or_else(CanonicalizationPolicy::fallback, CanonicalizationPolicy::rules);

    let cleaned: String = raw_url
        .chars()
        .filter(|c| (' '..'\u{80}').contains(c))
        .collect();

    let parsed = match parent {
        Some(parent) => Url::parse(parent).and_then(|base| base.join(&cleaned)),
        None => Url::parse(&cleaned),
    };
    let url = match parsed {
        Ok(url) => url,
        Err(e) => {
            log::debug!("Can't use url '{cleaned}' because it is badly formed: {e}");
            return None;
        }
    };

    let Some(host) = url.host_str() else {
        log::debug!("Can't use url '{cleaned}' because it has no protocol or host");
        return None;
    };
    if !matches!(url.scheme(), "http" | "https") {
        log::debug!(
            "Can't use url '{cleaned}' because it has an unsupported protocol '{}'",
            url.scheme()
        );
        return None;
    }

    let query = url.query().map(|q| canonical_query(q, rules));
    let path = canonical_path(url.path(), rules);

    let mut id = format!("{}://{host}", url.scheme());
    if let Some(port) = url.port() {
        id.push(':');
        id.push_str(&port.to_string());
    }
    id.push_str(path);
    if let Some(query) = query.filter(|q| !q.is_empty()) {
        id.push('?');
        id.push_str(&query);
    }

    if id.chars().any(|c| !(' '..'\u{80}').contains(&c)) {
        log::debug!("Can't use url '{cleaned}' because it has illegal characters in it");
        return None;
    }
    Some(id)
}

fn is_session_argument(key: &str, rules: SessionRules) -> bool {
    (rules.remove_php_session && key == "PHPSESSID")
        || (rules.remove_bv_session && key.contains("BVSession@@@@"))
}

fn argument_key(argument: &str) -> &str {
    argument.split_once('=').map_or(argument, |(key, _)| key)
}

/// Rewrite a raw query: drop session arguments and, when allowed, group
/// arguments by key in sorted key order (same-key order preserved).
fn canonical_query(query: &str, rules: SessionRules) -> String {
    let query = query.strip_suffix('&').unwrap_or(query);
    let kept = query
        .split('&')
        .filter(|argument| !is_session_argument(argument_key(argument), rules));

    if rules.reorder {
        let mut grouped: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for argument in kept {
            grouped.entry(argument_key(argument)).or_default().push(argument);
        }
        grouped.into_values().flatten().collect::<Vec<_>>().join("&")
    } else {
        kept.collect::<Vec<_>>().join("&")
    }
}

fn canonical_path(path: &str, rules: SessionRules) -> &str {
    let mut path = path;
    if rules.remove_java_session {
        if let Some(index) = path.find(";jsessionid=") {
            path = &path[..index];
        }
    }
    if rules.remove_asp_session && path.starts_with("/s(") {
        if let Some(index) = path.find(')') {
            path = &path[index + 1..];
        }
    }
    path
}
