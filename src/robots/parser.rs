//! robots.txt parsing

use super::matcher::does_path_match;
use crate::utils::make_readable;

/// One `User-agent` group and its rules
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RobotsRecord {
    pub agents: Vec<String>,
    pub disallows: Vec<String>,
    pub allows: Vec<String>,
}

impl RobotsRecord {
    /// Record denying everything to every agent
    #[must_use]
    pub fn deny_all() -> Self {
        Self {
            agents: vec!["*".to_string()],
            disallows: vec!["/".to_string()],
            allows: Vec::new(),
        }
    }

    /// Substring match of an agent token inside `user_agent_upper`, or an
    /// exact match when `exact`
    #[must_use]
    pub fn is_agent_match(&self, user_agent_upper: &str, exact: bool) -> bool {
        self.agents.iter().any(|agent| {
            let agent = agent.to_uppercase();
            if exact {
                agent.trim() == user_agent_upper
            } else {
                user_agent_upper.contains(&agent)
            }
        })
    }

    #[must_use]
    pub fn is_disallowed(&self, path: &str) -> bool {
        self.disallows.iter().any(|spec| does_path_match(path, spec))
    }

    #[must_use]
    pub fn is_allowed(&self, path: &str) -> bool {
        self.allows.iter().any(|spec| does_path_match(path, spec))
    }
}

/// How a robots.txt parse went, as reported in the `robots parse` activity
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseOutcome {
    Success,
    /// Accepted, with the last problem seen
    Errors(String),
    /// The body looked like HTML and was discarded
    Html,
}

impl ParseOutcome {
    #[must_use]
    pub fn result_code(&self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::Errors(_) => "ERRORS",
            Self::Html => "HTML",
        }
    }

    #[must_use]
    pub fn description(&self) -> Option<String> {
        match self {
            Self::Success => None,
            Self::Errors(description) => Some(description.clone()),
            Self::Html => Some("Robots file contained HTML, skipped".to_string()),
        }
    }
}

/// Parsed robots.txt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRobots {
    /// `None` when the file is to be treated as absent
    pub records: Option<Vec<RobotsRecord>>,
    pub outcome: ParseOutcome,
}

/// Strip a directive keyword (already known to prefix the lower-cased line)
/// and an optional colon, returning the trimmed original-case value.
fn directive_value<'a>(line: &'a str, keyword: &str) -> &'a str {
    let rest = line.get(keyword.len()..).unwrap_or("");
    rest.strip_prefix(':').unwrap_or(rest).trim()
}

/// Parse a robots.txt body.
///
/// # Arguments
/// * `body` - File contents
/// * `host` - Server name, for log messages
#[must_use]
pub fn parse_robots_txt(body: &str, host: &str) -> ParsedRobots {
    let mut records = Vec::new();
    let mut record: Option<RobotsRecord> = None;
    let mut seen_action = false;
    let mut problem: Option<String> = None;

    for raw in body.lines() {
        let line = raw.split('#').next().unwrap_or("").trim();
        let lower = line.to_lowercase();

        if lower.starts_with("user-agent") {
            if seen_action {
                records.extend(record.take());
                seen_action = false;
            }
            record
                .get_or_insert_with(RobotsRecord::default)
                .agents
                .push(directive_value(line, "user-agent").to_string());
        } else if lower.starts_with("disallow") || lower.starts_with("allow") {
            let is_allow = lower.starts_with("allow");
            let Some(current) = record.as_mut() else {
                let description = if is_allow {
                    "Allow without User-agent"
                } else {
                    "Disallow without User-agent"
                };
                log::warn!("Bad robots.txt file format from '{host}': {description}");
                problem = Some(description.to_string());
                continue;
            };
            let keyword = if is_allow { "allow" } else { "disallow" };
            let path = directive_value(line, keyword);
            // A blank path lets everything through.
            if !path.is_empty() {
                if is_allow {
                    current.allows.push(path.to_string());
                } else {
                    current.disallows.push(path.to_string());
                }
            }
            seen_action = true;
        } else if lower.starts_with("crawl-delay") || lower.starts_with("sitemap") {
            // Recognised, not acted on.
        } else if !line.is_empty() {
            let readable = make_readable(raw.split('#').next().unwrap_or(""));
            log::warn!("Unknown robots.txt line from '{host}': '{readable}'");
            if lower.contains("<html") {
                return ParsedRobots {
                    records: None,
                    outcome: ParseOutcome::Html,
                };
            }
            problem = Some(format!("Unknown robots.txt line: '{readable}'"));
        }
    }
    records.extend(record);

    ParsedRobots {
        records: Some(records),
        outcome: match problem {
            Some(description) => ParseOutcome::Errors(description),
            None => ParseOutcome::Success,
        },
    }
}

/// Decide whether `user_agent` may fetch `path` under `records`.
///
/// The first record naming the agent applies, else the first `*` record,
/// else nothing is restricted. Within the record an allow beats a disallow.
#[must_use]
pub fn is_path_allowed(records: &[RobotsRecord], user_agent: &str, path: &str) -> bool {
    let user_agent_upper = user_agent.to_uppercase();
    let record = records
        .iter()
        .find(|record| record.is_agent_match(&user_agent_upper, false))
        .or_else(|| records.iter().find(|record| record.is_agent_match("*", true)));

    match record {
        None => true,
        Some(record) => record.is_allowed(path) || !record.is_disallowed(path),
    }
}
