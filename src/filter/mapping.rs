//! URL mapping rules
//!
//! A rule pairs a regex, which must match the whole URL, with an output
//! expression. Expressions are a comma-separated sequence of quoted text
//! (`"..."`, `\` escapes the next character) and group references `N`,
//! optionally styled `Nu` (upper), `Nl` (lower) or `Nm` (first letter
//! upper, rest lower). An empty expression maps a URL to itself.

use regex::{Captures, Regex};

use super::errors::{FilterError, FilterResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GroupStyle {
    AsIs,
    Lower,
    Upper,
    Mixed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Text(String),
    Group(usize, GroupStyle),
}

fn tokenize(expression: &str) -> FilterResult<Vec<Token>> {
    let chars: Vec<char> = expression.chars().collect();
    let mut tokens = Vec::new();
    let mut pos = 0;

    loop {
        while pos < chars.len() && chars[pos] <= ' ' {
            pos += 1;
        }
        let Some(&first) = chars.get(pos) else {
            return Ok(tokens);
        };

        if first == '"' {
            pos += 1;
            let mut text = String::new();
            while let Some(&c) = chars.get(pos) {
                pos += 1;
                match c {
                    '"' => break,
                    '\\' => match chars.get(pos) {
                        Some(&escaped) => {
                            pos += 1;
                            text.push(escaped);
                        }
                        None => break,
                    },
                    _ => text.push(c),
                }
            }
            tokens.push(Token::Text(text));
            continue;
        }

        if first == ',' {
            pos += 1;
            continue;
        }

        let digits_start = pos;
        while chars.get(pos).is_some_and(char::is_ascii_digit) {
            pos += 1;
        }
        let digits: String = chars[digits_start..pos].iter().collect();
        let group = if digits.is_empty() {
            0
        } else {
            digits
                .parse()
                .map_err(|_| FilterError::BadNumber(digits.clone()))?
        };

        let modifier_start = pos;
        while chars
            .get(pos)
            .is_some_and(|&c| c != ',' && !c.is_ascii_digit() && c > ' ')
        {
            pos += 1;
        }
        let modifier: String = chars[modifier_start..pos].iter().collect();
        let style = if modifier.is_empty() {
            GroupStyle::AsIs
        } else if modifier.starts_with('u') {
            GroupStyle::Upper
        } else if modifier.starts_with('l') {
            GroupStyle::Lower
        } else if modifier.starts_with('m') {
            GroupStyle::Mixed
        } else {
            return Err(FilterError::UnknownStyle(modifier));
        };
        tokens.push(Token::Group(group, style));
    }
}

/// One regex → expression rule
#[derive(Debug, Clone)]
pub struct MappingRule {
    pattern: Regex,
    tokens: Vec<Token>,
}

impl MappingRule {
    /// # Errors
    /// Returns an error if `pattern` does not compile, the expression uses
    /// an unknown style, or it refers to a group `pattern` does not have.
    pub fn new(pattern: &str, expression: &str) -> FilterResult<Self> {
        let compiled = Regex::new(&format!("^(?:{pattern})$")).map_err(|source| {
            FilterError::BadRegex {
                pattern: pattern.to_string(),
                source,
            }
        })?;
        let tokens = tokenize(expression)?;
        for token in &tokens {
            if let Token::Group(group, _) = token {
                if *group >= compiled.captures_len() {
                    return Err(FilterError::MissingGroup(*group));
                }
            }
        }
        Ok(Self {
            pattern: compiled,
            tokens,
        })
    }

    #[must_use]
    pub fn is_match(&self, url: &str) -> bool {
        self.pattern.is_match(url)
    }

    /// Apply the rule, or `None` if the URL does not match it
    #[must_use]
    pub fn map(&self, url: &str) -> Option<String> {
        let captures = self.pattern.captures(url)?;
        if self.tokens.is_empty() {
            return Some(url.to_string());
        }
        let mut out = String::new();
        for token in &self.tokens {
            match token {
                Token::Text(text) => out.push_str(text),
                Token::Group(group, style) => append_group(&mut out, &captures, *group, *style),
            }
        }
        Some(out)
    }
}

fn append_group(out: &mut String, captures: &Captures<'_>, group: usize, style: GroupStyle) {
    let value = captures.get(group).map_or("", |m| m.as_str());
    match style {
        GroupStyle::AsIs => out.push_str(value),
        GroupStyle::Lower => out.push_str(&value.to_lowercase()),
        GroupStyle::Upper => out.push_str(&value.to_uppercase()),
        GroupStyle::Mixed => {
            let mut chars = value.chars();
            if let Some(first) = chars.next() {
                out.extend(first.to_uppercase());
                out.push_str(&chars.as_str().to_lowercase());
            }
        }
    }
}

/// First-match-wins rule list; no rules accepts every URL unchanged
#[derive(Debug, Clone, Default)]
pub struct MappingRules {
    rules: Vec<MappingRule>,
}

impl MappingRules {
    pub fn add(&mut self, rule: MappingRule) {
        self.rules.push(rule);
    }

    #[must_use]
    pub fn is_match(&self, url: &str) -> bool {
        self.rules.is_empty() || self.rules.iter().any(|rule| rule.is_match(url))
    }

    #[must_use]
    pub fn map(&self, url: &str) -> Option<String> {
        if self.rules.is_empty() {
            return Some(url.to_string());
        }
        self.rules.iter().find_map(|rule| rule.map(url))
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
