//! Content-Type handling for fetched documents

/// Content types that mark a fetched document as a feed
const XML_CONTENT_TYPES: &[&str] = &[
    "text/xml",
    "application/rss+xml",
    "application/xml",
    "application/atom+xml",
    "application/xhtml+xml",
    "text/XML",
    "application/rdf+xml",
    "text/application",
    "XML",
];

/// The effective content type: the last of several comma-separated values.
#[must_use]
pub fn effective_content_type(header: Option<&str>) -> Option<String> {
    header
        .and_then(|value| value.split(',').next_back())
        .map(|value| value.trim().to_string())
}

/// `content_type` without its `;` parameters
#[must_use]
pub fn strip_parameters(content_type: &str) -> &str {
    match content_type.find(';') {
        Some(pos) => content_type[..pos].trim(),
        None => content_type,
    }
}

#[must_use]
pub fn is_xml_content_type(content_type: Option<&str>) -> bool {
    content_type.is_some_and(|value| XML_CONTENT_TYPES.contains(&strip_parameters(value)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_value_wins_and_parameters_are_ignored() {
        let effective = effective_content_type(Some("text/html, application/rss+xml; charset=utf-8"));
        assert_eq!(effective.as_deref(), Some("application/rss+xml; charset=utf-8"));
        assert!(is_xml_content_type(effective.as_deref()));
    }

    #[test]
    fn html_and_missing_types_are_not_feeds() {
        assert!(!is_xml_content_type(Some("text/html")));
        assert!(!is_xml_content_type(None));
        assert!(!is_xml_content_type(Some("TEXT/XML")));
        assert!(is_xml_content_type(Some("text/XML")));
    }
}
