//! robots.txt path patterns
//!
//! Literal prefix matching, extended with `*` (any run of characters) and a
//! trailing `$` (end of path).

/// Whether `path` is matched by the robots pattern `spec`
#[must_use]
pub fn does_path_match(path: &str, spec: &str) -> bool {
    match_from(path.as_bytes(), 0, spec.as_bytes(), 0)
}

fn match_from(path: &[u8], mut path_index: usize, spec: &[u8], mut spec_index: usize) -> bool {
    loop {
        let Some(&spec_char) = spec.get(spec_index) else {
            return true;
        };
        spec_index += 1;

        if spec_char == b'*' {
            // A run of stars is one star; otherwise each extra one multiplies the work.
            while spec.get(spec_index) == Some(&b'*') {
                spec_index += 1;
            }
            loop {
                if match_from(path, path_index, spec, spec_index) {
                    return true;
                }
                if path_index == path.len() {
                    return false;
                }
                path_index += 1;
            }
        }

        if spec_char == b'$' && spec_index == spec.len() {
            return path_index == path.len();
        }

        match path.get(path_index) {
            Some(&c) if c == spec_char => path_index += 1,
            _ => return false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_prefix() {
        assert!(does_path_match("/private/data", "/private"));
        assert!(!does_path_match("/public", "/private"));
        assert!(does_path_match("/anything", ""));
    }

    #[test]
    fn wildcards_and_anchor() {
        assert!(does_path_match("/foo/bar", "/foo/*"));
        assert!(does_path_match("/foo", "/foo$"));
        assert!(!does_path_match("/foobar", "/foo$"));
        assert!(does_path_match("/a/b/c.php", "/*.php$"));
        assert!(!does_path_match("/a/b/c.php?x=1", "/*.php$"));
        assert!(does_path_match("/x$y", "/x$y"));
    }
}
