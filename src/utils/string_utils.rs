//! Small string helpers shared by the version-string encoder and the
//! robots parser.

/// Append `value` to `out`, escaping `\` and the delimiter, then terminate it
/// with the delimiter.
///
/// # Arguments
/// * `out` - Buffer receiving the packed value
/// * `value` - Raw value
/// * `delimiter` - Terminator character (`+` for version strings)
pub fn pack(out: &mut String, value: &str, delimiter: char) {
    for ch in value.chars() {
        if ch == '\\' || ch == delimiter {
            out.push('\\');
        }
        out.push(ch);
    }
    out.push(delimiter);
}

/// Append a counted list: the element count is packed first, then each value.
pub fn pack_list<S: AsRef<str>>(out: &mut String, values: &[S], delimiter: char) {
    pack(out, &values.len().to_string(), delimiter);
    for value in values {
        pack(out, value.as_ref(), delimiter);
    }
}

/// Read one packed value starting at `start` (a char index into `input`).
///
/// Returns the unescaped value and the index just past its terminator.
#[must_use]
pub fn unpack(input: &str, start: usize, delimiter: char) -> (String, usize) {
    let mut value = String::new();
    let mut chars = input.chars().enumerate().skip(start);
    let mut next = input.chars().count();
    while let Some((index, ch)) = chars.next() {
        if ch == '\\' {
            if let Some((_, escaped)) = chars.next() {
                value.push(escaped);
            }
            continue;
        }
        if ch == delimiter {
            next = index + 1;
            break;
        }
        value.push(ch);
    }
    (value, next)
}

/// Render control characters as `^X` so anomalous input can be logged safely.
#[must_use]
pub fn make_readable(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        let code = ch as u32;
        if code < 32 {
            out.push('^');
            out.push(char::from_u32(code + 64).unwrap_or('?'));
        } else {
            out.push(ch);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pack_escapes_delimiter_and_backslash() {
        let mut out = String::new();
        pack(&mut out, r"a+b\c", '+');
        assert_eq!(out, r"a\+b\\c+");
    }

    #[test]
    fn pack_list_prefixes_count() {
        let mut out = String::new();
        pack_list(&mut out, &["x", "y"], '+');
        assert_eq!(out, "2+x+y+");

        let mut empty = String::new();
        pack_list::<&str>(&mut empty, &[], '+');
        assert_eq!(empty, "0+");
    }

    #[test]
    fn unpack_reverses_pack() {
        let mut out = String::from("-");
        pack(&mut out, "\"etag+1\"", '+');
        pack(&mut out, "", '+');
        let (etag, pos) = unpack(&out, 1, '+');
        assert_eq!(etag, "\"etag+1\"");
        let (modified, _) = unpack(&out, pos, '+');
        assert_eq!(modified, "");
    }

    #[test]
    fn control_characters_are_caret_escaped() {
        assert_eq!(make_readable("a\tb\u{1}"), "a^Ib^A");
    }
}
