//! Redis-style glob matching for `KEYS`/`SCAN` patterns.
//!
//! Supports `*`, `?`, character classes (`[abc]`, `[^a]`, `[a-z]`) and
//! backslash escapes.

/// Whether `text` matches the glob `pattern`.
pub fn glob_match(pattern: &str, text: &str) -> bool {
    matches(pattern.as_bytes(), text.as_bytes())
}

fn matches(pattern: &[u8], text: &[u8]) -> bool {
    match pattern.first() {
        None => text.is_empty(),
        Some(b'*') => {
            let mut rest = pattern;
            while rest.first() == Some(&b'*') {
                rest = &rest[1..];
            }
            if rest.is_empty() {
                return true;
            }
            (0..=text.len()).any(|i| matches(rest, &text[i..]))
        }
        Some(b'?') => !text.is_empty() && matches(&pattern[1..], &text[1..]),
        Some(b'[') => match text.split_first() {
            Some((&c, text_rest)) => {
                let (hit, after) = match_class(&pattern[1..], c);
                hit && matches(after, text_rest)
            }
            None => false,
        },
        Some(b'\\') if pattern.len() > 1 => {
            text.first() == Some(&pattern[1]) && matches(&pattern[2..], &text[1..])
        }
        Some(&c) => text.first() == Some(&c) && matches(&pattern[1..], &text[1..]),
    }
}

/// Match `c` against a class body (the part after `[`).
///
/// Returns the match result and the pattern remaining after the closing
/// `]`. An unterminated class runs to the end of the pattern.
fn match_class(class: &[u8], c: u8) -> (bool, &[u8]) {
    let (negate, mut i) = match class.first() {
        Some(b'^') => (true, 1),
        _ => (false, 0),
    };
    let mut hit = false;

    while i < class.len() {
        match class[i] {
            b']' => return (hit != negate, &class[i + 1..]),
            b'\\' if i + 1 < class.len() => {
                hit |= class[i + 1] == c;
                i += 2;
            }
            start if i + 2 < class.len() && class[i + 1] == b'-' && class[i + 2] != b']' => {
                let end = class[i + 2];
                let (lo, hi) = if start <= end { (start, end) } else { (end, start) };
                hit |= (lo..=hi).contains(&c);
                i += 3;
            }
            literal => {
                hit |= literal == c;
                i += 1;
            }
        }
    }

    (hit != negate, &class[class.len()..])
}
