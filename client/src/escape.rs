//! SQL string escaping (spec.md §6 "Escape"). No teacher/pack analogue
//! (the binlog client never builds SQL text); implemented directly from
//! spec.md's description of the two escaping modes MySQL negotiates.

/// Escapes `s` for embedding inside a single-quoted SQL string literal.
///
/// When `no_backslash_escapes` is set (server status flag
/// `NO_BACKSLASH_ESCAPES`), only `'`, `"`, and `` ` `` are doubled.
/// Otherwise the standard MySQL backslash escapes apply: NUL, `\n`,
/// `\r`, `\`, `'`, `"`, and Ctrl-Z (0x1a) are each backslash-escaped.
pub fn escape_string(s: &str, no_backslash_escapes: bool) -> String {
    let mut out = String::with_capacity(s.len());
    if no_backslash_escapes {
        for c in s.chars() {
            match c {
                '\'' | '"' | '`' => {
                    out.push(c);
                    out.push(c);
                }
                _ => out.push(c),
            }
        }
    } else {
        for c in s.chars() {
            match c {
                '\0' => out.push_str("\\0"),
                '\n' => out.push_str("\\n"),
                '\r' => out.push_str("\\r"),
                '\\' => out.push_str("\\\\"),
                '\'' => out.push_str("\\'"),
                '"' => out.push_str("\\\""),
                '\u{1a}' => out.push_str("\\Z"),
                _ => out.push(c),
            }
        }
    }
    out
}
