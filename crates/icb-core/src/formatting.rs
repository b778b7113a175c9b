use crate::domain::User;

/// Expand a command reply template.
///
/// Placeholders (matched ignoring ASCII case):
/// - `%arg0%` .. `%argN-1%` for the positional arguments
/// - `%username%` and `%firstname%`, both filled with the sender's username
///
/// Zero-arity templates are returned untouched, sender placeholders included.
pub fn format_response<S: AsRef<str>>(
    template: &str,
    arg_count: usize,
    args: &[S],
    sender: &User,
) -> String {
    if arg_count == 0 {
        return template.to_string();
    }

    let mut out = template.to_string();
    for (i, arg) in args.iter().take(arg_count).enumerate() {
        out = replace_ignore_ascii_case(&out, &format!("%arg{i}%"), arg.as_ref());
    }

    // %firstname% resolves to the username as well.
    out = replace_ignore_ascii_case(&out, "%username%", &sender.username);
    out = replace_ignore_ascii_case(&out, "%firstname%", &sender.username);

    out
}

/// Replace every occurrence of the ASCII `needle`, comparing case-insensitively.
pub fn replace_ignore_ascii_case(haystack: &str, needle: &str, replacement: &str) -> String {
    if needle.is_empty() {
        return haystack.to_string();
    }

    let bytes = haystack.as_bytes();
    let pattern = needle.as_bytes();
    let mut out = String::with_capacity(haystack.len());
    let mut copied = 0usize;
    let mut i = 0usize;

    while i + pattern.len() <= bytes.len() {
        if bytes[i..i + pattern.len()].eq_ignore_ascii_case(pattern) {
            out.push_str(&haystack[copied..i]);
            out.push_str(replacement);
            i += pattern.len();
            copied = i;
        } else {
            i += 1;
        }
    }
    out.push_str(&haystack[copied..]);
    out
}
