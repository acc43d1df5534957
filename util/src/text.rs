/// "1 file", "2 files".
pub fn pluralize(count: usize, entity: &str) -> String {
    if count == 1 {
        format!("{count} {entity}")
    } else {
        format!("{count} {entity}s")
    }
}

/// Last `max_chars` characters of `text`, prefixed with a marker if anything was cut.
pub fn tail(text: &str, max_chars: usize) -> String {
    let count = text.chars().count();
    if count <= max_chars {
        return text.to_owned();
    }
    let skip = count - max_chars;
    let mut out = String::with_capacity(max_chars + 24);
    out.push_str("[... truncated ...]\n");
    out.extend(text.chars().skip(skip));
    out
}
