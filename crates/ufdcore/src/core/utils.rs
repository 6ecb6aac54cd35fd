/// Escapes characters that are unsafe in a download filename.
///
/// Path separators, Windows-reserved characters and control characters become `_`,
/// double quotes become single quotes (the name ends up in a Content-Disposition header).
/// Leading/trailing whitespace and dots are trimmed; an empty result becomes "unnamed".
pub fn escape_filename(filename: &str) -> String {
    let mut result = String::with_capacity(filename.len());

    for c in filename.chars() {
        match c {
            '/' | '\\' => result.push('_'),
            ':' | '*' | '?' | '<' | '>' | '|' => result.push('_'),
            '"' => result.push('\''),
            c if c.is_control() => result.push('_'),
            _ => result.push(c),
        }
    }

    let result = result.trim_matches(|c: char| c.is_whitespace() || c == '.');

    if result.is_empty() {
        "unnamed".to_string()
    } else {
        result.to_string()
    }
}

/// Returns at most `max_bytes` of `text`, cut on a char boundary.
pub fn truncate_for_log(text: &str, max_bytes: usize) -> &str {
    if text.len() <= max_bytes {
        return text;
    }
    let mut end = max_bytes;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

/// Formats a byte count as whole mebibytes, e.g. `12MB`.
pub fn format_size_mb(bytes: u64) -> String {
    format!("{}MB", bytes / (1024 * 1024))
}
