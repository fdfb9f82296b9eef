//! Sanitizing text that ends up in logs and file names.

const MAX_SEGMENT_CHARS: usize = 60;

/// Removes control characters from a message before it is logged or shown.
///
/// Newline, tab and carriage return survive, as does all non-ASCII text.
pub fn sanitize_error_message(message: &str) -> String {
    message
        .chars()
        .filter(|c| {
            let code = *c as u32;
            code >= 0x20 || code == 0x09 || code == 0x0A || code == 0x0D
        })
        .filter(|c| *c != '\u{7f}')
        .collect()
}

/// Turns arbitrary text (an author handle, a post id) into a safe file-name
/// segment: lowercase ASCII alphanumerics, `-` and `_`, at most 60 chars.
///
/// Returns `"unknown"` when nothing usable is left.
pub fn sanitize_path_segment(input: &str) -> String {
    let mut out = String::with_capacity(input.len().min(MAX_SEGMENT_CHARS));
    let mut last_dash = false;
    for c in input.trim().trim_start_matches('@').chars() {
        if out.len() >= MAX_SEGMENT_CHARS {
            break;
        }
        if c.is_ascii_alphanumeric() || c == '_' {
            out.push(c.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash && !out.is_empty() {
            out.push('-');
            last_dash = true;
        }
    }
    let trimmed = out.trim_end_matches('-');
    if trimmed.is_empty() {
        "unknown".to_string()
    } else {
        trimmed.to_string()
    }
}
