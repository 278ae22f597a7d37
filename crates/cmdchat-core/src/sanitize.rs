//! Normalization rules applied at the server boundary, plus two log-safety
//! helpers carried over from the original implementation that are not named
//! by the wire contract but are required anywhere untrusted text reaches a
//! log line.

const NAME_MAX: usize = 32;
const ROOM_MAX: usize = 32;
const MESSAGE_MAX: usize = 1024;
const FILENAME_MAX: usize = 256;
const BUFFER_SIZE_MIN: i64 = 10;
const BUFFER_SIZE_MAX: i64 = 1000;
const BUFFER_SIZE_DEFAULT: i64 = 200;
const LOG_DATA_MAX: usize = 64;

/// `trim; strip characters outside [A-Za-z0-9 _-]; truncate to 32; empty -> "anonymous"`.
pub fn sanitize_name(input: &str) -> String {
    let filtered: String = input
        .trim()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == ' ' || *c == '-' || *c == '_')
        .collect();
    let trimmed = filtered.trim();
    if trimmed.is_empty() {
        "anonymous".to_string()
    } else {
        truncate_chars(trimmed, NAME_MAX)
    }
}

/// `trim; lowercase; truncate to 32; empty -> "lobby"`. Unlike names, rooms
/// are not character-filtered.
pub fn sanitize_room(input: &str) -> String {
    let trimmed = input.trim().to_lowercase();
    if trimmed.is_empty() {
        "lobby".to_string()
    } else {
        truncate_chars(&trimmed, ROOM_MAX)
    }
}

/// `lowercase; default to "rich" unless in {rich, minimal, json}`.
pub fn sanitize_renderer(input: &str) -> String {
    let lower = input.to_lowercase();
    match lower.as_str() {
        "rich" | "minimal" | "json" => lower,
        _ => "rich".to_string(),
    }
}

/// Clamps to `[10, 1000]`; `None` or out-of-range defaults to 200.
pub fn sanitize_buffer_size(input: Option<i64>) -> i64 {
    match input {
        Some(n) if n < BUFFER_SIZE_MIN => BUFFER_SIZE_MIN,
        Some(n) if n > BUFFER_SIZE_MAX => BUFFER_SIZE_MAX,
        Some(n) => n,
        None => BUFFER_SIZE_DEFAULT,
    }
}

/// Truncates to 1024 Unicode scalar values, applied after UTF-8 decode.
pub fn sanitize_message(input: &str) -> String {
    truncate_chars(input, MESSAGE_MAX)
}

/// Truncates a filename to 256 Unicode scalar values. Path-separator
/// stripping and basename resolution happen on the receiving client, not
/// here — this is the server-side length bound only.
pub fn sanitize_filename(input: &str) -> String {
    truncate_chars(input, FILENAME_MAX)
}

/// Coerces arbitrary untrusted text into a safe-to-log string: empty becomes
/// `"<empty>"`; longer than 64 characters is truncated with a
/// `...<N chars total>` suffix.
pub fn sanitize_log_data(input: &str) -> String {
    if input.is_empty() {
        return "<empty>".to_string();
    }
    let total = input.chars().count();
    if total > LOG_DATA_MAX {
        format!("{}...<{} chars total>", truncate_chars(input, LOG_DATA_MAX), total)
    } else {
        input.to_string()
    }
}

/// Masks a handshake token for logging: absent -> `"None"`; len <= 8 -> `"***"`;
/// otherwise first 4 and last 4 characters with `***` in between.
pub fn sanitize_token(token: Option<&str>) -> String {
    match token {
        None => "None".to_string(),
        Some(t) if t.is_empty() => String::new(),
        Some(t) if t.chars().count() <= 8 => "***".to_string(),
        Some(t) => {
            let chars: Vec<char> = t.chars().collect();
            let first4: String = chars[..4].iter().collect();
            let last4: String = chars[chars.len() - 4..].iter().collect();
            format!("{first4}***{last4}")
        }
    }
}

fn truncate_chars(input: &str, max: usize) -> String {
    input.chars().take(max).collect()
}
