use crate::error::ShowcaseError;
use std::time::Duration;
use url::Url;

/// Parses `url` and requires an http(s) scheme with a host.
pub fn validate_url(url: &str) -> Result<Url, ShowcaseError> {
    let parsed =
        Url::parse(url).map_err(|e| ShowcaseError::InvalidTarget(format!("{url}: {e}")))?;

    match parsed.scheme() {
        "http" | "https" if parsed.host_str().is_some() => Ok(parsed),
        scheme => Err(ShowcaseError::InvalidTarget(format!(
            "{url}: unsupported scheme '{scheme}'"
        ))),
    }
}

/// Site keys are subdomains: 1-63 chars of `[a-z0-9-]`, no leading or
/// trailing hyphen.
pub fn validate_site_key(key: &str) -> Result<(), ShowcaseError> {
    let valid = !key.is_empty()
        && key.len() <= 63
        && !key.starts_with('-')
        && !key.ends_with('-')
        && key
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');

    if valid {
        Ok(())
    } else {
        Err(ShowcaseError::InvalidTarget(format!("invalid site key '{key}'")))
    }
}

/// Reads width and height from an encoded image without decoding pixels.
pub fn probe_dimensions(data: &[u8]) -> Option<(u32, u32)> {
    image::io::Reader::new(std::io::Cursor::new(data))
        .with_guessed_format()
        .ok()?
        .into_dimensions()
        .ok()
}

pub fn sanitize_filename(input: &str) -> String {
    input
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect::<String>()
        .trim()
        .to_string()
}

pub fn format_duration(duration: Duration) -> String {
    let total_seconds = duration.as_secs();
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    let millis = duration.subsec_millis();

    if hours > 0 {
        format!("{hours}h {minutes}m {seconds}s")
    } else if minutes > 0 {
        format!("{minutes}m {seconds}s")
    } else if seconds > 0 {
        format!("{}.{}s", seconds, millis / 100)
    } else {
        format!("{millis}ms")
    }
}

pub fn format_bytes(bytes: usize) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[unit_index])
    } else {
        format!("{:.2} {}", size, UNITS[unit_index])
    }
}
