use std::time::Duration;
use url::Url;

/// URL the browser should visit for `target`.
///
/// Targets from a plain list are often bare hosts (`example.com:8443`);
/// those are visited over plain HTTP.
pub fn normalize_target(target: &str) -> String {
    let trimmed = target.trim();
    let lower = trimmed.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("http://{trimmed}")
    }
}

pub fn sanitize_filename(input: &str) -> String {
    input
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '&' | '=' | '#' | '%' => '_',
            c if c.is_control() || c.is_whitespace() => '_',
            c => c,
        })
        .collect::<String>()
        .trim_matches('_')
        .to_string()
}

/// File stem shared by the screenshot and the page source of one target.
pub fn artifact_stem(url: &str) -> String {
    let without_scheme = match Url::parse(url) {
        Ok(parsed) => {
            let rest = &url[parsed.scheme().len()..];
            format!("{}_{}", parsed.scheme(), rest.trim_start_matches("://"))
        }
        Err(_) => url.to_string(),
    };

    let stem = sanitize_filename(&without_scheme);
    if stem.is_empty() {
        "target".to_string()
    } else {
        stem
    }
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
