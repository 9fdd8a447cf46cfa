//! Duration rendering.

/// Render seconds as `1d 2h 3m 4s 500 µs`, skipping zero components.
///
/// Zero renders as `0s`. Sub-second precision is truncated to whole
/// microseconds.
pub fn format_seconds(seconds: f64) -> String {
    if !seconds.is_finite() || seconds <= 0.0 {
        return "0s".to_string();
    }

    let whole = seconds.trunc() as u64;
    let micros = ((seconds - seconds.trunc()) * 1_000_000.0) as u64;

    let days = whole / 86_400;
    let hours = whole % 86_400 / 3_600;
    let minutes = whole % 3_600 / 60;
    let secs = whole % 60;

    let mut parts = Vec::new();
    if days > 0 {
        parts.push(format!("{days}d"));
    }
    if hours > 0 {
        parts.push(format!("{hours}h"));
    }
    if minutes > 0 {
        parts.push(format!("{minutes}m"));
    }
    if secs > 0 {
        parts.push(format!("{secs}s"));
    }
    if micros > 0 {
        parts.push(format!("{micros} µs"));
    }

    if parts.is_empty() {
        "0s".to_string()
    } else {
        parts.join(" ")
    }
}
