//! Human-readable formatting for download rates and remaining time
//!
//! The progress template hands us raw numbers (bytes per second, seconds
//! remaining); these helpers render them the way the UI expects. Unknown
//! values render as "N/A".

/// Formats a byte count with binary units, e.g. `1536` -> `"1.5KB"`.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[(&str, u64)] = &[
        ("B", 1),
        ("KB", 1024),
        ("MB", 1024 * 1024),
        ("GB", 1024 * 1024 * 1024),
        ("TB", 1024 * 1024 * 1024 * 1024),
    ];

    for (i, &(unit, divisor)) in UNITS.iter().enumerate().rev() {
        if bytes >= divisor {
            let value = bytes / divisor;
            let remainder = bytes % divisor;

            if remainder == 0 || i == 0 {
                return format!("{}{}", value, unit);
            }
            let decimal = remainder * 10 / divisor;
            if decimal > 0 {
                return format!("{}.{}{}", value, decimal, unit);
            }
            return format!("{}{}", value, unit);
        }
    }

    format!("{}B", bytes)
}

/// Formats a download rate, e.g. `1258291.2` -> `"1.2MB/s"`.
pub fn format_rate(bytes_per_sec: Option<f64>) -> String {
    match bytes_per_sec {
        Some(rate) if rate.is_finite() && rate >= 0.0 => {
            format!("{}/s", format_bytes(rate as u64))
        }
        _ => "N/A".to_string(),
    }
}

/// Formats remaining seconds as `MM:SS`, or `H:MM:SS` past the hour mark.
pub fn format_eta(seconds: Option<u64>) -> String {
    match seconds {
        Some(secs) => {
            let hours = secs / 3600;
            let minutes = (secs % 3600) / 60;
            let seconds = secs % 60;
            if hours > 0 {
                format!("{}:{:02}:{:02}", hours, minutes, seconds)
            } else {
                format!("{:02}:{:02}", minutes, seconds)
            }
        }
        None => "N/A".to_string(),
    }
}
