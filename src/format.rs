pub const DEFAULT_TRUNCATE: usize = 200;

const MINUTE: f64 = 60.0;
const HOUR: f64 = 3_600.0;
const DAY: f64 = 86_400.0;
const MONTH: f64 = 2_592_000.0;
const YEAR: f64 = 31_536_000.0;

/// Compact count used for scores, karma and member counts. One decimal,
/// ties rounded up.
pub fn format_number(value: i64) -> String {
    if value >= 1_000_000 {
        compact(value, 1_000_000, 'M')
    } else if value >= 1_000 {
        compact(value, 1_000, 'K')
    } else {
        value.to_string()
    }
}

fn compact(value: i64, unit: i64, suffix: char) -> String {
    let step = unit / 10;
    let tenths = (value + step / 2) / step;
    format!("{}.{}{}", tenths / 10, tenths % 10, suffix)
}

/// Age of `timestamp` (Unix seconds) relative to `now`.
pub fn format_relative_time(timestamp: f64, now: i64) -> String {
    let diff = now as f64 - timestamp;
    if diff < MINUTE {
        return "just now".to_string();
    }
    if diff < HOUR {
        return format!("{}m ago", (diff / MINUTE).floor() as i64);
    }
    if diff < DAY {
        return format!("{}h ago", (diff / HOUR).floor() as i64);
    }
    if diff < MONTH {
        return format!("{}d ago", (diff / DAY).floor() as i64);
    }
    if diff < YEAR {
        return format!("{}mo ago", (diff / MONTH).floor() as i64);
    }
    format!("{}y ago", (diff / YEAR).floor() as i64)
}

/// Like [`format_relative_time`] against the wall clock; absent timestamps
/// render as `unknown`.
pub fn format_age(timestamp: Option<f64>) -> String {
    match timestamp {
        Some(ts) if ts.is_finite() => format_relative_time(ts, chrono::Utc::now().timestamp()),
        _ => "unknown".to_string(),
    }
}

pub fn truncate_text(text: Option<&str>, max_len: usize) -> String {
    let Some(text) = text else {
        return String::new();
    };
    if text.chars().count() <= max_len {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_len).collect();
    out.push_str("...");
    out
}

/// Escapes text for inclusion in HTML element content or quoted attributes.
pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Upstream media URLs arrive with `&` pre-escaped.
pub fn sanitize_upstream_url(raw: &str) -> String {
    raw.replace("&amp;", "&")
}
