// Human-readable formatting for sizes, rates and uptime.

const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

/// 1024-based, two decimals, e.g. `1.50 KB`.
pub fn format_bytes(bytes: f64) -> String {
    let mut value = bytes;
    for unit in UNITS {
        if value < 1024.0 {
            return format!("{value:.2} {unit}");
        }
        value /= 1024.0;
    }
    format!("{value:.2} PB")
}

pub fn format_rate(bytes_per_sec: f64) -> String {
    format!("{}/s", format_bytes(bytes_per_sec))
}

/// `1d 2h 3m`, `2h 5m`, `3m 4s` or `9s`.
pub fn format_uptime(seconds: u64) -> String {
    let days = seconds / 86_400;
    let hours = (seconds % 86_400) / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    if days > 0 {
        format!("{days}d {hours}h {minutes}m")
    } else if hours > 0 {
        format!("{hours}h {minutes}m")
    } else if minutes > 0 {
        format!("{minutes}m {secs}s")
    } else {
        format!("{secs}s")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_scale_by_1024() {
        assert_eq!(format_bytes(0.0), "0.00 B");
        assert_eq!(format_bytes(1536.0), "1.50 KB");
        assert_eq!(format_bytes(5.0 * 1024.0 * 1024.0 * 1024.0), "5.00 GB");
        assert_eq!(format_bytes(2.0 * 1024f64.powi(5)), "2.00 PB");
        assert_eq!(format_rate(2048.0), "2.00 KB/s");
    }

    #[test]
    fn uptime_picks_two_largest_units() {
        assert_eq!(format_uptime(9), "9s");
        assert_eq!(format_uptime(184), "3m 4s");
        assert_eq!(format_uptime(2 * 3600 + 5 * 60 + 7), "2h 5m");
        assert_eq!(format_uptime(86_400 + 2 * 3600 + 3 * 60), "1d 2h 3m");
    }
}
