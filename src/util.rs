/// `part / whole` as a percentage, 0.0 when there is nothing to divide by
pub fn percent(part: u64, whole: u64) -> f64 {
    match whole {
        0 => 0.0,
        positive => part as f64 / positive as f64 * 100.0,
    }
}

/// Items per minute over `seconds`; non-positive or non-finite spans yield 0.0
pub fn per_minute(total: u64, seconds: f64) -> f64 {
    if !seconds.is_finite() || seconds <= 0.0 {
        return 0.0;
    }
    total as f64 * 60.0 / seconds
}

/// Whole seconds as `HH:MM:SS`. Hours are not wrapped at 24.
pub fn format_hms(seconds: f64) -> String {
    let secs = if seconds.is_finite() && seconds > 0.0 {
        seconds.floor() as u64
    } else {
        0
    };
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}

/// One-decimal display text
pub fn format_one_decimal(value: f64) -> String {
    if value.is_finite() {
        format!("{value:.1}")
    } else {
        "0.0".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent() {
        assert_eq!(percent(3, 4), 75.0);
        assert!((percent(1, 3) - 33.333).abs() < 1e-3);
    }

    #[test]
    fn test_percent_empty() {
        assert_eq!(percent(0, 0), 0.0);
    }

    #[test]
    fn test_per_minute() {
        assert_eq!(per_minute(4, 60.0), 4.0);
        assert_eq!(per_minute(10, 30.0), 20.0);
    }

    #[test]
    fn test_per_minute_degenerate_spans() {
        assert_eq!(per_minute(5, 0.0), 0.0);
        assert_eq!(per_minute(5, -3.0), 0.0);
        assert_eq!(per_minute(5, f64::NAN), 0.0);
    }

    #[test]
    fn test_format_hms() {
        assert_eq!(format_hms(0.0), "00:00:00");
        assert_eq!(format_hms(60.0), "00:01:00");
        assert_eq!(format_hms(3661.9), "01:01:01");
        assert_eq!(format_hms(100.0 * 3600.0), "100:00:00");
    }

    #[test]
    fn test_format_hms_negative() {
        assert_eq!(format_hms(-12.0), "00:00:00");
    }

    #[test]
    fn test_format_one_decimal() {
        assert_eq!(format_one_decimal(75.0), "75.0");
        assert_eq!(format_one_decimal(66.666), "66.7");
        assert_eq!(format_one_decimal(f64::INFINITY), "0.0");
    }
}
