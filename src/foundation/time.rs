//! Clock-time parsing and formatting shared by bracket input and log parsing.

/// Parse a strict `MM:SS` clock time into seconds.
///
/// Minutes are one or more digits, seconds exactly two digits and `< 60`.
/// Returns `None` on any malformed input; callers reject without mutating
/// state.
pub fn parse_mm_ss(text: &str) -> Option<f64> {
    let (minutes, seconds) = text.split_once(':')?;
    if minutes.is_empty() || seconds.len() != 2 {
        return None;
    }
    if !minutes.bytes().all(|b| b.is_ascii_digit()) || !seconds.bytes().all(|b| b.is_ascii_digit())
    {
        return None;
    }
    let minutes: u32 = minutes.parse().ok()?;
    let seconds: u32 = seconds.parse().ok()?;
    if seconds >= 60 {
        return None;
    }
    Some(f64::from(minutes) * 60.0 + f64::from(seconds))
}

/// Convert an `HH:MM:SS.CC` timestamp (already split into components) into
/// seconds. Centiseconds contribute `cc / 100`.
pub fn hmsc_to_secs(hours: u32, minutes: u32, seconds: u32, centis: u32) -> f64 {
    f64::from(hours) * 3600.0 + f64::from(minutes) * 60.0 + f64::from(seconds)
        + f64::from(centis) / 100.0
}

/// Format a span in seconds as `MM:SS`, flooring sub-second remainder.
pub fn format_mm_ss(total_secs: f64) -> String {
    let total = total_secs.max(0.0).floor() as u64;
    format!("{:02}:{:02}", total / 60, total % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_strict_mm_ss() {
        assert_eq!(parse_mm_ss("02:35"), Some(155.0));
        assert_eq!(parse_mm_ss("0:05"), Some(5.0));
        assert_eq!(parse_mm_ss("120:00"), Some(7200.0));
    }

    #[test]
    fn rejects_malformed_mm_ss() {
        for bad in ["", ":", "00:60", "00:5", "00:5x", "1:5", "a:05", "00:05:00", "-1:05"] {
            assert_eq!(parse_mm_ss(bad), None, "accepted {bad:?}");
        }
    }

    #[test]
    fn timestamp_math_matches_engine_log_format() {
        assert_eq!(hmsc_to_secs(0, 1, 0, 0), 60.0);
        assert_eq!(hmsc_to_secs(0, 0, 30, 0), 30.0);
        assert_eq!(hmsc_to_secs(1, 2, 3, 45), 3723.45);
    }

    #[test]
    fn formats_spans() {
        assert_eq!(format_mm_ss(0.0), "00:00");
        assert_eq!(format_mm_ss(154.9), "02:34");
        assert_eq!(format_mm_ss(-3.0), "00:00");
    }
}
