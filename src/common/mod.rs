//! Common utilities shared across the reporter, tracker and CLI

pub mod config;
pub mod error;
pub mod logging;
pub mod paths;

pub use error::{Error, Result};

/// Format a duration given in milliseconds for compact terminal output.
///
/// Sub-millisecond values are shown in microseconds, values below two
/// seconds in whole milliseconds, longer ones in seconds or minutes.
pub fn format_duration(ms: f64) -> String {
    if ms < 1.0 {
        return format!("{}µs", (ms * 1000.0) as u64);
    }
    if ms < 1998.0 {
        return format!("{}ms", ms as u64);
    }

    let secs = ms / 1000.0;
    if secs < 60.0 {
        format!("{:.1}s", secs)
    } else {
        let mins = (secs / 60.0).floor() as u64;
        format!("{}m {}s", mins, (secs % 60.0).round() as u64)
    }
}

/// Format a byte count with a binary unit suffix.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{}{}", bytes, UNITS[0])
    } else {
        format!("{:.1}{}", size, UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration_ranges() {
        assert_eq!(format_duration(0.25), "250µs");
        assert_eq!(format_duration(42.7), "42ms");
        assert_eq!(format_duration(1997.0), "1997ms");
        assert_eq!(format_duration(2500.0), "2.5s");
        assert_eq!(format_duration(125_000.0), "2m 5s");
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512B");
        assert_eq!(format_size(2048), "2.0KB");
        assert_eq!(format_size(3 * 1024 * 1024), "3.0MB");
    }
}
