//! Human-readable quantity parsing (e.g. "64M", "256MB").
//!
//! Used for both byte counts and memory cost budgets, which are pixel areas.
//! Suffixes are powers of 1024.

use thiserror::Error;

/// Error parsing a size string.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("Invalid size '{input}' - expected format like '64M', '512K', or '1G'")]
pub struct SizeParseError {
    input: String,
}

impl SizeParseError {
    fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
        }
    }
}

const KI: u64 = 1024;
const MI: u64 = 1024 * 1024;
const GI: u64 = 1024 * 1024 * 1024;

/// Parse a size string into a plain count.
///
/// Accepts a bare number or one followed by `K`/`KB`, `M`/`MB`, or
/// `G`/`GB`, case-insensitive, with optional whitespace before the suffix.
///
/// # Examples
///
/// ```
/// use imagecache::config::parse_size;
///
/// assert_eq!(parse_size("1024").unwrap(), 1024);
/// assert_eq!(parse_size("64M").unwrap(), 64 * 1024 * 1024);
/// assert_eq!(parse_size("256 mb").unwrap(), 256 * 1024 * 1024);
/// assert_eq!(parse_size("2G").unwrap(), 2 * 1024 * 1024 * 1024);
/// ```
pub fn parse_size(s: &str) -> Result<u64, SizeParseError> {
    let trimmed = s.trim();
    let upper = trimmed.to_ascii_uppercase();

    let (digits, multiplier) = [("GB", GI), ("G", GI), ("MB", MI), ("M", MI), ("KB", KI), ("K", KI)]
        .iter()
        .find_map(|(suffix, multiplier)| {
            upper
                .strip_suffix(suffix)
                .map(|rest| (rest.trim_end().to_string(), *multiplier))
        })
        .unwrap_or_else(|| (upper.clone(), 1));

    if digits.is_empty() {
        return Err(SizeParseError::new(s));
    }

    let value: u64 = digits.parse().map_err(|_| SizeParseError::new(s))?;
    value
        .checked_mul(multiplier)
        .ok_or_else(|| SizeParseError::new(s))
}

/// Format a count using the largest suffix that divides it exactly.
///
/// ```
/// use imagecache::config::format_size;
///
/// assert_eq!(format_size(64 * 1024 * 1024), "64M");
/// assert_eq!(format_size(1536), "1536");
/// ```
pub fn format_size(value: u64) -> String {
    if value >= GI && value % GI == 0 {
        format!("{}G", value / GI)
    } else if value >= MI && value % MI == 0 {
        format!("{}M", value / MI)
    } else if value >= KI && value % KI == 0 {
        format!("{}K", value / KI)
    } else {
        value.to_string()
    }
}
