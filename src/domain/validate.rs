//! Input checks shared by every service.

use crate::error::MarketError;

/// Trims `value` and checks its length in characters is within
/// `min..=max`.
///
/// # Errors
///
/// Returns [`MarketError::InvalidRequest`] naming `field` when the trimmed
/// text is too short or too long.
pub fn bounded_text(field: &str, value: &str, min: usize, max: usize) -> Result<String, MarketError> {
    let trimmed = value.trim();
    let len = trimmed.chars().count();
    if len < min {
        return Err(if min == 1 {
            MarketError::InvalidRequest(format!("{field} must not be empty"))
        } else {
            MarketError::InvalidRequest(format!("{field} must be at least {min} characters"))
        });
    }
    if len > max {
        return Err(MarketError::InvalidRequest(format!(
            "{field} must be at most {max} characters"
        )));
    }
    Ok(trimmed.to_string())
}

/// Like [`bounded_text`] for optional fields; blank input becomes `None`.
///
/// # Errors
///
/// Returns [`MarketError::InvalidRequest`] when the text exceeds `max`.
pub fn optional_text(
    field: &str,
    value: Option<&str>,
    max: usize,
) -> Result<Option<String>, MarketError> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) => bounded_text(field, v, 1, max).map(Some),
    }
}

/// Checks a session duration in minutes.
///
/// # Errors
///
/// Returns [`MarketError::InvalidRequest`] outside `15..=480`.
pub fn duration_minutes(minutes: u32) -> Result<u32, MarketError> {
    if (15..=480).contains(&minutes) {
        Ok(minutes)
    } else {
        Err(MarketError::InvalidRequest(
            "duration_minutes must be between 15 and 480".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounded_text_trims_and_checks() {
        assert_eq!(bounded_text("name", "  Ada  ", 1, 10).ok(), Some("Ada".to_string()));
        assert!(bounded_text("name", "   ", 1, 10).is_err());
        assert!(bounded_text("name", "abcdefghijk", 1, 10).is_err());
    }

    #[test]
    fn length_counts_characters_not_bytes() {
        assert!(bounded_text("name", "ñññ", 1, 3).is_ok());
    }

    #[test]
    fn optional_text_maps_blank_to_none() {
        assert_eq!(optional_text("bio", Some("  "), 5).ok(), Some(None));
        assert_eq!(optional_text("bio", None, 5).ok(), Some(None));
        assert!(optional_text("bio", Some("toolong"), 5).is_err());
    }

    #[test]
    fn duration_bounds() {
        assert!(duration_minutes(14).is_err());
        assert!(duration_minutes(15).is_ok());
        assert!(duration_minutes(480).is_ok());
        assert!(duration_minutes(481).is_err());
    }
}
