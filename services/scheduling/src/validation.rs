//! Input validation utilities

use chrono::NaiveDate;
use regex::Regex;
use std::sync::OnceLock;

const MAX_TITLE_LEN: usize = 200;
const MAX_NOTES_LEN: usize = 2000;
const MAX_REASON_LEN: usize = 1000;
const MAX_LINK_LEN: usize = 2048;

/// Normalise a slot label to `h:mmam` / `h:mmpm`
///
/// Accepts `6:00pm`, `06:00 PM`, ` 6:00Pm ` and yields `6:00pm` for all of
/// them, so one slot cannot be booked twice under different spellings.
pub fn normalize_time_slot(label: &str) -> Result<String, String> {
    static SLOT_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = SLOT_REGEX.get_or_init(|| {
        Regex::new(r"(?i)^(1[0-2]|0?[1-9]):([0-5][0-9])\s*(am|pm)$")
            .expect("Failed to compile time slot regex")
    });

    let trimmed = label.trim();
    if trimmed.is_empty() {
        return Err("Time is required".to_string());
    }

    let captures = regex
        .captures(trimmed)
        .ok_or_else(|| format!("Invalid time '{}', expected a label like 3:00pm", trimmed))?;

    let hour: u8 = captures[1]
        .parse()
        .map_err(|_| format!("Invalid hour in '{}'", trimmed))?;

    Ok(format!(
        "{}:{}{}",
        hour,
        &captures[2],
        captures[3].to_ascii_lowercase()
    ))
}

/// Parse a calendar date in `YYYY-MM-DD` form
pub fn parse_date(value: &str) -> Result<NaiveDate, String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err("Date is required".to_string());
    }

    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .map_err(|_| format!("Invalid date '{}', expected YYYY-MM-DD", trimmed))
}

/// Validate and trim a session title
pub fn validate_title(title: &str) -> Result<String, String> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err("Title is required".to_string());
    }

    if trimmed.chars().count() > MAX_TITLE_LEN {
        return Err(format!("Title must be at most {} characters long", MAX_TITLE_LEN));
    }

    Ok(trimmed.to_string())
}

/// Validate optional free-text notes; blank notes are dropped
pub fn validate_notes(notes: Option<&str>) -> Result<Option<String>, String> {
    let Some(notes) = notes.map(str::trim).filter(|n| !n.is_empty()) else {
        return Ok(None);
    };

    if notes.chars().count() > MAX_NOTES_LEN {
        return Err(format!("Notes must be at most {} characters long", MAX_NOTES_LEN));
    }

    Ok(Some(notes.to_string()))
}

/// Validate a required reason (rejection)
pub fn validate_reason(reason: &str) -> Result<String, String> {
    let trimmed = reason.trim();
    if trimmed.is_empty() {
        return Err("Reason is required".to_string());
    }

    if trimmed.chars().count() > MAX_REASON_LEN {
        return Err(format!("Reason must be at most {} characters long", MAX_REASON_LEN));
    }

    Ok(trimmed.to_string())
}

/// Validate a meeting link
pub fn validate_meeting_link(link: &str) -> Result<String, String> {
    let trimmed = link.trim();
    if trimmed.is_empty() {
        return Err("Meeting link is required".to_string());
    }

    if trimmed.len() > MAX_LINK_LEN {
        return Err(format!("Meeting link must be at most {} characters long", MAX_LINK_LEN));
    }

    static LINK_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = LINK_REGEX.get_or_init(|| {
        Regex::new(r"(?i)^https?://[a-z0-9.-]+(:[0-9]{1,5})?(/\S*)?$")
            .expect("Failed to compile meeting link regex")
    });

    if !regex.is_match(trimmed) {
        return Err("Meeting link must be an http(s) URL".to_string());
    }

    Ok(trimmed.to_string())
}
