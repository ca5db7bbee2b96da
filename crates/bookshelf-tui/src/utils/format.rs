use chrono::{DateTime, Utc};

/// Truncate a string to a maximum number of characters, adding ellipsis if needed
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s.chars().take(max_len).collect()
    } else {
        let truncated: String = s.chars().take(max_len - 3).collect();
        format!("{}...", truncated)
    }
}

/// Format an optional string, returning a default if None
pub fn format_optional(value: &Option<String>, default: &str) -> String {
    value.as_deref().unwrap_or(default).to_string()
}

/// Format a timestamp as e.g. "May 01, 2024"
pub fn format_date(date: &DateTime<Utc>) -> String {
    date.format("%b %d, %Y").to_string()
}

/// Human description of a due date relative to now
pub fn format_due(days_until_due: i64) -> String {
    match days_until_due {
        d if d < -1 => format!("{} days late", -d),
        -1 => "1 day late".to_string(),
        0 => "due today".to_string(),
        1 => "due tomorrow".to_string(),
        d => format!("due in {} days", d),
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_truncate_string() {
        assert_eq!(truncate_string("Dune", 10), "Dune");
        assert_eq!(truncate_string("The Left Hand of Darkness", 10), "The Lef...");
        assert_eq!(truncate_string("abcdef", 2), "ab");
        // Counts characters, not bytes
        assert_eq!(truncate_string("Éléments", 8), "Éléments");
    }

    #[test]
    fn test_format_optional() {
        assert_eq!(format_optional(&Some("Sci-Fi".to_string()), "-"), "Sci-Fi");
        assert_eq!(format_optional(&None, "-"), "-");
    }

    #[test]
    fn test_format_date() {
        let date = Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap();
        assert_eq!(format_date(&date), "May 01, 2024");
    }

    #[test]
    fn test_format_due() {
        assert_eq!(format_due(5), "due in 5 days");
        assert_eq!(format_due(1), "due tomorrow");
        assert_eq!(format_due(0), "due today");
        assert_eq!(format_due(-1), "1 day late");
        assert_eq!(format_due(-4), "4 days late");
    }
}
