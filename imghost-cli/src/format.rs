use time::OffsetDateTime;

const UNITS: [&str; 3] = ["Bytes", "KB", "MB"];

/// Human readable size with at most two decimals, e.g. `1.5 KB`.
pub fn file_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0 Bytes".to_string();
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{} {}", (value * 100.0).round() / 100.0, UNITS[unit])
}

/// `Today`, `Yesterday`, `N days ago` within a week, else the calendar date.
pub fn relative_date(date: Option<OffsetDateTime>, now: OffsetDateTime) -> String {
    let date = match date {
        Some(date) => date,
        None => return "unknown".to_string(),
    };
    match (now - date).whole_days() {
        days if days <= 0 => "Today".to_string(),
        1 => "Yesterday".to_string(),
        days if days < 7 => format!("{} days ago", days),
        _ => date.date().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;

    #[test]
    fn sizes() {
        assert_eq!(file_size(0), "0 Bytes");
        assert_eq!(file_size(512), "512 Bytes");
        assert_eq!(file_size(1024), "1 KB");
        assert_eq!(file_size(1536), "1.5 KB");
        assert_eq!(file_size(1_234_567), "1.18 MB");
        assert_eq!(file_size(15 * 1024 * 1024 * 1024), "15360 MB");
    }

    #[test]
    fn dates() {
        let now = datetime!(2024-03-10 12:00 UTC);
        assert_eq!(relative_date(Some(datetime!(2024-03-10 01:00 UTC)), now), "Today");
        assert_eq!(relative_date(Some(datetime!(2024-03-09 11:00 UTC)), now), "Yesterday");
        assert_eq!(relative_date(Some(datetime!(2024-03-05 12:00 UTC)), now), "5 days ago");
        assert_eq!(relative_date(Some(datetime!(2024-01-02 12:00 UTC)), now), "2024-01-02");
        assert_eq!(relative_date(None, now), "unknown");
    }
}
