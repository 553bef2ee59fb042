//! Date and timestamp helpers shared by the upstream client, the
//! backup naming scheme, and the resolver.

use chrono::{DateTime, Datelike, Days, Local};

/// Academic-year string used by the upstream query parameters,
/// e.g. `2025-2026`. The start year is the current calendar year.
pub fn academic_year(now: DateTime<Local>) -> String {
    let year = now.year();
    format!("{}-{}", year, year + 1)
}

/// Timestamp-derived identifier for a backup snapshot,
/// e.g. `2024-05-01T09:30:00`.
pub fn backup_name(now: DateTime<Local>) -> String {
    now.format("%Y-%m-%dT%H:%M:%S").to_string()
}

/// Calendar date `day_offset` days from `now`, formatted `%Y-%m-%d`
/// to match the date component of upstream lesson timestamps.
pub fn target_date(now: DateTime<Local>, day_offset: i64) -> String {
    let date = if day_offset >= 0 {
        now.checked_add_days(Days::new(day_offset as u64))
    } else {
        now.checked_sub_days(Days::new(day_offset.unsigned_abs()))
    };
    date.unwrap_or(now).format("%Y-%m-%d").to_string()
}

/// Date component of an ISO-like timestamp: everything before the `T`
/// delimiter. Returns the whole string if there is no delimiter.
pub fn date_part(timestamp: &str) -> &str {
    timestamp.split('T').next().unwrap_or(timestamp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, mo: u32, d: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(y, mo, d, 9, 30, 0).unwrap()
    }

    #[test]
    fn test_academic_year() {
        assert_eq!(academic_year(at(2024, 9, 1)), "2024-2025");
        assert_eq!(academic_year(at(2025, 2, 10)), "2025-2026");
    }

    #[test]
    fn test_backup_name() {
        assert_eq!(backup_name(at(2024, 5, 1)), "2024-05-01T09:30:00");
    }

    #[test]
    fn test_target_date_offsets() {
        assert_eq!(target_date(at(2024, 5, 1), 0), "2024-05-01");
        assert_eq!(target_date(at(2024, 5, 1), 1), "2024-05-02");
        assert_eq!(target_date(at(2024, 5, 1), -1), "2024-04-30");
        // Month boundary
        assert_eq!(target_date(at(2024, 5, 31), 1), "2024-06-01");
    }

    #[test]
    fn test_date_part() {
        assert_eq!(date_part("2024-05-01T09:00:00+03:00"), "2024-05-01");
        assert_eq!(date_part("2024-05-01"), "2024-05-01");
    }
}
