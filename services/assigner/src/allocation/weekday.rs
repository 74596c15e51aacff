//! Weekday normalization.
//!
//! Availability is recorded as free text (`MON`, `Mon`, `Monday`, `Montag`, ...).
//! Both sides of the availability check are reduced to [`chrono::Weekday`]
//! before comparing; raw strings are never compared against calendar output.

use chrono::{Datelike, NaiveDate, Weekday};

/// Parses a stored weekday spelling into its canonical form.
///
/// Matching is case-insensitive and ignores surrounding whitespace. Accepts
/// three-letter English abbreviations, full English names and full German
/// names. Returns `None` for anything else.
pub fn normalize(raw: &str) -> Option<Weekday> {
    let value = raw.trim().to_lowercase();

    let weekday = match value.as_str() {
        "mon" | "monday" | "montag" => Weekday::Mon,
        "tue" | "tuesday" | "dienstag" => Weekday::Tue,
        "wed" | "wednesday" | "mittwoch" => Weekday::Wed,
        "thu" | "thursday" | "donnerstag" => Weekday::Thu,
        "fri" | "friday" | "freitag" => Weekday::Fri,
        "sat" | "saturday" | "samstag" | "sonnabend" => Weekday::Sat,
        "sun" | "sunday" | "sonntag" => Weekday::Sun,
        _ => return None,
    };

    Some(weekday)
}

/// The weekday an event falls on.
pub fn of_date(date: NaiveDate) -> Weekday {
    date.weekday()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    /// Three-letter label as written by the data-entry UI.
    fn label(weekday: Weekday) -> &'static str {
        match weekday {
            Weekday::Mon => "MON",
            Weekday::Tue => "TUE",
            Weekday::Wed => "WED",
            Weekday::Thu => "THU",
            Weekday::Fri => "FRI",
            Weekday::Sat => "SAT",
            Weekday::Sun => "SUN",
        }
    }

    #[rstest]
    #[case("MON", Weekday::Mon)]
    #[case("mon", Weekday::Mon)]
    #[case(" Tue ", Weekday::Tue)]
    #[case("Wednesday", Weekday::Wed)]
    #[case("DONNERSTAG", Weekday::Thu)]
    #[case("Freitag", Weekday::Fri)]
    #[case("Sonnabend", Weekday::Sat)]
    #[case("sun", Weekday::Sun)]
    fn test_normalize_accepts_known_spellings(#[case] raw: &str, #[case] expected: Weekday) {
        assert_eq!(normalize(raw), Some(expected));
    }

    #[rstest]
    #[case("")]
    #[case("mo")]
    #[case("funday")]
    #[case("1")]
    fn test_normalize_rejects_unknown(#[case] raw: &str) {
        assert_eq!(normalize(raw), None);
    }

    #[test]
    fn test_label_roundtrips_through_normalize() {
        for weekday in [
            Weekday::Mon,
            Weekday::Tue,
            Weekday::Wed,
            Weekday::Thu,
            Weekday::Fri,
            Weekday::Sat,
            Weekday::Sun,
        ] {
            assert_eq!(normalize(label(weekday)), Some(weekday));
        }
    }

    #[test]
    fn test_of_date() {
        // 2024-03-04 was a Monday.
        let date = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
        assert_eq!(of_date(date), Weekday::Mon);
    }
}
