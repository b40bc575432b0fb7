//! Sale-window dates printed on a flyer page.
//!
//! Flyers rarely print a full date range. Years are usually missing and a
//! range that crosses New Year (`12/28-01/03`) is written without one, so the
//! year is resolved from whichever side carries it, or from the caller's
//! default, rolling over when the end would precede the start.

use chrono::NaiveDate;
use flyerscan_core::DateRange;

// ── Patterns ─────────────────────────────────────────────────────────────────

re!(re_month_range, concat!(
    r"(?i)\b(jan(?:uary)?|feb(?:ruary)?|mar(?:ch)?|apr(?:il)?|may|june?|july?|aug(?:ust)?|sep(?:t(?:ember)?)?|oct(?:ober)?|nov(?:ember)?|dec(?:ember)?)\.?",
    r"\s+(\d{1,2})(?:st|nd|rd|th)?(?:,?\s*(\d{4}))?",
    r"\s*(?:-|–|—|to|thru|through)\s*",
    r"(?:(jan(?:uary)?|feb(?:ruary)?|mar(?:ch)?|apr(?:il)?|may|june?|july?|aug(?:ust)?|sep(?:t(?:ember)?)?|oct(?:ober)?|nov(?:ember)?|dec(?:ember)?)\.?\s+)?",
    r"(\d{1,2})(?:st|nd|rd|th)?\b(?:,?\s*(\d{4}))?"
));
re!(re_numeric_range,
    r"(?i)\b(\d{1,2})/(\d{1,2})(?:/(\d{2,4}))?\s*(?:-|–|—|to|thru|through)\s*(\d{1,2})/(\d{1,2})(?:/(\d{2,4}))?\b");
re!(re_month_date,
    r"(?i)\b(jan(?:uary)?|feb(?:ruary)?|mar(?:ch)?|apr(?:il)?|may|june?|july?|aug(?:ust)?|sep(?:t(?:ember)?)?|oct(?:ober)?|nov(?:ember)?|dec(?:ember)?)\.?\s+(\d{1,2})(?:st|nd|rd|th)?\b(?:,?\s*(\d{4}))?");

// ── Public API ───────────────────────────────────────────────────────────────

/// First sale window found in `text`.
///
/// Tried in order: a month-name range (`Dec 3rd - 9th, 2025`,
/// `Dec 3 - Dec 9`), a numeric range (`Valid 12/28-01/03`,
/// `12/03/2025 - 12/09/2025`), then the first two month-name dates anywhere
/// on the page. `default_year` is used when neither side prints a year.
pub fn parse_sale_window(text: &str, default_year: i32) -> Option<DateRange> {
    try_month_range(text, default_year)
        .or_else(|| try_numeric_range(text, default_year))
        .or_else(|| try_month_pair(text, default_year))
}

// ── Date helpers ─────────────────────────────────────────────────────────────

/// One side of a range before its year is known.
#[derive(Debug, Clone, Copy)]
struct PartialDate {
    month: u32,
    day: u32,
    year: Option<i32>,
}

fn try_month_range(text: &str, default_year: i32) -> Option<DateRange> {
    re_month_range().captures_iter(text).find_map(|c| {
        let start_month = month_name_to_num(c.get(1)?.as_str())?;
        let start_day: u32 = c.get(2)?.as_str().parse().ok()?;
        let end_day: u32 = c.get(5)?.as_str().parse().ok()?;
        let end_month = match c.get(4) {
            Some(m) => month_name_to_num(m.as_str())?,
            // `Dec 28th - 3rd` runs into the next month.
            None if end_day < start_day => start_month % 12 + 1,
            None => start_month,
        };
        let start = PartialDate {
            month: start_month,
            day: start_day,
            year: parse_year(c.get(3).map(|m| m.as_str())),
        };
        let end = PartialDate {
            month: end_month,
            day: end_day,
            year: parse_year(c.get(6).map(|m| m.as_str())),
        };
        resolve(start, end, default_year)
    })
}

fn try_numeric_range(text: &str, default_year: i32) -> Option<DateRange> {
    re_numeric_range().captures_iter(text).find_map(|c| {
        let start = PartialDate {
            month: c.get(1)?.as_str().parse().ok()?,
            day: c.get(2)?.as_str().parse().ok()?,
            year: parse_year(c.get(3).map(|m| m.as_str())),
        };
        let end = PartialDate {
            month: c.get(4)?.as_str().parse().ok()?,
            day: c.get(5)?.as_str().parse().ok()?,
            year: parse_year(c.get(6).map(|m| m.as_str())),
        };
        resolve(start, end, default_year)
    })
}

fn try_month_pair(text: &str, default_year: i32) -> Option<DateRange> {
    let mut dates = re_month_date().captures_iter(text).filter_map(|c| {
        Some(PartialDate {
            month: month_name_to_num(c.get(1)?.as_str())?,
            day: c.get(2)?.as_str().parse().ok()?,
            year: parse_year(c.get(3).map(|m| m.as_str())),
        })
    });
    let start = dates.next()?;
    let end = dates.next()?;
    resolve(start, end, default_year)
}

/// Fill in missing years, rolling into the next year when the end's
/// month/day precedes the start's.
fn resolve(start: PartialDate, end: PartialDate, default_year: i32) -> Option<DateRange> {
    let wraps = (end.month, end.day) < (start.month, start.day);
    let (start_year, end_year) = match (start.year, end.year) {
        (Some(s), Some(e)) => (s, e),
        (Some(s), None) => (s, s + i32::from(wraps)),
        (None, Some(e)) => (e - i32::from(wraps), e),
        (None, None) => (default_year, default_year + i32::from(wraps)),
    };
    DateRange::new(
        NaiveDate::from_ymd_opt(start_year, start.month, start.day)?,
        NaiveDate::from_ymd_opt(end_year, end.month, end.day)?,
    )
}

fn parse_year(s: Option<&str>) -> Option<i32> {
    s?.parse().ok().map(expand_year)
}

fn expand_year(y: i32) -> i32 {
    if y < 100 { 2000 + y } else { y }
}

fn month_name_to_num(name: &str) -> Option<u32> {
    let lower = name.to_lowercase();
    match lower.get(..3)? {
        "jan" => Some(1), "feb" => Some(2), "mar" => Some(3), "apr" => Some(4),
        "may" => Some(5), "jun" => Some(6), "jul" => Some(7), "aug" => Some(8),
        "sep" => Some(9), "oct" => Some(10), "nov" => Some(11), "dec" => Some(12),
        _ => None,
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn window(text: &str, default_year: i32) -> Option<(NaiveDate, NaiveDate)> {
        parse_sale_window(text, default_year).map(|r| (r.start, r.end))
    }

    #[test]
    fn valid_line_rolls_into_next_year() {
        assert_eq!(
            window("Valid 12/28-01/03\nWeekly Deals", 2025),
            Some((d(2025, 12, 28), d(2026, 1, 3)))
        );
    }

    #[test]
    fn ordinal_day_only_end_with_trailing_year() {
        assert_eq!(
            window("Prices good Dec 3rd - 9th, 2025", 2024),
            Some((d(2025, 12, 3), d(2025, 12, 9)))
        );
    }

    #[test]
    fn month_names_both_sides_use_default_year() {
        assert_eq!(
            window("Weekly Ad\nDec 3 - Dec 9", 2024),
            Some((d(2024, 12, 3), d(2024, 12, 9)))
        );
        assert_eq!(
            window("Sept. 28 thru Oct. 4", 2025),
            Some((d(2025, 9, 28), d(2025, 10, 4)))
        );
    }

    #[test]
    fn full_numeric_dates() {
        assert_eq!(
            window("12/03/2025 - 12/09/2025", 2020),
            Some((d(2025, 12, 3), d(2025, 12, 9)))
        );
        assert_eq!(
            window("valid 12/30/25 to 1/5/26", 2020),
            Some((d(2025, 12, 30), d(2026, 1, 5)))
        );
    }

    #[test]
    fn full_month_names_across_years() {
        assert_eq!(
            window("December 30, 2025 - January 5, 2026", 2020),
            Some((d(2025, 12, 30), d(2026, 1, 5)))
        );
    }

    #[test]
    fn day_only_end_crossing_month() {
        assert_eq!(
            window("Jan 28th - 3rd", 2026),
            Some((d(2026, 1, 28), d(2026, 2, 3)))
        );
    }

    #[test]
    fn separate_month_dates_pair_up() {
        assert_eq!(
            window("Sale starts Dec 10th\nBoneless Chicken $2.99\nEnds Dec 16th", 2025),
            Some((d(2025, 12, 10), d(2025, 12, 16)))
        );
    }

    #[test]
    fn no_window() {
        assert_eq!(window("Boneless Chicken Breast\n$2.99 /lb", 2025), None);
        assert_eq!(window("", 2025), None);
        assert_eq!(window("Feb 30 - Mar 2", 2025), None);
    }
}
