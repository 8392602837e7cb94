//! Validated date selections for retrieval requests.
//!
//! The dataset trails the present by up to a week, and the CDS rejects (or
//! times out on) very large requests, so a selection is checked against both
//! limits before any request is built. The year/month/day selector lists are
//! produced sorted, zero-padded and deduplicated.

use crate::reanalysis::error::DateSelectionError;
use chrono::{Days, Local, NaiveDate};
use std::collections::BTreeSet;

/// CDS safety limit for a single request, in days (about two years).
pub const MAX_RANGE_DAYS: i64 = 731;

/// The dataset has a maximum of 7 days of update delay; requesting anything
/// more recent is rejected up front.
pub const UPDATE_DELAY_DAYS: u64 = 7;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// An inclusive, validated date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateSelection {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateSelection {
    /// A selection of a single day.
    pub fn single(date: NaiveDate) -> Result<Self, DateSelectionError> {
        Self::range(date, date)
    }

    /// An inclusive range from `start` to `end`.
    pub fn range(start: NaiveDate, end: NaiveDate) -> Result<Self, DateSelectionError> {
        Self::range_as_of(start, end, Local::now().date_naive())
    }

    fn range_as_of(
        start: NaiveDate,
        end: NaiveDate,
        today: NaiveDate,
    ) -> Result<Self, DateSelectionError> {
        let last_update = today - Days::new(UPDATE_DELAY_DAYS);
        if end > last_update {
            return Err(DateSelectionError::DateTooRecent {
                date: end,
                last_update,
            });
        }
        if start > end {
            return Err(DateSelectionError::InvertedRange { start, end });
        }
        let days = (end - start).num_days() + 1;
        if days > MAX_RANGE_DAYS {
            return Err(DateSelectionError::RangeTooLong { days });
        }
        Ok(Self { start, end })
    }

    /// Parses `YYYY-MM-DD` strings into a selection; `end` defaults to a
    /// single-day selection.
    pub fn parse(start: &str, end: Option<&str>) -> Result<Self, DateSelectionError> {
        let start_date = parse_date(start)?;
        match end {
            Some(end) => Self::range(start_date, parse_date(end)?),
            None => Self::single(start_date),
        }
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn num_days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    fn selectors(&self) -> (BTreeSet<String>, BTreeSet<String>, BTreeSet<String>) {
        let mut years = BTreeSet::new();
        let mut months = BTreeSet::new();
        let mut days = BTreeSet::new();
        for date in self.start.iter_days().take_while(|d| *d <= self.end) {
            years.insert(date.format("%Y").to_string());
            months.insert(date.format("%m").to_string());
            days.insert(date.format("%d").to_string());
        }
        (years, months, days)
    }

    /// Distinct years in the range, as zero-padded request selectors.
    pub fn years(&self) -> Vec<String> {
        self.selectors().0.into_iter().collect()
    }

    /// Distinct months in the range.
    pub fn months(&self) -> Vec<String> {
        self.selectors().1.into_iter().collect()
    }

    /// Distinct days-of-month in the range.
    pub fn days(&self) -> Vec<String> {
        self.selectors().2.into_iter().collect()
    }

    /// File name stem for the download: `GEOCODE_YYYYMMDD` for a single day,
    /// `GEOCODE_YYYYMMDD_YYYYMMDD` for a range.
    pub fn file_stem(&self, geocode: u32) -> String {
        if self.start == self.end {
            format!("{}_{}", geocode, self.start.format("%Y%m%d"))
        } else {
            format!(
                "{}_{}_{}",
                geocode,
                self.start.format("%Y%m%d"),
                self.end.format("%Y%m%d")
            )
        }
    }
}

fn parse_date(text: &str) -> Result<NaiveDate, DateSelectionError> {
    NaiveDate::parse_from_str(text, DATE_FORMAT)
        .map_err(|_| DateSelectionError::InvalidFormat(text.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    // Fixed "today" so the update-delay check is deterministic.
    const TODAY: fn() -> NaiveDate = || date(2022, 10, 20);

    #[test]
    fn accepts_a_valid_range() {
        let selection = DateSelection::range_as_of(date(2022, 10, 1), date(2022, 10, 4), TODAY())
            .unwrap();
        assert_eq!(selection.start(), date(2022, 10, 1));
        assert_eq!(selection.end(), date(2022, 10, 4));
        assert_eq!(selection.num_days(), 4);
    }

    #[test]
    fn rejects_dates_within_the_update_delay() {
        let err = DateSelection::range_as_of(date(2022, 10, 1), date(2022, 10, 15), TODAY())
            .unwrap_err();
        assert_eq!(
            err,
            DateSelectionError::DateTooRecent {
                date: date(2022, 10, 15),
                last_update: date(2022, 10, 13),
            }
        );
        // Exactly seven days back is still allowed.
        assert!(
            DateSelection::range_as_of(date(2022, 10, 1), date(2022, 10, 13), TODAY()).is_ok()
        );
    }

    #[test]
    fn rejects_inverted_ranges() {
        let err = DateSelection::range_as_of(date(2022, 10, 4), date(2022, 10, 1), TODAY())
            .unwrap_err();
        assert!(matches!(err, DateSelectionError::InvertedRange { .. }));
    }

    #[test]
    fn rejects_ranges_over_the_api_limit() {
        let err = DateSelection::range_as_of(date(2020, 1, 1), date(2022, 10, 1), TODAY())
            .unwrap_err();
        assert!(matches!(err, DateSelectionError::RangeTooLong { days } if days > MAX_RANGE_DAYS));
        // 731 days exactly fits.
        let at_limit =
            DateSelection::range_as_of(date(2020, 10, 1), date(2022, 10, 1), TODAY()).unwrap();
        assert_eq!(at_limit.num_days(), MAX_RANGE_DAYS);
    }

    #[test]
    fn parses_iso_dates() {
        let selection = DateSelection::parse("2022-01-10", Some("2022-01-20")).unwrap();
        assert_eq!(selection.start(), date(2022, 1, 10));
        assert_eq!(selection.end(), date(2022, 1, 20));

        assert!(matches!(
            DateSelection::parse("10/01/2022", None),
            Err(DateSelectionError::InvalidFormat(_))
        ));
        assert!(matches!(
            DateSelection::parse("2022-13-01", None),
            Err(DateSelectionError::InvalidFormat(_))
        ));
    }

    #[test]
    fn selectors_are_sorted_padded_and_deduplicated() {
        let selection = DateSelection::range_as_of(date(2021, 12, 28), date(2022, 1, 3), TODAY())
            .unwrap();
        assert_eq!(selection.years(), ["2021", "2022"]);
        assert_eq!(selection.months(), ["01", "12"]);
        assert_eq!(
            selection.days(),
            ["01", "02", "03", "28", "29", "30", "31"]
        );
    }

    #[test]
    fn single_day_selectors() {
        let selection = DateSelection::range_as_of(date(2022, 8, 5), date(2022, 8, 5), TODAY())
            .unwrap();
        assert_eq!(selection.years(), ["2022"]);
        assert_eq!(selection.months(), ["08"]);
        assert_eq!(selection.days(), ["05"]);
    }

    #[test]
    fn file_stems_follow_the_download_naming() {
        let single = DateSelection::range_as_of(date(2022, 10, 4), date(2022, 10, 4), TODAY())
            .unwrap();
        assert_eq!(single.file_stem(3304557), "3304557_20221004");

        let range = DateSelection::range_as_of(date(2022, 10, 1), date(2022, 10, 4), TODAY())
            .unwrap();
        assert_eq!(range.file_stem(3304557), "3304557_20221001_20221004");
    }
}
