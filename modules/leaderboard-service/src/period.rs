//! Calendar-month period keys (`YYYY-MM`).

use chrono::{Datelike, NaiveDate};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PeriodKey {
    year: i32,
    month: u32,
}

impl PeriodKey {
    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// Parse a `YYYY-MM` key
    pub fn parse(s: &str) -> Result<Self, String> {
        let (year, month) = s
            .trim()
            .split_once('-')
            .ok_or_else(|| format!("Invalid period '{}', expected YYYY-MM", s))?;
        if year.len() != 4 || month.len() != 2 {
            return Err(format!("Invalid period '{}', expected YYYY-MM", s));
        }
        let year: i32 = year
            .parse()
            .map_err(|_| format!("Invalid year in period '{}'", s))?;
        let month: u32 = month
            .parse()
            .map_err(|_| format!("Invalid month in period '{}'", s))?;
        if !(1..=12).contains(&month) {
            return Err(format!("Month out of range in period '{}'", s));
        }
        Ok(Self { year, month })
    }

    pub fn previous(&self) -> Self {
        if self.month == 1 {
            Self {
                year: self.year - 1,
                month: 12,
            }
        } else {
            Self {
                year: self.year,
                month: self.month - 1,
            }
        }
    }
}

impl fmt::Display for PeriodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_from_date_formats_zero_padded() {
        assert_eq!(PeriodKey::from_date(date(2024, 5, 17)).to_string(), "2024-05");
    }

    #[test]
    fn test_previous_rolls_over_year() {
        let jan = PeriodKey::from_date(date(2025, 1, 1));
        assert_eq!(jan.previous().to_string(), "2024-12");
        let jun = PeriodKey::from_date(date(2025, 6, 1));
        assert_eq!(jun.previous().to_string(), "2025-05");
    }

    #[test]
    fn test_parse() {
        assert_eq!(PeriodKey::parse("2024-05").unwrap(), PeriodKey::from_date(date(2024, 5, 1)));
        assert!(PeriodKey::parse("2024-13").is_err());
        assert!(PeriodKey::parse("2024-5").is_err());
        assert!(PeriodKey::parse("May 2024").is_err());
    }
}
