//! Locale table for month and weekday names.
//!
//! Classification never hardcodes names; it asks this table to map a word to
//! a month number and a date back to display names.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Names for one month.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MonthNames {
    /// Form used in rendered titles ("октября")
    pub display: String,

    /// Lowercase spellings accepted in titles
    pub forms: Vec<String>,
}

impl MonthNames {
    fn new(display: &str, forms: &[&str]) -> Self {
        Self {
            display: display.to_string(),
            forms: forms.iter().map(|f| f.to_string()).collect(),
        }
    }
}

/// Month and weekday names, January first and Monday first.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CalendarLocale {
    pub months: Vec<MonthNames>,
    pub weekdays: Vec<String>,
}

impl CalendarLocale {
    /// Check that the table is complete.
    pub fn validate(&self) -> Result<()> {
        if self.months.len() != 12 {
            return Err(AppError::validation(format!(
                "calendar.months must list 12 months, found {}",
                self.months.len()
            )));
        }
        if self.weekdays.len() != 7 {
            return Err(AppError::validation(format!(
                "calendar.weekdays must list 7 days, found {}",
                self.weekdays.len()
            )));
        }
        if let Some(pos) = self.months.iter().position(|m| m.forms.is_empty()) {
            return Err(AppError::validation(format!(
                "calendar.months[{pos}] has no accepted forms"
            )));
        }
        Ok(())
    }

    /// Month number (1-12) for a word found in a title.
    pub fn month_index(&self, word: &str) -> Option<u32> {
        let word = word.to_lowercase();
        self.months
            .iter()
            .position(|m| m.forms.iter().any(|f| f.to_lowercase() == word))
            .map(|i| i as u32 + 1)
    }

    /// Display name for a month number (1-12).
    pub fn month_name(&self, month: u32) -> Option<&str> {
        let idx = usize::try_from(month).ok()?.checked_sub(1)?;
        self.months.get(idx).map(|m| m.display.as_str())
    }

    /// Weekday name for a calendar date.
    pub fn weekday_name(&self, date: NaiveDate) -> Option<&str> {
        let idx = date.weekday().num_days_from_monday() as usize;
        self.weekdays.get(idx).map(String::as_str)
    }
}

impl Default for CalendarLocale {
    fn default() -> Self {
        Self {
            months: vec![
                MonthNames::new("января", &["января", "январь"]),
                MonthNames::new("февраля", &["февраля", "февраль"]),
                MonthNames::new("марта", &["марта", "март"]),
                MonthNames::new("апреля", &["апреля", "апрель"]),
                MonthNames::new("мая", &["мая", "май"]),
                MonthNames::new("июня", &["июня", "июнь"]),
                MonthNames::new("июля", &["июля", "июль"]),
                MonthNames::new("августа", &["августа", "август"]),
                MonthNames::new("сентября", &["сентября", "сентябрь"]),
                MonthNames::new("октября", &["октября", "октябрь"]),
                MonthNames::new("ноября", &["ноября", "ноябрь"]),
                MonthNames::new("декабря", &["декабря", "декабрь"]),
            ],
            weekdays: [
                "Понедельник",
                "Вторник",
                "Среда",
                "Четверг",
                "Пятница",
                "Суббота",
                "Воскресенье",
            ]
            .iter()
            .map(|d| d.to_string())
            .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_table_is_valid() {
        assert!(CalendarLocale::default().validate().is_ok());
    }

    #[test]
    fn test_month_lookup_is_case_insensitive() {
        let cal = CalendarLocale::default();
        assert_eq!(cal.month_index("октября"), Some(10));
        assert_eq!(cal.month_index("Мая"), Some(5));
        assert_eq!(cal.month_index("ДЕКАБРЬ"), Some(12));
        assert_eq!(cal.month_index("расписание"), None);
    }

    #[test]
    fn test_names_for_date() {
        let cal = CalendarLocale::default();
        // 2026-10-16 is a Friday
        let date = NaiveDate::from_ymd_opt(2026, 10, 16).unwrap();
        assert_eq!(cal.weekday_name(date), Some("Пятница"));
        assert_eq!(cal.month_name(10), Some("октября"));
        assert_eq!(cal.month_name(0), None);
        assert_eq!(cal.month_name(13), None);
    }

    #[test]
    fn test_incomplete_table_rejected() {
        let mut cal = CalendarLocale::default();
        cal.weekdays.pop();
        assert!(cal.validate().is_err());
    }
}
