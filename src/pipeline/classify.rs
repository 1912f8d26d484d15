// src/pipeline/classify.rs

//! Relevance and freshness classification of announcement titles.
//!
//! Classification is a pure function of the title, the configuration and the
//! date passed in as "today". Nothing here touches the network or the clock.

use chrono::{Datelike, NaiveDate};
use regex::{Regex, RegexBuilder};

use crate::error::{AppError, Result};
use crate::models::{CalendarLocale, CandidateItem, ClassifiedItem, MissingDatePolicy, SyncConfig};
use crate::utils::normalize_whitespace;

/// A date without a year that lands further than this from today is read as
/// belonging to the neighbouring year: a December title seen in January is
/// last year's, a January title seen in December is next year's.
const YEAR_ROLLOVER_DAYS: i64 = 180;

/// Decides relevance and freshness and derives the display title.
#[derive(Debug, Clone)]
pub struct ItemClassifier {
    relevance: Regex,
    exclusion: Regex,
    freshness_window_days: i64,
    missing_date_policy: MissingDatePolicy,
    canonical_titles: bool,
    calendar: CalendarLocale,
    day_month: Regex,
    dotted: Regex,
}

fn case_insensitive(pattern: &str) -> Result<Regex> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|e| AppError::pattern(pattern, e))
}

impl ItemClassifier {
    pub fn new(sync: &SyncConfig, calendar: CalendarLocale) -> Result<Self> {
        calendar.validate()?;
        Ok(Self {
            relevance: case_insensitive(&sync.relevance_pattern)?,
            exclusion: case_insensitive(&sync.exclusion_pattern)?,
            freshness_window_days: sync.freshness_window_days,
            missing_date_policy: sync.missing_date_policy,
            canonical_titles: sync.canonical_titles,
            calendar,
            day_month: case_insensitive(r"\b([0-9]{1,2})\s+(\p{L}+)")?,
            dotted: case_insensitive(r"\b([0-9]{1,2})\.([0-9]{1,2})(?:\.([0-9]{4}|[0-9]{2}))?\b")?,
        })
    }

    /// Matches the relevance pattern and not the exclusion pattern.
    pub fn is_relevant(&self, title: &str) -> bool {
        self.relevance.is_match(title) && !self.exclusion.is_match(title)
    }

    /// First date in the title, resolved to a calendar date.
    ///
    /// `<day> <month-name>` tokens win over `<day>.<month>[.<year>]` tokens.
    pub fn extract_date(&self, title: &str, today: NaiveDate) -> Option<NaiveDate> {
        let named = self.day_month.captures_iter(title).find_map(|caps| {
            let day: u32 = caps[1].parse().ok()?;
            let month = self.calendar.month_index(&caps[2])?;
            self.resolve(day, month, None, today)
        });
        if named.is_some() {
            return named;
        }

        self.dotted.captures_iter(title).find_map(|caps| {
            let day: u32 = caps[1].parse().ok()?;
            let month: u32 = caps[2].parse().ok()?;
            let year = caps
                .get(3)
                .and_then(|m| m.as_str().parse::<i32>().ok())
                .map(|y| if y < 100 { 2000 + y } else { y });
            self.resolve(day, month, year, today)
        })
    }

    fn resolve(&self, day: u32, month: u32, year: Option<i32>, today: NaiveDate) -> Option<NaiveDate> {
        if let Some(year) = year {
            return NaiveDate::from_ymd_opt(year, month, day);
        }

        let date = NaiveDate::from_ymd_opt(today.year(), month, day);
        let offset = date.map(|d| (d - today).num_days());
        match offset {
            Some(days) if days > YEAR_ROLLOVER_DAYS => NaiveDate::from_ymd_opt(today.year() - 1, month, day),
            Some(days) if days < -YEAR_ROLLOVER_DAYS => NaiveDate::from_ymd_opt(today.year() + 1, month, day),
            Some(_) => date,
            // 29 February outside a leap year may still exist in a neighbouring one
            None => [today.year() + 1, today.year() - 1]
                .into_iter()
                .filter_map(|year| NaiveDate::from_ymd_opt(year, month, day))
                .find(|d| (*d - today).num_days().abs() <= YEAR_ROLLOVER_DAYS),
        }
    }

    /// Within the freshness window; future dates are always fresh.
    pub fn is_fresh(&self, occurs_on: Option<NaiveDate>, today: NaiveDate) -> bool {
        match occurs_on {
            Some(date) => (today - date).num_days() <= self.freshness_window_days,
            None => self.missing_date_policy == MissingDatePolicy::AssumeFresh,
        }
    }

    /// `<weekday> - <day> <month>` for a resolved date.
    pub fn canonical_title(&self, date: NaiveDate) -> Option<String> {
        let weekday = self.calendar.weekday_name(date)?;
        let month = self.calendar.month_name(date.month())?;
        Some(format!("{} - {} {}", weekday, date.day(), month))
    }

    pub fn classify(&self, candidate: CandidateItem, today: NaiveDate) -> ClassifiedItem {
        let is_relevant = self.is_relevant(&candidate.raw_title);
        let occurs_on = self.extract_date(&candidate.raw_title, today);
        let is_fresh = self.is_fresh(occurs_on, today);

        let normalized_title = occurs_on
            .filter(|_| self.canonical_titles)
            .and_then(|date| self.canonical_title(date))
            .unwrap_or_else(|| normalize_whitespace(&candidate.raw_title));

        ClassifiedItem {
            candidate,
            normalized_title,
            occurs_on,
            is_relevant,
            is_fresh,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 16).unwrap()
    }

    fn classifier() -> ItemClassifier {
        ItemClassifier::new(&SyncConfig::default(), CalendarLocale::default()).unwrap()
    }

    fn classify(title: &str) -> ClassifiedItem {
        classifier().classify(
            CandidateItem {
                source_ref: "https://college.example/news/show/1".to_string(),
                raw_title: title.to_string(),
            },
            today(),
        )
    }

    #[test]
    fn test_relevance_filter() {
        let c = classifier();
        assert!(c.is_relevant("Изменения в расписании на 17 октября"));
        assert!(c.is_relevant("ИЗМЕНЕНИЕ В РАСПИСАНИИ"));
        assert!(!c.is_relevant("Изменения в расписании экзамена"));
        assert!(!c.is_relevant("Изменения в расписании: экзамен по физике 17 октября"));
        assert!(!c.is_relevant("Изменения в расписании сессии"));
        assert!(!c.is_relevant("Расписание звонков"));
    }

    #[test]
    fn test_excluded_regardless_of_date() {
        let item = classify("Изменения в расписании на 16 октября (экзамен)");
        assert!(item.is_fresh);
        assert!(!item.is_relevant);
        assert!(!item.is_actionable());
    }

    #[test]
    fn test_extract_named_date() {
        let c = classifier();
        assert_eq!(
            c.extract_date("Изменения в расписании на 17 октября", today()),
            NaiveDate::from_ymd_opt(2026, 10, 17)
        );
        assert_eq!(
            c.extract_date("Изменения в расписании на 3 Ноября", today()),
            NaiveDate::from_ymd_opt(2026, 11, 3)
        );
    }

    #[test]
    fn test_extract_dotted_date() {
        let c = classifier();
        assert_eq!(
            c.extract_date("Изменения в расписании 17.10", today()),
            NaiveDate::from_ymd_opt(2026, 10, 17)
        );
        assert_eq!(
            c.extract_date("Изменения в расписании 05.01.2027", today()),
            NaiveDate::from_ymd_opt(2027, 1, 5)
        );
        assert_eq!(
            c.extract_date("Изменения в расписании 05.01.27", today()),
            NaiveDate::from_ymd_opt(2027, 1, 5)
        );
    }

    #[test]
    fn test_impossible_dates_are_ignored() {
        let c = classifier();
        assert_eq!(c.extract_date("Изменения 31.02", today()), None);
        assert_eq!(c.extract_date("Изменения 45 октября", today()), None);
        assert_eq!(c.extract_date("Изменения в расписании", today()), None);
    }

    #[test]
    fn test_year_rollover() {
        let c = classifier();
        let january = NaiveDate::from_ymd_opt(2027, 1, 2).unwrap();
        assert_eq!(
            c.extract_date("Изменения в расписании на 30 декабря", january),
            NaiveDate::from_ymd_opt(2026, 12, 30)
        );
    }

    #[test]
    fn test_january_title_in_december_is_next_year() {
        let c = classifier();
        let late_december = NaiveDate::from_ymd_opt(2026, 12, 29).unwrap();
        assert_eq!(
            c.extract_date("Изменения в расписании на 9 января", late_december),
            NaiveDate::from_ymd_opt(2027, 1, 9)
        );

        let new_years_eve = NaiveDate::from_ymd_opt(2026, 12, 31).unwrap();
        let item = c.classify(
            CandidateItem {
                source_ref: "https://college.example/news/show/2".to_string(),
                raw_title: "Изменения в расписании на 1 января".to_string(),
            },
            new_years_eve,
        );
        assert_eq!(item.occurs_on, NaiveDate::from_ymd_opt(2027, 1, 1));
        assert!(item.is_actionable());
        assert_eq!(item.normalized_title, "Пятница - 1 января");
    }

    #[test]
    fn test_freshness_window() {
        let c = classifier();
        let ten_days_ago = today() - chrono::Duration::days(10);
        let tomorrow = today() + chrono::Duration::days(1);
        let three_days_ago = today() - chrono::Duration::days(3);

        assert!(!c.is_fresh(Some(ten_days_ago), today()));
        assert!(c.is_fresh(Some(tomorrow), today()));
        assert!(c.is_fresh(Some(three_days_ago), today()));
        assert!(c.is_fresh(Some(today()), today()));
    }

    #[test]
    fn test_stale_title_is_not_actionable() {
        let item = classify("Изменения в расписании на 6 октября");
        assert!(item.is_relevant);
        assert!(!item.is_fresh);
        assert!(!item.is_actionable());

        let item = classify("Изменения в расписании на 17 октября");
        assert!(item.is_actionable());
    }

    #[test]
    fn test_missing_date_policy() {
        assert!(classify("Изменения в расписании").is_fresh);

        let sync = SyncConfig {
            missing_date_policy: MissingDatePolicy::Reject,
            ..SyncConfig::default()
        };
        let strict = ItemClassifier::new(&sync, CalendarLocale::default()).unwrap();
        assert!(!strict.is_fresh(None, today()));
    }

    #[test]
    fn test_canonical_title_uses_computed_weekday() {
        // 2026-10-17 is a Saturday, 2026-10-19 a Monday
        let item = classify("Изменения  в расписании на 17 октября");
        assert_eq!(item.normalized_title, "Суббота - 17 октября");

        let item = classify("Изменения в расписании 19.10");
        assert_eq!(item.normalized_title, "Понедельник - 19 октября");
    }

    #[test]
    fn test_raw_title_passes_through_without_date() {
        let item = classify("  Изменения   в расписании ");
        assert_eq!(item.normalized_title, "Изменения в расписании");
        assert_eq!(item.occurs_on, None);
    }

    #[test]
    fn test_canonical_titles_can_be_disabled() {
        let sync = SyncConfig {
            canonical_titles: false,
            ..SyncConfig::default()
        };
        let c = ItemClassifier::new(&sync, CalendarLocale::default()).unwrap();
        let item = c.classify(
            CandidateItem {
                source_ref: "r".to_string(),
                raw_title: "Изменения в расписании на 17 октября".to_string(),
            },
            today(),
        );
        assert_eq!(item.normalized_title, "Изменения в расписании на 17 октября");
        assert!(item.occurs_on.is_some());
    }

    #[test]
    fn test_invalid_pattern_is_fatal() {
        let sync = SyncConfig {
            relevance_pattern: "(unclosed".to_string(),
            ..SyncConfig::default()
        };
        let err = ItemClassifier::new(&sync, CalendarLocale::default()).unwrap_err();
        assert!(err.is_fatal());
    }
}
