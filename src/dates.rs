//! Best-effort date extraction from hand-typed sheet cells.
//!
//! Patterns are tried in list order and the first pattern that matches
//! anywhere in the text wins, even when a later pattern would match earlier
//! in the string. Within one pattern the leftmost match wins.

use crate::error::{LedgerError, Result};
use chrono::{Datelike, Local, NaiveDate};
use regex::{Captures, Regex};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Shape of a date the extractor looks for. Month and day accept one or two
/// digits, years exactly four.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DatePattern {
    /// `2025-08-01`
    YearMonthDay { separator: char },
    /// `08/01/2025`
    MonthDayYear { separator: char },
    /// `01.08.2025`
    DayMonthYear { separator: char },
    /// `08/01`, year taken from the calendar at extraction time
    MonthDay { separator: char },
}

impl DatePattern {
    /// `YYYY-MM-DD`, `MM/DD/YYYY`, `MM-DD-YYYY`, `MM/DD`.
    pub fn defaults() -> Vec<DatePattern> {
        vec![
            DatePattern::YearMonthDay { separator: '-' },
            DatePattern::MonthDayYear { separator: '/' },
            DatePattern::MonthDayYear { separator: '-' },
            DatePattern::MonthDay { separator: '/' },
        ]
    }

    fn regex_source(&self) -> String {
        const MD: &str = r"\d{1,2}";
        const YEAR: &str = r"\d{4}";
        match *self {
            DatePattern::YearMonthDay { separator } => {
                let s = regex::escape(&separator.to_string());
                format!(r"(?P<y>{YEAR}){s}(?P<m>{MD}){s}(?P<d>{MD})")
            }
            DatePattern::MonthDayYear { separator } => {
                let s = regex::escape(&separator.to_string());
                format!(r"(?P<m>{MD}){s}(?P<d>{MD}){s}(?P<y>{YEAR})")
            }
            DatePattern::DayMonthYear { separator } => {
                let s = regex::escape(&separator.to_string());
                format!(r"(?P<d>{MD}){s}(?P<m>{MD}){s}(?P<y>{YEAR})")
            }
            DatePattern::MonthDay { separator } => {
                let s = regex::escape(&separator.to_string());
                format!(r"(?P<m>{MD}){s}(?P<d>{MD})")
            }
        }
    }

    fn validate(&self) -> Result<()> {
        let separator = match *self {
            DatePattern::YearMonthDay { separator }
            | DatePattern::MonthDayYear { separator }
            | DatePattern::DayMonthYear { separator }
            | DatePattern::MonthDay { separator } => separator,
        };
        if separator.is_ascii_digit() || separator.is_whitespace() {
            return Err(LedgerError::InvalidDatePattern {
                pattern: format!("{:?}", self),
                details: format!("separator '{}' must not be a digit or whitespace", separator),
            });
        }
        Ok(())
    }
}

struct CompiledPattern {
    pattern: DatePattern,
    regex: Regex,
}

/// Ordered list of compiled [`DatePattern`]s.
pub struct DateExtractor {
    patterns: Vec<CompiledPattern>,
}

impl std::fmt::Debug for DateExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.patterns.iter().map(|p| &p.pattern))
            .finish()
    }
}

impl DateExtractor {
    pub fn new(patterns: &[DatePattern]) -> Result<Self> {
        if patterns.is_empty() {
            return Err(LedgerError::InvalidConfig(
                "at least one date pattern is required".to_string(),
            ));
        }

        let patterns = patterns
            .iter()
            .map(|pattern| {
                pattern.validate()?;
                let regex = Regex::new(&pattern.regex_source()).map_err(|e| {
                    LedgerError::InvalidDatePattern {
                        pattern: format!("{:?}", pattern),
                        details: e.to_string(),
                    }
                })?;
                Ok(CompiledPattern {
                    pattern: *pattern,
                    regex,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { patterns })
    }

    /// Extracts the first date, assuming the current calendar year for
    /// year-less matches.
    pub fn extract(&self, text: &str) -> Option<NaiveDate> {
        self.extract_with_year(text, Local::now().year())
    }

    pub fn extract_with_year(&self, text: &str, fallback_year: i32) -> Option<NaiveDate> {
        let normalized = normalize_dashes(text);
        self.find_first(&normalized, fallback_year)
            .and_then(|found| found.date)
    }

    /// Start and, when a second date follows it, end of a range such as
    /// `"2025-08-01 -- 2025-08-07"`.
    ///
    /// A year-less end that lands before the start is moved into the next
    /// year (`"12/28 - 1/3"`). An end that is still before the start is
    /// dropped.
    pub fn extract_range_with_year(
        &self,
        text: &str,
        fallback_year: i32,
    ) -> Option<(NaiveDate, Option<NaiveDate>)> {
        let normalized = normalize_dashes(text);
        let first = self.find_first(&normalized, fallback_year)?;
        let start = first.date?;

        let end = self
            .find_first(&normalized[first.end..], fallback_year)
            .and_then(|second| {
                let end = second.date?;
                if end >= start {
                    Some(end)
                } else if !second.has_year {
                    end.with_year(start.year() + 1).filter(|rolled| *rolled >= start)
                } else {
                    None
                }
            });
        Some((start, end))
    }

    /// Result of the first pattern that matches. `date` is `None` when that
    /// match is not a real date.
    fn find_first(&self, text: &str, fallback_year: i32) -> Option<PatternMatch> {
        self.patterns.iter().find_map(|compiled| {
            compiled.regex.captures(text).map(|caps| PatternMatch {
                date: parse_captures(&caps, fallback_year),
                end: caps.get(0).map_or(text.len(), |m| m.end()),
                has_year: caps.name("y").is_some(),
            })
        })
    }
}

struct PatternMatch {
    date: Option<NaiveDate>,
    /// Byte offset just past the match
    end: usize,
    has_year: bool,
}

fn parse_captures(caps: &Captures<'_>, fallback_year: i32) -> Option<NaiveDate> {
    let year = match caps.name("y") {
        Some(y) => y.as_str().parse().ok()?,
        None => fallback_year,
    };
    let month = caps.name("m")?.as_str().parse().ok()?;
    let day = caps.name("d")?.as_str().parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Rewrites en/em dashes (including their mis-decoded UTF-8 forms) and runs
/// of hyphens to a single ASCII hyphen.
pub fn normalize_dashes(text: &str) -> String {
    const DASHES: [&str; 8] = [
        "\u{e2}\u{20ac}\u{201c}",
        "\u{e2}\u{20ac}\u{201d}",
        "\u{e2}\u{80}\u{93}",
        "\u{e2}\u{80}\u{94}",
        "\u{2013}",
        "\u{2014}",
        "\u{2012}",
        "\u{2212}",
    ];

    let mut out = text.to_string();
    for dash in DASHES {
        out = out.replace(dash, "-");
    }
    while out.contains("--") {
        out = out.replace("--", "-");
    }
    out.trim().to_string()
}

fn standard_extractor() -> &'static DateExtractor {
    static STANDARD: OnceLock<DateExtractor> = OnceLock::new();
    STANDARD.get_or_init(|| {
        DateExtractor::new(&DatePattern::defaults()).expect("built-in date patterns compile")
    })
}

/// [`DateExtractor::extract`] with the default pattern list.
pub fn extract_first_valid_date(text: &str) -> Option<NaiveDate> {
    standard_extractor().extract(text)
}
