//! Shared domain models.

use std::fmt;

use chrono::{NaiveTime, Timelike, Weekday};
use serde::{Deserialize, Serialize};

pub mod wire;

pub use wire::{parse_time_of_day, RawSection, SectionRecord};

/// Single-character weekday code, Sunday through Saturday.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DayLetter {
    /// `U`
    Sunday,
    /// `M`
    Monday,
    /// `T`
    Tuesday,
    /// `W`
    Wednesday,
    /// `R`
    Thursday,
    /// `F`
    Friday,
    /// `S`
    Saturday,
}

impl DayLetter {
    /// The full alphabet in calendar order.
    pub const ALL: [DayLetter; 7] = [
        DayLetter::Sunday,
        DayLetter::Monday,
        DayLetter::Tuesday,
        DayLetter::Wednesday,
        DayLetter::Thursday,
        DayLetter::Friday,
        DayLetter::Saturday,
    ];

    /// Parse a single letter. Case-insensitive.
    pub fn from_char(ch: char) -> Option<Self> {
        match ch.to_ascii_uppercase() {
            'U' => Some(DayLetter::Sunday),
            'M' => Some(DayLetter::Monday),
            'T' => Some(DayLetter::Tuesday),
            'W' => Some(DayLetter::Wednesday),
            'R' => Some(DayLetter::Thursday),
            'F' => Some(DayLetter::Friday),
            'S' => Some(DayLetter::Saturday),
            _ => None,
        }
    }

    /// Letter used on the wire.
    pub fn as_char(self) -> char {
        match self {
            DayLetter::Sunday => 'U',
            DayLetter::Monday => 'M',
            DayLetter::Tuesday => 'T',
            DayLetter::Wednesday => 'W',
            DayLetter::Thursday => 'R',
            DayLetter::Friday => 'F',
            DayLetter::Saturday => 'S',
        }
    }

    /// Days elapsed since Sunday.
    pub fn offset_from_sunday(self) -> u32 {
        self as u32
    }

    /// Matching chrono weekday.
    pub fn weekday(self) -> Weekday {
        match self {
            DayLetter::Sunday => Weekday::Sun,
            DayLetter::Monday => Weekday::Mon,
            DayLetter::Tuesday => Weekday::Tue,
            DayLetter::Wednesday => Weekday::Wed,
            DayLetter::Thursday => Weekday::Thu,
            DayLetter::Friday => Weekday::Fri,
            DayLetter::Saturday => Weekday::Sat,
        }
    }

    fn bit(self) -> u8 {
        1 << (self as u8)
    }
}

/// Set of meeting days. Iteration is always Sunday first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Days(u8);

impl Days {
    /// Parse a day string such as `"MWF"`. Unknown characters are ignored and
    /// repeated letters collapse.
    pub fn parse(input: &str) -> Self {
        input
            .chars()
            .filter_map(DayLetter::from_char)
            .fold(Days::default(), |days, letter| days.with(letter))
    }

    /// Copy of the set with `letter` added.
    pub fn with(self, letter: DayLetter) -> Self {
        Days(self.0 | letter.bit())
    }

    /// Membership test.
    pub fn contains(self, letter: DayLetter) -> bool {
        self.0 & letter.bit() != 0
    }

    /// True when both sets share at least one day.
    pub fn intersects(self, other: Days) -> bool {
        self.0 & other.0 != 0
    }

    /// No meeting days at all.
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Number of distinct meeting days.
    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    /// Days in Sunday-first order.
    pub fn iter(self) -> impl Iterator<Item = DayLetter> {
        DayLetter::ALL
            .into_iter()
            .filter(move |letter| self.contains(*letter))
    }
}

impl fmt::Display for Days {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for letter in self.iter() {
            write!(f, "{}", letter.as_char())?;
        }
        Ok(())
    }
}

impl Serialize for Days {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Days {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(Days::parse(&raw))
    }
}

/// A scheduled offering of a course.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    /// Identifier unique within a search or cart result set.
    pub id: String,
    /// Subject prefix, `/`-joined when cross-listed (e.g. `CSE/ISE`).
    pub subject: String,
    /// Course number (e.g. `316`).
    pub code: String,
    /// Section number (e.g. `01`).
    pub section: String,
    /// Meeting days.
    pub days: Days,
    /// Start of each meeting (inclusive).
    pub time_start: NaiveTime,
    /// End of each meeting (exclusive).
    pub time_end: NaiveTime,
    /// Room or building.
    pub room: String,
    /// Instructor name as sent by the backend.
    pub instructor: String,
    /// Credit hours, never negative.
    pub credits: f64,
    /// Opaque prerequisite expression; blank means no check is needed.
    pub prereq: String,
    /// Requirement-category tags.
    pub sbc: Vec<String>,
    /// Course title.
    pub title: String,
    /// Catalogue description.
    pub description: String,
}

impl Section {
    /// `CSE 316-01`
    pub fn label(&self) -> String {
        format!("{} {}-{}", self.subject, self.code, self.section)
    }

    /// `CSE 316`
    pub fn course_label(&self) -> String {
        format!("{} {}", self.subject, self.code)
    }

    /// Title used for calendar events: `CSE 316 - 01`.
    pub fn event_title(&self) -> String {
        format!("{} {} - {}", self.subject, self.code, self.section)
    }

    /// Whether adding this section requires a server-side prerequisite check.
    pub fn requires_prereq_check(&self) -> bool {
        !self.prereq.trim().is_empty()
    }

    /// True when both sections are the same course, regardless of section.
    pub fn same_course(&self, other: &Section) -> bool {
        self.subject == other.subject && self.code == other.code
    }

    /// Instructor rendered as `first-initial. last-name(s)`.
    pub fn instructor_display(&self) -> String {
        format_instructor(&self.instructor)
    }

    /// Meeting pattern such as `TR 11:00-12:20`.
    pub fn meeting_pattern(&self) -> String {
        format!(
            "{} {}-{}",
            self.days,
            format_clock(self.time_start),
            format_clock(self.time_end)
        )
    }
}

/// Render a name as `P. Fodor`. Single names are returned unchanged.
pub fn format_instructor(name: &str) -> String {
    let mut parts = name.split_whitespace();
    let Some(first) = parts.next() else {
        return "TBA".to_string();
    };
    let rest = parts.collect::<Vec<_>>();
    if rest.is_empty() {
        return first.to_string();
    }
    let initial = first
        .chars()
        .next()
        .map(|ch| ch.to_uppercase().to_string())
        .unwrap_or_default();
    format!("{initial}. {}", rest.join(" "))
}

/// `HH:MM`, 24-hour.
pub fn format_clock(time: NaiveTime) -> String {
    format!("{:02}:{:02}", time.hour(), time.minute())
}

/// Sum of credits over a set of sections.
pub fn total_credits<'a>(sections: impl IntoIterator<Item = &'a Section>) -> f64 {
    sections.into_iter().map(|section| section.credits).sum()
}
