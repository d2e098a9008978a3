//! Section records as exchanged with the registrar backend.

use anyhow::{anyhow, Result};
use chrono::{DateTime, NaiveDateTime, NaiveTime};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{format_clock, Days, Section};

/// Section record in the shape returned by `/search` and `/getCart`.
///
/// Backend documents are loosely typed: ids may be extended-JSON objects,
/// cross-listed subjects arrive as arrays and times as full date-times.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSection {
    #[serde(default, alias = "_id")]
    id: Value,
    #[serde(default, rename = "class")]
    subject: Value,
    #[serde(default)]
    code: Value,
    #[serde(default)]
    section: Value,
    #[serde(default)]
    days: Option<String>,
    #[serde(default)]
    time_start: Option<String>,
    #[serde(default)]
    time_end: Option<String>,
    #[serde(default)]
    instructor: Option<String>,
    #[serde(default)]
    room: Option<String>,
    #[serde(default)]
    credits: Value,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    prereq: Option<String>,
    #[serde(default)]
    sbc: Value,
}

impl RawSection {
    /// Convert the loose backend record into a [`Section`].
    pub fn normalize(self) -> Result<Section> {
        let id = scalar_to_string(&self.id)
            .or_else(|| self.id.get("$oid").and_then(scalar_to_string))
            .filter(|id| !id.is_empty())
            .ok_or_else(|| anyhow!("section record has no id"))?;

        let subject = join_subjects(&self.subject);
        let code = scalar_to_string(&self.code).unwrap_or_default();
        if subject.is_empty() || code.is_empty() {
            return Err(anyhow!("section {id} is missing its subject or course code"));
        }

        let time_start = self
            .time_start
            .as_deref()
            .and_then(parse_time_of_day)
            .ok_or_else(|| anyhow!("section {id} has an unreadable start time"))?;
        let time_end = self
            .time_end
            .as_deref()
            .and_then(parse_time_of_day)
            .ok_or_else(|| anyhow!("section {id} has an unreadable end time"))?;

        let credits = match &self.credits {
            Value::Null => 0.0,
            Value::Number(num) => num.as_f64().unwrap_or(0.0),
            Value::String(s) => s
                .trim()
                .parse::<f64>()
                .map_err(|_| anyhow!("section {id} has non-numeric credits '{s}'"))?,
            other => return Err(anyhow!("section {id} has invalid credits {other}")),
        };
        if credits < 0.0 || !credits.is_finite() {
            return Err(anyhow!("section {id} has negative credits"));
        }

        Ok(Section {
            id,
            subject,
            code,
            section: scalar_to_string(&self.section).unwrap_or_default(),
            days: Days::parse(self.days.as_deref().unwrap_or_default()),
            time_start,
            time_end,
            room: trimmed(self.room),
            instructor: trimmed(self.instructor),
            credits,
            prereq: trimmed(self.prereq),
            sbc: split_tags(&self.sbc),
            title: trimmed(self.title),
            description: trimmed(self.description),
        })
    }
}

/// Section record in the shape `/saveCart` expects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionRecord {
    /// Backend identifier.
    pub id: String,
    /// Subject, `/`-joined when cross-listed.
    #[serde(rename = "class")]
    pub subject: String,
    /// Course number.
    pub code: String,
    /// Section number.
    pub section: String,
    /// Day letters, e.g. `TR`.
    pub days: String,
    /// `HH:MM`
    pub time_start: String,
    /// `HH:MM`
    pub time_end: String,
    /// Instructor as stored.
    pub instructor: String,
    /// Room as stored.
    pub room: String,
    /// Credit hours.
    pub credits: f64,
    /// Course title.
    pub title: String,
    /// Catalogue description.
    pub description: String,
    /// Prerequisite expression.
    pub prereq: String,
    /// Requirement-category tags.
    pub sbc: Vec<String>,
}

impl From<&Section> for SectionRecord {
    fn from(section: &Section) -> Self {
        Self {
            id: section.id.clone(),
            subject: section.subject.clone(),
            code: section.code.clone(),
            section: section.section.clone(),
            days: section.days.to_string(),
            time_start: format_clock(section.time_start),
            time_end: format_clock(section.time_end),
            instructor: section.instructor.clone(),
            room: section.room.clone(),
            credits: section.credits,
            title: section.title.clone(),
            description: section.description.clone(),
            prereq: section.prereq.clone(),
            sbc: section.sbc.clone(),
        }
    }
}

/// Extract the time-of-day from the formats the backend has been seen to use:
/// RFC 3339 date-times, naive date-times, `HH:MM[:SS]` and `h:MM AM`.
pub fn parse_time_of_day(input: &str) -> Option<NaiveTime> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(input) {
        return Some(parsed.naive_local().time());
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(input, format) {
            return Some(parsed.time());
        }
    }

    for format in ["%H:%M:%S", "%H:%M"] {
        if let Ok(parsed) = NaiveTime::parse_from_str(input, format) {
            return Some(parsed);
        }
    }

    let caps = TWELVE_HOUR_RE.captures(input)?;
    let hour = caps.get(1)?.as_str().parse::<u32>().ok()?;
    let minute = caps.get(2)?.as_str().parse::<u32>().ok()?;
    if !(1..=12).contains(&hour) {
        return None;
    }
    let pm = caps.get(3)?.as_str().eq_ignore_ascii_case("p");
    let hour = match (hour, pm) {
        (12, false) => 0,
        (12, true) => 12,
        (h, true) => h + 12,
        (h, false) => h,
    };
    NaiveTime::from_hms_opt(hour, minute, 0)
}

static TWELVE_HOUR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{1,2}):(\d{2})\s*([AaPp])\.?[Mm]\.?$")
        .expect("failed to compile 12-hour time regex")
});

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(num) => Some(num.to_string()),
        _ => None,
    }
}

fn join_subjects(value: &Value) -> String {
    match value {
        Value::Array(items) => items
            .iter()
            .filter_map(scalar_to_string)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("/"),
        other => scalar_to_string(other).unwrap_or_default(),
    }
}

fn split_tags(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .iter()
            .filter_map(scalar_to_string)
            .filter(|s| !s.is_empty())
            .collect(),
        Value::String(s) => s
            .split(',')
            .map(|tag| tag.trim().to_string())
            .filter(|tag| !tag.is_empty())
            .collect(),
        _ => Vec::new(),
    }
}

fn trimmed(value: Option<String>) -> String {
    value.map(|s| s.trim().to_string()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn hm(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).expect("valid time")
    }

    #[test]
    fn normalizes_cross_listed_record() -> Result<()> {
        let raw: RawSection = serde_json::from_value(json!({
            "id": {"$oid": "6750c0ffee"},
            "class": ["CSE", "ISE"],
            "code": "316",
            "section": "01",
            "days": "TR",
            "timeStart": "2024-12-02T11:00:00Z",
            "timeEnd": "2024-12-02T12:20:00Z",
            "instructor": "Paul Fodor",
            "room": "Frey 102",
            "credits": 3,
            "title": "Fundamentals of Software Development",
            "description": "",
            "prereq": "CSE214",
            "sbc": "TECH, ESI"
        }))?;
        let section = raw.normalize()?;
        assert_eq!(section.id, "6750c0ffee");
        assert_eq!(section.subject, "CSE/ISE");
        assert_eq!(section.days.to_string(), "TR");
        assert_eq!(section.time_start, hm(11, 0));
        assert_eq!(section.time_end, hm(12, 20));
        assert_eq!(section.credits, 3.0);
        assert_eq!(section.sbc, vec!["TECH".to_string(), "ESI".to_string()]);
        assert!(section.requires_prereq_check());
        Ok(())
    }

    #[test]
    fn rejects_records_without_times() -> Result<()> {
        let raw: RawSection = serde_json::from_value(json!({
            "id": "x1",
            "class": "CSE",
            "code": "300",
            "days": "MW",
            "timeStart": "whenever"
        }))?;
        assert!(raw.normalize().is_err());
        Ok(())
    }

    #[test]
    fn rejects_negative_credits() -> Result<()> {
        let raw: RawSection = serde_json::from_value(json!({
            "id": "x2",
            "class": "AMS",
            "code": "301",
            "timeStart": "09:00",
            "timeEnd": "10:00",
            "credits": -1
        }))?;
        assert!(raw.normalize().is_err());
        Ok(())
    }

    #[test]
    fn parses_time_formats() {
        assert_eq!(parse_time_of_day("14:30"), Some(hm(14, 30)));
        assert_eq!(parse_time_of_day("14:30:00"), Some(hm(14, 30)));
        assert_eq!(parse_time_of_day("2:30 PM"), Some(hm(14, 30)));
        assert_eq!(parse_time_of_day("12:05am"), Some(hm(0, 5)));
        assert_eq!(parse_time_of_day("12:00 p.m."), Some(hm(12, 0)));
        assert_eq!(parse_time_of_day("2024-12-03T14:30"), Some(hm(14, 30)));
        assert_eq!(
            parse_time_of_day("2024-12-03T09:15:00-05:00"),
            Some(hm(9, 15))
        );
        assert_eq!(parse_time_of_day("13:00 PM"), None);
        assert_eq!(parse_time_of_day(""), None);
    }

    #[test]
    fn record_uses_backend_keys() -> Result<()> {
        let raw: RawSection = serde_json::from_value(json!({
            "id": "abc",
            "class": "CSE",
            "code": "320",
            "section": "02",
            "days": "MW",
            "timeStart": "09:00",
            "timeEnd": "10:20",
            "credits": "3"
        }))?;
        let section = raw.normalize()?;
        let value = serde_json::to_value(SectionRecord::from(&section))?;
        assert_eq!(value["class"], json!("CSE"));
        assert_eq!(value["timeStart"], json!("09:00"));
        assert_eq!(value["timeEnd"], json!("10:20"));
        assert_eq!(value["section"], json!("02"));
        Ok(())
    }
}
