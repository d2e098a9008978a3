//! Home dashboard: holds, to-do items and registration dates.

use chrono::{Datelike, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{
    api::{RegistrarApi, SessionContext},
    config::AppConfig,
    error::{ApiResult, Notification},
};

/// A labelled registration date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportantDate {
    /// e.g. `Class Enrollment`
    pub label: String,
    /// `None` when the backend has not scheduled it.
    pub when: Option<NaiveDateTime>,
}

impl ImportantDate {
    /// `Class Enrollment: February 2nd 2024, 12pm`
    pub fn display(&self) -> String {
        match self.when {
            Some(when) => format!("{}: {}", self.label, format_long_date(when)),
            None => format!("{}: not yet scheduled", self.label),
        }
    }
}

/// Everything the home screen shows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dashboard {
    /// Registration holds.
    pub holds: Vec<String>,
    /// Outstanding tasks.
    pub todo: Vec<String>,
    /// Enrollment and housing dates.
    pub dates: Vec<ImportantDate>,
}

impl Dashboard {
    /// Fetch the student's dates; lists come from configuration. A failed
    /// date lookup leaves that date unscheduled and yields a notification.
    pub async fn load<A: RegistrarApi>(
        api: &A,
        ctx: &SessionContext,
        config: &AppConfig,
    ) -> (Self, Vec<Notification>) {
        let (enrollment, housing) =
            tokio::join!(api.enrollment_date(ctx), api.housing_date(ctx));
        let mut notes = Vec::new();
        let dates = vec![
            resolve("Class Enrollment", enrollment, &mut notes),
            resolve("Housing Registration", housing, &mut notes),
        ];
        (
            Self {
                holds: config.holds.clone(),
                todo: config.todo.clone(),
                dates,
            },
            notes,
        )
    }
}

fn resolve(
    label: &str,
    result: ApiResult<Option<NaiveDateTime>>,
    notes: &mut Vec<Notification>,
) -> ImportantDate {
    let when = match result {
        Ok(when) => when,
        Err(err) => {
            warn!(label, %err, "Failed to load date");
            notes.push(Notification::from_api_error(
                format!("Unable to Load {label} Date"),
                &err,
            ));
            None
        }
    };
    ImportantDate {
        label: label.to_string(),
        when,
    }
}

/// `February 2nd 2024, 12pm` / `April 6th 2024, 3:30pm`
pub fn format_long_date(value: NaiveDateTime) -> String {
    let day = value.day();
    let (pm, hour12) = value.hour12();
    let clock = match value.minute() {
        0 => format!("{hour12}"),
        minute => format!("{hour12}:{minute:02}"),
    };
    format!(
        "{} {}{} {}, {}{}",
        value.format("%B"),
        day,
        ordinal_suffix(day),
        value.year(),
        clock,
        if pm { "pm" } else { "am" }
    )
}

fn ordinal_suffix(day: u32) -> &'static str {
    match (day % 10, day % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{api::mock::MockRegistrar, error::ApiError};
    use chrono::NaiveDate;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .and_then(|date| date.and_hms_opt(h, min, 0))
            .expect("valid date")
    }

    #[test]
    fn long_dates_read_naturally() {
        assert_eq!(format_long_date(at(2024, 2, 2, 12, 0)), "February 2nd 2024, 12pm");
        assert_eq!(format_long_date(at(2024, 4, 6, 15, 0)), "April 6th 2024, 3pm");
        assert_eq!(format_long_date(at(2024, 8, 11, 9, 30)), "August 11th 2024, 9:30am");
        assert_eq!(format_long_date(at(2024, 8, 23, 0, 5)), "August 23rd 2024, 12:05am");
        assert_eq!(format_long_date(at(2024, 8, 21, 13, 0)), "August 21st 2024, 1pm");
    }

    #[test]
    fn unscheduled_dates_say_so() {
        let date = ImportantDate {
            label: "Housing Registration".to_string(),
            when: None,
        };
        assert_eq!(date.display(), "Housing Registration: not yet scheduled");
    }

    #[test]
    fn failed_lookup_yields_notification() {
        let mut notes = Vec::new();
        let date = resolve(
            "Class Enrollment",
            Err(ApiError::Network("refused".into())),
            &mut notes,
        );
        assert!(date.when.is_none());
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].header, "Unable to Load Class Enrollment Date");
    }

    #[tokio::test]
    async fn dashboard_uses_configured_lists() {
        let api = MockRegistrar::default();
        let config = AppConfig::default();
        let (dashboard, notes) = Dashboard::load(&api, &SessionContext::new("1"), &config).await;
        assert!(notes.is_empty());
        assert_eq!(dashboard.holds, config.holds);
        assert_eq!(dashboard.dates.len(), 2);
        assert_eq!(dashboard.dates[0].label, "Class Enrollment");
    }
}
