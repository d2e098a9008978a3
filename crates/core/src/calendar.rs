//! Weekly calendar projection of the cart.

use anyhow::{bail, Result};
use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::models::{DayLetter, Section};

/// Sunday of the week every event is drawn on. Only weekday and time-of-day
/// are meaningful; the date itself is a rendering canvas.
static REFERENCE_SUNDAY: Lazy<NaiveDate> =
    Lazy::new(|| NaiveDate::from_ymd_opt(2024, 12, 1).expect("invalid reference date"));

/// Date of `day` within the reference week.
pub fn reference_date(day: DayLetter) -> NaiveDate {
    *REFERENCE_SUNDAY + Duration::days(i64::from(day.offset_from_sunday()))
}

/// One meeting of a section on one weekday.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarEvent {
    /// `CSE 316 - 01`
    pub title: String,
    /// Section the event came from.
    pub section_id: String,
    /// Weekday of the meeting.
    pub day: DayLetter,
    /// Start on the reference week.
    pub start: NaiveDateTime,
    /// End on the reference week.
    pub end: NaiveDateTime,
}

impl CalendarEvent {
    /// Portion of the event that falls inside `window`, or `None` when the
    /// event is not visible at all.
    pub fn clip(&self, window: &DisplayWindow) -> Option<(NaiveDateTime, NaiveDateTime)> {
        let midnight = self.start.date().and_time(NaiveTime::default());
        let window_start = midnight + Duration::hours(i64::from(window.start_hour));
        let window_end = midnight + Duration::hours(i64::from(window.end_hour));
        let start = self.start.max(window_start);
        let end = self.end.min(window_end);
        (start < end).then_some((start, end))
    }
}

/// Visible hour range of the calendar, `[start_hour, end_hour)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayWindow {
    /// First visible hour.
    pub start_hour: u32,
    /// Hour the view ends at; may be 24.
    pub end_hour: u32,
}

impl Default for DisplayWindow {
    fn default() -> Self {
        Self {
            start_hour: 8,
            end_hour: 22,
        }
    }
}

impl DisplayWindow {
    /// Reject empty or out-of-day windows.
    pub fn validate(&self) -> Result<()> {
        if self.end_hour > 24 {
            bail!("display window ends after midnight ({}:00)", self.end_hour);
        }
        if self.start_hour >= self.end_hour {
            bail!(
                "display window start {}:00 is not before end {}:00",
                self.start_hour,
                self.end_hour
            );
        }
        Ok(())
    }

    fn start_minute(&self) -> u32 {
        self.start_hour * 60
    }

    fn end_minute(&self) -> u32 {
        self.end_hour * 60
    }
}

/// Expand one section into an event per meeting day, Sunday first.
pub fn project_section(section: &Section) -> Vec<CalendarEvent> {
    section
        .days
        .iter()
        .map(|day| {
            let date = reference_date(day);
            CalendarEvent {
                title: section.event_title(),
                section_id: section.id.clone(),
                day,
                start: date.and_time(section.time_start),
                end: date.and_time(section.time_end),
            }
        })
        .collect()
}

/// Expand a cart, keeping cart order and weekday order within each section.
/// Events outside the display window are kept; renderers clip them.
pub fn project(sections: &[Section]) -> Vec<CalendarEvent> {
    sections.iter().flat_map(project_section).collect()
}

/// Events bucketed into fixed-length time slots per weekday, for text
/// renderers.
#[derive(Debug, Clone)]
pub struct WeekGrid {
    window: DisplayWindow,
    slot_minutes: u32,
    events: Vec<CalendarEvent>,
    cells: Vec<[Option<usize>; 7]>,
}

/// An occupied grid cell.
#[derive(Debug, Clone, Copy)]
pub struct GridCell<'a> {
    /// Event covering the slot.
    pub event: &'a CalendarEvent,
    /// True on the first visible slot of the event.
    pub first: bool,
}

impl WeekGrid {
    /// Lay `events` out over `window` in slots of `slot_minutes`.
    pub fn build(
        events: Vec<CalendarEvent>,
        window: DisplayWindow,
        slot_minutes: u32,
    ) -> Result<Self> {
        window.validate()?;
        if slot_minutes == 0 {
            bail!("slot length must be positive");
        }
        let span = window.end_minute() - window.start_minute();
        let rows = span.div_ceil(slot_minutes) as usize;
        let mut cells = vec![[None; 7]; rows];

        for (index, event) in events.iter().enumerate() {
            let column = event.day.offset_from_sunday() as usize;
            let start = minute_of_day(event.start);
            let end = minute_of_day(event.end);
            for (row, slots) in cells.iter_mut().enumerate() {
                let slot_start = window.start_minute() + row as u32 * slot_minutes;
                let slot_end = slot_start + slot_minutes;
                if start < slot_end && end > slot_start && slots[column].is_none() {
                    slots[column] = Some(index);
                }
            }
        }

        Ok(Self {
            window,
            slot_minutes,
            events,
            cells,
        })
    }

    /// Number of time slots.
    pub fn rows(&self) -> usize {
        self.cells.len()
    }

    /// Slot length in minutes.
    pub fn slot_minutes(&self) -> u32 {
        self.slot_minutes
    }

    /// Start time of a slot row, as minutes since midnight.
    pub fn slot_start_minute(&self, row: usize) -> u32 {
        self.window.start_minute() + row as u32 * self.slot_minutes
    }

    /// Projected events, in projection order.
    pub fn events(&self) -> &[CalendarEvent] {
        &self.events
    }

    /// Event occupying `row` on `day`, if any.
    pub fn cell(&self, row: usize, day: DayLetter) -> Option<GridCell<'_>> {
        let column = day.offset_from_sunday() as usize;
        let index = self.cells.get(row)?[column]?;
        let first = row == 0 || self.cells[row - 1][column] != Some(index);
        Some(GridCell {
            event: &self.events[index],
            first,
        })
    }
}

fn minute_of_day(value: NaiveDateTime) -> u32 {
    value.hour() * 60 + value.minute()
}

/// Weekday header label, e.g. `Monday`.
pub fn day_name(day: DayLetter) -> String {
    reference_date(day).format("%A").to_string()
}

/// True when `value` falls on the reference week.
pub fn in_reference_week(value: NaiveDateTime) -> bool {
    let offset = (value.date() - *REFERENCE_SUNDAY).num_days();
    (0..7).contains(&offset) && value.weekday().num_days_from_sunday() as i64 == offset
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::section;

    #[test]
    fn mwf_projects_three_aligned_events() {
        let events = project_section(&section("a", "CSE", "316", "MWF", (10, 0), (10, 53)));
        assert_eq!(events.len(), 3);
        let days: Vec<_> = events.iter().map(|e| e.day).collect();
        assert_eq!(
            days,
            vec![DayLetter::Monday, DayLetter::Wednesday, DayLetter::Friday]
        );
        for event in &events {
            assert_eq!(event.title, "CSE 316 - 01");
            assert_eq!(event.start.time(), NaiveTime::from_hms_opt(10, 0, 0).unwrap());
            assert_eq!(event.end.time(), NaiveTime::from_hms_opt(10, 53, 0).unwrap());
            assert_eq!(event.start.weekday(), event.day.weekday());
            assert!(in_reference_week(event.start));
        }
    }

    #[test]
    fn reference_week_starts_on_sunday() {
        assert_eq!(reference_date(DayLetter::Sunday).to_string(), "2024-12-01");
        assert_eq!(reference_date(DayLetter::Saturday).to_string(), "2024-12-07");
        for day in DayLetter::ALL {
            assert_eq!(reference_date(day).weekday(), day.weekday());
        }
        assert_eq!(day_name(DayLetter::Thursday), "Thursday");
    }

    #[test]
    fn cart_projection_keeps_order() {
        let cart = vec![
            section("a", "CSE", "316", "TR", (11, 0), (12, 20)),
            section("b", "CSE", "385", "MW", (14, 30), (15, 50)),
        ];
        let events = project(&cart);
        let ids: Vec<_> = events.iter().map(|e| (e.section_id.as_str(), e.day)).collect();
        assert_eq!(
            ids,
            vec![
                ("a", DayLetter::Tuesday),
                ("a", DayLetter::Thursday),
                ("b", DayLetter::Monday),
                ("b", DayLetter::Wednesday),
            ]
        );
    }

    #[test]
    fn events_outside_window_are_kept_but_clipped() {
        let window = DisplayWindow::default();
        let early = project_section(&section("a", "PHY", "131", "M", (7, 0), (8, 30)));
        assert_eq!(early.len(), 1);
        let (start, end) = early[0].clip(&window).expect("partly visible");
        assert_eq!(start.time(), NaiveTime::from_hms_opt(8, 0, 0).unwrap());
        assert_eq!(end.time(), NaiveTime::from_hms_opt(8, 30, 0).unwrap());

        let night = project_section(&section("b", "AST", "101", "T", (22, 0), (23, 0)));
        assert_eq!(night.len(), 1);
        assert!(night[0].clip(&window).is_none());
    }

    #[test]
    fn window_validation() {
        assert!(DisplayWindow::default().validate().is_ok());
        assert!(DisplayWindow {
            start_hour: 0,
            end_hour: 24
        }
        .validate()
        .is_ok());
        assert!(DisplayWindow {
            start_hour: 9,
            end_hour: 9
        }
        .validate()
        .is_err());
        assert!(DisplayWindow {
            start_hour: 8,
            end_hour: 25
        }
        .validate()
        .is_err());
    }

    #[test]
    fn grid_marks_occupied_slots() -> Result<()> {
        let cart = vec![section("a", "CSE", "316", "TR", (11, 0), (12, 20))];
        let grid = WeekGrid::build(project(&cart), DisplayWindow::default(), 30)?;
        assert_eq!(grid.rows(), 28);
        // 11:00 is the sixth slot after 08:00.
        let first = grid.cell(6, DayLetter::Tuesday).expect("occupied");
        assert!(first.first);
        assert_eq!(first.event.title, "CSE 316 - 01");
        let cont = grid.cell(8, DayLetter::Thursday).expect("occupied");
        assert!(!cont.first);
        assert!(grid.cell(9, DayLetter::Tuesday).is_none());
        assert!(grid.cell(6, DayLetter::Monday).is_none());
        assert_eq!(grid.slot_start_minute(6), 11 * 60);
        Ok(())
    }

    #[test]
    fn grid_rejects_zero_slots() {
        assert!(WeekGrid::build(Vec::new(), DisplayWindow::default(), 0).is_err());
    }
}
