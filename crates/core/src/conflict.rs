//! Scheduling conflict detection between a candidate section and a cart.

use crate::{
    error::{Notification, NotificationKind},
    models::Section,
};

/// Result of checking a candidate against the cart.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Outcome<'a> {
    /// No conflict.
    Ok,
    /// The cart already holds a section of the same course.
    Duplicate(&'a Section),
    /// The candidate meets at the same time as a cart entry on a shared day.
    TimeConflict(&'a Section),
}

impl Outcome<'_> {
    /// True when the candidate can be added.
    pub fn is_ok(&self) -> bool {
        matches!(self, Outcome::Ok)
    }

    /// Notification describing the conflict, if any.
    pub fn notification(&self, candidate: &Section) -> Option<Notification> {
        match self {
            Outcome::Ok => None,
            Outcome::Duplicate(existing) => Some(Notification::new(
                NotificationKind::ValidationConflict,
                "Duplicate Course",
                format!(
                    "{} is already in your cart as {}.",
                    candidate.course_label(),
                    existing.label()
                ),
            )),
            Outcome::TimeConflict(existing) => Some(Notification::new(
                NotificationKind::ValidationConflict,
                "Time Conflict",
                format!(
                    "{} ({}) overlaps with {} ({}).",
                    candidate.label(),
                    candidate.meeting_pattern(),
                    existing.label(),
                    existing.meeting_pattern()
                ),
            )),
        }
    }
}

/// Classify `candidate` against `cart`.
///
/// Duplicates are checked across the whole cart before any time overlap, so
/// a same-course entry is always reported as [`Outcome::Duplicate`]. Within
/// each check the first matching entry in cart order wins.
pub fn classify<'a>(candidate: &Section, cart: &'a [Section]) -> Outcome<'a> {
    if let Some(existing) = cart.iter().find(|entry| entry.same_course(candidate)) {
        return Outcome::Duplicate(existing);
    }
    if let Some(existing) = cart.iter().find(|entry| overlaps(candidate, entry)) {
        return Outcome::TimeConflict(existing);
    }
    Outcome::Ok
}

/// Two sections overlap when they share a meeting day and their half-open
/// `[start, end)` intervals intersect. Back-to-back meetings do not overlap.
pub fn overlaps(a: &Section, b: &Section) -> bool {
    a.days.intersects(b.days) && a.time_start < b.time_end && a.time_end > b.time_start
}
