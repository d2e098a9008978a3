#![warn(clippy::all, missing_docs)]

//! Core logic for the student self-service portal.
//!
//! This crate hosts the section model, the registration cart with its
//! conflict detection and saved-cart reconciliation, the weekly calendar
//! projection, course search, and the registrar backend client used by the
//! terminal UI and any future frontends.

pub mod api;
pub mod calendar;
pub mod cart;
pub mod config;
pub mod conflict;
pub mod dashboard;
pub mod error;
pub mod models;
pub mod search;

pub use api::{HttpRegistrar, PrereqVerdict, RegistrarApi, SaveVerdict, SessionContext};
pub use calendar::{CalendarEvent, DisplayWindow, WeekGrid};
pub use cart::{AddOutcome, AddPlan, CartReconciler, CartState, SaveOutcome, SaveReport};
pub use config::AppConfig;
pub use conflict::{classify, Outcome};
pub use error::{ApiError, ApiResult, Notification, NotificationKind};
pub use models::{DayLetter, Days, Section};
pub use search::{SearchAdapter, SearchTicket};
