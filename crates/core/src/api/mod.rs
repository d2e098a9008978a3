//! Registrar backend collaborators.

/// `reqwest` implementation of [`RegistrarApi`].
pub mod http;

use std::future::Future;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::{error::ApiResult, models::Section};

pub use http::HttpRegistrar;

/// Identity of the student the portal is acting for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionContext {
    /// Student id as the backend knows it.
    pub student_id: String,
}

impl SessionContext {
    /// Context for the given student.
    pub fn new(student_id: impl Into<String>) -> Self {
        Self {
            student_id: student_id.into(),
        }
    }
}

/// Server verdict on a prerequisite expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrereqVerdict {
    /// Every clause is satisfied.
    Met,
    /// At least one clause failed; carries the backend's explanation.
    NotMet(String),
}

/// Server verdict on a cart save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveVerdict {
    /// Persisted.
    Saved,
    /// Rejected with the backend's explanation (e.g. a closed section).
    Conflict(String),
}

/// Remote operations the registration engine depends on.
///
/// Every call resolves to a tagged result; transport and unexpected-status
/// failures surface as [`crate::error::ApiError`].
pub trait RegistrarApi {
    /// Free-text search; bracketed tokens such as `[SPK]` are interpreted by
    /// the backend as requirement-category filters.
    fn search(&self, query: &str) -> impl Future<Output = ApiResult<Vec<Section>>> + Send;

    /// Evaluate a prerequisite expression for the student.
    fn check_prerequisite(
        &self,
        ctx: &SessionContext,
        expression: &str,
    ) -> impl Future<Output = ApiResult<PrereqVerdict>> + Send;

    /// The student's saved cart, or `None` when nothing was ever saved.
    fn saved_cart(
        &self,
        ctx: &SessionContext,
    ) -> impl Future<Output = ApiResult<Option<Vec<Section>>>> + Send;

    /// Replace the student's saved cart.
    fn save_cart(
        &self,
        ctx: &SessionContext,
        sections: &[Section],
    ) -> impl Future<Output = ApiResult<SaveVerdict>> + Send;

    /// Start of the student's class enrollment window.
    fn enrollment_date(
        &self,
        ctx: &SessionContext,
    ) -> impl Future<Output = ApiResult<Option<NaiveDateTime>>> + Send;

    /// Start of the student's housing registration window.
    fn housing_date(
        &self,
        ctx: &SessionContext,
    ) -> impl Future<Output = ApiResult<Option<NaiveDateTime>>> + Send;
}
