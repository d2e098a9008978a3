//! Course search: one request per submit, results replaced wholesale.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info, warn};

use crate::{
    api::{RegistrarApi, SessionContext},
    error::{ApiResult, Notification},
    models::Section,
};

/// Identifies one submitted search. Only the latest ticket's response is
/// applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchTicket(u64);

/// Holds the current result set and the bookkeeping for in-flight searches.
#[derive(Debug, Default)]
pub struct SearchAdapter {
    results: Vec<Section>,
    query: String,
    latest: u64,
    pending: bool,
    notification: Option<Notification>,
}

impl SearchAdapter {
    /// Empty adapter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current results.
    pub fn results(&self) -> &[Section] {
        &self.results
    }

    /// Query of the latest submission.
    pub fn query(&self) -> &str {
        &self.query
    }

    /// Whether the latest submission is still waiting for a response.
    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// Take the latest notification for display.
    pub fn take_notification(&mut self) -> Option<Notification> {
        self.notification.take()
    }

    /// Run a search to completion.
    pub async fn submit<A: RegistrarApi>(
        &mut self,
        api: &A,
        ctx: &SessionContext,
        query: &str,
    ) -> &[Section] {
        if let Some(ticket) = self.begin(query) {
            debug!(student = %ctx.student_id, query, "Submitting search");
            let result = api.search(query).await;
            self.complete(ticket, result);
        }
        &self.results
    }

    /// Clear the result set and start a new submission. Returns `None` for a
    /// blank query, which is never sent.
    pub fn begin(&mut self, query: &str) -> Option<SearchTicket> {
        self.results.clear();
        self.query = query.to_string();
        self.latest += 1;
        if query.trim().is_empty() {
            self.pending = false;
            self.notification = Some(Notification::info(
                "Search",
                "Enter a course, title, or a requirement tag such as [SPK].",
            ));
            return None;
        }
        self.pending = true;
        Some(SearchTicket(self.latest))
    }

    /// Apply the response for `ticket`. Responses to superseded submissions
    /// are dropped; returns whether the response was applied.
    pub fn complete(&mut self, ticket: SearchTicket, result: ApiResult<Vec<Section>>) -> bool {
        if ticket.0 != self.latest {
            debug!(ticket = ticket.0, latest = self.latest, "Dropping stale search response");
            return false;
        }
        self.pending = false;
        match result {
            Ok(sections) => {
                info!(query = %self.query, results = sections.len(), "Search complete");
                self.results = sections;
            }
            Err(err) => {
                warn!(query = %self.query, %err, "Search failed");
                self.notification = Some(Notification::from_api_error("Search Failed", &err));
            }
        }
        true
    }
}

static FILTER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[([^\[\]]+)\]").expect("failed to compile filter regex"));

/// Bracketed requirement filters in a query, e.g. `SPK` for `"CSE [SPK]"`.
/// For display only; queries are always sent as typed.
pub fn bracket_filters(query: &str) -> Vec<String> {
    FILTER_RE
        .captures_iter(query)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|tag| !tag.is_empty())
        .collect()
}
