//! Registration cart: conflict-checked adds, removals, and saved-cart sync.
//!
//! Network-bound operations come in two flavours. The `async` methods
//! (`load`, `add_section`, `save`) run a whole gesture against a
//! [`RegistrarApi`]. Event-driven frontends that run requests on their own
//! tasks use the split form instead (`begin_*`/`plan_add` before the request,
//! `finish_*` with its result) so the cart is only ever touched from the
//! interaction loop.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{
    api::{PrereqVerdict, RegistrarApi, SaveVerdict, SessionContext},
    conflict::classify,
    error::{ApiResult, Notification, NotificationKind},
    models::{total_credits, Section},
};

/// Lifecycle of a registration session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CartState {
    /// Waiting for the saved cart.
    Loading,
    /// Saved cart received (or failed); the cart accepts changes.
    Ready,
}

/// Result of an add gesture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddOutcome {
    /// The section is now in the cart.
    Added,
    /// Nothing changed; the notification says why.
    Rejected(Notification),
}

/// First half of an add: either finished locally or waiting on the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddPlan {
    /// Decided without a network call.
    Done(AddOutcome),
    /// The prerequisite expression must be checked before the section can be
    /// appended with [`CartReconciler::finish_add`].
    NeedsPrerequisite {
        /// Expression to send to the prerequisite check.
        expression: String,
    },
}

/// Result of a save gesture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    /// Persisted; the snapshot now matches what the server holds.
    Saved,
    /// Nothing to save.
    NotDirty,
    /// The in-memory cart is untouched; the notification says why.
    Rejected(Notification),
}

/// Everything the server said during a save: the verdict, and on success the
/// re-fetched cart.
#[derive(Debug, Clone)]
pub struct SaveReport {
    /// Save verdict.
    pub verdict: ApiResult<SaveVerdict>,
    /// Saved cart fetched after a successful save.
    pub reloaded: Option<ApiResult<Option<Vec<Section>>>>,
}

impl SaveReport {
    /// Send `sections` and, when the save succeeds, read the cart back.
    pub async fn run<A: RegistrarApi>(api: &A, ctx: &SessionContext, sections: &[Section]) -> Self {
        let verdict = api.save_cart(ctx, sections).await;
        let reloaded = match verdict {
            Ok(SaveVerdict::Saved) => Some(api.saved_cart(ctx).await),
            _ => None,
        };
        Self { verdict, reloaded }
    }
}

/// Owns the cart for one registration session.
#[derive(Debug, Clone)]
pub struct CartReconciler {
    state: CartState,
    cart: Vec<Section>,
    saved: Vec<Section>,
    notification: Option<Notification>,
}

impl Default for CartReconciler {
    fn default() -> Self {
        Self::new()
    }
}

impl CartReconciler {
    /// A reconciler waiting for its initial load.
    pub fn new() -> Self {
        Self {
            state: CartState::Loading,
            cart: Vec::new(),
            saved: Vec::new(),
            notification: None,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> CartState {
        self.state
    }

    /// Sections currently in the cart, in insertion order.
    pub fn entries(&self) -> &[Section] {
        &self.cart
    }

    /// Cart contents as of the last successful load or save.
    pub fn saved_snapshot(&self) -> &[Section] {
        &self.saved
    }

    /// Sum of credits over the current cart.
    pub fn total_credits(&self) -> f64 {
        total_credits(&self.cart)
    }

    /// Whether the cart differs from what the server holds. Saving is only
    /// possible while this is true; an emptied cart counts as changed.
    pub fn is_dirty(&self) -> bool {
        self.state == CartState::Ready && !same_ids(&self.cart, &self.saved)
    }

    /// Latest notification, if not yet taken.
    pub fn notification(&self) -> Option<&Notification> {
        self.notification.as_ref()
    }

    /// Take the latest notification for display.
    pub fn take_notification(&mut self) -> Option<Notification> {
        self.notification.take()
    }

    /// Drop all state, e.g. when the student leaves the registration page.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Fetch the saved cart and become ready.
    pub async fn load<A: RegistrarApi>(&mut self, api: &A, ctx: &SessionContext) {
        self.begin_load();
        let result = api.saved_cart(ctx).await;
        self.finish_load(result);
    }

    /// Enter the loading state, discarding any current cart.
    pub fn begin_load(&mut self) {
        self.reset();
    }

    /// Apply the saved-cart response. A failed load leaves an empty cart.
    pub fn finish_load(&mut self, result: ApiResult<Option<Vec<Section>>>) {
        match result {
            Ok(sections) => {
                let sections = sections.unwrap_or_default();
                info!(entries = sections.len(), "Loaded saved cart");
                self.cart = sections.clone();
                self.saved = sections;
            }
            Err(err) => {
                warn!(%err, "Failed to load saved cart");
                self.cart.clear();
                self.saved.clear();
                self.notification = Some(Notification::from_api_error("Unable to Load Cart", &err));
            }
        }
        self.state = CartState::Ready;
    }

    /// Add `candidate`, checking its prerequisite with the server first when
    /// it has one. The cart is never changed before the check succeeds.
    pub async fn add_section<A: RegistrarApi>(
        &mut self,
        api: &A,
        ctx: &SessionContext,
        candidate: Section,
    ) -> AddOutcome {
        match self.plan_add(&candidate) {
            AddPlan::Done(outcome) => outcome,
            AddPlan::NeedsPrerequisite { expression } => {
                let verdict = api.check_prerequisite(ctx, &expression).await;
                self.finish_add(candidate, verdict)
            }
        }
    }

    /// Run the local checks for `candidate`. Sections without a prerequisite
    /// are appended immediately.
    pub fn plan_add(&mut self, candidate: &Section) -> AddPlan {
        if self.state != CartState::Ready {
            return AddPlan::Done(self.reject(Notification::info(
                "Cart Loading",
                "Your saved cart is still loading. Try again in a moment.",
            )));
        }
        if let Some(note) = classify(candidate, &self.cart).notification(candidate) {
            debug!(section = %candidate.label(), header = %note.header, "Add rejected locally");
            return AddPlan::Done(self.reject(note));
        }
        if candidate.requires_prereq_check() {
            return AddPlan::NeedsPrerequisite {
                expression: candidate.prereq.trim().to_string(),
            };
        }
        AddPlan::Done(self.append(candidate.clone()))
    }

    /// Apply the prerequisite verdict for a planned add.
    ///
    /// The cart may have changed while the check was outstanding, so the
    /// conflict checks run again before appending.
    pub fn finish_add(&mut self, candidate: Section, verdict: ApiResult<PrereqVerdict>) -> AddOutcome {
        match verdict {
            Ok(PrereqVerdict::Met) => {
                if let Some(note) = classify(&candidate, &self.cart).notification(&candidate) {
                    return self.reject(note);
                }
                self.append(candidate)
            }
            Ok(PrereqVerdict::NotMet(message)) => {
                info!(section = %candidate.label(), "Prerequisite not met");
                let message = if message.trim().is_empty() {
                    format!("You do not meet the prerequisites for {}.", candidate.course_label())
                } else {
                    message
                };
                self.reject(Notification::new(
                    NotificationKind::PrerequisiteRejected,
                    "Prerequisite Not Met",
                    message,
                ))
            }
            Err(err) => {
                warn!(section = %candidate.label(), %err, "Prerequisite check failed");
                self.reject(Notification::from_api_error("Prerequisite Check Failed", &err))
            }
        }
    }

    /// Remove the entry with `id`. Returns whether anything was removed.
    pub fn remove_section(&mut self, id: &str) -> bool {
        let before = self.cart.len();
        self.cart.retain(|entry| entry.id != id);
        let removed = self.cart.len() != before;
        if removed {
            info!(id, "Removed section from cart");
        }
        removed
    }

    /// Persist the cart and reconcile with what the server stored.
    pub async fn save<A: RegistrarApi>(&mut self, api: &A, ctx: &SessionContext) -> SaveOutcome {
        let Some(sent) = self.begin_save() else {
            return SaveOutcome::NotDirty;
        };
        let report = SaveReport::run(api, ctx, &sent).await;
        self.finish_save(&sent, report)
    }

    /// Cart contents to send, or `None` when there is nothing to save.
    pub fn begin_save(&self) -> Option<Vec<Section>> {
        self.is_dirty().then(|| self.cart.clone())
    }

    /// Apply the result of saving `sent`.
    ///
    /// Failures leave the cart untouched. On success the snapshot becomes the
    /// server's copy; the cart is replaced by it only if the student has not
    /// changed the cart since `sent` was taken.
    pub fn finish_save(&mut self, sent: &[Section], report: SaveReport) -> SaveOutcome {
        match report.verdict {
            Ok(SaveVerdict::Saved) => {
                let (stored, note) = match report.reloaded {
                    Some(Ok(Some(sections))) => (sections, None),
                    Some(Ok(None)) | None => (sent.to_vec(), None),
                    Some(Err(err)) => {
                        warn!(%err, "Saved cart but could not re-fetch it");
                        (
                            sent.to_vec(),
                            Some(Notification::new(
                                NotificationKind::Info,
                                "Cart Saved",
                                "Your cart was saved, but the latest copy could not be retrieved.",
                            )),
                        )
                    }
                };
                if same_ids(&self.cart, sent) {
                    self.cart = stored.clone();
                }
                info!(entries = stored.len(), "Saved cart");
                self.saved = stored;
                self.notification = Some(
                    note.unwrap_or_else(|| Notification::info("Cart Saved", "Your cart has been saved.")),
                );
                SaveOutcome::Saved
            }
            Ok(SaveVerdict::Conflict(message)) => {
                warn!(%message, "Save rejected");
                let note = Notification::new(NotificationKind::SaveRejected, "Unable to Save Cart", message);
                self.notification = Some(note.clone());
                SaveOutcome::Rejected(note)
            }
            Err(err) => {
                warn!(%err, "Save failed");
                let note = Notification::from_api_error("Unable to Save Cart", &err);
                self.notification = Some(note.clone());
                SaveOutcome::Rejected(note)
            }
        }
    }

    fn append(&mut self, section: Section) -> AddOutcome {
        info!(section = %section.label(), credits = section.credits, "Added section to cart");
        self.cart.push(section);
        AddOutcome::Added
    }

    fn reject(&mut self, note: Notification) -> AddOutcome {
        self.notification = Some(note.clone());
        AddOutcome::Rejected(note)
    }
}

fn same_ids(a: &[Section], b: &[Section]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.id == y.id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{api::mock::MockRegistrar, error::ApiError, models::fixtures::section};

    fn ctx() -> SessionContext {
        SessionContext::new("112233445")
    }

    async fn ready(api: &MockRegistrar) -> CartReconciler {
        let mut cart = CartReconciler::new();
        cart.load(api, &ctx()).await;
        cart
    }

    #[tokio::test]
    async fn loads_saved_cart_clean() {
        let api = MockRegistrar::with_saved(vec![section("a", "CSE", "316", "TR", (9, 0), (10, 20))]);
        let cart = ready(&api).await;
        assert_eq!(cart.state(), CartState::Ready);
        assert_eq!(cart.entries().len(), 1);
        assert!(!cart.is_dirty());
    }

    #[tokio::test]
    async fn failed_load_is_ready_and_empty() {
        let api = MockRegistrar::default();
        *api.fail_load.lock() = Some(ApiError::Network("refused".into()));
        let mut cart = ready(&api).await;
        assert_eq!(cart.state(), CartState::Ready);
        assert!(cart.entries().is_empty());
        let note = cart.take_notification().expect("load failure notification");
        assert_eq!(note.kind, NotificationKind::NetworkError);
    }

    #[tokio::test]
    async fn adds_when_no_shared_day() {
        let api = MockRegistrar::with_saved(vec![section("a", "CSE", "316", "TR", (9, 0), (10, 20))]);
        let mut cart = ready(&api).await;
        let outcome = cart
            .add_section(&api, &ctx(), section("b", "CSE", "320", "MW", (9, 0), (10, 20)))
            .await;
        assert_eq!(outcome, AddOutcome::Added);
        assert_eq!(cart.entries().len(), 2);
        assert!(cart.is_dirty());
        assert_eq!(api.prereq_call_count(), 0);
    }

    #[tokio::test]
    async fn time_conflict_leaves_cart_unchanged() {
        let api = MockRegistrar::with_saved(vec![section("a", "CSE", "316", "TR", (11, 0), (12, 20))]);
        let mut cart = ready(&api).await;
        let outcome = cart
            .add_section(&api, &ctx(), section("b", "CSE", "385", "TR", (12, 0), (13, 0)))
            .await;
        match outcome {
            AddOutcome::Rejected(note) => {
                assert_eq!(note.kind, NotificationKind::ValidationConflict);
                assert_eq!(note.header, "Time Conflict");
            }
            other => panic!("expected rejection, got {other:?}"),
        }
        assert_eq!(cart.entries().len(), 1);
        assert!(!cart.is_dirty());
    }

    #[tokio::test]
    async fn duplicate_course_skips_prerequisite_call() {
        let api = MockRegistrar::with_saved(vec![section("a", "CSE", "316", "TR", (11, 0), (12, 20))]);
        let mut cart = ready(&api).await;
        let mut candidate = section("b", "CSE", "316", "MW", (15, 0), (16, 20));
        candidate.prereq = "CSE214".to_string();
        let outcome = cart.add_section(&api, &ctx(), candidate).await;
        assert!(matches!(outcome, AddOutcome::Rejected(ref n) if n.header == "Duplicate Course"));
        assert_eq!(api.prereq_call_count(), 0);
    }

    #[tokio::test]
    async fn unmet_prerequisite_is_rejected() {
        let api = MockRegistrar::with_saved(Vec::new());
        api.queue_prereq(Ok(PrereqVerdict::NotMet(
            "You do not fit the class prerequisite of this class".into(),
        )));
        let mut cart = ready(&api).await;
        let mut candidate = section("b", "CSE", "316", "TR", (11, 0), (12, 20));
        candidate.prereq = "CSE214".to_string();
        let outcome = cart.add_section(&api, &ctx(), candidate).await;
        assert!(cart.entries().is_empty());
        let note = cart.take_notification().expect("prerequisite notification");
        assert_eq!(note.kind, NotificationKind::PrerequisiteRejected);
        assert_eq!(outcome, AddOutcome::Rejected(note));
        let calls = api.prereq_calls.lock().clone();
        assert_eq!(calls, vec![("112233445".to_string(), "CSE214".to_string())]);
    }

    #[tokio::test]
    async fn prerequisite_transport_error_is_distinct() {
        let api = MockRegistrar::with_saved(Vec::new());
        api.queue_prereq(Err(ApiError::Server {
            status: 500,
            body: "Error checking major".into(),
        }));
        let mut cart = ready(&api).await;
        let mut candidate = section("b", "CSE", "416", "MW", (14, 0), (15, 20));
        candidate.prereq = "major CSE".to_string();
        cart.add_section(&api, &ctx(), candidate).await;
        assert!(cart.entries().is_empty());
        assert_eq!(
            cart.notification().map(|n| n.kind),
            Some(NotificationKind::ServerError)
        );
    }

    #[tokio::test]
    async fn met_prerequisite_appends() {
        let api = MockRegistrar::with_saved(Vec::new());
        let mut cart = ready(&api).await;
        let mut candidate = section("b", "CSE", "316", "TR", (11, 0), (12, 20));
        candidate.prereq = "CSE214;>C CSE216".to_string();
        let outcome = cart.add_section(&api, &ctx(), candidate).await;
        assert_eq!(outcome, AddOutcome::Added);
        assert_eq!(api.prereq_call_count(), 1);
    }

    #[test]
    fn finish_add_rechecks_conflicts() {
        let mut cart = CartReconciler::new();
        cart.finish_load(Ok(None));
        let mut pending = section("a", "CSE", "316", "TR", (11, 0), (12, 20));
        pending.prereq = "CSE214".to_string();
        assert!(matches!(cart.plan_add(&pending), AddPlan::NeedsPrerequisite { ref expression } if expression == "CSE214"));

        // Another section lands while the check is in flight.
        let other = section("b", "AMS", "310", "TR", (12, 0), (13, 0));
        assert_eq!(cart.plan_add(&other), AddPlan::Done(AddOutcome::Added));

        let outcome = cart.finish_add(pending, Ok(PrereqVerdict::Met));
        assert!(matches!(outcome, AddOutcome::Rejected(ref n) if n.header == "Time Conflict"));
        assert_eq!(cart.entries().len(), 1);
    }

    #[test]
    fn adds_wait_for_initial_load() {
        let mut cart = CartReconciler::new();
        let plan = cart.plan_add(&section("a", "CSE", "316", "TR", (11, 0), (12, 20)));
        assert!(matches!(plan, AddPlan::Done(AddOutcome::Rejected(_))));
        assert!(cart.entries().is_empty());
    }

    #[tokio::test]
    async fn credits_follow_mutations() {
        let api = MockRegistrar::with_saved(Vec::new());
        let mut cart = ready(&api).await;
        for candidate in [
            section("a", "CSE", "316", "TR", (9, 0), (10, 20)),
            section("b", "CSE", "320", "MW", (9, 0), (10, 20)),
            section("c", "AMS", "310", "F", (9, 0), (10, 20)),
        ] {
            assert_eq!(cart.add_section(&api, &ctx(), candidate).await, AddOutcome::Added);
        }
        assert_eq!(cart.total_credits(), 9.0);
        assert!(cart.remove_section("b"));
        assert_eq!(cart.total_credits(), 6.0);
        assert!(!cart.remove_section("missing"));
    }

    #[tokio::test]
    async fn save_then_reload_is_clean() {
        let api = MockRegistrar::with_saved(Vec::new());
        let mut cart = ready(&api).await;
        cart.add_section(&api, &ctx(), section("a", "CSE", "316", "TR", (9, 0), (10, 20)))
            .await;
        assert!(cart.is_dirty());
        assert_eq!(cart.save(&api, &ctx()).await, SaveOutcome::Saved);
        assert!(!cart.is_dirty());

        let mut reopened = ready(&api).await;
        assert_eq!(reopened.entries(), cart.entries());
        assert!(!reopened.is_dirty());
        assert_eq!(reopened.save(&api, &ctx()).await, SaveOutcome::NotDirty);
        assert_eq!(*api.save_calls.lock(), 1);
    }

    #[tokio::test]
    async fn emptied_cart_is_dirty_and_saveable() {
        let api = MockRegistrar::with_saved(vec![section("a", "CSE", "316", "TR", (9, 0), (10, 20))]);
        let mut cart = ready(&api).await;
        cart.remove_section("a");
        assert!(cart.is_dirty());
        assert_eq!(cart.save(&api, &ctx()).await, SaveOutcome::Saved);
        assert!(!cart.is_dirty());
        assert_eq!(api.stored.lock().as_deref(), Some(&[][..]));
    }

    #[tokio::test]
    async fn save_conflict_keeps_cart() {
        let api = MockRegistrar::with_saved(Vec::new());
        api.queue_save(Ok(SaveVerdict::Conflict("CSE 316-01 is full".into())));
        let mut cart = ready(&api).await;
        cart.add_section(&api, &ctx(), section("a", "CSE", "316", "TR", (9, 0), (10, 20)))
            .await;
        let outcome = cart.save(&api, &ctx()).await;
        match outcome {
            SaveOutcome::Rejected(note) => {
                assert_eq!(note.kind, NotificationKind::SaveRejected);
                assert_eq!(note.message, "CSE 316-01 is full");
            }
            other => panic!("expected rejection, got {other:?}"),
        }
        assert_eq!(cart.entries().len(), 1);
        assert!(cart.is_dirty());

        // Retry with the same in-memory state.
        assert_eq!(cart.save(&api, &ctx()).await, SaveOutcome::Saved);
    }

    #[tokio::test]
    async fn save_network_error_keeps_cart() {
        let api = MockRegistrar::with_saved(Vec::new());
        api.queue_save(Err(ApiError::Network("timed out".into())));
        let mut cart = ready(&api).await;
        cart.add_section(&api, &ctx(), section("a", "CSE", "316", "TR", (9, 0), (10, 20)))
            .await;
        let outcome = cart.save(&api, &ctx()).await;
        assert!(matches!(outcome, SaveOutcome::Rejected(ref n) if n.kind == NotificationKind::NetworkError));
        assert!(cart.is_dirty());
    }

    #[test]
    fn failed_refetch_after_save_keeps_sent_cart() {
        let mut cart = CartReconciler::new();
        cart.finish_load(Ok(None));
        cart.plan_add(&section("a", "CSE", "316", "TR", (9, 0), (10, 20)));
        let sent = cart.begin_save().expect("dirty cart");

        let outcome = cart.finish_save(
            &sent,
            SaveReport {
                verdict: Ok(SaveVerdict::Saved),
                reloaded: Some(Err(ApiError::Network("connection reset".into()))),
            },
        );
        assert_eq!(outcome, SaveOutcome::Saved);
        assert!(!cart.is_dirty());
        assert_eq!(cart.entries(), &sent[..]);
        assert_eq!(cart.saved_snapshot(), &sent[..]);
        let note = cart.take_notification().expect("save notification");
        assert_eq!(note.kind, NotificationKind::Info);
        assert!(note.message.contains("latest copy"));
    }

    #[test]
    fn save_adopts_server_copy_unless_cart_moved_on() {
        let mut cart = CartReconciler::new();
        cart.finish_load(Ok(None));
        cart.plan_add(&section("a", "CSE", "316", "TR", (9, 0), (10, 20)));
        let sent = cart.begin_save().expect("dirty cart");

        let mut canonical = sent.clone();
        canonical[0].room = "Javits 100".to_string();
        cart.finish_save(
            &sent,
            SaveReport {
                verdict: Ok(SaveVerdict::Saved),
                reloaded: Some(Ok(Some(canonical.clone()))),
            },
        );
        assert_eq!(cart.entries(), &canonical[..]);
        assert!(!cart.is_dirty());

        // A second save lands after the student added another section.
        cart.plan_add(&section("b", "CSE", "320", "MW", (9, 0), (10, 20)));
        let sent = cart.begin_save().expect("dirty cart");
        cart.plan_add(&section("c", "AMS", "310", "F", (9, 0), (10, 20)));
        cart.finish_save(
            &sent,
            SaveReport {
                verdict: Ok(SaveVerdict::Saved),
                reloaded: Some(Ok(Some(sent.clone()))),
            },
        );
        assert_eq!(cart.entries().len(), 3);
        assert_eq!(cart.saved_snapshot().len(), 2);
        assert!(cart.is_dirty());
    }
}
