//! The intake pipeline entry points.

use std::{sync::Arc, time::Instant};

use chrono::NaiveDateTime;
use common::{EmailAddress, OrderId, OrderStatus};
use domain::{
    CustomerResolver, DedupDecision, DeduplicationGuard, DomainError, ErrorKind,
    Matcher, OrderSubmission, OrderValidator, ProductNameReconciler, RejectReason,
    SubmittedCustomer,
};
use order_store::{
    ErrorReport, ErrorSeverity, ErrorSource, IntakeStore, LineItem, Order, PostgresStore,
    StoreError,
};

use crate::{
    config::IntakeConfig,
    error::{IntakeError, Result},
    locks::CustomerLocks,
    notify::{NotificationDispatcher, TracingDispatcher},
    outcome::{OrderOutcome, OutcomeKind},
    state_machine::{OrderDraft, OrderStateMachine},
};

/// Whether a document is a new order or a change to the latest one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionKind {
    New,
    Amendment,
}

/// Why a pipeline run stopped early.
enum Halt {
    Reject(RejectReason),
    Fail(IntakeError),
}

impl From<RejectReason> for Halt {
    fn from(reason: RejectReason) -> Self {
        Halt::Reject(reason)
    }
}

impl From<IntakeError> for Halt {
    fn from(err: IntakeError) -> Self {
        Halt::Fail(err)
    }
}

impl From<StoreError> for Halt {
    fn from(err: StoreError) -> Self {
        Halt::Fail(IntakeError::Store(err))
    }
}

impl From<DomainError> for Halt {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Rejected(reason) => Halt::Reject(reason),
            DomainError::Store(err) => Halt::Fail(IntakeError::Store(err)),
        }
    }
}

type Step<T> = std::result::Result<T, Halt>;

/// Runs submissions through the intake pipeline.
///
/// Create order: validate, reconcile names, dedup, resolve customer,
/// reserve, persist with tracking link, append history, notify. Dedup and
/// everything after it run under the sender's lock.
pub struct IntakeService<S: ?Sized> {
    store: Arc<S>,
    config: IntakeConfig,
    reconciler: ProductNameReconciler,
    dedup: DeduplicationGuard<S>,
    customers: CustomerResolver<S>,
    machine: OrderStateMachine<S>,
    locks: CustomerLocks,
    dispatcher: Arc<dyn NotificationDispatcher>,
}

impl<S: IntakeStore + ?Sized> IntakeService<S> {
    /// Creates a service with the edit-distance matcher and a logging
    /// dispatcher.
    pub fn new(store: Arc<S>, config: IntakeConfig) -> Self {
        Self {
            reconciler: ProductNameReconciler::with_edit_distance(config.min_similarity),
            dedup: DeduplicationGuard::new(Arc::clone(&store), config.dedup_window()),
            customers: CustomerResolver::new(Arc::clone(&store)),
            machine: OrderStateMachine::new(Arc::clone(&store), config.clone()),
            locks: CustomerLocks::new(),
            dispatcher: Arc::new(TracingDispatcher),
            store,
            config,
        }
    }

    pub fn with_dispatcher(mut self, dispatcher: Arc<dyn NotificationDispatcher>) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    pub fn with_matcher(mut self, matcher: Arc<dyn Matcher>) -> Self {
        self.reconciler = ProductNameReconciler::new(matcher);
        self
    }

    pub fn config(&self) -> &IntakeConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Processes a new order submission.
    ///
    /// Anything the submitter can fix comes back as `Ok` with a
    /// `Rejected` or `Duplicate` outcome. `Err` means a store failed and the
    /// submission was dropped.
    #[tracing::instrument(skip_all, fields(kind = "create"))]
    pub async fn process_submission(&self, submission: OrderSubmission) -> Result<OrderOutcome> {
        let started = Instant::now();
        let result = self.create_flow(&submission).await;
        self.finish("intake_submissions_total", &submission, result, started)
            .await
    }

    /// Processes a change to the sender's most recent order.
    ///
    /// Falls back to a fresh create when the latest order is missing or no
    /// longer amendable.
    #[tracing::instrument(skip_all, fields(kind = "amend"))]
    pub async fn process_amendment(&self, submission: OrderSubmission) -> Result<OrderOutcome> {
        let started = Instant::now();
        let result = self.amend_flow(&submission).await;
        self.finish("intake_amendments_total", &submission, result, started)
            .await
    }

    /// Parses a JSON document and processes it as `kind`.
    pub async fn process_json(&self, input: &str, kind: SubmissionKind) -> Result<OrderOutcome> {
        let submission = match OrderSubmission::from_json(input) {
            Ok(submission) => submission,
            Err(e) => {
                let err = IntakeError::Payload(e);
                tracing::warn!(error = %err, "Dropping malformed submission");
                metrics::counter!("intake_submissions_total", "outcome" => "error").increment(1);
                self.record_system_error(None, &err).await;
                return Err(err);
            }
        };

        match kind {
            SubmissionKind::New => self.process_submission(submission).await,
            SubmissionKind::Amendment => self.process_amendment(submission).await,
        }
    }

    /// Moves an order forward in fulfillment.
    pub async fn advance(&self, order_id: OrderId, to: OrderStatus) -> Result<Order> {
        self.machine.advance(order_id, to).await
    }

    /// Retries the reservation of a `PendingInventory` order.
    pub async fn retry_reservation(&self, order_id: OrderId) -> Result<Order> {
        self.machine.retry_reservation(order_id).await
    }

    async fn create_flow(&self, submission: &OrderSubmission) -> Step<OrderOutcome> {
        let lines = OrderValidator::for_create()
            .validate(submission.lines())
            .into_lines()?;
        let sender = submission.sender()?;
        let submitted_at = submission.submitted_at()?;

        let catalog = self.store.catalog_names().await?;
        let reconciled = self.reconciler.reconcile(&catalog, &lines).await?;

        let _guard = self.locks.lock(&sender).await;
        self.create_locked(&sender, submitted_at, reconciled, submission.customer.as_ref())
            .await
    }

    async fn amend_flow(&self, submission: &OrderSubmission) -> Step<OrderOutcome> {
        let lines = OrderValidator::for_amendment()
            .validate(submission.lines())
            .into_lines()?;
        let sender = submission.sender()?;
        let submitted_at = submission.submitted_at()?;

        let catalog = self.store.catalog_names().await?;
        let changes = self.reconciler.reconcile(&catalog, &lines).await?;

        let _guard = self.locks.lock(&sender).await;
        let order = match self.store.latest_order_for(&sender).await? {
            Some(order) if order.status.can_amend() => order,
            latest => {
                tracing::info!(
                    latest_status = ?latest.map(|o| o.status),
                    "No amendable order, creating instead"
                );
                // Removal lines make no sense on a new order.
                OrderValidator::for_create()
                    .validate(submission.lines())
                    .into_lines()?;
                return self
                    .create_locked(&sender, submitted_at, changes, submission.customer.as_ref())
                    .await;
            }
        };

        let order_id = order.id;
        match self.machine.amend(order, &changes).await? {
            Ok(order) => Ok(OrderOutcome::amended(&order)),
            Err(reason) => {
                Ok(OrderOutcome::rejected(Some(sender.as_str()), &reason).for_order(order_id))
            }
        }
    }

    /// Dedup onwards. The caller holds the sender's lock.
    async fn create_locked(
        &self,
        sender: &EmailAddress,
        submitted_at: NaiveDateTime,
        lines: Vec<LineItem>,
        customer: Option<&SubmittedCustomer>,
    ) -> Step<OrderOutcome> {
        if let DedupDecision::Duplicate {
            order_id,
            submitted_at: original,
        } = self.dedup.check(sender, &lines, submitted_at).await?
        {
            return Ok(OrderOutcome::duplicate(sender.as_str(), order_id, original));
        }

        let resolved = self.customers.resolve(sender, customer).await?;
        let order = self
            .machine
            .create(OrderDraft {
                customer: resolved.details,
                submitted_at,
                line_items: lines,
            })
            .await?;

        Ok(OrderOutcome::created(&order))
    }

    async fn finish(
        &self,
        counter: &'static str,
        submission: &OrderSubmission,
        result: Step<OrderOutcome>,
        started: Instant,
    ) -> Result<OrderOutcome> {
        let notify_to = submission.sender().ok().map(|email| email.to_string());

        let outcome = match result {
            Ok(outcome) => outcome,
            Err(Halt::Reject(reason)) => OrderOutcome::rejected(notify_to.as_deref(), &reason),
            Err(Halt::Fail(err)) => {
                tracing::error!(error = %err, "Submission dropped");
                metrics::counter!(counter, "outcome" => "error").increment(1);
                metrics::histogram!("intake_duration_seconds")
                    .record(started.elapsed().as_secs_f64());
                self.record_system_error(notify_to, &err).await;
                return Err(err);
            }
        };

        metrics::counter!(counter, "outcome" => outcome.kind.as_str()).increment(1);
        metrics::histogram!("intake_duration_seconds").record(started.elapsed().as_secs_f64());

        if matches!(outcome.kind, OutcomeKind::Duplicate | OutcomeKind::Rejected) {
            self.record_rejection(&outcome).await;
        }

        if let Some(notification) = outcome.notification() {
            if let Err(e) = self.dispatcher.dispatch(notification).await {
                tracing::warn!(error = %e, "Notification dispatch failed");
            }
        }

        tracing::info!(
            outcome = outcome.kind.as_str(),
            order_id = ?outcome.order_id,
            status = ?outcome.status,
            "Submission processed"
        );
        Ok(outcome)
    }

    async fn record_rejection(&self, outcome: &OrderOutcome) {
        let severity = match outcome.error_kind {
            Some(ErrorKind::DuplicateSubmission) => ErrorSeverity::Medium,
            Some(ErrorKind::AmendmentExceedsStock) => ErrorSeverity::High,
            _ => ErrorSeverity::Low,
        };
        let mut report = ErrorReport::new(
            outcome.notify.as_ref().map(|n| n.to.clone()),
            outcome.errors.join("; "),
            ErrorSource::Customer,
            severity,
        );
        if let Some(order_id) = outcome.order_id {
            report = report.with_order(order_id);
        }

        if let Err(e) = self.store.record_error(report).await {
            tracing::warn!(error = %e, "Failed to record rejection");
        }
    }

    async fn record_system_error(&self, email: Option<String>, err: &IntakeError) {
        let report = ErrorReport::new(
            email,
            err.to_string(),
            ErrorSource::System,
            ErrorSeverity::Critical,
        );
        if let Err(e) = self.store.record_error(report).await {
            tracing::warn!(error = %e, "Failed to record system error");
        }
    }
}

/// Connects to PostgreSQL and applies migrations when `DATABASE_URL` is set.
pub async fn connect_postgres(config: &IntakeConfig) -> Result<Option<PostgresStore>> {
    let Some(url) = config.database_url.as_deref() else {
        return Ok(None);
    };

    let store = PostgresStore::connect(url).await?;
    store.run_migrations().await.map_err(StoreError::from)?;
    tracing::info!("Connected to PostgreSQL store");
    Ok(Some(store))
}
