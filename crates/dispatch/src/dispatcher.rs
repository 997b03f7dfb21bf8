//! The dispatch worker.
//!
//! A cycle runs for one batch of new event ids:
//!
//! 1. Assemble notifications for the newest events (fail-fast, rolls back)
//! 2. Broadcast to the topic (best-effort)
//! 3. Page through every registered token and multicast with retry
//! 4. Reconcile each page's per-token results
//!
//! The whole cycle runs in a single store transaction, committed once at the end.

use std::sync::Arc;

use promet_common::error::AppError;
use promet_common::queue::{DispatchBatch, DispatchReceiver};
use promet_common::stats::{StatKind, Statistics};
use promet_common::store::{Store, StoreTx};
use promet_notifier::{PushMessage, PushSender};

use crate::assembler;
use crate::pager::{PAGE_SIZE, TokenPager};
use crate::reconciler;
use crate::retry::RetryPolicy;

/// Where the worker currently is in a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    Idle,
    Assembling,
    BroadcastingTopic,
    PagingDevices,
    PerPageSending,
    Reconciling,
}

#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    pub topic: String,
    /// When off, a cycle stops after the topic broadcast.
    pub individual_push: bool,
    pub page_size: i64,
    pub retry: RetryPolicy,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            topic: "allRoadEvents".to_string(),
            individual_push: true,
            page_size: PAGE_SIZE,
            retry: RetryPolicy::default(),
        }
    }
}

/// Summary of one finished cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub events: usize,
    pub topic_sent: bool,
    pub pages: i64,
    pub pages_sent: i64,
    pub pages_failed: i64,
    pub tokens_deleted: usize,
    pub tokens_replaced: usize,
}

pub struct Dispatcher<S: Store, P: PushSender> {
    store: S,
    sender: P,
    stats: Arc<Statistics>,
    config: DispatcherConfig,
    state: DispatchState,
}

impl<S: Store, P: PushSender> Dispatcher<S, P> {
    pub fn new(store: S, sender: P, stats: Arc<Statistics>, config: DispatcherConfig) -> Self {
        Self {
            store,
            sender,
            stats,
            config,
            state: DispatchState::Idle,
        }
    }

    pub fn state(&self) -> DispatchState {
        self.state
    }

    /// Process batches until every queue sender is dropped.
    pub async fn run(mut self, mut queue: DispatchReceiver) {
        tracing::info!(
            topic = %self.config.topic,
            individual_push = self.config.individual_push,
            "Dispatcher started"
        );

        while let Some(batch) = queue.recv().await {
            match self.dispatch(&batch).await {
                Ok(report) if report.events > 0 => {
                    tracing::info!(
                        events = report.events,
                        topic_sent = report.topic_sent,
                        pages = report.pages,
                        pages_failed = report.pages_failed,
                        tokens_deleted = report.tokens_deleted,
                        tokens_replaced = report.tokens_replaced,
                        "Dispatch cycle complete"
                    );
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::error!(
                        error = %e,
                        batch_size = batch.event_ids.len(),
                        "Dispatch cycle abandoned"
                    );
                }
            }
        }

        tracing::info!("Dispatch queue closed, dispatcher stopping");
    }

    /// Run one full cycle for `batch`.
    pub async fn dispatch(&mut self, batch: &DispatchBatch) -> Result<CycleReport, AppError> {
        if batch.is_empty() {
            return Ok(CycleReport::default());
        }

        tracing::debug!(ids = ?batch.event_ids, "New ids received");
        let result = self.cycle(batch).await;
        self.state = DispatchState::Idle;
        result
    }

    async fn cycle(&mut self, batch: &DispatchBatch) -> Result<CycleReport, AppError> {
        self.state = DispatchState::Assembling;
        let mut tx = self.store.begin().await?;

        let assembled = assembler::assemble(&mut tx, &batch.event_ids)
            .await
            .and_then(|events| Ok((events.len(), assembler::build_message(&events)?)));

        let (events, message) = match assembled {
            Ok(assembled) => assembled,
            Err(e) => {
                if let Err(rollback) = tx.rollback().await {
                    tracing::error!(error = %rollback, "Failed to roll back dispatch transaction");
                }
                return Err(e);
            }
        };

        let mut report = CycleReport {
            events,
            ..Default::default()
        };

        self.state = DispatchState::BroadcastingTopic;
        report.topic_sent = self.broadcast(&message).await;

        if self.config.individual_push {
            self.send_pages(&mut tx, &message, &mut report).await;
        }

        tx.commit().await?;
        Ok(report)
    }

    async fn broadcast(&self, message: &PushMessage) -> bool {
        let sender = &self.sender;
        let topic = self.config.topic.as_str();

        let outcome = self
            .config
            .retry
            .run("topic", move || sender.send_topic(topic, message))
            .await;

        match outcome.result {
            Ok(message_id) => {
                tracing::info!(topic, message_id = %message_id, "Topic dispatch OK");
                true
            }
            Err(e) => {
                tracing::error!(topic, attempts = outcome.attempts, error = %e, "Topic dispatch failed");
                false
            }
        }
    }

    async fn send_pages(&mut self, tx: &mut S::Tx, message: &PushMessage, report: &mut CycleReport) {
        self.state = DispatchState::PagingDevices;

        let mut pager = match TokenPager::start(tx, self.config.page_size).await {
            Ok(pager) => pager,
            Err(e) => {
                tracing::error!(error = %e, "Failed to count device tokens");
                return;
            }
        };
        report.pages = pager.pages();

        loop {
            let page_index = pager.position();
            let tokens = match pager.next_page(tx).await {
                None => break,
                Some(Ok(tokens)) => tokens,
                Some(Err(e)) => {
                    let remaining = pager.pages() - page_index;
                    tracing::error!(
                        page = page_index,
                        remaining,
                        error = %e,
                        "Failed to load device tokens, abandoning remaining pages"
                    );
                    report.pages_failed += remaining;
                    break;
                }
            };
            if tokens.is_empty() {
                continue;
            }

            self.state = DispatchState::PerPageSending;
            tracing::info!(page = page_index, tokens = tokens.len(), "Dispatching payload");

            let sender = &self.sender;
            let page = tokens.as_slice();
            let outcome = self
                .config
                .retry
                .run("multicast", move || sender.send_multicast(page, message))
                .await;

            let succeeded = u32::from(outcome.result.is_ok());
            for _ in 0..outcome.attempts {
                self.stats.increment(StatKind::Dispatches);
            }
            for _ in 0..outcome.attempts - succeeded {
                self.stats.increment(StatKind::FailedDispatches);
            }

            let response = match outcome.result {
                Ok(response) => response,
                Err(e) => {
                    tracing::error!(
                        page = page_index,
                        attempts = outcome.attempts,
                        error = %e,
                        "Page dispatch abandoned"
                    );
                    report.pages_failed += 1;
                    continue;
                }
            };

            tracing::info!(
                page = page_index,
                success = response.success_count,
                failure = response.failure_count,
                "Dispatch OK"
            );
            report.pages_sent += 1;

            self.state = DispatchState::Reconciling;
            let reconciled = reconciler::reconcile(tx, &tokens, &response, &self.stats).await;
            report.tokens_deleted += reconciled.deleted.len();
            report.tokens_replaced += reconciled.replaced.len();
        }
    }
}
