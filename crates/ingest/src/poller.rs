use std::time::Duration;

use chrono::Utc;
use tokio::time::MissedTickBehavior;

use promet_common::error::AppError;
use promet_common::queue::{DispatchBatch, DispatchSender, EventsPublisher};
use promet_common::store::{Store, StoreTx};
use promet_common::types::TrafficEvent;
use promet_feed::{FeedItem, decode_feed, merge_translations};

/// Result of one poll cycle.
#[derive(Debug, Clone, Default)]
pub struct PollOutcome {
    /// Items present in the feed.
    pub total: usize,
    /// Identifiers stored for the first time, in feed order.
    pub new_ids: Vec<String>,
    /// Records matching `new_ids`.
    pub new_events: Vec<TrafficEvent>,
}

/// HTTP client whose requests give up after `timeout`, so a hung upstream
/// cannot stall the poll loop.
pub fn http_client(timeout: Duration) -> Result<reqwest::Client, AppError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| AppError::Internal(format!("failed to build HTTP client: {}", e)))
}

/// Polls the upstream feed, stores unseen events and hands them to the dispatcher.
pub struct FeedPoller<S: Store> {
    client: reqwest::Client,
    feed_url: String,
    secondary_locale: String,
    store: S,
    dispatch: DispatchSender,
    events: EventsPublisher,
}

impl<S: Store> FeedPoller<S> {
    pub fn new(
        client: reqwest::Client,
        feed_url: String,
        secondary_locale: String,
        store: S,
        dispatch: DispatchSender,
        events: EventsPublisher,
    ) -> Self {
        Self {
            client,
            feed_url,
            secondary_locale,
            store,
            dispatch,
            events,
        }
    }

    /// Poll immediately, then every `interval` until the dispatch worker goes away.
    pub async fn run(&self, interval: Duration) -> anyhow::Result<()> {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            feed_url = %self.feed_url,
            interval_secs = interval.as_secs(),
            "Feed poller started"
        );

        loop {
            ticker.tick().await;

            if let Err(e) = self.poll_once().await {
                tracing::error!(error = %e, "Feed poll failed");
            }

            if self.dispatch.is_closed() {
                anyhow::bail!("dispatch queue closed, stopping feed poller");
            }
        }
    }

    /// One complete cycle: fetch both locales, merge, store new events, emit.
    pub async fn poll_once(&self) -> Result<PollOutcome, AppError> {
        let primary = self.fetch(None).await?;
        let secondary = self.fetch(Some(&self.secondary_locale)).await?;
        self.ingest(primary, secondary).await
    }

    /// Fetch and decode the feed, optionally in another locale.
    pub async fn fetch(&self, locale: Option<&str>) -> Result<Vec<FeedItem>, AppError> {
        let mut request = self.client.get(&self.feed_url);
        if let Some(locale) = locale {
            request = request.query(&[("lang", locale)]);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AppError::UpstreamUnavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::UpstreamUnavailable(format!(
                "feed answered with status {}",
                status
            )));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| AppError::UpstreamUnavailable(e.to_string()))?;

        let items = decode_feed(&body).inspect_err(|e| {
            tracing::error!(
                error = %e,
                response = %String::from_utf8_lossy(&body),
                "Invalid response from feed"
            );
        })?;

        tracing::debug!(
            status = %status,
            num = items.len(),
            locale = locale.unwrap_or("default"),
            "Feed retrieval ok"
        );
        Ok(items)
    }

    /// Merge, deduplicate against the store and persist, then emit.
    ///
    /// All inserts share one transaction. A row that fails to check or insert
    /// is logged and left out of the batch. If the transaction fails to commit,
    /// nothing is sent to the dispatcher.
    pub async fn ingest(
        &self,
        primary: Vec<FeedItem>,
        secondary: Vec<FeedItem>,
    ) -> Result<PollOutcome, AppError> {
        let merged = merge_translations(primary, secondary, Utc::now().timestamp());
        let mut outcome = PollOutcome {
            total: merged.len(),
            ..Default::default()
        };

        let mut tx = self.store.begin().await?;
        for event in &merged {
            match tx.event_exists(&event.id).await {
                Ok(true) => continue,
                Ok(false) => {}
                Err(e) => {
                    tracing::error!(id = %event.id, error = %e, "Failed to check event existence");
                    continue;
                }
            }

            if let Err(e) = tx.insert_event(event).await {
                tracing::error!(id = %event.id, error = %e, "Failed to store event");
                continue;
            }

            outcome.new_ids.push(event.id.clone());
            outcome.new_events.push(event.clone());
        }

        self.events.publish(merged);

        if let Err(e) = tx.commit().await {
            tracing::error!(
                error = %e,
                dropped = outcome.new_ids.len(),
                "Failed to commit ingested events, skipping dispatch"
            );
            return Err(e);
        }

        tracing::info!(
            num = outcome.total,
            new = outcome.new_ids.len(),
            ids = ?outcome.new_ids,
            "Feed ingested"
        );

        self.dispatch
            .send(DispatchBatch::new(outcome.new_ids.clone()))
            .await?;

        Ok(outcome)
    }
}
