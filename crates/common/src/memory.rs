//! In-memory [`Store`] used by tests across the workspace.
//!
//! A transaction works on a private copy of the data and publishes it on
//! commit. Concurrent transactions are last-writer-wins, which is enough for
//! the single-writer scenarios the tests exercise.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use crate::error::AppError;
use crate::store::{Store, StoreTx};
use crate::types::{DeviceToken, NewDeviceToken, TrafficEvent};

#[derive(Debug, Clone, Default)]
struct MemoryData {
    events: BTreeMap<String, TrafficEvent>,
    /// Keyed by row id so iteration follows insertion order.
    tokens: BTreeMap<i64, DeviceToken>,
    next_token_id: i64,
}

/// Mutation log, for asserting on what a component did to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOp {
    InsertEvent(String),
    InsertToken(String),
    DeleteToken(String),
}

#[derive(Debug, Default)]
struct Shared {
    data: MemoryData,
    ops: Vec<StoreOp>,
    fail_next_commit: bool,
    failing_event_ids: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    shared: Arc<Mutex<Shared>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed committed events directly.
    pub fn with_events(self, events: impl IntoIterator<Item = TrafficEvent>) -> Self {
        {
            let mut shared = self.lock();
            for event in events {
                shared.data.events.insert(event.id.clone(), event);
            }
        }
        self
    }

    /// Seed committed tokens directly.
    pub fn with_tokens<I, S>(self, tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        {
            let mut shared = self.lock();
            for token in tokens {
                let token = NewDeviceToken {
                    token: token.into(),
                    registered_at: 0,
                    user_agent: "seed".to_string(),
                };
                insert_token(&mut shared.data, &token);
            }
        }
        self
    }

    /// Make the next `commit` fail and discard its changes.
    pub fn fail_next_commit(&self) {
        self.lock().fail_next_commit = true;
    }

    /// Make every insert of this event id fail.
    pub fn fail_insert_of(&self, id: impl Into<String>) {
        self.lock().failing_event_ids.push(id.into());
    }

    pub fn events(&self) -> Vec<TrafficEvent> {
        self.lock().data.events.values().cloned().collect()
    }

    pub fn tokens(&self) -> Vec<String> {
        self.lock()
            .data
            .tokens
            .values()
            .map(|t| t.token.clone())
            .collect()
    }

    /// Committed mutations, in order.
    pub fn ops(&self) -> Vec<StoreOp> {
        self.lock().ops.clone()
    }

    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl Store for MemoryStore {
    type Tx = MemoryTx;

    async fn begin(&self) -> Result<MemoryTx, AppError> {
        let shared = self.lock();
        Ok(MemoryTx {
            store: self.clone(),
            data: shared.data.clone(),
            failing_event_ids: shared.failing_event_ids.clone(),
            ops: Vec::new(),
        })
    }
}

pub struct MemoryTx {
    store: MemoryStore,
    data: MemoryData,
    failing_event_ids: Vec<String>,
    ops: Vec<StoreOp>,
}

fn insert_token(data: &mut MemoryData, token: &NewDeviceToken) -> bool {
    if data.tokens.values().any(|t| t.token == token.token) {
        return false;
    }
    data.next_token_id += 1;
    data.tokens.insert(
        data.next_token_id,
        DeviceToken {
            id: data.next_token_id,
            token: token.token.clone(),
            registered_at: token.registered_at,
            user_agent: token.user_agent.clone(),
        },
    );
    true
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn event_exists(&mut self, id: &str) -> Result<bool, AppError> {
        Ok(self.data.events.contains_key(id))
    }

    async fn insert_event(&mut self, event: &TrafficEvent) -> Result<(), AppError> {
        if self.failing_event_ids.iter().any(|id| id == &event.id) {
            return Err(AppError::Internal(format!("insert of {} refused", event.id)));
        }
        if self.data.events.contains_key(&event.id) {
            return Err(AppError::Validation(format!("duplicate event {}", event.id)));
        }
        self.data.events.insert(event.id.clone(), event.clone());
        self.ops.push(StoreOp::InsertEvent(event.id.clone()));
        Ok(())
    }

    async fn find_event(&mut self, id: &str) -> Result<Option<TrafficEvent>, AppError> {
        Ok(self.data.events.get(id).cloned())
    }

    async fn count_events_since(&mut self, since: i64) -> Result<i64, AppError> {
        Ok(self
            .data
            .events
            .values()
            .filter(|e| e.ingested_at >= since)
            .count() as i64)
    }

    async fn count_tokens(&mut self) -> Result<i64, AppError> {
        Ok(self.data.tokens.len() as i64)
    }

    async fn max_token_id(&mut self) -> Result<Option<i64>, AppError> {
        Ok(self.data.tokens.keys().next_back().copied())
    }

    async fn token_page(
        &mut self,
        after_id: i64,
        through_id: i64,
        limit: i64,
    ) -> Result<Vec<DeviceToken>, AppError> {
        if through_id <= after_id {
            return Ok(Vec::new());
        }
        Ok(self
            .data
            .tokens
            .range((Bound::Excluded(after_id), Bound::Included(through_id)))
            .take(limit.max(0) as usize)
            .map(|(_, t)| t.clone())
            .collect())
    }

    async fn insert_token_if_absent(&mut self, token: &NewDeviceToken) -> Result<bool, AppError> {
        let created = insert_token(&mut self.data, token);
        if created {
            self.ops.push(StoreOp::InsertToken(token.token.clone()));
        }
        Ok(created)
    }

    async fn delete_token(&mut self, token: &str) -> Result<bool, AppError> {
        let id = self
            .data
            .tokens
            .iter()
            .find(|(_, t)| t.token == token)
            .map(|(id, _)| *id);

        match id {
            Some(id) => {
                self.data.tokens.remove(&id);
                self.ops.push(StoreOp::DeleteToken(token.to_string()));
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn commit(self) -> Result<(), AppError> {
        let mut shared = self.store.lock();
        if shared.fail_next_commit {
            shared.fail_next_commit = false;
            return Err(AppError::Internal("commit refused".to_string()));
        }
        shared.data = self.data;
        shared.ops.extend(self.ops);
        Ok(())
    }

    async fn rollback(self) -> Result<(), AppError> {
        Ok(())
    }
}
