//! In-memory results store.
//!
//! Holds the aggregated record and timelines for each analysis session,
//! keyed by session id, plus a "latest" pointer for callers that do not
//! track sessions. Last write wins for the latest view; records are never
//! merged. Data lives in process memory only and is lost on restart.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use serde_json::Value;
use uuid::Uuid;

use crate::analysis::aggregate::AggregatedResult;

#[derive(Default)]
pub struct ResultsStore {
    inner: RwLock<StoreInner>,
}

#[derive(Default)]
struct StoreInner {
    results: HashMap<Uuid, AggregatedResult>,
    timelines: HashMap<Uuid, Value>,
    latest: Option<Uuid>,
}

impl ResultsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts/replaces the record for its session and makes that session
    /// the latest. No merging with whatever was there before.
    pub fn store_result(&self, result: AggregatedResult) {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        inner.latest = Some(result.session_id);
        inner.results.insert(result.session_id, result);
    }

    /// Clone of the record for `session`, or of the latest session when
    /// `session` is `None`. `None` when nothing has been stored yet.
    pub fn load_result(&self, session: Option<Uuid>) -> Option<AggregatedResult> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        let key = session.or(inner.latest)?;
        inner.results.get(&key).cloned()
    }

    pub fn store_timelines(&self, session: Uuid, timelines: Value) {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        inner.timelines.insert(session, timelines);
    }

    /// Timelines for the session, falling back to the `interview_timelines`
    /// nested in the stored result when no standalone record exists.
    pub fn load_timelines(&self, session: Option<Uuid>) -> Option<Value> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        let key = session.or(inner.latest)?;
        if let Some(timelines) = inner.timelines.get(&key) {
            return Some(timelines.clone());
        }
        inner
            .results
            .get(&key)
            .map(|r| r.interview_timelines.clone())
    }
}
