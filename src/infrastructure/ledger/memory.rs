use crate::domain::error::DomainError;
use crate::domain::ports::opinion_ledger::{OpinionLedger, OpinionRecord};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

#[derive(Default)]
struct Inner {
    by_id: HashMap<String, OpinionRecord>,
    /// Oldest first.
    per_model: HashMap<String, VecDeque<String>>,
}

/// Process-local ledger; the default when no database path is configured.
pub struct InMemoryOpinionLedger {
    inner: Mutex<Inner>,
    capacity_per_model: usize,
}

impl InMemoryOpinionLedger {
    pub fn new(capacity_per_model: usize) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            capacity_per_model: capacity_per_model.max(1),
        }
    }
}

impl OpinionLedger for InMemoryOpinionLedger {
    fn record(&self, records: &[OpinionRecord]) -> Result<(), DomainError> {
        let mut inner = self
            .inner
            .lock()
            .map_err(|e| DomainError::Database(e.to_string()))?;
        let Inner { by_id, per_model } = &mut *inner;

        for r in records {
            let id = r.opinion.opinion_id.clone();
            let queue = per_model.entry(r.opinion.model_id.clone()).or_default();
            if by_id.insert(id.clone(), r.clone()).is_none() {
                queue.push_back(id);
            }
            while queue.len() > self.capacity_per_model {
                if let Some(evicted) = queue.pop_front() {
                    by_id.remove(&evicted);
                }
            }
        }
        Ok(())
    }

    fn get(&self, opinion_id: &str) -> Result<Option<OpinionRecord>, DomainError> {
        let inner = self
            .inner
            .lock()
            .map_err(|e| DomainError::Database(e.to_string()))?;
        Ok(inner.by_id.get(opinion_id).cloned())
    }

    fn mark_settled(&self, opinion_id: &str, at: DateTime<Utc>) -> Result<(), DomainError> {
        let mut inner = self
            .inner
            .lock()
            .map_err(|e| DomainError::Database(e.to_string()))?;
        match inner.by_id.get_mut(opinion_id) {
            Some(r) if r.settled_at.is_some() => Err(DomainError::InvalidInput(format!(
                "opinion {opinion_id} already settled"
            ))),
            Some(r) => {
                r.settled_at = Some(at);
                Ok(())
            }
            None => Err(DomainError::NotFound(format!("Opinion not found: {opinion_id}"))),
        }
    }

    fn recent(&self, model_id: &str, limit: usize) -> Result<Vec<OpinionRecord>, DomainError> {
        let inner = self
            .inner
            .lock()
            .map_err(|e| DomainError::Database(e.to_string()))?;
        Ok(inner
            .per_model
            .get(model_id)
            .map(|q| {
                q.iter()
                    .rev()
                    .take(limit)
                    .filter_map(|id| inner.by_id.get(id).cloned())
                    .collect()
            })
            .unwrap_or_default())
    }
}
