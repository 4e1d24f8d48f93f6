//! Registry of live change listeners.
//!
//! Each subscription owns a [`Listener`]; removing it from the registry
//! drops the listener and closes the feed. Subscriptions that nobody
//! drains for longer than the idle timeout can be swept with
//! [`SubscriptionRegistry::evict_idle`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use lectern_store::{ChangeEvent, ContentClient, Listener, QueryParams};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, info, instrument};

use crate::domain::{GatewayError, RepositoryContext, Result};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriptionId(String);

impl SubscriptionId {
    fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SubscriptionId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

struct Subscription {
    query: String,
    listener: Listener,
    last_active: Instant,
}

pub struct SubscriptionRegistry {
    client: Arc<dyn ContentClient>,
    idle_timeout: Option<Duration>,
    entries: Mutex<HashMap<SubscriptionId, Subscription>>,
}

impl SubscriptionRegistry {
    pub fn new(client: Arc<dyn ContentClient>, idle_timeout: Option<Duration>) -> Self {
        Self {
            client,
            idle_timeout,
            entries: Mutex::new(HashMap::new()),
        }
    }

    #[instrument(skip(self, params))]
    pub async fn subscribe(&self, query: &str, params: QueryParams) -> Result<SubscriptionId> {
        if query.trim().is_empty() {
            return Err(GatewayError::validation("a subscription needs a query"));
        }
        let listener = self
            .client
            .listen(query, &params)
            .await
            .context("Failed to subscribe")?;

        let id = SubscriptionId::generate();
        self.lock().insert(
            id.clone(),
            Subscription {
                query: query.to_string(),
                listener,
                last_active: Instant::now(),
            },
        );
        debug!(subscription = %id, "subscribed");
        Ok(id)
    }

    /// Pending events of one subscription. Counts as activity.
    pub fn drain(&self, id: &SubscriptionId) -> Result<Vec<ChangeEvent>> {
        let mut entries = self.lock();
        let entry = entries
            .get_mut(id)
            .ok_or_else(|| GatewayError::validation(format!("unknown subscription {id}")))?;
        entry.last_active = Instant::now();
        Ok(entry.listener.drain())
    }

    /// Drop a subscription. Returns `false` if it was not registered.
    pub fn unsubscribe(&self, id: &SubscriptionId) -> bool {
        let removed = self.lock().remove(id);
        if let Some(entry) = &removed {
            debug!(subscription = %id, query = %entry.query, "unsubscribed");
        }
        removed.is_some()
    }

    /// Remove subscriptions idle for at least the configured timeout.
    pub fn evict_idle(&self) -> Vec<SubscriptionId> {
        let Some(timeout) = self.idle_timeout else {
            return Vec::new();
        };
        let now = Instant::now();
        let mut entries = self.lock();
        let stale: Vec<SubscriptionId> = entries
            .iter()
            .filter(|(_, entry)| now.duration_since(entry.last_active) >= timeout)
            .map(|(id, _)| id.clone())
            .collect();
        for id in &stale {
            entries.remove(id);
        }
        if !stale.is_empty() {
            info!(evicted = stale.len(), "evicted idle subscriptions");
        }
        stale
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, id: &SubscriptionId) -> bool {
        self.lock().contains_key(id)
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<SubscriptionId, Subscription>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lectern_store::fakes::MemoryContentLake;
    use lectern_store::{Document, Transaction, Transition};
    use serde_json::json;

    fn type_params(doc_type: &str) -> QueryParams {
        json!({"type": doc_type}).as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn drains_changes_for_matching_documents() {
        let lake = Arc::new(MemoryContentLake::new());
        let registry = SubscriptionRegistry::new(lake.clone(), None);
        let id = registry
            .subscribe("*[_type == $type]", type_params("post"))
            .await
            .unwrap();

        lake.commit_transaction(
            Transaction::new()
                .create(Document::new("p1", "post"))
                .create(Document::new("a1", "author")),
        )
        .await
        .unwrap();

        let events = registry.drain(&id).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].document_id, "p1");
        assert_eq!(events[0].transition, Transition::Appear);
        assert!(registry.drain(&id).unwrap().is_empty());
    }

    #[tokio::test]
    async fn unsubscribe_closes_the_feed() {
        let lake = Arc::new(MemoryContentLake::new());
        let registry = SubscriptionRegistry::new(lake.clone(), None);
        let id = registry.subscribe("*", QueryParams::new()).await.unwrap();
        assert_eq!(lake.open_listeners(), 1);

        assert!(registry.unsubscribe(&id));
        assert!(!registry.unsubscribe(&id));
        assert_eq!(lake.open_listeners(), 0);
        assert!(registry.drain(&id).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn idle_subscriptions_are_evicted() {
        let lake = Arc::new(MemoryContentLake::new());
        let registry = SubscriptionRegistry::new(lake.clone(), Some(Duration::from_secs(60)));
        let idle = registry.subscribe("*", QueryParams::new()).await.unwrap();
        let busy = registry.subscribe("*", QueryParams::new()).await.unwrap();

        tokio::time::advance(Duration::from_secs(45)).await;
        registry.drain(&busy).unwrap();
        tokio::time::advance(Duration::from_secs(20)).await;

        assert_eq!(registry.evict_idle(), vec![idle.clone()]);
        assert!(!registry.contains(&idle));
        assert!(registry.contains(&busy));
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn no_timeout_means_no_eviction() {
        let lake = Arc::new(MemoryContentLake::new());
        let registry = SubscriptionRegistry::new(lake, None);
        registry.subscribe("*", QueryParams::new()).await.unwrap();
        tokio::time::advance(Duration::from_secs(3600)).await;
        assert!(registry.evict_idle().is_empty());
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn empty_query_is_rejected() {
        let lake = Arc::new(MemoryContentLake::new());
        let registry = SubscriptionRegistry::new(lake, None);
        let err = registry.subscribe("  ", QueryParams::new()).await.unwrap_err();
        assert!(matches!(err, GatewayError::Validation(_)));
        assert!(registry.is_empty());
    }
}
