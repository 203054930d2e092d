use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

/// Error types for the execution context store
#[derive(Error, Debug)]
pub enum ContextError {
    #[error("Serialization error: {0}")]
    Serialization(#[source] serde_json::Error),

    #[error("Deserialization error for key '{key}': {source}")]
    Deserialization {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Cancellable execution context threaded through every task call
///
/// Carries the cancellation token tasks are expected to observe and a
/// string-keyed value store the tasks of a flow share. Clones share both:
/// cancelling one clone cancels them all, and a value set through one
/// clone is visible through the others.
///
/// The store is last-write-wins and is not an inter-task synchronization
/// primitive. An ordered flow runs its children strictly sequentially, so
/// its tasks never contend on the lock; the lock exists because a shared
/// map needs interior mutability, not to make flows concurrent.
#[derive(Debug, Clone, Default)]
pub struct ExecContext {
    /// Cancellation signal observed by tasks and the retry decorator
    cancel: CancellationToken,

    /// Values shared between the tasks of a flow
    values: Arc<RwLock<HashMap<String, serde_json::Value>>>,
}

impl ExecContext {
    /// Create a new execution context
    pub fn new() -> Self {
        ExecContext::default()
    }

    /// Request cancellation of every task holding a clone of this context
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Check whether cancellation has been requested
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Wait until cancellation is requested
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await;
    }

    /// Store a value under `key`, replacing any previous value
    pub async fn set<T: Serialize>(
        &self,
        key: impl Into<String>,
        value: T,
    ) -> Result<(), ContextError> {
        let value = serde_json::to_value(value).map_err(ContextError::Serialization)?;
        self.values.write().await.insert(key.into(), value);
        Ok(())
    }

    /// Get the value stored under `key`, deserialized to `T`
    ///
    /// Returns `Ok(None)` if the key does not exist.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, ContextError> {
        match self.get_value(key).await {
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|source| ContextError::Deserialization {
                    key: key.to_string(),
                    source,
                }),
            None => Ok(None),
        }
    }

    /// Get the raw JSON value stored under `key`
    pub async fn get_value(&self, key: &str) -> Option<serde_json::Value> {
        self.values.read().await.get(key).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Reservation {
        id: String,
        seats: u32,
    }

    #[tokio::test]
    async fn test_set_and_get_typed() {
        let ctx = ExecContext::new();
        ctx.set("count", 3u32).await.unwrap();
        ctx.set(
            "reservation",
            Reservation {
                id: "r-1".to_string(),
                seats: 2,
            },
        )
        .await
        .unwrap();

        assert_eq!(ctx.get::<u32>("count").await.unwrap(), Some(3));
        assert_eq!(
            ctx.get::<Reservation>("reservation").await.unwrap(),
            Some(Reservation {
                id: "r-1".to_string(),
                seats: 2,
            })
        );
    }

    #[tokio::test]
    async fn test_get_missing_key() {
        let ctx = ExecContext::new();
        assert_eq!(ctx.get::<String>("missing").await.unwrap(), None);
        assert!(ctx.get_value("missing").await.is_none());
    }

    #[tokio::test]
    async fn test_get_wrong_type() {
        let ctx = ExecContext::new();
        ctx.set("count", "not a number").await.unwrap();

        let err = ctx.get::<u32>("count").await.unwrap_err();
        assert!(matches!(err, ContextError::Deserialization { .. }));
    }

    #[tokio::test]
    async fn test_last_write_wins() {
        let ctx = ExecContext::new();
        ctx.set("key", 1u32).await.unwrap();
        ctx.set("key", 2u32).await.unwrap();
        assert_eq!(ctx.get::<u32>("key").await.unwrap(), Some(2));
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let ctx = ExecContext::new();
        let clone = ctx.clone();

        clone.set("seen", true).await.unwrap();
        assert_eq!(ctx.get::<bool>("seen").await.unwrap(), Some(true));

        assert!(!clone.is_cancelled());
        ctx.cancel();
        assert!(clone.is_cancelled());
    }
}
