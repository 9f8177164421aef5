use std::future::Future;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::error::Result;

/// Lazily constructed, process-wide client handle.
///
/// The first caller runs the initializer; callers arriving while it is in
/// flight wait for it and receive the same `Arc`. A failed initialization is
/// not cached, so the next caller tries again.
pub struct SharedClient<T> {
    name: &'static str,
    cell: OnceCell<Arc<T>>,
}

impl<T> SharedClient<T> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            cell: OnceCell::new(),
        }
    }

    /// Get the client, constructing it on first access
    pub async fn get_or_init<F, Fut>(&self, init: F) -> Result<Arc<T>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let client = self
            .cell
            .get_or_try_init(|| async {
                info!(client = self.name, "Initializing client");
                init().await.map(Arc::new)
            })
            .await?;
        debug!(client = self.name, "Client handle acquired");
        Ok(Arc::clone(client))
    }

    /// The client, if already initialized
    pub fn get(&self) -> Option<Arc<T>> {
        self.cell.get().cloned()
    }

    pub fn is_initialized(&self) -> bool {
        self.cell.initialized()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NotifierError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct Dummy {
        id: usize,
    }

    #[tokio::test]
    async fn test_concurrent_first_callers_share_one_instance() {
        let shared = Arc::new(SharedClient::<Dummy>::new("dummy"));
        let inits = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let shared = shared.clone();
                let inits = inits.clone();
                tokio::spawn(async move {
                    shared
                        .get_or_init(|| async move {
                            let id = inits.fetch_add(1, Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_millis(20)).await;
                            Ok(Dummy { id })
                        })
                        .await
                })
            })
            .collect();

        let clients: Vec<Arc<Dummy>> = futures::future::join_all(handles)
            .await
            .into_iter()
            .map(|r| r.unwrap().unwrap())
            .collect();

        assert_eq!(inits.load(Ordering::SeqCst), 1);
        assert!(clients.iter().all(|c| Arc::ptr_eq(c, &clients[0])));
        assert_eq!(clients[0].id, 0);
    }

    #[tokio::test]
    async fn test_failed_init_is_retried() {
        let shared = SharedClient::<Dummy>::new("dummy");

        let first = shared
            .get_or_init(|| async { Err(NotifierError::config("not yet")) })
            .await;
        assert!(first.is_err());
        assert!(!shared.is_initialized());

        let second = shared.get_or_init(|| async { Ok(Dummy { id: 7 }) }).await;
        assert_eq!(second.unwrap().id, 7);
        assert_eq!(shared.get().unwrap().id, 7);
    }
}
