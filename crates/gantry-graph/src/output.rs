//! Deferred values resolved during apply.
//!
//! An [`Output<T>`] is a clone-able handle to a value some resource will
//! produce once the provider finishes creating it (a service URI, an image
//! digest). The matching [`OutputSlot<T>`] is the single writer. Consumers
//! await `get()` inside their own create closure; the engine's dependency
//! edges guarantee the producer's closure runs first, so a well-formed graph
//! never observes an unresolved value.
//!
//! Dropping a slot without resolving it (the producer failed or was skipped)
//! poisons the output: pending `get()` calls return [`GraphError::Unresolved`]
//! instead of hanging forever.

use tokio::sync::watch;

use crate::error::{GraphError, GraphResult};

#[derive(Debug, Clone)]
enum Resolution<T> {
    Pending,
    Ready(T),
}

/// Single-writer resolver for an [`Output`].
#[derive(Debug)]
pub struct OutputSlot<T> {
    tx: watch::Sender<Resolution<T>>,
}

impl<T> OutputSlot<T> {
    /// Resolve the output. Later calls overwrite, but a resource's create
    /// closure runs exactly once per apply, so this happens at most once.
    pub fn set(self, value: T) {
        let _ = self.tx.send(Resolution::Ready(value));
    }
}

/// A deferred, clone-able value produced by one resource and consumed by
/// others.
#[derive(Debug, Clone)]
pub struct Output<T> {
    rx: watch::Receiver<Resolution<T>>,
}

impl<T: Clone + Send + Sync + 'static> Output<T> {
    /// A not-yet-resolved output and its writer half.
    pub fn pending() -> (OutputSlot<T>, Output<T>) {
        let (tx, rx) = watch::channel(Resolution::Pending);
        (OutputSlot { tx }, Output { rx })
    }

    /// An output that is already resolved (for plain config inputs fed into
    /// deferred positions).
    pub fn resolved(value: T) -> Output<T> {
        let (slot, out) = Output::pending();
        slot.set(value);
        out
    }

    /// Wait until the producing resource resolves this output.
    pub async fn get(&self) -> GraphResult<T> {
        let mut rx = self.rx.clone();
        let guard = rx
            .wait_for(|r| matches!(r, Resolution::Ready(_)))
            .await
            .map_err(|_| GraphError::Unresolved)?;
        match &*guard {
            Resolution::Ready(v) => Ok(v.clone()),
            Resolution::Pending => Err(GraphError::Unresolved),
        }
    }

    /// Non-blocking peek. `None` while pending; never blocks, never panics.
    pub fn try_get(&self) -> Option<T> {
        match &*self.rx.borrow() {
            Resolution::Ready(v) => Some(v.clone()),
            Resolution::Pending => None,
        }
    }

    /// Derive a new output by applying `f` once this one resolves.
    ///
    /// If this output is poisoned the derived output is poisoned too.
    pub fn map<U, F>(&self, f: F) -> Output<U>
    where
        U: Clone + Send + Sync + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        let (slot, out) = Output::pending();
        let src = self.clone();
        tokio::spawn(async move {
            if let Ok(value) = src.get().await {
                slot.set(f(value));
            }
        });
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn resolved_is_immediately_available() {
        let out = Output::resolved(42u32);
        assert_eq!(out.try_get(), Some(42));
        assert_eq!(out.get().await.unwrap(), 42);
    }

    #[tokio::test]
    async fn pending_try_get_is_none() {
        let (_slot, out) = Output::<String>::pending();
        assert_eq!(out.try_get(), None);
    }

    #[tokio::test]
    async fn get_waits_for_set() {
        let (slot, out) = Output::pending();
        let waiter = tokio::spawn(async move { out.get().await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        slot.set("https://svc.run.app".to_string());
        let got = waiter.await.unwrap().unwrap();
        assert_eq!(got, "https://svc.run.app");
    }

    #[tokio::test]
    async fn dropped_slot_poisons_output() {
        let (slot, out) = Output::<u8>::pending();
        drop(slot);
        assert!(matches!(out.get().await, Err(GraphError::Unresolved)));
    }

    #[tokio::test]
    async fn map_follows_resolution() {
        let (slot, out) = Output::pending();
        let mapped = out.map(|host: String| format!("https://{host}"));
        slot.set("gw.gateway.dev".to_string());
        assert_eq!(mapped.get().await.unwrap(), "https://gw.gateway.dev");
    }

    #[tokio::test]
    async fn map_propagates_poison() {
        let (slot, out) = Output::<u8>::pending();
        let mapped = out.map(|v| v + 1);
        drop(slot);
        assert!(matches!(mapped.get().await, Err(GraphError::Unresolved)));
    }
}
