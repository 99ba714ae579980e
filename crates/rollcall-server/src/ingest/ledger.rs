//! Run-scoped duplicate identifier ledger

use dashmap::DashSet;

/// Set of identifiers already accepted in one ingestion run.
///
/// Sharded internally, so pool members call it concurrently without any
/// outside lock. A fresh ledger is built per file and never shared across runs.
#[derive(Debug, Default)]
pub struct DedupLedger {
    seen: DashSet<String>,
}

impl DedupLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `id` if it has not been seen in this run.
    ///
    /// Returns `true` exactly once per identifier; every later call with the
    /// same identifier, from any task, returns `false`.
    pub fn try_claim(&self, id: &str) -> bool {
        if self.seen.contains(id) {
            return false;
        }
        self.seen.insert(id.to_string())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.seen.contains(id)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    #[test]
    fn test_first_claim_wins() {
        let ledger = DedupLedger::new();
        assert!(ledger.try_claim("S001"));
        assert!(!ledger.try_claim("S001"));
        assert!(ledger.try_claim("S002"));
        assert_eq!(ledger.len(), 2);
        assert!(ledger.contains("S001"));
        assert!(!ledger.contains("S003"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_concurrent_claims_on_same_id() {
        let ledger = Arc::new(DedupLedger::new());
        let wins = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(tokio::sync::Barrier::new(32));

        let mut handles = Vec::new();
        for _ in 0..32 {
            let ledger = ledger.clone();
            let wins = wins.clone();
            let barrier = barrier.clone();
            handles.push(tokio::spawn(async move {
                barrier.wait().await;
                if ledger.try_claim("S042") {
                    wins.fetch_add(1, Ordering::SeqCst);
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(wins.load(Ordering::SeqCst), 1);
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn test_concurrent_claims_from_threads() {
        let ledger = Arc::new(DedupLedger::new());
        let threads: Vec<_> = (0..8)
            .map(|_| {
                let ledger = ledger.clone();
                std::thread::spawn(move || {
                    (0..500)
                        .filter(|i| ledger.try_claim(&format!("S{:04}", i)))
                        .count()
                })
            })
            .collect();

        let total: usize = threads.into_iter().map(|t| t.join().unwrap()).sum();
        assert_eq!(total, 500);
        assert_eq!(ledger.len(), 500);
    }
}
