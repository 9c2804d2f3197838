//! End-to-end service scenarios

use crate::config::CacheConfig;
use crate::error::CacheResult;
use crate::service::ContextCacheService;
use crate::store::RemoteBackend;
use crate::types::{HistoryPayload, HistorySource, StoredSession, Turn};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn small_config() -> CacheConfig {
    CacheConfig::new()
        .with_max_sessions(64)
        .with_shard_count(4)
        .with_sweep_interval_secs(3600)
}

/// In-memory stand-in for the distributed backend
#[derive(Default)]
struct MapRemote {
    entries: Mutex<HashMap<String, Vec<u8>>>,
}

#[async_trait]
impl RemoteBackend for MapRemote {
    async fn fetch(&self, handle: &str) -> CacheResult<Option<Vec<u8>>> {
        Ok(self.entries.lock().get(handle).cloned())
    }

    async fn store(&self, handle: &str, payload: &[u8], _ttl_secs: u64) -> CacheResult<()> {
        self.entries.lock().insert(handle.to_string(), payload.to_vec());
        Ok(())
    }

    async fn delete(&self, handle: &str) -> CacheResult<()> {
        self.entries.lock().remove(handle);
        Ok(())
    }
}

#[tokio::test]
async fn test_stateless_path() {
    init_tracing();
    let service = ContextCacheService::local(small_config()).unwrap();

    // Request with no handle and empty history resolves to no prior turns
    let source = HistorySource::from_request(None, Some(HistoryPayload::default()));
    let prior = service.resolve(source).await;
    assert!(prior.is_empty());

    let turn = Turn::estimated("hi", "hello there", service.estimator());
    let outcome = service.commit(prior, turn, 4096).await.unwrap();
    assert!(!outcome.handle.is_empty());
    assert!(!outcome.truncated);
    assert!(outcome.total_tokens > 0);

    service.shutdown().await;
}

#[tokio::test]
async fn test_handle_reuse_returns_committed_turns() {
    let service = ContextCacheService::local(small_config()).unwrap();

    let turn = Turn::estimated("what is rust", "a systems language", service.estimator());
    let outcome = service.commit(Vec::new(), turn.clone(), 4096).await.unwrap();

    let source = HistorySource::from_request(Some(outcome.handle.clone()), None);
    let resolved = service.resolve(source).await;
    assert_eq!(resolved, vec![turn]);

    service.shutdown().await;
}

#[tokio::test]
async fn test_commit_chain_grows_history() {
    let service = ContextCacheService::local(small_config()).unwrap();

    let mut handle = None;
    for i in 0..5 {
        let source = HistorySource::from_request(handle.clone(), None);
        let prior = service.resolve(source).await;
        assert_eq!(prior.len(), i);

        let turn = Turn::estimated(format!("question {i}"), format!("answer {i}"), service.estimator());
        let outcome = service.commit(prior, turn, 4096).await.unwrap();
        handle = Some(outcome.handle);
    }

    let turns = service
        .resolve(HistorySource::from_request(handle, None))
        .await;
    assert_eq!(turns.len(), 5);
    assert_eq!(turns[0].user_text, "question 0");
    assert_eq!(turns[4].bot_text, "answer 4");

    service.shutdown().await;
}

#[tokio::test]
async fn test_idempotent_handles() {
    let service = ContextCacheService::local(small_config()).unwrap();

    let turn = Turn::new("same state", "same reply", 12);
    let first = service
        .commit(Vec::new(), turn.clone(), 4096)
        .await
        .unwrap();
    let second = service.commit(Vec::new(), turn, 4096).await.unwrap();

    // Logically identical states converge on the same handle
    assert_eq!(first.handle, second.handle);
    assert_eq!(service.stats().cache_size, 1);

    service.shutdown().await;
}

#[tokio::test]
async fn test_expired_handle_resolves_as_new_conversation() {
    let config = small_config().with_ttl_secs(1);
    let service = ContextCacheService::local(config).unwrap();

    let turn = Turn::estimated("hi", "hello", service.estimator());
    let outcome = service.commit(Vec::new(), turn, 4096).await.unwrap();

    tokio::time::sleep(std::time::Duration::from_millis(2100)).await;

    let resolved = service
        .resolve(HistorySource::from_request(Some(outcome.handle), None))
        .await;
    assert!(resolved.is_empty());

    service.shutdown().await;
}

#[tokio::test]
async fn test_miss_falls_back_to_inline_history() {
    let service = ContextCacheService::local(small_config()).unwrap();

    let payload = HistoryPayload {
        user: vec!["earlier question".to_string()],
        bot: vec!["earlier answer".to_string()],
    };
    let source = HistorySource::from_request(
        Some("0123456789abcdef0123456789abcdef".to_string()),
        Some(payload),
    );

    let resolved = service.resolve(source).await;
    assert_eq!(resolved.len(), 1);
    assert_eq!(resolved[0].user_text, "earlier question");

    service.shutdown().await;
}

#[tokio::test]
async fn test_corrupt_distributed_entry_is_purged_on_resolve() {
    init_tracing();
    let remote = Arc::new(MapRemote::default());
    let handle = "0123456789abcdef0123456789abcdef";

    // Seed the distributed layer with an entry whose payload claims to be
    // compressed but is not valid gzip
    let now = Utc::now();
    let corrupt = StoredSession {
        payload: b"not gzip".to_vec(),
        is_compressed: true,
        total_tokens: 10,
        created_at: now,
        last_accessed_at: now,
        raw_size: 8,
        stored_size: 8,
    };
    remote.entries.lock().insert(
        handle.to_string(),
        serde_json::to_vec(&corrupt).unwrap(),
    );

    let service = ContextCacheService::with_backend(small_config(), remote.clone()).unwrap();

    let resolved = service
        .resolve(HistorySource::from_request(Some(handle.to_string()), None))
        .await;
    assert!(resolved.is_empty());
    // The corrupt entry is gone from the distributed layer too, so a later
    // resolve cannot read it back through
    assert!(!remote.entries.lock().contains_key(handle));
    let resolved_again = service
        .resolve(HistorySource::from_request(Some(handle.to_string()), None))
        .await;
    assert!(resolved_again.is_empty());

    service.shutdown().await;
}

#[tokio::test]
async fn test_oversized_conversation_is_pruned() {
    let service = ContextCacheService::local(small_config()).unwrap();
    let budget = 300usize;

    // Build prior turns totalling roughly three times the budget
    let prior: Vec<Turn> = (0..9).map(|i| Turn::new(format!("q{i}"), format!("a{i}"), 100)).collect();
    let outcome = service
        .commit(prior, Turn::new("final q", "final a", 100), budget)
        .await
        .unwrap();

    assert!(outcome.truncated);
    assert!(outcome.total_tokens <= budget);

    // The stored state honors the budget too
    let turns = service
        .resolve(HistorySource::from_request(Some(outcome.handle), None))
        .await;
    let total: usize = turns.iter().map(|t| t.token_cost).sum();
    assert!(total <= budget);
    assert_eq!(turns.last().unwrap().user_text, "final q");

    service.shutdown().await;
}

#[tokio::test]
async fn test_large_history_is_compressed_and_restored() {
    let service = ContextCacheService::local(small_config()).unwrap();

    let long_reply = "a fairly verbose model response, repeated to exceed a kilobyte. ".repeat(40);
    let turn = Turn::estimated("tell me everything", long_reply.clone(), service.estimator());
    let outcome = service
        .commit(Vec::new(), turn, 1_000_000)
        .await
        .unwrap();

    let session = service.session(&outcome.handle).await.expect("stored session");
    assert!(session.is_compressed);
    assert!(session.stored_size < session.raw_size);
    assert_eq!(session.turns[0].bot_text, long_reply);

    service.shutdown().await;
}

#[tokio::test]
async fn test_eviction_under_capacity_pressure() {
    let config = CacheConfig::new()
        .with_max_sessions(10)
        .with_shard_count(1)
        .with_sweep_interval_secs(3600);
    let service = ContextCacheService::local(config).unwrap();

    let mut handles = Vec::new();
    for i in 0..11 {
        let turn = Turn::new(format!("unique question {i}"), format!("answer {i}"), 10);
        let outcome = service.commit(Vec::new(), turn, 4096).await.unwrap();
        handles.push(outcome.handle);
    }

    assert_eq!(service.stats().cache_size, 10);
    // The first committed state was least recently used and got evicted
    let evicted = service
        .resolve(HistorySource::from_request(Some(handles[0].clone()), None))
        .await;
    assert!(evicted.is_empty());
    // Everything else is still resolvable
    for handle in &handles[1..] {
        let turns = service
            .resolve(HistorySource::from_request(Some(handle.clone()), None))
            .await;
        assert_eq!(turns.len(), 1);
    }

    service.shutdown().await;
}

#[tokio::test]
async fn test_stats_snapshot() {
    let config = small_config().with_ttl_secs(1800);
    let service = ContextCacheService::local(config).unwrap();

    let turn = Turn::new("hi", "hello", 5);
    service.commit(Vec::new(), turn, 4096).await.unwrap();

    let stats = service.stats();
    assert_eq!(stats.cache_size, 1);
    assert_eq!(stats.cache_max, 64);
    assert_eq!(stats.cache_ttl, 1800);
    assert!(!stats.distributed_enabled);
    assert_eq!(stats.compression_threshold, 1024);

    service.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_commits_and_resolves() {
    init_tracing();
    let service = Arc::new(
        ContextCacheService::local(
            CacheConfig::new()
                .with_max_sessions(512)
                .with_shard_count(16)
                .with_sweep_interval_secs(3600),
        )
        .unwrap(),
    );

    let mut workers = Vec::new();
    for worker in 0..8 {
        let service = service.clone();
        workers.push(tokio::spawn(async move {
            let mut handle = None;
            for i in 0..25 {
                let prior = service
                    .resolve(HistorySource::from_request(handle.clone(), None))
                    .await;
                let turn = Turn::new(
                    format!("worker {worker} question {i}"),
                    format!("worker {worker} answer {i}"),
                    10,
                );
                let outcome = service.commit(prior, turn, 4096).await.unwrap();
                handle = Some(outcome.handle);
            }
            // Each worker's final state holds its full private conversation
            let turns = service
                .resolve(HistorySource::from_request(handle, None))
                .await;
            assert_eq!(turns.len(), 25);
            assert_eq!(turns[24].user_text, format!("worker {worker} question 24"));
        }));
    }

    for worker in workers {
        worker.await.unwrap();
    }

    service.shutdown().await;
}

#[tokio::test]
async fn test_divergent_commits_from_shared_prior_state() {
    let service = ContextCacheService::local(small_config()).unwrap();

    let base = service
        .commit(Vec::new(), Turn::new("shared", "prior", 10), 4096)
        .await
        .unwrap();
    let prior = service
        .resolve(HistorySource::from_request(Some(base.handle.clone()), None))
        .await;

    // Two commits racing from the same prior state produce two distinct
    // successor handles; both remain resolvable
    let left = service
        .commit(prior.clone(), Turn::new("left branch", "l", 10), 4096)
        .await
        .unwrap();
    let right = service
        .commit(prior, Turn::new("right branch", "r", 10), 4096)
        .await
        .unwrap();

    assert_ne!(left.handle, right.handle);
    let left_turns = service
        .resolve(HistorySource::from_request(Some(left.handle), None))
        .await;
    let right_turns = service
        .resolve(HistorySource::from_request(Some(right.handle), None))
        .await;
    assert_eq!(left_turns[1].user_text, "left branch");
    assert_eq!(right_turns[1].user_text, "right branch");

    service.shutdown().await;
}

#[tokio::test]
async fn test_background_sweep_expires_idle_sessions() {
    let config = CacheConfig::new()
        .with_max_sessions(16)
        .with_shard_count(2)
        .with_ttl_secs(1)
        .with_sweep_interval_secs(1);
    let service = ContextCacheService::local(config).unwrap();

    service
        .commit(Vec::new(), Turn::new("hi", "hello", 5), 4096)
        .await
        .unwrap();
    assert_eq!(service.stats().cache_size, 1);

    tokio::time::sleep(std::time::Duration::from_millis(2500)).await;
    assert_eq!(service.stats().cache_size, 0);

    service.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_stops_sweeper() {
    let service = ContextCacheService::local(small_config()).unwrap();
    service.shutdown().await;
    // Store operations still work after shutdown
    let outcome = service
        .commit(Vec::new(), Turn::new("hi", "hello", 5), 4096)
        .await
        .unwrap();
    assert!(!outcome.handle.is_empty());
}
