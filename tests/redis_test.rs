//! Redis lease backend against a live server.
//!
//! Run with `cargo test -- --ignored` and `REDIS_URL` set (or in `.env`).

use std::time::Duration;

use jobguard::config::Config;
use jobguard::guard::Guard;
use jobguard::lock::{LockBackend, RedisBackend, StoreKind};
use jobguard::model::{Job, JobCall, SingleInstance};
use uuid::Uuid;

fn redis_url() -> String {
    dotenvy::dotenv().ok();
    std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379/0".to_string())
}

fn unique_key() -> String {
    format!("jobguard-test.single_instance.{}", Uuid::new_v4())
}

#[tokio::test]
#[ignore] // Requires running Redis
async fn acquire_is_exclusive_until_release() {
    let redis = RedisBackend::connect(&redis_url()).await.unwrap();
    let key = unique_key();

    assert!(redis.try_acquire(&key, "a", Duration::from_secs(30)).await.unwrap());
    assert!(!redis.try_acquire(&key, "b", Duration::from_secs(30)).await.unwrap());
    assert_eq!(redis.holder(&key).await.unwrap().as_deref(), Some("a"));

    let ttl = redis.ttl(&key).await.unwrap().unwrap();
    assert!(ttl > 0 && ttl <= 30);

    redis.release(&key).await.unwrap();
    assert_eq!(redis.holder(&key).await.unwrap(), None);
    assert!(redis.try_acquire(&key, "b", Duration::from_secs(30)).await.unwrap());
    redis.release(&key).await.unwrap();
}

#[tokio::test]
#[ignore] // Requires running Redis
async fn lease_expires_on_its_own() {
    let redis = RedisBackend::connect(&redis_url()).await.unwrap();
    let key = unique_key();

    assert!(redis.try_acquire(&key, "a", Duration::from_secs(1)).await.unwrap());
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert!(redis.try_acquire(&key, "b", Duration::from_secs(1)).await.unwrap());
    redis.release(&key).await.unwrap();
}

#[tokio::test]
#[ignore] // Requires running Redis
async fn releasing_a_missing_key_is_ok() {
    let redis = RedisBackend::connect(&redis_url()).await.unwrap();
    redis.release(&unique_key()).await.unwrap();
}

#[tokio::test]
#[ignore] // Requires running Redis
async fn guard_runs_against_redis() {
    let mut config = Config::for_store(redis_url());
    config.namespace = format!("jobguard-test-{}", Uuid::new_v4());
    let guard = Guard::connect(&config).await.unwrap();
    assert_eq!(guard.backend().kind(), StoreKind::Redis);

    let job = Job::new("send_report");
    let opts = SingleInstance::new().lock_timeout(10);
    let key = format!("{}.single_instance.send_report", config.namespace);

    let blocked = guard
        .run(&job, &JobCall::new(), &opts, || async {
            guard.run(&job, &JobCall::new(), &opts, || async {}).await
        })
        .await
        .unwrap();
    assert!(blocked.unwrap_err().is_already_locked());
    assert_eq!(guard.backend().holder(&key).await.unwrap(), None);
}
