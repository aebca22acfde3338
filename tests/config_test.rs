use jobguard::config::{Config, DEFAULT_NAMESPACE};
use jobguard::error::Error;
use jobguard::lock::StoreKind;
use jobguard::model::TimeLimits;

const VARS: [&str; 4] = [
    "STORE_URL",
    "LOCK_NAMESPACE",
    "TASK_SOFT_TIME_LIMIT",
    "TASK_TIME_LIMIT",
];

fn clear_env() {
    unsafe {
        for var in VARS {
            std::env::remove_var(var);
        }
    }
}

// Env vars are process-global, so every case lives in one test.
#[test]
fn config_from_env() {
    clear_env();
    assert!(matches!(Config::from_env(), Err(Error::Config(_))));

    unsafe {
        std::env::set_var("STORE_URL", "redis://localhost:6379/0");
    }
    let config = Config::from_env().unwrap();
    assert_eq!(config.namespace, DEFAULT_NAMESPACE);
    assert_eq!(config.global_limits, TimeLimits::default());
    assert_eq!(config.store_kind().unwrap(), StoreKind::Redis);
    assert!(!config.log_level.is_empty());

    unsafe {
        std::env::set_var("LOCK_NAMESPACE", "billing");
        std::env::set_var("TASK_SOFT_TIME_LIMIT", "");
        std::env::set_var("TASK_TIME_LIMIT", "600");
    }
    let config = Config::from_env().unwrap();
    assert_eq!(config.namespace, "billing");
    assert_eq!(config.global_limits, TimeLimits::new(None, Some(600)));

    unsafe {
        std::env::set_var("TASK_TIME_LIMIT", "ten minutes");
    }
    assert!(matches!(Config::from_env(), Err(Error::Config(_))));

    unsafe {
        std::env::set_var("TASK_TIME_LIMIT", "600");
        std::env::set_var("STORE_URL", "amqp://guest@localhost//");
    }
    let config = Config::from_env().unwrap();
    assert!(matches!(
        config.store_kind(),
        Err(Error::UnsupportedBackend { .. })
    ));

    clear_env();
}
