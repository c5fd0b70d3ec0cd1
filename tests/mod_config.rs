use clientpool::{ClientConfig, ConfigCatalog, ConfigResolver, PoolConfig, PoolError};
use parking_lot::{Mutex, MutexGuard, const_mutex};
use std::io::Write;
use std::time::Duration;

static ENV_LOCK: Mutex<()> = const_mutex(());

/// Sets process env vars for one test and removes them on drop; tests touching env run one at a time.
struct ScopedEnv {
    _lock: MutexGuard<'static, ()>,
    names: Vec<&'static str>,
}

impl ScopedEnv {
    fn set(vars: &[(&'static str, &str)]) -> Self {
        let lock = ENV_LOCK.lock();
        for (name, value) in vars {
            // SAFETY: ENV_LOCK serialises every test in this binary that reads or writes env.
            unsafe { std::env::set_var(name, value) };
        }
        Self { _lock: lock, names: vars.iter().map(|(n, _)| *n).collect() }
    }
}

impl Drop for ScopedEnv {
    fn drop(&mut self) {
        for name in &self.names {
            // SAFETY: still holding ENV_LOCK.
            unsafe { std::env::remove_var(name) };
        }
    }
}

#[test]
fn pool_config_from_toml_fills_defaults() {
    let cfg = PoolConfig::from_toml_str("capacity = 5\nttl_secs = 120\n").unwrap();
    assert_eq!(cfg.capacity, 5);
    assert_eq!(cfg.ttl(), Duration::from_secs(120));
    assert_eq!(cfg.wait_timeout(), Duration::from_secs(10));
    assert_eq!(cfg.default_timeout(), Duration::from_secs(60));
    assert_eq!(cfg.default_max_retries, 3);
}

#[test]
fn pool_config_clamps_zero_capacity() {
    let cfg = PoolConfig::from_toml_str("capacity = 0\nttl_ms = 0\n").unwrap();
    assert_eq!(cfg.capacity, 1);
    assert_eq!(cfg.ttl(), Duration::from_millis(1));
}

#[test]
fn pool_config_bad_toml_is_an_error() {
    assert!(matches!(PoolConfig::from_toml_str("capacity = \"many\""), Err(PoolError::Toml(_))));
}

#[test]
fn pool_config_from_missing_path_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = PoolConfig::from_path(&dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, PoolError::Io(_)));
}

#[tokio::test]
async fn catalog_loads_from_file_with_legacy_field_names() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
[models.deepseek-chat]
endpoint = "https://api.deepseek.com/v1"
credential = "sk-deepseek-0000"
display_name = "DeepSeek Chat"

[models.qwen-max]
base_url = "https://dashscope.example.com/compatible-mode/v1"
api_key = "sk-qwen-1111"
name = "Qwen Max"
timeout = 30
max_retries = 5
"#
    )
    .unwrap();

    let catalog = ConfigCatalog::from_path(file.path()).unwrap();
    assert_eq!(catalog.keys(), vec!["deepseek-chat", "qwen-max"]);

    let qwen = catalog.resolve("qwen-max").await.unwrap();
    assert_eq!(qwen.endpoint, "https://dashscope.example.com/compatible-mode/v1");
    assert_eq!(qwen.credential, "sk-qwen-1111");
    assert_eq!(qwen.display_name.as_deref(), Some("Qwen Max"));
    assert_eq!(qwen.timeout_secs, Some(30.0));
    assert_eq!(qwen.max_retries, Some(5));

    assert!(catalog.resolve("gpt-unknown").await.is_err());
}

#[test]
fn debug_output_masks_credential() {
    let cfg = ClientConfig::new("https://api.example.com", "sk-abcdef123456");
    let dbg = format!("{cfg:?}");
    assert!(dbg.contains("sk-abc..."));
    assert!(!dbg.contains("123456"));
    assert_eq!(ClientConfig::new("x", "short").masked_credential(), "***");
}

#[test]
fn sample_config_parses() {
    #[derive(serde::Deserialize)]
    struct Sample {
        pool: PoolConfig,
    }

    let catalog = ConfigCatalog::from_toml_str(include_str!("../clientpool.sample.toml")).unwrap();
    assert_eq!(catalog.keys(), vec!["deepseek-chat", "qwen-max"]);
    assert_eq!(catalog.models["qwen-max"].timeout_secs, Some(30.5));
    let sample: Sample = toml::from_str(include_str!("../clientpool.sample.toml")).unwrap();
    assert_eq!(sample.pool, PoolConfig::default());
}

#[test]
fn env_overrides_apply_and_normalize() {
    let _env = ScopedEnv::set(&[
        ("CLIENTPOOL_CAPACITY", "0"),
        ("CLIENTPOOL_TTL_SECS", "3"),
        ("CLIENTPOOL_WAIT_TIMEOUT_MS", " 50 "),
    ]);
    let cfg = PoolConfig::default().apply_env();
    assert_eq!(cfg.capacity, 1);
    assert_eq!(cfg.ttl(), Duration::from_secs(3));
    assert_eq!(cfg.wait_timeout(), Duration::from_millis(50));
}

#[test]
fn env_ttl_ms_wins_over_seconds() {
    let _env = ScopedEnv::set(&[("CLIENTPOOL_TTL_SECS", "3"), ("CLIENTPOOL_TTL_MS", "2900")]);
    assert_eq!(PoolConfig::default().apply_env().ttl(), Duration::from_millis(2900));
}

#[test]
fn unparseable_env_values_are_ignored() {
    let _env = ScopedEnv::set(&[("CLIENTPOOL_CAPACITY", "lots"), ("CLIENTPOOL_TTL_MS", "-5")]);
    let base = PoolConfig::new(4, Duration::from_secs(30));
    assert_eq!(base.clone().apply_env(), base);
}
