use clap::{Parser, Subcommand};
use clientpool::utils::logger;
use clientpool::{
    ApiClientFactory, ClientConfig, ClientPool, ConfigCatalog, ConfigSource, PoolConfig, PoolError,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct AppConfig {
    log_dir: Option<PathBuf>,
    log_level: Option<String>,
    #[serde(default)]
    pool: Option<PoolConfig>,
    #[serde(default)]
    models: HashMap<String, ClientConfig>,
}

fn config_paths(cli_cfg: &Option<PathBuf>) -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = vec![];
    if let Some(p) = cli_cfg {
        paths.push(p.clone());
    }
    if let Ok(p) = std::env::var("CLIENTPOOL_CONFIG") {
        paths.push(PathBuf::from(p));
    }
    if let Ok(home) = std::env::var("USERPROFILE").or_else(|_| std::env::var("HOME")) {
        paths.push(PathBuf::from(home).join(".config").join("clientpool.toml"));
    }
    if let Ok(cur) = std::env::current_dir() {
        paths.push(cur.join("clientpool.toml"));
    }
    paths
}

fn load_config(cli_cfg: &Option<PathBuf>) -> Result<AppConfig, PoolError> {
    // Precedence: CLI > env > config files > defaults. The first existing file wins.
    let mut cfg = AppConfig::default();
    for p in config_paths(cli_cfg) {
        if p.exists() {
            let s = std::fs::read_to_string(&p)
                .map_err(|e| PoolError::Io(format!("failed to read {}: {e}", p.display())))?;
            cfg = toml::from_str::<AppConfig>(&s)?;
            break;
        }
    }
    if cfg.log_dir.is_none() {
        cfg.log_dir = std::env::var("CLIENTPOOL_LOG_DIR").ok().map(PathBuf::from);
    }
    if cfg.log_level.is_none() {
        cfg.log_level = std::env::var("CLIENTPOOL_LOG_LEVEL").ok();
    }
    cfg.pool = Some(cfg.pool.unwrap_or_default().apply_env());
    Ok(cfg)
}

#[derive(Parser, Debug)]
#[command(name = "clientpool", version, about = "Inspect and exercise a keyed API client pool", long_about = None)]
struct Cli {
    #[arg(long, help = "Path to a config file (TOML) with [pool] and [models.<key>] tables")]
    config: Option<PathBuf>,
    #[arg(long, help = "Override pool capacity")]
    capacity: Option<usize>,
    #[arg(long, help = "Print final statistics as JSON instead of a report")]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(about = "Acquire clients for the given keys, optionally many times concurrently")]
    Acquire {
        #[arg(required = true, help = "Model keys as listed in the config")]
        keys: Vec<String>,
        #[arg(long, default_value_t = 1, help = "Concurrent requests per key")]
        repeat: usize,
    },
    #[command(about = "Acquire a client, then force a rebuild of it")]
    Refresh {
        #[arg(help = "Model key")]
        key: String,
    },
    #[command(about = "Build every configured model once and report which ones fail")]
    Check,
}

async fn run(cli: Cli, pool: Arc<ClientPool<ApiClientFactory>>, keys: Vec<String>) -> bool {
    let mut ok = true;
    match cli.command {
        Commands::Acquire { keys, repeat } => {
            let mut handles = Vec::new();
            for key in keys {
                for _ in 0..repeat.max(1) {
                    let pool = Arc::clone(&pool);
                    let key = key.clone();
                    handles.push(tokio::spawn(async move {
                        let res = pool.acquire(&key, ConfigSource::Default).await;
                        (key, res)
                    }));
                }
            }
            for h in handles {
                match h.await {
                    Ok((key, Ok(client))) => println!("{key}: ok -> {}", client.endpoint()),
                    Ok((key, Err(e))) => {
                        eprintln!("{key}: {e}");
                        ok = false;
                    }
                    Err(e) => {
                        eprintln!("task failed: {e}");
                        ok = false;
                    }
                }
            }
        }
        Commands::Refresh { key } => {
            let first = pool.acquire(&key, ConfigSource::Default).await;
            let second = pool.refresh(&key, ConfigSource::Default).await;
            match (first, second) {
                (Ok(a), Ok(b)) => println!("{key}: rebuilt (same handle: {})", Arc::ptr_eq(&a, &b)),
                (Err(e), _) | (_, Err(e)) => {
                    eprintln!("{key}: {e}");
                    ok = false;
                }
            }
        }
        Commands::Check => {
            for key in keys {
                match pool.acquire(&key, ConfigSource::Default).await {
                    Ok(client) => println!("{key}: ok ({})", client.display_name()),
                    Err(e) => {
                        eprintln!("{key}: {e}");
                        ok = false;
                    }
                }
            }
        }
    }
    ok
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let cfg = match load_config(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(2);
        }
    };
    if let Err(e) = logger::configure_logging(cfg.log_dir.as_deref(), cfg.log_level.as_deref(), None, false) {
        eprintln!("warning: logging not configured: {e}");
    }

    let mut pool_cfg = cfg.pool.clone().unwrap_or_default();
    if let Some(cap) = cli.capacity {
        pool_cfg = pool_cfg.with_capacity(cap);
    }
    let catalog = ConfigCatalog { models: cfg.models };
    let keys: Vec<String> = catalog.keys().into_iter().map(str::to_string).collect();
    let pool = Arc::new(
        ClientPool::with_config(ApiClientFactory::new().with_user_agent("clientpool-cli"), pool_cfg)
            .with_default_resolver(catalog),
    );

    let json = cli.json;
    let ok = run(cli, Arc::clone(&pool), keys).await;

    let stats = pool.stats();
    if json {
        match serde_json::to_string_pretty(&stats) {
            Ok(s) => println!("{s}"),
            Err(e) => eprintln!("error: {e}"),
        }
    } else {
        println!("\n{stats}");
    }
    pool.log_stats();
    if !ok {
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::{Mutex, const_mutex};
    use std::time::Duration;

    static ENV_LOCK: Mutex<()> = const_mutex(());

    fn with_config_env<T>(value: Option<&std::path::Path>, f: impl FnOnce() -> T) -> T {
        let _lock = ENV_LOCK.lock();
        // SAFETY: ENV_LOCK serialises the tests in this binary that touch the environment.
        unsafe {
            for name in ["CLIENTPOOL_CAPACITY", "CLIENTPOOL_TTL_SECS", "CLIENTPOOL_TTL_MS", "CLIENTPOOL_LOG_DIR"] {
                std::env::remove_var(name);
            }
            match value {
                Some(p) => std::env::set_var("CLIENTPOOL_CONFIG", p),
                None => std::env::remove_var("CLIENTPOOL_CONFIG"),
            }
        }
        let out = f();
        // SAFETY: lock still held.
        unsafe { std::env::remove_var("CLIENTPOOL_CONFIG") };
        out
    }

    fn write(dir: &std::path::Path, name: &str, capacity: usize) -> PathBuf {
        let path = dir.join(name);
        let body = format!(
            "log_level = \"debug\"\n[pool]\ncapacity = {capacity}\nttl_ms = 1500\n\n[models.m]\nendpoint = \"https://a\"\ncredential = \"sk-1\"\n"
        );
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn cli_path_comes_before_env_path() {
        let dir = tempfile::tempdir().unwrap();
        let cli = write(dir.path(), "cli.toml", 3);
        let env = write(dir.path(), "env.toml", 9);

        let paths = with_config_env(Some(env.as_path()), || config_paths(&Some(cli.clone())));
        assert_eq!(paths[0], cli);
        assert_eq!(paths[1], env);

        let cfg = with_config_env(Some(env.as_path()), || load_config(&Some(cli.clone()))).unwrap();
        let pool = cfg.pool.unwrap();
        assert_eq!(pool.capacity, 3);
        assert_eq!(pool.ttl(), Duration::from_millis(1500));
        assert_eq!(cfg.log_level.as_deref(), Some("debug"));
        assert!(cfg.models.contains_key("m"));
    }

    #[test]
    fn env_path_used_when_no_cli_path() {
        let dir = tempfile::tempdir().unwrap();
        let env = write(dir.path(), "env.toml", 9);
        let cfg = with_config_env(Some(env.as_path()), || load_config(&None)).unwrap();
        assert_eq!(cfg.pool.unwrap().capacity, 9);
    }

    #[test]
    fn missing_cli_path_falls_through_and_bad_toml_errors() {
        let dir = tempfile::tempdir().unwrap();
        let env = write(dir.path(), "env.toml", 5);
        let absent = dir.path().join("absent.toml");
        let cfg = with_config_env(Some(env.as_path()), || load_config(&Some(absent.clone()))).unwrap();
        assert_eq!(cfg.pool.unwrap().capacity, 5);

        let bad = dir.path().join("bad.toml");
        std::fs::write(&bad, "[pool]\ncapacity = \"many\"\n").unwrap();
        let err = with_config_env(None, || load_config(&Some(bad.clone()))).unwrap_err();
        assert!(matches!(err, PoolError::Toml(_)));
    }

    #[test]
    fn parses_acquire_arguments() {
        let cli = Cli::try_parse_from([
            "clientpool", "--capacity", "3", "--json", "acquire", "a", "b", "--repeat", "4",
        ])
        .unwrap();
        assert_eq!(cli.capacity, Some(3));
        assert!(cli.json);
        match cli.command {
            Commands::Acquire { keys, repeat } => {
                assert_eq!(keys, vec!["a", "b"]);
                assert_eq!(repeat, 4);
            }
            other => panic!("unexpected command: {other:?}"),
        }
        assert!(Cli::try_parse_from(["clientpool", "acquire"]).is_err());
    }
}
