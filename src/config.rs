use clap::Parser;
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "tambayan", about = "A small social network server")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Host to bind to
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Path to data directory
    #[arg(long)]
    pub data_dir: Option<PathBuf>,
}

/// Longest session lifetime accepted from config (one year).
pub const MAX_SESSION_HOURS: u64 = 24 * 365;

/// Work factors bcrypt accepts.
const BCRYPT_COSTS: std::ops::RangeInclusive<u32> = 4..=31;

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub feed: FeedConfig,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub request_timeout_secs: u64,
    /// Origins allowed to call the API cross-site. Empty disables CORS.
    pub cors_origins: Vec<String>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: Option<PathBuf>,
    pub pool_size: u32,
    pub connection_timeout_secs: u64,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct AuthConfig {
    pub session_hours: u64,
    pub bcrypt_cost: u32,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct FeedConfig {
    pub default_limit: i64,
    pub max_limit: i64,
    pub comments_default_limit: i64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            request_timeout_secs: 30,
            cors_origins: Vec::new(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: None,
            pool_size: 8,
            connection_timeout_secs: 5,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_hours: 24,
            bcrypt_cost: bcrypt::DEFAULT_COST,
        }
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            default_limit: 20,
            max_limit: 100,
            comments_default_limit: 50,
        }
    }
}

impl Config {
    pub fn load(cli: &Cli) -> anyhow::Result<Self> {
        let data_dir = Self::data_dir(cli);
        let config_path = cli
            .config
            .clone()
            .unwrap_or_else(|| data_dir.join("config.toml"));

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content)?
        } else {
            Config::default()
        };

        // CLI overrides
        if let Some(ref host) = cli.host {
            config.server.host = host.clone();
        }
        if let Some(port) = cli.port {
            config.server.port = port;
        }

        if config.database.path.is_none() {
            config.database.path = Some(data_dir.join("tambayan.db"));
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if !(1..=MAX_SESSION_HOURS).contains(&self.auth.session_hours) {
            anyhow::bail!(
                "auth.session_hours must be between 1 and {}, got {}",
                MAX_SESSION_HOURS,
                self.auth.session_hours
            );
        }
        if !BCRYPT_COSTS.contains(&self.auth.bcrypt_cost) {
            anyhow::bail!(
                "auth.bcrypt_cost must be between {} and {}, got {}",
                BCRYPT_COSTS.start(),
                BCRYPT_COSTS.end(),
                self.auth.bcrypt_cost
            );
        }
        Ok(())
    }

    pub fn data_dir(cli: &Cli) -> PathBuf {
        cli.data_dir.clone().unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".tambayan")
        })
    }

    /// Database file location. Falls back to a relative file when the config
    /// was built by hand instead of through [`Config::load`].
    pub fn db_path(&self) -> PathBuf {
        self.database
            .path
            .clone()
            .unwrap_or_else(|| PathBuf::from("tambayan.db"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli_for(dir: &std::path::Path) -> Cli {
        Cli {
            config: None,
            host: None,
            port: None,
            data_dir: Some(dir.to_path_buf()),
        }
    }

    #[test]
    fn default_config_has_expected_values() {
        let config = Config::default();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.server.request_timeout_secs, 30);
        assert!(config.server.cors_origins.is_empty());
        assert_eq!(config.database.pool_size, 8);
        assert_eq!(config.auth.session_hours, 24);
        assert_eq!(config.auth.bcrypt_cost, bcrypt::DEFAULT_COST);
        assert_eq!(config.feed.default_limit, 20);
        assert_eq!(config.feed.max_limit, 100);
        assert!(config.database.path.is_none());
    }

    #[test]
    fn data_dir_uses_cli_override() {
        let cli = cli_for(std::path::Path::new("/tmp/test-tambayan"));
        assert_eq!(Config::data_dir(&cli), PathBuf::from("/tmp/test-tambayan"));
    }

    #[test]
    fn data_dir_defaults_to_dot_tambayan() {
        let cli = Cli {
            config: None,
            host: None,
            port: None,
            data_dir: None,
        };
        assert!(Config::data_dir(&cli).ends_with(".tambayan"));
    }

    #[test]
    fn load_with_no_config_file_uses_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let config = Config::load(&cli_for(tmp.path())).unwrap();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.db_path(), tmp.path().join("tambayan.db"));
    }

    #[test]
    fn load_reads_toml_file() {
        let tmp = tempfile::tempdir().unwrap();
        let config_path = tmp.path().join("config.toml");
        std::fs::write(
            &config_path,
            r#"
[server]
port = 9000
cors_origins = ["http://localhost:5173"]

[auth]
session_hours = 2

[feed]
max_limit = 50
"#,
        )
        .unwrap();

        let mut cli = cli_for(tmp.path());
        cli.config = Some(config_path);
        let config = Config::load(&cli).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.cors_origins, vec!["http://localhost:5173"]);
        assert_eq!(config.auth.session_hours, 2);
        assert_eq!(config.feed.max_limit, 50);
        assert_eq!(config.feed.default_limit, 20);
    }

    #[test]
    fn cli_overrides_beat_toml_values() {
        let tmp = tempfile::tempdir().unwrap();
        let config_path = tmp.path().join("config.toml");
        std::fs::write(
            &config_path,
            r#"
[server]
host = "192.168.1.1"
port = 9000
"#,
        )
        .unwrap();

        let cli = Cli {
            config: Some(config_path),
            host: Some("10.0.0.1".to_string()),
            port: Some(4000),
            data_dir: Some(tmp.path().to_path_buf()),
        };
        let config = Config::load(&cli).unwrap();
        assert_eq!(config.server.host, "10.0.0.1");
        assert_eq!(config.server.port, 4000);
    }

    fn write_config(dir: &std::path::Path, body: &str) -> Cli {
        let config_path = dir.join("config.toml");
        std::fs::write(&config_path, body).unwrap();
        let mut cli = cli_for(dir);
        cli.config = Some(config_path);
        cli
    }

    #[test]
    fn load_rejects_out_of_range_session_hours() {
        let tmp = tempfile::tempdir().unwrap();
        let cli = write_config(tmp.path(), "[auth]\nsession_hours = 0\n");
        assert!(Config::load(&cli).is_err());

        let cli = write_config(tmp.path(), "[auth]\nsession_hours = 9223372036854775807\n");
        let err = Config::load(&cli).unwrap_err();
        assert!(err.to_string().contains("session_hours"));

        let cli = write_config(tmp.path(), "[auth]\nsession_hours = 8760\n");
        assert_eq!(Config::load(&cli).unwrap().auth.session_hours, MAX_SESSION_HOURS);
    }

    #[test]
    fn load_rejects_unusable_bcrypt_cost() {
        let tmp = tempfile::tempdir().unwrap();
        let cli = write_config(tmp.path(), "[auth]\nbcrypt_cost = 2\n");
        assert!(Config::load(&cli).is_err());
    }
}
