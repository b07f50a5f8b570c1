use clap::{Parser, Subcommand};
use rand::RngCore;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "scribe", about = "A blogging backend with token authentication")]
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

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Create a staff account with superuser rights and no profile
    CreateSuperuser {
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
    },
    /// Disable an account without deleting it
    Deactivate {
        #[arg(long)]
        username: String,
    },
    /// Drop blacklist entries whose tokens have expired anyway
    PurgeBlacklist,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct AuthConfig {
    /// HMAC signing secret. Generated and stored in the data dir when unset.
    pub secret: Option<String>,
    pub access_token_minutes: i64,
    pub refresh_token_days: i64,
    pub bcrypt_cost: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            secret: None,
            access_token_minutes: 5,
            refresh_token_days: 1,
            bcrypt_cost: bcrypt::DEFAULT_COST,
        }
    }
}

const SECRET_FILE: &str = "secret.key";
const BCRYPT_COSTS: std::ops::RangeInclusive<u32> = 4..=31;

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
            config.database.path = Some(data_dir.join("scribe.db"));
        }
        if config.auth.secret.is_none() {
            config.auth.secret = Some(load_or_create_secret(&data_dir)?);
        }

        if config.auth.access_token_minutes <= 0 || config.auth.refresh_token_days <= 0 {
            anyhow::bail!("token lifetimes must be positive");
        }
        if !BCRYPT_COSTS.contains(&config.auth.bcrypt_cost) {
            anyhow::bail!("bcrypt_cost must be between 4 and 31");
        }

        Ok(config)
    }

    pub fn data_dir(cli: &Cli) -> PathBuf {
        cli.data_dir.clone().unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".scribe")
        })
    }

    /// Only meaningful after `load`, which always fills the path in.
    pub fn db_path(&self) -> PathBuf {
        self.database
            .path
            .clone()
            .unwrap_or_else(|| PathBuf::from("scribe.db"))
    }

    pub fn secret(&self) -> &[u8] {
        self.auth.secret.as_deref().unwrap_or_default().as_bytes()
    }
}

fn load_or_create_secret(data_dir: &Path) -> anyhow::Result<String> {
    let path = data_dir.join(SECRET_FILE);
    if path.exists() {
        let secret = std::fs::read_to_string(&path)?.trim().to_string();
        if !secret.is_empty() {
            return Ok(secret);
        }
    }

    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    let secret = hex::encode(bytes);

    std::fs::create_dir_all(data_dir)?;
    std::fs::write(&path, &secret)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600))?;
    }
    tracing::info!("Generated signing secret at {}", path.display());
    Ok(secret)
}
