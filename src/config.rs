use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use std::{env, fmt, str::FromStr};

/// Which object store the gateway writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BackendKind {
    S3,
    Memory,
}

impl FromStr for BackendKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "s3" => Ok(Self::S3),
            "memory" => Ok(Self::Memory),
            other => bail!("unknown backend `{other}` (expected `s3` or `memory`)"),
        }
    }
}

/// Connection settings for the object store. Fixed for the process lifetime.
#[derive(Clone)]
pub struct StorageConfig {
    pub endpoint: String,
    pub region: String,
    pub access_key: String,
    pub secret_key: String,
    /// Public prefix of every returned object reference.
    pub base_url: String,
}

impl fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageConfig")
            .field("endpoint", &self.endpoint)
            .field("region", &self.region)
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub backend: BackendKind,
    pub max_upload_bytes: usize,
    pub fetch_timeout_secs: u64,
    pub storage: StorageConfig,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "File upload/download gateway for S3-compatible storage")]
pub struct Args {
    /// Host to bind to (overrides FILE_GATEWAY_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides FILE_GATEWAY_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Object store backend (overrides FILE_GATEWAY_BACKEND)
    #[arg(long, value_enum)]
    pub backend: Option<BackendKind>,

    /// Largest accepted request body in bytes (overrides FILE_GATEWAY_MAX_UPLOAD_BYTES)
    #[arg(long)]
    pub max_upload_bytes: Option<usize>,

    /// Timeout for fetching remote URLs, in seconds (overrides FILE_GATEWAY_FETCH_TIMEOUT_SECS)
    #[arg(long)]
    pub fetch_timeout_secs: Option<u64>,

    /// S3 endpoint URL (overrides FILE_GATEWAY_S3_ENDPOINT)
    #[arg(long)]
    pub s3_endpoint: Option<String>,

    /// S3 region (overrides FILE_GATEWAY_S3_REGION)
    #[arg(long)]
    pub s3_region: Option<String>,

    /// S3 access key (overrides FILE_GATEWAY_S3_ACCESS_KEY)
    #[arg(long)]
    pub s3_access_key: Option<String>,

    /// Public base URL for returned references (overrides FILE_GATEWAY_BASE_URL)
    #[arg(long)]
    pub base_url: Option<String>,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig.
    pub fn from_env_and_args() -> Result<Self> {
        let args = Args::parse();
        Self::resolve(args, |name| env::var(name).ok())
    }

    /// Merge CLI arguments over values looked up by `env`.
    ///
    /// The secret key is only ever read from the environment.
    pub fn resolve(args: Args, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        fn parsed<T>(env: &impl Fn(&str) -> Option<String>, name: &str) -> Result<Option<T>>
        where
            T: FromStr,
            T::Err: fmt::Display,
        {
            env(name)
                .map(|value| {
                    value
                        .parse::<T>()
                        .map_err(|err| anyhow::anyhow!("{err}"))
                        .with_context(|| format!("parsing {name} value `{value}`"))
                })
                .transpose()
        }

        let port = match args.port {
            Some(port) => port,
            None => parsed(&env, "FILE_GATEWAY_PORT")?.unwrap_or(3000),
        };
        let backend = match args.backend {
            Some(backend) => backend,
            None => parsed(&env, "FILE_GATEWAY_BACKEND")?.unwrap_or(BackendKind::S3),
        };
        let max_upload_bytes = match args.max_upload_bytes {
            Some(limit) => limit,
            None => parsed(&env, "FILE_GATEWAY_MAX_UPLOAD_BYTES")?.unwrap_or(512 * 1024 * 1024),
        };
        let fetch_timeout_secs = match args.fetch_timeout_secs {
            Some(secs) => secs,
            None => parsed(&env, "FILE_GATEWAY_FETCH_TIMEOUT_SECS")?.unwrap_or(60),
        };

        let endpoint = args
            .s3_endpoint
            .or_else(|| env("FILE_GATEWAY_S3_ENDPOINT"))
            .unwrap_or_default();
        let access_key = args
            .s3_access_key
            .or_else(|| env("FILE_GATEWAY_S3_ACCESS_KEY"))
            .unwrap_or_default();
        let secret_key = env("FILE_GATEWAY_S3_SECRET_KEY").unwrap_or_default();

        if backend == BackendKind::S3 {
            for (name, value) in [
                ("FILE_GATEWAY_S3_ENDPOINT", &endpoint),
                ("FILE_GATEWAY_S3_ACCESS_KEY", &access_key),
                ("FILE_GATEWAY_S3_SECRET_KEY", &secret_key),
            ] {
                if value.is_empty() {
                    bail!("{name} is required for the s3 backend");
                }
            }
        }

        let base_url = args
            .base_url
            .or_else(|| env("FILE_GATEWAY_BASE_URL"))
            .unwrap_or_else(|| {
                if endpoint.is_empty() {
                    format!("http://localhost:{port}")
                } else {
                    endpoint.clone()
                }
            });

        Ok(Self {
            host: args
                .host
                .or_else(|| env("FILE_GATEWAY_HOST"))
                .unwrap_or_else(|| "0.0.0.0".into()),
            port,
            backend,
            max_upload_bytes,
            fetch_timeout_secs,
            storage: StorageConfig {
                endpoint,
                region: args
                    .s3_region
                    .or_else(|| env("FILE_GATEWAY_S3_REGION"))
                    .unwrap_or_else(|| "us-east-1".into()),
                access_key,
                secret_key,
                base_url,
            },
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
