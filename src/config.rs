use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use std::{env, path::PathBuf, str::FromStr, time::Duration};

const ENV_PREFIX: &str = "MEDIA_INGEST_";

/// Which object store receives uploaded assets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum StorageBackend {
    /// Files under `storage_dir`, served back from `/assets`.
    Local,
    /// A remote S3-style service at `storage_endpoint`.
    Http,
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        <Self as ValueEnum>::from_str(s, true)
    }
}

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub jwt_secret: String,
    pub jwt_issuer: String,
    pub storage_backend: StorageBackend,
    pub storage_dir: String,
    pub storage_endpoint: Option<String>,
    pub bucket: String,
    /// Base of asset locations written into records. Unset for the http
    /// backend means locations are built from the storage endpoint.
    pub public_base_url: Option<String>,
    pub temp_dir: PathBuf,
    pub max_thumbnail_bytes: u64,
    pub max_video_bytes: u64,
    pub ffprobe_path: String,
    pub probe_timeout: Duration,
}

// Hand-written so the JWT secret never reaches the logs.
impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database_url", &self.database_url)
            .field("jwt_secret", &"<redacted>")
            .field("jwt_issuer", &self.jwt_issuer)
            .field("storage_backend", &self.storage_backend)
            .field("storage_dir", &self.storage_dir)
            .field("storage_endpoint", &self.storage_endpoint)
            .field("bucket", &self.bucket)
            .field("public_base_url", &self.public_base_url)
            .field("temp_dir", &self.temp_dir)
            .field("max_thumbnail_bytes", &self.max_thumbnail_bytes)
            .field("max_video_bytes", &self.max_video_bytes)
            .field("ffprobe_path", &self.ffprobe_path)
            .field("probe_timeout", &self.probe_timeout)
            .finish()
    }
}

/// Command-line + environment configuration.
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "Media ingestion service for video thumbnails and files")]
pub struct Args {
    /// Host to bind to (overrides MEDIA_INGEST_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides MEDIA_INGEST_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Database URL (overrides MEDIA_INGEST_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Expected `iss` claim of access tokens (overrides MEDIA_INGEST_JWT_ISSUER)
    #[arg(long)]
    pub jwt_issuer: Option<String>,

    /// Object store backend (overrides MEDIA_INGEST_STORAGE_BACKEND)
    #[arg(long, value_enum)]
    pub storage_backend: Option<StorageBackend>,

    /// Directory for the local backend (overrides MEDIA_INGEST_STORAGE_DIR)
    #[arg(long)]
    pub storage_dir: Option<String>,

    /// Base URL of the remote backend (overrides MEDIA_INGEST_STORAGE_ENDPOINT)
    #[arg(long)]
    pub storage_endpoint: Option<String>,

    /// Bucket assets are written to (overrides MEDIA_INGEST_BUCKET)
    #[arg(long)]
    pub bucket: Option<String>,

    /// Prefix of stored asset URLs (overrides MEDIA_INGEST_PUBLIC_BASE_URL)
    #[arg(long)]
    pub public_base_url: Option<String>,

    /// Scratch directory for buffered uploads (overrides MEDIA_INGEST_TEMP_DIR)
    #[arg(long)]
    pub temp_dir: Option<PathBuf>,

    /// Thumbnail size cap in bytes (overrides MEDIA_INGEST_MAX_THUMBNAIL_BYTES)
    #[arg(long)]
    pub max_thumbnail_bytes: Option<u64>,

    /// Video size cap in bytes (overrides MEDIA_INGEST_MAX_VIDEO_BYTES)
    #[arg(long)]
    pub max_video_bytes: Option<u64>,

    /// ffprobe executable (overrides MEDIA_INGEST_FFPROBE_PATH)
    #[arg(long)]
    pub ffprobe_path: Option<String>,

    /// Probe timeout in seconds (overrides MEDIA_INGEST_PROBE_TIMEOUT_SECS)
    #[arg(long)]
    pub probe_timeout_secs: Option<u64>,

    /// Run migrations and exit
    #[arg(long)]
    pub migrate: bool,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and migrate flag.
    pub fn from_env_and_args() -> Result<(Self, bool)> {
        let args = Args::parse();
        let migrate = args.migrate;
        Ok((Self::merge(args, |name| env::var(name))?, migrate))
    }

    /// CLI values win over environment values, which win over defaults.
    fn merge<F>(args: Args, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Result<String, env::VarError>,
    {
        let port = match args.port {
            Some(port) => port,
            None => env_parse(&lookup, "PORT")?.unwrap_or(8091),
        };

        let jwt_secret = env_string(&lookup, "JWT_SECRET")?
            .filter(|s| !s.is_empty())
            .context("MEDIA_INGEST_JWT_SECRET must be set")?;

        let storage_backend = match args.storage_backend {
            Some(backend) => backend,
            None => env_parse(&lookup, "STORAGE_BACKEND")?.unwrap_or(StorageBackend::Local),
        };
        let storage_endpoint = args
            .storage_endpoint
            .or(env_string(&lookup, "STORAGE_ENDPOINT")?);
        if storage_backend == StorageBackend::Http && storage_endpoint.is_none() {
            bail!("the http storage backend needs MEDIA_INGEST_STORAGE_ENDPOINT");
        }

        let probe_timeout_secs = match args.probe_timeout_secs {
            Some(secs) => secs,
            None => env_parse(&lookup, "PROBE_TIMEOUT_SECS")?.unwrap_or(30),
        };

        Ok(Self {
            host: args
                .host
                .or(env_string(&lookup, "HOST")?)
                .unwrap_or_else(|| "0.0.0.0".into()),
            port,
            database_url: args
                .database_url
                .or(env_string(&lookup, "DATABASE_URL")?)
                .unwrap_or_else(|| "sqlite://./data/meta/media_ingest.db".into()),
            jwt_secret,
            jwt_issuer: args
                .jwt_issuer
                .or(env_string(&lookup, "JWT_ISSUER")?)
                .unwrap_or_else(|| "media-ingest-access".into()),
            storage_backend,
            storage_dir: args
                .storage_dir
                .or(env_string(&lookup, "STORAGE_DIR")?)
                .unwrap_or_else(|| "./data/objects".into()),
            storage_endpoint,
            bucket: args
                .bucket
                .or(env_string(&lookup, "BUCKET")?)
                .unwrap_or_else(|| "media".into()),
            public_base_url: args
                .public_base_url
                .or(env_string(&lookup, "PUBLIC_BASE_URL")?)
                .or_else(|| {
                    (storage_backend == StorageBackend::Local)
                        .then(|| format!("http://localhost:{}", port))
                }),
            temp_dir: args
                .temp_dir
                .or(env_string(&lookup, "TEMP_DIR")?.map(PathBuf::from))
                .unwrap_or_else(env::temp_dir),
            max_thumbnail_bytes: match args.max_thumbnail_bytes {
                Some(bytes) => bytes,
                None => env_parse(&lookup, "MAX_THUMBNAIL_BYTES")?.unwrap_or(10 << 20),
            },
            max_video_bytes: match args.max_video_bytes {
                Some(bytes) => bytes,
                None => env_parse(&lookup, "MAX_VIDEO_BYTES")?.unwrap_or(1 << 30),
            },
            ffprobe_path: args
                .ffprobe_path
                .or(env_string(&lookup, "FFPROBE_PATH")?)
                .unwrap_or_else(|| "ffprobe".into()),
            probe_timeout: Duration::from_secs(probe_timeout_secs),
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn env_string<F>(lookup: &F, name: &str) -> Result<Option<String>>
where
    F: Fn(&str) -> Result<String, env::VarError>,
{
    let key = format!("{ENV_PREFIX}{name}");
    match lookup(&key) {
        Ok(value) => Ok(Some(value)),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(err) => Err(err).with_context(|| format!("reading {}", key)),
    }
}

fn env_parse<F, T>(lookup: &F, name: &str) -> Result<Option<T>>
where
    F: Fn(&str) -> Result<String, env::VarError>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env_string(lookup, name)? {
        Some(value) => value.parse::<T>().map(Some).map_err(|err| {
            anyhow::anyhow!("parsing {ENV_PREFIX}{name} value `{}`: {}", value, err)
        }),
        None => Ok(None),
    }
}
