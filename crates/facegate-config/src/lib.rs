use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use url::Url;

pub const PRIMARY_CONFIG_PATH: &str = "/etc/facegate/config.toml";
pub const SECONDARY_CONFIG_PATH: &str = "/usr/local/etc/facegate/config.toml";
pub const DEFAULT_KEYRING_SERVICE: &str = "facegate";
pub const DEFAULT_VIDEO_DEVICE: &str = "/dev/video0";
pub const DEFAULT_PIXEL_FORMAT: &str = "MJPG";
pub const DEFAULT_WARMUP_FRAMES: u32 = 4;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ConfigFile {
    pub api_base: Option<String>,
    pub gate_api_base: Option<String>,
    pub idp_domain: Option<String>,
    pub client_id: Option<String>,
    pub redirect_uri: Option<String>,
    pub request_timeout_secs: Option<u64>,
    pub keyring_service: Option<String>,
    pub video_device: Option<String>,
    pub pixel_format: Option<String>,
    pub warmup_frames: Option<u32>,
}

/// Endpoint and identity settings shared by both surfaces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base of the enrollment API (`/presign-upload`, `/enroll`).
    pub api_base: String,
    /// Base of the gate API (`/presign-upload`, `/verify`).
    pub gate_api_base: String,
    pub idp_domain: String,
    pub client_id: String,
    pub redirect_uri: String,
    /// `None` leaves the HTTP client's own timeout behaviour in place.
    pub request_timeout: Option<Duration>,
    pub keyring_service: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraDefaults {
    pub video_device: String,
    pub pixel_format: String,
    pub warmup_frames: u32,
}

impl Default for CameraDefaults {
    fn default() -> Self {
        Self {
            video_device: DEFAULT_VIDEO_DEVICE.to_string(),
            pixel_format: DEFAULT_PIXEL_FORMAT.to_string(),
            warmup_frames: DEFAULT_WARMUP_FRAMES,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub client: ClientConfig,
    pub camera: CameraDefaults,
}

impl ResolvedConfig {
    pub fn from_raw(raw: ConfigFile) -> Result<Self, ConfigError> {
        let api_base = normalize_base("api_base", require("api_base", raw.api_base)?)?;
        let gate_api_base = match raw.gate_api_base {
            Some(value) => normalize_base("gate_api_base", value)?,
            None => api_base.clone(),
        };
        let idp_domain = normalize_base("idp_domain", require("idp_domain", raw.idp_domain)?)?;
        let redirect_uri = require("redirect_uri", raw.redirect_uri)?;
        Url::parse(&redirect_uri).map_err(|err| ConfigError::InvalidUrl {
            field: "redirect_uri",
            message: err.to_string(),
        })?;

        Ok(Self {
            client: ClientConfig {
                api_base,
                gate_api_base,
                idp_domain,
                client_id: require("client_id", raw.client_id)?,
                redirect_uri,
                request_timeout: raw
                    .request_timeout_secs
                    .map(|secs| Duration::from_secs(secs.max(1))),
                keyring_service: raw
                    .keyring_service
                    .unwrap_or_else(|| DEFAULT_KEYRING_SERVICE.to_string()),
            },
            camera: CameraDefaults {
                video_device: raw
                    .video_device
                    .unwrap_or_else(|| DEFAULT_VIDEO_DEVICE.to_string()),
                pixel_format: raw
                    .pixel_format
                    .unwrap_or_else(|| DEFAULT_PIXEL_FORMAT.to_string()),
                warmup_frames: raw.warmup_frames.unwrap_or(DEFAULT_WARMUP_FRAMES),
            },
        })
    }
}

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub contents: ConfigFile,
    pub source: PathBuf,
}

impl LoadedConfig {
    pub fn new(contents: ConfigFile, source: PathBuf) -> Self {
        Self { contents, source }
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedConfigWithSource {
    pub resolved: ResolvedConfig,
    pub source: PathBuf,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },
    #[error("no configuration file found (searched {searched})")]
    NotFound { searched: String },
    #[error("configuration is missing required key `{field}`")]
    Missing { field: &'static str },
    #[error("configuration key `{field}` is not a valid URL: {message}")]
    InvalidUrl {
        field: &'static str,
        message: String,
    },
}

pub fn default_sources() -> Vec<PathBuf> {
    vec![
        PathBuf::from(PRIMARY_CONFIG_PATH),
        PathBuf::from(SECONDARY_CONFIG_PATH),
    ]
}

/// Resolve configuration, giving an explicit path precedence over the
/// system locations.
pub fn load_resolved_config(
    explicit: Option<&Path>,
) -> Result<ResolvedConfigWithSource, ConfigError> {
    let mut sources = Vec::new();
    if let Some(path) = explicit {
        sources.push(path.to_path_buf());
    }
    sources.extend(default_sources());
    load_resolved_from_paths(&sources)
}

pub fn load_from_paths(paths: &[PathBuf]) -> Result<Option<LoadedConfig>, ConfigError> {
    for path in paths {
        match fs::read_to_string(path) {
            Ok(contents) => {
                let parsed =
                    toml::from_str::<ConfigFile>(&contents).map_err(|err| ConfigError::Parse {
                        path: path.clone(),
                        message: err.to_string(),
                    })?;
                return Ok(Some(LoadedConfig::new(parsed, path.clone())));
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => continue,
            Err(err) => {
                return Err(ConfigError::Read {
                    path: path.clone(),
                    source: err,
                })
            }
        }
    }

    Ok(None)
}

pub fn load_resolved_from_paths(
    paths: &[PathBuf],
) -> Result<ResolvedConfigWithSource, ConfigError> {
    match load_from_paths(paths)? {
        Some(entry) => Ok(ResolvedConfigWithSource {
            resolved: ResolvedConfig::from_raw(entry.contents)?,
            source: entry.source,
        }),
        None => Err(ConfigError::NotFound {
            searched: paths
                .iter()
                .map(|path| path.display().to_string())
                .collect::<Vec<_>>()
                .join(", "),
        }),
    }
}

fn require(field: &'static str, value: Option<String>) -> Result<String, ConfigError> {
    match value.map(|v| v.trim().to_string()) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ConfigError::Missing { field }),
    }
}

fn normalize_base(field: &'static str, value: String) -> Result<String, ConfigError> {
    let parsed = Url::parse(value.trim()).map_err(|err| ConfigError::InvalidUrl {
        field,
        message: err.to_string(),
    })?;
    if parsed.cannot_be_a_base() {
        return Err(ConfigError::InvalidUrl {
            field,
            message: "URL cannot be used as a base".into(),
        });
    }
    Ok(parsed.as_str().trim_end_matches('/').to_string())
}
