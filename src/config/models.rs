use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub extractor: ExtractorConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
        }
    }
}

fn default_bind_addr() -> SocketAddr {
    "0.0.0.0:8080".parse().unwrap()
}

/// Extraction engine configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExtractorConfig {
    /// Engine binary; a bare name is resolved via PATH.
    #[serde(default = "default_binary")]
    pub binary: String,
    /// Directory completed media is written to; created at startup.
    #[serde(default = "default_downloads_dir")]
    pub downloads_dir: PathBuf,
    /// Container extensions surfaced to clients by the metadata probe.
    #[serde(default = "default_allowed_exts")]
    pub allowed_exts: Vec<String>,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            binary: default_binary(),
            downloads_dir: default_downloads_dir(),
            allowed_exts: default_allowed_exts(),
        }
    }
}

fn default_binary() -> String {
    "yt-dlp".to_string()
}

fn default_downloads_dir() -> PathBuf {
    PathBuf::from("downloads")
}

fn default_allowed_exts() -> Vec<String> {
    vec!["mp4".to_string(), "m4a".to_string(), "webm".to_string()]
}
