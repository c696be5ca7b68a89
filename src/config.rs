//! Command-line and environment configuration for the service.

use std::net::{IpAddr, SocketAddr};

use clap::Parser;

use crate::extract::NoteExtractor;
use crate::notes::{NoteMapper, DEFAULT_MIN_HZ};
use crate::pyin::{PyinConfig, C2_HZ, C7_HZ};

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// pyin-notes - extract a note sequence from an uploaded recording
#[derive(Debug, Clone, Parser)]
#[command(name = "pyin-notes")]
#[command(author, version, about, long_about = None)]
pub struct ServerConfig {
    /// Address to bind
    #[arg(long, env = "PYIN_NOTES_HOST", default_value = DEFAULT_HOST)]
    pub host: IpAddr,

    /// Port to listen on
    #[arg(short, long, env = "PYIN_NOTES_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Allowed CORS origins (comma separated). Empty or "*" allows any origin.
    #[arg(long = "allowed-origin", env = "PYIN_NOTES_ALLOWED_ORIGINS", value_delimiter = ',')]
    pub allowed_origins: Vec<String>,

    /// Largest accepted request body in bytes
    #[arg(long, env = "PYIN_NOTES_MAX_UPLOAD_BYTES", default_value_t = DEFAULT_MAX_UPLOAD_BYTES)]
    pub max_upload_bytes: usize,

    /// Frequencies below this are never reported as notes
    #[arg(long, env = "PYIN_NOTES_MIN_NOTE_HZ", default_value_t = DEFAULT_MIN_HZ)]
    pub min_note_hz: f64,

    /// Lowest pitch the estimator searches for
    #[arg(long, env = "PYIN_NOTES_FMIN_HZ", default_value_t = C2_HZ)]
    pub fmin_hz: f32,

    /// Highest pitch the estimator searches for
    #[arg(long, env = "PYIN_NOTES_FMAX_HZ", default_value_t = C7_HZ)]
    pub fmax_hz: f32,

    /// Analysis frame length in samples
    #[arg(long, env = "PYIN_NOTES_FRAME_SIZE", default_value_t = 2048)]
    pub frame_size: usize,

    /// Samples between successive frames
    #[arg(long, env = "PYIN_NOTES_HOP_SIZE", default_value_t = 512)]
    pub hop_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let pyin = PyinConfig::default();
        Self {
            host: IpAddr::from([0, 0, 0, 0]),
            port: DEFAULT_PORT,
            allowed_origins: Vec::new(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            min_note_hz: DEFAULT_MIN_HZ,
            fmin_hz: pyin.fmin_hz,
            fmax_hz: pyin.fmax_hz,
            frame_size: pyin.frame_size,
            hop_size: pyin.hop_size,
        }
    }
}

impl ServerConfig {
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn note_extractor(&self) -> NoteExtractor {
        let pyin = PyinConfig {
            fmin_hz: self.fmin_hz,
            fmax_hz: self.fmax_hz,
            frame_size: self.frame_size,
            hop_size: self.hop_size,
            ..PyinConfig::default()
        };
        NoteExtractor::new(pyin, NoteMapper::with_min_hz(self.min_note_hz))
    }
}
