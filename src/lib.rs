//! Extract a melody's note names from an audio recording.
//!
//! Audio is decoded to mono, run through a pYIN pitch tracker, each frame's
//! fundamental frequency is mapped to the nearest equal-tempered note (sharps
//! only, `A4` = 440 Hz) and adjacent repeats are collapsed. The [`server`]
//! module exposes this over HTTP.

pub mod config;
pub mod decode;
pub mod extract;
pub mod notes;
pub mod pyin;
pub mod server;

use std::sync::Once;

pub use config::ServerConfig;
pub use decode::{decode_audio, DecodedAudio};
pub use extract::NoteExtractor;
pub use notes::{collapse_repeats, hz_to_note, notes_from_frequencies, NoteMapper, NoteName};
pub use pyin::{estimate_f0, BetaPrior, FrameEstimate, Pyin, PyinConfig, PyinError};

/// Install the `env_logger` backend once; `RUST_LOG` overrides the `info` default.
pub fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
            .try_init();
    });
}
