//! Disk-streaming sample cache for the sampler engine.
//!
//! Sample frame data is decoded once and kept in memory as fixed-size
//! segments ([`sample::Sample`]), shared across every voice currently
//! playing that file through a process-wide [`SampleCache`]. A background
//! thread ([`LoaderHandle`]) fills segments ahead of playback and evicts
//! everything beyond each sample's preload reservation once nothing is
//! playing it anymore, so memory use tracks "what's actually in use" rather
//! than "everything ever touched".
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use sampler_cache::{Preload, SampleCache, WavDecoder};
//!
//! let cache = SampleCache::new(WavDecoder);
//! let _loader = cache.spawn_loader();
//!
//! let (sample, _reservation) = cache.load("kick.wav", Preload { time_ms: 200.0, offset: 0 })?;
//! let mut handle = cache.open_playback(&sample, false);
//! ```

mod decoder;
mod handle;
mod loader;
mod sample;
mod store;

pub use decoder::{DecodedAudio, SampleDecoder, WavDecoder};
pub use handle::PlayHandle;
pub use loader::LoaderHandle;
pub use sample::{Preload, Sample, SampleMeta};
pub use store::{PreloadRef, SampleCache};

use std::path::PathBuf;

/// Error types for sample loading and decoding.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The requested sample file does not exist or could not be opened.
    #[error("sample file not found: {0}")]
    MissingFile(PathBuf),

    /// WAV file decode error.
    #[error("WAV decode error: {0}")]
    Wav(#[from] hound::Error),

    /// Standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type for sample cache operations.
pub type Result<T> = std::result::Result<T, Error>;
