//! Pluggable audio-file decoding.
//!
//! The cache never assumes a specific container format: it asks a
//! [`SampleDecoder`] for pre-decoded interleaved float PCM plus metadata, then
//! owns the result. [`WavDecoder`] is the built-in default, covering the
//! common case (region files point at `.wav` samples); hosts embedding this
//! crate can supply their own decoder for other formats.

use crate::Result;
use hound::{SampleFormat, WavReader};
use std::path::Path;

/// Fully decoded audio handed to the cache by a [`SampleDecoder`].
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    /// Channel count (1 = mono, 2 = stereo; only these two are supported downstream).
    pub channels: u16,
    /// Source sample rate in Hz.
    pub sample_rate: u32,
    /// Interleaved float PCM, `num_frames * channels` samples long.
    pub frames: Vec<f32>,
    /// Loop start frame, from the file's instrument/sampler chunk, if present.
    pub loop_start: Option<u64>,
    /// Loop end frame, from the file's instrument/sampler chunk, if present.
    pub loop_end: Option<u64>,
}

impl DecodedAudio {
    pub fn num_frames(&self) -> u64 {
        if self.channels == 0 { 0 } else { self.frames.len() as u64 / self.channels as u64 }
    }
}

/// A source of decoded PCM for the sample cache. Implementations must not
/// block longer than a single file read/decode -- the background loader
/// calls this from its own thread, never the audio thread.
pub trait SampleDecoder: Send + Sync {
    fn decode(&self, path: &Path) -> Result<DecodedAudio>;
}

/// The default decoder, covering PCM and IEEE-float WAV files via `hound`.
///
/// `hound` does not expose the `smpl` (sampler) chunk, so loop points are
/// always `None` here; a region's own `loop_start`/`loop_end` fields (set
/// explicitly in the instrument definition) are the expected source of loop
/// metadata in practice. A decoder backed by a richer WAV/AIFF library could
/// fill these in from the file itself.
#[derive(Debug, Default, Clone, Copy)]
pub struct WavDecoder;

impl SampleDecoder for WavDecoder {
    fn decode(&self, path: &Path) -> Result<DecodedAudio> {
        let reader = WavReader::open(path)?;
        let spec = reader.spec();
        let channels = spec.channels;

        let frames: Vec<f32> = match spec.sample_format {
            SampleFormat::Float => {
                reader.into_samples::<f32>().collect::<std::result::Result<Vec<_>, _>>()?
            }
            SampleFormat::Int => {
                let bits = spec.bits_per_sample;
                let max_val = (1i32 << (bits - 1)) as f32;
                reader
                    .into_samples::<i32>()
                    .map(|s| s.map(|v| v as f32 / max_val))
                    .collect::<std::result::Result<Vec<_>, _>>()?
            }
        };

        Ok(DecodedAudio {
            channels,
            sample_rate: spec.sample_rate,
            frames,
            loop_start: None,
            loop_end: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hound::{WavSpec, WavWriter};
    use tempfile::NamedTempFile;

    fn write_test_wav(path: &Path, channels: u16, samples: &[f32]) {
        let spec = WavSpec {
            channels,
            sample_rate: 44100,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };
        let mut writer = WavWriter::create(path, spec).unwrap();
        for &s in samples {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn decodes_mono_float_wav() {
        let file = NamedTempFile::new().unwrap();
        let samples = [0.0, 0.5, -0.5, 1.0, -1.0];
        write_test_wav(file.path(), 1, &samples);

        let decoded = WavDecoder.decode(file.path()).unwrap();
        assert_eq!(decoded.channels, 1);
        assert_eq!(decoded.sample_rate, 44100);
        assert_eq!(decoded.num_frames(), 5);
        for (a, b) in decoded.frames.iter().zip(samples.iter()) {
            assert!((a - b).abs() < 1e-6);
        }
    }

    #[test]
    fn decodes_interleaved_stereo_wav() {
        let file = NamedTempFile::new().unwrap();
        let samples = [0.0, 0.0, 1.0, -1.0, 0.5, -0.5];
        write_test_wav(file.path(), 2, &samples);

        let decoded = WavDecoder.decode(file.path()).unwrap();
        assert_eq!(decoded.channels, 2);
        assert_eq!(decoded.num_frames(), 3);
        assert_eq!(decoded.frames.len(), 6);
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(WavDecoder.decode(Path::new("/nonexistent/path.wav")).is_err());
    }
}
