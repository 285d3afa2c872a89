//! Background loader thread (C2).
//!
//! One thread per cache, woken on a fixed interval. Each cycle it walks every
//! known sample and: fills any unloaded segment within reach of a playing
//! voice's `max_touched_index` plus its preload prefix, and trims samples
//! with zero live playback handles back down to just their preload prefix.
//! Decode failures past the initial load fill the segment with silence
//! rather than retrying forever.

use crate::sample::Sample;
use crate::store::CacheInner;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// How far ahead of `max_touched_index` the loader keeps segments warm.
const READ_AHEAD_SEGMENTS: usize = 2;
const CYCLE_INTERVAL: Duration = Duration::from_millis(20);

/// Owns the background loader thread. Dropping it signals shutdown and
/// joins the thread.
pub struct LoaderHandle {
    shutdown: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl LoaderHandle {
    pub(crate) fn spawn(inner: Arc<CacheInner>) -> Self {
        let shutdown = Arc::new(AtomicBool::new(false));
        let thread_shutdown = shutdown.clone();
        let thread = thread::Builder::new()
            .name("sampler-cache-loader".into())
            .spawn(move || run(&inner, &thread_shutdown))
            .expect("failed to spawn sampler-cache loader thread");
        Self { shutdown, thread: Some(thread) }
    }
}

impl Drop for LoaderHandle {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Release);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::error!("sampler-cache loader thread panicked");
            }
        }
    }
}

fn run(inner: &Arc<CacheInner>, shutdown: &AtomicBool) {
    tracing::debug!("sampler-cache loader thread started");
    while !shutdown.load(Ordering::Acquire) {
        run_cycle(inner);
        thread::sleep(CYCLE_INTERVAL);
    }
    tracing::debug!("sampler-cache loader thread stopped");
}

fn run_cycle(inner: &Arc<CacheInner>) {
    let samples: Vec<Arc<Sample>> = {
        let guard = inner.samples.lock().unwrap();
        guard.values().cloned().collect()
    };

    for sample in &samples {
        if sample.playback_count() > 0 {
            fill_read_ahead(sample, &*inner.decoder);
        } else {
            sample.trim_to_preload_prefix();
        }
    }
}

fn fill_read_ahead(sample: &Arc<Sample>, decoder: &dyn crate::decoder::SampleDecoder) {
    let touched_segment = Sample::frame_to_segment(sample.max_touched_index());
    let high_watermark = (touched_segment + READ_AHEAD_SEGMENTS + 1).min(sample.segment_count());
    let prefix = sample.preload_prefix();
    let target = high_watermark.max(prefix);

    let missing: Vec<usize> = (0..target).filter(|&i| !sample.is_segment_loaded(i)).collect();
    if missing.is_empty() {
        return;
    }

    match decoder.decode(&sample.meta.path) {
        Ok(decoded) => {
            for index in missing {
                let channels = sample.meta.channels as usize;
                let start_frame = index * crate::sample::SEGMENT_FRAMES;
                let frame_len = sample.segment_frame_len(index);
                let overlap_start = start_frame.saturating_sub(crate::sample::SEGMENT_OVERLAP);
                let overlap_len = start_frame - overlap_start;
                let mut data = Vec::with_capacity((overlap_len + frame_len) * channels);
                data.extend_from_slice(&decoded.frames[overlap_start * channels..start_frame * channels]);
                data.extend_from_slice(
                    &decoded.frames[start_frame * channels..(start_frame + frame_len) * channels],
                );
                sample.publish_segment(
                    index,
                    crate::sample::SegmentBlock { frames: data, channels: sample.meta.channels },
                );
            }
        }
        Err(error) => {
            tracing::warn!(
                path = %sample.meta.path.display(),
                %error,
                "re-decode failed during streaming, filling with silence"
            );
            for index in missing {
                sample.fill_silence(index);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::{DecodedAudio, SampleDecoder};
    use crate::sample::{Preload, SampleMeta};
    use std::path::{Path, PathBuf};

    struct FakeDecoder {
        frames: Vec<f32>,
    }

    impl SampleDecoder for FakeDecoder {
        fn decode(&self, _path: &Path) -> crate::Result<DecodedAudio> {
            Ok(DecodedAudio {
                channels: 1,
                sample_rate: 44100,
                frames: self.frames.clone(),
                loop_start: None,
                loop_end: None,
            })
        }
    }

    fn make_sample(num_frames: u64) -> Arc<Sample> {
        Arc::new(Sample::new(SampleMeta {
            path: PathBuf::from("x.wav"),
            channels: 1,
            sample_rate: 44100,
            num_frames,
            loop_start: None,
            loop_end: None,
        }))
    }

    #[test]
    fn fill_read_ahead_loads_segments_near_touched_index() {
        let sample = make_sample(10_000);
        sample.touch(0);
        let decoder = FakeDecoder { frames: vec![0.0; 10_000] };
        fill_read_ahead(&sample, &decoder);
        assert!(sample.is_segment_loaded(0));
        assert!(sample.is_segment_loaded(1));
        assert!(!sample.is_segment_loaded(9));
    }

    #[test]
    fn run_cycle_trims_idle_samples_to_preload_prefix() {
        let inner = Arc::new(CacheInner {
            decoder: Box::new(FakeDecoder { frames: vec![0.0; 10_000] }),
            samples: std::sync::Mutex::new(std::collections::HashMap::new()),
            byte_budget: None,
        });
        let sample = make_sample(10_000);
        sample.register_preload(Preload { time_ms: 0.0, offset: 0 });
        for i in 0..sample.segment_count() {
            sample.publish_segment(
                i,
                crate::sample::SegmentBlock { frames: vec![0.0; 1], channels: 1 },
            );
        }
        inner.samples.lock().unwrap().insert(PathBuf::from("x.wav"), sample.clone());

        run_cycle(&inner);

        assert!(sample.is_segment_loaded(0));
        assert!(!sample.is_segment_loaded(5));
    }

    #[test]
    fn run_cycle_keeps_filling_playing_samples() {
        let inner = Arc::new(CacheInner {
            decoder: Box::new(FakeDecoder { frames: vec![0.0; 10_000] }),
            samples: std::sync::Mutex::new(std::collections::HashMap::new()),
            byte_budget: None,
        });
        let sample = make_sample(10_000);
        sample.inc_playback_count();
        sample.touch(5000);
        inner.samples.lock().unwrap().insert(PathBuf::from("x.wav"), sample.clone());

        run_cycle(&inner);

        assert!(sample.is_segment_loaded(5));
    }
}
