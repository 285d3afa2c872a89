//! Sample store: the shared, process-wide handle samples are loaded through.
//!
//! `SampleCache` is a cheaply-cloneable handle over a shared map of
//! path -> [`Sample`]. Control threads call [`SampleCache::load`] to get a
//! sample and a preload reservation; the audio thread calls
//! [`SampleCache::open_playback`] to get a [`PlayHandle`] per voice. Actually
//! filling segments happens on the background loader thread started by
//! [`SampleCache::spawn_loader`], never here.

use crate::decoder::SampleDecoder;
use crate::handle::PlayHandle;
use crate::loader::LoaderHandle;
use crate::sample::{Preload, Sample, SampleMeta, SegmentBlock, SEGMENT_FRAMES, SEGMENT_OVERLAP};
use crate::{Error, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// A live preload reservation. Dropping it releases the reservation, letting
/// the loader eventually trim the sample back down once playback stops.
pub struct PreloadRef {
    sample: Arc<Sample>,
    id: u64,
}

impl Drop for PreloadRef {
    fn drop(&mut self) {
        self.sample.release_preload(self.id);
    }
}

pub(crate) struct CacheInner {
    pub(crate) decoder: Box<dyn SampleDecoder>,
    pub(crate) samples: Mutex<HashMap<PathBuf, Arc<Sample>>>,
    pub(crate) byte_budget: Option<usize>,
}

/// Shared handle to the process-wide sample cache. Clone freely; all clones
/// refer to the same underlying map.
#[derive(Clone)]
pub struct SampleCache {
    pub(crate) inner: Arc<CacheInner>,
}

impl SampleCache {
    pub fn new(decoder: impl SampleDecoder + 'static) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                decoder: Box::new(decoder),
                samples: Mutex::new(HashMap::new()),
                byte_budget: None,
            }),
        }
    }

    /// Apply an optional byte budget; the loader's eviction pass uses this
    /// to decide when to trim idle samples beyond their preload prefix.
    pub fn with_byte_budget(decoder: impl SampleDecoder + 'static, byte_budget: usize) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                decoder: Box::new(decoder),
                samples: Mutex::new(HashMap::new()),
                byte_budget: Some(byte_budget),
            }),
        }
    }

    /// Start the background loader thread. Keep the returned handle alive
    /// for as long as streaming should continue; dropping it joins the
    /// thread.
    pub fn spawn_loader(&self) -> LoaderHandle {
        LoaderHandle::spawn(self.inner.clone())
    }

    /// Load (or return the already-shared) sample at `path`, synchronously
    /// filling enough prefix segments to cover `preload`.
    pub fn load(&self, path: impl AsRef<Path>, preload: Preload) -> Result<(Arc<Sample>, PreloadRef)> {
        let path = path.as_ref().to_path_buf();

        let sample = {
            let mut samples = self.inner.samples.lock().unwrap();
            if let Some(existing) = samples.get(&path) {
                existing.clone()
            } else {
                let decoded = self.inner.decoder.decode(&path).map_err(|e| {
                    tracing::warn!(path = %path.display(), error = %e, "failed to load sample");
                    e
                })?;
                let meta = SampleMeta {
                    path: path.clone(),
                    channels: decoded.channels,
                    sample_rate: decoded.sample_rate,
                    num_frames: decoded.num_frames(),
                    loop_start: decoded.loop_start,
                    loop_end: decoded.loop_end,
                };
                let sample = Arc::new(Sample::new(meta));
                fill_all_segments_from(&sample, &decoded.frames);
                samples.insert(path.clone(), sample.clone());
                sample
            }
        };

        let id = sample.register_preload(preload);
        ensure_prefix_loaded(&sample, self.inner.decoder.as_ref(), &path)?;
        Ok((sample.clone(), PreloadRef { sample, id }))
    }

    pub fn open_playback(&self, sample: &Arc<Sample>, live_mode: bool) -> PlayHandle {
        sample.inc_playback_count();
        PlayHandle::new(sample.clone(), live_mode)
    }

    pub fn sample_count(&self) -> usize {
        self.inner.samples.lock().unwrap().len()
    }
}

/// Split already-fully-decoded frame data directly into segments (used for
/// the initial synchronous load, which has the whole buffer in hand).
fn fill_all_segments_from(sample: &Sample, frames: &[f32]) {
    let channels = sample.meta.channels as usize;
    for index in 0..sample.segment_count() {
        let start_frame = index * SEGMENT_FRAMES;
        let frame_len = sample.segment_frame_len(index);
        let overlap_start = start_frame.saturating_sub(SEGMENT_OVERLAP);
        let overlap_len = start_frame - overlap_start;

        let mut data = Vec::with_capacity((overlap_len + frame_len) * channels);
        data.extend_from_slice(&frames[overlap_start * channels..start_frame * channels]);
        data.extend_from_slice(&frames[start_frame * channels..(start_frame + frame_len) * channels]);
        sample.publish_segment(index, SegmentBlock { frames: data, channels: sample.meta.channels });
    }
}

/// Synchronously guarantee every segment in the preload prefix is loaded,
/// re-decoding the file if a fresh reservation needs segments beyond what a
/// prior caller had already materialized (unreachable today since `load`
/// always fills every segment up front, but kept as the seam the background
/// loader's incremental fill shares).
fn ensure_prefix_loaded(sample: &Arc<Sample>, decoder: &dyn SampleDecoder, path: &Path) -> Result<()> {
    let prefix = sample.preload_prefix();
    let missing = (0..prefix).any(|i| !sample.is_segment_loaded(i));
    if !missing {
        return Ok(());
    }
    let decoded = decoder.decode(path).map_err(|_| Error::MissingFile(path.to_path_buf()))?;
    fill_all_segments_from(sample, &decoded.frames);
    Ok(())
}
