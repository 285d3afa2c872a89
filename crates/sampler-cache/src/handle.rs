//! Play-handle: a per-voice cursor into a sample (C3).
//!
//! A voice never touches the segment map directly. It owns a `PlayHandle`,
//! which caches the segment it last looked up and re-resolves only when the
//! requested position moves outside that segment's window (including its
//! pre-overlap). Reading also advances the sample's `max_touched_index`
//! high-water mark, which is how the background loader knows what to fill
//! next.

use crate::sample::{Sample, SegmentBlock, SEGMENT_FRAMES, SEGMENT_OVERLAP};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// A per-voice cursor into a sample's segmented frame data.
pub struct PlayHandle {
    sample: Arc<Sample>,
    live_mode: bool,
    cached_segment_index: Option<usize>,
    cached_block: Option<Arc<SegmentBlock>>,
}

impl PlayHandle {
    pub(crate) fn new(sample: Arc<Sample>, live_mode: bool) -> Self {
        Self { sample, live_mode, cached_segment_index: None, cached_block: None }
    }

    pub fn sample(&self) -> &Arc<Sample> {
        &self.sample
    }

    pub fn set_live_mode(&mut self, live_mode: bool) {
        self.live_mode = live_mode;
    }

    /// Read one interleaved frame's worth of samples starting at `pos`, or
    /// zero if the segment is unloaded in live mode.
    pub fn get(&mut self, pos: u64, channels: u16, out: &mut [f32]) {
        self.sample.touch(pos);
        self.lookup(pos);
        let Some(block) = &self.cached_block else {
            out.fill(0.0);
            return;
        };
        let segment_index = self.cached_segment_index.unwrap();
        let segment_start = segment_index as u64 * SEGMENT_FRAMES as u64;
        let overlap_start = segment_start.saturating_sub(SEGMENT_OVERLAP as u64);
        let local_frame = (pos - overlap_start) as usize;
        let ch = channels as usize;
        let base = local_frame * ch;
        if base + ch <= block.frames.len() {
            out.copy_from_slice(&block.frames[base..base + ch]);
        } else {
            out.fill(0.0);
        }
    }

    /// A contiguous window of `n` frames starting at `pos`, if it falls
    /// entirely within one cached segment (including its pre-overlap);
    /// `None` if it would straddle a segment boundary or the segment isn't
    /// loaded.
    pub fn get_range(&mut self, pos: u64, n: usize, channels: u16) -> Option<Vec<f32>> {
        self.sample.touch(pos + n as u64);
        self.lookup(pos);
        let block = self.cached_block.as_ref()?;
        let segment_index = self.cached_segment_index?;
        let segment_start = segment_index as u64 * SEGMENT_FRAMES as u64;
        let overlap_start = segment_start.saturating_sub(SEGMENT_OVERLAP as u64);
        let local_frame = (pos - overlap_start) as usize;
        let ch = channels as usize;
        let end = (local_frame + n) * ch;
        if end > block.frames.len() {
            return None;
        }
        Some(block.frames[local_frame * ch..end].to_vec())
    }

    /// Re-resolve the cached segment for `pos`. Blocks (sleep-poll) in
    /// non-live mode until the loader fills the segment; returns immediately
    /// with an empty window in live mode.
    fn lookup(&mut self, pos: u64) {
        let segment_index = Sample::frame_to_segment(pos);
        if self.cached_segment_index == Some(segment_index) && self.cached_block.is_some() {
            return;
        }

        loop {
            if let Some(block) = self.sample.get_segment(segment_index) {
                self.cached_segment_index = Some(segment_index);
                self.cached_block = Some(block);
                return;
            }
            if self.live_mode {
                self.cached_segment_index = None;
                self.cached_block = None;
                return;
            }
            thread::sleep(POLL_INTERVAL);
        }
    }
}

impl Drop for PlayHandle {
    fn drop(&mut self) {
        self.sample.dec_playback_count();
    }
}
