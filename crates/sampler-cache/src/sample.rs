//! Segmented in-memory representation of one decoded sample (C1).
//!
//! A sample's frame data is split into fixed-size segments so the loader can
//! fill and evict them independently, and so no single allocation needs to
//! hold an entire multi-minute recording. Each segment carries a small
//! overlap copied from the tail of the previous one, so an interpolator
//! reading a handful of neighboring frames never has to reach across a
//! segment boundary.

use arc_swap::ArcSwapOption;
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Frames per segment.
pub const SEGMENT_FRAMES: usize = 1000;
/// Frames of pre-overlap copied from the previous segment's tail.
pub const SEGMENT_OVERLAP: usize = 64;

/// Immutable, file-derived metadata for a loaded sample.
#[derive(Debug, Clone)]
pub struct SampleMeta {
    pub path: PathBuf,
    pub channels: u16,
    pub sample_rate: u32,
    pub num_frames: u64,
    pub loop_start: Option<u64>,
    pub loop_end: Option<u64>,
}

/// One filled segment: `SEGMENT_OVERLAP` overlap frames followed by up to
/// `SEGMENT_FRAMES` frames of this segment's own data, interleaved per
/// `channels`.
#[derive(Debug)]
pub struct SegmentBlock {
    pub frames: Vec<f32>,
    pub channels: u16,
}

impl SegmentBlock {
    fn silence(channels: u16, frame_count: usize) -> Self {
        Self { frames: vec![0.0; frame_count * channels as usize], channels }
    }
}

/// A live preload reservation: the prefix of segments that must stay loaded
/// for as long as this descriptor is registered.
#[derive(Debug, Clone, Copy)]
pub struct Preload {
    pub time_ms: f32,
    pub offset: u64,
}

#[derive(Debug)]
struct PreloadDescriptor {
    id: u64,
    segments: usize,
}

/// A decoded sample, segmented for streaming.
#[derive(Debug)]
pub struct Sample {
    pub meta: SampleMeta,
    segments: Vec<ArcSwapOption<SegmentBlock>>,
    max_touched_index: AtomicU64,
    playback_count: AtomicUsize,
    preload_descriptors: Mutex<Vec<PreloadDescriptor>>,
    next_preload_id: AtomicU64,
}

impl Sample {
    pub(crate) fn new(meta: SampleMeta) -> Self {
        let segment_count = meta.num_frames.div_ceil(SEGMENT_FRAMES as u64).max(1) as usize;
        Self {
            meta,
            segments: (0..segment_count).map(|_| ArcSwapOption::empty()).collect(),
            max_touched_index: AtomicU64::new(0),
            playback_count: AtomicUsize::new(0),
            preload_descriptors: Mutex::new(Vec::new()),
            next_preload_id: AtomicU64::new(0),
        }
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    pub fn frame_to_segment(frame: u64) -> usize {
        (frame / SEGMENT_FRAMES as u64) as usize
    }

    pub(crate) fn get_segment(&self, index: usize) -> Option<std::sync::Arc<SegmentBlock>> {
        self.segments.get(index).and_then(|slot| slot.load_full())
    }

    pub(crate) fn publish_segment(&self, index: usize, block: SegmentBlock) {
        if let Some(slot) = self.segments.get(index) {
            slot.store(Some(std::sync::Arc::new(block)));
        }
    }

    pub(crate) fn evict_segment(&self, index: usize) {
        if let Some(slot) = self.segments.get(index) {
            slot.store(None);
        }
    }

    pub fn is_segment_loaded(&self, index: usize) -> bool {
        self.segments.get(index).is_some_and(|slot| slot.load().is_some())
    }

    /// Monotone high-water mark of the furthest frame any live play-handle
    /// has read, used by the loader to decide what to fill next.
    pub(crate) fn touch(&self, frame: u64) {
        self.max_touched_index.fetch_max(frame, Ordering::AcqRel);
    }

    pub fn max_touched_index(&self) -> u64 {
        self.max_touched_index.load(Ordering::Acquire)
    }

    pub(crate) fn inc_playback_count(&self) {
        self.playback_count.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn dec_playback_count(&self) {
        self.playback_count.fetch_sub(1, Ordering::AcqRel);
    }

    pub fn playback_count(&self) -> usize {
        self.playback_count.load(Ordering::Acquire)
    }

    /// Register a preload reservation, returning an id to later release it
    /// with [`Self::release_preload`]. Recomputes the preload prefix.
    pub(crate) fn register_preload(&self, preload: Preload) -> u64 {
        let id = self.next_preload_id.fetch_add(1, Ordering::Relaxed);
        let touched_frame =
            (preload.time_ms * 0.001 * self.meta.sample_rate as f32).max(0.0) as u64 + preload.offset;
        let segments = Self::frame_to_segment(touched_frame) + 1;
        let mut descriptors = self.preload_descriptors.lock().unwrap();
        descriptors.push(PreloadDescriptor { id, segments });
        id
    }

    pub(crate) fn release_preload(&self, id: u64) {
        let mut descriptors = self.preload_descriptors.lock().unwrap();
        descriptors.retain(|d| d.id != id);
    }

    /// The smallest segment count covering every live preload descriptor.
    /// Segments `0..preload_prefix()` must stay loaded.
    pub fn preload_prefix(&self) -> usize {
        let descriptors = self.preload_descriptors.lock().unwrap();
        descriptors.iter().map(|d| d.segments).max().unwrap_or(0).min(self.segment_count())
    }

    /// Drop every segment past the preload prefix. Called by the loader once
    /// `playback_count` reaches zero.
    pub(crate) fn trim_to_preload_prefix(&self) {
        let prefix = self.preload_prefix();
        for index in prefix..self.segment_count() {
            self.evict_segment(index);
        }
    }

    /// Fill one unloaded segment with silence -- used for decode failures
    /// past the initial load, per the spec's "fill with silence, don't retry"
    /// failure mode.
    pub(crate) fn fill_silence(&self, index: usize) {
        let frame_count = self.segment_frame_len(index);
        self.publish_segment(index, SegmentBlock::silence(self.meta.channels, frame_count));
    }

    pub(crate) fn segment_frame_len(&self, index: usize) -> usize {
        let start = index as u64 * SEGMENT_FRAMES as u64;
        let remaining = self.meta.num_frames.saturating_sub(start);
        remaining.min(SEGMENT_FRAMES as u64) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(num_frames: u64) -> SampleMeta {
        SampleMeta {
            path: PathBuf::from("test.wav"),
            channels: 1,
            sample_rate: 44100,
            num_frames,
            loop_start: None,
            loop_end: None,
        }
    }

    #[test]
    fn segment_count_covers_all_frames() {
        let s = Sample::new(meta(2500));
        assert_eq!(s.segment_count(), 3);
    }

    #[test]
    fn unloaded_segment_is_none() {
        let s = Sample::new(meta(1000));
        assert!(s.get_segment(0).is_none());
        assert!(!s.is_segment_loaded(0));
    }

    #[test]
    fn publish_then_load_round_trips() {
        let s = Sample::new(meta(1000));
        s.publish_segment(0, SegmentBlock { frames: vec![1.0, 2.0, 3.0], channels: 1 });
        assert!(s.is_segment_loaded(0));
        let block = s.get_segment(0).unwrap();
        assert_eq!(block.frames, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn preload_prefix_tracks_highest_live_descriptor() {
        let s = Sample::new(meta(10_000));
        let a = s.register_preload(Preload { time_ms: 10.0, offset: 0 }); // ~441 frames -> segment 0
        assert_eq!(s.preload_prefix(), 1);
        let _b = s.register_preload(Preload { time_ms: 100.0, offset: 0 }); // ~4410 frames -> segment 4
        assert_eq!(s.preload_prefix(), 5);
        s.release_preload(a);
        assert_eq!(s.preload_prefix(), 5);
    }

    #[test]
    fn trim_keeps_only_preload_prefix() {
        let s = Sample::new(meta(5000));
        s.register_preload(Preload { time_ms: 0.0, offset: 0 });
        for i in 0..5 {
            s.publish_segment(i, SegmentBlock { frames: vec![0.0], channels: 1 });
        }
        s.trim_to_preload_prefix();
        assert!(s.is_segment_loaded(0));
        assert!(!s.is_segment_loaded(1));
    }

    #[test]
    fn touch_is_monotone() {
        let s = Sample::new(meta(10_000));
        s.touch(500);
        s.touch(200);
        assert_eq!(s.max_touched_index(), 500);
        s.touch(900);
        assert_eq!(s.max_touched_index(), 900);
    }
}
