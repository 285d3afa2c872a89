//! End-to-end tests driving a [`Dispatcher`] through the public event API.

use sampler_cache::{Preload, SampleCache, WavDecoder};
use sampler_dsp::CurveTable;
use sampler_voice::pool::{Dispatcher, RegionSet};
use sampler_voice::region::{EgSpec, EgStage, Region};
use tempfile::NamedTempFile;

fn sine_wave_wav(num_frames: usize) -> NamedTempFile {
    let file = NamedTempFile::new().unwrap();
    let spec = hound::WavSpec { channels: 1, sample_rate: 44100, bits_per_sample: 16, sample_format: hound::SampleFormat::Int };
    let mut writer = hound::WavWriter::create(file.path(), spec).unwrap();
    for i in 0..num_frames {
        let t = i as f32 / 44100.0;
        let v = (2.0 * std::f32::consts::PI * 440.0 * t).sin();
        writer.write_sample((v * i16::MAX as f32) as i16).unwrap();
    }
    writer.finalize().unwrap();
    file
}

fn single_region_dispatcher(max_voices: usize, region: Region) -> Dispatcher {
    let cache = SampleCache::new(WavDecoder);
    let regions = RegionSet::new(vec![region], CurveTable::new());
    Dispatcher::new(max_voices, 64, regions, cache, 44100.0, 44100.0)
}

/// A region that actually sustains (the default `EgSpec` has a 0% sustain
/// level, which is silent) with a short but nonzero release so repeated
/// render calls can observe the voice decaying to idle instead of both
/// attacking and releasing within a single sample.
fn audible_amp_eg() -> EgSpec {
    EgSpec {
        attack: EgStage { base_seconds: 0.001, ..Default::default() },
        decay: EgStage { base_seconds: 0.005, ..Default::default() },
        sustain: 100.0,
        release: EgStage { base_seconds: 0.05, ..Default::default() },
        ..Default::default()
    }
}

fn loaded_region(file: &NamedTempFile, cache: &SampleCache) -> Region {
    let (sample, _preload) = cache.load(file.path(), Preload { time_ms: 100.0, offset: 0 }).unwrap();
    Region {
        sample: Some(sample),
        lokey: 0,
        hikey: 127,
        lovel: 0,
        hivel: 127,
        amp_eg: audible_amp_eg(),
        ..Default::default()
    }
}

#[test]
fn note_on_produces_nonzero_audio_and_note_off_eventually_silences_it() {
    let file = sine_wave_wav(44100);
    let cache = SampleCache::new(WavDecoder);
    let region = loaded_region(&file, &cache);
    let regions = RegionSet::new(vec![region], CurveTable::new());
    let mut dispatcher = Dispatcher::new(4, 64, regions, cache, 44100.0, 44100.0);

    dispatcher.add_event_note_on(0, 0, 60, 100);
    let mut l = vec![0.0f32; 512];
    let mut r = vec![0.0f32; 512];
    dispatcher.render(&mut l, &mut r, 512);
    assert!(l.iter().any(|&s| s != 0.0), "expected non-silent output after NoteOn");
    assert_eq!(dispatcher.pool.active_count(), 1);

    dispatcher.add_event_note_off(0, 0, 60);
    // Long enough to drain a default (near-instant) release envelope.
    for _ in 0..200 {
        dispatcher.render(&mut l, &mut r, 512);
    }
    assert_eq!(dispatcher.pool.active_count(), 0, "voice should have returned to idle after release");
}

#[test]
fn voice_pool_never_exceeds_max_voices() {
    let file = sine_wave_wav(44100);
    let cache = SampleCache::new(WavDecoder);
    let region = loaded_region(&file, &cache);
    let mut dispatcher = single_region_dispatcher(2, region);

    for key in [60u8, 61, 62, 63] {
        dispatcher.add_event_note_on(0, 0, key, 100);
    }
    let mut l = vec![0.0f32; 128];
    let mut r = vec![0.0f32; 128];
    dispatcher.render(&mut l, &mut r, 128);

    assert_eq!(dispatcher.pool.active_count() + dispatcher.pool.idle_count(), dispatcher.pool.max_voices());
    assert!(dispatcher.pool.active_count() <= 2, "pool must never allocate beyond max_voices");
}

#[test]
fn repeated_note_on_on_same_key_releases_the_prior_voice() {
    let file = sine_wave_wav(44100);
    let cache = SampleCache::new(WavDecoder);
    let region = loaded_region(&file, &cache);
    let mut dispatcher = single_region_dispatcher(4, region);

    dispatcher.add_event_note_on(0, 0, 60, 100);
    let mut l = vec![0.0f32; 64];
    let mut r = vec![0.0f32; 64];
    dispatcher.render(&mut l, &mut r, 64);
    assert_eq!(dispatcher.pool.active_count(), 1);

    dispatcher.add_event_note_on(0, 0, 60, 100);
    dispatcher.render(&mut l, &mut r, 64);
    // The first voice was released (not killed), so it may still be
    // draining its release envelope alongside the new one -- but a third
    // retrigger on the same key must never accumulate indefinitely.
    dispatcher.add_event_note_on(0, 0, 60, 100);
    dispatcher.render(&mut l, &mut r, 64);
    assert!(dispatcher.pool.active_count() <= 3);
}

#[test]
fn event_buffer_overflow_does_not_panic() {
    let file = sine_wave_wav(44100);
    let cache = SampleCache::new(WavDecoder);
    let region = loaded_region(&file, &cache);
    let mut dispatcher = single_region_dispatcher(1, region);

    for key in 0..200u16 {
        dispatcher.add_event_note_off(0, 0, (key % 128) as u8);
    }
    let mut l = vec![0.0f32; 64];
    let mut r = vec![0.0f32; 64];
    dispatcher.render(&mut l, &mut r, 64);
}

#[test]
fn out_of_range_region_never_matches() {
    let file = sine_wave_wav(4410);
    let cache = SampleCache::new(WavDecoder);
    let (sample, _preload) = cache.load(file.path(), Preload { time_ms: 0.0, offset: 0 }).unwrap();
    let region = Region { sample: Some(sample), lokey: 70, hikey: 80, ..Default::default() };
    let mut dispatcher = single_region_dispatcher(2, region);

    dispatcher.add_event_note_on(0, 0, 60, 100);
    let mut l = vec![0.0f32; 64];
    let mut r = vec![0.0f32; 64];
    dispatcher.render(&mut l, &mut r, 64);
    assert_eq!(dispatcher.pool.active_count(), 0);
}
