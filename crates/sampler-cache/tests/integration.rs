//! Integration tests for the sample cache's load/stream/playback path.

use sampler_cache::{Preload, SampleCache, WavDecoder};
use tempfile::NamedTempFile;

fn sine_wave_wav(channels: u16, sample_rate: u32, num_frames: usize) -> NamedTempFile {
    let file = NamedTempFile::new().unwrap();
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(file.path(), spec).unwrap();
    for i in 0..num_frames {
        let t = i as f32 / sample_rate as f32;
        let v = (2.0 * std::f32::consts::PI * 440.0 * t).sin();
        for _ in 0..channels {
            writer.write_sample((v * i16::MAX as f32) as i16).unwrap();
        }
    }
    writer.finalize().unwrap();
    file
}

#[test]
fn load_then_playback_reads_back_decoded_frames() {
    let file = sine_wave_wav(1, 44100, 4000);
    let cache = SampleCache::new(WavDecoder);
    let (sample, _preload) = cache.load(file.path(), Preload { time_ms: 50.0, offset: 0 }).unwrap();
    assert_eq!(sample.meta.channels, 1);
    assert_eq!(sample.meta.num_frames, 4000);

    let mut handle = cache.open_playback(&sample, false);
    let mut out = [0.0f32];
    handle.get(0, 1, &mut out);
    assert!(out[0].abs() < 1e-3, "first sample of a sine wave should be near zero, got {}", out[0]);
}

#[test]
fn playback_spans_multiple_segments_without_discontinuity_at_the_boundary() {
    // SEGMENT_FRAMES is 1000; request frames straddling segment 0/1.
    let file = sine_wave_wav(1, 44100, 3000);
    let cache = SampleCache::new(WavDecoder);
    let (sample, _preload) = cache.load(file.path(), Preload { time_ms: 0.0, offset: 0 }).unwrap();
    let mut handle = cache.open_playback(&sample, false);

    let mut expected = [0.0f32; 1];
    let mut actual = [0.0f32; 1];
    for pos in [998u64, 999, 1000, 1001, 1002] {
        handle.get(pos, 1, &mut actual);
        let t = pos as f32 / 44100.0;
        expected[0] = (2.0 * std::f32::consts::PI * 440.0 * t).sin();
        assert!((actual[0] - expected[0]).abs() < 0.01, "pos {pos}: got {}, want {}", actual[0], expected[0]);
    }
}

#[test]
fn stereo_frames_deinterleave_correctly() {
    let file = sine_wave_wav(2, 44100, 2000);
    let cache = SampleCache::new(WavDecoder);
    let (sample, _preload) = cache.load(file.path(), Preload { time_ms: 0.0, offset: 0 }).unwrap();
    assert_eq!(sample.meta.channels, 2);

    let mut handle = cache.open_playback(&sample, false);
    let mut out = [0.0f32; 2];
    handle.get(100, 2, &mut out);
    assert!((out[0] - out[1]).abs() < 1e-6, "mono-sourced stereo file should have equal channels");
}

#[test]
fn missing_file_returns_an_error_instead_of_panicking() {
    let cache = SampleCache::new(WavDecoder);
    let result = cache.load("/nonexistent/path/to/sample.wav", Preload { time_ms: 0.0, offset: 0 });
    assert!(result.is_err());
}

#[test]
fn loading_the_same_path_twice_shares_the_underlying_sample() {
    let file = sine_wave_wav(1, 44100, 1000);
    let cache = SampleCache::new(WavDecoder);
    let (a, _) = cache.load(file.path(), Preload { time_ms: 0.0, offset: 0 }).unwrap();
    let (b, _) = cache.load(file.path(), Preload { time_ms: 0.0, offset: 0 }).unwrap();
    assert!(std::sync::Arc::ptr_eq(&a, &b));
}

#[test]
fn background_loader_can_be_spawned_and_dropped_cleanly() {
    let file = sine_wave_wav(1, 44100, 500);
    let cache = SampleCache::new(WavDecoder);
    let loader = cache.spawn_loader();
    let (sample, _preload) = cache.load(file.path(), Preload { time_ms: 0.0, offset: 0 }).unwrap();
    let mut handle = cache.open_playback(&sample, false);
    let mut out = [0.0f32];
    handle.get(0, 1, &mut out);
    drop(loader);
}
