// Copyright (C) 2022 by GiGa infosystems
use chrono::{Duration, NaiveDate, NaiveDateTime};

use giga_win_core::channel::Samples;
use giga_win_core::errors::WinError;
use giga_win_core::settings::ReadSettings;
use giga_win_core::{BoundaryPolicy, Channel, SampleSize, WaveSet, WriteSettings};

use giga_win_in::frame::{decode_frame_body, FrameCursor};

use crate::{to_bytes, write, write_channel};

fn t0() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 9, 21)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

fn sine(amp: f64, freq: f64, fs: f64, n: usize) -> Vec<i64> {
    (0..n)
        .map(|i| (amp * (2.0 * std::f64::consts::PI * freq * i as f64 / fs).sin()).round() as i64)
        .collect()
}

fn single(ch: u16, samples: Vec<i64>, start: NaiveDateTime, fs: f64) -> WaveSet {
    let mut set = WaveSet::new();
    set.push(Channel::new(ch, samples, start, fs)).unwrap();
    set
}

/// Decode the emitted bytes in memory, frame by frame.
fn decode(bytes: &[u8]) -> Vec<(NaiveDateTime, Vec<giga_win_in::frame::SubRecord>)> {
    let mut cursor = FrameCursor::new(bytes);
    let mut out = Vec::new();
    while let Some(frame) = cursor.next_frame() {
        let frame = frame.unwrap();
        out.push((frame.header.time, decode_frame_body(frame.body, None).unwrap()));
    }
    out
}

#[test]
fn sine_round_trip_is_lossless() {
    let samples = sine(1000.0, 5.0, 100.0, 200);
    let set = single(0x0010, samples.clone(), t0(), 100.0);
    let bytes = to_bytes(&set, &WriteSettings::default()).unwrap();

    let frames = decode(&bytes);
    assert_eq!(frames.len(), 2);
    assert_eq!(frames[0].0, t0());
    assert_eq!(frames[1].0, t0() + Duration::seconds(1));

    let mut decoded = Vec::new();
    for (_, records) in &frames {
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].ch, 0x0010);
        assert_eq!(records[0].fs, 100);
        decoded.extend_from_slice(&records[0].samples);
    }
    assert_eq!(decoded, samples);

    // A 1000-count 5 Hz sine at 100 Hz swings by up to ~313 counts per
    // sample, so the two-byte code is the smallest that fits.
    assert_eq!(bytes[12] >> 4, SampleSize::TwoBytes.code());
}

#[test]
fn gentle_sine_fits_one_byte_deltas() {
    let samples = sine(300.0, 5.0, 100.0, 100);
    let bytes = to_bytes(&single(1, samples, t0(), 100.0), &WriteSettings::default()).unwrap();
    assert_eq!(bytes[12] >> 4, SampleSize::OneByte.code());
}

#[test]
fn per_second_widths_are_independent() {
    // A quiet first second and a wild second one: each frame gets its own
    // smallest satisfying code.
    let mut samples = vec![0i64; 100];
    samples.extend((0..100).map(|i| i * 1000));
    let bytes = to_bytes(&single(1, samples, t0(), 100.0), &WriteSettings::default()).unwrap();
    let frames = decode(&bytes);
    assert_eq!(frames.len(), 2);

    // Parse the W nibble of each frame's first sub-record.
    let mut cursor = FrameCursor::new(&bytes);
    let f1 = cursor.next_frame().unwrap().unwrap();
    assert_eq!(f1.body[2] >> 4, SampleSize::Nibble.code());
    let f2 = cursor.next_frame().unwrap().unwrap();
    assert_eq!(f2.body[2] >> 4, SampleSize::TwoBytes.code());
}

#[test]
fn multi_channel_frame_layout_and_length() {
    let mut set = WaveSet::new();
    // Alternating +-1 keeps nibble deltas.
    set.push(Channel::new(
        0x0001,
        (0..100).map(|i| i % 2).collect::<Vec<i64>>(),
        t0(),
        100.0,
    ))
    .unwrap();
    // ~100-count steps need one byte.
    set.push(Channel::new(
        0x0002,
        (0..100).map(|i| (i % 2) * 100).collect::<Vec<i64>>(),
        t0(),
        100.0,
    ))
    .unwrap();
    // ~100k-count steps need three bytes.
    set.push(Channel::new(
        0x0003,
        (0..100).map(|i| (i % 2) * 100_000).collect::<Vec<i64>>(),
        t0(),
        100.0,
    ))
    .unwrap();

    let bytes = to_bytes(&set, &WriteSettings::default()).unwrap();

    // One frame: header + (4 + 54) + (4 + 103) + (4 + 301) bytes.
    let expect = 10
        + 4
        + SampleSize::Nibble.payload_len(100)
        + 4
        + SampleSize::OneByte.payload_len(100)
        + 4
        + SampleSize::ThreeBytes.payload_len(100);
    assert_eq!(expect, 480);
    assert_eq!(bytes.len(), expect);

    // The length field covers the whole frame.
    let declared = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    assert_eq!(declared as usize, expect);

    let frames = decode(&bytes);
    let records = &frames[0].1;
    assert_eq!(records.len(), 3);
    // Ascending channel-id order inside the frame.
    assert_eq!(records[0].ch, 0x0001);
    assert_eq!(records[1].ch, 0x0002);
    assert_eq!(records[2].ch, 0x0003);
}

#[test]
fn channels_are_ordered_by_id_regardless_of_insertion() {
    let mut set = WaveSet::new();
    set.push(Channel::new(0x0B, vec![0i64; 10], t0(), 10.0))
        .unwrap();
    set.push(Channel::new(0x0A, vec![0i64; 10], t0(), 10.0))
        .unwrap();
    let bytes = to_bytes(&set, &WriteSettings::default()).unwrap();
    let frames = decode(&bytes);
    assert_eq!(frames[0].1[0].ch, 0x0A);
    assert_eq!(frames[0].1[1].ch, 0x0B);
}

#[test]
fn wide_amplitude_with_small_differences_uses_two_bytes() {
    // Samples span +-2^20 but consecutive steps stay within 16 bits.
    let samples: Vec<i64> = (0..100).map(|i| -(1 << 20) + i * 22_000).collect();
    assert!(samples.iter().any(|&s| s > 1 << 20));
    let bytes = to_bytes(&single(1, samples.clone(), t0(), 100.0), &WriteSettings::default())
        .unwrap();
    assert_eq!(bytes[12] >> 4, SampleSize::TwoBytes.code());
    let frames = decode(&bytes);
    assert_eq!(frames[0].1[0].samples, samples);
}

#[test]
fn cut_boundary_emits_only_whole_seconds() {
    // 00.400 .. 02.990 at 100 Hz: seconds 01 and 02 survive.
    let start = t0() + Duration::milliseconds(400);
    let set = single(7, (0..260).collect(), start, 100.0);
    let settings = WriteSettings {
        boundary: BoundaryPolicy::Cut,
        ..Default::default()
    };
    let bytes = to_bytes(&set, &settings).unwrap();
    let frames = decode(&bytes);
    assert_eq!(frames.len(), 2);
    assert_eq!(frames[0].0, t0() + Duration::seconds(1));
    assert_eq!(frames[1].0, t0() + Duration::seconds(2));
    assert_eq!(frames[0].1[0].samples.len(), 100);
    assert_eq!(frames[1].1[0].samples.len(), 100);
    assert_eq!(frames[0].1[0].samples[0], 60);
}

#[test]
fn zero_pad_boundary_extends_to_enclosing_seconds() {
    // 00.400 .. 02.590 at 100 Hz: three frames, zeros on both flanks.
    let start = t0() + Duration::milliseconds(400);
    let set = single(7, (1..=220).collect(), start, 100.0);
    let settings = WriteSettings {
        boundary: BoundaryPolicy::ZeroPad,
        ..Default::default()
    };
    let bytes = to_bytes(&set, &settings).unwrap();
    let frames = decode(&bytes);
    assert_eq!(frames.len(), 3);
    assert_eq!(frames[0].0, t0());
    let first = &frames[0].1[0].samples;
    assert_eq!(first[..40], vec![0; 40][..]);
    assert_eq!(first[40], 1);
    let last = &frames[2].1[0].samples;
    assert_eq!(last[59], 220);
    assert_eq!(last[60..], vec![0; 40][..]);
}

#[test]
fn pad_boundary_repeats_edge_samples() {
    let start = t0() + Duration::milliseconds(400);
    let set = single(7, (1..=220).collect(), start, 100.0);
    let settings = WriteSettings {
        boundary: BoundaryPolicy::Pad,
        ..Default::default()
    };
    let bytes = to_bytes(&set, &settings).unwrap();
    let frames = decode(&bytes);
    assert_eq!(frames[0].1[0].samples[..40], vec![1; 40][..]);
    assert_eq!(frames[2].1[0].samples[60..], vec![220; 40][..]);
}

#[test]
fn explicit_width_override() {
    let samples: Vec<i64> = (0..100).map(|i| i * 500).collect();
    // Nibble deltas cannot hold steps of 500.
    let narrow = WriteSettings {
        sample_size: Some(SampleSize::Nibble),
        ..Default::default()
    };
    assert!(matches!(
        to_bytes(&single(1, samples.clone(), t0(), 100.0), &narrow),
        Err(WinError::InsufficientWidth { size: 0, .. })
    ));

    // Absolute storage always works for 32-bit data and round-trips.
    let absolute = WriteSettings {
        sample_size: Some(SampleSize::Absolute),
        ..Default::default()
    };
    let bytes = to_bytes(&single(1, samples.clone(), t0(), 100.0), &absolute).unwrap();
    assert_eq!(bytes[12] >> 4, SampleSize::Absolute.code());
    let frames = decode(&bytes);
    assert_eq!(frames[0].1[0].samples, samples);
}

#[test]
fn file_round_trip_preserves_samples_and_times() {
    let dir = tempfile::tempdir().expect("Couldn't get tempfile.");
    let path = dir.path().join("roundtrip.win");

    let samples = sine(8000.0, 2.0, 100.0, 500);
    let start = t0() + Duration::milliseconds(400);
    let channel = Channel::new(0x0010, samples, start, 100.0);
    write_channel(&path, &channel, &WriteSettings::default()).unwrap();

    let set = giga_win_in::read(&[&path], &ReadSettings::default()).unwrap();
    let back = set.get(0x0010).unwrap();

    // Cut boundary: the decoded window is the largest whole-second window
    // inside the input.
    let expect = channel
        .trim(
            Some(t0() + Duration::seconds(1)),
            Some(t0() + Duration::seconds(5)),
            false,
        )
        .unwrap();
    assert_eq!(back.len(), expect.len());
    assert_eq!(back.time, expect.time);
    match (&back.data, &expect.data) {
        (Samples::Counts(a), Samples::Counts(b)) => assert_eq!(a, b),
        _ => panic!("expected integer counts on both sides"),
    }

    // Uniform sample spacing all the way through.
    let dt = back.dt().unwrap();
    assert!((dt - 0.01).abs() < 1e-12);
    for (i, t) in back.time.iter().enumerate() {
        assert_eq!(
            *t,
            back.starttime().unwrap() + Duration::milliseconds(10 * i as i64)
        );
    }
}

#[test]
fn write_refuses_to_overwrite_without_permission() {
    let dir = tempfile::tempdir().expect("Couldn't get tempfile.");
    let path = dir.path().join("existing.win");
    std::fs::write(&path, b"something else").unwrap();

    let set = single(1, vec![0; 100], t0(), 100.0);
    assert!(matches!(
        write(&path, &set, &WriteSettings::default()),
        Err(WinError::FileExists { .. })
    ));

    let allow = WriteSettings {
        overwrite: true,
        ..Default::default()
    };
    write(&path, &set, &allow).unwrap();
    let back = giga_win_in::read(&[&path], &ReadSettings::default()).unwrap();
    assert_eq!(back.len(), 1);
}

#[test]
fn float_channels_are_scaled_into_counts() {
    let data: Vec<f64> = (0..100)
        .map(|i| 1.5 * (2.0 * std::f64::consts::PI * 3.0 * i as f64 / 100.0).sin())
        .collect();
    let channel = Channel::new(9, data, t0(), 100.0);
    let bytes = to_bytes(
        &{
            let mut s = WaveSet::new();
            s.push(channel.clone()).unwrap();
            s
        },
        &WriteSettings::default(),
    )
    .unwrap();

    let expect = channel.to_counts().unwrap();
    let frames = decode(&bytes);
    match &expect.data {
        Samples::Counts(v) => assert_eq!(&frames[0].1[0].samples, v),
        _ => panic!("expected counts"),
    }
}

#[test]
fn empty_sets_and_channels_are_rejected() {
    assert!(matches!(
        to_bytes(&WaveSet::new(), &WriteSettings::default()),
        Err(WinError::EmptyRange { .. })
    ));
}

#[test]
fn cancellation_aborts_between_seconds() {
    let set = single(1, (0..500).collect(), t0(), 100.0);
    let settings = WriteSettings::default();
    settings.cancel.cancel();
    assert!(matches!(
        to_bytes(&set, &settings),
        Err(WinError::Cancelled)
    ));
}
