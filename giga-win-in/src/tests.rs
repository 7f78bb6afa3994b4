use chrono::{Duration, NaiveDate, NaiveDateTime};

use giga_win_core::bits::BitWriter;
use giga_win_core::enums::SampleSize;
use giga_win_core::errors::WinError;
use giga_win_core::headers::{SecondHeader, SubHeader};
use giga_win_core::FRAME_HEADER_LEN;

use crate::frame::{decode_frame_body, FrameCursor};

fn t0() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 9, 21)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

/// Hand-encode one channel sub-record.
fn sub_record(ch: u16, size: SampleSize, samples: &[i64]) -> Vec<u8> {
    let fs = samples.len() as u16;
    let mut out = SubHeader::new(ch, size, fs).as_bytes().unwrap().to_vec();
    let mut bits = BitWriter::new();
    bits.put_int(samples[0], 32).unwrap();
    if size.is_differential() {
        for w in samples.windows(2) {
            bits.put_int(w[1] - w[0], size.bit_step()).unwrap();
        }
    } else {
        for &s in &samples[1..] {
            bits.put_int(s, 32).unwrap();
        }
    }
    let mut payload = bits.into_bytes();
    // Nibble payloads are rounded up to whole bytes by the writer already;
    // make sure the declared length matches.
    payload.resize(size.payload_len(fs), 0);
    out.extend_from_slice(&payload);
    out
}

/// Wrap sub-records into a framed second.
fn frame(time: NaiveDateTime, bodies: &[Vec<u8>]) -> Vec<u8> {
    let body_len: usize = bodies.iter().map(|b| b.len()).sum();
    let header = SecondHeader::new((FRAME_HEADER_LEN + body_len) as u32, time);
    let mut out = header.as_bytes().unwrap().to_vec();
    for b in bodies {
        out.extend_from_slice(b);
    }
    out
}

mod frames {
    use super::*;

    #[test]
    fn cursor_walks_consecutive_frames() {
        let mut data = frame(t0(), &[sub_record(1, SampleSize::OneByte, &[0, 1, 2, 3])]);
        data.extend(frame(
            t0() + Duration::seconds(1),
            &[sub_record(1, SampleSize::OneByte, &[4, 5, 6, 7])],
        ));
        let mut cursor = FrameCursor::new(&data);
        let f1 = cursor.next_frame().unwrap().unwrap();
        assert_eq!(f1.header.time, t0());
        let f2 = cursor.next_frame().unwrap().unwrap();
        assert_eq!(f2.header.time, t0() + Duration::seconds(1));
        assert!(cursor.next_frame().is_none());
    }

    #[test]
    fn truncated_frame_is_malformed() {
        let mut data = frame(t0(), &[sub_record(1, SampleSize::OneByte, &[0, 1, 2, 3])]);
        data.truncate(data.len() - 1);
        let mut cursor = FrameCursor::new(&data);
        assert!(matches!(
            cursor.next_frame().unwrap(),
            Err(WinError::MalformedFrame { .. })
        ));
    }

    #[test]
    fn multi_channel_frame_decodes_every_record() {
        let body = vec![
            sub_record(0x0001, SampleSize::Nibble, &[5, 6, 5, 4, 5]),
            sub_record(0x0002, SampleSize::TwoBytes, &[1000, -1000, 500, -500, 0]),
            sub_record(0x0003, SampleSize::Absolute, &[70_000, -70_000, 0, 1, -1]),
        ];
        let data = frame(t0(), &body);
        let mut cursor = FrameCursor::new(&data);
        let f = cursor.next_frame().unwrap().unwrap();
        let records = decode_frame_body(f.body, None).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].samples, vec![5, 6, 5, 4, 5]);
        assert_eq!(records[1].samples, vec![1000, -1000, 500, -500, 0]);
        assert_eq!(records[2].samples, vec![70_000, -70_000, 0, 1, -1]);
    }

    #[test]
    fn channel_filter_skips_but_still_walks() {
        let body = vec![
            sub_record(0x0001, SampleSize::OneByte, &[0, 1, 2, 3]),
            sub_record(0x0002, SampleSize::OneByte, &[9, 8, 7, 6]),
        ];
        let data = frame(t0(), &body);
        let mut cursor = FrameCursor::new(&data);
        let f = cursor.next_frame().unwrap().unwrap();
        let records = decode_frame_body(f.body, Some(&[0x0002])).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].ch, 0x0002);
        assert_eq!(records[0].samples, vec![9, 8, 7, 6]);
    }

    #[test]
    fn nibble_records_with_even_rates_carry_a_pad() {
        // Even rate: 3 deltas and a pad nibble -> exactly 2 payload bytes.
        let record = sub_record(0x0001, SampleSize::Nibble, &[0, 1, 2, 3]);
        assert_eq!(record.len(), 4 + 4 + 2);
        let data = frame(t0(), &[record]);
        let mut cursor = FrameCursor::new(&data);
        let f = cursor.next_frame().unwrap().unwrap();
        let records = decode_frame_body(f.body, None).unwrap();
        assert_eq!(records[0].samples, vec![0, 1, 2, 3]);
    }

    #[test]
    fn record_longer_than_frame_is_malformed() {
        // Declare a 10 Hz record but only supply 4 samples worth of bytes.
        let mut record = sub_record(0x0001, SampleSize::OneByte, &[0, 1, 2, 3]);
        record[3] = 10;
        let data = frame(t0(), &[record]);
        let mut cursor = FrameCursor::new(&data);
        let f = cursor.next_frame().unwrap().unwrap();
        assert!(matches!(
            decode_frame_body(f.body, None),
            Err(WinError::MalformedFrame { .. })
        ));
    }

    #[test]
    fn accumulator_overflow_is_out_of_range() {
        // Two maximal first differences on top of a maximal first sample
        // push the running sum out of the 32-bit range.
        let mut out = SubHeader::new(1, SampleSize::FourBytes, 3)
            .as_bytes()
            .unwrap()
            .to_vec();
        let mut bits = BitWriter::new();
        bits.put_int(i64::from(i32::MAX), 32).unwrap();
        bits.put_int(i64::from(i32::MAX), 32).unwrap();
        bits.put_int(i64::from(i32::MAX), 32).unwrap();
        out.extend_from_slice(&bits.into_bytes());
        let data = frame(t0(), &[out]);
        let mut cursor = FrameCursor::new(&data);
        let f = cursor.next_frame().unwrap().unwrap();
        assert!(matches!(
            decode_frame_body(f.body, None),
            Err(WinError::OutOfRange { .. })
        ));
    }
}

mod files {
    use super::*;
    use crate::read;
    use giga_win_core::settings::ReadSettings;
    use giga_win_core::{BoundaryPolicy, Channel, WaveSet, WriteSettings};
    use std::io::Write;

    fn write_file(dir: &std::path::Path, name: &str, bytes: &[u8]) -> std::path::PathBuf {
        let path = dir.join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(bytes).unwrap();
        path
    }

    fn two_second_set(ch: u16, start: NaiveDateTime) -> WaveSet {
        let samples: Vec<i64> = (0..200).map(|i| i % 17 - 8).collect();
        let mut set = WaveSet::new();
        set.push(Channel::new(ch, samples, start, 100.0)).unwrap();
        set
    }

    #[test]
    fn multi_file_merge_is_chronological() {
        let dir = tempfile::tempdir().unwrap();
        let a = giga_win_out::to_bytes(&two_second_set(7, t0()), &WriteSettings::default())
            .unwrap();
        let b = giga_win_out::to_bytes(
            &two_second_set(7, t0() + Duration::seconds(2)),
            &WriteSettings::default(),
        )
        .unwrap();
        // Deliberately pass the later file first.
        let p_b = write_file(dir.path(), "b.win", &b);
        let p_a = write_file(dir.path(), "a.win", &a);

        let set = read(&[p_b, p_a], &ReadSettings::default()).unwrap();
        assert_eq!(set.len(), 1);
        let c = set.get(7).unwrap();
        assert_eq!(c.len(), 400);
        assert_eq!(c.starttime().unwrap(), t0());
        assert_eq!(
            c.endtime().unwrap(),
            t0() + Duration::seconds(4) - Duration::milliseconds(10)
        );
        assert!((c.fs().unwrap() - 100.0).abs() < 1e-9);
    }

    #[test]
    fn unreadable_file_is_skipped_with_a_gap() {
        let dir = tempfile::tempdir().unwrap();
        let a = giga_win_out::to_bytes(&two_second_set(7, t0()), &WriteSettings::default())
            .unwrap();
        let c = giga_win_out::to_bytes(
            &two_second_set(7, t0() + Duration::seconds(4)),
            &WriteSettings::default(),
        )
        .unwrap();
        let p_a = write_file(dir.path(), "a.win", &a);
        let p_bad = write_file(dir.path(), "bad.win", &[0xFF; 40]);
        let p_c = write_file(dir.path(), "c.win", &c);

        let set = read(&[p_a, p_bad, p_c], &ReadSettings::default()).unwrap();
        let channel = set.get(7).unwrap();
        // Both good files made it in; the hole between them remains.
        assert_eq!(channel.len(), 400);
        assert!(matches!(channel.dt(), Err(WinError::NonUniformRate)));
    }

    #[test]
    fn single_unreadable_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let p_bad = write_file(dir.path(), "bad.win", &[0xFF; 40]);
        assert!(read(&[p_bad], &ReadSettings::default()).is_err());
    }

    #[test]
    fn overlapping_files_drop_duplicate_seconds() {
        let dir = tempfile::tempdir().unwrap();
        let a = giga_win_out::to_bytes(&two_second_set(7, t0()), &WriteSettings::default())
            .unwrap();
        let b = giga_win_out::to_bytes(
            &two_second_set(7, t0() + Duration::seconds(1)),
            &WriteSettings::default(),
        )
        .unwrap();
        let p_a = write_file(dir.path(), "a.win", &a);
        let p_b = write_file(dir.path(), "b.win", &b);

        let set = read(&[p_a, p_b], &ReadSettings::default()).unwrap();
        let c = set.get(7).unwrap();
        // 0..2 s from the first file, the overlapping second dropped, and
        // the trailing second of the second file appended.
        assert_eq!(c.len(), 300);
        assert!((c.fs().unwrap() - 100.0).abs() < 1e-9);
    }

    #[test]
    fn window_read_with_target_time() {
        let dir = tempfile::tempdir().unwrap();
        let bytes = giga_win_out::to_bytes(
            &{
                let samples: Vec<i64> = (0..1000).map(|i| i % 11).collect();
                let mut set = WaveSet::new();
                set.push(Channel::new(7, samples, t0(), 100.0)).unwrap();
                set
            },
            &WriteSettings {
                boundary: BoundaryPolicy::Cut,
                ..Default::default()
            },
        )
        .unwrap();
        let path = write_file(dir.path(), "long.win", &bytes);

        let mut settings = ReadSettings::default();
        settings.targettime = Some(t0() + Duration::seconds(5));
        settings.beforesec = Some(1.0);
        settings.aftersec = Some(2.0);
        let set = read(&[path], &settings).unwrap();
        let c = set.get(7).unwrap();
        assert_eq!(c.starttime().unwrap(), t0() + Duration::seconds(4));
        // End is exclusive.
        assert_eq!(
            c.endtime().unwrap(),
            t0() + Duration::seconds(7) - Duration::milliseconds(10)
        );
        assert_eq!(c.len(), 300);
    }

    #[test]
    fn channel_filter_limits_the_set() {
        let dir = tempfile::tempdir().unwrap();
        let mut set = two_second_set(1, t0());
        set.push(Channel::new(
            2,
            (0..200).map(|i| i % 5).collect::<Vec<i64>>(),
            t0(),
            100.0,
        ))
        .unwrap();
        let bytes = giga_win_out::to_bytes(&set, &WriteSettings::default()).unwrap();
        let path = write_file(dir.path(), "two.win", &bytes);

        let mut settings = ReadSettings::default();
        settings.channels = Some(vec![2]);
        let out = read(&[path], &settings).unwrap();
        assert_eq!(out.chs(), vec![2]);
    }

    #[test]
    fn cancellation_aborts_between_frames() {
        let dir = tempfile::tempdir().unwrap();
        let bytes = giga_win_out::to_bytes(&two_second_set(1, t0()), &WriteSettings::default())
            .unwrap();
        let path = write_file(dir.path(), "c.win", &bytes);

        let settings = ReadSettings::default();
        settings.cancel.cancel();
        assert!(matches!(
            read(&[path], &settings),
            Err(WinError::Cancelled)
        ));
    }

    #[test]
    fn auto_chtable_is_bound_for_single_files() {
        let dir = tempfile::tempdir().unwrap();
        let bytes = giga_win_out::to_bytes(&two_second_set(1, t0()), &WriteSettings::default())
            .unwrap();
        let path = write_file(dir.path(), "x.win", &bytes);
        write_file(
            dir.path(),
            "x.win.ch",
            b"0001 1 0 ASO NS 3 20 2.0 m/s 1 1 0 1 36.6 139.4 720 0 0\n",
        );

        let set = read(&[path], &ReadSettings::default()).unwrap();
        let c = set.get(1).unwrap();
        assert_eq!(c.params.station.as_deref(), Some("ASO"));
        assert!((c.params.sensitivity - 2.0).abs() < 1e-12);
    }
}
