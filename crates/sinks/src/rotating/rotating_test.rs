use super::*;
use crate::util::ManualClock;
use chrono::{DateTime, Local, TimeZone};
use flate2::read::MultiGzDecoder;
use std::io::{self, Read, Write};
use tempfile::TempDir;

fn at(hour: u32, minute: u32) -> DateTime<Local> {
    Local
        .with_ymd_and_hms(2024, 1, 1, hour, minute, 0)
        .single()
        .unwrap()
}

fn decode(path: &Path) -> String {
    let bytes = std::fs::read(path).unwrap();
    let mut out = String::new();
    MultiGzDecoder::new(&bytes[..])
        .read_to_string(&mut out)
        .unwrap();
    out
}

/// Console that keeps everything written to it
#[derive(Clone, Default)]
struct CapturedConsole(Arc<parking_lot::Mutex<Vec<u8>>>);

impl CapturedConsole {
    fn contents(&self) -> String {
        String::from_utf8(self.0.lock().clone()).unwrap()
    }
}

impl Write for CapturedConsole {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Console whose every write fails with the given error kind
struct FailingConsole(io::ErrorKind);

impl Write for FailingConsole {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Err(io::Error::from(self.0))
    }

    fn flush(&mut self) -> io::Result<()> {
        Err(io::Error::from(self.0))
    }
}

fn sink_at(dir: &Path, time: DateTime<Local>) -> (RotatingSink, Arc<ManualClock>) {
    sink_with(RotatingConfig::default().with_path(dir), time)
}

fn sink_with(config: RotatingConfig, time: DateTime<Local>) -> (RotatingSink, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::with_time(time));
    let sink = RotatingSink::with_clock(config, clock.clone())
        .with_error_logger(RateLimitedLogger::new(Duration::ZERO));
    (sink, clock)
}

// =============================================================================
// Config tests
// =============================================================================

#[test]
fn test_config_defaults() {
    let config = RotatingConfig::default();
    assert_eq!(config.path, PathBuf::from("data"));
    assert_eq!(
        config.compression,
        Compression::Gzip {
            level: DEFAULT_GZIP_LEVEL
        }
    );
    assert_eq!(config.buffer_size, DEFAULT_BUFFER_SIZE);
    assert!(!config.echo);
    assert!(config.flush_interval.is_none());
}

#[test]
fn test_config_chained_builders() {
    let config = RotatingConfig::default()
        .with_path("/data/statuses")
        .with_compression(Compression::None)
        .with_echo(true)
        .with_flush_interval(Duration::from_secs(1));

    assert_eq!(config.path, PathBuf::from("/data/statuses"));
    assert_eq!(config.compression, Compression::None);
    assert!(config.echo);
    assert_eq!(config.flush_interval, Some(Duration::from_secs(1)));
}

#[test]
fn test_summary_display() {
    let summary = RotationSummary {
        bucket: "2024.01.01_09".into(),
        file_name: "2024.01.01_09.gz".into(),
        records: 1,
    };
    assert_eq!(summary.to_string(), "#records=1 in 2024.01.01_09.gz");
}

// =============================================================================
// Rotation tests
// =============================================================================

#[test]
fn test_same_bucket_single_file_in_order() {
    let dir = TempDir::new().unwrap();
    let (mut sink, clock) = sink_at(dir.path(), at(9, 5));

    assert_eq!(sink.write("r1").unwrap(), None);
    clock.set_time(at(9, 55));
    assert_eq!(sink.write("r2").unwrap(), None);

    assert_eq!(sink.current_bucket(), Some("2024.01.01_09"));
    assert_eq!(sink.current_records(), 2);

    let summary = sink.close().unwrap();
    assert_eq!(summary.records, 2);

    let path = dir.path().join("2024.01.01_09.gz");
    assert_eq!(decode(&path), "r1\nr2\n");
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
}

#[test]
fn test_bucket_change_closes_previous_file_first() {
    let dir = TempDir::new().unwrap();
    let (mut sink, clock) = sink_at(dir.path(), at(9, 59));

    sink.write("r1").unwrap();

    clock.set_time(at(10, 0));
    let summary = sink.write("r2").unwrap().expect("rotation summary");
    assert_eq!(summary.bucket, "2024.01.01_09");
    assert_eq!(summary.to_string(), "#records=1 in 2024.01.01_09.gz");

    // Previous file is complete before the sink is closed
    assert_eq!(decode(&dir.path().join("2024.01.01_09.gz")), "r1\n");
    assert_eq!(sink.current_bucket(), Some("2024.01.01_10"));
    assert_eq!(sink.current_records(), 1);

    sink.close();
    assert_eq!(decode(&dir.path().join("2024.01.01_10.gz")), "r2\n");
    assert_eq!(sink.metrics().snapshot().rotations, 1);
}

#[test]
fn test_restart_within_bucket_appends() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("2024.01.01_09.gz");

    {
        let (mut sink, _clock) = sink_at(dir.path(), at(9, 10));
        sink.write("before-1").unwrap();
        sink.write("before-2").unwrap();
    }

    let (mut sink, _clock) = sink_at(dir.path(), at(9, 40));
    sink.write("after-1").unwrap();

    // Counter restarts with the process
    let summary = sink.close().unwrap();
    assert_eq!(summary.records, 1);

    assert_eq!(decode(&path), "before-1\nbefore-2\nafter-1\n");
}

#[test]
fn test_clock_moving_back_reopens_earlier_bucket() {
    let dir = TempDir::new().unwrap();
    let (mut sink, clock) = sink_at(dir.path(), at(9, 59));

    sink.write("a").unwrap();
    clock.set_time(at(10, 0));
    sink.write("b").unwrap();
    clock.set_time(at(9, 59));
    let summary = sink.write("c").unwrap().unwrap();
    assert_eq!(summary.bucket, "2024.01.01_10");
    sink.close();

    assert_eq!(decode(&dir.path().join("2024.01.01_09.gz")), "a\nc\n");
    assert_eq!(decode(&dir.path().join("2024.01.01_10.gz")), "b\n");
}

#[test]
fn test_roundtrip_exact_text() {
    let dir = TempDir::new().unwrap();
    let (mut sink, _clock) = sink_at(dir.path(), at(9, 0));

    let records = [
        r#"{"id_str":"1","text":"café 🐦"}"#,
        "{\"id_str\":\"2\",\"text\":\"naïve 🐦\"}",
        r#"{"id_str":"3","text":"tab\there"}"#,
    ];
    for record in records {
        sink.write(record).unwrap();
    }
    sink.close();

    let decoded = decode(&dir.path().join("2024.01.01_09.gz"));
    let lines: Vec<&str> = decoded.lines().collect();
    assert_eq!(lines, records);
}

#[test]
fn test_trailing_line_terminators_are_not_doubled() {
    let dir = TempDir::new().unwrap();
    let (mut sink, _clock) = sink_at(dir.path(), at(9, 0));

    sink.write("{\"id\":1}\r\n").unwrap();
    sink.write("{\"id\":2}\n").unwrap();
    sink.close();

    assert_eq!(
        decode(&dir.path().join("2024.01.01_09.gz")),
        "{\"id\":1}\n{\"id\":2}\n"
    );
}

// =============================================================================
// Failure handling
// =============================================================================

#[test]
fn test_open_failure_drops_record_then_recovers() {
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("missing");
    let (mut sink, _clock) = sink_at(&out, at(9, 0));

    let err = sink.write("lost").unwrap_err();
    assert!(matches!(err, SinkError::Open { .. }));
    assert_eq!(sink.current_bucket(), None);

    std::fs::create_dir_all(&out).unwrap();
    sink.write("kept").unwrap();
    sink.close();

    assert_eq!(decode(&out.join("2024.01.01_09.gz")), "kept\n");

    let s = sink.metrics().snapshot();
    assert_eq!(s.records_received, 2);
    assert_eq!(s.records_written, 1);
    assert_eq!(s.records_dropped, 1);
    assert_eq!(s.open_errors, 1);
}

#[test]
fn test_open_failure_after_rotation_keeps_trying() {
    let dir = TempDir::new().unwrap();
    let (mut sink, clock) = sink_at(dir.path(), at(9, 30));
    sink.write("r1").unwrap();

    // Next bucket's path is occupied by a directory
    std::fs::create_dir(dir.path().join("2024.01.01_10.gz")).unwrap();
    clock.set_time(at(10, 1));
    assert!(sink.write("r2").is_err());
    assert_eq!(sink.current_bucket(), None);

    // The closed file is intact
    assert_eq!(decode(&dir.path().join("2024.01.01_09.gz")), "r1\n");

    clock.set_time(at(11, 0));
    sink.write("r3").unwrap();
    sink.close();
    assert_eq!(decode(&dir.path().join("2024.01.01_11.gz")), "r3\n");
}

// =============================================================================
// Lifecycle
// =============================================================================

#[test]
fn test_close_without_open_file() {
    let dir = TempDir::new().unwrap();
    let (mut sink, _clock) = sink_at(dir.path(), at(9, 0));
    assert!(sink.close().is_none());
}

#[test]
fn test_close_twice() {
    let dir = TempDir::new().unwrap();
    let (mut sink, _clock) = sink_at(dir.path(), at(9, 0));
    sink.write("r1").unwrap();
    assert!(sink.close().is_some());
    assert!(sink.close().is_none());
}

#[test]
fn test_drop_flushes_and_closes() {
    let dir = TempDir::new().unwrap();
    {
        let (mut sink, _clock) = sink_at(dir.path(), at(9, 0));
        sink.write("r1").unwrap();
        sink.flush();
    }
    assert_eq!(decode(&dir.path().join("2024.01.01_09.gz")), "r1\n");
}

#[test]
fn test_uncompressed_output() {
    let dir = TempDir::new().unwrap();
    let clock = Arc::new(ManualClock::with_time(at(9, 0)));
    let config = RotatingConfig::default()
        .with_path(dir.path())
        .with_compression(Compression::None);
    let mut sink = RotatingSink::with_clock(config, clock);

    sink.write("r1").unwrap();
    sink.close();

    let path = sink.bucket_path("2024.01.01_09");
    assert_eq!(path, dir.path().join("2024.01.01_09.jsonl"));
    assert_eq!(std::fs::read_to_string(path).unwrap(), "r1\n");
}

#[test]
fn test_echo_does_not_change_file() {
    let dir = TempDir::new().unwrap();
    let clock = Arc::new(ManualClock::with_time(at(9, 0)));
    let config = RotatingConfig::default()
        .with_path(dir.path())
        .with_echo(true);
    let mut sink = RotatingSink::with_clock(config, clock);

    sink.write("r1").unwrap();
    sink.close();

    assert_eq!(decode(&dir.path().join("2024.01.01_09.gz")), "r1\n");
}

#[tokio::test]
async fn test_run_drains_channel_and_closes() {
    let dir = TempDir::new().unwrap();
    let (sink, _clock) = sink_at(dir.path(), at(9, 0));
    let metrics = sink.metrics_handle();

    let (tx, rx) = mpsc::channel(16);
    let handle = tokio::spawn(sink.run(rx));

    for i in 0..100 {
        tx.send(format!("{{\"id\":{i}}}")).await.unwrap();
    }
    drop(tx);

    let snapshot = handle.await.unwrap();
    assert_eq!(snapshot.records_written, 100);
    assert_eq!(metrics.snapshot(), snapshot);

    let decoded = decode(&dir.path().join("2024.01.01_09.gz"));
    let lines: Vec<&str> = decoded.lines().collect();
    assert_eq!(lines.len(), 100);
    assert_eq!(lines[0], "{\"id\":0}");
    assert_eq!(lines[99], "{\"id\":99}");
}

#[tokio::test]
async fn test_run_with_flush_interval() {
    let dir = TempDir::new().unwrap();
    let clock = Arc::new(ManualClock::with_time(at(9, 0)));
    let config = RotatingConfig::default()
        .with_path(dir.path())
        .with_flush_interval(Duration::from_millis(5));
    let sink = RotatingSink::with_clock(config, clock);

    let (tx, rx) = mpsc::channel(16);
    let handle = tokio::spawn(sink.run(rx));

    tx.send("r1".to_string()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    tx.send("r2".to_string()).await.unwrap();
    drop(tx);

    handle.await.unwrap();
    assert_eq!(decode(&dir.path().join("2024.01.01_09.gz")), "r1\nr2\n");
}

#[test]
fn test_ensure_path_creates_parents() {
    let dir = TempDir::new().unwrap();
    let nested = dir.path().join("a").join("b").join("c");
    let config = RotatingConfig::default().with_path(&nested);

    config.ensure_path().unwrap();
    assert!(nested.is_dir());

    // Existing directory is fine
    config.ensure_path().unwrap();
}

#[test]
fn test_ensure_path_fails_on_file() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("occupied");
    std::fs::write(&file, b"x").unwrap();

    let err = RotatingConfig::default()
        .with_path(&file)
        .ensure_path()
        .unwrap_err();
    assert!(matches!(err, SinkError::CreateDir { .. }));
}

// =============================================================================
// Console output
// =============================================================================

#[test]
fn test_summary_and_echo_go_to_console() {
    let dir = TempDir::new().unwrap();
    let console = CapturedConsole::default();
    let config = RotatingConfig::default().with_path(dir.path()).with_echo(true);
    let (sink, clock) = sink_with(config, at(9, 59));
    let mut sink = sink.with_console(Box::new(console.clone()));

    sink.write("r1").unwrap();
    clock.set_time(at(10, 0));
    sink.write("r2").unwrap();
    sink.close();

    assert_eq!(
        console.contents(),
        "r1\n#records=1 in 2024.01.01_09.gz\nr2\n#records=1 in 2024.01.01_10.gz\n"
    );
}

#[test]
fn test_broken_console_does_not_fail_records() {
    let dir = TempDir::new().unwrap();
    let config = RotatingConfig::default().with_path(dir.path()).with_echo(true);
    let (sink, clock) = sink_with(config, at(9, 59));
    let mut sink = sink.with_console(Box::new(FailingConsole(io::ErrorKind::BrokenPipe)));

    sink.write("r1").unwrap();
    assert!(!sink.console_enabled());

    clock.set_time(at(10, 0));
    let summary = sink.write("r2").unwrap().expect("rotation summary");
    assert_eq!(summary.records, 1);

    // Closing on drop must not touch the broken console
    drop(sink);

    assert_eq!(decode(&dir.path().join("2024.01.01_09.gz")), "r1\n");
    assert_eq!(decode(&dir.path().join("2024.01.01_10.gz")), "r2\n");
}

#[test]
fn test_summary_with_failing_console_on_close() {
    let dir = TempDir::new().unwrap();
    let (sink, _clock) = sink_at(dir.path(), at(9, 0));
    let mut sink = sink.with_console(Box::new(FailingConsole(io::ErrorKind::BrokenPipe)));

    sink.write("r1").unwrap();
    assert!(sink.console_enabled());

    let summary = sink.close().unwrap();
    assert_eq!(summary.records, 1);
    assert!(!sink.console_enabled());
    assert_eq!(decode(&dir.path().join("2024.01.01_09.gz")), "r1\n");
}

#[test]
fn test_other_console_errors_keep_console() {
    let dir = TempDir::new().unwrap();
    let config = RotatingConfig::default().with_path(dir.path()).with_echo(true);
    let (sink, _clock) = sink_with(config, at(9, 0));
    let mut sink = sink.with_console(Box::new(FailingConsole(io::ErrorKind::PermissionDenied)));

    sink.write("r1").unwrap();
    sink.write("r2").unwrap();
    assert!(sink.console_enabled());
    assert_eq!(sink.metrics().snapshot().records_written, 2);
}

#[cfg(unix)]
#[test]
fn test_write_failure_drops_record_then_recovers() {
    let dir = TempDir::new().unwrap();
    std::os::unix::fs::symlink("/dev/full", dir.path().join("2024.01.01_09.gz")).unwrap();

    let console = CapturedConsole::default();
    // Unbuffered, so the first write reaches the full device
    let mut config = RotatingConfig::default().with_path(dir.path());
    config.buffer_size = 1;
    let (sink, clock) = sink_with(config, at(9, 0));
    let mut sink = sink.with_console(Box::new(console.clone()));

    for record in ["a", "b", "c"] {
        let err = sink.write(record).unwrap_err();
        assert!(matches!(err, SinkError::Write { .. }));
        assert_eq!(sink.current_bucket(), None);
    }

    // Discarded handles print no summary
    assert_eq!(console.contents(), "");

    clock.set_time(at(10, 0));
    assert_eq!(sink.write("d").unwrap(), None);
    sink.close();

    assert_eq!(decode(&dir.path().join("2024.01.01_10.gz")), "d\n");
    assert_eq!(console.contents(), "#records=1 in 2024.01.01_10.gz\n");

    let s = sink.metrics().snapshot();
    assert_eq!(s.records_received, 4);
    assert_eq!(s.records_written, 1);
    assert_eq!(s.records_dropped, 3);
    assert_eq!(s.write_errors, 3);
    assert_eq!(s.open_errors, 0);
    assert_eq!(s.rotations, 1);
}

#[test]
fn test_rotation_counted_after_open_failure() {
    let dir = TempDir::new().unwrap();
    let (mut sink, clock) = sink_at(dir.path(), at(9, 30));
    sink.write("r1").unwrap();

    std::fs::create_dir(dir.path().join("2024.01.01_10.gz")).unwrap();
    clock.set_time(at(10, 1));
    assert!(sink.write("r2").is_err());
    assert!(sink.write("r3").is_err());

    clock.set_time(at(11, 0));
    sink.write("r4").unwrap();

    assert_eq!(sink.metrics().snapshot().rotations, 2);
}
