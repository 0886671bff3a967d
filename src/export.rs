use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use chrono::{DateTime, Local, TimeDelta};
use csv::{Terminator, WriterBuilder};

use crate::error::ExportError;
use crate::ping::ExportRows;

pub const CSV_HEADER: [&str; 5] = [
    "Timestamp",
    "Elapsed_Time_Seconds",
    "Ping_Time_MS",
    "Target_Host",
    "Test_Start_Time",
];

pub fn default_file_name(now: DateTime<Local>) -> String {
    format!("ping_data_{}.csv", now.format("%Y%m%d_%H%M%S"))
}

/// Writes one row per sample followed by a summary block, and hands the
/// writer back. Records end in `\r\n`, blank separator line included.
pub fn write_csv<W: Write>(
    out: W,
    rows: &ExportRows,
    target: &str,
    started_at: Option<DateTime<Local>>,
) -> Result<W, ExportError> {
    let target_host = match target.trim() {
        "" => "Unknown",
        host => host,
    };
    let start_time = started_at
        .map(|start| start.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "Unknown".to_string());

    let mut writer = csv_writer(out);
    writer.write_record(CSV_HEADER)?;

    for sample in &rows.samples {
        let absolute = started_at.and_then(|start| {
            let offset = TimeDelta::microseconds((sample.elapsed_s * 1_000_000.0).round() as i64);
            start.checked_add_signed(offset)
        });
        let timestamp = match absolute {
            Some(time) => time.format("%Y-%m-%d %H:%M:%S%.3f").to_string(),
            None => format!("T+{:.3}s", sample.elapsed_s),
        };

        let elapsed = format!("{:.3}", sample.elapsed_s);
        let latency = format!("{:.1}", sample.latency_ms);
        writer.write_record([
            timestamp.as_str(),
            elapsed.as_str(),
            latency.as_str(),
            target_host,
            start_time.as_str(),
        ])?;
    }

    // the csv writer cannot emit a zero-field record as a bare line break
    let mut out = writer.into_inner().map_err(|e| e.into_error())?;
    out.write_all(b"\r\n")?;

    let mut writer = csv_writer(out);
    writer.write_record(["=== SUMMARY STATISTICS ==="])?;
    writer.write_record(["Metric", "Value"])?;

    let summary = [
        ("Total Pings", rows.basic.sample_count.to_string()),
        ("Failed Pings", rows.failure_count.to_string()),
        ("Packet Loss %", format!("{:.1}%", rows.basic.packet_loss_percent)),
        ("Average Ping (ms)", format!("{:.1}", rows.basic.average_latency)),
        ("Minimum Ping (ms)", format!("{:.1}", rows.advanced.min_latency)),
        ("Maximum Ping (ms)", format!("{:.1}", rows.advanced.max_latency)),
        ("Jitter (ms)", format!("{:.1}", rows.advanced.jitter)),
        ("Test Duration (seconds)", format!("{:.1}", rows.duration_secs)),
    ];
    for (metric, value) in &summary {
        writer.write_record([*metric, value.as_str()])?;
    }

    Ok(writer.into_inner().map_err(|e| e.into_error())?)
}

fn csv_writer<W: Write>(out: W) -> csv::Writer<W> {
    WriterBuilder::new()
        .flexible(true)
        .terminator(Terminator::CRLF)
        .from_writer(out)
}

pub fn export_to_file(
    path: &Path,
    rows: &ExportRows,
    target: &str,
    started_at: Option<DateTime<Local>>,
) -> Result<(), ExportError> {
    if rows.samples.is_empty() {
        return Err(ExportError::NoData);
    }

    let file = File::create(path)?;
    let mut out = write_csv(BufWriter::new(file), rows, target, started_at)?;
    out.flush()?;

    log::info!("Exported {} samples to {}", rows.samples.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SampleStore;
    use chrono::TimeZone;

    fn rows() -> ExportRows {
        let mut store = SampleStore::new();
        store.record_success(12.0, 0.25);
        store.record_failure();
        store.record_success(18.04, 1.5);
        store.export_rows()
    }

    const SUMMARY: &str = "\r\n\
        === SUMMARY STATISTICS ===\r\n\
        Metric,Value\r\n\
        Total Pings,2\r\n\
        Failed Pings,1\r\n\
        Packet Loss %,33.3%\r\n\
        Average Ping (ms),15.0\r\n\
        Minimum Ping (ms),12.0\r\n\
        Maximum Ping (ms),18.0\r\n\
        Jitter (ms),3.0\r\n\
        Test Duration (seconds),1.5\r\n";

    #[test]
    fn writes_absolute_timestamps_when_start_is_known() {
        let start = Local.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).single().unwrap();
        let out = write_csv(Vec::new(), &rows(), " example.com ", Some(start)).unwrap();

        let expected = format!(
            "Timestamp,Elapsed_Time_Seconds,Ping_Time_MS,Target_Host,Test_Start_Time\r\n\
             2024-05-01 12:00:00.250,0.250,12.0,example.com,2024-05-01 12:00:00\r\n\
             2024-05-01 12:00:01.500,1.500,18.0,example.com,2024-05-01 12:00:00\r\n\
             {SUMMARY}"
        );
        assert_eq!(String::from_utf8(out).unwrap(), expected);
    }

    #[test]
    fn falls_back_to_relative_times_and_unknowns() {
        let out = write_csv(Vec::new(), &rows(), "  ", None).unwrap();
        let text = String::from_utf8(out).unwrap();

        let mut lines = text.lines().skip(1);
        assert_eq!(lines.next(), Some("T+0.250s,0.250,12.0,Unknown,Unknown"));
        assert_eq!(lines.next(), Some("T+1.500s,1.500,18.0,Unknown,Unknown"));
        assert_eq!(lines.next(), Some(""));
    }

    #[test]
    fn empty_history_is_not_exported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.csv");
        let result = export_to_file(&path, &ExportRows::default(), "example.com", None);

        assert!(matches!(result, Err(ExportError::NoData)));
        assert!(!path.exists());
    }

    #[test]
    fn export_to_file_writes_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ping.csv");
        export_to_file(&path, &rows(), "example.com", None).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("Timestamp,Elapsed_Time_Seconds"));
        assert!(text.ends_with("Test Duration (seconds),1.5\r\n"));
        assert_eq!(text.matches('\n').count(), text.matches("\r\n").count());
    }

    #[test]
    fn unwritable_path_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("ping.csv");
        let result = export_to_file(&path, &rows(), "example.com", None);
        assert!(matches!(result, Err(ExportError::Io(_))));
    }

    #[test]
    fn file_name_embeds_timestamp() {
        let now = Local.with_ymd_and_hms(2024, 5, 1, 9, 3, 7).single().unwrap();
        assert_eq!(default_file_name(now), "ping_data_20240501_090307.csv");
    }
}
