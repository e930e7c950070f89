//! Event-summary writers.

use crate::Result;
use photopix_core::AccumulatorSummary;
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::borrow::Cow;
use std::path::Path;
use tracing::debug;

/// Output encoding for event summaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Comma-separated values with a header row.
    Csv,
    /// One JSON object per line.
    JsonLines,
}

impl OutputFormat {
    /// Picks the format from a file extension; anything but `.csv` is JSON
    /// lines.
    #[must_use]
    pub fn from_path<P: AsRef<Path>>(path: P) -> Self {
        match path
            .as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            Some("csv") => Self::Csv,
            _ => Self::JsonLines,
        }
    }
}

/// Summary of one event tagged with where it came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventSummary {
    /// Input the event was read from.
    pub source: String,
    /// Event index within the source.
    pub event: usize,
    #[serde(flatten)]
    pub summary: AccumulatorSummary,
}

const CSV_HEADER: &str =
    "source,event,n_points,n_not_detected,total_mass,x,y,z,t0,mean_time,mean_wavelength";

/// Quotes a CSV field containing a separator, quote or line break.
fn csv_field(value: &str) -> Cow<'_, str> {
    if value.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", value.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(value)
    }
}

/// Writes event summaries as CSV or JSON lines.
pub struct SummaryWriter<W: Write = BufWriter<File>> {
    writer: W,
    format: OutputFormat,
    wrote_header: bool,
}

impl SummaryWriter<BufWriter<File>> {
    /// Creates a writer for a file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be created.
    pub fn create<P: AsRef<Path>>(path: P, format: OutputFormat) -> Result<Self> {
        let path = path.as_ref();
        let file = File::create(path)?;
        debug!(path = %path.display(), ?format, "summary output created");
        Ok(Self::new(BufWriter::new(file), format))
    }
}

impl<W: Write> SummaryWriter<W> {
    /// Wraps any writer.
    pub fn new(writer: W, format: OutputFormat) -> Self {
        Self {
            writer,
            format,
            wrote_header: false,
        }
    }

    #[must_use]
    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Writes one summary.
    ///
    /// # Errors
    /// Returns an error on I/O or JSON encoding failure.
    pub fn write(&mut self, summary: &EventSummary) -> Result<()> {
        match self.format {
            OutputFormat::JsonLines => {
                serde_json::to_writer(&mut self.writer, summary)?;
                writeln!(self.writer)?;
            }
            OutputFormat::Csv => {
                if !self.wrote_header {
                    writeln!(self.writer, "{CSV_HEADER}")?;
                    self.wrote_header = true;
                }
                let s = &summary.summary;
                let optional = |value: Option<f64>| value.map_or_else(String::new, |v| v.to_string());
                writeln!(
                    self.writer,
                    "{},{},{},{},{},{},{},{},{},{},{}",
                    csv_field(&summary.source),
                    summary.event,
                    s.n_points,
                    s.n_not_detected,
                    s.total_mass,
                    s.center.x,
                    s.center.y,
                    s.center.z,
                    optional(s.t0),
                    optional(s.mean_time),
                    optional(s.mean_wavelength),
                )?;
            }
        }
        Ok(())
    }

    /// Writes every summary in order.
    ///
    /// # Errors
    /// Stops at the first failed write.
    pub fn write_all(&mut self, summaries: &[EventSummary]) -> Result<()> {
        summaries.iter().try_for_each(|summary| self.write(summary))
    }

    /// Flushes the writer.
    ///
    /// # Errors
    /// Returns an error if the flush fails.
    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    /// Returns the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use photopix_core::Position;
    use tempfile::NamedTempFile;

    fn summary(event: usize, empty: bool) -> EventSummary {
        EventSummary {
            source: "run1.txt".to_string(),
            event,
            summary: AccumulatorSummary {
                n_points: if empty { 0 } else { 2 },
                n_not_detected: 1,
                total_mass: if empty { 0.0 } else { 2.0 },
                center: if empty {
                    Position::ZERO
                } else {
                    Position::new(1.5, -2.0, 0.0)
                },
                t0: (!empty).then_some(3.0),
                mean_time: (!empty).then_some(4.5),
                mean_wavelength: (!empty).then_some(420.0),
            },
        }
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(OutputFormat::from_path("out.CSV"), OutputFormat::Csv);
        assert_eq!(OutputFormat::from_path("out.jsonl"), OutputFormat::JsonLines);
        assert_eq!(OutputFormat::from_path("out"), OutputFormat::JsonLines);
    }

    #[test]
    fn test_write_csv() {
        let mut writer = SummaryWriter::new(Vec::new(), OutputFormat::Csv);
        writer.write_all(&[summary(0, false), summary(1, true)]).unwrap();

        let text = String::from_utf8(writer.into_inner()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], CSV_HEADER);
        assert_eq!(lines[1], "run1.txt,0,2,1,2,1.5,-2,0,3,4.5,420");
        assert_eq!(lines[2], "run1.txt,1,0,1,0,0,0,0,,,");
    }

    #[test]
    fn test_csv_quotes_source() {
        let mut row = summary(0, false);
        row.source = "runs/a,b.txt".to_string();
        let mut quoted = summary(1, true);
        quoted.source = "say \"hi\".txt".to_string();

        let mut writer = SummaryWriter::new(Vec::new(), OutputFormat::Csv);
        writer.write_all(&[row, quoted]).unwrap();

        let text = String::from_utf8(writer.into_inner()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[1], "\"runs/a,b.txt\",0,2,1,2,1.5,-2,0,3,4.5,420");
        assert_eq!(lines[2], "\"say \"\"hi\"\".txt\",1,0,1,0,0,0,0,,,");

        // Outside the quoted source, the row has as many fields as the header
        let unquoted = lines[1].rsplit_once('"').unwrap().1;
        assert_eq!(
            unquoted.split(',').count(),
            CSV_HEADER.split(',').count()
        );
    }

    #[test]
    fn test_write_json_lines() {
        let mut writer = SummaryWriter::new(Vec::new(), OutputFormat::JsonLines);
        writer.write(&summary(0, false)).unwrap();
        writer.write(&summary(1, true)).unwrap();

        let text = String::from_utf8(writer.into_inner()).unwrap();
        let lines: Vec<serde_json::Value> = text
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["event"], 0);
        assert_eq!(lines[0]["n_points"], 2);
        assert_eq!(lines[0]["center"]["x"], 1.5);
        assert!(lines[1]["t0"].is_null());
    }

    #[test]
    fn test_create_file() {
        let file = NamedTempFile::new().unwrap();
        let mut writer = SummaryWriter::create(file.path(), OutputFormat::Csv).unwrap();
        writer.write(&summary(0, false)).unwrap();
        writer.flush().unwrap();

        let content = std::fs::read_to_string(file.path()).unwrap();
        assert!(content.starts_with("source,event"));
        assert!(content.contains("run1.txt,0,2"));
    }
}
