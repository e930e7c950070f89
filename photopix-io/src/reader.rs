//! Hit-list readers.
//!
//! One photon per line: `x y z time energy [mass]`, whitespace separated.
//! `#` starts a comment. Blank lines separate events; the mass defaults to 1.

use crate::{Error, Result};
use photopix_core::{AccumulatorSummary, PhotonAccumulator, PhotonHit, Position, ResponseModel};
use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::Path;
use tracing::debug;

/// A photon hit with its accumulation weight.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HitRecord {
    pub hit: PhotonHit,
    pub mass: f64,
}

/// All hits of one simulated event.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    /// Zero-based position of the event in its file.
    pub index: usize,
    pub hits: Vec<HitRecord>,
}

impl Event {
    /// Clears `accumulator`, feeds it every hit of the event and returns the
    /// resulting summary.
    pub fn accumulate<R: ResponseModel>(
        &self,
        accumulator: &mut PhotonAccumulator<R>,
    ) -> AccumulatorSummary {
        accumulator.clear();
        for record in &self.hits {
            accumulator.add_point_weighted(&record.hit, record.mass);
        }
        accumulator.summary()
    }
}

/// Streaming reader yielding one [`Event`] at a time.
pub struct HitFileReader<B: BufRead = BufReader<File>> {
    lines: Lines<B>,
    line_no: usize,
    next_index: usize,
}

impl HitFileReader<BufReader<File>> {
    /// Opens a hit-list file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        debug!(path = %path.display(), "hit list opened");
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<B: BufRead> HitFileReader<B> {
    /// Wraps any buffered reader.
    pub fn new(reader: B) -> Self {
        Self {
            lines: reader.lines(),
            line_no: 0,
            next_index: 0,
        }
    }

    fn parse_line(content: &str, line: usize) -> Result<HitRecord> {
        let values = content
            .split_whitespace()
            .map(|token| {
                token.parse::<f64>().map_err(|_| Error::Parse {
                    line,
                    message: format!("invalid number {token:?}"),
                })
            })
            .collect::<Result<Vec<f64>>>()?;

        let (fields, mass) = match values.as_slice() {
            [x, y, z, t, e] => ([*x, *y, *z, *t, *e], 1.0),
            [x, y, z, t, e, m] => ([*x, *y, *z, *t, *e], *m),
            other => {
                return Err(Error::Parse {
                    line,
                    message: format!("expected 5 or 6 columns, found {}", other.len()),
                })
            }
        };
        let [x, y, z, time, energy] = fields;
        Ok(HitRecord {
            hit: PhotonHit::new(Position::new(x, y, z), time, energy),
            mass,
        })
    }
}

impl<B: BufRead> Iterator for HitFileReader<B> {
    type Item = Result<Event>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut hits = Vec::new();
        for line in self.lines.by_ref() {
            self.line_no += 1;
            let line = match line {
                Ok(line) => line,
                Err(err) => return Some(Err(err.into())),
            };
            if line.trim().is_empty() {
                if hits.is_empty() {
                    continue;
                }
                break;
            }
            let content = line.split('#').next().unwrap_or_default().trim();
            if content.is_empty() {
                continue;
            }
            match Self::parse_line(content, self.line_no) {
                Ok(record) => hits.push(record),
                Err(err) => return Some(Err(err)),
            }
        }

        if hits.is_empty() {
            return None;
        }
        let event = Event {
            index: self.next_index,
            hits,
        };
        self.next_index += 1;
        Some(Ok(event))
    }
}

/// Parses every event of an in-memory hit list.
///
/// # Errors
/// Returns the first parse error.
pub fn parse_events(text: &str) -> Result<Vec<Event>> {
    HitFileReader::new(text.as_bytes()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const SAMPLE: &str = "\
# x y z time energy [mass]
0 0 0 1.0 3e-6
2 0 0 2.0 3e-6 3

# second event
1 1 1 5.0 2.5e-6
";

    #[test]
    fn test_parse_events() {
        let events = parse_events(SAMPLE).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].index, 0);
        assert_eq!(events[0].hits.len(), 2);
        assert_relative_eq!(events[0].hits[0].mass, 1.0);
        assert_relative_eq!(events[0].hits[1].mass, 3.0);
        assert_eq!(events[1].index, 1);
        assert_relative_eq!(events[1].hits[0].hit.time, 5.0);
    }

    #[test]
    fn test_multiple_blank_lines_do_not_create_empty_events() {
        let events = parse_events("\n\n1 0 0 0 3e-6\n\n\n\n2 0 0 0 3e-6\n\n").unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].index, 1);
    }

    #[test]
    fn test_parse_errors_report_line() {
        let err = parse_events("0 0 0 1.0 3e-6\n0 0 0 1.0\n").unwrap_err();
        assert!(matches!(err, Error::Parse { line: 2, .. }));

        let err = parse_events("0 0 zero 1.0 3e-6\n").unwrap_err();
        assert!(matches!(err, Error::Parse { line: 1, .. }));
    }

    #[test]
    fn test_event_accumulate() {
        let events = parse_events(SAMPLE).unwrap();
        let mut acc: PhotonAccumulator = PhotonAccumulator::default();

        let summary = events[0].accumulate(&mut acc);
        assert_eq!(summary.n_points, 2);
        assert_relative_eq!(summary.total_mass, 4.0);
        assert_relative_eq!(summary.center.x, 1.5, epsilon = 1e-12);
        assert_relative_eq!(summary.t0.unwrap(), 1.0);

        // The accumulator is cleared between events
        let summary = events[1].accumulate(&mut acc);
        assert_eq!(summary.n_points, 1);
        assert_relative_eq!(summary.center.z, 1.0);
    }

    #[test]
    fn test_open_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        file.flush().unwrap();

        let events: Vec<Event> = HitFileReader::open(file.path())
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(events.len(), 2);

        assert!(HitFileReader::open("/nonexistent/photopix/hits.txt").is_err());
    }
}
