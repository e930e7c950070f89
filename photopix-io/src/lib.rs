//! photopix-io: hit-list readers and event-summary writers.
//!
//! Hit lists are plain text, one photon per line, with blank lines between
//! events. Summaries are written as CSV or JSON lines.
//!

mod error;
mod reader;
mod writer;

pub use error::{Error, Result};
pub use reader::{parse_events, Event, HitFileReader, HitRecord};
pub use writer::{EventSummary, OutputFormat, SummaryWriter};
