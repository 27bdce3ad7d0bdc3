//! Shared log of buffer overflows and underflows.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use dvrsim_core::SimTime;
use serde::Serialize;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IncidentKind {
    Overflow,
    Underflow,
}

impl fmt::Display for IncidentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IncidentKind::Overflow => f.write_str("overflow"),
            IncidentKind::Underflow => f.write_str("underflow"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BufferIncident {
    pub stream: String,
    pub kind: IncidentKind,
    pub time_ms: SimTime,
    pub size_kb: f64,
}

/// Stored form of an incident; the stream name is shared with the stream.
#[derive(Debug, Clone)]
struct Entry {
    stream: Rc<str>,
    kind: IncidentKind,
    time_ms: SimTime,
    size_kb: f64,
}

impl From<&Entry> for BufferIncident {
    fn from(entry: &Entry) -> Self {
        Self {
            stream: entry.stream.to_string(),
            kind: entry.kind,
            time_ms: entry.time_ms,
            size_kb: entry.size_kb,
        }
    }
}

/// Append-only incident list shared by all streams of a run.
#[derive(Clone, Debug, Default)]
pub struct DiagnosticLog {
    incidents: Rc<RefCell<Vec<Entry>>>,
}

impl DiagnosticLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, stream: &Rc<str>, kind: IncidentKind, time_ms: SimTime, size_kb: f64) {
        warn!(stream = %stream, %kind, time_ms, size_kb, "buffer {}", kind);
        self.incidents.borrow_mut().push(Entry {
            stream: stream.clone(),
            kind,
            time_ms,
            size_kb,
        });
    }

    pub fn len(&self) -> usize {
        self.incidents.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.incidents.borrow().is_empty()
    }

    pub fn count(&self, stream: &str, kind: IncidentKind) -> usize {
        self.incidents
            .borrow()
            .iter()
            .filter(|i| i.kind == kind && &*i.stream == stream)
            .count()
    }

    pub fn count_kind(&self, kind: IncidentKind) -> usize {
        self.incidents
            .borrow()
            .iter()
            .filter(|i| i.kind == kind)
            .count()
    }

    pub fn snapshot(&self) -> Vec<BufferIncident> {
        self.incidents.borrow().iter().map(BufferIncident::from).collect()
    }

    /// The earliest `limit` incidents.
    pub fn first(&self, limit: usize) -> Vec<BufferIncident> {
        self.incidents
            .borrow()
            .iter()
            .take(limit)
            .map(BufferIncident::from)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    #[traced_test]
    #[test]
    fn records_and_counts_incidents() {
        let log = DiagnosticLog::new();
        let shared = log.clone();
        let (tuner, output): (Rc<str>, Rc<str>) = (Rc::from("Tuner #0"), Rc::from("Output #1"));
        log.record(&tuner, IncidentKind::Overflow, 12.5, 300.0);
        shared.record(&output, IncidentKind::Underflow, 14.0, 90.0);
        shared.record(&output, IncidentKind::Underflow, 14.0, 20.0);

        assert_eq!(log.len(), 3);
        assert_eq!(log.count("Output #1", IncidentKind::Underflow), 2);
        assert_eq!(log.count("Tuner #0", IncidentKind::Underflow), 0);
        assert_eq!(log.count_kind(IncidentKind::Overflow), 1);
        assert_eq!(log.first(1)[0].stream, "Tuner #0");
        assert!(logs_contain("buffer overflow"));
        // One name allocation per stream, however many incidents it logs.
        assert_eq!(Rc::strong_count(&output), 3);
    }
}
