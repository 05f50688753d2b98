// Progress markers
// Batch jobs report progress as single characters on stdout, overwriting the
// previous marker with a backspace.

use std::io::Write;

/// One progress marker per stage of a batch job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    Reading,
    Dumping,
    Checking,
    Reflecting,
    Unreachable,
    Changing,
    Removing,
    Done,
}

impl Marker {
    pub fn symbol(&self) -> char {
        match self {
            Marker::Reading => '.',
            Marker::Dumping => 'v',
            Marker::Checking => '^',
            Marker::Reflecting => '@',
            Marker::Unreachable => 'x',
            Marker::Changing => '-',
            Marker::Removing => 'X',
            Marker::Done => '*',
        }
    }
}

pub trait ProgressSink {
    /// Replaces the current marker with `marker`.
    fn mark(&mut self, marker: Marker);
    /// Starts a new marker without overwriting the current one.
    fn push(&mut self, marker: Marker);
    fn finish(&mut self);
}

/// Writes markers to stdout.
#[derive(Debug, Default)]
pub struct ConsoleProgress {
    started: bool,
}

impl ConsoleProgress {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProgressSink for ConsoleProgress {
    fn mark(&mut self, marker: Marker) {
        let mut out = std::io::stdout();
        if self.started {
            let _ = write!(out, "\u{8}{}", marker.symbol());
        } else {
            let _ = write!(out, "{}", marker.symbol());
            self.started = true;
        }
        let _ = out.flush();
    }

    fn push(&mut self, marker: Marker) {
        let mut out = std::io::stdout();
        let _ = write!(out, "{}", marker.symbol());
        let _ = out.flush();
        self.started = true;
    }

    fn finish(&mut self) {
        println!();
        self.started = false;
    }
}

/// Collects markers in memory.
#[derive(Debug, Default, Clone)]
pub struct RecordedProgress {
    pub markers: Vec<Marker>,
}

impl RecordedProgress {
    pub fn symbols(&self) -> String {
        self.markers.iter().map(Marker::symbol).collect()
    }
}

impl ProgressSink for RecordedProgress {
    fn mark(&mut self, marker: Marker) {
        self.markers.push(marker);
    }

    fn push(&mut self, marker: Marker) {
        self.markers.push(marker);
    }

    fn finish(&mut self) {}
}
