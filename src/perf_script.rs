//! Streaming reader for `perf script` output.
//!
//! Each event line opens a new [`Sample`]; the stack lines that follow it are
//! folded into that sample until the next event line. Nothing but the sample
//! under construction is held in memory, so traces of any size can be read.

use crate::error::{Error, Result};
use regex::Regex;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;
use std::sync::LazyLock;

/// Process name used when an event line has no leading non-digit run.
pub const UNKNOWN_COMM: &str = "<unknown>";

// `java 14375 [022] 28648.467079: cpu-clock:`, timestamp in the first group.
// Traces recorded without stacks carry their one frame after the match.
static EVENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r" +([0-9]+\.[0-9]+): .+?:").expect("event pattern"));

static COMM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^ *([^0-9]+)").expect("comm pattern"));

// `\t    7f92bdd98965 Ljava/io/OutputStream;::write (/tmp/perf-11936.map)`
static FRAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\t ]*[0-9a-fA-F]+ ([^ +]+)").expect("frame pattern"));

/// What a single line of input turned out to be.
#[derive(Debug, Clone, PartialEq)]
pub enum Line<'a> {
    Comment,
    Event {
        timestamp: f64,
        comm: &'a str,
        /// Frame printed on the event line itself.
        frame: Option<&'a str>,
    },
    Frame(&'a str),
    /// Blank or unparseable lines, ignored by the parser.
    Other,
}

pub fn classify(line: &str) -> Line<'_> {
    if line.starts_with('#') {
        return Line::Comment;
    }
    if let Some((timestamp, rest)) = event(line) {
        return Line::Event {
            timestamp,
            comm: comm(line).unwrap_or(UNKNOWN_COMM),
            frame: frame_symbol(rest),
        };
    }
    match frame_symbol(line) {
        Some(symbol) => Line::Frame(symbol),
        None => Line::Other,
    }
}

/// Timestamp of an event line and whatever follows the event name.
fn event(line: &str) -> Option<(f64, &str)> {
    let caps = EVENT_RE.captures(line)?;
    let timestamp = caps.get(1)?.as_str().parse().ok()?;
    let rest = &line[caps.get(0)?.end()..];
    Some((timestamp, rest))
}

fn comm(line: &str) -> Option<&str> {
    COMM_RE
        .captures(line)
        .and_then(|caps| caps.get(1))
        .map(|comm| comm.as_str().trim_end())
        .filter(|comm| !comm.is_empty())
}

fn frame_symbol(line: &str) -> Option<&str> {
    FRAME_RE
        .captures(line)
        .and_then(|caps| caps.get(1))
        .map(|symbol| symbol.as_str())
}

/// One scheduling event.
///
/// `frames[0]` is always the process name; the call frames follow it from
/// the outermost caller down to the leaf.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub timestamp: f64,
    pub frames: Vec<String>,
}

impl Sample {
    fn new(timestamp: f64, comm: &str) -> Sample {
        Sample {
            timestamp,
            frames: vec![comm.to_string()],
        }
    }

    pub fn process_name(&self) -> &str {
        self.frames.first().map(String::as_str).unwrap_or(UNKNOWN_COMM)
    }

    // perf prints the leaf first, so every new frame goes right after the
    // process name and pushes the ones read before it towards the leaf.
    fn push_frame(&mut self, symbol: &str) {
        self.frames.insert(1, symbol.to_string());
    }
}

/// Lazy sequence of samples read from `perf script` output.
///
/// Every pass over a trace needs a fresh `Samples`; the reader is consumed.
pub struct Samples<R> {
    reader: R,
    buf: Vec<u8>,
    pending: Option<Sample>,
    finished: bool,
}

impl<R: BufRead> Samples<R> {
    pub fn new(reader: R) -> Samples<R> {
        Samples {
            reader,
            buf: Vec::new(),
            pending: None,
            finished: false,
        }
    }
}

impl<R: BufRead> Iterator for Samples<R> {
    type Item = io::Result<Sample>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        loop {
            self.buf.clear();
            match self.reader.read_until(b'\n', &mut self.buf) {
                Ok(0) => {
                    self.finished = true;
                    return self.pending.take().map(Ok);
                }
                Ok(_) => {}
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.finished = true;
                    return Some(Err(e));
                }
            }

            let text = String::from_utf8_lossy(&self.buf);
            let line = text.trim_end_matches(&['\n', '\r'][..]);
            match classify(line) {
                Line::Event {
                    timestamp,
                    comm,
                    frame,
                } => {
                    let mut sample = Sample::new(timestamp, comm);
                    if let Some(symbol) = frame {
                        sample.push_frame(symbol);
                    }
                    if let Some(done) = self.pending.replace(sample) {
                        return Some(Ok(done));
                    }
                }
                Line::Frame(symbol) => {
                    // frames seen before the first event line belong to nothing
                    if let Some(sample) = self.pending.as_mut() {
                        sample.push_frame(symbol);
                    }
                }
                Line::Comment | Line::Other => {}
            }
        }
    }
}

/// Opens `path` for a new forward pass.
pub fn open(path: &Path) -> Result<Samples<BufReader<File>>> {
    let file = File::open(path).map_err(|e| Error::io(path, e))?;
    Ok(Samples::new(BufReader::new(file)))
}
