use crate::error::{Error, Result};
use crate::idle::is_idle;
use crate::perf_script::{self, Sample};
use std::io;
use std::path::Path;

/// Global time window of a trace.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    /// Timestamp of the first sample in the file, idle or not.
    pub start: f64,
    /// Largest timestamp in the file, idle or not.
    pub end: f64,
}

impl Bounds {
    pub fn contains(&self, ts: f64) -> bool {
        self.start <= ts && ts <= self.end
    }
}

/// Timestamps of every non-idle sample, gathered in one pass at startup.
///
/// Stacks are not kept: a trace can be several gigabytes, so anything that
/// needs them reads the file again.
#[derive(Debug, Clone, Default)]
pub struct OffsetIndex {
    bounds: Option<Bounds>,
    offsets: Vec<f64>,
}

impl OffsetIndex {
    pub fn build(path: &Path) -> Result<OffsetIndex> {
        let samples = perf_script::open(path)?;
        OffsetIndex::from_samples(samples).map_err(|e| Error::io(path, e))
    }

    pub fn from_samples<I>(samples: I) -> io::Result<OffsetIndex>
    where
        I: IntoIterator<Item = io::Result<Sample>>,
    {
        let mut index = OffsetIndex::default();
        for sample in samples {
            index.record(&sample?);
        }
        Ok(index)
    }

    fn record(&mut self, sample: &Sample) {
        let ts = sample.timestamp;
        match self.bounds.as_mut() {
            Some(bounds) => bounds.end = bounds.end.max(ts),
            None => self.bounds = Some(Bounds { start: ts, end: ts }),
        }
        if is_idle(sample) {
            log::trace!("idle {} at {}", sample.process_name(), ts);
        } else {
            self.offsets.push(ts);
        }
    }

    /// Fails with [`Error::NoSamples`] when the trace had no event lines.
    pub fn bounds(&self) -> Result<Bounds> {
        self.bounds.ok_or(Error::NoSamples)
    }

    pub fn offsets(&self) -> &[f64] {
        &self.offsets
    }
}
