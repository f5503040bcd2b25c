use crate::error::{Error, Result};
use crate::flame_tree::FlameNode;
use crate::idle::is_idle;
use crate::offset_index::{Bounds, OffsetIndex};
use crate::perf_script::{self, Sample};
use std::io;
use std::path::Path;

/// Builds a flame tree from the non-idle samples with timestamps in
/// `[range_start, range_end]`, both absolute.
///
/// The trace is read again from the start on every call.
pub fn query(
    path: &Path,
    index: &OffsetIndex,
    range_start: f64,
    range_end: f64,
) -> Result<FlameNode> {
    check_range(index.bounds()?, range_start, range_end)?;
    let samples = perf_script::open(path)?;
    merge_range(samples, range_start, range_end).map_err(|e| Error::io(path, e))
}

pub fn check_range(bounds: Bounds, range_start: f64, range_end: f64) -> Result<()> {
    // written so that NaN fails too
    if bounds.contains(range_start) && bounds.contains(range_end) && range_start <= range_end {
        Ok(())
    } else {
        Err(Error::UnsatisfiableRange {
            start: range_start,
            end: range_end,
        })
    }
}

fn merge_range<I>(samples: I, range_start: f64, range_end: f64) -> io::Result<FlameNode>
where
    I: IntoIterator<Item = io::Result<Sample>>,
{
    let window = Bounds {
        start: range_start,
        end: range_end,
    };
    let mut root = FlameNode::root();
    for sample in samples {
        let sample = sample?;
        if is_idle(&sample) {
            continue;
        }
        if window.contains(sample.timestamp) {
            root.merge(&sample.frames);
        }
    }
    Ok(root)
}
