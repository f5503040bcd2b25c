use crate::error::Result;
use crate::flame_tree::FlameNode;
use crate::heatmap::{self, Heatmap, DEFAULT_ROWS};
use crate::offset_index::OffsetIndex;
use crate::range_sampler;
use std::path::{Path, PathBuf};

/// A loaded trace: its path plus the offset index built when it was opened.
///
/// The index never changes after [`TraceScope::load`]; picking up a changed
/// trace means loading it again.
#[derive(Debug)]
pub struct TraceScope {
    path: PathBuf,
    index: OffsetIndex,
    default_rows: usize,
}

impl TraceScope {
    pub fn load(path: impl Into<PathBuf>) -> Result<TraceScope> {
        let path = path.into();
        let index = OffsetIndex::build(&path)?;
        Ok(TraceScope {
            path,
            index,
            default_rows: DEFAULT_ROWS,
        })
    }

    pub fn with_default_rows(mut self, rows: usize) -> TraceScope {
        self.default_rows = rows;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn index(&self) -> &OffsetIndex {
        &self.index
    }

    pub fn heatmap(&self, rows: Option<usize>) -> Result<Heatmap> {
        heatmap::compute(&self.index, rows.unwrap_or(self.default_rows))
    }

    /// Flame tree for a window given in seconds from the start of the trace.
    /// A missing bound means the start or end of the whole trace.
    pub fn range_flame(&self, start: Option<f64>, end: Option<f64>) -> Result<FlameNode> {
        let bounds = self.index.bounds()?;
        let range_start = start.map_or(bounds.start, |offset| bounds.start + offset);
        let range_end = end.map_or(bounds.end, |offset| bounds.start + offset);
        range_sampler::query(&self.path, &self.index, range_start, range_end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn load(text: &str) -> (NamedTempFile, TraceScope) {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(text.as_bytes()).unwrap();
        let scope = TraceScope::load(file.path()).unwrap();
        (file, scope)
    }

    const TWO_SAMPLES: &str = "\
app 4242 [001] 10.25: cpu-clock:
\t400100 main (/usr/bin/app)
\t7f0001 libc (/lib/libc.so.6)
app 4242 [001] 10.75: cpu-clock:
\t400200 work (/usr/bin/app)
\t7f0001 libc (/lib/libc.so.6)
";

    #[test]
    fn heatmap_of_two_samples() {
        let (_file, scope) = load(TWO_SAMPLES);
        let heatmap = scope.heatmap(Some(1)).unwrap();
        assert_eq!(heatmap.columns.len(), 1);
        assert_eq!(heatmap.grid[0][0], 2);
        assert_eq!(heatmap.max_value, 2);
    }

    #[test]
    fn heatmap_defaults_rows() {
        let (_file, scope) = load(TWO_SAMPLES);
        assert_eq!(scope.heatmap(None).unwrap().row_boundaries.len(), DEFAULT_ROWS);
        let scope = scope.with_default_rows(8);
        assert_eq!(scope.heatmap(None).unwrap().row_boundaries.len(), 8);
    }

    #[test]
    fn range_flame_of_two_samples() {
        let (_file, scope) = load(TWO_SAMPLES);
        let root = scope.range_flame(Some(0.0), Some(0.5)).unwrap();
        assert_eq!(root.name, "root");
        assert_eq!(root.value, 2);
        let app = root.child("app").unwrap();
        assert_eq!(app.value, 2);
        let libc = app.child("libc").unwrap();
        assert_eq!(libc.value, 2);
        assert_eq!(libc.child("main").map(|n| n.value), Some(1));
        assert_eq!(libc.child("work").map(|n| n.value), Some(1));
    }

    #[test]
    fn range_flame_defaults_to_whole_trace() {
        let (_file, scope) = load(TWO_SAMPLES);
        let whole = scope.range_flame(None, None).unwrap();
        assert_eq!(whole, scope.range_flame(Some(0.0), Some(0.5)).unwrap());
        assert_eq!(scope.range_flame(Some(0.4), None).unwrap().value, 1);
    }

    #[test]
    fn range_past_the_end_is_unsatisfiable() {
        let (_file, scope) = load(TWO_SAMPLES);
        assert!(matches!(
            scope.range_flame(Some(0.0), Some(1.0)),
            Err(Error::UnsatisfiableRange { .. })
        ));
        assert!(matches!(
            scope.range_flame(Some(-0.1), None),
            Err(Error::UnsatisfiableRange { .. })
        ));
    }

    #[test]
    fn empty_trace_refuses_both_operations() {
        let (_file, scope) = load("# perf script with no events\n");
        assert!(matches!(scope.heatmap(None), Err(Error::NoSamples)));
        assert!(matches!(scope.range_flame(None, None), Err(Error::NoSamples)));
    }
}
