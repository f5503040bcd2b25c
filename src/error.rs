use std::io;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("can't read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The requested window is inverted or falls outside the trace bounds.
    #[error("unsatisfiable range: {start} - {end}")]
    UnsatisfiableRange { start: f64, end: f64 },

    #[error("trace contains no samples")]
    NoSamples,

    #[error(
        "heatmap rows must be between 1 and {}, with a grid small enough to build",
        crate::heatmap::MAX_ROWS
    )]
    InvalidRows,
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
