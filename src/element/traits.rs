//! Core filter trait.

use crate::buffer::Buffer;
use crate::error::Result;

/// Lifecycle state of a filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FilterState {
    /// Not prepared, or stopped.
    #[default]
    Null,
    /// Reading container headers.
    ParseHeader,
    /// Reading frames.
    ParseFrame,
}

impl FilterState {
    /// Short lowercase name for logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::ParseHeader => "parse-header",
            Self::ParseFrame => "parse-frame",
        }
    }
}

impl std::fmt::Display for FilterState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A pipeline stage driven by an outer pipeline.
///
/// All methods take `&self`: filters are shared between the pipeline, their
/// own worker and upstream producers.
///
/// # Lifecycle
///
/// ```text
/// prepare() -> start() -> [pause() -> resume()]* -> stop()
///                 |
///                 +-- flush_start() / flush_end() around discontinuities
/// ```
pub trait Filter: Send + Sync {
    /// Filter name, used in logs and events.
    fn name(&self) -> &str;

    /// Allocate resources and get ready to process data.
    fn prepare(&self) -> Result<()>;

    /// Start processing.
    fn start(&self) -> Result<()>;

    /// Suspend processing. Returns once in-flight work has finished.
    fn pause(&self) -> Result<()>;

    /// Continue after [`pause`](Self::pause).
    fn resume(&self) -> Result<()>;

    /// Stop processing and release resources.
    fn stop(&self) -> Result<()>;

    /// Discard buffered data ahead of a discontinuity.
    fn flush_start(&self) -> Result<()>;

    /// Resume after [`flush_start`](Self::flush_start).
    fn flush_end(&self) -> Result<()>;

    /// Feed input data at stream offset `offset`.
    fn push_data(&self, buffer: Buffer, offset: u64) -> Result<()>;

    /// Current lifecycle state.
    fn state(&self) -> FilterState;
}
