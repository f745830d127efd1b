//! Tracing helpers shared by filters.

use crate::element::FilterState;
use tracing::{Level, Span, span};

/// Create a span covering a filter's worker thread.
///
/// # Example
///
/// ```rust
/// use mediagraph::observability::span_filter;
///
/// let span = span_filter("demux", "demuxer");
/// let _guard = span.enter();
/// ```
#[inline]
pub fn span_filter(filter: &str, filter_type: &str) -> Span {
    span!(
        Level::DEBUG,
        "filter",
        filter = %filter,
        filter_type = %filter_type
    )
}

/// Log a frame handed to an output port.
#[inline]
pub fn trace_frame_routed(filter: &str, track_id: u32, size: usize, pts: i64) {
    tracing::trace!(
        filter = %filter,
        track_id,
        size,
        pts,
        "frame routed"
    );
}

/// Log a filter state change.
#[inline]
pub fn trace_state_change(filter: &str, from: FilterState, to: FilterState) {
    tracing::info!(
        filter = %filter,
        from = %from,
        to = %to,
        "filter state changed"
    );
}

/// Log an error that paused a filter.
#[inline]
pub fn trace_error(filter: &str, error: &dyn std::error::Error) {
    tracing::error!(
        filter = %filter,
        error = %error,
        "processing error"
    );
}

/// Log end-of-stream.
#[inline]
pub fn trace_eos(filter: &str, ports: usize) {
    tracing::info!(
        filter = %filter,
        ports,
        "end of stream"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_helpers_without_subscriber() {
        let span = span_filter("demux", "demuxer");
        let _guard = span.enter();
        trace_frame_routed("demux", 1, 128, 0);
        trace_state_change("demux", FilterState::Null, FilterState::ParseHeader);
        trace_error("demux", &crate::Error::WrongState);
        trace_eos("demux", 2);
    }
}
