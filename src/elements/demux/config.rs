//! Demuxer filter configuration.

/// Demuxer filter configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemuxerConfig {
    /// Minimum bytes requested from upstream per pull (default: 0, pull
    /// exactly the missing bytes). Never shrinks a request.
    pub pull_chunk_size: usize,
    /// Bytes that must be buffered in push mode before type finding starts,
    /// unless the input ends first (default: 4096).
    pub probe_size: usize,
    /// Maximum number of audio tracks exposed (default: 1).
    pub max_audio_tracks: usize,
    /// Prefix of the worker thread name; the filter name is appended
    /// (default: "demux").
    pub worker_name_prefix: String,
    /// Capacity of the event channel (default: 64).
    pub event_capacity: usize,
}

impl Default for DemuxerConfig {
    fn default() -> Self {
        Self {
            pull_chunk_size: 0,
            probe_size: 4096,
            max_audio_tracks: 1,
            worker_name_prefix: "demux".to_string(),
            event_capacity: 64,
        }
    }
}

impl DemuxerConfig {
    /// Small probe window, for low-latency streams.
    pub fn low_latency() -> Self {
        Self {
            probe_size: 16,
            ..Self::default()
        }
    }

    /// Set the pull chunk size.
    pub fn with_pull_chunk_size(mut self, size: usize) -> Self {
        self.pull_chunk_size = size;
        self
    }

    /// Set the push-mode probe size.
    pub fn with_probe_size(mut self, size: usize) -> Self {
        self.probe_size = size;
        self
    }

    /// Set the maximum number of exposed audio tracks.
    pub fn with_max_audio_tracks(mut self, count: usize) -> Self {
        self.max_audio_tracks = count;
        self
    }

    /// Set the worker thread name prefix.
    pub fn with_worker_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.worker_name_prefix = prefix.into();
        self
    }

    /// Set the event channel capacity.
    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    /// Worker thread name for a filter.
    pub fn worker_name(&self, filter: &str) -> String {
        format!("{}-{}", self.worker_name_prefix, filter)
    }
}
