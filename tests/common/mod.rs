//! Shared fixtures: a toy container format, its demuxer plugin and mock
//! ports.
//!
//! Toy container layout (little endian):
//!
//! ```text
//! "TOYC" | u8 track count | tracks... | frames...
//! track: u32 id | u8 kind (0 audio, 1 video, 2 data) | u16 channels or width
//! frame: u32 track id | i64 pts | u32 payload length | payload
//! ```

#![allow(dead_code)]

use mediagraph::format::{
    AudioCaps, AudioInfo, Constraint, GlobalInfo, MediaKind, VideoBitstreamFormat, VideoCaps,
    VideoInfo,
};
use mediagraph::elements::demux::MAX_CONFIDENCE;
use mediagraph::prelude::*;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const MAGIC: &[u8; 4] = b"TOYC";
const TRACK_ENTRY_LEN: usize = 7;
const FRAME_HEADER_LEN: usize = 16;

// ============================================================================
// Container builder
// ============================================================================

#[derive(Debug, Clone, Copy)]
pub enum ToyTrack {
    Audio { id: u32, channels: u16 },
    Video { id: u32, width: u16 },
    Data { id: u32 },
}

#[derive(Debug, Clone)]
pub struct ToyFrame {
    pub track_id: u32,
    pub pts: i64,
    pub payload: Vec<u8>,
}

pub fn frame(track_id: u32, pts: i64, len: usize) -> ToyFrame {
    ToyFrame {
        track_id,
        pts,
        payload: (0..len).map(|i| (i as u8).wrapping_add(pts as u8)).collect(),
    }
}

pub fn build_container(tracks: &[ToyTrack], frames: &[ToyFrame]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(MAGIC);
    out.push(tracks.len() as u8);
    for track in tracks {
        let (id, kind, value) = match *track {
            ToyTrack::Audio { id, channels } => (id, 0u8, channels),
            ToyTrack::Video { id, width } => (id, 1, width),
            ToyTrack::Data { id } => (id, 2, 0),
        };
        out.extend_from_slice(&id.to_le_bytes());
        out.push(kind);
        out.extend_from_slice(&value.to_le_bytes());
    }
    for frame in frames {
        out.extend_from_slice(&frame.track_id.to_le_bytes());
        out.extend_from_slice(&frame.pts.to_le_bytes());
        out.extend_from_slice(&(frame.payload.len() as u32).to_le_bytes());
        out.extend_from_slice(&frame.payload);
    }
    out
}

/// Audio track 1 (6 channels), video track 2, data track 3, and `count`
/// frames cycling over the three tracks, 10 ms apart.
pub fn sample_container(count: usize) -> (Vec<u8>, Vec<ToyFrame>) {
    let tracks = [
        ToyTrack::Audio { id: 1, channels: 6 },
        ToyTrack::Video { id: 2, width: 640 },
        ToyTrack::Data { id: 3 },
    ];
    let frames: Vec<ToyFrame> = (0..count)
        .map(|i| frame((i % 3) as u32 + 1, i as i64 * 10_000, 5 + (i * 7) % 23))
        .collect();
    (build_container(&tracks, &frames), frames)
}

// ============================================================================
// Toy demuxer plugin
// ============================================================================

/// What the filter asked the plugin to do during negotiation.
#[derive(Debug, Default)]
pub struct PluginLog {
    pub output_channels: Mutex<Vec<(u32, u16)>>,
    pub bitstream_formats: Mutex<Vec<(u32, VideoBitstreamFormat)>>,
    pub created: AtomicUsize,
}

pub struct ToyFactory {
    pub log: Arc<PluginLog>,
    corrupt_tracks: bool,
}

impl ToyFactory {
    pub fn new() -> Self {
        Self {
            log: Arc::new(PluginLog::default()),
            corrupt_tracks: false,
        }
    }

    /// Plugins from this factory reject every track table.
    pub fn corrupt_tracks() -> Self {
        Self {
            corrupt_tracks: true,
            ..Self::new()
        }
    }
}

impl Default for ToyFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl DemuxerFactory for ToyFactory {
    fn name(&self) -> &str {
        "toy"
    }

    fn rank(&self) -> u32 {
        10
    }

    fn sniff(&self, source: &dyn ProbeSource) -> Option<u8> {
        let head = source.probe(0, MAGIC.len())?;
        (head.as_bytes() == MAGIC).then_some(MAX_CONFIDENCE)
    }

    fn create(&self) -> Result<Box<dyn DemuxerPlugin>> {
        self.log.created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ToyDemuxer {
            log: Arc::clone(&self.log),
            corrupt_tracks: self.corrupt_tracks,
            source: None,
            offset: 0,
            data_start: 0,
            track_count: None,
            pending_frame: None,
        }))
    }
}

struct ToyDemuxer {
    log: Arc<PluginLog>,
    corrupt_tracks: bool,
    source: Option<Arc<dyn DataSource>>,
    offset: u64,
    data_start: u64,
    track_count: Option<usize>,
    pending_frame: Option<(u32, i64, usize)>,
}

impl ToyDemuxer {
    fn source(&self) -> Result<Arc<dyn DataSource>> {
        self.source.clone().ok_or(Error::WrongState)
    }

    /// Read exactly `len` bytes or fail with end of stream.
    fn read_exact(&mut self, len: usize) -> Result<Buffer> {
        let buffer = self.source()?.read_at(self.offset, len)?;
        if buffer.len() < len {
            return Err(Error::EndOfStream);
        }
        self.offset += len as u64;
        Ok(buffer)
    }

    fn frame_header(&mut self) -> Result<(u32, i64, usize)> {
        let header = self.read_exact(FRAME_HEADER_LEN)?;
        let bytes = header.as_bytes();
        let track_id = u32::from_le_bytes(bytes[0..4].try_into().unwrap());
        let pts = i64::from_le_bytes(bytes[4..12].try_into().unwrap());
        let len = u32::from_le_bytes(bytes[12..16].try_into().unwrap()) as usize;
        Ok((track_id, pts, len))
    }
}

impl DemuxerPlugin for ToyDemuxer {
    fn name(&self) -> &str {
        "toy"
    }

    fn set_data_source(&mut self, source: Arc<dyn DataSource>) -> Result<()> {
        self.source = Some(source);
        Ok(())
    }

    fn media_info(&mut self) -> Result<MediaInfo> {
        let count = match self.track_count {
            Some(count) => count,
            None => {
                let head = self.read_exact(MAGIC.len() + 1)?;
                if &head.as_bytes()[..4] != MAGIC {
                    return Err(Error::UnsupportedFormat("bad magic".into()));
                }
                let count = head.as_bytes()[4] as usize;
                self.track_count = Some(count);
                count
            }
        };

        let table = self.read_exact(count * TRACK_ENTRY_LEN)?;
        if self.corrupt_tracks {
            return Err(Error::InvalidParameter("corrupt track table".into()));
        }
        let mut tracks = Vec::with_capacity(count);
        for entry in table.as_bytes().chunks_exact(TRACK_ENTRY_LEN) {
            let id = u32::from_le_bytes(entry[0..4].try_into().unwrap());
            let value = u16::from_le_bytes(entry[5..7].try_into().unwrap());
            tracks.push(match entry[4] {
                0 => TrackInfo::audio(id, "audio/x-toy", AudioInfo::new(48000, value)),
                1 => TrackInfo::video(
                    id,
                    "video/x-toy",
                    VideoInfo::new(value as u32, 480)
                        .with_bitstream_format(VideoBitstreamFormat::Avcc)
                        .with_bitstream_format(VideoBitstreamFormat::AnnexB),
                ),
                _ => TrackInfo::other(id, "application/x-toy"),
            });
        }
        self.data_start = self.offset;

        Ok(MediaInfo {
            global: GlobalInfo {
                mime: "application/x-toy-container".into(),
                ..Default::default()
            },
            tracks,
        })
    }

    fn read_frame(&mut self, _track_hint: Option<u32>) -> Result<Buffer> {
        let (track_id, pts, len) = match self.pending_frame.take() {
            Some(header) => header,
            None => self.frame_header()?,
        };
        let payload = match self.read_exact(len) {
            Ok(payload) => payload,
            // Push input may deliver the payload later.
            Err(err @ (Error::NotEnoughData | Error::EndOfStream)) => {
                self.pending_frame = Some((track_id, pts, len));
                return Err(err);
            }
            Err(err) => return Err(err),
        };
        Ok(payload.with_metadata(Metadata::for_track(track_id).with_timestamps(pts, pts)))
    }

    fn seek_to(&mut self, _track_id: Option<u32>, time_us: i64, _mode: SeekMode) -> Result<i64> {
        if self.source()?.seekable() != Seekable::Seekable {
            return Err(Error::WrongState);
        }
        self.pending_frame = None;
        self.offset = self.data_start;
        loop {
            let start = self.offset;
            let (_, pts, len) = self.frame_header()?;
            if pts >= time_us {
                self.offset = start;
                return Ok(pts);
            }
            self.offset += len as u64;
        }
    }

    fn set_output_channels(&mut self, track_id: u32, channels: u16) -> Result<()> {
        self.log
            .output_channels
            .lock()
            .unwrap()
            .push((track_id, channels));
        Ok(())
    }

    fn set_bitstream_format(&mut self, track_id: u32, format: VideoBitstreamFormat) -> Result<()> {
        self.log
            .bitstream_formats
            .lock()
            .unwrap()
            .push((track_id, format));
        Ok(())
    }
}

pub fn toy_registry() -> (Arc<PluginRegistry>, Arc<PluginLog>) {
    toy_registry_with(ToyFactory::new())
}

pub fn toy_registry_with(factory: ToyFactory) -> (Arc<PluginRegistry>, Arc<PluginLog>) {
    let log = Arc::clone(&factory.log);
    let registry = PluginRegistry::new();
    registry.register(Arc::new(factory));
    (Arc::new(registry), log)
}

// ============================================================================
// Mock ports
// ============================================================================

/// Upstream over an in-memory byte array.
pub struct MemorySource {
    data: Vec<u8>,
    pull: bool,
    max_chunk: usize,
    pub pulls: AtomicUsize,
}

impl MemorySource {
    pub fn pull(data: Vec<u8>) -> Arc<Self> {
        Arc::new(Self {
            data,
            pull: true,
            max_chunk: usize::MAX,
            pulls: AtomicUsize::new(0),
        })
    }

    pub fn pull_chunked(data: Vec<u8>, max_chunk: usize) -> Arc<Self> {
        Arc::new(Self {
            data,
            pull: true,
            max_chunk,
            pulls: AtomicUsize::new(0),
        })
    }

    pub fn push_only() -> Arc<Self> {
        Arc::new(Self {
            data: Vec::new(),
            pull: false,
            max_chunk: 0,
            pulls: AtomicUsize::new(0),
        })
    }
}

impl UpstreamPort for MemorySource {
    fn pull_data(&self, offset: u64, size: usize) -> Result<Buffer> {
        self.pulls.fetch_add(1, Ordering::SeqCst);
        let start = offset as usize;
        if start >= self.data.len() {
            return Err(Error::EndOfStream);
        }
        let end = start.saturating_add(size.min(self.max_chunk)).min(self.data.len());
        Ok(Buffer::from_vec(self.data[start..end].to_vec()))
    }

    fn supports_pull(&self) -> bool {
        self.pull
    }

    fn media_size(&self) -> Option<u64> {
        self.pull.then_some(self.data.len() as u64)
    }
}

/// Downstream that records everything it receives.
pub struct CollectSink {
    caps: Option<Caps>,
    pub frames: Mutex<Vec<Buffer>>,
    pub eos: AtomicBool,
    pub configured: Mutex<Option<PortParams>>,
}

impl CollectSink {
    pub fn accepting(caps: Caps) -> Arc<Self> {
        Arc::new(Self {
            caps: Some(caps),
            frames: Mutex::new(Vec::new()),
            eos: AtomicBool::new(false),
            configured: Mutex::new(None),
        })
    }

    pub fn refusing() -> Arc<Self> {
        Arc::new(Self {
            caps: None,
            frames: Mutex::new(Vec::new()),
            eos: AtomicBool::new(false),
            configured: Mutex::new(None),
        })
    }

    /// `(pts, payload)` of every media frame received so far.
    pub fn received(&self) -> Vec<(i64, Vec<u8>)> {
        self.frames
            .lock()
            .unwrap()
            .iter()
            .filter(|b| !b.is_eos())
            .map(|b| (b.pts(), b.as_bytes().to_vec()))
            .collect()
    }

    pub fn clear(&self) {
        self.frames.lock().unwrap().clear();
        self.eos.store(false, Ordering::SeqCst);
    }
}

impl DownstreamPort for CollectSink {
    fn push_data(&self, buffer: Buffer, _offset: Option<u64>) -> Result<()> {
        if buffer.is_eos() {
            self.eos.store(true, Ordering::SeqCst);
        }
        self.frames.lock().unwrap().push(buffer);
        Ok(())
    }

    fn negotiate(&self, _caps: &Caps, params: &PortParams) -> Option<(Caps, PortParams)> {
        self.caps.clone().map(|caps| (caps, params.clone()))
    }

    fn configure(&self, _track_id: u32, params: &PortParams) -> Option<PortParams> {
        *self.configured.lock().unwrap() = Some(params.clone());
        Some(params.clone())
    }
}

/// Expected `(pts, payload)` list of one track.
pub fn expected(frames: &[ToyFrame], track_id: u32) -> Vec<(i64, Vec<u8>)> {
    frames
        .iter()
        .filter(|f| f.track_id == track_id)
        .map(|f| (f.pts, f.payload.clone()))
        .collect()
}

pub const EVENT_TIMEOUT: Duration = Duration::from_secs(10);

/// Wait for the next EOS or error event.
pub async fn wait_eos(events: &mut EventReceiver) -> std::result::Result<(), (ErrorKind, String)> {
    tokio::time::timeout(EVENT_TIMEOUT, events.wait_eos())
        .await
        .expect("timed out waiting for EOS")
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// ============================================================================
// Wiring
// ============================================================================

/// Audio sink accepting at most two channels.
pub fn stereo_sink() -> Arc<CollectSink> {
    CollectSink::accepting(Caps::Audio(AudioCaps {
        channels: (1..=2).into(),
        ..Default::default()
    }))
}

/// Video sink accepting Annex B only.
pub fn annexb_sink() -> Arc<CollectSink> {
    CollectSink::accepting(Caps::Video(VideoCaps {
        bitstream: Constraint::Fixed(VideoBitstreamFormat::AnnexB),
        ..Default::default()
    }))
}

/// A demuxer with audio and video sinks linked by track kind.
pub struct Harness {
    pub filter: DemuxerFilter,
    pub audio: Arc<CollectSink>,
    pub video: Arc<CollectSink>,
    pub log: Arc<PluginLog>,
}

impl Harness {
    pub fn new(config: DemuxerConfig) -> Self {
        Self::with_sinks(config, stereo_sink(), annexb_sink())
    }

    pub fn with_factory(config: DemuxerConfig, factory: ToyFactory) -> Self {
        Self::build(config, factory, stereo_sink(), annexb_sink())
    }

    pub fn with_sinks(
        config: DemuxerConfig,
        audio: Arc<CollectSink>,
        video: Arc<CollectSink>,
    ) -> Self {
        Self::build(config, ToyFactory::new(), audio, video)
    }

    fn build(
        config: DemuxerConfig,
        factory: ToyFactory,
        audio: Arc<CollectSink>,
        video: Arc<CollectSink>,
    ) -> Self {
        let (registry, log) = toy_registry_with(factory);
        let filter = DemuxerFilter::new("demux", registry, config);
        let (a, v) = (Arc::clone(&audio), Arc::clone(&video));
        filter.set_stream_linker(move |_port, track| -> Option<Arc<dyn DownstreamPort>> {
            match track.kind() {
                MediaKind::Audio => Some(a.clone() as Arc<dyn DownstreamPort>),
                MediaKind::Video => Some(v.clone() as Arc<dyn DownstreamPort>),
                _ => None,
            }
        });
        Self {
            filter,
            audio,
            video,
            log,
        }
    }
}

/// Wait until headers are parsed.
pub async fn wait_ready(events: &mut EventReceiver) {
    let ready = async {
        while let Some(event) = events.recv().await {
            match event {
                FilterEvent::Ready { .. } => return,
                FilterEvent::Error { message, .. } => panic!("unexpected error: {}", message),
                _ => {}
            }
        }
        panic!("event channel closed");
    };
    tokio::time::timeout(EVENT_TIMEOUT, ready)
        .await
        .expect("timed out waiting for headers");
}

/// Assert that no EOS or error event shows up for a while.
pub async fn assert_idle(events: &mut EventReceiver) {
    let waited = tokio::time::timeout(Duration::from_millis(200), events.wait_eos()).await;
    assert!(waited.is_err(), "worker kept running: {:?}", waited);
}
