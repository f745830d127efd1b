//! Demuxer filter: drives a container plugin and routes its frames.
//!
//! # State machine
//!
//! ```text
//!          prepare()               media_info + ports ok
//!   Null ─────────────► ParseHeader ─────────────────────► ParseFrame
//!    ▲                      │                                  │
//!    └──────── stop() ──────┴──────────────────────────────────┘
//! ```
//!
//! The worker thread runs one step at a time. In `ParseHeader` a step
//! type-finds the input, creates the plugin and asks it for [`MediaInfo`];
//! once every exposed stream has a negotiated output port the filter moves
//! to `ParseFrame`, where each step reads one frame and pushes it to the
//! port registered for its track. Failures are reported as
//! [`FilterEvent::Error`] and pause the worker.
//!
//! # Example
//!
//! ```rust,ignore
//! let demuxer = DemuxerFilter::new("demux", registry, DemuxerConfig::default());
//! demuxer.link_upstream(file_source);
//! demuxer.set_stream_linker(|port, track| sinks.get(&track.track_id).cloned());
//!
//! let mut events = demuxer.subscribe();
//! demuxer.prepare()?;
//! events.wait_eos().await?;
//! ```

use super::config::DemuxerConfig;
use super::data_source::{DataSourceImpl, DemuxInput};
use super::type_finder::TypeFinder;
use crate::buffer::Buffer;
use crate::element::{DownstreamPort, Filter, FilterState, OutputPort, UpstreamPort, WorkMode};
use crate::error::{Error, Result};
use crate::events::{EventReceiver, EventSender, FilterEvent};
use crate::format::{MediaInfo, MediaKind, SeekMode, TrackInfo};
use crate::metadata::Metadata;
use crate::negotiation::negotiate_track;
use crate::observability::{
    span_filter, trace_eos, trace_error, trace_frame_routed, trace_state_change,
};
use crate::plugin::{DemuxerPlugin, PluginRegistry};
use crate::task::{Task, TaskFlow};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Callback choosing the downstream peer of a newly created output port.
///
/// Returning `None` leaves the stream unlinked; its frames are dropped.
pub type StreamLinker =
    dyn Fn(&OutputPort, &TrackInfo) -> Option<Arc<dyn DownstreamPort>> + Send + Sync;

/// Demultiplexes a byte stream into elementary streams.
pub struct DemuxerFilter {
    inner: Arc<FilterInner>,
    task: Mutex<Option<Task>>,
}

struct FilterInner {
    name: String,
    config: DemuxerConfig,
    registry: Arc<PluginRegistry>,
    input: Arc<DemuxInput>,
    plugin: Mutex<Option<Box<dyn DemuxerPlugin>>>,
    routes: Mutex<BTreeMap<u32, OutputPort>>,
    media_info: Mutex<Option<MediaInfo>>,
    linker: Mutex<Option<Arc<StreamLinker>>>,
    events: EventSender,
    /// Set by a step that paused until more input is pushed.
    awaiting_data: AtomicBool,
    /// Incremented on every push.
    arrivals: AtomicU64,
}

impl DemuxerFilter {
    /// Create a filter that picks its plugin from `registry`.
    pub fn new(
        name: impl Into<String>,
        registry: Arc<PluginRegistry>,
        config: DemuxerConfig,
    ) -> Self {
        let name = name.into();
        let inner = FilterInner {
            input: Arc::new(DemuxInput::new(name.clone(), config.pull_chunk_size)),
            events: EventSender::new(config.event_capacity),
            name,
            config,
            registry,
            plugin: Mutex::new(None),
            routes: Mutex::new(BTreeMap::new()),
            media_info: Mutex::new(None),
            linker: Mutex::new(None),
            awaiting_data: AtomicBool::new(false),
            arrivals: AtomicU64::new(0),
        };
        Self {
            inner: Arc::new(inner),
            task: Mutex::new(None),
        }
    }

    /// Connect the input.
    pub fn link_upstream(&self, port: Arc<dyn UpstreamPort>) {
        self.inner.input.set_upstream(port);
    }

    /// Install the callback that links output ports as they are created.
    pub fn set_stream_linker<F>(&self, linker: F)
    where
        F: Fn(&OutputPort, &TrackInfo) -> Option<Arc<dyn DownstreamPort>> + Send + Sync + 'static,
    {
        *self.inner.linker.lock().unwrap() = Some(Arc::new(linker));
    }

    /// Receive events emitted from now on.
    pub fn subscribe(&self) -> EventReceiver {
        self.inner.events.subscribe()
    }

    /// Media description, once headers are parsed.
    pub fn media_info(&self) -> Option<MediaInfo> {
        self.inner.media_info.lock().unwrap().clone()
    }

    /// Description of one track, once headers are parsed.
    pub fn track_info(&self, track_id: u32) -> Option<TrackInfo> {
        self.inner
            .media_info
            .lock()
            .unwrap()
            .as_ref()
            .and_then(|info| info.track(track_id))
            .cloned()
    }

    /// Output port of a track.
    pub fn output_port(&self, track_id: u32) -> Option<OutputPort> {
        self.inner.routes.lock().unwrap().get(&track_id).cloned()
    }

    /// Track ids with an output port, ascending.
    pub fn routed_tracks(&self) -> Vec<u32> {
        self.inner.routes.lock().unwrap().keys().copied().collect()
    }

    /// Selected work mode, `None` before [`prepare`](Filter::prepare).
    pub fn work_mode(&self) -> Option<WorkMode> {
        self.inner.input.work_mode()
    }

    /// Reposition all streams to `time_us`.
    ///
    /// Returns the time the plugin actually reached.
    pub fn seek_to(&self, time_us: i64, mode: SeekMode) -> Result<i64> {
        if self.inner.input.state() != FilterState::ParseFrame {
            return Err(Error::WrongState);
        }
        self.flush_start()?;
        let result = match self.inner.plugin.lock().unwrap().as_mut() {
            Some(plugin) => plugin.seek_to(None, time_us, mode),
            None => Err(Error::WrongState),
        };
        self.flush_end()?;

        match &result {
            Ok(reached) => tracing::debug!(
                filter = %self.inner.name,
                time_us,
                reached,
                ?mode,
                "seek done"
            ),
            Err(err) => tracing::warn!(
                filter = %self.inner.name,
                time_us,
                %err,
                "seek failed"
            ),
        }
        result
    }

    /// Terminate the worker thread.
    ///
    /// While frames are being read the worker keeps running unless `force`
    /// is set.
    pub fn stop_task(&self, force: bool) {
        if !force && self.inner.input.state() == FilterState::ParseFrame {
            return;
        }
        let task = self.task.lock().unwrap().take();
        if let Some(mut task) = task {
            task.stop();
        }
    }

    fn ensure_task(&self) -> Result<()> {
        let mut task = self.task.lock().unwrap();
        if task.is_none() {
            let inner = Arc::clone(&self.inner);
            let span = span_filter(&inner.name, "demuxer");
            *task = Some(Task::spawn(
                self.inner.config.worker_name(&self.inner.name),
                move || span.in_scope(|| inner.step()),
            )?);
        }
        Ok(())
    }

    fn with_task(&self, f: impl FnOnce(&Task)) {
        if let Some(task) = self.task.lock().unwrap().as_ref() {
            f(task);
        }
    }

    fn start_task(&self) {
        self.with_task(Task::start);
    }
}

impl Filter for DemuxerFilter {
    fn name(&self) -> &str {
        &self.inner.name
    }

    fn prepare(&self) -> Result<()> {
        self.stop_task(true);
        self.inner.reset();

        let mode = self.inner.input.select_mode();
        if mode == WorkMode::Pull {
            tracing::debug!(
                filter = %self.inner.name,
                media_size = ?self.inner.input.media_size(),
                "pulling from upstream"
            );
        }
        self.inner.set_state(FilterState::ParseHeader);
        self.ensure_task()?;
        self.start_task();
        Ok(())
    }

    fn start(&self) -> Result<()> {
        if self.inner.input.state() == FilterState::Null {
            return Err(Error::WrongState);
        }
        self.ensure_task()?;
        self.start_task();
        Ok(())
    }

    fn pause(&self) -> Result<()> {
        self.with_task(Task::pause);
        Ok(())
    }

    fn resume(&self) -> Result<()> {
        if self.inner.input.state() == FilterState::Null {
            return Err(Error::WrongState);
        }
        self.start_task();
        Ok(())
    }

    fn stop(&self) -> Result<()> {
        self.stop_task(true);
        if let Some(mut plugin) = self.inner.plugin.lock().unwrap().take() {
            if let Err(err) = plugin.stop().and_then(|()| plugin.deinit()) {
                tracing::warn!(filter = %self.inner.name, %err, "plugin shutdown failed");
            }
        }
        self.inner.reset();
        self.inner.input.clear_mode();
        self.inner.set_state(FilterState::Null);
        Ok(())
    }

    fn flush_start(&self) -> Result<()> {
        tracing::debug!(filter = %self.inner.name, "flush start");
        self.with_task(Task::pause);
        self.inner.input.packer().flush();
        self.inner.awaiting_data.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn flush_end(&self) -> Result<()> {
        tracing::debug!(filter = %self.inner.name, "flush end");
        if self.inner.input.state() != FilterState::Null {
            self.start_task();
        }
        Ok(())
    }

    fn push_data(&self, buffer: Buffer, offset: u64) -> Result<()> {
        if self.inner.input.work_mode() != Some(WorkMode::Push) {
            return Err(Error::WrongState);
        }
        let packer = self.inner.input.packer();
        let eos = buffer.is_eos();
        if !buffer.is_empty() {
            packer.push_data(buffer, offset)?;
        }
        if eos {
            tracing::debug!(filter = %self.inner.name, offset, "input EOS");
            packer.set_eos();
        }
        self.inner.arrivals.fetch_add(1, Ordering::SeqCst);
        if self.inner.awaiting_data.swap(false, Ordering::SeqCst) {
            self.start_task();
        }
        Ok(())
    }

    fn state(&self) -> FilterState {
        self.inner.input.state()
    }
}

impl std::fmt::Debug for DemuxerFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DemuxerFilter")
            .field("name", &self.inner.name)
            .field("input", &self.inner.input)
            .field("routes", &*self.inner.routes.lock().unwrap())
            .finish()
    }
}

impl FilterInner {
    fn set_state(&self, to: FilterState) {
        let from = self.input.set_state(to);
        if from != to {
            trace_state_change(&self.name, from, to);
            self.events.send_state_changed(&self.name, from, to);
        }
    }

    fn reset(&self) {
        if let Some(mut plugin) = self.plugin.lock().unwrap().take() {
            if let Err(err) = plugin.deinit() {
                tracing::warn!(filter = %self.name, %err, "plugin deinit failed");
            }
        }
        self.input.packer().flush();
        self.routes.lock().unwrap().clear();
        *self.media_info.lock().unwrap() = None;
        self.awaiting_data.store(false, Ordering::SeqCst);
    }

    fn is_push(&self) -> bool {
        self.input.work_mode() == Some(WorkMode::Push)
    }

    /// One worker iteration.
    fn step(&self) -> TaskFlow {
        let arrivals = self.arrivals.load(Ordering::SeqCst);
        match self.input.state() {
            FilterState::Null => TaskFlow::Pause,
            FilterState::ParseHeader => self.parse_header(arrivals),
            FilterState::ParseFrame => self.parse_frame(arrivals),
        }
    }

    /// Upstream signalled EOS and pushed nothing since `arrivals`.
    fn input_finished(&self, arrivals: u64) -> bool {
        self.input.packer().is_eos() && self.arrivals.load(Ordering::SeqCst) == arrivals
    }

    /// Pause until the next push, unless one arrived during this step.
    fn wait_for_data(&self, arrivals: u64) -> TaskFlow {
        self.awaiting_data.store(true, Ordering::SeqCst);
        if self.arrivals.load(Ordering::SeqCst) != arrivals {
            self.awaiting_data.store(false, Ordering::SeqCst);
            return TaskFlow::Continue;
        }
        tracing::trace!(filter = %self.name, "waiting for input");
        TaskFlow::Pause
    }

    fn fail(&self, err: &Error) -> TaskFlow {
        trace_error(&self.name, err);
        self.events.send_error(&self.name, err);
        TaskFlow::Pause
    }

    fn parse_header(&self, arrivals: u64) -> TaskFlow {
        // Type finding may block on upstream, so it runs without the plugin
        // lock held.
        if self.plugin.lock().unwrap().is_none() {
            let packer = self.input.packer();
            if self.is_push() && !packer.is_eos() && packer.size() < self.config.probe_size as u64
            {
                return self.wait_for_data(arrivals);
            }
            match self.create_plugin() {
                Ok(plugin) => *self.plugin.lock().unwrap() = Some(plugin),
                Err(err) => return self.fail(&err),
            }
        }

        let mut slot = self.plugin.lock().unwrap();
        let Some(plugin) = slot.as_mut() else {
            return TaskFlow::Pause;
        };

        let info = match plugin.media_info() {
            Ok(info) => info,
            Err(Error::NotEnoughData) if self.is_push() && !self.input_finished(arrivals) => {
                return self.wait_for_data(arrivals);
            }
            Err(err) => {
                return self.fail(&Error::Unknown(format!("reading media info: {}", err)));
            }
        };
        tracing::info!(
            filter = %self.name,
            container = %info.global.mime,
            tracks = info.tracks.len(),
            duration_us = info.global.duration_us,
            "media info parsed"
        );

        if let Err(err) = self.prepare_streams(plugin.as_mut(), &info) {
            return self.fail(&err);
        }
        if let Err(err) = plugin.start() {
            return self.fail(&err);
        }
        *self.media_info.lock().unwrap() = Some(info);
        drop(slot);

        self.set_state(FilterState::ParseFrame);
        self.events.send(FilterEvent::Ready {
            filter: self.name.clone(),
        });
        TaskFlow::Continue
    }

    fn create_plugin(&self) -> Result<Box<dyn DemuxerPlugin>> {
        let found = TypeFinder::new(&self.registry)
            .find(self.input.as_ref())
            .ok_or_else(|| Error::UnsupportedFormat("no demuxer recognizes the input".into()))?;
        let factory = found.factory;
        tracing::info!(
            filter = %self.name,
            plugin = factory.name(),
            confidence = found.confidence,
            "demuxer selected"
        );

        let unsupported =
            |err: Error| Error::UnsupportedFormat(format!("{}: {}", factory.name(), err));
        let mut plugin = factory.create().map_err(unsupported)?;
        plugin.init().map_err(unsupported)?;
        let source = Arc::new(DataSourceImpl::new(Arc::clone(&self.input)));
        plugin.set_data_source(source).map_err(unsupported)?;
        plugin.prepare().map_err(unsupported)?;
        Ok(plugin)
    }

    /// Create, link and negotiate one output port per exposed track.
    fn prepare_streams(&self, plugin: &mut dyn DemuxerPlugin, info: &MediaInfo) -> Result<()> {
        let linker = self.linker.lock().unwrap().clone();
        let mut routes = BTreeMap::new();
        let mut audio_tracks = 0;

        for track in &info.tracks {
            let prefix = match track.kind() {
                MediaKind::Audio if audio_tracks >= self.config.max_audio_tracks => {
                    tracing::debug!(
                        filter = %self.name,
                        track_id = track.track_id,
                        "extra audio track skipped"
                    );
                    continue;
                }
                MediaKind::Audio => {
                    audio_tracks += 1;
                    "audio"
                }
                MediaKind::Video => "video",
                MediaKind::Subtitle => "subtitle",
                MediaKind::Unknown => {
                    tracing::debug!(
                        filter = %self.name,
                        track_id = track.track_id,
                        mime = %track.mime,
                        "unknown track skipped"
                    );
                    continue;
                }
            };

            let name = format!("{}_{}", prefix, track.track_id);
            let mut port = OutputPort::new(name, track.track_id);
            if let Some(peer) = linker.as_ref().and_then(|link| link(&port, track)) {
                port.link(peer);
            }
            self.events.send(FilterEvent::StreamAdded {
                filter: self.name.clone(),
                track_id: track.track_id,
                port: port.name().to_string(),
                linked: port.peer().is_some(),
            });
            routes.insert(track.track_id, port);
        }

        if routes.is_empty() {
            return Err(Error::UnsupportedFormat("no playable streams".into()));
        }

        for port in routes.values_mut() {
            let Some(peer) = port.peer().cloned() else {
                continue;
            };
            if !port.needs_negotiation() {
                continue;
            }
            let track = info
                .track(port.track_id())
                .ok_or_else(|| Error::Unknown(format!("track {} vanished", port.track_id())))?;

            let negotiated = negotiate_track(port.name(), track, peer.as_ref())?;
            if let Some(channels) = negotiated.output_channels {
                plugin.set_output_channels(track.track_id, channels)?;
            }
            if let Some(format) = negotiated.bitstream_format {
                plugin.set_bitstream_format(track.track_id, format)?;
            }
            tracing::debug!(
                filter = %self.name,
                port = port.name(),
                params = ?negotiated.params,
                "port configured"
            );
            port.set_configured(negotiated.params);
        }

        *self.routes.lock().unwrap() = routes;
        Ok(())
    }

    fn parse_frame(&self, arrivals: u64) -> TaskFlow {
        let result = match self.plugin.lock().unwrap().as_mut() {
            Some(plugin) => plugin.read_frame(None),
            None => return TaskFlow::Pause,
        };
        match result {
            Ok(buffer) => {
                self.route(buffer);
                TaskFlow::Continue
            }
            // In push mode the plugin ran out of buffered bytes; the stream
            // only ends once upstream says so and nothing new arrived.
            Err(Error::EndOfStream) if self.is_push() && !self.input_finished(arrivals) => {
                self.wait_for_data(arrivals)
            }
            Err(Error::EndOfStream) => {
                self.push_eos();
                TaskFlow::Pause
            }
            Err(err) => self.fail(&err),
        }
    }

    fn route(&self, buffer: Buffer) {
        let track_id = buffer.track_id();
        let port = self.routes.lock().unwrap().get(&track_id).cloned();
        let Some(port) = port else {
            tracing::trace!(filter = %self.name, track_id, "no route for frame, dropped");
            return;
        };
        trace_frame_routed(&self.name, track_id, buffer.len(), buffer.pts());
        if let Err(err) = port.push(buffer) {
            tracing::warn!(filter = %self.name, port = port.name(), %err, "downstream rejected frame");
        }
    }

    fn push_eos(&self) {
        let ports: Vec<OutputPort> = self.routes.lock().unwrap().values().cloned().collect();
        for port in &ports {
            let eos = Buffer::eos().with_metadata(Metadata::for_track(port.track_id()).with_eos());
            if let Err(err) = port.push(eos) {
                tracing::warn!(filter = %self.name, port = port.name(), %err, "EOS not delivered");
            }
        }
        trace_eos(&self.name, ports.len());
        self.events.send_eos(&self.name);
    }
}
