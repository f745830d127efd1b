//! Output port negotiation.
//!
//! Each exposed track is offered to its downstream peer once, before the
//! first frame:
//!
//! ```text
//! TrackInfo ──► Caps::from_track ──► peer.negotiate ──► sink caps
//!                                                         │
//!        audio: downmix_channels(source, sink)            │
//!        video: select_bitstream_format(plugin, sink) ◄───┘
//!                           │
//!                           ▼
//!                    peer.configure ──► PortParams in effect
//! ```
//!
//! Audio is never upmixed: the delivered channel count is
//! `min(source, largest count the sink accepts)`.

mod error;

pub use error::NegotiationError;

use crate::element::{DownstreamPort, PortParams};
use crate::format::{Caps, Constraint, MediaKind, TrackInfo, VideoBitstreamFormat};

/// Channel count to deliver for a `source`-channel stream.
///
/// ```rust
/// use mediagraph::format::Constraint;
/// use mediagraph::negotiation::downmix_channels;
///
/// assert_eq!(downmix_channels(6, &Constraint::Range { min: 1, max: 2 }), 2);
/// assert_eq!(downmix_channels(2, &Constraint::Fixed(8)), 2);
/// assert_eq!(downmix_channels(6, &Constraint::Any), 6);
/// ```
pub fn downmix_channels(source: u16, sink: &Constraint<u16>) -> u16 {
    sink.max_value().map_or(source, |max| source.min(max))
}

/// First of the plugin's `candidates` the sink accepts.
pub fn select_bitstream_format(
    candidates: &[VideoBitstreamFormat],
    sink: &Constraint<VideoBitstreamFormat>,
) -> Option<VideoBitstreamFormat> {
    candidates.iter().copied().find(|format| sink.accepts(format))
}

/// Result of negotiating one track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Negotiated {
    /// Parameters the peer was configured with.
    pub params: PortParams,
    /// Channel count the plugin must downmix to, if below the source count.
    pub output_channels: Option<u16>,
    /// Bitstream layout the plugin must produce, for video with alternatives.
    pub bitstream_format: Option<VideoBitstreamFormat>,
}

/// Negotiate and configure `peer` for `track`.
pub fn negotiate_track(
    port: &str,
    track: &TrackInfo,
    peer: &dyn DownstreamPort,
) -> Result<Negotiated, NegotiationError> {
    let caps = Caps::from_track(track);
    let mut params = PortParams::from_track(track);

    let (sink_caps, sink_params) = peer
        .negotiate(&caps, &params)
        .ok_or_else(|| NegotiationError::Refused {
            port: port.to_string(),
            mime: track.mime.clone(),
        })?;
    tracing::debug!(port, ?sink_caps, ?sink_params, "peer answered negotiation");

    let mut output_channels = None;
    let mut bitstream_format = None;
    match track.kind() {
        MediaKind::Audio => {
            let sink_channels = match &sink_caps {
                Caps::Audio(audio) => audio.channels.clone(),
                Caps::Any => Constraint::Any,
                _ => {
                    return Err(NegotiationError::KindMismatch {
                        port: port.to_string(),
                    });
                }
            };
            if let Some(source) = params.channels {
                let channels = downmix_channels(source, &sink_channels);
                if channels < source {
                    output_channels = Some(channels);
                }
                params.channels = Some(channels);
            }
        }
        MediaKind::Video => {
            let candidates = track
                .video
                .as_ref()
                .map(|video| video.bitstream_formats.as_slice())
                .unwrap_or_default();
            if !candidates.is_empty() {
                let sink_bitstream = match &sink_caps {
                    Caps::Video(video) => video.bitstream.clone(),
                    Caps::Any => Constraint::Any,
                    _ => {
                        return Err(NegotiationError::KindMismatch {
                            port: port.to_string(),
                        });
                    }
                };
                let format = select_bitstream_format(candidates, &sink_bitstream).ok_or_else(
                    || NegotiationError::NoBitstreamFormat {
                        port: port.to_string(),
                    },
                )?;
                bitstream_format = Some(format);
                params.bitstream_format = Some(format);
            }
        }
        MediaKind::Subtitle | MediaKind::Unknown => {}
    }

    let params = peer
        .configure(track.track_id, &params)
        .ok_or_else(|| NegotiationError::ConfigureFailed {
            port: port.to_string(),
        })?;

    Ok(Negotiated {
        params,
        output_channels,
        bitstream_format,
    })
}
