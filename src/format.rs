//! Stream descriptions and capabilities (caps).
//!
//! A demuxer plugin describes what it found in [`MediaInfo`]: one
//! [`GlobalInfo`] for the container and one [`TrackInfo`] per elementary
//! stream. Output ports negotiate with [`Caps`], which describe sets of
//! acceptable formats through [`Constraint`] values.
//!
//! ```rust
//! use mediagraph::format::{AudioInfo, Caps, Constraint, TrackInfo};
//!
//! let track = TrackInfo::audio(1, "audio/aac", AudioInfo::new(48000, 6));
//! let Caps::Audio(source) = Caps::from_track(&track) else { unreachable!() };
//!
//! let stereo_sink: Constraint<u16> = (1..=2).into();
//! assert!(!stereo_sink.accepts(&6));
//! assert_eq!(stereo_sink.max_value(), Some(2));
//! assert_eq!(source.channels, Constraint::Fixed(6));
//! ```

use bytes::Bytes;
use smallvec::SmallVec;

// ============================================================================
// Constraint - value set used in caps
// ============================================================================

/// A set of acceptable values: one value, an inclusive range, a preference
/// ordered list, or anything.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub enum Constraint<T> {
    /// Exactly this value.
    Fixed(T),
    /// Any value in `min..=max`.
    Range {
        /// Smallest accepted value.
        min: T,
        /// Largest accepted value.
        max: T,
    },
    /// Any listed value, most preferred first.
    List(Vec<T>),
    /// No restriction.
    #[default]
    Any,
}

impl<T: Clone + Ord> Constraint<T> {
    /// Check whether `value` is in the set.
    pub fn accepts(&self, value: &T) -> bool {
        match self {
            Self::Fixed(v) => v == value,
            Self::Range { min, max } => min <= value && value <= max,
            Self::List(values) => values.contains(value),
            Self::Any => true,
        }
    }

    /// Largest accepted value, `None` for [`Constraint::Any`] or an empty
    /// list.
    pub fn max_value(&self) -> Option<T> {
        match self {
            Self::Fixed(v) => Some(v.clone()),
            Self::Range { max, .. } => Some(max.clone()),
            Self::List(values) => values.iter().max().cloned(),
            Self::Any => None,
        }
    }

    /// Preferred value, `None` for [`Constraint::Any`].
    pub fn preferred(&self) -> Option<T> {
        match self {
            Self::Fixed(v) => Some(v.clone()),
            Self::Range { min, .. } => Some(min.clone()),
            Self::List(values) => values.first().cloned(),
            Self::Any => None,
        }
    }

    /// Values accepted by both sets, or `None` if they are disjoint.
    ///
    /// List order is preserved.
    pub fn intersect(&self, other: &Self) -> Option<Self> {
        let narrowed = match (self, other) {
            (Self::Any, c) | (c, Self::Any) => c.clone(),
            (Self::Fixed(v), c) | (c, Self::Fixed(v)) => {
                if !c.accepts(v) {
                    return None;
                }
                Self::Fixed(v.clone())
            }
            (Self::Range { min: a, max: b }, Self::Range { min: c, max: d }) => {
                let min = a.max(c).clone();
                let max = b.min(d).clone();
                if min > max {
                    return None;
                }
                Self::Range { min, max }
            }
            (Self::List(values), c) | (c, Self::List(values)) => {
                let common: Vec<T> = values.iter().filter(|v| c.accepts(v)).cloned().collect();
                Self::List(common)
            }
        };
        narrowed.normalized()
    }

    fn normalized(self) -> Option<Self> {
        match self {
            Self::Range { min, max } if min == max => Some(Self::Fixed(min)),
            Self::List(mut values) => match values.len() {
                0 => None,
                1 => values.pop().map(Self::Fixed),
                _ => Some(Self::List(values)),
            },
            other => Some(other),
        }
    }
}

impl<T> From<T> for Constraint<T> {
    fn from(value: T) -> Self {
        Self::Fixed(value)
    }
}

impl<T> From<std::ops::RangeInclusive<T>> for Constraint<T> {
    fn from(range: std::ops::RangeInclusive<T>) -> Self {
        let (min, max) = range.into_inner();
        Self::Range { min, max }
    }
}

// ============================================================================
// Stream descriptions
// ============================================================================

/// Broad category of an elementary stream, derived from its mime type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MediaKind {
    /// `audio/*`
    Audio,
    /// `video/*`
    Video,
    /// `text/*` or `application/x-subrip` style subtitle streams.
    Subtitle,
    /// Anything else; such streams are not exposed.
    Unknown,
}

impl MediaKind {
    /// Classify a mime type.
    pub fn from_mime(mime: &str) -> Self {
        match mime.split('/').next() {
            Some("audio") => Self::Audio,
            Some("video") => Self::Video,
            Some("text") => Self::Subtitle,
            _ => Self::Unknown,
        }
    }
}

/// Layout of an H.264/H.265 bitstream handed downstream.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum VideoBitstreamFormat {
    /// Start-code delimited NAL units.
    AnnexB,
    /// Length-prefixed NAL units, AVC configuration record.
    Avcc,
    /// Length-prefixed NAL units, HEVC configuration record.
    Hvcc,
}

/// Audio stream properties.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AudioInfo {
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Channel count as stored in the stream.
    pub channels: u16,
    /// Bits per sample, 0 if not applicable.
    pub bits_per_sample: u16,
}

impl AudioInfo {
    /// Create audio info with unknown sample depth.
    pub const fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            channels,
            bits_per_sample: 0,
        }
    }
}

/// Video stream properties.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VideoInfo {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Frame rate as (numerator, denominator), if known.
    pub frame_rate: Option<(u32, u32)>,
    /// Bitstream layouts the plugin can produce, most preferred first.
    pub bitstream_formats: SmallVec<[VideoBitstreamFormat; 3]>,
}

impl VideoInfo {
    /// Create video info without bitstream alternatives.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ..Default::default()
        }
    }

    /// Add a bitstream layout the plugin can produce.
    pub fn with_bitstream_format(mut self, format: VideoBitstreamFormat) -> Self {
        self.bitstream_formats.push(format);
        self
    }
}

/// Description of one elementary stream.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TrackInfo {
    /// Track id used in buffer metadata and routing.
    pub track_id: u32,
    /// Mime type of the encoded stream, e.g. `audio/aac`.
    pub mime: String,
    /// Duration in microseconds, 0 if unknown.
    pub duration_us: i64,
    /// Average bitrate in bits per second, 0 if unknown.
    pub bitrate: u64,
    /// Audio properties for audio tracks.
    pub audio: Option<AudioInfo>,
    /// Video properties for video tracks.
    pub video: Option<VideoInfo>,
    /// Codec configuration record, if the container carries one.
    pub codec_config: Option<Bytes>,
}

impl TrackInfo {
    /// Describe an audio track.
    pub fn audio(track_id: u32, mime: impl Into<String>, info: AudioInfo) -> Self {
        Self {
            track_id,
            mime: mime.into(),
            audio: Some(info),
            ..Default::default()
        }
    }

    /// Describe a video track.
    pub fn video(track_id: u32, mime: impl Into<String>, info: VideoInfo) -> Self {
        Self {
            track_id,
            mime: mime.into(),
            video: Some(info),
            ..Default::default()
        }
    }

    /// Describe a track of any other kind.
    pub fn other(track_id: u32, mime: impl Into<String>) -> Self {
        Self {
            track_id,
            mime: mime.into(),
            ..Default::default()
        }
    }

    /// Set the duration.
    pub fn with_duration(mut self, duration_us: i64) -> Self {
        self.duration_us = duration_us;
        self
    }

    /// Attach the codec configuration record.
    pub fn with_codec_config(mut self, config: impl Into<Bytes>) -> Self {
        self.codec_config = Some(config.into());
        self
    }

    /// Stream category from the mime type.
    pub fn kind(&self) -> MediaKind {
        MediaKind::from_mime(&self.mime)
    }
}

/// Container-level properties.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GlobalInfo {
    /// Container mime type, e.g. `video/mp4`.
    pub mime: String,
    /// Duration in microseconds, 0 if unknown.
    pub duration_us: i64,
    /// Overall bitrate in bits per second, 0 if unknown.
    pub bitrate: u64,
    /// Title tag, if present.
    pub title: Option<String>,
}

/// Everything a demuxer plugin reports after parsing headers.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MediaInfo {
    /// Container properties.
    pub global: GlobalInfo,
    /// Elementary streams in container order.
    pub tracks: Vec<TrackInfo>,
}

impl MediaInfo {
    /// Look up a track by id.
    pub fn track(&self, track_id: u32) -> Option<&TrackInfo> {
        self.tracks.iter().find(|t| t.track_id == track_id)
    }
}

/// Where a seek lands relative to the requested time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SeekMode {
    /// Last sync point at or before the target.
    #[default]
    PreviousSync,
    /// First sync point at or after the target.
    NextSync,
    /// Sync point nearest to the target.
    ClosestSync,
    /// Nearest frame, sync point or not.
    Closest,
}

// ============================================================================
// Caps
// ============================================================================

/// Audio caps.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AudioCaps {
    /// Accepted mime types.
    pub mime: Constraint<String>,
    /// Accepted sample rates.
    pub sample_rate: Constraint<u32>,
    /// Accepted channel counts.
    pub channels: Constraint<u16>,
}

impl AudioCaps {
    /// Intersect with another audio caps.
    pub fn intersect(&self, other: &Self) -> Option<Self> {
        Some(Self {
            mime: self.mime.intersect(&other.mime)?,
            sample_rate: self.sample_rate.intersect(&other.sample_rate)?,
            channels: self.channels.intersect(&other.channels)?,
        })
    }
}

/// Video caps.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VideoCaps {
    /// Accepted mime types.
    pub mime: Constraint<String>,
    /// Accepted widths.
    pub width: Constraint<u32>,
    /// Accepted heights.
    pub height: Constraint<u32>,
    /// Accepted bitstream layouts.
    pub bitstream: Constraint<VideoBitstreamFormat>,
}

impl VideoCaps {
    /// Intersect with another video caps.
    pub fn intersect(&self, other: &Self) -> Option<Self> {
        Some(Self {
            mime: self.mime.intersect(&other.mime)?,
            width: self.width.intersect(&other.width)?,
            height: self.height.intersect(&other.height)?,
            bitstream: self.bitstream.intersect(&other.bitstream)?,
        })
    }
}

/// Capabilities of one side of a port link.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Caps {
    /// Audio stream.
    Audio(AudioCaps),
    /// Video stream.
    Video(VideoCaps),
    /// Any other stream, identified by mime only.
    Other(Constraint<String>),
    /// Accepts everything.
    #[default]
    Any,
}

impl Caps {
    /// Caps describing exactly what a track carries.
    ///
    /// Video bitstream layouts are offered as a list so the peer can pick.
    pub fn from_track(track: &TrackInfo) -> Self {
        let mime = Constraint::Fixed(track.mime.clone());
        match (track.kind(), &track.audio, &track.video) {
            (MediaKind::Audio, Some(audio), _) => Caps::Audio(AudioCaps {
                mime,
                sample_rate: audio.sample_rate.into(),
                channels: audio.channels.into(),
            }),
            (MediaKind::Video, _, Some(video)) => {
                let bitstream = match video.bitstream_formats.len() {
                    0 => Constraint::Any,
                    1 => Constraint::Fixed(video.bitstream_formats[0]),
                    _ => Constraint::List(video.bitstream_formats.to_vec()),
                };
                Caps::Video(VideoCaps {
                    mime,
                    width: video.width.into(),
                    height: video.height.into(),
                    bitstream,
                })
            }
            _ => Caps::Other(mime),
        }
    }

    /// Check if these caps accept anything.
    pub fn is_any(&self) -> bool {
        matches!(self, Caps::Any)
    }

    /// Intersect two caps, `None` if nothing is acceptable to both.
    pub fn intersect(&self, other: &Self) -> Option<Self> {
        match (self, other) {
            (Caps::Any, c) | (c, Caps::Any) => Some(c.clone()),
            (Caps::Audio(a), Caps::Audio(b)) => a.intersect(b).map(Caps::Audio),
            (Caps::Video(a), Caps::Video(b)) => a.intersect(b).map(Caps::Video),
            (Caps::Other(a), Caps::Other(b)) => a.intersect(b).map(Caps::Other),
            _ => None,
        }
    }
}
