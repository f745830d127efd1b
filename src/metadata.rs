//! Buffer metadata types.

use std::ops::{BitOr, BitOrAssign};

/// Flags indicating buffer properties.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct BufferFlags(u32);

impl BufferFlags {
    /// No flags.
    pub const NONE: Self = Self(0);
    /// Buffer marks end of stream.
    pub const EOS: Self = Self(1 << 0);
    /// Buffer starts with a sync point (key frame).
    pub const KEY_FRAME: Self = Self(1 << 1);
    /// Buffer carries codec configuration rather than media.
    pub const CODEC_CONFIG: Self = Self(1 << 2);
    /// Buffer holds only part of a frame.
    pub const PARTIAL_FRAME: Self = Self(1 << 3);

    /// Create empty flags.
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Raw bit representation.
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Check if empty.
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Check if all bits of `other` are set.
    pub const fn contains(self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }

    /// Union of flags.
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Set the bits of `other`.
    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    /// Clear the bits of `other`.
    pub fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }
}

impl BitOr for BufferFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

impl BitOrAssign for BufferFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.insert(rhs);
    }
}

/// Audio properties of a decoded or encoded audio buffer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AudioMeta {
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Number of channels.
    pub channels: u16,
    /// Samples per channel in this buffer, if known.
    pub samples_per_channel: Option<u32>,
}

/// Video properties of a video buffer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VideoMeta {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

/// Typed metadata block attached to a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferMeta {
    /// Audio buffer properties.
    Audio(AudioMeta),
    /// Video buffer properties.
    Video(VideoMeta),
}

/// Metadata associated with a buffer.
///
/// Timestamps and durations are in microseconds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    /// Presentation timestamp.
    pub pts: i64,

    /// Decode timestamp.
    pub dts: i64,

    /// Duration of this buffer's content.
    pub duration: i64,

    /// Elementary stream this buffer belongs to.
    pub track_id: u32,

    /// Buffer flags.
    pub flags: BufferFlags,

    /// Optional typed audio/video block.
    pub meta: Option<BufferMeta>,
}

impl Metadata {
    /// Create new metadata with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create metadata for a track.
    pub fn for_track(track_id: u32) -> Self {
        Self {
            track_id,
            ..Default::default()
        }
    }

    /// Set both timestamps.
    pub fn with_timestamps(mut self, pts: i64, dts: i64) -> Self {
        self.pts = pts;
        self.dts = dts;
        self
    }

    /// Set the duration.
    pub fn with_duration(mut self, duration: i64) -> Self {
        self.duration = duration;
        self
    }

    /// Add flags.
    pub fn with_flags(mut self, flags: BufferFlags) -> Self {
        self.flags |= flags;
        self
    }

    /// Mark as end-of-stream.
    pub fn with_eos(self) -> Self {
        self.with_flags(BufferFlags::EOS)
    }

    /// Attach a typed metadata block.
    pub fn with_meta(mut self, meta: BufferMeta) -> Self {
        self.meta = Some(meta);
        self
    }

    /// Check the end-of-stream flag.
    pub fn is_eos(&self) -> bool {
        self.flags.contains(BufferFlags::EOS)
    }
}
