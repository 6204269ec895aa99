//! Stream data model: samples, cues, segments.

use cuepack_crypto::SubsampleEntry;

/// Kind of media a stream carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Audio,
    Video,
    Text,
}

/// Static description of one input stream, delivered before any sample.
#[derive(Debug, Clone)]
pub struct StreamInfo {
    /// Index of the stream within the job, used in diagnostics.
    pub index: usize,
    pub kind: StreamKind,
    /// Time scale in units per second; all sample timestamps are expressed
    /// in these units.
    pub time_scale: u32,
    pub codec: String,
}

impl StreamInfo {
    pub fn new(index: usize, kind: StreamKind, time_scale: u32, codec: impl Into<String>) -> Self {
        Self {
            index,
            kind,
            time_scale,
            codec: codec.into(),
        }
    }
}

/// Encryption side-channel attached to a sample: which key encrypted it,
/// under which IV, and which byte ranges are clear vs encrypted.
#[derive(Debug, Clone)]
pub struct CryptInfo {
    pub key_id: [u8; 16],
    pub iv: Vec<u8>,
    pub subsamples: Vec<SubsampleEntry>,
}

/// One unit of media data. Immutable once constructed; shared between
/// pipeline stages behind an `Arc`.
#[derive(Debug, Clone)]
pub struct MediaSample {
    pub data: Vec<u8>,
    /// Presentation timestamp in stream time-scale units.
    pub pts: i64,
    /// Decode timestamp in stream time-scale units.
    pub dts: i64,
    pub duration: i64,
    pub is_key_frame: bool,
    pub crypt_info: Option<CryptInfo>,
}

impl MediaSample {
    pub fn new(data: Vec<u8>, pts: i64, dts: i64, duration: i64, is_key_frame: bool) -> Self {
        Self {
            data,
            pts,
            dts,
            duration,
            is_key_frame,
            crypt_info: None,
        }
    }

    /// Presentation end time in stream time-scale units.
    pub fn end_time(&self) -> i64 {
        self.pts + self.duration
    }

    /// Presentation time in seconds for a given time scale.
    pub fn time_in_seconds(&self, time_scale: u32) -> f64 {
        self.pts as f64 / time_scale as f64
    }

    /// Presentation end time in seconds for a given time scale.
    pub fn end_time_in_seconds(&self, time_scale: u32) -> f64 {
        self.end_time() as f64 / time_scale as f64
    }
}

/// A point-in-time marker (ad insertion, chapter boundary) that must land at
/// the same presentation instant on every stream.
#[derive(Debug, Clone, PartialEq)]
pub struct CueEvent {
    pub time_in_seconds: f64,
}

impl CueEvent {
    pub fn new(time_in_seconds: f64) -> Self {
        Self { time_in_seconds }
    }
}

/// Describes a completed segment or subsegment. Emitted downstream after
/// the samples it covers; a hard boundary for the segment writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentInfo {
    /// Start timestamp in stream time-scale units.
    pub start_timestamp: i64,
    /// Duration in stream time-scale units.
    pub duration: i64,
    pub is_subsegment: bool,
    /// Low-latency chunk flag; implies `is_subsegment`.
    pub is_chunk: bool,
}
