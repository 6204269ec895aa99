//! Segment and subsegment boundaries.
//!
//! Buckets a stream's samples into fixed-duration segments by elapsed
//! presentation time. Cues force a segment boundary and restart the
//! bucketing clock, so every rendition cuts at the same instant.

use std::sync::Arc;

use log::debug;

use crate::{
    error::{PipelineError, Result},
    handler::MediaSink,
    stream::{CueEvent, MediaSample, SegmentInfo, StreamInfo},
};

/// Segmentation settings, durations in seconds.
#[derive(Debug, Clone)]
pub struct ChunkingParams {
    pub segment_duration_in_seconds: f64,
    /// Finer-grained subsegment duration; `None` disables subsegments.
    pub subsegment_duration_in_seconds: Option<f64>,
    /// Low-latency mode: every sample closes a subsegment marked as a
    /// chunk, so the writer can ship partial segments.
    pub low_latency_chunking: bool,
}

impl ChunkingParams {
    pub fn new(segment_duration_in_seconds: f64) -> Self {
        Self {
            segment_duration_in_seconds,
            subsegment_duration_in_seconds: None,
            low_latency_chunking: false,
        }
    }

    pub fn with_subsegments(mut self, duration_in_seconds: f64) -> Self {
        self.subsegment_duration_in_seconds = Some(duration_in_seconds);
        self
    }

    pub fn with_low_latency_chunking(mut self) -> Self {
        self.low_latency_chunking = true;
        self
    }
}

pub struct ChunkingHandler<S: MediaSink> {
    params: ChunkingParams,
    downstream: S,
    time_scale: u32,
    stream_index: usize,
    /// Segment duration in stream time-scale units; set by `on_stream_info`.
    segment_duration: i64,
    subsegment_duration: Option<i64>,
    current_segment_index: Option<i64>,
    current_subsegment_index: Option<i64>,
    segment_start: i64,
    subsegment_start: i64,
    /// Largest sample end time seen in the open segment.
    max_end_time: i64,
    /// Timestamp of the last cue; segment indices restart relative to it.
    cue_offset: i64,
}

impl<S: MediaSink> ChunkingHandler<S> {
    pub fn new(params: ChunkingParams, downstream: S) -> Self {
        Self {
            params,
            downstream,
            time_scale: 0,
            stream_index: 0,
            segment_duration: 0,
            subsegment_duration: None,
            current_segment_index: None,
            current_subsegment_index: None,
            segment_start: 0,
            subsegment_start: 0,
            max_end_time: 0,
            cue_offset: 0,
        }
    }

    /// Segment index of a timestamp, relative to the last cue. Timestamps
    /// behind the cue offset can only come from a slight PTS regression at
    /// an overlap and stay in the first bucket.
    fn segment_index(&self, pts: i64) -> i64 {
        if pts < self.cue_offset {
            return 0;
        }
        (pts - self.cue_offset) / self.segment_duration
    }

    fn subsegment_index(&self, pts: i64, duration: i64) -> i64 {
        if pts < self.subsegment_start {
            return 0;
        }
        (pts - self.subsegment_start) / duration
    }

    fn end_subsegment_if_started(&mut self, is_chunk: bool) -> Result<()> {
        if self.current_subsegment_index.take().is_none() {
            return Ok(());
        }

        self.downstream.on_segment(SegmentInfo {
            start_timestamp: self.subsegment_start,
            duration: self.max_end_time - self.subsegment_start,
            is_subsegment: true,
            is_chunk,
        })
    }

    fn end_segment_if_started(&mut self) -> Result<()> {
        if self.current_segment_index.take().is_none() {
            return Ok(());
        }

        self.end_subsegment_if_started(self.params.low_latency_chunking)?;

        let duration = self.max_end_time - self.segment_start;
        debug!(
            "stream {}: segment at {} lasting {} units",
            self.stream_index, self.segment_start, duration
        );
        self.downstream.on_segment(SegmentInfo {
            start_timestamp: self.segment_start,
            duration,
            is_subsegment: false,
            is_chunk: false,
        })
    }

    fn start_segment(&mut self, pts: i64) {
        self.current_segment_index = Some(self.segment_index(pts));
        self.segment_start = pts;
        self.subsegment_start = pts;
        self.max_end_time = pts;
    }
}

impl<S: MediaSink> MediaSink for ChunkingHandler<S> {
    fn on_stream_info(&mut self, info: &StreamInfo) -> Result<()> {
        self.time_scale = info.time_scale;
        self.stream_index = info.index;
        self.segment_duration =
            (self.params.segment_duration_in_seconds * info.time_scale as f64).round() as i64;
        self.subsegment_duration = self
            .params
            .subsegment_duration_in_seconds
            .map(|d| (d * info.time_scale as f64).round() as i64);

        if self.segment_duration <= 0 {
            return Err(PipelineError::InvalidSegmentDuration { stream: info.index });
        }

        self.downstream.on_stream_info(info)
    }

    fn on_sample(&mut self, sample: Arc<MediaSample>) -> Result<()> {
        // Durations are only scaled once the stream info arrives; bucketing
        // a sample before that would divide by zero.
        if self.segment_duration == 0 {
            return Err(PipelineError::MissingStreamInfo);
        }

        let pts = sample.pts;

        match self.current_segment_index {
            // First sample overall, or first after a cue: always starts a
            // fresh segment.
            None => self.start_segment(pts),
            Some(current) => {
                let index = self.segment_index(pts);

                // A back-step of exactly one index is a tolerated PTS
                // regression at an overlap and stays in the open segment;
                // anything else at a key frame cuts a new one.
                if sample.is_key_frame && index != current && index != current - 1 {
                    self.end_segment_if_started()?;
                    self.start_segment(pts);
                } else if let Some(duration) = self.subsegment_duration {
                    let sub = self.subsegment_index(pts, duration);
                    if self.current_subsegment_index.is_some_and(|c| sub != c) {
                        self.end_subsegment_if_started(self.params.low_latency_chunking)?;
                        self.subsegment_start = pts;
                    }
                }
            }
        }

        if self.params.low_latency_chunking {
            // Every sample becomes its own shippable chunk.
            self.end_subsegment_if_started(true)?;
            self.subsegment_start = pts;
        }

        if self.subsegment_duration.is_some() || self.params.low_latency_chunking {
            let duration = self.subsegment_duration.unwrap_or(i64::MAX);
            self.current_subsegment_index = Some(self.subsegment_index(pts, duration));
        }

        self.max_end_time = self.max_end_time.max(sample.end_time());
        self.downstream.on_sample(sample)
    }

    fn on_cue(&mut self, cue: Arc<CueEvent>) -> Result<()> {
        // A cue is a hard boundary: close whatever is open and restart
        // segment numbering from the cue time.
        self.end_segment_if_started()?;
        self.cue_offset = (cue.time_in_seconds * self.time_scale as f64).round() as i64;
        self.downstream.on_cue(cue)
    }

    fn on_segment(&mut self, segment: SegmentInfo) -> Result<()> {
        self.downstream.on_segment(segment)
    }

    fn on_flush(&mut self) -> Result<()> {
        self.end_segment_if_started()?;
        self.downstream.on_flush()
    }
}
