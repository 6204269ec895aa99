//! Cross-stream cue alignment.
//!
//! One handler per input stream, all sharing one [`SyncPointQueue`]. A
//! video stream confirms cue candidates at key frames; other streams hold
//! their samples back until the confirmed time is known, then everyone
//! emits the cue at the identical presentation time.

use std::{collections::VecDeque, sync::Arc};

use log::debug;

use crate::{
    error::{PipelineError, Result},
    handler::MediaSink,
    stream::{CueEvent, MediaSample, SegmentInfo, StreamInfo, StreamKind},
    sync_point_queue::SyncPointQueue,
};

/// Cap on buffered samples per stream. Exceeding it means the input is so
/// badly multiplexed that a cue can never line up.
const MAX_BUFFERED_SAMPLES: usize = 1000;

pub struct CueAlignmentHandler<S: MediaSink> {
    sync_points: Arc<SyncPointQueue>,
    downstream: S,
    info: Option<StreamInfo>,
    samples: VecDeque<Arc<MediaSample>>,
    cues: VecDeque<Arc<CueEvent>>,
    /// Next cue candidate time every stream is converging on.
    hint: f64,
    /// Time of the last sync point this stream consumed.
    last_sync_time: f64,
    /// High-water mark of text sample end times; a trailing cue inside a
    /// text sample's span is still meaningful at flush.
    max_text_sample_end_time: f64,
    flushed: bool,
}

impl<S: MediaSink> CueAlignmentHandler<S> {
    /// Create the handler and register its thread with the queue. Handlers
    /// for all streams must be constructed before any of them gets data,
    /// otherwise the waiting consensus can promote too early.
    pub fn new(sync_points: Arc<SyncPointQueue>, downstream: S) -> Self {
        sync_points.add_thread();

        Self {
            sync_points,
            downstream,
            info: None,
            samples: VecDeque::new(),
            cues: VecDeque::new(),
            hint: f64::NEG_INFINITY,
            last_sync_time: f64::NEG_INFINITY,
            max_text_sample_end_time: 0.0,
            flushed: false,
        }
    }

    fn stream_index(&self) -> usize {
        self.info.as_ref().map(|i| i.index).unwrap_or(0)
    }

    fn require_info(&self) -> Result<&StreamInfo> {
        self.info.as_ref().ok_or(PipelineError::MissingStreamInfo)
    }

    fn sample_time(&self, sample: &MediaSample) -> f64 {
        let scale = self.info.as_ref().map(|i| i.time_scale).unwrap_or(1);
        sample.time_in_seconds(scale)
    }

    /// Adopt a newly confirmed sync point: queue the cue for this stream,
    /// advance the shared hint past it, and release what that unblocks.
    fn use_new_sync_point(&mut self, cue: Arc<CueEvent>) -> Result<()> {
        self.last_sync_time = cue.time_in_seconds;
        self.hint = self.sync_points.get_hint(cue.time_in_seconds);
        self.cues.push_back(cue);
        self.run_through_samples()
    }

    /// Merge the buffered cue and sample queues in presentation order,
    /// releasing samples below the hint. A sample strictly earlier than the
    /// next cue goes first; the cue goes out as soon as no earlier sample
    /// remains.
    fn run_through_samples(&mut self) -> Result<()> {
        loop {
            let emit_sample = match (self.cues.front(), self.samples.front()) {
                (Some(cue), Some(sample)) => self.sample_time(sample) < cue.time_in_seconds,
                _ => break,
            };

            if emit_sample {
                if let Some(sample) = self.samples.pop_front() {
                    self.downstream.on_sample(sample)?;
                }
            } else if let Some(cue) = self.cues.pop_front() {
                self.downstream.on_cue(cue)?;
            }
        }

        while self
            .samples
            .front()
            .is_some_and(|s| self.sample_time(s) < self.hint)
        {
            if let Some(sample) = self.samples.pop_front() {
                self.downstream.on_sample(sample)?;
            }
        }

        Ok(())
    }

    fn buffer_sample(&mut self, sample: Arc<MediaSample>) -> Result<()> {
        self.samples.push_back(sample);

        if self.samples.len() > MAX_BUFFERED_SAMPLES {
            return Err(PipelineError::BufferOverflow {
                stream: self.stream_index(),
                limit: MAX_BUFFERED_SAMPLES,
            });
        }

        Ok(())
    }

    fn on_video_sample(&mut self, sample: Arc<MediaSample>) -> Result<()> {
        let sample_time = self.sample_time(&sample);

        if sample.is_key_frame && sample_time >= self.hint {
            let Some(cue) = self.sync_points.promote_at(sample_time) else {
                if self.sync_points.is_cancelled() {
                    return Err(PipelineError::Cancelled);
                }
                return Err(PipelineError::NotGopAligned {
                    stream: self.stream_index(),
                    seconds: sample_time,
                });
            };
            self.use_new_sync_point(cue)?;
        }

        self.buffer_sample(sample)?;
        self.run_through_samples()
    }

    fn on_non_video_sample(&mut self, sample: Arc<MediaSample>) -> Result<()> {
        self.buffer_sample(sample)?;
        self.run_through_samples()?;
        self.wait_for_sync_points()
    }

    /// Block on the shared queue while this stream holds samples at or past
    /// the hint. `get_next` returns once the video stream promotes, or, if
    /// every thread ends up here, by consensus at the hint.
    fn wait_for_sync_points(&mut self) -> Result<()> {
        while !self.samples.is_empty() && self.sync_points.has_more(self.hint) {
            match self.sync_points.get_next(self.hint) {
                Some(cue) => self.use_new_sync_point(cue)?,
                None => return Err(PipelineError::Cancelled),
            }
        }
        Ok(())
    }

    /// A text stream covers time with sample spans, not timestamps alone:
    /// a cue anywhere inside an already seen span still has to split it, so
    /// at flush the handler drains promotable cues up to the span
    /// high-water mark.
    fn drain_text_cues(&mut self) -> Result<()> {
        while self.hint < self.max_text_sample_end_time && self.sync_points.has_more(self.hint) {
            match self.sync_points.get_next(self.hint) {
                Some(cue) => {
                    self.last_sync_time = cue.time_in_seconds;
                    self.hint = self.sync_points.get_hint(cue.time_in_seconds);
                    self.cues.push_back(cue);
                }
                None => return Err(PipelineError::Cancelled),
            }
        }
        Ok(())
    }
}

impl<S: MediaSink> MediaSink for CueAlignmentHandler<S> {
    fn on_stream_info(&mut self, info: &StreamInfo) -> Result<()> {
        self.info = Some(info.clone());
        self.hint = self.sync_points.get_hint(f64::NEG_INFINITY);
        self.downstream.on_stream_info(info)
    }

    fn on_sample(&mut self, sample: Arc<MediaSample>) -> Result<()> {
        let info = self.require_info()?;
        let kind = info.kind;

        if kind == StreamKind::Text {
            let end = sample.end_time_in_seconds(info.time_scale);
            if end > self.max_text_sample_end_time {
                self.max_text_sample_end_time = end;
            }
        }

        match kind {
            StreamKind::Video => self.on_video_sample(sample),
            StreamKind::Audio | StreamKind::Text => self.on_non_video_sample(sample),
        }
    }

    /// An upstream cue request. The time becomes a shared candidate; the
    /// promoted cue comes back to every stream through the queue.
    fn on_cue(&mut self, cue: Arc<CueEvent>) -> Result<()> {
        self.sync_points.add_candidate(cue.time_in_seconds);
        self.hint = self.sync_points.get_hint(self.last_sync_time);
        self.run_through_samples()?;

        match self.require_info()?.kind {
            StreamKind::Video => Ok(()),
            StreamKind::Audio | StreamKind::Text => self.wait_for_sync_points(),
        }
    }

    fn on_segment(&mut self, segment: SegmentInfo) -> Result<()> {
        // Segments are produced downstream of this handler; pass through.
        self.downstream.on_segment(segment)
    }

    fn on_flush(&mut self) -> Result<()> {
        if self.flushed {
            return Ok(());
        }
        self.flushed = true;

        let is_text = self
            .info
            .as_ref()
            .map(|i| i.kind == StreamKind::Text)
            .unwrap_or(false);

        if is_text {
            self.drain_text_cues()?;
        }
        self.run_through_samples()?;

        // End of this stream: everything still buffered goes out, hint or
        // no hint.
        while let Some(sample) = self.samples.pop_front() {
            self.downstream.on_sample(sample)?;
        }

        // Trailing cues would only produce empty segments, except for text,
        // where a cue inside an already seen sample span still splits it.
        while let Some(cue) = self.cues.pop_front() {
            if is_text && cue.time_in_seconds < self.max_text_sample_end_time {
                self.downstream.on_cue(cue)?;
            } else {
                debug!(
                    "stream {}: discarding trailing cue at {}s",
                    self.stream_index(),
                    cue.time_in_seconds
                );
            }
        }

        self.sync_points.remove_thread();
        self.downstream.on_flush()
    }
}
