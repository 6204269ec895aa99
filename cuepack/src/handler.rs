//! The sink trait connecting pipeline stages.

use std::sync::Arc;

use crate::{
    error::Result,
    stream::{CueEvent, MediaSample, SegmentInfo, StreamInfo},
};

/// Downstream stage of the pipeline. Handlers forward to the next sink in
/// the chain; the final sink is the segment writer.
///
/// Per stream, calls arrive in this order: `on_stream_info` exactly once,
/// then interleaved `on_sample`/`on_cue`/`on_segment` strictly ordered by
/// presentation time, then `on_flush` exactly once.
pub trait MediaSink {
    fn on_stream_info(&mut self, info: &StreamInfo) -> Result<()>;
    fn on_sample(&mut self, sample: Arc<MediaSample>) -> Result<()>;
    fn on_cue(&mut self, cue: Arc<CueEvent>) -> Result<()>;
    fn on_segment(&mut self, segment: SegmentInfo) -> Result<()>;
    fn on_flush(&mut self) -> Result<()>;
}

/// One recorded sink call.
#[derive(Debug, Clone)]
pub enum SinkEvent {
    StreamInfo(StreamInfo),
    Sample(Arc<MediaSample>),
    Cue(Arc<CueEvent>),
    Segment(SegmentInfo),
    Flush,
}

/// Recording sink for tests and inspection.
#[derive(Default)]
pub struct CollectingSink {
    pub events: Vec<SinkEvent>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded samples, in emission order.
    pub fn samples(&self) -> Vec<Arc<MediaSample>> {
        self.events
            .iter()
            .filter_map(|e| match e {
                SinkEvent::Sample(s) => Some(s.clone()),
                _ => None,
            })
            .collect()
    }

    /// All recorded cues, in emission order.
    pub fn cues(&self) -> Vec<Arc<CueEvent>> {
        self.events
            .iter()
            .filter_map(|e| match e {
                SinkEvent::Cue(c) => Some(c.clone()),
                _ => None,
            })
            .collect()
    }

    /// All recorded segment boundaries, in emission order.
    pub fn segments(&self) -> Vec<SegmentInfo> {
        self.events
            .iter()
            .filter_map(|e| match e {
                SinkEvent::Segment(s) => Some(s.clone()),
                _ => None,
            })
            .collect()
    }
}

impl MediaSink for CollectingSink {
    fn on_stream_info(&mut self, info: &StreamInfo) -> Result<()> {
        self.events.push(SinkEvent::StreamInfo(info.clone()));
        Ok(())
    }

    fn on_sample(&mut self, sample: Arc<MediaSample>) -> Result<()> {
        self.events.push(SinkEvent::Sample(sample));
        Ok(())
    }

    fn on_cue(&mut self, cue: Arc<CueEvent>) -> Result<()> {
        self.events.push(SinkEvent::Cue(cue));
        Ok(())
    }

    fn on_segment(&mut self, segment: SegmentInfo) -> Result<()> {
        self.events.push(SinkEvent::Segment(segment));
        Ok(())
    }

    fn on_flush(&mut self) -> Result<()> {
        self.events.push(SinkEvent::Flush);
        Ok(())
    }
}
