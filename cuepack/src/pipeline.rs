//! Multi-stream pipeline driver.
//!
//! Spawns one worker thread per input stream, each running its own
//! alignment → chunking (→ encryption) chain into a caller-supplied sink.
//! The shared [`SyncPointQueue`] is the only lock between workers; an error
//! on any stream cancels the queue so every other worker unwinds promptly.

use std::{
    sync::{
        Arc,
        mpsc::{Receiver, Sender, channel},
    },
    thread::{self, JoinHandle},
};

use log::error;

use crate::{
    chunking::{ChunkingHandler, ChunkingParams},
    cue_alignment::CueAlignmentHandler,
    encrypt::{EncryptingSink, ProtectionScheme},
    error::{PipelineError, Result},
    handler::MediaSink,
    key_source::EncryptionKeyMaterial,
    stream::{CueEvent, MediaSample, StreamInfo},
    sync_point_queue::SyncPointQueue,
};

/// One input event on a stream, pushed through its channel. End-of-stream
/// is signalled by dropping the sender.
pub enum StreamEvent {
    Sample(Arc<MediaSample>),
    Cue(Arc<CueEvent>),
}

pub struct Pipeline {
    sync_points: Arc<SyncPointQueue>,
    workers: Vec<JoinHandle<Result<()>>>,
}

impl Pipeline {
    /// Create a pipeline with the cue times known up front. More cues can
    /// arrive later as [`StreamEvent::Cue`] on any stream.
    pub fn new(cue_times_in_seconds: impl IntoIterator<Item = f64>) -> Self {
        Self {
            sync_points: Arc::new(SyncPointQueue::new(cue_times_in_seconds)),
            workers: Vec::new(),
        }
    }

    pub fn sync_points(&self) -> &Arc<SyncPointQueue> {
        &self.sync_points
    }

    /// Add a clear stream. All streams must be added before any sender is
    /// fed, so the queue knows how many threads participate in the waiting
    /// consensus.
    pub fn add_stream<S>(
        &mut self,
        info: &StreamInfo,
        params: ChunkingParams,
        sink: S,
    ) -> Result<Sender<StreamEvent>>
    where
        S: MediaSink + Send + 'static,
    {
        let chain = ChunkingHandler::new(params, sink);
        self.spawn(info, chain)
    }

    /// Add a stream whose samples are encrypted after chunking.
    pub fn add_encrypted_stream<S>(
        &mut self,
        info: &StreamInfo,
        params: ChunkingParams,
        scheme: ProtectionScheme,
        material: &EncryptionKeyMaterial,
        sink: S,
    ) -> Result<Sender<StreamEvent>>
    where
        S: MediaSink + Send + 'static,
    {
        let chain = ChunkingHandler::new(params, EncryptingSink::new(scheme, material, sink)?);
        self.spawn(info, chain)
    }

    fn spawn<S>(&mut self, info: &StreamInfo, downstream: S) -> Result<Sender<StreamEvent>>
    where
        S: MediaSink + Send + 'static,
    {
        // The alignment handler registers with the queue here, on the
        // caller's thread, before any worker can pump data.
        let mut chain = CueAlignmentHandler::new(self.sync_points.clone(), downstream);
        chain.on_stream_info(info)?;

        let (tx, rx) = channel();
        let sync_points = self.sync_points.clone();
        let stream_index = info.index;
        self.workers.push(thread::spawn(move || {
            run_worker(chain, rx, sync_points, stream_index)
        }));

        Ok(tx)
    }

    /// Cancel all workers cooperatively.
    pub fn cancel(&self) {
        self.sync_points.cancel();
    }

    /// Wait for every worker and report the first real failure, if any.
    /// Cancellation results are not failures.
    pub fn finish(self) -> Result<()> {
        let mut first_error = None;

        for worker in self.workers {
            match worker.join() {
                Ok(Ok(())) => {}
                Ok(Err(e)) if e.is_cancelled() => {}
                Ok(Err(e)) => {
                    first_error.get_or_insert(e);
                }
                Err(_) => {
                    self.sync_points.cancel();
                    first_error.get_or_insert(PipelineError::WorkerPanicked);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

fn run_worker<H: MediaSink>(
    mut chain: H,
    rx: Receiver<StreamEvent>,
    sync_points: Arc<SyncPointQueue>,
    stream_index: usize,
) -> Result<()> {
    let result = pump(&mut chain, &rx).and_then(|_| chain.on_flush());

    if let Err(e) = &result {
        // Cancellation is cooperative shutdown, not a failure; anything
        // else takes the whole job down.
        if !e.is_cancelled() {
            error!("stream {stream_index}: {e}");
            sync_points.cancel();
        }
    }

    result
}

fn pump<H: MediaSink>(chain: &mut H, rx: &Receiver<StreamEvent>) -> Result<()> {
    for event in rx.iter() {
        match event {
            StreamEvent::Sample(sample) => chain.on_sample(sample)?,
            StreamEvent::Cue(cue) => chain.on_cue(cue)?,
        }
    }
    Ok(())
}
