//! Media packaging core: cue alignment, segmentation and sample
//! encryption.
//!
//! Streams enter as timed samples and cue markers, one worker thread per
//! stream. A [`CueAlignmentHandler`] per stream lines every rendition up
//! on the same cue instants through a shared [`SyncPointQueue`], a
//! [`ChunkingHandler`] buckets the aligned output into segments, and an
//! optional [`EncryptingSink`] applies one of the common-encryption
//! protection schemes before the samples reach the downstream writer.
//!
//! The cipher primitives live in the `cuepack-crypto` crate and are
//! re-exported here for callers that drive them directly.

mod chunking;
mod cue_alignment;
mod encrypt;
mod error;
mod handler;
mod key_source;
mod pipeline;
mod stream;
mod sync_point_queue;

pub use chunking::{ChunkingHandler, ChunkingParams};
pub use cue_alignment::CueAlignmentHandler;
pub use cuepack_crypto::{
    AES_BLOCK_SIZE, BlockCipherCore, CbcCryptor, CbcPadding, CryptDirection, CryptError, Cryptor,
    CtrCryptor, IvPolicy, PatternCryptor, PatternPolicy, SampleCrypter, SampleCryptor,
    SubsampleEntry,
};
pub use encrypt::{EncryptingSink, ProtectionScheme};
pub use error::{PipelineError, Result};
pub use handler::{CollectingSink, MediaSink, SinkEvent};
pub use key_source::{EncryptionKeyMaterial, KeySource, RawKeySource, decode_kid};
pub use pipeline::{Pipeline, StreamEvent};
pub use stream::{CryptInfo, CueEvent, MediaSample, SegmentInfo, StreamInfo, StreamKind};
pub use sync_point_queue::{NO_MORE_CUES, SyncPointQueue};
