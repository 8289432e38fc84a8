//! audioprint core - chroma-based audio fingerprinting
//!
//! Turns a mono sample stream into a sequence of 32-bit subfingerprints,
//! one per analysis hop, for identifying recordings and aligning them in
//! time.

pub mod audio;
pub mod chroma;
pub mod classifier;
pub mod emitter;
pub mod error;
pub mod filter;
pub mod generator;
pub mod hash;
pub mod integral_image;
pub mod profile;
pub mod ring_buffer;

pub use audio::{AudioSource, MemorySource, PcmFormat, RawPcmSource};
pub use emitter::{
    Batch, ChannelSink, CollectingSink, FingerprintSink, SinkEvent, SubFingerprint, BATCH_SIZE,
};
pub use error::{Error, Result};
pub use generator::{FingerprintGenerator, GenerationSummary};
pub use profile::{Profile, ProfileName};

/// Generate the complete fingerprint of one track in memory
pub fn generate_fingerprint<S: AudioSource>(
    source: S,
    profile: &Profile,
) -> Result<Vec<SubFingerprint>> {
    let mut collected = CollectingSink::default();

    FingerprintGenerator::new(profile, "memory")?
        .subscribe(&mut collected)
        .generate(source)?;

    Ok(collected.entries)
}
