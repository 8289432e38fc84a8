//! Subfingerprint generation
//!
//! Pulls chroma frames from the audio source and pushes each one through
//! the temporal filter, the integral image and the classifier ensemble,
//! one frame at a time on the calling thread.

use crate::audio::AudioSource;
use crate::chroma::ChromaExtractor;
use crate::classifier::ClassifierEnsemble;
use crate::emitter::{BatchEmitter, FingerprintSink, SubFingerprint, Subscription};
use crate::error::{Error, Result};
use crate::filter::{normalize, ChromaFilter};
use crate::hash;
use crate::integral_image::IntegralImage;
use crate::profile::{Profile, CHROMA_BINS};
use crate::ring_buffer::RingBuffer;
use std::sync::Arc;
use std::time::{Duration, Instant};


/// Outcome of one generator run
#[derive(Debug, Clone)]
pub struct GenerationSummary {
    pub track: Arc<str>,
    pub chroma_frames: u64,
    pub subfingerprints: u64,
    pub elapsed: Duration,
}

/// Generates the fingerprint of a single track
pub struct FingerprintGenerator<'a> {
    profile: &'a Profile,
    ensemble: ClassifierEnsemble,
    track: Arc<str>,
    subscription: Subscription<'a>,
}

impl<'a> FingerprintGenerator<'a> {
    /// Validate `profile` and prepare a generator for `track`.
    ///
    /// Without [`subscribe`](Self::subscribe) the subfingerprints are
    /// computed and discarded.
    pub fn new(profile: &'a Profile, track: impl Into<Arc<str>>) -> Result<Self> {
        profile.validate()?;
        let ensemble = profile.ensemble()?;

        Ok(Self {
            profile,
            ensemble,
            track: track.into(),
            subscription: Subscription::None,
        })
    }

    /// Deliver batches to `sink`
    pub fn subscribe(mut self, sink: impl FingerprintSink + 'a) -> Self {
        self.subscription = Subscription::Sink(Box::new(sink));
        self
    }

    /// Run the pipeline until `source` is exhausted.
    ///
    /// Source errors abort the track; batches delivered before the error
    /// stay valid but no completion is signalled.
    pub fn generate<S: AudioSource>(self, mut source: S) -> Result<GenerationSummary> {
        let profile = self.profile;
        if source.sample_rate() != profile.sample_rate {
            return Err(Error::SampleRateMismatch {
                expected: profile.sample_rate,
                actual: source.sample_rate(),
            });
        }

        let start = Instant::now();
        let total = profile.expected_subfingerprints(source.total_samples());
        let max_width = self.ensemble.max_width();

        log::info!(
            "{}: generating with profile '{}' ({} samples, {} subfingerprints expected)",
            self.track,
            profile.name,
            source.total_samples(),
            total
        );

        let mut extractor = ChromaExtractor::new(profile);
        let filter = ChromaFilter::new(&profile.filter_coefficients);
        let mut window = RingBuffer::new(filter.taps(), CHROMA_BINS);
        let mut image = IntegralImage::new(CHROMA_BINS, max_width);
        let mut emitter = BatchEmitter::new(Arc::clone(&self.track), total, self.subscription);

        let mut chroma = [0.0; CHROMA_BINS];
        let mut filtered = [0.0; CHROMA_BINS];
        let mut chroma_frames = 0u64;
        let mut index = 0u32;

        while source.has_more() && extractor.next_frame(&mut source, &mut chroma)? {
            chroma_frames += 1;

            window.push(&chroma);
            if !window.is_full() {
                continue;
            }

            filter.apply(&window, &mut filtered);
            normalize(&mut filtered, profile.normalization_threshold);
            image.add_column(&filtered);
            if image.columns() < max_width as u64 {
                continue;
            }

            let hash = hash::assemble(self.ensemble.classify(&image));
            emitter.push(SubFingerprint::new(index, hash))?;
            index += 1;
        }

        let subfingerprints = emitter.finish()?;
        let elapsed = start.elapsed();

        log::info!(
            "{}: {} subfingerprints from {} chroma frames in {:.2}s",
            self.track,
            subfingerprints,
            chroma_frames,
            elapsed.as_secs_f64()
        );

        Ok(GenerationSummary {
            track: self.track,
            chroma_frames,
            subfingerprints,
            elapsed,
        })
    }
}
