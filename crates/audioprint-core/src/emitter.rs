//! Subfingerprint batching and delivery
//!
//! Subfingerprints are handed to a [`FingerprintSink`] in batches of
//! [`BATCH_SIZE`], followed by a final (possibly short or empty) batch and
//! one completion call. Delivery is synchronous on the generating thread;
//! use [`ChannelSink`] to move slow consumers onto their own thread.

use crate::error::{Error, Result};
use crate::profile::Profile;
use serde::{Deserialize, Serialize};
use std::mem;
use std::sync::Arc;

pub const BATCH_SIZE: usize = 512;

/// One hash per time frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubFingerprint {
    /// Position in the fingerprint, contiguous from 0
    pub index: u32,
    pub hash: u32,
    /// Free for caller use, never set by the generator
    #[serde(default)]
    pub flagged: bool,
}

impl SubFingerprint {
    pub fn new(index: u32, hash: u32) -> Self {
        Self {
            index,
            hash,
            flagged: false,
        }
    }

    /// Offset of this subfingerprint's frame from the start of the track
    pub fn timestamp_secs(&self, profile: &Profile) -> f64 {
        self.index as f64 * profile.hop_duration_secs()
    }
}

/// A delivered group of consecutive subfingerprints
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub track: Arc<str>,
    pub entries: Vec<SubFingerprint>,
    /// Subfingerprints produced so far, including this batch
    pub processed: u64,
    /// Subfingerprints expected for the whole track
    pub total: u64,
}

impl Batch {
    pub fn progress(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            (self.processed as f64 / self.total as f64).min(1.0)
        }
    }
}

/// Receiver of generated subfingerprints
pub trait FingerprintSink {
    fn on_batch(&mut self, batch: Batch) -> Result<()>;

    /// Called once after the final batch
    fn on_complete(&mut self) -> Result<()>;
}

impl<T: FingerprintSink + ?Sized> FingerprintSink for &mut T {
    fn on_batch(&mut self, batch: Batch) -> Result<()> {
        (**self).on_batch(batch)
    }

    fn on_complete(&mut self) -> Result<()> {
        (**self).on_complete()
    }
}

/// Message sent by a [`ChannelSink`]
#[derive(Debug, Clone, PartialEq)]
pub enum SinkEvent {
    Batch(Batch),
    Complete,
}

/// Forwards batches over a flume channel.
///
/// With a bounded channel the generator blocks while the consumer is
/// behind, so no batch is ever dropped.
pub struct ChannelSink {
    tx: flume::Sender<SinkEvent>,
}

impl ChannelSink {
    pub fn new(tx: flume::Sender<SinkEvent>) -> Self {
        Self { tx }
    }

    pub fn bounded(capacity: usize) -> (Self, flume::Receiver<SinkEvent>) {
        let (tx, rx) = flume::bounded(capacity);
        (Self::new(tx), rx)
    }
}

impl FingerprintSink for ChannelSink {
    fn on_batch(&mut self, batch: Batch) -> Result<()> {
        self.tx
            .send(SinkEvent::Batch(batch))
            .map_err(|_| Error::SinkClosed)
    }

    fn on_complete(&mut self) -> Result<()> {
        self.tx.send(SinkEvent::Complete).map_err(|_| Error::SinkClosed)
    }
}

/// Keeps every subfingerprint in memory
#[derive(Debug, Default)]
pub struct CollectingSink {
    pub entries: Vec<SubFingerprint>,
    pub batches: usize,
    pub completed: bool,
}

impl FingerprintSink for CollectingSink {
    fn on_batch(&mut self, batch: Batch) -> Result<()> {
        self.entries.extend(batch.entries);
        self.batches += 1;
        Ok(())
    }

    fn on_complete(&mut self) -> Result<()> {
        self.completed = true;
        Ok(())
    }
}

/// Where batches go
pub enum Subscription<'a> {
    /// Batches are cleared without being delivered
    None,
    Sink(Box<dyn FingerprintSink + 'a>),
}

/// Accumulates subfingerprints and delivers them in batches
pub struct BatchEmitter<'a> {
    track: Arc<str>,
    total: u64,
    pending: Vec<SubFingerprint>,
    emitted: u64,
    subscription: Subscription<'a>,
}

impl<'a> BatchEmitter<'a> {
    pub fn new(track: Arc<str>, total: u64, subscription: Subscription<'a>) -> Self {
        Self {
            track,
            total,
            pending: Vec::with_capacity(BATCH_SIZE),
            emitted: 0,
            subscription,
        }
    }

    /// Number of subfingerprints pushed so far
    pub fn emitted(&self) -> u64 {
        self.emitted
    }

    pub fn push(&mut self, entry: SubFingerprint) -> Result<()> {
        self.pending.push(entry);
        self.emitted += 1;
        if self.pending.len() == BATCH_SIZE {
            self.flush()?;
        }
        Ok(())
    }

    /// Deliver the final batch and signal completion; returns the number
    /// of subfingerprints emitted.
    pub fn finish(mut self) -> Result<u64> {
        self.flush()?;
        if let Subscription::Sink(sink) = &mut self.subscription {
            sink.on_complete()?;
        }
        Ok(self.emitted)
    }

    fn flush(&mut self) -> Result<()> {
        match &mut self.subscription {
            Subscription::None => {
                self.pending.clear();
                Ok(())
            }
            Subscription::Sink(sink) => {
                let entries = mem::replace(&mut self.pending, Vec::with_capacity(BATCH_SIZE));
                log::debug!(
                    "{}: delivering {} subfingerprints ({}/{})",
                    self.track,
                    entries.len(),
                    self.emitted,
                    self.total
                );
                sink.on_batch(Batch {
                    track: Arc::clone(&self.track),
                    entries,
                    processed: self.emitted,
                    total: self.total,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingSink {
        batches: Vec<Batch>,
        completions: usize,
    }

    impl FingerprintSink for RecordingSink {
        fn on_batch(&mut self, batch: Batch) -> Result<()> {
            assert_eq!(self.completions, 0, "batch after completion");
            self.batches.push(batch);
            Ok(())
        }

        fn on_complete(&mut self) -> Result<()> {
            self.completions += 1;
            Ok(())
        }
    }

    fn emit(count: u32, sink: &mut RecordingSink) -> u64 {
        let mut emitter = BatchEmitter::new(
            Arc::from("track"),
            count as u64,
            Subscription::Sink(Box::new(sink)),
        );
        for index in 0..count {
            emitter.push(SubFingerprint::new(index, index * 7)).unwrap();
        }
        emitter.finish().unwrap()
    }

    #[test]
    fn test_1025_entries_make_three_batches() {
        let mut sink = RecordingSink::default();
        assert_eq!(emit(1025, &mut sink), 1025);

        let sizes: Vec<usize> = sink.batches.iter().map(|b| b.entries.len()).collect();
        assert_eq!(sizes, vec![512, 512, 1]);
        assert_eq!(sink.completions, 1);

        let indices: Vec<u32> = sink
            .batches
            .iter()
            .flat_map(|b| b.entries.iter().map(|e| e.index))
            .collect();
        assert_eq!(indices, (0..1025).collect::<Vec<_>>());

        let processed: Vec<u64> = sink.batches.iter().map(|b| b.processed).collect();
        assert_eq!(processed, vec![512, 1024, 1025]);
        assert!(sink.batches.iter().all(|b| b.total == 1025 && &*b.track == "track"));
    }

    #[test]
    fn test_final_batch_may_be_empty() {
        let mut sink = RecordingSink::default();
        emit(1024, &mut sink);
        let sizes: Vec<usize> = sink.batches.iter().map(|b| b.entries.len()).collect();
        assert_eq!(sizes, vec![512, 512, 0]);
        assert_eq!(sink.completions, 1);
    }

    #[test]
    fn test_empty_stream_still_completes() {
        let mut sink = RecordingSink::default();
        assert_eq!(emit(0, &mut sink), 0);
        assert_eq!(sink.batches.len(), 1);
        assert!(sink.batches[0].entries.is_empty());
        assert_eq!(sink.batches[0].progress(), 1.0);
        assert_eq!(sink.completions, 1);
    }

    #[test]
    fn test_without_subscriber_entries_are_dropped() {
        let mut emitter = BatchEmitter::new(Arc::from("track"), 2000, Subscription::None);
        for index in 0..2000 {
            emitter.push(SubFingerprint::new(index, 0)).unwrap();
        }
        assert!(emitter.pending.len() < BATCH_SIZE);
        assert_eq!(emitter.finish().unwrap(), 2000);
    }

    #[test]
    fn test_channel_sink_delivers_in_order() {
        let (sink, rx) = ChannelSink::bounded(1);
        let consumer = std::thread::spawn(move || rx.iter().collect::<Vec<_>>());

        let mut emitter = BatchEmitter::new(Arc::from("t"), 600, Subscription::Sink(Box::new(sink)));
        for index in 0..600 {
            emitter.push(SubFingerprint::new(index, index)).unwrap();
        }
        emitter.finish().unwrap();

        let events = consumer.join().unwrap();
        assert_eq!(events.len(), 3);
        assert!(matches!(&events[0], SinkEvent::Batch(b) if b.entries.len() == 512));
        assert!(matches!(&events[1], SinkEvent::Batch(b) if b.entries.len() == 88 && b.entries[0].index == 512));
        assert_eq!(events[2], SinkEvent::Complete);
    }

    #[test]
    fn test_closed_channel_is_an_error() {
        let (sink, rx) = ChannelSink::bounded(4);
        drop(rx);
        let mut emitter = BatchEmitter::new(Arc::from("t"), 1, Subscription::Sink(Box::new(sink)));
        emitter.push(SubFingerprint::new(0, 0)).unwrap();
        assert!(matches!(emitter.finish(), Err(Error::SinkClosed)));
    }

    #[test]
    fn test_timestamp_uses_hop() {
        let profile = Profile::sync_profile();
        let entry = SubFingerprint::new(43, 0);
        let expected = 43.0 * 256.0 / 11025.0;
        assert!((entry.timestamp_secs(&profile) - expected).abs() < 1e-12);
    }
}
