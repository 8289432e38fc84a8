//! Audio input boundary
//!
//! The generator pulls mono samples at the profile's sampling rate from an
//! [`AudioSource`]. Decoding, resampling and down-mixing happen upstream.

mod raw;

pub use raw::{PcmFormat, RawPcmSource};

use std::io;

/// Pull-style mono sample stream
pub trait AudioSource {
    /// Sampling rate of the delivered samples (Hz)
    fn sample_rate(&self) -> u32;

    /// Total number of samples the stream will deliver
    fn total_samples(&self) -> u64;

    fn has_more(&self) -> bool;

    /// Fill `buf` with the next samples, returning how many were written.
    /// Fewer than `buf.len()` samples are only returned at end of stream.
    fn read(&mut self, buf: &mut [f32]) -> io::Result<usize>;
}

impl<S: AudioSource + ?Sized> AudioSource for &mut S {
    fn sample_rate(&self) -> u32 {
        (**self).sample_rate()
    }

    fn total_samples(&self) -> u64 {
        (**self).total_samples()
    }

    fn has_more(&self) -> bool {
        (**self).has_more()
    }

    fn read(&mut self, buf: &mut [f32]) -> io::Result<usize> {
        (**self).read(buf)
    }
}

/// Samples held in memory
#[derive(Debug, Clone)]
pub struct MemorySource {
    samples: Vec<f32>,
    sample_rate: u32,
    position: usize,
}

impl MemorySource {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
            position: 0,
        }
    }
}

impl AudioSource for MemorySource {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn total_samples(&self) -> u64 {
        self.samples.len() as u64
    }

    fn has_more(&self) -> bool {
        self.position < self.samples.len()
    }

    fn read(&mut self, buf: &mut [f32]) -> io::Result<usize> {
        let n = buf.len().min(self.samples.len() - self.position);
        buf[..n].copy_from_slice(&self.samples[self.position..self.position + n]);
        self.position += n;
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_source_reads_in_chunks() {
        let mut source = MemorySource::new(vec![1.0, 2.0, 3.0, 4.0, 5.0], 8000);
        assert_eq!(source.total_samples(), 5);

        let mut buf = [0.0f32; 2];
        assert_eq!(source.read(&mut buf).unwrap(), 2);
        assert_eq!(buf, [1.0, 2.0]);
        assert_eq!(source.read(&mut buf).unwrap(), 2);
        assert!(source.has_more());
        assert_eq!(source.read(&mut buf).unwrap(), 1);
        assert_eq!(buf[0], 5.0);
        assert!(!source.has_more());
        assert_eq!(source.read(&mut buf).unwrap(), 0);
    }
}
