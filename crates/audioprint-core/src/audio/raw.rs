//! Headerless little-endian PCM streams

use super::AudioSource;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

/// Sample encoding of a raw PCM stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PcmFormat {
    /// Signed 16-bit integers
    S16le,
    /// 32-bit IEEE floats
    F32le,
}

impl PcmFormat {
    pub fn bytes_per_sample(&self) -> usize {
        match self {
            PcmFormat::S16le => 2,
            PcmFormat::F32le => 4,
        }
    }

    fn decode(&self, bytes: &[u8]) -> f32 {
        match self {
            PcmFormat::S16le => i16::from_le_bytes([bytes[0], bytes[1]]) as f32 / 32768.0,
            PcmFormat::F32le => f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
        }
    }
}

/// Mono PCM read from any byte stream
pub struct RawPcmSource<R> {
    reader: R,
    format: PcmFormat,
    sample_rate: u32,
    total_samples: u64,
    delivered: u64,
    bytes: Vec<u8>,
}

impl<R: Read> RawPcmSource<R> {
    /// `total_samples` must be the number of samples `reader` holds.
    pub fn new(reader: R, format: PcmFormat, sample_rate: u32, total_samples: u64) -> Self {
        Self {
            reader,
            format,
            sample_rate,
            total_samples,
            delivered: 0,
            bytes: Vec::new(),
        }
    }
}

impl RawPcmSource<BufReader<File>> {
    /// Open a raw PCM file; its length determines the sample count.
    pub fn open(path: &Path, format: PcmFormat, sample_rate: u32) -> io::Result<Self> {
        let file = File::open(path)?;
        let len = file.metadata()?.len();
        let total_samples = len / format.bytes_per_sample() as u64;
        Ok(Self::new(BufReader::new(file), format, sample_rate, total_samples))
    }
}

impl<R: Read> AudioSource for RawPcmSource<R> {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn total_samples(&self) -> u64 {
        self.total_samples
    }

    fn has_more(&self) -> bool {
        self.delivered < self.total_samples
    }

    fn read(&mut self, buf: &mut [f32]) -> io::Result<usize> {
        let remaining = (self.total_samples - self.delivered).min(buf.len() as u64) as usize;
        let width = self.format.bytes_per_sample();
        self.bytes.resize(remaining * width, 0);

        let mut filled = 0;
        while filled < self.bytes.len() {
            match self.reader.read(&mut self.bytes[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }

        let samples = filled / width;
        if samples < remaining {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!(
                    "PCM stream ended after {} of {} samples",
                    self.delivered + samples as u64,
                    self.total_samples
                ),
            ));
        }

        for (out, chunk) in buf.iter_mut().zip(self.bytes.chunks_exact(width)) {
            *out = self.format.decode(chunk);
        }
        self.delivered += samples as u64;
        Ok(samples)
    }
}
