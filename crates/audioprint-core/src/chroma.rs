//! Chroma feature extraction
//!
//! Windows the sample stream, computes the power spectrum with an FFT and
//! folds the bins between `min_freq` and `max_freq` onto 12 pitch classes.
//! Pitch class 0 starts at A.

use crate::audio::AudioSource;
use crate::profile::{ChromaMapping, Profile, WindowKind, CHROMA_BINS};
use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::f64::consts::PI;
use std::io;
use std::sync::Arc;

/// A0 in Hz; octave boundaries fall on multiples of it
const REFERENCE_FREQ: f64 = 440.0 / 16.0;

/// FFT bin and the pitch class it folds onto
#[derive(Debug, Clone, Copy)]
struct BinMapping {
    bin: usize,
    note: usize,
    /// Position of the bin within the pitch class, in `[0, 1)`
    frac: f64,
}

/// Streaming chroma extractor
pub struct ChromaExtractor {
    window_size: usize,
    hop_size: usize,
    mapping: ChromaMapping,
    window: Vec<f64>,
    bins: Vec<BinMapping>,
    fft: Arc<dyn Fft<f64>>,
    spectrum: Vec<Complex<f64>>,
    scratch: Vec<Complex<f64>>,
    samples: Vec<f32>,
    primed: bool,
}

impl ChromaExtractor {
    pub fn new(profile: &Profile) -> Self {
        let window_size = profile.window_size;

        let mut planner = FftPlanner::<f64>::new();
        let fft = planner.plan_fft_forward(window_size);
        let scratch = vec![Complex::new(0.0, 0.0); fft.get_inplace_scratch_len()];

        Self {
            window_size,
            hop_size: profile.hop_size,
            mapping: profile.chroma_mapping,
            window: create_window(profile.window, window_size),
            bins: map_bins(profile),
            fft,
            spectrum: vec![Complex::new(0.0, 0.0); window_size],
            scratch,
            samples: vec![0.0; window_size],
            primed: false,
        }
    }

    /// Read the next hop from `source` and write its chroma into `out`.
    ///
    /// Returns `Ok(false)` once the source cannot fill another full window;
    /// the trailing partial window is discarded.
    pub fn next_frame<S: AudioSource>(&mut self, source: &mut S, out: &mut [f64]) -> io::Result<bool> {
        let fresh = if self.primed {
            self.samples.copy_within(self.hop_size.., 0);
            self.window_size - self.hop_size
        } else {
            0
        };

        let wanted = self.window_size - fresh;
        let read = read_full(source, &mut self.samples[fresh..])?;
        if read < wanted {
            return Ok(false);
        }
        self.primed = true;

        self.compute(out);
        Ok(true)
    }

    fn compute(&mut self, out: &mut [f64]) {
        for ((slot, &sample), w) in self.spectrum.iter_mut().zip(&self.samples).zip(&self.window) {
            *slot = Complex::new(sample as f64 * w, 0.0);
        }
        self.fft.process_with_scratch(&mut self.spectrum, &mut self.scratch);

        out.fill(0.0);
        for mapping in &self.bins {
            let energy = self.spectrum[mapping.bin].norm_sqr();
            match self.mapping {
                ChromaMapping::Discrete => out[mapping.note] += energy,
                ChromaMapping::Interpolated => {
                    let (other, weight) = if mapping.frac < 0.5 {
                        ((mapping.note + CHROMA_BINS - 1) % CHROMA_BINS, 0.5 + mapping.frac)
                    } else if mapping.frac > 0.5 {
                        ((mapping.note + 1) % CHROMA_BINS, 1.5 - mapping.frac)
                    } else {
                        (mapping.note, 1.0)
                    };
                    out[mapping.note] += energy * weight;
                    out[other] += energy * (1.0 - weight);
                }
            }
        }
    }
}

fn read_full<S: AudioSource>(source: &mut S, buf: &mut [f32]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = source.read(&mut buf[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

fn map_bins(profile: &Profile) -> Vec<BinMapping> {
    let size = profile.window_size as f64;
    let rate = profile.sample_rate as f64;
    let freq_to_index = |freq: f64| (size * freq / rate).round() as usize;

    let min_index = freq_to_index(profile.min_freq).max(1);
    let max_index = freq_to_index(profile.max_freq).min(profile.window_size / 2);

    (min_index..max_index)
        .map(|bin| {
            let freq = bin as f64 * rate / size;
            let octave = (freq / REFERENCE_FREQ).log2();
            let note = CHROMA_BINS as f64 * (octave - octave.floor());
            let index = (note as usize).min(CHROMA_BINS - 1);
            BinMapping {
                bin,
                note: index,
                frac: note - index as f64,
            }
        })
        .collect()
}

/// Create window coefficients
fn create_window(kind: WindowKind, size: usize) -> Vec<f64> {
    let denom = (size - 1) as f64;
    (0..size)
        .map(|i| {
            let x = 2.0 * PI * i as f64 / denom;
            match kind {
                WindowKind::Rectangular => 1.0,
                WindowKind::Hann => 0.5 * (1.0 - x.cos()),
                WindowKind::Hamming => 0.54 - 0.46 * x.cos(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::MemorySource;

    fn sine(freq: f64, rate: u32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| (2.0 * PI * freq * i as f64 / rate as f64).sin() as f32)
            .collect()
    }

    fn strongest(chroma: &[f64]) -> usize {
        chroma
            .iter()
            .enumerate()
            .fold((0, f64::MIN), |best, (i, &v)| if v > best.1 { (i, v) } else { best })
            .0
    }

    /// Frequency in the middle of pitch class `note`, `octave` octaves above A4
    fn class_centre(note: usize, octave: i32) -> f64 {
        440.0 * 2f64.powi(octave) * 2f64.powf((note as f64 + 0.5) / 12.0)
    }

    #[test]
    fn test_hann_window() {
        let window = create_window(WindowKind::Hann, 512);
        assert_eq!(window.len(), 512);
        assert!(window[0].abs() < 0.001);
        assert!((window[256] - 1.0).abs() < 0.001);
    }

    #[test]
    fn test_hamming_window_edges() {
        let window = create_window(WindowKind::Hamming, 4096);
        assert!((window[0] - 0.08).abs() < 1e-9);
        assert!((window[4095] - 0.08).abs() < 1e-9);
    }

    #[test]
    fn test_frame_count_follows_hops() {
        let profile = Profile::default_profile();
        let samples = vec![0.0; profile.window_size + 2 * profile.hop_size + 10];
        let mut source = MemorySource::new(samples, profile.sample_rate);
        let mut extractor = ChromaExtractor::new(&profile);

        let mut out = [0.0; CHROMA_BINS];
        let mut frames = 0;
        while extractor.next_frame(&mut source, &mut out).unwrap() {
            frames += 1;
        }
        assert_eq!(frames, 3);
        assert_eq!(frames as u64, profile.chroma_frames(source.total_samples()));
    }

    #[test]
    fn test_sine_lands_in_its_pitch_class() {
        for mapping in [ChromaMapping::Discrete, ChromaMapping::Interpolated] {
            let profile = Profile {
                chroma_mapping: mapping,
                ..Profile::default_profile()
            };
            for (note, octave) in [(0, 0), (3, 0), (7, -1), (10, 1)] {
                let samples = sine(class_centre(note, octave), profile.sample_rate, profile.window_size);
                let mut source = MemorySource::new(samples, profile.sample_rate);
                let mut extractor = ChromaExtractor::new(&profile);

                let mut out = [0.0; CHROMA_BINS];
                assert!(extractor.next_frame(&mut source, &mut out).unwrap());
                assert_eq!(strongest(&out), note, "{:?} note {}", mapping, note);
            }
        }
    }

    #[test]
    fn test_silence_has_no_energy() {
        let profile = Profile::default_profile();
        let mut source = MemorySource::new(vec![0.0; profile.window_size], profile.sample_rate);
        let mut extractor = ChromaExtractor::new(&profile);
        let mut out = [1.0; CHROMA_BINS];
        assert!(extractor.next_frame(&mut source, &mut out).unwrap());
        assert!(out.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_bins_stay_inside_band() {
        let profile = Profile::default_profile();
        let bins = map_bins(&profile);
        let first = bins.first().unwrap().bin as f64 * 11025.0 / 4096.0;
        let last = bins.last().unwrap().bin as f64 * 11025.0 / 4096.0;
        assert!(first >= 28.0 - 11025.0 / 4096.0);
        assert!(last < 3520.0);
        assert!(bins.iter().all(|b| b.note < CHROMA_BINS && (0.0..1.0).contains(&b.frac)));
    }
}
