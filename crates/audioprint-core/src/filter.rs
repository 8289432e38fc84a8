//! Temporal FIR filtering and normalization of chroma frames

use crate::ring_buffer::RingBuffer;

/// FIR filter applied per chroma bin across consecutive frames
#[derive(Debug, Clone)]
pub struct ChromaFilter {
    coefficients: Vec<f64>,
}

impl ChromaFilter {
    pub fn new(coefficients: &[f64]) -> Self {
        Self {
            coefficients: coefficients.to_vec(),
        }
    }

    /// Number of taps, i.e. frames needed per output
    pub fn taps(&self) -> usize {
        self.coefficients.len()
    }

    /// Convolve the buffered frames into `out`.
    ///
    /// Frame `i` of the window (oldest first) is weighted by coefficient `i`.
    ///
    /// # Panics
    /// Panics unless the window holds exactly one frame per tap.
    pub fn apply(&self, window: &RingBuffer, out: &mut [f64]) {
        assert_eq!(window.count(), self.taps(), "filter window not full");

        out.fill(0.0);
        for (frame, coefficient) in window.iter().zip(&self.coefficients) {
            for (acc, value) in out.iter_mut().zip(frame) {
                *acc += value * coefficient;
            }
        }
    }
}

pub fn euclidean_norm(values: &[f64]) -> f64 {
    values.iter().map(|v| v * v).sum::<f64>().sqrt()
}

/// Scale `values` to unit length, or zero them if their norm is below
/// `threshold`. An all-zero vector stays zero for any threshold.
pub fn normalize(values: &mut [f64], threshold: f64) {
    let norm = euclidean_norm(values);
    if norm == 0.0 || norm < threshold {
        values.fill(0.0);
    } else {
        for value in values.iter_mut() {
            *value /= norm;
        }
    }
}
