//! Fingerprint profiles
//!
//! A profile fixes every parameter of the pipeline. The built-in catalog
//! offers a `default` profile for track identification and a `sync`
//! profile with a finer hop for aligning recordings.

use crate::classifier::{Classifier, ClassifierEnsemble, Filter, FilterKind, Quantizer};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Number of pitch classes per chroma frame
pub const CHROMA_BINS: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowKind {
    Rectangular,
    Hann,
    Hamming,
}

/// How FFT bins are folded onto pitch classes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChromaMapping {
    /// Each FFT bin adds its energy to the pitch class it falls into
    Discrete,
    /// Energy is split between the two nearest pitch classes
    Interpolated,
}

/// Names of the built-in profiles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProfileName {
    Default,
    Sync,
}

impl ProfileName {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProfileName::Default => "default",
            ProfileName::Sync => "sync",
        }
    }

    pub fn profile(&self) -> Profile {
        match self {
            ProfileName::Default => Profile::default_profile(),
            ProfileName::Sync => Profile::sync_profile(),
        }
    }
}

impl FromStr for ProfileName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "default" => Ok(ProfileName::Default),
            "sync" => Ok(ProfileName::Sync),
            _ => Err(Error::UnknownProfile(s.to_string())),
        }
    }
}

/// Complete pipeline configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub name: String,

    // Audio framing
    pub sample_rate: u32,
    pub window_size: usize,
    pub hop_size: usize,
    pub window: WindowKind,

    // Chroma extraction
    pub min_freq: f64,
    pub max_freq: f64,
    pub chroma_mapping: ChromaMapping,

    // Temporal filter and normalization
    pub filter_coefficients: Vec<f64>,
    pub normalization_threshold: f64,

    // Hashing
    pub classifiers: Vec<Classifier>,
}

const CHROMA_FILTER_COEFFICIENTS: [f64; 5] = [0.25, 0.75, 1.0, 0.75, 0.25];

const DEFAULT_SAMPLE_RATE: u32 = 11025;
const DEFAULT_WINDOW_SIZE: usize = 4096;

// Trained on 60k pairs of mp3 samples
const CLASSIFIERS_TEST2: [Classifier; 16] = [
    Classifier::new(Filter::new(FilterKind::F0, 4, 3, 15), Quantizer(1.98215, 2.35817, 2.63523)),
    Classifier::new(Filter::new(FilterKind::F4, 4, 6, 15), Quantizer(-1.03809, -0.651211, -0.282167)),
    Classifier::new(Filter::new(FilterKind::F1, 0, 4, 16), Quantizer(-0.298702, 0.119262, 0.558497)),
    Classifier::new(Filter::new(FilterKind::F3, 8, 2, 12), Quantizer(-0.105439, 0.0153946, 0.135898)),
    Classifier::new(Filter::new(FilterKind::F3, 4, 4, 8), Quantizer(-0.142891, 0.0258736, 0.200632)),
    Classifier::new(Filter::new(FilterKind::F4, 0, 3, 5), Quantizer(-0.826319, -0.590612, -0.368214)),
    Classifier::new(Filter::new(FilterKind::F1, 2, 2, 9), Quantizer(-0.557409, -0.233035, 0.0534525)),
    Classifier::new(Filter::new(FilterKind::F2, 7, 3, 4), Quantizer(-0.0646826, 0.00620476, 0.0784847)),
    Classifier::new(Filter::new(FilterKind::F2, 6, 2, 16), Quantizer(-0.192387, -0.029699, 0.215855)),
    Classifier::new(Filter::new(FilterKind::F2, 1, 3, 2), Quantizer(-0.0397818, -0.00568076, 0.0292026)),
    Classifier::new(Filter::new(FilterKind::F5, 10, 1, 15), Quantizer(-0.53823, -0.369934, -0.190235)),
    Classifier::new(Filter::new(FilterKind::F3, 6, 2, 10), Quantizer(-0.124877, 0.0296483, 0.139239)),
    Classifier::new(Filter::new(FilterKind::F2, 1, 1, 14), Quantizer(-0.101475, 0.0225617, 0.231971)),
    Classifier::new(Filter::new(FilterKind::F3, 5, 6, 4), Quantizer(-0.0799915, -0.00729616, 0.063262)),
    Classifier::new(Filter::new(FilterKind::F1, 9, 2, 12), Quantizer(-0.272556, 0.019424, 0.302559)),
    Classifier::new(Filter::new(FilterKind::F3, 4, 2, 14), Quantizer(-0.164292, -0.0321188, 0.0846339)),
];

impl Profile {
    /// Identification profile: 4096-sample Hamming windows overlapping by
    /// two thirds at 11025 Hz
    pub fn default_profile() -> Self {
        Self {
            name: ProfileName::Default.as_str().to_string(),
            sample_rate: DEFAULT_SAMPLE_RATE,
            window_size: DEFAULT_WINDOW_SIZE,
            hop_size: DEFAULT_WINDOW_SIZE / 3,
            window: WindowKind::Hamming,
            min_freq: 28.0,
            max_freq: 3520.0,
            chroma_mapping: ChromaMapping::Discrete,
            filter_coefficients: CHROMA_FILTER_COEFFICIENTS.to_vec(),
            normalization_threshold: 0.01,
            classifiers: CLASSIFIERS_TEST2.to_vec(),
        }
    }

    /// Alignment profile: same classifiers, 256-sample hop (~23 ms) and
    /// interpolated chroma for finer time resolution
    pub fn sync_profile() -> Self {
        Self {
            name: ProfileName::Sync.as_str().to_string(),
            hop_size: 256,
            chroma_mapping: ChromaMapping::Interpolated,
            ..Self::default_profile()
        }
    }

    /// Look up a built-in profile by name
    pub fn by_name(name: &str) -> Result<Self> {
        Ok(name.parse::<ProfileName>()?.profile())
    }

    /// Parse and validate a profile from TOML
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let profile: Profile = toml::from_str(s)?;
        profile.validate()?;
        Ok(profile)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse and validate a profile from JSON, as written by [`to_json`](Self::to_json)
    pub fn from_json_str(s: &str) -> Result<Self> {
        let profile: Profile = serde_json::from_str(s)?;
        profile.validate()?;
        Ok(profile)
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(Error::InvalidProfile("sample_rate must be > 0".into()));
        }
        if self.window_size < 2 {
            return Err(Error::InvalidProfile("window_size must be >= 2".into()));
        }
        if self.hop_size == 0 || self.hop_size > self.window_size {
            return Err(Error::InvalidProfile(
                "hop_size must be in 1..=window_size".into(),
            ));
        }
        if !(self.min_freq > 0.0 && self.min_freq < self.max_freq) {
            return Err(Error::InvalidProfile("min_freq must be > 0 and < max_freq".into()));
        }
        if self.max_freq > self.sample_rate as f64 / 2.0 {
            return Err(Error::InvalidProfile("max_freq must not exceed Nyquist".into()));
        }
        // Filtered energies must stay >= 0
        if self.filter_coefficients.is_empty()
            || self
                .filter_coefficients
                .iter()
                .any(|c| !(c.is_finite() && *c >= 0.0))
        {
            return Err(Error::InvalidProfile(
                "filter_coefficients must be non-empty, finite and >= 0".into(),
            ));
        }
        if !(self.normalization_threshold > 0.0 && self.normalization_threshold.is_finite()) {
            return Err(Error::InvalidProfile(
                "normalization_threshold must be a finite value > 0".into(),
            ));
        }

        self.ensemble()?;
        Ok(())
    }

    /// Build the classifier ensemble for an image retaining `max_width` columns
    pub fn ensemble(&self) -> Result<ClassifierEnsemble> {
        let capacity = self.max_filter_width();
        ClassifierEnsemble::new(self.classifiers.clone(), CHROMA_BINS, capacity)
    }

    /// FIR tap count (K)
    pub fn taps(&self) -> usize {
        self.filter_coefficients.len()
    }

    /// Widest classifier filter (W_max)
    pub fn max_filter_width(&self) -> usize {
        self.classifiers
            .iter()
            .map(|c| c.filter.width)
            .max()
            .unwrap_or(0)
    }

    /// Chroma frames consumed before the first subfingerprint
    pub fn delay_frames(&self) -> usize {
        self.taps().saturating_sub(1) + self.max_filter_width().saturating_sub(1)
    }

    pub fn hop_duration_secs(&self) -> f64 {
        self.hop_size as f64 / self.sample_rate as f64
    }

    /// Number of full analysis windows in `total_samples`
    pub fn chroma_frames(&self, total_samples: u64) -> u64 {
        let window = self.window_size as u64;
        if total_samples < window {
            0
        } else {
            (total_samples - window) / self.hop_size as u64 + 1
        }
    }

    /// Subfingerprints a track of `total_samples` samples yields
    pub fn expected_subfingerprints(&self, total_samples: u64) -> u64 {
        self.chroma_frames(total_samples)
            .saturating_sub(self.delay_frames() as u64)
    }
}

impl Default for Profile {
    fn default() -> Self {
        Self::default_profile()
    }
}
