//! Classifiers that turn regions of the integral image into 2-bit symbols
//!
//! Each classifier compares two sub-regions of a rectangle in the recent
//! chroma history and quantizes the log-ratio of their sums into one of
//! four levels.

use crate::error::{Error, Result};
use crate::hash::MAX_SYMBOLS;
use crate::integral_image::IntegralImage;
use serde::{Deserialize, Serialize};

/// Shape of the region comparison a filter performs.
///
/// `x` runs over time (columns), `y` over pitch classes (rows). The
/// positive region `a` and negative region `b` are:
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterKind {
    /// `a` = whole rectangle, `b` = 0
    F0,
    /// `a` = lower half of the rows, `b` = upper half
    F1,
    /// `a` = later half of the columns, `b` = earlier half
    F2,
    /// `a` = two anti-diagonal quadrants, `b` = the diagonal ones
    F3,
    /// `a` = middle third of the rows, `b` = the outer thirds
    F4,
    /// `a` = middle third of the columns, `b` = the outer thirds
    F5,
}

/// Rectangle descriptor within the classification window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    pub kind: FilterKind,
    /// First chroma row covered
    pub y: usize,
    pub height: usize,
    /// Number of time columns covered
    pub width: usize,
}

impl Filter {
    pub const fn new(kind: FilterKind, y: usize, height: usize, width: usize) -> Self {
        Self {
            kind,
            y,
            height,
            width,
        }
    }

    /// Evaluate the filter over the `window` most recent columns of `image`.
    ///
    /// The rectangle starts at the oldest column of that window, so filters
    /// narrower than the window look at older history than wider ones.
    pub fn apply(&self, image: &IntegralImage, window: usize) -> f64 {
        let area = |x1: usize, x2: usize, y1: usize, y2: usize| -> f64 {
            if x1 >= x2 || y1 >= y2 {
                return 0.0;
            }
            image.range_sum(y1..y2, window - x2, x2 - x1)
        };

        let (y, w, h) = (self.y, self.width, self.height);

        let (a, b) = match self.kind {
            FilterKind::F0 => (area(0, w, y, y + h), 0.0),
            FilterKind::F1 => {
                let h_2 = h / 2;
                (area(0, w, y + h_2, y + h), area(0, w, y, y + h_2))
            }
            FilterKind::F2 => {
                let w_2 = w / 2;
                (area(w_2, w, y, y + h), area(0, w_2, y, y + h))
            }
            FilterKind::F3 => {
                let w_2 = w / 2;
                let h_2 = h / 2;
                (
                    area(0, w_2, y + h_2, y + h) + area(w_2, w, y, y + h_2),
                    area(0, w_2, y, y + h_2) + area(w_2, w, y + h_2, y + h),
                )
            }
            FilterKind::F4 => {
                let h_3 = h / 3;
                (
                    area(0, w, y + h_3, y + 2 * h_3),
                    area(0, w, y, y + h_3) + area(0, w, y + 2 * h_3, y + h),
                )
            }
            FilterKind::F5 => {
                let w_3 = w / 3;
                (
                    area(w_3, 2 * w_3, y, y + h),
                    area(0, w_3, y, y + h) + area(2 * w_3, w, y, y + h),
                )
            }
        };

        subtract_log(a, b)
    }
}

/// `ln(1 + a) - ln(1 + b)`. Areas below -1 give NaN, which quantizes to
/// level 3; profile validation keeps FIR coefficients non-negative so
/// areas never get there.
fn subtract_log(a: f64, b: f64) -> f64 {
    (1.0 + a).ln() - (1.0 + b).ln()
}

/// Three ascending thresholds splitting the real line into four levels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quantizer(pub f64, pub f64, pub f64);

impl Quantizer {
    pub fn quantize(&self, value: f64) -> u32 {
        debug_assert!(self.0 <= self.1 && self.1 <= self.2);
        if value < self.1 {
            if value < self.0 {
                0
            } else {
                1
            }
        } else if value < self.2 {
            2
        } else {
            3
        }
    }

    fn is_ordered(&self) -> bool {
        self.0 <= self.1 && self.1 <= self.2
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Classifier {
    pub filter: Filter,
    pub quantizer: Quantizer,
}

impl Classifier {
    pub const fn new(filter: Filter, quantizer: Quantizer) -> Self {
        Self { filter, quantizer }
    }

    /// Produce this classifier's level in `0..4`
    pub fn classify(&self, image: &IntegralImage, window: usize) -> u32 {
        self.quantizer.quantize(self.filter.apply(image, window))
    }
}

/// Validated, ordered set of classifiers sharing one integral image
#[derive(Debug, Clone)]
pub struct ClassifierEnsemble {
    classifiers: Vec<Classifier>,
    max_width: usize,
}

impl ClassifierEnsemble {
    /// Check every classifier against the image geometry.
    ///
    /// `bins` is the number of chroma rows and `capacity` the number of
    /// columns the integral image retains.
    pub fn new(classifiers: Vec<Classifier>, bins: usize, capacity: usize) -> Result<Self> {
        if classifiers.is_empty() {
            return Err(Error::InvalidProfile("at least one classifier is required".into()));
        }
        if classifiers.len() > MAX_SYMBOLS {
            return Err(Error::TooManyClassifiers {
                count: classifiers.len(),
                max: MAX_SYMBOLS,
            });
        }

        for (index, classifier) in classifiers.iter().enumerate() {
            let filter = &classifier.filter;
            if filter.width == 0 || filter.height == 0 {
                return Err(Error::InvalidProfile(format!(
                    "classifier {} has an empty filter",
                    index
                )));
            }
            if filter.width > capacity {
                return Err(Error::FilterTooWide {
                    index,
                    width: filter.width,
                    capacity,
                });
            }
            if filter.y + filter.height > bins {
                return Err(Error::FilterOutOfRange {
                    index,
                    start: filter.y,
                    end: filter.y + filter.height,
                    bins,
                });
            }
            if !classifier.quantizer.is_ordered() {
                return Err(Error::InvalidProfile(format!(
                    "classifier {} has unordered quantizer thresholds",
                    index
                )));
            }
        }

        let max_width = classifiers
            .iter()
            .map(|c| c.filter.width)
            .max()
            .unwrap_or(0);

        Ok(Self {
            classifiers,
            max_width,
        })
    }

    /// Widest filter; the image must hold this many columns before classifying
    pub fn max_width(&self) -> usize {
        self.max_width
    }

    pub fn len(&self) -> usize {
        self.classifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classifiers.is_empty()
    }

    /// Run every classifier, in order, over the newest `max_width` columns
    pub fn classify<'a>(&'a self, image: &'a IntegralImage) -> impl Iterator<Item = u32> + 'a {
        self.classifiers
            .iter()
            .map(move |c| c.classify(image, self.max_width))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image_from(columns: &[[f64; 4]]) -> IntegralImage {
        let mut image = IntegralImage::new(4, columns.len());
        for column in columns {
            image.add_column(column);
        }
        image
    }

    #[test]
    fn test_quantizer_levels() {
        let q = Quantizer(-1.0, 0.0, 1.0);
        assert_eq!(q.quantize(-2.0), 0);
        assert_eq!(q.quantize(-1.0), 1);
        assert_eq!(q.quantize(-0.5), 1);
        assert_eq!(q.quantize(0.0), 2);
        assert_eq!(q.quantize(0.99), 2);
        assert_eq!(q.quantize(1.0), 3);
    }

    #[test]
    fn test_filter0_is_log_of_area() {
        let image = image_from(&[[1.0, 1.0, 0.0, 0.0], [1.0, 1.0, 0.0, 0.0]]);
        let filter = Filter::new(FilterKind::F0, 0, 2, 2);
        let value = filter.apply(&image, 2);
        assert!((value - 5.0f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn test_filter1_compares_row_halves() {
        // rows 2..4 carry all the energy, so a > b
        let image = image_from(&[[0.0, 0.0, 1.0, 1.0]]);
        let filter = Filter::new(FilterKind::F1, 0, 4, 1);
        let value = filter.apply(&image, 1);
        assert!((value - 3.0f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn test_filter2_compares_time_halves() {
        let image = image_from(&[[1.0, 0.0, 0.0, 0.0], [0.0, 0.0, 0.0, 0.0]]);
        let filter = Filter::new(FilterKind::F2, 0, 1, 2);
        // earlier half has the energy, so the value is negative
        let value = filter.apply(&image, 2);
        assert!((value + 2.0f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn test_narrow_filter_reads_window_start() {
        // A filter narrower than the window looks at the oldest columns
        let image = image_from(&[[1.0, 0.0, 0.0, 0.0], [0.0; 4], [0.0; 4]]);
        let filter = Filter::new(FilterKind::F0, 0, 1, 1);
        assert!(filter.apply(&image, 3) > 0.0);
        assert_eq!(filter.apply(&image, 1), 0.0);
    }

    #[test]
    fn test_filter3_quadrants() {
        // odd width and height: the later and upper parts take the extra column and row
        let image = image_from(&[
            [1.0, 2.0, 3.0, 100.0],
            [4.0, 5.0, 6.0, 100.0],
            [7.0, 8.0, 9.0, 100.0],
        ]);
        let filter = Filter::new(FilterKind::F3, 0, 3, 3);
        let value = filter.apply(&image, 3);
        // a = rows 1..3 of column 0 + row 0 of columns 1..3 = 5 + 11
        // b = row 0 of column 0 + rows 1..3 of columns 1..3 = 1 + 28
        assert!((value - (17.0f64.ln() - 30.0f64.ln())).abs() < 1e-12);
    }

    #[test]
    fn test_filter4_middle_third_rows() {
        // height 4: thirds of one row, the outer band above takes rows 2..4
        let image = image_from(&[[1.0, 2.0, 3.0, 4.0], [1.0, 2.0, 3.0, 4.0]]);
        let filter = Filter::new(FilterKind::F4, 0, 4, 2);
        let value = filter.apply(&image, 2);
        // a = row 1 = 4, b = row 0 + rows 2..4 = 2 + 14
        assert!((value - (5.0f64.ln() - 17.0f64.ln())).abs() < 1e-12);
    }

    #[test]
    fn test_filter4_offset_rows() {
        let image = image_from(&[[9.0, 1.0, 2.0, 3.0]]);
        let filter = Filter::new(FilterKind::F4, 1, 3, 1);
        let value = filter.apply(&image, 1);
        // row 0 lies outside the filter: a = row 2 = 2, b = rows 1 and 3 = 4
        assert!((value - (3.0f64.ln() - 5.0f64.ln())).abs() < 1e-12);
    }

    #[test]
    fn test_filter5_middle_third() {
        let image = image_from(&[[0.0; 4], [2.0, 0.0, 0.0, 0.0], [0.0; 4]]);
        let filter = Filter::new(FilterKind::F5, 0, 1, 3);
        let value = filter.apply(&image, 3);
        assert!((value - 3.0f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn test_ensemble_rejects_wide_filter() {
        let classifiers = vec![Classifier::new(
            Filter::new(FilterKind::F0, 0, 1, 20),
            Quantizer(0.0, 1.0, 2.0),
        )];
        let err = ClassifierEnsemble::new(classifiers, 12, 16).unwrap_err();
        assert!(matches!(err, Error::FilterTooWide { width: 20, .. }));
    }

    #[test]
    fn test_ensemble_rejects_too_many_classifiers() {
        let classifier = Classifier::new(Filter::new(FilterKind::F0, 0, 1, 1), Quantizer(0.0, 1.0, 2.0));
        let err = ClassifierEnsemble::new(vec![classifier; 17], 12, 16).unwrap_err();
        assert!(matches!(err, Error::TooManyClassifiers { count: 17, .. }));
    }

    #[test]
    fn test_ensemble_rejects_rows_outside_chroma() {
        let classifier = Classifier::new(Filter::new(FilterKind::F1, 10, 4, 2), Quantizer(0.0, 1.0, 2.0));
        let err = ClassifierEnsemble::new(vec![classifier], 12, 16).unwrap_err();
        assert!(matches!(err, Error::FilterOutOfRange { end: 14, .. }));
    }

    #[test]
    fn test_ensemble_max_width() {
        let q = Quantizer(0.0, 1.0, 2.0);
        let ensemble = ClassifierEnsemble::new(
            vec![
                Classifier::new(Filter::new(FilterKind::F0, 0, 1, 3), q),
                Classifier::new(Filter::new(FilterKind::F2, 0, 2, 7), q),
            ],
            12,
            7,
        )
        .unwrap();
        assert_eq!(ensemble.max_width(), 7);
        assert_eq!(ensemble.len(), 2);
    }
}
