//! Rolling integral image over filtered chroma columns
//!
//! Columns are time, rows are pitch classes. Only the newest `capacity`
//! columns can be queried. Cumulative sums are stored in a ring of
//! `capacity + 1` rows (one extra for the baseline just before the oldest
//! retained column) and are re-based onto the oldest stored row every
//! `capacity` appends, so values never grow with track length.

use std::ops::Range;

#[derive(Debug, Clone)]
pub struct IntegralImage {
    bins: usize,
    capacity: usize,
    /// `(capacity + 1) * (bins + 1)` cumulative sums, row-major per column slot.
    /// Entry `[slot][r]` is the sum over all columns up to the slot's column
    /// and rows `0..r`.
    sums: Vec<f64>,
    /// Scratch copy of the row subtracted on re-base
    base: Vec<f64>,
    columns: u64,
}

impl IntegralImage {
    pub fn new(bins: usize, capacity: usize) -> Self {
        assert!(capacity > 0, "integral image capacity must be > 0");
        Self {
            bins,
            capacity,
            sums: vec![0.0; (capacity + 1) * (bins + 1)],
            base: vec![0.0; bins + 1],
            columns: 0,
        }
    }

    pub fn bins(&self) -> usize {
        self.bins
    }

    /// Number of columns that can be queried at most
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Total number of columns added since creation
    pub fn columns(&self) -> u64 {
        self.columns
    }

    /// Number of columns currently available to queries
    pub fn retained(&self) -> usize {
        self.columns.min(self.capacity as u64) as usize
    }

    /// Append one time column.
    ///
    /// # Panics
    /// Panics if `column.len()` differs from the bin count.
    pub fn add_column(&mut self, column: &[f64]) {
        assert_eq!(column.len(), self.bins, "column length mismatch");

        let stride = self.bins + 1;
        let prev = self.slot(self.columns as i64 - 1) * stride;
        let next = self.slot(self.columns as i64) * stride;

        // next[r + 1] = prev[r + 1] + sum(column[0..=r])
        let mut row_sum = 0.0;
        self.sums[next] = 0.0;
        for (r, value) in column.iter().enumerate() {
            row_sum += value;
            self.sums[next + r + 1] = self.sums[prev + r + 1] + row_sum;
        }

        self.columns += 1;

        if self.columns % self.capacity as u64 == 0 {
            self.rebase();
        }
    }

    /// Sum over `rows` and the `width` columns ending `back` columns before
    /// the newest one (`back == 0` ends at the newest column).
    ///
    /// # Panics
    /// Panics if the rectangle reaches past the added or retained columns,
    /// or if `rows` is out of range.
    pub fn range_sum(&self, rows: Range<usize>, back: usize, width: usize) -> f64 {
        assert!(
            (back + width) as u64 <= self.columns,
            "query spans {} columns but only {} were added",
            back + width,
            self.columns
        );
        assert!(
            back + width <= self.capacity,
            "query spans {} columns but only {} are retained",
            back + width,
            self.capacity
        );
        assert!(rows.start <= rows.end && rows.end <= self.bins, "row range out of bounds");

        if width == 0 || rows.is_empty() {
            return 0.0;
        }

        let stride = self.bins + 1;
        let last = self.columns as i64 - 1 - back as i64;
        let end = self.slot(last) * stride;
        let start = self.slot(last - width as i64) * stride;

        let s = &self.sums;
        (s[end + rows.end] - s[end + rows.start]) - (s[start + rows.end] - s[start + rows.start])
    }

    /// Ring slot holding the cumulative sums through logical column `column`.
    /// Column `-1` is the all-zero baseline before the first column.
    fn slot(&self, column: i64) -> usize {
        ((column + 1) as u64 % (self.capacity as u64 + 1)) as usize
    }

    /// Subtract the oldest stored row from every stored row.
    fn rebase(&mut self) {
        let stride = self.bins + 1;
        let oldest = self.slot(self.columns as i64 - 1 - self.capacity as i64) * stride;
        self.base.copy_from_slice(&self.sums[oldest..oldest + stride]);
        for row in self.sums.chunks_exact_mut(stride) {
            for (value, b) in row.iter_mut().zip(&self.base) {
                *value -= b;
            }
        }
    }
}
