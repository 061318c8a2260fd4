//! Running min/avg/max fold

/// Running statistics over one group of values.
///
/// Only ever constructed from a first value, so an instance always describes
/// at least one reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunningStats {
    count: u64,
    sum: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    pub fn new(first: f64) -> Self {
        Self {
            count: 1,
            sum: first,
            min: first,
            max: first,
        }
    }

    /// Fold one more value in.
    pub fn push(&mut self, value: f64) {
        self.count += 1;
        self.sum += value;
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn sum(&self) -> f64 {
        self.sum
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    /// `sum / count`, clamped into `[min, max]` to absorb rounding error of
    /// the running sum.
    pub fn avg(&self) -> f64 {
        (self.sum / self.count as f64).clamp(self.min, self.max)
    }
}
