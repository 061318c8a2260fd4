//! Synthetic telemetry lines for exercising a store without field units.

use chrono::{DateTime, SecondsFormat, TimeDelta, Utc};

/// Generates wire-format lines whose values vary smoothly over time.
///
/// Values are a function of the sample instant only, so re-running a
/// simulation over the same range reproduces the same lines.
pub struct MockSensorGenerator {
    /// Seconds per fast cycle; slower components are multiples of it
    period_secs: f64,
}

impl MockSensorGenerator {
    pub fn new() -> Self {
        Self {
            period_secs: 86_400.0,
        }
    }

    /// One line carrying every simulated parameter at `at`.
    pub fn line_at(&self, at: DateTime<Utc>) -> String {
        let t = at.timestamp() as f64 / self.period_secs * core::f64::consts::TAU;

        // Water temperature: 16–24 °C, daily swing with a slow drift
        let water = 20.0 + 3.0 * t.sin() + 1.0 * (t / 7.0).cos();

        // Air temperature in Fahrenheit, wider daily swing
        let air_f = 75.0 + 9.0 * (t - 0.5).sin() + 2.0 * (t / 5.0).cos();

        // pH: 6.6–7.4
        let ph = 7.0 + 0.3 * (t / 3.0).sin() + 0.1 * (t * 2.0).cos();

        // Pressure: 1000–1026 hPa on a multi-day cycle
        let pressure = 1013.0 + 10.0 * (t / 4.0).sin() + 3.0 * (t / 1.5).cos();

        // Relative humidity: 50–90 %
        let humidity = 70.0 + 15.0 * (t + 1.0).sin() + 5.0 * (t / 2.0).cos();

        format!(
            "{};Tw={:.2};Ta:F={:.2};pH={:.2};Pa={:.1};RH={:.1}",
            at.to_rfc3339_opts(SecondsFormat::Secs, true),
            water,
            air_f,
            ph,
            pressure,
            humidity
        )
    }

    /// `count` lines spaced `interval` apart, the last one at `end`.
    ///
    /// Returns `None` when the earliest instant is not representable.
    pub fn generate_history(
        &self,
        count: usize,
        interval: TimeDelta,
        end: DateTime<Utc>,
    ) -> Option<Vec<String>> {
        (0..count)
            .rev()
            .map(|i| {
                let back = interval.checked_mul(i32::try_from(i).ok()?)?;
                end.checked_sub_signed(back).map(|at| self.line_at(at))
            })
            .collect()
    }
}

impl Default for MockSensorGenerator {
    fn default() -> Self {
        Self::new()
    }
}
