//! The (sample rate, block size) context in effect when a generator is
//! constructed.

use std::f64::consts::PI;

/// A sampling rate and its derived constants. A generator captures the
/// thread's current rate at construction and keeps it for its lifetime.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rate {
    pub block_size: usize,
    pub sample_rate: f64,
    pub nyquist_rate: f64,
    pub inv_sample_rate: f64,
    pub inv_nyquist_rate: f64,
    pub radians_per_sample: f64,
    pub inv_block_size: f64,
    pub freq_limit: f64,
}

impl Rate {
    pub fn new(sample_rate: f64, block_size: usize) -> Self {
        let nyquist_rate = 0.5 * sample_rate;
        let inv_sample_rate = 1.0 / sample_rate;
        Rate {
            block_size,
            sample_rate,
            nyquist_rate,
            inv_sample_rate,
            inv_nyquist_rate: 2.0 * inv_sample_rate,
            radians_per_sample: 2.0 * PI * inv_sample_rate,
            inv_block_size: 1.0 / block_size as f64,
            freq_limit: nyquist_rate.min(24000.0),
        }
    }

    /// Derive a rate divided down from this one, e.g. a control rate from
    /// the audio rate.
    pub fn div(&self, div: usize) -> Self {
        Rate::new(self.sample_rate / div as f64, self.block_size / div)
    }
}

impl Default for Rate {
    fn default() -> Self {
        Rate::new(crate::DEFAULT_SAMPLE_RATE, crate::DEFAULT_Z_BLOCK_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_constants() {
        let r = Rate::new(48000.0, 512);
        assert_eq!(r.nyquist_rate, 24000.0);
        assert_eq!(r.freq_limit, 24000.0);
        assert!((r.radians_per_sample * 48000.0 - 2.0 * PI).abs() < 1e-12);
        let half = r.div(2);
        assert_eq!(half.sample_rate, 24000.0);
        assert_eq!(half.block_size, 256);
    }
}
