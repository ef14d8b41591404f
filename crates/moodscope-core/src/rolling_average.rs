//! Thread-safe running mean over the last N samples.
//!
//! The audio thread pushes one RMS value per block while render/UI threads
//! read the mean at their own cadence. Eviction, insertion and the sum update
//! happen under the same lock that readers take, so a reader never sees a
//! sum/count pair that disagrees with the buffer contents.

use crate::config::DEFAULT_ROLLING_WINDOW;
use parking_lot::Mutex;
use tracing::debug;

/// Eviction ratio past which the running sum is rebuilt from the samples
const CANCELLATION_RATIO: f64 = (1u64 << 20) as f64;

#[derive(Debug)]
struct Window {
    samples: Vec<f32>,
    max_size: usize,
    /// Next slot to overwrite once the window is full
    cursor: usize,
    /// f64 keeps the subtract-then-add cycle from drifting over long sessions
    sum: f64,
}

impl Window {
    fn with_capacity(max_size: usize) -> Self {
        Self {
            samples: Vec::with_capacity(max_size),
            max_size,
            cursor: 0,
            sum: 0.0,
        }
    }

    fn push(&mut self, value: f32) {
        let value = if value.is_finite() { value } else { 0.0 };
        if self.samples.len() < self.max_size {
            // Within reserved capacity, never reallocates
            self.samples.push(value);
            self.sum += value as f64;
        } else {
            let evicted = self.samples[self.cursor] as f64;
            self.samples[self.cursor] = value;
            self.cursor = (self.cursor + 1) % self.max_size;
            self.sum -= evicted;
            if evicted.abs() > CANCELLATION_RATIO * self.sum.abs() {
                // The evicted value dominated the sum; what is left is mostly rounding error
                self.sum = self.samples.iter().map(|&v| v as f64).sum();
            } else {
                self.sum += value as f64;
            }
        }
    }

    fn average(&self) -> f32 {
        if self.samples.is_empty() {
            0.0
        } else {
            (self.sum / self.samples.len() as f64) as f32
        }
    }
}

/// Fixed-capacity circular buffer computing the mean of its contents
#[derive(Debug)]
pub struct RollingAverage {
    window: Mutex<Window>,
}

impl Default for RollingAverage {
    fn default() -> Self {
        Self::new(DEFAULT_ROLLING_WINDOW)
    }
}

impl RollingAverage {
    /// Create an empty window holding at most `max_size` samples.
    ///
    /// A capacity of zero is bumped to one; use
    /// [`AnalyzerConfig::validate`](crate::AnalyzerConfig::validate) to reject it up front.
    pub fn new(max_size: usize) -> Self {
        Self {
            window: Mutex::new(Window::with_capacity(max_size.max(1))),
        }
    }

    /// Insert a sample, evicting the oldest one when the window is full.
    ///
    /// Non-finite values are stored as 0.0.
    pub fn push(&self, value: f32) {
        self.window.lock().push(value);
    }

    /// Mean of the samples currently held, 0.0 when empty
    pub fn average(&self) -> f32 {
        self.window.lock().average()
    }

    /// Push a sample and return the updated mean in one critical section
    pub fn push_and_average(&self, value: f32) -> f32 {
        let mut window = self.window.lock();
        window.push(value);
        window.average()
    }

    /// Reset to an empty window of capacity `max_size`.
    ///
    /// Allocates, so keep it off the audio callback.
    pub fn set_max_size(&self, max_size: usize) {
        let fresh = Window::with_capacity(max_size.max(1));
        let old = std::mem::replace(&mut *self.window.lock(), fresh);
        drop(old);
        debug!("RollingAverage resized to {}", max_size.max(1));
    }

    /// Drop all samples, keeping the current capacity
    pub fn clear(&self) {
        let mut window = self.window.lock();
        window.samples.clear();
        window.cursor = 0;
        window.sum = 0.0;
    }

    /// Current capacity
    pub fn max_size(&self) -> usize {
        self.window.lock().max_size
    }

    /// Number of samples currently held
    pub fn len(&self) -> usize {
        self.window.lock().samples.len()
    }

    /// True when no samples have been pushed since construction or the last reset
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
