use std::time::{Duration, Instant};

use crate::error::{Error, Result};

/// Holds each loop iteration to a fixed interval.
///
/// The pacer never catches up: an iteration that overruns the interval is
/// followed immediately by the next one, and the lost time is not recovered.
#[derive(Debug)]
pub struct Pacer {
    interval: Duration,
    iteration_start: Instant,
}

impl Pacer {
    pub fn from_fps(fps: u32) -> Result<Self> {
        if fps == 0 {
            return Err(Error::config("target fps must be >= 1"));
        }
        Ok(Self::new(Duration::from_secs_f64(1.0 / f64::from(fps))))
    }

    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            iteration_start: Instant::now(),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Marks the start of an iteration.
    pub fn begin(&mut self) {
        self.iteration_start = Instant::now();
    }

    /// Time left in the current iteration, `None` once it has overrun.
    pub fn remaining(&self) -> Option<Duration> {
        self.interval
            .checked_sub(self.iteration_start.elapsed())
            .filter(|left| !left.is_zero())
    }

    /// Sleeps out the rest of the iteration. Returns how long it slept.
    pub fn pace(&self) -> Duration {
        match self.remaining() {
            Some(left) => {
                std::thread::sleep(left);
                left
            }
            None => Duration::ZERO,
        }
    }
}
