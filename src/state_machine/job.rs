use std::time::Duration;

use serde::Serialize;
use uuid::Uuid;

/// The image being decoded. Immutable for the lifetime of a decode request.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: Uuid,
    image: Vec<u8>,
}

impl Job {
    pub fn new(image: impl Into<Vec<u8>>) -> Self {
        Self {
            id: Uuid::new_v4(),
            image: image.into(),
        }
    }

    pub fn image(&self) -> &[u8] {
        &self.image
    }
}

/// Per-adapter polling schedule.
///
/// `max_attempts` bounds the number of polls, not wall-clock time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RetryPolicy {
    /// Wait between a successful submission and the first poll.
    pub initial_delay: Duration,
    /// Wait between two consecutive polls.
    pub poll_delay: Duration,
    pub max_attempts: u32,
}

impl RetryPolicy {
    pub const fn from_secs(initial: u64, poll: u64, max_attempts: u32) -> Self {
        Self {
            initial_delay: Duration::from_secs(initial),
            poll_delay: Duration::from_secs(poll),
            max_attempts,
        }
    }

    /// Wall-clock time spent waiting when every allowed poll is used.
    pub fn worst_case_wait(&self) -> Duration {
        if self.max_attempts == 0 {
            return Duration::ZERO;
        }
        self.initial_delay + self.poll_delay * (self.max_attempts - 1)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_secs(10, 5, 6)
    }
}
