use std::time::{Duration, Instant};
use super::hardware::Clock;


/// countdown checked against a [Clock], it never expires unless started
#[derive(Copy, Clone, Debug, Default)]
pub struct Timer {
    deadline: Option<Duration>,
}
impl Timer {
    pub const fn new() -> Self {
        Self {deadline: None}
    }
    pub fn start(&mut self, clock: &impl Clock, duration: Duration) {
        self.deadline = Some(clock.now() + duration);
    }
    pub fn expired(&self, clock: &impl Clock) -> bool {
        self.deadline.is_some_and(|deadline| clock.now() >= deadline)
    }
    pub fn stop(&mut self) {
        self.deadline = None;
    }
}

/// [Clock] backed by the system monotonic clock
#[derive(Copy, Clone, Debug)]
pub struct MonotonicClock {
    origin: Instant,
}
impl MonotonicClock {
    pub fn new() -> Self {
        Self {origin: Instant::now()}
    }
}
impl Default for MonotonicClock {
    fn default() -> Self {Self::new()}
}
impl Clock for MonotonicClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
    fn sleep(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}
