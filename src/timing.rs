use std::time::{Duration, Instant};

/// Timer logging the elapsed time of a step when dropped.
pub(crate) struct Timed {
    name: &'static str,
    start: Instant,
    level: log::Level,
}

impl Timed {
    /// A timer logging at the `Info` level.
    pub fn info(name: &'static str) -> Self {
        log::debug!("{}...", name);
        Self::new(name, log::Level::Info)
    }

    /// A timer logging at the `Debug` level.
    pub fn debug(name: &'static str) -> Self {
        log::trace!("{}...", name);
        Self::new(name, log::Level::Debug)
    }

    fn new(name: &'static str, level: log::Level) -> Self {
        Self {
            name,
            start: Instant::now(),
            level,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Drop for Timed {
    fn drop(&mut self) {
        log::log!(self.level, "{}: {:.3?}", self.name, self.start.elapsed());
    }
}
