use chrono::{DateTime, Utc};

/// Source of "now" for every due-date decision.
///
/// Sweeps are a pure function of the current time and store contents, so
/// the clock is injected rather than read ad hoc.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock used in production
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
