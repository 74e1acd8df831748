use chrono::{DateTime, Local, TimeZone};

/// Wall-clock source for time-of-day rules and history timestamps.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Local>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> { Local::now() }
}

/// Always reports the same instant. Used for replay and tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Local>);

impl FixedClock {
    /// `hour:00:00` local time on 2024-01-15, a date with no DST transition in any zone.
    pub fn at_hour(hour: u32) -> Option<Self> {
        Local.with_ymd_and_hms(2024, 1, 15, hour, 0, 0).earliest().map(FixedClock)
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Local> { self.0 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn fixed_clock_reports_requested_hour() {
        let c = FixedClock::at_hour(23).unwrap();
        assert_eq!(c.now().hour(), 23);
        assert!(FixedClock::at_hour(24).is_none());
    }

    #[test]
    fn every_hour_is_representable() {
        for hour in 0..24 {
            let c = FixedClock::at_hour(hour).unwrap();
            assert_eq!(c.now().hour(), hour);
        }
    }
}
