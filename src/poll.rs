// Sleep-then-recheck pacing shared by the device flow and `shbin run`.

use std::time::Duration;

/// Tracks the time spent waiting between polls. The budget counts slept
/// intervals, not wall clock time, so loops are deterministic under test.
pub struct Poller<'a> {
    interval: Duration,
    budget: Option<Duration>,
    waited: Duration,
    sleep: &'a mut dyn FnMut(Duration),
}

impl<'a> Poller<'a> {
    pub fn new(interval: Duration, budget: Option<Duration>, sleep: &'a mut dyn FnMut(Duration)) -> Self {
        Poller {
            interval,
            budget,
            waited: Duration::ZERO,
            sleep,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn set_interval(&mut self, interval: Duration) {
        self.interval = interval;
    }

    pub fn waited(&self) -> Duration {
        self.waited
    }

    /// Sleep one interval. Returns `false` without sleeping once the next
    /// wait would exceed the budget.
    pub fn wait(&mut self) -> bool {
        if let Some(budget) = self.budget {
            if self.waited + self.interval > budget {
                return false;
            }
        }
        (self.sleep)(self.interval);
        self.waited += self.interval;
        true
    }
}

/// Real sleeping for production loops.
pub fn thread_sleep(duration: Duration) {
    std::thread::sleep(duration);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unbounded_poller_always_waits() {
        let mut slept = Vec::new();
        let mut sleep = |d: Duration| slept.push(d);
        let mut poller = Poller::new(Duration::from_secs(1), None, &mut sleep);
        for _ in 0..100 {
            assert!(poller.wait());
        }
        assert_eq!(poller.waited(), Duration::from_secs(100));
        drop(poller);
        assert_eq!(slept.len(), 100);
    }

    #[test]
    fn budget_stops_the_loop() {
        let mut sleep = |_: Duration| {};
        let mut poller = Poller::new(Duration::from_secs(5), Some(Duration::from_secs(12)), &mut sleep);
        assert!(poller.wait());
        assert!(poller.wait());
        assert!(!poller.wait());
        assert_eq!(poller.waited(), Duration::from_secs(10));
    }

    #[test]
    fn interval_can_grow() {
        let mut sleep = |_: Duration| {};
        let mut poller = Poller::new(Duration::from_secs(5), Some(Duration::from_secs(15)), &mut sleep);
        assert!(poller.wait());
        poller.set_interval(Duration::from_secs(10));
        assert_eq!(poller.interval(), Duration::from_secs(10));
        assert!(poller.wait());
        assert!(!poller.wait());
    }
}
