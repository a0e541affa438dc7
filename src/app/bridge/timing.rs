use std::time::Duration;

/// The bridge tool gives no completion signal, so output completeness is
/// guessed: short deterministic commands get a fixed settle delay, open-ended
/// ones (scan, transfer) get a poll-until-significant-output loop with an
/// upper bound. A reached bound is not fatal; callers treat the collected
/// output (possibly empty) as the result.

/// Heuristic delay after which a command's output is assumed complete.
pub fn settle_delay(command: &str) -> Duration {
    let normalized = command.to_lowercase();
    if normalized.contains("start-server") {
        Duration::from_millis(5000)
    } else if normalized.contains("kill-server") {
        Duration::from_millis(250)
    } else if normalized.contains("connect") && !normalized.contains("pair") {
        Duration::from_millis(1000)
    } else if normalized.contains("pair") || normalized.contains("mkdir") {
        Duration::from_millis(100)
    } else if normalized.contains("uninstall") {
        Duration::from_millis(10_000)
    } else {
        Duration::from_millis(500)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub bound: Duration,
}

impl PollPolicy {
    pub fn device_scan() -> Self {
        Self {
            interval: Duration::from_millis(100),
            bound: Duration::from_millis(5000),
        }
    }

    pub fn transfer() -> Self {
        Self {
            interval: Duration::from_millis(100),
            bound: Duration::from_secs(120),
        }
    }

    pub fn package_listing() -> Self {
        Self {
            interval: Duration::from_millis(100),
            bound: Duration::from_secs(10),
        }
    }
}

/// Pluggable per-command strategy so callers (and tests) can trade latency
/// against confidence; the defaults encode the best-effort heuristics above.
pub trait TimingStrategy: Send + Sync {
    fn settle_delay(&self, command: &str) -> Duration {
        settle_delay(command)
    }

    fn device_scan_poll(&self) -> PollPolicy {
        PollPolicy::device_scan()
    }

    fn transfer_poll(&self) -> PollPolicy {
        PollPolicy::transfer()
    }

    fn package_poll(&self) -> PollPolicy {
        PollPolicy::package_listing()
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultTiming;

impl TimingStrategy for DefaultTiming {}
