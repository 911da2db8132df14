//! # Signal escalation used to stop a daemon.
//!
//! An [`EscalationSchedule`] is a table of `(elapsed threshold → signal)`. While
//! the target is alive, every `tick` the signal of the latest threshold that has
//! passed is sent. The loop gives up at `give_up_after`.
//!
//! Default table (16 ticks of 100ms):
//! ```text
//! elapsed   0ms  100  200  300  400 ... 1100 1200 | 1300 1400 1500
//! signal    INT  INT  TERM INT  TERM ... INT  TERM | KILL KILL KILL
//! ```

use std::fmt;
use std::time::Duration;

/// Signals used by escalation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signal {
    /// `SIGINT`
    Int,
    /// `SIGTERM`
    Term,
    /// `SIGKILL`
    Kill,
}

impl Signal {
    /// Raw signal number.
    pub fn as_raw(self) -> libc::c_int {
        match self {
            Signal::Int => libc::SIGINT,
            Signal::Term => libc::SIGTERM,
            Signal::Kill => libc::SIGKILL,
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Signal::Int => "SIGINT",
            Signal::Term => "SIGTERM",
            Signal::Kill => "SIGKILL",
        })
    }
}

/// One row of the escalation table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EscalationStep {
    /// Elapsed time since the stop began at which this signal takes over.
    pub after: Duration,
    /// Signal to send from then on.
    pub signal: Signal,
}

/// Elapsed-time → signal table evaluated on the monotonic clock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EscalationSchedule {
    steps: Vec<EscalationStep>,
    tick: Duration,
    give_up_after: Duration,
}

impl EscalationSchedule {
    /// Builds a schedule; steps are sorted by threshold.
    pub fn new(mut steps: Vec<EscalationStep>, tick: Duration, give_up_after: Duration) -> Self {
        steps.sort_by_key(|s| s.after);
        Self {
            steps,
            tick: tick.max(Duration::from_millis(1)),
            give_up_after,
        }
    }

    /// Interval between liveness checks (and signal sends).
    pub fn tick(&self) -> Duration {
        self.tick
    }

    /// Elapsed time after which escalation stops.
    pub fn give_up_after(&self) -> Duration {
        self.give_up_after
    }

    /// Rows of the table, ordered by threshold.
    pub fn steps(&self) -> &[EscalationStep] {
        &self.steps
    }

    /// Signal in force at `elapsed`; `None` before the first threshold or once the
    /// schedule gave up.
    pub fn signal_at(&self, elapsed: Duration) -> Option<Signal> {
        if elapsed >= self.give_up_after {
            return None;
        }
        self.steps
            .iter()
            .take_while(|s| s.after <= elapsed)
            .last()
            .map(|s| s.signal)
    }
}

impl Default for EscalationSchedule {
    fn default() -> Self {
        let tick = Duration::from_millis(100);
        let steps = (0u32..=13)
            .map(|round| EscalationStep {
                after: tick * round,
                signal: match round {
                    r if r >= 13 => Signal::Kill,
                    r if r > 0 && r % 2 == 0 => Signal::Term,
                    _ => Signal::Int,
                },
            })
            .collect();
        Self::new(steps, tick, tick * 16)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(ms: u64) -> Option<Signal> {
        EscalationSchedule::default().signal_at(Duration::from_millis(ms))
    }

    #[test]
    fn default_table_matches_rounds() {
        assert_eq!(at(0), Some(Signal::Int));
        assert_eq!(at(100), Some(Signal::Int));
        assert_eq!(at(200), Some(Signal::Term));
        assert_eq!(at(350), Some(Signal::Int));
        assert_eq!(at(1200), Some(Signal::Term));
        assert_eq!(at(1299), Some(Signal::Term));
        assert_eq!(at(1300), Some(Signal::Kill));
        assert_eq!(at(1599), Some(Signal::Kill));
        assert_eq!(at(1600), None);
    }

    #[test]
    fn default_gives_up_after_sixteen_ticks() {
        let s = EscalationSchedule::default();
        assert_eq!(s.tick(), Duration::from_millis(100));
        assert_eq!(s.give_up_after(), Duration::from_millis(1600));
        let kills = (0..16)
            .filter(|r| s.signal_at(s.tick() * *r) == Some(Signal::Kill))
            .count();
        assert_eq!(kills, 3);
    }

    #[test]
    fn custom_table_is_sorted() {
        let s = EscalationSchedule::new(
            vec![
                EscalationStep { after: Duration::from_secs(5), signal: Signal::Kill },
                EscalationStep { after: Duration::from_secs(1), signal: Signal::Term },
            ],
            Duration::from_millis(500),
            Duration::from_secs(10),
        );
        assert_eq!(s.signal_at(Duration::ZERO), None);
        assert_eq!(s.signal_at(Duration::from_secs(2)), Some(Signal::Term));
        assert_eq!(s.signal_at(Duration::from_secs(6)), Some(Signal::Kill));
        assert_eq!(s.steps()[0].signal, Signal::Term);
        assert_eq!(Signal::Kill.to_string(), "SIGKILL");
        assert_eq!(Signal::Term.as_raw(), libc::SIGTERM);
    }
}
