// ABOUTME: Immutable retry/backoff policy for bounded polling of deferred values.
// ABOUTME: Each evaluation draws a fresh delay sequence capped at the max poll period.

use super::sequence::Exponential;
use nonempty::NonEmpty;
use serde::Deserialize;
use std::time::Duration;

pub const DEFAULT_MAX_DURATION: Duration = Duration::from_secs(30);
pub const DEFAULT_MAX_POLL_PERIOD: Duration = Duration::from_secs(5);

fn default_max_duration() -> Duration {
    DEFAULT_MAX_DURATION
}

fn default_max_poll_period() -> Duration {
    DEFAULT_MAX_POLL_PERIOD
}

/// Delays between successive resolution attempts.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum RetryDelays {
    /// The same delay between every attempt.
    Fixed {
        #[serde(with = "humantime_serde")]
        every: Duration,
    },
    /// Exponentially growing delays in milliseconds.
    Exponential {
        #[serde(default)]
        initial_millis: f64,
        growth_percent: f64,
    },
    /// An explicit sequence; the last element repeats once exhausted.
    #[serde(skip)]
    Sequence(NonEmpty<Duration>),
}

impl Default for RetryDelays {
    fn default() -> Self {
        RetryDelays::Exponential {
            initial_millis: 0.0,
            growth_percent: 50.0,
        }
    }
}

impl RetryDelays {
    /// A fresh, infinite delay sequence.
    pub fn iter(&self) -> Box<dyn Iterator<Item = Duration> + Send> {
        match self {
            RetryDelays::Fixed { every } => Box::new(std::iter::repeat(*every)),
            RetryDelays::Exponential {
                initial_millis,
                growth_percent,
            } => Box::new(Exponential::new(*initial_millis, *growth_percent).map(Duration::from_millis)),
            RetryDelays::Sequence(delays) => {
                let last = *delays.last();
                Box::new(delays.clone().into_iter().chain(std::iter::repeat(last)))
            }
        }
    }
}

/// How long, and how often, to retry resolving a deferred value.
///
/// ```
/// use foreman::deferred::TimeoutConstraint;
/// use std::time::Duration;
///
/// let constraint = TimeoutConstraint::default()
///     .within(Duration::from_millis(200))
///     .polling_every(Duration::from_millis(50));
/// assert_eq!(constraint.max_duration(), Duration::from_millis(200));
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TimeoutConstraint {
    #[serde(default, with = "humantime_serde")]
    initial_delay: Duration,
    #[serde(default = "default_max_poll_period", with = "humantime_serde")]
    max_poll_period: Duration,
    #[serde(default = "default_max_duration", with = "humantime_serde")]
    max_duration: Duration,
    #[serde(default)]
    retry_delays: RetryDelays,
}

impl Default for TimeoutConstraint {
    fn default() -> Self {
        Self {
            initial_delay: Duration::ZERO,
            max_poll_period: DEFAULT_MAX_POLL_PERIOD,
            max_duration: DEFAULT_MAX_DURATION,
            retry_delays: RetryDelays::default(),
        }
    }
}

impl TimeoutConstraint {
    /// Overall budget for the evaluation.
    pub fn within(mut self, max_duration: Duration) -> Self {
        self.max_duration = max_duration;
        self
    }

    /// Sleep before the first attempt.
    pub fn delayed_by(mut self, initial_delay: Duration) -> Self {
        self.initial_delay = initial_delay;
        self
    }

    /// Retry at a fixed interval.
    pub fn polling_every(mut self, every: Duration) -> Self {
        self.retry_delays = RetryDelays::Fixed { every };
        self
    }

    /// Upper bound for any single delay.
    pub fn with_max_poll_period(mut self, max_poll_period: Duration) -> Self {
        self.max_poll_period = max_poll_period;
        self
    }

    pub fn with_retry_delays(mut self, retry_delays: RetryDelays) -> Self {
        self.retry_delays = retry_delays;
        self
    }

    pub fn initial_delay(&self) -> Duration {
        self.initial_delay
    }

    pub fn max_poll_period(&self) -> Duration {
        self.max_poll_period
    }

    pub fn max_duration(&self) -> Duration {
        self.max_duration
    }

    pub fn retry_delays(&self) -> &RetryDelays {
        &self.retry_delays
    }

    /// A fresh delay sequence for one evaluation, capped at the max poll period.
    pub fn delays(&self) -> impl Iterator<Item = Duration> + Send + use<> {
        let cap = self.max_poll_period;
        self.retry_delays.iter().map(move |delay| delay.min(cap))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nonempty::nonempty;

    #[test]
    fn default_matches_documented_policy() {
        let constraint = TimeoutConstraint::default();
        assert_eq!(constraint.initial_delay(), Duration::ZERO);
        assert_eq!(constraint.max_duration(), Duration::from_secs(30));
        assert_eq!(constraint.max_poll_period(), Duration::from_secs(5));

        let delays: Vec<Duration> = constraint.delays().take(3).collect();
        assert_eq!(
            delays,
            vec![Duration::ZERO, Duration::from_millis(1), Duration::from_millis(2)]
        );
    }

    #[test]
    fn delays_are_capped_at_max_poll_period() {
        let constraint = TimeoutConstraint::default()
            .polling_every(Duration::from_secs(60))
            .with_max_poll_period(Duration::from_secs(2));
        assert!(constraint.delays().take(5).all(|d| d == Duration::from_secs(2)));
    }

    #[test]
    fn finite_sequence_repeats_last_delay() {
        let constraint = TimeoutConstraint::default().with_retry_delays(RetryDelays::Sequence(nonempty![
            Duration::from_millis(10),
            Duration::from_millis(20)
        ]));
        let delays: Vec<Duration> = constraint.delays().take(4).collect();
        assert_eq!(
            delays,
            vec![
                Duration::from_millis(10),
                Duration::from_millis(20),
                Duration::from_millis(20),
                Duration::from_millis(20)
            ]
        );
    }

    #[test]
    fn each_evaluation_gets_a_fresh_sequence() {
        let constraint = TimeoutConstraint::default();
        let first: Vec<Duration> = constraint.delays().take(4).collect();
        let second: Vec<Duration> = constraint.delays().take(4).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn deserializes_humantime_durations() {
        let json = r#"{
            "initial_delay": "100ms",
            "max_duration": "2s",
            "retry_delays": { "kind": "fixed", "every": "250ms" }
        }"#;
        let constraint: TimeoutConstraint = serde_json::from_str(json).unwrap();
        assert_eq!(constraint.initial_delay(), Duration::from_millis(100));
        assert_eq!(constraint.max_duration(), Duration::from_secs(2));
        assert_eq!(constraint.max_poll_period(), DEFAULT_MAX_POLL_PERIOD);
        assert_eq!(
            constraint.retry_delays(),
            &RetryDelays::Fixed {
                every: Duration::from_millis(250)
            }
        );
    }
}
