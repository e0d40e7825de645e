// ABOUTME: Lazy, non-restartable numeric sequences used for retry delays.
// ABOUTME: Exponential produces `initial, initial + rate^0, initial + rate^1, ...` in milliseconds.

/// An infinite exponentially growing sequence.
///
/// The first element is `initial`. Element `n` (for `n >= 1`) is
/// `initial + rate^(n - 1)` where `rate = 1 + percentage / 100`. Values are
/// rounded to the nearest integer and saturate at `u64::MAX`.
///
/// The iterator is deliberately not `Clone`: a consumer that needs the
/// sequence again asks its policy for a fresh one.
#[derive(Debug)]
pub struct Exponential {
    initial: f64,
    rate: f64,
    iteration: u32,
}

impl Exponential {
    pub fn new(initial: f64, percentage: f64) -> Self {
        Self {
            initial,
            rate: 1.0 + percentage / 100.0,
            iteration: 0,
        }
    }
}

impl Iterator for Exponential {
    type Item = u64;

    fn next(&mut self) -> Option<u64> {
        let value = match self.iteration {
            0 => self.initial,
            n => self.initial + self.rate.powi(i32::try_from(n - 1).unwrap_or(i32::MAX)),
        };
        self.iteration = self.iteration.saturating_add(1);

        // Float to integer casts saturate, so infinity maps to u64::MAX
        Some(value.round() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn starts_at_initial_then_grows() {
        let values: Vec<u64> = Exponential::new(0.0, 50.0).take(6).collect();
        // 0, 1, 1.5, 2.25, 3.375, 5.0625
        assert_eq!(values, vec![0, 1, 2, 2, 3, 5]);
    }

    #[test]
    fn zero_growth_is_constant_after_first() {
        let values: Vec<u64> = Exponential::new(10.0, 0.0).take(4).collect();
        assert_eq!(values, vec![10, 11, 11, 11]);
    }

    #[test]
    fn saturates_instead_of_overflowing() {
        let last = Exponential::new(0.0, 1000.0).nth(400);
        assert_eq!(last, Some(u64::MAX));
    }

    proptest! {
        #[test]
        fn never_decreases(initial in 0.0f64..10_000.0, percentage in 0.0f64..500.0) {
            let values: Vec<u64> = Exponential::new(initial, percentage).skip(1).take(32).collect();
            for pair in values.windows(2) {
                prop_assert!(pair[0] <= pair[1]);
            }
        }
    }
}
