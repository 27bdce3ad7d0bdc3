//! Adjacent track repair (ATR) stalls.
//!
//! After every serviced request the disk rolls a percentage. A roll under the
//! current threshold stalls the disk for `70 + 3 * threshold` ms and resets
//! the threshold to its base; any other roll raises the threshold by one.
//! The threshold has no upper bound.

use dvrsim_core::SimTime;

#[derive(Debug, Clone)]
pub struct MaintenanceModel {
    base: u32,
    threshold: u32,
}

impl MaintenanceModel {
    pub fn new(base_chance: u32) -> Self {
        Self {
            base: base_chance,
            threshold: base_chance,
        }
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    /// Applies one roll in `[0, 100)`; returns the stall, if any.
    pub fn after_request(&mut self, roll: u64) -> Option<SimTime> {
        if roll < u64::from(self.threshold) {
            let stall = 70.0 + 3.0 * f64::from(self.threshold);
            self.threshold = self.base;
            Some(stall)
        } else {
            self.threshold += 1;
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_climbs_until_a_roll_lands_under_it() {
        let mut model = MaintenanceModel::new(0);
        let rolls = [0, 5, 3, 50, 2];
        let outcomes: Vec<_> = rolls.iter().map(|&r| model.after_request(r)).collect();

        // Thresholds before each roll: 0, 1, 2, 3, 4.
        assert_eq!(outcomes, vec![None, None, None, None, Some(82.0)]);
        assert_eq!(model.threshold(), 0);
    }

    #[test]
    fn stall_resets_to_configured_base() {
        let mut model = MaintenanceModel::new(10);
        assert_eq!(model.after_request(99), None);
        assert_eq!(model.threshold(), 11);
        assert_eq!(model.after_request(10), Some(70.0 + 33.0));
        assert_eq!(model.threshold(), 10);
    }

    #[test]
    fn threshold_is_not_clamped() {
        let mut model = MaintenanceModel::new(0);
        for expected in 1..=150 {
            // A roll of 100 can never land under a threshold of at most 100.
            assert_eq!(model.after_request(100), None);
            assert_eq!(model.threshold(), expected);
        }
    }

    #[test]
    fn deterministic_sequence_over_many_requests() {
        let mut model = MaintenanceModel::new(2);
        let mut expected = 2;
        for i in 0..200u64 {
            let roll = (i * 37) % 100;
            let stalled = model.after_request(roll);
            if roll < expected {
                assert_eq!(stalled, Some(70.0 + 3.0 * expected as f64));
                expected = 2;
            } else {
                assert_eq!(stalled, None);
                expected += 1;
            }
            assert_eq!(u64::from(model.threshold()), expected);
        }
    }
}
