//! 24-hour demand buckets.

use std::ops::{AddAssign, Index};

/// Hours in a schedule.
pub const HOURS: usize = 24;

/// Hourly demand over one day, indexed by hour `0..24`.
///
/// Values are kW in power mode, or occupancy flags in occupancy mode.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DemandSchedule([f64; HOURS]);

impl Default for DemandSchedule {
    fn default() -> Self {
        Self([0.0; HOURS])
    }
}

impl DemandSchedule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `len` consecutive hours from `start` to `value`, wrapping past
    /// midnight. `len` is capped at one day.
    pub fn set_run(&mut self, start: usize, len: usize, value: f64) {
        for h in wrapped_hours(start, len) {
            self.0[h] = value;
        }
    }

    /// Keeps the larger of the two values in every hour.
    pub fn max_assign(&mut self, other: &DemandSchedule) {
        for (a, b) in self.0.iter_mut().zip(other.0) {
            *a = a.max(b);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.0.iter().copied().enumerate()
    }

    pub fn total(&self) -> f64 {
        self.0.iter().sum()
    }

    /// Hour and value of the largest bucket; earliest hour on ties.
    pub fn peak(&self) -> (usize, f64) {
        self.iter()
            .fold((0, self.0[0]), |best, (h, v)| if v > best.1 { (h, v) } else { best })
    }

    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|&v| v == 0.0)
    }
}

fn wrapped_hours(start: usize, len: usize) -> impl Iterator<Item = usize> {
    (0..len.min(HOURS)).map(move |i| (start + i) % HOURS)
}

impl Index<usize> for DemandSchedule {
    type Output = f64;

    fn index(&self, hour: usize) -> &f64 {
        &self.0[hour % HOURS]
    }
}

impl AddAssign<&DemandSchedule> for DemandSchedule {
    fn add_assign(&mut self, rhs: &DemandSchedule) {
        for (a, b) in self.0.iter_mut().zip(rhs.0) {
            *a += b;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_wraps_past_midnight() {
        let mut s = DemandSchedule::new();
        s.set_run(22, 4, 2.0);
        let lit: Vec<usize> = s.iter().filter(|(_, v)| *v > 0.0).map(|(h, _)| h).collect();
        assert_eq!(lit, vec![0, 1, 22, 23]);
        assert_eq!(s.total(), 8.0);
    }

    #[test]
    fn run_is_capped_at_one_day() {
        let mut s = DemandSchedule::new();
        s.set_run(5, 40, 1.0);
        assert_eq!(s.total(), 24.0);
    }

    #[test]
    fn set_run_overwrites() {
        let mut s = DemandSchedule::new();
        s.set_run(3, 2, 1.0);
        s.set_run(4, 2, 1.0);
        assert_eq!(s.total(), 3.0);
    }

    #[test]
    fn max_assign_does_not_stack_overlaps() {
        let mut a = DemandSchedule::new();
        a.set_run(17, 3, 1.0);
        let mut b = DemandSchedule::new();
        b.set_run(18, 4, 1.0);
        a.max_assign(&b);
        assert_eq!(a.peak(), (17, 1.0));
        assert_eq!(a.total(), 5.0);
    }

    #[test]
    fn sums_and_peaks() {
        let mut a = DemandSchedule::new();
        a.set_run(18, 2, 3.0);
        let mut b = DemandSchedule::new();
        b.set_run(19, 1, 1.5);
        a += &b;
        assert_eq!(a.peak(), (19, 4.5));
        assert_eq!(a[43], 4.5);
        assert!(DemandSchedule::new().is_zero());
    }
}
