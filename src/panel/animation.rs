use std::time::{Duration, Instant};

/// Linear interpolation toward a target in a fixed number of equal steps. The last
/// step lands exactly on the target.
#[derive(Debug, Clone, PartialEq)]
pub struct Tween {
    target: f64,
    step_size: f64,
    steps_total: u32,
    steps_taken: u32,
}

impl Tween {
    pub fn new(start: f64, target: f64, steps: u32) -> Self {
        let steps_total = steps.max(1);
        Self {
            target,
            step_size: (target - start) / steps_total as f64,
            steps_total,
            steps_taken: 0,
        }
    }

    /// Advances one step from `current` and returns the new value.
    pub fn step(&mut self, current: f64) -> f64 {
        if self.is_finished() {
            return self.target;
        }
        self.steps_taken += 1;
        if self.is_finished() {
            self.target
        } else {
            current + self.step_size
        }
    }

    pub fn is_finished(&self) -> bool {
        self.steps_taken >= self.steps_total
    }

    pub fn target(&self) -> f64 {
        self.target
    }
}

/// A displayed number that walks toward new targets on a fixed cadence.
#[derive(Debug, Clone)]
pub struct AnimatedValue {
    value: f64,
    steps: u32,
    step_interval: Duration,
    tween: Option<Tween>,
    next_step_at: Option<Instant>,
}

impl AnimatedValue {
    pub fn new(steps: u32, step_interval: Duration) -> Self {
        Self {
            value: 0.0,
            steps,
            step_interval,
            tween: None,
            next_step_at: None,
        }
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn is_animating(&self) -> bool {
        self.tween.is_some()
    }

    /// Starts animating from the current value. Any animation in flight is dropped.
    pub fn animate_to(&mut self, target: f64, now: Instant) {
        self.tween = Some(Tween::new(self.value, target, self.steps));
        self.next_step_at = Some(now + self.step_interval);
    }

    /// Applies every step that is due at `now`. Returns whether the value changed.
    pub fn advance(&mut self, now: Instant) -> bool {
        let mut changed = false;
        while let (Some(tween), Some(due)) = (self.tween.as_mut(), self.next_step_at) {
            if due > now {
                break;
            }
            self.value = tween.step(self.value);
            changed = true;
            if tween.is_finished() {
                self.tween = None;
                self.next_step_at = None;
            } else {
                self.next_step_at = Some(due + self.step_interval);
            }
        }
        changed
    }

    /// Time until the next pending step, if any.
    pub fn next_step_in(&self, now: Instant) -> Option<Duration> {
        self.next_step_at
            .map(|due| due.saturating_duration_since(now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reaches_target_on_the_last_step() {
        let mut tween = Tween::new(0.0, 40.0, 10);
        let mut value = 0.0;
        for step in 1..=10 {
            value = tween.step(value);
            if step < 10 {
                assert!((value - 4.0 * step as f64).abs() < 1e-9);
            }
        }
        assert_eq!(value, 40.0);
        assert!(tween.is_finished());
    }

    #[test]
    fn last_step_absorbs_rounding_drift() {
        let mut tween = Tween::new(0.0, 0.7, 10);
        let mut value = 0.0;
        while !tween.is_finished() {
            value = tween.step(value);
        }
        assert_eq!(value, 0.7);
    }

    #[test]
    fn animated_value_steps_on_its_cadence() {
        let start = Instant::now();
        let interval = Duration::from_millis(50);
        let mut age = AnimatedValue::new(10, interval);
        age.animate_to(40.0, start);

        assert!(!age.advance(start));
        assert!(age.advance(start + interval));
        assert!((age.value() - 4.0).abs() < 1e-9);

        assert!(age.advance(start + interval * 3));
        assert!((age.value() - 12.0).abs() < 1e-9);

        assert!(age.advance(start + interval * 20));
        assert_eq!(age.value(), 40.0);
        assert!(!age.is_animating());
        assert_eq!(age.next_step_in(start), None);
    }

    #[test]
    fn retargeting_cancels_the_running_animation() {
        let start = Instant::now();
        let interval = Duration::from_millis(50);
        let mut value = AnimatedValue::new(10, interval);
        value.animate_to(40.0, start);
        value.advance(start + interval * 5);
        assert!((value.value() - 20.0).abs() < 1e-9);

        let restart = start + interval * 5;
        value.animate_to(10.0, restart);
        value.advance(restart + interval);
        assert!((value.value() - 19.0).abs() < 1e-9);

        value.advance(restart + interval * 10);
        assert_eq!(value.value(), 10.0);
    }
}
