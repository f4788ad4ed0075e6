//! Wall-clock scheduling for the background processes and the sliding
//! animation. Time is passed in by the caller; nothing here reads a clock.

use std::time::Duration;

use rand::Rng;

use crate::config::{MAX_SPEED, MIN_ACTIVE_SPEED};

/// Nominal frame period the speed options are expressed in.
pub const NOMINAL_FRAME: Duration = Duration::from_millis(40);

/// Average delay between two ticks of an auto process running at `speed`.
pub fn modulo_for_speed(speed: u32) -> Duration {
    let frames = (MAX_SPEED.saturating_sub(speed) / 20).max(1);
    NOMINAL_FRAME * frames
}

/// One-shot trigger re-armed to a random time around a mean period.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RandomEnd {
    next: Option<Duration>,
}

impl RandomEnd {
    /// Schedule the next fire time uniformly in `[now + modulo/2, now + 3*modulo/2)`.
    pub fn arm<R: Rng + ?Sized>(&mut self, now: Duration, modulo: Duration, rng: &mut R) {
        let modulo_us = modulo.as_micros().max(1) as u64;
        let jitter = rng.random_range(0..modulo_us);
        self.next = Some(now + Duration::from_micros(jitter + modulo_us / 2));
    }

    pub fn disarm(&mut self) {
        self.next = None;
    }

    pub fn next(&self) -> Option<Duration> {
        self.next
    }

    /// True once `now` reaches the scheduled time. The trigger then stays
    /// disarmed until armed again.
    pub fn fire(&mut self, now: Duration) -> bool {
        match self.next {
            Some(at) if now >= at => {
                self.next = None;
                true
            }
            _ => false,
        }
    }
}

/// Timer of one auto process (shuffle or solve).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AutoTimer {
    speed: u32,
    trigger: RandomEnd,
}

impl AutoTimer {
    pub fn new(speed: u32) -> Self {
        Self {
            speed,
            trigger: RandomEnd::default(),
        }
    }

    pub fn active(&self) -> bool {
        self.speed >= MIN_ACTIVE_SPEED
    }

    pub fn speed(&self) -> u32 {
        self.speed
    }

    /// Change the speed and schedule the next tick from `now`.
    pub fn rearm<R: Rng + ?Sized>(&mut self, speed: u32, now: Duration, rng: &mut R) {
        self.speed = speed;
        if self.active() {
            self.trigger.arm(now, modulo_for_speed(speed), rng);
        } else {
            self.trigger.disarm();
        }
    }

    /// True when a tick is due; the next one is scheduled on the spot.
    pub fn tick<R: Rng + ?Sized>(&mut self, now: Duration, rng: &mut R) -> bool {
        if !self.active() {
            return false;
        }
        if self.trigger.next().is_none() {
            self.trigger.arm(now, modulo_for_speed(self.speed), rng);
            return false;
        }
        if self.trigger.fire(now) {
            self.trigger.arm(now, modulo_for_speed(self.speed), rng);
            return true;
        }
        false
    }
}

/// Sliding offset of the piece moving into the black slot.
///
/// Elapsed time is accumulated as whole microseconds and the offset is
/// derived from the total, so splitting the same time into more frames
/// gives the same offset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SlideAnimation {
    /// Pixels to travel
    distance: i32,
    /// Pixels per second
    speed: u32,
    elapsed_us: u64,
}

impl SlideAnimation {
    pub fn new(distance: i32, speed: u32) -> Self {
        Self {
            distance: distance.max(0),
            speed,
            elapsed_us: 0,
        }
    }

    pub fn advance(&mut self, dt: Duration) {
        self.elapsed_us = self.elapsed_us.saturating_add(dt.as_micros() as u64);
    }

    pub fn offset(&self) -> i32 {
        let travelled = self.speed as u64 * self.elapsed_us / 1_000_000;
        travelled.min(self.distance as u64) as i32
    }

    /// Distance still to travel.
    pub fn remaining(&self) -> i32 {
        self.distance - self.offset()
    }

    pub fn done(&self) -> bool {
        self.offset() >= self.distance
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn random_end_stays_in_range() {
        let mut rng = StdRng::seed_from_u64(7);
        let modulo = Duration::from_millis(400);
        let now = Duration::from_secs(10);
        for _ in 0..500 {
            let mut t = RandomEnd::default();
            t.arm(now, modulo, &mut rng);
            let next = t.next().unwrap();
            assert!(next >= now + modulo / 2);
            assert!(next < now + modulo * 3 / 2);
        }
    }

    #[test]
    fn random_end_fires_once() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut t = RandomEnd::default();
        t.arm(Duration::ZERO, Duration::from_millis(100), &mut rng);
        assert!(!t.fire(Duration::from_millis(49)));
        assert!(t.fire(Duration::from_millis(150)));
        assert!(!t.fire(Duration::from_millis(300)));
    }

    #[test]
    fn modulo_shrinks_with_speed() {
        assert_eq!(modulo_for_speed(30000), NOMINAL_FRAME);
        assert_eq!(modulo_for_speed(29000), NOMINAL_FRAME * 50);
        assert!(modulo_for_speed(500) > modulo_for_speed(20000));
    }

    #[test]
    fn slow_timers_never_tick() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut timer = AutoTimer::new(499);
        for s in 0..100 {
            assert!(!timer.tick(Duration::from_secs(s), &mut rng));
        }
    }

    #[test]
    fn fast_timer_ticks_regularly() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut timer = AutoTimer::new(30000);
        let ticks = (0..100u64)
            .filter(|f| timer.tick(NOMINAL_FRAME * *f as u32, &mut rng))
            .count();
        assert!(ticks > 30, "{} ticks", ticks);
    }

    #[test]
    fn slide_offset_is_framerate_independent() {
        let total = Duration::from_millis(730);
        let mut coarse = SlideAnimation::new(500, 333);
        coarse.advance(total);

        let mut fine = SlideAnimation::new(500, 333);
        for _ in 0..100 {
            fine.advance(total / 100);
        }
        assert_eq!(coarse.offset(), fine.offset());
        assert_eq!(coarse.offset(), 333 * 730 / 1000);
    }

    #[test]
    fn slide_offset_saturates_at_distance() {
        let mut anim = SlideAnimation::new(20, 1000);
        anim.advance(Duration::from_secs(5));
        assert_eq!(anim.offset(), 20);
        assert!(anim.done());
        assert_eq!(anim.remaining(), 0);
    }
}
