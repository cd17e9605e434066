use uuid::Uuid;

use crate::constants::{POWERUP_EDGE_MARGIN, POWERUP_RADIUS, POWERUP_TYPES};
use crate::rng::Rng;
use crate::timers::{TimerTable, TimerToken};
use crate::types::PowerupView;

/// Owns the power-up spawn interval of one room. The session starts it on
/// entering Playing and stops it on every way out.
#[derive(Clone, Debug)]
pub struct PowerupSpawner {
    interval_ms: u64,
    width: f64,
    height: f64,
    timer: Option<TimerToken>,
}

impl PowerupSpawner {
    pub fn new(interval_ms: u64, width: u32, height: u32) -> Self {
        Self {
            interval_ms,
            width: f64::from(width),
            height: f64::from(height),
            timer: None,
        }
    }

    pub fn start<T: Clone>(&mut self, timers: &mut TimerTable<T>, now_ms: u64, payload: T) {
        timers.cancel(self.timer.take());
        self.timer = Some(timers.schedule_repeating(now_ms, self.interval_ms, payload));
    }

    pub fn stop<T: Clone>(&mut self, timers: &mut TimerTable<T>) {
        timers.cancel(self.timer.take());
    }

    #[cfg(test)]
    pub fn is_running(&self) -> bool {
        self.timer.is_some()
    }

    pub fn owns(&self, token: TimerToken) -> bool {
        self.timer == Some(token)
    }

    /// One power-up of uniformly random type, kept `POWERUP_EDGE_MARGIN` away
    /// from every edge (clamped to the center on canvases too small for it).
    pub fn spawn(&self, rng: &mut Rng) -> PowerupView {
        let kind = POWERUP_TYPES[rng.pick_index(POWERUP_TYPES.len())];
        PowerupView {
            id: Uuid::new_v4().to_string(),
            kind,
            x: spawn_coordinate(rng, self.width),
            y: spawn_coordinate(rng, self.height),
            radius: POWERUP_RADIUS,
        }
    }
}

fn spawn_coordinate(rng: &mut Rng, extent: f64) -> f64 {
    let low = POWERUP_EDGE_MARGIN.min(extent / 2.0);
    let high = (extent - POWERUP_EDGE_MARGIN).max(low);
    rng.range(low, high)
}
