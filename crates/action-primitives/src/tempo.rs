//! Humanised input timing for raw coordinate replay and inter-action pauses

use parking_lot::Mutex;
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::types::Point;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TempoPlan {
    /// Maximum pointer offset on each axis, in pixels
    pub jitter_px: f64,
    pub hover_min_ms: u64,
    pub hover_max_ms: u64,
    pub inter_action_min_ms: u64,
    pub inter_action_max_ms: u64,
    /// Fixed seed for reproducible runs
    pub seed: Option<u64>,
}

impl Default for TempoPlan {
    fn default() -> Self {
        Self {
            jitter_px: 3.0,
            hover_min_ms: 80,
            hover_max_ms: 250,
            inter_action_min_ms: 500,
            inter_action_max_ms: 1500,
            seed: None,
        }
    }
}

impl TempoPlan {
    /// No jitter and no delays; used by tests and dry runs.
    pub fn instant() -> Self {
        Self {
            jitter_px: 0.0,
            hover_min_ms: 0,
            hover_max_ms: 0,
            inter_action_min_ms: 0,
            inter_action_max_ms: 0,
            seed: Some(0),
        }
    }
}

/// Random source for jitter and delays.
pub struct Tempo {
    plan: TempoPlan,
    rng: Mutex<StdRng>,
}

impl Tempo {
    pub fn new(plan: TempoPlan) -> Self {
        let rng = match plan.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            plan,
            rng: Mutex::new(rng),
        }
    }

    pub fn plan(&self) -> &TempoPlan {
        &self.plan
    }

    /// `point` offset by up to `jitter_px` on each axis.
    pub fn jitter(&self, point: Point) -> Point {
        let jitter = self.plan.jitter_px.abs();
        if jitter == 0.0 {
            return point;
        }
        let mut rng = self.rng.lock();
        let dx = rng.gen_range(-jitter..=jitter);
        let dy = rng.gen_range(-jitter..=jitter);
        Point::new(point.x + dx, point.y + dy)
    }

    pub fn hover_delay(&self) -> Duration {
        self.sample(self.plan.hover_min_ms, self.plan.hover_max_ms)
    }

    pub fn inter_action_delay(&self) -> Duration {
        self.sample(self.plan.inter_action_min_ms, self.plan.inter_action_max_ms)
    }

    fn sample(&self, min: u64, max: u64) -> Duration {
        let (low, high) = if min <= max { (min, max) } else { (max, min) };
        if high == 0 {
            return Duration::ZERO;
        }
        let ms = self.rng.lock().gen_range(low..=high);
        Duration::from_millis(ms)
    }
}

impl Default for Tempo {
    fn default() -> Self {
        Self::new(TempoPlan::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jitter_stays_within_bounds() {
        let tempo = Tempo::new(TempoPlan {
            jitter_px: 4.0,
            seed: Some(7),
            ..TempoPlan::default()
        });
        for _ in 0..200 {
            let p = tempo.jitter(Point::new(100.0, 50.0));
            assert!((p.x - 100.0).abs() <= 4.0);
            assert!((p.y - 50.0).abs() <= 4.0);
        }
    }

    #[test]
    fn delays_stay_within_range() {
        let tempo = Tempo::new(TempoPlan {
            hover_min_ms: 10,
            hover_max_ms: 20,
            inter_action_min_ms: 300,
            inter_action_max_ms: 100,
            seed: Some(1),
            ..TempoPlan::default()
        });
        for _ in 0..100 {
            let hover = tempo.hover_delay().as_millis();
            assert!((10..=20).contains(&hover));
            let pause = tempo.inter_action_delay().as_millis();
            assert!((100..=300).contains(&pause));
        }
    }

    #[test]
    fn instant_plan_has_no_effect() {
        let tempo = Tempo::new(TempoPlan::instant());
        assert_eq!(tempo.jitter(Point::new(3.0, 4.0)), Point::new(3.0, 4.0));
        assert_eq!(tempo.hover_delay(), Duration::ZERO);
        assert_eq!(tempo.inter_action_delay(), Duration::ZERO);
    }
}
