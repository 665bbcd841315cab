//! Spark particles spawned by interactions

use glam::{Vec2, Vec3};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use super::resources::{ResourceHandle, ResourceKind, ResourcePool};

/// Opacity of a freshly spawned spark
pub const SPARK_INITIAL_OPACITY: f32 = 0.9;
/// Maximum drift speed in world units per second
const SPARK_MAX_DRIFT: f32 = 0.6;

#[derive(Debug, Clone)]
pub struct Spark {
    pub position: Vec3,
    drift: Vec2,
    age: f32,
    lifetime: f32,
    handle: ResourceHandle,
}

impl Spark {
    /// Linear fade from the initial opacity to zero over the lifetime
    pub fn opacity(&self) -> f32 {
        SPARK_INITIAL_OPACITY * (1.0 - self.age / self.lifetime).max(0.0)
    }

    pub fn is_expired(&self) -> bool {
        self.age >= self.lifetime
    }
}

#[derive(Debug)]
pub struct ParticleSystem {
    sparks: Vec<Spark>,
    max_particles: usize,
    probability: f64,
    lifetime: f32,
    rng: SmallRng,
}

impl ParticleSystem {
    pub fn new(max_particles: usize, probability: f64, lifetime: f32, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_entropy(),
        };
        Self {
            sparks: Vec::new(),
            max_particles,
            probability,
            lifetime: lifetime.max(f32::EPSILON),
            rng,
        }
    }

    /// Roll for a spark at `origin`. Skipped silently when at capacity.
    pub fn try_spawn(&mut self, origin: Vec3, pool: &mut ResourcePool) -> bool {
        if self.rng.gen::<f64>() >= self.probability {
            return false;
        }
        if self.sparks.len() >= self.max_particles {
            return false;
        }

        let drift = Vec2::new(
            self.rng.gen_range(-SPARK_MAX_DRIFT..=SPARK_MAX_DRIFT),
            self.rng.gen_range(-SPARK_MAX_DRIFT..=SPARK_MAX_DRIFT),
        );
        self.sparks.push(Spark {
            position: origin + Vec3::Z * 0.1,
            drift,
            age: 0.0,
            lifetime: self.lifetime,
            handle: pool.allocate(ResourceKind::Spark),
        });
        true
    }

    /// Age and move every spark, removing expired ones. Returns how many expired.
    pub fn update(&mut self, dt: f32, pool: &mut ResourcePool) -> usize {
        for spark in &mut self.sparks {
            spark.age += dt;
            spark.position += (spark.drift * dt).extend(0.0);
        }

        let before = self.sparks.len();
        self.sparks.retain(|spark| {
            if spark.is_expired() {
                pool.release(spark.handle);
                false
            } else {
                true
            }
        });
        before - self.sparks.len()
    }

    pub fn sparks(&self) -> &[Spark] {
        &self.sparks
    }

    pub fn len(&self) -> usize {
        self.sparks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sparks.is_empty()
    }

    pub fn clear(&mut self, pool: &mut ResourcePool) {
        for spark in self.sparks.drain(..) {
            pool.release(spark.handle);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probability_one_always_spawns() {
        let mut pool = ResourcePool::new();
        let mut particles = ParticleSystem::new(10, 1.0, 1.0, Some(1));
        for _ in 0..5 {
            assert!(particles.try_spawn(Vec3::ZERO, &mut pool));
        }
        assert_eq!(particles.len(), 5);
    }

    #[test]
    fn test_probability_zero_never_spawns() {
        let mut pool = ResourcePool::new();
        let mut particles = ParticleSystem::new(10, 0.0, 1.0, Some(1));
        for _ in 0..100 {
            assert!(!particles.try_spawn(Vec3::ZERO, &mut pool));
        }
        assert_eq!(pool.live(), 0);
    }

    #[test]
    fn test_cap_skips_spawns() {
        let mut pool = ResourcePool::new();
        let mut particles = ParticleSystem::new(200, 1.0, 10.0, Some(2));
        for _ in 0..250 {
            particles.try_spawn(Vec3::ZERO, &mut pool);
        }
        assert_eq!(particles.len(), 200);
        assert_eq!(pool.live(), 200);
    }

    #[test]
    fn test_spawn_rate_near_probability() {
        let mut pool = ResourcePool::new();
        let mut particles = ParticleSystem::new(usize::MAX, 0.3, 1.0, Some(42));
        let spawned = (0..10_000)
            .filter(|_| particles.try_spawn(Vec3::ZERO, &mut pool))
            .count();
        assert!((2700..3300).contains(&spawned), "spawned {}", spawned);
    }

    #[test]
    fn test_linear_fade_and_release() {
        let mut pool = ResourcePool::new();
        let mut particles = ParticleSystem::new(10, 1.0, 1.0, Some(3));
        particles.try_spawn(Vec3::ZERO, &mut pool);

        assert_eq!(particles.update(0.5, &mut pool), 0);
        let opacity = particles.sparks()[0].opacity();
        assert!((opacity - SPARK_INITIAL_OPACITY * 0.5).abs() < 1e-5);

        assert_eq!(particles.update(0.6, &mut pool), 1);
        assert!(particles.is_empty());
        assert_eq!(pool.live(), 0);
    }
}
