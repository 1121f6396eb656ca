//! Particle state and the host-side advection reference.
//!
//! State is `num_particles * max_age` slots of `(lng, lat, 0)`. Slot `i`
//! belongs to lane `i % num_particles` and generation `i / num_particles`.
//! Generation 0 is the newest position, the others are trail points copied
//! forward one generation per tick.
//!
//! [`advect`] and [`shift_trails`] are pure functions over [`ParticleState`];
//! [`CpuParticles`] strings them together with the same double-buffer swap
//! the GPU pipeline performs, so tests can drive whole ticks without a
//! device.

use glam::{Vec2, Vec3};

use crate::bounds::GeoBounds;
use crate::field::VelocityField;
use crate::rules::{decide, RuleContext, PRIORITY};
use crate::viewport::{tick_speed_factor, zoom_change_factor, Viewport};

/// Reserved position meaning "no particle in this slot".
pub const DROP_POSITION: Vec2 = Vec2::ZERO;

/// Whether a position is the dropped sentinel. Only `xy` takes part.
#[inline]
pub fn is_dropped(position: Vec2) -> bool {
    position == DROP_POSITION
}

/// Per-tick advection scalars.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AdvectParams {
    /// Degrees moved per unit of velocity this tick.
    pub speed_factor: f32,
    /// Lane thinning factor, see [`zoom_change_factor`].
    pub zoom_change_factor: f32,
    /// Wrap longitudes after advecting and reseeding.
    pub wrap_longitude: bool,
}

impl AdvectParams {
    /// Derive the per-tick parameters from the configured speed factor and
    /// the current and previous zoom levels.
    pub fn for_zoom(
        speed_factor: f32,
        zoom: f32,
        previous_zoom: Option<f32>,
        wrap_longitude: bool,
    ) -> Self {
        Self {
            speed_factor: tick_speed_factor(speed_factor, zoom),
            zoom_change_factor: zoom_change_factor(previous_zoom, zoom),
            wrap_longitude,
        }
    }
}

impl Default for AdvectParams {
    fn default() -> Self {
        Self {
            speed_factor: 1.0,
            zoom_change_factor: 1.0,
            wrap_longitude: true,
        }
    }
}

/// Positions for every slot of every generation.
#[derive(Clone, Debug, PartialEq)]
pub struct ParticleState {
    num_particles: u32,
    max_age: u32,
    positions: Vec<Vec3>,
}

impl ParticleState {
    /// All slots start dropped.
    pub fn new(num_particles: u32, max_age: u32) -> Self {
        Self {
            num_particles,
            max_age,
            positions: vec![Vec3::ZERO; num_particles as usize * max_age as usize],
        }
    }

    #[inline]
    pub fn num_particles(&self) -> u32 {
        self.num_particles
    }

    #[inline]
    pub fn max_age(&self) -> u32 {
        self.max_age
    }

    /// Total slot count, `num_particles * max_age`.
    #[inline]
    pub fn num_instances(&self) -> usize {
        self.positions.len()
    }

    pub fn positions(&self) -> &[Vec3] {
        &self.positions
    }

    pub fn positions_mut(&mut self) -> &mut [Vec3] {
        &mut self.positions
    }

    /// Slots of one generation, or an empty slice past `max_age`.
    pub fn generation(&self, generation: u32) -> &[Vec3] {
        if generation >= self.max_age {
            return &[];
        }
        let n = self.num_particles as usize;
        let start = generation as usize * n;
        &self.positions[start..start + n]
    }

    /// Position of `lane` in `generation`.
    pub fn get(&self, generation: u32, lane: u32) -> Option<Vec3> {
        self.generation(generation).get(lane as usize).copied()
    }

    /// Set a slot. Out-of-range slots are ignored.
    pub fn set(&mut self, generation: u32, lane: u32, position: Vec3) {
        if generation < self.max_age && lane < self.num_particles {
            let index = generation as usize * self.num_particles as usize + lane as usize;
            self.positions[index] = position;
        }
    }

    /// Number of generation-0 lanes that currently hold a particle.
    pub fn live_count(&self) -> usize {
        self.generation(0)
            .iter()
            .filter(|p| !is_dropped(p.truncate()))
            .count()
    }

    /// Drop every slot.
    pub fn clear(&mut self) {
        self.positions.fill(Vec3::ZERO);
    }

    /// Raw float view, three floats per slot, as uploaded to the GPU.
    pub fn as_floats(&self) -> &[f32] {
        bytemuck::cast_slice(&self.positions)
    }
}

/// Advance generation 0 of `state` by one tick.
///
/// Every lane runs the decision table in [`PRIORITY`] order. Generations
/// 1 and above are copied unchanged; moving them is the job of
/// [`shift_trails`].
pub fn advect(
    state: &ParticleState,
    field: &VelocityField,
    viewport_bounds: GeoBounds,
    params: &AdvectParams,
    time: u32,
    seed: u32,
) -> ParticleState {
    let ctx = RuleContext {
        field,
        viewport_bounds,
        params: *params,
        max_age: state.max_age,
        time,
        seed,
    };
    let mut next = state.clone();
    let lanes = next.generation(0).len();
    for (lane, slot) in next.positions[..lanes]
        .iter_mut()
        .enumerate()
    {
        let position = slot.truncate();
        let step = decide(&PRIORITY, lane as u32, position, &ctx);
        *slot = step.apply(position).extend(0.0);
    }
    next
}

/// Copy generations `0..max_age - 1` of `source` into generations
/// `1..max_age` of `target`.
///
/// Generation 0 of `target` is left alone. With `max_age == 1` there is no
/// trail and nothing is copied.
pub fn shift_trails(source: &ParticleState, target: &mut ParticleState) {
    let n = source.num_particles as usize;
    let count = n * source.max_age.saturating_sub(1) as usize;
    if count == 0 || target.positions.len() < n + count {
        return;
    }
    target.positions[n..n + count].copy_from_slice(&source.positions[..count]);
}

/// Trail fade per generation: `1 - g / max_age`.
pub fn generation_alphas(max_age: u32) -> Vec<f32> {
    (0..max_age)
        .map(|g| 1.0 - g as f32 / max_age as f32)
        .collect()
}

/// Per-slot colors: white, faded by generation.
pub fn instance_colors(num_particles: u32, max_age: u32) -> Vec<[f32; 4]> {
    generation_alphas(max_age)
        .into_iter()
        .flat_map(|alpha| std::iter::repeat([1.0, 1.0, 1.0, alpha]).take(num_particles as usize))
        .collect()
}

/// Host-memory particle runner with the GPU pipeline's buffer discipline.
///
/// Two states are kept; a single flag says which one is the current source.
/// Each tick advects source into target, shifts trails, then flips the flag.
#[derive(Clone, Debug)]
pub struct CpuParticles {
    buffers: [ParticleState; 2],
    source: usize,
    previous_zoom: Option<f32>,
    speed_factor: f32,
    wrap_longitude: bool,
}

impl CpuParticles {
    pub fn new(num_particles: u32, max_age: u32, speed_factor: f32, wrap_longitude: bool) -> Self {
        Self {
            buffers: [
                ParticleState::new(num_particles, max_age),
                ParticleState::new(num_particles, max_age),
            ],
            source: 0,
            previous_zoom: None,
            speed_factor,
            wrap_longitude,
        }
    }

    /// State written by the most recent tick (or the initial state).
    pub fn current(&self) -> &ParticleState {
        &self.buffers[self.source]
    }

    /// State the most recent tick read from.
    pub fn previous(&self) -> &ParticleState {
        &self.buffers[1 - self.source]
    }

    /// Index of the buffer the next tick reads from.
    pub fn source_index(&self) -> usize {
        self.source
    }

    /// Replace the current state, e.g. to place particles in tests.
    pub fn current_mut(&mut self) -> &mut ParticleState {
        &mut self.buffers[self.source]
    }

    /// One advect, shift, swap sequence.
    pub fn tick(&mut self, field: &VelocityField, viewport: &Viewport, time: u32, seed: u32) {
        let params = AdvectParams::for_zoom(
            self.speed_factor,
            viewport.zoom,
            self.previous_zoom,
            self.wrap_longitude,
        );
        self.previous_zoom = Some(viewport.zoom);
        self.tick_with(field, viewport.wrapped_bounds(), &params, time, seed);
    }

    /// Like [`tick`](Self::tick) with explicit bounds and parameters.
    pub fn tick_with(
        &mut self,
        field: &VelocityField,
        viewport_bounds: GeoBounds,
        params: &AdvectParams,
        time: u32,
        seed: u32,
    ) {
        let target = 1 - self.source;
        let advected = advect(
            &self.buffers[self.source],
            field,
            viewport_bounds,
            params,
            time,
            seed,
        );
        let n = advected.generation(0).len();
        self.buffers[target].positions[..n].copy_from_slice(&advected.positions[..n]);

        let (a, b) = self.buffers.split_at_mut(1);
        let (source, target_state) = if self.source == 0 {
            (&a[0], &mut b[0])
        } else {
            (&b[0], &mut a[0])
        };
        shift_trails(source, target_state);
        self.source = target;
    }

    /// Drop every particle in both buffers.
    pub fn reset(&mut self) {
        for buffer in &mut self.buffers {
            buffer.clear();
        }
        self.previous_zoom = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field() -> VelocityField {
        VelocityField::from_texels(vec![[1.0, 0.5, 0.0, 1.0]], 1, 1, GeoBounds::WORLD, [-1.0, 1.0])
            .unwrap()
    }

    #[test]
    fn test_new_state_is_dropped() {
        let state = ParticleState::new(4, 3);
        assert_eq!(state.num_instances(), 12);
        assert!(state.positions().iter().all(|p| is_dropped(p.truncate())));
        assert_eq!(state.live_count(), 0);
    }

    #[test]
    fn test_generation_slices() {
        let mut state = ParticleState::new(2, 3);
        state.set(1, 1, Vec3::new(5.0, 6.0, 0.0));
        assert_eq!(state.positions()[3], Vec3::new(5.0, 6.0, 0.0));
        assert_eq!(state.get(1, 1), Some(Vec3::new(5.0, 6.0, 0.0)));
        assert!(state.generation(3).is_empty());
        assert_eq!(state.get(0, 2), None);
    }

    #[test]
    fn test_advect_only_touches_generation_zero() {
        let mut state = ParticleState::new(2, 3);
        state.set(0, 1, Vec3::new(10.0, 0.0, 0.0));
        state.set(2, 0, Vec3::new(-5.0, 5.0, 0.0));
        let params = AdvectParams::default();
        // time phase avoids age culling for lane 1 (period 5)
        let next = advect(&state, &field(), GeoBounds::WORLD, &params, 3, 9);
        assert_eq!(next.get(0, 1), Some(Vec3::new(11.0, 0.0, 0.0)));
        assert_eq!(next.generation(1), state.generation(1));
        assert_eq!(next.generation(2), state.generation(2));
    }

    #[test]
    fn test_advect_reseeds_dropped_lanes() {
        let state = ParticleState::new(8, 2);
        let next = advect(&state, &field(), GeoBounds::WORLD, &AdvectParams::default(), 0, 77);
        assert_eq!(next.live_count(), 8);
    }

    #[test]
    fn test_advect_is_deterministic() {
        let state = ParticleState::new(32, 2);
        let params = AdvectParams::default();
        let a = advect(&state, &field(), GeoBounds::WORLD, &params, 1, 5);
        let b = advect(&state, &field(), GeoBounds::WORLD, &params, 1, 5);
        assert_eq!(a, b);
    }

    #[test]
    fn test_shift_trails_moves_generations() {
        let mut source = ParticleState::new(2, 3);
        for (i, p) in source.positions_mut().iter_mut().enumerate() {
            *p = Vec3::new(i as f32 + 1.0, 0.0, 0.0);
        }
        let mut target = ParticleState::new(2, 3);
        target.set(0, 0, Vec3::splat(9.0));
        shift_trails(&source, &mut target);
        assert_eq!(target.get(0, 0), Some(Vec3::splat(9.0)));
        for g in 1..3 {
            assert_eq!(target.generation(g), source.generation(g - 1));
        }
    }

    #[test]
    fn test_shift_trails_single_generation_is_noop() {
        let source = ParticleState::new(3, 1);
        let mut target = ParticleState::new(3, 1);
        target.set(0, 0, Vec3::ONE);
        shift_trails(&source, &mut target);
        assert_eq!(target.get(0, 0), Some(Vec3::ONE));
    }

    #[test]
    fn test_generation_alphas() {
        assert_eq!(generation_alphas(4), vec![1.0, 0.75, 0.5, 0.25]);
        assert!(generation_alphas(0).is_empty());
    }

    #[test]
    fn test_instance_colors_follow_generation() {
        let colors = instance_colors(2, 2);
        assert_eq!(colors.len(), 4);
        assert_eq!(colors[1], [1.0, 1.0, 1.0, 1.0]);
        assert_eq!(colors[2], [1.0, 1.0, 1.0, 0.5]);
    }

    #[test]
    fn test_cpu_particles_swap_flag() {
        let mut particles = CpuParticles::new(4, 3, 1.0, true);
        let viewport = Viewport::default();
        assert_eq!(particles.source_index(), 0);
        particles.tick(&field(), &viewport, 1, 1);
        assert_eq!(particles.source_index(), 1);
        particles.tick(&field(), &viewport, 2, 2);
        assert_eq!(particles.source_index(), 0);
    }

    #[test]
    fn test_cpu_particles_trail_follows_head() {
        let mut particles = CpuParticles::new(1, 3, 1.0, true);
        particles.current_mut().set(0, 0, Vec3::new(10.0, 0.0, 0.0));
        let params = AdvectParams::default();
        particles.tick_with(&field(), GeoBounds::WORLD, &params, 1, 0);
        assert_eq!(particles.current().get(0, 0), Some(Vec3::new(11.0, 0.0, 0.0)));
        assert_eq!(particles.current().get(1, 0), Some(Vec3::new(10.0, 0.0, 0.0)));
        particles.tick_with(&field(), GeoBounds::WORLD, &params, 2, 0);
        assert_eq!(particles.current().get(0, 0), Some(Vec3::new(12.0, 0.0, 0.0)));
        assert_eq!(particles.current().get(1, 0), Some(Vec3::new(11.0, 0.0, 0.0)));
        assert_eq!(particles.current().get(2, 0), Some(Vec3::new(10.0, 0.0, 0.0)));
    }

    #[test]
    fn test_cpu_particles_reset() {
        let mut particles = CpuParticles::new(4, 2, 1.0, true);
        particles.tick(&field(), &Viewport::default(), 1, 3);
        assert!(particles.current().live_count() > 0);
        particles.reset();
        assert_eq!(particles.current().live_count(), 0);
        assert_eq!(particles.previous().live_count(), 0);
    }
}
