//! End-to-end ticks of the host-side particle runner.

use glam::{Vec2, Vec3};
use windflow::bounds::{wrap_bounds, GeoBounds};
use windflow::field::VelocityField;
use windflow::particles::{advect, is_dropped, shift_trails, AdvectParams, CpuParticles, ParticleState};
use windflow::ramp::{ColorRamp, ColorStop};
use windflow::viewport::Viewport;

/// (u, v) = (1, 0) everywhere: R at the top of [-1, 1], G in the middle.
fn eastward_field() -> VelocityField {
    VelocityField::from_texels(vec![[1.0, 0.5, 0.0, 1.0]], 1, 1, GeoBounds::WORLD, [-1.0, 1.0])
        .unwrap()
}

fn params() -> AdvectParams {
    AdvectParams {
        speed_factor: 0.5,
        zoom_change_factor: 1.0,
        wrap_longitude: true,
    }
}

#[test]
fn test_single_particle_moves_east_and_leaves_trail() {
    let field = eastward_field();
    let mut particles = CpuParticles::new(1, 2, 1.0, true);
    let start = Vec3::new(10.0, 20.0, 0.0);
    particles.current_mut().set(0, 0, start);

    // Period is max_age + 2 = 4; lane 0 is age-culled only when time % 4 == 0.
    particles.tick_with(&field, GeoBounds::WORLD, &params(), 1, 7);

    let head = particles.current().get(0, 0).unwrap();
    assert!(head.x > start.x);
    assert_eq!(head.y, start.y);
    assert_eq!(particles.current().get(1, 0), Some(start));
}

#[test]
fn test_generation_shift_copies_every_lane() {
    let mut source = ParticleState::new(5, 4);
    for (i, p) in source.positions_mut().iter_mut().enumerate() {
        *p = Vec3::new(i as f32 + 1.0, -(i as f32), 0.0);
    }
    let mut target = advect(&source, &eastward_field(), GeoBounds::WORLD, &params(), 3, 1);
    let head = target.generation(0).to_vec();
    shift_trails(&source, &mut target);

    assert_eq!(target.generation(0), head.as_slice());
    for g in 1..4 {
        for lane in 0..5 {
            assert_eq!(target.get(g, lane), source.get(g - 1, lane));
        }
    }
}

#[test]
fn test_dropped_lane_reseeds_inside_viewport() {
    // A window straddling the antimeridian.
    let viewport = wrap_bounds(GeoBounds::new(170.0, -10.0, 200.0, 10.0));
    let state = ParticleState::new(64, 3);
    let next = advect(&state, &eastward_field(), viewport, &params(), 1, 1234);

    for position in next.generation(0) {
        let p = position.truncate();
        assert!(!is_dropped(p));
        assert!(viewport.contains(p), "{p:?} outside {viewport:?}");
        assert!((-180.0..180.0).contains(&p.x));
    }
}

#[test]
fn test_reseed_ignores_field_data() {
    // A field without any data still reseeds dropped lanes.
    let empty = VelocityField::from_fn(2, 2, GeoBounds::WORLD, |_| None).unwrap();
    let state = ParticleState::new(16, 2);
    let next = advect(&state, &empty, GeoBounds::WORLD, &params(), 1, 99);
    assert_eq!(next.live_count(), 16);

    // The following tick finds no data and drops them again.
    let after = advect(&next, &empty, GeoBounds::WORLD, &params(), 1, 99);
    assert_eq!(after.live_count(), 0);
}

#[test]
fn test_zoom_out_keeps_one_lane_in_four() {
    let mut state = ParticleState::new(16, 10);
    for lane in 0..16 {
        state.set(0, lane, Vec3::new(lane as f32 + 1.0, 5.0, 0.0));
    }
    let zoomed = AdvectParams {
        zoom_change_factor: 4.0,
        ..params()
    };
    // Period 12; time 11 only age-culls lane 11, which zoom culling takes first.
    let next = advect(&state, &eastward_field(), GeoBounds::WORLD, &zoomed, 11, 0);

    for lane in 0..16 {
        let dropped = is_dropped(next.get(0, lane).unwrap().truncate());
        assert_eq!(dropped, lane % 4 != 0, "lane {lane}");
    }
}

#[test]
fn test_particle_outside_field_is_frozen() {
    let field = VelocityField::from_texels(
        vec![[1.0, 0.5, 0.0, 1.0]],
        1,
        1,
        GeoBounds::new(-20.0, -20.0, 20.0, 20.0),
        [-1.0, 1.0],
    )
    .unwrap();
    let mut particles = CpuParticles::new(3, 5, 1.0, true);
    let outside = Vec3::new(100.0, 40.0, 0.0);
    particles.current_mut().set(0, 0, outside);

    // Period 7: lane 0 is never age-culled for these ticks.
    for time in 1..4 {
        particles.tick_with(&field, GeoBounds::WORLD, &params(), time, time);
        assert_eq!(particles.current().get(0, 0), Some(outside));
    }
}

#[test]
fn test_untouched_slots_stay_dropped() {
    let mut particles = CpuParticles::new(8, 6, 1.0, true);
    let viewport = Viewport::new(Vec2::new(0.0, 0.0), 2.0, 800, 600);
    particles.tick(&eastward_field(), &viewport, 1, 3);

    // One tick fills generation 0 and shifts the empty old head into
    // generation 1; older generations were never written.
    let state = particles.current();
    for g in 1..6 {
        assert!(state
            .generation(g)
            .iter()
            .all(|p| is_dropped(p.truncate())));
    }
    assert_eq!(state.as_floats().len(), 8 * 6 * 3);
}

#[test]
fn test_gray_ramp_midpoint() {
    let ramp = ColorRamp::new(vec![
        ColorStop::new(0.0, [0, 0, 0, 255]),
        ColorStop::new(1.0, [255, 255, 255, 255]),
    ]);
    assert_eq!(ramp.color_at(0.5), [128, 128, 128, 255]);
}

#[test]
fn test_ramp_samples_stops_exactly() {
    let ramp = ColorRamp::wind();
    for stop in ramp.stops() {
        assert_eq!(ramp.color_at(stop.position), stop.color);
    }
}
