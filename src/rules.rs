//! Advection rules.
//!
//! Each tick every particle lane walks the rules in [`PRIORITY`] order and
//! the first rule that matches decides the lane's next position. Later rules
//! are not evaluated. The same table drives both the CPU reference in
//! [`crate::particles`] and the generated compute shader, where every rule
//! becomes one early-return block.
//!
//! # Rule Order
//!
//! 1. **Reseed**: a dropped lane gets a fresh random position in the viewport
//! 2. **ZoomCull**: thin out lanes after zooming out
//! 3. **AgeCull**: drop lanes whose age phase matches the current tick
//! 4. **FreezeOutsideField**: hold lanes outside the field's bounds
//! 5. **CullOutsideViewport**: drop lanes that left the view
//! 6. **CullNoData**: drop lanes on texels without data
//! 7. **Advect**: move by the sampled velocity
//!
//! Field bounds are checked before viewport bounds. When the viewport lies
//! inside the field both checks are meaningful; when the field is smaller
//! than the viewport, particles that drift off the data keep their last
//! position until the field changes.

use std::cell::OnceCell;

use glam::Vec2;

use crate::bounds::{wrap_longitude, GeoBounds};
use crate::field::VelocityField;
use crate::particles::{is_dropped, AdvectParams, DROP_POSITION};
use crate::shader_utils::{random_point, smoothstep};

/// One entry of the advection decision table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AdvectRule {
    /// Reseed a dropped lane uniformly inside the viewport window.
    ///
    /// The latitude draw passes through a smoothstep, which thins out
    /// samples near the window's north and south edges. The point comes from
    /// `random_point(seed, index)`, so a fixed seed reproduces the same
    /// positions. A freshly reseeded lane does not advect this tick.
    Reseed,

    /// After zooming out, keep one lane in every `zoom_change_factor`.
    ZoomCull,

    /// Stagger respawns: drop a lane when `index % (max_age + 2)` equals
    /// `time % (max_age + 2)`.
    AgeCull,

    /// Leave lanes outside the field bounds where they are.
    FreezeOutsideField,

    /// Drop lanes outside the viewport window.
    CullOutsideViewport,

    /// Drop lanes whose nearest texel has no data.
    CullNoData,

    /// Move by the decoded velocity times the per-tick speed factor, with
    /// the north-south component scaled by `cos(latitude)`.
    Advect,
}

/// The decision table, evaluated top to bottom.
pub const PRIORITY: [AdvectRule; 7] = [
    AdvectRule::Reseed,
    AdvectRule::ZoomCull,
    AdvectRule::AgeCull,
    AdvectRule::FreezeOutsideField,
    AdvectRule::CullOutsideViewport,
    AdvectRule::CullNoData,
    AdvectRule::Advect,
];

/// What a matching rule does to a lane.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Step {
    /// Replace with a fresh position.
    Reseed(Vec2),
    /// Mark as dropped.
    Drop,
    /// Keep the current position.
    Freeze,
    /// Move to a new position.
    Move(Vec2),
}

impl Step {
    /// Position the lane holds after this step.
    pub fn apply(self, position: Vec2) -> Vec2 {
        match self {
            Step::Reseed(p) | Step::Move(p) => p,
            Step::Drop => DROP_POSITION,
            Step::Freeze => position,
        }
    }
}

/// Per-tick inputs shared by every lane.
#[derive(Clone, Copy, Debug)]
pub struct RuleContext<'a> {
    pub field: &'a VelocityField,
    pub viewport_bounds: GeoBounds,
    pub params: AdvectParams,
    pub max_age: u32,
    pub time: u32,
    pub seed: u32,
}

/// One lane under evaluation.
///
/// The nearest texel is fetched at most once per lane, however many rules
/// read it.
#[derive(Clone, Debug)]
pub struct Lane {
    pub index: u32,
    pub position: Vec2,
    texel: OnceCell<[f32; 4]>,
}

impl Lane {
    pub fn new(index: u32, position: Vec2) -> Self {
        Self {
            index,
            position,
            texel: OnceCell::new(),
        }
    }

    /// Raw field texel under the lane.
    pub fn texel(&self, field: &VelocityField) -> [f32; 4] {
        *self.texel.get_or_init(|| field.sample_raw(self.position))
    }

    /// Whether the texel has been fetched.
    pub fn is_sampled(&self) -> bool {
        self.texel.get().is_some()
    }
}

impl AdvectRule {
    /// Evaluate this rule for one lane. `None` means the rule does not match
    /// and the next rule should be tried.
    pub fn evaluate(&self, lane: &Lane, ctx: &RuleContext<'_>) -> Option<Step> {
        let (index, position) = (lane.index, lane.position);
        match self {
            AdvectRule::Reseed => {
                is_dropped(position).then(|| Step::Reseed(reseed(index, ctx)))
            }

            AdvectRule::ZoomCull => {
                let f = ctx.params.zoom_change_factor;
                (f > 1.0 && (index as f32) % f >= 1.0).then_some(Step::Drop)
            }

            AdvectRule::AgeCull => {
                let period = ctx.max_age + 2;
                (index % period == ctx.time % period).then_some(Step::Drop)
            }

            AdvectRule::FreezeOutsideField => {
                (!ctx.field.bounds().contains(position)).then_some(Step::Freeze)
            }

            AdvectRule::CullOutsideViewport => {
                (!ctx.viewport_bounds.contains(position)).then_some(Step::Drop)
            }

            AdvectRule::CullNoData => {
                (!ctx.field.has_values(lane.texel(ctx.field))).then_some(Step::Drop)
            }

            AdvectRule::Advect => {
                let velocity = ctx.field.decode(lane.texel(ctx.field));
                let distortion = position.y.to_radians().cos();
                let offset = Vec2::new(velocity.x, velocity.y * distortion) * ctx.params.speed_factor;
                let mut moved = position + offset;
                if ctx.params.wrap_longitude {
                    moved.x = wrap_longitude(moved.x, None);
                }
                Some(Step::Move(moved))
            }
        }
    }

    /// Generate the WGSL block for this rule.
    ///
    /// Blocks run inside the advection entry point, where `i` is the lane
    /// index and `position` its current `vec2<f32>`. A matching block calls
    /// `emit` and returns. Field reads go through `lane_texel`, which fetches
    /// the texel once per invocation.
    pub fn to_wgsl(&self) -> String {
        match self {
            AdvectRule::Reseed => r#"    // Reseed dropped lanes inside the viewport
    if is_dropped(position) {
        let vb = uniforms.viewport_bounds;
        let r = random_point(uniforms.seed, i);
        var seeded = vec2<f32>(
            clamp(mix(vb.x, vb.z, r.x), vb.x, vb.z),
            clamp(mix(vb.y, vb.w, smoothstep(0.0, 1.0, r.y)), vb.y, vb.w)
        );
        if uniforms.wrap != 0u {
            seeded.x = wrap_longitude(seeded.x);
        }
        emit(i, seeded);
        return;
    }"#
            .to_string(),

            AdvectRule::ZoomCull => r#"    // Thin out lanes after zooming out
    if uniforms.zoom_change_factor > 1.0 && f32(i) % uniforms.zoom_change_factor >= 1.0 {
        emit(i, DROP_POSITION);
        return;
    }"#
            .to_string(),

            AdvectRule::AgeCull => r#"    // Staggered respawn
    {
        let period = uniforms.max_age + 2u;
        if i % period == uniforms.time % period {
            emit(i, DROP_POSITION);
            return;
        }
    }"#
            .to_string(),

            AdvectRule::FreezeOutsideField => r#"    // Freeze outside field bounds
    if !is_in_bounds(position, uniforms.bounds) {
        emit(i, position);
        return;
    }"#
            .to_string(),

            AdvectRule::CullOutsideViewport => r#"    // Drop outside viewport bounds
    if !is_in_bounds(position, uniforms.viewport_bounds) {
        emit(i, DROP_POSITION);
        return;
    }"#
            .to_string(),

            AdvectRule::CullNoData => r#"    // Drop on texels without data
    if !raster_has_values(lane_texel(position), uniforms.unscale) {
        emit(i, DROP_POSITION);
        return;
    }"#
            .to_string(),

            AdvectRule::Advect => r#"    // Advect
    {
        let velocity = raster_get_values(lane_texel(position), uniforms.unscale);
        let distortion = cos(radians(position.y));
        let offset = vec2<f32>(velocity.x, velocity.y * distortion) * uniforms.speed_factor;
        var moved = position + offset;
        if uniforms.wrap != 0u {
            moved.x = wrap_longitude(moved.x);
        }
        emit(i, moved);
        return;
    }"#
            .to_string(),
        }
    }
}

/// Run the decision table for one lane.
pub fn decide(rules: &[AdvectRule], index: u32, position: Vec2, ctx: &RuleContext<'_>) -> Step {
    let lane = Lane::new(index, position);
    rules
        .iter()
        .find_map(|rule| rule.evaluate(&lane, ctx))
        .unwrap_or(Step::Freeze)
}

fn reseed(index: u32, ctx: &RuleContext<'_>) -> Vec2 {
    let vb = ctx.viewport_bounds;
    let r = random_point(ctx.seed, index);
    let lng = (vb.west * (1.0 - r.x) + vb.east * r.x).clamp(vb.west, vb.east);
    let t = smoothstep(r.y);
    let lat = (vb.south * (1.0 - t) + vb.north * t).clamp(vb.south, vb.north);
    if ctx.params.wrap_longitude {
        Vec2::new(wrap_longitude(lng, None), lat)
    } else {
        Vec2::new(lng, lat)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::generate_advect_shader;

    fn validate_wgsl(code: &str) -> Result<(), String> {
        let module = naga::front::wgsl::parse_str(code)
            .map_err(|e| format!("WGSL parse error: {:?}", e))?;

        let mut validator = naga::valid::Validator::new(
            naga::valid::ValidationFlags::all(),
            naga::valid::Capabilities::all(),
        );
        validator
            .validate(&module)
            .map_err(|e| format!("WGSL validation error: {:?}", e))?;

        Ok(())
    }

    fn eastward_field() -> VelocityField {
        VelocityField::from_texels(vec![[1.0, 0.5, 0.0, 1.0]], 1, 1, GeoBounds::WORLD, [-1.0, 1.0])
            .unwrap()
    }

    fn ctx(field: &VelocityField) -> RuleContext<'_> {
        RuleContext {
            field,
            viewport_bounds: GeoBounds::WORLD,
            params: AdvectParams {
                speed_factor: 1.0,
                zoom_change_factor: 1.0,
                wrap_longitude: true,
            },
            max_age: 10,
            time: 5,
            seed: 42,
        }
    }

    #[test]
    fn test_priority_order() {
        assert_eq!(PRIORITY[0], AdvectRule::Reseed);
        assert_eq!(PRIORITY[3], AdvectRule::FreezeOutsideField);
        assert_eq!(PRIORITY[4], AdvectRule::CullOutsideViewport);
        assert_eq!(PRIORITY[6], AdvectRule::Advect);
    }

    #[test]
    fn test_reseed_only_matches_dropped() {
        let field = eastward_field();
        let c = ctx(&field);
        assert!(AdvectRule::Reseed.evaluate(&Lane::new(0, Vec2::new(1.0, 1.0)), &c).is_none());
        assert!(matches!(
            AdvectRule::Reseed.evaluate(&Lane::new(0, DROP_POSITION), &c),
            Some(Step::Reseed(_))
        ));
    }

    #[test]
    fn test_reseed_is_reproducible() {
        let field = eastward_field();
        let c = ctx(&field);
        assert_eq!(reseed(7, &c), reseed(7, &c));
        assert_ne!(reseed(7, &c), reseed(8, &c));
    }

    #[test]
    fn test_zoom_cull_keeps_one_in_factor() {
        let field = eastward_field();
        let mut c = ctx(&field);
        c.params.zoom_change_factor = 4.0;
        let survivors = (0..16)
            .filter(|&i| AdvectRule::ZoomCull.evaluate(&Lane::new(i, Vec2::ONE), &c).is_none())
            .collect::<Vec<_>>();
        assert_eq!(survivors, vec![0, 4, 8, 12]);
    }

    #[test]
    fn test_zoom_cull_inactive_when_zooming_in() {
        let field = eastward_field();
        let mut c = ctx(&field);
        c.params.zoom_change_factor = 0.25;
        assert!((0..8).all(|i| AdvectRule::ZoomCull
            .evaluate(&Lane::new(i, Vec2::ONE), &c)
            .is_none()));
    }

    #[test]
    fn test_age_cull_matches_phase() {
        let field = eastward_field();
        let c = ctx(&field);
        // period = 12, time phase = 5
        assert_eq!(AdvectRule::AgeCull.evaluate(&Lane::new(5, Vec2::ONE), &c), Some(Step::Drop));
        assert_eq!(AdvectRule::AgeCull.evaluate(&Lane::new(17, Vec2::ONE), &c), Some(Step::Drop));
        assert_eq!(AdvectRule::AgeCull.evaluate(&Lane::new(6, Vec2::ONE), &c), None);
    }

    #[test]
    fn test_freeze_before_viewport_cull() {
        let field = VelocityField::from_texels(
            vec![[1.0, 0.5, 0.0, 1.0]],
            1,
            1,
            GeoBounds::new(0.0, 0.0, 10.0, 10.0),
            [-1.0, 1.0],
        )
        .unwrap();
        let mut c = ctx(&field);
        c.viewport_bounds = GeoBounds::new(0.0, 0.0, 5.0, 5.0);
        let outside_both = Vec2::new(20.0, 20.0);
        assert_eq!(decide(&PRIORITY[3..], 1, outside_both, &c), Step::Freeze);
        let inside_field_only = Vec2::new(8.0, 8.0);
        assert_eq!(decide(&PRIORITY[3..], 1, inside_field_only, &c), Step::Drop);
    }

    #[test]
    fn test_no_data_drops() {
        let field =
            VelocityField::from_texels(vec![[1.0, 0.5, 0.0, 0.0]], 1, 1, GeoBounds::WORLD, [-1.0, 1.0])
                .unwrap();
        let c = ctx(&field);
        assert_eq!(
            AdvectRule::CullNoData.evaluate(&Lane::new(1, Vec2::ONE), &c),
            Some(Step::Drop)
        );
    }

    #[test]
    fn test_advect_moves_east() {
        let field = eastward_field();
        let c = ctx(&field);
        let step = AdvectRule::Advect.evaluate(&Lane::new(1, Vec2::new(10.0, 0.0)), &c);
        assert_eq!(step, Some(Step::Move(Vec2::new(11.0, 0.0))));
    }

    #[test]
    fn test_advect_wraps_longitude() {
        let field = eastward_field();
        let c = ctx(&field);
        let step = AdvectRule::Advect.evaluate(&Lane::new(1, Vec2::new(179.5, 0.0)), &c);
        assert_eq!(step, Some(Step::Move(Vec2::new(-179.5, 0.0))));
    }

    #[test]
    fn test_advect_scales_meridional_component() {
        let field =
            VelocityField::from_texels(vec![[0.5, 1.0, 0.0, 1.0]], 1, 1, GeoBounds::WORLD, [-1.0, 1.0])
                .unwrap();
        let c = ctx(&field);
        let lane = Lane::new(1, Vec2::new(0.0, 60.0));
        let Some(Step::Move(p)) = AdvectRule::Advect.evaluate(&lane, &c) else {
            panic!("advect should move");
        };
        assert!((p.y - 60.5).abs() < 1e-4);
    }

    #[test]
    fn test_lane_texel_fetched_once() {
        let field = eastward_field();
        let c = ctx(&field);
        let lane = Lane::new(1, Vec2::new(10.0, 0.0));
        assert!(!lane.is_sampled());
        assert_eq!(AdvectRule::CullNoData.evaluate(&lane, &c), None);
        assert!(lane.is_sampled());
        assert_eq!(
            AdvectRule::Advect.evaluate(&lane, &c),
            Some(Step::Move(Vec2::new(11.0, 0.0)))
        );
    }

    #[test]
    fn test_early_rules_skip_field_fetch() {
        let field = eastward_field();
        let c = ctx(&field);
        let lane = Lane::new(5, Vec2::new(10.0, 0.0));
        // Lane 5 matches the age phase of tick 5.
        assert_eq!(AdvectRule::AgeCull.evaluate(&lane, &c), Some(Step::Drop));
        assert!(!lane.is_sampled());
    }

    #[test]
    fn test_step_apply() {
        let p = Vec2::new(3.0, 4.0);
        assert_eq!(Step::Freeze.apply(p), p);
        assert_eq!(Step::Drop.apply(p), DROP_POSITION);
        assert_eq!(Step::Move(Vec2::ONE).apply(p), Vec2::ONE);
    }

    #[test]
    fn test_each_rule_wgsl_validates() {
        for rule in PRIORITY {
            let wgsl = rule.to_wgsl();
            assert!(wgsl.contains("emit(i"), "{:?} should emit", rule);
            let shader = generate_advect_shader(&[rule]);
            validate_wgsl(&shader)
                .unwrap_or_else(|e| panic!("{:?} WGSL should be valid: {}", rule, e));
        }
    }

    #[test]
    fn test_full_table_wgsl_validates() {
        let shader = generate_advect_shader(&PRIORITY);
        validate_wgsl(&shader).expect("advection shader should be valid");
    }
}
