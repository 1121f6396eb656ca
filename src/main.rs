mod window;

use std::path::{Path, PathBuf};

use windflow::{ConfigError, DemoConfig, FieldError, GeoBounds, SimulationError, Vec2, VelocityField};
use winit::event_loop::{ControlFlow, EventLoop};

/// Two counter-rotating vortices over a steady westerly, on a one-degree grid.
fn vortex_field() -> Result<VelocityField, FieldError> {
    let vortex = |p: Vec2, center: Vec2, strength: f32| {
        let d = p - center;
        let falloff = (-d.length_squared() / 800.0).exp();
        Vec2::new(-d.y, d.x) * strength * falloff
    };
    VelocityField::from_fn(360, 170, GeoBounds::new(-180.0, -85.0, 180.0, 85.0), |p| {
        let westerly = Vec2::new(8.0 * (p.y.to_radians() * 2.0).cos().abs(), 0.0);
        Some(
            westerly
                + vortex(p, Vec2::new(-40.0, 35.0), 0.6)
                + vortex(p, Vec2::new(60.0, -30.0), -0.6),
        )
    })
}

fn run() -> Result<(), SimulationError> {
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let demo = match &config_path {
        Some(path) => {
            log::info!("loading config from {}", path.display());
            DemoConfig::load(path)?
        }
        None => DemoConfig::default(),
    };

    let base_dir = config_path
        .as_deref()
        .and_then(Path::parent)
        .unwrap_or_else(|| Path::new("."));
    let field = match demo.field.build(base_dir)? {
        Some(field) => field,
        None => {
            log::info!("no field configured, using synthetic vortex field");
            vortex_field().map_err(ConfigError::from)?
        }
    };

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = window::App::new(demo, field);
    event_loop.run_app(&mut app)?;
    match app.error.take() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(err) = run() {
        log::error!("{err}");
        std::process::exit(1);
    }
}
