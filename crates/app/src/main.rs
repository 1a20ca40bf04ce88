//! Entry point for Gyro3D.
//! Logging, CLI flags, then either the windowed loop or a headless run.

use std::path::PathBuf;

use anyhow::Result;
use corelib::config::EngineConfig;
use platform::Scene;
use renderer::HeadlessDevice;

fn parse_backend_arg(args: &[String]) -> wgpu::Backends {
    // Accept: --gpu-backend=auto|vulkan|dx12|metal|gl
    let mut backends = wgpu::Backends::all();
    for arg in args {
        if let Some(val) = arg.strip_prefix("--gpu-backend=") {
            backends = match val.to_ascii_lowercase().as_str() {
                "auto" => wgpu::Backends::all(),
                "vulkan" | "vk" => wgpu::Backends::VULKAN,
                "dx12" | "d3d12" => wgpu::Backends::DX12,
                "metal" | "mtl" => wgpu::Backends::METAL,
                "gl" | "opengl" | "gles" => wgpu::Backends::GL,
                other => {
                    log::warn!("Unknown backend '{}', falling back to auto.", other);
                    wgpu::Backends::all()
                }
            };
        }
    }
    backends
}

fn parse_size_args(args: &[String], config: &mut EngineConfig) {
    for arg in args {
        if let Some(v) = arg.strip_prefix("--size=") {
            if let Some((sw, sh)) = v.split_once('x').or_else(|| v.split_once('X')) {
                if let (Ok(pw), Ok(ph)) = (sw.parse::<u32>(), sh.parse::<u32>()) {
                    config.window_width = pw;
                    config.window_height = ph;
                }
            }
        } else if let Some(v) = arg.strip_prefix("--width=") {
            if let Ok(pw) = v.parse::<u32>() {
                config.window_width = pw;
            }
        } else if let Some(v) = arg.strip_prefix("--height=") {
            if let Ok(ph) = v.parse::<u32>() {
                config.window_height = ph;
            }
        }
    }
    config.window_width = config.window_width.max(1);
    config.window_height = config.window_height.max(1);
}

fn parse_asset_args(args: &[String], config: &mut EngineConfig) {
    for arg in args {
        if let Some(v) = arg.strip_prefix("--obj=") {
            config.obj_path = PathBuf::from(v);
        } else if let Some(v) = arg.strip_prefix("--mtl=") {
            config.mtl_path = PathBuf::from(v);
        } else if let Some(v) = arg.strip_prefix("--images-dir=") {
            config.images_dir = PathBuf::from(v);
        } else if let Some(v) = arg.strip_prefix("--spin=") {
            match v.parse::<f32>() {
                Ok(deg) => config.spin_degrees_per_sec = [deg * 0.5, deg, 0.0],
                Err(_) => log::warn!("Ignoring bad --spin value '{}'", v),
            }
        } else if arg == "--axes" {
            config.show_axes = true;
        }
    }
}

/// `Some(frames)` when `--headless` is given; `--frames=N` defaults to 1.
fn parse_headless_args(args: &[String]) -> Option<u32> {
    if !args.iter().any(|a| a == "--headless") {
        return None;
    }
    let frames = args
        .iter()
        .filter_map(|a| a.strip_prefix("--frames="))
        .filter_map(|v| v.parse::<u32>().ok())
        .last()
        .unwrap_or(1);
    Some(frames)
}

fn parse_config(args: &[String]) -> EngineConfig {
    let mut config = EngineConfig::default();
    parse_size_args(args, &mut config);
    parse_asset_args(args, &mut config);
    config
}

/// Load and draw the configured model on the CPU-only device.
fn run_headless(config: &EngineConfig, frames: u32) -> Result<()> {
    let mut device = HeadlessDevice::new();
    let mut scene = Scene::new(config);
    let entity = scene.load_model(&mut device, &config.obj_path, &config.mtl_path);
    if config.show_axes {
        scene.add_axes(&mut device);
    }

    let dt = 1.0 / 60.0;
    let mut draws = 0;
    for _ in 0..frames {
        scene.update(dt);
        scene.draw(&mut device);
        draws += device.take_draw_calls().len();
    }

    if let Some(renderer) = entity.and_then(|e| scene.renders.renderable(e)) {
        let renderer = renderer.borrow();
        let faces: usize = renderer.parts().iter().map(|p| p.faces.len()).sum();
        log::info!(
            "Model: {} part(s), {} face(s), {} material(s)",
            renderer.parts().len(),
            faces,
            renderer.materials().len()
        );
    }
    log::info!(
        "Headless: {} frame(s), {} draw call(s), {} buffer(s), {} texture(s) live",
        frames,
        draws,
        device.live_buffers(),
        device.live_textures()
    );

    scene.shutdown(&mut device);
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let config = parse_config(&args);

    if let Some(frames) = parse_headless_args(&args) {
        log::info!("Starting Gyro3D headless, {} frame(s)", frames);
        return run_headless(&config, frames);
    }

    let chosen = parse_backend_arg(&args);
    log::info!(
        "Starting Gyro3D. Backend: {:?}, window_size={}x{}, model={}",
        chosen,
        config.window_width,
        config.window_height,
        config.obj_path.display()
    );

    platform::run_with_renderer(config, chosen)?;

    log::info!("Graceful shutdown. Bye!");
    Ok(())
}
