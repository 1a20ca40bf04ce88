//! What a frame operates on: entities, the camera and the loaded models.

use std::path::Path;

use corelib::camera::Camera;
use corelib::config::EngineConfig;
use corelib::ecs::{Entity, World};
use corelib::transform::Transform;
use corelib::Vec3;
use renderer::{DebugLine, GpuDevice, RenderSettings, RenderSystem};

pub struct Scene {
    pub world: World,
    pub camera: Camera,
    pub renders: RenderSystem,
    debug_lines: Vec<DebugLine>,
    settings: RenderSettings,
    spin_degrees_per_sec: [f32; 3],
}

impl Scene {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            world: World::new(),
            camera: Camera::default(),
            renders: RenderSystem::new(config),
            debug_lines: Vec::new(),
            settings: RenderSettings::from_config(config),
            spin_degrees_per_sec: config.spin_degrees_per_sec,
        }
    }

    /// Spawn an entity and load a model onto it. A failed load is logged and
    /// leaves the scene as it was.
    pub fn load_model(
        &mut self,
        device: &mut dyn GpuDevice,
        obj_path: &Path,
        mtl_path: &Path,
    ) -> Option<Entity> {
        let entity = self.world.spawn(Transform::identity());
        match self
            .renders
            .add_new_renderable(device, entity, obj_path, mtl_path)
        {
            Ok(()) => Some(entity),
            Err(e) => {
                log::warn!("Continuing without {}: {}", obj_path.display(), e);
                self.world.remove_transform(entity);
                None
            }
        }
    }

    /// Add red, green and blue unit lines along X, Y and Z from the origin.
    /// Returns how many were created; a failed line is logged and skipped.
    pub fn add_axes(&mut self, device: &mut dyn GpuDevice) -> usize {
        let mut added = 0;
        for axis in [Vec3::X, Vec3::Y, Vec3::Z] {
            match DebugLine::new(device, Vec3::ZERO, axis) {
                Ok(line) => {
                    self.debug_lines.push(line.with_color(axis));
                    added += 1;
                }
                Err(e) => log::error!("Axis line {} not created: {}", axis, e),
            }
        }
        added
    }

    pub fn debug_lines(&self) -> &[DebugLine] {
        &self.debug_lines
    }

    /// Advance the demo spin.
    pub fn update(&mut self, dt: f32) {
        self.world.system_rotate_all(dt, self.spin_degrees_per_sec);
    }

    /// Issue the draws of every renderable, then the debug lines; returns
    /// how many renderables drew.
    pub fn draw(&mut self, device: &mut dyn GpuDevice) -> usize {
        let drawn = self.renders.render_all(device, &self.world, &self.camera);
        for line in &mut self.debug_lines {
            if let Err(e) = line.render(device, &self.camera, &self.settings) {
                log::error!("Debug line draw failed: {}", e);
            }
        }
        drawn
    }

    /// Release every GPU resource. Call before the device goes away.
    pub fn shutdown(&mut self, device: &mut dyn GpuDevice) {
        log::info!("Releasing {} renderable(s)", self.renders.len());
        for mut line in self.debug_lines.drain(..) {
            if let Err(e) = line.release(device) {
                log::error!("Debug line release failed: {}", e);
            }
        }
        let kept = self.renders.clear(device);
        if kept > 0 {
            log::warn!("{} renderable(s) still borrowed at shutdown", kept);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use renderer::HeadlessDevice;
    use std::fs;

    fn config() -> EngineConfig {
        EngineConfig {
            spin_degrees_per_sec: [0.0, 90.0, 0.0],
            ..EngineConfig::default()
        }
    }

    #[test]
    fn failed_load_leaves_no_entity_behind() {
        let mut device = HeadlessDevice::new();
        let mut scene = Scene::new(&config());

        let loaded = scene.load_model(
            &mut device,
            Path::new("no/such/model.obj"),
            Path::new("no/such/model.mtl"),
        );

        assert_eq!(loaded, None);
        assert!(scene.world.is_empty());
        assert!(scene.renders.is_empty());
        assert_eq!(scene.draw(&mut device), 0);
    }

    #[test]
    fn axes_draw_as_lines_after_models_and_release_at_shutdown() {
        let mut device = HeadlessDevice::new();
        let mut scene = Scene::new(&config());

        assert_eq!(scene.add_axes(&mut device), 3);
        let colors: Vec<corelib::Vec3> = scene.debug_lines().iter().map(|l| l.color()).collect();
        assert_eq!(
            colors,
            vec![corelib::Vec3::X, corelib::Vec3::Y, corelib::Vec3::Z]
        );

        assert_eq!(scene.draw(&mut device), 0);
        let calls = device.take_draw_calls();
        assert_eq!(calls.len(), 3);
        assert!(calls.iter().all(|c| c.primitive == renderer::Primitive::Lines));

        scene.shutdown(&mut device);
        assert!(scene.debug_lines().is_empty());
        assert_eq!(device.live_buffers(), 0);
        assert_eq!(device.live_programs(), 0);
    }

    #[test]
    fn loaded_model_spins_and_draws() {
        let dir = std::env::temp_dir();
        let obj = dir.join(format!("gyro3d-scene-{}.obj", std::process::id()));
        fs::write(&obj, "v 0 0 0\nv 1 0 0\nv 0 1 0\nvt 0 0\nvn 0 0 1\nf 1/1/1 2/1/1 3/1/1\n")
            .unwrap();

        let mut device = HeadlessDevice::new();
        let mut scene = Scene::new(&config());
        let entity = scene.load_model(&mut device, &obj, &dir.join("gyro3d-missing.mtl"));
        let _ = fs::remove_file(&obj);
        let entity = entity.expect("model loads without an MTL");

        scene.update(0.5);
        let rotation = scene.world.transform(entity).map(|t| t.rotation);
        assert_eq!(rotation, Some(corelib::Vec3::new(0.0, 45.0, 0.0)));
        assert_eq!(scene.draw(&mut device), 1);

        scene.shutdown(&mut device);
        assert_eq!(device.live_buffers(), 0);
    }
}
