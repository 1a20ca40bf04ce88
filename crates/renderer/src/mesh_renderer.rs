//! A loaded model: material table, model parts and their GPU meshes, plus
//! the shader program that draws them.

use std::path::Path;

use asset::{MaterialTable, ModelPart, load_obj_from_path};
use corelib::camera::Camera;
use corelib::config::EngineConfig;
use corelib::ecs::Entity;
use glam::{Mat4, Vec3};

use crate::error::{GpuResult, RenderError};
use crate::gpu::{DIFFUSE_TEXTURE_UNIT, GpuDevice};
use crate::mesh_upload::{DeviceTextureLoader, GpuMesh, release_meshes, upload_model_parts};
use crate::shader::{self, ShaderProgram};

/// Projection parameters shared by every renderable.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RenderSettings {
    pub aspect: f32,
    pub z_near: f32,
    pub z_far: f32,
}

impl RenderSettings {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            aspect: config.aspect_ratio(),
            z_near: config.z_near,
            z_far: config.z_far,
        }
    }
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

pub struct MeshRenderer {
    entity: Entity,
    parts: Vec<ModelPart>,
    /// Index-aligned with `parts`; `None` for parts without faces.
    meshes: Vec<Option<GpuMesh>>,
    materials: MaterialTable,
    shader: Box<dyn ShaderProgram>,
    released: bool,
}

impl MeshRenderer {
    /// Parse `mtl_path` (uploading its diffuse maps), then `obj_path`, upload
    /// the parts and create the shader. Nothing stays allocated on failure.
    pub fn load(
        entity: Entity,
        obj_path: &Path,
        mtl_path: &Path,
        images_dir: &Path,
        device: &mut dyn GpuDevice,
    ) -> Result<Self, RenderError> {
        let mut materials =
            MaterialTable::load(mtl_path, images_dir, &mut DeviceTextureLoader::new(device));

        let model = match load_obj_from_path(obj_path) {
            Ok(model) => model,
            Err(e) => {
                materials.release_textures(&mut DeviceTextureLoader::new(device));
                return Err(e.into());
            }
        };

        let label = obj_path.display().to_string();
        Self::from_parts(entity, model.parts, materials, device, &label)
    }

    /// Build a renderer from already parsed data. Takes ownership of the
    /// material textures; they are released if anything fails here.
    pub fn from_parts(
        entity: Entity,
        parts: Vec<ModelPart>,
        mut materials: MaterialTable,
        device: &mut dyn GpuDevice,
        label: &str,
    ) -> Result<Self, RenderError> {
        let meshes = match upload_model_parts(device, &parts, label) {
            Ok(meshes) => meshes,
            Err(e) => {
                materials.release_textures(&mut DeviceTextureLoader::new(device));
                return Err(e.into());
            }
        };

        let shader = match device.create_shader_program(label) {
            Ok(shader) => shader,
            Err(e) => {
                if let Err(cleanup) = release_meshes(device, meshes) {
                    log::error!(
                        "Cleanup after failed program creation for '{}': {}",
                        label,
                        cleanup
                    );
                }
                materials.release_textures(&mut DeviceTextureLoader::new(device));
                return Err(e.into());
            }
        };

        log::info!(
            "Entity {}: {} part(s) from {}, {} material(s)",
            entity,
            parts.len(),
            label,
            materials.len()
        );
        Ok(Self {
            entity,
            parts,
            meshes,
            materials,
            shader,
            released: false,
        })
    }

    pub fn entity(&self) -> Entity {
        self.entity
    }

    pub fn parts(&self) -> &[ModelPart] {
        &self.parts
    }

    pub fn meshes(&self) -> &[Option<GpuMesh>] {
        &self.meshes
    }

    pub fn materials(&self) -> &MaterialTable {
        &self.materials
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Draw every part with `model` as the model matrix.
    pub fn render(
        &mut self,
        device: &mut dyn GpuDevice,
        camera: &Camera,
        model: Mat4,
        settings: &RenderSettings,
    ) -> GpuResult<()> {
        if self.released {
            log::warn!("Entity {}: render after release ignored", self.entity);
            return Ok(());
        }

        self.shader.use_program();
        let projection = camera.projection_matrix(settings.aspect, settings.z_near, settings.z_far);
        self.shader.set_mat4(shader::PROJECTION, projection);
        self.shader.set_mat4(shader::VIEW, camera.view_matrix());
        self.shader.set_mat4(shader::MODEL, model);

        for (part, mesh) in self.parts.iter().zip(&self.meshes) {
            let Some(mesh) = mesh else {
                continue;
            };

            match self.materials.get(&part.material_name) {
                Some(material) => {
                    device.bind_texture(DIFFUSE_TEXTURE_UNIT, material.texture);
                    self.shader
                        .set_int(shader::TEXTURE1, DIFFUSE_TEXTURE_UNIT as i32);
                    self.shader
                        .set_vec3(shader::MATERIAL_AMBIENT, Vec3::from_array(material.ambient));
                    self.shader
                        .set_vec3(shader::MATERIAL_DIFFUSE, Vec3::from_array(material.diffuse));
                    self.shader.set_vec3(
                        shader::MATERIAL_SPECULAR,
                        Vec3::from_array(material.specular),
                    );
                    self.shader
                        .set_float(shader::MATERIAL_SHININESS, material.shininess);
                }
                None => {
                    log::trace!("No material '{}', drawing untextured", part.material_name);
                    device.bind_texture(DIFFUSE_TEXTURE_UNIT, None);
                }
            }

            device.bind_vertex_array(Some(mesh.vertex_array));
            let drawn = device.draw_triangles(0, mesh.vertex_count);
            device.bind_texture(DIFFUSE_TEXTURE_UNIT, None);
            device.bind_vertex_array(None);
            drawn?;
        }
        Ok(())
    }

    /// Delete every vertex array, buffer and texture and clear the parts and
    /// materials. Later calls do nothing.
    pub fn release(&mut self, device: &mut dyn GpuDevice) -> GpuResult<()> {
        if self.released {
            return Ok(());
        }
        self.released = true;

        let result = release_meshes(device, self.meshes.drain(..));
        self.materials
            .release_textures(&mut DeviceTextureLoader::new(device));
        self.parts.clear();
        log::debug!("Entity {}: released GPU resources", self.entity);
        result
    }

    fn holds_device_resources(&self) -> bool {
        self.meshes.iter().any(Option::is_some)
            || self.materials.iter().any(|(_, m)| m.texture.is_some())
    }
}

impl Drop for MeshRenderer {
    fn drop(&mut self) {
        if !self.released && self.holds_device_resources() {
            log::warn!(
                "Entity {} dropped without release; its GPU resources leak",
                self.entity
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GpuError;
    use crate::headless::HeadlessDevice;
    use asset::{load_obj_from_str, parse_mtl_str};
    use std::io::Write;
    use std::path::PathBuf;

    const TWO_MATERIALS: &str = "\
v 0 0 0
v 1 0 0
v 0 1 0
vt 0 0
vt 1 0
vt 0 1
vn 0 0 1
usemtl red
f 1/1/1 2/2/1 3/3/1
usemtl missing
usemtl blue
f 3/3/1 2/2/1 1/1/1
f 1/1/1 3/3/1 2/2/1
";

    const MATERIALS: &str = "\
newmtl red
Ka 0.1 0.0 0.0
Kd 1.0 0.0 0.0
Ks 0.5 0.5 0.5
Ns 32
newmtl blue
Kd 0.0 0.0 1.0
";

    fn write_red_png(tag: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("gyro3d-{}-{}.png", tag, std::process::id()));
        image::RgbImage::from_pixel(4, 4, image::Rgb([255, 0, 0]))
            .save(&path)
            .unwrap();
        path
    }

    fn renderer(device: &mut HeadlessDevice, obj: &str, mtl: &str) -> MeshRenderer {
        let model = load_obj_from_str(obj).unwrap();
        let materials = parse_mtl_str(mtl, Path::new("."), &mut DeviceTextureLoader::new(device));
        MeshRenderer::from_parts(1, model.parts, materials, device, "test").unwrap()
    }

    #[test]
    fn draws_parts_in_order_skipping_empty_ones() {
        let mut device = HeadlessDevice::new();
        let mut r = renderer(&mut device, TWO_MATERIALS, MATERIALS);
        assert_eq!(r.parts().len(), 3);
        assert!(r.meshes()[1].is_none());

        r.render(&mut device, &Camera::default(), Mat4::IDENTITY, &RenderSettings::default())
            .unwrap();

        let calls = device.take_draw_calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].count, 3);
        assert_eq!(calls[1].count, 6);
        assert_eq!(Some(calls[0].vertex_array), r.meshes()[0].map(|m| m.vertex_array));
        assert_eq!(Some(calls[1].vertex_array), r.meshes()[2].map(|m| m.vertex_array));
        assert_eq!(device.bound_vertex_array(), None);
        r.release(&mut device).unwrap();
    }

    #[test]
    fn uploads_matrices_and_material_uniforms() {
        let mut device = HeadlessDevice::new();
        let mut r = renderer(&mut device, TWO_MATERIALS, MATERIALS);
        let camera = Camera::default();
        let settings = RenderSettings::default();
        let model = Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0));

        r.render(&mut device, &camera, model, &settings).unwrap();

        let calls = device.take_draw_calls();
        let red = &calls[0].uniforms;
        assert_eq!(red.mat4(shader::MODEL), Some(model));
        assert_eq!(red.mat4(shader::VIEW), Some(camera.view_matrix()));
        assert_eq!(
            red.mat4(shader::PROJECTION),
            Some(camera.projection_matrix(800.0 / 600.0, 0.1, 100.0))
        );
        assert_eq!(red.int(shader::TEXTURE1), Some(0));
        assert_eq!(red.vec3(shader::MATERIAL_AMBIENT), Some(Vec3::new(0.1, 0.0, 0.0)));
        assert_eq!(red.vec3(shader::MATERIAL_DIFFUSE), Some(Vec3::new(1.0, 0.0, 0.0)));
        assert_eq!(red.float(shader::MATERIAL_SHININESS), Some(32.0));

        let blue = &calls[1].uniforms;
        assert_eq!(blue.vec3(shader::MATERIAL_DIFFUSE), Some(Vec3::new(0.0, 0.0, 1.0)));
        r.release(&mut device).unwrap();
    }

    #[test]
    fn unknown_material_draws_untextured() {
        let mut device = HeadlessDevice::new();
        let obj = "v 0 0 0\nvt 0 0\nvn 0 0 1\nusemtl ghost\nf 1/1/1 1/1/1 1/1/1\n";
        let mut r = renderer(&mut device, obj, "");

        r.render(&mut device, &Camera::default(), Mat4::IDENTITY, &RenderSettings::default())
            .unwrap();

        let calls = device.take_draw_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].texture, None);
        assert_eq!(calls[0].uniforms.int(shader::TEXTURE1), None);
        r.release(&mut device).unwrap();
    }

    #[test]
    fn textured_material_binds_unit_zero_for_its_draw_only() {
        let mut device = HeadlessDevice::new();
        let model = load_obj_from_str(TWO_MATERIALS).unwrap();

        let image = write_red_png("bind");
        let mtl = format!("newmtl red\nmap_Kd {}\nnewmtl blue\n", image.display());
        let materials = parse_mtl_str(&mtl, Path::new(""), &mut DeviceTextureLoader::new(&mut device));
        let _ = std::fs::remove_file(&image);

        let texture = materials.get("red").and_then(|m| m.texture);
        assert!(texture.is_some());
        let mut r = MeshRenderer::from_parts(3, model.parts, materials, &mut device, "tex").unwrap();

        r.render(&mut device, &Camera::default(), Mat4::IDENTITY, &RenderSettings::default())
            .unwrap();
        let calls = device.take_draw_calls();
        assert_eq!(calls[0].texture, texture);
        assert_eq!(calls[1].texture, None);
        assert_eq!(device.bound_texture(0), None);

        r.release(&mut device).unwrap();
        assert_eq!(device.live_textures(), 0);
    }

    #[test]
    fn release_frees_everything_once() {
        let mut device = HeadlessDevice::new();
        let mut r = renderer(&mut device, TWO_MATERIALS, MATERIALS);
        assert_eq!(device.live_buffers(), 2);
        assert_eq!(device.live_programs(), 1);

        r.release(&mut device).unwrap();
        r.release(&mut device).unwrap();

        assert!(r.is_released());
        assert!(r.parts().is_empty());
        assert!(r.materials().is_empty());
        assert_eq!(device.live_buffers(), 0);
        assert_eq!(device.live_vertex_arrays(), 0);

        drop(r);
        assert_eq!(device.live_programs(), 0);
    }

    #[test]
    fn render_after_release_draws_nothing() {
        let mut device = HeadlessDevice::new();
        let mut r = renderer(&mut device, TWO_MATERIALS, MATERIALS);
        r.release(&mut device).unwrap();

        r.render(&mut device, &Camera::default(), Mat4::IDENTITY, &RenderSettings::default())
            .unwrap();
        assert!(device.draw_calls().is_empty());
    }

    #[test]
    fn failed_upload_releases_material_textures() {
        let mut device = HeadlessDevice::new();
        let image = write_red_png("fail");
        let mtl = format!("newmtl red\nmap_Kd {}\n", image.display());
        let materials = parse_mtl_str(&mtl, Path::new(""), &mut DeviceTextureLoader::new(&mut device));
        let _ = std::fs::remove_file(&image);
        assert_eq!(device.live_textures(), 1);

        device.fail_buffers_after(1);
        let model = load_obj_from_str(TWO_MATERIALS).unwrap();
        let result = MeshRenderer::from_parts(1, model.parts, materials, &mut device, "x");

        assert!(matches!(result, Err(RenderError::Gpu(_))));
        assert_eq!(device.live_buffers(), 0);
        assert_eq!(device.live_vertex_arrays(), 0);
        assert_eq!(device.live_textures(), 0);
        assert_eq!(device.live_programs(), 0);
    }

    #[test]
    fn failed_program_creation_releases_meshes_and_textures() {
        let mut device = HeadlessDevice::new();
        let image = write_red_png("program");
        let mtl = format!("newmtl red\nmap_Kd {}\n", image.display());
        let materials = parse_mtl_str(&mtl, Path::new(""), &mut DeviceTextureLoader::new(&mut device));
        let _ = std::fs::remove_file(&image);

        device.fail_programs_after(0);
        let model = load_obj_from_str(TWO_MATERIALS).unwrap();
        let result = MeshRenderer::from_parts(1, model.parts, materials, &mut device, "noprog");

        assert!(matches!(result, Err(RenderError::Gpu(GpuError::Device(_)))));
        assert_eq!(device.live_buffers(), 0);
        assert_eq!(device.live_vertex_arrays(), 0);
        assert_eq!(device.live_textures(), 0);
        assert_eq!(device.live_programs(), 0);
    }

    #[test]
    fn load_reports_missing_obj_and_keeps_device_clean() {
        let mut device = HeadlessDevice::new();
        let dir = std::env::temp_dir();
        let image = write_red_png("load");
        let mtl = dir.join(format!("gyro3d-load-{}.mtl", std::process::id()));
        std::fs::File::create(&mtl)
            .and_then(|mut f| writeln!(f, "newmtl red\nmap_Kd {}", image.display()))
            .unwrap();

        let result = MeshRenderer::load(
            7,
            &dir.join("gyro3d-no-such-model.obj"),
            &mtl,
            &dir,
            &mut device,
        );
        let _ = std::fs::remove_file(&mtl);
        let _ = std::fs::remove_file(&image);

        assert!(matches!(result, Err(RenderError::Asset(_))));
        assert_eq!(device.live_textures(), 0);
        assert_eq!(device.live_programs(), 0);
    }
}
