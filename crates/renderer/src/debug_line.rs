//! A single world-space segment with its own program, drawn as a line list.

use corelib::camera::Camera;
use glam::{Mat4, Vec3};

use crate::error::GpuResult;
use crate::gpu::{GpuDevice, LINE_VERTEX_LAYOUT};
use crate::mesh_renderer::RenderSettings;
use crate::mesh_upload::GpuMesh;
use crate::shader::{self, ShaderProgram};

const LABEL: &str = "debug line";

pub struct DebugLine {
    start: Vec3,
    end: Vec3,
    color: Vec3,
    mesh: Option<GpuMesh>,
    shader: Box<dyn ShaderProgram>,
}

impl DebugLine {
    pub const DEFAULT_COLOR: Vec3 = Vec3::ONE;

    /// Upload the two endpoints and create the line program. Nothing stays
    /// allocated on failure.
    pub fn new(device: &mut dyn GpuDevice, start: Vec3, end: Vec3) -> GpuResult<Self> {
        let mut data = [0.0f32; 6];
        data[..3].copy_from_slice(&start.to_array());
        data[3..].copy_from_slice(&end.to_array());

        let buffer = device.create_buffer(LABEL, &data)?;
        let vertex_array = match device.create_vertex_array(buffer, &LINE_VERTEX_LAYOUT) {
            Ok(id) => id,
            Err(e) => {
                if let Err(cleanup) = device.delete_buffer(buffer) {
                    log::error!("Failed to free {} buffer: {}", LABEL, cleanup);
                }
                return Err(e);
            }
        };
        let mesh = GpuMesh {
            vertex_array,
            buffer,
            vertex_count: 2,
        };

        let shader = match device.create_shader_program(LABEL) {
            Ok(shader) => shader,
            Err(e) => {
                if let Err(cleanup) = mesh.release(device) {
                    log::error!("Failed to free {} vertices: {}", LABEL, cleanup);
                }
                return Err(e);
            }
        };

        log::debug!("Debug line {} -> {}", start, end);
        Ok(Self {
            start,
            end,
            color: Self::DEFAULT_COLOR,
            mesh: Some(mesh),
            shader,
        })
    }

    pub fn with_color(mut self, color: Vec3) -> Self {
        self.color = color;
        self
    }

    pub fn start(&self) -> Vec3 {
        self.start
    }

    pub fn end(&self) -> Vec3 {
        self.end
    }

    pub fn color(&self) -> Vec3 {
        self.color
    }

    pub fn is_released(&self) -> bool {
        self.mesh.is_none()
    }

    /// Draw the segment. Endpoints are world coordinates, so the model
    /// matrix is always identity.
    pub fn render(
        &mut self,
        device: &mut dyn GpuDevice,
        camera: &Camera,
        settings: &RenderSettings,
    ) -> GpuResult<()> {
        let Some(mesh) = self.mesh else {
            log::warn!("Debug line rendered after release, ignored");
            return Ok(());
        };

        self.shader.use_program();
        let projection = camera.projection_matrix(settings.aspect, settings.z_near, settings.z_far);
        self.shader.set_mat4(shader::PROJECTION, projection);
        self.shader.set_mat4(shader::VIEW, camera.view_matrix());
        self.shader.set_mat4(shader::MODEL, Mat4::IDENTITY);
        self.shader.set_vec3(shader::LINE_COLOR, self.color);

        device.bind_vertex_array(Some(mesh.vertex_array));
        let drawn = device.draw_lines(0, mesh.vertex_count);
        device.bind_vertex_array(None);
        drawn
    }

    /// Delete the vertex array and buffer. Later calls do nothing.
    pub fn release(&mut self, device: &mut dyn GpuDevice) -> GpuResult<()> {
        match self.mesh.take() {
            Some(mesh) => mesh.release(device),
            None => Ok(()),
        }
    }
}

impl Drop for DebugLine {
    fn drop(&mut self) {
        if self.mesh.is_some() {
            log::warn!("Debug line dropped without release; its GPU resources leak");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GpuError;
    use crate::gpu::Primitive;
    use crate::headless::HeadlessDevice;

    #[test]
    fn uploads_both_endpoints_as_positions() {
        let mut device = HeadlessDevice::new();
        let mut line = DebugLine::new(&mut device, Vec3::ZERO, Vec3::new(1.0, 2.0, 3.0)).unwrap();

        let mesh = line.mesh.expect("uploaded");
        assert_eq!(
            device.buffer_data(mesh.buffer),
            Some(&[0.0, 0.0, 0.0, 1.0, 2.0, 3.0][..])
        );
        assert_eq!(
            device.vertex_array(mesh.vertex_array),
            Some((mesh.buffer, LINE_VERTEX_LAYOUT))
        );
        line.release(&mut device).unwrap();
    }

    #[test]
    fn render_draws_two_vertices_as_lines() {
        let mut device = HeadlessDevice::new();
        let mut line = DebugLine::new(&mut device, Vec3::ZERO, Vec3::X)
            .unwrap()
            .with_color(Vec3::new(1.0, 0.0, 0.0));
        let mut camera = Camera::default();
        camera.zoom = 30.0;
        let settings = RenderSettings::default();

        line.render(&mut device, &camera, &settings).unwrap();

        let calls = device.take_draw_calls();
        assert_eq!(calls.len(), 1);
        let call = &calls[0];
        assert_eq!(call.primitive, Primitive::Lines);
        assert_eq!((call.first, call.count), (0, 2));
        assert_eq!(call.texture, None);
        assert_eq!(
            call.uniforms.mat4(shader::PROJECTION),
            Some(Mat4::perspective_rh(30f32.to_radians(), 800.0 / 600.0, 0.1, 100.0))
        );
        assert_eq!(call.uniforms.mat4(shader::VIEW), Some(camera.view_matrix()));
        assert_eq!(call.uniforms.mat4(shader::MODEL), Some(Mat4::IDENTITY));
        assert_eq!(call.uniforms.vec3(shader::LINE_COLOR), Some(Vec3::new(1.0, 0.0, 0.0)));
        assert_eq!(device.bound_vertex_array(), None);
        line.release(&mut device).unwrap();
    }

    #[test]
    fn release_frees_everything_once() {
        let mut device = HeadlessDevice::new();
        let mut line = DebugLine::new(&mut device, Vec3::ZERO, Vec3::Y).unwrap();
        assert_eq!(device.live_buffers(), 1);
        assert_eq!(device.live_programs(), 1);

        line.release(&mut device).unwrap();
        line.release(&mut device).unwrap();
        line.render(&mut device, &Camera::default(), &RenderSettings::default())
            .unwrap();

        assert!(line.is_released());
        assert!(device.draw_calls().is_empty());
        assert_eq!(device.live_buffers(), 0);
        assert_eq!(device.live_vertex_arrays(), 0);
        drop(line);
        assert_eq!(device.live_programs(), 0);
    }

    #[test]
    fn failed_program_creation_frees_the_vertices() {
        let mut device = HeadlessDevice::new();
        device.fail_programs_after(0);

        let result = DebugLine::new(&mut device, Vec3::ZERO, Vec3::Z);

        assert!(matches!(result, Err(GpuError::Device(_))));
        assert_eq!(device.live_buffers(), 0);
        assert_eq!(device.live_vertex_arrays(), 0);
    }
}
