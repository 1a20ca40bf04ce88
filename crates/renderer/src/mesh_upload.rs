//! Moving parsed assets onto the device: one vertex buffer plus vertex array
//! per model part, and diffuse maps for the MTL parser.

use std::path::Path;

use asset::{ModelPart, TextureData, TextureLoader};
use corelib::handles::{BufferId, TextureId, VertexArrayId};

use crate::error::GpuResult;
use crate::gpu::{GpuDevice, MODEL_VERTEX_LAYOUT, SamplerDesc};

/// Device resources of one model part.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GpuMesh {
    pub vertex_array: VertexArrayId,
    pub buffer: BufferId,
    pub vertex_count: u32,
}

impl GpuMesh {
    /// Delete the vertex array and its buffer. Both deletions are attempted
    /// even if the first fails.
    pub fn release(self, device: &mut dyn GpuDevice) -> GpuResult<()> {
        let vertex_array = device.delete_vertex_array(self.vertex_array);
        let buffer = device.delete_buffer(self.buffer);
        vertex_array.and(buffer)
    }
}

/// Upload one part. Empty parts get no allocation and yield `None`.
pub fn upload_model_part(
    device: &mut dyn GpuDevice,
    part: &ModelPart,
    label: &str,
) -> GpuResult<Option<GpuMesh>> {
    if part.is_empty() {
        log::debug!("Part '{}' has no faces, nothing to upload", label);
        return Ok(None);
    }

    let data = part.interleaved();
    let buffer = device.create_buffer(label, &data)?;
    let vertex_array = match device.create_vertex_array(buffer, &MODEL_VERTEX_LAYOUT) {
        Ok(id) => id,
        Err(e) => {
            if let Err(cleanup) = device.delete_buffer(buffer) {
                log::error!("Failed to free buffer of '{}': {}", label, cleanup);
            }
            return Err(e);
        }
    };

    log::trace!(
        "Uploaded part '{}': {} vertices, {} floats",
        label,
        part.vertex_count,
        data.len()
    );
    Ok(Some(GpuMesh {
        vertex_array,
        buffer,
        vertex_count: part.vertex_count,
    }))
}

/// Upload every part, index-aligned with `parts`. On failure the meshes
/// created so far are released before the error is returned.
pub fn upload_model_parts(
    device: &mut dyn GpuDevice,
    parts: &[ModelPart],
    label: &str,
) -> GpuResult<Vec<Option<GpuMesh>>> {
    let mut meshes = Vec::with_capacity(parts.len());
    for (index, part) in parts.iter().enumerate() {
        let part_label = format!("{label}#{index} ({})", part.material_name);
        match upload_model_part(device, part, &part_label) {
            Ok(mesh) => meshes.push(mesh),
            Err(e) => {
                if release_meshes(device, meshes).is_err() {
                    log::error!("Cleanup after failed upload of '{}' was incomplete", label);
                }
                return Err(e);
            }
        }
    }
    Ok(meshes)
}

/// Release every uploaded mesh, logging failures. Returns the first error.
pub fn release_meshes(
    device: &mut dyn GpuDevice,
    meshes: impl IntoIterator<Item = Option<GpuMesh>>,
) -> GpuResult<()> {
    let mut result = Ok(());
    for mesh in meshes.into_iter().flatten() {
        if let Err(e) = mesh.release(device) {
            log::error!("Failed to release mesh {:?}: {}", mesh.vertex_array, e);
            if result.is_ok() {
                result = Err(e);
            }
        }
    }
    result
}

/// Decodes diffuse maps from disk and uploads them with the material sampler.
pub struct DeviceTextureLoader<'a> {
    device: &'a mut dyn GpuDevice,
}

impl<'a> DeviceTextureLoader<'a> {
    pub fn new(device: &'a mut dyn GpuDevice) -> Self {
        Self { device }
    }
}

impl TextureLoader for DeviceTextureLoader<'_> {
    fn load_texture(&mut self, path: &Path, has_alpha: bool) -> Option<TextureId> {
        let data = match TextureData::load(path, has_alpha) {
            Ok(data) => data,
            Err(e) => {
                log::error!("{}", e);
                return None;
            }
        };
        let label = path.display().to_string();
        match self.device.create_texture(&label, &data, &SamplerDesc::MATERIAL) {
            Ok(id) => Some(id),
            Err(e) => {
                log::error!("Failed to upload texture {}: {}", label, e);
                None
            }
        }
    }

    fn release_texture(&mut self, id: TextureId) {
        if let Err(e) = self.device.delete_texture(id) {
            log::warn!("Failed to release texture {:?}: {}", id, e);
        }
    }
}
