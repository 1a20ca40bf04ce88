//! CPU-only device. Keeps every resource in generation-checked arenas and
//! records draws instead of rasterising them; used by tests and by the
//! binary's `--headless` mode.

use std::collections::BTreeMap;

use asset::{TextureData, TextureFormat};
use corelib::handles::{BufferId, ProgramId, TextureId, VertexArrayId};
use slotmap::SlotMap;

use crate::error::{GpuError, GpuResult};
use crate::gpu::{GpuDevice, Primitive, SamplerDesc, VertexLayout};
use crate::shader::{ProgramTable, ShaderProgram, SharedPrograms, UniformBlock};

/// One recorded draw with the state it saw.
#[derive(Clone, Debug, PartialEq)]
pub struct DrawCall {
    pub primitive: Primitive,
    pub program: ProgramId,
    pub vertex_array: VertexArrayId,
    pub texture: Option<TextureId>,
    pub first: u32,
    pub count: u32,
    pub uniforms: UniformBlock,
}

#[derive(Debug)]
struct VertexArrayRecord {
    buffer: BufferId,
    layout: VertexLayout,
}

/// What the device kept of an uploaded texture.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextureInfo {
    pub label: String,
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    pub mip_levels: u32,
    pub sampler: SamplerDesc,
}

#[derive(Debug, Default)]
pub struct HeadlessDevice {
    buffers: SlotMap<BufferId, Vec<f32>>,
    vertex_arrays: SlotMap<VertexArrayId, VertexArrayRecord>,
    textures: SlotMap<TextureId, TextureInfo>,
    programs: SharedPrograms,
    bound_vertex_array: Option<VertexArrayId>,
    bound_textures: BTreeMap<u32, TextureId>,
    draws: Vec<DrawCall>,
    /// Buffer creations left before allocation starts failing.
    buffer_budget: Option<usize>,
    program_budget: Option<usize>,
}

impl HeadlessDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every `create_buffer` after the next `remaining` calls fail.
    pub fn fail_buffers_after(&mut self, remaining: usize) {
        self.buffer_budget = Some(remaining);
    }

    /// Same as [`Self::fail_buffers_after`] for shader programs.
    pub fn fail_programs_after(&mut self, remaining: usize) {
        self.program_budget = Some(remaining);
    }

    pub fn live_buffers(&self) -> usize {
        self.buffers.len()
    }

    pub fn live_vertex_arrays(&self) -> usize {
        self.vertex_arrays.len()
    }

    pub fn live_textures(&self) -> usize {
        self.textures.len()
    }

    pub fn live_programs(&self) -> usize {
        self.programs.borrow().live_count()
    }

    pub fn buffer_data(&self, id: BufferId) -> Option<&[f32]> {
        self.buffers.get(id).map(Vec::as_slice)
    }

    /// Buffer and layout a vertex array reads from.
    pub fn vertex_array(&self, id: VertexArrayId) -> Option<(BufferId, VertexLayout)> {
        self.vertex_arrays.get(id).map(|v| (v.buffer, v.layout))
    }

    pub fn texture(&self, id: TextureId) -> Option<&TextureInfo> {
        self.textures.get(id)
    }

    pub fn bound_texture(&self, unit: u32) -> Option<TextureId> {
        self.bound_textures.get(&unit).copied()
    }

    pub fn bound_vertex_array(&self) -> Option<VertexArrayId> {
        self.bound_vertex_array
    }

    pub fn draw_calls(&self) -> &[DrawCall] {
        &self.draws
    }

    /// Hand back the draw log and start a fresh one.
    pub fn take_draw_calls(&mut self) -> Vec<DrawCall> {
        std::mem::take(&mut self.draws)
    }
}

impl GpuDevice for HeadlessDevice {
    fn create_buffer(&mut self, label: &str, data: &[f32]) -> GpuResult<BufferId> {
        if !spend(&mut self.buffer_budget) {
            return Err(GpuError::Device(format!("out of buffer memory for '{label}'")));
        }
        let id = self.buffers.insert(data.to_vec());
        log::trace!("Buffer '{}' ({} floats) -> {:?}", label, data.len(), id);
        Ok(id)
    }

    fn create_vertex_array(
        &mut self,
        buffer: BufferId,
        layout: &VertexLayout,
    ) -> GpuResult<VertexArrayId> {
        if !self.buffers.contains_key(buffer) {
            return Err(GpuError::UnknownHandle { kind: "buffer" });
        }
        Ok(self.vertex_arrays.insert(VertexArrayRecord {
            buffer,
            layout: *layout,
        }))
    }

    fn create_texture(
        &mut self,
        label: &str,
        data: &TextureData,
        sampler: &SamplerDesc,
    ) -> GpuResult<TextureId> {
        if !data.is_valid() {
            return Err(GpuError::InvalidTexture(label.to_owned()));
        }
        let mip_levels = if sampler.generate_mipmaps {
            data.mip_level_count()
        } else {
            1
        };
        Ok(self.textures.insert(TextureInfo {
            label: label.to_owned(),
            width: data.width,
            height: data.height,
            format: data.format,
            mip_levels,
            sampler: *sampler,
        }))
    }

    fn create_shader_program(&mut self, label: &str) -> GpuResult<Box<dyn ShaderProgram>> {
        if !spend(&mut self.program_budget) {
            return Err(GpuError::Device(format!("cannot create program '{label}'")));
        }
        Ok(Box::new(ProgramTable::create(&self.programs, label)))
    }

    fn delete_buffer(&mut self, id: BufferId) -> GpuResult<()> {
        self.buffers
            .remove(id)
            .map(|_| ())
            .ok_or(GpuError::UnknownHandle { kind: "buffer" })
    }

    fn delete_vertex_array(&mut self, id: VertexArrayId) -> GpuResult<()> {
        self.vertex_arrays
            .remove(id)
            .ok_or(GpuError::UnknownHandle {
                kind: "vertex array",
            })?;
        if self.bound_vertex_array == Some(id) {
            self.bound_vertex_array = None;
        }
        Ok(())
    }

    fn delete_texture(&mut self, id: TextureId) -> GpuResult<()> {
        self.textures
            .remove(id)
            .ok_or(GpuError::UnknownHandle { kind: "texture" })?;
        self.bound_textures.retain(|_, bound| *bound != id);
        Ok(())
    }

    fn bind_texture(&mut self, unit: u32, texture: Option<TextureId>) {
        match texture {
            Some(id) if self.textures.contains_key(id) => {
                self.bound_textures.insert(unit, id);
            }
            Some(id) => {
                log::warn!("Ignoring bind of unknown texture {:?} to unit {}", id, unit);
                self.bound_textures.remove(&unit);
            }
            None => {
                self.bound_textures.remove(&unit);
            }
        }
    }

    fn bind_vertex_array(&mut self, vertex_array: Option<VertexArrayId>) {
        self.bound_vertex_array = vertex_array.filter(|id| self.vertex_arrays.contains_key(*id));
    }

    fn draw_arrays(&mut self, primitive: Primitive, first: u32, count: u32) -> GpuResult<()> {
        let programs = self.programs.borrow();
        let (program, uniforms) = programs.current_block().ok_or(GpuError::NoProgramBound)?;
        let vertex_array = self.bound_vertex_array.ok_or(GpuError::NoVertexArrayBound)?;
        let record = self
            .vertex_arrays
            .get(vertex_array)
            .ok_or(GpuError::UnknownHandle {
                kind: "vertex array",
            })?;
        let buffer = self
            .buffers
            .get(record.buffer)
            .ok_or(GpuError::UnknownHandle { kind: "buffer" })?;

        let available = record.layout.vertex_count(buffer.len());
        if first.checked_add(count).is_none_or(|end| end > available) {
            return Err(GpuError::DrawOutOfRange {
                first,
                count,
                available,
            });
        }

        let call = DrawCall {
            primitive,
            program,
            vertex_array,
            texture: self.bound_textures.get(&crate::gpu::DIFFUSE_TEXTURE_UNIT).copied(),
            first,
            count,
            uniforms: uniforms.clone(),
        };
        drop(programs);
        self.draws.push(call);
        Ok(())
    }
}

/// Take one unit from an optional allowance; `None` is unlimited.
fn spend(budget: &mut Option<usize>) -> bool {
    match budget {
        Some(0) => false,
        Some(remaining) => {
            *remaining -= 1;
            true
        }
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::{LINE_VERTEX_LAYOUT, MODEL_VERTEX_LAYOUT};
    use crate::shader::TEXTURE1;

    fn triangle() -> Vec<f32> {
        vec![0.0; 24]
    }

    #[test]
    fn stale_handles_are_rejected() {
        let mut device = HeadlessDevice::new();
        let buffer = device.create_buffer("tri", &triangle()).unwrap();
        device.delete_buffer(buffer).unwrap();

        assert!(matches!(
            device.delete_buffer(buffer),
            Err(GpuError::UnknownHandle { kind: "buffer" })
        ));
        assert!(device.create_vertex_array(buffer, &MODEL_VERTEX_LAYOUT).is_err());
        assert_eq!(device.live_buffers(), 0);
    }

    #[test]
    fn draw_requires_program_and_vertex_array() {
        let mut device = HeadlessDevice::new();
        assert!(matches!(device.draw_triangles(0, 3), Err(GpuError::NoProgramBound)));

        let mut program = device.create_shader_program("model").unwrap();
        program.use_program();
        assert!(matches!(device.draw_triangles(0, 3), Err(GpuError::NoVertexArrayBound)));
    }

    #[test]
    fn draw_records_bound_state() {
        let mut device = HeadlessDevice::new();
        let buffer = device.create_buffer("tri", &triangle()).unwrap();
        let vao = device.create_vertex_array(buffer, &MODEL_VERTEX_LAYOUT).unwrap();
        let texture = device
            .create_texture(
                "white",
                &TextureData::solid(16, 16, [255, 255, 255, 255]),
                &SamplerDesc::MATERIAL,
            )
            .unwrap();
        let mut program = device.create_shader_program("model").unwrap();
        program.use_program();
        program.set_int(TEXTURE1, 0);

        device.bind_vertex_array(Some(vao));
        device.bind_texture(0, Some(texture));
        device.draw_triangles(0, 3).unwrap();

        let calls = device.take_draw_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].primitive, Primitive::Triangles);
        assert_eq!(calls[0].vertex_array, vao);
        assert_eq!(calls[0].texture, Some(texture));
        assert_eq!(calls[0].program, program.id());
        assert_eq!(calls[0].uniforms.int(TEXTURE1), Some(0));
        assert!(device.draw_calls().is_empty());
    }

    #[test]
    fn draw_past_the_buffer_is_rejected() {
        let mut device = HeadlessDevice::new();
        let buffer = device.create_buffer("tri", &triangle()).unwrap();
        let vao = device.create_vertex_array(buffer, &MODEL_VERTEX_LAYOUT).unwrap();
        let mut program = device.create_shader_program("model").unwrap();
        program.use_program();
        device.bind_vertex_array(Some(vao));

        assert!(matches!(
            device.draw_triangles(1, 3),
            Err(GpuError::DrawOutOfRange { available: 3, .. })
        ));
    }

    #[test]
    fn line_draws_are_recorded_and_range_checked() {
        let mut device = HeadlessDevice::new();
        let buffer = device
            .create_buffer("segment", &[0.0, 0.0, 0.0, 1.0, 2.0, 3.0])
            .unwrap();
        let vao = device.create_vertex_array(buffer, &LINE_VERTEX_LAYOUT).unwrap();
        let mut program = device.create_shader_program("line").unwrap();
        program.use_program();
        device.bind_vertex_array(Some(vao));

        device.draw_lines(0, 2).unwrap();
        assert!(matches!(
            device.draw_lines(1, 2),
            Err(GpuError::DrawOutOfRange { available: 2, .. })
        ));

        let calls = device.take_draw_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].primitive, Primitive::Lines);
        assert_eq!((calls[0].first, calls[0].count), (0, 2));
    }

    #[test]
    fn textures_keep_mip_count_and_unbind_on_delete() {
        let mut device = HeadlessDevice::new();
        let id = device
            .create_texture(
                "white",
                &TextureData::solid(16, 16, [255, 255, 255, 255]),
                &SamplerDesc::MATERIAL,
            )
            .unwrap();
        assert_eq!(device.texture(id).map(|t| t.mip_levels), Some(5));

        device.bind_texture(0, Some(id));
        device.delete_texture(id).unwrap();
        assert_eq!(device.bound_texture(0), None);
        assert_eq!(device.live_textures(), 0);
    }

    #[test]
    fn invalid_texture_data_is_refused() {
        let mut device = HeadlessDevice::new();
        let bad = TextureData {
            data: vec![0; 5],
            width: 2,
            height: 2,
            format: TextureFormat::Rgb8,
        };
        assert!(matches!(
            device.create_texture("bad", &bad, &SamplerDesc::MATERIAL),
            Err(GpuError::InvalidTexture(_))
        ));
    }

    #[test]
    fn buffer_budget_fails_allocation() {
        let mut device = HeadlessDevice::new();
        device.fail_buffers_after(1);
        assert!(device.create_buffer("a", &triangle()).is_ok());
        assert!(matches!(device.create_buffer("b", &triangle()), Err(GpuError::Device(_))));
    }

    #[test]
    fn program_budget_fails_creation() {
        let mut device = HeadlessDevice::new();
        device.fail_programs_after(0);
        assert!(matches!(device.create_shader_program("p"), Err(GpuError::Device(_))));
        assert_eq!(device.live_programs(), 0);
    }
}
