//! Device service used by the loader and the render pipeline.
//!
//! The trait mirrors a bind-then-draw API: resources are created and deleted
//! explicitly through generation-checked handles, state is bound, and draws
//! read whatever is bound at the time.

use asset::{TextureData, VERTEX_STRIDE_FLOATS};
use corelib::handles::{BufferId, TextureId, VertexArrayId};

use crate::error::GpuResult;
use crate::shader::ShaderProgram;

/// One float attribute inside an interleaved vertex.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VertexAttribute {
    pub location: u32,
    pub components: u32,
    pub offset_floats: u32,
}

/// Interleaved float vertex layout.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VertexLayout {
    pub stride_floats: u32,
    pub attributes: &'static [VertexAttribute],
}

impl VertexLayout {
    #[inline]
    pub fn stride_bytes(&self) -> u64 {
        u64::from(self.stride_floats) * std::mem::size_of::<f32>() as u64
    }

    /// Whole vertices contained in `float_count` floats.
    #[inline]
    pub fn vertex_count(&self, float_count: usize) -> u32 {
        (float_count / self.stride_floats.max(1) as usize) as u32
    }
}

/// Position (loc 0), uv (loc 1), normal (loc 2), 8 floats per vertex.
pub const MODEL_VERTEX_LAYOUT: VertexLayout = VertexLayout {
    stride_floats: VERTEX_STRIDE_FLOATS as u32,
    attributes: &[
        VertexAttribute {
            location: 0,
            components: 3,
            offset_floats: 0,
        },
        VertexAttribute {
            location: 1,
            components: 2,
            offset_floats: 3,
        },
        VertexAttribute {
            location: 2,
            components: 3,
            offset_floats: 5,
        },
    ],
};

/// Position only (loc 0), 3 floats per vertex.
pub const LINE_VERTEX_LAYOUT: VertexLayout = VertexLayout {
    stride_floats: 3,
    attributes: &[VertexAttribute {
        location: 0,
        components: 3,
        offset_floats: 0,
    }],
};

/// How a draw assembles its vertices.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Primitive {
    /// Every 3 vertices form a triangle.
    Triangles,
    /// Every 2 vertices form a segment.
    Lines,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WrapMode {
    Repeat,
    ClampToEdge,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FilterMode {
    Nearest,
    Linear,
}

/// Sampling state baked into a texture at creation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SamplerDesc {
    pub wrap: WrapMode,
    pub min_filter: FilterMode,
    pub mag_filter: FilterMode,
    /// Filter between mip levels.
    pub mipmap_filter: FilterMode,
    pub generate_mipmaps: bool,
}

impl SamplerDesc {
    /// Diffuse maps: repeat, linear within a level, nearest between levels,
    /// nearest magnification, full mip chain.
    pub const MATERIAL: SamplerDesc = SamplerDesc {
        wrap: WrapMode::Repeat,
        min_filter: FilterMode::Linear,
        mag_filter: FilterMode::Nearest,
        mipmap_filter: FilterMode::Nearest,
        generate_mipmaps: true,
    };
}

/// Texture unit diffuse maps are bound to.
pub const DIFFUSE_TEXTURE_UNIT: u32 = 0;

pub trait GpuDevice {
    /// Upload an interleaved float stream into a new vertex buffer.
    fn create_buffer(&mut self, label: &str, data: &[f32]) -> GpuResult<BufferId>;

    /// Describe how `buffer` is read as vertices.
    fn create_vertex_array(
        &mut self,
        buffer: BufferId,
        layout: &VertexLayout,
    ) -> GpuResult<VertexArrayId>;

    fn create_texture(
        &mut self,
        label: &str,
        data: &TextureData,
        sampler: &SamplerDesc,
    ) -> GpuResult<TextureId>;

    /// Create a shader program. The program is freed when the returned handle
    /// is dropped.
    fn create_shader_program(&mut self, label: &str) -> GpuResult<Box<dyn ShaderProgram>>;

    fn delete_buffer(&mut self, id: BufferId) -> GpuResult<()>;

    fn delete_vertex_array(&mut self, id: VertexArrayId) -> GpuResult<()>;

    fn delete_texture(&mut self, id: TextureId) -> GpuResult<()>;

    /// Bind `texture` to `unit`; `None` unbinds.
    fn bind_texture(&mut self, unit: u32, texture: Option<TextureId>);

    /// Bind a vertex array; `None` unbinds.
    fn bind_vertex_array(&mut self, vertex_array: Option<VertexArrayId>);

    /// Draw `count` vertices starting at `first` from the bound vertex array,
    /// using the program currently in use.
    fn draw_arrays(&mut self, primitive: Primitive, first: u32, count: u32) -> GpuResult<()>;

    fn draw_triangles(&mut self, first: u32, count: u32) -> GpuResult<()> {
        self.draw_arrays(Primitive::Triangles, first, count)
    }

    fn draw_lines(&mut self, first: u32, count: u32) -> GpuResult<()> {
        self.draw_arrays(Primitive::Lines, first, count)
    }
}
