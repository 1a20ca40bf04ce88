//! Renderer: device abstraction, model upload and the per-entity draw.
//!
//! [`GpuDevice`] is implemented by [`WgpuDevice`] for on-screen rendering and
//! by [`HeadlessDevice`] for tests and batch runs.

pub mod debug_line;
pub mod error;
pub mod gpu;
pub mod headless;
pub mod mesh_renderer;
pub mod mesh_upload;
pub mod render_system;
pub mod shader;
pub mod wgpu_backend;

pub use debug_line::DebugLine;
pub use error::{GpuError, GpuResult, RenderError};
pub use gpu::{
    GpuDevice, LINE_VERTEX_LAYOUT, MODEL_VERTEX_LAYOUT, Primitive, SamplerDesc, VertexAttribute,
    VertexLayout,
};
pub use headless::{DrawCall, HeadlessDevice};
pub use mesh_renderer::{MeshRenderer, RenderSettings};
pub use mesh_upload::{GpuMesh, upload_model_part, upload_model_parts};
pub use render_system::{RenderSystem, SharedRenderer};
pub use shader::{ShaderProgram, UniformBlock, UniformValue};
pub use wgpu_backend::WgpuDevice;
