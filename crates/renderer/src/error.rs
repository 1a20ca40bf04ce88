use asset::AssetError;
use corelib::ecs::Entity;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GpuError {
    #[error("unknown or already deleted {kind} handle")]
    UnknownHandle { kind: &'static str },

    #[error("vertex layout is not supported by this device")]
    UnsupportedLayout,

    #[error("draw issued with no shader program in use")]
    NoProgramBound,

    #[error("draw issued with no vertex array bound")]
    NoVertexArrayBound,

    #[error("draw of vertices {first}..{} exceeds the {available} stored in the buffer", u64::from(*first) + u64::from(*count))]
    DrawOutOfRange { first: u32, count: u32, available: u32 },

    #[error("invalid texture data for '{0}'")]
    InvalidTexture(String),

    #[error("device error: {0}")]
    Device(String),

    #[error("surface error: {0}")]
    Surface(#[from] wgpu::SurfaceError),
}

pub type GpuResult<T> = Result<T, GpuError>;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error(transparent)]
    Asset(#[from] AssetError),

    #[error(transparent)]
    Gpu(#[from] GpuError),

    #[error("renderable of entity {entity} is borrowed elsewhere")]
    RenderableInUse { entity: Entity },
}
