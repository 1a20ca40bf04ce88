//! Generation-checked keys for device resources.
//!
//! Device APIs hand out plain integer names with no lifetime tracking. Every
//! backend stores its resources in a `SlotMap` keyed by these types instead,
//! so a handle deleted once can never alias a later allocation.

slotmap::new_key_type! {
    /// Vertex buffer holding an interleaved vertex stream.
    pub struct BufferId;
    /// Vertex layout description bound to one buffer.
    pub struct VertexArrayId;
    /// 2D texture with its sampler state.
    pub struct TextureId;
    /// Linked shader program.
    pub struct ProgramId;
}
