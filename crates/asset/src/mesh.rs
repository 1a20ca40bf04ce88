//! CPU-side mesh representation produced by the OBJ parser.

/// Floats per interleaved vertex: position (3) + uv (2) + normal (3).
pub const VERTEX_STRIDE_FLOATS: usize = 8;

/// Vertex with position/uv/normal. Values are in object space; `uv.y` is
/// already flipped so (0, 0) is the bottom-left of the image.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MeshVertex {
    pub position: [f32; 3],
    pub uv: [f32; 2],
    pub normal: [f32; 3],
}

impl MeshVertex {
    pub fn new(position: [f32; 3], uv: [f32; 2], normal: [f32; 3]) -> Self {
        Self {
            position,
            uv,
            normal,
        }
    }

    /// Append `[px, py, pz, u, v, nx, ny, nz]` to `out`.
    #[inline]
    pub fn write_interleaved(&self, out: &mut Vec<f32>) {
        out.extend_from_slice(&self.position);
        out.extend_from_slice(&self.uv);
        out.extend_from_slice(&self.normal);
    }
}

/// Triangle with three fully expanded vertices; nothing is shared between faces.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Face {
    pub vertices: [MeshVertex; 3],
}

/// Contiguous run of faces that share one material.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ModelPart {
    /// Name given to `usemtl`; empty when faces came before any `usemtl`.
    pub material_name: String,
    pub faces: Vec<Face>,
    /// Always `3 * faces.len()`.
    pub vertex_count: u32,
}

impl ModelPart {
    pub fn new(material_name: impl Into<String>) -> Self {
        Self {
            material_name: material_name.into(),
            faces: Vec::new(),
            vertex_count: 0,
        }
    }

    pub fn push_face(&mut self, face: Face) {
        self.faces.push(face);
        self.vertex_count += 3;
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    /// Flat vertex stream in face-then-slot order, `VERTEX_STRIDE_FLOATS`
    /// floats per vertex.
    pub fn interleaved(&self) -> Vec<f32> {
        let mut out = Vec::with_capacity(self.vertex_count as usize * VERTEX_STRIDE_FLOATS);
        for face in &self.faces {
            for v in &face.vertices {
                v.write_interleaved(&mut out);
            }
        }
        out
    }
}
