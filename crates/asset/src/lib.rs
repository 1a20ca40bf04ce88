//! Asset loading/parsers (meshes, materials, textures).
//! OBJ subset -> material-partitioned model parts; MTL subset -> material table.

pub mod error;
pub mod mesh;
pub mod mtl;
pub mod obj;
pub mod texture;

pub use error::{AssetError, AssetResult, AttributeKind};
pub use mesh::{Face, MeshVertex, ModelPart, VERTEX_STRIDE_FLOATS};
pub use mtl::{Material, MaterialTable, TextureLoader, parse_mtl_str};
pub use obj::{ObjModel, load_obj_from_path, load_obj_from_reader, load_obj_from_str};
pub use texture::{TextureData, TextureFormat};
