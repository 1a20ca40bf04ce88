//! OBJ parser for triangulated `v/vt/vn` meshes, grouped into per-material parts.

use std::{
    fs::File,
    io::{self, BufRead, BufReader},
    path::Path,
    str::SplitWhitespace,
};

use crate::{
    error::{AssetError, AssetResult, AttributeKind},
    mesh::{Face, MeshVertex, ModelPart},
};

/// Parsed OBJ file: parts in file order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ObjModel {
    pub parts: Vec<ModelPart>,
}

impl ObjModel {
    pub fn face_count(&self) -> usize {
        self.parts.iter().map(|p| p.faces.len()).sum()
    }

    pub fn vertex_count(&self) -> u32 {
        self.parts.iter().map(|p| p.vertex_count).sum()
    }
}

/// Load an OBJ mesh from a file path.
pub fn load_obj_from_path(path: impl AsRef<Path>) -> AssetResult<ObjModel> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| AssetError::Open {
        kind: "OBJ",
        path: path.to_path_buf(),
        source,
    })?;
    let model = parse_obj(BufReader::new(file), &path.display().to_string())?;
    log::info!(
        "Loaded OBJ {}: {} part(s), {} face(s)",
        path.display(),
        model.parts.len(),
        model.face_count()
    );
    Ok(model)
}

/// Load an OBJ mesh from a [`BufRead`] implementation. `source_name` only
/// labels error messages.
pub fn load_obj_from_reader<R: BufRead>(reader: R, source_name: &str) -> AssetResult<ObjModel> {
    parse_obj(reader, source_name)
}

/// Convenience helper to parse an OBJ string literal.
pub fn load_obj_from_str(contents: &str) -> AssetResult<ObjModel> {
    parse_obj(io::Cursor::new(contents), "<memory>")
}

/// Attribute pools accumulated in declaration order.
#[derive(Default)]
struct Pools {
    positions: Vec<[f32; 3]>,
    texcoords: Vec<[f32; 2]>,
    normals: Vec<[f32; 3]>,
}

struct LineCtx<'a> {
    file: &'a str,
    line: usize,
    text: &'a str,
}

impl LineCtx<'_> {
    fn malformed_attribute(&self, directive: &'static str) -> AssetError {
        AssetError::MalformedAttribute {
            file: self.file.to_owned(),
            line: self.line,
            directive,
            text: self.text.to_owned(),
        }
    }

    fn malformed_face(&self) -> AssetError {
        AssetError::MalformedFace {
            file: self.file.to_owned(),
            line: self.line,
            text: self.text.to_owned(),
        }
    }
}

fn parse_obj<R: BufRead>(reader: R, file: &str) -> AssetResult<ObjModel> {
    let mut pools = Pools::default();
    // Faces always go into the last part; the first one is opened lazily.
    let mut parts: Vec<ModelPart> = Vec::new();

    for (line_no, line) in reader.lines().enumerate() {
        let line = line.map_err(|source| AssetError::Read {
            file: file.to_owned(),
            line: line_no + 1,
            source,
        })?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let ctx = LineCtx {
            file,
            line: line_no + 1,
            text: trimmed,
        };
        let mut tokens = trimmed.split_whitespace();
        let Some(tag) = tokens.next() else {
            continue;
        };

        match tag {
            "v" => {
                let [x, y, z] = parse_floats::<3>(&mut tokens)
                    .ok_or_else(|| ctx.malformed_attribute("v"))?;
                pools.positions.push([x, y, z]);
            }
            "vt" => {
                let [u, v] = parse_floats::<2>(&mut tokens)
                    .ok_or_else(|| ctx.malformed_attribute("vt"))?;
                // Flip V so (0, 0) is the bottom-left texel.
                pools.texcoords.push([u, 1.0 - v]);
            }
            "vn" => {
                let [x, y, z] = parse_floats::<3>(&mut tokens)
                    .ok_or_else(|| ctx.malformed_attribute("vn"))?;
                pools.normals.push([x, y, z]);
            }
            "f" => {
                let face = parse_face(tokens, &pools, &ctx)?;
                if parts.is_empty() {
                    parts.push(ModelPart::new(String::new()));
                }
                if let Some(part) = parts.last_mut() {
                    part.push_face(face);
                }
            }
            "usemtl" => {
                let name = trimmed["usemtl".len()..].trim();
                if let Some(prev) = parts.last().filter(|p| p.is_empty()) {
                    log::debug!(
                        "{}:{}: usemtl '{}' leaves part '{}' without faces",
                        file,
                        ctx.line,
                        name,
                        prev.material_name
                    );
                }
                parts.push(ModelPart::new(name));
            }
            _ => {
                // Ignore other directives (o/g/s/mtllib/etc.)
            }
        }
    }

    Ok(ObjModel { parts })
}

/// Parse the next `N` tokens as floats. Extra trailing components (e.g. the
/// optional `w`) are ignored.
fn parse_floats<const N: usize>(tokens: &mut SplitWhitespace<'_>) -> Option<[f32; N]> {
    let mut out = [0.0f32; N];
    for slot in &mut out {
        *slot = tokens.next()?.parse().ok()?;
    }
    Some(out)
}

fn parse_face(tokens: SplitWhitespace<'_>, pools: &Pools, ctx: &LineCtx<'_>) -> AssetResult<Face> {
    let refs: Vec<&str> = tokens.collect();
    if refs.len() != 3 {
        return Err(ctx.malformed_face());
    }

    let mut face = Face::default();
    for (slot, token) in face.vertices.iter_mut().zip(refs) {
        let [vi, ti, ni] = parse_face_vertex(token).ok_or_else(|| ctx.malformed_face())?;
        *slot = MeshVertex::new(
            resolve_index(&pools.positions, vi, AttributeKind::Position, ctx)?,
            resolve_index(&pools.texcoords, ti, AttributeKind::TexCoord, ctx)?,
            resolve_index(&pools.normals, ni, AttributeKind::Normal, ctx)?,
        );
    }
    Ok(face)
}

/// `a/b/c` with all three indices present. Indices are read signed so that
/// negative or oversized ones surface as range errors rather than syntax errors.
fn parse_face_vertex(token: &str) -> Option<[i64; 3]> {
    let mut split = token.split('/');
    let mut out = [0i64; 3];
    for slot in &mut out {
        *slot = split.next()?.parse().ok()?;
    }
    if split.next().is_some() {
        return None;
    }
    Some(out)
}

/// Look up a 1-based index in `pool`, as declared so far.
fn resolve_index<T: Copy>(
    pool: &[T],
    index: i64,
    attribute: AttributeKind,
    ctx: &LineCtx<'_>,
) -> AssetResult<T> {
    index
        .checked_sub(1)
        .and_then(|i| usize::try_from(i).ok())
        .and_then(|i| pool.get(i))
        .copied()
        .ok_or_else(|| AssetError::IndexOutOfRange {
            file: ctx.file.to_owned(),
            line: ctx.line,
            attribute,
            index,
            available: pool.len(),
        })
}
