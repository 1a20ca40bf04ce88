//! MTL parser: `newmtl`, `Ka`, `Kd`, `Ks`, `Ns`, `map_Kd`.
//!
//! Materials are keyed by their `newmtl` name. Diffuse maps are decoded and
//! uploaded while the file is scanned, through a [`TextureLoader`], so the
//! finished table already carries live texture handles.

use std::{
    collections::HashMap,
    fs::File,
    io::{self, BufRead, BufReader},
    path::{Path, PathBuf},
    str::SplitWhitespace,
};

use corelib::handles::TextureId;

/// Diffuse maps are decoded without an alpha channel.
const DIFFUSE_MAP_HAS_ALPHA: bool = false;

/// Decodes and uploads textures on behalf of the parser.
pub trait TextureLoader {
    /// Decode `path` and upload it. `None` means the failure was already
    /// reported and the material stays untextured.
    fn load_texture(&mut self, path: &Path, has_alpha: bool) -> Option<TextureId>;

    /// Free a texture previously returned by [`TextureLoader::load_texture`].
    fn release_texture(&mut self, id: TextureId);
}

/// Phong material with at most one diffuse texture.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Material {
    /// Name from `newmtl`; also the table key.
    pub name: String,
    pub ambient: [f32; 3],
    pub diffuse: [f32; 3],
    pub specular: [f32; 3],
    pub shininess: f32,
    /// `map_Kd` filename as written in the file.
    pub diffuse_texture: Option<String>,
    /// Uploaded diffuse map, when decoding succeeded.
    pub texture: Option<TextureId>,
}

/// Material name -> material.
#[derive(Clone, Debug, Default)]
pub struct MaterialTable {
    materials: HashMap<String, Material>,
}

impl MaterialTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load an MTL file. An unopenable file is not an error: it is logged and
    /// yields an empty table, since a mesh without materials still renders.
    pub fn load(
        path: impl AsRef<Path>,
        images_dir: &Path,
        textures: &mut dyn TextureLoader,
    ) -> Self {
        let path = path.as_ref();
        match File::open(path) {
            Ok(file) => {
                let table = Self::parse(
                    BufReader::new(file),
                    &path.display().to_string(),
                    images_dir,
                    textures,
                );
                log::info!("Loaded MTL {}: {} material(s)", path.display(), table.len());
                table
            }
            Err(e) => {
                log::warn!("Failed to open MTL file {}: {}", path.display(), e);
                Self::new()
            }
        }
    }

    /// Parse MTL text from any reader. `source_name` only labels log output.
    pub fn parse<R: BufRead>(
        reader: R,
        source_name: &str,
        images_dir: &Path,
        textures: &mut dyn TextureLoader,
    ) -> Self {
        let mut table = Self::new();
        let mut current = Material::default();

        for (line_no, line) in reader.lines().enumerate() {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    log::warn!("{}:{}: stopped reading MTL: {}", source_name, line_no + 1, e);
                    break;
                }
            };
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            let mut tokens = trimmed.split_whitespace();
            let Some(tag) = tokens.next() else {
                continue;
            };
            let skip = |what: &str| {
                log::warn!(
                    "{}:{}: ignoring malformed '{}' line '{}'",
                    source_name,
                    line_no + 1,
                    what,
                    trimmed
                );
            };

            match tag {
                "newmtl" => {
                    let finished = std::mem::take(&mut current);
                    table.commit(finished, textures);
                    current.name = tokens.next().unwrap_or_default().to_owned();
                }
                "Ka" => match parse_rgb(&mut tokens) {
                    Some(rgb) => current.ambient = rgb,
                    None => skip("Ka"),
                },
                "Kd" => match parse_rgb(&mut tokens) {
                    Some(rgb) => current.diffuse = rgb,
                    None => skip("Kd"),
                },
                "Ks" => match parse_rgb(&mut tokens) {
                    Some(rgb) => current.specular = rgb,
                    None => skip("Ks"),
                },
                "Ns" => match tokens.next().and_then(|t| t.parse::<f32>().ok()) {
                    Some(ns) => current.shininess = ns,
                    None => skip("Ns"),
                },
                "map_Kd" => match tokens.next() {
                    Some(file) => {
                        if let Some(old) = current.texture.take() {
                            textures.release_texture(old);
                        }
                        let image_path = resolve_image_path(images_dir, file);
                        current.diffuse_texture = Some(file.to_owned());
                        current.texture = textures.load_texture(&image_path, DIFFUSE_MAP_HAS_ALPHA);
                    }
                    None => skip("map_Kd"),
                },
                _ => {
                    // Ignore other directives (d/illum/map_Bump/etc.)
                }
            }
        }

        table.commit(current, textures);
        table
    }

    /// Store a finished material. Nameless materials are dropped; a repeated
    /// name replaces the earlier entry. Either way no texture is leaked.
    fn commit(&mut self, material: Material, textures: &mut dyn TextureLoader) {
        if material.name.is_empty() {
            if let Some(id) = material.texture {
                textures.release_texture(id);
            }
            return;
        }

        if let Some(old) = self.materials.insert(material.name.clone(), material) {
            log::warn!(
                "Material '{}' defined more than once; keeping the last definition",
                old.name
            );
            if let Some(id) = old.texture {
                textures.release_texture(id);
            }
        }
    }

    #[inline]
    pub fn get(&self, name: &str) -> Option<&Material> {
        self.materials.get(name)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.materials.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Material)> {
        self.materials.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Release every texture and empty the table.
    pub fn release_textures(&mut self, textures: &mut dyn TextureLoader) {
        for (_, material) in self.materials.drain() {
            if let Some(id) = material.texture {
                textures.release_texture(id);
            }
        }
    }
}

fn parse_rgb(tokens: &mut SplitWhitespace<'_>) -> Option<[f32; 3]> {
    let mut out = [0.0f32; 3];
    for slot in &mut out {
        *slot = tokens.next()?.parse().ok()?;
    }
    Some(out)
}

fn resolve_image_path(images_dir: &Path, file: &str) -> PathBuf {
    images_dir.join(file)
}

/// Parse MTL text held in memory; mostly useful for tests and tooling.
pub fn parse_mtl_str(
    contents: &str,
    images_dir: &Path,
    textures: &mut dyn TextureLoader,
) -> MaterialTable {
    MaterialTable::parse(io::Cursor::new(contents), "<memory>", images_dir, textures)
}
