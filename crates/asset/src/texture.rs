//! Texture loading and data structures.
//! Decodes to RGB8 or RGBA8 depending on an explicit alpha flag.

use std::path::Path;

use image::{ImageBuffer, Rgb, Rgba, imageops::FilterType};

use crate::error::{AssetError, AssetResult};

/// Texture data in CPU-friendly format before GPU upload.
#[derive(Clone, Debug)]
pub struct TextureData {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
}

/// Supported texture formats.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextureFormat {
    Rgb8,
    Rgba8,
}

impl TextureFormat {
    #[inline]
    pub fn bytes_per_pixel(self) -> u32 {
        match self {
            TextureFormat::Rgb8 => 3,
            TextureFormat::Rgba8 => 4,
        }
    }
}

impl TextureData {
    pub fn new(width: u32, height: u32, format: TextureFormat, data: Vec<u8>) -> Self {
        debug_assert_eq!(
            Some(data.len()),
            byte_len(width, height, format),
            "Data size doesn't match {width}x{height} {format:?}"
        );
        Self {
            data,
            width,
            height,
            format,
        }
    }

    /// A single-colour RGBA8 texture. Left empty, and so invalid, when the
    /// size does not fit in memory.
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let pixels = byte_len(width, height, TextureFormat::Rgba8).map_or(0, |len| len / 4);
        Self {
            data: rgba.repeat(pixels),
            width,
            height,
            format: TextureFormat::Rgba8,
        }
    }

    /// Decode an image file. The channel layout comes from `has_alpha`, not
    /// from the file: `false` drops alpha, `true` adds an opaque one if missing.
    pub fn load<P: AsRef<Path>>(path: P, has_alpha: bool) -> AssetResult<Self> {
        let path = path.as_ref();
        log::debug!("Loading texture from {:?} (alpha={})", path, has_alpha);

        let img = image::open(path).map_err(|source| AssetError::TextureDecode {
            path: path.to_path_buf(),
            source,
        })?;

        let texture = if has_alpha {
            let rgba = img.to_rgba8();
            let (width, height) = rgba.dimensions();
            Self::new(width, height, TextureFormat::Rgba8, rgba.into_raw())
        } else {
            let rgb = img.to_rgb8();
            let (width, height) = rgb.dimensions();
            Self::new(width, height, TextureFormat::Rgb8, rgb.into_raw())
        };

        log::info!(
            "Loaded texture {:?}: {}x{} {:?}",
            path,
            texture.width,
            texture.height,
            texture.format
        );
        Ok(texture)
    }

    #[inline]
    pub fn bytes_per_pixel(&self) -> u32 {
        self.format.bytes_per_pixel()
    }

    /// Byte length implied by the dimensions and format, `None` on overflow.
    pub fn expected_len(&self) -> Option<usize> {
        byte_len(self.width, self.height, self.format)
    }

    /// Non-empty, and the pixel buffer length agrees with the dimensions.
    pub fn is_valid(&self) -> bool {
        self.width > 0 && self.height > 0 && self.expected_len() == Some(self.data.len())
    }

    /// Same pixels as RGBA8; RGB input gets an opaque alpha channel.
    pub fn to_rgba8(&self) -> TextureData {
        match self.format {
            TextureFormat::Rgba8 => self.clone(),
            TextureFormat::Rgb8 => {
                let data = self
                    .data
                    .chunks_exact(3)
                    .flat_map(|px| [px[0], px[1], px[2], 255])
                    .collect();
                Self::new(self.width, self.height, TextureFormat::Rgba8, data)
            }
        }
    }

    /// Number of levels in a full mip chain down to 1x1.
    pub fn mip_level_count(&self) -> u32 {
        32 - self.width.max(self.height).max(1).leading_zeros()
    }

    /// Full mip chain (level 0 first), each level half the previous.
    /// Empty if the data is invalid.
    pub fn mip_chain(&self) -> Vec<TextureData> {
        if !self.is_valid() {
            return Vec::new();
        }
        let mut levels = Vec::with_capacity(self.mip_level_count() as usize);
        levels.push(self.clone());
        let (mut w, mut h) = (self.width, self.height);
        while w > 1 || h > 1 {
            w = (w / 2).max(1);
            h = (h / 2).max(1);
            match self.resized(w, h) {
                Some(level) => levels.push(level),
                None => break,
            }
        }
        levels
    }

    fn resized(&self, width: u32, height: u32) -> Option<TextureData> {
        let data = match self.format {
            TextureFormat::Rgb8 => {
                let img: ImageBuffer<Rgb<u8>, _> =
                    ImageBuffer::from_raw(self.width, self.height, self.data.as_slice())?;
                image::imageops::resize(&img, width, height, FilterType::Triangle).into_raw()
            }
            TextureFormat::Rgba8 => {
                let img: ImageBuffer<Rgba<u8>, _> =
                    ImageBuffer::from_raw(self.width, self.height, self.data.as_slice())?;
                image::imageops::resize(&img, width, height, FilterType::Triangle).into_raw()
            }
        };
        Some(Self::new(width, height, self.format, data))
    }
}

fn byte_len(width: u32, height: u32, format: TextureFormat) -> Option<usize> {
    (width as usize)
        .checked_mul(height as usize)?
        .checked_mul(format.bytes_per_pixel() as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn solid_texture_is_valid() {
        let tex = TextureData::solid(16, 4, [10, 20, 30, 255]);
        assert!(tex.is_valid());
        assert_eq!(tex.format, TextureFormat::Rgba8);
        assert_eq!(tex.data.len(), 16 * 4 * 4);
        assert_eq!(&tex.data[60..64], &[10, 20, 30, 255]);
    }

    #[test]
    fn oversized_dimensions_are_invalid_instead_of_wrapping() {
        // 65536 * 65536 * 4 wraps to 0 in u32 arithmetic.
        let tex = TextureData {
            data: Vec::new(),
            width: 65_536,
            height: 65_536,
            format: TextureFormat::Rgba8,
        };
        assert_eq!(tex.expected_len(), Some(65_536 * 65_536 * 4));
        assert!(!tex.is_valid());
        assert!(byte_len(u32::MAX, u32::MAX, TextureFormat::Rgba8).is_none());
    }

    #[test]
    fn empty_or_short_data_is_invalid() {
        let empty = TextureData {
            data: Vec::new(),
            width: 0,
            height: 3,
            format: TextureFormat::Rgb8,
        };
        assert!(!empty.is_valid());
        let short = TextureData {
            data: vec![0; 5],
            width: 2,
            height: 1,
            format: TextureFormat::Rgb8,
        };
        assert!(!short.is_valid());
    }

    #[test]
    fn rgb_expands_to_opaque_rgba() {
        let tex = TextureData::new(2, 1, TextureFormat::Rgb8, vec![1, 2, 3, 4, 5, 6]);
        let rgba = tex.to_rgba8();
        assert_eq!(rgba.format, TextureFormat::Rgba8);
        assert_eq!(rgba.data, vec![1, 2, 3, 255, 4, 5, 6, 255]);
        assert!(rgba.is_valid());
    }

    #[test]
    fn mip_chain_halves_down_to_one_pixel() {
        let tex = TextureData::new(8, 2, TextureFormat::Rgb8, vec![200; 8 * 2 * 3]);
        assert_eq!(tex.mip_level_count(), 4);
        let dims: Vec<(u32, u32)> = tex.mip_chain().iter().map(|l| (l.width, l.height)).collect();
        assert_eq!(dims, vec![(8, 2), (4, 1), (2, 1), (1, 1)]);
        assert!(tex.mip_chain().iter().all(TextureData::is_valid));
    }

    #[test]
    fn missing_image_is_a_decode_error() {
        let err = TextureData::load("no/such/image.png", false).expect_err("missing");
        assert!(matches!(err, AssetError::TextureDecode { .. }));
    }
}
