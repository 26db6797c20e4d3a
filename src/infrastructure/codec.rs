//! Image codec: decode, trim, resize, composite and DDS block compression
//!
//! Opaque results (a portrait on its own) are stored as DXT3, layered
//! results (portrait over an event background) as DXT5.

#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_sign_loss)]

use image::{DynamicImage, RgbaImage, imageops, imageops::FilterType};
use texpresso::{Format, Params};
use thiserror::Error;

/// Tolerated share (in percent) of non-background pixels in a trimmed border line
pub const BACKGROUND_TRIM_PERCENT: f32 = 0.5;

const DDS_MAGIC: &[u8; 4] = b"DDS ";
const DDS_HEADER_SIZE: u32 = 124;
const DDS_PIXELFORMAT_SIZE: u32 = 32;
// CAPS | HEIGHT | WIDTH | PIXELFORMAT | LINEARSIZE
const DDSD_FLAGS: u32 = 0x0008_1007;
const DDPF_FOURCC: u32 = 0x4;
const DDSCAPS_TEXTURE: u32 = 0x1000;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("failed to decode image: {0}")]
    Decode(#[from] image::ImageError),

    #[error("failed to encode texture: {0}")]
    Encode(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureFormat {
    /// Foreground-only output
    Dxt3,
    /// Composited output with translucent edges
    Dxt5,
}

impl TextureFormat {
    const fn block_format(self) -> Format {
        match self {
            Self::Dxt3 => Format::Bc2,
            Self::Dxt5 => Format::Bc3,
        }
    }

    const fn four_cc(self) -> &'static [u8; 4] {
        match self {
            Self::Dxt3 => b"DXT3",
            Self::Dxt5 => b"DXT5",
        }
    }
}

pub trait ImageCodec: Send + Sync {
    fn decode(&self, bytes: &[u8]) -> Result<DynamicImage, CodecError>;
    fn trim(&self, image: DynamicImage, percent: f32) -> DynamicImage;
    fn resize(&self, image: &DynamicImage, width: u32, height: u32) -> DynamicImage;
    /// Draws `front` over `back` at the origin
    fn composite(&self, back: DynamicImage, front: &DynamicImage) -> DynamicImage;
    fn encode(&self, image: &DynamicImage, format: TextureFormat) -> Result<Vec<u8>, CodecError>;

    /// Full pipeline for one card: composite when a background is present,
    /// otherwise encode the portrait alone.
    fn render(&self, foreground: &[u8], background: Option<&[u8]>) -> Result<Vec<u8>, CodecError> {
        let front = self.decode(foreground)?;
        match background {
            Some(bytes) => {
                let back = self.trim(self.decode(bytes)?, BACKGROUND_TRIM_PERCENT);
                let back = self.resize(&back, front.width(), front.height());
                let layered = self.composite(back, &front);
                self.encode(&layered, TextureFormat::Dxt5)
            }
            None => self.encode(&front, TextureFormat::Dxt3),
        }
    }
}

/// `image` + `texpresso` codec producing DDS files
#[derive(Debug, Default, Clone, Copy)]
pub struct DdsCodec;

impl ImageCodec for DdsCodec {
    fn decode(&self, bytes: &[u8]) -> Result<DynamicImage, CodecError> {
        Ok(image::load_from_memory(bytes)?)
    }

    fn trim(&self, image: DynamicImage, percent: f32) -> DynamicImage {
        let rgba = image.to_rgba8();
        match trim_bounds(&rgba, percent) {
            Some((left, top, width, height)) => image.crop_imm(left, top, width, height),
            None => image,
        }
    }

    fn resize(&self, image: &DynamicImage, width: u32, height: u32) -> DynamicImage {
        if image.width() == width && image.height() == height {
            return image.clone();
        }
        image.resize_exact(width, height, FilterType::Lanczos3)
    }

    fn composite(&self, back: DynamicImage, front: &DynamicImage) -> DynamicImage {
        let mut base = back.to_rgba8();
        imageops::overlay(&mut base, &front.to_rgba8(), 0, 0);
        DynamicImage::ImageRgba8(base)
    }

    fn encode(&self, image: &DynamicImage, format: TextureFormat) -> Result<Vec<u8>, CodecError> {
        let rgba = image.to_rgba8();
        let (width, height) = rgba.dimensions();
        if width == 0 || height == 0 {
            return Err(CodecError::Encode("image has no pixels".to_string()));
        }

        let block_format = format.block_format();
        let linear_size = block_format.compressed_size(width as usize, height as usize);
        let mut blocks = vec![0_u8; linear_size];
        block_format.compress(
            rgba.as_raw(),
            width as usize,
            height as usize,
            Params::default(),
            &mut blocks,
        );

        let mut out = dds_header(width, height, linear_size as u32, format);
        out.extend_from_slice(&blocks);
        Ok(out)
    }
}

/// Crop rectangle `(left, top, width, height)` after removing border lines
/// that are (nearly) all background. The top-left pixel defines the
/// background colour; fully transparent pixels always count as background.
/// Returns `None` when nothing would remain.
fn trim_bounds(rgba: &RgbaImage, percent: f32) -> Option<(u32, u32, u32, u32)> {
    let (width, height) = rgba.dimensions();
    if width == 0 || height == 0 {
        return None;
    }

    let background = *rgba.get_pixel(0, 0);
    let is_background = |x: u32, y: u32| {
        let pixel = rgba.get_pixel(x, y);
        *pixel == background || pixel[3] == 0
    };
    let tolerated = |len: u32| (len as f32 * percent / 100.0).floor() as usize;

    let (mut left, mut top, mut right, mut bottom) = (0, 0, width, height);

    let row_is_border = |y: u32, left: u32, right: u32| {
        (left..right).filter(|&x| !is_background(x, y)).count() <= tolerated(right - left)
    };
    let column_is_border = |x: u32, top: u32, bottom: u32| {
        (top..bottom).filter(|&y| !is_background(x, y)).count() <= tolerated(bottom - top)
    };

    while top < bottom && row_is_border(top, left, right) {
        top += 1;
    }
    while bottom > top && row_is_border(bottom - 1, left, right) {
        bottom -= 1;
    }
    if top == bottom {
        return None;
    }
    while left < right && column_is_border(left, top, bottom) {
        left += 1;
    }
    while right > left && column_is_border(right - 1, top, bottom) {
        right -= 1;
    }
    if left == right {
        return None;
    }

    Some((left, top, right - left, bottom - top))
}

fn dds_header(width: u32, height: u32, linear_size: u32, format: TextureFormat) -> Vec<u8> {
    let mut header = Vec::with_capacity(128);
    header.extend_from_slice(DDS_MAGIC);

    for value in [DDS_HEADER_SIZE, DDSD_FLAGS, height, width, linear_size] {
        push_u32(&mut header, value);
    }
    // depth, mipmap count, 11 reserved
    for _ in 0..13 {
        push_u32(&mut header, 0);
    }

    push_u32(&mut header, DDS_PIXELFORMAT_SIZE);
    push_u32(&mut header, DDPF_FOURCC);
    header.extend_from_slice(format.four_cc());
    // bit count and channel masks are unused with a FourCC
    for _ in 0..5 {
        push_u32(&mut header, 0);
    }

    push_u32(&mut header, DDSCAPS_TEXTURE);
    // caps2, caps3, caps4, reserved2
    for _ in 0..4 {
        push_u32(&mut header, 0);
    }

    header
}

fn push_u32(buffer: &mut Vec<u8>, value: u32) {
    buffer.extend_from_slice(&value.to_le_bytes());
}
