//! Two-phase image decode: probe the header, then decode at a sample factor.
//!
//! The probe never allocates a pixel buffer. Only once the dimensions are
//! known does the decoder decide whether the image is oversized for its
//! target, ask the sampler for a factor, and decode the pixels.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::{ImageFormat, ImageReader, Limits, RgbaImage};

use crate::debug::dbg_log;
use crate::error::{DecodeError, DecodeFailure};
use crate::sampler::compute_sample_factor;

/// A request to show one image file at a given size. Immutable.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ImageRequest {
    path: PathBuf,
    target_width: u32,
    target_height: u32,
}

impl ImageRequest {
    pub fn new(path: impl Into<PathBuf>, target_width: u32, target_height: u32) -> Self {
        ImageRequest {
            path: path.into(),
            target_width,
            target_height,
        }
    }

    /// Request for a square grid cell.
    pub fn square(path: impl Into<PathBuf>, size: u32) -> Self {
        Self::new(path, size, size)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn target_width(&self) -> u32 {
        self.target_width
    }

    pub fn target_height(&self) -> u32 {
        self.target_height
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Dimensions { width, height }
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Decoded RGBA pixels plus what was known about the source.
#[derive(Clone, Debug)]
pub struct DecodedImage {
    pub pixels: RgbaImage,
    /// Dimensions reported by the header probe.
    pub source: Dimensions,
    /// Sample factor the pixels were decoded with (1 = full size).
    pub sample: u32,
}

impl DecodedImage {
    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn dimensions(&self) -> Dimensions {
        Dimensions::new(self.width(), self.height())
    }
}

/// Header probe and sampled decode for one image source.
///
/// Implementations must not materialise a full-resolution buffer in
/// `probe`. `decode` receives the power-of-two factor chosen by the
/// sampler; 1 means full size.
pub trait Codec: Send + Sync {
    fn probe(&self, path: &Path) -> Result<Dimensions, DecodeError>;
    fn decode(&self, path: &Path, sample: u32) -> Result<RgbaImage, DecodeError>;
}

/// `sw * sh > scale_factor * tw * th`
pub fn is_oversized(source: Dimensions, target_w: u32, target_h: u32, scale_factor: u32) -> bool {
    // three u32 factors need up to 96 bits
    let target = scale_factor as u128 * target_w as u128 * target_h as u128;
    source.area() as u128 > target
}

/// Outcome of the probe phase: what the decode phase is going to do.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DecodePlan {
    pub source: Dimensions,
    pub oversized: bool,
    pub sample: u32,
}

pub struct Decoder {
    codec: Arc<dyn Codec>,
    scale_factor: u32,
}

impl Decoder {
    pub fn new(codec: Arc<dyn Codec>) -> Self {
        Decoder {
            codec,
            scale_factor: 1,
        }
    }

    /// Decoder backed by the on-disk [`FileCodec`].
    pub fn for_files() -> Self {
        Self::new(Arc::new(FileCodec))
    }

    pub fn with_scale_factor(mut self, scale_factor: u32) -> Self {
        self.scale_factor = scale_factor.max(1);
        self
    }

    pub fn scale_factor(&self) -> u32 {
        self.scale_factor
    }

    pub fn codec(&self) -> &Arc<dyn Codec> {
        &self.codec
    }

    /// Phase one: probe dimensions and pick the sample factor.
    pub fn plan(&self, request: &ImageRequest) -> Result<DecodePlan, DecodeError> {
        let (tw, th) = (request.target_width(), request.target_height());
        let source = self.codec.probe(request.path())?;
        let oversized = is_oversized(source, tw, th, self.scale_factor);
        let sample = if oversized {
            compute_sample_factor(source.width, source.height, tw, th)
        } else {
            1
        };
        dbg_log!(
            "plan {}: {}x{} -> {}x{} oversized={} sample={}",
            request.path().display(),
            source.width,
            source.height,
            tw,
            th,
            oversized,
            sample
        );
        Ok(DecodePlan {
            source,
            oversized,
            sample,
        })
    }

    /// Probe, then decode at the planned sample factor.
    pub fn decode(&self, request: &ImageRequest) -> Result<DecodedImage, DecodeError> {
        let plan = self.plan(request)?;
        let pixels = self.codec.decode(request.path(), plan.sample)?;
        if pixels.width() == 0 || pixels.height() == 0 {
            return Err(DecodeError::new(
                DecodeFailure::Empty,
                request.path(),
                "decode produced no pixels",
            ));
        }
        Ok(DecodedImage {
            pixels,
            source: plan.source,
            sample: plan.sample,
        })
    }
}

// ── File codec ──────────────────────────────────────────────────────────

/// Codec for image files on disk, built on the `image` crate.
///
/// JPEG sources are scaled in the DCT domain by `jpeg-decoder` (down to
/// 1/8) so the full-resolution buffer is never allocated; any factor left
/// over, and every other format, is reduced after decode. Full-size decodes
/// are capped at [`MAX_DECODE_ALLOC`] bytes; larger images fail as
/// `Unsupported`.
#[derive(Clone, Copy, Debug, Default)]
pub struct FileCodec;

impl FileCodec {
    fn open(path: &Path) -> Result<ImageReader<BufReader<File>>, DecodeError> {
        let unreadable = |e: std::io::Error| DecodeError::new(DecodeFailure::Unreadable, path, e.to_string());
        let mut reader = ImageReader::open(path)
            .map_err(unreadable)?
            .with_guessed_format()
            .map_err(unreadable)?;

        // Magic bytes first, extension as a fallback (TGA has no signature)
        if reader.format().is_none() {
            match ImageFormat::from_path(path) {
                Ok(fmt) => reader.set_format(fmt),
                Err(_) => {
                    return Err(DecodeError::new(
                        DecodeFailure::Unreadable,
                        path,
                        "not a recognised image",
                    ))
                }
            }
        }
        Ok(reader)
    }
}

impl Codec for FileCodec {
    fn probe(&self, path: &Path) -> Result<Dimensions, DecodeError> {
        let (w, h) = Self::open(path)?
            .into_dimensions()
            .map_err(|e| DecodeError::from_image(path, e))?;
        Ok(Dimensions::new(w, h))
    }

    fn decode(&self, path: &Path, sample: u32) -> Result<RgbaImage, DecodeError> {
        decode_limited(path, sample, MAX_DECODE_ALLOC)
    }
}

/// Allocation cap for formats decoded at full size before reduction.
pub const MAX_DECODE_ALLOC: u64 = 256 * 1024 * 1024;

fn decode_limited(path: &Path, sample: u32, max_alloc: u64) -> Result<RgbaImage, DecodeError> {
    let mut reader = FileCodec::open(path)?;
    if sample > 1 && reader.format() == Some(ImageFormat::Jpeg) {
        return decode_jpeg_scaled(path, sample);
    }
    let mut limits = Limits::default();
    limits.max_alloc = Some(max_alloc);
    reader.limits(limits);
    let img = reader.decode().map_err(|e| DecodeError::from_image(path, e))?;
    Ok(reduce(img.into_rgba8(), sample))
}

fn sampled_size(size: u32, sample: u32) -> u32 {
    (size / sample.max(1)).max(1)
}

/// Box-filter an already decoded image down by `sample`.
fn reduce(pixels: RgbaImage, sample: u32) -> RgbaImage {
    if sample <= 1 || pixels.width() == 0 || pixels.height() == 0 {
        return pixels;
    }
    let w = sampled_size(pixels.width(), sample);
    let h = sampled_size(pixels.height(), sample);
    image::imageops::thumbnail(&pixels, w, h)
}

fn decode_jpeg_scaled(path: &Path, sample: u32) -> Result<RgbaImage, DecodeError> {
    let file = File::open(path)
        .map_err(|e| DecodeError::new(DecodeFailure::Unreadable, path, e.to_string()))?;
    let mut decoder = jpeg_decoder::Decoder::new(BufReader::new(file));
    decoder
        .read_info()
        .map_err(|e| DecodeError::from_jpeg(path, e))?;
    let info = decoder
        .info()
        .ok_or_else(|| DecodeError::new(DecodeFailure::Corrupt, path, "missing frame header"))?;

    let want_w = sampled_size(info.width as u32, sample);
    let want_h = sampled_size(info.height as u32, sample);
    // jpeg-decoder picks the smallest of 1/1..1/8 that is still >= the request
    let (w, h) = decoder
        .scale(want_w as u16, want_h as u16)
        .map_err(|e| DecodeError::from_jpeg(path, e))?;
    let data = decoder
        .decode()
        .map_err(|e| DecodeError::from_jpeg(path, e))?;
    dbg_log!(
        "jpeg {}: {}x{} scaled to {}x{} (want {}x{})",
        path.display(),
        info.width,
        info.height,
        w,
        h,
        want_w,
        want_h
    );

    let rgba = jpeg_to_rgba(path, info.pixel_format, w as u32, h as u32, data)?;
    if rgba.width() > want_w || rgba.height() > want_h {
        Ok(image::imageops::thumbnail(&rgba, want_w, want_h))
    } else {
        Ok(rgba)
    }
}

fn jpeg_to_rgba(
    path: &Path,
    format: jpeg_decoder::PixelFormat,
    width: u32,
    height: u32,
    data: Vec<u8>,
) -> Result<RgbaImage, DecodeError> {
    use jpeg_decoder::PixelFormat;

    let pixels = width as usize * height as usize;
    let bpp = match format {
        PixelFormat::L8 => 1,
        PixelFormat::L16 => 2,
        PixelFormat::RGB24 => 3,
        PixelFormat::CMYK32 => 4,
    };
    if data.len() < pixels * bpp {
        return Err(DecodeError::new(
            DecodeFailure::Corrupt,
            path,
            format!("short pixel data: {} < {}", data.len(), pixels * bpp),
        ));
    }

    let mut rgba = Vec::with_capacity(pixels * 4);
    for px in data.chunks_exact(bpp).take(pixels) {
        match format {
            // L16 is big-endian; keep the high byte
            PixelFormat::L8 | PixelFormat::L16 => rgba.extend_from_slice(&[px[0], px[0], px[0], 255]),
            PixelFormat::RGB24 => rgba.extend_from_slice(&[px[0], px[1], px[2], 255]),
            PixelFormat::CMYK32 => {
                let k = 255 - px[3] as u16;
                let ch = |c: u8| ((255 - c as u16) * k / 255) as u8;
                rgba.extend_from_slice(&[ch(px[0]), ch(px[1]), ch(px[2]), 255]);
            }
        }
    }

    RgbaImage::from_raw(width, height, rgba)
        .ok_or_else(|| DecodeError::new(DecodeFailure::Corrupt, path, "pixel buffer size mismatch"))
}
