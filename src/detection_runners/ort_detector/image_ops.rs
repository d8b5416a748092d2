//! Functions to preprocess images into model input tensors.

use fast_image_resize::{
    images::{CroppedImageMut, Image as FirImage},
    pixels::PixelType,
    FilterType, ResizeAlg, ResizeOptions, Resizer,
};
use image::RgbImage;
use ndarray::Array;
use serde::{Deserialize, Serialize};
use crate::common::GradeError;
use crate::detection_runners::input_wrapper::X;

/// How an image is brought to a model's square input size.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResizeMode {
    /// Stretch to the target size, ignoring aspect ratio.
    #[default]
    FitExact,
    /// Aspect-preserving resize, centred on a padded canvas.
    Letterbox,
}

/// A letterboxed canvas plus the parameters mapping it back to the source.
#[derive(Debug, Clone)]
pub struct Letterbox {
    pub image: RgbImage,
    pub scale: f32,
    pub pad_x: u32,
    pub pad_y: u32,
}

impl Letterbox {
    /// Maps a canvas point back into source-image coordinates.
    pub fn to_source(&self, x: f32, y: f32) -> (f32, f32) {
        ((x - self.pad_x as f32) / self.scale, (y - self.pad_y as f32) / self.scale)
    }

    /// Maps a source-image point onto the canvas.
    pub fn to_canvas(&self, x: f32, y: f32) -> (f32, f32) {
        (x * self.scale + self.pad_x as f32, y * self.scale + self.pad_y as f32)
    }
}

fn resize_options() -> ResizeOptions {
    ResizeOptions::new().resize_alg(ResizeAlg::Convolution(FilterType::Bilinear))
}

fn resize_error(err: impl std::fmt::Display) -> GradeError {
    GradeError::InvalidInput(format!("image resize failed: {err}"))
}

pub fn to_fir_image<'a>(image: &RgbImage) -> Result<FirImage<'a>, GradeError> {
    let (width, height) = image.dimensions();
    FirImage::from_vec_u8(width, height, image.as_raw().clone(), PixelType::U8x3).map_err(resize_error)
}

fn from_fir_image(image: FirImage) -> Result<RgbImage, GradeError> {
    let (width, height) = (image.width(), image.height());
    RgbImage::from_raw(width, height, image.into_vec())
        .ok_or_else(|| resize_error("pixel buffer does not match its dimensions"))
}

fn ensure_extent(image: &RgbImage) -> Result<(), GradeError> {
    let (w, h) = image.dimensions();
    if w == 0 || h == 0 {
        return Err(GradeError::InvalidInput(format!("cannot resize an empty {w}x{h} image")));
    }
    Ok(())
}

/// Computes `(scale, new_w, new_h, pad_x, pad_y)` for fitting `width` x `height`
/// into a `size` x `size` canvas.
pub fn letterbox_params(width: u32, height: u32, size: u32) -> (f32, u32, u32, u32, u32) {
    let scale = (size as f32 / width as f32).min(size as f32 / height as f32);
    let new_w = ((width as f32 * scale).round() as u32).clamp(1, size);
    let new_h = ((height as f32 * scale).round() as u32).clamp(1, size);
    (scale, new_w, new_h, (size - new_w) / 2, (size - new_h) / 2)
}

/// Resizes `image` into a `size` x `size` canvas filled with `bg`, keeping the
/// aspect ratio and centring the picture.
pub fn letterbox(image: &RgbImage, size: u32, bg: u8) -> Result<Letterbox, GradeError> {
    ensure_extent(image)?;
    if size == 0 {
        return Err(GradeError::InvalidInput("letterbox target size is zero".to_string()));
    }
    let (scale, new_w, new_h, pad_x, pad_y) = letterbox_params(image.width(), image.height(), size);

    let src = to_fir_image(image)?;
    let mut padded = FirImage::from_vec_u8(
        size,
        size,
        vec![bg; (size * size * 3) as usize],
        PixelType::U8x3,
    ).map_err(resize_error)?;

    {
        let mut cropped = CroppedImageMut::new(&mut padded, pad_x, pad_y, new_w, new_h).map_err(resize_error)?;
        Resizer::new().resize(&src, &mut cropped, &resize_options()).map_err(resize_error)?;
    }

    Ok(Letterbox {
        image: from_fir_image(padded)?,
        scale,
        pad_x,
        pad_y,
    })
}

/// Stretches `image` to `size` x `size`.
pub fn resize_exact(image: &RgbImage, size: u32) -> Result<RgbImage, GradeError> {
    ensure_extent(image)?;
    if image.width() == size && image.height() == size {
        return Ok(image.clone());
    }
    let src = to_fir_image(image)?;
    let mut dst = FirImage::new(size, size, PixelType::U8x3);
    Resizer::new().resize(&src, &mut dst, &resize_options()).map_err(resize_error)?;
    from_fir_image(dst)
}

/// Encodes an RGB image as a `(1, 3, H, W)` tensor of `channel / 255`.
pub fn encode_tensor(image: &RgbImage) -> X {
    let (w, h) = (image.width() as usize, image.height() as usize);
    let mut input = Array::<f32, _>::zeros((1, 3, h, w));

    for (x, y, pixel) in image.enumerate_pixels() {
        let (x, y) = (x as usize, y as usize);
        let [r, g, b] = pixel.0;
        input[[0, 0, y, x]] = r as f32 / 255.;
        input[[0, 1, y, x]] = g as f32 / 255.;
        input[[0, 2, y, x]] = b as f32 / 255.;
    }

    X::from(input.into_dyn())
}
