use std::sync::Arc;
use image::{DynamicImage, GrayImage, RgbImage, RgbaImage};
use crate::common::{GradeBox, GradeError};

/// Read-only RGB photograph handed to the pipeline.
///
/// Cloning is cheap: the pixel buffer is shared, so every model pass of one
/// analysis reads the same image without copying it.
#[derive(Debug, Clone)]
pub struct GradeImage {
    image: Arc<RgbImage>,
}

impl std::ops::Deref for GradeImage {
    type Target = RgbImage;

    fn deref(&self) -> &Self::Target {
        &self.image
    }
}

impl From<DynamicImage> for GradeImage {
    fn from(image: DynamicImage) -> Self {
        Self::new(image.to_rgb8())
    }
}

impl From<GrayImage> for GradeImage {
    fn from(image: GrayImage) -> Self {
        Self::new(DynamicImage::from(image).to_rgb8())
    }
}

impl From<RgbImage> for GradeImage {
    fn from(image: RgbImage) -> Self {
        Self::new(image)
    }
}

impl From<RgbaImage> for GradeImage {
    fn from(image: RgbaImage) -> Self {
        Self::new(DynamicImage::from(image).to_rgb8())
    }
}

impl GradeImage {
    pub fn new(image: RgbImage) -> Self {
        Self {
            image: Arc::new(image),
        }
    }

    pub fn open<P: AsRef<std::path::Path>>(path: P) -> anyhow::Result<Self> {
        Ok(Self::from(image::open(path)?))
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn frame(&self) -> GradeBox {
        GradeBox::full_frame(self.width(), self.height())
    }

    pub fn ensure_not_empty(&self) -> Result<(), GradeError> {
        let (w, h) = self.dimensions();
        if w == 0 || h == 0 {
            return Err(GradeError::InvalidInput(format!("image has zero extent ({w}x{h})")));
        }
        Ok(())
    }

    /// Copies out the pixels under `roi`, bounded by the image frame.
    ///
    /// Returns the crop and the integer origin of the crop in this image.
    pub fn crop(&self, roi: &GradeBox) -> Result<(RgbImage, (u32, u32)), GradeError> {
        let (x, y, w, h) = roi
            .pixel_rect(self.width(), self.height())
            .ok_or_else(|| GradeError::InvalidInput(format!(
                "region of interest {:?} has no area inside the {}x{} image",
                roi.xy1_wh(), self.width(), self.height()
            )))?;
        let cropped = image::imageops::crop_imm(self.image.as_ref(), x, y, w, h).to_image();
        Ok((cropped, (x, y)))
    }

    /// Shared handle to the pixel buffer.
    pub fn shared(&self) -> Arc<RgbImage> {
        Arc::clone(&self.image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn crop_is_bounded_by_frame() {
        let img = GradeImage::new(RgbImage::from_pixel(40, 30, Rgb([1, 2, 3])));
        let (crop, origin) = img.crop(&GradeBox::new(30., 20., 50., 50.)).unwrap();
        assert_eq!(crop.dimensions(), (10, 10));
        assert_eq!(origin, (30, 20));
    }

    #[test]
    fn crop_outside_frame_is_invalid() {
        let img = GradeImage::new(RgbImage::new(40, 30));
        let err = img.crop(&GradeBox::new(50., 50., 5., 5.)).unwrap_err();
        assert!(matches!(err, GradeError::InvalidInput(_)));
    }

    #[test]
    fn empty_image_is_rejected() {
        let img = GradeImage::new(RgbImage::new(0, 10));
        assert!(img.ensure_not_empty().is_err());
    }
}
