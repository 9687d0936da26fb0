use image::{imageops, RgbImage};

use crate::bbox::{BBox, Ltrb};

/// A decoded video frame and its position in the sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub index: usize,
    pub image: RgbImage,
}

impl Frame {
    #[inline]
    pub fn new(index: usize, image: RgbImage) -> Self {
        Self { index, image }
    }

    #[inline]
    pub fn dims(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Copies the pixels under `bbox`, clamped to the image. `None` for an empty region.
    pub fn crop(&self, bbox: &BBox<Ltrb>) -> Option<RgbImage> {
        let (w, h) = self.dims();
        let b = bbox.clip(w, h);

        let x = b.left().floor() as u32;
        let y = b.top().floor() as u32;
        let cw = (b.right().ceil() as u32).saturating_sub(x);
        let ch = (b.bottom().ceil() as u32).saturating_sub(y);

        if cw == 0 || ch == 0 {
            return None;
        }

        Some(imageops::crop_imm(&self.image, x, y, cw, ch).to_image())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn crop_is_clamped() {
        let frame = Frame::new(0, RgbImage::from_pixel(20, 10, Rgb([1, 2, 3])));

        let crop = frame.crop(&BBox::ltrb(15.0, -4.0, 40.0, 6.0)).unwrap();
        assert_eq!(crop.dimensions(), (5, 6));

        assert!(frame.crop(&BBox::ltrb(30.0, 0.0, 40.0, 5.0)).is_none());
    }
}
