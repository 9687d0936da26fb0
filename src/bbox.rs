use serde_derive::{Deserialize, Serialize};
use std::marker::PhantomData;

pub trait BBoxFormat: std::fmt::Debug + Copy + PartialEq {}

/// Left-top-right-bottom format, the pixel corners `x1, y1, x2, y2`
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Ltrb;
impl BBoxFormat for Ltrb {}

/// X-y-aspect_ratio-height format, contains coordinates of the center of bbox and aspect_ratio-height
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Xyah;
impl BBoxFormat for Xyah {}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(transparent, bound = "")]
pub struct BBox<F: BBoxFormat> {
    coords: [f32; 4],
    #[serde(skip)]
    format: PhantomData<F>,
}

impl<F: BBoxFormat> From<BBox<F>> for [f32; 4] {
    fn from(bbox: BBox<F>) -> Self {
        bbox.coords
    }
}

impl<F: BBoxFormat> BBox<F> {
    #[inline(always)]
    fn raw(coords: [f32; 4]) -> Self {
        BBox {
            coords,
            format: PhantomData,
        }
    }

    #[inline]
    pub fn as_slice(&self) -> &[f32; 4] {
        &self.coords
    }

    #[inline]
    pub fn is_finite(&self) -> bool {
        self.coords.iter().all(|v| v.is_finite())
    }
}

impl BBox<Ltrb> {
    #[inline]
    pub fn ltrb(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self::raw([x1, y1, x2, y2])
    }

    #[inline(always)]
    pub fn left(&self) -> f32 {
        self.coords[0]
    }

    #[inline(always)]
    pub fn top(&self) -> f32 {
        self.coords[1]
    }

    #[inline(always)]
    pub fn right(&self) -> f32 {
        self.coords[2]
    }

    #[inline(always)]
    pub fn bottom(&self) -> f32 {
        self.coords[3]
    }

    #[inline]
    pub fn width(&self) -> f32 {
        self.right() - self.left()
    }

    #[inline]
    pub fn height(&self) -> f32 {
        self.bottom() - self.top()
    }

    #[inline]
    pub fn area(&self) -> f32 {
        self.width().max(0.0) * self.height().max(0.0)
    }

    /// Geometric center of the box.
    #[inline]
    pub fn center(&self) -> (f32, f32) {
        (
            (self.left() + self.right()) / 2.0,
            (self.top() + self.bottom()) / 2.0,
        )
    }

    /// Bottom-center of the box, where a standing person touches the pitch.
    #[inline]
    pub fn foot(&self) -> (f32, f32) {
        ((self.left() + self.right()) / 2.0, self.bottom())
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.is_finite() && self.right() > self.left() && self.bottom() > self.top()
    }

    pub fn iou(&self, other: &BBox<Ltrb>) -> f32 {
        let i_l = self.left().max(other.left());
        let i_t = self.top().max(other.top());
        let i_r = self.right().min(other.right());
        let i_b = self.bottom().min(other.bottom());

        let inter = (i_r - i_l).max(0.0) * (i_b - i_t).max(0.0);
        let union = self.area() + other.area() - inter;

        if union <= 0.0 {
            0.0
        } else {
            inter / union
        }
    }

    /// Clamps the corners into a `width` x `height` image.
    pub fn clip(&self, width: u32, height: u32) -> Self {
        let (w, h) = (width as f32, height as f32);

        Self::ltrb(
            self.left().clamp(0.0, w),
            self.top().clamp(0.0, h),
            self.right().clamp(0.0, w),
            self.bottom().clamp(0.0, h),
        )
    }

    #[inline]
    pub fn as_xyah(&self) -> BBox<Xyah> {
        self.into()
    }
}

impl BBox<Xyah> {
    #[inline]
    pub fn xyah(cx: f32, cy: f32, aspect_ratio: f32, height: f32) -> Self {
        Self::raw([cx, cy, aspect_ratio, height])
    }

    #[inline(always)]
    pub fn as_ltrb(&self) -> BBox<Ltrb> {
        self.into()
    }

    #[inline(always)]
    pub fn cx(&self) -> f32 {
        self.coords[0]
    }

    #[inline(always)]
    pub fn cy(&self) -> f32 {
        self.coords[1]
    }

    #[inline(always)]
    pub fn aspect_ratio(&self) -> f32 {
        self.coords[2]
    }

    #[inline(always)]
    pub fn height(&self) -> f32 {
        self.coords[3]
    }
}

impl<'a> From<&'a BBox<Ltrb>> for BBox<Xyah> {
    #[inline]
    fn from(v: &'a BBox<Ltrb>) -> Self {
        let (cx, cy) = v.center();
        let h = v.height();
        let a = if h.abs() > f32::EPSILON { v.width() / h } else { 0.0 };

        Self::raw([cx, cy, a, h])
    }
}

impl<'a> From<&'a BBox<Xyah>> for BBox<Ltrb> {
    #[inline]
    fn from(v: &'a BBox<Xyah>) -> Self {
        let half_w = v.aspect_ratio() * v.height() / 2.0;
        let half_h = v.height() / 2.0;

        Self::raw([
            v.cx() - half_w,
            v.cy() - half_h,
            v.cx() + half_w,
            v.cy() + half_h,
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn anchors() {
        let b = BBox::ltrb(100.0, 100.0, 140.0, 180.0);
        assert_eq!(b.center(), (120.0, 140.0));
        assert_eq!(b.foot(), (120.0, 180.0));
    }

    #[test]
    fn xyah_conversion_keeps_corners() {
        let b = BBox::ltrb(10.0, 20.0, 30.0, 60.0);
        let back = b.as_xyah().as_ltrb();

        for (l, r) in b.as_slice().iter().zip(back.as_slice()) {
            assert_abs_diff_eq!(l, r, epsilon = 1e-4);
        }
    }

    #[test]
    fn iou_overlap() {
        let a = BBox::ltrb(0.0, 0.0, 10.0, 10.0);
        let b = BBox::ltrb(5.0, 0.0, 15.0, 10.0);

        assert_abs_diff_eq!(a.iou(&b), 50.0 / 150.0, epsilon = 1e-6);
        assert_eq!(a.iou(&BBox::ltrb(20.0, 20.0, 30.0, 30.0)), 0.0);
        assert_abs_diff_eq!(a.iou(&a), 1.0);
    }

    #[test]
    fn clip_into_image() {
        let b = BBox::ltrb(-5.0, 10.0, 700.0, 500.0).clip(640, 480);
        assert_eq!(b.as_slice(), &[0.0, 10.0, 640.0, 480.0]);
    }
}
