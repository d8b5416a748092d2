use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle in original-image pixel coordinates.
///
/// Width and height are never negative; constructors clamp them to zero.
#[derive(Default, Debug, Clone, Copy, PartialEq, Serialize, Deserialize, PartialOrd)]
pub struct GradeBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub w: f32,
    pub h: f32,
}

impl GradeBox {
    pub fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self::default().with_x1y1_wh(x, y, w, h)
    }

    /// Box covering a whole `width` x `height` image.
    pub fn full_frame(width: u32, height: u32) -> Self {
        Self::new(0., 0., width as f32, height as f32)
    }

    /// Returns the width of the bounding box.
    pub fn width(&self) -> f32 {
        self.w
    }

    /// Returns the height of the bounding box.
    pub fn height(&self) -> f32 {
        self.h
    }

    pub fn x_max(&self) -> f32 {
        self.x1 + self.w
    }

    pub fn y_max(&self) -> f32 {
        self.y1 + self.h
    }

    /// Returns the center coordinates of the bounding box.
    pub fn center(&self) -> (f32, f32) {
        (self.x1 + self.w / 2., self.y1 + self.h / 2.)
    }

    /// Returns the bounding box coordinates and size as `(x, y, w, h)`.
    pub fn xy1_wh(&self) -> (f32, f32, f32, f32) {
        (self.x1, self.y1, self.w, self.h)
    }

    /// Computes the area of the bounding box.
    pub fn area(&self) -> f32 {
        self.h * self.w
    }

    /// Computes the intersection area between this bounding box and another.
    pub fn intersect(&self, other: &GradeBox) -> f32 {
        let left = self.x1.max(other.x1);
        let right = self.x_max().min(other.x_max());
        let top = self.y1.max(other.y1);
        let bottom = self.y_max().min(other.y_max());
        (right - left).max(0.) * (bottom - top).max(0.)
    }

    /// Share of this box's own area covered by `other`.
    ///
    /// Unlike IoU this is asymmetric: a small box sitting inside a large one is
    /// fully covered, the large one only marginally.
    pub fn covered_by(&self, other: &GradeBox) -> f32 {
        let area = self.area();
        if area <= 0. {
            return 0.;
        }
        self.intersect(other) / area
    }

    /// Intersects the box with the `width` x `height` image frame.
    pub fn clamp_to(&self, width: u32, height: u32) -> GradeBox {
        let x1 = self.x1.clamp(0., width as f32);
        let y1 = self.y1.clamp(0., height as f32);
        let x2 = self.x_max().clamp(0., width as f32);
        let y2 = self.y_max().clamp(0., height as f32);
        GradeBox::default().with_x1y1_x2y2(x1, y1, x2, y2)
    }

    /// Integer pixel rectangle `(x, y, w, h)` enclosing the box, bounded by the
    /// image frame. Returns `None` when nothing of the box lies inside the frame.
    pub fn pixel_rect(&self, width: u32, height: u32) -> Option<(u32, u32, u32, u32)> {
        let clamped = self.clamp_to(width, height);
        let x1 = clamped.x1.floor() as u32;
        let y1 = clamped.y1.floor() as u32;
        let x2 = (clamped.x2.ceil() as u32).min(width);
        let y2 = (clamped.y2.ceil() as u32).min(height);
        if x2 <= x1 || y2 <= y1 {
            return None;
        }
        Some((x1, y1, x2 - x1, y2 - y1))
    }

    /// Sets the bounding box's coordinates using `(x1, y1, x2, y2)` and calculates width and height.
    pub fn with_x1y1_x2y2(mut self, x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        self.x1 = x1;
        self.y1 = y1;
        self.x2 = x2.max(x1);
        self.y2 = y2.max(y1);

        self.w = self.x2 - x1;
        self.h = self.y2 - y1;
        self
    }

    /// Sets the bounding box's coordinates and dimensions using `(x, y, w, h)`.
    ///
    /// # Arguments
    ///
    /// * `x` - The x-coordinate of the top-left corner.
    /// * `y` - The y-coordinate of the top-left corner.
    /// * `w` - The width of the bounding box.
    /// * `h` - The height of the bounding box.
    pub fn with_x1y1_wh(mut self, x: f32, y: f32, w: f32, h: f32) -> Self {
        self.x1 = x;
        self.y1 = y;
        self.w = w.max(0.);
        self.h = h.max(0.);

        self.x2 = x + self.w;
        self.y2 = y + self.h;
        self
    }

    /// Sets the bounding box's coordinates and dimensions using `(cx, cy, w, h)`.
    pub fn with_cxcy_wh(self, cx: f32, cy: f32, w: f32, h: f32) -> Self {
        self.with_x1y1_wh(cx - w / 2.0, cy - h / 2.0, w, h)
    }
}
