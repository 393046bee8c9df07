use serde::{Deserialize, Serialize};

/// The convention a bounding box's coordinates are expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CoordinateSpace {
    /// Absolute pixels on the source image.
    #[serde(rename = "pixel_absolute", alias = "pixelAbsolute", alias = "pixel")]
    PixelAbsolute,
    /// Fractions of the image size in `[0, 1]`.
    #[serde(rename = "normalized_0_1", alias = "normalized01")]
    Normalized01,
    /// Thousandths of the image size in `[0, 1000]`.
    #[serde(rename = "normalized_0_1000", alias = "normalized0To1000")]
    Normalized0To1000,
}

impl CoordinateSpace {
    /// Value that maps this space onto `[0, 1]` by division. `None` for pixels.
    pub fn full_scale(self) -> Option<f64> {
        match self {
            CoordinateSpace::PixelAbsolute => None,
            CoordinateSpace::Normalized01 => Some(1.0),
            CoordinateSpace::Normalized0To1000 => Some(1000.0),
        }
    }
}

impl std::fmt::Display for CoordinateSpace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CoordinateSpace::PixelAbsolute => "pixel_absolute",
            CoordinateSpace::Normalized01 => "normalized_0_1",
            CoordinateSpace::Normalized0To1000 => "normalized_0_1000",
        };
        f.write_str(s)
    }
}

/// Axis-aligned box, `min` corner inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub xmin: f64,
    pub ymin: f64,
    pub xmax: f64,
    pub ymax: f64,
}

impl BoundingBox {
    pub fn new(xmin: f64, ymin: f64, xmax: f64, ymax: f64) -> Self {
        Self { xmin, ymin, xmax, ymax }
    }

    pub fn width(&self) -> f64 {
        self.xmax - self.xmin
    }

    pub fn height(&self) -> f64 {
        self.ymax - self.ymin
    }

    /// Largest coordinate value, used when a producer did not declare its space.
    pub fn max_coordinate(&self) -> f64 {
        self.xmin.max(self.ymin).max(self.xmax).max(self.ymax)
    }

    pub fn is_finite(&self) -> bool {
        self.xmin.is_finite() && self.ymin.is_finite() && self.xmax.is_finite() && self.ymax.is_finite()
    }

    /// `[xmin, ymin, xmax, ymax]` rounded to whole pixels.
    pub fn rounded(&self) -> [i64; 4] {
        [
            self.xmin.round() as i64,
            self.ymin.round() as i64,
            self.xmax.round() as i64,
            self.ymax.round() as i64,
        ]
    }
}

/// Pixel dimensions of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageDimensions {
    pub width: u32,
    pub height: u32,
}

impl ImageDimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl std::fmt::Display for ImageDimensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}
