//! Coordinate normalization.
//!
//! Perception backends disagree on coordinate conventions: some report
//! absolute pixels, some fractions of the image, some thousandths. Everything
//! is mapped into absolute pixels of the active image before it is stored,
//! rendered, or described to the model.

use sightline_core::{
    BoundingBox, CoordinateSpace, DegenerateBoxError, Detection, ImageDimensions,
    NormalizedDetection,
};
use tracing::{debug, warn};

/// Boxes whose largest coordinate does not exceed this are guessed to be `[0, 1]` fractions.
///
/// Best-effort only: a genuine pixel box hugging the origin (e.g. `[0, 0, 1, 1]`)
/// is misread as covering the whole image. Producers should declare their space.
pub const UNIT_RANGE_CEILING: f64 = 1.0 + 1e-6;

/// Guess the coordinate space of a box from an undeclared producer.
///
/// Values up to ~1.0 are read as `Normalized01`, anything larger as
/// `Normalized0To1000`. Pixel-absolute is never inferred.
pub fn infer_coordinate_space(bbox: &BoundingBox) -> CoordinateSpace {
    if bbox.max_coordinate() <= UNIT_RANGE_CEILING {
        CoordinateSpace::Normalized01
    } else {
        CoordinateSpace::Normalized0To1000
    }
}

/// Map a detection into pixel space of an image of the given size.
///
/// Coordinates are clamped to `[0, dimension]`; a box with no remaining area
/// is rejected.
pub fn normalize(
    detection: &Detection,
    dims: ImageDimensions,
) -> Result<NormalizedDetection, DegenerateBoxError> {
    let raw = detection.bbox;
    let degenerate = |bbox| DegenerateBoxError {
        label: detection.label.clone(),
        bbox,
    };

    if !raw.is_finite() {
        return Err(degenerate(raw));
    }

    let space = match detection.coordinate_space {
        Some(space) => space,
        None => {
            let guessed = infer_coordinate_space(&raw);
            warn!(
                label = %detection.label,
                guessed = %guessed,
                "Detection has no declared coordinate space; inferring"
            );
            guessed
        }
    };

    let (width, height) = (dims.width as f64, dims.height as f64);
    let scaled = match space.full_scale() {
        None => raw,
        Some(full) => BoundingBox::new(
            raw.xmin / full * width,
            raw.ymin / full * height,
            raw.xmax / full * width,
            raw.ymax / full * height,
        ),
    };

    let clamped = BoundingBox::new(
        scaled.xmin.clamp(0.0, width),
        scaled.ymin.clamp(0.0, height),
        scaled.xmax.clamp(0.0, width),
        scaled.ymax.clamp(0.0, height),
    );

    if clamped.xmax <= clamped.xmin || clamped.ymax <= clamped.ymin {
        return Err(degenerate(clamped));
    }

    Ok(NormalizedDetection {
        label: detection.label.clone(),
        confidence: detection.confidence,
        bbox: clamped,
        kind: detection.kind,
        image: dims,
    })
}

/// Outcome of normalizing a batch: usable boxes plus the ones that were dropped.
#[derive(Debug, Default)]
pub struct NormalizedBatch {
    pub detections: Vec<NormalizedDetection>,
    pub dropped: Vec<DegenerateBoxError>,
}

/// Normalize a batch, dropping degenerate boxes. Drops are logged, never fatal.
pub fn normalize_all(detections: &[Detection], dims: ImageDimensions) -> NormalizedBatch {
    let mut batch = NormalizedBatch::default();
    for detection in detections {
        match normalize(detection, dims) {
            Ok(normalized) => batch.detections.push(normalized),
            Err(err) => {
                debug!(error = %err, image = %dims, "Dropping degenerate box");
                batch.dropped.push(err);
            }
        }
    }
    if !batch.dropped.is_empty() {
        warn!(dropped = batch.dropped.len(), kept = batch.detections.len(), "Dropped degenerate boxes");
    }
    batch
}

#[cfg(test)]
mod tests {
    use super::*;
    use sightline_core::DetectionKind;

    fn bx(xmin: f64, ymin: f64, xmax: f64, ymax: f64) -> BoundingBox {
        BoundingBox::new(xmin, ymin, xmax, ymax)
    }

    #[test]
    fn test_unit_space_scales_by_dimensions() {
        let d = Detection::object("cat", bx(0.5, 0.5, 1.0, 1.0), CoordinateSpace::Normalized01);
        let n = normalize(&d, ImageDimensions::new(800, 600)).unwrap();
        assert_eq!(n.bbox, bx(400.0, 300.0, 800.0, 600.0));
        assert_eq!(n.coordinate_space(), CoordinateSpace::PixelAbsolute);
    }

    // Each axis scales by its own dimension: x by the 1000 px width, y by the
    // 500 px height. A non-square image therefore does not yield a square box.
    #[test]
    fn test_thousandths_space_divides_first() {
        let d = Detection::object("cat", bx(0.0, 0.0, 500.0, 500.0), CoordinateSpace::Normalized0To1000);
        let n = normalize(&d, ImageDimensions::new(1000, 500)).unwrap();
        assert_eq!(n.bbox, bx(0.0, 0.0, 500.0, 250.0));
    }

    #[test]
    fn test_thousandths_space_on_square_image() {
        let d = Detection::object("cat", bx(0.0, 0.0, 500.0, 500.0), CoordinateSpace::Normalized0To1000);
        let n = normalize(&d, ImageDimensions::new(500, 500)).unwrap();
        assert_eq!(n.bbox, bx(0.0, 0.0, 250.0, 250.0));
    }

    #[test]
    fn test_pixel_space_passes_through() {
        let d = Detection::text("EXIT", bx(12.0, 40.0, 96.0, 64.0), CoordinateSpace::PixelAbsolute)
            .with_confidence(0.8);
        let n = normalize(&d, ImageDimensions::new(640, 480)).unwrap();
        assert_eq!(n.bbox, d.bbox);
        assert_eq!(n.kind, DetectionKind::Text);
        assert_eq!(n.confidence, Some(0.8));
    }

    #[test]
    fn test_normalization_is_idempotent() {
        let dims = ImageDimensions::new(800, 600);
        let inputs = [
            Detection::object("a", bx(0.1, 0.2, 0.7, 0.9), CoordinateSpace::Normalized01),
            Detection::object("b", bx(100.0, 50.0, 900.0, 999.0), CoordinateSpace::Normalized0To1000),
            Detection::object("c", bx(-20.0, 10.0, 1200.0, 580.0), CoordinateSpace::PixelAbsolute),
        ];
        for d in inputs {
            let once = normalize(&d, dims).unwrap();
            let twice = normalize(&once.to_detection(), dims).unwrap();
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn test_out_of_range_values_are_clamped() {
        let d = Detection::object("wide", bx(-0.2, -5.0, 1.3, 0.5), CoordinateSpace::Normalized01);
        let n = normalize(&d, ImageDimensions::new(100, 100)).unwrap();
        assert_eq!(n.bbox, bx(0.0, 0.0, 100.0, 50.0));
    }

    #[test]
    fn test_degenerate_after_clamping_is_rejected() {
        let dims = ImageDimensions::new(100, 100);
        let outside = Detection::object("ghost", bx(120.0, 10.0, 150.0, 20.0), CoordinateSpace::PixelAbsolute);
        assert!(normalize(&outside, dims).is_err());

        let flat = Detection::object("line", bx(10.0, 10.0, 50.0, 10.0), CoordinateSpace::PixelAbsolute);
        let err = normalize(&flat, dims).unwrap_err();
        assert_eq!(err.label, "line");

        let inverted = Detection::object("inv", bx(50.0, 10.0, 10.0, 40.0), CoordinateSpace::PixelAbsolute);
        assert!(normalize(&inverted, dims).is_err());
    }

    #[test]
    fn test_non_finite_box_is_rejected() {
        let d = Detection::object("nan", bx(f64::NAN, 0.0, 1.0, 1.0), CoordinateSpace::Normalized01);
        assert!(normalize(&d, ImageDimensions::new(10, 10)).is_err());
    }

    #[test]
    fn test_undeclared_small_values_are_read_as_unit_space() {
        let d = Detection::object("cup", bx(0.25, 0.25, 0.75, 1.0), CoordinateSpace::PixelAbsolute).undeclared();
        let n = normalize(&d, ImageDimensions::new(400, 200)).unwrap();
        assert_eq!(n.bbox, bx(100.0, 50.0, 300.0, 200.0));
    }

    #[test]
    fn test_undeclared_large_values_are_read_as_thousandths() {
        let d = Detection::object("cup", bx(250.0, 500.0, 750.0, 1000.0), CoordinateSpace::PixelAbsolute).undeclared();
        let n = normalize(&d, ImageDimensions::new(400, 200)).unwrap();
        assert_eq!(n.bbox, bx(100.0, 100.0, 300.0, 200.0));
        assert_eq!(infer_coordinate_space(&d.bbox), CoordinateSpace::Normalized0To1000);
    }

    /// Known accuracy risk: a tiny pixel box at the origin from an undeclared
    /// producer is guessed to be fractional and blown up to the full image.
    #[test]
    fn test_undeclared_tiny_pixel_box_is_misread() {
        let d = Detection::object("dot", bx(0.0, 0.0, 1.0, 1.0), CoordinateSpace::PixelAbsolute).undeclared();
        let n = normalize(&d, ImageDimensions::new(640, 480)).unwrap();
        assert_eq!(n.bbox, bx(0.0, 0.0, 640.0, 480.0));

        let declared = Detection::object("dot", bx(0.0, 0.0, 1.0, 1.0), CoordinateSpace::PixelAbsolute);
        let n = normalize(&declared, ImageDimensions::new(640, 480)).unwrap();
        assert_eq!(n.bbox, bx(0.0, 0.0, 1.0, 1.0));
    }

    #[test]
    fn test_normalize_all_keeps_order_and_counts_drops() {
        let dims = ImageDimensions::new(200, 100);
        let batch = normalize_all(
            &[
                Detection::object("first", bx(0.0, 0.0, 0.5, 0.5), CoordinateSpace::Normalized01),
                Detection::object("bad", bx(0.5, 0.5, 0.5, 0.9), CoordinateSpace::Normalized01),
                Detection::object("second", bx(0.5, 0.5, 1.0, 1.0), CoordinateSpace::Normalized01),
            ],
            dims,
        );
        let labels: Vec<_> = batch.detections.iter().map(|d| d.label.as_str()).collect();
        assert_eq!(labels, vec!["first", "second"]);
        assert_eq!(batch.dropped.len(), 1);
    }
}
