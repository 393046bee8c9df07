//! Perception side of Sightline: capability handles, HTTP-backed detector and
//! OCR backends, and the coordinate normalizer that reconciles their output.

pub mod capability;
pub mod detector;
pub mod normalize;
pub mod ocr;
mod remote;

pub use capability::{CapabilityHandle, CapabilityRegistry, CapabilityState};
pub use detector::HttpObjectDetector;
pub use normalize::{infer_coordinate_space, normalize, normalize_all, NormalizedBatch};
pub use ocr::HttpTextRecognizer;
