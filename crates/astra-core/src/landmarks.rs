//! Hand-landmark wire model.
//!
//! The tracking service emits one JSON message per processed video frame:
//! `{"landmarks": [{"x": f, "y": f, "z": f}, ...]}` with up to
//! [`HAND_LANDMARK_COUNT`] points, or an empty list when no hand was detected.
//! The relay forwards these payloads verbatim — this typed model exists for
//! the boundary contract and for tests, not for a re-serialization hop.

use serde::{Deserialize, Serialize};

/// Number of keypoints the tracking model reports per detected hand.
pub const HAND_LANDMARK_COUNT: usize = 21;

/// One normalized keypoint. Coordinates are in `[0, 1]` image space; `z` is
/// depth relative to the wrist, with no absolute unit.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LandmarkPoint {
    /// Normalized horizontal position.
    pub x: f64,
    /// Normalized vertical position.
    pub y: f64,
    /// Relative depth.
    pub z: f64,
}

/// Per-frame tracking result.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LandmarkFrame {
    /// Detected keypoints, or empty when no hand is present.
    pub landmarks: Vec<LandmarkPoint>,
}

impl LandmarkFrame {
    /// A frame with no detection.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Whether this frame carries no detection.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.landmarks.is_empty()
    }

    /// Parse a frame from its wire form.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_frame() -> LandmarkFrame {
        LandmarkFrame {
            landmarks: (0..HAND_LANDMARK_COUNT)
                .map(|i| LandmarkPoint {
                    x: f64::from(u32::try_from(i).unwrap()) / 21.0,
                    y: 0.5,
                    z: 0.0,
                })
                .collect(),
        }
    }

    #[test]
    fn empty_frame_serializes_to_empty_list() {
        let json = serde_json::to_string(&LandmarkFrame::empty()).unwrap();
        assert_eq!(json, r#"{"landmarks":[]}"#);
    }

    #[test]
    fn parses_the_tracking_service_wire_shape() {
        let frame =
            LandmarkFrame::from_json(r#"{"landmarks":[{"x":0.5,"y":0.5,"z":0.0}]}"#).unwrap();
        assert_eq!(frame.landmarks.len(), 1);
        assert!((frame.landmarks[0].x - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn full_hand_has_twenty_one_points() {
        let frame = full_frame();
        assert_eq!(frame.landmarks.len(), HAND_LANDMARK_COUNT);
        assert!(!frame.is_empty());
    }

    #[test]
    fn malformed_payload_is_an_error() {
        assert!(LandmarkFrame::from_json("not json").is_err());
        assert!(LandmarkFrame::from_json(r#"{"landmarks":"nope"}"#).is_err());
    }

    #[test]
    fn roundtrip_preserves_points() {
        let frame = full_frame();
        let json = serde_json::to_string(&frame).unwrap();
        let back = LandmarkFrame::from_json(&json).unwrap();
        assert_eq!(back, frame);
    }
}
