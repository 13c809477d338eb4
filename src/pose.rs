use crate::{error::Error, point::Point};
use ndarray::{ArrayView1, ArrayView2, Axis};
use num_traits::ToPrimitive;

/// COCO body keypoint layout. Discriminants are the indices the keypoint
/// provider emits, so the order here must never change.
#[derive(Debug, Copy, Clone, PartialEq, Eq, num_derive::FromPrimitive, num_derive::ToPrimitive)]
pub enum KeypointKind {
    Nose,
    LeftEye,
    RightEye,
    LeftEar,
    RightEar,
    LeftShoulder,
    RightShoulder,
    LeftElbow,
    RightElbow,
    LeftWrist,
    RightWrist,
    LeftHip,
    RightHip,
    LeftKnee,
    RightKnee,
    LeftAnkle,
    RightAnkle,
}

impl KeypointKind {
    pub fn idx(self) -> Result<usize, Error> {
        self.to_usize().ok_or(Error::KeypointVariantToUSize(self))
    }
}

pub const NUM_BODY_KEYPOINTS: usize = 17;
pub const NUM_HAND_KEYPOINTS: usize = 21;

#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct Keypoint {
    pub point: Point,
    pub score: f32,
}

/// One detected body or hand: keypoints in provider order with their
/// confidences. Bodies carry 17 points, hands 21.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Detection {
    pub keypoints: Vec<Keypoint>,
}

impl Detection {
    pub fn new(keypoints: Vec<Keypoint>) -> Self {
        Self { keypoints }
    }

    /// Build a detection from an `(n, 2)` array of `(x, y)` positions and a
    /// parallel array of `n` confidences.
    pub fn from_arrays(points: ArrayView2<f32>, scores: ArrayView1<f32>) -> Result<Self, Error> {
        let (rows, cols) = points.dim();
        if cols != 2 {
            return Err(Error::KeypointArrayShape(points.shape().to_vec()));
        }
        if rows != scores.len() {
            return Err(Error::ConfidenceCount(rows, scores.len()));
        }

        let keypoints = points
            .axis_iter(Axis(0))
            .zip(scores.iter())
            .map(|(xy, &score)| {
                Ok(Keypoint {
                    point: Point::new(xy[0], xy[1])?,
                    score,
                })
            })
            .collect::<Result<Vec<_>, Error>>()?;

        Ok(Self { keypoints })
    }

    pub fn len(&self) -> usize {
        self.keypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keypoints.is_empty()
    }

    pub fn point(&self, index: usize) -> Result<Point, Error> {
        self.keypoints
            .get(index)
            .map(|keypoint| keypoint.point)
            .ok_or_else(|| Error::MissingKeypoint(index, self.keypoints.len()))
    }

    pub fn body_point(&self, kind: KeypointKind) -> Result<Point, Error> {
        self.point(kind.idx()?)
    }

    /// Confidence at `index`; a keypoint the provider did not emit has zero
    /// confidence.
    pub fn confidence(&self, index: usize) -> f32 {
        self.keypoints
            .get(index)
            .map_or(0.0, |keypoint| keypoint.score)
    }

    pub fn mean_confidence(&self) -> Result<f32, Error> {
        if self.keypoints.is_empty() {
            return Ok(0.0);
        }
        let total: f32 = self.keypoints.iter().map(|keypoint| keypoint.score).sum();
        Ok(total / self.keypoints.len().to_f32().ok_or(Error::ConvertToF32)?)
    }
}

pub mod constants {
    use crate::pose::KeypointKind::{self, *};

    pub const FACE: [KeypointKind; 5] = [Nose, LeftEye, RightEye, LeftEar, RightEar];

    pub const ARMS: [KeypointKind; 6] = [
        LeftShoulder,
        RightShoulder,
        LeftElbow,
        RightElbow,
        LeftWrist,
        RightWrist,
    ];

    pub const TORSO_AND_WRISTS: [KeypointKind; 6] = [
        LeftShoulder,
        RightShoulder,
        LeftWrist,
        RightWrist,
        LeftHip,
        RightHip,
    ];

    pub const LEFT_SIDE: [KeypointKind; 6] =
        [LeftShoulder, LeftElbow, LeftWrist, LeftHip, LeftKnee, LeftAnkle];

    pub const RIGHT_SIDE: [KeypointKind; 6] = [
        RightShoulder,
        RightElbow,
        RightWrist,
        RightHip,
        RightKnee,
        RightAnkle,
    ];

    /// Torso outline in winding order.
    pub const TORSO: [KeypointKind; 4] = [LeftHip, RightHip, RightShoulder, LeftShoulder];

    /// Hand keypoint index ranges: wrist is 0, then four joints per finger
    /// from thumb to pinky, base to tip.
    pub const FINGERS: [std::ops::Range<usize>; 5] = [1..5, 5..9, 9..13, 13..17, 17..21];
}
