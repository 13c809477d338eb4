//! Decides which checks are meaningful for a detection, based on which
//! keypoints were found with enough confidence.

use crate::{
    error::Error,
    evaluator::CheckKind,
    pose::{
        constants::{ARMS, LEFT_SIDE, RIGHT_SIDE, TORSO_AND_WRISTS},
        Detection, KeypointKind,
    },
};
use bitvec::{bitvec, vec::BitVec};

/// A keypoint counts as detected above this confidence.
pub const DETECTION_CONFIDENCE: f32 = 0.3;
/// Limb presence needs more than this many detected keypoints.
pub const MIN_DETECTED_FOR_LIMBS: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfidenceMask {
    bits: BitVec,
}

impl ConfidenceMask {
    pub fn new(detection: &Detection, threshold: f32) -> Self {
        let mut bits = bitvec![0; detection.len()];
        for (i, keypoint) in detection.keypoints.iter().enumerate() {
            bits.set(i, keypoint.score > threshold);
        }
        Self { bits }
    }

    pub fn detected(&self) -> usize {
        self.bits.count_ones()
    }

    pub fn indices(&self) -> Vec<usize> {
        self.bits.iter_ones().collect()
    }

    pub fn contains(&self, kind: KeypointKind) -> Result<bool, Error> {
        let index = kind.idx()?;
        Ok(self.bits.get(index).map_or(false, |bit| *bit))
    }

    pub fn all(&self, kinds: &[KeypointKind]) -> Result<bool, Error> {
        for &kind in kinds {
            if !self.contains(kind)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    pub fn any(&self, kinds: &[KeypointKind]) -> Result<bool, Error> {
        for &kind in kinds {
            if self.contains(kind)? {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

/// Whether `check` should run given the detected body keypoints and the
/// number of detected hands.
pub fn applicable(check: CheckKind, mask: &ConfidenceMask, hands: usize) -> Result<bool, Error> {
    match check {
        CheckKind::LimbPresence => Ok(mask.detected() > MIN_DETECTED_FOR_LIMBS),
        CheckKind::Proportions | CheckKind::JointAngles => mask.all(&ARMS),
        CheckKind::NoSelfIntersection => mask.all(&TORSO_AND_WRISTS),
        CheckKind::Symmetry => Ok(mask.any(&LEFT_SIDE)? && mask.any(&RIGHT_SIDE)?),
        CheckKind::HandIntegrity => Ok(hands > 0),
    }
}
