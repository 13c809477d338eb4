//! Geometric plausibility predicates over a single detection.
//!
//! Body checks index into a 17-point COCO detection and return an error when
//! a keypoint they need is absent; the evaluator turns such an error into a
//! terminal "could not evaluate" result. The hand check never errors: it is
//! fail-open and reports [`Verdict::Indeterminate`] instead.

use crate::{
    error::Error,
    point::Point,
    pose::{
        constants::{ARMS, FACE, FINGERS, TORSO},
        Detection,
        KeypointKind::{self, *},
    },
};
use tracing::{debug, warn};

/// Visible-face confidence above which a full upper body is expected.
pub const FACE_VISIBLE_CONFIDENCE: f32 = 0.5;
/// Confidence an arm keypoint needs to count as present.
pub const LIMB_CONFIDENCE: f32 = 0.3;
/// Exclusive bounds on upper-arm / forearm length ratio.
pub const ARM_RATIO_RANGE: (f32, f32) = (0.4, 2.5);
/// Exclusive bounds on the elbow angle, in degrees.
pub const ELBOW_ANGLE_RANGE: (f32, f32) = (20.0, 170.0);
/// Allowed left/right length ratio deviation from 1.0.
pub const SYMMETRY_TOLERANCE: f32 = 0.6;
/// Hands below this mean confidence are skipped.
pub const MIN_HAND_CONFIDENCE: f32 = 0.2;
/// Adjacent fingertips closer than this are fused.
pub const MIN_FINGERTIP_DISTANCE: f32 = 5.0;
/// Finger joint angles below this, in degrees, are collapsed.
pub const MIN_FINGER_JOINT_ANGLE: f32 = 10.0;

const ANGLE_EPSILON: f32 = 1e-6;
const BOUNDARY_EPSILON: f32 = 1e-4;

/// Outcome of one executed check.
///
/// `Indeterminate` means the check itself could not complete; it scores
/// like `Pass` so a broken check never blocks an otherwise acceptable image.
#[derive(Debug, Copy, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Pass,
    Fail,
    Indeterminate,
}

impl Verdict {
    pub fn passed(self) -> bool {
        !matches!(self, Self::Fail)
    }
}

impl From<bool> for Verdict {
    fn from(ok: bool) -> Self {
        if ok {
            Self::Pass
        } else {
            Self::Fail
        }
    }
}

/// Angle ABC in degrees, with `b` as the vertex.
pub fn angle(a: Point, b: Point, c: Point) -> f32 {
    let ba = a - b;
    let bc = c - b;
    let cosine = ba.dot(bc) / (ba.norm() * bc.norm() + ANGLE_EPSILON);
    cosine.clamp(-1.0, 1.0).acos().to_degrees()
}

fn within(value: f32, (low, high): (f32, f32)) -> bool {
    low < value && value < high
}

pub(crate) fn elbow_angle_in_range(degrees: f32) -> bool {
    within(degrees, ELBOW_ANGLE_RANGE)
}

fn segment(body: &Detection, from: KeypointKind, to: KeypointKind) -> Result<f32, Error> {
    Ok(body.body_point(from)?.distance(body.body_point(to)?))
}

/// When the face is clearly visible, both arms must be detected.
pub fn limb_presence(body: &Detection) -> Result<Verdict, Error> {
    let face_confidence = FACE
        .iter()
        .map(|kind| Ok(body.confidence(kind.idx()?)))
        .collect::<Result<Vec<_>, Error>>()?
        .into_iter()
        .fold(f32::NEG_INFINITY, f32::max);

    if face_confidence <= FACE_VISIBLE_CONFIDENCE {
        // close-up or cropped framing, limbs may legitimately be absent
        return Ok(Verdict::Pass);
    }

    for kind in ARMS {
        if body.confidence(kind.idx()?) <= LIMB_CONFIDENCE {
            return Ok(Verdict::Fail);
        }
    }
    Ok(Verdict::Pass)
}

fn arm_ratio_ok(upper: f32, lower: f32) -> bool {
    if lower == 0.0 {
        return false;
    }
    within(upper / lower, ARM_RATIO_RANGE)
}

/// Upper arm to forearm length ratio on both sides.
pub fn proportions(body: &Detection) -> Result<Verdict, Error> {
    let left = arm_ratio_ok(
        segment(body, LeftShoulder, LeftElbow)?,
        segment(body, LeftElbow, LeftWrist)?,
    );
    let right = arm_ratio_ok(
        segment(body, RightShoulder, RightElbow)?,
        segment(body, RightElbow, RightWrist)?,
    );
    Ok(Verdict::from(left && right))
}

/// Shoulder-elbow-wrist angle on both sides.
pub fn elbow_angles(body: &Detection) -> Result<Verdict, Error> {
    let left = angle(
        body.body_point(LeftShoulder)?,
        body.body_point(LeftElbow)?,
        body.body_point(LeftWrist)?,
    );
    let right = angle(
        body.body_point(RightShoulder)?,
        body.body_point(RightElbow)?,
        body.body_point(RightWrist)?,
    );
    debug!(left, right, "elbow angles");
    Ok(Verdict::from(
        elbow_angle_in_range(left) && elbow_angle_in_range(right),
    ))
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Containment {
    Inside,
    OnBoundary,
    Outside,
}

/// Even-odd point in polygon test; points on an edge are reported as such.
pub fn point_in_polygon(point: Point, polygon: &[Point]) -> Containment {
    let mut inside = false;
    let n = polygon.len();

    for i in 0..n {
        let a = polygon[i];
        let b = polygon[(i + 1) % n];
        let ab = b - a;
        let ap = point - a;
        let length_squared = ab.dot(ab);

        if length_squared == 0.0 {
            if ap.dot(ap) <= BOUNDARY_EPSILON * BOUNDARY_EPSILON {
                return Containment::OnBoundary;
            }
            continue;
        }

        let projection = ap.dot(ab);
        if ab.cross(ap).abs() / length_squared.sqrt() <= BOUNDARY_EPSILON
            && (0.0..=length_squared).contains(&projection)
        {
            return Containment::OnBoundary;
        }

        if (a.y() > point.y()) != (b.y() > point.y()) {
            let x_crossing = a.x() + (point.y() - a.y()) * ab.x() / ab.y();
            if point.x() < x_crossing {
                inside = !inside;
            }
        }
    }

    if inside {
        Containment::Inside
    } else {
        Containment::Outside
    }
}

/// Neither wrist may lie inside or on the torso outline.
pub fn no_self_intersection(body: &Detection) -> Result<Verdict, Error> {
    let torso = TORSO
        .iter()
        .map(|&kind| body.body_point(kind))
        .collect::<Result<Vec<_>, Error>>()?;

    for wrist in [LeftWrist, RightWrist] {
        let containment = point_in_polygon(body.body_point(wrist)?, &torso);
        if containment != Containment::Outside {
            debug!(?wrist, ?containment, "wrist intersects torso");
            return Ok(Verdict::Fail);
        }
    }
    Ok(Verdict::Pass)
}

fn similar(a: f32, b: f32) -> bool {
    if b == 0.0 {
        return false;
    }
    within(a / b, (1.0 - SYMMETRY_TOLERANCE, 1.0 + SYMMETRY_TOLERANCE))
}

/// Left and right upper arms, forearms and legs must have similar lengths.
pub fn symmetry(body: &Detection) -> Result<Verdict, Error> {
    let upper_arms = similar(
        segment(body, LeftShoulder, LeftElbow)?,
        segment(body, RightShoulder, RightElbow)?,
    );
    let forearms = similar(
        segment(body, LeftElbow, LeftWrist)?,
        segment(body, RightElbow, RightWrist)?,
    );
    let legs = similar(
        segment(body, LeftHip, LeftKnee)? + segment(body, LeftKnee, LeftAnkle)?,
        segment(body, RightHip, RightKnee)? + segment(body, RightKnee, RightAnkle)?,
    );
    Ok(Verdict::from(upper_arms && forearms && legs))
}

fn hand_is_intact(index: usize, hand: &Detection) -> Result<bool, Error> {
    let confidence = hand.mean_confidence()?;
    if confidence < MIN_HAND_CONFIDENCE {
        debug!(hand = index, confidence, "skipping low confidence hand");
        return Ok(true);
    }

    let fingers = FINGERS
        .iter()
        .map(|joints| {
            joints
                .clone()
                .map(|i| hand.point(i))
                .collect::<Result<Vec<_>, Error>>()
        })
        .collect::<Result<Vec<_>, Error>>()?;

    for (finger, pair) in fingers.windows(2).enumerate() {
        let (tip, next_tip) = (pair[0][3], pair[1][3]);
        if tip.distance(next_tip) < MIN_FINGERTIP_DISTANCE {
            debug!(hand = index, finger, "fused fingertips");
            return Ok(false);
        }
    }

    for (finger, joints) in fingers.iter().enumerate() {
        let first = angle(joints[0], joints[1], joints[2]);
        let second = angle(joints[1], joints[2], joints[3]);
        if first < MIN_FINGER_JOINT_ANGLE || second < MIN_FINGER_JOINT_ANGLE {
            debug!(hand = index, finger, first, second, "collapsed finger joint");
            return Ok(false);
        }
    }

    Ok(true)
}

/// Finger fusion and collapsed joints across every detected hand.
///
/// No hands is a pass. Any error while inspecting a hand yields
/// [`Verdict::Indeterminate`] rather than failing the image.
pub fn hand_integrity(hands: &[Detection]) -> Verdict {
    for (index, hand) in hands.iter().enumerate() {
        match hand_is_intact(index, hand) {
            Ok(true) => {}
            Ok(false) => return Verdict::Fail,
            Err(error) => {
                warn!(hand = index, %error, "hand integrity check could not complete");
                return Verdict::Indeterminate;
            }
        }
    }
    Verdict::Pass
}

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::{
        point::Point,
        pose::{Detection, Keypoint, KeypointKind, NUM_BODY_KEYPOINTS, NUM_HAND_KEYPOINTS},
    };

    /// A frontal, mirrored skeleton with relaxed arms hanging outside the torso.
    pub(crate) fn body() -> Detection {
        let coords: [(f32, f32); NUM_BODY_KEYPOINTS] = [
            (100.0, 40.0),  // nose
            (95.0, 35.0),   // left eye
            (105.0, 35.0),  // right eye
            (90.0, 40.0),   // left ear
            (110.0, 40.0),  // right ear
            (80.0, 80.0),   // left shoulder
            (120.0, 80.0),  // right shoulder
            (60.0, 120.0),  // left elbow
            (140.0, 120.0), // right elbow
            (70.0, 170.0),  // left wrist
            (130.0, 170.0), // right wrist
            (85.0, 160.0),  // left hip
            (115.0, 160.0), // right hip
            (85.0, 220.0),  // left knee
            (115.0, 220.0), // right knee
            (85.0, 280.0),  // left ankle
            (115.0, 280.0), // right ankle
        ];
        from_coords(&coords, 0.9)
    }

    pub(crate) fn from_coords(coords: &[(f32, f32)], score: f32) -> Detection {
        Detection::new(
            coords
                .iter()
                .map(|&(x, y)| Keypoint {
                    point: Point::new(x, y).unwrap(),
                    score,
                })
                .collect(),
        )
    }

    pub(crate) fn set(body: &mut Detection, kind: KeypointKind, x: f32, y: f32) {
        body.keypoints[kind.idx().unwrap()].point = Point::new(x, y).unwrap();
    }

    /// Five straight fingers fanning upward from the wrist.
    pub(crate) fn hand() -> Detection {
        let mut coords = vec![(100.0, 200.0)];
        for finger in 0..5 {
            let dx = (finger as f32 - 2.0) * 15.0;
            for joint in 1..=4 {
                let t = joint as f32;
                coords.push((100.0 + dx * t / 2.0, 200.0 - 20.0 * t));
            }
        }
        assert_eq!(coords.len(), NUM_HAND_KEYPOINTS);
        from_coords(&coords, 0.8)
    }
}

#[cfg(test)]
mod tests {
    use super::{fixtures, *};
    use crate::pose::KeypointKind;

    fn pt(x: f32, y: f32) -> Point {
        Point::new(x, y).unwrap()
    }

    mod angle_tests {
        use super::*;
        use assert_approx_eq::assert_approx_eq;

        #[test]
        fn right_angle() {
            assert_approx_eq!(angle(pt(1.0, 0.0), pt(0.0, 0.0), pt(0.0, 1.0)), 90.0, 1e-3);
        }

        #[test]
        fn straight_line() {
            // the epsilon in the denominator keeps collinear unit vectors just short of 180
            let straight = angle(pt(-1.0, 0.0), pt(0.0, 0.0), pt(1.0, 0.0));
            assert_approx_eq!(straight, 180.0, 0.1);
            assert!(straight > 179.9);
        }

        #[test]
        fn degenerate_vertex_does_not_divide_by_zero() {
            let a = angle(pt(0.0, 0.0), pt(0.0, 0.0), pt(1.0, 0.0));
            assert!(!a.is_nan());
        }
    }

    mod limb_presence_tests {
        use super::*;

        #[test]
        fn visible_face_with_arms_passes() {
            assert_eq!(limb_presence(&fixtures::body()).unwrap(), Verdict::Pass);
        }

        #[test]
        fn visible_face_missing_wrist_fails() {
            let mut body = fixtures::body();
            body.keypoints[KeypointKind::RightWrist.idx().unwrap()].score = 0.1;
            assert_eq!(limb_presence(&body).unwrap(), Verdict::Fail);
        }

        #[test]
        fn hidden_face_is_vacuous() {
            let mut body = fixtures::body();
            for i in 0..5 {
                body.keypoints[i].score = 0.2;
            }
            body.keypoints[KeypointKind::LeftElbow.idx().unwrap()].score = 0.0;
            assert_eq!(limb_presence(&body).unwrap(), Verdict::Pass);
        }
    }

    mod proportions_tests {
        use super::*;

        #[test]
        fn natural_arms_pass() {
            assert_eq!(proportions(&fixtures::body()).unwrap(), Verdict::Pass);
        }

        #[test]
        fn stretched_upper_arm_fails() {
            let mut body = fixtures::body();
            fixtures::set(&mut body, KeypointKind::LeftElbow, 60.0, 300.0);
            fixtures::set(&mut body, KeypointKind::LeftWrist, 62.0, 310.0);
            assert_eq!(proportions(&body).unwrap(), Verdict::Fail);
        }

        #[test]
        fn zero_length_forearm_fails() {
            let mut body = fixtures::body();
            fixtures::set(&mut body, KeypointKind::RightWrist, 140.0, 120.0);
            assert_eq!(proportions(&body).unwrap(), Verdict::Fail);
        }
    }

    mod elbow_angle_tests {
        use super::*;

        fn body_with_left_angle(degrees: f32) -> Detection {
            let mut body = fixtures::body();
            // shoulder directly above the elbow, wrist rotated by `degrees`
            fixtures::set(&mut body, KeypointKind::LeftShoulder, 60.0, 80.0);
            fixtures::set(&mut body, KeypointKind::LeftElbow, 60.0, 120.0);
            let radians = degrees.to_radians();
            fixtures::set(
                &mut body,
                KeypointKind::LeftWrist,
                60.0 - 40.0 * radians.sin(),
                120.0 - 40.0 * radians.cos(),
            );
            body
        }

        #[test]
        fn ninety_degrees_passes() {
            assert_eq!(elbow_angles(&body_with_left_angle(90.0)).unwrap(), Verdict::Pass);
        }

        #[test]
        fn fifteen_degrees_fails() {
            assert_eq!(elbow_angles(&body_with_left_angle(15.0)).unwrap(), Verdict::Fail);
        }

        #[test]
        fn one_seventy_five_degrees_fails() {
            assert_eq!(elbow_angles(&body_with_left_angle(175.0)).unwrap(), Verdict::Fail);
        }

        #[test]
        fn bounds_are_exclusive() {
            assert!(!elbow_angle_in_range(20.0));
            assert!(!elbow_angle_in_range(170.0));
            assert!(elbow_angle_in_range(20.01));
            assert!(elbow_angle_in_range(169.99));
        }
    }

    mod point_in_polygon_tests {
        use super::*;

        fn square() -> Vec<Point> {
            vec![pt(0.0, 0.0), pt(10.0, 0.0), pt(10.0, 10.0), pt(0.0, 10.0)]
        }

        #[test]
        fn centre_is_inside() {
            assert_eq!(point_in_polygon(pt(5.0, 5.0), &square()), Containment::Inside);
        }

        #[test]
        fn edge_is_boundary() {
            assert_eq!(point_in_polygon(pt(10.0, 5.0), &square()), Containment::OnBoundary);
            assert_eq!(point_in_polygon(pt(0.0, 0.0), &square()), Containment::OnBoundary);
        }

        #[test]
        fn far_point_is_outside() {
            assert_eq!(point_in_polygon(pt(50.0, -3.0), &square()), Containment::Outside);
        }

        #[test]
        fn collapsed_polygon_only_contains_its_point() {
            let collapsed = vec![pt(1.0, 1.0); 4];
            assert_eq!(point_in_polygon(pt(1.0, 1.0), &collapsed), Containment::OnBoundary);
            assert_eq!(point_in_polygon(pt(9.0, 9.0), &collapsed), Containment::Outside);
        }
    }

    mod self_intersection_tests {
        use super::*;

        #[test]
        fn wrists_outside_torso_pass() {
            assert_eq!(no_self_intersection(&fixtures::body()).unwrap(), Verdict::Pass);
        }

        #[test]
        fn wrist_at_torso_centroid_fails() {
            let mut body = fixtures::body();
            fixtures::set(&mut body, KeypointKind::LeftWrist, 100.0, 120.0);
            assert_eq!(no_self_intersection(&body).unwrap(), Verdict::Fail);
        }

        #[test]
        fn wrist_far_outside_torso_passes() {
            let mut body = fixtures::body();
            fixtures::set(&mut body, KeypointKind::RightWrist, 900.0, 900.0);
            assert_eq!(no_self_intersection(&body).unwrap(), Verdict::Pass);
        }
    }

    mod symmetry_tests {
        use super::*;

        #[test]
        fn mirrored_skeleton_passes() {
            assert_eq!(symmetry(&fixtures::body()).unwrap(), Verdict::Pass);
        }

        #[test]
        fn tripled_leg_fails() {
            let mut body = fixtures::body();
            // hip (85, 160) -> knee -> ankle, each segment three times longer
            fixtures::set(&mut body, KeypointKind::LeftKnee, 85.0, 340.0);
            fixtures::set(&mut body, KeypointKind::LeftAnkle, 85.0, 520.0);
            assert_eq!(symmetry(&body).unwrap(), Verdict::Fail);
        }

        #[test]
        fn zero_length_reference_fails() {
            let mut body = fixtures::body();
            fixtures::set(&mut body, KeypointKind::RightElbow, 120.0, 80.0);
            assert_eq!(symmetry(&body).unwrap(), Verdict::Fail);
        }

        #[test]
        fn missing_leg_keypoints_error() {
            let mut body = fixtures::body();
            body.keypoints.truncate(13);
            assert!(matches!(symmetry(&body), Err(Error::MissingKeypoint(13, 13))));
        }
    }

    mod hand_integrity_tests {
        use super::*;

        #[test]
        fn no_hands_pass() {
            assert_eq!(hand_integrity(&[]), Verdict::Pass);
        }

        #[test]
        fn straight_fingers_pass() {
            assert_eq!(hand_integrity(&[fixtures::hand()]), Verdict::Pass);
        }

        #[test]
        fn identical_fingertips_fail() {
            let mut hand = fixtures::hand();
            hand.keypoints[8].point = hand.keypoints[4].point;
            assert_eq!(hand_integrity(&[hand]), Verdict::Fail);
        }

        #[test]
        fn folded_joint_fails() {
            let mut hand = fixtures::hand();
            // fold the index fingertip back onto its second joint
            hand.keypoints[8].point = hand.keypoints[6].point + pt(0.5, 0.5);
            assert_eq!(hand_integrity(&[hand]), Verdict::Fail);
        }

        #[test]
        fn low_confidence_hand_is_skipped() {
            let mut hand = fixtures::hand();
            hand.keypoints[8].point = hand.keypoints[4].point;
            for keypoint in &mut hand.keypoints {
                keypoint.score = 0.1;
            }
            assert_eq!(hand_integrity(&[hand]), Verdict::Pass);
        }

        #[test]
        fn malformed_hand_is_indeterminate() {
            let mut hand = fixtures::hand();
            hand.keypoints.truncate(10);
            let verdict = hand_integrity(&[hand]);
            assert_eq!(verdict, Verdict::Indeterminate);
            assert!(verdict.passed());
        }
    }
}
