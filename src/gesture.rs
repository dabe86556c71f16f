use crate::{
    error::{LinkError, Result},
    types::{
        FingerExtension, GestureDetail, GestureLabel, Hand, Landmark, NUM_LANDMARKS, landmark,
    },
};

// (tip, reference joint) for index, middle, ring, pinky.
const FINGER_JOINTS: [(usize, usize); 4] = [
    (landmark::INDEX_TIP, landmark::INDEX_PIP),
    (landmark::MIDDLE_TIP, landmark::MIDDLE_PIP),
    (landmark::RING_TIP, landmark::RING_PIP),
    (landmark::PINKY_TIP, landmark::PINKY_PIP),
];

/// Classify one hand from its finger-extension pattern.
///
/// Extension is judged in image space: a fingertip above its reference joint
/// (smaller `y`) counts as extended. This assumes an upright hand facing the
/// camera and is not rotation invariant.
pub fn classify(hand: &Hand) -> Result<GestureDetail> {
    validate_landmarks(&hand.landmarks)?;

    let points = &hand.landmarks;
    let [index, middle, ring, pinky] =
        FINGER_JOINTS.map(|(tip, reference)| is_extended(&points[tip], &points[reference]));
    let fingers = FingerExtension {
        index,
        middle,
        ring,
        pinky,
    };

    let thumb_index_distance =
        points[landmark::THUMB_TIP].distance_2d(&points[landmark::INDEX_TIP]);

    Ok(GestureDetail {
        label: label_for(fingers),
        fingers,
        thumb_index_distance,
    })
}

/// First matching pattern wins.
pub fn label_for(fingers: FingerExtension) -> GestureLabel {
    match (fingers.index, fingers.middle, fingers.ring, fingers.pinky) {
        (true, false, false, false) => GestureLabel::Pointing,
        (true, true, true, true) => GestureLabel::OpenPalm,
        (false, false, false, false) => GestureLabel::ClosedFist,
        (true, true, false, false) => GestureLabel::TwoFingers,
        _ => GestureLabel::Unknown,
    }
}

fn is_extended(tip: &Landmark, reference: &Landmark) -> bool {
    tip.y < reference.y
}

fn validate_landmarks(points: &[Landmark]) -> Result<()> {
    if points.len() != NUM_LANDMARKS {
        return Err(LinkError::InvalidHandData(format!(
            "expected {NUM_LANDMARKS} landmarks, got {}",
            points.len()
        )));
    }

    if let Some(idx) = points
        .iter()
        .position(|p| !p.x.is_finite() || !p.y.is_finite())
    {
        return Err(LinkError::InvalidHandData(format!(
            "landmark {idx} has a non-finite coordinate"
        )));
    }

    Ok(())
}
