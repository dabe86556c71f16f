use serde::{Deserialize, Serialize};

use crate::{
    error::Result,
    gesture,
    types::{GestureDetail, GestureLabel, Hand, Side},
};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HandPayload {
    pub landmarks: Vec<Point>,
    pub pose: GestureLabel,
}

/// One frame of hand telemetry, keyed by side.
///
/// Wire shape: `{"Left": {"landmarks": [{"x":..,"y":..}, ..], "pose": ".."}, "Right": {..}}`
/// with absent sides omitted.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct HandFrameMessage {
    #[serde(rename = "Left", default, skip_serializing_if = "Option::is_none")]
    pub left: Option<HandPayload>,
    #[serde(rename = "Right", default, skip_serializing_if = "Option::is_none")]
    pub right: Option<HandPayload>,
}

impl HandFrameMessage {
    pub fn insert(&mut self, side: Side, payload: HandPayload) {
        let slot = match side {
            Side::Left => &mut self.left,
            Side::Right => &mut self.right,
        };
        if slot.is_some() {
            log::debug!("duplicate {} hand in frame, keeping the later one", side.label());
        }
        *slot = Some(payload);
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    #[cfg(test)]
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// A frame after classification, ready to be sent.
#[derive(Clone, Debug)]
pub struct EncodedFrame {
    pub hands: Vec<(Side, GestureDetail)>,
    pub bytes: Vec<u8>,
}

/// Classify and encode every hand of one frame.
///
/// Returns `Ok(None)` when the frame has no hands, so nothing is sent.
/// Any malformed hand fails the whole frame.
pub fn encode_frame(hands: &[Hand]) -> Result<Option<EncodedFrame>> {
    if hands.is_empty() {
        return Ok(None);
    }

    let mut message = HandFrameMessage::default();
    let mut details = Vec::with_capacity(hands.len());

    for hand in hands {
        let detail = gesture::classify(hand)?;
        let landmarks = hand
            .landmarks
            .iter()
            .map(|lm| Point { x: lm.x, y: lm.y })
            .collect();
        message.insert(
            hand.side,
            HandPayload {
                landmarks,
                pose: detail.label,
            },
        );
        details.push((hand.side, detail));
    }

    Ok(Some(EncodedFrame {
        hands: details,
        bytes: message.encode()?,
    }))
}
