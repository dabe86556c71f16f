use serde::{Deserialize, Serialize};

pub const NUM_LANDMARKS: usize = 21;

/// Landmark indices in the MediaPipe hand model ordering.
#[allow(dead_code)]
pub mod landmark {
    pub const WRIST: usize = 0;
    pub const THUMB_TIP: usize = 4;
    pub const INDEX_PIP: usize = 6;
    pub const INDEX_TIP: usize = 8;
    pub const MIDDLE_PIP: usize = 10;
    pub const MIDDLE_TIP: usize = 12;
    pub const RING_PIP: usize = 14;
    pub const RING_TIP: usize = 16;
    pub const PINKY_PIP: usize = 18;
    pub const PINKY_TIP: usize = 20;
}

/// One joint position, normalized to [0, 1] of the frame size.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    pub z: Option<f32>,
}

impl Landmark {
    #[allow(dead_code)]
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y, z: None }
    }

    pub fn distance_2d(&self, other: &Landmark) -> f32 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub fn label(&self) -> &'static str {
        match self {
            Side::Left => "Left",
            Side::Right => "Right",
        }
    }

    pub fn parse(label: &str) -> Option<Self> {
        match label {
            "Left" => Some(Side::Left),
            "Right" => Some(Side::Right),
            _ => None,
        }
    }
}

/// A single detected hand, owned by the frame that produced it.
#[derive(Clone, Debug, PartialEq)]
pub struct Hand {
    pub side: Side,
    pub landmarks: Vec<Landmark>,
}

/// Discrete finger-extension pattern of one hand.
///
/// Serialized names are the pose strings the receiving scene matches on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum GestureLabel {
    #[serde(rename = "pointer")]
    Pointing,
    #[serde(rename = "open")]
    OpenPalm,
    #[serde(rename = "close")]
    ClosedFist,
    #[serde(rename = "two")]
    TwoFingers,
    #[serde(rename = "unknow")]
    Unknown,
}

impl GestureLabel {
    pub fn display_name(&self) -> &'static str {
        match self {
            GestureLabel::Pointing => "pointing",
            GestureLabel::OpenPalm => "open palm",
            GestureLabel::ClosedFist => "closed fist",
            GestureLabel::TwoFingers => "two fingers",
            GestureLabel::Unknown => "unknown",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FingerExtension {
    pub index: bool,
    pub middle: bool,
    pub ring: bool,
    pub pinky: bool,
}

/// Classifier output: the label plus the signals it was derived from.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GestureDetail {
    pub label: GestureLabel,
    pub fingers: FingerExtension,
    /// Thumb tip to index tip, in normalized frame units. Not part of the
    /// label decision; kept for pinch detection.
    pub thumb_index_distance: f32,
}
