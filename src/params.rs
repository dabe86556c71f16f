use serde::{Deserialize, Serialize};

/// Range and unit scale of one operator slider.
///
/// Sliders hold integers; the remote side expects real values of
/// `raw / divisor`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SliderSpec {
    pub min: i32,
    pub max: i32,
    pub default: i32,
    pub divisor: f32,
}

impl SliderSpec {
    pub fn to_real(&self, raw: i32) -> f32 {
        self.clamp(raw) as f32 / self.divisor
    }

    pub fn from_real(&self, value: f32) -> i32 {
        self.clamp((value * self.divisor).round() as i32)
    }

    pub fn clamp(&self, raw: i32) -> i32 {
        raw.clamp(self.min, self.max)
    }
}

pub const IPD: SliderSpec = SliderSpec {
    min: 0,
    max: 200,
    default: 20,
    divisor: 10.0,
};

pub const SUBVIEWPORT_SCALE: SliderSpec = SliderSpec {
    min: 10,
    max: 30,
    default: 15,
    divisor: 10.0,
};

pub const VR_FILTER_STRENGTH: SliderSpec = SliderSpec {
    min: 0,
    max: 100,
    default: 0,
    divisor: 1.0,
};

pub const GYRO_SENSITIVE: SliderSpec = SliderSpec {
    min: 0,
    max: 100,
    default: 50,
    divisor: 1.0,
};

/// Which control set the remote scene exposes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ParameterVariant {
    #[default]
    Full,
    WithoutFilter,
}

impl ParameterVariant {
    pub fn has_filter_strength(&self) -> bool {
        matches!(self, ParameterVariant::Full)
    }
}

/// Raw slider positions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SliderValues {
    pub ipd: i32,
    pub subviewport_scale: i32,
    pub vr_filter_strength: i32,
    pub gyro_sensitive: i32,
}

impl Default for SliderValues {
    fn default() -> Self {
        Self {
            ipd: IPD.default,
            subviewport_scale: SUBVIEWPORT_SCALE.default,
            vr_filter_strength: VR_FILTER_STRENGTH.default,
            gyro_sensitive: GYRO_SENSITIVE.default,
        }
    }
}

impl SliderValues {
    pub fn to_control_values(&self, variant: ParameterVariant) -> ControlValues {
        ControlValues {
            ipd: IPD.to_real(self.ipd),
            subviewport_scale: SUBVIEWPORT_SCALE.to_real(self.subviewport_scale),
            vr_filter_strength: variant
                .has_filter_strength()
                .then(|| VR_FILTER_STRENGTH.to_real(self.vr_filter_strength)),
            gyro_sensitive: GYRO_SENSITIVE.to_real(self.gyro_sensitive),
        }
    }

    pub fn from_control_values(values: &ControlValues) -> Self {
        Self {
            ipd: IPD.from_real(values.ipd),
            subviewport_scale: SUBVIEWPORT_SCALE.from_real(values.subviewport_scale),
            vr_filter_strength: values
                .vr_filter_strength
                .map(|v| VR_FILTER_STRENGTH.from_real(v))
                .unwrap_or(VR_FILTER_STRENGTH.default),
            gyro_sensitive: GYRO_SENSITIVE.from_real(values.gyro_sensitive),
        }
    }
}

/// Control values in the units the remote protocol expects. This is also
/// the persisted preset body.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ControlValues {
    pub ipd: f32,
    pub subviewport_scale: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vr_filter_strength: Option<f32>,
    pub gyro_sensitive: f32,
}

impl Default for ControlValues {
    fn default() -> Self {
        SliderValues::default().to_control_values(ParameterVariant::Full)
    }
}
