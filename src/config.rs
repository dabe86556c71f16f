use std::path::PathBuf;

use clap::Args;

use crate::{
    params::{self, ParameterVariant, SliderValues},
    presets::{DEFAULT_PRESET_FILE, PresetStore},
    transport::{DEFAULT_PORT, Endpoint},
};

/// Where commands go and where presets live.
#[derive(Args, Clone, Debug)]
pub struct TargetArgs {
    /// Host running the receiving scene
    #[arg(long, env = "GESTURE_LINK_HOST", default_value = "127.0.0.1", global = true)]
    pub host: String,

    /// UDP port of the receiving scene
    #[arg(long, env = "GESTURE_LINK_PORT", default_value_t = DEFAULT_PORT, global = true)]
    pub port: u16,

    /// Preset file
    #[arg(long, env = "GESTURE_LINK_PRESETS", default_value = DEFAULT_PRESET_FILE, global = true)]
    pub presets: PathBuf,
}

/// Slider positions in raw units, as shown on the control surface.
#[derive(Args, Clone, Debug, Default)]
pub struct SliderArgs {
    /// IPD in tenths (20 sends 2.0)
    #[arg(long, value_parser = clap::value_parser!(i32)
        .range(params::IPD.min as i64..=params::IPD.max as i64))]
    pub ipd: Option<i32>,

    /// Subviewport scale in tenths (15 sends 1.5)
    #[arg(long = "svs", value_parser = clap::value_parser!(i32)
        .range(params::SUBVIEWPORT_SCALE.min as i64..=params::SUBVIEWPORT_SCALE.max as i64))]
    pub subviewport_scale: Option<i32>,

    /// VR filter strength
    #[arg(long = "vfs", value_parser = clap::value_parser!(i32)
        .range(params::VR_FILTER_STRENGTH.min as i64..=params::VR_FILTER_STRENGTH.max as i64))]
    pub vr_filter_strength: Option<i32>,

    /// Gyro sensitivity
    #[arg(long = "gyro", value_parser = clap::value_parser!(i32)
        .range(params::GYRO_SENSITIVE.min as i64..=params::GYRO_SENSITIVE.max as i64))]
    pub gyro_sensitive: Option<i32>,

    /// Target a scene that has no VR filter strength control
    #[arg(long)]
    pub no_filter: bool,
}

impl SliderArgs {
    /// Overlay the sliders given on the command line onto `base`.
    pub fn apply(&self, base: SliderValues) -> SliderValues {
        SliderValues {
            ipd: self.ipd.unwrap_or(base.ipd),
            subviewport_scale: self.subviewport_scale.unwrap_or(base.subviewport_scale),
            vr_filter_strength: self.vr_filter_strength.unwrap_or(base.vr_filter_strength),
            gyro_sensitive: self.gyro_sensitive.unwrap_or(base.gyro_sensitive),
        }
    }

    pub fn variant(&self) -> ParameterVariant {
        if self.no_filter {
            ParameterVariant::WithoutFilter
        } else {
            ParameterVariant::Full
        }
    }
}

/// Resolved runtime settings shared by every command.
#[derive(Clone, Debug)]
pub struct Settings {
    pub endpoint: Endpoint,
    pub store: PresetStore,
}

impl From<&TargetArgs> for Settings {
    fn from(args: &TargetArgs) -> Self {
        Settings {
            endpoint: Endpoint::new(args.host.trim(), args.port),
            store: PresetStore::new(args.presets.clone()),
        }
    }
}
