mod config;
mod control;
mod error;
mod gesture;
mod params;
mod pipeline;
mod presets;
mod telemetry;
mod transport;
mod types;

use std::{path::PathBuf, process::ExitCode, time::Duration};

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use crossbeam_channel::{bounded, select};

use config::{Settings, SliderArgs, TargetArgs};
use control::{ControlCommand, ControlDispatcher, SendMode};
use params::{ControlValues, SliderValues};
use pipeline::{
    DEFAULT_MIN_SCORE, DEFAULT_TICK, FrameReport, JsonLinesSource, LandmarkSource, start_tracking,
};
use transport::UdpSender;
use types::{GestureLabel, Side};

const FEEDBACK_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Parser, Debug)]
#[command(
    name = "gesture-link",
    version,
    about = "Stream hand-pose telemetry and camera controls to a remote scene over UDP"
)]
struct Cli {
    #[command(flatten)]
    target: TargetArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Classify hands frame by frame and stream them as telemetry
    Stream {
        #[command(flatten)]
        input: InputArgs,

        /// Frame loop period in milliseconds
        #[arg(long, default_value_t = DEFAULT_TICK.as_millis() as u64)]
        tick_ms: u64,

        /// Ignore hands detected with a lower score
        #[arg(long, default_value_t = DEFAULT_MIN_SCORE)]
        min_score: f32,
    },

    /// Zero the remote rotation
    Reset,

    /// Send control values, starting from defaults or a preset
    Send {
        #[command(flatten)]
        sliders: SliderArgs,

        /// Start from this preset instead of the defaults
        #[arg(long)]
        preset: Option<String>,

        /// One message per control instead of one combined message
        #[arg(long)]
        individual: bool,
    },

    /// Manage named presets
    Preset {
        #[command(subcommand)]
        action: PresetCommand,
    },
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
struct InputArgs {
    /// Replay a JSON-lines landmark recording
    #[arg(long)]
    replay: Option<PathBuf>,

    /// Run a detector process that prints JSON-lines landmarks on stdout
    #[arg(long)]
    detector: Option<String>,
}

#[derive(Subcommand, Debug)]
enum PresetCommand {
    /// List preset names in insertion order
    List,

    /// Print one preset
    Show { name: String },

    /// Save the given sliders under a name, overwriting any existing preset
    Save {
        name: String,

        #[command(flatten)]
        sliders: SliderArgs,
    },

    /// Delete a preset
    Delete { name: String },

    /// Send a preset's values to the scene
    Apply {
        name: String,

        /// One message per control instead of one combined message
        #[arg(long)]
        individual: bool,

        /// Target a scene that has no VR filter strength control
        #[arg(long)]
        no_filter: bool,
    },
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let settings = Settings::from(&cli.target);

    match run(cli.command, &settings) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(command: Commands, settings: &Settings) -> Result<()> {
    match command {
        Commands::Stream {
            input,
            tick_ms,
            min_score,
        } => {
            let tick = Duration::from_millis(tick_ms.max(1));
            match (input.replay, input.detector) {
                (Some(path), _) => {
                    stream(JsonLinesSource::open(&path, min_score)?, settings, tick)
                }
                (None, Some(command)) => {
                    stream(JsonLinesSource::spawn(&command, min_score)?, settings, tick)
                }
                (None, None) => bail!("either --replay or --detector is required"),
            }
        }
        Commands::Reset => run_actions(settings, |dispatcher| {
            dispatcher.dispatch(settings.endpoint.clone(), ControlCommand::Reset);
            1
        }),
        Commands::Send {
            sliders,
            preset,
            individual,
        } => {
            let base = match preset {
                Some(name) => SliderValues::from_control_values(&settings.store.get(&name)?),
                None => SliderValues::default(),
            };
            let values = sliders.apply(base).to_control_values(sliders.variant());
            send_values(settings, &values, individual)
        }
        Commands::Preset { action } => run_preset(action, settings),
    }
}

fn run_preset(action: PresetCommand, settings: &Settings) -> Result<()> {
    let store = &settings.store;
    log::debug!("using preset store {}", store.path().display());
    match action {
        PresetCommand::List => {
            for name in store.list()? {
                println!("{name}");
            }
        }
        PresetCommand::Show { name } => {
            let values = store.get(&name)?;
            println!("{name}: {}", serde_json::to_string(&values)?);
        }
        PresetCommand::Save { name, sliders } => {
            let values = sliders
                .apply(SliderValues::default())
                .to_control_values(sliders.variant());
            store.save(&name, values)?;
            println!("saved preset \"{}\"", name.trim());
        }
        PresetCommand::Delete { name } => {
            store.delete(&name)?;
            println!("deleted preset \"{}\"", name.trim());
        }
        PresetCommand::Apply {
            name,
            individual,
            no_filter,
        } => {
            let sliders = SliderArgs {
                no_filter,
                ..SliderArgs::default()
            };
            let values = SliderValues::from_control_values(&store.get(&name)?)
                .to_control_values(sliders.variant());
            send_values(settings, &values, individual)?;
        }
    }
    Ok(())
}

fn send_values(settings: &Settings, values: &ControlValues, individual: bool) -> Result<()> {
    let mode = if individual {
        SendMode::Individual
    } else {
        SendMode::Batched
    };
    run_actions(settings, |dispatcher| {
        dispatcher.dispatch_values(&settings.endpoint, values, mode)
    })
}

/// Launch control workers and print one line per outcome. A single failed
/// action is returned as the error itself so it prints exactly once.
fn run_actions<F>(settings: &Settings, launch: F) -> Result<()>
where
    F: FnOnce(&ControlDispatcher) -> usize,
{
    let sender = UdpSender::bind().context("failed to open UDP socket")?;
    let (dispatcher, feedback_rx) = ControlDispatcher::new(sender);
    let expected = launch(&dispatcher);
    log::debug!("waiting for {expected} action(s) against {}", settings.endpoint);

    let mut failures = 0;
    for _ in 0..expected {
        let outcome = feedback_rx
            .recv_timeout(FEEDBACK_TIMEOUT)
            .context("control worker did not report back")?;
        if outcome.is_success() {
            println!("{}", outcome.message());
        } else if expected == 1 {
            bail!("{}", outcome.message());
        } else {
            eprintln!("{}", outcome.message());
            failures += 1;
        }
    }

    if failures > 0 {
        bail!("{failures} of {expected} control message(s) failed");
    }
    Ok(())
}

enum StreamEvent {
    Report(FrameReport),
    Finished,
    Interrupted,
}

fn stream<S: LandmarkSource>(source: S, settings: &Settings, tick: Duration) -> Result<()> {
    let sender = UdpSender::bind().context("failed to open UDP socket")?;
    let (interrupt_tx, interrupt_rx) = bounded(1);
    ctrlc::set_handler(move || {
        let _ = interrupt_tx.try_send(());
    })
    .context("failed to install Ctrl-C handler")?;

    let (report_tx, report_rx) = bounded(4);
    let session = start_tracking(source, sender, settings.endpoint.clone(), report_tx, tick);

    // Only pose changes are printed; steady frames stay quiet.
    let mut last_poses: Vec<(Side, GestureLabel)> = Vec::new();
    let stats = loop {
        let event = select! {
            recv(report_rx) -> report => report.map_or(StreamEvent::Finished, StreamEvent::Report),
            recv(interrupt_rx) -> _ => StreamEvent::Interrupted,
        };
        match event {
            StreamEvent::Report(report) => {
                log::trace!("frame {}: {:?}", report.frame, report.status);
                let poses = poses_of(&report);
                if poses != last_poses {
                    println!("{}", describe_poses(&poses));
                    last_poses = poses;
                }
            }
            StreamEvent::Finished => break session.wait(),
            StreamEvent::Interrupted => {
                log::info!("interrupted, stopping tracking");
                break session.stop();
            }
        }
    };

    println!(
        "streamed {} frames: {} sent, {} without hands, {} invalid, {} failed",
        stats.frames, stats.sent, stats.idle, stats.invalid, stats.failed
    );
    Ok(())
}

fn poses_of(report: &FrameReport) -> Vec<(Side, GestureLabel)> {
    report
        .hands
        .iter()
        .map(|(side, detail)| (*side, detail.label))
        .collect()
}

fn describe_poses(poses: &[(Side, GestureLabel)]) -> String {
    if poses.is_empty() {
        return "no hands".to_string();
    }
    poses
        .iter()
        .map(|(side, label)| format!("{}: {}", side.label(), label.display_name()))
        .collect::<Vec<_>>()
        .join(" | ")
}
