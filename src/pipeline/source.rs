use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
    process::{Child, ChildStdout, Command, Stdio},
};

use anyhow::{Context, Result, anyhow, bail};
use serde::Deserialize;

use crate::types::{Hand, Landmark, Side};

/// MediaPipe's default minimum detection confidence.
pub const DEFAULT_MIN_SCORE: f32 = 0.5;

/// Produces the hands seen in the next frame.
///
/// `Ok(None)` means the source is exhausted; `Ok(Some(vec![]))` is a frame
/// without hands.
pub trait LandmarkSource: Send + 'static {
    fn detect(&mut self) -> Result<Option<Vec<Hand>>>;
}

#[derive(Deserialize, Debug)]
struct LandmarkJson {
    x: f32,
    y: f32,
    #[serde(default)]
    z: Option<f32>,
}

#[derive(Deserialize, Debug)]
struct HandJson {
    handedness: String,
    #[serde(default = "full_score")]
    score: f32,
    landmarks: Vec<LandmarkJson>,
}

#[derive(Deserialize, Debug)]
struct DetectionJson {
    #[serde(default)]
    hands: Vec<HandJson>,
    #[serde(default)]
    error: Option<String>,
}

fn full_score() -> f32 {
    1.0
}

/// Reads one detection result per line, either from a recording or from the
/// stdout of an external detector process.
///
/// Line format:
/// `{"hands": [{"handedness": "Left", "score": 0.93, "landmarks": [{"x":..,"y":..,"z":..}, ..]}]}`
pub struct JsonLinesSource<R> {
    reader: R,
    min_score: f32,
    line_no: usize,
    child: Option<Child>,
}

impl JsonLinesSource<BufReader<File>> {
    pub fn open(path: &Path, min_score: f32) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("failed to open landmark recording {}", path.display()))?;
        log::info!("replaying landmarks from {}", path.display());
        Ok(Self::from_reader(BufReader::new(file), min_score))
    }
}

impl JsonLinesSource<BufReader<ChildStdout>> {
    /// Start `command` (program followed by whitespace separated arguments)
    /// and read detections from its stdout.
    pub fn spawn(command: &str, min_score: f32) -> Result<Self> {
        let mut parts = command.split_whitespace();
        let program = parts
            .next()
            .ok_or_else(|| anyhow!("detector command is empty"))?;

        log::info!("starting landmark detector: {command}");
        let mut child = Command::new(program)
            .args(parts)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .with_context(|| format!("failed to start detector `{program}`"))?;

        let stdout = child
            .stdout
            .take()
            .context("detector process has no stdout")?;

        let mut source = Self::from_reader(BufReader::new(stdout), min_score);
        source.child = Some(child);
        Ok(source)
    }
}

impl<R: BufRead> JsonLinesSource<R> {
    pub fn from_reader(reader: R, min_score: f32) -> Self {
        Self {
            reader,
            min_score,
            line_no: 0,
            child: None,
        }
    }
}

impl<R: BufRead + Send + 'static> LandmarkSource for JsonLinesSource<R> {
    fn detect(&mut self) -> Result<Option<Vec<Hand>>> {
        let mut line = String::new();
        loop {
            line.clear();
            let read = self
                .reader
                .read_line(&mut line)
                .context("failed to read detector output")?;
            if read == 0 {
                return Ok(None);
            }
            self.line_no += 1;

            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed == "READY" {
                continue;
            }

            return match parse_detection(trimmed, self.min_score) {
                Ok(hands) => Ok(Some(hands)),
                Err(err) => {
                    log::warn!("skipping detector line {}: {err:#}", self.line_no);
                    Ok(Some(Vec::new()))
                }
            };
        }
    }
}

impl<R> Drop for JsonLinesSource<R> {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

fn parse_detection(line: &str, min_score: f32) -> Result<Vec<Hand>> {
    let detection: DetectionJson =
        serde_json::from_str(line).context("malformed detection JSON")?;

    if let Some(error) = detection.error {
        log::warn!("detector reported an error: {error}");
        return Ok(Vec::new());
    }

    let mut hands = Vec::with_capacity(detection.hands.len());
    for hand in detection.hands {
        if hand.score < min_score {
            log::trace!(
                "dropping {} hand below score threshold ({:.2} < {min_score:.2})",
                hand.handedness,
                hand.score
            );
            continue;
        }
        let Some(side) = Side::parse(&hand.handedness) else {
            bail!("unknown handedness {:?}", hand.handedness);
        };
        hands.push(Hand {
            side,
            landmarks: hand
                .landmarks
                .into_iter()
                .map(|lm| Landmark {
                    x: lm.x,
                    y: lm.y,
                    z: lm.z,
                })
                .collect(),
        });
    }

    Ok(hands)
}
