use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::{Duration, Instant},
};

use crossbeam_channel::Sender;

use super::source::LandmarkSource;
use crate::{
    telemetry,
    transport::{Endpoint, ResolvedEndpoint, UdpSender},
    types::{GestureDetail, Hand, Side},
};

pub const DEFAULT_TICK: Duration = Duration::from_millis(30);

#[derive(Clone, Debug, PartialEq)]
pub enum SendStatus {
    /// No hands in the frame, nothing sent.
    Idle,
    Sent(usize),
    Failed(String),
    /// The frame was dropped before encoding.
    Invalid(String),
}

/// Summary of one processed frame, for display.
#[derive(Clone, Debug)]
pub struct FrameReport {
    pub frame: u64,
    pub hands: Vec<(Side, GestureDetail)>,
    pub status: SendStatus,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub frames: u64,
    pub sent: u64,
    pub idle: u64,
    pub invalid: u64,
    pub failed: u64,
}

impl LoopStats {
    fn record(&mut self, status: &SendStatus) {
        self.frames += 1;
        match status {
            SendStatus::Idle => self.idle += 1,
            SendStatus::Sent(_) => self.sent += 1,
            SendStatus::Failed(_) => self.failed += 1,
            SendStatus::Invalid(_) => self.invalid += 1,
        }
    }
}

/// A running frame loop. Stopping only prevents further ticks; a send that
/// is already under way completes.
#[derive(Debug)]
pub struct TrackingSession {
    stop: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<LoopStats>>,
}

impl TrackingSession {
    pub fn stop(mut self) -> LoopStats {
        self.stop.store(true, Ordering::SeqCst);
        self.join()
    }

    /// Block until the source is exhausted.
    pub fn wait(mut self) -> LoopStats {
        self.join()
    }

    fn join(&mut self) -> LoopStats {
        match self.handle.take().map(thread::JoinHandle::join) {
            Some(Ok(stats)) => stats,
            Some(Err(_)) => {
                log::error!("tracking loop panicked");
                LoopStats::default()
            }
            None => LoopStats::default(),
        }
    }
}

impl Drop for TrackingSession {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

pub fn start_tracking<S: LandmarkSource>(
    source: S,
    sender: UdpSender,
    endpoint: Endpoint,
    report_tx: Sender<FrameReport>,
    tick: Duration,
) -> TrackingSession {
    let stop = Arc::new(AtomicBool::new(false));
    let stop_flag = stop.clone();

    log::info!("tracking started, sending to {endpoint} every {tick:?}");
    let handle = thread::spawn(move || {
        // Looked up once per session; ticks only send.
        let target = ResolvedEndpoint::new(endpoint);
        let stats = run_frame_loop(source, &sender, &target, &report_tx, tick, &stop_flag);
        log::info!(
            "tracking stopped after {} frames ({} sent, {} idle, {} invalid, {} failed)",
            stats.frames,
            stats.sent,
            stats.idle,
            stats.invalid,
            stats.failed
        );
        stats
    });

    TrackingSession {
        stop,
        handle: Some(handle),
    }
}

fn run_frame_loop<S: LandmarkSource>(
    mut source: S,
    sender: &UdpSender,
    target: &ResolvedEndpoint,
    report_tx: &Sender<FrameReport>,
    tick: Duration,
    stop: &AtomicBool,
) -> LoopStats {
    let mut stats = LoopStats::default();
    let mut next_tick = Instant::now();

    while !stop.load(Ordering::Relaxed) {
        let hands = match source.detect() {
            Ok(Some(hands)) => hands,
            Ok(None) => {
                log::info!("landmark source exhausted");
                break;
            }
            Err(err) => {
                log::warn!("landmark detection failed: {err:#}");
                Vec::new()
            }
        };

        let (details, status) = process_frame(&hands, sender, target);
        stats.record(&status);

        // Drop the report if nobody is keeping up.
        let _ = report_tx.try_send(FrameReport {
            frame: stats.frames,
            hands: details,
            status,
        });

        next_tick += tick;
        let now = Instant::now();
        if next_tick > now {
            thread::sleep(next_tick - now);
        } else {
            next_tick = now;
        }
    }

    stats
}

/// Classify, encode and send one frame. Never fails past the frame.
pub fn process_frame(
    hands: &[Hand],
    sender: &UdpSender,
    target: &ResolvedEndpoint,
) -> (Vec<(Side, GestureDetail)>, SendStatus) {
    let frame = match telemetry::encode_frame(hands) {
        Ok(Some(frame)) => frame,
        Ok(None) => return (Vec::new(), SendStatus::Idle),
        Err(err) => {
            log::warn!("dropping frame: {err}");
            return (Vec::new(), SendStatus::Invalid(err.to_string()));
        }
    };

    let status = match sender.send_resolved(&frame.bytes, target) {
        Ok(bytes) => SendStatus::Sent(bytes),
        Err(err) => {
            log::warn!("{err}");
            SendStatus::Failed(err.to_string())
        }
    };

    (frame.hands, status)
}
