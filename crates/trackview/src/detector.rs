//! Asynchronous pose detector running on a worker thread.

use std::cell::Cell;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossbeam_channel::{unbounded, Receiver, Sender, TryRecvError};
use tracing::{debug, trace, warn};

use crate::scene::Pose;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Detection {
    pub sequence: u64,
    pub pose: Pose,
}

struct Request {
    sequence: u64,
    pose: Pose,
}

/// Handle to the detector thread.
///
/// At most one pass is in flight. Completed passes are collected by
/// [`PoseDetector::is_idle`], which never blocks.
pub struct PoseDetector {
    requests: Option<Sender<Request>>,
    results: Receiver<Detection>,
    worker: Option<JoinHandle<()>>,
    latency: Duration,
    sequence: u64,
    in_flight: Cell<bool>,
    latest: Cell<Option<Detection>>,
    finished_at: Cell<Option<Instant>>,
}

impl PoseDetector {
    /// Starts the worker; each pass keeps it busy for `latency`.
    pub fn spawn(latency: Duration) -> Result<Self> {
        let (request_tx, request_rx) = unbounded();
        let (result_tx, result_rx) = unbounded();
        let worker = thread::Builder::new()
            .name("pose-detector".to_string())
            .spawn(move || detector_loop(request_rx, result_tx, latency))
            .context("failed to spawn pose detector thread")?;
        debug!(latency_ms = latency.as_millis() as u64, "pose detector started");

        Ok(Self {
            requests: Some(request_tx),
            results: result_rx,
            worker: Some(worker),
            latency,
            sequence: 0,
            in_flight: Cell::new(false),
            latest: Cell::new(None),
            finished_at: Cell::new(None),
        })
    }

    /// Collects finished passes; true when no pass is in flight.
    pub fn is_idle(&self) -> bool {
        loop {
            match self.results.try_recv() {
                Ok(detection) => {
                    trace!(sequence = detection.sequence, "pose detection finished");
                    self.latest.set(Some(detection));
                    self.in_flight.set(false);
                    self.finished_at.set(Some(Instant::now()));
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    if self.in_flight.replace(false) {
                        warn!("pose detector thread exited with a pass in flight");
                    }
                    break;
                }
            }
        }
        !self.in_flight.get()
    }

    /// Starts a pass on `pose` once the detector is idle and has rested for
    /// one latency period since its last result.
    pub fn submit(&mut self, pose: Pose) -> bool {
        if !self.is_idle() {
            return false;
        }
        if let Some(finished) = self.finished_at.get() {
            if finished.elapsed() < self.latency {
                return false;
            }
        }
        let Some(requests) = &self.requests else {
            return false;
        };

        let sequence = self.sequence + 1;
        if requests.send(Request { sequence, pose }).is_err() {
            warn!("pose detector thread is gone; dropping request");
            return false;
        }
        self.sequence = sequence;
        self.in_flight.set(true);
        trace!(sequence, "pose detection submitted");
        true
    }

    pub fn latest(&self) -> Option<Detection> {
        self.latest.get()
    }
}

impl Drop for PoseDetector {
    fn drop(&mut self) {
        // Closing the request channel ends the worker loop.
        self.requests.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("pose detector thread panicked");
            }
        }
    }
}

fn detector_loop(requests: Receiver<Request>, results: Sender<Detection>, latency: Duration) {
    for request in requests.iter() {
        thread::sleep(latency);
        let detection = Detection {
            sequence: request.sequence,
            pose: jitter(request.pose, request.sequence),
        };
        if results.send(detection).is_err() {
            break;
        }
    }
    debug!("pose detector stopped");
}

/// Detections land slightly off the true pose, varying per pass.
fn jitter(pose: Pose, sequence: u64) -> Pose {
    let phase = sequence as f32 * 2.399;
    let offset = pose.half_extent * 0.05;
    Pose {
        x: pose.x + offset * phase.cos(),
        y: pose.y + offset * phase.sin(),
        ..pose
    }
}
