// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_queue::SegQueue;
use log::{debug, error, info, warn};
use serde::Serialize;

use crate::error::{RenderError, Result};
use crate::frame::{FrameBuffer, HitHistogram, ShadowEstimate, StepStats};
use crate::params::{PreparedParams, RenderParams};
use crate::tile::{
    render_tile, tiles_for_frame, DebugPath, DebugPixel, Tile, TileRequest, TileResult,
};

/// How often the controller wakes up to check for cancellation.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Upper bound on the default worker count.
const MAX_DEFAULT_WORKERS: usize = 4;

/// Default worker count: one less than the available cores, between 1 and 4.
pub fn worker_count() -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(2);
    cores.saturating_sub(1).clamp(1, MAX_DEFAULT_WORKERS)
}

/// Progressive pass strides for a square frame of edge `resolution`.
pub fn passes_for_resolution(resolution: u32) -> Vec<u32> {
    if resolution <= 512 {
        vec![8, 4, 2, 1]
    } else {
        vec![10, 6, 3, 2, 1]
    }
}

/// Check that strides are non-empty, strictly decreasing and end at 1.
///
/// # Errors
/// Returns [`RenderError::InvalidPasses`] otherwise.
pub fn validate_passes(passes: &[u32]) -> Result<()> {
    let decreasing = passes.windows(2).all(|w| w[0] > w[1]);
    if passes.last() != Some(&1) || !decreasing {
        return Err(RenderError::InvalidPasses(passes.to_vec()));
    }
    Ok(())
}

/// Lifecycle state reported with every progress event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderStatus {
    /// Not rendering (never started or cancelled).
    Idle,
    /// Tiles are being rendered.
    Running,
    /// The finest pass finished.
    Completed,
    /// A worker failed and the render was aborted.
    Error,
}

/// Snapshot of a render in progress.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderProgress {
    /// Current status.
    pub status: RenderStatus,
    /// Fraction of all tiles of all passes merged, in [0, 1].
    pub progress: f64,
    /// Tiles merged so far, across passes.
    pub tiles_processed: u64,
    /// Tiles in all passes.
    pub total_tiles: u64,
    /// Rays traced so far.
    pub rays: u64,
    /// Integration steps so far.
    pub steps: u64,
    /// Estimated time to completion.
    pub eta: Duration,
    /// Current shadow-radius estimate, once the finest pass has data.
    pub shadow_radius: Option<f64>,
    /// Largest step count of any ray so far.
    pub max_steps: u32,
    /// Index of the pass currently being dispatched.
    pub pass: usize,
    /// Stride of that pass.
    pub stride: u32,
    /// Tiles of that pass not yet handed to a worker.
    pub queued: usize,
    /// Time since the render started.
    pub elapsed: Duration,
    /// Worker error message, with [`RenderStatus::Error`].
    pub error: Option<String>,
}

/// Shared flag to stop a render from another thread.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Fresh, un-cancelled token.
    pub fn new() -> Self {
        CancelToken::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// True once [`CancelToken::cancel`] was called.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Totals for a finished render.
#[derive(Debug, Clone)]
pub struct RenderStats {
    /// Strides rendered.
    pub passes: Vec<u32>,
    /// Tiles merged, all passes.
    pub tiles: u64,
    /// Rays traced, all passes.
    pub rays: u64,
    /// Integration steps, all passes.
    pub steps: u64,
    /// Largest per-ray step count.
    pub max_steps: u32,
    /// Hit classes of the full-resolution pass.
    pub histogram: HitHistogram,
    /// Step statistics of the full-resolution pass.
    pub step_stats: StepStats,
    /// Shadow rim accumulators of the full-resolution pass.
    pub shadow: ShadowEstimate,
    /// Wall time.
    pub elapsed: Duration,
}

impl RenderStats {
    /// Measured shadow radius in units of M.
    pub fn shadow_radius(&self) -> Option<f64> {
        self.shadow.radius()
    }
}

/// A completed render.
#[derive(Debug, Clone)]
pub struct RenderOutput {
    /// The assembled frame.
    pub frame: FrameBuffer,
    /// Totals.
    pub stats: RenderStats,
    /// Path of the debug pixel from the finest pass that sampled it.
    pub debug_path: Option<DebugPath>,
}

struct TileQueue {
    queue: SegQueue<Tile>,
}

impl TileQueue {
    fn from_tiles(tiles: &[Tile]) -> Self {
        let queue = SegQueue::new();
        for &tile in tiles {
            queue.push(tile);
        }
        TileQueue { queue }
    }

    fn pop(&self) -> Option<Tile> {
        self.queue.pop()
    }

    fn len(&self) -> usize {
        self.queue.len()
    }
}

/// Hands out tiles pass by pass; pass k+1 starts only after every pass-k
/// tile has been handed out.
struct PassCursor<'a> {
    base: &'a PreparedParams,
    passes: &'a [u32],
    tiles: &'a [Tile],
    index: usize,
    queue: TileQueue,
    params: Arc<PreparedParams>,
}

impl<'a> PassCursor<'a> {
    fn new(base: &'a PreparedParams, passes: &'a [u32], tiles: &'a [Tile]) -> Self {
        PassCursor {
            base,
            passes,
            tiles,
            index: 0,
            queue: TileQueue::from_tiles(tiles),
            params: Arc::new(base.for_pass(passes[0])),
        }
    }

    fn stride(&self) -> u32 {
        self.passes[self.index]
    }

    /// (pass index, stride, tiles still queued in this pass)
    fn position(&self) -> (usize, u32, usize) {
        (self.index, self.stride(), self.queue.len())
    }

    fn next(&mut self) -> Option<(usize, u32, Arc<PreparedParams>, Tile)> {
        loop {
            if let Some(tile) = self.queue.pop() {
                return Some((self.index, self.stride(), Arc::clone(&self.params), tile));
            }
            if self.index + 1 >= self.passes.len() {
                return None;
            }
            self.index += 1;
            self.queue = TileQueue::from_tiles(self.tiles);
            self.params = Arc::new(self.base.for_pass(self.stride()));
            info!(
                "pass {} (stride {}, step {}, max steps {})",
                self.index,
                self.stride(),
                self.params.step_size,
                self.params.max_steps
            );
        }
    }
}

enum WorkerMessage {
    Done(Box<TileResult>),
    Failed {
        pass: usize,
        tile: Tile,
        message: String,
    },
}

type TileRenderer = fn(&TileRequest) -> Result<TileResult>;

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "worker panicked".to_string()
    }
}

/// Progressive, tiled renderer driving a pool of workers.
///
/// The controller thread is the only writer of the frame and of every
/// accumulator; workers share nothing and return one [`TileResult`] per
/// request over a channel.
pub struct RenderController {
    params: PreparedParams,
    num_threads: Option<usize>,
    passes: Option<Vec<u32>>,
    debug_pixel: Option<DebugPixel>,
    progress_callback: Option<Box<dyn Fn(RenderProgress) + Send + Sync>>,
    cancel: CancelToken,
    renderer: TileRenderer,
}

impl RenderController {
    /// Create a controller for the given parameters.
    ///
    /// # Errors
    /// Returns the validation error if the parameters are rejected.
    pub fn new(params: RenderParams) -> Result<Self> {
        Ok(RenderController {
            params: params.prepare()?,
            num_threads: None,
            passes: None,
            debug_pixel: None,
            progress_callback: None,
            cancel: CancelToken::new(),
            renderer: render_tile,
        })
    }

    /// Set the number of worker threads (builder method).
    /// If not specified, defaults to [`worker_count`].
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.num_threads = Some(threads.max(1));
        self
    }

    /// Override the pass schedule (builder method).
    /// If not specified, defaults to [`passes_for_resolution`].
    ///
    /// # Errors
    /// Returns an error unless the strides decrease strictly to 1.
    pub fn with_passes(mut self, passes: Vec<u32>) -> Result<Self> {
        validate_passes(&passes)?;
        self.passes = Some(passes);
        Ok(self)
    }

    /// Record the ray path of one pixel (builder method).
    pub fn with_debug_pixel(mut self, pixel: DebugPixel) -> Self {
        self.debug_pixel = Some(pixel);
        self
    }

    /// Set a progress callback invoked after every merged tile and on every
    /// status change (builder method).
    pub fn with_progress(mut self, callback: Box<dyn Fn(RenderProgress) + Send + Sync>) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    /// Use an externally owned cancellation token (builder method).
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    /// Token that cancels this controller's renders.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// The validated parameters.
    pub fn params(&self) -> &PreparedParams {
        &self.params
    }

    /// The pass schedule a render will use.
    pub fn passes(&self) -> Vec<u32> {
        self.passes
            .clone()
            .unwrap_or_else(|| passes_for_resolution(self.params.raw.resolution))
    }

    fn get_num_threads(&self) -> usize {
        self.num_threads.unwrap_or_else(worker_count)
    }

    fn spawn_tile(
        &self,
        pool: &rayon::ThreadPool,
        request: TileRequest,
        tx: Sender<WorkerMessage>,
        stop: Arc<AtomicBool>,
    ) {
        let cancel = self.cancel.clone();
        let renderer = self.renderer;
        debug!(
            "dispatch pass {} stride {} tile ({}, {})",
            request.pass, request.stride, request.tile.x, request.tile.y
        );
        pool.spawn(move || {
            if cancel.is_cancelled() || stop.load(Ordering::Acquire) {
                return;
            }
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| renderer(&request)));
            let message = match outcome {
                Ok(Ok(result)) => WorkerMessage::Done(Box::new(result)),
                Ok(Err(e)) => WorkerMessage::Failed {
                    pass: request.pass,
                    tile: request.tile,
                    message: e.to_string(),
                },
                Err(payload) => WorkerMessage::Failed {
                    pass: request.pass,
                    tile: request.tile,
                    message: panic_message(payload),
                },
            };
            // The controller may already have returned; nothing to do then.
            let _ = tx.send(message);
        });
    }

    /// Render every pass and return the finished frame.
    ///
    /// # Parameters
    /// - `progress_cb`: Optional callback for progress updates (overrides builder-set callback)
    ///
    /// # Errors
    /// Returns [`RenderError::Cancelled`] if the cancel token fires (status
    /// Idle), [`RenderError::WorkerFault`] if any tile fails (status Error),
    /// or a setup error if the worker pool cannot be built.
    pub fn render(
        &self,
        progress_cb: Option<&(dyn Fn(RenderProgress) + Sync)>,
    ) -> Result<RenderOutput> {
        let emit = |p: RenderProgress| {
            if let Some(cb) = progress_cb {
                cb(p);
            } else if let Some(cb) = &self.progress_callback {
                cb(p);
            }
        };

        let passes = self.passes();
        validate_passes(&passes)?;
        let resolution = self.params.raw.resolution;
        let (width, height) = (resolution, resolution);
        let tiles = tiles_for_frame(width, height, self.params.raw.tile_size);
        let total_tiles = (tiles.len() * passes.len()) as u64;
        let overlays = self.params.overlays();
        let num_threads = self.get_num_threads();

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .thread_name(|i| format!("render-worker-{}", i))
            .build()
            .map_err(|e| RenderError::Other(e.to_string()))?;

        info!(
            "render start: {}x{} px, {} tiles per pass, passes {:?}, {} workers",
            width,
            height,
            tiles.len(),
            passes,
            num_threads
        );

        let start_time = Instant::now();
        let (tx, rx) = mpsc::channel::<WorkerMessage>();
        let stop = Arc::new(AtomicBool::new(false));
        let mut cursor = PassCursor::new(&self.params, &passes, &tiles);
        let mut frame = FrameBuffer::new(width, height, overlays);

        let mut stats = RenderStats {
            passes: passes.clone(),
            tiles: 0,
            rays: 0,
            steps: 0,
            max_steps: 0,
            histogram: HitHistogram::default(),
            step_stats: StepStats::default(),
            shadow: ShadowEstimate::default(),
            elapsed: Duration::ZERO,
        };
        let mut tile_time = Duration::ZERO;
        let mut debug_path: Option<(usize, DebugPath)> = None;

        let snapshot = |status: RenderStatus,
                        stats: &RenderStats,
                        tile_time: Duration,
                        (pass, stride, queued): (usize, u32, usize)| {
            let remaining = total_tiles.saturating_sub(stats.tiles);
            let eta = if stats.tiles == 0 {
                Duration::ZERO
            } else {
                let avg = tile_time.as_secs_f64() / stats.tiles as f64;
                Duration::from_secs_f64(remaining as f64 * avg / num_threads as f64)
            };
            RenderProgress {
                status,
                progress: (stats.tiles as f64 / total_tiles.max(1) as f64).min(1.0),
                tiles_processed: stats.tiles,
                total_tiles,
                rays: stats.rays,
                steps: stats.steps,
                eta,
                shadow_radius: stats.shadow.radius(),
                max_steps: stats.max_steps,
                pass,
                stride,
                queued,
                elapsed: start_time.elapsed(),
                error: None,
            }
        };

        emit(snapshot(
            RenderStatus::Running,
            &stats,
            tile_time,
            cursor.position(),
        ));

        let make_request = |(pass, stride, params, tile): (usize, u32, Arc<PreparedParams>, Tile)| {
            TileRequest {
                params,
                tile,
                width,
                height,
                stride,
                pass,
                debug_pixel: self.debug_pixel,
                overlays,
            }
        };

        let mut in_flight = 0usize;
        for _ in 0..num_threads {
            match cursor.next() {
                Some(next) => {
                    self.spawn_tile(&pool, make_request(next), tx.clone(), Arc::clone(&stop));
                    in_flight += 1;
                }
                None => break,
            }
        }

        while in_flight > 0 {
            if self.cancel.is_cancelled() {
                stop.store(true, Ordering::Release);
                warn!(
                    "render cancelled after {} of {} tiles",
                    stats.tiles, total_tiles
                );
                stats.elapsed = start_time.elapsed();
                emit(snapshot(
                    RenderStatus::Idle,
                    &stats,
                    tile_time,
                    cursor.position(),
                ));
                return Err(RenderError::Cancelled);
            }

            let message = match rx.recv_timeout(POLL_INTERVAL) {
                Ok(message) => message,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(RenderError::Other("worker channel closed".to_string()));
                }
            };
            in_flight -= 1;

            let message = match message {
                WorkerMessage::Done(result) => match frame.merge(&result) {
                    Ok(()) => WorkerMessage::Done(result),
                    Err(e) => WorkerMessage::Failed {
                        pass: result.pass,
                        tile: result.tile,
                        message: e.to_string(),
                    },
                },
                failed => failed,
            };

            match message {
                WorkerMessage::Done(result) => {
                    let result = *result;
                    debug!(
                        "merged pass {} tile ({}, {}): {} rays in {:?}",
                        result.pass, result.tile.x, result.tile.y, result.rays, result.elapsed
                    );
                    stats.tiles += 1;
                    stats.rays += result.rays;
                    stats.steps += result.steps;
                    stats.max_steps = stats.max_steps.max(result.max_steps);
                    tile_time += result.elapsed;
                    if result.stride == 1 {
                        stats.shadow.merge(&result.shadow);
                        stats.histogram.merge(&result.histogram);
                        stats.step_stats.merge(&result.step_stats);
                    }
                    if let Some(path) = result.debug_path {
                        if debug_path.as_ref().map_or(true, |(p, _)| result.pass >= *p) {
                            debug_path = Some((result.pass, path));
                        }
                    }

                    if let Some(next) = cursor.next() {
                        self.spawn_tile(&pool, make_request(next), tx.clone(), Arc::clone(&stop));
                        in_flight += 1;
                    }
                    emit(snapshot(
                        RenderStatus::Running,
                        &stats,
                        tile_time,
                        cursor.position(),
                    ));
                }
                WorkerMessage::Failed {
                    pass,
                    tile,
                    message,
                } => {
                    stop.store(true, Ordering::Release);
                    error!(
                        "worker failed on pass {} tile ({}, {}): {}",
                        pass, tile.x, tile.y, message
                    );
                    stats.elapsed = start_time.elapsed();
                    let (_, _, queued) = cursor.position();
                    let mut report = snapshot(
                        RenderStatus::Error,
                        &stats,
                        tile_time,
                        (pass, passes[pass], queued),
                    );
                    report.error = Some(message.clone());
                    emit(report);
                    return Err(RenderError::WorkerFault {
                        pass,
                        tile,
                        message,
                    });
                }
            }
        }

        stats.elapsed = start_time.elapsed();
        info!(
            "render complete: {} rays, {} steps in {:.2}s, shadow radius {}",
            stats.rays,
            stats.steps,
            stats.elapsed.as_secs_f64(),
            stats
                .shadow_radius()
                .map_or_else(|| "n/a".to_string(), |r| format!("{:.4}", r))
        );
        emit(snapshot(
            RenderStatus::Completed,
            &stats,
            tile_time,
            cursor.position(),
        ));

        Ok(RenderOutput {
            frame,
            stats,
            debug_path: debug_path.map(|(_, path)| path),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn small_params() -> RenderParams {
        RenderParams {
            resolution: 32,
            tile_size: 16,
            max_steps: 3000,
            step_size: 0.1,
            ..RenderParams::default()
        }
    }

    #[test]
    fn default_pass_schedules() {
        assert_eq!(passes_for_resolution(256), vec![8, 4, 2, 1]);
        assert_eq!(passes_for_resolution(512), vec![8, 4, 2, 1]);
        assert_eq!(passes_for_resolution(513), vec![10, 6, 3, 2, 1]);
    }

    #[test]
    fn worker_count_is_bounded() {
        let n = worker_count();
        assert!((1..=4).contains(&n));
    }

    #[test]
    fn pass_validation() {
        assert!(validate_passes(&[4, 2, 1]).is_ok());
        assert!(validate_passes(&[1]).is_ok());
        assert!(validate_passes(&[]).is_err());
        assert!(validate_passes(&[4, 2]).is_err());
        assert!(validate_passes(&[2, 2, 1]).is_err());
        assert!(validate_passes(&[1, 2, 1]).is_err());
    }

    #[test]
    fn tile_queue_drains_in_order() {
        let tiles = tiles_for_frame(32, 32, 16);
        let queue = TileQueue::from_tiles(&tiles);
        assert_eq!(queue.len(), 4);
        assert_eq!(queue.pop(), Some(tiles[0]));
        let rest: Vec<_> = std::iter::from_fn(|| queue.pop()).collect();
        assert_eq!(rest, tiles[1..].to_vec());
    }

    #[test]
    fn cursor_walks_every_pass() {
        let base = small_params().prepare().unwrap();
        let passes = [4, 2, 1];
        let tiles = tiles_for_frame(32, 32, 16);
        let mut cursor = PassCursor::new(&base, &passes, &tiles);
        let handed: Vec<_> = std::iter::from_fn(|| cursor.next())
            .map(|(pass, stride, params, _)| (pass, stride, params.step_size))
            .collect();
        assert_eq!(handed.len(), 12);
        assert_eq!(handed[0].1, 4);
        assert_eq!(handed[4], (1, 2, 0.2));
        assert_eq!(handed[11].1, 1);
        assert!(handed.windows(2).all(|w| w[0].0 <= w[1].0));
    }

    #[test]
    fn render_completes_and_reports_progress() {
        let events = Mutex::new(Vec::new());
        let controller = RenderController::new(small_params())
            .unwrap()
            .with_threads(2)
            .with_passes(vec![4, 1])
            .unwrap();
        let record = |p: RenderProgress| events.lock().unwrap().push(p);
        let output = controller.render(Some(&record)).unwrap();

        let events = events.into_inner().unwrap();
        assert_eq!(events.first().unwrap().status, RenderStatus::Running);
        let last = events.last().unwrap();
        assert_eq!(last.status, RenderStatus::Completed);
        assert_eq!(last.tiles_processed, 8);
        assert_eq!(last.progress, 1.0);
        assert!(events.windows(2).all(|w| w[0].progress <= w[1].progress));

        assert_eq!(output.stats.tiles, 8);
        assert_eq!(output.stats.histogram.total(), 32 * 32);
        assert_eq!(output.stats.rays, 32 * 32 + 8 * 8);
        assert!(output.frame.pixels().chunks(4).all(|p| p[3] == 255));
        assert!(output.frame.coverage_at(31, 31) == Some(2));
    }

    #[test]
    fn cancel_from_progress_callback() {
        let token = CancelToken::new();
        let trigger = token.clone();
        let controller = RenderController::new(small_params())
            .unwrap()
            .with_threads(1)
            .with_cancel_token(token);
        let statuses = Mutex::new(Vec::new());
        let record = |p: RenderProgress| {
            if p.tiles_processed >= 1 {
                trigger.cancel();
            }
            statuses.lock().unwrap().push(p.status);
        };
        let result = controller.render(Some(&record));
        assert!(matches!(result, Err(RenderError::Cancelled)));
        assert_eq!(
            statuses.into_inner().unwrap().last(),
            Some(&RenderStatus::Idle)
        );
    }

    fn failing_renderer(request: &TileRequest) -> Result<TileResult> {
        if request.tile.x > 0 {
            panic!("synthetic tile failure");
        }
        render_tile(request)
    }

    #[test]
    fn worker_panic_aborts_render() {
        let mut controller = RenderController::new(small_params())
            .unwrap()
            .with_threads(1)
            .with_passes(vec![1])
            .unwrap();
        controller.renderer = failing_renderer;
        let errors = Mutex::new(Vec::new());
        let record = |p: RenderProgress| {
            if p.status == RenderStatus::Error {
                errors.lock().unwrap().push(p.error.clone());
            }
        };
        let result = controller.render(Some(&record));
        match result {
            Err(RenderError::WorkerFault { tile, message, .. }) => {
                assert_eq!(tile.x, 16);
                assert_eq!(message, "synthetic tile failure");
            }
            other => panic!("expected worker fault, got {:?}", other.map(|_| ())),
        }
        assert_eq!(
            errors.into_inner().unwrap(),
            vec![Some("synthetic tile failure".to_string())]
        );
    }

    fn truncating_renderer(request: &TileRequest) -> Result<TileResult> {
        let mut result = render_tile(request)?;
        if request.tile.y > 0 {
            result.pixels.truncate(4);
        }
        Ok(result)
    }

    #[test]
    fn malformed_tile_result_aborts_render() {
        let mut controller = RenderController::new(small_params())
            .unwrap()
            .with_threads(1)
            .with_passes(vec![1])
            .unwrap();
        controller.renderer = truncating_renderer;
        let events = Mutex::new(Vec::new());
        let record = |p: RenderProgress| events.lock().unwrap().push(p);
        let result = controller.render(Some(&record));
        match result {
            Err(RenderError::WorkerFault { tile, message, .. }) => {
                assert_eq!(tile.y, 16);
                assert!(message.contains("inconsistent"), "{}", message);
            }
            other => panic!("expected worker fault, got {:?}", other.map(|_| ())),
        }
        let events = events.into_inner().unwrap();
        let last = events.last().unwrap();
        assert_eq!(last.status, RenderStatus::Error);
        assert!(last.error.as_deref().unwrap().contains("inconsistent"));
        assert!(events.iter().all(|e| e.status != RenderStatus::Completed));
    }

    #[test]
    fn debug_path_is_returned() {
        let seen = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        let controller = RenderController::new(small_params())
            .unwrap()
            .with_threads(2)
            .with_passes(vec![2, 1])
            .unwrap()
            .with_debug_pixel(DebugPixel { x: 16, y: 16 })
            .with_progress(Box::new(move |_| {
                counter.fetch_add(1, Ordering::Relaxed);
            }));
        let output = controller.render(None).unwrap();
        // start + one per tile + completion
        assert_eq!(seen.load(Ordering::Relaxed), 1 + 8 + 1);
        let path = output.debug_path.unwrap();
        assert_eq!(path.pixel, DebugPixel { x: 16, y: 16 });
        assert!(!path.points.is_empty());
    }
}
