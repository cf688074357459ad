use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Result;

/// Raw reading from a [`TimeSource`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeSample {
    /// Elapsed wall-clock or simulated time in seconds.
    pub seconds: f32,
    /// Frame counter as seen by the source.
    pub frame_index: u64,
}

impl TimeSample {
    pub fn new(seconds: f32, frame_index: u64) -> Self {
        Self {
            seconds,
            frame_index,
        }
    }
}

/// Abstraction over where time values originate from.
pub trait TimeSource: Send {
    /// Resets the source to its initial state.
    fn reset(&mut self);
    /// Produces a time sample for the next frame.
    fn sample(&mut self) -> TimeSample;
}

/// Time source backed by the system monotonic clock.
#[derive(Debug, Clone, Copy)]
pub struct SystemTimeSource {
    origin: Instant,
    frame: u64,
}

impl SystemTimeSource {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Default for SystemTimeSource {
    fn default() -> Self {
        Self {
            origin: Instant::now(),
            frame: 0,
        }
    }
}

impl TimeSource for SystemTimeSource {
    fn reset(&mut self) {
        self.origin = Instant::now();
        self.frame = 0;
    }

    fn sample(&mut self) -> TimeSample {
        let sample = TimeSample::new(self.origin.elapsed().as_secs_f32(), self.frame);
        self.frame = self.frame.saturating_add(1);
        sample
    }
}

/// Always reports the same timestamp. Used for still captures.
#[derive(Debug, Clone, Copy)]
pub struct FixedTimeSource {
    time: f32,
    frame: u64,
}

impl FixedTimeSource {
    pub fn new(time: f32) -> Self {
        Self { time, frame: 0 }
    }

    pub fn time(&self) -> f32 {
        self.time
    }
}

impl TimeSource for FixedTimeSource {
    fn reset(&mut self) {
        self.frame = 0;
    }

    fn sample(&mut self) -> TimeSample {
        let sample = TimeSample::new(self.time, self.frame);
        self.frame = self.frame.saturating_add(1);
        sample
    }
}

/// Advances by a fixed step per sample regardless of wall-clock time, so
/// headless runs produce the same frames on every machine.
#[derive(Debug, Clone, Copy)]
pub struct SteppedTimeSource {
    step: f32,
    frame: u64,
}

impl SteppedTimeSource {
    pub fn new(step: f32) -> Self {
        Self { step, frame: 0 }
    }

    /// Step matching a nominal frame rate; non-positive rates fall back to 60.
    pub fn from_fps(fps: f32) -> Self {
        let fps = if fps > 0.0 && fps.is_finite() { fps } else { 60.0 };
        Self::new(1.0 / fps)
    }
}

impl TimeSource for SteppedTimeSource {
    fn reset(&mut self) {
        self.frame = 0;
    }

    fn sample(&mut self) -> TimeSample {
        let sample = TimeSample::new(self.frame as f32 * self.step, self.frame);
        self.frame = self.frame.saturating_add(1);
        sample
    }
}

/// Convenient alias for owning time sources behind trait objects.
pub type BoxedTimeSource = Box<dyn TimeSource + Send>;

/// Timing handed to each frame callback.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameTime {
    /// Seconds since the loop started; never decreases.
    pub elapsed: f32,
    /// Seconds since the previous tick (0 on the first).
    pub delta: f32,
    /// Number of ticks delivered before this one.
    pub frame_index: u64,
}

/// Stops a [`FrameLoop`] from any thread. Takes effect before the next tick.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Cooperative single-threaded frame driver.
///
/// Each tick samples the time source and runs one callback to completion
/// before the next tick can start. Once cancelled the loop stays dead; create
/// a new one to animate again. Cancelling does not release any GPU objects
/// the callback owns.
pub struct FrameLoop {
    source: BoxedTimeSource,
    cancel: CancelHandle,
    last_elapsed: Option<f32>,
    frames: u64,
}

impl FrameLoop {
    /// Resets `source` and returns a loop that is already running.
    pub fn start(mut source: BoxedTimeSource) -> Self {
        source.reset();
        Self {
            source,
            cancel: CancelHandle::default(),
            last_elapsed: None,
            frames: 0,
        }
    }

    /// Loop driven by the wall clock.
    pub fn system() -> Self {
        Self::start(Box::new(SystemTimeSource::new()))
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_running(&self) -> bool {
        !self.cancel.is_cancelled()
    }

    /// Ticks delivered so far.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Runs `callback` for one frame, or returns `None` once cancelled.
    pub fn tick<R>(&mut self, callback: impl FnOnce(FrameTime) -> R) -> Option<R> {
        if self.cancel.is_cancelled() {
            return None;
        }

        let sample = self.source.sample();
        let previous = self.last_elapsed;
        let floor = previous.unwrap_or(0.0);
        // Sources that step backwards or misbehave are clamped to the last
        // value so elapsed time never decreases.
        let elapsed = if sample.seconds.is_finite() {
            sample.seconds.max(floor)
        } else {
            floor
        };
        if sample.seconds < floor {
            tracing::trace!(
                sample = sample.seconds,
                clamped = elapsed,
                "time source stepped backwards"
            );
        }
        let time = FrameTime {
            elapsed,
            delta: previous.map_or(0.0, |previous| elapsed - previous),
            frame_index: self.frames,
        };
        self.last_elapsed = Some(elapsed);
        self.frames += 1;
        Some(callback(time))
    }

    /// Ticks until cancelled, pacing with `pacer` between frames. A callback
    /// error stops the loop and is returned. Yields the number of frames run.
    pub fn run<F>(&mut self, pacer: &mut FramePacer, mut callback: F) -> Result<u64>
    where
        F: FnMut(FrameTime, &CancelHandle) -> Result<()>,
    {
        let handle = self.cancel_handle();
        let first = self.frames;
        loop {
            if !self.is_running() {
                break;
            }
            pacer.wait();
            match self.tick(|time| callback(time, &handle)) {
                Some(result) => {
                    if let Err(err) = result {
                        self.cancel();
                        return Err(err);
                    }
                }
                None => break,
            }
        }
        let frames = self.frames - first;
        tracing::debug!(frames, "frame loop finished");
        Ok(frames)
    }
}

/// Spaces frames at a target rate. Without a cap every frame is ready
/// immediately. A pacer that falls behind by more than one interval skips
/// ahead rather than bursting to catch up.
#[derive(Debug, Clone)]
pub struct FramePacer {
    interval: Option<Duration>,
    next: Option<Instant>,
}

/// Frames this close to their deadline count as due.
const DEADLINE_SLACK: Duration = Duration::from_micros(250);

impl FramePacer {
    /// `None`, zero or negative rates mean uncapped.
    pub fn new(target_fps: Option<f32>) -> Self {
        let interval = target_fps
            .filter(|fps| *fps > 0.0 && fps.is_finite())
            .map(|fps| Duration::from_secs_f32(1.0 / fps));
        Self {
            interval,
            next: None,
        }
    }

    pub fn interval(&self) -> Option<Duration> {
        self.interval
    }

    /// When the next frame is due, if capped and already started.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.next
    }

    /// Returns whether a frame may render at `now`, consuming the slot if so.
    pub fn ready(&mut self, now: Instant) -> bool {
        let Some(interval) = self.interval else {
            return true;
        };
        match self.next {
            Some(deadline) if now + DEADLINE_SLACK < deadline => false,
            Some(deadline) => {
                let following = deadline + interval;
                self.next = Some(if now > following { now + interval } else { following });
                true
            }
            None => {
                self.next = Some(now + interval);
                true
            }
        }
    }

    /// Blocks until the next frame is due, then consumes it.
    pub fn wait(&mut self) {
        if let (Some(_), Some(deadline)) = (self.interval, self.next) {
            let now = Instant::now();
            if deadline > now {
                thread::sleep(deadline - now);
            }
        }
        self.ready(Instant::now());
    }
}
