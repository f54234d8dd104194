//! Watch runner
//!
//! Drives capture, compare and act cycles over a configuration set, one cycle
//! at a time, on a dedicated worker thread.

use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use super::capture::Desktop;
use super::events::{CycleReport, EventHandler};
use super::set::ConfigurationSet;
use super::state::{WatchPhase, WatchStatus};
use super::trigger;
use crate::error::{Result, WatchError};

/// How the next cycle is timed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Pacing {
    /// Wait the full interval after the previous cycle finished
    #[default]
    FixedDelay,
    /// Start cycles one interval apart, measured start to start. A cycle that
    /// overruns its interval is followed immediately by the next one, never
    /// overlapped.
    FixedRate,
}

/// Runner options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunnerOptions {
    pub pacing: Pacing,
    /// Run the first cycle right away instead of after one interval
    pub run_immediately: bool,
}

impl RunnerOptions {
    pub fn with_pacing(mut self, pacing: Pacing) -> Self {
        self.pacing = pacing;
        self
    }

    pub fn immediately(mut self) -> Self {
        self.run_immediately = true;
        self
    }
}

/// Owns the configuration set and runs single cycles against it
pub struct Scheduler {
    set: ConfigurationSet,
    desktop: Desktop,
    events: EventHandler,
    cycle: u64,
}

impl Scheduler {
    pub fn new(set: ConfigurationSet, desktop: Desktop) -> Self {
        Self {
            set,
            desktop,
            events: EventHandler::new(),
            cycle: 0,
        }
    }

    /// Register a listener for every cycle report
    pub fn on_cycle<F>(&mut self, callback: F)
    where
        F: Fn(&CycleReport) + Send + Sync + 'static,
    {
        self.events.on_cycle(Box::new(callback));
    }

    pub fn set(&self) -> &ConfigurationSet {
        &self.set
    }

    pub fn rotation_index(&self) -> usize {
        self.set.rotation_index()
    }

    /// Interval of the configuration used by `report`
    pub fn interval_after(&self, report: &CycleReport) -> Duration {
        let ms = self
            .set
            .get(report.config_index)
            .map(|c| c.interval_ms)
            .unwrap_or_else(|| self.set.active().interval_ms);
        Duration::from_millis(ms)
    }

    /// Run one cycle against the active configuration.
    ///
    /// The region is captured once, compared against the reference states in
    /// order, and the action runs on the first match. Errors end the cycle
    /// early and are carried in the report.
    pub fn run_cycle(&mut self) -> CycleReport {
        let started_at = Instant::now();
        self.cycle += 1;

        let config_index = self.set.rotation_index();
        let config = self.set.active();
        let config_label = config.label();

        let mut evaluation = None;
        let mut action = None;
        let mut error = None;

        let captured = self.desktop.capture_for(config);
        let capture_duration = started_at.elapsed();
        let outcome = captured.and_then(|grid| trigger::process(config, &grid, &self.desktop));

        match outcome {
            Ok(outcome) => {
                evaluation = Some(outcome.evaluation);
                if let Some(report) = outcome.action {
                    error = report.error.clone();
                    action = Some(report);
                }
            }
            Err(e) => error = Some(e),
        }

        let fired = action.as_ref().map(|a| a.fired()).unwrap_or(false);
        if fired && self.set.len() > 1 {
            let next = self.set.advance();
            log::debug!("Rotation advanced to configuration #{}", next);
        }

        let report = CycleReport {
            cycle: self.cycle,
            config_index,
            config_label,
            evaluation,
            action,
            error,
            rotation_index: self.set.rotation_index(),
            started_at,
            capture_duration,
            duration: started_at.elapsed(),
        };

        log_report(&report, self.set.get(config_index).map(|c| c.similarity_threshold));
        self.events.emit(&report);
        report
    }
}

fn log_report(report: &CycleReport, threshold: Option<f64>) {
    let label = &report.config_label;
    let percent = |v: f64| v * 100.0;

    if let Some(ref e) = report.error {
        match report.similarity() {
            Some(s) => log::warn!(
                "[{}] cycle {} failed after similarity {:.2}%: {}",
                label,
                report.cycle,
                percent(s),
                e
            ),
            None => log::warn!(
                "[{}] cycle {} failed after {:?} in capture: {}",
                label,
                report.cycle,
                report.capture_duration,
                e
            ),
        }
        return;
    }

    match (report.evaluation, &report.action) {
        (Some(eval), Some(action)) => log::info!(
            "[{}] cycle {}: state #{} matched at {:.2}%, clicked {}, pointer restored to {} (capture {:?}, total {:?})",
            label,
            report.cycle,
            eval.matched_state().unwrap_or_default(),
            percent(eval.similarity()),
            action.clicked_at.map(|p| p.to_string()).unwrap_or_default(),
            action.original.map(|p| p.to_string()).unwrap_or_default(),
            report.capture_duration,
            report.duration
        ),
        (Some(eval), None) => log::info!(
            "[{}] cycle {}: best similarity {:.2}% below threshold {:.2}%, no action (capture {:?}, total {:?})",
            label,
            report.cycle,
            percent(eval.similarity()),
            percent(threshold.unwrap_or(1.0)),
            report.capture_duration,
            report.duration
        ),
        _ => {}
    }
}

/// Stop request that can interrupt the wait between cycles
#[derive(Default)]
pub struct ShutdownSignal {
    requested: Mutex<bool>,
    condvar: Condvar,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the runner to stop after the cycle in flight
    pub fn request(&self) {
        *self.requested.lock() = true;
        self.condvar.notify_all();
    }

    /// Clear a previous request so the signal can stop the next run
    pub fn reset(&self) {
        *self.requested.lock() = false;
    }

    pub fn is_requested(&self) -> bool {
        *self.requested.lock()
    }

    /// Sleep for `timeout` or until a stop is requested.
    /// Returns true if a stop was requested.
    pub fn wait(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut requested = self.requested.lock();
        while !*requested {
            if self.condvar.wait_until(&mut requested, deadline).timed_out() {
                break;
            }
        }
        *requested
    }
}

/// Runs a scheduler on a worker thread until stopped
pub struct Watcher {
    status: Arc<Mutex<WatchStatus>>,
    shutdown: Arc<ShutdownSignal>,
    worker: Option<JoinHandle<()>>,
}

impl Watcher {
    pub fn new() -> Self {
        Self {
            status: Arc::new(Mutex::new(WatchStatus::default())),
            shutdown: Arc::new(ShutdownSignal::new()),
            worker: None,
        }
    }

    /// Start cycling `scheduler` on a new thread
    pub fn start(&mut self, scheduler: Scheduler, options: RunnerOptions) -> Result<()> {
        if self.worker.is_some() {
            return Err(WatchError::AlreadyRunning);
        }

        self.shutdown.reset();
        let shutdown = self.shutdown.clone();
        *self.status.lock() = WatchStatus::new(scheduler.set().len());

        let status = self.status.clone();
        let handle = thread::Builder::new()
            .name("region-watch".to_string())
            .spawn(move || run_watch_loop(scheduler, status, shutdown, options))?;

        self.worker = Some(handle);
        log::info!("Watcher started ({:?})", options.pacing);
        Ok(())
    }

    /// Stop after the cycle in flight finishes and wait for the worker to exit
    pub fn stop(&mut self) {
        self.shutdown.request();
        if self.join_worker() {
            log::info!("Watcher stopped");
        }
        self.status.lock().phase = WatchPhase::Stopped;
    }

    /// Shared stop hook, usable from other threads.
    ///
    /// The same signal serves every run of this watcher, so a handle taken
    /// before `start` stops the run started afterwards.
    pub fn shutdown_signal(&self) -> Arc<ShutdownSignal> {
        self.shutdown.clone()
    }

    /// Block until the worker exits
    pub fn wait(&mut self) {
        self.join_worker();
    }

    fn join_worker(&mut self) -> bool {
        match self.worker.take() {
            Some(handle) => {
                if handle.join().is_err() {
                    log::error!("Watcher thread panicked");
                }
                true
            }
            None => false,
        }
    }

    pub fn status(&self) -> WatchStatus {
        self.status.lock().clone()
    }

    pub fn status_json(&self) -> String {
        self.status.lock().to_json()
    }

    pub fn is_running(&self) -> bool {
        self.worker.as_ref().map(|h| !h.is_finished()).unwrap_or(false)
    }
}

impl Default for Watcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Watcher {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Worker loop: cycle, wait, repeat until shutdown
fn run_watch_loop(
    mut scheduler: Scheduler,
    status: Arc<Mutex<WatchStatus>>,
    shutdown: Arc<ShutdownSignal>,
    options: RunnerOptions,
) {
    if !options.run_immediately {
        let first = Duration::from_millis(scheduler.set().active().interval_ms);
        if shutdown.wait(first) {
            status.lock().phase = WatchPhase::Stopped;
            return;
        }
    }

    let mut next_start = Instant::now();

    while !shutdown.is_requested() {
        let report = scheduler.run_cycle();
        status.lock().record(&report);

        let interval = scheduler.interval_after(&report);
        let wait = match options.pacing {
            Pacing::FixedDelay => interval,
            Pacing::FixedRate => {
                next_start += interval;
                let now = Instant::now();
                if next_start < now {
                    log::debug!("Cycle {} overran its interval", report.cycle);
                    next_start = now;
                }
                next_start - now
            }
        };

        if shutdown.wait(wait) {
            break;
        }
    }

    status.lock().phase = WatchPhase::Stopped;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vision::capture::MockDesktop;
    use crate::vision::config::WatchConfig;
    use crate::vision::capture::RegionCapture;
    use crate::vision::grid::{ColorGrid, Point, Rgb};

    fn config(color: Rgb, interval_ms: u64) -> WatchConfig {
        WatchConfig::new(Point::new(0, 0), Point::new(1, 1))
            .with_state(ColorGrid::filled(2, 2, color).unwrap())
            .with_threshold(0.9)
            .with_interval(interval_ms)
    }

    fn frame(color: Rgb) -> ColorGrid {
        ColorGrid::filled(2, 2, color).unwrap()
    }

    fn scheduler(configs: Vec<WatchConfig>, mock: &Arc<MockDesktop>) -> Scheduler {
        let set = ConfigurationSet::new(configs).unwrap();
        Scheduler::new(set, Desktop::from_shared(mock.clone()))
    }

    /// Capture that takes a fixed time and records when each call ran
    struct SlowCapture {
        inner: Arc<MockDesktop>,
        delay: Duration,
        spans: Mutex<Vec<(Instant, Instant)>>,
    }

    impl SlowCapture {
        fn new(inner: Arc<MockDesktop>, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                inner,
                delay,
                spans: Mutex::new(Vec::new()),
            })
        }

        fn spans(&self) -> Vec<(Instant, Instant)> {
            self.spans.lock().clone()
        }

        fn start_gaps(&self) -> Vec<Duration> {
            self.spans()
                .windows(2)
                .map(|w| w[1].0.duration_since(w[0].0))
                .collect()
        }
    }

    impl RegionCapture for SlowCapture {
        fn capture_region(&self, top_left: Point, bottom_right: Point) -> Result<ColorGrid> {
            let start = Instant::now();
            thread::sleep(self.delay);
            let grid = self.inner.capture_region(top_left, bottom_right);
            self.spans.lock().push((start, Instant::now()));
            grid
        }
    }

    /// Run `scheduler` until `capture` has seen `cycles` captures
    fn run_until_captures(scheduler: Scheduler, options: RunnerOptions, capture: &SlowCapture, cycles: usize) {
        let mut watcher = Watcher::new();
        watcher.start(scheduler, options).unwrap();
        let deadline = Instant::now() + Duration::from_secs(20);
        while capture.spans().len() < cycles && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        watcher.stop();
        assert!(capture.spans().len() >= cycles);
    }

    fn slow_scheduler(interval_ms: u64, delay: Duration) -> (Scheduler, Arc<SlowCapture>) {
        // No match: the pacing alone decides when cycles start
        let mock = Arc::new(MockDesktop::new().with_frame(frame(Rgb::WHITE)));
        let capture = SlowCapture::new(mock.clone(), delay);
        let set = ConfigurationSet::new(vec![config(Rgb::BLACK, interval_ms)]).unwrap();
        let desktop = Desktop::from_shared(mock).with_capture(capture.clone());
        (Scheduler::new(set, desktop), capture)
    }

    #[test]
    fn test_match_advances_rotation() {
        let mock = Arc::new(MockDesktop::new().with_frame(frame(Rgb::BLACK)));
        let mut s = scheduler(vec![config(Rgb::BLACK, 10), config(Rgb::WHITE, 20)], &mock);

        let report = s.run_cycle();
        assert!(report.fired());
        assert_eq!(report.config_index, 0);
        assert_eq!(report.rotation_index, 1);
        assert_eq!(s.interval_after(&report), Duration::from_millis(10));
    }

    #[test]
    fn test_no_match_keeps_rotation() {
        let mock = Arc::new(MockDesktop::new().with_frame(frame(Rgb::WHITE)));
        let mut s = scheduler(vec![config(Rgb::BLACK, 10), config(Rgb::WHITE, 20)], &mock);

        let report = s.run_cycle();
        assert!(!report.matched());
        assert_eq!(report.rotation_index, 0);
        assert!(mock.clicks().is_empty());
    }

    #[test]
    fn test_rotation_wraps_after_two_matches() {
        let mock = Arc::new(MockDesktop::new());
        mock.push_frame(frame(Rgb::BLACK));
        mock.push_frame(frame(Rgb::WHITE));
        let mut s = scheduler(vec![config(Rgb::BLACK, 10), config(Rgb::WHITE, 20)], &mock);

        assert_eq!(s.run_cycle().rotation_index, 1);
        let second = s.run_cycle();
        assert_eq!(second.config_index, 1);
        assert_eq!(second.rotation_index, 0);
        assert_eq!(s.interval_after(&second), Duration::from_millis(20));
        assert_eq!(mock.capture_count(), 2);
    }

    #[test]
    fn test_capture_error_does_not_stop_next_cycle() {
        let mock = Arc::new(MockDesktop::new().with_frame(frame(Rgb::BLACK)));
        let mut s = scheduler(vec![config(Rgb::BLACK, 10), config(Rgb::WHITE, 20)], &mock);

        mock.fail_capture(true);
        let failed = s.run_cycle();
        assert!(matches!(failed.error, Some(WatchError::Capture(_))));
        assert!(failed.evaluation.is_none());
        assert_eq!(failed.rotation_index, 0);

        mock.fail_capture(false);
        let ok = s.run_cycle();
        assert!(ok.fired());
        assert_eq!(ok.cycle, 2);
    }

    #[test]
    fn test_wrong_capture_shape_is_format_error() {
        let mock = Arc::new(MockDesktop::new().with_frame(ColorGrid::filled(4, 4, Rgb::BLACK).unwrap()));
        let mut s = scheduler(vec![config(Rgb::BLACK, 10)], &mock);

        let report = s.run_cycle();
        assert!(matches!(report.error, Some(WatchError::Format(_))));
    }

    #[test]
    fn test_failed_click_does_not_advance() {
        let mock = Arc::new(MockDesktop::new().with_frame(frame(Rgb::BLACK)));
        mock.fail_click(true);
        let mut s = scheduler(vec![config(Rgb::BLACK, 10), config(Rgb::WHITE, 20)], &mock);

        let report = s.run_cycle();
        assert!(report.matched());
        assert!(!report.fired());
        assert!(matches!(report.error, Some(WatchError::Injection(_))));
        assert_eq!(report.rotation_index, 0);
    }

    #[test]
    fn test_failed_restore_still_advances() {
        let mock = Arc::new(MockDesktop::new().with_frame(frame(Rgb::BLACK)));
        mock.fail_move(true);
        let mut s = scheduler(vec![config(Rgb::BLACK, 10), config(Rgb::WHITE, 20)], &mock);

        let report = s.run_cycle();
        assert!(report.fired());
        assert!(report.is_error());
        assert_eq!(report.rotation_index, 1);
    }

    #[test]
    fn test_listeners_receive_reports() {
        let mock = Arc::new(MockDesktop::new().with_frame(frame(Rgb::BLACK)));
        let mut s = scheduler(vec![config(Rgb::BLACK, 10)], &mock);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        s.on_cycle(move |r| sink.lock().push(r.cycle));

        s.run_cycle();
        s.run_cycle();
        assert_eq!(*seen.lock(), vec![1, 2]);
    }

    #[test]
    fn test_shutdown_signal_interrupts_wait() {
        let signal = Arc::new(ShutdownSignal::new());
        assert!(!signal.wait(Duration::from_millis(1)));

        let remote = signal.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            remote.request();
        });

        let start = Instant::now();
        assert!(signal.wait(Duration::from_secs(30)));
        assert!(start.elapsed() < Duration::from_secs(10));
        handle.join().unwrap();
    }

    #[test]
    fn test_watcher_runs_and_stops() {
        let mock = Arc::new(MockDesktop::new().with_frame(frame(Rgb::BLACK)));
        let s = scheduler(vec![config(Rgb::BLACK, 1), config(Rgb::BLACK, 1)], &mock);

        let mut watcher = Watcher::new();
        watcher.start(s, RunnerOptions::default().immediately()).unwrap();
        assert_eq!(
            watcher.start(scheduler(vec![config(Rgb::BLACK, 1)], &mock), RunnerOptions::default()),
            Err(WatchError::AlreadyRunning)
        );

        let deadline = Instant::now() + Duration::from_secs(10);
        while watcher.status().cycles < 3 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        watcher.stop();

        let status = watcher.status();
        assert!(status.cycles >= 3);
        assert_eq!(status.phase, WatchPhase::Stopped);
        assert_eq!(status.config_count, 2);
        assert!(!watcher.is_running());
        assert_eq!(mock.clicks().len() as u64, status.actions);
    }

    #[test]
    fn test_report_carries_capture_duration() {
        let (mut s, _capture) = slow_scheduler(10, Duration::from_millis(30));

        let report = s.run_cycle();
        assert!(report.capture_duration >= Duration::from_millis(30));
        assert!(report.duration >= report.capture_duration);
    }

    #[test]
    fn test_fixed_delay_waits_interval_after_cycle_ends() {
        let delay = Duration::from_millis(40);
        let (s, capture) = slow_scheduler(30, delay);

        run_until_captures(s, RunnerOptions::default().immediately(), &capture, 4);

        for gap in capture.start_gaps() {
            assert!(gap >= delay + Duration::from_millis(30), "gap {:?}", gap);
        }
    }

    #[test]
    fn test_fixed_rate_spaces_cycle_starts() {
        let (s, capture) = slow_scheduler(60, Duration::from_millis(30));
        let options = RunnerOptions::default()
            .immediately()
            .with_pacing(Pacing::FixedRate);

        run_until_captures(s, options, &capture, 4);

        let gaps: Vec<Duration> = capture.start_gaps().into_iter().take(3).collect();
        for gap in &gaps {
            assert!(*gap >= Duration::from_millis(50), "gap {:?}", gap);
        }
        // Fixed delay would need 3 x (30 + 60) ms
        let total: Duration = gaps.iter().sum();
        assert!(total < Duration::from_millis(260), "total {:?}", total);
    }

    #[test]
    fn test_fixed_rate_overrun_never_overlaps() {
        let (s, capture) = slow_scheduler(20, Duration::from_millis(60));
        let options = RunnerOptions::default()
            .immediately()
            .with_pacing(Pacing::FixedRate);

        run_until_captures(s, options, &capture, 4);

        for pair in capture.spans().windows(2) {
            assert!(pair[1].0 >= pair[0].1);
        }
    }

    #[test]
    fn test_shutdown_hook_taken_before_start_stops_worker() {
        let mock = Arc::new(MockDesktop::new().with_frame(frame(Rgb::WHITE)));
        let mut watcher = Watcher::new();
        let hook = watcher.shutdown_signal();

        watcher
            .start(scheduler(vec![config(Rgb::BLACK, 5)], &mock), RunnerOptions::default().immediately())
            .unwrap();
        hook.request();

        let deadline = Instant::now() + Duration::from_secs(10);
        while watcher.is_running() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert!(!watcher.is_running());
        let cycles = watcher.status().cycles;
        thread::sleep(Duration::from_millis(50));
        assert_eq!(watcher.status().cycles, cycles);
        watcher.wait();
    }

    #[test]
    fn test_watcher_restarts_after_stop() {
        let mock = Arc::new(MockDesktop::new().with_frame(frame(Rgb::WHITE)));
        let mut watcher = Watcher::new();
        let hook = watcher.shutdown_signal();

        watcher
            .start(scheduler(vec![config(Rgb::BLACK, 5)], &mock), RunnerOptions::default())
            .unwrap();
        watcher.stop();
        assert!(hook.is_requested());

        watcher
            .start(scheduler(vec![config(Rgb::BLACK, 5)], &mock), RunnerOptions::default().immediately())
            .unwrap();
        assert!(!hook.is_requested());

        let deadline = Instant::now() + Duration::from_secs(10);
        while watcher.status().cycles < 2 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert!(watcher.status().cycles >= 2);

        hook.request();
        watcher.wait();
        assert!(!watcher.is_running());
    }

    #[test]
    fn test_wait_returns_after_worker_panic() {
        let mock = Arc::new(MockDesktop::new().with_frame(frame(Rgb::BLACK)));
        let mut s = scheduler(vec![config(Rgb::BLACK, 5)], &mock);
        s.on_cycle(|_| panic!("listener failed"));

        let mut watcher = Watcher::new();
        watcher.start(s, RunnerOptions::default().immediately()).unwrap();
        watcher.wait();

        assert!(!watcher.is_running());
        assert_eq!(mock.capture_count(), 1);
    }

    #[test]
    fn test_stop_during_first_interval() {
        let mock = Arc::new(MockDesktop::new().with_frame(frame(Rgb::BLACK)));
        let s = scheduler(vec![config(Rgb::BLACK, 60_000)], &mock);

        let mut watcher = Watcher::new();
        watcher.start(s, RunnerOptions::default()).unwrap();
        thread::sleep(Duration::from_millis(10));
        assert_eq!(watcher.status().phase, WatchPhase::Idle);

        let start = Instant::now();
        watcher.stop();
        assert!(start.elapsed() < Duration::from_secs(10));
        assert_eq!(mock.capture_count(), 0);
    }
}
