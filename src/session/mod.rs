//! Session State Machine
//!
//! One owned `Session` per ritual: Idle → Active → Crystallizing → Complete.
//! Everything runs on the caller's thread. The host drives time with
//! [`Session::advance`] (audio blocks and timers, in time order) and
//! [`Session::render_frame`] (the render loop), and sends commands such as
//! [`Session::interact`] and [`Session::end_ritual`]. The session reports
//! back only through events from [`Session::subscribe`].
//!
//! Two guards keep the ending deterministic:
//! - leaving Active happens once, for the first of natural end, end command
//!   or countdown expiry;
//! - completion happens once, for the first of recorder acknowledgement or
//!   the fallback timer, through a [`CompletionLatch`].

mod events;
mod hints;
mod state;

pub use events::{DiagnosticLevel, EventBus, SessionEvent};
pub use state::{EndReason, SessionState};

use std::time::Duration;

use crossbeam::channel::Receiver;
use tracing::{debug, info, warn};

use crate::capture::{Artifact, ChunkRecorder, CompletionLatch, CompletionSource, Recorder, RecordingFormat};
use crate::config::{CountdownMode, SessionConfig};
use crate::dsp::{AudioBackend, EqGraphController, NullBackend};
use crate::engine::{decode_clip, AudioBuffer, Scheduler, TimerId};
use crate::error::{Result, RitualError};
use crate::grid::{EqState, FinalEqState, GridCell};
use crate::input::{map_contacts, Contact, SurfaceRect};
use crate::visual::{FrameStats, VisualGrid};
use hints::HintSequencer;

const COUNTDOWN_PERIOD: Duration = Duration::from_secs(1);

/// Timers owned by a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SessionTimer {
    CountdownTick,
    HintShow(usize),
    HintHide(usize),
    CompletionFallback,
}

pub struct Session {
    config: SessionConfig,
    state: SessionState,

    backend: Box<dyn AudioBackend>,
    recorder: Box<dyn Recorder>,
    graph: EqGraphController,
    visual: VisualGrid,

    scheduler: Scheduler<SessionTimer>,
    countdown: Option<TimerId>,
    fallback: Option<TimerId>,
    hints: HintSequencer,
    events: EventBus,

    eq_state: EqState,
    final_eq: FinalEqState,

    /// Resolved session length
    duration_secs: f64,
    remaining_secs: u64,
    /// Time spent Active and not paused
    active_elapsed: Duration,
    in_final_window: bool,

    paused_at: Option<Duration>,
    end_reason: Option<EndReason>,
    latch: CompletionLatch,
    artifact: Option<Artifact>,
    torn_down: bool,
}

impl Session {
    /// Create an idle session. The configuration is validated here.
    pub fn new(config: SessionConfig, backend: Box<dyn AudioBackend>, recorder: Box<dyn Recorder>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            visual: VisualGrid::new(&config),
            hints: HintSequencer::new(config.hints.clone()),
            config,
            state: SessionState::Idle,
            backend,
            recorder,
            graph: EqGraphController::default(),
            scheduler: Scheduler::new(),
            countdown: None,
            fallback: None,
            events: EventBus::new(),
            eq_state: EqState::new(),
            final_eq: FinalEqState::new(),
            duration_secs: 0.0,
            remaining_secs: 0,
            active_elapsed: Duration::ZERO,
            in_final_window: false,
            paused_at: None,
            end_reason: None,
            latch: CompletionLatch::new(),
            artifact: None,
            torn_down: false,
        })
    }

    /// Session with a discarding audio output and an in-memory recorder
    pub fn headless(config: SessionConfig) -> Result<Self> {
        let recorder = ChunkRecorder::new(config.recorder_chunk_frames);
        Self::new(config, Box::new(NullBackend), Box::new(recorder))
    }

    /// Subscribe to session events. The receiver is unbounded; drain it or
    /// use [`Session::subscribe_bounded`].
    pub fn subscribe(&mut self) -> Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Subscribe with a cap on undelivered events; overflow is dropped
    pub fn subscribe_bounded(&mut self, capacity: usize) -> Receiver<SessionEvent> {
        self.events.subscribe_bounded(capacity)
    }

    // ========================================================================
    // Commands
    // ========================================================================

    /// Load a decoded clip and go Active.
    ///
    /// Only valid from Idle. On error the session stays Idle with no partial
    /// state.
    pub fn start(&mut self, source: AudioBuffer) -> Result<()> {
        self.require_idle()?;
        if source.is_empty() {
            return Err(RitualError::EmptyAudio);
        }

        self.torn_down = false;
        self.duration_secs = self.config.duration_policy.resolve(source.duration_secs());
        self.remaining_secs = self.duration_secs.ceil().max(0.0) as u64;
        self.active_elapsed = Duration::ZERO;
        self.in_final_window = false;

        let format = RecordingFormat {
            sample_rate: source.sample_rate(),
            num_channels: source.num_channels(),
        };
        info!(
            "[SESSION] Starting ritual: clip {:.2}s, session {:.2}s",
            source.duration_secs(),
            self.duration_secs
        );

        self.graph = EqGraphController::construct(self.backend.as_mut(), source, self.config.band_q);
        if self.graph.is_degraded() {
            self.diagnostic(DiagnosticLevel::Warning, "audio unavailable, running without sound");
        } else if let Err(e) = self.recorder.start(format) {
            warn!("[CAPTURE] Recording skipped: {}", e);
            self.diagnostic(DiagnosticLevel::Warning, format!("recording skipped: {}", e));
        }

        // A fractional length shortens the first tick so the last one lands on the end
        let first_tick = self.duration_secs - self.remaining_secs.saturating_sub(1) as f64;
        let first_tick = Duration::from_secs_f64(first_tick.clamp(0.0, COUNTDOWN_PERIOD.as_secs_f64()));
        self.countdown = Some(self.scheduler.schedule_repeating_after(
            first_tick,
            COUNTDOWN_PERIOD,
            SessionTimer::CountdownTick,
        ));
        self.hints.start(&mut self.scheduler);

        self.set_state(SessionState::Active);
        self.events.publish(SessionEvent::Countdown {
            remaining_secs: self.remaining_secs,
        });
        self.check_final_window();
        Ok(())
    }

    /// Decode `bytes` as a WAV clip and start. Decode failure leaves the session Idle.
    pub fn start_from_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.require_idle()?;
        let source = decode_clip(bytes).inspect_err(|e| {
            warn!("[SESSION] Rejected source clip: {}", e);
        })?;
        self.start(source)
    }

    /// Map raw contacts and apply every one that lands on the grid.
    ///
    /// Returns the cells that were accepted.
    pub fn pointer(&mut self, contacts: &[Contact], surface: &SurfaceRect) -> Vec<GridCell> {
        map_contacts(contacts, surface)
            .into_iter()
            .filter(|cell| self.interact(*cell))
            .collect()
    }

    /// Apply one grid interaction. Accepted only while Active and not paused,
    /// and only for cells on the grid.
    pub fn interact(&mut self, cell: GridCell) -> bool {
        if !self.accepts_input() {
            return false;
        }
        if !cell.is_on_grid() {
            debug!("[SESSION] Ignoring off-grid cell ({}, {})", cell.band, cell.row);
            return false;
        }

        self.graph.set_band_gain(cell.band, cell.row);
        let previous_row = self.eq_state.activate(cell);
        let activation = self.visual.activate(cell);
        if self.in_final_window {
            self.final_eq.record(cell);
        }

        self.events.publish(SessionEvent::CellActivated { cell, previous_row });
        if activation.spark_spawned {
            self.events.publish(SessionEvent::SparkSpawned { cell });
        }
        true
    }

    /// End the ritual now. Returns false when not Active.
    pub fn end_ritual(&mut self) -> bool {
        if self.state != SessionState::Active || self.torn_down {
            return false;
        }
        self.crystallize(EndReason::EndCommand);
        true
    }

    /// Suspend countdown, audio and hints
    pub fn pause(&mut self) -> Result<()> {
        if !self.accepts_input() {
            return Err(self.invalid_state("Active and running"));
        }
        self.paused_at = Some(self.scheduler.now());
        info!("[SESSION] Paused with {}s remaining", self.remaining_secs);
        self.events.publish(SessionEvent::Paused);
        Ok(())
    }

    pub fn resume(&mut self) -> Result<()> {
        let Some(paused_at) = self.paused_at.take() else {
            return Err(self.invalid_state("paused"));
        };
        let span = self.scheduler.now().saturating_sub(paused_at);
        self.scheduler.defer_all(span);
        info!("[SESSION] Resumed after {:.2}s", span.as_secs_f64());
        self.events.publish(SessionEvent::Resumed);
        Ok(())
    }

    /// Push acknowledgement from a recorder that reports stop asynchronously
    pub fn notify_recorder_stopped(&mut self) {
        if self.state == SessionState::Crystallizing {
            self.complete(CompletionSource::RecorderStopped);
        }
    }

    /// Re-feed an artifact's audio into decode-and-start.
    ///
    /// The current session is reset first; if the artifact has no usable
    /// audio the session is left Idle.
    pub fn alter(&mut self, artifact: &Artifact) -> Result<()> {
        self.reset();
        match artifact.audio.as_deref() {
            Some(audio) if !audio.is_empty() => self.start_from_bytes(audio),
            _ => Err(RitualError::EmptyAudio),
        }
    }

    /// Tear down and return to Idle so the instance can run another ritual.
    pub fn reset(&mut self) {
        self.teardown();
        self.eq_state.clear();
        self.final_eq.clear();
        self.end_reason = None;
        self.latch = CompletionLatch::new();
        self.artifact = None;
        self.duration_secs = 0.0;
        self.remaining_secs = 0;
        self.active_elapsed = Duration::ZERO;
        self.in_final_window = false;
        self.graph = EqGraphController::default();
        self.torn_down = false;
        if self.state != SessionState::Idle {
            self.set_state(SessionState::Idle);
        }
    }

    /// Release everything the session holds. Idempotent.
    ///
    /// Cancels timers, stops the source, stops the recorder if active and
    /// releases the audio graph and scene resources.
    pub fn teardown(&mut self) {
        if let Some(id) = self.countdown.take() {
            self.scheduler.cancel(id);
        }
        if let Some(id) = self.fallback.take() {
            self.scheduler.cancel(id);
        }
        self.hints.cancel(&mut self.scheduler);
        self.scheduler.clear();
        self.paused_at = None;

        self.graph.stop_source();
        if self.recorder.is_active() {
            self.recorder.abort();
        }
        self.graph.release();
        self.visual.clear();

        if !self.torn_down {
            debug!("[SESSION] Torn down in state {}", self.state);
            self.torn_down = true;
        }
    }

    // ========================================================================
    // Time
    // ========================================================================

    /// Advance virtual time by `dt`, rendering audio and firing timers in order.
    pub fn advance(&mut self, dt: Duration) {
        let target = self.scheduler.now() + dt;

        if self.paused_at.is_some() {
            self.scheduler.advance_to(target);
            return;
        }

        loop {
            let due = self.scheduler.next_due().filter(|d| *d <= target);
            let step_to = due.unwrap_or(target);
            self.catch_up(step_to);
            if due.is_none() {
                break;
            }
            // catch_up may have cancelled the timer that was due
            if let Some((_, timer)) = self.scheduler.pop_due(step_to) {
                self.on_timer(timer);
            }
        }
        self.scheduler.advance_to(target);
    }

    /// One render-loop frame; runs in every state
    pub fn render_frame(&mut self, dt: Duration) -> FrameStats {
        let active = self.state == SessionState::Active;
        self.visual.render_frame(dt.as_secs_f32(), active)
    }

    /// Render audio up to `until` and poll the recorder
    fn catch_up(&mut self, until: Duration) {
        let span = until.saturating_sub(self.scheduler.now());

        match self.state {
            SessionState::Active if !self.torn_down => {
                let started = self.scheduler.now();
                let elapsed_before = self.active_elapsed;
                self.active_elapsed += span;
                let target_secs = self.active_elapsed.as_secs_f64();
                loop {
                    let frames = self.graph.frames_until(target_secs).min(self.config.block_frames);
                    if frames == 0 {
                        break;
                    }
                    match self.graph.render(frames) {
                        Some(block) => self.recorder.write(&block),
                        None => break,
                    }
                }
                if self.graph.reached_end() {
                    // Anchor the end, and the fallback armed by it, to when the clip ran out
                    let clip_end = self
                        .graph
                        .elapsed_secs()
                        .map_or(self.active_elapsed, Duration::from_secs_f64);
                    let ran_for = clip_end.saturating_sub(elapsed_before).min(span);
                    self.active_elapsed = elapsed_before + ran_for;
                    self.scheduler.advance_to(started + ran_for);
                    self.crystallize(EndReason::PlaybackEnded);
                }
            }
            SessionState::Crystallizing => {
                if self.recorder.poll_stopped() {
                    self.complete(CompletionSource::RecorderStopped);
                }
            }
            _ => {}
        }
        self.scheduler.advance_to(until);
    }

    fn on_timer(&mut self, timer: SessionTimer) {
        match timer {
            SessionTimer::CountdownTick => self.on_countdown_tick(),
            SessionTimer::HintShow(index) => {
                if let Some(text) = self.hints.show(index, &mut self.scheduler) {
                    debug!("[SESSION] Hint {}: {}", index, text);
                    self.events.publish(SessionEvent::HintShown { index, text });
                }
            }
            SessionTimer::HintHide(index) => {
                let until_final = self.time_until_final_window();
                self.hints.hide(index, until_final, &mut self.scheduler);
                self.events.publish(SessionEvent::HintHidden { index });
            }
            SessionTimer::CompletionFallback => {
                self.fallback = None;
                self.complete(CompletionSource::FallbackTimer);
            }
        }
    }

    fn on_countdown_tick(&mut self) {
        if self.state != SessionState::Active {
            return;
        }
        self.remaining_secs = match self.config.countdown_mode {
            CountdownMode::WallClock => self.remaining_secs.saturating_sub(1),
            CountdownMode::AudioClock => {
                // Degraded sessions have no audio clock; fall back to wall time
                let elapsed = self
                    .graph
                    .elapsed_secs()
                    .unwrap_or_else(|| self.active_elapsed.as_secs_f64());
                (self.duration_secs - elapsed).ceil().max(0.0) as u64
            }
        };
        self.events.publish(SessionEvent::Countdown {
            remaining_secs: self.remaining_secs,
        });
        self.check_final_window();

        if self.remaining_secs == 0 {
            self.crystallize(EndReason::CountdownExpired);
        }
    }

    fn check_final_window(&mut self) {
        if !self.in_final_window && self.remaining_secs <= u64::from(self.config.final_window_secs) {
            self.in_final_window = true;
            info!("[SESSION] Final window open ({}s remaining)", self.remaining_secs);
            self.events.publish(SessionEvent::FinalWindowEntered);
        }
    }

    fn time_until_final_window(&self) -> Duration {
        let left = self.duration_secs - self.active_elapsed.as_secs_f64() - f64::from(self.config.final_window_secs);
        Duration::from_secs_f64(left.max(0.0))
    }

    // ========================================================================
    // Crystallization
    // ========================================================================

    /// Leave Active. Only the first trigger has any effect.
    fn crystallize(&mut self, reason: EndReason) {
        if self.state != SessionState::Active || self.end_reason.is_some() {
            debug!("[SESSION] Ignoring end trigger ({}) in state {}", reason, self.state);
            return;
        }
        self.end_reason = Some(reason);
        self.paused_at = None;
        info!("[SESSION] Ritual ended: {}", reason);

        if let Some(id) = self.countdown.take() {
            self.scheduler.cancel(id);
        }
        if let Some(index) = self.hints.cancel(&mut self.scheduler) {
            self.events.publish(SessionEvent::HintHidden { index });
        }
        self.set_state(SessionState::Crystallizing);

        self.graph.stop_source();
        self.visual.build_ribbon(&self.final_eq);
        self.events.publish(SessionEvent::RibbonBuilt {
            bands_touched: self.final_eq.len(),
        });

        if self.recorder.is_active() {
            self.recorder.request_stop();
            self.fallback = Some(
                self.scheduler
                    .schedule_once(self.config.completion_fallback(), SessionTimer::CompletionFallback),
            );
        } else {
            debug!("[CAPTURE] No active recording, completing immediately");
            self.complete(CompletionSource::RecorderStopped);
        }
    }

    /// Assemble the artifact and go Complete. Runs once.
    fn complete(&mut self, source: CompletionSource) {
        if !self.latch.try_fire(source) {
            return;
        }
        if let Some(id) = self.fallback.take() {
            self.scheduler.cancel(id);
        }

        if source == CompletionSource::FallbackTimer {
            warn!(
                "[CAPTURE] Recorder did not acknowledge stop within {}ms, completing anyway",
                self.config.completion_fallback_ms
            );
            self.diagnostic(DiagnosticLevel::Warning, "recorder never acknowledged stop");
            self.recorder.abort();
        }

        let image = match self
            .visual
            .snapshot(self.config.snapshot_width, self.config.snapshot_height)
        {
            Ok(image) => image,
            Err(e) => {
                warn!("[CAPTURE] Snapshot failed: {}", e);
                self.diagnostic(DiagnosticLevel::Warning, format!("snapshot failed: {}", e));
                Vec::new()
            }
        };
        let chunks = self.recorder.take_chunks();
        let artifact = Artifact::assemble(
            image,
            chunks,
            self.recorder.format(),
            self.active_elapsed.as_secs_f64(),
            self.final_eq.clone(),
        );
        info!(
            "[CAPTURE] Artifact {} assembled (image {} bytes, audio {})",
            artifact.id,
            artifact.image.len(),
            artifact.audio.as_ref().map_or(0, Vec::len)
        );

        let artifact_id = artifact.id;
        self.artifact = Some(artifact);
        self.graph.release();
        self.set_state(SessionState::Complete);
        self.events.publish(SessionEvent::Completed {
            artifact_id,
            reason: self.end_reason.unwrap_or(EndReason::EndCommand),
            source,
        });
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Whole seconds shown on the countdown
    pub fn remaining_secs(&self) -> u64 {
        self.remaining_secs
    }

    pub fn duration_secs(&self) -> f64 {
        self.duration_secs
    }

    pub fn in_final_window(&self) -> bool {
        self.in_final_window
    }

    pub fn is_paused(&self) -> bool {
        self.paused_at.is_some()
    }

    pub fn is_degraded(&self) -> bool {
        self.graph.is_degraded()
    }

    pub fn end_reason(&self) -> Option<EndReason> {
        self.end_reason
    }

    pub fn completion_source(&self) -> Option<CompletionSource> {
        self.latch.winner()
    }

    pub fn eq_state(&self) -> &EqState {
        &self.eq_state
    }

    pub fn final_eq(&self) -> &FinalEqState {
        &self.final_eq
    }

    pub fn grid(&self) -> &VisualGrid {
        &self.visual
    }

    pub fn artifact(&self) -> Option<&Artifact> {
        self.artifact.as_ref()
    }

    pub fn take_artifact(&mut self) -> Option<Artifact> {
        self.artifact.take()
    }

    /// Virtual time since the session was created
    pub fn now(&self) -> Duration {
        self.scheduler.now()
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn accepts_input(&self) -> bool {
        self.state == SessionState::Active && self.paused_at.is_none() && !self.torn_down
    }

    fn require_idle(&self) -> Result<()> {
        if self.state == SessionState::Idle {
            Ok(())
        } else {
            Err(self.invalid_state("Idle"))
        }
    }

    fn invalid_state(&self, expected: &'static str) -> RitualError {
        RitualError::InvalidState {
            expected,
            actual: self.state.to_string(),
        }
    }

    fn set_state(&mut self, to: SessionState) {
        let from = self.state;
        self.state = to;
        info!("[SESSION] {} -> {}", from, to);
        self.events.publish(SessionEvent::StateChanged { from, to });
    }

    fn diagnostic(&mut self, level: DiagnosticLevel, message: impl Into<String>) {
        self.events.publish(SessionEvent::Diagnostic {
            level,
            message: message.into(),
        });
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::UnsupportedRecorder;
    use crate::config::DurationPolicy;
    use crate::dsp::{MemoryBackend, UnavailableBackend};

    const SR: u32 = 8000;

    fn config() -> SessionConfig {
        SessionConfig {
            rng_seed: Some(1),
            snapshot_width: 64,
            snapshot_height: 64,
            recorder_chunk_frames: 4000,
            ..SessionConfig::default()
        }
    }

    fn clip(secs: f32) -> AudioBuffer {
        AudioBuffer::sine(440.0, secs, SR)
    }

    fn drain(rx: &Receiver<SessionEvent>) -> Vec<SessionEvent> {
        rx.try_iter().collect()
    }

    #[test]
    fn test_start_goes_active() {
        let mut session = Session::headless(config()).unwrap();
        let rx = session.subscribe();
        session.start(clip(10.0)).unwrap();

        assert_eq!(session.state(), SessionState::Active);
        assert_eq!(session.remaining_secs(), 10);
        let events = drain(&rx);
        assert!(events.contains(&SessionEvent::StateChanged {
            from: SessionState::Idle,
            to: SessionState::Active,
        }));
    }

    #[test]
    fn test_start_rejected_unless_idle() {
        let mut session = Session::headless(config()).unwrap();
        session.start(clip(2.0)).unwrap();
        let err = session.start(clip(2.0)).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_STATE");
    }

    #[test]
    fn test_decode_failure_stays_idle() {
        let mut session = Session::headless(config()).unwrap();
        assert!(session.start_from_bytes(b"not a wav").is_err());
        assert_eq!(session.state(), SessionState::Idle);
        assert!(!session.interact(GridCell { band: 0, row: 0 }));
    }

    #[test]
    fn test_countdown_expiry_completes() {
        let mut cfg = config();
        cfg.duration_policy = DurationPolicy::Clamp {
            min_secs: 1.0,
            max_secs: 3.0,
        };
        let mut session = Session::headless(cfg).unwrap();
        let rx = session.subscribe();
        session.start(clip(10.0)).unwrap();

        session.advance(Duration::from_millis(2900));
        assert_eq!(session.state(), SessionState::Active);
        session.advance(Duration::from_millis(100));
        assert_eq!(session.end_reason(), Some(EndReason::CountdownExpired));
        assert_eq!(session.state(), SessionState::Complete);

        let transitions: Vec<_> = drain(&rx)
            .into_iter()
            .filter_map(|e| match e {
                SessionEvent::StateChanged { to, .. } => Some(to),
                _ => None,
            })
            .collect();
        assert_eq!(
            transitions,
            vec![SessionState::Active, SessionState::Crystallizing, SessionState::Complete]
        );
        assert_eq!(session.completion_source(), Some(CompletionSource::RecorderStopped));
        assert!(session.artifact().unwrap().has_audio());
    }

    #[test]
    fn test_natural_end_wins_over_countdown() {
        let mut session = Session::headless(config()).unwrap();
        session.start(clip(2.5)).unwrap();
        session.advance(Duration::from_secs(5));

        assert_eq!(session.end_reason(), Some(EndReason::PlaybackEnded));
        assert_eq!(session.state(), SessionState::Complete);
    }

    #[test]
    fn test_natural_end_acknowledged_after_coarse_step() {
        let mut cfg = config();
        cfg.duration_policy = DurationPolicy::Clamp {
            min_secs: 5.0,
            max_secs: 10.0,
        };
        let mut session = Session::headless(cfg).unwrap();
        session.start(clip(1.25)).unwrap();

        session.advance(Duration::from_millis(1600));
        assert_eq!(session.end_reason(), Some(EndReason::PlaybackEnded));
        assert_eq!(session.state(), SessionState::Crystallizing);

        session.advance(Duration::from_millis(16));
        assert_eq!(session.completion_source(), Some(CompletionSource::RecorderStopped));
        let artifact = session.artifact().unwrap();
        assert!(artifact.has_audio());
        assert!((artifact.duration_secs - 1.25).abs() < 1e-6);
    }

    #[test]
    fn test_fractional_length_ends_on_time() {
        let mut cfg = config();
        cfg.duration_policy = DurationPolicy::Clamp {
            min_secs: 1.0,
            max_secs: 5.5,
        };
        let mut session = Session::headless(cfg).unwrap();
        session.start(clip(10.0)).unwrap();
        assert_eq!(session.remaining_secs(), 6);

        session.advance(Duration::from_millis(500));
        assert_eq!(session.remaining_secs(), 5);
        session.advance(Duration::from_millis(4900));
        assert_eq!(session.state(), SessionState::Active);
        assert_eq!(session.remaining_secs(), 1);

        session.advance(Duration::from_millis(100));
        assert_eq!(session.end_reason(), Some(EndReason::CountdownExpired));
        assert_eq!(session.state(), SessionState::Complete);
    }

    #[test]
    fn test_off_grid_cell_rejected() {
        let mut session = Session::headless(config()).unwrap();
        session.start(clip(2.0)).unwrap();

        assert!(!session.interact(GridCell { band: 36, row: 0 }));
        assert!(!session.interact(GridCell { band: 0, row: 36 }));
        assert!(session.interact(GridCell { band: 35, row: 35 }));
        assert_eq!(session.eq_state().active_row(0), None);
        assert_eq!(session.eq_state().active_row(35), Some(35));
    }

    #[test]
    fn test_end_command_is_single_assignment() {
        let mut session = Session::headless(config()).unwrap();
        session.start(clip(4.0)).unwrap();
        assert!(session.end_ritual());
        assert!(!session.end_ritual());
        session.advance(Duration::from_secs(10));
        assert_eq!(session.end_reason(), Some(EndReason::EndCommand));
    }

    #[test]
    fn test_fallback_completes_silent_recorder() {
        let recorder = ChunkRecorder::never_acknowledging(4000);
        let mut session = Session::new(config(), Box::new(NullBackend), Box::new(recorder)).unwrap();
        let rx = session.subscribe();
        session.start(clip(4.0)).unwrap();
        session.advance(Duration::from_secs(1));
        session.end_ritual();

        session.advance(Duration::from_millis(499));
        assert_eq!(session.state(), SessionState::Crystallizing);
        session.advance(Duration::from_millis(1));
        assert_eq!(session.state(), SessionState::Complete);
        assert_eq!(session.completion_source(), Some(CompletionSource::FallbackTimer));
        assert!(session.artifact().unwrap().has_audio());

        let diagnostics = drain(&rx)
            .into_iter()
            .filter(|e| matches!(e, SessionEvent::Diagnostic { level: DiagnosticLevel::Warning, .. }))
            .count();
        assert_eq!(diagnostics, 1);
    }

    #[test]
    fn test_completion_runs_once() {
        let recorder = ChunkRecorder::never_acknowledging(4000);
        let mut session = Session::new(config(), Box::new(NullBackend), Box::new(recorder)).unwrap();
        let rx = session.subscribe();
        session.start(clip(4.0)).unwrap();
        session.end_ritual();

        session.notify_recorder_stopped();
        session.notify_recorder_stopped();
        session.advance(Duration::from_secs(2));

        let completed = drain(&rx)
            .into_iter()
            .filter(|e| matches!(e, SessionEvent::Completed { .. }))
            .count();
        assert_eq!(completed, 1);
        assert_eq!(session.completion_source(), Some(CompletionSource::RecorderStopped));
    }

    #[test]
    fn test_final_window_records_last_write() {
        let mut cfg = config();
        cfg.final_window_secs = 2;
        let mut session = Session::headless(cfg).unwrap();
        session.start(clip(5.0)).unwrap();

        session.interact(GridCell { band: 3, row: 30 });
        assert!(session.final_eq().is_empty());

        session.advance(Duration::from_secs(3));
        assert!(session.in_final_window());
        session.interact(GridCell { band: 3, row: 10 });
        session.interact(GridCell { band: 3, row: 12 });
        session.interact(GridCell { band: 9, row: 1 });

        assert_eq!(session.final_eq().get(3), Some(12));
        assert_eq!(session.final_eq().get(9), Some(1));
        assert_eq!(session.final_eq().len(), 2);
    }

    #[test]
    fn test_pause_defers_countdown() {
        let mut session = Session::headless(config()).unwrap();
        session.start(clip(5.0)).unwrap();
        session.advance(Duration::from_secs(2));
        assert_eq!(session.remaining_secs(), 3);

        session.pause().unwrap();
        assert!(!session.interact(GridCell { band: 0, row: 0 }));
        session.advance(Duration::from_secs(30));
        assert_eq!(session.remaining_secs(), 3);
        assert_eq!(session.state(), SessionState::Active);

        session.resume().unwrap();
        session.advance(Duration::from_secs(1));
        assert_eq!(session.remaining_secs(), 2);
        assert!(session.resume().is_err());
    }

    #[test]
    fn test_degraded_mode_still_completes() {
        let mut session = Session::new(config(), Box::new(UnavailableBackend), Box::new(ChunkRecorder::new(100))).unwrap();
        session.start(clip(2.0)).unwrap();
        assert!(session.is_degraded());
        assert!(session.interact(GridCell { band: 5, row: 5 }));

        session.advance(Duration::from_secs(3));
        assert_eq!(session.state(), SessionState::Complete);
        let artifact = session.artifact().unwrap();
        assert!(!artifact.image.is_empty());
        assert!(!artifact.has_audio());
    }

    #[test]
    fn test_unsupported_recorder_yields_empty_audio() {
        let mut session = Session::new(config(), Box::new(NullBackend), Box::new(UnsupportedRecorder)).unwrap();
        session.start(clip(2.0)).unwrap();
        session.end_ritual();
        assert_eq!(session.state(), SessionState::Complete);
        assert!(!session.artifact().unwrap().has_audio());
    }

    #[test]
    fn test_recording_matches_heard_audio() {
        let backend = MemoryBackend::new();
        let mut session = Session::new(config(), Box::new(backend.clone()), Box::new(ChunkRecorder::new(1000))).unwrap();
        session.start(clip(1.0)).unwrap();
        session.interact(GridCell { band: 20, row: 35 });
        session.advance(Duration::from_secs(2));

        let artifact = session.take_artifact().unwrap();
        let recorded = decode_clip(artifact.audio.as_ref().unwrap()).unwrap();
        let heard = backend.heard();
        assert_eq!(recorded.num_frames(), heard.len());
    }

    #[test]
    fn test_hints_stop_when_session_ends() {
        let mut session = Session::headless(config()).unwrap();
        let rx = session.subscribe();
        session.start(clip(60.0)).unwrap();
        session.advance(Duration::from_secs(3));
        session.end_ritual();
        session.advance(Duration::from_secs(30));

        let events = drain(&rx);
        let shown = events
            .iter()
            .filter(|e| matches!(e, SessionEvent::HintShown { .. }))
            .count();
        let hidden = events
            .iter()
            .filter(|e| matches!(e, SessionEvent::HintHidden { .. }))
            .count();
        assert_eq!(shown, 1);
        assert_eq!(hidden, 1);
    }

    #[test]
    fn test_reset_and_alter() {
        let mut session = Session::headless(config()).unwrap();
        session.start(clip(1.0)).unwrap();
        session.advance(Duration::from_secs(2));
        let artifact = session.take_artifact().unwrap();

        session.alter(&artifact).unwrap();
        assert_eq!(session.state(), SessionState::Active);
        assert!(session.final_eq().is_empty());

        session.reset();
        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(session.grid().live_resources(), 0);
    }

    #[test]
    fn test_teardown_is_idempotent() {
        let mut session = Session::headless(config()).unwrap();
        session.start(clip(3.0)).unwrap();
        session.interact(GridCell { band: 1, row: 1 });
        session.teardown();
        session.teardown();
        assert!(!session.interact(GridCell { band: 1, row: 2 }));
        assert_eq!(session.grid().live_resources(), 0);
    }

    #[test]
    fn test_render_loop_runs_in_every_state() {
        let mut session = Session::headless(config()).unwrap();
        session.render_frame(Duration::from_millis(16));
        session.start(clip(1.0)).unwrap();
        session.render_frame(Duration::from_millis(16));
        session.end_ritual();
        session.advance(Duration::from_secs(1));
        let stats = session.render_frame(Duration::from_millis(16));
        assert!(stats.ribbon_animated);
        assert_eq!(session.grid().frames_rendered(), 3);
    }
}
