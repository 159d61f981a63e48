use std::{sync::Arc, time::Duration};

use tokio::{
    sync::{broadcast, mpsc},
    time,
};

use stagehost_core::{classify, Error, ResponseEvent, Transport};

use crate::{
    codec,
    command::{Command, Direction},
    jog::JogIntent,
    state::{ControllerState, Readiness},
};

/// Cadence of the inbound drain tick.
pub const DRAIN_INTERVAL: Duration = Duration::from_millis(100);

/// Cadence of the manual-jog repeat tick.
pub const JOG_INTERVAL: Duration = Duration::from_millis(100);

/// Input mode selected by the operator surface. Only `Manual` feeds the
/// jog tick; switching away from it drops any held keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Manual,
    RectNxn,
    RectManual,
    CircleUser,
    CircleAuto,
}

/// Display style of a log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Success,
    Warning,
    Neutral,
}

#[derive(Debug, Clone)]
pub struct LogEntry {
    pub severity: Severity,
    pub text: Arc<str>,
}

/// Feed for the status surface.
#[derive(Debug, Clone)]
pub enum Event {
    /// Readiness plus the latest status text, sent whenever the pair
    /// changes.
    Status {
        state: ControllerState,
        text: Arc<str>,
    },
    /// One classified controller line, in arrival order.
    Log(LogEntry),
    /// Operator-facing warning that is not part of the controller log,
    /// e.g. a busy rejection.
    Notice(Arc<str>),
}

/// Requests from the operator surface.
#[derive(Debug, Clone)]
pub enum Request {
    Submit(Command),
    Press(Direction),
    Release(Direction),
    SetJogStep(f64),
    SetMode(Mode),
}

#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    /// A gated command was attempted while the controller is busy. Not
    /// queued, not retried; the operator waits for DONE.
    #[error("stage is busy, wait for the current scan to finish")]
    Busy,

    #[error(transparent)]
    Io(#[from] Error),
}

/// Session context: all protocol state plus the transport, driven by one
/// logical task. The tick methods are synchronous so the scheduling in
/// [`Session::run`] stays separate from the protocol logic.
pub struct Session<T> {
    transport: T,
    readiness: Readiness,
    mode: Mode,
    jog: JogIntent,
    log: Vec<LogEntry>,
    status: Arc<str>,
    events: broadcast::Sender<Event>,
}

impl<T: Transport> Session<T> {
    pub fn new(transport: T) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            transport,
            readiness: Readiness::default(),
            mode: Mode::default(),
            jog: JogIntent::new(),
            log: Vec::new(),
            status: Arc::from("Idle"),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    pub fn state(&self) -> ControllerState {
        self.readiness.state()
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// The append-only classified event log.
    pub fn log(&self) -> &[LogEntry] {
        &self.log
    }

    /// Send one command now. Gated commands engage the busy lock and are
    /// refused while it is held; jog, stop and set-center always go
    /// through so the stage stays responsive during a scan.
    pub fn submit(&mut self, command: &Command) -> Result<(), SubmitError> {
        if command.is_gated() && self.readiness.is_busy() {
            return Err(SubmitError::Busy);
        }
        self.transport.write_line(codec::encode(command))?;
        if command.is_gated() {
            self.readiness.begin();
        }
        self.set_status(command.to_string());
        Ok(())
    }

    /// Consume every line the transport has buffered, in arrival order.
    pub fn drain_tick(&mut self) -> Result<(), Error> {
        while let Some(raw) = self.transport.try_read_line()? {
            let text = String::from_utf8_lossy(&raw);
            let line = text.trim();
            if line.is_empty() {
                continue;
            }
            let event = classify(line);
            self.readiness.apply(&event);
            let severity = match event {
                ResponseEvent::Done => Severity::Success,
                ResponseEvent::Busy => Severity::Warning,
                ResponseEvent::Info(_) => Severity::Neutral,
            };
            let entry = LogEntry {
                severity,
                text: Arc::from(line),
            };
            let _ = self.events.send(Event::Log(entry.clone()));
            self.log.push(entry);
            match event {
                ResponseEvent::Done => self.set_status("Stage ready."),
                ResponseEvent::Busy => self.set_status("Stage busy."),
                ResponseEvent::Info(_) => {}
            }
        }
        Ok(())
    }

    /// Re-emit the active jog for every held key. Level-triggered: one
    /// command per held direction per tick, for as long as the mode is
    /// manual and the controller is not busy.
    pub fn jog_tick(&mut self) -> Result<(), Error> {
        if self.mode != Mode::Manual || self.readiness.is_busy() {
            return Ok(());
        }
        let step_mm = self.jog.step_mm();
        for direction in Direction::ALL {
            if !self.jog.is_held(direction) {
                continue;
            }
            let command = Command::ManualJog { direction, step_mm };
            self.transport.write_line(codec::encode(&command))?;
            self.set_status(command.to_string());
        }
        Ok(())
    }

    pub fn press(&mut self, direction: Direction) {
        self.jog.press(direction);
    }

    /// Release a held key, sending a single stop when the held set
    /// becomes empty.
    pub fn release(&mut self, direction: Direction) {
        if self.jog.release(direction) {
            self.send_stop();
        }
    }

    pub fn set_jog_step(&mut self, step_mm: f64) {
        if let Err(err) = self.jog.set_step(step_mm) {
            self.notice(err.to_string());
        }
    }

    pub fn set_mode(&mut self, mode: Mode) {
        if mode != Mode::Manual && self.jog.clear() {
            self.send_stop();
        }
        self.mode = mode;
    }

    // Best-effort: a stop to a dead link is not worth tearing the session
    // down for, and the next tick reports the failure anyway.
    fn send_stop(&mut self) {
        match self.transport.write_line(codec::encode(&Command::ManualStop)) {
            Ok(()) => self.set_status(Command::ManualStop.to_string()),
            Err(err) => tracing::debug!("stop not delivered: {err}"),
        }
    }

    fn set_status(&mut self, text: impl Into<Arc<str>>) {
        let text = text.into();
        if text == self.status {
            return;
        }
        self.status = text;
        let _ = self.events.send(Event::Status {
            state: self.readiness.state(),
            text: self.status.clone(),
        });
    }

    fn notice(&self, text: impl Into<Arc<str>>) {
        let _ = self.events.send(Event::Notice(text.into()));
    }

    fn handle(&mut self, request: Request) -> Result<(), Error> {
        match request {
            Request::Submit(command) => match self.submit(&command) {
                Ok(()) => {}
                Err(SubmitError::Busy) => self.notice(SubmitError::Busy.to_string()),
                Err(SubmitError::Io(err)) => return Err(err),
            },
            Request::Press(direction) => self.press(direction),
            Request::Release(direction) => self.release(direction),
            Request::SetJogStep(step_mm) => self.set_jog_step(step_mm),
            Request::SetMode(mode) => self.set_mode(mode),
        }
        Ok(())
    }

    /// Drive the session: the two fixed-cadence ticks plus operator
    /// requests, all on one logical task so response lines are applied in
    /// arrival order before the next jog tick reads the state.
    ///
    /// Returns when the request channel closes, or with the first
    /// transport error; there is no reconnect.
    pub async fn run(mut self, mut requests: mpsc::Receiver<Request>) -> Result<(), Error> {
        let mut drain = time::interval(DRAIN_INTERVAL);
        let mut jog = time::interval(JOG_INTERVAL);
        loop {
            tokio::select! {
                _ = drain.tick() => self.drain_tick()?,
                _ = jog.tick() => self.jog_tick()?,
                request = requests.recv() => match request {
                    Some(request) => self.handle(request)?,
                    None => break Ok(()),
                },
            }
        }
    }
}
