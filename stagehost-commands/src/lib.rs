//! Protocol engine for the scan stage: the command model and its
//! validation, the wire codec, readiness tracking, and the session loop
//! that drives a [`stagehost_core::Transport`].

pub mod codec;
pub mod command;
pub mod input;
pub mod jog;
pub mod session;
pub mod state;

pub use command::{Command, Direction, ValidationError};
pub use session::{Event, LogEntry, Mode, Request, Session, Severity, SubmitError};
pub use state::ControllerState;
