//! RTMP session state management
//!
//! The state machine is sans-IO: it turns server messages and caller intents
//! into [`Action`]s. The client driver owns the socket and executes them.

pub mod state;

pub use state::{Action, SessionMode, SessionParams, SessionState, SessionStateMachine};
