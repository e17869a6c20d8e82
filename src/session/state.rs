//! Session state machine
//!
//! ```text
//! Disconnected -> Connecting -> Connected -> StreamCreated -> Publishing | Playing
//!                                                                 |
//!                                        Closing -> Disconnected <-+
//! ```
//!
//! Sans-IO: inputs are parsed messages, caller intents and the clock; outputs
//! are [`Action`]s the session driver executes in order. Only the read loop
//! owns this value.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::amf::{AmfObject, AmfValue};
use crate::error::{Error, ErrorKind, Result};
use crate::protocol::chunk::Message;
use crate::protocol::constants::*;
use crate::protocol::message::{
    Command, ConnectParams, DataMessage, RtmpMessage, UserControlEvent,
};

/// Externally visible session state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
    StreamCreated,
    Publishing,
    Playing,
    Closing,
}

impl SessionState {
    fn rank(&self) -> u8 {
        match self {
            SessionState::Disconnected => 0,
            SessionState::Connecting => 1,
            SessionState::Connected => 2,
            SessionState::StreamCreated => 3,
            SessionState::Publishing | SessionState::Playing => 4,
            SessionState::Closing => 5,
        }
    }

    pub fn is_active(&self) -> bool {
        !matches!(self, SessionState::Disconnected | SessionState::Closing)
    }
}

/// Publish or play
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    Publish,
    Play,
}

/// Everything the machine needs to build its commands
#[derive(Debug, Clone)]
pub struct SessionParams {
    pub mode: SessionMode,
    pub connect: ConnectParams,
    pub stream_name: String,
    pub command_timeout: Duration,
    /// SetBufferLength sent before `play`
    pub buffer_length_ms: u32,
    /// Window we ask the server to acknowledge against
    pub window_ack_size: u32,
    /// Sent as `@setDataFrame onMetaData` after Publish.Start
    pub metadata: Option<AmfObject>,
}

/// Work for the session driver
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Queue a control-plane message
    Send(Message),
    /// State changed
    Transition(SessionState),
    /// Publish.Start received: begin draining the media queue on this stream
    StartMedia { stream_id: u32 },
    /// Play.Start received: inbound media is now accepted
    AcceptMedia { stream_id: u32 },
    /// onMetaData from the server
    Metadata(AmfValue),
    /// Play stream finished (Play.Stop, StreamEOF)
    StreamEnded,
    /// Server acknowledged our bytes
    PeerAck(u32),
    /// The window the server will acknowledge our bytes against
    OutboundWindow(u32),
    /// Command rejected or timed out; terminal for this session
    Fail {
        kind: ErrorKind,
        message: String,
        /// No answer before the deadline, as opposed to an explicit refusal
        timed_out: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pending {
    Connect,
    CreateStream,
    ReleaseStream,
    FcPublish,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StatusWait {
    Publish,
    Play,
}

/// Client-side RTMP session state machine
pub struct SessionStateMachine {
    params: SessionParams,
    state: SessionState,
    next_transaction: u32,
    pending: HashMap<u32, (Pending, Instant)>,
    status_wait: Option<(StatusWait, Instant)>,
    stream_requested: bool,
    stream_id: Option<u32>,
    media_started: bool,
    paused: bool,
}

impl SessionStateMachine {
    pub fn new(params: SessionParams) -> Self {
        Self {
            params,
            state: SessionState::Disconnected,
            next_transaction: 1,
            pending: HashMap::new(),
            status_wait: None,
            stream_requested: false,
            stream_id: None,
            media_started: false,
            paused: false,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn mode(&self) -> SessionMode {
        self.params.mode
    }

    /// Media stream id once createStream succeeded
    pub fn stream_id(&self) -> Option<u32> {
        self.stream_id
    }

    /// Publish.Start or Play.Start has been received
    pub fn media_started(&self) -> bool {
        self.media_started
    }

    fn transition(&mut self, to: SessionState, actions: &mut Vec<Action>) {
        let allowed = match to {
            SessionState::Disconnected => self.state != SessionState::Disconnected,
            SessionState::Closing => self.state.is_active(),
            SessionState::Connecting => self.state == SessionState::Disconnected,
            _ => self.state.is_active() && to.rank() > self.state.rank(),
        };
        if !allowed {
            tracing::trace!(from = ?self.state, to = ?to, "Ignoring transition");
            return;
        }
        tracing::debug!(from = ?self.state, to = ?to, "Session state changed");
        self.state = to;
        actions.push(Action::Transition(to));
    }

    fn fail(&mut self, kind: ErrorKind, message: String, timed_out: bool, actions: &mut Vec<Action>) {
        tracing::warn!(kind = %kind, message = %message, timed_out = timed_out, "Session failed");
        self.pending.clear();
        self.status_wait = None;
        actions.push(Action::Fail {
            kind,
            message,
            timed_out,
        });
        self.transition(SessionState::Disconnected, actions);
    }

    fn send_command(&mut self, command: Command, pending: Option<Pending>, now: Instant) -> Action {
        if let Some(kind) = pending {
            self.pending.insert(
                command.transaction_id as u32,
                (kind, now + self.params.command_timeout),
            );
        }
        tracing::debug!(command = %command.name, transaction_id = command.transaction_id, "Sending command");
        Action::Send(command.into_message())
    }

    fn transaction(&mut self) -> f64 {
        let id = self.next_transaction;
        self.next_transaction += 1;
        id as f64
    }

    /// Transport is being opened
    pub fn begin_connect(&mut self) -> Vec<Action> {
        let mut actions = Vec::new();
        self.transition(SessionState::Connecting, &mut actions);
        actions
    }

    /// Handshake done: send `connect`
    pub fn on_handshake_complete(&mut self, now: Instant) -> Vec<Action> {
        let tx = self.transaction();
        let command = Command::connect(tx, &self.params.connect);
        vec![self.send_command(command, Some(Pending::Connect), now)]
    }

    /// Caller asked to publish or play
    ///
    /// Allowed while connecting (deferred until connected) or connected.
    /// Repeated requests are no-ops.
    pub fn request_stream(&mut self, mode: SessionMode, now: Instant) -> Result<Vec<Action>> {
        if mode != self.params.mode || !self.state.is_active() {
            return Err(match mode {
                SessionMode::Publish => Error::NotPublishing,
                SessionMode::Play => Error::NotPlaying,
            });
        }
        if self.params.stream_name.is_empty() {
            return Err(Error::Config("stream name is required to publish or play".into()));
        }
        if self.stream_requested {
            return Ok(Vec::new());
        }
        self.stream_requested = true;

        if self.state == SessionState::Connected {
            Ok(self.create_stream(now))
        } else {
            Ok(Vec::new())
        }
    }

    fn create_stream(&mut self, now: Instant) -> Vec<Action> {
        let mut actions = Vec::new();
        if self.params.mode == SessionMode::Publish {
            let name = self.params.stream_name.clone();
            let tx = self.transaction();
            actions.push(self.send_command(Command::release_stream(tx, &name), Some(Pending::ReleaseStream), now));
            let tx = self.transaction();
            actions.push(self.send_command(Command::fc_publish(tx, &name), Some(Pending::FcPublish), now));
        }
        let tx = self.transaction();
        actions.push(self.send_command(Command::create_stream(tx), Some(Pending::CreateStream), now));
        actions
    }

    /// Player pause/resume
    pub fn pause(&mut self, paused: bool, position_ms: u32) -> Result<Vec<Action>> {
        let stream_id = match (self.state, self.stream_id) {
            (SessionState::Playing, Some(id)) if self.media_started => id,
            _ => return Err(Error::NotPlaying),
        };
        if self.paused == paused {
            return Ok(Vec::new());
        }
        self.paused = paused;
        let tx = self.transaction();
        let command = Command::pause(tx, stream_id, paused, position_ms);
        tracing::debug!(paused = paused, position = position_ms, "Sending pause");
        Ok(vec![Action::Send(command.into_message())])
    }

    /// Graceful stop: tear down the stream, then move to Closing
    pub fn close(&mut self) -> Vec<Action> {
        let mut actions = Vec::new();
        if !self.state.is_active() {
            return actions;
        }

        if let Some(stream_id) = self.stream_id {
            if self.params.mode == SessionMode::Publish {
                let name = self.params.stream_name.clone();
                let tx = self.transaction();
                actions.push(Action::Send(Command::fc_unpublish(tx, &name).into_message()));
            }
            actions.push(Action::Send(Command::close_stream(stream_id).into_message()));
            let tx = self.transaction();
            actions.push(Action::Send(Command::delete_stream(tx, stream_id).into_message()));
        }

        self.pending.clear();
        self.status_wait = None;
        self.transition(SessionState::Closing, &mut actions);
        actions
    }

    /// Transport gone
    pub fn disconnected(&mut self) -> Vec<Action> {
        let mut actions = Vec::new();
        self.pending.clear();
        self.status_wait = None;
        self.media_started = false;
        self.transition(SessionState::Disconnected, &mut actions);
        actions
    }

    /// Fail any command whose deadline has passed
    pub fn check_timeouts(&mut self, now: Instant) -> Vec<Action> {
        let mut actions = Vec::new();

        let expired = self
            .pending
            .iter()
            .filter(|(_, (kind, deadline))| {
                *deadline <= now && matches!(kind, Pending::Connect | Pending::CreateStream)
            })
            .map(|(_, (kind, _))| *kind)
            .next();
        if let Some(kind) = expired {
            let (error_kind, what) = match kind {
                Pending::Connect => (ErrorKind::ConnectFailed, CMD_CONNECT),
                _ => (ErrorKind::CreateStreamFailed, CMD_CREATE_STREAM),
            };
            self.fail(error_kind, format!("no response to {}", what), true, &mut actions);
            return actions;
        }
        // Servers often never answer releaseStream/FCPublish
        self.pending.retain(|_, (_, deadline)| *deadline > now);

        if let Some((wait, deadline)) = self.status_wait {
            if deadline <= now {
                let (kind, what) = match wait {
                    StatusWait::Publish => (ErrorKind::PublishRejected, NS_PUBLISH_START),
                    StatusWait::Play => (ErrorKind::PlayRejected, NS_PLAY_START),
                };
                self.fail(kind, format!("timed out waiting for {}", what), true, &mut actions);
            }
        }
        actions
    }

    /// Earliest pending deadline, for the driver's timer
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending
            .values()
            .map(|(_, d)| *d)
            .chain(self.status_wait.map(|(_, d)| d))
            .min()
    }

    /// Handle a non-media message
    pub fn handle_message(&mut self, message: RtmpMessage, now: Instant) -> Vec<Action> {
        match message {
            RtmpMessage::Command(command) => self.handle_command(command, now),
            RtmpMessage::Data(data) => self.handle_data(data),
            RtmpMessage::UserControl(event) => self.handle_user_control(event),
            RtmpMessage::Acknowledgement { sequence } => vec![Action::PeerAck(sequence)],
            RtmpMessage::SetPeerBandwidth { size, limit_type } => {
                tracing::debug!(size = size, limit_type = limit_type, "Peer bandwidth set");
                vec![
                    Action::Send(RtmpMessage::WindowAckSize(size).into_message(0, 0)),
                    Action::OutboundWindow(size),
                ]
            }
            // Chunk-level control is applied by the demuxer
            RtmpMessage::SetChunkSize(_) | RtmpMessage::Abort { .. } | RtmpMessage::WindowAckSize(_) => {
                Vec::new()
            }
            other => {
                tracing::trace!(message = ?other, "Unhandled message");
                Vec::new()
            }
        }
    }

    fn handle_user_control(&mut self, event: UserControlEvent) -> Vec<Action> {
        match event {
            UserControlEvent::PingRequest(timestamp) => vec![Action::Send(
                RtmpMessage::UserControl(UserControlEvent::PingResponse(timestamp)).into_message(0, 0),
            )],
            UserControlEvent::StreamBegin(id) => {
                tracing::debug!(stream_id = id, "Stream begin");
                Vec::new()
            }
            UserControlEvent::StreamEof(id) if Some(id) == self.stream_id && self.state == SessionState::Playing => {
                tracing::info!(stream_id = id, "Stream EOF");
                vec![Action::StreamEnded]
            }
            other => {
                tracing::trace!(event = ?other, "User control event");
                Vec::new()
            }
        }
    }

    fn handle_data(&mut self, data: DataMessage) -> Vec<Action> {
        match data.metadata() {
            Some(metadata) if self.params.mode == SessionMode::Play => {
                vec![Action::Metadata(metadata.clone())]
            }
            _ => {
                tracing::trace!(name = %data.name, "Data message");
                Vec::new()
            }
        }
    }

    fn handle_command(&mut self, command: Command, now: Instant) -> Vec<Action> {
        match command.name.as_str() {
            CMD_RESULT | CMD_ERROR => self.handle_response(command, now),
            CMD_ON_STATUS => self.handle_status(command),
            CMD_ON_BW_DONE => Vec::new(),
            other => {
                tracing::trace!(command = other, "Ignoring server command");
                Vec::new()
            }
        }
    }

    fn handle_response(&mut self, command: Command, now: Instant) -> Vec<Action> {
        let mut actions = Vec::new();
        let Some((pending, _)) = self.pending.remove(&(command.transaction_id as u32)) else {
            tracing::trace!(transaction_id = command.transaction_id, "Response to unknown transaction");
            return actions;
        };
        let is_error = command.name == CMD_ERROR;

        match pending {
            Pending::Connect => {
                let code = command.status_code().unwrap_or(NC_CONNECT_SUCCESS);
                if is_error || code != NC_CONNECT_SUCCESS {
                    self.fail(ErrorKind::ConnectFailed, command.description(), false, &mut actions);
                    return actions;
                }
                tracing::info!(app = %self.params.connect.app, "Connected");
                actions.push(Action::Send(
                    RtmpMessage::WindowAckSize(self.params.window_ack_size).into_message(0, 0),
                ));
                actions.push(Action::OutboundWindow(self.params.window_ack_size));
                self.transition(SessionState::Connected, &mut actions);
                if self.stream_requested {
                    actions.extend(self.create_stream(now));
                }
            }
            Pending::CreateStream => {
                let stream_id = command
                    .arguments
                    .iter()
                    .find_map(|a| a.as_number())
                    .filter(|id| *id >= 1.0 && !is_error);
                let Some(stream_id) = stream_id else {
                    self.fail(ErrorKind::CreateStreamFailed, command.description(), false, &mut actions);
                    return actions;
                };
                let stream_id = stream_id as u32;
                self.stream_id = Some(stream_id);
                tracing::debug!(stream_id = stream_id, "Stream created");
                self.transition(SessionState::StreamCreated, &mut actions);
                actions.extend(self.start_stream(stream_id, now));
            }
            Pending::ReleaseStream | Pending::FcPublish => {
                if is_error {
                    tracing::debug!(description = %command.description(), "Optional command refused");
                }
            }
        }
        actions
    }

    fn start_stream(&mut self, stream_id: u32, now: Instant) -> Vec<Action> {
        let mut actions = Vec::new();
        let name = self.params.stream_name.clone();
        let tx = self.transaction();
        match self.params.mode {
            SessionMode::Publish => {
                actions.push(Action::Send(Command::publish(tx, stream_id, &name).into_message()));
                self.status_wait = Some((StatusWait::Publish, now + self.params.command_timeout));
                self.transition(SessionState::Publishing, &mut actions);
            }
            SessionMode::Play => {
                actions.push(Action::Send(
                    RtmpMessage::UserControl(UserControlEvent::SetBufferLength {
                        stream_id,
                        buffer_ms: self.params.buffer_length_ms,
                    })
                    .into_message(0, 0),
                ));
                actions.push(Action::Send(Command::play(tx, stream_id, &name).into_message()));
                self.status_wait = Some((StatusWait::Play, now + self.params.command_timeout));
                self.transition(SessionState::Playing, &mut actions);
            }
        }
        actions
    }

    fn handle_status(&mut self, command: Command) -> Vec<Action> {
        let mut actions = Vec::new();
        let code = command.status_code().unwrap_or_default().to_string();
        let level = command
            .info()
            .and_then(|i| i.get("level"))
            .and_then(|l| l.as_str())
            .unwrap_or_default();
        tracing::debug!(code = %code, level = level, "onStatus");

        let waiting = self.status_wait.map(|(w, _)| w);
        match (waiting, code.as_str()) {
            (Some(StatusWait::Publish), NS_PUBLISH_START) => {
                self.status_wait = None;
                self.media_started = true;
                if let (Some(stream_id), Some(metadata)) = (self.stream_id, self.params.metadata.clone()) {
                    actions.push(Action::Send(DataMessage::set_data_frame(stream_id, metadata).into_message()));
                }
                if let Some(stream_id) = self.stream_id {
                    tracing::info!(stream = %self.params.stream_name, "Publishing");
                    actions.push(Action::StartMedia { stream_id });
                }
            }
            (Some(StatusWait::Play), NS_PLAY_START) => {
                self.status_wait = None;
                self.media_started = true;
                if let Some(stream_id) = self.stream_id {
                    tracing::info!(stream = %self.params.stream_name, "Playing");
                    actions.push(Action::AcceptMedia { stream_id });
                }
            }
            (Some(StatusWait::Play), NS_PLAY_RESET) => {}
            (Some(wait), _) if level == "error" => {
                let kind = match wait {
                    StatusWait::Publish => ErrorKind::PublishRejected,
                    StatusWait::Play => ErrorKind::PlayRejected,
                };
                let message = format!("{}: {}", code, command.description());
                self.fail(kind, message, false, &mut actions);
            }
            (None, NS_PLAY_STOP) if self.state == SessionState::Playing && self.media_started => {
                actions.push(Action::StreamEnded);
            }
            (None, NS_PAUSE_NOTIFY) | (None, NS_UNPAUSE_NOTIFY) => {
                tracing::debug!(code = %code, "Pause state changed");
            }
            (None, _) if level == "error" && self.state.is_active() => {
                tracing::warn!(code = %code, description = %command.description(), "Server reported error");
            }
            _ => {}
        }
        actions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(mode: SessionMode) -> SessionParams {
        SessionParams {
            mode,
            connect: ConnectParams {
                app: "live".into(),
                tc_url: "rtmp://localhost/live".into(),
                flash_ver: DEFAULT_FLASH_VER.into(),
                swf_url: None,
                page_url: None,
                fourcc_list: Vec::new(),
            },
            stream_name: "test".into(),
            command_timeout: Duration::from_secs(10),
            buffer_length_ms: 1000,
            window_ack_size: DEFAULT_WINDOW_ACK_SIZE,
            metadata: None,
        }
    }

    fn response(name: &str, tx: f64, args: Vec<AmfValue>) -> RtmpMessage {
        RtmpMessage::Command(Command {
            name: name.into(),
            transaction_id: tx,
            command_object: AmfValue::Null,
            arguments: args,
            stream_id: 0,
        })
    }

    fn status(level: &str, code: &str) -> RtmpMessage {
        response(
            CMD_ON_STATUS,
            0.0,
            vec![AmfValue::Object(AmfObject::new().with("level", level).with("code", code))],
        )
    }

    fn sent_commands(actions: &[Action]) -> Vec<String> {
        actions
            .iter()
            .filter_map(|a| match a {
                Action::Send(m) => match RtmpMessage::from_message(m).ok()? {
                    RtmpMessage::Command(c) => Some(c.name),
                    _ => None,
                },
                _ => None,
            })
            .collect()
    }

    fn transitions(actions: &[Action]) -> Vec<SessionState> {
        actions
            .iter()
            .filter_map(|a| match a {
                Action::Transition(s) => Some(*s),
                _ => None,
            })
            .collect()
    }

    fn connected(mode: SessionMode) -> (SessionStateMachine, Instant) {
        let now = Instant::now();
        let mut sm = SessionStateMachine::new(params(mode));
        sm.begin_connect();
        sm.on_handshake_complete(now);
        let success = AmfValue::Object(AmfObject::new().with("code", NC_CONNECT_SUCCESS));
        sm.handle_message(response(CMD_RESULT, 1.0, vec![success]), now);
        assert_eq!(sm.state(), SessionState::Connected);
        (sm, now)
    }

    #[test]
    fn test_publish_flow() {
        let (mut sm, now) = connected(SessionMode::Publish);

        let actions = sm.request_stream(SessionMode::Publish, now).unwrap();
        assert_eq!(
            sent_commands(&actions),
            vec![CMD_RELEASE_STREAM, CMD_FC_PUBLISH, CMD_CREATE_STREAM]
        );

        let actions = sm.handle_message(response(CMD_RESULT, 4.0, vec![AmfValue::Number(1.0)]), now);
        assert_eq!(sent_commands(&actions), vec![CMD_PUBLISH]);
        assert_eq!(
            transitions(&actions),
            vec![SessionState::StreamCreated, SessionState::Publishing]
        );
        assert!(!sm.media_started());

        let actions = sm.handle_message(status("status", NS_PUBLISH_START), now);
        assert_eq!(actions, vec![Action::StartMedia { stream_id: 1 }]);
        assert!(sm.media_started());

        let actions = sm.close();
        assert_eq!(
            sent_commands(&actions),
            vec![CMD_FC_UNPUBLISH, CMD_CLOSE_STREAM, CMD_DELETE_STREAM]
        );
        assert_eq!(transitions(&actions), vec![SessionState::Closing]);
    }

    #[test]
    fn test_request_before_connected_is_deferred() {
        let now = Instant::now();
        let mut sm = SessionStateMachine::new(params(SessionMode::Play));
        sm.begin_connect();
        sm.on_handshake_complete(now);
        assert!(sm.request_stream(SessionMode::Play, now).unwrap().is_empty());

        let actions = sm.handle_message(response(CMD_RESULT, 1.0, vec![]), now);
        assert_eq!(sent_commands(&actions), vec![CMD_CREATE_STREAM]);
    }

    #[test]
    fn test_play_flow_sends_buffer_length_before_play() {
        let (mut sm, now) = connected(SessionMode::Play);
        sm.request_stream(SessionMode::Play, now).unwrap();
        let actions = sm.handle_message(response(CMD_RESULT, 2.0, vec![AmfValue::Null, AmfValue::Number(1.0)]), now);

        let buffer_idx = actions
            .iter()
            .position(|a| matches!(a, Action::Send(m) if m.type_id == MSG_USER_CONTROL))
            .unwrap();
        let play_idx = actions
            .iter()
            .position(|a| matches!(a, Action::Send(m) if m.type_id == MSG_COMMAND_AMF0))
            .unwrap();
        assert!(buffer_idx < play_idx);
        assert_eq!(sm.state(), SessionState::Playing);

        let actions = sm.handle_message(status("status", NS_PLAY_START), now);
        assert_eq!(actions, vec![Action::AcceptMedia { stream_id: 1 }]);

        let actions = sm.handle_message(status("status", NS_PLAY_STOP), now);
        assert_eq!(actions, vec![Action::StreamEnded]);
    }

    #[test]
    fn test_connect_error_fails_without_create_stream() {
        let now = Instant::now();
        let mut sm = SessionStateMachine::new(params(SessionMode::Publish));
        sm.begin_connect();
        sm.on_handshake_complete(now);
        sm.request_stream(SessionMode::Publish, now).unwrap();

        let actions = sm.handle_message(response(CMD_ERROR, 1.0, vec![]), now);
        assert!(sent_commands(&actions).is_empty());
        assert!(matches!(
            actions[0],
            Action::Fail { kind: ErrorKind::ConnectFailed, .. }
        ));
        assert_eq!(transitions(&actions), vec![SessionState::Disconnected]);
        assert_eq!(sm.state(), SessionState::Disconnected);
    }

    #[test]
    fn test_publish_rejected() {
        let (mut sm, now) = connected(SessionMode::Publish);
        sm.request_stream(SessionMode::Publish, now).unwrap();
        sm.handle_message(response(CMD_RESULT, 4.0, vec![AmfValue::Number(1.0)]), now);

        let actions = sm.handle_message(status("error", "NetStream.Publish.BadName"), now);
        match &actions[0] {
            Action::Fail {
                kind,
                message,
                timed_out,
            } => {
                assert_eq!(*kind, ErrorKind::PublishRejected);
                assert!(message.contains("BadName"));
                assert!(!timed_out);
            }
            other => panic!("Expected failure, got {:?}", other),
        }
    }

    #[test]
    fn test_release_stream_error_is_ignored() {
        let (mut sm, now) = connected(SessionMode::Publish);
        sm.request_stream(SessionMode::Publish, now).unwrap();
        let actions = sm.handle_message(response(CMD_ERROR, 2.0, vec![]), now);
        assert!(actions.is_empty());
        assert_eq!(sm.state(), SessionState::Connected);
    }

    #[test]
    fn test_timeouts() {
        let now = Instant::now();
        let mut sm = SessionStateMachine::new(params(SessionMode::Publish));
        sm.begin_connect();
        sm.on_handshake_complete(now);

        assert!(sm.check_timeouts(now + Duration::from_secs(5)).is_empty());
        let actions = sm.check_timeouts(now + Duration::from_secs(10));
        assert!(matches!(
            actions[0],
            Action::Fail {
                kind: ErrorKind::ConnectFailed,
                timed_out: true,
                ..
            }
        ));

        let (mut sm, now) = connected(SessionMode::Play);
        sm.request_stream(SessionMode::Play, now).unwrap();
        sm.handle_message(response(CMD_RESULT, 2.0, vec![AmfValue::Number(1.0)]), now);
        let actions = sm.check_timeouts(now + Duration::from_secs(11));
        assert!(matches!(
            actions[0],
            Action::Fail {
                kind: ErrorKind::PlayRejected,
                timed_out: true,
                ..
            }
        ));
    }

    #[test]
    fn test_wrong_mode_is_caller_misuse() {
        let (mut sm, now) = connected(SessionMode::Play);
        assert!(matches!(
            sm.request_stream(SessionMode::Publish, now),
            Err(Error::NotPublishing)
        ));
        assert!(matches!(sm.pause(true, 0), Err(Error::NotPlaying)));
    }

    #[test]
    fn test_ping_and_bandwidth() {
        let (mut sm, now) = connected(SessionMode::Play);
        let actions = sm.handle_message(
            RtmpMessage::UserControl(UserControlEvent::PingRequest(42)),
            now,
        );
        match &actions[0] {
            Action::Send(m) => assert_eq!(
                RtmpMessage::from_message(m).unwrap(),
                RtmpMessage::UserControl(UserControlEvent::PingResponse(42))
            ),
            other => panic!("Expected ping response, got {:?}", other),
        }

        let actions = sm.handle_message(
            RtmpMessage::SetPeerBandwidth {
                size: 5_000_000,
                limit_type: 2,
            },
            now,
        );
        assert_eq!(actions[1], Action::OutboundWindow(5_000_000));
    }

    #[test]
    fn test_transitions_are_monotonic() {
        let (mut sm, _) = connected(SessionMode::Play);
        let mut actions = Vec::new();
        sm.transition(SessionState::Connecting, &mut actions);
        assert!(actions.is_empty());
        assert_eq!(sm.state(), SessionState::Connected);

        assert_eq!(transitions(&sm.disconnected()), vec![SessionState::Disconnected]);
        assert!(sm.disconnected().is_empty());
    }
}
