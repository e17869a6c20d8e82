//! Session manager
//!
//! One session = one connection, two loops:
//!
//! - the read loop owns the [`SessionStateMachine`], decodes inbound chunks,
//!   answers control messages and turns play media into events
//! - the write loop frames everything outbound: control messages from an
//!   unbounded channel first, then media from the bounded [`MediaQueue`] once
//!   the server has started the publish
//!
//! Both run inside one session task, which first opens the transport and
//! runs the handshake. Whatever ends the session, that task emits the
//! terminal `SessionClosed`.

use bytes::BytesMut;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader, BufWriter};
use tokio::sync::{mpsc, watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::timeout;

use crate::client::config::{ClientConfig, ParsedUrl};
use crate::client::events::{CloseReason, EventQueue, SessionEvent};
use crate::client::transport::{self, AsyncStream, BoxedStream};
use crate::error::{Error, ErrorKind, MediaError, Result};
use crate::media::{
    Codec, Depacketized, Depacketizer, MediaFrame, MediaKind, MediaQueue, OutboundMedia,
    Packetizer, PushOutcome, SequenceHeader,
};
use crate::mux::{Demuxer, Muxer, StallMonitor};
use crate::protocol::chunk::Message;
use crate::protocol::constants::*;
use crate::protocol::handshake::perform_client_handshake;
use crate::protocol::message::RtmpMessage;
use crate::session::{Action, SessionMode, SessionState, SessionStateMachine};
use crate::stats::{SessionStats, StatsCollector};

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// Caller intents, executed by the read loop
#[derive(Debug)]
enum Request {
    StartStream(SessionMode),
    Pause(bool),
    Stop,
}

/// Work for the write loop
#[derive(Debug)]
enum Outbound {
    Message(Message),
    ChunkSize(u32),
    StartMedia { stream_id: u32 },
    Shutdown,
}

/// How the session ended
#[derive(Debug)]
enum LoopExit {
    Stopped,
    PeerClosed,
    Rejected(ErrorKind),
    Failed(Error),
}

/// State shared by the handle and the session tasks
struct Shared {
    session_id: u64,
    state: watch::Sender<SessionState>,
    events: EventQueue,
    media: MediaQueue,
    stats: StatsCollector,
    stop_requested: AtomicBool,
    /// Wakes the session task while it is still connecting
    stop_signal: Notify,
    /// Last play timestamp, used as the pause position
    play_position: AtomicU32,
}

impl Shared {
    fn set_state(&self, state: SessionState) {
        let changed = self.state.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state;
                true
            }
        });
        if changed {
            self.events.push(SessionEvent::StateChanged(state));
        }
    }

    fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    fn stats(&self) -> SessionStats {
        let mut stats = self.stats.snapshot();
        stats.dropped_frames += self.media.dropped() + self.events.dropped_frames();
        stats
    }

    fn stopping(&self) -> bool {
        self.stop_requested.load(Ordering::Acquire)
    }

    /// Emit the terminal events; later calls are no-ops
    fn finish(&self, exit: LoopExit) {
        let reason = match exit {
            _ if self.stopping() => CloseReason::UserRequested,
            LoopExit::Stopped => CloseReason::UserRequested,
            LoopExit::PeerClosed => CloseReason::PeerClosed,
            LoopExit::Rejected(kind) => CloseReason::Rejected(kind),
            LoopExit::Failed(e) => {
                let kind = e.kind();
                tracing::error!(session_id = self.session_id, error = %e, "Session failed");
                self.events.push(SessionEvent::Error {
                    kind,
                    message: e.to_string(),
                    timed_out: e.is_timeout(),
                });
                CloseReason::Error(kind)
            }
        };
        self.media.close();
        self.set_state(SessionState::Disconnected);
        tracing::info!(session_id = self.session_id, reason = ?reason, "Session closed");
        self.events.push(SessionEvent::SessionClosed(reason));
    }
}

/// A running RTMP publish or play session
pub struct SessionManager {
    session_id: u64,
    mode: SessionMode,
    stream_name: String,
    shutdown_timeout: Duration,
    shared: Arc<Shared>,
    requests: mpsc::UnboundedSender<Request>,
    control: mpsc::UnboundedSender<Outbound>,
    task: Mutex<Option<JoinHandle<()>>>,
    headers: Mutex<HashSet<Codec>>,
}

impl SessionManager {
    /// Open a session to `config.url`
    ///
    /// Returns as soon as the session task is running. TCP (and TLS for
    /// `rtmps://`), the handshake and the server's answers all happen in
    /// the background and are reported as events; a failure there ends with
    /// `Error`, `StateChanged(Disconnected)` and `SessionClosed`. Only the
    /// license gate and configuration errors are returned here, before any
    /// network I/O.
    pub async fn connect(config: ClientConfig) -> Result<Self> {
        if !config.license.is_licensed() {
            return Err(Error::LicenseRequired);
        }
        let url = config.validate()?;
        Ok(Self::spawn(config, url, None))
    }

    /// Run a session over an already connected stream
    pub async fn connect_with_stream<S>(config: ClientConfig, stream: S) -> Result<Self>
    where
        S: AsyncStream + 'static,
    {
        if !config.license.is_licensed() {
            return Err(Error::LicenseRequired);
        }
        let url = config.validate()?;
        Ok(Self::spawn(config, url, Some(Box::new(stream))))
    }

    fn spawn(config: ClientConfig, url: ParsedUrl, stream: Option<BoxedStream>) -> Self {
        let params = config.session_params(&url);
        let session_id = NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed);

        let (state_tx, _) = watch::channel(SessionState::Disconnected);
        let shared = Arc::new(Shared {
            session_id,
            state: state_tx,
            events: EventQueue::new(config.frame_queue_depth),
            media: MediaQueue::new(config.media_queue_capacity),
            stats: StatsCollector::new(),
            stop_requested: AtomicBool::new(false),
            stop_signal: Notify::new(),
            play_position: AtomicU32::new(0),
        });

        let mut machine = SessionStateMachine::new(params.clone());
        for action in machine.begin_connect() {
            if let Action::Transition(state) = action {
                shared.set_state(state);
            }
        }

        let (request_tx, request_rx) = mpsc::unbounded_channel();
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        if let Some(size) = config.chunk_size {
            let _ = control_tx.send(Outbound::ChunkSize(size));
        }

        tracing::info!(
            session_id = session_id,
            url = %config.url,
            mode = ?config.mode,
            "Starting session"
        );

        let read_loop = ReadLoop {
            shared: shared.clone(),
            machine,
            demuxer: Demuxer::new(),
            depacketizer: Depacketizer::new(),
            stall: StallMonitor::new(DEFAULT_WINDOW_ACK_SIZE, config.stall_multiple),
            requests: request_rx,
            control: control_tx.clone(),
            stats_interval: config.stats_interval,
            exit: None,
        };
        let write_loop = WriteLoop {
            shared: shared.clone(),
            control: control_rx,
            muxer: Muxer::new(),
            packetizer: None,
            buf: BytesMut::with_capacity(64 * 1024),
        };
        let task = tokio::spawn(run_session(
            config.clone(),
            url,
            stream,
            read_loop,
            write_loop,
            shared.clone(),
        ));

        Self {
            session_id,
            mode: config.mode,
            stream_name: params.stream_name,
            shutdown_timeout: config.shutdown_timeout,
            shared,
            requests: request_tx,
            control: control_tx,
            task: Mutex::new(Some(task)),
            headers: Mutex::new(HashSet::new()),
        }
    }

    pub fn session_id(&self) -> u64 {
        self.session_id
    }

    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    pub fn state(&self) -> SessionState {
        self.shared.state()
    }

    /// Watch state changes without consuming events
    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.shared.state.subscribe()
    }

    pub fn stats(&self) -> SessionStats {
        self.shared.stats()
    }

    /// Next event; `None` once `SessionClosed` has been delivered
    pub async fn next_event(&self) -> Option<SessionEvent> {
        self.shared.events.next().await
    }

    pub fn try_next_event(&self) -> Option<SessionEvent> {
        self.shared.events.try_next()
    }

    fn request_stream(&self, mode: SessionMode) -> Result<()> {
        let misuse = match mode {
            SessionMode::Publish => Error::NotPublishing,
            SessionMode::Play => Error::NotPlaying,
        };
        if self.mode != mode || !self.state().is_active() || self.shared.stopping() {
            return Err(misuse);
        }
        if self.stream_name.is_empty() {
            return Err(Error::Config("stream name is required to publish or play".into()));
        }
        self.requests
            .send(Request::StartStream(mode))
            .map_err(|_| misuse)
    }

    /// Create the stream and publish it
    ///
    /// May be called while the `connect` answer is still pending.
    pub fn start_publish(&self) -> Result<()> {
        self.request_stream(SessionMode::Publish)
    }

    /// Create the stream and play it
    pub fn start_play(&self) -> Result<()> {
        self.request_stream(SessionMode::Play)
    }

    fn ensure_publishing(&self) -> Result<()> {
        if self.mode != SessionMode::Publish || self.shared.stopping() {
            return Err(Error::NotPublishing);
        }
        Ok(())
    }

    /// Queue codec parameters for a track
    ///
    /// Sent before the track's first frame, and again mid-stream when the
    /// parameters change.
    pub fn send_sequence_header(&self, header: SequenceHeader) -> Result<()> {
        self.ensure_publishing()?;
        if !self.state().is_active() {
            return Err(Error::NotPublishing);
        }
        let codec = header.codec;
        match self.shared.media.push(OutboundMedia::SequenceHeader(header)) {
            PushOutcome::Closed => Err(Error::NotPublishing),
            _ => {
                self.headers.lock().insert(codec);
                Ok(())
            }
        }
    }

    /// Queue one encoded frame; never blocks
    ///
    /// Fails with `NotPublishing` unless the session is publishing, and with
    /// `MissingSequenceHeader` if no header was sent for the frame's codec.
    pub fn send_frame(&self, frame: MediaFrame) -> Result<PushOutcome> {
        self.ensure_publishing()?;
        if self.state() != SessionState::Publishing {
            return Err(Error::NotPublishing);
        }
        if frame.data.is_empty() {
            return Err(MediaError::EmptyPayload.into());
        }
        if !self.headers.lock().contains(&frame.codec) {
            return Err(MediaError::MissingSequenceHeader.into());
        }
        match self.shared.media.push(OutboundMedia::Frame(frame)) {
            PushOutcome::Closed => Err(Error::NotPublishing),
            outcome => Ok(outcome),
        }
    }

    /// Outbound chunk size to use from the next message on
    pub fn set_chunk_size_preference(&self, size: u32) -> Result<()> {
        if size == 0 || size > MAX_CHUNK_SIZE {
            return Err(Error::Config(format!("invalid chunk size: {}", size)));
        }
        self.control
            .send(Outbound::ChunkSize(size))
            .map_err(|_| Error::ConnectionClosed)
    }

    /// Pause or resume playback
    pub fn pause(&self, paused: bool) -> Result<()> {
        if self.mode != SessionMode::Play || self.state() != SessionState::Playing {
            return Err(Error::NotPlaying);
        }
        self.requests
            .send(Request::Pause(paused))
            .map_err(|_| Error::NotPlaying)
    }

    /// Stop the session
    ///
    /// Tears the stream down, waits for both loops to exit and force-closes
    /// the connection if that takes longer than the shutdown timeout. Queued
    /// media is discarded. Calling it again is a no-op.
    pub async fn stop(&self) -> Result<()> {
        let Some(mut task) = self.task.lock().take() else {
            return Ok(());
        };
        tracing::debug!(session_id = self.session_id, "Stop requested");
        self.shared.stop_requested.store(true, Ordering::Release);
        self.shared.media.close();
        self.shared.stop_signal.notify_one();
        let _ = self.requests.send(Request::Stop);

        if timeout(self.shutdown_timeout, &mut task).await.is_err() {
            tracing::warn!(session_id = self.session_id, "Shutdown timed out, force-closing");
            task.abort();
            let _ = task.await;
            self.shared.finish(LoopExit::Stopped);
        }
        Ok(())
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        if let Some(task) = self.task.lock().take() {
            self.shared.stop_requested.store(true, Ordering::Release);
            task.abort();
        }
    }
}

/// TCP/TLS (unless a stream was supplied), then the handshake
async fn establish(
    config: &ClientConfig,
    url: &ParsedUrl,
    stream: Option<BoxedStream>,
) -> Result<BoxedStream> {
    let mut stream = match stream {
        Some(stream) => stream,
        None => transport::open(config, url).await?,
    };
    perform_client_handshake(&mut stream, config.connect_timeout).await?;
    Ok(stream)
}

async fn run_session(
    config: ClientConfig,
    url: ParsedUrl,
    stream: Option<BoxedStream>,
    read_loop: ReadLoop,
    write_loop: WriteLoop,
    shared: Arc<Shared>,
) {
    let established = tokio::select! {
        result = establish(&config, &url, stream) => Some(result),
        _ = shared.stop_signal.notified() => None,
    };
    let stream = match established {
        Some(Ok(stream)) => stream,
        Some(Err(e)) => return shared.finish(LoopExit::Failed(e)),
        None => return shared.finish(LoopExit::Stopped),
    };

    let (read_half, write_half) = tokio::io::split(stream);
    let reader = BufReader::with_capacity(64 * 1024, read_half);
    let writer = BufWriter::with_capacity(64 * 1024, write_half);

    let read = read_loop.run(reader);
    let write = write_loop.run(writer);
    tokio::pin!(read, write);

    let exit = tokio::select! {
        exit = &mut read => {
            if timeout(config.shutdown_timeout, &mut write).await.is_err() {
                tracing::warn!(session_id = shared.session_id, "Write loop stuck, abandoning");
            }
            exit
        }
        result = &mut write => match result {
            Err(e) => LoopExit::Failed(e),
            Ok(()) => LoopExit::Stopped,
        },
    };
    shared.finish(exit);
}

struct ReadLoop {
    shared: Arc<Shared>,
    machine: SessionStateMachine,
    demuxer: Demuxer,
    depacketizer: Depacketizer,
    stall: StallMonitor,
    requests: mpsc::UnboundedReceiver<Request>,
    control: mpsc::UnboundedSender<Outbound>,
    stats_interval: Option<Duration>,
    exit: Option<LoopExit>,
}

impl ReadLoop {
    async fn run<R>(mut self, mut reader: R) -> LoopExit
    where
        R: AsyncRead + Unpin,
    {
        let session_id = self.shared.session_id;
        let actions = self.machine.on_handshake_complete(Instant::now());
        self.apply(actions);

        let mut stats_tick = tokio::time::interval(self.stats_interval.unwrap_or(Duration::from_secs(3600)));
        stats_tick.tick().await;

        let exit = loop {
            if let Some(exit) = self.exit.take() {
                break exit;
            }
            let deadline = self.machine.next_deadline();

            tokio::select! {
                biased;

                request = self.requests.recv() => {
                    match request {
                        Some(request) => self.handle_request(request),
                        None => {
                            let actions = self.machine.close();
                            self.apply(actions);
                            self.exit = Some(LoopExit::Stopped);
                        }
                    }
                }

                _ = sleep_until(deadline) => {
                    let actions = self.machine.check_timeouts(Instant::now());
                    self.apply(actions);
                }

                _ = stats_tick.tick(), if self.stats_interval.is_some() => {
                    self.shared.stats.sample_bitrate();
                    self.shared.events.push(SessionEvent::Stats(self.shared.stats()));
                    self.check_stall();
                }

                read = reader.read_buf(self.demuxer.buffer_mut()) => {
                    match read {
                        Ok(0) => {
                            tracing::debug!(session_id = session_id, "Peer closed connection");
                            self.exit = Some(LoopExit::PeerClosed);
                        }
                        Ok(n) => {
                            self.shared.stats.add_received(n);
                            if let Some(ack) = self.demuxer.on_read(n) {
                                self.send(ack);
                            }
                            if let Err(e) = self.drain_messages() {
                                self.exit = Some(LoopExit::Failed(e));
                            }
                            self.check_stall();
                        }
                        Err(e) => self.exit = Some(LoopExit::Failed(Error::Io(e))),
                    }
                }
            }
        };

        let _ = self.control.send(Outbound::Shutdown);
        tracing::debug!(session_id = session_id, exit = ?exit, "Read loop finished");
        exit
    }

    fn send(&self, message: Message) {
        let _ = self.control.send(Outbound::Message(message));
    }

    fn handle_request(&mut self, request: Request) {
        match request {
            Request::StartStream(mode) => match self.machine.request_stream(mode, Instant::now()) {
                Ok(actions) => self.apply(actions),
                Err(e) => tracing::warn!(error = %e, "Stream request refused"),
            },
            Request::Pause(paused) => {
                let position = self.shared.play_position.load(Ordering::Relaxed);
                match self.machine.pause(paused, position) {
                    Ok(actions) => self.apply(actions),
                    Err(e) => tracing::warn!(error = %e, "Pause refused"),
                }
            }
            Request::Stop => {
                let actions = self.machine.close();
                self.apply(actions);
                self.exit = Some(LoopExit::Stopped);
            }
        }
    }

    fn apply(&mut self, actions: Vec<Action>) {
        for action in actions {
            match action {
                Action::Send(message) => self.send(message),
                Action::Transition(state) => self.shared.set_state(state),
                Action::StartMedia { stream_id } => {
                    let _ = self.control.send(Outbound::StartMedia { stream_id });
                }
                Action::AcceptMedia { stream_id } => {
                    tracing::debug!(stream_id = stream_id, "Accepting media");
                }
                Action::Metadata(metadata) => {
                    self.shared.events.push(SessionEvent::Metadata(metadata));
                }
                Action::StreamEnded => {
                    self.shared.events.push(SessionEvent::StreamEnded);
                }
                Action::PeerAck(sequence) => {
                    self.stall.on_ack(sequence, self.shared.stats.bytes_sent());
                }
                Action::OutboundWindow(window) => self.stall.set_window(window),
                Action::Fail {
                    kind,
                    message,
                    timed_out,
                } => {
                    self.shared.events.push(SessionEvent::Error {
                        kind,
                        message,
                        timed_out,
                    });
                    self.exit = Some(LoopExit::Rejected(kind));
                }
            }
        }
    }

    fn check_stall(&mut self) {
        if let Some(unacknowledged) = self.stall.check(self.shared.stats.bytes_sent()) {
            tracing::warn!(
                session_id = self.shared.session_id,
                unacknowledged = unacknowledged,
                "Peer acknowledgements stalled"
            );
            self.shared.events.push(SessionEvent::Stalled { unacknowledged });
        }
    }

    fn drain_messages(&mut self) -> Result<()> {
        while let Some(message) = self.demuxer.next_message()? {
            if self.exit.is_some() {
                break;
            }
            if message.is_media() {
                self.handle_media(message);
                continue;
            }
            let parsed = RtmpMessage::from_message(&message)?;
            let actions = self.machine.handle_message(parsed, Instant::now());
            self.apply(actions);
        }
        Ok(())
    }

    fn handle_media(&mut self, message: Message) {
        if self.machine.mode() != SessionMode::Play || !self.machine.media_started() {
            tracing::trace!(type_id = message.type_id, "Discarding media before Play.Start");
            return;
        }
        let kind = if message.type_id == MSG_VIDEO {
            MediaKind::Video
        } else {
            MediaKind::Audio
        };

        let dropped_before = self.depacketizer.dropped();
        let result = self.depacketizer.push(kind, message.timestamp, message.payload);
        self.shared
            .stats
            .add_dropped(self.depacketizer.dropped() - dropped_before);

        match result {
            Ok(Some(Depacketized::Configured(config))) => {
                self.shared.events.push(SessionEvent::CodecConfigured(config));
            }
            Ok(Some(Depacketized::Frame(frame))) => {
                self.shared
                    .stats
                    .record_frame(frame.kind, frame.keyframe, frame.data.len());
                self.shared.play_position.store(frame.timestamp, Ordering::Relaxed);
                self.shared.events.push(SessionEvent::FrameReceived(frame));
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(kind = kind.name(), error = %e, "Malformed media payload, dropping");
                self.shared.stats.add_dropped(1);
            }
        }
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline.into()).await,
        None => std::future::pending().await,
    }
}

struct WriteLoop {
    shared: Arc<Shared>,
    control: mpsc::UnboundedReceiver<Outbound>,
    muxer: Muxer,
    packetizer: Option<Packetizer>,
    buf: BytesMut,
}

impl WriteLoop {
    async fn run<W>(mut self, mut writer: W) -> Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        let shared = self.shared.clone();
        let mut media_open = true;

        loop {
            let media_ready = media_open && self.packetizer.is_some() && !shared.stopping();
            tokio::select! {
                biased;

                outbound = self.control.recv() => {
                    let mut shutdown = match outbound {
                        Some(outbound) => self.handle_control(outbound)?,
                        None => true,
                    };
                    // Everything already queued goes out in one flush
                    while !shutdown {
                        match self.control.try_recv() {
                            Ok(outbound) => shutdown = self.handle_control(outbound)?,
                            Err(_) => break,
                        }
                    }
                    if shutdown {
                        return self.shutdown(writer).await;
                    }
                    self.flush(&mut writer).await?;
                }

                item = shared.media.pop(), if media_ready => {
                    let Some(item) = item else {
                        media_open = false;
                        continue;
                    };
                    if shared.stopping() {
                        if matches!(item, OutboundMedia::Frame(_)) {
                            shared.stats.add_dropped(1);
                        }
                        continue;
                    }
                    self.handle_media(item)?;
                    self.flush(&mut writer).await?;
                }
            }
        }
    }

    /// Returns true on shutdown
    fn handle_control(&mut self, outbound: Outbound) -> Result<bool> {
        match outbound {
            Outbound::Message(message) => self.muxer.write(&message, &mut self.buf)?,
            Outbound::ChunkSize(size) => {
                if let Some(message) = self.muxer.chunk_size_change(size) {
                    self.muxer.write(&message, &mut self.buf)?;
                }
            }
            Outbound::StartMedia { stream_id } => {
                tracing::debug!(stream_id = stream_id, "Starting media");
                self.packetizer = Some(Packetizer::new(stream_id));
            }
            Outbound::Shutdown => return Ok(true),
        }
        Ok(false)
    }

    fn handle_media(&mut self, item: OutboundMedia) -> Result<()> {
        let Some(packetizer) = self.packetizer.as_mut() else {
            return Ok(());
        };
        match item {
            OutboundMedia::SequenceHeader(header) => {
                if let Some(message) = packetizer.push_sequence_header(header) {
                    self.muxer.write(&message, &mut self.buf)?;
                }
            }
            OutboundMedia::Frame(frame) => match packetizer.push_frame(&frame) {
                Ok(message) => {
                    self.muxer.write(&message, &mut self.buf)?;
                    self.shared
                        .stats
                        .record_frame(frame.kind, frame.keyframe, frame.data.len());
                }
                Err(e) => {
                    tracing::warn!(kind = frame.kind.name(), error = %e, "Frame not sent");
                    self.shared.stats.add_dropped(1);
                }
            },
        }
        Ok(())
    }

    async fn flush<W: AsyncWrite + Unpin>(&mut self, writer: &mut W) -> Result<()> {
        if self.buf.is_empty() {
            return Ok(());
        }
        writer.write_all(&self.buf).await?;
        writer.flush().await?;
        self.shared.stats.add_sent(self.buf.len());
        self.buf.clear();
        Ok(())
    }

    async fn shutdown<W: AsyncWrite + Unpin>(mut self, mut writer: W) -> Result<()> {
        self.flush(&mut writer).await?;
        let discarded = self.shared.media.clear();
        if discarded > 0 {
            tracing::debug!(frames = discarded, "Discarded queued media");
            self.shared.stats.add_dropped(discarded as u64);
        }
        let _ = writer.shutdown().await;
        tracing::debug!(session_id = self.shared.session_id, "Write loop finished");
        Ok(())
    }
}
