//! Command channel
//!
//! Pairs a caller-driven writer with a background reader thread. Every
//! successful write opens one response cycle and each terminator closes the
//! oldest open one. A caller that wants the reply registers a one-shot sender
//! for its cycle before writing, and the reader hands over the finished line
//! buffer through it. Replies nobody waits for are reported to the diagnostic
//! sink and dropped. When an awaited reply never arrives the open cycles are
//! written off, so a lost or garbled terminator costs one command rather than
//! shifting every later pairing.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tokio::sync::oneshot;

use super::{AirCommand, Command, Parameter, ProtocolError, Response, ResponseAssembler};
use crate::config::ChannelConfig;
use crate::diagnostics::DiagnosticSink;
use crate::transport::{LineReader, LineWriter, TransportError, TransportSession};

type ResponseSender = oneshot::Sender<Result<Response, ProtocolError>>;

/// Cycle bookkeeping shared between callers and the reader thread
#[derive(Default)]
struct Cycles {
    /// Commands written so far
    issued: u64,
    /// Commands whose reply has been closed (or given up on)
    completed: u64,
    /// Callers waiting for a specific cycle
    waiters: HashMap<u64, ResponseSender>,
    reader_stopped: bool,
    /// Set after an await timed out; the reader drops its partial reply
    discard_partial: bool,
}

impl Cycles {
    fn open(&mut self) -> u64 {
        self.issued += 1;
        self.issued
    }

    /// Write off every open cycle, failing its waiter with `ResponseAbandoned`
    fn close_open(&mut self) {
        for cycle in self.completed + 1..=self.issued {
            if let Some(tx) = self.waiters.remove(&cycle) {
                let _ = tx.send(Err(ProtocolError::ResponseAbandoned));
            }
        }
        self.completed = self.issued;
    }
}

type SharedCycles = Arc<Mutex<Cycles>>;

fn lock(cycles: &Mutex<Cycles>) -> MutexGuard<'_, Cycles> {
    // Cycles holds no invariant a panicking holder could break halfway
    cycles.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Where the channel is in the command/response cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelState {
    /// No reply outstanding
    Idle,
    /// A command was written and its terminator has not arrived yet
    AwaitingResponse,
    /// The reader thread has exited; replies will no longer be collected
    Stopped,
}

/// Command/response channel to the air-supply controller
pub struct CommandChannel {
    writer: LineWriter,
    cycles: SharedCycles,
    stop: Arc<AtomicBool>,
    reader: Option<JoinHandle<()>>,
    sink: Arc<dyn DiagnosticSink>,
    response_timeout: Duration,
}

impl CommandChannel {
    /// Open the configured serial port and start collecting replies
    pub fn open(
        config: &ChannelConfig,
        sink: Arc<dyn DiagnosticSink>,
    ) -> Result<Self, TransportError> {
        let session = TransportSession::open(config, Arc::clone(&sink))?;
        Ok(Self::new(session, sink)?.with_response_timeout(config.response_timeout()))
    }

    /// Take over `session` and spawn the reader thread
    pub fn new(
        session: TransportSession,
        sink: Arc<dyn DiagnosticSink>,
    ) -> Result<Self, TransportError> {
        let (writer, reader) = session.split();
        let cycles = SharedCycles::default();
        let stop = Arc::new(AtomicBool::new(false));

        let handle = {
            let cycles = Arc::clone(&cycles);
            let stop = Arc::clone(&stop);
            let sink = Arc::clone(&sink);
            thread::Builder::new()
                .name("airsupply-reader".to_string())
                .spawn(move || run_reader(reader, cycles, stop, sink))?
        };

        Ok(Self {
            writer,
            cycles,
            stop,
            reader: Some(handle),
            sink,
            response_timeout: Duration::from_millis(super::DEFAULT_RESPONSE_TIMEOUT_MS),
        })
    }

    /// Bound used by [`CommandChannel::execute`] when waiting for a reply
    pub fn with_response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = timeout;
        self
    }

    pub fn response_timeout(&self) -> Duration {
        self.response_timeout
    }

    /// Current position in the command/response cycle
    pub fn state(&self) -> ChannelState {
        let state = lock(&self.cycles);
        if state.reader_stopped {
            ChannelState::Stopped
        } else if state.completed < state.issued {
            ChannelState::AwaitingResponse
        } else {
            ChannelState::Idle
        }
    }

    /// Write `command` and return without waiting for the reply
    pub fn send(&mut self, command: &Command) -> Result<(), TransportError> {
        let cycle = lock(&self.cycles).open();
        self.dispatch(command, cycle)
    }

    /// Write `command` and wait up to `timeout` for its complete reply.
    ///
    /// On timeout every open cycle is written off and the reader drops any
    /// partial reply. A reply that turns up later is reported as unsolicited
    /// and the next command pairs with its own reply.
    pub async fn send_and_await_response(
        &mut self,
        command: &Command,
        timeout: Duration,
    ) -> Result<Response, ProtocolError> {
        let (tx, rx) = oneshot::channel();
        let cycle = {
            // Checked under the same lock the reader takes to drain waiters on exit
            let mut state = lock(&self.cycles);
            if state.reader_stopped {
                return Err(ProtocolError::ReaderStopped);
            }
            let cycle = state.open();
            state.waiters.insert(cycle, tx);
            cycle
        };
        self.dispatch(command, cycle)?;

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(ProtocolError::ReaderStopped),
            Err(_) => {
                {
                    let mut state = lock(&self.cycles);
                    state.waiters.remove(&cycle);
                    state.close_open();
                    state.discard_partial = true;
                }
                let err = ProtocolError::Timeout;
                self.sink.error(&format!("awaiting reply to {}", command), &err);
                Err(err)
            }
        }
    }

    /// Send `SET KEY=VALUE`, upper-casing the key
    pub fn set_parameter(&mut self, key: &str, value: &str) -> Result<(), ProtocolError> {
        self.send_parameter(Parameter::new(key, value))
    }

    /// Send `SET` from its literal `key=value` form
    pub fn set_parameter_str(&mut self, text: &str) -> Result<(), ProtocolError> {
        self.send_parameter(Parameter::parse(text))
    }

    fn send_parameter(
        &mut self,
        parameter: Result<Parameter, ProtocolError>,
    ) -> Result<(), ProtocolError> {
        let parameter = match parameter {
            Ok(p) => p,
            Err(e) => {
                self.sink.error("validating SET parameter", &e);
                return Err(e);
            }
        };
        self.send(&parameter.to_command())?;
        Ok(())
    }

    /// Run one controller operation.
    ///
    /// Operations whose reply matters (`HELP`, `GET_PRESSURE`) wait for it
    /// using the channel's response timeout; the rest are fire-and-forget.
    pub async fn execute(
        &mut self,
        command: &AirCommand,
    ) -> Result<Option<Response>, ProtocolError> {
        let line = command.to_command();
        if command.expects_response() {
            let timeout = self.response_timeout;
            self.send_and_await_response(&line, timeout).await.map(Some)
        } else {
            self.send(&line)?;
            Ok(None)
        }
    }

    /// Stop the reader and release the port.
    ///
    /// Blocks for at most one read timeout while the reader notices.
    pub fn shutdown(&mut self) {
        self.stop.store(true, Ordering::Release);
        self.writer.close();
        if let Some(handle) = self.reader.take() {
            let _ = handle.join();
        }
    }

    /// Write `command` for an already opened `cycle`.
    ///
    /// The cycle is opened before writing so an instant reply can't outrun it.
    fn dispatch(&mut self, command: &Command, cycle: u64) -> Result<(), TransportError> {
        if let Err(e) = self.writer.write_line(command.as_str()) {
            {
                let mut state = lock(&self.cycles);
                state.waiters.remove(&cycle);
                if state.completed < cycle {
                    state.issued = cycle - 1;
                }
            }
            self.sink.error(&format!("sending {}", command), &e);
            return Err(e);
        }

        self.sink.command_sent(command.as_str());
        Ok(())
    }
}

impl Drop for CommandChannel {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_reader(
    mut reader: LineReader,
    cycles: SharedCycles,
    stop: Arc<AtomicBool>,
    sink: Arc<dyn DiagnosticSink>,
) {
    let mut assembler = ResponseAssembler::new();
    let timeout = reader.read_timeout();

    while !stop.load(Ordering::Acquire) {
        match reader.read_line(timeout) {
            Ok(Some(line)) => {
                if line.is_empty() {
                    continue;
                }
                sink.line_received(&line);
                discard_if_resynced(&cycles, &mut assembler);
                if let Some(lines) = assembler.push_line(&line) {
                    complete_cycle(&cycles, lines, sink.as_ref());
                }
            }
            Ok(None) => discard_if_resynced(&cycles, &mut assembler),
            Err(e) => {
                sink.error("reading reply", &e);
                assembler.abandon();
                abandon_cycles(&cycles);
                if e.is_disconnect() {
                    break;
                }
            }
        }
    }

    let mut state = lock(&cycles);
    state.reader_stopped = true;
    for (_, tx) in state.waiters.drain() {
        let _ = tx.send(Err(ProtocolError::ReaderStopped));
    }
}

/// Close the oldest open cycle with `lines`
fn complete_cycle(cycles: &Mutex<Cycles>, lines: Vec<String>, sink: &dyn DiagnosticSink) {
    let mut state = lock(cycles);
    if state.completed >= state.issued {
        drop(state);
        sink.unsolicited_response(&lines);
        return;
    }

    state.completed += 1;
    let response = Response {
        cycle: state.completed,
        lines,
    };
    let waiter = state.waiters.remove(&response.cycle);
    drop(state);

    sink.response_complete(&response);
    if let Some(tx) = waiter {
        let _ = tx.send(Ok(response));
    }
}

/// Give up on every open cycle after a read failure
fn abandon_cycles(cycles: &Mutex<Cycles>) {
    lock(cycles).close_open();
}

/// Drop lines collected before a timed-out await wrote the cycles off
fn discard_if_resynced(cycles: &Mutex<Cycles>, assembler: &mut ResponseAssembler) {
    if std::mem::take(&mut lock(cycles).discard_partial) {
        assembler.abandon();
    }
}
