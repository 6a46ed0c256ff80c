//! Transport session
//!
//! Owns the open byte stream and speaks newline-delimited text over it. The
//! session is split into a [`LineWriter`] and a [`LineReader`] so the reader
//! can live on its own thread while callers keep writing.

use std::borrow::Cow;
use std::io::{ErrorKind, Read, Write};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::{
    open_port, SerialChannel, SerialLink, TransportError, LINE_TERMINATOR, MAX_LINE_LENGTH,
};
use crate::config::ChannelConfig;
use crate::diagnostics::DiagnosticSink;

/// An open serial stream, spoken to one line at a time
pub struct TransportSession {
    writer: LineWriter,
    reader: LineReader,
}

impl TransportSession {
    /// Open the serial port described by `config`
    pub fn open(
        config: &ChannelConfig,
        sink: Arc<dyn DiagnosticSink>,
    ) -> Result<Self, TransportError> {
        let port = open_port(config)?;
        Self::from_link(
            Box::new(SerialChannel::new(port)),
            config.read_timeout(),
            sink,
        )
    }

    /// Build a session over an already-open link
    pub fn from_link(
        link: Box<dyn SerialLink>,
        read_timeout: Duration,
        sink: Arc<dyn DiagnosticSink>,
    ) -> Result<Self, TransportError> {
        let read_half = link.try_clone()?;
        Ok(Self {
            writer: LineWriter { link: Some(link) },
            reader: LineReader {
                link: read_half,
                pending: Vec::new(),
                applied_timeout: None,
                read_timeout,
                sink,
            },
        })
    }

    /// Write `text` followed by the line terminator
    pub fn write_line(&mut self, text: &str) -> Result<(), TransportError> {
        self.writer.write_line(text)
    }

    /// Read one line, waiting at most `timeout`
    pub fn read_line(&mut self, timeout: Duration) -> Result<Option<String>, TransportError> {
        self.reader.read_line(timeout)
    }

    /// Idle timeout used by the background reader
    pub fn read_timeout(&self) -> Duration {
        self.reader.read_timeout
    }

    /// Separate the write and read directions
    pub fn split(self) -> (LineWriter, LineReader) {
        (self.writer, self.reader)
    }
}

/// Write direction of a [`TransportSession`]
pub struct LineWriter {
    link: Option<Box<dyn SerialLink>>,
}

impl LineWriter {
    /// Write `text` plus `\n` as a single buffer
    pub fn write_line(&mut self, text: &str) -> Result<(), TransportError> {
        let link = self.link.as_mut().ok_or(TransportError::Closed)?;

        let mut bytes = Vec::with_capacity(text.len() + 1);
        bytes.extend_from_slice(text.as_bytes());
        bytes.push(LINE_TERMINATOR);

        link.write_all(&bytes)?;
        link.flush()?;
        Ok(())
    }

    /// Release the write handle; later writes fail with [`TransportError::Closed`]
    pub fn close(&mut self) {
        self.link = None;
    }

    pub fn is_closed(&self) -> bool {
        self.link.is_none()
    }
}

/// Read direction of a [`TransportSession`]
pub struct LineReader {
    link: Box<dyn SerialLink>,
    /// Bytes received after the last complete line
    pending: Vec<u8>,
    applied_timeout: Option<Duration>,
    read_timeout: Duration,
    sink: Arc<dyn DiagnosticSink>,
}

impl LineReader {
    /// Idle timeout configured for this session
    pub fn read_timeout(&self) -> Duration {
        self.read_timeout
    }

    /// Read one line, waiting at most `timeout`.
    ///
    /// Returns `Ok(None)` when the line did not complete in time; any partial
    /// bytes are kept for the next call. The returned text is trimmed and may
    /// be empty for a blank line. End of stream is reported as
    /// [`TransportError::Closed`].
    pub fn read_line(&mut self, timeout: Duration) -> Result<Option<String>, TransportError> {
        let deadline = Instant::now() + timeout;
        let mut chunk = [0u8; 256];

        loop {
            if let Some(pos) = self.pending.iter().position(|&b| b == LINE_TERMINATOR) {
                let raw: Vec<u8> = self.pending.drain(..=pos).collect();
                return Ok(Some(self.decode(&raw[..pos])));
            }

            // Runaway line with no terminator in sight
            if self.pending.len() >= MAX_LINE_LENGTH {
                let raw = std::mem::take(&mut self.pending);
                return Ok(Some(self.decode(&raw)));
            }

            // Each read may only block for what is left of `timeout`
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(None);
            }
            if self.applied_timeout != Some(remaining) {
                self.link.set_timeout(remaining)?;
                self.applied_timeout = Some(remaining);
            }

            match self.link.read(&mut chunk) {
                Ok(0) => return Err(TransportError::Closed),
                Ok(n) => self.pending.extend_from_slice(&chunk[..n]),
                Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => {
                    return Ok(None);
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn decode(&self, raw: &[u8]) -> String {
        let text = String::from_utf8_lossy(raw);
        if let Cow::Owned(ref replaced) = text {
            self.sink.decode_warning(replaced.trim());
        }
        text.trim().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::testing::RecordingSink;
    use std::collections::VecDeque;
    use std::io;
    use std::sync::Mutex;

    /// Scripted link: each queued chunk is returned by one read, then reads time out
    #[derive(Clone, Default)]
    struct ScriptedLink {
        incoming: Arc<Mutex<VecDeque<io::Result<Vec<u8>>>>>,
        written: Arc<Mutex<Vec<u8>>>,
        /// Every timeout the reader applied, in order
        timeouts: Arc<Mutex<Vec<Duration>>>,
        /// Delay before each data chunk is handed out
        latency: Duration,
        eof: bool,
    }

    impl ScriptedLink {
        fn push(&self, chunk: &[u8]) {
            self.incoming.lock().unwrap().push_back(Ok(chunk.to_vec()));
        }
    }

    impl Read for ScriptedLink {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.incoming.lock().unwrap().pop_front() {
                Some(Ok(chunk)) => {
                    std::thread::sleep(self.latency);
                    buf[..chunk.len()].copy_from_slice(&chunk);
                    Ok(chunk.len())
                }
                Some(Err(e)) => Err(e),
                None if self.eof => Ok(0),
                None => Err(io::Error::from(ErrorKind::TimedOut)),
            }
        }
    }

    impl Write for ScriptedLink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.written.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl SerialLink for ScriptedLink {
        fn set_timeout(&mut self, timeout: Duration) -> io::Result<()> {
            self.timeouts.lock().unwrap().push(timeout);
            Ok(())
        }

        fn try_clone(&self) -> io::Result<Box<dyn SerialLink>> {
            Ok(Box::new(self.clone()))
        }
    }

    fn session(link: &ScriptedLink) -> (TransportSession, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::default());
        let session =
            TransportSession::from_link(Box::new(link.clone()), Duration::from_millis(10), sink.clone())
                .unwrap();
        (session, sink)
    }

    const TICK: Duration = Duration::from_millis(10);

    #[test]
    fn test_write_line_appends_terminator() {
        let link = ScriptedLink::default();
        let (mut session, _) = session(&link);
        session.write_line("GET_PRESSURE").unwrap();
        assert_eq!(*link.written.lock().unwrap(), b"GET_PRESSURE\n".to_vec());
    }

    #[test]
    fn test_read_line_trims() {
        let link = ScriptedLink::default();
        link.push(b"  P=101 \r\n");
        let (mut session, _) = session(&link);
        assert_eq!(session.read_line(TICK).unwrap().as_deref(), Some("P=101"));
    }

    #[test]
    fn test_read_line_idle_timeout() {
        let link = ScriptedLink::default();
        let (mut session, _) = session(&link);
        assert_eq!(session.read_line(TICK).unwrap(), None);
    }

    #[test]
    fn test_partial_line_survives_timeout() {
        let link = ScriptedLink::default();
        link.push(b"T=2");
        let (mut session, _) = session(&link);
        assert_eq!(session.read_line(TICK).unwrap(), None);

        link.push(b"2\nOK\n");
        assert_eq!(session.read_line(TICK).unwrap().as_deref(), Some("T=22"));
        assert_eq!(session.read_line(TICK).unwrap().as_deref(), Some("OK"));
    }

    #[test]
    fn test_slow_partial_line_keeps_deadline() {
        let link = ScriptedLink {
            latency: Duration::from_millis(60),
            ..ScriptedLink::default()
        };
        link.push(b"T=2");
        let (mut session, _) = session(&link);

        assert_eq!(session.read_line(Duration::from_millis(100)).unwrap(), None);

        // The read after the slow chunk only gets what is left of the 100ms
        let timeouts = link.timeouts.lock().unwrap().clone();
        assert_eq!(timeouts.len(), 2);
        assert!(timeouts[0] <= Duration::from_millis(100));
        assert!(timeouts[1] <= Duration::from_millis(40));
    }

    #[test]
    fn test_several_lines_in_one_chunk() {
        let link = ScriptedLink::default();
        link.push(b"a\n\nb\n");
        let (mut session, _) = session(&link);
        assert_eq!(session.read_line(TICK).unwrap().as_deref(), Some("a"));
        assert_eq!(session.read_line(TICK).unwrap().as_deref(), Some(""));
        assert_eq!(session.read_line(TICK).unwrap().as_deref(), Some("b"));
    }

    #[test]
    fn test_invalid_utf8_is_replaced() {
        let link = ScriptedLink::default();
        link.push(b"P=\xff01\n");
        let (mut session, sink) = session(&link);
        let line = session.read_line(TICK).unwrap().unwrap();
        assert_eq!(line, "P=\u{FFFD}01");
        assert_eq!(sink.decode_warnings(), vec!["P=\u{FFFD}01".to_string()]);
    }

    #[test]
    fn test_end_of_stream_is_closed() {
        let link = ScriptedLink {
            eof: true,
            ..ScriptedLink::default()
        };
        let (mut session, _) = session(&link);
        let err = session.read_line(TICK).unwrap_err();
        assert!(matches!(err, TransportError::Closed));
    }

    #[test]
    fn test_read_error_propagates() {
        let link = ScriptedLink::default();
        link.incoming
            .lock()
            .unwrap()
            .push_back(Err(io::Error::from(ErrorKind::InvalidData)));
        let (mut session, _) = session(&link);
        let err = session.read_line(TICK).unwrap_err();
        assert!(!err.is_disconnect());
    }

    #[test]
    fn test_closed_writer_rejects_writes() {
        let link = ScriptedLink::default();
        let (session, _) = session(&link);
        let (mut writer, _reader) = session.split();
        writer.close();
        assert!(writer.is_closed());
        assert!(matches!(writer.write_line("OPEN"), Err(TransportError::Closed)));
        assert!(link.written.lock().unwrap().is_empty());
    }
}
