//! Producers of listing line streams
//!
//! A [`Listing`] is the raw line stream for one acquisition: a single set
//! when the tool is invoked per set, or every set at once when reading a
//! saved dump. A stream that ends abnormally yields a final
//! [`ReadError`]; the runner abandons whatever set was being read and
//! moves on to the next listing.

use std::collections::VecDeque;
use std::io::{self, BufRead, BufReader, Read};
use std::process::{Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ReadError {
    #[error("read failed: {0}")]
    Io(#[from] io::Error),

    #[error("listing not complete after {timeout:?}")]
    Timeout { timeout: Duration },

    #[error("'{command}' exited with {status}: {stderr}")]
    Tool {
        command: String,
        status: ExitStatus,
        stderr: String,
    },

    #[error("failed to run '{command}'")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

pub type LineResult = Result<String, ReadError>;

/// One raw line stream
pub struct Listing {
    /// Set name or input path, used in diagnostics
    pub label: String,
    pub lines: Box<dyn Iterator<Item = LineResult>>,
}

impl Listing {
    pub fn new(
        label: impl Into<String>,
        lines: impl Iterator<Item = LineResult> + 'static,
    ) -> Self {
        Self {
            label: label.into(),
            lines: Box::new(lines),
        }
    }
}

/// Lines of a byte stream. Bytes that are not valid UTF-8 (set comments
/// may hold anything) are replaced rather than failing the stream.
struct LossyLines<R> {
    reader: R,
    buf: Vec<u8>,
}

impl<R: BufRead> LossyLines<R> {
    fn new(reader: R) -> Self {
        Self {
            reader,
            buf: Vec::new(),
        }
    }
}

impl<R: BufRead> Iterator for LossyLines<R> {
    type Item = io::Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        self.buf.clear();
        match self.reader.read_until(b'\n', &mut self.buf) {
            Ok(0) => None,
            Ok(_) => {
                if self.buf.ends_with(b"\n") {
                    self.buf.pop();
                    if self.buf.ends_with(b"\r") {
                        self.buf.pop();
                    }
                }
                Some(Ok(String::from_utf8_lossy(&self.buf).into_owned()))
            }
            Err(e) => Some(Err(e)),
        }
    }
}

/// Something that hands out listings one at a time
pub trait ListingSource {
    fn next_listing(&mut self) -> Option<Listing>;
}

/// A saved listing read from a file or stdin
pub struct DumpSource {
    listing: Option<Listing>,
}

impl DumpSource {
    pub fn new(label: impl Into<String>, reader: impl Read + 'static) -> Self {
        let lines = LossyLines::new(BufReader::new(reader))
            .map(|line| line.map_err(ReadError::from));
        Self {
            listing: Some(Listing::new(label, lines)),
        }
    }
}

impl ListingSource for DumpSource {
    fn next_listing(&mut self) -> Option<Listing> {
        self.listing.take()
    }
}

/// Listings held in memory; each entry may end with a read failure
#[derive(Default)]
pub struct MemorySource {
    listings: VecDeque<(String, Vec<String>, Option<ReadError>)>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(mut self, label: &str, text: &str) -> Self {
        self.listings.push_back((label.to_string(), lines_of(text), None));
        self
    }

    /// Add a listing whose stream fails after `text`
    pub fn push_truncated(mut self, label: &str, text: &str, error: ReadError) -> Self {
        self.listings
            .push_back((label.to_string(), lines_of(text), Some(error)));
        self
    }
}

impl ListingSource for MemorySource {
    fn next_listing(&mut self) -> Option<Listing> {
        let (label, lines, error) = self.listings.pop_front()?;
        let lines = lines.into_iter().map(Ok).chain(error.map(Err));
        Some(Listing::new(label, lines))
    }
}

fn lines_of(text: &str) -> Vec<String> {
    text.lines().map(str::to_string).collect()
}

/// Invokes the set-management tool once per set
pub struct CommandSource {
    command: String,
    timeout: Duration,
    sets: VecDeque<String>,
}

impl CommandSource {
    /// List `sets`, or every set the tool knows about when `sets` is empty.
    ///
    /// Failing to enumerate sets is fatal: there is nothing to process.
    pub fn new(
        command: impl Into<String>,
        timeout: Duration,
        sets: Vec<String>,
    ) -> Result<Self, ReadError> {
        let command = command.into();
        let sets: VecDeque<String> = if sets.is_empty() {
            let (names, error) = run_with_deadline(&command, &["list", "-n"], timeout);
            if let Some(error) = error {
                return Err(error);
            }
            names
                .into_iter()
                .map(|name| name.trim().to_string())
                .filter(|name| !name.is_empty())
                .collect()
        } else {
            sets.into()
        };

        debug!(command = %command, sets = sets.len(), "listing sets");
        Ok(Self {
            command,
            timeout,
            sets,
        })
    }
}

impl ListingSource for CommandSource {
    fn next_listing(&mut self) -> Option<Listing> {
        let set = self.sets.pop_front()?;
        let (lines, error) = run_with_deadline(&self.command, &["list", &set], self.timeout);
        let lines = lines.into_iter().map(Ok).chain(error.map(Err));
        Some(Listing::new(set, lines))
    }
}

/// Run `command args`, collecting stdout lines until it exits or the
/// deadline passes. Returns the lines read and the failure, if any.
fn run_with_deadline(
    command: &str,
    args: &[&str],
    timeout: Duration,
) -> (Vec<String>, Option<ReadError>) {
    let mut child = match Command::new(command)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
    {
        Ok(child) => child,
        Err(source) => {
            return (
                Vec::new(),
                Some(ReadError::Spawn {
                    command: command.to_string(),
                    source,
                }),
            );
        }
    };

    let (tx, rx) = mpsc::channel();
    if let Some(stdout) = child.stdout.take() {
        thread::spawn(move || {
            for line in LossyLines::new(BufReader::new(stdout)) {
                if tx.send(line).is_err() {
                    break;
                }
            }
        });
    }
    let stderr_reader = child.stderr.take().map(|mut stderr| {
        thread::spawn(move || {
            let mut text = String::new();
            let _ = stderr.read_to_string(&mut text);
            text
        })
    });

    let deadline = Instant::now() + timeout;
    let mut lines = Vec::new();
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match rx.recv_timeout(remaining) {
            Ok(Ok(line)) => lines.push(line),
            Ok(Err(e)) => {
                let _ = child.kill();
                let _ = child.wait();
                return (lines, Some(ReadError::Io(e)));
            }
            Err(RecvTimeoutError::Timeout) => {
                let _ = child.kill();
                let _ = child.wait();
                return (lines, Some(ReadError::Timeout { timeout }));
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    let status = match child.wait() {
        Ok(status) => status,
        Err(e) => return (lines, Some(ReadError::Io(e))),
    };
    if !status.success() {
        let stderr = stderr_reader
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default();
        return (
            lines,
            Some(ReadError::Tool {
                command: format!("{} {}", command, args.join(" ")),
                status,
                stderr: stderr.trim().to_string(),
            }),
        );
    }

    (lines, None)
}
