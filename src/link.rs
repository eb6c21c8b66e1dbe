// Meterwatch - Smart-meter ingestion core
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Sensor link abstraction
//!
//! A link delivers the raw text lines a metering board prints (one ADC value
//! per line). Reading is decoupled from polling: a background thread pulls
//! lines off the underlying stream into a queue, and [`SensorLink::drain`]
//! empties that queue without ever blocking the caller.

use crate::error::LinkError;
use std::fs::File;
use std::io::{BufRead, BufReader, ErrorKind, Read};
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Prefix selecting a TCP link instead of a device path.
pub const TCP_PREFIX: &str = "tcp://";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Trait for sensor links
pub trait SensorLink: Send {
    /// Take every line currently pending, oldest first, without blocking.
    ///
    /// An empty vector means nothing arrived since the last drain.
    fn drain(&mut self) -> Result<Vec<String>, LinkError>;

    /// Check if the link is still open
    fn is_open(&self) -> bool;

    /// Close the link
    fn close(&mut self);

    /// Identifier the link was opened with
    fn identifier(&self) -> &str;
}

/// Line-oriented link fed by a background reader or an in-memory sender.
#[derive(Debug)]
pub struct LineLink {
    identifier: String,
    rx: Receiver<String>,
    is_open: bool,
    baud: Option<u32>,
}

impl LineLink {
    /// Create an in-memory link; lines sent on the returned sender show up
    /// on the next drain.
    pub fn channel() -> (Sender<String>, LineLink) {
        let (tx, rx) = mpsc::channel();
        let link = LineLink {
            identifier: "memory".to_string(),
            rx,
            is_open: true,
            baud: None,
        };
        (tx, link)
    }

    /// Wrap any byte stream; a reader thread splits it into lines.
    pub fn from_reader<R>(identifier: &str, reader: R) -> Result<Self, LinkError>
    where
        R: Read + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        let name = identifier.to_string();

        thread::Builder::new()
            .name(format!("meterwatch-link-{}", name))
            .spawn(move || pump_lines(&name, reader, tx))
            .map_err(|e| LinkError::Open {
                identifier: identifier.to_string(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            identifier: identifier.to_string(),
            rx,
            is_open: true,
            baud: None,
        })
    }

    /// Open a link by identifier: `tcp://host:port` or a device/file path.
    ///
    /// Device paths are opened read-only; a serial tty is expected to be
    /// configured for `baud` already (e.g. by udev or `stty`).
    pub fn open(identifier: &str, baud: u32) -> Result<Self, LinkError> {
        let open_err = |reason: String| LinkError::Open {
            identifier: identifier.to_string(),
            reason,
        };

        let mut link = if let Some(addr) = identifier.strip_prefix(TCP_PREFIX) {
            let socket_addr = addr
                .to_socket_addrs()
                .map_err(|e| open_err(e.to_string()))?
                .next()
                .ok_or_else(|| open_err("address did not resolve".to_string()))?;
            let stream = TcpStream::connect_timeout(&socket_addr, CONNECT_TIMEOUT)
                .map_err(|e| open_err(e.to_string()))?;
            Self::from_reader(identifier, stream)?
        } else {
            let file = File::open(identifier).map_err(|e| open_err(e.to_string()))?;
            Self::from_reader(identifier, file)?
        };

        link.baud = Some(baud);
        info!("Sensor link open on {} ({} baud)", identifier, baud);
        Ok(link)
    }

    /// Configured line speed, if the link was opened by identifier.
    pub fn baud(&self) -> Option<u32> {
        self.baud
    }
}

impl SensorLink for LineLink {
    fn drain(&mut self) -> Result<Vec<String>, LinkError> {
        if !self.is_open {
            return Err(LinkError::Disconnected {
                reason: "Link is closed".to_string(),
            });
        }

        let mut lines = Vec::new();
        loop {
            match self.rx.try_recv() {
                Ok(line) => lines.push(line),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    if lines.is_empty() {
                        return Err(LinkError::Disconnected {
                            reason: format!("{} stopped producing data", self.identifier),
                        });
                    }
                    break;
                }
            }
        }
        Ok(lines)
    }

    fn is_open(&self) -> bool {
        self.is_open
    }

    fn close(&mut self) {
        self.is_open = false;
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }
}

/// Reader-thread body: forward lines until EOF, a hard error, or the link
/// being dropped.
fn pump_lines<R: Read>(name: &str, reader: R, tx: Sender<String>) {
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => {
                debug!("Link {} reached end of stream", name);
                break;
            }
            Ok(_) => {
                // Boards emit garbage on reset; keep it, the parser discards it.
                let line = String::from_utf8_lossy(&buf).trim().to_string();
                if tx.send(line).is_err() {
                    break;
                }
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                warn!("Link {} read error: {}", name, e);
                break;
            }
        }
    }
}
