// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Writes the events of each connection to its own log file
//!
//! Files are named `<original destination connection ID>-<client|server>.log`
//! and contain one line per event: the time elapsed since the tracer was
//! created, the event name and the event payload.
//!
//! Writes are buffered and flushed on [`close`](super::ConnectionTracer::close). I/O errors
//! never reach the connection: the failing tracer stops writing, and the error
//! is counted in [`Tracer::errors`] and logged with `tracing`.

use super::Event;
use crate::{connection, endpoint};
use std::{
    fs::File,
    io::{self, BufWriter, Write},
    path::PathBuf,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Instant,
};

const DEFAULT_BUFFER_CAPACITY: usize = 64 * 1024;

/// Configures a file tracer
#[derive(Clone, Debug)]
pub struct Provider {
    directory: PathBuf,
    buffer_capacity: usize,
    flush_on_close: bool,
}

impl Provider {
    pub fn builder() -> Builder {
        Builder::default()
    }
}

#[derive(Clone, Debug, Default)]
pub struct Builder {
    directory: Option<PathBuf>,
    buffer_capacity: Option<usize>,
    flush_on_close: Option<bool>,
}

impl Builder {
    /// Sets the directory in which connection logs are written
    ///
    /// Defaults to the current directory. The directory is created when the
    /// provider is started.
    pub fn with_directory<P: Into<PathBuf>>(mut self, directory: P) -> Self {
        self.directory = Some(directory.into());
        self
    }

    /// Sets the size of the per-connection write buffer
    pub fn with_buffer_capacity(mut self, capacity: usize) -> Self {
        self.buffer_capacity = Some(capacity);
        self
    }

    /// Sets whether buffered records are flushed when the tracer is closed
    ///
    /// Defaults to `true`. When disabled, buffered records are still written when
    /// the writer is dropped, but flush errors are not counted.
    pub fn with_flush_on_close(mut self, enabled: bool) -> Self {
        self.flush_on_close = Some(enabled);
        self
    }

    pub fn build(self) -> Provider {
        Provider {
            directory: self.directory.unwrap_or_else(|| PathBuf::from(".")),
            buffer_capacity: self.buffer_capacity.unwrap_or(DEFAULT_BUFFER_CAPACITY),
            flush_on_close: self.flush_on_close.unwrap_or(true),
        }
    }
}

impl super::Provider for Provider {
    type Tracer = Tracer;
    type Error = io::Error;

    fn start(self) -> Result<Self::Tracer, Self::Error> {
        std::fs::create_dir_all(&self.directory)?;
        Ok(Tracer {
            config: Arc::new(self),
            errors: Default::default(),
        })
    }
}

/// An endpoint tracer writing one log file per connection
#[derive(Clone, Debug)]
pub struct Tracer {
    config: Arc<Provider>,
    errors: Arc<AtomicU64>,
}

impl Tracer {
    /// Returns the number of I/O errors encountered by this tracer's connections
    pub fn errors(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }

    /// Returns the path of the log file for the given connection
    pub fn path(&self, endpoint_type: endpoint::Type, odcid: &connection::Id) -> PathBuf {
        self.config
            .directory
            .join(format!("{odcid}-{endpoint_type}.log"))
    }

    fn open(&self, endpoint_type: endpoint::Type, odcid: &connection::Id) -> ConnectionTracer {
        let path = self.path(endpoint_type, odcid);
        let writer = match File::create(&path) {
            Ok(file) => Some(BufWriter::with_capacity(self.config.buffer_capacity, file)),
            Err(error) => {
                self.errors.fetch_add(1, Ordering::Relaxed);
                ::tracing::warn!(path = %path.display(), %error, "could not create connection log");
                None
            }
        };

        ConnectionTracer {
            writer,
            start: Instant::now(),
            flush_on_close: self.config.flush_on_close,
            errors: self.errors.clone(),
        }
    }
}

impl super::EndpointTracer for Tracer {
    type ConnectionTracer = ConnectionTracer;

    #[inline]
    fn tracer_for_server(&mut self, odcid: &connection::Id) -> Self::ConnectionTracer {
        self.open(endpoint::Type::Server, odcid)
    }

    #[inline]
    fn tracer_for_client(&mut self, odcid: &connection::Id) -> Self::ConnectionTracer {
        self.open(endpoint::Type::Client, odcid)
    }
}

#[derive(Debug)]
pub struct ConnectionTracer {
    /// `None` once the file could not be created or a write failed
    writer: Option<BufWriter<File>>,
    start: Instant,
    flush_on_close: bool,
    errors: Arc<AtomicU64>,
}

impl ConnectionTracer {
    fn on_error(&mut self, error: io::Error) {
        // stop writing after the first error
        self.writer = None;
        self.errors.fetch_add(1, Ordering::Relaxed);
        ::tracing::warn!(%error, "dropping connection log");
    }
}

impl super::ConnectionTracer for ConnectionTracer {
    #[inline]
    fn on_event(&mut self, event: Event<'_>) {
        let Some(writer) = self.writer.as_mut() else {
            return;
        };

        let elapsed = self.start.elapsed();
        if let Err(error) = writeln!(writer, "{elapsed:?} {} {event:?}", event.name()) {
            self.on_error(error);
        }
    }

    fn close(&mut self) {
        let Some(mut writer) = self.writer.take() else {
            return;
        };

        if self.flush_on_close {
            if let Err(error) = writer.flush() {
                self.on_error(error);
            }
        }
    }
}
