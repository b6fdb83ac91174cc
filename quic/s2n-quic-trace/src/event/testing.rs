// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Tracers recording events for assertions in tests

use super::Event;
use crate::{connection, endpoint};
use std::sync::{Arc, Mutex};

/// The events recorded for a single connection
#[derive(Clone, Debug, Default)]
pub struct Log {
    state: Arc<Mutex<State>>,
}

#[derive(Debug, Default)]
struct State {
    names: Vec<&'static str>,
    events: Vec<String>,
    close_calls: usize,
}

impl Log {
    fn with<R>(&self, f: impl FnOnce(&mut State) -> R) -> R {
        f(&mut self.state.lock().unwrap())
    }

    /// Returns the names of the recorded events, in order
    pub fn names(&self) -> Vec<&'static str> {
        self.with(|state| state.names.clone())
    }

    /// Returns the debug representation of each recorded event, in order
    pub fn events(&self) -> Vec<String> {
        self.with(|state| state.events.clone())
    }

    /// Returns the number of times the tracer was closed
    pub fn close_calls(&self) -> usize {
        self.with(|state| state.close_calls)
    }

    /// Returns the number of recorded events plus the number of close calls
    pub fn calls(&self) -> usize {
        self.with(|state| state.names.len() + state.close_calls)
    }
}

/// A connection tracer recording every event into a shared [`Log`]
#[derive(Debug, Default)]
pub struct Tracer {
    log: Log,
}

impl Tracer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a handle to the events recorded by this tracer
    pub fn log(&self) -> Log {
        self.log.clone()
    }
}

impl super::ConnectionTracer for Tracer {
    fn on_event(&mut self, event: Event<'_>) {
        self.log.with(|state| {
            state.names.push(event.name());
            state.events.push(format!("{event:?}"));
        });
    }

    fn close(&mut self) {
        self.log.with(|state| state.close_calls += 1);
    }
}

/// A connection recorded by an [`Endpoint`]
#[derive(Clone, Debug)]
pub struct Connection {
    pub endpoint_type: endpoint::Type,
    pub original_destination_connection_id: connection::Id,
    pub log: Log,
}

/// An endpoint tracer handing out a recording [`Tracer`] for each connection
#[derive(Clone, Debug, Default)]
pub struct Endpoint {
    connections: Arc<Mutex<Vec<Connection>>>,
}

impl Endpoint {
    /// Returns every connection created so far, in creation order
    pub fn connections(&self) -> Vec<Connection> {
        self.connections.lock().unwrap().clone()
    }

    fn create(&mut self, endpoint_type: endpoint::Type, odcid: &connection::Id) -> Tracer {
        let tracer = Tracer::new();
        self.connections.lock().unwrap().push(Connection {
            endpoint_type,
            original_destination_connection_id: *odcid,
            log: tracer.log(),
        });
        tracer
    }
}

impl super::EndpointTracer for Endpoint {
    type ConnectionTracer = Tracer;

    fn tracer_for_server(&mut self, odcid: &connection::Id) -> Self::ConnectionTracer {
        self.create(endpoint::Type::Server, odcid)
    }

    fn tracer_for_client(&mut self, odcid: &connection::Id) -> Self::ConnectionTracer {
        self.create(endpoint::Type::Client, odcid)
    }
}
