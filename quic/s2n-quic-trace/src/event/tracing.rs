// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Event integration with [`tracing`](https://docs.rs/tracing)
//!
//! Each endpoint role gets a span and each connection a child span keyed by
//! its original destination connection ID. Every event is emitted at `DEBUG`
//! level under the connection span.

use super::{api, Event};
use crate::{connection, endpoint};

#[derive(Clone, Debug)]
pub struct Tracer {
    client: tracing::Span,
    server: tracing::Span,
}

impl Default for Tracer {
    fn default() -> Self {
        let root = tracing::span!(
            target: "s2n_quic_trace",
            tracing::Level::DEBUG,
            "s2n_quic_trace"
        );
        let client = tracing::span!(parent: root.id(), tracing::Level::DEBUG, "client");
        let server = tracing::span!(parent: root.id(), tracing::Level::DEBUG, "server");
        Self { client, server }
    }
}

impl Tracer {
    fn connection_span(
        &self,
        endpoint_type: endpoint::Type,
        odcid: &connection::Id,
    ) -> tracing::Span {
        let parent = match endpoint_type {
            endpoint::Type::Client => self.client.id(),
            endpoint::Type::Server => self.server.id(),
        };
        tracing::span!(
            target: "s2n_quic_trace",
            parent: parent,
            tracing::Level::DEBUG,
            "conn",
            odcid = %odcid
        )
    }
}

impl super::EndpointTracer for Tracer {
    type ConnectionTracer = ConnectionTracer;

    #[inline]
    fn tracer_for_server(&mut self, odcid: &connection::Id) -> Self::ConnectionTracer {
        ConnectionTracer {
            span: self.connection_span(endpoint::Type::Server, odcid),
        }
    }

    #[inline]
    fn tracer_for_client(&mut self, odcid: &connection::Id) -> Self::ConnectionTracer {
        ConnectionTracer {
            span: self.connection_span(endpoint::Type::Client, odcid),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ConnectionTracer {
    span: tracing::Span,
}

impl super::ConnectionTracer for ConnectionTracer {
    #[inline]
    fn on_event(&mut self, event: Event<'_>) {
        let id = self.span.id();
        tracing::event!(
            target: "s2n_quic_trace",
            parent: id,
            tracing::Level::DEBUG,
            kind = event.name(),
            "{:?}",
            event
        );
    }

    #[inline]
    fn on_connection_closed(&mut self, event: &api::ConnectionClosed) {
        let id = self.span.id();
        let api::ConnectionClosed { reason } = event;
        tracing::event!(
            target: "s2n_quic_trace",
            parent: id,
            tracing::Level::DEBUG,
            kind = api::ConnectionClosed::NAME,
            reason = reason.as_str(),
            "{:?}",
            reason
        );
    }

    #[inline]
    fn on_packet_dropped(&mut self, event: &api::PacketDropped) {
        let id = self.span.id();
        let api::PacketDropped {
            packet_type,
            packet_size,
            reason,
        } = event;
        tracing::event!(
            target: "s2n_quic_trace",
            parent: id,
            tracing::Level::DEBUG,
            kind = api::PacketDropped::NAME,
            packet_type = packet_type.as_str(),
            packet_size,
            reason = reason.as_str()
        );
    }

    #[inline]
    fn on_packet_lost(&mut self, event: &api::PacketLost) {
        let id = self.span.id();
        let api::PacketLost {
            encryption_level,
            packet_number,
            reason,
        } = event;
        tracing::event!(
            target: "s2n_quic_trace",
            parent: id,
            tracing::Level::DEBUG,
            kind = api::PacketLost::NAME,
            encryption_level = encryption_level.as_str(),
            packet_number = packet_number.as_u64(),
            reason = reason.as_str()
        );
    }
}
