// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! The connection event taxonomy and the tracer interfaces consuming it

use crate::{
    connection,
    crypto::EncryptionLevel,
    endpoint,
    frame::{self, Frame},
    packet::{ExtendedHeader, Header, KeyPhase, PacketNumber, PacketType, Version},
    recovery::RttStats,
    time::Timestamp,
    transport, ByteCount, StatelessResetToken,
};
use cfg_if::cfg_if;
use core::net::SocketAddr;

#[macro_use]
mod macros;

mod guard;
mod reason;

pub mod disabled;
pub mod tracing;

cfg_if! {
    if #[cfg(feature = "std")] {
        pub mod counters;
        pub mod file;
        pub mod validator;
    }
}

#[cfg(any(test, feature = "testing"))]
pub mod testing;

#[cfg(test)]
mod tests;

pub use guard::Guard;
pub use reason::{CloseReason, PacketDropReason, PacketLossReason, TimerType};

/// Groups events by the part of the connection they describe
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Family {
    /// Connection start and close, and encryption levels being dropped
    Lifecycle,
    /// Packets sent, received, buffered or dropped
    PacketIo,
    /// Loss detection and congestion control
    Recovery,
    /// TLS keys, key updates and transport parameters
    Key,
    /// Loss detection timers
    Timer,
}

events!(
    #[event("connectivity:connection_started")]
    #[family(Lifecycle)]
    /// The connection was started
    ///
    /// Always the first event delivered to a tracer.
    struct ConnectionStarted<'a> {
        pub local_address: SocketAddr,
        pub remote_address: SocketAddr,
        pub version: Version,
        pub source_connection_id: &'a connection::Id,
        pub destination_connection_id: &'a connection::Id,
    }

    #[event("connectivity:connection_closed")]
    #[family(Lifecycle)]
    /// The connection was closed
    ///
    /// Always the last event delivered to a tracer, followed only by `close`.
    struct ConnectionClosed {
        pub reason: CloseReason,
    }

    #[event("security:key_discarded")]
    #[family(Lifecycle)]
    /// The keys of an encryption level were dropped
    ///
    /// No packet or key event will reference the level afterwards.
    struct EncryptionLevelDropped {
        pub encryption_level: EncryptionLevel,
    }

    #[event("transport:packet_sent")]
    #[family(PacketIo)]
    /// A packet was sent
    struct PacketSent<'a> {
        pub header: &'a ExtendedHeader<'a>,
        pub packet_size: ByteCount,
        /// The ACK frame included in the packet, if any
        pub ack: Option<&'a frame::Ack<'a>>,
        /// The remaining frames in the packet
        pub frames: &'a [Frame<'a>],
    }

    #[event("transport:packet_received")]
    #[family(PacketIo)]
    /// A packet was received and successfully decrypted
    struct PacketReceived<'a> {
        pub header: &'a ExtendedHeader<'a>,
        pub packet_size: ByteCount,
        pub frames: &'a [Frame<'a>],
    }

    #[event("transport:version_negotiation_received")]
    #[family(PacketIo)]
    /// A Version Negotiation packet was received
    struct VersionNegotiationReceived<'a> {
        pub header: &'a Header<'a>,
        /// The versions offered by the server
        pub versions: &'a [Version],
    }

    #[event("transport:retry_received")]
    #[family(PacketIo)]
    /// A Retry packet was received
    struct RetryReceived<'a> {
        pub header: &'a Header<'a>,
    }

    #[event("transport:stateless_reset_received")]
    #[family(PacketIo)]
    /// A Stateless Reset was received
    struct StatelessResetReceived<'a> {
        pub token: &'a StatelessResetToken,
    }

    #[event("transport:packet_buffered")]
    #[family(PacketIo)]
    /// A packet was buffered because the keys to decrypt it are not available yet
    struct PacketBuffered {
        pub packet_type: PacketType,
    }

    #[event("transport:packet_dropped")]
    #[family(PacketIo)]
    /// A packet was dropped without being processed
    struct PacketDropped {
        pub packet_type: PacketType,
        pub packet_size: ByteCount,
        pub reason: PacketDropReason,
    }

    #[event("recovery:metrics_updated")]
    #[family(Recovery)]
    /// Recovery metrics were updated
    struct MetricsUpdated<'a> {
        pub rtt: &'a RttStats,
        pub congestion_window: ByteCount,
        pub bytes_in_flight: ByteCount,
        pub packets_in_flight: usize,
    }

    #[event("recovery:packet_lost")]
    #[family(Recovery)]
    /// A packet was declared lost
    ///
    /// Packet numbers increase within an encryption level, but are not
    /// comparable across levels.
    struct PacketLost {
        pub encryption_level: EncryptionLevel,
        pub packet_number: PacketNumber,
        pub reason: PacketLossReason,
    }

    #[event("recovery:pto_count_updated")]
    #[family(Recovery)]
    /// The probe timeout count changed
    struct PtoCountUpdated {
        pub value: u32,
    }

    #[event("security:key_updated_tls")]
    #[family(Key)]
    /// The TLS stack installed keys for an encryption level
    struct KeyUpdatedFromTls {
        pub encryption_level: EncryptionLevel,
        /// Which endpoint's keys were installed
        pub perspective: endpoint::Type,
    }

    #[event("security:key_updated")]
    #[family(Key)]
    /// The 1-RTT keys were rotated
    struct KeyUpdated {
        pub generation: KeyPhase,
        /// The endpoint which initiated the key update
        pub initiator: endpoint::Location,
    }

    #[event("transport:parameters_sent")]
    #[family(Key)]
    /// The local transport parameters were sent
    struct TransportParametersSent<'a> {
        pub parameters: &'a transport::Parameters,
    }

    #[event("transport:parameters_received")]
    #[family(Key)]
    /// The peer's transport parameters were received
    struct TransportParametersReceived<'a> {
        pub parameters: &'a transport::Parameters,
    }

    #[event("recovery:loss_timer_set")]
    #[family(Timer)]
    /// A loss detection timer was armed
    struct LossTimerSet {
        pub timer_type: TimerType,
        pub encryption_level: EncryptionLevel,
        pub deadline: Timestamp,
    }

    #[event("recovery:loss_timer_expired")]
    #[family(Timer)]
    /// An armed loss detection timer fired
    struct LossTimerExpired {
        pub timer_type: TimerType,
        pub encryption_level: EncryptionLevel,
    }

    #[event("recovery:loss_timer_canceled")]
    #[family(Timer)]
    /// An armed loss detection timer was canceled
    struct LossTimerCanceled {
        pub timer_type: TimerType,
        pub encryption_level: EncryptionLevel,
    }
);

impl Event<'_> {
    /// Returns the encryption level the event refers to, if any
    #[inline]
    pub fn encryption_level(&self) -> Option<EncryptionLevel> {
        match self {
            Self::PacketSent(event) => event.header.encryption_level(),
            Self::PacketReceived(event) => event.header.encryption_level(),
            Self::PacketBuffered(event) => event.packet_type.encryption_level(),
            Self::PacketDropped(event) => event.packet_type.encryption_level(),
            Self::PacketLost(event) => Some(event.encryption_level),
            Self::KeyUpdatedFromTls(event) => Some(event.encryption_level),
            Self::KeyUpdated(_) => Some(EncryptionLevel::OneRtt),
            Self::EncryptionLevelDropped(event) => Some(event.encryption_level),
            Self::LossTimerSet(event) => Some(event.encryption_level),
            Self::LossTimerExpired(event) => Some(event.encryption_level),
            Self::LossTimerCanceled(event) => Some(event.encryption_level),
            _ => None,
        }
    }

    /// Returns the encryption level whose keys must still be available for the
    /// event to be valid
    ///
    /// Buffered and dropped packets, as well as timer expiry and cancellation,
    /// can legitimately refer to a level that was already dropped and return
    /// `None`.
    #[inline]
    pub fn required_encryption_level(&self) -> Option<EncryptionLevel> {
        match self {
            Self::PacketSent(_)
            | Self::PacketReceived(_)
            | Self::PacketLost(_)
            | Self::KeyUpdatedFromTls(_)
            | Self::KeyUpdated(_)
            | Self::LossTimerSet(_) => self.encryption_level(),
            _ => None,
        }
    }
}

impl core::fmt::Display for Event<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

/// Produces a [`ConnectionTracer`] for each connection of an endpoint
///
/// The endpoint calls exactly one of the `tracer_for_*` methods for each new
/// connection, before any packet of that connection is processed. The returned
/// tracer must be ready to receive events immediately; tracer construction
/// cannot fail, so implementations that cannot set up their resources should
/// return a tracer that drops events instead.
///
/// ```
/// use s2n_quic_trace::{
///     connection,
///     event::{api, ConnectionTracer, EndpointTracer},
/// };
///
/// #[derive(Default)]
/// pub struct MyTracer;
///
/// pub struct MyConnectionTracer {
///     packets_sent: u64,
/// }
///
/// impl EndpointTracer for MyTracer {
///     type ConnectionTracer = MyConnectionTracer;
///
///     fn tracer_for_server(&mut self, _odcid: &connection::Id) -> MyConnectionTracer {
///         MyConnectionTracer { packets_sent: 0 }
///     }
///
///     fn tracer_for_client(&mut self, _odcid: &connection::Id) -> MyConnectionTracer {
///         MyConnectionTracer { packets_sent: 0 }
///     }
/// }
///
/// impl ConnectionTracer for MyConnectionTracer {
///     fn on_packet_sent(&mut self, _event: &api::PacketSent) {
///         self.packets_sent += 1;
///     }
/// }
/// ```
pub trait EndpointTracer: 'static + Send {
    type ConnectionTracer: ConnectionTracer;

    /// Creates a tracer for a connection accepted by a server
    fn tracer_for_server(
        &mut self,
        original_destination_connection_id: &connection::Id,
    ) -> Self::ConnectionTracer;

    /// Creates a tracer for a connection initiated by a client
    fn tracer_for_client(
        &mut self,
        original_destination_connection_id: &connection::Id,
    ) -> Self::ConnectionTracer;

    /// Creates a tracer for a connection on an endpoint of the given type
    #[inline]
    fn tracer_for(
        &mut self,
        endpoint_type: endpoint::Type,
        original_destination_connection_id: &connection::Id,
    ) -> Self::ConnectionTracer {
        match endpoint_type {
            endpoint::Type::Server => self.tracer_for_server(original_destination_connection_id),
            endpoint::Type::Client => self.tracer_for_client(original_destination_connection_id),
        }
    }
}

/// EndpointTracer is implemented for a 2-element tuple to make it easy to compose
/// multiple tracers.
impl<A, B> EndpointTracer for (A, B)
where
    A: EndpointTracer,
    B: EndpointTracer,
{
    type ConnectionTracer = (A::ConnectionTracer, B::ConnectionTracer);

    #[inline]
    fn tracer_for_server(&mut self, odcid: &connection::Id) -> Self::ConnectionTracer {
        (self.0.tracer_for_server(odcid), self.1.tracer_for_server(odcid))
    }

    #[inline]
    fn tracer_for_client(&mut self, odcid: &connection::Id) -> Self::ConnectionTracer {
        (self.0.tracer_for_client(odcid), self.1.tracer_for_client(odcid))
    }
}

/// An optional endpoint tracer; connections get a `None` tracer when disabled
impl<T: EndpointTracer> EndpointTracer for Option<T> {
    type ConnectionTracer = Option<T::ConnectionTracer>;

    #[inline]
    fn tracer_for_server(&mut self, odcid: &connection::Id) -> Self::ConnectionTracer {
        self.as_mut().map(|tracer| tracer.tracer_for_server(odcid))
    }

    #[inline]
    fn tracer_for_client(&mut self, odcid: &connection::Id) -> Self::ConnectionTracer {
        self.as_mut().map(|tracer| tracer.tracer_for_client(odcid))
    }
}

/// Provides an [`EndpointTracer`] for an endpoint
///
/// Providers carry the configuration of a tracer and are started once, when the
/// endpoint is built. This is the only place where setting up tracing can fail.
pub trait Provider {
    type Tracer: 'static + EndpointTracer;
    type Error: 'static + core::fmt::Display;

    fn start(self) -> Result<Self::Tracer, Self::Error>;
}

impl<T> Provider for T
where
    T: 'static + EndpointTracer,
{
    type Tracer = T;
    type Error = core::convert::Infallible;

    #[inline]
    fn start(self) -> Result<T, Self::Error> {
        Ok(self)
    }
}
