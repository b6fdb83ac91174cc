// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Endpoint-wide event counters
//!
//! Every connection tracer handed out by [`Tracer`] updates the same set of
//! atomic counters, which can be read at any time with [`Counters::snapshot`].

use super::{api, Event};
use crate::connection;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

/// An endpoint tracer aggregating events of all connections into shared counters
///
/// # Examples
///
/// ```
/// use s2n_quic_trace::event::{counters, ConnectionTracer, EndpointTracer};
/// # use s2n_quic_trace::connection;
///
/// let mut tracer = counters::Tracer::default();
/// let counters = tracer.counters();
///
/// let mut conn = tracer.tracer_for_server(&connection::Id::from([1u8; 8]));
/// conn.close();
///
/// assert_eq!(counters.snapshot().connections_created, 1);
/// ```
#[derive(Clone, Debug, Default)]
pub struct Tracer {
    counters: Arc<Counters>,
}

impl Tracer {
    /// Returns a handle to the counters updated by this tracer
    pub fn counters(&self) -> Arc<Counters> {
        self.counters.clone()
    }
}

impl super::EndpointTracer for Tracer {
    type ConnectionTracer = ConnectionTracer;

    #[inline]
    fn tracer_for_server(&mut self, _odcid: &connection::Id) -> Self::ConnectionTracer {
        self.counters.connections_created.fetch_add(1, Ordering::Relaxed);
        ConnectionTracer {
            counters: self.counters.clone(),
        }
    }

    #[inline]
    fn tracer_for_client(&mut self, _odcid: &connection::Id) -> Self::ConnectionTracer {
        self.counters.connections_created.fetch_add(1, Ordering::Relaxed);
        ConnectionTracer {
            counters: self.counters.clone(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ConnectionTracer {
    counters: Arc<Counters>,
}

impl super::ConnectionTracer for ConnectionTracer {
    #[inline]
    fn on_event(&mut self, event: Event<'_>) {
        let counters = &self.counters;
        match event {
            Event::ConnectionStarted(_) => counters.connections_started.inc(),
            Event::ConnectionClosed(_) => counters.connections_closed.inc(),
            Event::PacketSent(api::PacketSent { packet_size, .. }) => {
                counters.packets_sent.inc();
                counters.bytes_sent.add(*packet_size);
            }
            Event::PacketReceived(api::PacketReceived { packet_size, .. }) => {
                counters.packets_received.inc();
                counters.bytes_received.add(*packet_size);
            }
            Event::PacketBuffered(_) => counters.packets_buffered.inc(),
            Event::PacketDropped(_) => counters.packets_dropped.inc(),
            Event::PacketLost(_) => counters.packets_lost.inc(),
            Event::PtoCountUpdated(api::PtoCountUpdated { value }) => {
                counters.max_pto_count.fetch_max(*value as u64, Ordering::Relaxed);
            }
            Event::MetricsUpdated(api::MetricsUpdated {
                congestion_window,
                bytes_in_flight,
                ..
            }) => {
                counters.max_congestion_window.fetch_max(*congestion_window, Ordering::Relaxed);
                counters.max_bytes_in_flight.fetch_max(*bytes_in_flight, Ordering::Relaxed);
            }
            Event::KeyUpdated(_) => counters.key_updates.inc(),
            Event::LossTimerExpired(_) => counters.loss_timers_expired.inc(),
            _ => {}
        }
    }

    #[inline]
    fn close(&mut self) {
        self.counters.connections_finished.inc();
    }
}

trait CounterExt {
    fn inc(&self);
    fn add(&self, value: u64);
}

impl CounterExt for AtomicU64 {
    #[inline]
    fn inc(&self) {
        self.add(1);
    }

    #[inline]
    fn add(&self, value: u64) {
        self.fetch_add(value, Ordering::Relaxed);
    }
}

#[derive(Debug, Default)]
pub struct Counters {
    connections_created: AtomicU64,
    connections_started: AtomicU64,
    connections_closed: AtomicU64,
    connections_finished: AtomicU64,
    packets_sent: AtomicU64,
    bytes_sent: AtomicU64,
    packets_received: AtomicU64,
    bytes_received: AtomicU64,
    packets_buffered: AtomicU64,
    packets_dropped: AtomicU64,
    packets_lost: AtomicU64,
    max_pto_count: AtomicU64,
    max_congestion_window: AtomicU64,
    max_bytes_in_flight: AtomicU64,
    key_updates: AtomicU64,
    loss_timers_expired: AtomicU64,
}

/// A point-in-time copy of [`Counters`]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[non_exhaustive]
pub struct Snapshot {
    /// Connection tracers handed out by the endpoint tracer
    pub connections_created: u64,
    pub connections_started: u64,
    pub connections_closed: u64,
    /// Connection tracers which were closed
    pub connections_finished: u64,
    pub packets_sent: u64,
    pub bytes_sent: u64,
    pub packets_received: u64,
    pub bytes_received: u64,
    pub packets_buffered: u64,
    pub packets_dropped: u64,
    pub packets_lost: u64,
    pub max_pto_count: u64,
    pub max_congestion_window: u64,
    pub max_bytes_in_flight: u64,
    pub key_updates: u64,
    pub loss_timers_expired: u64,
}

impl Counters {
    pub fn snapshot(&self) -> Snapshot {
        macro_rules! load {
            ($($field:ident),* $(,)?) => {
                Snapshot {
                    $(
                        $field: self.$field.load(Ordering::Relaxed),
                    )*
                }
            };
        }

        load!(
            connections_created,
            connections_started,
            connections_closed,
            connections_finished,
            packets_sent,
            bytes_sent,
            packets_received,
            bytes_received,
            packets_buffered,
            packets_dropped,
            packets_lost,
            max_pto_count,
            max_congestion_window,
            max_bytes_in_flight,
            key_updates,
            loss_timers_expired,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        event::{CloseReason, ConnectionTracer as _, EndpointTracer as _, PacketDropReason},
        packet::PacketType,
    };

    #[test]
    fn aggregates_connections() {
        let mut tracer = Tracer::default();
        let counters = tracer.counters();
        let odcid = connection::Id::from([7u8; 8]);

        for _ in 0..2 {
            let mut conn = tracer.tracer_for_client(&odcid);
            conn.on_packet_dropped(&api::PacketDropped {
                packet_type: PacketType::Initial,
                packet_size: 1200,
                reason: PacketDropReason::Duplicate,
            });
            conn.on_pto_count_updated(&api::PtoCountUpdated { value: 2 });
            conn.on_connection_closed(&api::ConnectionClosed {
                reason: CloseReason::IdleTimeout,
            });
            conn.close();
        }

        let snapshot = counters.snapshot();
        assert_eq!(snapshot.connections_created, 2);
        assert_eq!(snapshot.connections_closed, 2);
        assert_eq!(snapshot.connections_finished, 2);
        assert_eq!(snapshot.packets_dropped, 2);
        assert_eq!(snapshot.max_pto_count, 2);
        assert_eq!(snapshot.packets_sent, 0);
    }
}
