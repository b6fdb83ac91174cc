// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Checks that connections deliver events in the order tracers rely on
//!
//! The validator wraps another tracer, forwards every event to it unchanged and
//! records a [`Violation`] into a shared [`Report`] whenever the event stream
//! breaks one of the ordering rules:
//!
//! * `connection_started` is the first event and is delivered once
//! * `connection_closed` is the last event and is delivered once, before `close`
//! * no packet or key event references an encryption level after it was dropped
//! * lost packet numbers increase within each encryption level
//! * a loss timer is only expired or canceled while armed, and is not armed twice
//! * every armed loss timer expires or is canceled before the connection closes
//!
//! Violations are never surfaced to the connection.

use super::{api, Event, TimerType};
use crate::{connection, crypto::EncryptionLevel, endpoint, packet::PacketNumber};
use std::{
    collections::{BTreeMap, BTreeSet},
    sync::{Arc, Mutex},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, displaydoc::Display)]
#[cfg_attr(feature = "thiserror", derive(thiserror::Error))]
#[non_exhaustive]
pub enum Violation {
    /// {event} was delivered before the connection started
    NotStarted { event: &'static str },
    /// the connection was started more than once
    AlreadyStarted,
    /// {event} was delivered after the connection was closed
    AfterConnectionClosed { event: &'static str },
    /// {event} was delivered after the tracer was closed
    AfterClose { event: &'static str },
    /// the tracer was closed more than once
    AlreadyClosed,
    /// the tracer was closed without a preceding connection_closed event
    MissingConnectionClosed,
    /// {event} references the {level} encryption level after it was dropped
    LevelAlreadyDropped {
        event: &'static str,
        level: EncryptionLevel,
    },
    /// packet {packet_number} was declared lost at the {level} level after packet {previous}
    LossNotMonotonic {
        level: EncryptionLevel,
        packet_number: PacketNumber,
        previous: PacketNumber,
    },
    /// the {timer_type} timer for {level} was armed while already armed
    TimerAlreadyArmed {
        timer_type: TimerType,
        level: EncryptionLevel,
    },
    /// {event} for the {timer_type} timer of {level} without the timer being armed
    TimerNotArmed {
        event: &'static str,
        timer_type: TimerType,
        level: EncryptionLevel,
    },
    /// the {timer_type} timer for {level} was still armed when the connection closed
    TimerNotResolved {
        timer_type: TimerType,
        level: EncryptionLevel,
    },
}

/// A violation along with the connection it was observed on
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Entry {
    pub endpoint_type: endpoint::Type,
    pub original_destination_connection_id: connection::Id,
    pub violation: Violation,
}

/// Collects the violations observed by validating tracers
///
/// Cloning the report returns a handle to the same collection.
#[derive(Clone, Debug, Default)]
pub struct Report(Arc<Mutex<Vec<Entry>>>);

impl Report {
    fn with<R>(&self, f: impl FnOnce(&mut Vec<Entry>) -> R) -> R {
        let mut entries = self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut entries)
    }

    fn push(&self, entry: Entry) {
        ::tracing::debug!(
            odcid = %entry.original_destination_connection_id,
            endpoint_type = %entry.endpoint_type,
            violation = %entry.violation,
            "tracer ordering violation"
        );
        self.with(|entries| entries.push(entry));
    }

    /// Returns all of the recorded entries, in the order they were observed
    pub fn entries(&self) -> Vec<Entry> {
        self.with(|entries| entries.clone())
    }

    /// Returns all of the recorded violations, in the order they were observed
    pub fn violations(&self) -> Vec<Violation> {
        self.with(|entries| entries.iter().map(|entry| entry.violation).collect())
    }

    pub fn is_empty(&self) -> bool {
        self.with(|entries| entries.is_empty())
    }
}

/// Configures how strictly timer events are checked
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TimerRearm {
    /// Arming an already armed timer is a violation
    #[default]
    Deny,
    /// Arming an already armed timer implicitly supersedes the previous deadline
    Allow,
}

/// An endpoint tracer validating the event streams of every connection
#[derive(Clone, Debug, Default)]
pub struct Tracer<E> {
    inner: E,
    timer_rearm: TimerRearm,
    report: Report,
}

impl<E: super::EndpointTracer> Tracer<E> {
    pub fn new(inner: E) -> Self {
        Self {
            inner,
            timer_rearm: TimerRearm::default(),
            report: Report::default(),
        }
    }

    #[must_use]
    pub fn with_timer_rearm(mut self, timer_rearm: TimerRearm) -> Self {
        self.timer_rearm = timer_rearm;
        self
    }

    /// Returns a handle to the violations observed across all connections
    pub fn report(&self) -> Report {
        self.report.clone()
    }

    fn wrap(
        &self,
        inner: E::ConnectionTracer,
        endpoint_type: endpoint::Type,
        odcid: &connection::Id,
    ) -> ConnectionTracer<E::ConnectionTracer> {
        ConnectionTracer {
            inner,
            state: State::Unstarted,
            endpoint_type,
            odcid: *odcid,
            dropped_levels: BTreeSet::new(),
            largest_lost: BTreeMap::new(),
            armed_timers: BTreeSet::new(),
            timer_rearm: self.timer_rearm,
            report: self.report.clone(),
        }
    }
}

impl<E: super::EndpointTracer> super::EndpointTracer for Tracer<E> {
    type ConnectionTracer = ConnectionTracer<E::ConnectionTracer>;

    #[inline]
    fn tracer_for_server(&mut self, odcid: &connection::Id) -> Self::ConnectionTracer {
        let inner = self.inner.tracer_for_server(odcid);
        self.wrap(inner, endpoint::Type::Server, odcid)
    }

    #[inline]
    fn tracer_for_client(&mut self, odcid: &connection::Id) -> Self::ConnectionTracer {
        let inner = self.inner.tracer_for_client(odcid);
        self.wrap(inner, endpoint::Type::Client, odcid)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    Unstarted,
    Active,
    /// `connection_closed` was delivered
    Closed,
    /// `close` was called
    Finished,
}

#[derive(Debug)]
pub struct ConnectionTracer<T> {
    inner: T,
    state: State,
    endpoint_type: endpoint::Type,
    odcid: connection::Id,
    dropped_levels: BTreeSet<EncryptionLevel>,
    largest_lost: BTreeMap<EncryptionLevel, PacketNumber>,
    armed_timers: BTreeSet<(TimerType, EncryptionLevel)>,
    timer_rearm: TimerRearm,
    report: Report,
}

impl<T> ConnectionTracer<T> {
    /// Returns the wrapped tracer
    pub fn inner(&self) -> &T {
        &self.inner
    }

    fn violation(&self, violation: Violation) {
        self.report.push(Entry {
            endpoint_type: self.endpoint_type,
            original_destination_connection_id: self.odcid,
            violation,
        });
    }

    fn check_state(&mut self, event: &Event<'_>) {
        let name = event.name();
        match (self.state, event) {
            (State::Unstarted, Event::ConnectionStarted(_)) => self.state = State::Active,
            (State::Unstarted, _) => self.violation(Violation::NotStarted { event: name }),
            (State::Active, Event::ConnectionStarted(_)) => {
                self.violation(Violation::AlreadyStarted)
            }
            (State::Active, Event::ConnectionClosed(_)) => self.state = State::Closed,
            (State::Active, _) => {}
            (State::Closed, _) => {
                self.violation(Violation::AfterConnectionClosed { event: name })
            }
            (State::Finished, _) => self.violation(Violation::AfterClose { event: name }),
        }
    }

    fn check_levels(&mut self, event: &Event<'_>) {
        if let Some(level) = event.required_encryption_level() {
            if self.dropped_levels.contains(&level) {
                self.violation(Violation::LevelAlreadyDropped {
                    event: event.name(),
                    level,
                });
            }
        }

        match event {
            Event::EncryptionLevelDropped(api::EncryptionLevelDropped { encryption_level }) => {
                if !self.dropped_levels.insert(*encryption_level) {
                    self.violation(Violation::LevelAlreadyDropped {
                        event: event.name(),
                        level: *encryption_level,
                    });
                }
            }
            Event::PacketLost(api::PacketLost {
                encryption_level,
                packet_number,
                ..
            }) => {
                let previous = self.largest_lost.insert(*encryption_level, *packet_number);
                if let Some(previous) = previous.filter(|previous| previous >= packet_number) {
                    // keep the largest packet number seen so far
                    self.largest_lost.insert(*encryption_level, previous);
                    self.violation(Violation::LossNotMonotonic {
                        level: *encryption_level,
                        packet_number: *packet_number,
                        previous,
                    });
                }
            }
            _ => {}
        }
    }

    fn check_timers(&mut self, event: &Event<'_>) {
        match event {
            Event::LossTimerSet(api::LossTimerSet {
                timer_type,
                encryption_level,
                ..
            }) => {
                let key = (*timer_type, *encryption_level);
                if !self.armed_timers.insert(key) && self.timer_rearm == TimerRearm::Deny {
                    self.violation(Violation::TimerAlreadyArmed {
                        timer_type: *timer_type,
                        level: *encryption_level,
                    });
                }
            }
            Event::LossTimerExpired(api::LossTimerExpired {
                timer_type,
                encryption_level,
            })
            | Event::LossTimerCanceled(api::LossTimerCanceled {
                timer_type,
                encryption_level,
            }) => {
                if !self.armed_timers.remove(&(*timer_type, *encryption_level)) {
                    self.violation(Violation::TimerNotArmed {
                        event: event.name(),
                        timer_type: *timer_type,
                        level: *encryption_level,
                    });
                }
            }
            Event::ConnectionClosed(_) => self.check_unresolved_timers(),
            _ => {}
        }
    }

    fn check_unresolved_timers(&mut self) {
        for (timer_type, level) in core::mem::take(&mut self.armed_timers) {
            self.violation(Violation::TimerNotResolved { timer_type, level });
        }
    }
}

impl<T: super::ConnectionTracer> super::ConnectionTracer for ConnectionTracer<T> {
    #[inline]
    fn on_event(&mut self, event: Event<'_>) {
        self.check_state(&event);
        self.check_levels(&event);
        self.check_timers(&event);
        self.inner.record(event);
    }

    #[inline]
    fn close(&mut self) {
        match self.state {
            State::Finished => {
                self.violation(Violation::AlreadyClosed);
                return;
            }
            State::Unstarted | State::Active => {
                self.violation(Violation::MissingConnectionClosed);
                self.check_unresolved_timers();
            }
            State::Closed => {}
        }
        self.state = State::Finished;
        self.inner.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        event::{
            disabled, CloseReason, ConnectionTracer as _, EndpointTracer as _, PacketLossReason,
        },
        packet::Version,
        time::Timestamp,
    };
    use bolero::{check, generator::*};
    use core::time::Duration;

    const ODCID: connection::Id = connection::Id::EMPTY;

    fn started(tracer: &mut Tracer<disabled::Tracer>) -> ConnectionTracer<()> {
        let mut conn = tracer.tracer_for_server(&ODCID);
        let cid = connection::Id::from([1u8; 8]);
        conn.on_connection_started(&api::ConnectionStarted {
            local_address: "127.0.0.1:443".parse().unwrap(),
            remote_address: "127.0.0.1:4433".parse().unwrap(),
            version: Version::V1,
            source_connection_id: &cid,
            destination_connection_id: &cid,
        });
        conn
    }

    fn closed(conn: &mut ConnectionTracer<()>) {
        conn.on_connection_closed(&api::ConnectionClosed {
            reason: CloseReason::IdleTimeout,
        });
        conn.close();
    }

    fn lost(level: EncryptionLevel, packet_number: u64) -> api::PacketLost {
        api::PacketLost {
            encryption_level: level,
            packet_number: PacketNumber::new(packet_number),
            reason: PacketLossReason::ReorderingThreshold,
        }
    }

    fn timer_set(timer_type: TimerType, level: EncryptionLevel) -> api::LossTimerSet {
        api::LossTimerSet {
            timer_type,
            encryption_level: level,
            deadline: Timestamp::from_duration(Duration::from_millis(100)),
        }
    }

    #[test]
    fn well_ordered_connection() {
        let mut tracer = Tracer::new(disabled::Tracer);
        let report = tracer.report();
        let mut conn = started(&mut tracer);
        conn.on_packet_lost(&lost(EncryptionLevel::Initial, 1));
        conn.on_packet_lost(&lost(EncryptionLevel::Initial, 4));
        // packet numbers are independent across levels
        conn.on_packet_lost(&lost(EncryptionLevel::Handshake, 0));
        conn.on_encryption_level_dropped(&api::EncryptionLevelDropped {
            encryption_level: EncryptionLevel::Initial,
        });
        conn.on_loss_timer_set(&timer_set(TimerType::Pto, EncryptionLevel::Handshake));
        conn.on_loss_timer_expired(&api::LossTimerExpired {
            timer_type: TimerType::Pto,
            encryption_level: EncryptionLevel::Handshake,
        });
        closed(&mut conn);

        assert!(report.is_empty(), "{:?}", report.violations());
    }

    #[test]
    fn lifecycle_violations() {
        let mut tracer = Tracer::new(disabled::Tracer);
        let report = tracer.report();

        let mut conn = tracer.tracer_for_client(&ODCID);
        conn.on_pto_count_updated(&api::PtoCountUpdated { value: 1 });
        conn.close();
        conn.close();

        let mut conn = started(&mut tracer);
        closed(&mut conn);
        conn.on_pto_count_updated(&api::PtoCountUpdated { value: 1 });

        assert_eq!(
            report.violations(),
            [
                Violation::NotStarted {
                    event: api::PtoCountUpdated::NAME
                },
                Violation::MissingConnectionClosed,
                Violation::AlreadyClosed,
                Violation::AfterClose {
                    event: api::PtoCountUpdated::NAME
                },
            ]
        );

        let entries = report.entries();
        assert_eq!(entries[0].endpoint_type, endpoint::Type::Client);
        assert_eq!(entries[3].endpoint_type, endpoint::Type::Server);
    }

    #[test]
    fn restart_and_events_after_connection_closed() {
        let mut tracer = Tracer::new(disabled::Tracer);
        let report = tracer.report();
        let mut conn = started(&mut tracer);
        let cid = connection::Id::from([2u8; 4]);
        conn.on_connection_started(&api::ConnectionStarted {
            local_address: "[::1]:443".parse().unwrap(),
            remote_address: "[::1]:4433".parse().unwrap(),
            version: Version::V2,
            source_connection_id: &cid,
            destination_connection_id: &cid,
        });
        conn.on_connection_closed(&api::ConnectionClosed {
            reason: CloseReason::HandshakeTimeout,
        });
        conn.on_packet_lost(&lost(EncryptionLevel::OneRtt, 1));
        conn.close();

        assert_eq!(
            report.violations(),
            [
                Violation::AlreadyStarted,
                Violation::AfterConnectionClosed {
                    event: api::PacketLost::NAME
                },
            ]
        );
    }

    #[test]
    fn dropped_level_violations() {
        let mut tracer = Tracer::new(disabled::Tracer);
        let report = tracer.report();
        let mut conn = started(&mut tracer);
        let dropped = api::EncryptionLevelDropped {
            encryption_level: EncryptionLevel::Handshake,
        };
        conn.on_encryption_level_dropped(&dropped);
        conn.on_packet_lost(&lost(EncryptionLevel::Handshake, 1));
        conn.on_encryption_level_dropped(&dropped);
        // timers may still be canceled for a dropped level
        conn.on_loss_timer_set(&timer_set(TimerType::Ack, EncryptionLevel::OneRtt));
        conn.on_loss_timer_canceled(&api::LossTimerCanceled {
            timer_type: TimerType::Ack,
            encryption_level: EncryptionLevel::OneRtt,
        });
        closed(&mut conn);

        assert_eq!(
            report.violations(),
            [
                Violation::LevelAlreadyDropped {
                    event: api::PacketLost::NAME,
                    level: EncryptionLevel::Handshake,
                },
                Violation::LevelAlreadyDropped {
                    event: api::EncryptionLevelDropped::NAME,
                    level: EncryptionLevel::Handshake,
                },
            ]
        );
    }

    #[test]
    fn loss_monotonicity() {
        let mut tracer = Tracer::new(disabled::Tracer);
        let report = tracer.report();
        let mut conn = started(&mut tracer);
        conn.on_packet_lost(&lost(EncryptionLevel::OneRtt, 5));
        conn.on_packet_lost(&lost(EncryptionLevel::OneRtt, 5));
        conn.on_packet_lost(&lost(EncryptionLevel::OneRtt, 3));
        conn.on_packet_lost(&lost(EncryptionLevel::OneRtt, 6));
        closed(&mut conn);

        assert_eq!(
            report.violations(),
            [
                Violation::LossNotMonotonic {
                    level: EncryptionLevel::OneRtt,
                    packet_number: PacketNumber::new(5),
                    previous: PacketNumber::new(5),
                },
                Violation::LossNotMonotonic {
                    level: EncryptionLevel::OneRtt,
                    packet_number: PacketNumber::new(3),
                    previous: PacketNumber::new(5),
                },
            ]
        );
    }

    #[test]
    fn timer_pairing() {
        for (timer_rearm, expected) in [(TimerRearm::Deny, 2), (TimerRearm::Allow, 1)] {
            let mut tracer = Tracer::new(disabled::Tracer).with_timer_rearm(timer_rearm);
            let report = tracer.report();
            let mut conn = started(&mut tracer);
            let set = timer_set(TimerType::Pto, EncryptionLevel::Handshake);
            conn.on_loss_timer_set(&set);
            conn.on_loss_timer_set(&set);
            conn.on_loss_timer_expired(&api::LossTimerExpired {
                timer_type: TimerType::Pto,
                encryption_level: EncryptionLevel::Handshake,
            });
            conn.on_loss_timer_canceled(&api::LossTimerCanceled {
                timer_type: TimerType::Pto,
                encryption_level: EncryptionLevel::Handshake,
            });
            closed(&mut conn);

            let violations = report.violations();
            assert_eq!(violations.len(), expected, "{violations:?}");
            assert_eq!(
                violations.last(),
                Some(&Violation::TimerNotArmed {
                    event: api::LossTimerCanceled::NAME,
                    timer_type: TimerType::Pto,
                    level: EncryptionLevel::Handshake,
                })
            );
        }
    }

    #[test]
    fn armed_timers_are_resolved_before_close() {
        let mut tracer = Tracer::new(disabled::Tracer);
        let report = tracer.report();
        let mut conn = started(&mut tracer);
        conn.on_loss_timer_set(&timer_set(TimerType::Pto, EncryptionLevel::Handshake));
        conn.on_loss_timer_set(&timer_set(TimerType::Ack, EncryptionLevel::OneRtt));
        conn.on_loss_timer_canceled(&api::LossTimerCanceled {
            timer_type: TimerType::Ack,
            encryption_level: EncryptionLevel::OneRtt,
        });
        closed(&mut conn);

        assert_eq!(
            report.violations(),
            [Violation::TimerNotResolved {
                timer_type: TimerType::Pto,
                level: EncryptionLevel::Handshake,
            }]
        );

        // a tracer closed without connection_closed still reports its armed timers
        let mut conn = started(&mut tracer);
        conn.on_loss_timer_set(&timer_set(TimerType::Ack, EncryptionLevel::Initial));
        conn.close();

        assert_eq!(
            report.violations()[1..],
            [
                Violation::MissingConnectionClosed,
                Violation::TimerNotResolved {
                    timer_type: TimerType::Ack,
                    level: EncryptionLevel::Initial,
                },
            ]
        );
    }

    #[test]
    fn violation_display() {
        let violation = Violation::TimerAlreadyArmed {
            timer_type: TimerType::Pto,
            level: EncryptionLevel::ZeroRtt,
        };
        assert_eq!(
            violation.to_string(),
            "the pto timer for 0-RTT was armed while already armed"
        );
    }

    #[derive(Clone, Copy, Debug, TypeGenerator)]
    enum TimerOp {
        Set(TimerType, EncryptionLevel),
        Expire(TimerType, EncryptionLevel),
        Cancel(TimerType, EncryptionLevel),
    }

    #[test]
    #[cfg_attr(miri, ignore)]
    fn timer_model() {
        check!()
            .with_type::<Vec<TimerOp>>()
            .for_each(|ops| {
                let mut tracer = Tracer::new(disabled::Tracer);
                let report = tracer.report();
                let mut conn = started(&mut tracer);

                let mut armed = BTreeSet::new();
                let mut expected = 0;
                for op in ops {
                    match *op {
                        TimerOp::Set(timer_type, level) => {
                            if !armed.insert((timer_type, level)) {
                                expected += 1;
                            }
                            conn.on_loss_timer_set(&timer_set(timer_type, level));
                        }
                        TimerOp::Expire(timer_type, level) => {
                            if !armed.remove(&(timer_type, level)) {
                                expected += 1;
                            }
                            conn.on_loss_timer_expired(&api::LossTimerExpired {
                                timer_type,
                                encryption_level: level,
                            });
                        }
                        TimerOp::Cancel(timer_type, level) => {
                            if !armed.remove(&(timer_type, level)) {
                                expected += 1;
                            }
                            conn.on_loss_timer_canceled(&api::LossTimerCanceled {
                                timer_type,
                                encryption_level: level,
                            });
                        }
                    }
                }
                // anything still armed is reported when the connection closes
                expected += armed.len();
                closed(&mut conn);

                assert_eq!(report.violations().len(), expected);
            });
    }
}
