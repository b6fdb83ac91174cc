// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use super::*;
use crate::{packet::KeyPhaseBit, stream::StreamId};
use core::time::Duration;
use std::collections::HashSet;

fn server_cid() -> connection::Id {
    connection::Id::from([0x5e; 8])
}

fn client_cid() -> connection::Id {
    connection::Id::from([0xc1; 8])
}

fn initial_header(packet_number: u64) -> ExtendedHeader<'static> {
    ExtendedHeader::new(
        Header::long(PacketType::Initial, Version::V1, client_cid(), server_cid()),
        PacketNumber::new(packet_number),
    )
}

#[test]
fn event_names_are_unique() {
    let names: HashSet<_> = Event::NAMES.iter().collect();
    assert_eq!(names.len(), Event::NAMES.len());
    assert_eq!(Event::NAMES.len(), 20);

    for name in Event::NAMES {
        let (category, event) = name.split_once(':').unwrap();
        assert!(!category.is_empty() && !event.is_empty(), "{name}");
    }
}

#[test]
fn families_and_levels() {
    let lost = api::PacketLost {
        encryption_level: EncryptionLevel::Handshake,
        packet_number: PacketNumber::new(1),
        reason: PacketLossReason::TimeThreshold,
    };
    let event = Event::from(&lost);
    assert_eq!(event.family(), Family::Recovery);
    assert_eq!(event.encryption_level(), Some(EncryptionLevel::Handshake));
    assert_eq!(event.required_encryption_level(), Some(EncryptionLevel::Handshake));
    assert_eq!(event.to_string(), "recovery:packet_lost");

    let dropped = api::PacketDropped {
        packet_type: PacketType::Handshake,
        packet_size: 1200,
        reason: PacketDropReason::KeyUnavailable,
    };
    let event = Event::from(&dropped);
    assert_eq!(event.family(), Family::PacketIo);
    assert_eq!(event.encryption_level(), Some(EncryptionLevel::Handshake));
    assert_eq!(event.required_encryption_level(), None);

    let key_update = api::KeyUpdated {
        generation: KeyPhase::new(1),
        initiator: endpoint::Location::Remote,
    };
    assert_eq!(
        Event::from(&key_update).required_encryption_level(),
        Some(EncryptionLevel::OneRtt)
    );

    let pto = api::PtoCountUpdated { value: 2 };
    assert_eq!(Event::from(&pto).encryption_level(), None);
}

/// A server receives an Initial, answers it and times out
#[test]
fn server_handshake_timeout() {
    let mut endpoint = testing::Endpoint::default();
    let odcid = connection::Id::from([0x0d; 8]);
    let mut tracer = Guard::new(endpoint.tracer_for_server(&odcid));

    let local = server_cid();
    let remote = client_cid();
    tracer.on_connection_started(&api::ConnectionStarted {
        local_address: "192.0.2.2:443".parse().unwrap(),
        remote_address: "192.0.2.1:49152".parse().unwrap(),
        version: Version::V1,
        source_connection_id: &local,
        destination_connection_id: &remote,
    });

    let received = initial_header(0);
    tracer.on_packet_received(&api::PacketReceived {
        header: &received,
        packet_size: 1200,
        frames: &[Frame::Crypto {
            offset: 0,
            len: 1100,
        }],
    });

    let sent = initial_header(0);
    let ranges = [frame::AckRange::new(0, 0)];
    let ack = frame::Ack {
        ranges: &ranges,
        ack_delay: Duration::ZERO,
        ecn_counts: None,
    };
    tracer.on_packet_sent(&api::PacketSent {
        header: &sent,
        packet_size: 1100,
        ack: Some(&ack),
        frames: &[Frame::Crypto {
            offset: 0,
            len: 1000,
        }],
    });

    tracer.on_connection_closed(&api::ConnectionClosed {
        reason: CloseReason::HandshakeTimeout,
    });
    tracer.close();
    drop(tracer);

    let connections = endpoint.connections();
    assert_eq!(connections.len(), 1);
    let connection = &connections[0];
    assert_eq!(connection.endpoint_type, endpoint::Type::Server);
    assert_eq!(connection.original_destination_connection_id, odcid);
    assert_eq!(connection.log.calls(), 5);
    assert_eq!(connection.log.close_calls(), 1);

    insta::assert_debug_snapshot!(connection.log.names(), @r###"
    [
        "connectivity:connection_started",
        "transport:packet_received",
        "transport:packet_sent",
        "connectivity:connection_closed",
    ]
    "###);
}

/// An armed PTO timer for the Handshake level expires
#[test]
fn pto_timer_expires() {
    let recorder = testing::Endpoint::default();
    let mut tracer = validator::Tracer::new(recorder.clone());
    let report = tracer.report();
    let mut conn = Guard::new(tracer.tracer_for_client(&client_cid()));

    let scid = client_cid();
    let dcid = server_cid();
    conn.on_connection_started(&api::ConnectionStarted {
        local_address: "[2001:db8::1]:49152".parse().unwrap(),
        remote_address: "[2001:db8::2]:443".parse().unwrap(),
        version: Version::V1,
        source_connection_id: &scid,
        destination_connection_id: &dcid,
    });

    let start = Timestamp::default();
    conn.on_loss_timer_set(&api::LossTimerSet {
        timer_type: TimerType::Pto,
        encryption_level: EncryptionLevel::Handshake,
        deadline: start + Duration::from_millis(100),
    });
    conn.on_loss_timer_expired(&api::LossTimerExpired {
        timer_type: TimerType::Pto,
        encryption_level: EncryptionLevel::Handshake,
    });
    conn.on_connection_closed(&api::ConnectionClosed {
        reason: CloseReason::IdleTimeout,
    });
    drop(conn);

    assert!(report.is_empty(), "{:?}", report.violations());

    let log = &recorder.connections()[0].log;
    assert_eq!(log.close_calls(), 1);
    assert_eq!(
        &log.names()[1..3],
        [api::LossTimerSet::NAME, api::LossTimerExpired::NAME]
    );
    let events = log.events();
    assert!(events[1].contains("Pto"), "{}", events[1]);
    assert!(events[1].contains("Handshake"), "{}", events[1]);
    assert!(events[1].contains("100ms"), "{}", events[1]);
}

/// A guard closes the tracer of a connection that never reported its close
#[test]
fn guard_reports_missing_close() {
    let mut tracer = validator::Tracer::new(disabled::Tracer);
    let report = tracer.report();
    drop(Guard::new(tracer.tracer_for_server(&server_cid())));

    assert_eq!(report.violations(), [validator::Violation::MissingConnectionClosed]);
}

#[test]
fn packet_sent_is_not_mutated() {
    let header = ExtendedHeader::new(Header::short(server_cid()), PacketNumber::new(42))
        .with_key_phase(KeyPhaseBit::One);
    let ranges = [frame::AckRange::new(30, 40), frame::AckRange::new(10, 20)];
    let ack = frame::Ack {
        ranges: &ranges,
        ack_delay: Duration::from_micros(1500),
        ecn_counts: Some(frame::EcnCounts {
            ect_0: 5,
            ect_1: 0,
            ce: 1,
        }),
    };
    let frames = [
        Frame::Stream {
            id: StreamId::from_u64(4),
            offset: 1000,
            len: 500,
            is_fin: true,
        },
        Frame::Padding { len: 10 },
    ];
    let event = api::PacketSent {
        header: &header,
        packet_size: 600,
        ack: Some(&ack),
        frames: &frames,
    };
    let before = event;

    let counters = counters::Tracer::default();
    let mut tracer = (
        testing::Tracer::new(),
        (
            Some(super::tracing::Tracer::default().tracer_for_server(&server_cid())),
            counters.clone().tracer_for_server(&server_cid()),
        ),
    );
    tracer.on_packet_sent(&event);
    tracer.record(Event::PacketSent(&event));

    assert_eq!(event, before);
    assert_eq!(*event.header, header);
    assert_eq!(event.frames, &frames[..]);
    assert_eq!(event.ack.and_then(|ack| ack.largest_acknowledged()), Some(40));
    assert_eq!(counters.counters().snapshot().bytes_sent, 1200);
}

/// Counts overridden events separately from the catch-all hook
#[derive(Default)]
struct Dispatch {
    lost: usize,
    other: Vec<&'static str>,
}

impl ConnectionTracer for Dispatch {
    fn on_event(&mut self, event: Event<'_>) {
        self.other.push(event.name());
    }

    fn on_packet_lost(&mut self, _event: &api::PacketLost) {
        self.lost += 1;
    }
}

#[test]
fn record_dispatches_to_event_methods() {
    let lost = api::PacketLost {
        encryption_level: EncryptionLevel::OneRtt,
        packet_number: PacketNumber::new(3),
        reason: PacketLossReason::ReorderingThreshold,
    };
    let pto = api::PtoCountUpdated { value: 1 };

    let mut tracer = Dispatch::default();
    tracer.on_packet_lost(&lost);
    tracer.record(Event::PacketLost(&lost));
    tracer.on_pto_count_updated(&pto);
    tracer.record((&pto).into());

    assert_eq!(tracer.lost, 2);
    assert_eq!(tracer.other, [api::PtoCountUpdated::NAME; 2]);

    // wrappers preserve the inner tracer's overrides
    let mut boxed: Box<dyn ConnectionTracer> = Box::new(Dispatch::default());
    boxed.record(Event::PacketLost(&lost));
    boxed.on_pto_count_updated(&pto);
    boxed.close();
}

#[test]
fn combinators_forward_every_event() {
    let tracers: Vec<_> = (0..3).map(|_| testing::Tracer::new()).collect();
    let logs: Vec<_> = tracers.iter().map(testing::Tracer::log).collect();
    let disabled: Option<testing::Tracer> = None;
    let boxed = testing::Tracer::new();
    let boxed_log = boxed.log();

    let mut tracer = (
        (tracers, disabled),
        Box::new(boxed) as Box<dyn ConnectionTracer>,
    );

    let dropped = api::EncryptionLevelDropped {
        encryption_level: EncryptionLevel::Initial,
    };
    let buffered = api::PacketBuffered {
        packet_type: PacketType::Handshake,
    };
    let token = [7u8; 16];
    tracer.on_encryption_level_dropped(&dropped);
    tracer.record(Event::PacketBuffered(&buffered));
    tracer.on_stateless_reset_received(&api::StatelessResetReceived { token: &token });
    tracer.on_connection_closed(&api::ConnectionClosed {
        reason: CloseReason::StatelessReset { token },
    });
    tracer.close();

    let expected = [
        api::EncryptionLevelDropped::NAME,
        api::PacketBuffered::NAME,
        api::StatelessResetReceived::NAME,
        api::ConnectionClosed::NAME,
    ];
    for log in logs.iter().chain(Some(&boxed_log)) {
        assert_eq!(log.names(), expected);
        assert_eq!(log.close_calls(), 1);
    }
}

#[test]
fn combinators_forward_on_event() {
    let first = testing::Tracer::new();
    let second = testing::Tracer::new();
    let listed = testing::Tracer::new();
    let logs = [first.log(), second.log(), listed.log()];

    let mut tracer = ((first, Some(second)), vec![listed]);
    let pto = api::PtoCountUpdated { value: 3 };
    tracer.on_event(Event::PtoCountUpdated(&pto));

    for log in &logs {
        assert_eq!(log.names(), [api::PtoCountUpdated::NAME]);
    }
}

/// Version Negotiation and Retry packets are only ever received by clients
#[test]
fn client_only_events() {
    let header = Header::long(
        PacketType::VersionNegotiation,
        Version::new(0),
        client_cid(),
        server_cid(),
    );
    let versions = [Version::V1, Version::V2];
    let negotiation = api::VersionNegotiationReceived {
        header: &header,
        versions: &versions,
    };
    let retry_header = Header::long(PacketType::Retry, Version::V1, client_cid(), server_cid())
        .with_token(b"t");
    let retry = api::RetryReceived {
        header: &retry_header,
    };

    for event in [Event::from(&negotiation), Event::from(&retry)] {
        assert_eq!(event.family(), Family::PacketIo);
        assert_eq!(event.encryption_level(), None);
        assert_eq!(event.required_encryption_level(), None);
    }

    let recorder = testing::Endpoint::default();
    let mut endpoint = validator::Tracer::new((recorder.clone(), Some(recorder.clone())));
    let report = endpoint.report();
    let mut conn = Guard::new(endpoint.tracer_for_client(&client_cid()));

    let scid = client_cid();
    let dcid = server_cid();
    conn.on_connection_started(&api::ConnectionStarted {
        local_address: "192.0.2.1:49152".parse().unwrap(),
        remote_address: "192.0.2.2:443".parse().unwrap(),
        version: Version::DRAFT_29,
        source_connection_id: &scid,
        destination_connection_id: &dcid,
    });
    conn.record(Event::VersionNegotiationReceived(&negotiation));
    conn.on_retry_received(&retry);
    conn.on_connection_closed(&api::ConnectionClosed {
        reason: CloseReason::HandshakeTimeout,
    });
    drop(conn);

    assert!(report.is_empty(), "{:?}", report.violations());

    let connections = recorder.connections();
    assert_eq!(connections.len(), 2);
    for connection in &connections {
        assert_eq!(connection.endpoint_type, endpoint::Type::Client);
        assert_eq!(
            &connection.log.names()[1..3],
            [api::VersionNegotiationReceived::NAME, api::RetryReceived::NAME]
        );
        assert_eq!(connection.log.close_calls(), 1);
    }
}

#[test]
fn endpoint_combinators() {
    let odcid = connection::Id::from([0x0d; 4]);
    let recorder = testing::Endpoint::default();
    let mut endpoint = (Some(recorder.clone()), None::<testing::Endpoint>);

    let (mut enabled, mut disabled) = endpoint.tracer_for(endpoint::Type::Client, &odcid);
    assert!(enabled.is_some());
    assert!(disabled.is_none());
    enabled.close();
    disabled.close();

    let _ = endpoint.tracer_for(endpoint::Type::Server, &odcid);

    let connections = recorder.connections();
    assert_eq!(
        connections
            .iter()
            .map(|connection| connection.endpoint_type)
            .collect::<Vec<_>>(),
        [endpoint::Type::Client, endpoint::Type::Server]
    );
    assert_eq!(connections[0].log.close_calls(), 1);
    assert_eq!(connections[1].log.close_calls(), 0);
}

#[test]
fn providers_start() {
    let mut tracer = disabled::Tracer.start().unwrap();
    let () = tracer.tracer_for_client(&client_cid());

    let mut tracer = counters::Tracer::default().start().unwrap();
    let mut conn = tracer.tracer_for_server(&server_cid());
    conn.close();
    assert_eq!(tracer.counters().snapshot().connections_finished, 1);
}
