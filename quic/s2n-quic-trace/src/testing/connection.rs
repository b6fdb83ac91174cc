// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! A deterministic, scripted connection emitting a complete event stream
//!
//! The driver does not implement QUIC. It replays the event sequence a
//! connection produces for a [`Script`]: Version Negotiation and Retry for
//! clients, the handshake at the Initial and Handshake levels, 1-RTT data with
//! losses, an optional key update, probe timeouts and the close. The resulting
//! [`Outcome`] only depends on the script, so running the same script with
//! different tracers must produce the same outcome.

use crate::{
    connection,
    crypto::EncryptionLevel,
    endpoint,
    event::{
        api, CloseReason, ConnectionTracer, EndpointTracer, Event, Guard, PacketDropReason,
        PacketLossReason, TimerType,
    },
    frame::{Ack, AckRange, Frame},
    packet::{
        ExtendedHeader, Header, KeyPhase, KeyPhaseBit, PacketNumber, PacketNumberSpace,
        PacketType, Version,
    },
    recovery::{RttStats, K_GRANULARITY},
    stream::StreamId,
    time::Timestamp,
    transport, ByteCount,
};
use bolero_generator::prelude::*;
use core::{net::SocketAddr, time::Duration};

const INITIAL_PACKET_SIZE: ByteCount = 1200;
const HANDSHAKE_PACKET_SIZE: ByteCount = 1000;
const STREAM_PACKET_SIZE: ByteCount = 1050;
const SMALL_PACKET_SIZE: ByteCount = 50;
const CRYPTO_LEN: u16 = 900;
const STREAM_LEN: u16 = 1000;
const IDLE_TIMEOUT: Duration = Duration::from_secs(30);
const RETRY_TOKEN: &[u8] = b"retry-token";
/// The version a client offers first when the script asks for version negotiation
const UNSUPPORTED_VERSION: Version = Version::DRAFT_29;
const SUPPORTED_VERSIONS: [Version; 2] = [Version::V1, Version::V2];

//= https://www.rfc-editor.org/rfc/rfc9002#section-7.2
//# Endpoints SHOULD use an initial congestion
//# window of ten times the maximum datagram size (max_datagram_size),
//# while limiting the window to the larger of 14,720 bytes or twice the
//# maximum datagram size.
const INITIAL_CONGESTION_WINDOW: ByteCount = 12_000;

//= https://www.rfc-editor.org/rfc/rfc9002#section-7.2
//# The RECOMMENDED value is 2 * max_datagram_size.
const MINIMUM_CONGESTION_WINDOW: ByteCount = 2 * INITIAL_PACKET_SIZE;

//= https://www.rfc-editor.org/rfc/rfc9002#section-6.1.1
//# The RECOMMENDED initial value for the packet reordering threshold
//# (kPacketThreshold) is 3, based on best practices for TCP loss
//# detection [RFC5681] [RFC6675].
const PACKET_THRESHOLD: u64 = 3;

/// Describes the connection to replay
#[derive(Clone, Copy, Debug, PartialEq, Eq, TypeGenerator)]
pub struct Script {
    pub endpoint_type: endpoint::Type,
    /// The RTT sampled on every acknowledgement, in milliseconds
    pub rtt_ms: u8,
    /// The number of 1-RTT packets carrying stream data
    pub application_packets: u8,
    /// Bit `n` marks the `n`th stream packet as lost
    ///
    /// The last stream packet is always acknowledged.
    pub loss_mask: u64,
    /// Receives a 1-RTT packet before the 1-RTT keys are available
    pub early_one_rtt_packet: bool,
    /// The server answers the client's first Initial with a Version Negotiation packet
    ///
    /// Only applies to clients.
    pub version_negotiation: bool,
    /// The server answers the client's Initial with a Retry packet
    ///
    /// Only applies to clients.
    pub retry: bool,
    /// The number of duplicate Initial packets received after the Initial keys were dropped
    pub duplicates: u8,
    pub key_update: bool,
    /// The number of consecutive probe timeouts before the peer responds
    pub probes: u8,
    pub close: Close,
}

impl Script {
    /// Returns the original destination connection ID chosen by the client
    pub fn original_destination_connection_id(&self) -> connection::Id {
        connection::Id::from([0x0d; 8])
    }

    fn duplicates(&self) -> u8 {
        self.duplicates % 4
    }

    fn probes(&self) -> u8 {
        self.probes % 4
    }

    fn is_lost(&self, index: u64) -> bool {
        index + 1 < self.application_packets as u64
            && index < 64
            && self.loss_mask & (1 << index) != 0
    }
}

impl Default for Script {
    fn default() -> Self {
        Self {
            endpoint_type: endpoint::Type::Server,
            rtt_ms: 10,
            application_packets: 0,
            loss_mask: 0,
            early_one_rtt_packet: false,
            version_negotiation: false,
            retry: false,
            duplicates: 0,
            key_update: false,
            probes: 0,
            close: Close::IdleTimeout,
        }
    }
}

/// How the scripted connection ends
#[derive(Clone, Copy, Debug, PartialEq, Eq, TypeGenerator)]
pub enum Close {
    IdleTimeout,
    /// The local application closes the connection
    Application { error_code: u16 },
    /// The peer closes the connection with a transport error
    PeerTransport { error_code: u16 },
}

/// The protocol-visible result of a scripted connection
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Outcome {
    pub packets_sent: u64,
    pub packets_received: u64,
    pub packets_lost: u64,
    pub close_reason: CloseReason,
    /// The number of events delivered to the tracer
    pub events: u64,
}

/// Replays the script against a connection tracer
pub fn run<T: ConnectionTracer>(script: &Script, tracer: T) -> Outcome {
    let mut driver = Driver::new(script, tracer);
    driver.handshake();
    driver.application();
    driver.key_update();
    driver.probes();
    driver.close()
}

/// Replays the script with a connection tracer created by the endpoint tracer
pub fn run_with<E: EndpointTracer>(script: &Script, endpoint: &mut E) -> Outcome {
    let odcid = script.original_destination_connection_id();
    let tracer = endpoint.tracer_for(script.endpoint_type, &odcid);
    run(script, tracer)
}

struct Driver<'a, T: ConnectionTracer> {
    script: &'a Script,
    tracer: Guard<T>,
    local_connection_id: connection::Id,
    peer_connection_id: connection::Id,
    now: Timestamp,
    version: Version,
    rtt: RttStats,
    congestion_window: ByteCount,
    bytes_in_flight: ByteCount,
    packets_in_flight: usize,
    key_phase: KeyPhase,
    /// The next packet number to send in each packet number space
    sent: [u64; 3],
    /// The next packet number to receive in each packet number space
    received: [u64; 3],
    packets_sent: u64,
    packets_received: u64,
    packets_lost: u64,
    events: u64,
}

fn space_index(level: EncryptionLevel) -> usize {
    match level.packet_number_space() {
        PacketNumberSpace::Initial => 0,
        PacketNumberSpace::Handshake => 1,
        PacketNumberSpace::ApplicationData => 2,
    }
}

impl<'a, T: ConnectionTracer> Driver<'a, T> {
    fn new(script: &'a Script, tracer: T) -> Self {
        let client = connection::Id::from([0xc1; 8]);
        let server = connection::Id::from([0x5e; 8]);
        let (local_connection_id, peer_connection_id) = match script.endpoint_type {
            endpoint::Type::Client => (client, server),
            endpoint::Type::Server => (server, client),
        };

        let version = if script.version_negotiation && script.endpoint_type.is_client() {
            UNSUPPORTED_VERSION
        } else {
            Version::V1
        };

        let rtt = RttStats {
            max_ack_delay: transport::Parameters::default().max_ack_delay,
            ..Default::default()
        };

        Self {
            script,
            tracer: Guard::new(tracer),
            local_connection_id,
            peer_connection_id,
            now: Timestamp::default(),
            version,
            rtt,
            congestion_window: INITIAL_CONGESTION_WINDOW,
            bytes_in_flight: 0,
            packets_in_flight: 0,
            key_phase: KeyPhase::default(),
            sent: [0; 3],
            received: [0; 3],
            packets_sent: 0,
            packets_received: 0,
            packets_lost: 0,
            events: 0,
        }
    }

    fn emit(&mut self, event: Event<'_>) {
        self.events += 1;
        self.tracer.record(event);
    }

    fn header(
        &self,
        level: EncryptionLevel,
        destination: connection::Id,
        source: connection::Id,
        packet_number: u64,
    ) -> ExtendedHeader<'static> {
        let packet_number = PacketNumber::new(packet_number);
        match level {
            EncryptionLevel::OneRtt => {
                ExtendedHeader::new(Header::short(destination), packet_number)
                    .with_key_phase(self.key_phase.bit())
            }
            level => ExtendedHeader::new(
                Header::long(PacketType::from(level), self.version, destination, source),
                packet_number,
            )
            .with_key_phase(KeyPhaseBit::Zero),
        }
    }

    fn send(
        &mut self,
        level: EncryptionLevel,
        packet_size: ByteCount,
        ack: Option<&Ack<'_>>,
        frames: &[Frame<'_>],
    ) -> u64 {
        let space = space_index(level);
        let packet_number = self.sent[space];
        self.sent[space] += 1;

        let header = self.header(
            level,
            self.peer_connection_id,
            self.local_connection_id,
            packet_number,
        );
        self.emit(Event::PacketSent(&api::PacketSent {
            header: &header,
            packet_size,
            ack,
            frames,
        }));

        self.packets_sent += 1;
        if frames.iter().any(Frame::is_ack_eliciting) {
            self.bytes_in_flight += packet_size;
            self.packets_in_flight += 1;
        }
        packet_number
    }

    fn receive(
        &mut self,
        level: EncryptionLevel,
        packet_size: ByteCount,
        frames: &[Frame<'_>],
    ) -> u64 {
        let space = space_index(level);
        let packet_number = self.received[space];
        self.received[space] += 1;

        let header = self.header(
            level,
            self.local_connection_id,
            self.peer_connection_id,
            packet_number,
        );
        self.emit(Event::PacketReceived(&api::PacketReceived {
            header: &header,
            packet_size,
            frames,
        }));

        self.packets_received += 1;
        packet_number
    }

    /// Receives a packet acknowledging the given range of sent packets
    fn receive_ack(&mut self, level: EncryptionLevel, ranges: &[AckRange]) {
        let ack = Frame::Ack(Ack {
            ranges,
            ack_delay: Duration::from_millis(1),
            ecn_counts: None,
        });
        self.receive(level, SMALL_PACKET_SIZE, &[ack]);
    }

    /// Takes an RTT sample and reports the updated recovery metrics
    fn on_acknowledged(&mut self) {
        let sample = Duration::from_millis(self.script.rtt_ms as u64 + 1);
        self.now += sample;
        self.rtt.update(sample);
        self.bytes_in_flight = 0;
        self.packets_in_flight = 0;

        let rtt = self.rtt;
        let congestion_window = self.congestion_window;
        self.emit(Event::MetricsUpdated(&api::MetricsUpdated {
            rtt: &rtt,
            congestion_window,
            bytes_in_flight: 0,
            packets_in_flight: 0,
        }));
    }

    fn arm(
        &mut self,
        timer_type: TimerType,
        encryption_level: EncryptionLevel,
        timeout: Duration,
    ) -> Timestamp {
        let deadline = self.now + timeout;
        self.emit(Event::LossTimerSet(&api::LossTimerSet {
            timer_type,
            encryption_level,
            deadline,
        }));
        deadline
    }

    fn arm_pto(&mut self, encryption_level: EncryptionLevel) -> Timestamp {
        let timeout = self
            .rtt
            .pto_period(encryption_level == EncryptionLevel::OneRtt);
        self.arm(TimerType::Pto, encryption_level, timeout)
    }

    fn expire(&mut self, timer_type: TimerType, encryption_level: EncryptionLevel) {
        self.emit(Event::LossTimerExpired(&api::LossTimerExpired {
            timer_type,
            encryption_level,
        }));
    }

    fn cancel(&mut self, timer_type: TimerType, encryption_level: EncryptionLevel) {
        self.emit(Event::LossTimerCanceled(&api::LossTimerCanceled {
            timer_type,
            encryption_level,
        }));
    }

    fn install_keys(&mut self, encryption_level: EncryptionLevel) {
        for perspective in [endpoint::Type::Client, endpoint::Type::Server] {
            self.emit(Event::KeyUpdatedFromTls(&api::KeyUpdatedFromTls {
                encryption_level,
                perspective,
            }));
        }
    }

    fn drop_level(&mut self, encryption_level: EncryptionLevel) {
        self.emit(Event::EncryptionLevelDropped(&api::EncryptionLevelDropped {
            encryption_level,
        }));
    }

    fn parameters(&self, endpoint_type: endpoint::Type) -> transport::Parameters {
        let (source, original_destination) = match endpoint_type {
            endpoint::Type::Client => (connection::Id::from([0xc1; 8]), None),
            endpoint::Type::Server => (
                connection::Id::from([0x5e; 8]),
                Some(self.script.original_destination_connection_id()),
            ),
        };

        transport::Parameters {
            original_destination_connection_id: original_destination,
            initial_source_connection_id: Some(source),
            max_idle_timeout: IDLE_TIMEOUT,
            initial_max_data: 1 << 20,
            initial_max_stream_data_bidi_local: 1 << 18,
            initial_max_stream_data_bidi_remote: 1 << 18,
            initial_max_streams_bidi: 100,
            ..Default::default()
        }
    }

    fn handshake(&mut self) {
        let (local_address, remote_address) = {
            let client = SocketAddr::from(([192, 0, 2, 1], 49152));
            let server = SocketAddr::from(([192, 0, 2, 2], 443));
            match self.script.endpoint_type {
                endpoint::Type::Client => (client, server),
                endpoint::Type::Server => (server, client),
            }
        };

        let source_connection_id = self.local_connection_id;
        let destination_connection_id = self.peer_connection_id;
        self.emit(Event::ConnectionStarted(&api::ConnectionStarted {
            local_address,
            remote_address,
            version: self.version,
            source_connection_id: &source_connection_id,
            destination_connection_id: &destination_connection_id,
        }));

        let local = self.parameters(self.script.endpoint_type);
        self.emit(Event::TransportParametersSent(&api::TransportParametersSent {
            parameters: &local,
        }));

        self.negotiate();
        self.exchange(EncryptionLevel::Initial);

        let peer = self.parameters(self.script.endpoint_type.peer_type());
        self.emit(Event::TransportParametersReceived(
            &api::TransportParametersReceived { parameters: &peer },
        ));

        self.install_keys(EncryptionLevel::Handshake);
        self.drop_level(EncryptionLevel::Initial);

        for _ in 0..self.script.duplicates() {
            self.emit(Event::PacketDropped(&api::PacketDropped {
                packet_type: PacketType::Initial,
                packet_size: INITIAL_PACKET_SIZE,
                reason: PacketDropReason::Duplicate,
            }));
        }

        if self.script.early_one_rtt_packet {
            self.emit(Event::PacketBuffered(&api::PacketBuffered {
                packet_type: PacketType::OneRtt,
            }));
        }

        self.exchange(EncryptionLevel::Handshake);

        self.install_keys(EncryptionLevel::OneRtt);
        self.drop_level(EncryptionLevel::Handshake);

        if self.script.early_one_rtt_packet {
            self.receive(EncryptionLevel::OneRtt, SMALL_PACKET_SIZE, &[Frame::Ping]);
        }
    }

    /// Replays the packets a client receives before the server accepts its Initial
    fn negotiate(&mut self) {
        if self.script.endpoint_type.is_server() {
            return;
        }

        let crypto = Frame::Crypto {
            offset: 0,
            len: CRYPTO_LEN,
        };

        if self.script.version_negotiation {
            self.send(EncryptionLevel::Initial, INITIAL_PACKET_SIZE, None, &[crypto]);

            //= https://www.rfc-editor.org/rfc/rfc9000#section-17.2.1
            //# The Version field of a Version Negotiation packet MUST be set to
            //# 0x00000000.
            let header = Header::long(
                PacketType::VersionNegotiation,
                Version::new(0),
                self.local_connection_id,
                self.peer_connection_id,
            );
            self.emit(Event::VersionNegotiationReceived(
                &api::VersionNegotiationReceived {
                    header: &header,
                    versions: &SUPPORTED_VERSIONS,
                },
            ));
            self.version = SUPPORTED_VERSIONS[0];
        }

        if self.script.retry {
            self.send(EncryptionLevel::Initial, INITIAL_PACKET_SIZE, None, &[crypto]);

            let header = Header::long(
                PacketType::Retry,
                self.version,
                self.local_connection_id,
                self.peer_connection_id,
            )
            .with_token(RETRY_TOKEN);
            self.emit(Event::RetryReceived(&api::RetryReceived { header: &header }));
        }
    }

    /// Exchanges a CRYPTO flight in each direction at the given level
    fn exchange(&mut self, level: EncryptionLevel) {
        let crypto = Frame::Crypto {
            offset: 0,
            len: CRYPTO_LEN,
        };
        let packet_size = match level {
            EncryptionLevel::Initial => INITIAL_PACKET_SIZE,
            _ => HANDSHAKE_PACKET_SIZE,
        };

        match self.script.endpoint_type {
            endpoint::Type::Client => {
                let sent = self.send(level, packet_size, None, &[crypto]);
                self.arm_pto(level);
                let ranges = [AckRange::new(sent, sent)];
                let ack = Frame::Ack(Ack {
                    ranges: &ranges,
                    ack_delay: Duration::ZERO,
                    ecn_counts: None,
                });
                self.receive(level, packet_size, &[crypto, ack]);
                self.cancel(TimerType::Pto, level);
            }
            endpoint::Type::Server => {
                let received = self.receive(level, packet_size, &[crypto]);
                let ranges = [AckRange::new(received, received)];
                let ack = Ack {
                    ranges: &ranges,
                    ack_delay: Duration::ZERO,
                    ecn_counts: None,
                };
                let sent = self.send(level, packet_size, Some(&ack), &[crypto]);
                self.arm_pto(level);
                self.receive_ack(level, &[AckRange::new(sent, sent)]);
                self.cancel(TimerType::Pto, level);
            }
        }

        self.on_acknowledged();
    }

    fn application(&mut self) {
        let count = self.script.application_packets as u64;
        if count == 0 {
            return;
        }

        let level = EncryptionLevel::OneRtt;
        let first = self.sent[space_index(level)];
        for index in 0..count {
            let stream = Frame::Stream {
                id: StreamId::from_u64(0),
                offset: index * STREAM_LEN as u64,
                len: STREAM_LEN,
                is_fin: index + 1 == count,
            };
            self.send(level, STREAM_PACKET_SIZE, None, &[stream]);
            if index == 0 {
                self.arm_pto(level);
            }
        }

        // acknowledged ranges, in descending order
        let mut ranges = Vec::new();
        let mut range: Option<AckRange> = None;
        for index in (0..count).rev() {
            let packet_number = first + index;
            if self.script.is_lost(index) {
                ranges.extend(range.take());
            } else {
                range = Some(match range {
                    Some(range) => AckRange::new(packet_number, range.largest),
                    None => AckRange::new(packet_number, packet_number),
                });
            }
        }
        ranges.extend(range);

        self.receive_ack(level, &ranges);
        self.cancel(TimerType::Pto, level);

        let largest = first + count - 1;
        let (reordered, delayed): (Vec<u64>, Vec<u64>) = (0..count)
            .filter(|index| self.script.is_lost(*index))
            .map(|index| first + index)
            .partition(|packet_number| largest - packet_number >= PACKET_THRESHOLD);
        let has_losses = !reordered.is_empty() || !delayed.is_empty();

        for packet_number in reordered {
            self.lose(packet_number, PacketLossReason::ReorderingThreshold);
        }

        if !delayed.is_empty() {
            //= https://www.rfc-editor.org/rfc/rfc9002#section-6.1.2
            //# max(kTimeThreshold * max(smoothed_rtt, latest_rtt), kGranularity)
            let loss_delay = (self.rtt.smoothed_rtt.max(self.rtt.latest_rtt) * 9 / 8)
                .max(K_GRANULARITY);
            self.now = self.arm(TimerType::Ack, level, loss_delay);
            self.expire(TimerType::Ack, level);
            for packet_number in delayed {
                self.lose(packet_number, PacketLossReason::TimeThreshold);
            }
        }

        if has_losses {
            self.congestion_window = (self.congestion_window / 2).max(MINIMUM_CONGESTION_WINDOW);
        }

        self.on_acknowledged();
    }

    fn lose(&mut self, packet_number: u64, reason: PacketLossReason) {
        self.packets_lost += 1;
        self.emit(Event::PacketLost(&api::PacketLost {
            encryption_level: EncryptionLevel::OneRtt,
            packet_number: PacketNumber::new(packet_number),
            reason,
        }));
    }

    fn key_update(&mut self) {
        if !self.script.key_update {
            return;
        }

        let level = EncryptionLevel::OneRtt;
        self.key_phase = self.key_phase.next();
        self.emit(Event::KeyUpdated(&api::KeyUpdated {
            generation: self.key_phase,
            initiator: endpoint::Location::Local,
        }));

        let sent = self.send(level, SMALL_PACKET_SIZE, None, &[Frame::Ping]);
        self.arm_pto(level);
        self.receive_ack(level, &[AckRange::new(sent, sent)]);
        self.cancel(TimerType::Pto, level);
        self.on_acknowledged();
    }

    fn probes(&mut self) {
        let probes = self.script.probes();
        if probes == 0 {
            return;
        }

        let level = EncryptionLevel::OneRtt;
        let first = self.sent[space_index(level)];
        for pto_count in 1..=probes {
            //= https://www.rfc-editor.org/rfc/rfc9002#section-6.2.1
            //# When a PTO timer expires, the PTO backoff MUST be increased,
            //# resulting in the PTO period being set to twice its current value.
            let timeout = self.rtt.pto_period(true) * (1 << (pto_count - 1));
            self.now = self.arm(TimerType::Pto, level, timeout);
            self.expire(TimerType::Pto, level);
            self.emit(Event::PtoCountUpdated(&api::PtoCountUpdated {
                value: pto_count as u32,
            }));
            self.send(level, SMALL_PACKET_SIZE, None, &[Frame::Ping]);
        }

        let largest = first + probes as u64 - 1;
        self.receive_ack(level, &[AckRange::new(first, largest)]);
        self.emit(Event::PtoCountUpdated(&api::PtoCountUpdated { value: 0 }));
        self.on_acknowledged();
    }

    fn close(mut self) -> Outcome {
        let level = EncryptionLevel::OneRtt;
        let close_reason = match self.script.close {
            Close::IdleTimeout => {
                self.now += IDLE_TIMEOUT;
                CloseReason::IdleTimeout
            }
            Close::Application { error_code } => {
                let close = Frame::ConnectionClose {
                    error_code: error_code as u64,
                    frame_type: None,
                    reason: b"done",
                };
                self.send(level, SMALL_PACKET_SIZE, None, &[close]);
                CloseReason::Application {
                    error_code: error_code as u64,
                    initiator: endpoint::Location::Local,
                }
            }
            Close::PeerTransport { error_code } => {
                let close = Frame::ConnectionClose {
                    error_code: error_code as u64,
                    frame_type: Some(0),
                    reason: b"",
                };
                self.receive(level, SMALL_PACKET_SIZE, &[close]);
                CloseReason::Transport {
                    error_code: error_code as u64,
                    initiator: endpoint::Location::Remote,
                }
            }
        };

        self.emit(Event::ConnectionClosed(&api::ConnectionClosed {
            reason: close_reason,
        }));
        self.tracer.close();

        Outcome {
            packets_sent: self.packets_sent,
            packets_received: self.packets_received,
            packets_lost: self.packets_lost,
            close_reason,
            events: self.events,
        }
    }
}
