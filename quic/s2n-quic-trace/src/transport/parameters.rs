// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::{connection, StatelessResetToken};
use core::{net::SocketAddr, time::Duration};

/// The transport parameters exchanged during the handshake
///
/// Tracers receive the parameters by reference once in each direction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Parameters {
    pub original_destination_connection_id: Option<connection::Id>,
    pub initial_source_connection_id: Option<connection::Id>,
    pub retry_source_connection_id: Option<connection::Id>,
    pub stateless_reset_token: Option<StatelessResetToken>,
    pub preferred_address: Option<PreferredAddress>,
    pub disable_active_migration: bool,
    /// A zero duration disables the idle timeout
    pub max_idle_timeout: Duration,
    pub max_udp_payload_size: u64,
    pub initial_max_data: u64,
    pub initial_max_stream_data_bidi_local: u64,
    pub initial_max_stream_data_bidi_remote: u64,
    pub initial_max_stream_data_uni: u64,
    pub initial_max_streams_bidi: u64,
    pub initial_max_streams_uni: u64,
    pub ack_delay_exponent: u8,
    pub max_ack_delay: Duration,
    pub active_connection_id_limit: u64,
    pub max_datagram_frame_size: Option<u64>,
}

/// The server's preferred address transport parameter
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PreferredAddress {
    pub ipv4_address: Option<SocketAddr>,
    pub ipv6_address: Option<SocketAddr>,
    pub connection_id: connection::Id,
    pub stateless_reset_token: StatelessResetToken,
}

//= https://www.rfc-editor.org/rfc/rfc9000#section-18.2
//# If this value is absent, a default value of 65527 is implied.
const DEFAULT_MAX_UDP_PAYLOAD_SIZE: u64 = 65527;

//= https://www.rfc-editor.org/rfc/rfc9000#section-18.2
//# If this value is absent, a default value of 3 is assumed (indicating a
//# multiplier of 8).
const DEFAULT_ACK_DELAY_EXPONENT: u8 = 3;

//= https://www.rfc-editor.org/rfc/rfc9000#section-18.2
//# If this value is absent, a default of 25 milliseconds is assumed.
const DEFAULT_MAX_ACK_DELAY: Duration = Duration::from_millis(25);

//= https://www.rfc-editor.org/rfc/rfc9000#section-18.2
//# If this transport parameter is absent, a default of 2 is assumed.
const DEFAULT_ACTIVE_CONNECTION_ID_LIMIT: u64 = 2;

impl Default for Parameters {
    fn default() -> Self {
        Self {
            original_destination_connection_id: None,
            initial_source_connection_id: None,
            retry_source_connection_id: None,
            stateless_reset_token: None,
            preferred_address: None,
            disable_active_migration: false,
            max_idle_timeout: Duration::ZERO,
            max_udp_payload_size: DEFAULT_MAX_UDP_PAYLOAD_SIZE,
            initial_max_data: 0,
            initial_max_stream_data_bidi_local: 0,
            initial_max_stream_data_bidi_remote: 0,
            initial_max_stream_data_uni: 0,
            initial_max_streams_bidi: 0,
            initial_max_streams_uni: 0,
            ack_delay_exponent: DEFAULT_ACK_DELAY_EXPONENT,
            max_ack_delay: DEFAULT_MAX_ACK_DELAY,
            active_connection_id_limit: DEFAULT_ACTIVE_CONNECTION_ID_LIMIT,
            max_datagram_frame_size: None,
        }
    }
}

impl Parameters {
    /// Returns the idle timeout that applies if the peer's parameters are `peer`
    ///
    //= https://www.rfc-editor.org/rfc/rfc9000#section-10.1
    //# Each endpoint advertises a max_idle_timeout, but the effective value
    //# at an endpoint is computed as the minimum of the two advertised
    //# values
    pub fn effective_idle_timeout(&self, peer: &Self) -> Option<Duration> {
        match (self.max_idle_timeout, peer.max_idle_timeout) {
            (Duration::ZERO, Duration::ZERO) => None,
            (Duration::ZERO, timeout) | (timeout, Duration::ZERO) => Some(timeout),
            (a, b) => Some(a.min(b)),
        }
    }
}
