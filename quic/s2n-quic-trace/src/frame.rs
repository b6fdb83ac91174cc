// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Frame representations handed to tracers
//!
//! Frames only carry the fields useful for diagnostics; payload bytes of
//! STREAM, CRYPTO and DATAGRAM frames are represented by their lengths.

use crate::{
    connection,
    stream::{StreamId, StreamNum, StreamType},
    StatelessResetToken,
};
use core::time::Duration;

/// A contiguous range of acknowledged packet numbers
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AckRange {
    pub smallest: u64,
    pub largest: u64,
}

impl AckRange {
    #[inline]
    pub fn new(smallest: u64, largest: u64) -> Self {
        debug_assert!(smallest <= largest);
        Self { smallest, largest }
    }

    #[inline]
    pub fn contains(&self, packet_number: u64) -> bool {
        (self.smallest..=self.largest).contains(&packet_number)
    }

    /// Returns the number of packets acknowledged by the range
    ///
    /// Saturates at `u64::MAX` for the full packet number range and returns 0
    /// for an inverted range.
    #[inline]
    pub fn packet_count(&self) -> u64 {
        match self.largest.checked_sub(self.smallest) {
            Some(delta) => delta.saturating_add(1),
            None => 0,
        }
    }
}

/// ECN counts reported in an ACK_ECN frame
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EcnCounts {
    pub ect_0: u64,
    pub ect_1: u64,
    pub ce: u64,
}

/// An ACK frame
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Ack<'a> {
    /// Acknowledged ranges, in descending order as they appear on the wire
    pub ranges: &'a [AckRange],
    pub ack_delay: Duration,
    pub ecn_counts: Option<EcnCounts>,
}

impl Ack<'_> {
    /// Returns the largest acknowledged packet number
    #[inline]
    pub fn largest_acknowledged(&self) -> Option<u64> {
        self.ranges.iter().map(|range| range.largest).max()
    }

    #[inline]
    pub fn acks_packet(&self, packet_number: u64) -> bool {
        self.ranges.iter().any(|range| range.contains(packet_number))
    }
}

/// A frame contained in a sent or received packet
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Frame<'a> {
    Padding {
        len: u16,
    },
    Ping,
    Ack(Ack<'a>),
    ResetStream {
        id: StreamId,
        error_code: u64,
        final_size: u64,
    },
    StopSending {
        id: StreamId,
        error_code: u64,
    },
    Crypto {
        offset: u64,
        len: u16,
    },
    NewToken {
        len: u16,
    },
    Stream {
        id: StreamId,
        offset: u64,
        len: u16,
        is_fin: bool,
    },
    MaxData {
        maximum: u64,
    },
    MaxStreamData {
        id: StreamId,
        maximum: u64,
    },
    MaxStreams {
        stream_type: StreamType,
        maximum: StreamNum,
    },
    DataBlocked {
        limit: u64,
    },
    StreamDataBlocked {
        id: StreamId,
        limit: u64,
    },
    StreamsBlocked {
        stream_type: StreamType,
        limit: StreamNum,
    },
    NewConnectionId {
        sequence_number: u64,
        retire_prior_to: u64,
        connection_id: connection::Id,
        stateless_reset_token: StatelessResetToken,
    },
    RetireConnectionId {
        sequence_number: u64,
    },
    PathChallenge {
        data: [u8; 8],
    },
    PathResponse {
        data: [u8; 8],
    },
    ConnectionClose {
        error_code: u64,
        /// `None` for application closes
        frame_type: Option<u64>,
        reason: &'a [u8],
    },
    HandshakeDone,
    Datagram {
        len: u16,
    },
}

impl Frame<'_> {
    /// Returns the qlog name of the frame type
    pub fn name(&self) -> &'static str {
        match self {
            Self::Padding { .. } => "padding",
            Self::Ping => "ping",
            Self::Ack(_) => "ack",
            Self::ResetStream { .. } => "reset_stream",
            Self::StopSending { .. } => "stop_sending",
            Self::Crypto { .. } => "crypto",
            Self::NewToken { .. } => "new_token",
            Self::Stream { .. } => "stream",
            Self::MaxData { .. } => "max_data",
            Self::MaxStreamData { .. } => "max_stream_data",
            Self::MaxStreams { .. } => "max_streams",
            Self::DataBlocked { .. } => "data_blocked",
            Self::StreamDataBlocked { .. } => "stream_data_blocked",
            Self::StreamsBlocked { .. } => "streams_blocked",
            Self::NewConnectionId { .. } => "new_connection_id",
            Self::RetireConnectionId { .. } => "retire_connection_id",
            Self::PathChallenge { .. } => "path_challenge",
            Self::PathResponse { .. } => "path_response",
            Self::ConnectionClose { .. } => "connection_close",
            Self::HandshakeDone => "handshake_done",
            Self::Datagram { .. } => "datagram",
        }
    }

    //= https://www.rfc-editor.org/rfc/rfc9002#section-2
    //# Ack-eliciting frames:  All frames other than ACK, PADDING, and
    //# CONNECTION_CLOSE are considered ack-eliciting.
    #[inline]
    pub fn is_ack_eliciting(&self) -> bool {
        !matches!(
            self,
            Self::Ack(_) | Self::Padding { .. } | Self::ConnectionClose { .. }
        )
    }
}
