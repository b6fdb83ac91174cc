// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Closed sets of reasons carried by events
//!
//! These are diagnostic data rather than errors. All of them are marked
//! `#[non_exhaustive]`: adding a variant is a versioning concern, so tracers
//! outside this crate must handle unknown variants with a wildcard arm.

use crate::{endpoint, StatelessResetToken};

#[cfg(any(test, feature = "generator"))]
use bolero_generator::prelude::*;

/// The reason a connection was closed
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum CloseReason {
    /// The handshake did not complete in time
    HandshakeTimeout,
    /// The connection was idle for longer than the negotiated idle timeout
    IdleTimeout,
    /// The peer sent a stateless reset
    StatelessReset { token: StatelessResetToken },
    /// None of the versions offered in a Version Negotiation packet are supported
    VersionNegotiation,
    /// The connection was closed with a transport error code
    Transport {
        error_code: u64,
        initiator: endpoint::Location,
    },
    /// The connection was closed by the application
    Application {
        error_code: u64,
        initiator: endpoint::Location,
    },
}

impl CloseReason {
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HandshakeTimeout => "handshake_timeout",
            Self::IdleTimeout => "idle_timeout",
            Self::StatelessReset { .. } => "stateless_reset",
            Self::VersionNegotiation => "version_negotiation",
            Self::Transport { .. } => "transport_error",
            Self::Application { .. } => "application_error",
        }
    }

    /// Returns `true` if the connection timed out rather than being closed explicitly
    #[inline]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::HandshakeTimeout | Self::IdleTimeout)
    }

    /// Returns the endpoint which closed the connection, if an explicit close happened
    #[inline]
    pub fn initiator(&self) -> Option<endpoint::Location> {
        match self {
            Self::Transport { initiator, .. } | Self::Application { initiator, .. } => {
                Some(*initiator)
            }
            Self::StatelessReset { .. } => Some(endpoint::Location::Remote),
            _ => None,
        }
    }
}

/// The reason a packet was dropped
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(any(test, feature = "generator"), derive(TypeGenerator))]
#[non_exhaustive]
pub enum PacketDropReason {
    /// The keys for the packet's encryption level are not available and the
    /// packet could not be buffered
    KeyUnavailable,
    UnknownConnectionId,
    HeaderParseError,
    PayloadDecryptError,
    ProtocolViolation,
    /// The packet was dropped to mitigate a denial-of-service attack
    DosPrevention,
    UnsupportedVersion,
    /// The packet was not expected in the current connection state
    UnexpectedPacket,
    UnexpectedSourceConnectionId,
    UnexpectedVersion,
    Duplicate,
}

impl PacketDropReason {
    #[inline]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::KeyUnavailable => "key_unavailable",
            Self::UnknownConnectionId => "unknown_connection_id",
            Self::HeaderParseError => "header_parse_error",
            Self::PayloadDecryptError => "payload_decrypt_error",
            Self::ProtocolViolation => "protocol_violation",
            Self::DosPrevention => "dos_prevention",
            Self::UnsupportedVersion => "unsupported_version",
            Self::UnexpectedPacket => "unexpected_packet",
            Self::UnexpectedSourceConnectionId => "unexpected_source_connection_id",
            Self::UnexpectedVersion => "unexpected_version",
            Self::Duplicate => "duplicate",
        }
    }
}

//= https://www.rfc-editor.org/rfc/rfc9002#section-6.1
//# Acknowledgment-based loss detection implements the spirit of TCP's Fast
//# Retransmit [RFC5681], Early Retransmit [RFC5827], Forward Acknowledgment
//# [FACK], SACK loss recovery [RFC6675], and RACK-TLP [RFC8985].

/// The loss detection mechanism that declared a packet lost
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(any(test, feature = "generator"), derive(TypeGenerator))]
#[non_exhaustive]
pub enum PacketLossReason {
    /// Enough later packets were acknowledged
    ReorderingThreshold,
    /// The packet was sent too long before an acknowledged packet
    TimeThreshold,
}

impl PacketLossReason {
    #[inline]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ReorderingThreshold => "reordering_threshold",
            Self::TimeThreshold => "time_threshold",
        }
    }
}

/// The kind of loss detection timer
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(any(test, feature = "generator"), derive(TypeGenerator))]
#[non_exhaustive]
pub enum TimerType {
    /// The time threshold timer, armed while waiting for an acknowledgement
    /// that would declare earlier packets lost
    Ack,
    /// The probe timeout
    Pto,
}

impl TimerType {
    #[inline]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ack => "ack",
            Self::Pto => "pto",
        }
    }
}

macro_rules! display_as_str {
    ($($ty:ty),* $(,)?) => {
        $(
            impl core::fmt::Display for $ty {
                fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                    f.write_str(self.as_str())
                }
            }
        )*
    };
}

display_as_str!(CloseReason, PacketDropReason, PacketLossReason, TimerType);
