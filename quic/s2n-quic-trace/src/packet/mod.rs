// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::crypto::EncryptionLevel;

#[cfg(any(test, feature = "generator"))]
use bolero_generator::prelude::*;

pub mod header;
pub mod key_phase;
pub mod number;
pub mod version;

pub use header::{ExtendedHeader, Header};
pub use key_phase::{KeyPhase, KeyPhaseBit};
pub use number::{PacketNumber, PacketNumberSpace};
pub use version::Version;

/// The type of a packet, as far as it could be determined
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(any(test, feature = "generator"), derive(TypeGenerator))]
#[non_exhaustive]
pub enum PacketType {
    Initial,
    Handshake,
    Retry,
    ZeroRtt,
    VersionNegotiation,
    OneRtt,
    StatelessReset,
    /// The packet could not be parsed far enough to determine its type
    NotDetermined,
}

impl PacketType {
    /// Returns the encryption level protecting packets of this type
    ///
    /// Retry, Version Negotiation and Stateless Reset packets are not
    /// protected by any packet number space keys.
    #[inline]
    pub fn encryption_level(self) -> Option<EncryptionLevel> {
        match self {
            Self::Initial => Some(EncryptionLevel::Initial),
            Self::Handshake => Some(EncryptionLevel::Handshake),
            Self::ZeroRtt => Some(EncryptionLevel::ZeroRtt),
            Self::OneRtt => Some(EncryptionLevel::OneRtt),
            Self::Retry | Self::VersionNegotiation | Self::StatelessReset | Self::NotDetermined => {
                None
            }
        }
    }

    /// Returns `true` if packets of this type use the long header form
    #[inline]
    pub fn is_long_header(self) -> bool {
        matches!(
            self,
            Self::Initial
                | Self::Handshake
                | Self::Retry
                | Self::ZeroRtt
                | Self::VersionNegotiation
        )
    }

    #[inline]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Initial => "initial",
            Self::Handshake => "handshake",
            Self::Retry => "retry",
            Self::ZeroRtt => "0RTT",
            Self::VersionNegotiation => "version_negotiation",
            Self::OneRtt => "1RTT",
            Self::StatelessReset => "stateless_reset",
            Self::NotDetermined => "unknown",
        }
    }
}

impl From<EncryptionLevel> for PacketType {
    #[inline]
    fn from(level: EncryptionLevel) -> Self {
        match level {
            EncryptionLevel::Initial => Self::Initial,
            EncryptionLevel::Handshake => Self::Handshake,
            EncryptionLevel::ZeroRtt => Self::ZeroRtt,
            EncryptionLevel::OneRtt => Self::OneRtt,
        }
    }
}

impl core::fmt::Display for PacketType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}
