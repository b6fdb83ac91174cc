// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::packet::number::PacketNumberSpace;

#[cfg(any(test, feature = "generator"))]
use bolero_generator::prelude::*;

//= https://www.rfc-editor.org/rfc/rfc9001#section-4
//# Data is protected using a number of encryption levels:
//#
//# *  Initial keys
//# *  Early data (0-RTT) keys
//# *  Handshake keys
//# *  Application data (1-RTT) keys

/// The encryption level of a packet or key
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(any(test, feature = "generator"), derive(TypeGenerator))]
pub enum EncryptionLevel {
    Initial,
    Handshake,
    ZeroRtt,
    OneRtt,
}

impl EncryptionLevel {
    pub const ALL: [Self; 4] = [Self::Initial, Self::Handshake, Self::ZeroRtt, Self::OneRtt];

    /// Returns the packet number space used by packets protected at this level
    ///
    /// 0-RTT and 1-RTT packets share the application data space.
    #[inline]
    pub fn packet_number_space(self) -> PacketNumberSpace {
        match self {
            Self::Initial => PacketNumberSpace::Initial,
            Self::Handshake => PacketNumberSpace::Handshake,
            Self::ZeroRtt | Self::OneRtt => PacketNumberSpace::ApplicationData,
        }
    }

    #[inline]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Initial => "Initial",
            Self::Handshake => "Handshake",
            Self::ZeroRtt => "0-RTT",
            Self::OneRtt => "1-RTT",
        }
    }
}

impl core::fmt::Display for EncryptionLevel {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}
