// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

#[cfg(any(test, feature = "generator"))]
use bolero_generator::prelude::*;

/// Contains all of the available packet spaces for QUIC packets
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(any(test, feature = "generator"), derive(TypeGenerator))]
pub enum PacketNumberSpace {
    #[default]
    Initial,
    Handshake,
    ApplicationData,
}

impl PacketNumberSpace {
    /// Returns `true` if the `PacketNumberSpace` is set to `Initial`
    #[inline]
    pub fn is_initial(self) -> bool {
        matches!(self, Self::Initial)
    }

    /// Returns `true` if the `PacketNumberSpace` is set to `Handshake`
    #[inline]
    pub fn is_handshake(self) -> bool {
        matches!(self, Self::Handshake)
    }

    /// Returns `true` if the `PacketNumberSpace` is set to `ApplicationData`
    #[inline]
    pub fn is_application_data(self) -> bool {
        matches!(self, Self::ApplicationData)
    }
}

/// A packet number, only meaningful within its packet number space
///
/// Packet numbers from different spaces are numbered independently, so two
/// `PacketNumber`s should only be compared when they belong to the same space.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(any(test, feature = "generator"), derive(TypeGenerator))]
pub struct PacketNumber(u64);

impl PacketNumber {
    //= https://www.rfc-editor.org/rfc/rfc9000#section-12.3
    //# A QUIC endpoint MUST NOT reuse a packet number within the same packet
    //# number space in one connection.  If the packet number for sending
    //# reaches 2^62 - 1, the sender MUST close the connection without
    //# sending a CONNECTION_CLOSE frame or any further packets
    pub const MAX: Self = Self((1 << 62) - 1);

    #[inline]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    #[inline]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Returns the following packet number, or `None` if the space is exhausted
    #[inline]
    pub fn next(self) -> Option<Self> {
        if self >= Self::MAX {
            None
        } else {
            Some(Self(self.0 + 1))
        }
    }
}

impl From<u64> for PacketNumber {
    #[inline]
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl core::fmt::Display for PacketNumber {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        self.0.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_stops_at_max() {
        assert_eq!(PacketNumber::new(0).next(), Some(PacketNumber::new(1)));
        assert_eq!(PacketNumber::MAX.next(), None);
    }
}
