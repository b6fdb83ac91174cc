// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::{
    connection,
    crypto::EncryptionLevel,
    packet::{KeyPhaseBit, PacketNumber, PacketType, Version},
    ByteCount,
};

/// A packet header before header protection has been removed
///
/// Only the fields that are readable without packet protection keys are
/// present: the packet number and key phase are still protected.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Header<'a> {
    pub packet_type: PacketType,
    /// `None` for short header packets
    pub version: Option<Version>,
    pub destination_connection_id: connection::Id,
    /// `None` for short header packets
    pub source_connection_id: Option<connection::Id>,
    /// Present on Initial and Retry packets
    pub token: Option<&'a [u8]>,
    /// The value of the long header `Length` field
    pub length: Option<ByteCount>,
}

impl<'a> Header<'a> {
    /// Creates a long header of the given type
    #[inline]
    pub fn long(
        packet_type: PacketType,
        version: Version,
        destination_connection_id: connection::Id,
        source_connection_id: connection::Id,
    ) -> Self {
        debug_assert!(packet_type.is_long_header());
        Self {
            packet_type,
            version: Some(version),
            destination_connection_id,
            source_connection_id: Some(source_connection_id),
            token: None,
            length: None,
        }
    }

    /// Creates a 1-RTT short header
    #[inline]
    pub fn short(destination_connection_id: connection::Id) -> Self {
        Self {
            packet_type: PacketType::OneRtt,
            version: None,
            destination_connection_id,
            source_connection_id: None,
            token: None,
            length: None,
        }
    }

    #[must_use]
    #[inline]
    pub fn with_token(mut self, token: &'a [u8]) -> Self {
        self.token = Some(token);
        self
    }

    #[must_use]
    #[inline]
    pub fn with_length(mut self, length: ByteCount) -> Self {
        self.length = Some(length);
        self
    }

    #[inline]
    pub fn is_long_header(&self) -> bool {
        self.version.is_some()
    }

    #[inline]
    pub fn encryption_level(&self) -> Option<EncryptionLevel> {
        self.packet_type.encryption_level()
    }
}

/// A packet header after header protection has been removed
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExtendedHeader<'a> {
    pub header: Header<'a>,
    pub packet_number: PacketNumber,
    /// The encoded length of the packet number, 1 to 4 bytes
    pub packet_number_len: u8,
    /// Only meaningful for 1-RTT packets
    pub key_phase: KeyPhaseBit,
}

impl<'a> ExtendedHeader<'a> {
    #[inline]
    pub fn new(header: Header<'a>, packet_number: PacketNumber) -> Self {
        Self {
            header,
            packet_number,
            packet_number_len: 4,
            key_phase: KeyPhaseBit::Zero,
        }
    }

    #[must_use]
    #[inline]
    pub fn with_key_phase(mut self, key_phase: KeyPhaseBit) -> Self {
        self.key_phase = key_phase;
        self
    }

    #[inline]
    pub fn packet_type(&self) -> PacketType {
        self.header.packet_type
    }

    #[inline]
    pub fn encryption_level(&self) -> Option<EncryptionLevel> {
        self.header.encryption_level()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_forms() {
        let dcid = connection::Id::from([1u8; 8]);
        let scid = connection::Id::from([2u8; 4]);

        let initial = Header::long(PacketType::Initial, Version::V1, dcid, scid)
            .with_token(b"tok");
        assert!(initial.is_long_header());
        assert_eq!(initial.encryption_level(), Some(EncryptionLevel::Initial));
        assert_eq!(initial.token, Some(&b"tok"[..]));

        let short = Header::short(dcid);
        assert!(!short.is_long_header());
        let extended = ExtendedHeader::new(short, PacketNumber::new(7))
            .with_key_phase(KeyPhaseBit::One);
        assert_eq!(extended.packet_type(), PacketType::OneRtt);
        assert_eq!(extended.encryption_level(), Some(EncryptionLevel::OneRtt));
    }
}
