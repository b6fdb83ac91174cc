// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::endpoint;

#[cfg(any(test, feature = "generator"))]
use bolero_generator::prelude::*;

/// The direction of a stream
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(any(test, feature = "generator"), derive(TypeGenerator))]
pub enum StreamType {
    Bidirectional,
    Unidirectional,
}

impl StreamType {
    #[inline]
    pub fn is_bidirectional(self) -> bool {
        self == Self::Bidirectional
    }

    #[inline]
    pub fn is_unidirectional(self) -> bool {
        self == Self::Unidirectional
    }
}

//= https://www.rfc-editor.org/rfc/rfc9000#section-2.1
//# The least significant bit (0x01) of the stream ID identifies the
//# initiator of the stream.  Client-initiated streams have even-numbered
//# stream IDs (with the bit set to 0), and server-initiated streams have
//# odd-numbered stream IDs (with the bit set to 1).
//#
//# The second least significant bit (0x02) of the stream ID distinguishes
//# between bidirectional streams (with the bit set to 0) and
//# unidirectional streams (with the bit set to 1).

/// A QUIC stream ID
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(any(test, feature = "generator"), derive(TypeGenerator))]
pub struct StreamId(u64);

impl StreamId {
    #[inline]
    pub const fn from_u64(id: u64) -> Self {
        Self(id)
    }

    #[inline]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Returns the endpoint which opened the stream
    #[inline]
    pub fn initiator(self) -> endpoint::Type {
        if self.0 & 0x01 == 0 {
            endpoint::Type::Client
        } else {
            endpoint::Type::Server
        }
    }

    #[inline]
    pub fn stream_type(self) -> StreamType {
        if self.0 & 0x02 == 0 {
            StreamType::Bidirectional
        } else {
            StreamType::Unidirectional
        }
    }

    /// Returns the 1-based number of this stream among the streams of the same
    /// type opened by the same initiator
    #[inline]
    pub fn stream_num(self) -> StreamNum {
        StreamNum((self.0 >> 2) + 1)
    }
}

/// The number of a stream among streams of the same type and initiator
///
/// Stream limits (`MAX_STREAMS`, `STREAMS_BLOCKED`) are expressed as stream
/// numbers. The first stream has number 1.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(any(test, feature = "generator"), derive(TypeGenerator))]
pub struct StreamNum(u64);

impl StreamNum {
    #[inline]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    #[inline]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Returns the stream ID of the stream with this number, or `None` for
    /// stream number 0, which does not identify a stream
    #[inline]
    pub fn stream_id(
        self,
        stream_type: StreamType,
        initiator: endpoint::Type,
    ) -> Option<StreamId> {
        let index = self.0.checked_sub(1)?;
        let mut id = index.checked_mul(4)?;
        if stream_type.is_unidirectional() {
            id |= 0x02;
        }
        if initiator.is_server() {
            id |= 0x01;
        }
        Some(StreamId(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bolero::check;

    #[test]
    fn well_known_ids() {
        let id = StreamId::from_u64(0);
        assert_eq!(id.initiator(), endpoint::Type::Client);
        assert_eq!(id.stream_type(), StreamType::Bidirectional);
        assert_eq!(id.stream_num(), StreamNum::new(1));

        let id = StreamId::from_u64(7);
        assert_eq!(id.initiator(), endpoint::Type::Server);
        assert_eq!(id.stream_type(), StreamType::Unidirectional);
        assert_eq!(id.stream_num(), StreamNum::new(2));

        assert_eq!(
            StreamNum::new(0).stream_id(StreamType::Bidirectional, endpoint::Type::Client),
            None
        );
    }

    #[test]
    #[cfg_attr(miri, ignore)]
    fn stream_num_round_trip() {
        check!().with_type::<u32>().cloned().for_each(|id| {
            let id = StreamId::from_u64(id as u64);
            let num = id.stream_num();
            assert_eq!(num.stream_id(id.stream_type(), id.initiator()), Some(id));
        });
    }
}
