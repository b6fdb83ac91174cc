// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Defines the QUIC connection ID as seen by a tracer

use core::{convert::TryFrom, fmt};

//= https://www.rfc-editor.org/rfc/rfc9000#section-5.1
//# Each connection possesses a set of connection identifiers, or
//# connection IDs, each of which can identify the connection.

/// The maximum size of a connection ID.
pub const MAX_LEN: usize = 20;

/// An opaque connection ID chosen by one of the endpoints
///
/// Tracers receive connection IDs by value or reference for inspection only;
/// the routing semantics stay with the transport.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Id {
    bytes: [u8; MAX_LEN],
    len: u8,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, displaydoc::Display)]
#[cfg_attr(feature = "thiserror", derive(thiserror::Error))]
pub enum Error {
    /// connection ID exceeds 20 bytes
    InvalidLength,
}

impl Id {
    /// A zero-length connection ID
    pub const EMPTY: Self = Self {
        bytes: [0; MAX_LEN],
        len: 0,
    };

    /// Creates a connection ID from a byte slice.
    ///
    /// Returns `None` if the slice exceeds [`MAX_LEN`].
    #[inline]
    pub fn try_from_bytes(bytes: &[u8]) -> Option<Self> {
        Self::try_from(bytes).ok()
    }

    /// Returns the Connection ID in byte form
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        self.as_ref()
    }

    /// Returns the length of the connection id
    #[inline]
    pub const fn len(&self) -> usize {
        self.len as usize
    }

    /// Returns true if this connection ID is zero-length
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl TryFrom<&[u8]> for Id {
    type Error = Error;

    #[inline]
    fn try_from(slice: &[u8]) -> Result<Self, Self::Error> {
        let len = slice.len();
        if len > MAX_LEN {
            return Err(Error::InvalidLength);
        }
        let mut bytes = [0; MAX_LEN];
        bytes[..len].copy_from_slice(slice);
        Ok(Self {
            bytes,
            len: len as u8,
        })
    }
}

impl<const N: usize> From<[u8; N]> for Id {
    /// Panics at compile time if `N` is larger than [`MAX_LEN`]
    #[inline]
    fn from(value: [u8; N]) -> Self {
        const { assert!(N <= MAX_LEN) };
        let mut bytes = [0; MAX_LEN];
        bytes[..N].copy_from_slice(&value);
        Self {
            bytes,
            len: N as u8,
        }
    }
}

impl AsRef<[u8]> for Id {
    #[inline]
    fn as_ref(&self) -> &[u8] {
        &self.bytes[..self.len as usize]
    }
}

impl fmt::Debug for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Id({self})")
    }
}

/// Formats the ID as lowercase hex, the way qlog files name connections
impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.as_bytes() {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}
