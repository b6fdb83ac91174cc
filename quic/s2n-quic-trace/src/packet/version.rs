// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use core::fmt;

#[cfg(any(test, feature = "generator"))]
use bolero_generator::prelude::*;

/// A QUIC version number
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(any(test, feature = "generator"), derive(TypeGenerator))]
pub struct Version(u32);

impl Version {
    /// The version of the original RFC 9000
    pub const V1: Self = Self(0x0000_0001);
    /// Version 2, as defined by RFC 9369
    pub const V2: Self = Self(0x6b33_43cf);
    pub const DRAFT_29: Self = Self(0xff00_001d);

    #[inline]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    #[inline]
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    //= https://www.rfc-editor.org/rfc/rfc9000#section-15
    //# Versions that follow the pattern 0x?a?a?a?a are reserved for use in
    //# forcing version negotiation to be exercised
    #[inline]
    pub const fn is_reserved(self) -> bool {
        self.0 & 0x0f0f_0f0f == 0x0a0a_0a0a
    }
}

impl From<u32> for Version {
    #[inline]
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl fmt::Debug for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Version({self})")
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}
