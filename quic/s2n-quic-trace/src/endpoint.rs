// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

#[cfg(any(test, feature = "generator"))]
use bolero_generator::prelude::*;

/// The role of an endpoint in a connection
///
/// Events which need to tell the two sides of a connection apart, such as keys
/// installed by TLS, carry the role as their "perspective".
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(any(test, feature = "generator"), derive(TypeGenerator))]
pub enum Type {
    Client,
    Server,
}

impl Type {
    #[inline]
    pub fn is_client(self) -> bool {
        matches!(self, Self::Client)
    }

    #[inline]
    pub fn is_server(self) -> bool {
        matches!(self, Self::Server)
    }

    /// Returns the role of the other side of the connection
    #[inline]
    pub fn peer_type(self) -> Self {
        if self.is_client() {
            Self::Server
        } else {
            Self::Client
        }
    }

    /// Returns the lowercase role name used in log file names
    #[inline]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Client => "client",
            Self::Server => "server",
        }
    }
}

impl core::fmt::Display for Type {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which side of the connection an action originated from, relative to the tracer
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(any(test, feature = "generator"), derive(TypeGenerator))]
pub enum Location {
    Local,
    Remote,
}

impl Location {
    #[inline]
    pub fn is_local(self) -> bool {
        matches!(self, Self::Local)
    }

    #[inline]
    pub fn is_remote(self) -> bool {
        matches!(self, Self::Remote)
    }

    /// Returns the location as seen from the peer
    #[inline]
    #[must_use]
    pub fn flip(self) -> Self {
        if self.is_local() {
            Self::Remote
        } else {
            Self::Local
        }
    }
}
