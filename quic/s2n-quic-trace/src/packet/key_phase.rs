// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

#[cfg(any(test, feature = "generator"))]
use bolero_generator::prelude::*;

//= https://www.rfc-editor.org/rfc/rfc9001#section-6
//# The Key Phase bit indicates which packet protection keys are used to
//# protect the packet.  The Key Phase bit is initially set to 0 for the
//# first set of 1-RTT packets and toggled to signal each subsequent key
//# update.

/// The value of the key phase bit carried in a short header
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(any(test, feature = "generator"), derive(TypeGenerator))]
pub enum KeyPhaseBit {
    #[default]
    Zero,
    One,
}

impl KeyPhaseBit {
    #[must_use]
    #[inline]
    pub fn next_phase(self) -> Self {
        match self {
            Self::Zero => Self::One,
            Self::One => Self::Zero,
        }
    }
}

/// The generation of the 1-RTT keys
///
/// Unlike the [`KeyPhaseBit`], which wraps after every other update, the
/// generation counts every key update over the lifetime of the connection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(any(test, feature = "generator"), derive(TypeGenerator))]
pub struct KeyPhase(u64);

impl KeyPhase {
    #[inline]
    pub const fn new(generation: u64) -> Self {
        Self(generation)
    }

    #[inline]
    pub const fn generation(self) -> u64 {
        self.0
    }

    /// Returns the key phase bit used on the wire for this generation
    #[inline]
    pub fn bit(self) -> KeyPhaseBit {
        if self.0 % 2 == 0 {
            KeyPhaseBit::Zero
        } else {
            KeyPhaseBit::One
        }
    }

    #[must_use]
    #[inline]
    pub fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}
