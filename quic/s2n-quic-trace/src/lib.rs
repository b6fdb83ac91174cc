// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Connection event tracing for QUIC endpoints
//!
//! An endpoint owns a single [`event::EndpointTracer`] which produces one
//! [`event::ConnectionTracer`] for each connection it accepts or initiates. The
//! connection then reports every lifecycle event (packets, loss recovery, key
//! updates, timers and closure) to that tracer, synchronously and in order.
//!
//! Tracing is strictly observational: none of the tracer methods can fail or
//! influence the connection.

#![cfg_attr(not(any(test, feature = "std")), no_std)]

#[cfg(feature = "alloc")]
extern crate alloc;

pub mod connection;
pub mod crypto;
pub mod endpoint;
pub mod event;
pub mod frame;
pub mod packet;
pub mod recovery;
pub mod stream;
pub mod time;
pub mod transport;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

/// A count of bytes
pub type ByteCount = u64;

/// The token carried by a stateless reset
pub type StatelessResetToken = [u8; 16];
