// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Provides an implementation to disable all events

use crate::connection;

/// An endpoint tracer which hands out tracers ignoring every event
///
/// Connections behave identically with this tracer and with any other.
#[derive(Clone, Copy, Debug, Default)]
pub struct Tracer;

impl super::EndpointTracer for Tracer {
    type ConnectionTracer = ();

    #[inline]
    fn tracer_for_server(&mut self, _odcid: &connection::Id) -> Self::ConnectionTracer {}

    #[inline]
    fn tracer_for_client(&mut self, _odcid: &connection::Id) -> Self::ConnectionTracer {}
}
