// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Utilities for testing tracers against realistic event streams

pub mod connection;

pub use connection::{Close, Outcome, Script};
