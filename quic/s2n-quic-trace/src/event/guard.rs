// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use super::ConnectionTracer;
use core::ops::{Deref, DerefMut};

/// Owns a [`ConnectionTracer`] and guarantees [`ConnectionTracer::close`] is
/// called exactly once
///
/// Connections should hold their tracer through a `Guard`. If the connection is
/// dropped without reaching the close path, including while unwinding, the
/// tracer is still closed when the guard goes out of scope.
#[derive(Debug)]
pub struct Guard<T: ConnectionTracer> {
    tracer: T,
    is_closed: bool,
}

impl<T: ConnectionTracer> Guard<T> {
    #[inline]
    pub fn new(tracer: T) -> Self {
        Self {
            tracer,
            is_closed: false,
        }
    }

    /// Closes the tracer if it has not been closed yet
    #[inline]
    pub fn close(&mut self) {
        if !core::mem::replace(&mut self.is_closed, true) {
            self.tracer.close();
        }
    }

    #[inline]
    pub fn is_closed(&self) -> bool {
        self.is_closed
    }
}

impl<T: ConnectionTracer> Deref for Guard<T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        &self.tracer
    }
}

impl<T: ConnectionTracer> DerefMut for Guard<T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut T {
        &mut self.tracer
    }
}

impl<T: ConnectionTracer> Drop for Guard<T> {
    #[inline]
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct CloseCounter(u32);

    impl ConnectionTracer for CloseCounter {
        fn close(&mut self) {
            self.0 += 1;
        }
    }

    #[test]
    fn closes_once() {
        let mut guard = Guard::new(CloseCounter::default());
        guard.close();
        guard.close();
        assert!(guard.is_closed());
        assert_eq!(guard.0, 1);
    }

    #[test]
    fn closes_on_drop() {
        use std::sync::{
            atomic::{AtomicU32, Ordering},
            Arc,
        };

        struct Shared(Arc<AtomicU32>);

        impl ConnectionTracer for Shared {
            fn close(&mut self) {
                self.0.fetch_add(1, Ordering::Relaxed);
            }
        }

        let closes = Arc::new(AtomicU32::new(0));
        drop(Guard::new(Shared(closes.clone())));
        assert_eq!(closes.load(Ordering::Relaxed), 1);

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = Guard::new(Shared(closes.clone()));
            panic!("connection failed");
        }));
        assert!(result.is_err());
        assert_eq!(closes.load(Ordering::Relaxed), 2);
    }
}
