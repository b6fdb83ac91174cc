// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

/// Generates the event payloads, the [`Event`](super::Event) enum and the
/// [`ConnectionTracer`](super::ConnectionTracer) trait from a single list of events
///
/// Every event listed produces:
/// * a payload struct in the `api` module, with a `NAME` constant
/// * a variant of `Event` borrowing that payload
/// * an `on_<event_name>` method on `ConnectionTracer`
/// * forwarding implementations for the tracer combinators
macro_rules! events {
    ($(
        #[event($name_str:literal)]
        #[family($family:ident)]
        $(#[$attrs:meta])*
        struct $name:ident $(<$lt:lifetime>)? {
            $(
                $(#[$field_attrs:meta])*
                pub $field_name:ident : $field_type:ty,
            )*
        }
    )*) => {
        pub mod api {
            use super::*;

            $(
                $(#[$attrs])*
                #[derive(Clone, Copy, Debug, PartialEq)]
                pub struct $name $(<$lt>)? {
                    $(
                        $(#[$field_attrs])*
                        pub $field_name: $field_type,
                    )*
                }

                impl $(<$lt>)? $name $(<$lt>)? {
                    /// The qlog-style name of the event
                    pub const NAME: &'static str = $name_str;
                }
            )*
        }

        /// A single occurrence in the lifetime of a connection
        ///
        /// Each variant borrows its payload from the caller. Tracers must treat the
        /// payload as read-only and copy out anything they want to keep.
        #[derive(Clone, Copy, Debug, PartialEq)]
        #[non_exhaustive]
        pub enum Event<'a> {
            $(
                $(#[$attrs])*
                $name(&'a api::$name $(<$lt>)?),
            )*
        }

        impl Event<'_> {
            /// Every event name, in declaration order
            pub const NAMES: &'static [&'static str] = &[$($name_str,)*];

            /// Returns the qlog-style name of the event
            #[inline]
            pub fn name(&self) -> &'static str {
                match self {
                    $(
                        Self::$name(_) => api::$name::NAME,
                    )*
                }
            }

            /// Returns the family the event belongs to
            #[inline]
            pub fn family(&self) -> Family {
                match self {
                    $(
                        Self::$name(_) => Family::$family,
                    )*
                }
            }
        }

        $(
            impl<'a> From<&'a api::$name $(<$lt>)?> for Event<'a> {
                #[inline]
                fn from(event: &'a api::$name $(<$lt>)?) -> Self {
                    Self::$name(event)
                }
            }
        )*

        /// A sink for the events of exactly one connection
        ///
        /// The connection calls the tracer synchronously, in chronological order,
        /// from the single context processing that connection. The first call is
        /// always `on_connection_started`, the last event is `on_connection_closed`
        /// and [`ConnectionTracer::close`] follows it to release any resources held
        /// by the tracer.
        ///
        /// None of the methods can fail. An implementation that cannot process an
        /// event must drop it rather than affect the connection. Every method should
        /// return promptly; prefer buffering over blocking I/O.
        ///
        /// Events can be delivered either through the `on_*` method for the event or
        /// through [`ConnectionTracer::record`], which dispatches to the same method.
        /// By default, each `on_*` method forwards to [`ConnectionTracer::on_event`],
        /// so implementations that treat all events alike only need to override that.
        /// The combinators forward `on_event` calls to the `on_event` of each
        /// wrapped tracer.
        pub trait ConnectionTracer: 'static + Send {
            /// Called for each event whose `on_*` method was not overridden
            #[inline]
            fn on_event(&mut self, event: Event<'_>) {
                let _ = event;
            }

            $(
                paste::paste! {
                    $(#[$attrs])*
                    #[inline]
                    fn [<on_ $name:snake>](&mut self, event: &api::$name) {
                        self.on_event(Event::$name(event));
                    }
                }
            )*

            /// Delivers a tagged event to the matching `on_*` method
            #[inline]
            fn record(&mut self, event: Event<'_>) {
                match event {
                    $(
                        Event::$name(event) => paste::paste!(self.[<on_ $name:snake>](event)),
                    )*
                }
            }

            /// Called once after the connection is finished with the tracer
            ///
            /// Any file handles, buffers or other resources owned by the tracer must be
            /// released by the time this returns.
            #[inline]
            fn close(&mut self) {}
        }

        /// The unit tracer ignores every event
        impl ConnectionTracer for () {}

        /// ConnectionTracer is implemented for a 2-element tuple to make it easy to
        /// multiplex events to several tracers. Nest tuples for more than two.
        impl<A, B> ConnectionTracer for (A, B)
        where
            A: ConnectionTracer,
            B: ConnectionTracer,
        {
            #[inline]
            fn on_event(&mut self, event: Event<'_>) {
                self.0.on_event(event);
                self.1.on_event(event);
            }

            $(
                paste::paste! {
                    #[inline]
                    fn [<on_ $name:snake>](&mut self, event: &api::$name) {
                        self.0.[<on_ $name:snake>](event);
                        self.1.[<on_ $name:snake>](event);
                    }
                }
            )*

            #[inline]
            fn close(&mut self) {
                self.0.close();
                self.1.close();
            }
        }

        /// An optional tracer, which ignores events when `None`
        impl<T: ConnectionTracer> ConnectionTracer for Option<T> {
            #[inline]
            fn on_event(&mut self, event: Event<'_>) {
                if let Some(tracer) = self {
                    tracer.on_event(event);
                }
            }

            $(
                paste::paste! {
                    #[inline]
                    fn [<on_ $name:snake>](&mut self, event: &api::$name) {
                        if let Some(tracer) = self {
                            tracer.[<on_ $name:snake>](event);
                        }
                    }
                }
            )*

            #[inline]
            fn close(&mut self) {
                if let Some(tracer) = self {
                    tracer.close();
                }
            }
        }

        #[cfg(feature = "alloc")]
        impl<T: ConnectionTracer + ?Sized> ConnectionTracer for alloc::boxed::Box<T> {
            #[inline]
            fn on_event(&mut self, event: Event<'_>) {
                (**self).on_event(event);
            }

            $(
                paste::paste! {
                    #[inline]
                    fn [<on_ $name:snake>](&mut self, event: &api::$name) {
                        (**self).[<on_ $name:snake>](event);
                    }
                }
            )*

            #[inline]
            fn record(&mut self, event: Event<'_>) {
                (**self).record(event);
            }

            #[inline]
            fn close(&mut self) {
                (**self).close();
            }
        }

        /// Fans each event out to every tracer in the list, in order
        #[cfg(feature = "alloc")]
        impl<T: ConnectionTracer> ConnectionTracer for alloc::vec::Vec<T> {
            #[inline]
            fn on_event(&mut self, event: Event<'_>) {
                for tracer in self.iter_mut() {
                    tracer.on_event(event);
                }
            }

            $(
                paste::paste! {
                    #[inline]
                    fn [<on_ $name:snake>](&mut self, event: &api::$name) {
                        for tracer in self.iter_mut() {
                            tracer.[<on_ $name:snake>](event);
                        }
                    }
                }
            )*

            #[inline]
            fn close(&mut self) {
                for tracer in self.iter_mut() {
                    tracer.close();
                }
            }
        }
    };
}
