//! Event and error sinks.
//!
//! Inbound frames surface as calls on an [`EventSink`], one method per event
//! kind, invoked synchronously from [`Inbound::deliver`](crate::Inbound::deliver)
//! and the [`Client`](crate::Client). Sinks that prefer a single tagged
//! channel can use the [`Event`] enum via the `Vec<Event>` and
//! `mpsc::Sender<Event>` implementations.

use std::sync::mpsc::Sender;

use statlink_frame::{Reply, ServerStats, Timestamp};
use tracing::warn;

use crate::error::{ClientError, IngestError};

/// Receives typed replies and connection lifecycle notifications.
///
/// Every method defaults to doing nothing.
pub trait EventSink {
    /// `GET_TIME` reply.
    fn on_time(&mut self, _time: Timestamp) {}
    /// `GET_SIZE` reply: free bytes on the server.
    fn on_free_size(&mut self, _free: u32) {}
    /// `GET_STAT` reply.
    fn on_stats(&mut self, _stats: &ServerStats) {}
    /// `SET_DATA` reply text.
    fn on_set_data_reply(&mut self, _text: &str) {}
    /// `CLEAR_DATA` acknowledged.
    fn on_cleared(&mut self) {}
    fn on_connected(&mut self) {}
    /// Connect failed, or an open link was reset or broken.
    fn on_connection_error(&mut self, _error: &ClientError) {}
    fn on_disconnected(&mut self) {}
}

impl<S: EventSink + ?Sized> EventSink for &mut S {
    fn on_time(&mut self, time: Timestamp) {
        (**self).on_time(time);
    }
    fn on_free_size(&mut self, free: u32) {
        (**self).on_free_size(free);
    }
    fn on_stats(&mut self, stats: &ServerStats) {
        (**self).on_stats(stats);
    }
    fn on_set_data_reply(&mut self, text: &str) {
        (**self).on_set_data_reply(text);
    }
    fn on_cleared(&mut self) {
        (**self).on_cleared();
    }
    fn on_connected(&mut self) {
        (**self).on_connected();
    }
    fn on_connection_error(&mut self, error: &ClientError) {
        (**self).on_connection_error(error);
    }
    fn on_disconnected(&mut self) {
        (**self).on_disconnected();
    }
}

/// Hand a decoded reply to the matching sink method.
pub fn emit_reply<S: EventSink + ?Sized>(sink: &mut S, reply: Reply) {
    match reply {
        Reply::Time(time) => sink.on_time(time),
        Reply::FreeSize(free) => sink.on_free_size(free),
        Reply::Stats(stats) => sink.on_stats(&stats),
        Reply::SetData(text) => sink.on_set_data_reply(&text),
        Reply::Cleared => sink.on_cleared(),
    }
}

/// Tagged form of every [`EventSink`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Server clock reading.
    Time(Timestamp),
    /// Free storage on the server, in bytes.
    FreeSize(u32),
    /// Server counters.
    Stats(ServerStats),
    /// Server's reply text for `SET_DATA`.
    SetDataReply(String),
    /// Stored data was cleared.
    Cleared,
    /// The connection came up.
    Connected,
    /// Connection failure, rendered for display.
    ConnectionError(String),
    /// The connection went down.
    Disconnected,
}

impl Event {
    /// Whether this event carries a server reply.
    pub fn is_reply(&self) -> bool {
        !matches!(
            self,
            Event::Connected | Event::ConnectionError(_) | Event::Disconnected
        )
    }

    /// The reply carried by this event, if it is one.
    pub fn into_reply(self) -> Option<Reply> {
        match self {
            Event::Time(time) => Some(Reply::Time(time)),
            Event::FreeSize(free) => Some(Reply::FreeSize(free)),
            Event::Stats(stats) => Some(Reply::Stats(stats)),
            Event::SetDataReply(text) => Some(Reply::SetData(text)),
            Event::Cleared => Some(Reply::Cleared),
            Event::Connected | Event::ConnectionError(_) | Event::Disconnected => None,
        }
    }
}

/// Anything that can accept a tagged [`Event`].
trait PushEvent {
    fn push_event(&mut self, event: Event);
}

impl PushEvent for Vec<Event> {
    fn push_event(&mut self, event: Event) {
        self.push(event);
    }
}

impl PushEvent for Sender<Event> {
    fn push_event(&mut self, event: Event) {
        // A dropped receiver means nobody is listening any more.
        let _ = self.send(event);
    }
}

macro_rules! tagged_sink {
    ($ty:ty) => {
        impl EventSink for $ty {
            fn on_time(&mut self, time: Timestamp) {
                self.push_event(Event::Time(time));
            }
            fn on_free_size(&mut self, free: u32) {
                self.push_event(Event::FreeSize(free));
            }
            fn on_stats(&mut self, stats: &ServerStats) {
                self.push_event(Event::Stats(*stats));
            }
            fn on_set_data_reply(&mut self, text: &str) {
                self.push_event(Event::SetDataReply(text.to_owned()));
            }
            fn on_cleared(&mut self) {
                self.push_event(Event::Cleared);
            }
            fn on_connected(&mut self) {
                self.push_event(Event::Connected);
            }
            fn on_connection_error(&mut self, error: &ClientError) {
                self.push_event(Event::ConnectionError(error.to_string()));
            }
            fn on_disconnected(&mut self) {
                self.push_event(Event::Disconnected);
            }
        }
    };
}

tagged_sink!(Vec<Event>);
tagged_sink!(Sender<Event>);

/// Receives non-fatal inbound errors.
pub trait ErrorSink {
    fn report(&mut self, error: &IngestError);
}

impl<S: ErrorSink + ?Sized> ErrorSink for &mut S {
    fn report(&mut self, error: &IngestError) {
        (**self).report(error);
    }
}

/// Collects rendered errors; handy in tests and batch tools.
impl ErrorSink for Vec<String> {
    fn report(&mut self, error: &IngestError) {
        self.push(error.to_string());
    }
}

/// Logs every reported error at `warn`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingErrorSink;

impl ErrorSink for TracingErrorSink {
    fn report(&mut self, error: &IngestError) {
        warn!(error = %error, "inbound stream error");
    }
}
