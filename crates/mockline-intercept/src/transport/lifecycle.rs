use crate::error::LifecycleError;
use serde::Serialize;

/// XHR ready states, in lifecycle order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
#[repr(u8)]
pub enum ReadyState {
    #[default]
    Unsent = 0,
    Opened = 1,
    HeadersReceived = 2,
    Loading = 3,
    Done = 4,
}

impl ReadyState {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// `Opened` is reachable from anywhere (re-opening resets the request);
    /// every other state only follows its predecessor.
    pub fn can_advance_to(self, next: ReadyState) -> bool {
        match next {
            ReadyState::Unsent => false,
            ReadyState::Opened => true,
            _ => next.as_u8() == self.as_u8() + 1,
        }
    }

    pub fn advance_to(self, next: ReadyState) -> Result<ReadyState, LifecycleError> {
        if self.can_advance_to(next) {
            Ok(next)
        } else {
            Err(LifecycleError::InvalidTransition {
                from: self,
                to: next,
            })
        }
    }
}

/// Notifications an XHR instance delivers to its handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum XhrEvent {
    ReadyStateChange,
    Load,
    LoadEnd,
    Error,
}

impl XhrEvent {
    pub fn name(self) -> &'static str {
        match self {
            XhrEvent::ReadyStateChange => "readystatechange",
            XhrEvent::Load => "load",
            XhrEvent::LoadEnd => "loadend",
            XhrEvent::Error => "error",
        }
    }
}
