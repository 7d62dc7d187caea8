use crate::protocol::{Command, OutboundMessage};
use crate::session::{FocusTracker, InputMethodCatalog, SessionRegistry};
use std::fmt;

/// Focus state sampled once per message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoutingContext {
    pub has_focused_session: bool,
    pub routing_disabled: bool,
}

impl RoutingContext {
    pub fn new(has_focused_session: bool, routing_disabled: bool) -> Self {
        Self {
            has_focused_session,
            routing_disabled,
        }
    }

    /// Whether focused-only commands may reach the focused session
    pub fn focused_routing_enabled(&self) -> bool {
        self.has_focused_session && !self.routing_disabled
    }
}

/// Collaborators lent to the dispatcher for the duration of one call
#[derive(Clone, Copy)]
pub struct DispatchContext<'a> {
    pub focus: &'a dyn FocusTracker,
    pub registry: &'a dyn SessionRegistry,
    pub catalog: &'a dyn InputMethodCatalog,
}

/// What became of a message handed to the sink
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Sent,
    /// Not connected, or the write failed; nothing is queued for later
    Dropped,
}

/// Where outbound replies go
pub trait MessageSink {
    fn send(&mut self, message: &OutboundMessage) -> Delivery;
}

impl MessageSink for Vec<OutboundMessage> {
    fn send(&mut self, message: &OutboundMessage) -> Delivery {
        self.push(message.clone());
        Delivery::Sent
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    Empty,
    UnknownCommand,
    /// Needed a focused session with routing enabled
    NotFocused,
    MissingArgument(Command),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Handled(Command),
    Ignored(IgnoreReason),
}

impl fmt::Display for DispatchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchOutcome::Handled(command) => write!(f, "handled {command}"),
            DispatchOutcome::Ignored(IgnoreReason::Empty) => write!(f, "ignored empty message"),
            DispatchOutcome::Ignored(IgnoreReason::UnknownCommand) => {
                write!(f, "ignored unknown command")
            }
            DispatchOutcome::Ignored(IgnoreReason::NotFocused) => {
                write!(f, "ignored without a routable focused session")
            }
            DispatchOutcome::Ignored(IgnoreReason::MissingArgument(command)) => {
                write!(f, "ignored {command} with missing arguments")
            }
        }
    }
}
