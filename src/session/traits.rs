use crate::config::InputMethodInfo;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Opaque identity of one input session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// Shared handle to a session owned by the host application
pub type SessionHandle = Arc<dyn InputSession>;

/// One focusable unit of text input state.
///
/// The bridge only drives sessions through this surface; everything about
/// rendering, candidate windows and key translation stays behind it.
#[cfg_attr(test, mockall::automock)]
pub trait InputSession: Send + Sync {
    fn id(&self) -> SessionId;

    fn switch_input_method(&self, name: &str);

    fn commit_text(&self, text: &str);

    /// Re-read the per-session input method configuration
    fn reload_config(&self);

    fn active_input_method_name(&self) -> String;

    fn activate_property(&self, key: &str);

    /// Apply a custom variable pushed by the daemon
    fn update_custom(&self, key: &str, value: &str);

    /// Current property list payload, as pushed in `prop_list_update`
    fn property_list(&self) -> String;

    /// Current property label payload, as pushed in `prop_label_update`
    fn property_label(&self) -> String;
}

/// Read access to the application's focus state
#[cfg_attr(test, mockall::automock)]
pub trait FocusTracker: Send + Sync {
    fn current(&self) -> Option<SessionHandle>;

    /// Whether routing to the focused session is currently suspended
    fn routing_disabled(&self) -> bool;

    fn set_routing_disabled(&self, disabled: bool);
}

/// Ordered collection of the application's live sessions
#[cfg_attr(test, mockall::automock)]
pub trait SessionRegistry: Send + Sync {
    fn all(&self) -> Vec<SessionHandle>;
}

/// Static list of installable input methods
#[cfg_attr(test, mockall::automock)]
pub trait InputMethodCatalog: Send + Sync {
    fn entries(&self) -> Vec<InputMethodInfo>;
}
