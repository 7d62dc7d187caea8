//! In-memory collaborators.
//!
//! These back the `watch` command, where the bridge runs without a real
//! toolkit behind it, and give the tests something observable to assert on.

use crate::config::InputMethodInfo;
use crate::logging::log_session_event;
use crate::session::traits::{
    FocusTracker, InputMethodCatalog, InputSession, SessionHandle, SessionId, SessionRegistry,
};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A call made on a session, in the order it happened
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionAction {
    SwitchInputMethod { session: SessionId, name: String },
    CommitText { session: SessionId, text: String },
    ReloadConfig { session: SessionId },
    ActivateProperty { session: SessionId, key: String },
    UpdateCustom { session: SessionId, key: String, value: String },
}

/// Action history shared between several sessions
#[derive(Debug, Clone, Default)]
pub struct ActionLog {
    actions: Arc<Mutex<Vec<SessionAction>>>,
}

impl ActionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, action: SessionAction) {
        lock(&self.actions).push(action);
    }

    pub fn actions(&self) -> Vec<SessionAction> {
        lock(&self.actions).clone()
    }

    pub fn clear(&self) {
        lock(&self.actions).clear();
    }
}

/// Observable state of a [`MemorySession`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    pub input_method: String,
    pub committed: Vec<String>,
    pub activated: Vec<String>,
    pub custom: BTreeMap<String, String>,
    pub config_reloads: u32,
}

pub struct MemorySession {
    id: SessionId,
    state: Mutex<SessionState>,
    log: Option<ActionLog>,
}

impl MemorySession {
    pub fn new(id: SessionId, input_method: &str) -> Self {
        Self {
            id,
            state: Mutex::new(SessionState {
                input_method: input_method.to_string(),
                ..SessionState::default()
            }),
            log: None,
        }
    }

    pub fn with_log(mut self, log: ActionLog) -> Self {
        self.log = Some(log);
        self
    }

    pub fn into_handle(self) -> SessionHandle {
        Arc::new(self)
    }

    pub fn snapshot(&self) -> SessionState {
        lock(&self.state).clone()
    }

    fn record(&self, action: SessionAction) {
        log_session_event(&self.id.to_string(), "action", &format!("{action:?}"));
        if let Some(log) = &self.log {
            log.record(action);
        }
    }
}

impl InputSession for MemorySession {
    fn id(&self) -> SessionId {
        self.id
    }

    fn switch_input_method(&self, name: &str) {
        lock(&self.state).input_method = name.to_string();
        self.record(SessionAction::SwitchInputMethod {
            session: self.id,
            name: name.to_string(),
        });
    }

    fn commit_text(&self, text: &str) {
        lock(&self.state).committed.push(text.to_string());
        self.record(SessionAction::CommitText {
            session: self.id,
            text: text.to_string(),
        });
    }

    fn reload_config(&self) {
        lock(&self.state).config_reloads += 1;
        self.record(SessionAction::ReloadConfig { session: self.id });
    }

    fn active_input_method_name(&self) -> String {
        lock(&self.state).input_method.clone()
    }

    fn activate_property(&self, key: &str) {
        lock(&self.state).activated.push(key.to_string());
        self.record(SessionAction::ActivateProperty {
            session: self.id,
            key: key.to_string(),
        });
    }

    fn update_custom(&self, key: &str, value: &str) {
        lock(&self.state)
            .custom
            .insert(key.to_string(), value.to_string());
        self.record(SessionAction::UpdateCustom {
            session: self.id,
            key: key.to_string(),
            value: value.to_string(),
        });
    }

    fn property_list(&self) -> String {
        let name = self.active_input_method_name();
        format!("branch\t{name}\t{name}\n")
    }

    fn property_label(&self) -> String {
        let name = self.active_input_method_name();
        format!("{name}\t{name}\n")
    }
}

#[derive(Default)]
struct FocusState {
    current: Option<SessionHandle>,
    routing_disabled: bool,
}

/// Focus tracker driven explicitly by the host
#[derive(Default)]
pub struct MemoryFocusTracker {
    state: Mutex<FocusState>,
}

impl MemoryFocusTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Focus `session` and resume routing to it
    pub fn focus(&self, session: SessionHandle) {
        let mut state = lock(&self.state);
        state.current = Some(session);
        state.routing_disabled = false;
    }

    pub fn blur(&self) {
        lock(&self.state).current = None;
    }

    pub fn focused_id(&self) -> Option<SessionId> {
        lock(&self.state).current.as_ref().map(|session| session.id())
    }
}

impl FocusTracker for MemoryFocusTracker {
    fn current(&self) -> Option<SessionHandle> {
        lock(&self.state).current.clone()
    }

    fn routing_disabled(&self) -> bool {
        lock(&self.state).routing_disabled
    }

    fn set_routing_disabled(&self, disabled: bool) {
        lock(&self.state).routing_disabled = disabled;
    }
}

#[derive(Default)]
pub struct MemoryRegistry {
    sessions: Mutex<Vec<SessionHandle>>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, session: SessionHandle) {
        lock(&self.sessions).push(session);
    }

    /// Forget a session; returns whether it was registered
    pub fn remove(&self, id: SessionId) -> bool {
        let mut sessions = lock(&self.sessions);
        let before = sessions.len();
        sessions.retain(|session| session.id() != id);
        sessions.len() != before
    }

    pub fn get(&self, id: SessionId) -> Option<SessionHandle> {
        lock(&self.sessions)
            .iter()
            .find(|session| session.id() == id)
            .cloned()
    }

    pub fn len(&self) -> usize {
        lock(&self.sessions).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.sessions).is_empty()
    }
}

impl SessionRegistry for MemoryRegistry {
    fn all(&self) -> Vec<SessionHandle> {
        lock(&self.sessions).clone()
    }
}

#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    entries: Vec<InputMethodInfo>,
}

impl StaticCatalog {
    pub fn new(entries: Vec<InputMethodInfo>) -> Self {
        Self { entries }
    }
}

impl InputMethodCatalog for StaticCatalog {
    fn entries(&self) -> Vec<InputMethodInfo> {
        self.entries.clone()
    }
}
