//! Single-task event loop tying the helper connection to the sessions.
//!
//! Everything that touches the connection or the collaborators happens on
//! the task running [`HelperBridge::run`]. Other parts of the application
//! talk to it by sending [`BridgeEvent`]s through a [`BridgeHandle`].

use crate::connection::{
    ConnectionManager, ConnectionStats, HelperConnector, HelperSpawner, UnixConnector,
};
use crate::dispatch::{DispatchContext, DispatchOutcome, MessageSink, ProtocolDispatcher};
use crate::logging::log_helper_event;
use crate::protocol::OutboundMessage;
use crate::session::{FocusTracker, InputMethodCatalog, SessionId, SessionRegistry};
use std::ops::ControlFlow;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeEvent {
    /// The helper socket has data to read
    Readable,
    /// The helper socket failed while being watched
    Disconnected,
    /// Retry the connection if it is down
    Reconnect,
    FocusIn(SessionId),
    FocusOut(SessionId),
    PropertyListChanged { session: SessionId, payload: String },
    PropertyLabelChanged { session: SessionId, payload: String },
    Shutdown,
}

/// Host application state the bridge reads and drives
#[derive(Clone)]
pub struct Collaborators {
    pub focus: Arc<dyn FocusTracker>,
    pub registry: Arc<dyn SessionRegistry>,
    pub catalog: Arc<dyn InputMethodCatalog>,
}

impl Collaborators {
    pub fn new(
        focus: Arc<dyn FocusTracker>,
        registry: Arc<dyn SessionRegistry>,
        catalog: Arc<dyn InputMethodCatalog>,
    ) -> Self {
        Self {
            focus,
            registry,
            catalog,
        }
    }

    pub fn dispatch_context(&self) -> DispatchContext<'_> {
        DispatchContext {
            focus: self.focus.as_ref(),
            registry: self.registry.as_ref(),
            catalog: self.catalog.as_ref(),
        }
    }
}

/// Cloneable sender side of a running bridge
#[derive(Debug, Clone)]
pub struct BridgeHandle {
    events: UnboundedSender<BridgeEvent>,
}

impl BridgeHandle {
    pub fn new(events: UnboundedSender<BridgeEvent>) -> Self {
        Self { events }
    }

    /// Queue an event; false once the bridge has stopped
    pub fn send(&self, event: BridgeEvent) -> bool {
        self.events.send(event).is_ok()
    }

    pub fn focus_in(&self, session: SessionId) -> bool {
        self.send(BridgeEvent::FocusIn(session))
    }

    pub fn focus_out(&self, session: SessionId) -> bool {
        self.send(BridgeEvent::FocusOut(session))
    }

    pub fn property_list_changed(&self, session: SessionId, payload: String) -> bool {
        self.send(BridgeEvent::PropertyListChanged { session, payload })
    }

    pub fn property_label_changed(&self, session: SessionId, payload: String) -> bool {
        self.send(BridgeEvent::PropertyLabelChanged { session, payload })
    }

    pub fn reconnect(&self) -> bool {
        self.send(BridgeEvent::Reconnect)
    }

    pub fn shutdown(&self) -> bool {
        self.send(BridgeEvent::Shutdown)
    }
}

pub struct HelperBridge<C: HelperConnector> {
    connection: ConnectionManager<C>,
    dispatcher: ProtocolDispatcher,
    collaborators: Collaborators,
    events: UnboundedReceiver<BridgeEvent>,
}

impl HelperBridge<UnixConnector> {
    /// Bridge to the helper daemon listening on `socket_path`
    pub fn unix(
        socket_path: PathBuf,
        spawner: Option<HelperSpawner>,
        collaborators: Collaborators,
    ) -> (Self, BridgeHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let connector = UnixConnector::new(socket_path, &tx).with_spawner(spawner);
        let bridge = Self::new(ConnectionManager::new(connector), collaborators, rx);
        (bridge, BridgeHandle::new(tx))
    }
}

impl<C: HelperConnector> HelperBridge<C> {
    pub fn new(
        connection: ConnectionManager<C>,
        collaborators: Collaborators,
        events: UnboundedReceiver<BridgeEvent>,
    ) -> Self {
        Self {
            connection,
            dispatcher: ProtocolDispatcher::new(),
            collaborators,
            events,
        }
    }

    pub fn connection(&self) -> &ConnectionManager<C> {
        &self.connection
    }

    /// Handle events until `Shutdown` or until every sender is gone
    pub async fn run(mut self) -> ConnectionStats {
        info!("Helper bridge starting");
        self.connection.ensure_connected();

        while let Some(event) = self.events.recv().await {
            if self.handle_event(event).is_break() {
                break;
            }
        }

        info!("Helper bridge stopped");
        self.connection.stats().clone()
    }

    pub fn handle_event(&mut self, event: BridgeEvent) -> ControlFlow<()> {
        debug!("Bridge event: {:?}", event);

        match event {
            BridgeEvent::Readable => {
                self.on_readable();
            }
            BridgeEvent::Disconnected => self.connection.on_disconnect(),
            BridgeEvent::Reconnect => {
                self.connection.ensure_connected();
            }
            BridgeEvent::FocusIn(session) => self.on_focus_in(session),
            BridgeEvent::FocusOut(session) => {
                log_helper_event("focus_out", &session.to_string());
                self.connection.send(&OutboundMessage::FocusOut);
            }
            BridgeEvent::PropertyListChanged { session, payload } => {
                self.dispatcher.push_property_list(
                    self.collaborators.focus.as_ref(),
                    session,
                    payload,
                    &mut self.connection,
                );
            }
            BridgeEvent::PropertyLabelChanged { session, payload } => {
                self.dispatcher.push_property_label(
                    self.collaborators.focus.as_ref(),
                    session,
                    payload,
                    &mut self.connection,
                );
            }
            BridgeEvent::Shutdown => return ControlFlow::Break(()),
        }

        ControlFlow::Continue(())
    }

    /// Drain the connection and dispatch every message in arrival order
    pub fn on_readable(&mut self) -> Vec<DispatchOutcome> {
        let messages = self.connection.on_readable();
        let ctx = self.collaborators.dispatch_context();

        messages
            .iter()
            .map(|message| self.dispatcher.dispatch(&ctx, message, &mut self.connection))
            .collect()
    }

    fn on_focus_in(&mut self, session: SessionId) {
        log_helper_event("focus_in", &session.to_string());
        self.connection.ensure_connected();
        self.collaborators.focus.set_routing_disabled(false);
        self.connection.send(&OutboundMessage::FocusIn);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InputMethodInfo;
    use crate::connection::ConnectionState;
    use crate::protocol::Command;
    use crate::session::{
        ActionLog, InputSession, MemoryFocusTracker, MemoryRegistry, MemorySession,
        SessionAction, StaticCatalog,
    };
    use crate::test_utils::{MemoryPipe, ScriptedConnector};

    struct Fixture {
        focus: Arc<MemoryFocusTracker>,
        sessions: Vec<Arc<MemorySession>>,
        log: ActionLog,
        bridge: HelperBridge<ScriptedConnector>,
        handle: BridgeHandle,
    }

    impl Fixture {
        fn new(connector: ScriptedConnector) -> Self {
            let log = ActionLog::new();
            let focus = Arc::new(MemoryFocusTracker::new());
            let registry = Arc::new(MemoryRegistry::new());
            let sessions: Vec<_> = (1..=2)
                .map(|id| Arc::new(MemorySession::new(SessionId(id), "direct").with_log(log.clone())))
                .collect();
            for session in &sessions {
                registry.add(session.clone());
            }
            let catalog = Arc::new(StaticCatalog::new(vec![
                InputMethodInfo::new("direct", "", "Direct input"),
                InputMethodInfo::new("anthy", "ja", "Japanese"),
            ]));

            let (tx, rx) = mpsc::unbounded_channel();
            let bridge = HelperBridge::new(
                ConnectionManager::new(connector),
                Collaborators::new(focus.clone(), registry, catalog),
                rx,
            );

            Self {
                focus,
                sessions,
                log,
                bridge,
                handle: BridgeHandle::new(tx),
            }
        }

        fn connected() -> (Self, MemoryPipe) {
            let mut fixture = Self::new(ScriptedConnector::new());
            assert!(fixture.bridge.handle_event(BridgeEvent::Reconnect).is_continue());
            let pipe = fixture.bridge.connection().connector().pipe().unwrap();
            (fixture, pipe)
        }

        fn focus(&self, index: usize) {
            self.focus.focus(self.sessions[index].clone());
        }
    }

    #[test]
    fn test_readable_dispatches_messages_in_order() {
        let (mut fixture, pipe) = Fixture::connected();
        fixture.focus(0);
        pipe.push_inbound("im_change_whole_desktop\nanthy\n\nim_list_get\n\ncommit_string\nabc\n\n");

        let outcomes = fixture.bridge.on_readable();

        assert_eq!(
            outcomes,
            vec![
                DispatchOutcome::Handled(Command::ImChangeWholeDesktop),
                DispatchOutcome::Handled(Command::ImListGet),
                DispatchOutcome::Handled(Command::CommitString),
            ]
        );
        // The list reflects the switch made by the first message
        assert_eq!(
            pipe.written(),
            "im_list\ncharset=UTF-8\ndirect\t\tDirect input\t\nanthy\tja\tJapanese\tselected\n\n"
        );
        assert_eq!(fixture.sessions[0].snapshot().committed, vec!["abc"]);
    }

    #[test]
    fn test_focus_in_connects_and_announces() {
        let mut fixture = Fixture::new(ScriptedConnector::new());
        fixture.focus(1);
        fixture.focus.set_routing_disabled(true);

        assert!(fixture.bridge.handle_event(BridgeEvent::FocusIn(SessionId(2))).is_continue());

        assert_eq!(fixture.bridge.connection().state(), ConnectionState::Connected);
        assert!(!fixture.focus.routing_disabled());
        let pipe = fixture.bridge.connection().connector().pipe().unwrap();
        assert_eq!(pipe.written_records(), vec!["focus_in\n"]);
    }

    #[test]
    fn test_focus_in_while_daemon_down_still_enables_routing() {
        let mut fixture = Fixture::new(ScriptedConnector::unreachable());
        fixture.focus(0);
        fixture.focus.set_routing_disabled(true);

        assert!(fixture.bridge.handle_event(BridgeEvent::FocusIn(SessionId(1))).is_continue());

        assert!(!fixture.focus.routing_disabled());
        assert_eq!(fixture.bridge.connection().stats().dropped_sends, 1);
    }

    #[test]
    fn test_focus_out_announces() {
        let (mut fixture, pipe) = Fixture::connected();

        assert!(fixture.bridge.handle_event(BridgeEvent::FocusOut(SessionId(1))).is_continue());

        assert_eq!(pipe.written_records(), vec!["focus_out\n"]);
    }

    #[test]
    fn test_property_changes_forwarded_for_focused_session_only() {
        let (mut fixture, pipe) = Fixture::connected();
        fixture.focus(0);

        let label = BridgeEvent::PropertyLabelChanged {
            session: SessionId(2),
            payload: "ignored\n".to_string(),
        };
        let list = BridgeEvent::PropertyListChanged {
            session: SessionId(1),
            payload: "branch\ta\tb\n".to_string(),
        };
        assert!(fixture.bridge.handle_event(label).is_continue());
        assert!(fixture.bridge.handle_event(list).is_continue());

        assert_eq!(
            pipe.written_records(),
            vec!["prop_list_update\ncharset=UTF-8\nbranch\ta\tb\n"]
        );
    }

    #[test]
    fn test_disconnect_then_reconnect() {
        let (mut fixture, first) = Fixture::connected();

        assert!(fixture.bridge.handle_event(BridgeEvent::Disconnected).is_continue());
        assert_eq!(fixture.bridge.connection().state(), ConnectionState::Disconnected);
        assert!(first.is_dropped());

        assert!(fixture.bridge.handle_event(BridgeEvent::Reconnect).is_continue());
        assert_eq!(fixture.bridge.connection().state(), ConnectionState::Connected);
        assert_eq!(fixture.bridge.connection().connector().connections(), 2);
    }

    #[test]
    fn test_global_commands_apply_without_focus() {
        let (mut fixture, pipe) = Fixture::connected();
        pipe.push_inbound("prop_update_custom\nkey\nvalue\n\ncommit_string\nlost\n\n");

        assert!(fixture.bridge.handle_event(BridgeEvent::Readable).is_continue());

        assert_eq!(
            fixture.log.actions(),
            vec![SessionAction::UpdateCustom {
                session: SessionId(1),
                key: "key".to_string(),
                value: "value".to_string(),
            }]
        );
    }

    #[test]
    fn test_eof_disconnects() {
        let (mut fixture, pipe) = Fixture::connected();
        pipe.close();

        assert!(fixture.bridge.handle_event(BridgeEvent::Readable).is_continue());

        assert_eq!(fixture.bridge.connection().state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_shutdown_breaks() {
        let mut fixture = Fixture::new(ScriptedConnector::new());
        assert!(fixture.bridge.handle_event(BridgeEvent::Shutdown).is_break());
    }

    #[tokio::test]
    async fn test_run_processes_events_until_shutdown() {
        let fixture = Fixture::new(ScriptedConnector::new());
        let connector = fixture.bridge.connection().connector().clone();
        fixture.focus(0);

        assert!(fixture.handle.focus_in(SessionId(1)));
        assert!(fixture.handle.property_label_changed(SessionId(1), "A\n".to_string()));
        assert!(fixture.handle.shutdown());
        assert!(fixture.handle.reconnect());

        let stats = fixture.bridge.run().await;

        assert_eq!(stats.connects, 1);
        assert_eq!(stats.messages_sent, 2);
        assert_eq!(
            connector.pipe().unwrap().written_records(),
            vec!["focus_in\n", "prop_label_update\ncharset=UTF-8\nA\n"]
        );
    }

    #[tokio::test]
    async fn test_run_stops_when_senders_dropped() {
        let Fixture { bridge, handle, .. } = Fixture::new(ScriptedConnector::unreachable());
        drop(handle);

        let stats = bridge.run().await;

        assert_eq!(stats.connect_attempts, 1);
        assert_eq!(stats.connects, 0);
    }

    #[test]
    fn test_handle_reports_stopped_bridge() {
        let Fixture { bridge, handle, .. } = Fixture::new(ScriptedConnector::new());
        drop(bridge);

        assert!(!handle.shutdown());
    }

    #[test]
    fn test_session_switch_visible_through_trait() {
        let (mut fixture, pipe) = Fixture::connected();
        pipe.push_inbound("im_change_whole_desktop\nanthy\n\n");

        assert!(fixture.bridge.handle_event(BridgeEvent::Readable).is_continue());

        assert!(fixture
            .sessions
            .iter()
            .all(|session| session.active_input_method_name() == "anthy"));
    }
}
