use crate::dispatch::routing::{
    Delivery, DispatchContext, DispatchOutcome, IgnoreReason, MessageSink, RoutingContext,
};
use crate::protocol::{Command, InboundMessage, OutboundMessage, Tier};
use crate::session::{FocusTracker, SessionHandle, SessionId};
use tracing::debug;

/// Routes helper messages to sessions and builds replies.
///
/// Holds no state between calls: every decision is taken from the focus
/// tracker and registry lent in the [`DispatchContext`].
#[derive(Debug, Default, Clone, Copy)]
pub struct ProtocolDispatcher;

impl ProtocolDispatcher {
    pub fn new() -> Self {
        Self
    }

    pub fn dispatch(
        &self,
        ctx: &DispatchContext<'_>,
        message: &InboundMessage,
        sink: &mut dyn MessageSink,
    ) -> DispatchOutcome {
        let outcome = self.route(ctx, message, sink);
        debug!(
            keyword = message.keyword_line(),
            "Helper message {}", outcome
        );
        outcome
    }

    fn route(
        &self,
        ctx: &DispatchContext<'_>,
        message: &InboundMessage,
        sink: &mut dyn MessageSink,
    ) -> DispatchOutcome {
        if message.is_empty() {
            return DispatchOutcome::Ignored(IgnoreReason::Empty);
        }

        let Some(command) = message.command() else {
            return DispatchOutcome::Ignored(IgnoreReason::UnknownCommand);
        };

        let focused = ctx.focus.current();
        let routing = RoutingContext::new(focused.is_some(), ctx.focus.routing_disabled());

        match (command.tier(), focused) {
            (Tier::FocusedOnly, Some(session)) if routing.focused_routing_enabled() => {
                self.dispatch_focused(ctx, command, &session, message, sink)
            }
            (Tier::FocusedOnly, _) => DispatchOutcome::Ignored(IgnoreReason::NotFocused),
            (Tier::Always, focused) => {
                self.dispatch_global(ctx, command, focused.as_ref(), message, sink)
            }
        }
    }

    /// Commands that only make sense for the session that has focus
    fn dispatch_focused(
        &self,
        ctx: &DispatchContext<'_>,
        command: Command,
        session: &SessionHandle,
        message: &InboundMessage,
        sink: &mut dyn MessageSink,
    ) -> DispatchOutcome {
        match command {
            Command::PropListGet => {
                self.push_property_list(ctx.focus, session.id(), session.property_list(), sink);
            }
            Command::PropLabelGet => {
                self.push_property_label(ctx.focus, session.id(), session.property_label(), sink);
            }
            Command::PropActivate => {
                let Some(key) = message.line(1) else {
                    return DispatchOutcome::Ignored(IgnoreReason::MissingArgument(command));
                };
                session.activate_property(key);
            }
            Command::ImListGet => {
                self.send_im_list(ctx, sink);
            }
            Command::CommitString => {
                match message.line(1) {
                    Some(text) if !text.is_empty() => session.commit_text(text),
                    _ => return DispatchOutcome::Ignored(IgnoreReason::MissingArgument(command)),
                }
            }
            Command::FocusIn => {
                // Another client took focus. The focused reference itself is
                // kept: some window managers never send the matching focus-in
                // back to us.
                ctx.focus.set_routing_disabled(true);
            }
            Command::ImChangeThisTextAreaOnly
            | Command::ImChangeWholeDesktop
            | Command::ImChangeThisApplicationOnly
            | Command::PropUpdateCustom => {
                return self.dispatch_global(ctx, command, Some(session), message, sink);
            }
        }

        DispatchOutcome::Handled(command)
    }

    /// Commands processed whatever the focus state, so input method
    /// switching keeps working while routing is suspended.
    fn dispatch_global(
        &self,
        ctx: &DispatchContext<'_>,
        command: Command,
        focused: Option<&SessionHandle>,
        message: &InboundMessage,
        sink: &mut dyn MessageSink,
    ) -> DispatchOutcome {
        match command {
            Command::ImChangeThisTextAreaOnly => {
                let Some(name) = message.line(1) else {
                    return DispatchOutcome::Ignored(IgnoreReason::MissingArgument(command));
                };
                let Some(session) = focused else {
                    return DispatchOutcome::Ignored(IgnoreReason::NotFocused);
                };
                session.switch_input_method(name);
                self.push_property_list(ctx.focus, session.id(), session.property_list(), sink);
                session.reload_config();
            }
            Command::ImChangeWholeDesktop => {
                let Some(name) = message.line(1) else {
                    return DispatchOutcome::Ignored(IgnoreReason::MissingArgument(command));
                };
                self.switch_all(ctx, name);
            }
            Command::ImChangeThisApplicationOnly => {
                let Some(name) = message.line(1) else {
                    return DispatchOutcome::Ignored(IgnoreReason::MissingArgument(command));
                };
                if focused.is_none() {
                    return DispatchOutcome::Ignored(IgnoreReason::NotFocused);
                }
                self.switch_all(ctx, name);
            }
            Command::PropUpdateCustom => {
                let (Some(key), Some(value)) = (message.line(1), message.line(2)) else {
                    return DispatchOutcome::Ignored(IgnoreReason::MissingArgument(command));
                };
                // Custom variables are process-global: one session is enough
                if let Some(session) = ctx.registry.all().first() {
                    session.update_custom(key, value);
                }
            }
            Command::PropListGet
            | Command::PropLabelGet
            | Command::PropActivate
            | Command::ImListGet
            | Command::CommitString
            | Command::FocusIn => return DispatchOutcome::Ignored(IgnoreReason::NotFocused),
        }

        DispatchOutcome::Handled(command)
    }

    fn switch_all(&self, ctx: &DispatchContext<'_>, name: &str) {
        for session in ctx.registry.all() {
            session.switch_input_method(name);
            session.reload_config();
        }
    }

    /// Send the catalog with the focused session's input method selected.
    /// Nothing is sent without a focused session.
    pub fn send_im_list(
        &self,
        ctx: &DispatchContext<'_>,
        sink: &mut dyn MessageSink,
    ) -> Option<Delivery> {
        let session = ctx.focus.current()?;
        let active = session.active_input_method_name();
        let message = OutboundMessage::im_list(ctx.catalog.entries(), Some(&active));
        Some(sink.send(&message))
    }

    /// Forward a property list pushed by `origin`, unless it lost focus
    pub fn push_property_list(
        &self,
        focus: &dyn FocusTracker,
        origin: SessionId,
        payload: String,
        sink: &mut dyn MessageSink,
    ) -> Option<Delivery> {
        self.push_if_focused(focus, origin, OutboundMessage::PropListUpdate(payload), sink)
    }

    /// Forward a property label pushed by `origin`, unless it lost focus
    pub fn push_property_label(
        &self,
        focus: &dyn FocusTracker,
        origin: SessionId,
        payload: String,
        sink: &mut dyn MessageSink,
    ) -> Option<Delivery> {
        self.push_if_focused(focus, origin, OutboundMessage::PropLabelUpdate(payload), sink)
    }

    fn push_if_focused(
        &self,
        focus: &dyn FocusTracker,
        origin: SessionId,
        message: OutboundMessage,
        sink: &mut dyn MessageSink,
    ) -> Option<Delivery> {
        let focused = focus.current().map(|session| session.id());
        if focused != Some(origin) {
            debug!(
                origin = %origin,
                "Discarding {} from unfocused session",
                message.command()
            );
            return None;
        }
        Some(sink.send(&message))
    }
}
