use rpc::{Params, RpcNotification};
pub use types::AutocmdEventType;

/// Event of an autocmd annotated with the params from Vim, which at least
/// carry the bufnr the event happened in.
pub type AutocmdEvent = (AutocmdEventType, Params);

/// A plugin action initiated from Vim, `method` in its namespaced form.
#[derive(Debug, Clone)]
pub struct PluginAction {
    pub method: String,
    pub params: Params,
}

impl From<RpcNotification> for PluginAction {
    fn from(notification: RpcNotification) -> Self {
        Self {
            method: notification.method,
            params: notification.params,
        }
    }
}

/// Event handled by a plugin session.
#[derive(Debug, Clone)]
pub enum PluginEvent {
    Autocmd(AutocmdEvent),
    Action(PluginAction),
}

impl PluginEvent {
    /// Actions are deliberate and processed immediately, only the chatty
    /// autocmds are worth debouncing.
    pub fn should_debounce(&self) -> bool {
        match self {
            Self::Autocmd((event_type, _params)) => matches!(
                event_type,
                AutocmdEventType::CursorMoved
                    | AutocmdEventType::TextChanged
                    | AutocmdEventType::TextChangedI
            ),
            Self::Action(_) => false,
        }
    }
}

/// Notification message from Vim classified for dispatch.
#[derive(Debug)]
pub enum Event {
    Autocmd(AutocmdEvent),
    Action(PluginAction),
}

impl Event {
    /// Converts `notification` into an server event.
    pub fn from_notification(notification: RpcNotification) -> Self {
        match AutocmdEventType::parse(&notification.method) {
            Some(event_type) => Self::Autocmd((event_type, notification.params)),
            None => Self::Action(notification.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rpc::RpcNotification;

    #[test]
    fn test_autocmds_are_split_from_actions() {
        let autocmd = RpcNotification {
            method: "BufDelete".into(),
            params: Params::None,
        };
        assert!(matches!(
            Event::from_notification(autocmd),
            Event::Autocmd((AutocmdEventType::BufDelete, _))
        ));

        let action = RpcNotification {
            method: "texmath.preview".into(),
            params: Params::None,
        };
        match Event::from_notification(action) {
            Event::Action(action) => assert_eq!(action.method, "texmath.preview"),
            event => panic!("expected an action, got {event:?}"),
        }
    }

    #[test]
    fn test_only_chatty_autocmds_debounce() {
        let event = |event_type| PluginEvent::Autocmd((event_type, Params::None));

        assert!(event(AutocmdEventType::CursorMoved).should_debounce());
        assert!(event(AutocmdEventType::TextChangedI).should_debounce());
        assert!(!event(AutocmdEventType::BufDelete).should_debounce());

        assert!(!PluginEvent::Action(PluginAction {
            method: "texmath.preview".into(),
            params: Params::None,
        })
        .should_debounce());
    }
}
