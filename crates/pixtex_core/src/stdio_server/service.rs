//! Each plugin is driven by its own session actor which processes the plugin
//! events forwarded from the main loop.

use crate::stdio_server::input::{AutocmdEvent, AutocmdEventType, PluginAction, PluginEvent};
use crate::stdio_server::plugin::{PixtexPlugin, PluginId};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio::time::Instant;

#[derive(Debug)]
pub struct PluginSession {
    plugin: Box<dyn PixtexPlugin>,
    plugin_events: UnboundedReceiver<PluginEvent>,
}

impl PluginSession {
    /// Creates a new [`PluginSession`] with the plugin event processing actor
    /// started.
    pub fn create(
        plugin: Box<dyn PixtexPlugin>,
        maybe_event_delay: Option<Duration>,
    ) -> UnboundedSender<PluginEvent> {
        let (plugin_event_sender, plugin_event_receiver) = tokio::sync::mpsc::unbounded_channel();

        let plugin_session = PluginSession {
            plugin,
            plugin_events: plugin_event_receiver,
        };

        if let Some(event_delay) = maybe_event_delay {
            plugin_session.run_with_debounce(event_delay);
        } else {
            plugin_session.run_without_debounce();
        }

        plugin_event_sender
    }

    fn run_without_debounce(mut self) {
        tokio::spawn(async move {
            while let Some(plugin_event) = self.plugin_events.recv().await {
                self.process_event(plugin_event).await;
            }
        });
    }

    fn run_with_debounce(mut self, event_delay: Duration) {
        tokio::spawn(async move {
            // If the debounce timer isn't active, it will be set to expire
            // "never", which is actually just 1 year in the future.
            const NEVER: Duration = Duration::from_secs(365 * 24 * 60 * 60);

            let debounce_timer = tokio::time::sleep(NEVER);
            tokio::pin!(debounce_timer);

            let mut pending_event = None;

            loop {
                tokio::select! {
                    maybe_plugin_event = self.plugin_events.recv() => {
                        match maybe_plugin_event {
                            Some(plugin_event) => {
                                if plugin_event.should_debounce() {
                                    pending_event.replace(plugin_event);
                                    debounce_timer.as_mut().reset(Instant::now() + event_delay);
                                } else {
                                    self.process_event(plugin_event).await;
                                }
                            }
                            None => break, // channel has closed.
                        }
                    }
                    _ = debounce_timer.as_mut(), if pending_event.is_some() => {
                        debounce_timer.as_mut().reset(Instant::now() + NEVER);
                        if let Some(plugin_event) = pending_event.take() {
                            self.process_event(plugin_event).await;
                        }
                    }
                }
            }
        });
    }

    async fn process_event(&mut self, plugin_event: PluginEvent) {
        match plugin_event {
            PluginEvent::Autocmd(autocmd_event) => {
                if let Err(err) = self.plugin.handle_autocmd(autocmd_event).await {
                    tracing::error!(?err, "Failed to process autocmd event");
                }
            }
            PluginEvent::Action(plugin_action) => {
                if let Err(err) = self.plugin.handle_action(plugin_action).await {
                    tracing::error!(?err, "Failed to process plugin action");
                }
            }
        }
    }
}

/// Manages the plugin sessions.
#[derive(Debug, Default)]
pub struct ServiceManager {
    pub plugins: HashMap<PluginId, (Vec<AutocmdEventType>, UnboundedSender<PluginEvent>)>,
}

impl ServiceManager {
    /// Creates a session for `plugin` and returns the plugin id along with
    /// the actions it exposes to Vim.
    pub fn register_plugin(
        &mut self,
        plugin: Box<dyn PixtexPlugin>,
        maybe_debounce: Option<Duration>,
    ) -> (PluginId, Vec<String>) {
        let plugin_id = plugin.id();
        let actions = plugin
            .actions(types::ActionType::Callable)
            .iter()
            .map(|action| action.method.to_string())
            .collect();

        // Default debounce 50ms.
        let debounce = maybe_debounce.unwrap_or(Duration::from_millis(50));

        self.plugins.insert(
            plugin_id,
            (
                plugin.subscriptions().to_vec(),
                PluginSession::create(plugin, Some(debounce)),
            ),
        );

        (plugin_id, actions)
    }

    /// Sends `autocmd` to every plugin subscribed to its event type.
    pub fn notify_plugins(&mut self, autocmd: AutocmdEvent) {
        self.plugins
            .retain(|plugin_id, (subscriptions, plugin_sender)| {
                if subscriptions.contains(&autocmd.0) {
                    if plugin_sender
                        .send(PluginEvent::Autocmd(autocmd.clone()))
                        .is_err()
                    {
                        tracing::error!(plugin_id, "plugin exited");
                        return false;
                    }
                }
                true
            });
    }

    /// Routes `plugin_action` to the plugin registered under `plugin_id`.
    pub fn notify_plugin_action(&mut self, plugin_id: &str, plugin_action: PluginAction) {
        if let Some((_subscriptions, plugin_sender)) = self.plugins.get(plugin_id) {
            if plugin_sender
                .send(PluginEvent::Action(plugin_action))
                .is_err()
            {
                tracing::error!(plugin_id, "plugin exited");
                self.plugins.remove(plugin_id);
            }
        } else {
            tracing::error!(plugin_id, "Found no plugin for the action");
        }
    }
}
