mod input;
mod plugin;
mod service;
mod vim;

use self::input::Event;
use self::plugin::{PluginError, PluginId, SystemPlugin, TexMathPlugin};
use self::service::ServiceManager;
pub use self::vim::{Vim, VimError, VimResult};
use parking_lot::Mutex;
use rpc::{RpcClient, RpcError, RpcNotification, RpcRequest, VimMessage};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::io::{BufReader, BufWriter};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;

/// Starts and keep running the server on top of stdio.
pub async fn start(config_err: Option<toml::de::Error>) {
    let (vim_message_sender, vim_message_receiver) = tokio::sync::mpsc::unbounded_channel();

    let rpc_client = Arc::new(RpcClient::new(
        BufReader::new(std::io::stdin()),
        BufWriter::new(std::io::stdout()),
        vim_message_sender,
    ));

    let client = Client::new(Vim::new(rpc_client), config_err);
    client.loop_message(vim_message_receiver).await;
}

/// Bridge between Vim and the plugin sessions.
#[derive(Clone)]
struct Client {
    vim: Vim,
    config_err: Arc<Option<toml::de::Error>>,
    plugin_actions: Arc<Mutex<HashMap<PluginId, Vec<String>>>>,
    service_manager_mutex: Arc<Mutex<ServiceManager>>,
}

impl Client {
    /// Creates a new instance of [`Client`] with the enabled plugins
    /// registered.
    fn new(vim: Vim, config_err: Option<toml::de::Error>) -> Self {
        let mut plugin_actions = HashMap::new();
        let mut service_manager = ServiceManager::default();

        let (plugin_id, actions) =
            service_manager.register_plugin(Box::new(SystemPlugin::new(vim.clone())), None);
        plugin_actions.insert(plugin_id, actions);

        if crate::config::config().plugin.texmath.enable {
            let (plugin_id, actions) =
                service_manager.register_plugin(Box::new(TexMathPlugin::new(vim.clone())), None);
            plugin_actions.insert(plugin_id, actions);
        }

        Self {
            vim,
            config_err: Arc::new(config_err),
            plugin_actions: Arc::new(Mutex::new(plugin_actions)),
            service_manager_mutex: Arc::new(Mutex::new(service_manager)),
        }
    }

    /// Handle the message actively initiated from Vim.
    async fn loop_message(self, mut vim_message_receiver: UnboundedReceiver<VimMessage>) {
        while let Some(vim_message) = vim_message_receiver.recv().await {
            match vim_message {
                VimMessage::Request(request) => self.process_request(request),
                VimMessage::Notification(notification) => self.process_notification(notification),
            }
        }
    }

    fn process_notification(&self, notification: RpcNotification) {
        let client = self.clone();

        tokio::spawn(async move {
            let method = notification.method.clone();
            if let Err(err) = client.do_process_notification(notification).await {
                tracing::error!(?err, method, "Error at processing Vim Notification");
            }
        });
    }

    async fn do_process_notification(
        &self,
        notification: RpcNotification,
    ) -> Result<(), PluginError> {
        match Event::from_notification(notification) {
            Event::Autocmd(autocmd) => {
                self.service_manager_mutex.lock().notify_plugins(autocmd);
            }
            Event::Action(action) => match action.method.as_str() {
                // Answered here, where every registered plugin is known.
                "listPlugins" => {
                    let mut plugin_ids = self
                        .plugin_actions
                        .lock()
                        .keys()
                        .copied()
                        .collect::<Vec<_>>();
                    plugin_ids.sort_unstable();
                    self.vim
                        .echo_info(format!("Available plugins: {plugin_ids:?}"))?;
                }
                method => {
                    // Actions are namespaced as `{plugin}.{action}`, the
                    // un-namespaced ones belong to the system plugin.
                    let plugin_id = method
                        .split_once(types::PLUGIN_ACTION_SEPARATOR)
                        .map(|(plugin_id, _action)| plugin_id.to_string())
                        .unwrap_or_else(|| "system".to_string());

                    self.service_manager_mutex
                        .lock()
                        .notify_plugin_action(&plugin_id, action);
                }
            },
        }

        Ok(())
    }

    fn process_request(&self, request: RpcRequest) {
        let client = self.clone();

        tokio::spawn(async move {
            let id = request.id.clone();

            match client.do_process_request(request).await {
                Ok(Some(result)) => {
                    if let Err(err) = client.vim.send_response(id, Ok(result)) {
                        tracing::debug!(?err, "Failed to send the request result");
                    }
                }
                Ok(None) => {}
                Err(err) => {
                    tracing::error!(?err, "Error at processing Vim request");
                    if let Err(err) = client
                        .vim
                        .send_response(id, Err::<Value, _>(RpcError::Request(err.to_string())))
                    {
                        tracing::debug!(?err, "Failed to send the request error");
                    }
                }
            }
        });
    }

    async fn do_process_request(&self, request: RpcRequest) -> Result<Option<Value>, PluginError> {
        let value = match request.method.as_str() {
            "initialize" => {
                if let Some(err) = self.config_err.as_ref() {
                    self.vim.echo_warn(format!(
                        "Using the default config due to an error in {}: {err}",
                        crate::config::config_file().display()
                    ))?;
                }

                let plugin_actions = self.plugin_actions.lock().clone();
                tracing::debug!("Client initialized successfully");

                Some(json!({ "plugins": plugin_actions }))
            }
            _ => Some(json!({
                "error": format!("Unknown request: {}", request.method)
            })),
        };

        Ok(value)
    }
}
