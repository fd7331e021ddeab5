mod system;
mod texmath;

use crate::stdio_server::input::{AutocmdEvent, PluginAction};
use crate::stdio_server::vim::VimError;
use std::fmt::Debug;

pub use self::system::System as SystemPlugin;
pub use self::texmath::TexMathPlugin;
pub use types::{Action, ActionType, PixtexAction};

pub type PluginId = &'static str;

#[derive(Debug, thiserror::Error)]
pub enum PluginError {
    #[error(transparent)]
    Vim(#[from] VimError),
    #[error(transparent)]
    Rpc(#[from] rpc::RpcError),
    #[error(transparent)]
    JsonRpc(#[from] rpc::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Render(#[from] crate::formula::RenderError),
    #[error("unhandled autocmd event: {0:?}")]
    UnhandledEvent(types::AutocmdEventType),
}

/// A trait each pixtex plugin must implement.
#[async_trait::async_trait]
pub trait PixtexPlugin: PixtexAction + Debug + Send + Sync + 'static {
    /// Autocmd event types this plugin reacts to.
    fn subscriptions(&self) -> &[types::AutocmdEventType] {
        &[]
    }

    async fn handle_action(&mut self, action: PluginAction) -> Result<(), PluginError>;

    async fn handle_autocmd(&mut self, autocmd: AutocmdEvent) -> Result<(), PluginError>;
}

#[cfg(test)]
mod tests {
    #[derive(pixtex_derive::PixtexPlugin)]
    #[pixtex_plugin(id = "plugin", actions = ["action1", "action2"])]
    struct TestPlugin;

    #[derive(pixtex_derive::PixtexPlugin)]
    #[pixtex_plugin(id = "empty")]
    struct EmptyPlugin;

    #[test]
    fn test_pixtex_plugin_attribute() {}
}
