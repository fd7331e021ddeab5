use crate::stdio_server::input::{AutocmdEvent, PluginAction};
use crate::stdio_server::plugin::{PixtexPlugin, PluginError};
use crate::stdio_server::vim::Vim;

#[derive(Debug, Clone, pixtex_derive::PixtexPlugin)]
#[pixtex_plugin(id = "system", actions = ["openConfig", "listPlugins"])]
pub struct System {
    vim: Vim,
}

impl System {
    pub fn new(vim: Vim) -> Self {
        Self { vim }
    }
}

#[async_trait::async_trait]
impl PixtexPlugin for System {
    async fn handle_autocmd(&mut self, _autocmd: AutocmdEvent) -> Result<(), PluginError> {
        Ok(())
    }

    async fn handle_action(&mut self, action: PluginAction) -> Result<(), PluginError> {
        match self.parse_action(action.method)? {
            SystemAction::OpenConfig => {
                let config_file = crate::config::config_file();
                self.vim
                    .exec("execute", format!("edit {}", config_file.display()))?;
            }
            SystemAction::ListPlugins => {
                // Answered at the server level where every plugin is known.
            }
        }

        Ok(())
    }
}
