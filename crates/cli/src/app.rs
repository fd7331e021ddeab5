use crate::command;
use anyhow::Result;
use clap::Parser;

#[derive(Parser, Debug)]
pub enum RunCmd {
    /// Start the stdio-based service talking to the editor.
    #[clap(name = "rpc")]
    Rpc(command::rpc::Rpc),
    /// Render the math fragments of a snippet or file without an editor.
    #[clap(name = "render")]
    Render(command::render::Render),
}

/// Pixtex CLI arguments.
#[derive(Parser, Debug)]
pub struct Args {
    /// Enable the logging system.
    #[clap(long)]
    pub log: Option<std::path::PathBuf>,

    /// Specify the path of the config file.
    #[clap(long)]
    pub config_file: Option<std::path::PathBuf>,
}

impl RunCmd {
    pub async fn run(self, args: Args) -> Result<()> {
        match self {
            Self::Render(render) => render.run(args).await,
            Self::Rpc(rpc) => rpc.run(args).await,
        }
    }
}
