use clap::Parser;
use cli::{Args, RunCmd};

#[derive(Parser, Debug)]
pub enum Cmd {
    /// Display the current version.
    #[clap(name = "version")]
    Version,

    /// Run the pixtex backend.
    #[clap(flatten)]
    Run(RunCmd),
}

#[derive(Parser, Debug)]
#[clap(name = "pixtex", disable_version_flag = true)]
pub struct Pixtex {
    #[clap(flatten)]
    pub args: Args,

    #[clap(subcommand)]
    pub cmd: Cmd,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    match Pixtex::parse() {
        Pixtex {
            cmd: Cmd::Version, ..
        } => {
            println!("version {}", env!("CARGO_PKG_VERSION"));
        }
        Pixtex {
            cmd: Cmd::Run(run_cmd),
            args,
        } => {
            if let Err(e) = run_cmd.run(args).await {
                eprintln!("error: {e:?}");
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
