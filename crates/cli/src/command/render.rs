use crate::app::Args;
use anyhow::{anyhow, Result};
use clap::Parser;
use pixtex_core::formula::{CollectImages, FormulaRenderer, RenderRequest, RenderTarget};
use std::path::PathBuf;

/// Renders math fragments to images without an attached editor.
#[derive(Parser, Debug, Clone)]
pub struct Render {
    /// TeX math source, e.g. `\frac{1}{2}`, rendered as a single fragment.
    #[clap(index = 1)]
    snippet: Option<String>,

    /// Read text containing `$...$` fragments from this file instead.
    #[clap(long)]
    input: Option<PathBuf>,

    /// Raster resolution in dpi.
    #[clap(long, default_value_t = 144)]
    resolution: u32,

    /// Copy the rendered images into this directory.
    #[clap(long)]
    output: Option<PathBuf>,
}

impl Render {
    pub async fn run(&self, args: Args) -> Result<()> {
        let (config, _config_err) =
            pixtex_core::config::load_config_on_startup(args.config_file.clone());

        let text = match (&self.snippet, &self.input) {
            (Some(snippet), None) => format!("${snippet}$"),
            (None, Some(input)) => tokio::fs::read_to_string(input).await?,
            _ => return Err(anyhow!("pass either a snippet or --input <FILE>")),
        };

        let renderer = FormulaRenderer::with_resolution(
            &config.render.process,
            self.resolution,
            config.render.preamble.clone(),
        )?;

        let mut sink = CollectImages::default();
        let outcome = renderer
            .render(
                RenderRequest {
                    text: &text,
                    target: RenderTarget::Whole,
                },
                &mut sink,
            )
            .await?;

        if outcome.rendered == 0 {
            println!("no math fragments found");
            return Ok(());
        }

        if let Some(output_dir) = &self.output {
            tokio::fs::create_dir_all(output_dir).await?;
        }

        for rendered in &sink.rendered {
            let image = match &self.output {
                Some(output_dir) => {
                    let file_name = rendered
                        .image
                        .file_name()
                        .ok_or_else(|| anyhow!("no file name in {}", rendered.image.display()))?;
                    let target = output_dir.join(file_name);
                    tokio::fs::copy(&rendered.image, &target).await?;
                    target
                }
                None => rendered.image.clone(),
            };

            println!(
                "{}: {}",
                &text[rendered.fragment.start..rendered.fragment.end],
                image.display()
            );
        }

        Ok(())
    }
}
