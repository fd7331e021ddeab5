use crate::formula::{
    locate_fragments, AnnotationSink, FormulaRenderer, Fragment, RenderError, RenderRequest,
    RenderTarget, RenderedFragment,
};
use crate::stdio_server::input::{AutocmdEvent, AutocmdEventType, PluginAction};
use crate::stdio_server::plugin::{PixtexPlugin, PluginError};
use crate::stdio_server::vim::{Vim, VimError, VimResult};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::ops::Range;
use AutocmdEventType::BufDelete;

/// Echoed before each fragment's toolchain runs, `%s` is the fragment source.
const PROGRESS_TEMPLATE: &str = "Previewing math %s";

/// Vimscript entry points for placing and clearing annotations.
const PLACE_FUNC: &str = "pixtex#plugin#texmath#place";
const PLACE_SIGNS_FUNC: &str = "pixtex#plugin#texmath#place_signs";
const CLEAR_FUNC: &str = "pixtex#plugin#texmath#clear";

/// Sign group used by the line-anchored fallback.
const SIGN_GROUP: &str = "pixtex_texmath";

/// How the host script expects placement calls, probed once per plugin
/// instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PlacementCall {
    /// `place(bufnr, previews)` scoped to the exact fragment span.
    FragmentScoped,
    /// Older `place_signs(bufnr, previews)` anchored to whole lines.
    LineAnchored,
}

#[derive(Debug, serde::Serialize)]
struct PreviewPlacement {
    lnum: usize,
    col: usize,
    end_lnum: usize,
    /// Exclusive, Vim text-prop convention.
    end_col: usize,
    image: String,
}

#[derive(Debug, serde::Serialize)]
struct SignPlacement {
    lnum: usize,
    image: String,
}

/// Converts a byte offset in `text` to 1-based (lnum, col).
fn offset_to_position(text: &str, offset: usize) -> (usize, usize) {
    let before = &text[..offset];
    let lnum = before.bytes().filter(|b| *b == b'\n').count() + 1;
    let line_start = before.rfind('\n').map(|pos| pos + 1).unwrap_or(0);
    (lnum, offset - line_start + 1)
}

/// Byte range covering the lines `start_lnum..=end_lnum`, 1-based inclusive.
fn linewise_byte_range(text: &str, start_lnum: usize, end_lnum: usize) -> Option<Range<usize>> {
    if start_lnum == 0 || end_lnum < start_lnum {
        return None;
    }

    let mut line_starts = vec![0];
    line_starts.extend(
        text.bytes()
            .enumerate()
            .filter_map(|(offset, b)| (b == b'\n').then_some(offset + 1)),
    );

    let start = *line_starts.get(start_lnum - 1)?;
    let end = line_starts
        .get(end_lnum)
        .map(|next_start| next_start - 1)
        .unwrap_or(text.len());

    Some(start..end)
}

/// The annotation spans the whole `$...$` occurrence, delimiters included.
fn preview_placement(text: &str, rendered: &RenderedFragment) -> PreviewPlacement {
    let Fragment { start, end } = rendered.fragment;
    let (lnum, col) = offset_to_position(text, start - 1);
    let (end_lnum, end_col) = offset_to_position(text, end + 1);

    PreviewPlacement {
        lnum,
        col,
        end_lnum,
        end_col,
        image: rendered.image.display().to_string(),
    }
}

/// Vim raises E117/E118/E119 when a function or its signature is unknown to
/// the running script, e.g. an older pixtex.vim paired with this binary.
fn is_signature_mismatch(err: &VimError) -> bool {
    let msg = err.to_string();
    ["E117", "E118", "E119"].iter().any(|code| msg.contains(code))
}

async fn resolve_placement_call(
    vim: &Vim,
    cached: &mut Option<PlacementCall>,
) -> VimResult<PlacementCall> {
    if let Some(placement_call) = *cached {
        return Ok(placement_call);
    }

    let placement_call = if vim.exists(&format!("*{PLACE_FUNC}")).await? {
        PlacementCall::FragmentScoped
    } else {
        PlacementCall::LineAnchored
    };
    cached.replace(placement_call);

    Ok(placement_call)
}

/// Sink that places every rendered fragment into the buffer as soon as its
/// image exists.
struct EditorSink<'a> {
    vim: &'a Vim,
    bufnr: usize,
    text: &'a str,
    placement_call: &'a mut Option<PlacementCall>,
}

impl EditorSink<'_> {
    async fn place(&mut self, rendered: &RenderedFragment) -> VimResult<()> {
        let placement = preview_placement(self.text, rendered);

        match resolve_placement_call(self.vim, self.placement_call).await? {
            PlacementCall::FragmentScoped => {
                match self
                    .vim
                    .call::<Value>(PLACE_FUNC, json!([self.bufnr, [&placement]]))
                    .await
                {
                    Ok(_) => Ok(()),
                    Err(err) if is_signature_mismatch(&err) => {
                        // The running script predates the fragment-scoped
                        // API, downgrade for the rest of this instance.
                        tracing::warn!(%err, "Falling back to line-anchored placement");
                        self.placement_call.replace(PlacementCall::LineAnchored);
                        self.place_signs(placement).await
                    }
                    Err(err) => Err(err),
                }
            }
            PlacementCall::LineAnchored => self.place_signs(placement).await,
        }
    }

    async fn place_signs(&self, placement: PreviewPlacement) -> VimResult<()> {
        let PreviewPlacement { lnum, image, .. } = placement;
        self.vim
            .call::<Value>(
                PLACE_SIGNS_FUNC,
                json!([self.bufnr, [SignPlacement { lnum, image }]]),
            )
            .await
            .map(|_| ())
    }
}

#[async_trait::async_trait]
impl AnnotationSink for EditorSink<'_> {
    fn fragment_started(&mut self, source: &str) {
        let _ = self.vim.echo_info(PROGRESS_TEMPLATE.replace("%s", source));
    }

    async fn fragment_rendered(&mut self, rendered: RenderedFragment) -> Result<(), RenderError> {
        self.place(&rendered)
            .await
            .map_err(|err| RenderError::Placement(err.to_string()))
    }
}

/// Whole-buffer preview flags keyed by bufnr.
#[derive(Debug, Default)]
struct PreviewFlags(HashMap<usize, bool>);

impl PreviewFlags {
    fn is_active(&self, bufnr: usize) -> bool {
        self.0.get(&bufnr).copied().unwrap_or(false)
    }

    fn activate(&mut self, bufnr: usize) {
        self.0.insert(bufnr, true);
    }

    fn deactivate(&mut self, bufnr: usize) {
        self.0.insert(bufnr, false);
    }

    fn forget(&mut self, bufnr: usize) {
        self.0.remove(&bufnr);
    }
}

#[derive(Debug, pixtex_derive::PixtexPlugin)]
#[pixtex_plugin(id = "texmath", actions = ["preview", "previewRegion", "remove", "toggle"])]
pub struct TexMathPlugin {
    vim: Vim,
    preview_flags: PreviewFlags,
    placement_call: Option<PlacementCall>,
}

impl TexMathPlugin {
    pub fn new(vim: Vim) -> Self {
        Self {
            vim,
            preview_flags: PreviewFlags::default(),
            placement_call: None,
        }
    }

    async fn buffer_text(&self, bufnr: usize) -> VimResult<String> {
        let lines = self.vim.getbufline(bufnr, 1, "$").await?;
        Ok(lines.join("\n"))
    }

    /// Builds a renderer for one call, so that process changes in the config
    /// and font size changes in the editor are picked up without restarting.
    async fn renderer(&self) -> Result<FormulaRenderer, PluginError> {
        let render_config = &crate::config::config().render;
        let font_px = self.vim.font_pixel_height().await?;
        Ok(FormulaRenderer::new(
            &render_config.process,
            font_px,
            render_config.preamble.clone(),
        )?)
    }

    async fn clear_annotations(&mut self, bufnr: usize) -> VimResult<()> {
        match resolve_placement_call(&self.vim, &mut self.placement_call).await? {
            PlacementCall::FragmentScoped => self.vim.exec(CLEAR_FUNC, json!([bufnr])),
            PlacementCall::LineAnchored => self.vim.exec(
                "execute",
                format!("sign unplace * group={SIGN_GROUP} buffer={bufnr}"),
            ),
        }
    }

    async fn preview(&mut self, bufnr: usize) -> Result<(), PluginError> {
        // Stale annotations from an earlier preview would overlap the fresh
        // ones, start from a clean slate.
        self.clear_annotations(bufnr).await?;

        let text = self.buffer_text(bufnr).await?;
        let renderer = self.renderer().await?;

        let mut sink = EditorSink {
            vim: &self.vim,
            bufnr,
            text: &text,
            placement_call: &mut self.placement_call,
        };

        let outcome = renderer
            .render(
                RenderRequest {
                    text: &text,
                    target: RenderTarget::Whole,
                },
                &mut sink,
            )
            .await?;

        self.preview_flags.activate(bufnr);
        tracing::debug!(
            bufnr,
            rendered = outcome.rendered,
            "Whole-buffer preview active"
        );

        Ok(())
    }

    async fn preview_region(
        &mut self,
        bufnr: usize,
        start_lnum: usize,
        end_lnum: usize,
    ) -> Result<(), PluginError> {
        let text = self.buffer_text(bufnr).await?;

        let Some(range) = linewise_byte_range(&text, start_lnum, end_lnum) else {
            return Ok(());
        };

        let fragments: Vec<Fragment> = locate_fragments(&text, range).collect();
        if fragments.is_empty() {
            return Ok(());
        }

        let renderer = self.renderer().await?;

        let mut sink = EditorSink {
            vim: &self.vim,
            bufnr,
            text: &text,
            placement_call: &mut self.placement_call,
        };

        // Additive, the whole-buffer flag is deliberately left alone.
        for fragment in fragments {
            renderer
                .render(
                    RenderRequest {
                        text: &text,
                        target: RenderTarget::Fragment(fragment),
                    },
                    &mut sink,
                )
                .await?;
        }

        Ok(())
    }

    async fn remove(&mut self, bufnr: usize) -> Result<(), PluginError> {
        self.clear_annotations(bufnr).await?;
        self.preview_flags.deactivate(bufnr);
        Ok(())
    }

    async fn toggle(&mut self, bufnr: usize) -> Result<(), PluginError> {
        if self.preview_flags.is_active(bufnr) {
            self.remove(bufnr).await
        } else {
            self.preview(bufnr).await
        }
    }

    /// Render failures are usually the user's to fix, `latex` missing from
    /// `$PATH` for instance, so echo them instead of only logging.
    fn surface_render_error(
        &self,
        bufnr: usize,
        result: Result<(), PluginError>,
    ) -> Result<(), PluginError> {
        match result {
            Err(PluginError::Render(err)) => {
                tracing::error!(?err, bufnr, "Math preview failed");
                self.vim.echo_warn(err.to_string())?;
                Ok(())
            }
            other => other,
        }
    }
}

#[async_trait::async_trait]
impl PixtexPlugin for TexMathPlugin {
    async fn handle_action(&mut self, action: PluginAction) -> Result<(), PluginError> {
        let PluginAction { method, params } = action;

        match self.parse_action(method)? {
            TexmathAction::Preview => {
                let bufnr = self.vim.current_bufnr().await?;
                let result = self.preview(bufnr).await;
                self.surface_render_error(bufnr, result)?;
            }
            TexmathAction::PreviewRegion => {
                let (start_lnum, end_lnum): (usize, usize) = params.parse()?;
                let bufnr = self.vim.current_bufnr().await?;
                let result = self.preview_region(bufnr, start_lnum, end_lnum).await;
                self.surface_render_error(bufnr, result)?;
            }
            TexmathAction::Remove => {
                let bufnr = self.vim.current_bufnr().await?;
                self.remove(bufnr).await?;
            }
            TexmathAction::Toggle => {
                let bufnr = self.vim.current_bufnr().await?;
                let result = self.toggle(bufnr).await;
                self.surface_render_error(bufnr, result)?;
            }
        }

        Ok(())
    }

    #[pixtex_derive::subscriptions]
    async fn handle_autocmd(&mut self, autocmd: AutocmdEvent) -> Result<(), PluginError> {
        let (event_type, params) = autocmd;
        let bufnr = params.parse_bufnr()?;

        match event_type {
            BufDelete => {
                self.preview_flags.forget(bufnr);
            }
            event => return Err(PluginError::UnhandledEvent(event)),
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offset_to_position() {
        let text = "ab\ncd\n$x$";
        assert_eq!(offset_to_position(text, 0), (1, 1));
        assert_eq!(offset_to_position(text, 3), (2, 1));
        assert_eq!(offset_to_position(text, 4), (2, 2));
        assert_eq!(offset_to_position(text, 6), (3, 1));
        assert_eq!(offset_to_position(text, text.len()), (3, 4));
    }

    #[test]
    fn test_linewise_byte_range() {
        let text = "ab\ncd\nef";
        assert_eq!(linewise_byte_range(text, 1, 1), Some(0..2));
        assert_eq!(linewise_byte_range(text, 2, 3), Some(3..8));
        assert_eq!(linewise_byte_range(text, 1, 100), Some(0..8));
        assert_eq!(linewise_byte_range(text, 0, 1), None);
        assert_eq!(linewise_byte_range(text, 3, 2), None);
        assert_eq!(linewise_byte_range(text, 4, 5), None);
    }

    #[test]
    fn test_placement_covers_the_delimiters() {
        let text = "a $x^2$ b\n$y$";
        let fragments: Vec<Fragment> = locate_fragments(text, 0..text.len()).collect();

        let first = preview_placement(
            text,
            &RenderedFragment {
                fragment: fragments[0],
                image: "px-0.png".into(),
            },
        );
        assert_eq!((first.lnum, first.col), (1, 3));
        assert_eq!((first.end_lnum, first.end_col), (1, 8));

        let second = preview_placement(
            text,
            &RenderedFragment {
                fragment: fragments[1],
                image: "px-1.png".into(),
            },
        );
        assert_eq!((second.lnum, second.col), (2, 1));
        assert_eq!((second.end_lnum, second.end_col), (2, 4));
    }

    #[test]
    fn test_preview_flag_round_trip() {
        let mut flags = PreviewFlags::default();
        assert!(!flags.is_active(1));

        flags.activate(1);
        assert!(flags.is_active(1));
        assert!(!flags.is_active(2));

        flags.deactivate(1);
        assert!(!flags.is_active(1));

        flags.activate(1);
        flags.forget(1);
        assert!(!flags.is_active(1));
    }

    #[test]
    fn test_signature_mismatch_detection() {
        let err = VimError::Rpc(rpc::RpcError::Request(
            "Vim rejected the request: Failure { error: Error { message: \
             \"E117: Unknown function: pixtex#plugin#texmath#place\" } }"
                .into(),
        ));
        assert!(is_signature_mismatch(&err));

        let other = VimError::Rpc(rpc::RpcError::Request("E488: Trailing characters".into()));
        assert!(!is_signature_mismatch(&other));

        assert!(!is_signature_mismatch(&VimError::InvalidBuffer));
    }
}
