mod impls;

use proc_macro::TokenStream;
use syn::{parse_macro_input, DeriveInput};

/// Derives the plugin action constants and the action parser.
///
/// ```ignore
/// #[derive(pixtex_derive::PixtexPlugin)]
/// #[pixtex_plugin(id = "texmath", actions = ["preview", "remove"])]
/// struct TexMath;
/// ```
///
/// The actions are namespaced by the plugin id (`texmath.preview`) unless
/// the plugin is `system`, and an action prefixed with `__` is considered
/// as internal, i.e., invisible to users. Aside from the constants, an enum
/// `TexmathAction` covering all the actions and a method `parse_action()`
/// converting the raw method name to this enum are generated.
#[proc_macro_derive(PixtexPlugin, attributes(pixtex_plugin))]
pub fn pixtex_plugin_derive(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    impls::pixtex_plugin::pixtex_plugin_derive_impl(&input)
}

/// Generates an implementation of `subscriptions()` by collecting the
/// autocmd event variants actually handled in `handle_autocmd()`.
#[proc_macro_attribute]
pub fn subscriptions(_args: TokenStream, item: TokenStream) -> TokenStream {
    impls::subscriptions::subscriptions_impl(item)
}
