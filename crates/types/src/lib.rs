/// Separator for non-system plugin actions, `texmath.preview`.
pub const PLUGIN_ACTION_SEPARATOR: char = '.';

/// Plugin interfaces to users.
pub trait PixtexAction {
    fn id(&self) -> &'static str;

    fn actions(&self, _action_type: ActionType) -> &[Action] {
        &[]
    }
}

#[derive(Debug, Clone)]
pub enum ActionType {
    /// Actions that users can interact with.
    Callable,
    /// Internal actions.
    Internal,
    /// All actions.
    All,
}

#[derive(Debug, Clone)]
pub struct Action {
    /// Type of this action.
    pub ty: ActionType,
    /// method used in JSONRPC request for this action.
    pub method: &'static str,
}

impl Action {
    /// Constructs a callable action with specified method.
    pub const fn callable(method: &'static str) -> Self {
        Self {
            ty: ActionType::Callable,
            method,
        }
    }

    /// Constructs an internal action with specified method.
    pub const fn internal(method: &'static str) -> Self {
        Self {
            ty: ActionType::Internal,
            method,
        }
    }
}

/// Small macro for defining an Enum with `variants()` method.
macro_rules! event_enum_with_variants {
    (
      $enum_name:ident {
        $( $variant:ident, )*
      }
    ) => {
          /// Represents an autocmd event forwarded by the Vim side.
          #[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Hash)]
          pub enum $enum_name {
              $( $variant, )*
          }

          impl $enum_name {
              /// Returns the list of all variants in string literal.
              pub fn variants() -> &'static [&'static str] {
                  &[ $( stringify!($variant), )* ]
              }

              pub fn parse(autocmd: &str) -> Option<Self> {
                  match autocmd {
                      $( stringify!($variant) => Some(Self::$variant), )*
                      _ => None
                  }
              }
          }
    };
}

event_enum_with_variants!(AutocmdEventType {
    CursorMoved,
    InsertEnter,
    BufEnter,
    BufLeave,
    BufDelete,
    BufWritePost,
    TextChanged,
    TextChangedI,
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_known_autocmd_events() {
        assert_eq!(
            AutocmdEventType::parse("BufDelete"),
            Some(AutocmdEventType::BufDelete)
        );
        assert_eq!(AutocmdEventType::parse("BufUnload"), None);
        assert!(AutocmdEventType::variants().contains(&"BufWritePost"));
    }
}
