#![allow(dead_code)]
use types::{ActionType, AutocmdEventType, PixtexAction};

#[async_trait::async_trait]
trait Plugin {
    fn subscriptions(&self) -> &[AutocmdEventType] {
        &[]
    }

    async fn handle_autocmd(&self, event_type: AutocmdEventType);
}

struct TestSubscriptions;

#[async_trait::async_trait]
impl Plugin for TestSubscriptions {
    #[pixtex_derive::subscriptions]
    async fn handle_autocmd(&self, event_type: AutocmdEventType) {
        use AutocmdEventType::{BufDelete, InsertEnter, TextChanged, TextChangedI};

        match event_type {
            TextChanged | TextChangedI => {}
            BufDelete => {}
            InsertEnter if true => {}
            _unknown => {}
        }
    }
}

struct NoSubscriptions;

#[async_trait::async_trait]
impl Plugin for NoSubscriptions {
    #[pixtex_derive::subscriptions]
    async fn handle_autocmd(&self, _event_type: AutocmdEventType) {}
}

#[test]
fn test_subscriptions_macro() {
    assert_eq!(
        TestSubscriptions.subscriptions(),
        &[
            AutocmdEventType::TextChanged,
            AutocmdEventType::TextChangedI,
            AutocmdEventType::BufDelete,
            AutocmdEventType::InsertEnter
        ]
    );

    assert_eq!(NoSubscriptions.subscriptions(), &[]);
}

#[derive(pixtex_derive::PixtexPlugin)]
#[pixtex_plugin(id = "mathdemo", actions = ["preview", "__probe"])]
struct MathDemo;

#[derive(pixtex_derive::PixtexPlugin)]
#[pixtex_plugin(id = "system", actions = ["listPlugins"])]
struct SystemDemo;

#[test]
fn test_actions_are_namespaced_by_plugin_id() {
    let callable = MathDemo.actions(ActionType::Callable);
    assert_eq!(callable.len(), 1);
    assert_eq!(callable[0].method, "mathdemo.preview");

    let internal = MathDemo.actions(ActionType::Internal);
    assert_eq!(internal.len(), 1);
    assert_eq!(internal[0].method, "mathdemo.__probe");

    assert_eq!(MathDemo.actions(ActionType::All).len(), 2);
}

#[test]
fn test_system_actions_have_no_namespace() {
    let callable = SystemDemo.actions(ActionType::Callable);
    assert_eq!(callable.len(), 1);
    assert_eq!(callable[0].method, "listPlugins");
}
