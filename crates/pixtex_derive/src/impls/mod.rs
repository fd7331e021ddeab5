pub mod pixtex_plugin;
pub mod subscriptions;
