pub mod formula;
pub mod process;
pub mod stdio_server;

pub use pixtex_config as config;
