pub mod render;
pub mod rpc;
