pub mod discovery;
pub mod rest_server;
pub mod server;
