pub mod config;
pub mod pki;
pub mod server;
pub mod storage;
pub mod telemetry;
pub mod tidy;
