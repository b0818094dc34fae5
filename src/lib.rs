pub mod config;
pub mod context;
pub mod error;
pub mod forecast;
pub mod output;
pub mod pipeline;
pub mod provider;
pub mod reasoning;
pub mod scenario;
pub mod server;
pub mod staffing;
