pub mod config;
pub mod converter;
pub mod deployment;
pub mod error;
pub mod logging;
pub mod proxy;
pub mod server;
pub mod translate;
pub mod transport;

pub use config::{DeploymentConfig, ProxyConfig};
pub use deployment::DeploymentResolver;
pub use error::{ProxyError, Result};
pub use logging::SharedLogger;
pub use proxy::Pipeline;
pub use server::{build_router, AppState};
