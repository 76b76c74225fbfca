pub mod catalogue;
pub mod config;
pub mod coordinator;
pub mod credentials;
pub mod error;
pub mod events;
pub mod executor;
pub mod logs;
pub mod manager;
pub mod monitor;
pub mod status;

pub use catalogue::{ConfigValueType, KnownService, TrackedService};
pub use config::ManagerConfig;
pub use coordinator::types::{BatchCancel, ControlAction, OperationResult, PendingAction};
pub use error::{Result, ServiceError};
pub use events::{EventSubscription, ServiceEvent};
pub use manager::ServiceManager;
pub use status::{ServiceMetrics, ServiceState, ServiceStatus};

/**
 * Install env_logger for headless runs
 * RUST_LOG wins; otherwise info for this crate and warn for dependencies
 */
pub fn init_logging() {
    let env = env_logger::Env::default().default_filter_or("warn,app_lib=info,devsvc=info");
    if let Err(e) = env_logger::Builder::from_env(env)
        .format_timestamp_millis()
        .try_init()
    {
        log::warn!("Logger already initialised: {}", e);
    }
}
