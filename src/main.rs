// Headless runner: prints every service event as one JSON line until Ctrl-C

use app_lib::config;
use app_lib::{Result, ServiceManager};

#[tokio::main]
async fn main() {
    app_lib::init_logging();

    if let Err(e) = run().await {
        log::error!("{}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let data_dir = config::data_dir();
    let manager_config = config::load_config(&data_dir)?;
    let manager = ServiceManager::open(&data_dir, manager_config)?;
    if !config::config_path(&data_dir).exists() {
        // First run: leave an editable copy of the defaults
        manager.save_config()?;
    }

    for service in manager.list_tracked() {
        log::info!(
            "Tracking {} ({}, {})",
            service.display_name,
            service.category,
            if service.enabled { "enabled" } else { "disabled" }
        );
    }

    let mut events = manager.subscribe_events();
    manager.start_monitor();

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(event) => println!("{}", serde_json::to_string(&event)?),
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                log::info!("Ctrl-C received");
                break;
            }
        }
    }

    manager.shutdown().await;
    Ok(())
}
