use jira_sprint_health_rust::collector::run_data_collector;
use jira_sprint_health_rust::config::Config;
use jira_sprint_health_rust::hierarchy::HierarchyBuilder;
use jira_sprint_health_rust::jira_client::JiraClient;
use jira_sprint_health_rust::routes::{router, AppState};
use std::sync::Arc;
use tokio::sync::RwLock;

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run().await {
        log::error!("{}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env()?;
    let client = JiraClient::new(&config.base_url, &config.token)?;

    match client.get_myself().await {
        Ok(user) => log::info!("Authenticated as {}", user.label().unwrap_or("unknown user")),
        Err(e) => log::warn!("Could not verify credentials: {}", e),
    }

    let state = AppState {
        snapshot: Arc::new(RwLock::new(None)),
    };

    let builder = HierarchyBuilder::new(Arc::new(client), config.build_options());
    tokio::spawn(run_data_collector(
        builder,
        config.selection.clone(),
        config.refresh_interval,
        Arc::clone(&state.snapshot),
    ));

    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    log::info!("Serving report on {}", config.bind_address);
    axum::serve(listener, router(state)).await?;
    Ok(())
}
