use anyhow::Result;
use clap::Parser;
use cstp_app::{
    build_app,
    config::{Cli, Settings},
    logging::init_logging,
    server,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load(&cli)?;
    init_logging(settings.log_format);

    tracing::info!(
        control_url = %settings.control_url,
        storage = %settings.storage,
        storage_failure_policy = %settings.storage_failure_policy,
        "starting CSTP monitoring and control backend"
    );

    let app = build_app(&settings)?;
    server::serve(settings.bind_addr, app).await
}
