use clap::Parser;
use log::{error, info};
use harbor::configuration::config::CliArgs;
use harbor::controller::Controller;

#[tokio::main]
async fn main() {
    let args = CliArgs::parse();

    let config = match args.into_config() {
        Ok(config) => config,
        Err(e) => {
            // the logger is not configured yet
            eprintln!("Unable to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    // https://docs.rs/env_logger/latest/env_logger/
    // RUST_LOG still overrides the configured level per module
    let mut logger = env_logger::Builder::new();
    if let Ok(level) = config.level_filter() {
        logger.filter_level(level);
    }
    logger.parse_default_env().format_target(false).init();

    println!(
        "
  _                _
 | |__   __ _ _ __| |__   ___  _ __
 | '_ \\ / _` | '__| '_ \\ / _ \\| '__|
 | | | | (_| | |  | |_) | (_) | |
 |_| |_|\\__,_|_|  |_.__/ \\___/|_|
==========================================
   Docker-compatible lifecycle daemon v{}
==========================================
",
        env!("CARGO_PKG_VERSION")
    );

    info!("Configuration loaded, binding {}", config.socket_addr());

    let controller = match Controller::new(config) {
        Ok(controller) => controller,
        Err(e) => {
            error!("Unable to create a controller instance: {}, exiting...", e);
            std::process::exit(1);
        }
    };

    let result = tokio::spawn(async move {
        info!("Spawning the controller");
        controller.run().await
    });

    match result.await {
        Ok(Ok(())) => info!("Exiting"),
        Ok(Err(e)) => {
            error!("Error occured in the controller process: {}, exiting...", e);
            std::process::exit(1);
        }
        Err(e) => {
            error!("Error joining at the end of execution: {:?}", e);
            std::process::exit(1);
        }
    }
}
