use std::process;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use bucketsite::config::PathSet;
use bucketsite::server::config::Config;
use bucketsite::server::factory::ServerFactory;
use bucketsite::server::reload::ConfigWatcher;
use bucketsite::server::restful::ServerState;
use clap::Parser;
use log::{error, info};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct ServerArgs {
    /// Path to the configuration file.
    #[arg(long, short, default_value = "/etc/bucketsite/config.toml")]
    pub config: String,

    /// Override the log level of the configuration file.
    #[arg(long)]
    pub log_level: Option<String>,

    /// Print server configuration data (JSON) and exit.
    #[arg(long)]
    pub print_config: bool,
}

async fn run(args: ServerArgs) -> Result<()> {
    let ps = PathSet::new(&args.config);
    let mut cfg: Config = ps.load_config()?;

    if args.print_config {
        println!("{}", serde_json::to_string_pretty(&cfg)?);
        return Ok(());
    }

    if let Some(level) = args.log_level {
        cfg.logs.level = level;
    }
    cfg.logs.init()?;

    let factory = ServerFactory::new(&cfg);
    let table = factory.build_table().context("build routing table")?;
    let state = Arc::new(ServerState::new(table, cfg.server.payload_limit_bytes()));
    let server = factory.build_server(state.clone())?;

    if cfg.server.reload_interval_secs > 0 {
        let interval = Duration::from_secs(cfg.server.reload_interval_secs);
        let mut watcher = ConfigWatcher::new(ps, interval);
        watcher.add_on_change_hook(move |cfg| {
            let table = ServerFactory::new(cfg)
                .build_table()
                .context("rebuild routing table")?;
            state.publish(table);
            Ok(())
        });
        tokio::spawn(watcher.run());
    }

    server.run().await.context("run restful server")?;

    info!("Server exited by user");
    Ok(())
}

#[tokio::main]
async fn main() {
    let args = ServerArgs::parse();
    if let Err(e) = run(args).await {
        error!("Error: {:#}", e);
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}
