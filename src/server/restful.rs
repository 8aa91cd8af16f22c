use std::sync::Arc;
use std::time::Duration;

use actix_web::middleware::Logger;
use actix_web::web::{self, Data};
use actix_web::{App, HttpRequest, HttpResponse, HttpServer};
use anyhow::{Context, Result};
use arc_swap::ArcSwap;
use log::{info, warn};
use openssl::ssl::SslAcceptorBuilder;
use sd_notify::NotifyState;

use super::pipeline;
use super::table::RouterTable;

/// State shared by every worker. The routing table is swapped as a whole on
/// reload, in-flight requests finish with the snapshot they loaded.
pub struct ServerState {
    table: ArcSwap<RouterTable>,
    payload_limit: usize,
}

impl ServerState {
    pub fn new(table: RouterTable, payload_limit: usize) -> Self {
        Self {
            table: ArcSwap::from_pointee(table),
            payload_limit,
        }
    }

    pub fn snapshot(&self) -> Arc<RouterTable> {
        self.table.load_full()
    }

    pub fn publish(&self, table: RouterTable) {
        self.table.store(Arc::new(table));
    }

    pub fn payload_limit(&self) -> usize {
        self.payload_limit
    }
}

/// Entry point of every request. Routes are resolved from the table, not
/// registered on the actix `App`, so that a reload can replace them.
pub async fn serve(
    req: HttpRequest,
    payload: web::Payload,
    state: Data<ServerState>,
) -> HttpResponse {
    let table = state.snapshot();
    pipeline::handle(req, payload, &table, state.payload_limit()).await
}

pub struct RestfulServer {
    ssl: Option<SslAcceptorBuilder>,
    state: Arc<ServerState>,

    keep_alive_secs: Option<u64>,
    workers: Option<u64>,

    bind: String,
}

impl RestfulServer {
    pub fn new(bind: String, ssl: Option<SslAcceptorBuilder>, state: Arc<ServerState>) -> Self {
        Self {
            ssl,
            state,
            keep_alive_secs: None,
            workers: None,
            bind,
        }
    }

    pub fn set_keep_alive_secs(&mut self, keep_alive_secs: u64) {
        self.keep_alive_secs = Some(keep_alive_secs);
    }

    pub fn set_workers(&mut self, workers: u64) {
        self.workers = Some(workers);
    }

    pub async fn run(mut self) -> Result<()> {
        let state = self.state.clone();
        let mut srv = HttpServer::new(move || {
            App::new()
                .app_data(Data::from(state.clone()))
                .wrap(Logger::default())
                .default_service(web::to(serve))
        });

        if let Some(ssl) = self.ssl.take() {
            info!("Binding to https://{}", self.bind);
            srv = srv.bind_openssl(&self.bind, ssl).context("bind with ssl")?
        } else {
            warn!("Using HTTP (without SSL). THIS IS DANGEROUS, DO NOT USE IN PRODUCTION");
            info!("Binding to http://{}", self.bind);
            srv = srv.bind(&self.bind).context("bind without ssl")?
        };

        if let Some(keep_alive) = self.keep_alive_secs {
            srv = srv.keep_alive(Duration::from_secs(keep_alive));
        }
        if let Some(workers) = self.workers {
            srv = srv.workers(workers as usize);
        }

        sd_notify::notify(true, &[NotifyState::Ready]).context("notify systemd")?;
        info!("Starting restful server");
        srv.run().await.context("run server")?;

        info!("Server stopped by user");
        Ok(())
    }
}
