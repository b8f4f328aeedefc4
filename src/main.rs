use anyhow::Context;
use dotenvy::dotenv;
use llama_chat::api;
use llama_chat::config::Config;
use llama_chat::model::llama::LlamaBackend;
use llama_chat::model::{SamplingParams, CONTEXT_LENGTH};
use llama_chat::validate::Validator;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{fmt, EnvFilter};


#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
dotenv().ok();
let cfg = <Config as clap::Parser>::parse();


// logs
let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
fmt().with_env_filter(filter).init();


// cheap checks first, the model load can take minutes
let validator = Arc::new(Validator::chat_request()?);


// the service is useless without a model: fail before binding anything
let n_threads = cfg.thread_count();
let backend = match LlamaBackend::new(cfg.model_path.clone().into(), CONTEXT_LENGTH, n_threads, cfg.n_gpu_layers) {
Ok(b) => b,
Err(e) => {
tracing::error!(error = ?e, path = %cfg.model_path, "failed to load model");
std::process::exit(1);
}
};
tracing::info!(n_threads, "model ready");


if let Some(addr) = &cfg.metrics_addr {
let addr: SocketAddr = addr.parse().context("parse METRICS_ADDR")?;
PrometheusBuilder::new().with_http_listener(addr).install().context("install metrics exporter")?;
tracing::info!(%addr, "metrics exporter listening");
}


let app = api::routes(backend, validator, SamplingParams::default());
let addr: SocketAddr = cfg.bind_addr.parse().context("parse BIND_ADDR")?;


tracing::info!(%addr, "listening");
axum::serve(tokio::net::TcpListener::bind(addr).await?, app)
.with_graceful_shutdown(shutdown_signal())
.await?;
Ok(())
}


async fn shutdown_signal() {
if let Err(e) = tokio::signal::ctrl_c().await {
tracing::error!(error = %e, "ctrl-c handler failed");
std::future::pending::<()>().await;
}
tracing::info!("shutting down");
}
