use std::sync::Arc;

use tokio::net::TcpListener;

use bff_gateway::{logging, router, Gateway, Settings};
use bff_ratelimit::{CoordinationBackend, MemoryBackend, RedisBackend};

#[tokio::main]
async fn main() {
    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(err) => {
            eprintln!("configuration error: {err}");
            std::process::exit(1);
        }
    };

    logging::init(settings.debug);

    // Rate-limit backend failures are never fatal: an unreachable Redis at
    // startup downgrades to in-process bucket state, same as a failure at
    // request time.
    let backend: Arc<dyn CoordinationBackend> = match RedisBackend::connect(&settings.redis_url)
        .await
    {
        Ok(backend) => Arc::new(backend),
        Err(err) => {
            tracing::warn!(error = %err, "redis unreachable at startup, using in-process rate-limit state");
            Arc::new(MemoryBackend::new())
        }
    };

    let addr = format!("{}:{}", settings.api_host, settings.api_port);
    let gateway = Gateway::builder(settings).backend(backend).build();

    let listener = TcpListener::bind(&addr).await.expect("bind error");
    tracing::info!(%addr, "gateway listening");

    axum::serve(listener, router(gateway)).await.expect("server error");
}
