use axum::{
    body::Body, extract::ConnectInfo, http::Request, middleware::{from_fn, Next}, response::Response,
};
use axum_server::tls_rustls::RustlsConfig;
use server::{config, server_state::ServerState, sms_endpoint, twilio::TwilioGateway};
use std::{fs::OpenOptions, net::SocketAddr, sync::Arc};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = config::load_config()?;

    std::fs::create_dir_all(&config.log_dir)?;
    let log_file = config.log_dir.join("server.log");

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_file)?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| format!("{}=trace,omw_session=debug", env!("CARGO_CRATE_NAME")).into())
        )
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(file))
        .init();

    tracing::info!("Starting server...");
    tracing::debug!("Loaded config {:?}", config);

    if !config.twilio.is_complete() {
        tracing::warn!("Twilio credentials are incomplete, every send will fail");
    }

    let server_state = Arc::new(ServerState::new(Arc::new(TwilioGateway::new(&config.twilio))));

    let app = sms_endpoint::router(server_state)
        .layer(from_fn(log_request))
        .into_make_service_with_connect_info::<SocketAddr>();

    match &config.tls {
        Some(tls) => {
            let rustls = RustlsConfig::from_pem_file(&tls.cert_path, &tls.key_path).await?;
            tracing::info!("Listening on https://{}", config.bind_address);
            axum_server::bind_rustls(config.bind_address, rustls)
                .serve(app)
                .await?;
        }
        None => {
            let listener = tokio::net::TcpListener::bind(config.bind_address).await?;
            tracing::info!("Listening on http://{}", listener.local_addr()?);
            axum::serve(listener, app).await?;
        }
    }

    Ok(())
}

async fn log_request(req: Request<Body>, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_owned();

    if let Some(addr) = req.extensions().get::<ConnectInfo<SocketAddr>>() {
        tracing::debug!("{} {} from {}", method, path, addr.ip());
    }

    let response = next.run(req).await;
    tracing::trace!("{} {} -> {}", method, path, response.status());
    response
}
