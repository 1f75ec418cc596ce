mod albums;
mod auth;
mod config;
mod contact;
mod context;
mod errors;
mod profile;
mod schemas;
mod serialized;
mod templates;

use std::{
    io,
    net::{Ipv6Addr, SocketAddr},
};

use axum::extract::DefaultBodyLimit;
use log::info;
use tokio::net::TcpListener;
use tower_http::services::ServeDir;

pub use auth::{LOGIN_PATH, SESSION_COOKIE};
pub use config::*;
pub use context::ServerContext;
pub use errors::{ServerError, ServerResult};
pub use templates::Templates;
pub use tera::Error as TemplateError;

pub type Router = axum::Router<ServerContext>;

/// Builds the application with all gallery, account, and media routes
pub fn app(context: ServerContext) -> axum::Router {
    let config = context.config.clone();
    let media_mount = config.media_url.trim_end_matches('/');

    Router::new()
        .merge(albums::router())
        .merge(profile::router())
        .merge(contact::router())
        .nest("/accounts", auth::router())
        .nest_service(media_mount, ServeDir::new(&config.media_root))
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .with_state(context)
}

/// Starts the shutter server
pub async fn run_server(context: ServerContext) -> io::Result<()> {
    let addr: SocketAddr = (Ipv6Addr::UNSPECIFIED, context.config.port).into();
    let listener = TcpListener::bind(&addr).await?;

    info!("Listening on {}", addr);
    axum::serve(listener, app(context).into_make_service()).await
}

#[cfg(test)]
mod tests;
