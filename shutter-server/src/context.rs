use std::sync::Arc;

use axum::extract::FromRef;
use shutter_gallery::Gallery;

use crate::{config::ServerConfig, templates::Templates};

#[derive(Clone, FromRef)]
pub struct ServerContext {
    pub gallery: Arc<Gallery>,
    pub templates: Arc<Templates>,
    pub config: Arc<ServerConfig>,
}
