use std::{future::Future, sync::Arc};

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;

mod config;
pub use config::{
    Credential, DEFAULT_IMAGE_SIZE, DEFAULT_PORT, DEFAULT_UPSTREAM_URL, GatewayConfig,
    load_env_file,
};

pub mod upstream_api;
use upstream_api::{UpstreamReply, UpstreamRequest};

pub const GENERATE_IMAGE_PATH: &str = "/generate-image";
pub const NO_IMAGE_URL_MSG: &str = "No image URL returned.";
pub const GENERATION_FAILED_MSG: &str = "Image generation failed.";

/// What the caller posts. Fields are kept opaque, the upstream validates them.
#[derive(Debug, Default, Deserialize)]
pub struct IncomingRequest {
    #[serde(default)]
    pub prompt: Option<Value>,
    #[serde(default)]
    pub model: Option<Value>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImageReply {
    pub url: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorReply {
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayResponse {
    Image { url: String },
    Error { status: StatusCode, message: String },
}

impl GatewayResponse {
    fn error(status: StatusCode, message: impl Into<String>) -> Self {
        Self::Error {
            status,
            message: message.into(),
        }
    }
}

impl IntoResponse for GatewayResponse {
    fn into_response(self) -> Response {
        match self {
            GatewayResponse::Image { url } => {
                (StatusCode::OK, Json(ImageReply { url })).into_response()
            }
            GatewayResponse::Error { status, message } => {
                (status, Json(ErrorReply { error: message })).into_response()
            }
        }
    }
}

/// Stateless proxy in front of the upstream image API. Owns the credential.
#[derive(Clone)]
pub struct Gateway {
    config: Arc<GatewayConfig>,
    client: reqwest::Client,
}

impl Gateway {
    pub fn new(config: GatewayConfig) -> Self {
        Self {
            config: Arc::new(config),
            client: reqwest::Client::new(),
        }
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route(GENERATE_IMAGE_PATH, post(generate_image))
            .layer(CorsLayer::permissive())
            .with_state(self.clone())
    }

    pub async fn serve(
        self,
        listener: TcpListener,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> std::io::Result<()> {
        if let Ok(addr) = listener.local_addr() {
            info!("Gateway listening on http://{addr}");
        }
        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await
    }

    /// Forwards one request upstream. Every failure is folded into the response.
    pub async fn generate(&self, req: IncomingRequest) -> GatewayResponse {
        let credential = &self.config.credential;
        let payload = UpstreamRequest {
            model: req.model.as_ref(),
            prompt: req.prompt.as_ref(),
            n: 1,
            size: &self.config.image_size,
        };
        info!(
            "Forwarding generation request (model: {})",
            payload.model.map(Value::to_string).unwrap_or_default()
        );

        let reply =
            upstream_api::query(&self.client, &self.config.upstream_url, credential, &payload)
                .await;

        match reply {
            Ok(UpstreamReply::Image(Some(url))) => {
                info!("Upstream returned image {url}");
                GatewayResponse::Image { url }
            }
            Ok(UpstreamReply::Image(None)) => {
                warn!("Upstream succeeded without an image URL");
                GatewayResponse::error(StatusCode::INTERNAL_SERVER_ERROR, NO_IMAGE_URL_MSG)
            }
            Ok(UpstreamReply::Rejected { status, body }) => {
                let body = credential.scrub(&body);
                warn!("Upstream rejected request: {status} - {body}");
                GatewayResponse::error(status, body)
            }
            Err(e) => {
                error!("Upstream request failed: {}", credential.scrub(&format!("{e:?}")));
                GatewayResponse::error(StatusCode::INTERNAL_SERVER_ERROR, GENERATION_FAILED_MSG)
            }
        }
    }
}

async fn generate_image(
    State(gateway): State<Gateway>,
    body: Result<Json<IncomingRequest>, JsonRejection>,
) -> GatewayResponse {
    match body {
        Ok(Json(req)) => gateway.generate(req).await,
        // non-JSON bodies are read as empty, the upstream judges the missing fields
        Err(JsonRejection::MissingJsonContentType(_)) => {
            gateway.generate(IncomingRequest::default()).await
        }
        Err(rejection) => {
            warn!("Rejected malformed request: {}", rejection.body_text());
            GatewayResponse::error(rejection.status(), rejection.body_text())
        }
    }
}
