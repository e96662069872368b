use std::{future::Future, pin::Pin};

use log::debug;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::{
    error::GenerationError,
    gateway::{ErrorReply, GENERATE_IMAGE_PATH, NO_IMAGE_URL_MSG},
    image_model::GenerationRequest,
    invoker::ImageGateway,
};

/// Calls a running gateway over HTTP.
#[derive(Clone)]
pub struct HttpGateway {
    client: Client,
    endpoint: String,
}

impl HttpGateway {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            endpoint: format!("{}{GENERATE_IMAGE_PATH}", base_url.trim_end_matches('/')),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn call(&self, req: &GenerationRequest) -> Result<String, GenerationError> {
        let resp = self
            .client
            .post(&self.endpoint)
            .json(req)
            .send()
            .await
            .map_err(network_error)?;

        let status = resp.status();
        let body = resp.text().await.map_err(network_error)?;

        if !status.is_success() {
            debug!("Gateway error response: {status} - {body}");
            let message = serde_json::from_str::<ErrorReply>(&body)
                .map(|e| e.error)
                .unwrap_or(body);
            // the gateway reports a shapeless upstream reply as a plain 500
            if status == StatusCode::INTERNAL_SERVER_ERROR && message == NO_IMAGE_URL_MSG {
                return Err(GenerationError::UpstreamShape { message });
            }
            return Err(GenerationError::UpstreamHttp { status, message });
        }

        serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|v| v.get("url")?.as_str().map(str::to_string))
            .filter(|url| !url.is_empty())
            .ok_or_else(|| GenerationError::UpstreamShape {
                message: format!("unexpected gateway response: {body}"),
            })
    }
}

fn network_error(e: reqwest::Error) -> GenerationError {
    GenerationError::Network {
        message: e.to_string(),
    }
}

impl ImageGateway for HttpGateway {
    fn generate<'a>(
        &'a self,
        req: &'a GenerationRequest,
        cancel: &'a CancellationToken,
    ) -> Pin<Box<dyn Future<Output = Result<String, GenerationError>> + Send + 'a>> {
        Box::pin(async move {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(GenerationError::Cancelled),
                res = self.call(req) => res,
            }
        })
    }
}
