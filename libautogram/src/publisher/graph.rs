//! Instagram Graph API client
//!
//! Implements the two-phase publish protocol against
//! `graph.facebook.com`: container creation (single image or carousel),
//! container status polling, and the final publish call. Responses are
//! deserialized into typed structs and required fields are validated before
//! use.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::config::PublisherConfig;
use crate::error::{PublishError, Result};
use crate::publisher::{ContainerStatus, MediaPublisher};
use crate::types::Credential;

pub struct GraphApiPublisher {
    client: reqwest::Client,
    api_base: String,
}

/// Response to container-create and publish calls.
#[derive(Debug, Deserialize)]
struct MediaIdResponse {
    id: Option<String>,
}

/// Response to the container status query.
#[derive(Debug, Deserialize)]
struct StatusResponse {
    status_code: Option<String>,
}

/// Graph API error envelope.
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: Option<GraphError>,
}

#[derive(Debug, Deserialize)]
struct GraphError {
    message: Option<String>,
    code: Option<i64>,
}

impl GraphApiPublisher {
    pub fn new(config: &PublisherConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| PublishError::Transient(format!("HTTP client init failed: {}", e)))?;

        Ok(Self {
            client,
            api_base: config.graph_api_base.trim_end_matches('/').to_string(),
        })
    }

    /// For tests against a local stub server.
    pub fn with_base(api_base: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PublishError::Transient(format!("HTTP client init failed: {}", e)))?;

        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
        })
    }

    async fn post_form(&self, url: &str, form: &[(&str, &str)]) -> Result<MediaIdResponse> {
        let response = self
            .client
            .post(url)
            .form(form)
            .send()
            .await
            .map_err(classify_transport_error)?;

        let response = check_status(response).await?;
        let body: MediaIdResponse = response
            .json()
            .await
            .map_err(|e| PublishError::Terminal(format!("malformed Graph API response: {}", e)))?;
        Ok(body)
    }

    /// Create one single-image container. `carousel_item` marks it as a
    /// carousel child (no caption allowed on children).
    async fn create_image_container(
        &self,
        credential: &Credential,
        image_url: &str,
        caption: Option<&str>,
        carousel_item: bool,
    ) -> Result<String> {
        let url = format!("{}/{}/media", self.api_base, credential.ig_user_id);

        let mut form: Vec<(&str, &str)> = vec![
            ("image_url", image_url),
            ("access_token", &credential.access_token),
        ];
        if let Some(caption) = caption {
            form.push(("caption", caption));
        }
        if carousel_item {
            form.push(("is_carousel_item", "true"));
        }

        let body = self.post_form(&url, &form).await?;
        body.id.ok_or_else(|| {
            PublishError::Terminal("container response missing id".to_string()).into()
        })
    }
}

#[async_trait]
impl MediaPublisher for GraphApiPublisher {
    async fn create_container(
        &self,
        credential: &Credential,
        image_urls: &[String],
        caption: &str,
    ) -> Result<String> {
        if image_urls.is_empty() {
            return Err(PublishError::Content("post has no image URLs".to_string()).into());
        }

        if image_urls.len() == 1 {
            return self
                .create_image_container(credential, &image_urls[0], Some(caption), false)
                .await;
        }

        // Carousel: one child container per slide, then a parent container
        // referencing the children.
        let mut children = Vec::with_capacity(image_urls.len());
        for image_url in image_urls {
            let child_id = self
                .create_image_container(credential, image_url, None, true)
                .await?;
            debug!(child_id = %child_id, "created carousel child container");
            children.push(child_id);
        }

        let url = format!("{}/{}/media", self.api_base, credential.ig_user_id);
        let children_csv = children.join(",");
        let form: Vec<(&str, &str)> = vec![
            ("media_type", "CAROUSEL"),
            ("children", &children_csv),
            ("caption", caption),
            ("access_token", &credential.access_token),
        ];

        let body = self.post_form(&url, &form).await?;
        body.id.ok_or_else(|| {
            PublishError::Terminal("carousel response missing id".to_string()).into()
        })
    }

    async fn container_status(
        &self,
        credential: &Credential,
        creation_id: &str,
    ) -> Result<ContainerStatus> {
        let url = format!("{}/{}", self.api_base, creation_id);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("fields", "status_code"),
                ("access_token", credential.access_token.as_str()),
            ])
            .send()
            .await
            .map_err(classify_transport_error)?;

        let response = check_status(response).await?;
        let body: StatusResponse = response
            .json()
            .await
            .map_err(|e| PublishError::Terminal(format!("malformed status response: {}", e)))?;

        match body.status_code.as_deref() {
            Some("FINISHED") => Ok(ContainerStatus::Finished),
            Some("ERROR") | Some("EXPIRED") => Ok(ContainerStatus::Error),
            // IN_PROGRESS and anything unrecognized keeps the poll going;
            // the publish call is authoritative anyway.
            _ => Ok(ContainerStatus::InProgress),
        }
    }

    async fn publish(&self, credential: &Credential, creation_id: &str) -> Result<String> {
        let url = format!("{}/{}/media_publish", self.api_base, credential.ig_user_id);
        let form: Vec<(&str, &str)> = vec![
            ("creation_id", creation_id),
            ("access_token", &credential.access_token),
        ];

        let body = self.post_form(&url, &form).await?;
        body.id
            .ok_or_else(|| PublishError::Terminal("publish response missing id".to_string()).into())
    }
}

fn classify_transport_error(e: reqwest::Error) -> crate::error::AutogramError {
    // Connection-level failures are always worth retrying
    PublishError::Transient(format!("request failed: {}", e)).into()
}

/// Map HTTP status to the error taxonomy: 429 and 5xx are transient, other
/// non-success codes are terminal. The Graph error message is surfaced when
/// the body carries one.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let detail = match response.json::<ErrorResponse>().await {
        Ok(ErrorResponse { error: Some(e) }) => format!(
            "{} (code {})",
            e.message.unwrap_or_else(|| "unknown".to_string()),
            e.code.unwrap_or(0)
        ),
        _ => status.to_string(),
    };

    if status.as_u16() == 429 || status.is_server_error() {
        Err(PublishError::Transient(format!("Graph API {}: {}", status, detail)).into())
    } else {
        Err(PublishError::Terminal(format!("Graph API {}: {}", status, detail)).into())
    }
}
