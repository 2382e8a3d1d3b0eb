//! HTTP implementation of the collaborator traits against the annotation
//! backend's REST API.
//!
//! # Endpoints
//!
//! | operation        | request                                              |
//! |------------------|------------------------------------------------------|
//! | list images      | `GET  /api/images`                                   |
//! | slice            | `GET  /api/image/{file}?axis=..&slice_index=..`      |
//! | matched slice    | `GET  /api/image/{file}/histogram-match?..&reference=..` |
//! | metadata         | `GET  /api/image/{file}/info`                        |
//! | save             | `POST /api/annotations`                              |
//! | load             | `GET  /api/annotations/{file}`                       |
//! | annotated files  | `GET  /api/annotated-files`                          |
//! | inference        | `POST /api/inference`                                |
//!
//! Slices come back as `data:image/png;base64,...` URLs inside a JSON body.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use reqwest::{Response, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::error::ServiceError;
use crate::volume::{Annotation, VolumeInfo};

use super::source::{
    AnnotationPersistence, InferenceResult, InferenceService, SliceRequest, SliceSource,
};

/// Default request timeout. Inference can take a while on CPU.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

// =============================================================================
// Wire types
// =============================================================================

#[derive(Debug, Deserialize)]
struct ImagesResponse {
    images: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct SliceResponse {
    image: String,
}

#[derive(Debug, Serialize)]
struct SaveRequest<'a> {
    filename: &'a str,
    annotations: &'a [Annotation],
}

#[derive(Debug, Deserialize)]
struct AnnotationsResponse {
    #[serde(default)]
    annotations: Vec<Annotation>,
}

#[derive(Debug, Deserialize)]
struct AnnotatedFilesResponse {
    #[serde(default)]
    annotated_files: Vec<String>,
}

#[derive(Debug, Serialize)]
struct InferenceRequest<'a> {
    filename: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    z_index: Option<u32>,
}

/// Model output is in sub-pixel precision; `z` is usually implied by `z_index`.
#[derive(Debug, Deserialize)]
struct WireLandmark {
    label: String,
    x: f64,
    y: f64,
    #[serde(default)]
    z: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct InferenceResponse {
    success: bool,
    #[serde(default)]
    annotations: Vec<WireLandmark>,
    /// Absent on failure bodies; required when `success` is true
    z_index: Option<u32>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: String,
}

// =============================================================================
// HTTP Backend
// =============================================================================

/// Client for the annotation backend.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpBackend {
    /// Create a client for the backend at `base_url` (e.g. `http://localhost:8000`).
    pub fn new(base_url: &str) -> Result<Self, ServiceError> {
        Self::with_timeout(base_url, DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ServiceError::Connection(e.to_string()))?;
        Ok(Self {
            client,
            base_url: normalize_base_url(base_url)?,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// List the image files in the backend's current folder.
    pub async fn list_images(&self) -> Result<Vec<String>, ServiceError> {
        let url = self.endpoint("api/images")?;
        let response = self.client.get(url).send().await?;
        let body: ImagesResponse = check(response).await?.json().await?;
        Ok(body.images)
    }

    fn endpoint(&self, path: &str) -> Result<Url, ServiceError> {
        self.base_url
            .join(path)
            .map_err(|e| ServiceError::Connection(format!("invalid endpoint '{}': {}", path, e)))
    }
}

fn normalize_base_url(base_url: &str) -> Result<Url, ServiceError> {
    let mut url = Url::parse(base_url)
        .map_err(|e| ServiceError::Connection(format!("invalid base URL '{}': {}", base_url, e)))?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

/// Map non-success statuses to `ServiceError`, using FastAPI's `detail` field
/// when present.
async fn check(response: Response) -> Result<Response, ServiceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&text)
        .map(|body| body.detail)
        .unwrap_or(text);

    if status == StatusCode::NOT_FOUND {
        Err(ServiceError::NotFound(message))
    } else {
        Err(ServiceError::Status {
            status: status.as_u16(),
            message,
        })
    }
}

/// Decode the payload of a `data:<mime>;base64,<payload>` URL. A bare base64
/// string is accepted too.
pub fn decode_data_url(data_url: &str) -> Result<Bytes, ServiceError> {
    let payload = match data_url.split_once(',') {
        Some((header, payload)) if header.starts_with("data:") => {
            if !header.ends_with(";base64") {
                return Err(ServiceError::InvalidResponse(format!(
                    "unsupported data URL encoding: {}",
                    header
                )));
            }
            payload
        }
        _ => data_url,
    };

    STANDARD
        .decode(payload.trim())
        .map(Bytes::from)
        .map_err(|e| ServiceError::InvalidResponse(format!("invalid base64 image: {}", e)))
}

fn round_landmark(landmark: WireLandmark, z_index: u32) -> Annotation {
    let z = landmark.z.map(|z| z.round() as i32).unwrap_or(z_index as i32);
    Annotation::new(
        landmark.label,
        landmark.x.round() as i32,
        landmark.y.round() as i32,
        z,
    )
}

#[async_trait]
impl SliceSource for HttpBackend {
    async fn fetch_slice(&self, request: &SliceRequest) -> Result<Bytes, ServiceError> {
        let file = urlencoding::encode(&request.filename);
        let slice_index = request.slice_index.to_string();
        let mut query = vec![("axis", request.axis.as_str()), ("slice_index", slice_index.as_str())];

        let path = match &request.reference {
            Some(reference) => {
                query.push(("reference", reference.as_str()));
                format!("api/image/{}/histogram-match", file)
            }
            None => format!("api/image/{}", file),
        };

        debug!(
            "GET slice {} {} #{} (reference: {:?})",
            request.filename, request.axis, request.slice_index, request.reference
        );

        let url = self.endpoint(&path)?;
        let response = self.client.get(url).query(&query).send().await?;
        let body: SliceResponse = check(response).await?.json().await?;
        decode_data_url(&body.image)
    }

    async fn fetch_volume_info(&self, filename: &str) -> Result<VolumeInfo, ServiceError> {
        let path = format!("api/image/{}/info", urlencoding::encode(filename));
        let response = self.client.get(self.endpoint(&path)?).send().await?;
        Ok(check(response).await?.json().await?)
    }
}

#[async_trait]
impl AnnotationPersistence for HttpBackend {
    async fn save(&self, filename: &str, annotations: &[Annotation]) -> Result<(), ServiceError> {
        let body = SaveRequest {
            filename,
            annotations,
        };
        let response = self
            .client
            .post(self.endpoint("api/annotations")?)
            .json(&body)
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    async fn load(&self, filename: &str) -> Result<Vec<Annotation>, ServiceError> {
        let path = format!("api/annotations/{}", urlencoding::encode(filename));
        let response = self.client.get(self.endpoint(&path)?).send().await?;
        let body: AnnotationsResponse = check(response).await?.json().await?;
        Ok(body.annotations)
    }

    async fn list_annotated_files(&self) -> Result<HashSet<String>, ServiceError> {
        let response = self
            .client
            .get(self.endpoint("api/annotated-files")?)
            .send()
            .await?;
        let body: AnnotatedFilesResponse = check(response).await?.json().await?;
        Ok(body.annotated_files.into_iter().collect())
    }
}

#[async_trait]
impl InferenceService for HttpBackend {
    async fn infer(
        &self,
        filename: &str,
        z_index: Option<u32>,
    ) -> Result<InferenceResult, ServiceError> {
        let body = InferenceRequest { filename, z_index };
        let response = self
            .client
            .post(self.endpoint("api/inference")?)
            .json(&body)
            .send()
            .await?;
        let body: InferenceResponse = check(response).await?.json().await?;
        into_inference_result(body)
    }
}

fn into_inference_result(body: InferenceResponse) -> Result<InferenceResult, ServiceError> {
    if !body.success {
        return Err(ServiceError::Inference(
            body.error.unwrap_or_else(|| "service reported failure".to_string()),
        ));
    }
    let z_index = body.z_index.ok_or_else(|| {
        ServiceError::InvalidResponse("inference response is missing z_index".to_string())
    })?;
    Ok(InferenceResult {
        annotations: body
            .annotations
            .into_iter()
            .map(|landmark| round_landmark(landmark, z_index))
            .collect(),
        z_index,
    })
}
