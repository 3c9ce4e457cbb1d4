//! Outbound request pipeline.
//!
//! Every API call goes through an ordered list of [`Middleware`] stages
//! ending in an [`HttpTransport`]. Stages see raw [`HttpError`]s; the
//! [`ErrorClassifier`] runs once on whatever the whole chain returns, so it
//! only ever observes terminal outcomes.
//!
//! ```text
//! execute() ─► AuthInjector ─► CacheLayer ─► RetryPolicy ─► transport
//!    ▲                                                          │
//!    └──────────── ErrorClassifier ◄── terminal result ◄────────┘
//! ```

pub mod auth;
pub mod cache;
pub mod classify;
pub mod retry;
pub mod transport;

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::{Method, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

use crate::domain::{ApiError, AppError, ConfigError, HttpError};

pub use auth::AuthInjector;
pub use cache::{CacheLayer, CachedResponse, ResponseCache};
pub use classify::ErrorClassifier;
pub use retry::RetryPolicy;
pub use transport::ReqwestTransport;

/// A request travelling through the pipeline
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<serde_json::Value>,
    /// Explicit cache bypass marker
    pub skip_cache: bool,
}

impl ApiRequest {
    #[must_use]
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: None,
            skip_cache: false,
        }
    }

    #[must_use]
    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    #[must_use]
    pub fn post(url: Url, body: serde_json::Value) -> Self {
        Self {
            body: Some(body),
            ..Self::new(Method::POST, url)
        }
    }

    #[must_use]
    pub fn bypass_cache(mut self) -> Self {
        self.skip_cache = true;
        self
    }

    #[must_use]
    pub fn path(&self) -> &str {
        self.url.path()
    }

    #[must_use]
    pub fn is_get(&self) -> bool {
        self.method == Method::GET
    }
}

/// A successful response snapshot. Cloning yields a deep copy.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: serde_json::Value,
}

impl ApiResponse {
    #[must_use]
    pub fn ok(body: serde_json::Value) -> Self {
        Self { status: 200, body }
    }

    /// Decode the body into a typed value
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, AppError> {
        T::deserialize(&self.body).map_err(|e| AppError::Parse(e.to_string()))
    }
}

/// The raw network call at the end of the chain
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, HttpError>;
}

/// One policy stage wrapping the rest of the chain
#[async_trait]
pub trait Middleware: Send + Sync {
    fn name(&self) -> &'static str;

    async fn handle(&self, request: ApiRequest, next: Next<'_>) -> Result<ApiResponse, HttpError>;
}

/// The remainder of the chain after the current stage
#[derive(Clone, Copy)]
pub struct Next<'a> {
    stages: &'a [Arc<dyn Middleware>],
    transport: &'a dyn HttpTransport,
}

impl<'a> Next<'a> {
    fn new(stages: &'a [Arc<dyn Middleware>], transport: &'a dyn HttpTransport) -> Self {
        Self { stages, transport }
    }

    /// Apply the next stage, or hit the transport when none are left
    pub async fn run(self, request: ApiRequest) -> Result<ApiResponse, HttpError> {
        match self.stages.split_first() {
            Some((stage, rest)) => {
                debug!(stage = stage.name(), url = %request.url, "Entering pipeline stage");
                stage.handle(request, Next::new(rest, self.transport)).await
            }
            None => self.transport.send(&request).await,
        }
    }
}

/// Ordered middleware chain bound to an API base URL
pub struct RequestPipeline {
    base_url: Url,
    stages: Vec<Arc<dyn Middleware>>,
    transport: Arc<dyn HttpTransport>,
    classifier: ErrorClassifier,
}

impl RequestPipeline {
    #[must_use]
    pub fn builder(base_url: Url, transport: Arc<dyn HttpTransport>) -> PipelineBuilder {
        PipelineBuilder {
            base_url,
            stages: Vec::new(),
            transport,
            classifier: ErrorClassifier::silent(),
        }
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Stage names in execution order
    #[must_use]
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Absolute URL for an API path such as `/accounts`
    pub fn url(&self, path: &str) -> Result<Url, AppError> {
        let raw = format!("{}{}", self.base_url.as_str().trim_end_matches('/'), path);
        Url::parse(&raw).map_err(|e| {
            AppError::Config(ConfigError::InvalidValue {
                key: "path".to_string(),
                message: format!("{raw}: {e}"),
            })
        })
    }

    /// Run a request through every stage and classify a terminal failure
    #[instrument(skip(self, request), fields(method = %request.method, url = %request.url))]
    pub async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        Next::new(&self.stages, self.transport.as_ref())
            .run(request)
            .await
            .map_err(|e| self.classifier.report(&e))
    }

    pub async fn get(&self, path: &str) -> Result<ApiResponse, AppError> {
        let request = ApiRequest::get(self.url(path)?);
        Ok(self.execute(request).await?)
    }

    pub async fn get_uncached(&self, path: &str) -> Result<ApiResponse, AppError> {
        let request = ApiRequest::get(self.url(path)?).bypass_cache();
        Ok(self.execute(request).await?)
    }

    pub async fn get_with_query(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<ApiResponse, AppError> {
        let mut url = self.url(path)?;
        url.query_pairs_mut().extend_pairs(query);
        Ok(self.execute(ApiRequest::get(url)).await?)
    }

    pub async fn post<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<ApiResponse, AppError> {
        let body = serde_json::to_value(body).map_err(|e| AppError::Parse(e.to_string()))?;
        let request = ApiRequest::post(self.url(path)?, body);
        Ok(self.execute(request).await?)
    }
}

/// Assembles a [`RequestPipeline`]; stages run in insertion order
pub struct PipelineBuilder {
    base_url: Url,
    stages: Vec<Arc<dyn Middleware>>,
    transport: Arc<dyn HttpTransport>,
    classifier: ErrorClassifier,
}

impl PipelineBuilder {
    #[must_use]
    pub fn stage(mut self, stage: Arc<dyn Middleware>) -> Self {
        self.stages.push(stage);
        self
    }

    #[must_use]
    pub fn classifier(mut self, classifier: ErrorClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    #[must_use]
    pub fn build(self) -> RequestPipeline {
        RequestPipeline {
            base_url: self.base_url,
            stages: self.stages,
            transport: self.transport,
            classifier: self.classifier,
        }
    }
}
