//! Infrastructure layer implementations.

pub mod api;
pub mod http;
pub mod storage;

pub use api::{HttpAccountGateway, HttpAuthGateway, HttpTransferGateway};
pub use http::{
    ApiRequest, ApiResponse, AuthInjector, CacheLayer, ErrorClassifier, HttpTransport, Middleware,
    Next, ReqwestTransport, RequestPipeline, ResponseCache, RetryPolicy,
};
pub use storage::{FileKeyValueStore, MemoryKeyValueStore};
