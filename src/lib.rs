//! Client core for a money-transfer application.
//!
//! A layered request pipeline (auth, cache, retry, error classification)
//! under typed API gateways, plus the transfer form workflow with debounced
//! destination checks and single-flight submission.

pub mod app;
pub mod domain;
pub mod infra;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
