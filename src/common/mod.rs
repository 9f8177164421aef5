//! Common utilities shared by the platform clients and the notification
//! pipeline.

pub mod json_path;
pub mod retry;
pub mod shared_client;

pub use retry::{with_retry_policy, RetryPolicy};
pub use shared_client::SharedClient;
