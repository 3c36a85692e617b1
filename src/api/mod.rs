pub mod client;
pub mod events;
pub mod models;

pub use client::{ApiClient, ApiError, Result};
pub use events::{EventSubscription, SubscriptionError};
pub use models::{ProgressEvent, VideoInfo};
