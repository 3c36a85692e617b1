pub mod download_coordinator;
pub mod eligibility;
pub mod job_client;
pub mod reporter;

pub use download_coordinator::{DownloadCoordinator, SaveEvent};
pub use eligibility::{is_supported_resource, EligibilityGate};
pub use job_client::JobClient;
pub use reporter::{ChannelReporter, JobEvent, Reporter};
