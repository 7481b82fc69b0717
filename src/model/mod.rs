pub mod account;
pub mod amount;
pub mod funding;
pub mod network;
pub mod router;
pub mod task_set;

pub use account::Account;
pub use funding::{CascadeFundingRequest, FundingMode, FundingResult};
pub use network::{NetworkConfig, NetworkFamily};
pub use router::RouterConfig;
pub use task_set::{RepeatSchedule, TaskResult, TaskSet};
