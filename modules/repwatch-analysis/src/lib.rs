pub mod aggregator;
pub mod context;
pub mod dedup;
pub mod keywords;
pub mod pipeline;
pub mod playbook;
pub mod prompts;
pub mod provision;
pub mod scheduler;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
pub mod traits;
pub mod wake;

pub use aggregator::{LevelOutcome, ScorePass, SentimentAggregator, OVERALL_PLATFORM};
pub use context::PipelineContext;
pub use dedup::DedupGuard;
pub use keywords::KeywordBuilder;
pub use pipeline::{CompletionOutcome, Pipeline};
pub use playbook::PlaybookGenerator;
pub use provision::{JobProvisioner, ProvisionEntry, ProvisionReport};
pub use scheduler::{HttpSchedulerClient, SchedulerClient, TriggerSpec};
pub use traits::PipelineStore;
pub use wake::WakeClient;
