// Explicit dependency bundle for the pipeline stages. Everything external
// lives behind a trait object here; there is no process-wide mutable state
// and no singleton clients.

use std::sync::Arc;

use ai_client::{BatchClassifier, ReportGenerator, SentimentClassifier};
use blob_client::BlobStore;

use crate::scheduler::SchedulerClient;
use crate::traits::PipelineStore;

#[derive(Clone)]
pub struct PipelineContext {
    pub store: Arc<dyn PipelineStore>,
    pub blobs: Arc<dyn BlobStore>,
    pub classifier: Arc<dyn SentimentClassifier>,
    pub generator: Arc<dyn ReportGenerator>,
    pub batch: Arc<dyn BatchClassifier>,
    pub scheduler: Arc<dyn SchedulerClient>,

    /// Bucket holding analysis artifacts, used to build gs:// locations.
    pub bucket: String,

    /// Our own public base URL for trigger chaining and scheduler targets.
    pub service_base_url: String,
}
