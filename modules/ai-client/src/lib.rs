pub mod batch;
pub mod error;
pub mod gcp;
pub mod traits;
pub mod types;

pub use batch::{
    parse_response_line, strip_code_fences, BatchRequestLine, BatchResponseLine, Content,
    GenerationConfig, Part, SentimentFields, SentimentRecord,
};
pub use error::{AiError, Result};
pub use gcp::GcpClient;
pub use traits::{
    wait_for_batch, BatchClassifier, ReportGenerator, SentimentClassifier, BATCH_POLL_INTERVAL,
    BATCH_POLL_MAX_ITERATIONS,
};
pub use types::{BatchJob, BatchJobState, Sentiment};
