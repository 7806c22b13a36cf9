// Wiring: config → pool → clients → pipeline context. Everything behind the
// context's trait objects so the route layer never names a vendor client.

use std::sync::Arc;

use anyhow::Result;

use ai_client::GcpClient;
use blob_client::GcsClient;
use repwatch_analysis::{
    HttpSchedulerClient, JobProvisioner, KeywordBuilder, Pipeline, PipelineContext, PipelineStore,
};
use repwatch_common::Config;
use repwatch_store::Store;

use crate::routes::AppState;

pub async fn build_state(config: &Config) -> Result<AppState> {
    let store = Store::connect(&config.database_url).await?;
    tracing::info!("Connected to database, migrations complete");

    let store: Arc<dyn PipelineStore> = Arc::new(store);
    let gcp = Arc::new(GcpClient::new(
        &config.model_api_base,
        &config.model_api_key,
        &config.model_id,
        &config.batch_model_id,
    ));
    let scheduler = Arc::new(HttpSchedulerClient::new(config.scheduler_api_base.clone()));

    let ctx = PipelineContext {
        store: store.clone(),
        blobs: Arc::new(GcsClient::new(
            &config.blob_api_base,
            &config.analysis_bucket,
            &config.blob_api_token,
        )),
        classifier: gcp.clone(),
        generator: gcp.clone(),
        batch: gcp.clone(),
        scheduler: scheduler.clone(),
        bucket: config.analysis_bucket.clone(),
        service_base_url: config.service_base_url.clone(),
    };

    let pipeline = Arc::new(Pipeline::new(ctx.clone()));
    let provisioner = Arc::new(JobProvisioner::new(
        store,
        KeywordBuilder::new(ctx.generator.clone()),
        scheduler,
        config.service_base_url.clone(),
    ));

    Ok(AppState {
        ctx,
        pipeline,
        provisioner,
    })
}
