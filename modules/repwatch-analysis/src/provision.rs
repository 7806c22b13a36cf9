// Per-platform ingestion job provisioning. Each platform of a thread gets a
// deterministic job id, a generated keyword set, and a cron trigger aimed at
// our ingestion endpoint. Failures are isolated per platform: one bad
// platform never blocks the rest, and a job row survives a trigger failure
// so provisioning can be retried.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use repwatch_common::{scraping_job_id, trigger_name, PlatformId, Result};
use repwatch_store::NewJob;

use crate::keywords::KeywordBuilder;
use crate::scheduler::{SchedulerClient, TriggerSpec};
use crate::traits::PipelineStore;

/// Outcome of provisioning one platform.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ProvisionEntry {
    /// Job row and trigger both created.
    Created { job_id: String, trigger: String },
    /// Job row created, trigger creation failed; retryable.
    TriggerFailed { job_id: String, error: String },
    /// A job for this pair already exists; left untouched.
    AlreadyExists { job_id: String },
    /// Nothing was created for this platform.
    Failed { platform_id: String, error: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct ProvisionReport {
    pub thread_id: i64,
    pub entries: Vec<ProvisionEntry>,
}

pub struct JobProvisioner {
    store: Arc<dyn PipelineStore>,
    keywords: KeywordBuilder,
    scheduler: Arc<dyn SchedulerClient>,
    service_base_url: String,
}

impl JobProvisioner {
    pub fn new(
        store: Arc<dyn PipelineStore>,
        keywords: KeywordBuilder,
        scheduler: Arc<dyn SchedulerClient>,
        service_base_url: String,
    ) -> Self {
        Self {
            store,
            keywords,
            scheduler,
            service_base_url,
        }
    }

    /// Provision ingestion jobs for every platform of the thread.
    pub async fn provision(&self, thread_id: i64, platform_ids: &[String]) -> Result<ProvisionReport> {
        let Some(thread) = self.store.thread_by_id(thread_id).await? else {
            return Err(repwatch_common::RepwatchError::Validation(format!(
                "thread {thread_id} not found"
            )));
        };

        let mut entries = Vec::with_capacity(platform_ids.len());
        for raw in platform_ids {
            entries.push(
                self.provision_one(thread_id, raw, &thread.context, &thread.instructions)
                    .await,
            );
        }
        info!(thread_id, platforms = platform_ids.len(), "Provisioning pass complete");
        Ok(ProvisionReport { thread_id, entries })
    }

    /// Regenerate the keyword set of an existing job from the thread's
    /// current context and instructions. Returns the new keywords.
    pub async fn refresh_keywords(
        &self,
        thread_id: i64,
        platform: PlatformId,
    ) -> Result<Vec<String>> {
        let Some(thread) = self.store.thread_by_id(thread_id).await? else {
            return Err(repwatch_common::RepwatchError::Validation(format!(
                "thread {thread_id} not found"
            )));
        };
        let job_id = scraping_job_id(thread_id, platform);
        if self.store.job_by_id(&job_id).await?.is_none() {
            return Err(repwatch_common::RepwatchError::Validation(format!(
                "job {job_id} not found"
            )));
        }

        let keywords = self
            .keywords
            .build(platform, &thread.context, &thread.instructions)
            .await?;
        self.store.update_job_keywords(&job_id, &keywords).await?;
        info!(job_id, count = keywords.len(), "Job keywords refreshed");
        Ok(keywords)
    }

    async fn provision_one(
        &self,
        thread_id: i64,
        raw_platform: &str,
        context: &str,
        instructions: &str,
    ) -> ProvisionEntry {
        let platform: PlatformId = match raw_platform.parse() {
            Ok(p) => p,
            Err(e) => {
                warn!(thread_id, platform = raw_platform, "Skipping unknown platform");
                return ProvisionEntry::Failed {
                    platform_id: raw_platform.to_string(),
                    error: e,
                };
            }
        };

        let job_id = scraping_job_id(thread_id, platform);
        match self.store.job_by_id(&job_id).await {
            Ok(Some(_)) => {
                info!(job_id, "Ingestion job already provisioned");
                return ProvisionEntry::AlreadyExists { job_id };
            }
            Ok(None) => {}
            Err(e) => {
                return ProvisionEntry::Failed {
                    platform_id: raw_platform.to_string(),
                    error: e.to_string(),
                };
            }
        }

        let keywords = match self.keywords.build(platform, context, instructions).await {
            Ok(k) => k,
            Err(e) => {
                warn!(job_id, error = %e, "Keyword generation failed");
                return ProvisionEntry::Failed {
                    platform_id: raw_platform.to_string(),
                    error: e.to_string(),
                };
            }
        };

        let job = NewJob {
            job_id: job_id.clone(),
            thread_id,
            platform_id: platform.as_str().to_string(),
            keywords,
            job_interval: platform.poll_schedule().to_string(),
            status: "pending".to_string(),
        };
        if let Err(e) = self.store.insert_job(job).await {
            warn!(job_id, error = %e, "Job insert failed");
            return ProvisionEntry::Failed {
                platform_id: raw_platform.to_string(),
                error: e.to_string(),
            };
        }

        let spec = TriggerSpec {
            name: trigger_name(&job_id),
            schedule: platform.poll_schedule().to_string(),
            target_url: format!(
                "{}/ingest/{}/{}",
                self.service_base_url, thread_id, platform
            ),
        };
        match self.scheduler.create_trigger(&spec).await {
            Ok(trigger) => {
                info!(job_id, trigger, "Ingestion job provisioned");
                ProvisionEntry::Created { job_id, trigger }
            }
            // The job row stays: re-provisioning reports AlreadyExists and
            // the trigger can be created out of band.
            Err(e) => {
                warn!(job_id, error = %e, "Trigger creation failed, job row kept");
                ProvisionEntry::TriggerFailed {
                    job_id,
                    error: e.to_string(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockGenerator, MockPipelineStore, MockScheduler};

    fn provisioner(
        store: Arc<MockPipelineStore>,
        scheduler: Arc<MockScheduler>,
        responses: Vec<String>,
    ) -> JobProvisioner {
        JobProvisioner::new(
            store,
            KeywordBuilder::new(Arc::new(MockGenerator::with_responses(responses))),
            scheduler,
            "http://svc.test".to_string(),
        )
    }

    fn keyword_json() -> String {
        r#"{"primary_keywords": ["acme"], "secondary_keywords": ["acme review"]}"#.to_string()
    }

    #[tokio::test]
    async fn provisions_job_and_trigger_per_platform() {
        let store = Arc::new(MockPipelineStore::new().with_thread(
            7,
            "Launch",
            "brand",
            "ctx",
            &["twitter", "google-news"],
        ));
        let scheduler = Arc::new(MockScheduler::new());
        let p = provisioner(
            store.clone(),
            scheduler.clone(),
            vec!["acme -is:retweet".to_string(), keyword_json()],
        );

        let report = p
            .provision(7, &["twitter".to_string(), "google-news".to_string()])
            .await
            .unwrap();
        assert_eq!(
            report.entries[0],
            ProvisionEntry::Created {
                job_id: "scraping-job-7-twitter".to_string(),
                trigger: "trigger-scraping-job-7-twitter".to_string(),
            }
        );
        assert!(matches!(report.entries[1], ProvisionEntry::Created { .. }));

        let job = store.job_row("scraping-job-7-twitter").unwrap();
        assert_eq!(job.keywords, vec!["acme -is:retweet"]);
        assert_eq!(job.job_interval.as_deref(), Some("*/10 * * * *"));
        assert_eq!(job.status, "pending");

        let triggers = scheduler.created();
        assert_eq!(triggers.len(), 2);
        assert_eq!(triggers[0].target_url, "http://svc.test/ingest/7/twitter");
        assert_eq!(triggers[1].schedule, "0 */2 * * *");
    }

    #[tokio::test]
    async fn existing_job_is_left_untouched() {
        let store = Arc::new(
            MockPipelineStore::new()
                .with_thread(7, "Launch", "brand", "ctx", &["twitter"])
                .with_job("scraping-job-7-twitter", 7, "twitter", &["old kw"]),
        );
        let scheduler = Arc::new(MockScheduler::new());
        let p = provisioner(store.clone(), scheduler.clone(), vec![]);

        let report = p.provision(7, &["twitter".to_string()]).await.unwrap();
        assert_eq!(
            report.entries[0],
            ProvisionEntry::AlreadyExists {
                job_id: "scraping-job-7-twitter".to_string(),
            }
        );
        assert!(scheduler.created().is_empty());
        assert_eq!(
            store.job_row("scraping-job-7-twitter").unwrap().keywords,
            vec!["old kw"]
        );
    }

    #[tokio::test]
    async fn unknown_platform_fails_without_blocking_the_rest() {
        let store = Arc::new(MockPipelineStore::new().with_thread(
            7,
            "Launch",
            "brand",
            "ctx",
            &["myspace", "twitter"],
        ));
        let scheduler = Arc::new(MockScheduler::new());
        let p = provisioner(
            store.clone(),
            scheduler,
            vec!["acme".to_string()],
        );

        let report = p
            .provision(7, &["myspace".to_string(), "twitter".to_string()])
            .await
            .unwrap();
        assert!(matches!(
            report.entries[0],
            ProvisionEntry::Failed { ref platform_id, .. } if platform_id == "myspace"
        ));
        assert!(matches!(report.entries[1], ProvisionEntry::Created { .. }));
    }

    #[tokio::test]
    async fn trigger_failure_keeps_the_job_row() {
        let store = Arc::new(MockPipelineStore::new().with_thread(
            7,
            "Launch",
            "brand",
            "ctx",
            &["twitter"],
        ));
        let scheduler = Arc::new(MockScheduler::failing());
        let p = provisioner(
            store.clone(),
            scheduler,
            vec!["acme".to_string()],
        );

        let report = p.provision(7, &["twitter".to_string()]).await.unwrap();
        assert!(matches!(
            report.entries[0],
            ProvisionEntry::TriggerFailed { ref job_id, .. } if job_id == "scraping-job-7-twitter"
        ));
        assert!(store.job_row("scraping-job-7-twitter").is_some());
    }

    #[tokio::test]
    async fn refresh_replaces_the_stored_keyword_set() {
        let store = Arc::new(
            MockPipelineStore::new()
                .with_thread(7, "Launch", "brand", "ctx", &["twitter"])
                .with_job("scraping-job-7-twitter", 7, "twitter", &["old kw"]),
        );
        let p = provisioner(
            store.clone(),
            Arc::new(MockScheduler::new()),
            vec!["acme -is:retweet".to_string()],
        );

        let keywords = p
            .refresh_keywords(7, PlatformId::Twitter)
            .await
            .unwrap();
        assert_eq!(keywords, vec!["acme -is:retweet"]);
        assert_eq!(
            store.job_row("scraping-job-7-twitter").unwrap().keywords,
            vec!["acme -is:retweet"]
        );
    }

    #[tokio::test]
    async fn refresh_without_a_job_row_is_an_error() {
        let store = Arc::new(MockPipelineStore::new().with_thread(
            7,
            "Launch",
            "brand",
            "ctx",
            &["twitter"],
        ));
        let p = provisioner(store, Arc::new(MockScheduler::new()), vec![]);
        assert!(p.refresh_keywords(7, PlatformId::Twitter).await.is_err());
    }

    #[tokio::test]
    async fn provisioning_unknown_thread_is_an_error() {
        let p = provisioner(
            Arc::new(MockPipelineStore::new()),
            Arc::new(MockScheduler::new()),
            vec![],
        );
        assert!(p.provision(99, &["twitter".to_string()]).await.is_err());
    }
}
