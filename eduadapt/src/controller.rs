//! Page controller.
//!
//! Owns one adaptation session over a host document: snapshot of the original
//! content, the run epoch, the active dyslexia run, the loading indicator and
//! end-of-run notifications.

use chrono::Utc;
use eduadapt_agent::AdaptationClient;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::EduAdaptConfig;
use crate::document::{HostDocument, NodeId};
use crate::extract::BlockExtractor;
use crate::notify::{LoadingGuard, NotificationSink};
use crate::scheduler::{self, Epoch, JobId, ReadingSupport, RunContext};
use crate::types::{AdaptationOptions, ControllerError, Profile, RunOutcome, RunReport, Severity};

const LOADING_MESSAGE: &str = "Adapting page...";
const NOTHING_TO_ADAPT: &str = "No content found to adapt";
const SUPPORT_ADDED: &str = "Support added. Expand sections for easier text.";
const RUN_FAILED: &str = "Error adapting page";

struct Session<H: HostDocument> {
    /// Original content of the extraction root, captured once per activation
    snapshot: Option<(NodeId, H::Snapshot)>,
    profile: Option<Profile>,
    reading: Option<Arc<ReadingSupport<H>>>,
}

/// Orchestrates adaptation runs over one document.
pub struct PageController<H: HostDocument> {
    host: Arc<H>,
    client: Arc<dyn AdaptationClient>,
    sink: Arc<dyn NotificationSink>,
    config: EduAdaptConfig,
    extractor: BlockExtractor,
    epoch: Epoch,
    session: Mutex<Session<H>>,
}

impl<H: HostDocument> PageController<H> {
    pub fn new(host: Arc<H>, client: Arc<dyn AdaptationClient>, sink: Arc<dyn NotificationSink>) -> Self {
        Self::with_config(host, client, sink, EduAdaptConfig::default())
    }

    pub fn with_config(
        host: Arc<H>,
        client: Arc<dyn AdaptationClient>,
        sink: Arc<dyn NotificationSink>,
        config: EduAdaptConfig,
    ) -> Self {
        let extractor = BlockExtractor::new(config.extraction.clone());
        Self {
            host,
            client,
            sink,
            config,
            extractor,
            epoch: Epoch::new(),
            session: Mutex::new(Session {
                snapshot: None,
                profile: None,
                reading: None,
            }),
        }
    }

    fn session(&self) -> MutexGuard<'_, Session<H>> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn host(&self) -> &Arc<H> {
        &self.host
    }

    pub fn config(&self) -> &EduAdaptConfig {
        &self.config
    }

    /// Profile of the active adaptation, if any.
    pub fn active_profile(&self) -> Option<Profile> {
        self.session().profile
    }

    /// Whether an original snapshot is held.
    pub fn is_active(&self) -> bool {
        self.session().snapshot.is_some()
    }

    /// Supported-reading jobs of the active dyslexia run.
    pub fn reading(&self) -> Option<Arc<ReadingSupport<H>>> {
        self.session().reading.clone()
    }

    /// Adapt the page for a profile.
    ///
    /// Failures of individual blocks are isolated inside the run; an `Err`
    /// means the run as a whole failed.
    pub async fn adapt_page(
        &self,
        profile: Profile,
        options: Option<AdaptationOptions>,
    ) -> Result<RunReport, ControllerError> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let options = options.unwrap_or_default();
        info!(run_id = %run_id, profile = %profile, "Adapting page");

        let loading = LoadingGuard::start(Arc::clone(&self.sink), LOADING_MESSAGE);
        let result = self.run(run_id, profile, options).await;
        loading.release();

        match result {
            Ok((outcome, version)) => {
                if self.epoch.current() == version {
                    self.announce(profile, &outcome);
                } else {
                    debug!(run_id = %run_id, epoch = version, "Run superseded, not announcing");
                }
                let report = RunReport {
                    run_id,
                    profile,
                    outcome,
                    started_at,
                    finished_at: Utc::now(),
                };
                info!(run_id = %run_id, outcome = ?report.outcome, "Run finished");
                Ok(report)
            }
            Err(err) => {
                error!(run_id = %run_id, profile = %profile, error = %err, "Run failed");
                self.sink.notify(RUN_FAILED, Severity::Error);
                Err(err)
            }
        }
    }

    async fn run(
        &self,
        run_id: Uuid,
        profile: Profile,
        options: AdaptationOptions,
    ) -> Result<(RunOutcome, u64), ControllerError> {
        let host = &*self.host;
        let root = self.extractor.find_main_content(host);
        let blocks = self.extractor.extract(host, root);
        debug!(run_id = %run_id, blocks = blocks.len(), "Extraction finished");

        if blocks.is_empty() {
            return Ok((RunOutcome::NothingToAdapt, self.epoch.current()));
        }

        let version = {
            let mut session = self.session();
            if session.snapshot.is_none() {
                session.snapshot = Some((root, host.snapshot(root)?));
            }
            let version = self.epoch.advance();
            if let Some(previous) = session.reading.take() {
                previous.cancel(version);
            }
            session.profile = Some(profile);
            version
        };

        host.apply_theme(root, theme_for(profile))?;

        let ctx = RunContext::new(
            Arc::clone(&self.host),
            Arc::clone(&self.client),
            Arc::clone(&self.sink),
            self.epoch.clone(),
        )
        .with_run_id(run_id)
        .with_profile(profile, options)
        .with_root(root);
        if ctx.version() != version {
            return Err(ControllerError::Internal(format!(
                "epoch moved during setup ({} != {})",
                ctx.version(),
                version
            )));
        }

        let outcome = match profile {
            Profile::Dyslexia => {
                let reading = ReadingSupport::attach(
                    Arc::new(ctx),
                    &blocks,
                    self.config.scheduler.dyslexia.clone(),
                );
                let jobs = reading.job_count();
                self.session().reading = Some(reading);
                RunOutcome::SupportAttached { jobs }
            }
            Profile::Adhd | Profile::Autism | Profile::Default => {
                let batch = scheduler::run_batch(&ctx, &blocks, &self.config.scheduler).await;
                RunOutcome::Adapted {
                    succeeded: batch.succeeded,
                    total: batch.total,
                }
            }
        };
        Ok((outcome, version))
    }

    fn announce(&self, profile: Profile, outcome: &RunOutcome) {
        match outcome {
            RunOutcome::NothingToAdapt => self.sink.notify(NOTHING_TO_ADAPT, Severity::Warning),
            RunOutcome::SupportAttached { .. } => self.sink.notify(SUPPORT_ADDED, Severity::Success),
            RunOutcome::Adapted { succeeded, total } => {
                let severity = if *succeeded == 0 && *total > 0 {
                    Severity::Warning
                } else {
                    Severity::Success
                };
                self.sink.notify(
                    &format!("✓ Adapted {} sections for {}", succeeded, profile),
                    severity,
                );
            }
        }
    }

    /// Restore the original content and drop all run state.
    ///
    /// Safe to call repeatedly; without a snapshot only the epoch moves.
    pub fn reset(&self) -> Result<(), ControllerError> {
        let version = self.epoch.advance();
        let (snapshot, reading) = {
            let mut session = self.session();
            session.profile = None;
            (session.snapshot.take(), session.reading.take())
        };

        if let Some(reading) = reading {
            reading.cancel(version);
        }
        if let Some((root, snapshot)) = snapshot {
            self.host.restore(root, snapshot)?;
            self.host.apply_theme(root, None)?;
            info!(epoch = version, "Page restored");
        } else {
            debug!(epoch = version, "Reset with nothing to restore");
        }
        self.sink.dismiss();
        Ok(())
    }

    /// Forward a reveal request to the active dyslexia run.
    pub fn request_reveal(&self, job: JobId) -> bool {
        match self.reading() {
            Some(reading) => reading.request_reveal(job),
            None => {
                warn!(job = job.index(), "Reveal requested without an active dyslexia run");
                false
            }
        }
    }

    /// Forward a retry request to the active dyslexia run.
    pub fn request_retry(&self, job: JobId) -> bool {
        match self.reading() {
            Some(reading) => reading.request_retry(job),
            None => false,
        }
    }
}

/// Visual theme applied for a profile. The generic profile has none.
fn theme_for(profile: Profile) -> Option<Profile> {
    match profile {
        Profile::Dyslexia | Profile::Adhd | Profile::Autism => Some(profile),
        Profile::Default => None,
    }
}
