//! Dyslexia profile: on-demand supported reading.
//!
//! Page text is never replaced. Each block gets a collapsed affordance and a
//! [`Job`] that generates an easier version, chunk by chunk, either in the
//! background (prefetch) or when the reader asks for it.
//!
//! All job and queue state sits behind one mutex that is never held across an
//! await. Every continuation re-checks the run epoch before touching the
//! document.

use eduadapt_agent::AdaptationError;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;
use tracing::{debug, info, warn};

use super::chunk::{join_chunks, split_into_chunks};
use super::prefetch::PrefetchQueue;
use super::RunContext;
use crate::config::DyslexiaConfig;
use crate::document::{HostDocument, SupportId, SupportPlacement, SupportView};
use crate::format::format_html;
use crate::types::{Block, BlockKind};

/// Marker set on blocks that already carry an affordance.
pub const SUPPORT_MARKER: &str = "eduadapt-support";

const SHOW_LABEL: &str = "Show supported reading";
const HIDE_LABEL: &str = "Hide supported reading";
const GENERATING_LABEL: &str = "Generating...";
const RETRY_LABEL: &str = "Try again";
const CREATING_STATUS: &str = "Creating supported reading...";
const LARGE_SECTION_HINT: &str =
    "Large section: choose Show supported reading to create an easier version.";
const FAILURE_STATUS: &str = "Could not create supported reading.";

/// Handle to a supported-reading job within one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JobId(usize);

impl JobId {
    pub fn new(index: usize) -> Self {
        Self(index)
    }

    pub fn index(&self) -> usize {
        self.0
    }
}

/// Job lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Idle,
    Queued,
    Running,
    Completed,
    /// Retryable on request; never re-queued automatically
    Failed,
}

#[derive(Debug)]
struct Job {
    block: Block,
    support: SupportId,
    state: JobState,
    /// Epoch the job belongs to
    version: u64,
    /// Reveal the result when the running generation completes
    pending_user_reveal: bool,
    visible: bool,
    /// Too long for automatic prefetch
    large: bool,
    content: Option<String>,
    error: Option<String>,
    /// Already counted toward progress
    counted: bool,
}

impl Job {
    fn view(&self) -> SupportView {
        match self.state {
            JobState::Running if self.pending_user_reveal => SupportView {
                button_label: GENERATING_LABEL.to_string(),
                button_enabled: false,
                status: CREATING_STATUS.to_string(),
                content: None,
                visible: false,
            },
            JobState::Idle | JobState::Queued | JobState::Running => SupportView {
                button_label: SHOW_LABEL.to_string(),
                button_enabled: true,
                status: if self.large {
                    LARGE_SECTION_HINT.to_string()
                } else {
                    String::new()
                },
                content: None,
                visible: false,
            },
            JobState::Completed => SupportView {
                button_label: if self.visible { HIDE_LABEL } else { SHOW_LABEL }.to_string(),
                button_enabled: true,
                status: String::new(),
                content: self.content.clone(),
                visible: self.visible,
            },
            JobState::Failed => SupportView {
                button_label: RETRY_LABEL.to_string(),
                button_enabled: true,
                status: self
                    .error
                    .clone()
                    .unwrap_or_else(|| FAILURE_STATUS.to_string()),
                content: None,
                visible: false,
            },
        }
    }
}

struct ReadingState {
    jobs: Vec<Job>,
    queue: PrefetchQueue,
    /// Jobs that reached a terminal state at least once
    completed: usize,
}

/// Supported-reading jobs for one dyslexia run.
pub struct ReadingSupport<H: HostDocument> {
    ctx: Arc<RunContext<H>>,
    config: DyslexiaConfig,
    state: Mutex<ReadingState>,
    idle: Notify,
}

impl<H: HostDocument> ReadingSupport<H> {
    /// Attach an affordance to every block and start background prefetch.
    ///
    /// Must be called within a Tokio runtime.
    pub fn attach(ctx: Arc<RunContext<H>>, blocks: &[Block], config: DyslexiaConfig) -> Arc<Self> {
        let version = ctx.version();
        let mut jobs = Vec::with_capacity(blocks.len());

        for block in blocks {
            let node = block.locator;
            if ctx.host.marker(node, SUPPORT_MARKER).as_deref() == Some("true") {
                debug!(run_id = %ctx.run_id, block = block.index, "Support already attached");
                continue;
            }

            let placement = match block.kind {
                BlockKind::ListItem => SupportPlacement::Inside,
                _ => SupportPlacement::After,
            };
            let support = match ctx.host.attach_support(node, placement) {
                Ok(support) => support,
                Err(err) => {
                    warn!(run_id = %ctx.run_id, block = block.index, error = %err, "Could not attach support");
                    continue;
                }
            };
            if let Err(err) = ctx.host.set_marker(node, SUPPORT_MARKER, "true") {
                warn!(run_id = %ctx.run_id, block = block.index, error = %err, "Could not mark block");
            }

            let job = Job {
                block: block.clone(),
                support,
                state: JobState::Idle,
                version,
                pending_user_reveal: false,
                visible: false,
                large: block.original_text.chars().count() > config.prefetch_max_chars,
                content: None,
                error: None,
                counted: false,
            };
            if let Err(err) = ctx.host.update_support(support, &job.view()) {
                warn!(run_id = %ctx.run_id, block = block.index, error = %err, "Could not render support");
            }
            jobs.push(job);
        }

        let queue = PrefetchQueue::new(config.max_concurrent, config.max_queue_items, version);
        let reading = Arc::new(Self {
            ctx,
            config,
            state: Mutex::new(ReadingState {
                jobs,
                queue,
                completed: 0,
            }),
            idle: Notify::new(),
        });

        {
            let mut state = reading.lock();
            let limit = reading.config.prefetch_limit;
            let eligible: Vec<usize> = state
                .jobs
                .iter()
                .enumerate()
                .filter(|(_, job)| job.block.index < limit && !job.large)
                .map(|(i, _)| i)
                .collect();
            for index in eligible {
                if state.queue.enqueue(JobId(index)) {
                    state.jobs[index].state = JobState::Queued;
                }
            }
            info!(
                run_id = %reading.ctx.run_id,
                jobs = state.jobs.len(),
                queued = state.queue.pending_len(),
                epoch = version,
                "Supported reading attached"
            );
            reading.pump(&mut state);
        }

        reading
    }

    fn lock(&self) -> MutexGuard<'_, ReadingState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn job_count(&self) -> usize {
        self.lock().jobs.len()
    }

    pub fn job_ids(&self) -> Vec<JobId> {
        (0..self.job_count()).map(JobId).collect()
    }

    pub fn job_state(&self, job: JobId) -> Option<JobState> {
        self.lock().jobs.get(job.0).map(|j| j.state)
    }

    /// Job created for the block at `index` in the extracted sequence.
    pub fn job_for_block(&self, index: usize) -> Option<JobId> {
        self.lock()
            .jobs
            .iter()
            .position(|j| j.block.index == index)
            .map(JobId)
    }

    /// Jobs that reached completion or failure at least once.
    pub fn completed(&self) -> usize {
        self.lock().completed
    }

    /// No job queued or running (or the run is no longer current).
    pub fn is_idle(&self) -> bool {
        !self.ctx.is_current() || self.lock().queue.is_idle()
    }

    /// Resolve once background work has settled.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.is_idle() {
                return;
            }
            notified.await;
        }
    }

    /// The reader pressed the affordance button.
    ///
    /// Idle, queued and failed jobs start now and reveal on completion; a
    /// running job reveals when it finishes; a completed job toggles.
    pub fn request_reveal(self: &Arc<Self>, job: JobId) -> bool {
        let mut state = self.lock();
        if !self.is_live_locked(&state, self.ctx.version()) {
            return false;
        }
        let Some(current) = state.jobs.get(job.0).map(|j| j.state) else {
            return false;
        };
        debug!(run_id = %self.ctx.run_id, job = job.0, state = ?current, "Reveal requested");

        match current {
            JobState::Idle | JobState::Failed => self.start_now(&mut state, job),
            JobState::Queued => {
                state.queue.remove(job);
                self.start_now(&mut state, job);
            }
            JobState::Running => {
                let entry = &mut state.jobs[job.0];
                entry.pending_user_reveal = true;
                self.refresh(entry);
            }
            JobState::Completed => {
                let entry = &mut state.jobs[job.0];
                entry.visible = !entry.visible;
                self.refresh(entry);
            }
        }
        true
    }

    /// The reader pressed "Try again". Only failed jobs restart.
    pub fn request_retry(self: &Arc<Self>, job: JobId) -> bool {
        let mut state = self.lock();
        if !self.is_live_locked(&state, self.ctx.version()) {
            return false;
        }
        match state.jobs.get(job.0).map(|j| j.state) {
            Some(JobState::Failed) => {
                self.start_now(&mut state, job);
                true
            }
            _ => false,
        }
    }

    /// Reveal every job: start or flag unfinished ones, show completed ones.
    pub fn reveal_all(self: &Arc<Self>) {
        for job in self.job_ids() {
            let hidden_result = {
                let state = self.lock();
                state
                    .jobs
                    .get(job.0)
                    .is_some_and(|j| j.state == JobState::Completed && j.visible)
            };
            if !hidden_result {
                self.request_reveal(job);
            }
        }
    }

    /// Drop all queued and running work; late completions become no-ops.
    pub fn cancel(&self, version: u64) {
        {
            let mut state = self.lock();
            state.queue.reset(version);
        }
        debug!(run_id = %self.ctx.run_id, epoch = version, "Supported reading cancelled");
        self.idle.notify_waiters();
    }

    fn is_live_locked(&self, state: &ReadingState, version: u64) -> bool {
        self.ctx.is_current() && state.queue.version() == version
    }

    fn refresh(&self, job: &Job) {
        if let Err(err) = self.ctx.host.update_support(job.support, &job.view()) {
            warn!(run_id = %self.ctx.run_id, block = job.block.index, error = %err, "Could not update support");
        }
    }

    fn start_now(self: &Arc<Self>, state: &mut ReadingState, id: JobId) {
        let Some(job) = state.jobs.get_mut(id.0) else {
            return;
        };
        state.queue.start_now();
        job.state = JobState::Running;
        job.pending_user_reveal = true;
        job.error = None;
        self.refresh(job);
        self.spawn_job(id, job.version);
    }

    /// Start queued jobs while slots are free.
    fn pump(self: &Arc<Self>, state: &mut ReadingState) {
        while let Some(id) = state.queue.next_ready() {
            match state.jobs.get_mut(id.0) {
                Some(job) if job.state == JobState::Queued => {
                    job.state = JobState::Running;
                    self.refresh(job);
                    self.spawn_job(id, job.version);
                }
                _ => state.queue.finish(),
            }
        }
    }

    fn spawn_job(self: &Arc<Self>, id: JobId, version: u64) {
        debug!(run_id = %self.ctx.run_id, job = id.0, epoch = version, "Job started");
        tokio::spawn({
            let reading = Arc::clone(self);
            async move { reading.run_job(id, version).await }
        });
    }

    async fn run_job(self: Arc<Self>, id: JobId, version: u64) {
        let text = {
            let state = self.lock();
            match state.jobs.get(id.0) {
                Some(job) => job.block.original_text.clone(),
                None => return,
            }
        };

        // Chunks of one job are awaited strictly in order
        let chunks = split_into_chunks(&text, self.config.chunk_size);
        let mut outputs = Vec::with_capacity(chunks.len());
        for (index, chunk) in chunks.iter().enumerate() {
            if !self.is_live_locked(&self.lock(), version) {
                self.abandon(id, version);
                return;
            }
            match self
                .ctx
                .client
                .adapt(chunk, self.ctx.profile, &self.ctx.options)
                .await
            {
                Ok(output) => {
                    debug!(job = id.0, chunk = index, of = chunks.len(), "Chunk adapted");
                    outputs.push(output);
                }
                Err(err) => {
                    self.complete(id, version, Err(err));
                    return;
                }
            }
        }
        self.complete(id, version, Ok(outputs));
    }

    fn complete(self: &Arc<Self>, id: JobId, version: u64, result: Result<Vec<String>, AdaptationError>) {
        let mut state = self.lock();
        if !self.is_live_locked(&state, version) {
            drop(state);
            self.abandon(id, version);
            return;
        }
        state.queue.finish();

        let total = state.jobs.len();
        let ReadingState {
            jobs, completed, ..
        } = &mut *state;
        if let Some(job) = jobs.get_mut(id.0) {
            match result {
                Ok(outputs) => {
                    let joined = join_chunks(&outputs);
                    job.content = Some(format_html(
                        &joined,
                        self.ctx.profile,
                        job.block.kind,
                        self.ctx.options.grade_level,
                    ));
                    job.error = None;
                    job.state = JobState::Completed;
                    job.visible = job.pending_user_reveal;
                    debug!(run_id = %self.ctx.run_id, job = id.0, chunks = outputs.len(), "Job completed");
                }
                Err(err) => {
                    warn!(run_id = %self.ctx.run_id, job = id.0, error = %err, "Supported reading failed");
                    job.error = Some(err.user_message().unwrap_or(FAILURE_STATUS).to_string());
                    job.state = JobState::Failed;
                    job.visible = false;
                }
            }
            job.pending_user_reveal = false;
            self.refresh(job);

            if !job.counted {
                job.counted = true;
                *completed += 1;
                self.ctx.sink.progress(*completed, total);
            }
        }

        self.pump(&mut state);
        let idle = state.queue.is_idle();
        drop(state);
        if idle {
            self.idle.notify_waiters();
        }
    }

    /// A job from a superseded epoch stops without touching the document.
    fn abandon(&self, id: JobId, version: u64) {
        warn!(run_id = %self.ctx.run_id, job = id.0, epoch = version, "Dropping stale supported reading");
        {
            let mut state = self.lock();
            if state.queue.version() == version {
                state.queue.finish();
            }
        }
        self.idle.notify_waiters();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::MemoryDocument;
    use crate::extract::BlockExtractor;
    use crate::notify::RecordingSink;
    use crate::scheduler::Epoch;
    use eduadapt_agent::{AdaptationClient, AdaptationOptions, Profile};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Fails the first call for any text containing "flaky".
    #[derive(Default)]
    struct FlakyClient {
        calls: AtomicUsize,
        flaky_failed: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl AdaptationClient for FlakyClient {
        async fn adapt(
            &self,
            text: &str,
            _profile: Profile,
            _options: &AdaptationOptions,
        ) -> Result<String, AdaptationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            if text.contains("flaky") && self.flaky_failed.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err(AdaptationError::Rejected {
                    user_message: Some("Model is warming up".to_string()),
                });
            }
            Ok(format!("Easy: {}", text.len()))
        }
    }

    fn paragraph(id: &str, text: &str) -> serde_json::Value {
        json!({ "tag": "p", "id": id, "children": [text] })
    }

    fn setup(children: Vec<serde_json::Value>) -> (Arc<MemoryDocument>, Arc<ReadingSupport<MemoryDocument>>, Arc<FlakyClient>, Arc<RecordingSink>) {
        let doc = Arc::new(
            MemoryDocument::from_value(json!({ "root": { "tag": "body", "children": children } }))
                .unwrap(),
        );
        let blocks = BlockExtractor::default().extract(&*doc, doc.document_root());
        let client = Arc::new(FlakyClient::default());
        let sink = Arc::new(RecordingSink::new());
        let ctx = Arc::new(
            RunContext::new(doc.clone(), client.clone(), sink.clone(), Epoch::new())
                .with_profile(Profile::Dyslexia, AdaptationOptions::default())
                .with_root(doc.document_root()),
        );
        let reading = ReadingSupport::attach(ctx, &blocks, DyslexiaConfig::default());
        (doc, reading, client, sink)
    }

    const TEXT: &str = "Plants take in water through their roots and carry it up the stem to every leaf.";

    #[tokio::test]
    async fn test_prefetch_stays_collapsed_until_revealed() {
        let (doc, reading, _client, sink) = setup(vec![paragraph("a", TEXT)]);
        reading.wait_idle().await;

        let job = reading.job_for_block(0).unwrap();
        assert_eq!(reading.job_state(job), Some(JobState::Completed));
        let (_, view) = doc.supports()[0].clone();
        assert!(!view.visible);
        assert_eq!(view.button_label, SHOW_LABEL);
        assert_eq!(sink.progress_updates(), vec![(1, 1)]);

        assert!(reading.request_reveal(job));
        let (_, view) = doc.supports()[0].clone();
        assert!(view.visible);
        assert_eq!(view.button_label, HIDE_LABEL);
        assert_eq!(view.content.as_deref(), Some("<p>Easy: 80</p>"));

        reading.request_reveal(job);
        assert!(!doc.supports()[0].1.visible);
    }

    #[tokio::test]
    async fn test_large_section_not_prefetched() {
        let long = vec![TEXT; 20].join(" ");
        let (doc, reading, client, _sink) = setup(vec![paragraph("a", &long)]);
        reading.wait_idle().await;

        let job = reading.job_for_block(0).unwrap();
        assert_eq!(reading.job_state(job), Some(JobState::Idle));
        assert_eq!(client.calls.load(Ordering::SeqCst), 0);
        assert_eq!(doc.supports()[0].1.status, LARGE_SECTION_HINT);

        reading.request_reveal(job);
        assert_eq!(doc.supports()[0].1.button_label, GENERATING_LABEL);
        reading.wait_idle().await;

        assert_eq!(reading.job_state(job), Some(JobState::Completed));
        // 1619 chars split at sentence boundaries into two chunks
        assert_eq!(client.calls.load(Ordering::SeqCst), 2);
        let view = doc.supports()[0].1.clone();
        assert!(view.visible);
        assert_eq!(view.content.unwrap().matches("Easy:").count(), 2);
    }

    #[tokio::test]
    async fn test_failure_then_retry() {
        let flaky = format!("{TEXT} This one is flaky today.");
        let (doc, reading, _client, sink) = setup(vec![paragraph("a", &flaky)]);
        reading.wait_idle().await;

        let job = reading.job_for_block(0).unwrap();
        assert_eq!(reading.job_state(job), Some(JobState::Failed));
        let view = doc.supports()[0].1.clone();
        assert_eq!(view.button_label, RETRY_LABEL);
        assert_eq!(view.status, "Model is warming up");

        assert!(reading.request_retry(job));
        reading.wait_idle().await;
        assert_eq!(reading.job_state(job), Some(JobState::Completed));
        assert!(doc.supports()[0].1.visible);
        // Retried completion is not counted twice
        assert_eq!(sink.progress_updates(), vec![(1, 1)]);
        assert!(!reading.request_retry(job));
    }

    #[tokio::test]
    async fn test_marker_prevents_second_affordance() {
        let (doc, reading, _client, _sink) = setup(vec![paragraph("a", TEXT)]);
        reading.wait_idle().await;

        let blocks = BlockExtractor::default().extract(&*doc, doc.document_root());
        let ctx = Arc::new(
            RunContext::new(
                doc.clone(),
                Arc::new(FlakyClient::default()),
                Arc::new(RecordingSink::new()),
                Epoch::new(),
            )
            .with_profile(Profile::Dyslexia, AdaptationOptions::default()),
        );
        let again = ReadingSupport::attach(ctx, &blocks, DyslexiaConfig::default());
        assert_eq!(again.job_count(), 0);
        assert_eq!(doc.supports().len(), 1);
    }
}
