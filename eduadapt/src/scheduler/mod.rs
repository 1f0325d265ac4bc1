//! Profile scheduling.
//!
//! Decides which blocks to adapt, in what order, and how many requests are in
//! flight at once:
//!
//! - `default`: first blocks, one request at a time ([`sequential`])
//! - `adhd` / `autism`: placeholders, a sequential first batch, then a
//!   bounded worker pool ([`staged`])
//! - `dyslexia`: no eager rewriting; on-demand supported reading with a
//!   bounded prefetch queue ([`reading`])
//!
//! Cancellation is by epoch. Every run captures the epoch value it started
//! under and checks it after each await before touching the document.

pub mod chunk;
pub mod prefetch;
pub mod reading;
pub mod sequential;
pub mod staged;

use eduadapt_agent::AdaptationClient;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::SchedulerConfig;
use crate::document::{HostDocument, NodeId};
use crate::format::{escape, format_html};
use crate::notify::NotificationSink;
use crate::types::{AdaptationOptions, Block, Profile};

pub use reading::{JobId, JobState, ReadingSupport};

/// Monotonic run counter shared by a controller and its runs.
#[derive(Debug, Clone, Default)]
pub struct Epoch(Arc<AtomicU64>);

impl Epoch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }

    /// Invalidate all outstanding work; returns the new value.
    pub fn advance(&self) -> u64 {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }
}

/// Everything one adaptation run needs, created per `adapt_page` call.
pub struct RunContext<H: HostDocument> {
    pub run_id: Uuid,
    pub profile: Profile,
    pub options: AdaptationOptions,
    /// Extraction root; panels and themes attach here
    pub root: NodeId,
    pub host: Arc<H>,
    pub client: Arc<dyn AdaptationClient>,
    pub sink: Arc<dyn NotificationSink>,
    epoch: Epoch,
    version: u64,
}

impl<H: HostDocument> RunContext<H> {
    /// Create a context bound to the epoch's current value.
    pub fn new(
        host: Arc<H>,
        client: Arc<dyn AdaptationClient>,
        sink: Arc<dyn NotificationSink>,
        epoch: Epoch,
    ) -> Self {
        let version = epoch.current();
        Self {
            run_id: Uuid::new_v4(),
            profile: Profile::Default,
            options: AdaptationOptions::default(),
            root: NodeId::new(0),
            host,
            client,
            sink,
            epoch,
            version,
        }
    }

    pub fn with_run_id(mut self, run_id: Uuid) -> Self {
        self.run_id = run_id;
        self
    }

    pub fn with_profile(mut self, profile: Profile, options: AdaptationOptions) -> Self {
        self.profile = profile;
        self.options = options;
        self
    }

    pub fn with_root(mut self, root: NodeId) -> Self {
        self.root = root;
        self
    }

    /// The epoch value this run belongs to.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Whether no newer run or reset has happened since this run started.
    pub fn is_current(&self) -> bool {
        self.epoch.current() == self.version
    }

    /// Format adapted text and write it over the block.
    pub(crate) fn render_block(&self, block: &Block, adapted: &str) -> bool {
        let html = format_html(adapted, self.profile, block.kind, self.options.grade_level);
        self.write(block, &html)
    }

    /// Write a one-line notice (placeholder or error) over the block.
    pub(crate) fn write_notice(&self, block: &Block, class: &str, message: &str) -> bool {
        let html = format!(
            "<p class=\"{} eduadapt-{}\">{}</p>",
            class,
            self.profile,
            escape(message)
        );
        self.write(block, &html)
    }

    fn write(&self, block: &Block, html: &str) -> bool {
        match self.host.replace_content(block.locator, html) {
            Ok(()) => true,
            Err(err) => {
                warn!(run_id = %self.run_id, block = block.index, error = %err, "Block write failed");
                false
            }
        }
    }

    /// Adapt and render one block, isolating failures.
    pub(crate) async fn adapt_block(&self, block: &Block) -> bool {
        debug!(run_id = %self.run_id, block = block.index, "Adapting block");
        let result = self
            .client
            .adapt(&block.original_text, self.profile, &self.options)
            .await;

        if !self.is_current() {
            debug!(run_id = %self.run_id, block = block.index, epoch = self.version, "Dropping stale result");
            return false;
        }

        match result {
            Ok(adapted) => self.render_block(block, &adapted),
            Err(err) => {
                warn!(
                    run_id = %self.run_id,
                    block = block.index,
                    error = %err,
                    "Block adaptation failed"
                );
                self.write_notice(block, "eduadapt-error", failure_copy(self.profile));
                false
            }
        }
    }
}

/// Counts completed and successful blocks and reports progress.
pub(crate) struct BatchProgress<'a, H: HostDocument> {
    ctx: &'a RunContext<H>,
    total: usize,
    completed: AtomicUsize,
    succeeded: AtomicUsize,
}

impl<'a, H: HostDocument> BatchProgress<'a, H> {
    pub(crate) fn new(ctx: &'a RunContext<H>, total: usize) -> Self {
        Self {
            ctx,
            total,
            completed: AtomicUsize::new(0),
            succeeded: AtomicUsize::new(0),
        }
    }

    /// Record one finished block, successful or not.
    pub(crate) fn record(&self, success: bool) {
        if success {
            self.succeeded.fetch_add(1, Ordering::SeqCst);
        }
        let completed = self.completed.fetch_add(1, Ordering::SeqCst) + 1;
        if self.ctx.is_current() {
            self.ctx.sink.progress(completed, self.total);
        }
    }

    pub(crate) fn outcome(&self) -> BatchOutcome {
        BatchOutcome {
            succeeded: self.succeeded.load(Ordering::SeqCst),
            total: self.total,
        }
    }
}

/// Result of an eager batch run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchOutcome {
    pub succeeded: usize,
    pub total: usize,
}

/// Run the eager strategy for a batch profile.
///
/// Dyslexia has no eager strategy; see [`ReadingSupport`].
pub async fn run_batch<H: HostDocument>(
    ctx: &RunContext<H>,
    blocks: &[Block],
    config: &SchedulerConfig,
) -> BatchOutcome {
    match ctx.profile {
        Profile::Adhd => staged::run_staged(ctx, blocks, &config.adhd).await,
        Profile::Autism => staged::run_staged(ctx, blocks, &config.autism).await,
        Profile::Default | Profile::Dyslexia => {
            sequential::run_sequential(ctx, blocks, &config.default).await
        }
    }
}

/// Placeholder shown before a block is adapted.
pub fn pending_copy(profile: Profile, position: usize) -> Option<String> {
    match profile {
        Profile::Adhd => Some(format!("Preparing summary {position}…")),
        Profile::Autism => Some(format!("Preparing clear version {position}…")),
        Profile::Default | Profile::Dyslexia => None,
    }
}

/// Placeholder shown when a block could not be adapted.
pub fn failure_copy(profile: Profile) -> &'static str {
    match profile {
        Profile::Adhd => "Summary unavailable for this section.",
        Profile::Autism => "Clear version unavailable for this section.",
        Profile::Default | Profile::Dyslexia => "This section could not be adapted.",
    }
}
