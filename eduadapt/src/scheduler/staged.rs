//! Staged batches for the ADHD and autism profiles.
//!
//! 1. Select candidates (ADHD: blocks near the viewport first).
//! 2. Write a placeholder into every candidate.
//! 3. Adapt the first batch one at a time for a fast first impression.
//! 4. Adapt the rest with a small worker pool sharing an atomic cursor.
//!
//! The ADHD quick summary runs alongside as one independent request. Every
//! request, summary included, holds one of `pool_size` slots while in flight.

use futures::future::join_all;
use std::cmp::Ordering as CmpOrdering;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use super::{pending_copy, BatchOutcome, BatchProgress, RunContext};
use crate::config::{QuickSummaryConfig, StagedConfig};
use crate::document::HostDocument;
use crate::format::format_html;
use crate::types::{Block, BlockKind};

/// Run the staged strategy.
pub async fn run_staged<H: HostDocument>(
    ctx: &RunContext<H>,
    blocks: &[Block],
    config: &StagedConfig,
) -> BatchOutcome {
    let candidates = select_candidates(ctx, blocks, config);

    for (position, block) in candidates.iter().enumerate() {
        if let Some(copy) = pending_copy(ctx.profile, position + 1) {
            ctx.write_notice(block, "eduadapt-placeholder", &copy);
        }
    }

    let slots = Semaphore::new(config.pool_size.max(1));
    let summary = async {
        if let Some(summary_config) = &config.quick_summary {
            quick_summary(ctx, blocks, summary_config, &slots).await;
        }
    };
    let ((), outcome) = tokio::join!(summary, adapt_candidates(ctx, &candidates, config, &slots));

    info!(
        run_id = %ctx.run_id,
        profile = %ctx.profile,
        succeeded = outcome.succeeded,
        total = outcome.total,
        "Staged batch finished"
    );
    outcome
}

async fn adapt_candidates<H: HostDocument>(
    ctx: &RunContext<H>,
    candidates: &[Block],
    config: &StagedConfig,
    slots: &Semaphore,
) -> BatchOutcome {
    let progress = BatchProgress::new(ctx, candidates.len());
    let split = config.first_batch.min(candidates.len());
    let (first, rest) = candidates.split_at(split);

    for block in first {
        if !ctx.is_current() {
            return progress.outcome();
        }
        let Ok(_slot) = slots.acquire().await else {
            return progress.outcome();
        };
        progress.record(ctx.adapt_block(block).await);
    }

    let workers = config.pool_size.min(rest.len());
    debug!(run_id = %ctx.run_id, workers, remaining = rest.len(), "Starting worker pool");

    let cursor = AtomicUsize::new(0);
    join_all((0..workers).map(|_| {
        let cursor = &cursor;
        let progress = &progress;
        async move {
            loop {
                let index = cursor.fetch_add(1, Ordering::SeqCst);
                let Some(block) = rest.get(index) else {
                    break;
                };
                if !ctx.is_current() {
                    break;
                }
                let Ok(_slot) = slots.acquire().await else {
                    break;
                };
                progress.record(ctx.adapt_block(block).await);
            }
        }
    }))
    .await;

    progress.outcome()
}

/// Candidate blocks in adaptation order.
pub fn select_candidates<H: HostDocument>(
    ctx: &RunContext<H>,
    blocks: &[Block],
    config: &StagedConfig,
) -> Vec<Block> {
    let mut ordered = blocks.to_vec();
    if let Some(factor) = config.viewport_priority {
        prioritize_by_viewport(&*ctx.host, &mut ordered, factor);
    }
    ordered.truncate(config.max_candidates);
    ordered
}

/// Stable sort: blocks starting within `factor` viewport heights first, then
/// the rest, each by ascending position. Unmeasurable blocks go last.
pub fn prioritize_by_viewport<H: HostDocument + ?Sized>(host: &H, blocks: &mut [Block], factor: f64) {
    let limit = host.viewport_height().map(|height| height * factor);
    let rank = |block: &Block| -> (u8, f64) {
        let top = host
            .layout(block.locator)
            .ok()
            .and_then(|layout| layout.rect)
            .map(|rect| rect.y);
        match (top, limit) {
            (Some(y), Some(limit)) if y < limit => (0, y),
            (Some(y), _) => (1, y),
            (None, _) => (2, 0.0),
        }
    };

    let mut keyed: Vec<((u8, f64), Block)> = blocks.iter().map(|b| (rank(b), b.clone())).collect();
    keyed.sort_by(|(a, _), (b, _)| match a.0.cmp(&b.0) {
        CmpOrdering::Equal => a.1.total_cmp(&b.1),
        other => other,
    });
    for (slot, (_, block)) in blocks.iter_mut().zip(keyed) {
        *slot = block;
    }
}

/// Summary panel from the first blocks in document order.
async fn quick_summary<H: HostDocument>(
    ctx: &RunContext<H>,
    blocks: &[Block],
    config: &QuickSummaryConfig,
    slots: &Semaphore,
) {
    let combined = blocks
        .iter()
        .take(config.blocks)
        .map(|b| b.original_text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");
    let text = truncate_chars(&combined, config.max_chars);
    if text.trim().is_empty() {
        return;
    }

    let Ok(_slot) = slots.acquire().await else {
        return;
    };
    debug!(run_id = %ctx.run_id, chars = text.len(), "Requesting quick summary");
    let result = ctx.client.adapt(text, ctx.profile, &ctx.options).await;
    if !ctx.is_current() {
        debug!(run_id = %ctx.run_id, "Dropping stale quick summary");
        return;
    }

    match result {
        Ok(summary) => {
            let body = format_html(
                &summary,
                ctx.profile,
                BlockKind::Container,
                ctx.options.grade_level,
            );
            let panel = format!("<h3 class=\"eduadapt-summary-title\">Quick summary</h3>{body}");
            if let Err(err) = ctx.host.insert_panel(ctx.root, &panel) {
                warn!(run_id = %ctx.run_id, error = %err, "Could not insert quick summary");
            }
        }
        Err(err) => {
            warn!(run_id = %ctx.run_id, error = %err, "Quick summary failed");
        }
    }
}

/// Longest prefix of at most `max` characters.
pub fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}
