//! Generic profile: the first blocks, one request at a time.

use tracing::{debug, info};

use super::{BatchOutcome, BatchProgress, RunContext};
use crate::config::SequentialConfig;
use crate::document::HostDocument;
use crate::types::Block;

/// Adapt up to `max_blocks` blocks in order, writing each result as it lands.
pub async fn run_sequential<H: HostDocument>(
    ctx: &RunContext<H>,
    blocks: &[Block],
    config: &SequentialConfig,
) -> BatchOutcome {
    let targets = &blocks[..blocks.len().min(config.max_blocks)];
    let progress = BatchProgress::new(ctx, targets.len());

    for block in targets {
        if !ctx.is_current() {
            debug!(run_id = %ctx.run_id, "Run superseded, stopping");
            break;
        }
        let success = ctx.adapt_block(block).await;
        progress.record(success);
    }

    let outcome = progress.outcome();
    info!(
        run_id = %ctx.run_id,
        succeeded = outcome.succeeded,
        total = outcome.total,
        "Sequential batch finished"
    );
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::MemoryDocument;
    use crate::extract::BlockExtractor;
    use crate::notify::RecordingSink;
    use crate::scheduler::Epoch;
    use eduadapt_agent::{AdaptationClient, AdaptationError, AdaptationOptions, Profile};
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    /// Echoes an uppercased copy; fails on texts containing "FAIL".
    #[derive(Default)]
    struct EchoClient {
        calls: Mutex<Vec<String>>,
    }

    #[async_trait::async_trait]
    impl AdaptationClient for EchoClient {
        async fn adapt(
            &self,
            text: &str,
            _profile: Profile,
            _options: &AdaptationOptions,
        ) -> Result<String, AdaptationError> {
            self.calls.lock().unwrap().push(text.to_string());
            if text.contains("FAIL") {
                return Err(AdaptationError::Rejected { user_message: None });
            }
            Ok(format!("Simple: {}", &text[..12]))
        }
    }

    fn paragraph(n: usize, marker: &str) -> serde_json::Value {
        json!({ "tag": "p", "id": format!("p{n}"), "children": [
            format!("Paragraph {n:02} {marker} explains one more fact about how rivers carve deep valleys.")
        ]})
    }

    #[tokio::test]
    async fn test_failure_isolated_and_progress_counts_all() {
        let doc = Arc::new(
            MemoryDocument::from_value(json!({
                "root": { "tag": "body", "children": [
                    paragraph(1, "ok"), paragraph(2, "FAIL"), paragraph(3, "ok")
                ]}
            }))
            .unwrap(),
        );
        let blocks = BlockExtractor::default().extract(&*doc, doc.document_root());
        assert_eq!(blocks.len(), 3);

        let client = Arc::new(EchoClient::default());
        let sink = Arc::new(RecordingSink::new());
        let ctx = RunContext::new(doc.clone(), client.clone(), sink.clone(), Epoch::new())
            .with_profile(Profile::Default, AdaptationOptions::default());

        let outcome = run_sequential(&ctx, &blocks, &SequentialConfig::default()).await;

        assert_eq!(outcome, BatchOutcome { succeeded: 2, total: 3 });
        assert_eq!(sink.progress_updates(), vec![(1, 3), (2, 3), (3, 3)]);
        let p2 = doc.find_by_id("p2").unwrap();
        assert_eq!(
            doc.rendered(p2).unwrap(),
            "<p class=\"eduadapt-error eduadapt-default\">This section could not be adapted.</p>"
        );
        let p1 = doc.find_by_id("p1").unwrap();
        assert_eq!(doc.rendered(p1).unwrap(), "<p>Simple: Paragraph 01</p>");
    }

    #[tokio::test]
    async fn test_stale_run_stops() {
        let doc = Arc::new(
            MemoryDocument::from_value(json!({
                "root": { "tag": "body", "children": [paragraph(1, "ok")] }
            }))
            .unwrap(),
        );
        let blocks = BlockExtractor::default().extract(&*doc, doc.document_root());
        let epoch = Epoch::new();
        let client = Arc::new(EchoClient::default());
        let ctx = RunContext::new(doc.clone(), client.clone(), Arc::new(RecordingSink::new()), epoch.clone());
        epoch.advance();

        let outcome = run_sequential(&ctx, &blocks, &SequentialConfig::default()).await;
        assert_eq!(outcome.succeeded, 0);
        assert!(client.calls.lock().unwrap().is_empty());
        assert_eq!(doc.mutation_count(), 0);
    }
}
