//! Demo: submit a plain-text invoice, watch it retry, poll to completion.

use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tracing::info;
use tracing_subscriber::EnvFilter;

use sifter_core::app::AppBuilder;
use sifter_core::config::SifterConfig;
use sifter_core::domain::ExtractionError;
use sifter_core::impls::canned::sample_result;
use sifter_core::ports::ExtractionClient;

/// Fails the first `n` extractions, then returns the canned invoice payload.
/// Lets the demo show the retry path without a real provider.
struct FlakyExtractor {
    remaining_failures: AtomicU32,
}

impl FlakyExtractor {
    fn new(n: u32) -> Self {
        Self {
            remaining_failures: AtomicU32::new(n),
        }
    }
}

#[async_trait]
impl ExtractionClient for FlakyExtractor {
    async fn extract_structured(&self, _text: &str) -> Result<serde_json::Value, ExtractionError> {
        let left = self.remaining_failures.load(Ordering::Relaxed);
        if left > 0 {
            self.remaining_failures.fetch_sub(1, Ordering::Relaxed);
            return Err(ExtractionError::Provider(format!(
                "intentional failure (left={left})"
            )));
        }
        Ok(sample_result())
    }

    fn name(&self) -> &str {
        "flaky-demo"
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // (A) 設定と App を用意（本物のプロバイダを使うなら .extractor() を外して
    //     SIFTER_PROVIDER_* を設定する）
    let mut config = SifterConfig::from_env();
    config.retry_base_delay_ms = 200; // デモなのでリトライは短く
    let app = AppBuilder::new(config)
        .extractor(Arc::new(FlakyExtractor::new(2)))
        .build()
        .expect("wiring failed");

    // (B) 3行のテキスト請求書を投入
    let invoice = "ACME Tools Ltd.\nWidget x3 @ 19.90 EUR\nTotal: 59.70 EUR\n";
    let task_id = app
        .submit(
            invoice.as_bytes().to_vec(),
            "text/plain",
            Some("invoice-042.txt".to_string()),
        )
        .await
        .expect("submit failed");
    info!(%task_id, "accepted");

    // (C) 完了をポーリングで待つ（Completed / Failed のどちらか）
    loop {
        let view = app.get_status(task_id).await.expect("task exists");
        if view.state.is_terminal() {
            println!(
                "{}",
                serde_json::to_string_pretty(&view).expect("view serializes")
            );
            break;
        }
        sleep(Duration::from_millis(50)).await;
    }

    info!(counts = ?app.counts().await.expect("counts"), "store counts");

    // (D) graceful shutdown: キューを閉じ、やりかけを待ってから抜ける
    app.shutdown().await;
}
