use std::sync::Arc;

use reqwest::Client;
use tracing::{debug, info, instrument, warn};

use crate::adapters::{SourceAdapter, SourceQuery};
use crate::error::{FetchError, FetchErrorKind};
use crate::record::{SourceResult, Structured};
use crate::retry::{RetryGuard, RetryPolicy, with_retry};

pub type AdapterList<T> = Vec<Arc<dyn SourceAdapter<Output = T>>>;

/// Shared pieces every adapter call needs within one request.
#[derive(Debug, Clone)]
pub struct FetchContext {
    pub client: Client,
    pub retry: RetryPolicy,
    pub guard: RetryGuard,
}

impl FetchContext {
    pub fn new(client: Client, retry: RetryPolicy, guard: RetryGuard) -> Self {
        Self {
            client,
            retry,
            guard,
        }
    }
}

/// Tries `adapters` in order until one yields at least one structurally valid
/// record. Failures from earlier adapters stay in `errors` even on success.
/// Progress is written straight into `result`, so attempts and errors survive
/// if the caller drops this future at a deadline.
#[instrument(skip_all, fields(dataset = %result.dataset))]
pub async fn resolve_dataset<T>(
    result: &mut SourceResult<T>,
    adapters: &[Arc<dyn SourceAdapter<Output = T>>],
    query: &SourceQuery,
    ctx: &FetchContext,
) where
    T: Structured + Send + 'static,
{
    for adapter in adapters {
        let adapter: &dyn SourceAdapter<Output = T> = adapter.as_ref();
        let name = adapter.name();
        debug_assert_eq!(
            adapter.dataset(),
            result.dataset,
            "{name} registered under the wrong dataset"
        );
        result.attempted_adapters.push(name.to_string());

        if ctx.guard.cancel.is_cancelled() {
            result
                .errors
                .push(FetchError::new(name, FetchErrorKind::Cancelled, "not attempted"));
            continue;
        }

        let fetched = with_retry(&ctx.retry, &ctx.guard, |attempt| {
            debug!(adapter = name, attempt, "fetching");
            adapter.fetch(query, &ctx.client)
        })
        .await;

        match fetched {
            Ok(records) => {
                let total = records.len();
                let valid: Vec<T> = records
                    .into_iter()
                    .filter(|r| r.is_structurally_valid())
                    .collect();
                if valid.is_empty() {
                    warn!(adapter = name, total, "adapter returned no usable records");
                    result.errors.push(FetchError::empty(name));
                    continue;
                }
                info!(adapter = name, count = valid.len(), dropped = total - valid.len(), "dataset resolved");
                result.records = valid;
                result.successful_adapter = Some(name.to_string());
                return;
            }
            Err(err) => {
                warn!(adapter = name, "adapter failed: {err}");
                result.errors.push(err);
            }
        }
    }

    warn!(errors = result.errors.len(), "every adapter failed");
}
