//! History loading for the dashboard.
//!
//! Pages through an `ExecutionStore` to collect a user's full history, which
//! is then handed to the aggregation functions in `stats`.

use crate::store::{ExecutionStore, Page};
use crate::{CompletedExecution, Result};
use std::collections::HashSet;

/// Page size used when walking a store
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Load every record for a user, newest first
///
/// Automatically deduplicates records that appear more than once.
pub fn load_all_executions(
    store: &impl ExecutionStore,
    user_id: &str,
    page_size: usize,
) -> Result<Vec<CompletedExecution>> {
    let page_size = page_size.max(1);
    let mut records = Vec::new();
    let mut seen_ids = HashSet::new();
    let mut skip = 0;

    loop {
        let page = store.list_completed_executions(
            user_id,
            Page {
                skip,
                limit: page_size,
            },
        )?;
        let fetched = page.len();

        for record in page {
            if seen_ids.insert(record.id) {
                records.push(record);
            }
        }

        if fetched < page_size {
            break;
        }
        skip += page_size;
    }

    records.sort_by(|a, b| b.started_at.cmp(&a.started_at));

    tracing::info!("Loaded {} executions for user {}", records.len(), user_id);
    Ok(records)
}

/// The most recent execution of a given template
pub fn find_last_for_template<'a>(
    records: &'a [CompletedExecution],
    template_id: &str,
) -> Option<&'a CompletedExecution> {
    records
        .iter()
        .filter(|r| r.template_id.as_deref() == Some(template_id))
        .max_by_key(|r| r.started_at)
}
