use std::collections::BTreeMap;

use crate::model::{DraftLinkRow, LinkSummary, SourceCounts};

/// Compute run statistics from the finished draft set.
pub fn compute_summary(
    drafts: &[DraftLinkRow],
    rows_skipped: usize,
    deactivated_by_arbiter: usize,
) -> LinkSummary {
    let mut by_source: BTreeMap<String, SourceCounts> = BTreeMap::new();
    let mut client_matched = 0;
    let mut property_matched = 0;
    let mut ready_to_apply = 0;

    for draft in drafts {
        let counts = by_source.entry(draft.row.source_file.clone()).or_default();
        counts.rows += 1;
        if draft.client_match.matched() {
            client_matched += 1;
            counts.client_matched += 1;
        }
        if draft.property_match.matched() {
            property_matched += 1;
            counts.property_matched += 1;
        }
        if draft.ready_to_apply {
            ready_to_apply += 1;
            counts.ready_to_apply += 1;
        }
    }

    LinkSummary {
        rows_processed: drafts.len(),
        rows_skipped,
        client_matched,
        property_matched,
        ready_to_apply,
        deactivated_by_arbiter,
        by_source,
    }
}
