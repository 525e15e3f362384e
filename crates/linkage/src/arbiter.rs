//! Conflict arbitration: when several ready-to-apply rows claim the same
//! physical unit, exactly one stays active. Ranking is deterministic:
//! reservation-state priority first, then the later source row (later rows
//! carry the more recent information). Losers are kept, deactivated, and
//! annotated for audit.

use std::cmp::Reverse;
use std::collections::BTreeMap;

use unitlink_core::canonical;

use crate::model::DraftLinkRow;

/// Note appended to every row the arbiter deactivates.
pub const CONFLICT_NOTE: &str = "superseded by a higher-ranked claim on the same unit";

/// State texts that mark a reservation as no longer live.
const INACTIVE_MARKERS: &[&str] = &["cancelacion", "cancelada", "cancel", "baja", "descart"];

/// Ordered priority tiers over free-text reservation states. First matching
/// tier wins; anything unrecognized ranks lowest.
const STATE_PRIORITY: &[(&str, i32)] = &[
    ("contrato firmado", 80),
    ("contrato compraventa enviado", 70),
    ("reserva firmado", 60),
    ("reserva enviado", 50),
    ("reserva", 40),
    ("preinscripcion", 30),
    ("interes", 20),
];

pub fn is_inactive_state(state_text: &str) -> bool {
    let state = canonical(state_text);
    INACTIVE_MARKERS.iter().any(|marker| state.contains(marker))
}

pub fn reservation_state_priority(state_text: &str) -> i32 {
    let state = canonical(state_text);
    for (marker, priority) in STATE_PRIORITY {
        if state.contains(marker) {
            return *priority;
        }
    }
    10
}

/// Post-pass over a complete batch. Groups ready+active rows by resolved
/// property, keeps the top-ranked row of each group active, deactivates the
/// rest. Returns the number of rows deactivated.
pub fn arbitrate(drafts: &mut [DraftLinkRow]) -> usize {
    let mut claims: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
    for (i, draft) in drafts.iter().enumerate() {
        if !(draft.ready_to_apply && draft.is_active) {
            continue;
        }
        if let Some(property_id) = draft.property_match.entity_id {
            claims.entry(property_id).or_default().push(i);
        }
    }

    let mut deactivated = 0;
    for (_, mut members) in claims {
        if members.len() <= 1 {
            continue;
        }
        members.sort_by_key(|&i| {
            (
                Reverse(reservation_state_priority(&drafts[i].row.reservation_state_text)),
                Reverse(drafts[i].row.source_row_number),
            )
        });
        for &i in &members[1..] {
            drafts[i].is_active = false;
            drafts[i].arbiter_note = CONFLICT_NOTE.to_string();
            deactivated += 1;
        }
    }
    deactivated
}
