//! Live candidate scoring: rank a project's historical reservations as
//! buyer-link suggestions for one property. Serving-time counterpart of the
//! batch resolvers; shares the normalizer and hint grammar, none of the
//! indexes. The caller decides whether to persist anything.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use unitlink_core::{compact, HintParser};

use crate::model::{
    Confidence, LinkStatus, PropertyRecord, RecordType, ReservationCandidate, ReservationRow,
    ReservationStatus,
};

/// Statuses that still describe a live purchase intent.
const LIVE_STATUSES: &[ReservationStatus] = &[
    ReservationStatus::PreRegistered,
    ReservationStatus::ReservationSent,
    ReservationStatus::Reserved,
    ReservationStatus::AdhesionPaid,
    ReservationStatus::ContractSigned,
];

/// Score one reservation against one property. Returns the additive score,
/// the human-readable reasons, and whether any unit-specific evidence
/// (code or structural token overlap) was seen.
pub fn score_reservation(
    property: &PropertyRecord,
    reservation: &ReservationRow,
    parser: &HintParser,
) -> (i32, Vec<String>, bool) {
    let mut score = 0;
    let mut reasons = Vec::new();
    let mut unit_specific = false;

    if property.record_type == RecordType::Project {
        score += 20;
        reasons.push("reserva de promocion".to_string());
    }

    let property_code = compact(&property.legacy_code);
    let reservation_code = compact(&reservation.unit_reference);
    if !property_code.is_empty() && property_code == reservation_code {
        score += 82;
        unit_specific = true;
        reasons.push("unit reference matches legacy code exactly".to_string());
    } else if !property_code.is_empty()
        && !reservation_code.is_empty()
        && (property_code.contains(&reservation_code) || reservation_code.contains(&property_code))
    {
        score += 58;
        unit_specific = true;
        reasons.push("unit reference overlaps legacy code".to_string());
    }

    let property_portal = parser.portal_token(&property.building_portal);
    let reservation_portal = parser.portal_token(&reservation.portal);
    if token_match(&property_portal, &reservation_portal) {
        score += 16;
        unit_specific = true;
        reasons.push("portal matches".to_string());
    }

    let property_floor = floor_of(&property.floor_label, property.floor_level, parser);
    let reservation_floor = floor_of(&reservation.floor_label, reservation.floor_level, parser);
    if token_match(&property_floor, &reservation_floor) {
        score += 16;
        unit_specific = true;
        reasons.push("floor matches".to_string());
    }

    let property_door = parser.letter_token(&property.building_door);
    let reservation_door = parser.letter_token(&reservation.door);
    if token_match(&property_door, &reservation_door) {
        score += 16;
        unit_specific = true;
        reasons.push("door matches".to_string());
    }

    if LIVE_STATUSES.contains(&reservation.status) {
        score += 6;
        reasons.push("reservation state is live".to_string());
    }

    (score, reasons, unit_specific)
}

pub fn confidence_from_score(score: i32) -> Confidence {
    if score >= 82 {
        Confidence::High
    } else if score >= 56 {
        Confidence::Medium
    } else {
        Confidence::Low
    }
}

/// Score, filter, deduplicate, and rank a project's reservations for one
/// property. `max` is caller-supplied and clamped to 1..=200.
pub fn build_candidates(
    property: &PropertyRecord,
    reservations: &[ReservationRow],
    max: usize,
    parser: &HintParser,
) -> Vec<ReservationCandidate> {
    let unit_target = matches!(property.record_type, RecordType::Unit | RecordType::Single);

    let mut ranked: Vec<(ReservationCandidate, i64)> = Vec::new();
    for reservation in reservations {
        let (score, reasons, unit_specific) = score_reservation(property, reservation, parser);
        if score <= 0 {
            continue;
        }
        // A promotion-level reservation is never suggested for a specific
        // physical unit without structural evidence.
        if unit_target && !unit_specific {
            continue;
        }
        ranked.push((
            ReservationCandidate {
                client_id: reservation.client_id,
                reservation_id: reservation.reservation_id,
                match_score: score,
                confidence: confidence_from_score(score),
                reasons,
                unit_specific,
            },
            recency(reservation),
        ));
    }

    // One candidate per client: keep the higher score, breaking ties by
    // the more recent reservation.
    ranked.sort_by(|(a, a_recency), (b, b_recency)| {
        a.client_id
            .cmp(&b.client_id)
            .then(b.match_score.cmp(&a.match_score))
            .then(b_recency.cmp(a_recency))
    });
    ranked.dedup_by_key(|(candidate, _)| candidate.client_id);

    ranked.sort_by(|(a, a_recency), (b, b_recency)| {
        b.match_score
            .cmp(&a.match_score)
            .then(b_recency.cmp(a_recency))
    });
    ranked.truncate(max.clamp(1, 200));
    ranked.into_iter().map(|(candidate, _)| candidate).collect()
}

/// Link state as reported to the caller. `verified` reflects what the store
/// already holds; the engine only derives the label.
pub fn link_status(has_verified_link: bool, candidates: &[ReservationCandidate]) -> LinkStatus {
    if has_verified_link {
        LinkStatus::Verified
    } else if !candidates.is_empty() {
        LinkStatus::PendingVerification
    } else {
        LinkStatus::NotLinked
    }
}

fn token_match(a: &Option<String>, b: &Option<String>) -> bool {
    matches!((a, b), (Some(a), Some(b)) if a == b)
}

fn floor_of(label: &str, level: Option<i32>, parser: &HintParser) -> Option<String> {
    parser
        .floor_token(label)
        .or_else(|| level.map(|n| n.to_string()))
}

/// Latest parsable timestamp among the reservation's date fields;
/// unparsable everything ranks as 0 (oldest).
fn recency(reservation: &ReservationRow) -> i64 {
    [
        &reservation.reservation_date,
        &reservation.created_at,
        &reservation.drop_date,
    ]
    .into_iter()
    .filter_map(|text| parse_timestamp(text))
    .max()
    .unwrap_or(0)
}

fn parse_timestamp(text: &str) -> Option<i64> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.timestamp());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S") {
        return Some(dt.and_utc().timestamp());
    }
    if let Ok(d) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return Some(d.and_hms_opt(0, 0, 0)?.and_utc().timestamp());
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser() -> HintParser {
        HintParser::new()
    }

    fn unit(legacy_code: &str) -> PropertyRecord {
        PropertyRecord {
            id: 1,
            legacy_code: legacy_code.into(),
            project_legacy_code: "PROJ".into(),
            record_type: RecordType::Unit,
            building_portal: "2".into(),
            floor_label: "3".into(),
            floor_level: Some(3),
            building_door: "B".into(),
        }
    }

    fn promotion() -> PropertyRecord {
        PropertyRecord {
            id: 2,
            legacy_code: "PROJ".into(),
            project_legacy_code: "PROJ".into(),
            record_type: RecordType::Project,
            building_portal: String::new(),
            floor_label: String::new(),
            floor_level: None,
            building_door: String::new(),
        }
    }

    fn reservation(id: i64, client_id: i64, unit_reference: &str) -> ReservationRow {
        ReservationRow {
            reservation_id: id,
            client_id,
            unit_reference: unit_reference.into(),
            portal: String::new(),
            floor_label: String::new(),
            floor_level: None,
            door: String::new(),
            status: ReservationStatus::Reserved,
            reservation_date: "2019-06-01".into(),
            created_at: String::new(),
            drop_date: String::new(),
        }
    }

    #[test]
    fn exact_code_scores_high() {
        let (score, _, unit_specific) = score_reservation(
            &unit("PROJ-B1P2_3B"),
            &reservation(1, 10, "proj-b1p2_3b"),
            &parser(),
        );
        assert_eq!(score, 82 + 6);
        assert!(unit_specific);
        assert_eq!(confidence_from_score(score), Confidence::High);
    }

    #[test]
    fn partial_code_scores_medium() {
        let (score, _, unit_specific) =
            score_reservation(&unit("PROJ-B1P2_3B"), &reservation(1, 10, "B1P2_3B"), &parser());
        assert_eq!(score, 58 + 6);
        assert!(unit_specific);
        assert_eq!(confidence_from_score(score), Confidence::Medium);
    }

    #[test]
    fn structural_tokens_add_up() {
        let mut res = reservation(1, 10, "otra cosa");
        res.portal = "Portal 2".into();
        res.floor_label = "Planta 3".into();
        res.door = "b".into();
        let (score, reasons, unit_specific) = score_reservation(&unit("PROJ-77"), &res, &parser());
        assert_eq!(score, 16 * 3 + 6);
        assert!(unit_specific);
        assert_eq!(reasons.len(), 4);
    }

    #[test]
    fn cancelled_reservation_gets_no_state_bonus() {
        let mut res = reservation(1, 10, "PROJ-77");
        res.status = ReservationStatus::Cancelled;
        let (score, _, _) = score_reservation(&unit("PROJ-77"), &res, &parser());
        assert_eq!(score, 82);
    }

    #[test]
    fn promotion_reservation_kept_for_project_target() {
        let candidates =
            build_candidates(&promotion(), &[reservation(1, 10, "")], 50, &parser());
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].match_score, 20 + 6);
        assert_eq!(candidates[0].confidence, Confidence::Low);
        assert!(!candidates[0].unit_specific);
    }

    #[test]
    fn generic_reservation_discarded_for_unit_target() {
        // Positive score but zero structural evidence: never suggested for
        // a physical unit.
        let candidates =
            build_candidates(&unit("PROJ-77"), &[reservation(1, 10, "sin datos")], 50, &parser());
        assert!(candidates.is_empty());
    }

    #[test]
    fn zero_score_discarded() {
        let mut res = reservation(1, 10, "");
        res.status = ReservationStatus::Cancelled;
        let (score, _, _) = score_reservation(&unit("PROJ-77"), &res, &parser());
        assert_eq!(score, 0);
        let candidates = build_candidates(&unit("PROJ-77"), &[res], 50, &parser());
        assert!(candidates.is_empty());
    }

    #[test]
    fn dedup_by_client_keeps_higher_score() {
        let weaker = {
            let mut r = reservation(1, 10, "B1P2_3B");
            r.reservation_date = "2021-01-01".into();
            r
        };
        let stronger = reservation(2, 10, "PROJ-B1P2_3B");
        let candidates =
            build_candidates(&unit("PROJ-B1P2_3B"), &[weaker, stronger], 50, &parser());
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].reservation_id, 2);
        assert_eq!(candidates[0].match_score, 88);
    }

    #[test]
    fn equal_scores_tie_break_on_recency() {
        let older = {
            let mut r = reservation(1, 10, "PROJ-B1P2_3B");
            r.reservation_date = "2018-01-01".into();
            r
        };
        let newer = {
            let mut r = reservation(2, 10, "PROJ-B1P2_3B");
            r.reservation_date = "2020-01-01".into();
            r.drop_date = "not a date".into();
            r
        };
        let candidates = build_candidates(&unit("PROJ-B1P2_3B"), &[older, newer], 50, &parser());
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].reservation_id, 2);
    }

    #[test]
    fn ranking_and_truncation() {
        let rows: Vec<ReservationRow> = (0..5)
            .map(|i| {
                let mut r = reservation(i, 100 + i, "B1P2_3B");
                if i == 3 {
                    r.unit_reference = "PROJ-B1P2_3B".into();
                }
                r
            })
            .collect();
        let candidates = build_candidates(&unit("PROJ-B1P2_3B"), &rows, 2, &parser());
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].reservation_id, 3, "exact match ranks first");
        assert!(candidates[0].match_score > candidates[1].match_score);
    }

    #[test]
    fn link_status_derivation() {
        let candidate = ReservationCandidate {
            client_id: 1,
            reservation_id: 1,
            match_score: 60,
            confidence: Confidence::Medium,
            reasons: vec![],
            unit_specific: true,
        };
        assert_eq!(link_status(true, &[]), LinkStatus::Verified);
        assert_eq!(link_status(false, &[candidate]), LinkStatus::PendingVerification);
        assert_eq!(link_status(false, &[]), LinkStatus::NotLinked);
    }
}
