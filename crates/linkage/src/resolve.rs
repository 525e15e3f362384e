//! Client and property resolution: ordered fallback chains over the index
//! snapshot. Every step either returns a definitive `MatchResult` or falls
//! through; a miss is never an error. Ambiguous buckets resolve to the
//! first member but always carry a demoted confidence and a counting note.

use unitlink_core::{compact, UnitHint};

use crate::index::{ClientEntry, LinkIndexes, PropertyEntry};
use crate::model::{Confidence, MatchMethod, MatchResult, SourceRow};

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Resolve one source row to a canonical client. Order: tax id, email,
/// full name; each field short-circuits as soon as its key has a bucket.
pub fn resolve_client(row: &SourceRow, indexes: &LinkIndexes) -> MatchResult {
    let tax_key = compact(row.primary_tax_id());
    if !tax_key.is_empty() {
        if let Some(bucket) = indexes.client_by_tax_id.get(&tax_key) {
            return client_outcome(
                bucket,
                MatchMethod::TaxId,
                Confidence::High,
                MatchMethod::TaxIdAmbiguous,
                Confidence::Medium,
            );
        }
    }

    let email_key = compact(&row.email);
    if !email_key.is_empty() {
        if let Some(bucket) = indexes.client_by_email.get(&email_key) {
            return client_outcome(
                bucket,
                MatchMethod::Email,
                Confidence::High,
                MatchMethod::EmailAmbiguous,
                Confidence::Medium,
            );
        }
    }

    let name_key = compact(&row.full_name);
    if !name_key.is_empty() {
        if let Some(bucket) = indexes.client_by_name.get(&name_key) {
            return client_outcome(
                bucket,
                MatchMethod::FullName,
                Confidence::Medium,
                MatchMethod::FullNameAmbiguous,
                Confidence::Low,
            );
        }
    }

    MatchResult::none()
}

fn client_outcome(
    bucket: &[ClientEntry],
    unique_method: MatchMethod,
    unique_confidence: Confidence,
    ambiguous_method: MatchMethod,
    ambiguous_confidence: Confidence,
) -> MatchResult {
    if bucket.len() == 1 {
        MatchResult {
            entity_id: Some(bucket[0].id),
            method: unique_method,
            confidence: unique_confidence,
            note: String::new(),
        }
    } else {
        MatchResult {
            entity_id: Some(bucket[0].id),
            method: ambiguous_method,
            confidence: ambiguous_confidence,
            note: format!("{} candidates share this key", bucket.len()),
        }
    }
}

// ---------------------------------------------------------------------------
// Property
// ---------------------------------------------------------------------------

/// Resolve one source row to a canonical property, strongest method first:
/// exact legacy code, project+unit number, full structural tuple, partial
/// structural tuples, then a scoped substring pass over the project.
pub fn resolve_property(row: &SourceRow, hint: &UnitHint, indexes: &LinkIndexes) -> MatchResult {
    let reference_key = compact(&row.unit_reference);
    let project_key = compact(&row.project_legacy_code);

    // 1. Exact legacy code. Imports frequently omit the project prefix
    //    ("B1P2_3C" for "PROJ-B1P2_3C"), so a miss retries the reference
    //    qualified with the project code.
    if !reference_key.is_empty() {
        if let Some(bucket) = indexes.property_by_code.get(&reference_key) {
            if bucket.len() == 1 {
                return found(&bucket[0], MatchMethod::LegacyCode, Confidence::High);
            }
            if !project_key.is_empty() {
                let scoped: Vec<&PropertyEntry> =
                    bucket.iter().filter(|e| e.project_key == project_key).collect();
                if scoped.len() == 1 {
                    return found(scoped[0], MatchMethod::LegacyCodeProject, Confidence::High);
                }
            }
        }
        if !project_key.is_empty() {
            let qualified = format!("{project_key}{reference_key}");
            if let Some(bucket) = indexes.property_by_code.get(&qualified) {
                if bucket.len() == 1 {
                    return found(&bucket[0], MatchMethod::LegacyCode, Confidence::High);
                }
            }
        }
    }

    // 2. Bare unit number within a known project.
    if let Some(unit_number) = hint.unit_number {
        if !project_key.is_empty() {
            if let Some(bucket) = indexes
                .property_by_project_unit
                .get(&(project_key.clone(), unit_number))
            {
                return bucket_outcome(
                    bucket,
                    MatchMethod::ProjectUnitNumber,
                    Confidence::High,
                    MatchMethod::ProjectUnitNumberAmbiguous,
                    Confidence::Low,
                );
            }
        }
    }

    // 3. Full structural tuple.
    if !project_key.is_empty() {
        if let (Some(block), Some(portal), Some(floor), Some(letter)) =
            (&hint.block, &hint.portal, &hint.floor, &hint.letter)
        {
            let key = (
                project_key.clone(),
                block.clone(),
                portal.clone(),
                floor.clone(),
                letter.clone(),
            );
            if let Some(bucket) = indexes.property_by_structure.get(&key) {
                return bucket_outcome(
                    bucket,
                    MatchMethod::BlockPortalFloorDoor,
                    Confidence::High,
                    MatchMethod::BlockPortalFloorDoorAmbiguous,
                    Confidence::Low,
                );
            }
        }

        // 4. Block + floor + door.
        if let (Some(block), Some(floor), Some(letter)) = (&hint.block, &hint.floor, &hint.letter) {
            let key = (project_key.clone(), block.clone(), floor.clone(), letter.clone());
            if let Some(bucket) = indexes.property_by_block.get(&key) {
                return bucket_outcome(
                    bucket,
                    MatchMethod::BlockFloorDoor,
                    Confidence::Medium,
                    MatchMethod::BlockFloorDoorAmbiguous,
                    Confidence::Low,
                );
            }
        }

        // 5. Portal + floor + door. (Exactly one lookup: the legacy system
        //    checked this tuple against two identically-populated indexes.)
        if let (Some(portal), Some(floor), Some(letter)) = (&hint.portal, &hint.floor, &hint.letter)
        {
            let key = (project_key.clone(), portal.clone(), floor.clone(), letter.clone());
            if let Some(bucket) = indexes.property_by_portal.get(&key) {
                return bucket_outcome(
                    bucket,
                    MatchMethod::PortalFloorDoor,
                    Confidence::Medium,
                    MatchMethod::PortalFloorDoorAmbiguous,
                    Confidence::Low,
                );
            }
        }

        // 6. Last resort: a containment pass across the project's units.
        if !reference_key.is_empty() {
            if let Some(bucket) = indexes.property_by_project.get(&project_key) {
                let survivors: Vec<&PropertyEntry> = bucket
                    .iter()
                    .filter(|e| {
                        !e.legacy_code_key.is_empty()
                            && (e.legacy_code_key.contains(&reference_key)
                                || reference_key.contains(&e.legacy_code_key))
                    })
                    .collect();
                if survivors.len() == 1 {
                    return found(survivors[0], MatchMethod::ProjectLegacyPartial, Confidence::Low);
                }
            }
        }
    }

    MatchResult::none()
}

fn found(entry: &PropertyEntry, method: MatchMethod, confidence: Confidence) -> MatchResult {
    MatchResult {
        entity_id: Some(entry.id),
        method,
        confidence,
        note: String::new(),
    }
}

fn bucket_outcome(
    bucket: &[PropertyEntry],
    unique_method: MatchMethod,
    unique_confidence: Confidence,
    ambiguous_method: MatchMethod,
    ambiguous_confidence: Confidence,
) -> MatchResult {
    if bucket.len() == 1 {
        found(&bucket[0], unique_method, unique_confidence)
    } else {
        MatchResult {
            entity_id: Some(bucket[0].id),
            method: ambiguous_method,
            confidence: ambiguous_confidence,
            note: format!("{} units share this key", bucket.len()),
        }
    }
}
