use std::collections::BTreeMap;

use regex::Regex;
use unitlink_core::{compact, HintParser};

use crate::model::{ClientRecord, PropertyHintRecord, PropertyRecord, RecordType};

// ---------------------------------------------------------------------------
// Entries
// ---------------------------------------------------------------------------

/// What a property bucket holds: enough to identify the record, filter by
/// project, and deduplicate.
#[derive(Debug, Clone)]
pub struct PropertyEntry {
    pub id: i64,
    pub legacy_code_key: String,
    pub project_key: String,
}

#[derive(Debug, Clone)]
pub struct ClientEntry {
    pub id: i64,
    pub name_key: String,
}

/// `(project, block, portal, floor, letter)`, all compact tokens.
pub type StructuralKey = (String, String, String, String, String);
/// `(project, block|portal, floor, letter)`.
pub type PartialKey = (String, String, String, String);

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// Immutable lookup snapshot built once per run and shared by reference
/// into the resolvers. Every value is a bucket; bucket length > 1 is how
/// ambiguity is represented, never an error.
#[derive(Debug, Default)]
pub struct LinkIndexes {
    pub property_by_code: BTreeMap<String, Vec<PropertyEntry>>,
    pub property_by_project: BTreeMap<String, Vec<PropertyEntry>>,
    pub property_by_project_unit: BTreeMap<(String, u32), Vec<PropertyEntry>>,
    pub property_by_structure: BTreeMap<StructuralKey, Vec<PropertyEntry>>,
    pub property_by_block: BTreeMap<PartialKey, Vec<PropertyEntry>>,
    pub property_by_portal: BTreeMap<PartialKey, Vec<PropertyEntry>>,
    pub client_by_tax_id: BTreeMap<String, Vec<ClientEntry>>,
    pub client_by_email: BTreeMap<String, Vec<ClientEntry>>,
    pub client_by_name: BTreeMap<String, Vec<ClientEntry>>,
}

impl LinkIndexes {
    pub fn build(
        clients: &[ClientRecord],
        properties: &[PropertyRecord],
        property_hints: &[PropertyHintRecord],
        parser: &HintParser,
    ) -> Self {
        let mut indexes = LinkIndexes::default();

        // Coded legacy suffix: "B<block>P<portal>_<floor+letter>".
        let re_coded = Regex::new(r"(?i)^B(\d{1,2})P(\d{1,2})_?(.*)$").unwrap();

        let hints_by_property: BTreeMap<i64, &PropertyHintRecord> = property_hints
            .iter()
            .map(|h| (h.property_id, h))
            .collect();

        for property in properties {
            // Project rows are containers, never link targets.
            if property.record_type == RecordType::Project {
                continue;
            }

            let entry = PropertyEntry {
                id: property.id,
                legacy_code_key: compact(&property.legacy_code),
                project_key: compact(&property.project_legacy_code),
            };

            if !entry.legacy_code_key.is_empty() {
                push_property(
                    indexes.property_by_code.entry(entry.legacy_code_key.clone()).or_default(),
                    &entry,
                );
            }
            if !entry.project_key.is_empty() {
                push_property(
                    indexes.property_by_project.entry(entry.project_key.clone()).or_default(),
                    &entry,
                );
            }

            // Structural tokens from the legacy-code suffix, then gaps
            // filled from the auxiliary hint record.
            let suffix = property
                .legacy_code
                .rsplit_once('-')
                .map(|(_, s)| s.trim())
                .unwrap_or("");

            let mut block = None;
            let mut portal = None;
            let mut floor = None;
            let mut letter = None;

            if !entry.project_key.is_empty() && !suffix.is_empty() {
                if let Ok(unit_number) = suffix.parse::<u32>() {
                    push_property(
                        indexes
                            .property_by_project_unit
                            .entry((entry.project_key.clone(), unit_number))
                            .or_default(),
                        &entry,
                    );
                } else if let Some(c) = re_coded.captures(suffix) {
                    block = normalize_number(&c[1]);
                    portal = normalize_number(&c[2]);
                    if let Some((f, l)) = parser.parse_suffix_floor_letter(&c[3]) {
                        floor = Some(f);
                        letter = Some(l);
                    }
                }
            }

            if let Some(aux) = hints_by_property.get(&property.id) {
                fill(&mut block, aux.block.clone());
                fill(&mut portal, aux.portal.clone());
                fill(&mut floor, aux.floor.clone());
                fill(&mut letter, aux.letter.clone());
            }

            if entry.project_key.is_empty() {
                continue;
            }
            if let (Some(floor), Some(letter)) = (&floor, &letter) {
                if let (Some(block), Some(portal)) = (&block, &portal) {
                    push_property(
                        indexes
                            .property_by_structure
                            .entry((
                                entry.project_key.clone(),
                                block.clone(),
                                portal.clone(),
                                floor.clone(),
                                letter.clone(),
                            ))
                            .or_default(),
                        &entry,
                    );
                }
                if let Some(block) = &block {
                    push_property(
                        indexes
                            .property_by_block
                            .entry((
                                entry.project_key.clone(),
                                block.clone(),
                                floor.clone(),
                                letter.clone(),
                            ))
                            .or_default(),
                        &entry,
                    );
                }
                if let Some(portal) = &portal {
                    push_property(
                        indexes
                            .property_by_portal
                            .entry((
                                entry.project_key.clone(),
                                portal.clone(),
                                floor.clone(),
                                letter.clone(),
                            ))
                            .or_default(),
                        &entry,
                    );
                }
            }
        }

        for client in clients {
            let entry = ClientEntry {
                id: client.id,
                name_key: compact(&client.full_name),
            };

            let tax_key = compact(&client.tax_id);
            if !tax_key.is_empty() {
                push_client(indexes.client_by_tax_id.entry(tax_key).or_default(), &entry);
            }
            let email_key = compact(&client.email);
            if !email_key.is_empty() {
                push_client(indexes.client_by_email.entry(email_key).or_default(), &entry);
            }
            if !entry.name_key.is_empty() {
                push_client_by_name(
                    indexes.client_by_name.entry(entry.name_key.clone()).or_default(),
                    &entry,
                );
            }
        }

        indexes
    }
}

/// Append unless an existing member already names the same identity: same
/// id, or same legacy code within the same project. Duplicate canonical
/// rows must not inflate ambiguity; two projects reusing one short code are
/// not duplicates.
fn push_property(bucket: &mut Vec<PropertyEntry>, entry: &PropertyEntry) {
    let duplicate = bucket.iter().any(|e| {
        e.id == entry.id
            || (!e.legacy_code_key.is_empty()
                && e.legacy_code_key == entry.legacy_code_key
                && e.project_key == entry.project_key)
    });
    if !duplicate {
        bucket.push(entry.clone());
    }
}

/// Tax-id and email buckets additionally dedupe by normalized name, so a
/// client imported twice does not read as an ambiguous key. The name bucket
/// itself dedupes by id only: distinct people sharing a name are real
/// ambiguity, not duplication.
fn push_client(bucket: &mut Vec<ClientEntry>, entry: &ClientEntry) {
    let duplicate = bucket
        .iter()
        .any(|e| e.id == entry.id || (!e.name_key.is_empty() && e.name_key == entry.name_key));
    if !duplicate {
        bucket.push(entry.clone());
    }
}

fn push_client_by_name(bucket: &mut Vec<ClientEntry>, entry: &ClientEntry) {
    if !bucket.iter().any(|e| e.id == entry.id) {
        bucket.push(entry.clone());
    }
}

fn fill(slot: &mut Option<String>, value: Option<String>) {
    if slot.is_none() {
        *slot = value;
    }
}

fn normalize_number(digits: &str) -> Option<String> {
    digits.parse::<u32>().ok().map(|n| n.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn property(id: i64, legacy_code: &str, project: &str, record_type: RecordType) -> PropertyRecord {
        PropertyRecord {
            id,
            legacy_code: legacy_code.into(),
            project_legacy_code: project.into(),
            record_type,
            building_portal: String::new(),
            floor_label: String::new(),
            floor_level: None,
            building_door: String::new(),
        }
    }

    fn client(id: i64, tax_id: &str, email: &str, full_name: &str) -> ClientRecord {
        ClientRecord {
            id,
            tax_id: tax_id.into(),
            email: email.into(),
            full_name: full_name.into(),
        }
    }

    fn build(properties: &[PropertyRecord], hints: &[PropertyHintRecord]) -> LinkIndexes {
        LinkIndexes::build(&[], properties, hints, &HintParser::new())
    }

    #[test]
    fn numeric_suffix_feeds_project_unit_index() {
        let properties = vec![
            property(1, "PROJ-12", "PROJ", RecordType::Unit),
            property(2, "PROJ-13", "PROJ", RecordType::Unit),
        ];
        let indexes = build(&properties, &[]);
        let bucket = &indexes.property_by_project_unit[&("proj".to_string(), 12)];
        assert_eq!(bucket.len(), 1);
        assert_eq!(bucket[0].id, 1);
        assert_eq!(indexes.property_by_project["proj"].len(), 2);
    }

    #[test]
    fn coded_suffix_feeds_structural_indexes() {
        let properties = vec![property(7, "PROJ-B1P2_3C", "PROJ", RecordType::Unit)];
        let indexes = build(&properties, &[]);

        let key = (
            "proj".to_string(),
            "1".to_string(),
            "2".to_string(),
            "3".to_string(),
            "C".to_string(),
        );
        assert_eq!(indexes.property_by_structure[&key][0].id, 7);

        let block_key = ("proj".to_string(), "1".to_string(), "3".to_string(), "C".to_string());
        assert_eq!(indexes.property_by_block[&block_key][0].id, 7);
        let portal_key = ("proj".to_string(), "2".to_string(), "3".to_string(), "C".to_string());
        assert_eq!(indexes.property_by_portal[&portal_key][0].id, 7);

        assert!(indexes.property_by_code.contains_key("projb1p23c"));
    }

    #[test]
    fn penthouse_coded_suffix() {
        let properties = vec![property(9, "RES-B2P1_ATB", "RES", RecordType::Unit)];
        let indexes = build(&properties, &[]);
        let key = (
            "res".to_string(),
            "2".to_string(),
            "1".to_string(),
            "AT".to_string(),
            "B".to_string(),
        );
        assert_eq!(indexes.property_by_structure[&key][0].id, 9);
    }

    #[test]
    fn auxiliary_hints_fill_structural_gaps() {
        // No coded suffix at all; the aux record supplies the whole tuple.
        let properties = vec![property(4, "RES-NAVE2", "RES", RecordType::Unit)];
        let hints = vec![PropertyHintRecord {
            property_id: 4,
            block: Some("1".into()),
            portal: Some("2".into()),
            floor: Some("0".into()),
            letter: Some("A".into()),
        }];
        let indexes = build(&properties, &hints);
        let key = (
            "res".to_string(),
            "1".to_string(),
            "2".to_string(),
            "0".to_string(),
            "A".to_string(),
        );
        assert_eq!(indexes.property_by_structure[&key][0].id, 4);
    }

    #[test]
    fn project_rows_are_excluded() {
        let properties = vec![
            property(1, "PROJ", "PROJ", RecordType::Project),
            property(2, "PROJ-1", "PROJ", RecordType::Unit),
        ];
        let indexes = build(&properties, &[]);
        assert!(!indexes.property_by_code.contains_key("proj"));
        assert_eq!(indexes.property_by_project["proj"].len(), 1);
    }

    #[test]
    fn duplicate_canonical_rows_do_not_inflate_buckets() {
        // Same legacy code imported twice under different ids.
        let properties = vec![
            property(1, "PROJ-5", "PROJ", RecordType::Unit),
            property(1, "PROJ-5", "PROJ", RecordType::Unit),
        ];
        let indexes = build(&properties, &[]);
        assert_eq!(indexes.property_by_code["proj5"].len(), 1);
        assert_eq!(indexes.property_by_project_unit[&("proj".to_string(), 5)].len(), 1);
    }

    #[test]
    fn client_indexes_compact_and_dedupe() {
        let clients = vec![
            client(1, "12.345.678-Z", "ana@example.com", "Ana Gómez"),
            client(2, "12345678Z", "", "Ana Gomez"),
            client(3, "", "", "Luis Marín"),
        ];
        let indexes = LinkIndexes::build(&clients, &[], &[], &HintParser::new());

        // Same tax id and same normalized name: deduped to one entry.
        assert_eq!(indexes.client_by_tax_id["12345678z"].len(), 1);
        // The name bucket keeps both ids; sharing a name is real ambiguity.
        assert_eq!(indexes.client_by_name["anagomez"].len(), 2);
        assert_eq!(indexes.client_by_name["luismarin"].len(), 1);
        assert!(indexes.client_by_email.contains_key("anaexamplecom"));
    }
}
