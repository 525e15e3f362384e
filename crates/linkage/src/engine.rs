use unitlink_core::HintParser;

use crate::arbiter;
use crate::config::{LinkConfig, SourceConfig};
use crate::error::LinkError;
use crate::index::LinkIndexes;
use crate::model::{
    ClientRecord, Confidence, DraftLinkRow, LinkInput, LinkMeta, LinkResult, PropertyHintRecord,
    PropertyRecord, RecordType, SourceRow,
};
use crate::resolve::{resolve_client, resolve_property};
use crate::summary::compute_summary;

/// Run one batch linkage pass. Builds the index snapshot, resolves every
/// source row, arbitrates conflicting claims, returns drafts + summary.
pub fn run(config: &LinkConfig, input: &LinkInput) -> Result<LinkResult, LinkError> {
    if input.clients.is_empty() {
        return Err(LinkError::EmptyCanonicalSet("client"));
    }
    if input.properties.is_empty() {
        return Err(LinkError::EmptyCanonicalSet("property"));
    }

    let parser = HintParser::new();
    let indexes = LinkIndexes::build(
        &input.clients,
        &input.properties,
        &input.property_hints,
        &parser,
    );
    let threshold = config.apply.min_confidence;

    let mut drafts: Vec<DraftLinkRow> = Vec::with_capacity(input.rows.len());
    let mut skipped = 0;
    for row in &input.rows {
        // No name, tax id, or email: nothing to resolve against. Counted,
        // not an error.
        if !row.has_identity() {
            skipped += 1;
            continue;
        }
        drafts.push(build_draft(row, &indexes, &parser, threshold));
    }

    let deactivated = arbiter::arbitrate(&mut drafts);
    let summary = compute_summary(&drafts, skipped, deactivated);

    Ok(LinkResult {
        meta: LinkMeta {
            config_name: config.name.clone(),
            apply_threshold: threshold,
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            run_at: chrono::Utc::now().to_rfc3339(),
        },
        summary,
        drafts,
    })
}

/// Resolve one row into a draft link. Pure per-row transform over the
/// shared indexes; rows have no dependency on each other until the arbiter.
pub fn build_draft(
    row: &SourceRow,
    indexes: &LinkIndexes,
    parser: &HintParser,
    threshold: Confidence,
) -> DraftLinkRow {
    let hint = parser.parse_unit_hints(
        &row.unit_reference,
        &row.unit_portal,
        &row.unit_floor,
        &row.unit_letter,
    );
    let client_match = resolve_client(row, indexes);
    let property_match = resolve_property(row, &hint, indexes);

    let ready_to_apply = client_match.matched()
        && property_match.matched()
        && client_match.confidence >= threshold
        && property_match.confidence >= threshold;
    let is_active = !arbiter::is_inactive_state(&row.reservation_state_text);

    DraftLinkRow {
        row: row.clone(),
        client_match,
        property_match,
        ready_to_apply,
        is_active,
        arbiter_note: String::new(),
    }
}

/// Load CSV rows into SourceRows, applying the source's column mapping.
/// `source_row_number` continues the sheet's own numbering: the line after
/// the header row is `header_row + 1`.
pub fn load_source_rows(
    source_name: &str,
    csv_data: &str,
    source_config: &SourceConfig,
) -> Result<Vec<SourceRow>, LinkError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(csv_data.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| LinkError::Io(e.to_string()))?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let col = &source_config.columns;

    let idx = |name: &str| -> Result<usize, LinkError> {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| LinkError::MissingColumn {
                source: source_name.into(),
                column: name.into(),
            })
    };
    let opt_idx = |name: &Option<String>| -> Result<Option<usize>, LinkError> {
        match name {
            Some(name) => idx(name).map(Some),
            None => Ok(None),
        }
    };

    let full_name_idx = idx(&col.full_name)?;
    let tax_id_idx = idx(&col.tax_id)?;
    let email_idx = idx(&col.email)?;
    let unit_reference_idx = idx(&col.unit_reference)?;
    let reservation_state_idx = idx(&col.reservation_state)?;
    let phone_idx = opt_idx(&col.phone)?;
    let unit_portal_idx = opt_idx(&col.unit_portal)?;
    let unit_floor_idx = opt_idx(&col.unit_floor)?;
    let unit_letter_idx = opt_idx(&col.unit_letter)?;
    let project_idx = opt_idx(&col.project_legacy_code)?;

    let mut rows = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let record = record.map_err(|e| LinkError::Io(e.to_string()))?;
        let field = |idx: usize| record.get(idx).unwrap_or("").trim().to_string();
        let opt_field = |idx: Option<usize>| idx.map(&field).unwrap_or_default();

        rows.push(SourceRow {
            full_name: field(full_name_idx),
            email: field(email_idx),
            phone: opt_field(phone_idx),
            tax_id: field(tax_id_idx),
            unit_reference: field(unit_reference_idx),
            unit_portal: opt_field(unit_portal_idx),
            unit_floor: opt_field(unit_floor_idx),
            unit_letter: opt_field(unit_letter_idx),
            project_legacy_code: opt_field(project_idx),
            reservation_state_text: field(reservation_state_idx),
            source_file: source_config.file.clone(),
            source_row_number: source_config.header_row + 1 + i as u32,
        });
    }

    Ok(rows)
}

// ---------------------------------------------------------------------------
// Canonical snapshots
// ---------------------------------------------------------------------------

/// Header index lookup over a fixed-layout canonical export.
fn canonical_header_idx(
    source: &str,
    headers: &csv::StringRecord,
    column: &str,
) -> Result<usize, LinkError> {
    headers
        .iter()
        .position(|h| h == column)
        .ok_or_else(|| LinkError::MissingColumn {
            source: source.into(),
            column: column.into(),
        })
}

/// Load the canonical client snapshot: `id,tax_id,email,full_name`.
pub fn load_clients(csv_data: &str) -> Result<Vec<ClientRecord>, LinkError> {
    let mut reader = csv::Reader::from_reader(csv_data.as_bytes());
    let headers = reader.headers().map_err(|e| LinkError::Io(e.to_string()))?.clone();
    let id_idx = canonical_header_idx("clients", &headers, "id")?;
    let tax_id_idx = canonical_header_idx("clients", &headers, "tax_id")?;
    let email_idx = canonical_header_idx("clients", &headers, "email")?;
    let full_name_idx = canonical_header_idx("clients", &headers, "full_name")?;

    let mut clients = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| LinkError::Io(e.to_string()))?;
        let field = |idx: usize| record.get(idx).unwrap_or("").trim().to_string();
        let id = field(id_idx)
            .parse::<i64>()
            .map_err(|_| LinkError::SourceParse(format!("clients: bad id {:?}", field(id_idx))))?;
        clients.push(ClientRecord {
            id,
            tax_id: field(tax_id_idx),
            email: field(email_idx),
            full_name: field(full_name_idx),
        });
    }
    Ok(clients)
}

/// Load the canonical property snapshot:
/// `id,legacy_code,project_legacy_code,record_type,portal,floor,floor_level,door`.
pub fn load_properties(csv_data: &str) -> Result<Vec<PropertyRecord>, LinkError> {
    let mut reader = csv::Reader::from_reader(csv_data.as_bytes());
    let headers = reader.headers().map_err(|e| LinkError::Io(e.to_string()))?.clone();
    let id_idx = canonical_header_idx("properties", &headers, "id")?;
    let code_idx = canonical_header_idx("properties", &headers, "legacy_code")?;
    let project_idx = canonical_header_idx("properties", &headers, "project_legacy_code")?;
    let type_idx = canonical_header_idx("properties", &headers, "record_type")?;
    let portal_idx = canonical_header_idx("properties", &headers, "portal")?;
    let floor_idx = canonical_header_idx("properties", &headers, "floor")?;
    let level_idx = canonical_header_idx("properties", &headers, "floor_level")?;
    let door_idx = canonical_header_idx("properties", &headers, "door")?;

    let mut properties = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| LinkError::Io(e.to_string()))?;
        let field = |idx: usize| record.get(idx).unwrap_or("").trim().to_string();
        let id = field(id_idx).parse::<i64>().map_err(|_| {
            LinkError::SourceParse(format!("properties: bad id {:?}", field(id_idx)))
        })?;
        let record_type = match field(type_idx).to_lowercase().as_str() {
            "project" => RecordType::Project,
            "unit" => RecordType::Unit,
            "single" => RecordType::Single,
            other => {
                return Err(LinkError::SourceParse(format!(
                    "properties: unknown record_type {other:?} (id {id})"
                )))
            }
        };
        let level = field(level_idx);
        let floor_level = if level.is_empty() {
            None
        } else {
            Some(level.parse::<i32>().map_err(|_| {
                LinkError::SourceParse(format!("properties: bad floor_level {level:?} (id {id})"))
            })?)
        };
        properties.push(PropertyRecord {
            id,
            legacy_code: field(code_idx),
            project_legacy_code: field(project_idx),
            record_type,
            building_portal: field(portal_idx),
            floor_label: field(floor_idx),
            floor_level,
            building_door: field(door_idx),
        });
    }
    Ok(properties)
}

/// Load the optional auxiliary hint snapshot:
/// `property_id,block,portal,floor,letter` (empty cells mean "no hint").
pub fn load_property_hints(csv_data: &str) -> Result<Vec<PropertyHintRecord>, LinkError> {
    let mut reader = csv::Reader::from_reader(csv_data.as_bytes());
    let headers = reader.headers().map_err(|e| LinkError::Io(e.to_string()))?.clone();
    let id_idx = canonical_header_idx("property_hints", &headers, "property_id")?;
    let block_idx = canonical_header_idx("property_hints", &headers, "block")?;
    let portal_idx = canonical_header_idx("property_hints", &headers, "portal")?;
    let floor_idx = canonical_header_idx("property_hints", &headers, "floor")?;
    let letter_idx = canonical_header_idx("property_hints", &headers, "letter")?;

    let mut hints = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| LinkError::Io(e.to_string()))?;
        let field = |idx: usize| {
            let value = record.get(idx).unwrap_or("").trim();
            (!value.is_empty()).then(|| value.to_string())
        };
        let raw_id = record.get(id_idx).unwrap_or("").trim();
        let property_id = raw_id.parse::<i64>().map_err(|_| {
            LinkError::SourceParse(format!("property_hints: bad property_id {raw_id:?}"))
        })?;
        hints.push(PropertyHintRecord {
            property_id,
            block: field(block_idx),
            portal: field(portal_idx),
            floor: field(floor_idx),
            letter: field(letter_idx),
        });
    }
    Ok(hints)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MatchMethod;

    fn client(id: i64, tax_id: &str, name: &str) -> ClientRecord {
        ClientRecord {
            id,
            tax_id: tax_id.into(),
            email: String::new(),
            full_name: name.into(),
        }
    }

    fn property(id: i64, legacy_code: &str, project: &str) -> PropertyRecord {
        PropertyRecord {
            id,
            legacy_code: legacy_code.into(),
            project_legacy_code: project.into(),
            record_type: RecordType::Unit,
            building_portal: String::new(),
            floor_label: String::new(),
            floor_level: None,
            building_door: String::new(),
        }
    }

    fn fixture_indexes() -> LinkIndexes {
        LinkIndexes::build(
            &[
                client(1, "111A", "Ana Gómez"),
                client(2, "", "Luis Marín"),
                client(3, "", "Luis Marin"),
            ],
            &[
                property(10, "PROJ-1", "PROJ"),
                property(11, "PROJ-B1P2_3C", "PROJ"),
            ],
            &[],
            &HintParser::new(),
        )
    }

    fn draft_for(tax_id: &str, name: &str, reference: &str, threshold: Confidence) -> DraftLinkRow {
        let row = SourceRow {
            full_name: name.into(),
            tax_id: tax_id.into(),
            unit_reference: reference.into(),
            project_legacy_code: "PROJ".into(),
            ..SourceRow::default()
        };
        build_draft(&row, &fixture_indexes(), &HintParser::new(), threshold)
    }

    #[test]
    fn ready_requires_both_sides_at_threshold() {
        // High client + High property.
        let draft = draft_for("111A", "", "PROJ-1", Confidence::Medium);
        assert_eq!(draft.client_match.confidence, Confidence::High);
        assert_eq!(draft.property_match.confidence, Confidence::High);
        assert!(draft.ready_to_apply);

        // Medium client (unique name) + Medium property (block tuple).
        let draft = draft_for("", "Ana Gomez", "Bloque 1, Planta 3, Puerta C", Confidence::Medium);
        assert_eq!(draft.client_match.confidence, Confidence::Medium);
        assert_eq!(draft.property_match.confidence, Confidence::Medium);
        assert!(draft.ready_to_apply);

        // Low client (ambiguous name) blocks readiness despite High property.
        let draft = draft_for("", "Luis Marin", "PROJ-1", Confidence::Medium);
        assert_eq!(draft.client_match.method, MatchMethod::FullNameAmbiguous);
        assert_eq!(draft.client_match.confidence, Confidence::Low);
        assert!(!draft.ready_to_apply);

        // High client + unmatched property.
        let draft = draft_for("111A", "", "no existe", Confidence::Medium);
        assert!(draft.client_match.matched());
        assert!(!draft.property_match.matched());
        assert!(!draft.ready_to_apply);

        // Unmatched client + High property.
        let draft = draft_for("999Z", "desconocido", "PROJ-1", Confidence::Medium);
        assert!(!draft.client_match.matched());
        assert!(!draft.ready_to_apply);
    }

    #[test]
    fn strict_threshold_rejects_medium() {
        let draft = draft_for("", "Ana Gomez", "Bloque 1, Planta 3, Puerta C", Confidence::High);
        assert_eq!(draft.client_match.confidence, Confidence::Medium);
        assert!(!draft.ready_to_apply, "medium must not clear a high threshold");

        let draft = draft_for("111A", "", "PROJ-1", Confidence::High);
        assert!(draft.ready_to_apply);
    }

    #[test]
    fn cancelled_state_starts_inactive() {
        let row = SourceRow {
            tax_id: "111A".into(),
            unit_reference: "PROJ-1".into(),
            project_legacy_code: "PROJ".into(),
            reservation_state_text: "Cancelada".into(),
            ..SourceRow::default()
        };
        let draft = build_draft(&row, &fixture_indexes(), &HintParser::new(), Confidence::Medium);
        assert!(draft.ready_to_apply);
        assert!(!draft.is_active);
    }

    #[test]
    fn run_rejects_empty_canonical_sets() {
        let config = LinkConfig::from_toml(CONFIG).unwrap();
        let input = LinkInput {
            clients: vec![],
            properties: vec![property(1, "PROJ-1", "PROJ")],
            ..LinkInput::default()
        };
        let err = run(&config, &input).unwrap_err();
        assert!(err.to_string().contains("client"));
    }

    const CONFIG: &str = r#"
name = "Ventas 2019"

[canonical]
clients    = "clients.csv"
properties = "properties.csv"

[sources.ventas]
file = "ventas.csv"
header_row = 1

[sources.ventas.columns]
full_name          = "Nombre"
tax_id             = "DNI"
email              = "Email"
unit_reference     = "Vivienda"
reservation_state  = "Estado"
project_legacy_code = "Promocion"
"#;

    #[test]
    fn load_csv_basic() {
        let csv = "\
Nombre,DNI,Email,Vivienda,Estado,Promocion
Ana Gómez,111A,ana@example.com,PROJ-10,Reserva,PROJ
Luis Marín,222B,,10,Contrato firmado,PROJ
";
        let config = LinkConfig::from_toml(CONFIG).unwrap();
        let rows = load_source_rows("ventas", csv, &config.sources["ventas"]).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].full_name, "Ana Gómez");
        assert_eq!(rows[0].source_file, "ventas.csv");
        assert_eq!(rows[0].source_row_number, 2);
        assert_eq!(rows[1].source_row_number, 3);
        assert_eq!(rows[1].unit_reference, "10");
        assert!(rows[1].phone.is_empty());
    }

    #[test]
    fn load_csv_header_row_offset() {
        let csv = "Nombre,DNI,Email,Vivienda,Estado,Promocion\nAna,111A,,1,Reserva,PROJ\n";
        let config_str = CONFIG.replace("header_row = 1", "header_row = 4");
        let config = LinkConfig::from_toml(&config_str).unwrap();
        let rows = load_source_rows("ventas", csv, &config.sources["ventas"]).unwrap();
        assert_eq!(rows[0].source_row_number, 5);
    }

    #[test]
    fn load_csv_missing_column() {
        let csv = "Nombre,DNI,Email,Estado,Promocion\n";
        let config = LinkConfig::from_toml(CONFIG).unwrap();
        let err = load_source_rows("ventas", csv, &config.sources["ventas"]).unwrap_err();
        assert!(err.to_string().contains("Vivienda"));
    }

    #[test]
    fn load_canonical_snapshots() {
        let clients =
            load_clients("id,tax_id,email,full_name\n1,111A,ana@example.com,Ana Gómez\n").unwrap();
        assert_eq!(clients.len(), 1);
        assert_eq!(clients[0].id, 1);
        assert_eq!(clients[0].full_name, "Ana Gómez");

        let properties = load_properties(
            "id,legacy_code,project_legacy_code,record_type,portal,floor,floor_level,door\n\
             10,PROJ-10,PROJ,unit,1,3º,3,B\n\
             20,PROJ,PROJ,project,,,,\n",
        )
        .unwrap();
        assert_eq!(properties.len(), 2);
        assert_eq!(properties[0].record_type, RecordType::Unit);
        assert_eq!(properties[0].floor_level, Some(3));
        assert_eq!(properties[1].record_type, RecordType::Project);
        assert_eq!(properties[1].floor_level, None);

        let hints = load_property_hints("property_id,block,portal,floor,letter\n10,,2,0,A\n").unwrap();
        assert_eq!(hints[0].property_id, 10);
        assert!(hints[0].block.is_none());
        assert_eq!(hints[0].portal.as_deref(), Some("2"));
    }

    #[test]
    fn load_canonical_rejects_bad_values() {
        let err = load_clients("id,tax_id,email,full_name\nx,111A,,Ana\n").unwrap_err();
        assert!(err.to_string().contains("bad id"));

        let err = load_properties(
            "id,legacy_code,project_legacy_code,record_type,portal,floor,floor_level,door\n\
             1,PROJ-1,PROJ,garage,,,,\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("record_type"));

        let err = load_clients("id,email,full_name\n1,,Ana\n").unwrap_err();
        assert!(err.to_string().contains("tax_id"));
    }

    #[test]
    fn integration_batch_run() {
        let csv = "\
Nombre,DNI,Email,Vivienda,Estado,Promocion
Ana Gómez,111A,,PROJ-10,Reserva,PROJ
Luis Marín,222B,,10,Contrato firmado,PROJ
,,,PROJ-10,Reserva,PROJ
Carmen Ruiz,333C,,desconocido,Reserva,OTRA
";
        let config = LinkConfig::from_toml(CONFIG).unwrap();
        let rows = load_source_rows("ventas", csv, &config.sources["ventas"]).unwrap();

        let input = LinkInput {
            clients: vec![client(1, "111A", "Ana Gómez"), client(2, "222B", "Luis Marín")],
            properties: vec![property(10, "PROJ-10", "PROJ")],
            property_hints: vec![],
            rows,
        };

        let result = run(&config, &input).unwrap();

        assert_eq!(result.summary.rows_processed, 3);
        assert_eq!(result.summary.rows_skipped, 1);
        assert_eq!(result.summary.client_matched, 2);
        assert_eq!(result.summary.property_matched, 2);
        assert_eq!(result.summary.ready_to_apply, 2);
        assert_eq!(result.summary.deactivated_by_arbiter, 1);
        assert_eq!(result.summary.by_source["ventas.csv"].rows, 3);

        // Both confident claims name unit 10; the signed contract wins.
        let ana = &result.drafts[0];
        let luis = &result.drafts[1];
        assert_eq!(ana.property_match.method, MatchMethod::LegacyCode);
        assert_eq!(luis.property_match.method, MatchMethod::ProjectUnitNumber);
        assert!(!ana.is_active);
        assert!(!ana.arbiter_note.is_empty());
        assert!(luis.is_active);

        // The unmatched row is retained, not ready.
        let carmen = &result.drafts[2];
        assert!(!carmen.ready_to_apply);
        assert_eq!(carmen.client_match.method, MatchMethod::None);
    }
}
