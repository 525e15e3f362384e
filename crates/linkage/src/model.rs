use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use unitlink_core::compact;

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// One imported legacy spreadsheet row. Immutable once parsed.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SourceRow {
    pub full_name: String,
    pub email: String,
    pub phone: String,
    /// Free text, possibly a slash/pipe-delimited list; only the first
    /// segment is ever used for matching.
    pub tax_id: String,
    pub unit_reference: String,
    pub unit_portal: String,
    pub unit_floor: String,
    pub unit_letter: String,
    pub project_legacy_code: String,
    pub reservation_state_text: String,
    pub source_file: String,
    /// 1-based line position within the source, used as a recency proxy.
    pub source_row_number: u32,
}

impl SourceRow {
    /// First segment of a possibly slash/pipe-delimited tax id list.
    pub fn primary_tax_id(&self) -> &str {
        self.tax_id
            .split(['/', '|'])
            .next()
            .map(str::trim)
            .unwrap_or("")
    }

    /// A row with no name, tax id, or email cannot be resolved and is
    /// skipped before it reaches the resolvers.
    pub fn has_identity(&self) -> bool {
        !compact(&self.full_name).is_empty()
            || !compact(self.primary_tax_id()).is_empty()
            || !compact(&self.email).is_empty()
    }
}

/// Canonical client record. Read-only input.
#[derive(Debug, Clone)]
pub struct ClientRecord {
    pub id: i64,
    pub tax_id: String,
    pub email: String,
    pub full_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordType {
    Project,
    Unit,
    Single,
}

/// Canonical property record. Read-only input.
#[derive(Debug, Clone)]
pub struct PropertyRecord {
    pub id: i64,
    pub legacy_code: String,
    pub project_legacy_code: String,
    pub record_type: RecordType,
    pub building_portal: String,
    pub floor_label: String,
    pub floor_level: Option<i32>,
    pub building_door: String,
}

/// Block/portal/floor/letter pre-extracted from other structured fields of
/// a property, where available. Feeds the structural indexes alongside what
/// the legacy code itself yields.
#[derive(Debug, Clone, Default)]
pub struct PropertyHintRecord {
    pub property_id: i64,
    pub block: Option<String>,
    pub portal: Option<String>,
    pub floor: Option<String>,
    pub letter: Option<String>,
}

/// Pre-loaded snapshot for one batch run, scoped to one organization.
#[derive(Debug, Clone, Default)]
pub struct LinkInput {
    pub clients: Vec<ClientRecord>,
    pub properties: Vec<PropertyRecord>,
    pub property_hints: Vec<PropertyHintRecord>,
    pub rows: Vec<SourceRow>,
}

// ---------------------------------------------------------------------------
// Match results
// ---------------------------------------------------------------------------

/// Totally ordered confidence tier. Ambiguous buckets are always demoted at
/// least one tier below the unambiguous outcome of the same method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    None,
    Low,
    Medium,
    High,
}

impl std::fmt::Display for Confidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
        }
    }
}

/// Which resolution step produced a match. The tag set is the total
/// ordering of strategies; ambiguous variants exist so the demotion stays
/// visible in reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MatchMethod {
    #[serde(rename = "tax_id")]
    TaxId,
    #[serde(rename = "tax_id_ambiguous")]
    TaxIdAmbiguous,
    #[serde(rename = "email")]
    Email,
    #[serde(rename = "email_ambiguous")]
    EmailAmbiguous,
    #[serde(rename = "full_name")]
    FullName,
    #[serde(rename = "full_name_ambiguous")]
    FullNameAmbiguous,
    #[serde(rename = "legacy_code")]
    LegacyCode,
    #[serde(rename = "legacy_code+project")]
    LegacyCodeProject,
    #[serde(rename = "project+unit_number")]
    ProjectUnitNumber,
    #[serde(rename = "project+unit_number_ambiguous")]
    ProjectUnitNumberAmbiguous,
    #[serde(rename = "block+portal+floor+door")]
    BlockPortalFloorDoor,
    #[serde(rename = "block+portal+floor+door_ambiguous")]
    BlockPortalFloorDoorAmbiguous,
    #[serde(rename = "block+floor+door")]
    BlockFloorDoor,
    #[serde(rename = "block+floor+door_ambiguous")]
    BlockFloorDoorAmbiguous,
    #[serde(rename = "portal+floor+door")]
    PortalFloorDoor,
    #[serde(rename = "portal+floor+door_ambiguous")]
    PortalFloorDoorAmbiguous,
    #[serde(rename = "project+legacy_partial")]
    ProjectLegacyPartial,
    #[serde(rename = "none")]
    None,
}

impl std::fmt::Display for MatchMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tag = match self {
            Self::TaxId => "tax_id",
            Self::TaxIdAmbiguous => "tax_id_ambiguous",
            Self::Email => "email",
            Self::EmailAmbiguous => "email_ambiguous",
            Self::FullName => "full_name",
            Self::FullNameAmbiguous => "full_name_ambiguous",
            Self::LegacyCode => "legacy_code",
            Self::LegacyCodeProject => "legacy_code+project",
            Self::ProjectUnitNumber => "project+unit_number",
            Self::ProjectUnitNumberAmbiguous => "project+unit_number_ambiguous",
            Self::BlockPortalFloorDoor => "block+portal+floor+door",
            Self::BlockPortalFloorDoorAmbiguous => "block+portal+floor+door_ambiguous",
            Self::BlockFloorDoor => "block+floor+door",
            Self::BlockFloorDoorAmbiguous => "block+floor+door_ambiguous",
            Self::PortalFloorDoor => "portal+floor+door",
            Self::PortalFloorDoorAmbiguous => "portal+floor+door_ambiguous",
            Self::ProjectLegacyPartial => "project+legacy_partial",
            Self::None => "none",
        };
        write!(f, "{tag}")
    }
}

/// Outcome of resolving one row against one canonical set.
#[derive(Debug, Clone, Serialize)]
pub struct MatchResult {
    pub entity_id: Option<i64>,
    pub method: MatchMethod,
    pub confidence: Confidence,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub note: String,
}

impl MatchResult {
    pub fn none() -> Self {
        Self {
            entity_id: None,
            method: MatchMethod::None,
            confidence: Confidence::None,
            note: String::new(),
        }
    }

    pub fn matched(&self) -> bool {
        self.entity_id.is_some()
    }
}

// ---------------------------------------------------------------------------
// Draft links
// ---------------------------------------------------------------------------

/// One source row plus both resolutions. Created once during the batch
/// pass; `is_active` may be flipped to `false` exactly once, by the
/// conflict arbiter; rows are never deleted (inactive rows stay for audit).
#[derive(Debug, Clone, Serialize)]
pub struct DraftLinkRow {
    pub row: SourceRow,
    pub client_match: MatchResult,
    pub property_match: MatchResult,
    pub ready_to_apply: bool,
    pub is_active: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub arbiter_note: String,
}

// ---------------------------------------------------------------------------
// Live candidate scoring
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReservationStatus {
    PreRegistered,
    ReservationSent,
    Reserved,
    AdhesionPaid,
    ContractSigned,
    Cancelled,
    #[serde(other)]
    Other,
}

/// One historical reservation row for a project, as the store holds it.
#[derive(Debug, Clone)]
pub struct ReservationRow {
    pub reservation_id: i64,
    pub client_id: i64,
    pub unit_reference: String,
    pub portal: String,
    pub floor_label: String,
    pub floor_level: Option<i32>,
    pub door: String,
    pub status: ReservationStatus,
    /// Free-text dates as stored; parsed leniently for recency only.
    pub reservation_date: String,
    pub created_at: String,
    pub drop_date: String,
}

/// One suggested buyer link for human verification. Recomputed per call,
/// never persisted by the engine.
#[derive(Debug, Clone, Serialize)]
pub struct ReservationCandidate {
    pub client_id: i64,
    pub reservation_id: i64,
    pub match_score: i32,
    pub confidence: Confidence,
    pub reasons: Vec<String>,
    pub unit_specific: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkStatus {
    Verified,
    PendingVerification,
    NotLinked,
}

impl std::fmt::Display for LinkStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Verified => write!(f, "verified"),
            Self::PendingVerification => write!(f, "pending_verification"),
            Self::NotLinked => write!(f, "not_linked"),
        }
    }
}

// ---------------------------------------------------------------------------
// Summary + Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize)]
pub struct SourceCounts {
    pub rows: usize,
    pub client_matched: usize,
    pub property_matched: usize,
    pub ready_to_apply: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct LinkSummary {
    pub rows_processed: usize,
    pub rows_skipped: usize,
    pub client_matched: usize,
    pub property_matched: usize,
    pub ready_to_apply: usize,
    pub deactivated_by_arbiter: usize,
    pub by_source: BTreeMap<String, SourceCounts>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LinkMeta {
    pub config_name: String,
    pub apply_threshold: Confidence,
    pub engine_version: String,
    pub run_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LinkResult {
    pub meta: LinkMeta,
    pub summary: LinkSummary,
    pub drafts: Vec<DraftLinkRow>,
}
