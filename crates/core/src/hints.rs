//! Unit-hint grammar: free text → structured `{block, portal, floor, letter}`.
//!
//! Unit references arrive in every convention the last fifteen years of
//! spreadsheets produced: "Portal 2 - 3B", "PROJ-B1P2_3C", "Ático A",
//! "Planta baja", bare numbers. The grammar is an ordered list of
//! independent regex rules, evaluated in a fixed priority, first non-empty
//! wins per field. Keep the order auditable; never merge rules into one
//! compound expression.

use regex::Regex;

use crate::normalize::{compact, upper_no_accent};

/// Structured hints derived from one source row. Ephemeral: recomputed per
/// row, never persisted.
///
/// Tokens live in a small fixed alphabet: decimal digits (no leading
/// zeros), the literal `"AT"` for penthouse floors, or a single letter A–C
/// (the source domain has no doors beyond C).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnitHint {
    pub unit_number: Option<u32>,
    pub block: Option<String>,
    pub portal: Option<String>,
    pub floor: Option<String>,
    pub letter: Option<String>,
}

impl UnitHint {
    pub fn is_empty(&self) -> bool {
        self.unit_number.is_none()
            && self.block.is_none()
            && self.portal.is_none()
            && self.floor.is_none()
            && self.letter.is_none()
    }
}

/// Compiled rule set. Build once per run, share by reference.
pub struct HintParser {
    re_floor_ground: Regex,
    re_floor_marked: Regex,
    re_floor_bare: Regex,
    re_letter_marked: Regex,
    re_letter_after_position: Regex,
    re_letter_isolated: Regex,
    re_letter_trailing: Regex,
    re_block: Regex,
    re_block_short: Regex,
    re_portal: Regex,
    re_portal_combined: Regex,
    re_pure_number: Regex,
    re_leading_number_tail: Regex,
    re_suffix_penthouse: Regex,
    re_suffix_ground: Regex,
    re_suffix_numbered: Regex,
}

impl HintParser {
    pub fn new() -> Self {
        Self {
            // Floor: ground-level spellings ("bajo", "planta baja", "P0"/"PO"
            // as standalone tokens), explicit floor markers, bare numbers.
            re_floor_ground: Regex::new(r"\b(?:BAJOS?|PLANTA\s+BAJA|GROUND|P0|PO)\b").unwrap(),
            re_floor_marked: Regex::new(r"\b(?:PLANTA|FLOOR|P)\.?\s*(\d{1,2})\b").unwrap(),
            re_floor_bare: Regex::new(r"^(\d{1,2})\s*(?:º|O)?$").unwrap(),
            // Letter: explicit door markers, a letter glued to a position
            // token ("3B", "AT C"), an isolated letter, a trailing letter.
            re_letter_marked: Regex::new(r"\b(?:LETRA|PUERTA|DOOR|LETTER)\s*[.\-:]?\s*([A-C])\b")
                .unwrap(),
            re_letter_after_position: Regex::new(r"(?:\d{1,2}|\bAT)\s*(?:º|O)?\s*[.\-]?\s*([A-C])\b")
                .unwrap(),
            re_letter_isolated: Regex::new(r"(?:^|[\s.,\-:])([A-C])(?:[\s.,\-:]|$)").unwrap(),
            re_letter_trailing: Regex::new(r"([A-C])\s*$").unwrap(),
            re_block: Regex::new(r"\b(?:EDIFICIO|BLOQUE|BLOCK)\s*[.\-:]*\s*(\d{1,2})\b").unwrap(),
            re_block_short: Regex::new(r"\bB\.?(\d{1,2})\b").unwrap(),
            re_portal: Regex::new(r"\bPORTAL\s*[.\-:]*\s*(\d{1,2})\b").unwrap(),
            // One-shot "PORTAL 2 - 3B" / "PORTAL 1 PLANTA 2 C" form.
            re_portal_combined: Regex::new(
                r"\bPORTAL\s*[.\-:]?\s*(\d{1,2})\s*[\s.,\-:]*(?:P|PLANTA|FLOOR)?\.?\s*(\d{1,2})\s*(?:º|O)?\s*[.\-]?\s*([A-C])\b",
            )
            .unwrap(),
            re_pure_number: Regex::new(r"^(\d+)$").unwrap(),
            re_leading_number_tail: Regex::new(r"^\d{1,3}\s*-\s*(.+)$").unwrap(),
            // Coded legacy suffixes, matched against a compact fragment:
            // "AT<letter>", "B<letter>" (ground), "<floor><letter>".
            re_suffix_penthouse: Regex::new(r"^AT([A-C])$").unwrap(),
            re_suffix_ground: Regex::new(r"^B([A-C])$").unwrap(),
            re_suffix_numbered: Regex::new(r"^(\d{1,2})([A-C])$").unwrap(),
        }
    }

    /// Floor token from arbitrary text. Priority: penthouse spellings,
    /// ground-level spellings, marked floor number, bare number. Idempotent
    /// over its own output ("AT" → "AT", "0" → "0", "7" → "7").
    pub fn floor_token(&self, text: &str) -> Option<String> {
        let up = upper_no_accent(text);
        self.floor_token_upper(up.trim())
    }

    fn floor_token_upper(&self, text: &str) -> Option<String> {
        if text.is_empty() {
            return None;
        }
        if text.contains("ATICO") || text.contains("PENTHOUSE") || text == "AT" {
            return Some("AT".to_string());
        }
        if self.re_floor_ground.is_match(text) {
            return Some("0".to_string());
        }
        if let Some(c) = self.re_floor_marked.captures(text) {
            return normalize_number(&c[1]);
        }
        if let Some(c) = self.re_floor_bare.captures(text) {
            return normalize_number(&c[1]);
        }
        None
    }

    /// Door letter (A–C) from arbitrary text, in rule-priority order.
    pub fn letter_token(&self, text: &str) -> Option<String> {
        let up = upper_no_accent(text);
        self.letter_token_upper(up.trim())
    }

    fn letter_token_upper(&self, text: &str) -> Option<String> {
        if text.is_empty() {
            return None;
        }
        for re in [
            &self.re_letter_marked,
            &self.re_letter_after_position,
            &self.re_letter_isolated,
            &self.re_letter_trailing,
        ] {
            if let Some(c) = re.captures(text) {
                return Some(c[1].to_string());
            }
        }
        None
    }

    /// Portal number from a dedicated portal column ("Portal 2", "2").
    pub fn portal_token(&self, text: &str) -> Option<String> {
        let up = upper_no_accent(text);
        let up = up.trim();
        if let Some(c) = self.re_portal.captures(up) {
            return normalize_number(&c[1]);
        }
        if let Some(c) = self.re_pure_number.captures(up) {
            return normalize_number(&c[1]);
        }
        None
    }

    /// Floor + letter from a coded legacy-code suffix fragment, e.g. the
    /// `3C` of `PROJ-B1P2_3C` or the `ATB` of `PROJ-B2P1_ATB`.
    pub fn parse_suffix_floor_letter(&self, fragment: &str) -> Option<(String, String)> {
        let frag = compact(fragment).to_uppercase();
        if let Some(c) = self.re_suffix_penthouse.captures(&frag) {
            return Some(("AT".to_string(), c[1].to_string()));
        }
        if let Some(c) = self.re_suffix_ground.captures(&frag) {
            return Some(("0".to_string(), c[1].to_string()));
        }
        if let Some(c) = self.re_suffix_numbered.captures(&frag) {
            return normalize_number(&c[1]).map(|floor| (floor, c[2].to_string()));
        }
        None
    }

    /// Combine the unit reference with the dedicated portal/floor/letter
    /// columns into one hint tuple. Each field is filled by the first rule
    /// that produces a value and never overwritten afterwards.
    pub fn parse_unit_hints(
        &self,
        reference: &str,
        portal_col: &str,
        floor_col: &str,
        letter_col: &str,
    ) -> UnitHint {
        let mut hint = UnitHint::default();

        let up = upper_no_accent(reference);
        let reference = up.trim();

        if let Some(c) = self.re_pure_number.captures(reference) {
            hint.unit_number = c[1].parse().ok();
        } else if !reference.is_empty() {
            if let Some(c) = self
                .re_block
                .captures(reference)
                .or_else(|| self.re_block_short.captures(reference))
            {
                hint.block = normalize_number(&c[1]);
            }
            if let Some(c) = self.re_portal.captures(reference) {
                hint.portal = normalize_number(&c[1]);
            }

            fill(&mut hint.floor, self.floor_token_upper(reference));
            fill(&mut hint.letter, self.letter_token_upper(reference));

            // References copied from listing exports carry a leading
            // "<row> - " prefix; re-scan the tail behind it.
            if let Some(c) = self.re_leading_number_tail.captures(reference) {
                let tail = c.get(1).map(|m| m.as_str().trim()).unwrap_or("");
                fill(&mut hint.floor, self.floor_token_upper(tail));
                fill(&mut hint.letter, self.letter_token_upper(tail));
            }

            if let Some(c) = self.re_portal_combined.captures(reference) {
                fill(&mut hint.portal, normalize_number(&c[1]));
                fill(&mut hint.floor, normalize_number(&c[2]));
                fill(&mut hint.letter, Some(c[3].to_string()));
            }
        }

        fill(&mut hint.portal, self.portal_token(portal_col));
        fill(&mut hint.floor, self.floor_token(floor_col));
        fill(&mut hint.letter, self.letter_token(letter_col));

        hint
    }
}

impl Default for HintParser {
    fn default() -> Self {
        Self::new()
    }
}

fn fill(slot: &mut Option<String>, value: Option<String>) {
    if slot.is_none() {
        *slot = value;
    }
}

/// Decimal-normalize a captured number ("03" → "3").
fn normalize_number(digits: &str) -> Option<String> {
    digits.parse::<u32>().ok().map(|n| n.to_string())
}
