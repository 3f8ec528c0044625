//! Area-code transcoding between the source and remote coding schemes, and
//! parsing of the remote reference-data hierarchy.
//!
//! The source system stores provinces as 2 digits and cities as 4 digits;
//! the remote system pads both to 6. Counties share one scheme. Towns share
//! one scheme except for the entries in the override table.

use std::collections::{HashMap, HashSet};
use std::sync::{PoisonError, RwLock};

use serde::{Deserialize, Serialize};

use crate::types::{AreaCode, Contract, ContractArea};

/// Remote code used when the source leaves a province/city/county empty.
pub const EMPTY_REGION_CODE: &str = "000000";

/// Remote code used when the source leaves a town empty.
pub const EMPTY_TOWN_CODE: &str = "000000000";

/// Parent code assigned to level-1 (province) entries.
pub const ROOT_PARENT_CODE: &str = "0";

// ---------------------------------------------------------------------------
// Converter
// ---------------------------------------------------------------------------

/// Transcodes area codes. Every conversion is total and idempotent.
///
/// The town override table may be extended at runtime, so it sits behind a
/// lock and the converter is shared by reference.
#[derive(Debug, Default)]
pub struct AreaCodeConverter {
    town_overrides: RwLock<HashMap<String, String>>,
}

impl AreaCodeConverter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a converter seeded with town overrides (source code → remote code).
    pub fn with_overrides(overrides: impl IntoIterator<Item = (String, String)>) -> Self {
        let mut table = HashMap::new();
        for (source_code, remote_code) in overrides {
            insert_resolved(&mut table, source_code, remote_code);
        }
        Self {
            town_overrides: RwLock::new(table),
        }
    }

    /// `"42"` → `"420000"`; 6-char codes pass through.
    pub fn convert_prov_code(&self, code: &str) -> String {
        pad_region(code, 2, "0000", "province")
    }

    /// `"4201"` → `"420100"`; 6-char codes pass through.
    pub fn convert_city_code(&self, code: &str) -> String {
        pad_region(code, 4, "00", "city")
    }

    pub fn convert_county_code(&self, code: &str) -> String {
        if code.is_empty() {
            return EMPTY_REGION_CODE.to_string();
        }
        code.to_string()
    }

    pub fn convert_town_code(&self, code: &str) -> String {
        if code.is_empty() {
            return EMPTY_TOWN_CODE.to_string();
        }
        let overrides = self
            .town_overrides
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        overrides
            .get(code)
            .cloned()
            .unwrap_or_else(|| code.to_string())
    }

    /// Register (or replace) a town override discovered in operation.
    ///
    /// Chains collapse: no override ever targets another override's source
    /// code, so converting a converted code is a no-op.
    pub fn add_override(&self, source_code: impl Into<String>, remote_code: impl Into<String>) {
        let mut overrides = self
            .town_overrides
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        insert_resolved(&mut overrides, source_code.into(), remote_code.into());
    }

    /// Snapshot of the override table.
    pub fn overrides(&self) -> HashMap<String, String> {
        self.town_overrides
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Rewrite all four area codes of a contract in place.
    pub fn convert_contract(&self, contract: &mut Contract) {
        contract.code_prov = self.convert_prov_code(&contract.code_prov);
        contract.code_city = self.convert_city_code(&contract.code_city);
        contract.code_coun = self.convert_county_code(&contract.code_coun);
        contract.code_town = self.convert_town_code(&contract.code_town);
    }

    /// Rewrite all four area codes of a contract area in place.
    pub fn convert_area(&self, area: &mut ContractArea) {
        area.code_prov = self.convert_prov_code(&area.code_prov);
        area.code_city = self.convert_city_code(&area.code_city);
        area.code_coun = self.convert_county_code(&area.code_coun);
        area.code_town = self.convert_town_code(&area.code_town);
    }
}

/// Insert `source → remote`, following `remote` through the table and
/// re-pointing entries that targeted `source`.
fn insert_resolved(table: &mut HashMap<String, String>, source: String, remote: String) {
    let remote = table.get(&remote).cloned().unwrap_or(remote);
    for target in table.values_mut() {
        if *target == source {
            target.clone_from(&remote);
        }
    }
    table.insert(source, remote);
}

fn pad_region(code: &str, short_len: usize, padding: &str, level: &str) -> String {
    if code.is_empty() {
        return EMPTY_REGION_CODE.to_string();
    }
    let len = code.chars().count();
    if len == EMPTY_REGION_CODE.len() {
        return code.to_string();
    }
    if len == short_len {
        return format!("{code}{padding}");
    }
    tracing::warn!(code, level, "unexpected area code format, passing through");
    code.to_string()
}

// ---------------------------------------------------------------------------
// Reference-data hierarchy
// ---------------------------------------------------------------------------

/// Raw reference-data response from the remote area query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawAreaResponse {
    #[serde(default)]
    pub state: Option<i64>,
    #[serde(default)]
    pub mess: Option<String>,
    #[serde(rename = "InfoList", default)]
    pub info_list: Option<Vec<RawAreaRow>>,
}

/// One flattened province/city/county/town row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawAreaRow {
    pub code_prov: String,
    pub name_prov: String,
    pub code_city: String,
    pub name_city: String,
    pub code_coun: String,
    pub name_coun: String,
    pub code_town: String,
    pub name_town: String,
}

impl RawAreaResponse {
    pub fn is_success(&self) -> bool {
        self.state == Some(1)
    }
}

/// Expand reference rows into a deduplicated four-level hierarchy.
///
/// The first entry seen for a code wins and discovery order is preserved. A
/// failed response or an empty `InfoList` yields an empty vector.
pub fn parse_area_hierarchy(response: &RawAreaResponse) -> Vec<AreaCode> {
    if !response.is_success() {
        tracing::error!(
            state = ?response.state,
            message = response.mess.as_deref().unwrap_or("unknown error"),
            "area code query was not successful",
        );
        return Vec::new();
    }

    let rows = match response.info_list.as_deref() {
        Some(rows) if !rows.is_empty() => rows,
        _ => {
            tracing::error!("area code response has no InfoList entries");
            return Vec::new();
        }
    };

    let mut seen = HashSet::new();
    let mut codes = Vec::new();
    for row in rows {
        let levels = [
            (&row.code_prov, &row.name_prov, ROOT_PARENT_CODE, 1),
            (&row.code_city, &row.name_city, row.code_prov.as_str(), 2),
            (&row.code_coun, &row.name_coun, row.code_city.as_str(), 3),
            (&row.code_town, &row.name_town, row.code_coun.as_str(), 4),
        ];
        for (code, name, parent, level) in levels {
            if seen.insert(code.clone()) {
                codes.push(AreaCode {
                    code: code.clone(),
                    name: name.clone(),
                    parent_code: parent.to_string(),
                    level,
                });
            }
        }
    }

    tracing::info!(count = codes.len(), "parsed area code hierarchy");
    codes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn province_padding() {
        let c = AreaCodeConverter::new();
        assert_eq!(c.convert_prov_code("42"), "420000");
        assert_eq!(c.convert_prov_code("420000"), "420000");
        assert_eq!(c.convert_prov_code(""), "000000");
        assert_eq!(c.convert_prov_code("421"), "421");
    }

    #[test]
    fn city_padding() {
        let c = AreaCodeConverter::new();
        assert_eq!(c.convert_city_code("4201"), "420100");
        assert_eq!(c.convert_city_code("420100"), "420100");
        assert_eq!(c.convert_city_code(""), "000000");
        assert_eq!(c.convert_city_code("42"), "42");
    }

    #[test]
    fn town_override_table_is_consulted() {
        let c = AreaCodeConverter::new();
        assert_eq!(c.convert_town_code("420117406"), "420117406");
        c.add_override("420117406", "420117000");
        assert_eq!(c.convert_town_code("420117406"), "420117000");
        assert_eq!(c.convert_town_code(""), "000000000");
        assert_eq!(c.overrides().len(), 1);
    }

    #[test]
    fn convert_area_rewrites_all_levels() {
        let c = AreaCodeConverter::new();
        let mut area = ContractArea {
            code_prov: "42".into(),
            code_city: "4201".into(),
            code_coun: "".into(),
            code_town: "".into(),
            ..ContractArea::default()
        };
        c.convert_area(&mut area);
        assert_eq!(area.code_prov, "420000");
        assert_eq!(area.code_city, "420100");
        assert_eq!(area.code_coun, "000000");
        assert_eq!(area.code_town, "000000000");
    }

    #[test]
    fn failed_response_parses_to_empty() {
        let response = RawAreaResponse {
            state: Some(0),
            mess: Some("token expired".into()),
            info_list: None,
        };
        assert!(parse_area_hierarchy(&response).is_empty());
    }

    #[test]
    fn success_without_rows_parses_to_empty() {
        let response = RawAreaResponse {
            state: Some(1),
            mess: None,
            info_list: Some(vec![]),
        };
        assert!(parse_area_hierarchy(&response).is_empty());
    }
}
