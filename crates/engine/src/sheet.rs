use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a sheet. The id doubles as the tab name shown to the user
/// and as the sheet name the formula engine scopes references by.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SheetId(String);

impl SheetId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SheetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SheetId {
    fn from(s: &str) -> Self {
        SheetId(s.to_string())
    }
}

impl From<String> for SheetId {
    fn from(s: String) -> Self {
        SheetId(s)
    }
}

impl Borrow<str> for SheetId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for SheetId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for SheetId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for SheetId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// Trim a requested sheet name. Returns None if nothing is left.
pub fn normalize_sheet_name(name: &str) -> Option<&str> {
    let trimmed = name.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

/// Pick a free id for `base`: `base` itself, else `base(1)`, `base(2)`, ...
///
/// `keep` names an id that may be reused (the sheet being renamed).
pub fn unique_sheet_id(existing: &[SheetId], base: &str, keep: Option<&str>) -> SheetId {
    let taken = |candidate: &str| existing.iter().any(|id| id == candidate) && keep != Some(candidate);

    let mut candidate = base.to_string();
    let mut counter = 1;
    while taken(&candidate) {
        candidate = format!("{base}({counter})");
        counter += 1;
    }
    SheetId(candidate)
}

/// Default id for a new sheet: `sheet{N+1}`, advancing N past ids already in use.
pub fn auto_sheet_id(existing: &[SheetId]) -> SheetId {
    let mut n = existing.len() + 1;
    loop {
        let candidate = format!("sheet{n}");
        if !existing.iter().any(|id| *id == candidate.as_str()) {
            return SheetId(candidate);
        }
        n += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(names: &[&str]) -> Vec<SheetId> {
        names.iter().map(|n| SheetId::from(*n)).collect()
    }

    #[test]
    fn test_unique_sheet_id_suffixes() {
        let existing = ids(&["Data", "Data(1)"]);
        assert_eq!(unique_sheet_id(&existing, "Data", None).as_str(), "Data(2)");
        assert_eq!(unique_sheet_id(&existing, "Other", None).as_str(), "Other");
    }

    #[test]
    fn test_unique_sheet_id_keeps_own_name() {
        let existing = ids(&["sheet1", "sheet2"]);
        assert_eq!(unique_sheet_id(&existing, "sheet1", Some("sheet1")).as_str(), "sheet1");
        assert_eq!(unique_sheet_id(&existing, "sheet2", Some("sheet1")).as_str(), "sheet2(1)");
    }

    #[test]
    fn test_auto_sheet_id_skips_used() {
        assert_eq!(auto_sheet_id(&ids(&["sheet1", "sheet2"])).as_str(), "sheet3");
        assert_eq!(auto_sheet_id(&ids(&["sheet1", "sheet3"])).as_str(), "sheet4");
        assert_eq!(auto_sheet_id(&[]).as_str(), "sheet1");
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize_sheet_name("  Totals "), Some("Totals"));
        assert_eq!(normalize_sheet_name("   "), None);
    }
}
