//! Fixed trade catalog.
//!
//! Every trade a project can hold is listed here. Trade classification,
//! completeness scoring and question generation only ever operate on codes
//! that resolve through [`find`] or [`lookup`].

pub mod rules;

use serde::{Deserialize, Serialize};

/// Code of the trade-agnostic intake phase. Never a classification result.
pub const INTAKE_CODE: &str = "INT";

/// Scaffolding is its own trade; roof/facade/window work depends on it.
pub const SCAFFOLDING_CODE: &str = "GER";

/// Photovoltaics, auto-added when solar keywords are present.
pub const PV_CODE: &str = "PV";

/// Complexity class of a trade. Bounds how many questions it may receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Complexity {
    Einfach,
    Niedrig,
    Mittel,
    Hoch,
    SehrHoch,
}

/// Coarse grouping used when mapping completeness to a question count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComplexityTier {
    Simple,
    Moderate,
    Complex,
}

/// Inclusive question-count bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionRange {
    pub min: u32,
    pub max: u32,
}

impl QuestionRange {
    pub fn clamp(&self, n: u32) -> u32 {
        n.clamp(self.min, self.max)
    }
}

impl Complexity {
    pub fn question_range(self) -> QuestionRange {
        let (min, max) = match self {
            Self::Einfach => (5, 12),
            Self::Niedrig => (8, 16),
            Self::Mittel => (12, 22),
            Self::Hoch => (16, 28),
            Self::SehrHoch => (20, 35),
        };
        QuestionRange { min, max }
    }

    pub fn tier(self) -> ComplexityTier {
        match self {
            Self::Einfach | Self::Niedrig => ComplexityTier::Simple,
            Self::Mittel => ComplexityTier::Moderate,
            Self::Hoch | Self::SehrHoch => ComplexityTier::Complex,
        }
    }
}

/// A catalog entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TradeDef {
    pub code: &'static str,
    pub name: &'static str,
    pub complexity: Complexity,
}

impl TradeDef {
    pub fn is_intake(&self) -> bool {
        self.code == INTAKE_CODE
    }

    /// Question bounds. The intake phase uses its own fixed range.
    pub fn question_range(&self) -> QuestionRange {
        if self.is_intake() {
            QuestionRange { min: 8, max: 15 }
        } else {
            self.complexity.question_range()
        }
    }
}

const fn trade(code: &'static str, name: &'static str, complexity: Complexity) -> TradeDef {
    TradeDef {
        code,
        name,
        complexity,
    }
}

pub static CATALOG: &[TradeDef] = &[
    trade(INTAKE_CODE, "Projektaufnahme", Complexity::Mittel),
    trade("ABBR", "Abbruch & Entkernung", Complexity::Niedrig),
    trade("ROH", "Rohbau & Maurerarbeiten", Complexity::Hoch),
    trade("ZIMM", "Zimmerer & Holzbau", Complexity::Hoch),
    trade("DACH", "Dachdeckerarbeiten", Complexity::SehrHoch),
    trade("FASS", "Fassade & WDVS", Complexity::Hoch),
    trade("FEN", "Fenster & Rollläden", Complexity::Mittel),
    trade(SCAFFOLDING_CODE, "Gerüstbau", Complexity::Einfach),
    trade("ELEKT", "Elektroinstallation", Complexity::Hoch),
    trade("SAN", "Sanitärinstallation", Complexity::Hoch),
    trade("HEI", "Heizungstechnik", Complexity::SehrHoch),
    trade("TRO", "Trockenbau", Complexity::Mittel),
    trade("ESTR", "Estricharbeiten", Complexity::Niedrig),
    trade("FLI", "Fliesen & Platten", Complexity::Mittel),
    trade("BOD", "Bodenbelagsarbeiten", Complexity::Niedrig),
    trade("MAL", "Maler & Lackierer", Complexity::Einfach),
    trade("TIS", "Tischler & Innentüren", Complexity::Mittel),
    trade("SCHL", "Schlosser & Metallbau", Complexity::Mittel),
    trade(PV_CODE, "Photovoltaik", Complexity::Hoch),
];

/// Look up a trade by its exact code.
pub fn find(code: &str) -> Option<&'static TradeDef> {
    CATALOG.iter().find(|t| t.code == code)
}

/// Resolve an oracle-supplied code or name against the catalog.
///
/// Codes match case-insensitively, names match case-insensitively after
/// trimming. Anything else is `None`.
pub fn lookup(code: Option<&str>, name: Option<&str>) -> Option<&'static TradeDef> {
    if let Some(code) = code.map(str::trim).filter(|c| !c.is_empty()) {
        if let Some(def) = CATALOG.iter().find(|t| t.code.eq_ignore_ascii_case(code)) {
            return Some(def);
        }
    }
    let name = name.map(str::trim).filter(|n| !n.is_empty())?;
    let name = name.to_lowercase();
    CATALOG.iter().find(|t| t.name.to_lowercase() == name)
}

/// Catalog entries that classification may return.
pub fn classifiable() -> impl Iterator<Item = &'static TradeDef> {
    CATALOG.iter().filter(|t| !t.is_intake())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_unique() {
        for (i, a) in CATALOG.iter().enumerate() {
            for b in &CATALOG[i + 1..] {
                assert_ne!(a.code, b.code);
            }
        }
    }

    #[test]
    fn lookup_by_code_or_name() {
        assert_eq!(lookup(Some("dach"), None).map(|t| t.code), Some("DACH"));
        assert_eq!(
            lookup(Some("XYZ"), Some("fliesen & platten")).map(|t| t.code),
            Some("FLI")
        );
        assert!(lookup(Some("XYZ"), Some("Schreinerei")).is_none());
        assert!(lookup(None, None).is_none());
    }

    #[test]
    fn ranges_are_ordered() {
        for t in CATALOG {
            let r = t.question_range();
            assert!(r.min <= r.max, "{}", t.code);
        }
    }

    #[test]
    fn intake_is_not_classifiable() {
        assert!(classifiable().all(|t| t.code != INTAKE_CODE));
    }
}
