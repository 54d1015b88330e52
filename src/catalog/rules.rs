//! Per-trade rule tables.
//!
//! Boundary ownership, critical-fact patterns, mandatory questions, scaffolding
//! dependencies and count overrides are all plain data keyed by trade code.
//! The pipeline consults them through the compiled view in [`compiled`].

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

use crate::domain::QuestionType;

use super::SCAFFOLDING_CODE;

/// Matches an area figure such as `8m²`, `12,5 qm` or `40 Quadratmeter`.
pub const AREA_PATTERN: &str = r"(?i)\d+(?:[.,]\d+)?\s*(?:m²|m2|qm|quadratmeter)";

/// Trades whose work cannot be done without scaffolding.
pub const NEEDS_SCAFFOLDING: &[&str] = &["DACH", "FASS", "FEN"];

/// Solar keywords that pull in the photovoltaics trade.
pub const SOLAR_PATTERN: &str = r"(?i)\b(?:photovoltaik|solar|pv-anlage|pv\b|solarmodul|wechselrichter)";

/// A fact whose presence in the project text makes a trade better specified.
#[derive(Debug, Clone, Copy)]
pub struct CriticalFact {
    pub label: &'static str,
    pub pattern: &'static str,
    pub weight: u32,
}

/// Facts already established elsewhere that make a mandatory question moot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KnownTopic {
    Area,
    WindowCount,
    DoorCount,
}

/// A question every draft for the trade must contain.
#[derive(Debug, Clone, Copy)]
pub struct MandatoryQuestion {
    pub key: &'static str,
    pub text: &'static str,
    pub kind: QuestionType,
    pub options: &'static [&'static str],
    pub unit: Option<&'static str>,
    /// A drafted question matching this pattern already covers the topic.
    pub covered_by: &'static str,
    pub skip_when_known: Option<KnownTopic>,
    /// Insert index in the final list, clamped to its length.
    pub position: usize,
}

/// Collapses the question count for trivially scoped jobs.
#[derive(Debug, Clone, Copy)]
pub struct CountOverride {
    pub code: &'static str,
    pub all_of: &'static [&'static str],
    pub none_of: &'static [&'static str],
    pub requires_area: bool,
    pub count: u32,
    pub reason: &'static str,
}

/// When a trade's rival is evidenced and the trade itself is not, drop it.
#[derive(Debug, Clone, Copy)]
pub struct Exclusivity {
    pub code: &'static str,
    pub rival: &'static str,
}

#[derive(Debug, Clone, Copy)]
pub struct TradeRules {
    pub code: &'static str,
    /// Responsibility keywords, matched at word start.
    pub owns: &'static [&'static str],
    pub critical: &'static [CriticalFact],
    pub mandatory: &'static [MandatoryQuestion],
    /// Topics this trade must never ask about, whatever the siblings are.
    pub never_ask: &'static [&'static str],
    /// Boundary notes passed into the generation instruction.
    pub prompt_notes: &'static [&'static str],
}

const fn fact(label: &'static str, pattern: &'static str, weight: u32) -> CriticalFact {
    CriticalFact {
        label,
        pattern,
        weight,
    }
}

const AREA_COVERED: &str = r"(?i)fläche|m²|qm\b|quadratmeter";

const fn area_question(text: &'static str) -> MandatoryQuestion {
    MandatoryQuestion {
        key: "area",
        text,
        kind: QuestionType::Number,
        options: &[],
        unit: Some("m²"),
        covered_by: AREA_COVERED,
        skip_when_known: Some(KnownTopic::Area),
        position: 0,
    }
}

const NO_SCAFFOLD_NOTE: &str =
    "Keine Fragen zum Gerüst stellen. Gerüstbau ist ein eigenes Gewerk.";

pub static TRADE_RULES: &[TradeRules] = &[
    TradeRules {
        code: "ABBR",
        owns: &["abbruch", "abriss", "entkernung", "rückbau", "asbest", "schadstoff"],
        critical: &[
            fact("Umfang des Abbruchs", r"(?i)abbruch|abriss|entkern|rückbau", 20),
            fact("Menge (Fläche oder Volumen)", r"(?i)\d+(?:[.,]\d+)?\s*(?:m²|m2|qm|m³|m3|kubik)", 20),
            fact("Schadstoffe / Entsorgung", r"(?i)asbest|schadstoff|entsorg", 10),
        ],
        mandatory: &[],
        never_ask: &[],
        prompt_notes: &[],
    },
    TradeRules {
        code: "ROH",
        owns: &["mauerwerk", "beton", "fundament", "durchbruch", "sturz", "bodenplatte"],
        critical: &[
            fact("Bauteil", r"(?i)wand|decke|fundament|bodenplatte|durchbruch", 20),
            fact("Abmessungen", r"(?i)\d+(?:[.,]\d+)?\s*(?:m²|m2|qm|m\b|meter)", 20),
            fact("Tragwerk / Statik", r"(?i)tragend|statik", 15),
        ],
        mandatory: &[],
        never_ask: &[],
        prompt_notes: &[],
    },
    TradeRules {
        code: "ZIMM",
        owns: &["dachstuhl", "sparren", "gaube", "holzbalken", "pfette"],
        critical: &[
            fact("Bauteil", r"(?i)dachstuhl|sparren|gaube|balken", 20),
            fact("Fläche", AREA_PATTERN, 20),
            fact("Holzart", r"(?i)kvh|bsh|konstruktionsholz|fichte|lärche", 10),
        ],
        mandatory: &[],
        never_ask: &["gerüst"],
        prompt_notes: &[NO_SCAFFOLD_NOTE],
    },
    TradeRules {
        code: "DACH",
        owns: &[
            "dacheindeckung",
            "dachziegel",
            "dachrinne",
            "dachdämmung",
            "dachfläche",
            "dachform",
            "dachfenster",
            "flachdach",
            "ziegel",
        ],
        critical: &[
            fact("Dachfläche in m²", AREA_PATTERN, 30),
            fact("Dachform", r"(?i)satteldach|walmdach|flachdach|pultdach|mansard|zeltdach", 20),
            fact("Eindeckungsmaterial", r"(?i)ziegel|schiefer|blech|bitumen|dachstein", 15),
            fact("Dämmung", r"(?i)dämm", 10),
        ],
        mandatory: &[area_question("Wie groß ist die Dachfläche (in m²)?")],
        never_ask: &["gerüst"],
        prompt_notes: &[NO_SCAFFOLD_NOTE],
    },
    TradeRules {
        code: "FASS",
        owns: &["fassade", "wdvs", "außenputz", "fassadendämmung", "klinker"],
        critical: &[
            fact("Fassadenfläche in m²", AREA_PATTERN, 30),
            fact("Dämmung", r"(?i)wdvs|dämm", 15),
            fact("Oberfläche", r"(?i)putz|klinker|verkleidung", 15),
            fact("Geschosse", r"(?i)geschoss|stockwerk|etage", 10),
        ],
        mandatory: &[area_question("Wie groß ist die zu bearbeitende Fassadenfläche (in m²)?")],
        never_ask: &["gerüst"],
        prompt_notes: &[NO_SCAFFOLD_NOTE],
    },
    TradeRules {
        code: "FEN",
        owns: &["fenster", "rollladen", "rollläden", "fensterbank", "verglasung", "jalousie"],
        critical: &[
            fact("Anzahl Fenster", r"(?i)\d+\s*fenster", 30),
            fact("Rahmenmaterial", r"(?i)kunststoff|holz|alu", 15),
            fact("Einzelmaße", r"(?i)maß|breite|höhe|\d+\s*x\s*\d+", 20),
        ],
        mandatory: &[
            MandatoryQuestion {
                key: "window_count",
                text: "Wie viele Fenster sollen erneuert werden?",
                kind: QuestionType::Number,
                options: &[],
                unit: Some("Stück"),
                covered_by: r"(?i)wie viele fenster|anzahl (?:der )?fenster",
                skip_when_known: Some(KnownTopic::WindowCount),
                position: 0,
            },
            MandatoryQuestion {
                key: "window_material",
                text: "Aus welchem Rahmenmaterial sollen die Fenster sein?",
                kind: QuestionType::Select,
                options: &["Kunststoff", "Holz", "Holz-Aluminium", "Aluminium"],
                unit: None,
                covered_by: r"(?i)material",
                skip_when_known: None,
                position: 1,
            },
            MandatoryQuestion {
                key: "window_dimensions",
                text: "Bitte geben Sie für jedes Fenster einzeln die Maße an (Breite x Höhe in cm).",
                kind: QuestionType::Text,
                options: &[],
                unit: None,
                covered_by: r"(?i)\bmaße|abmessung|breite",
                skip_when_known: None,
                position: 2,
            },
        ],
        never_ask: &["gerüst", "haustür", "innentür", "zimmertür", "zarge"],
        prompt_notes: &[
            NO_SCAFFOLD_NOTE,
            "Maße immer pro Fenster abfragen, nie als Gesamtfläche.",
            "Haustüren und Innentüren gehören zum Tischler, nicht zu diesem Gewerk.",
        ],
    },
    TradeRules {
        code: SCAFFOLDING_CODE,
        owns: &["gerüst"],
        critical: &[
            fact("Gebäudehöhe / Geschosse", r"(?i)geschoss|stockwerk|etage|höhe", 20),
            fact("Einrüstfläche oder Länge", r"(?i)\d+(?:[.,]\d+)?\s*(?:m²|m2|qm|m\b|meter)", 20),
        ],
        mandatory: &[],
        never_ask: &[],
        prompt_notes: &[],
    },
    TradeRules {
        code: "ELEKT",
        owns: &[
            "steckdose",
            "lichtschalter",
            "kabel",
            "sicherung",
            "unterverteilung",
            "zählerschrank",
            "elektroinstallation",
            "leuchte",
        ],
        critical: &[
            fact("Anzahl Räume oder Fläche", r"(?i)\d+\s*(?:zimmer|räume)|\d+(?:[.,]\d+)?\s*(?:m²|m2|qm)", 25),
            fact("Ausstattung", r"(?i)steckdose|schalter|verteil|zähler", 15),
            fact("Umfang", r"(?i)neubau|komplett|teilweise|erneuer", 10),
        ],
        mandatory: &[],
        never_ask: &[],
        prompt_notes: &[],
    },
    TradeRules {
        code: "SAN",
        owns: &[
            "wc",
            "toilette",
            "waschbecken",
            "waschtisch",
            "dusche",
            "badewanne",
            "armatur",
            "abwasser",
            "wasserleitung",
            "sanitär",
        ],
        critical: &[
            fact("Raum", r"(?i)bad|wc|gäste", 20),
            fact("Sanitärobjekte", r"(?i)dusche|wanne|waschtisch|waschbecken|wc", 20),
            fact("Fläche", AREA_PATTERN, 15),
        ],
        mandatory: &[],
        never_ask: &[],
        prompt_notes: &["Fliesenarbeiten gehören zum Fliesenleger, nicht zur Sanitärinstallation."],
    },
    TradeRules {
        code: "HEI",
        owns: &["heizung", "heizkörper", "fußbodenheizung", "wärmepumpe", "heizkessel", "therme"],
        critical: &[
            fact("Energieträger", r"(?i)gas|öl|wärmepumpe|fernwärme|pellet", 25),
            fact("Beheizte Fläche", AREA_PATTERN, 20),
            fact("Wärmeübergabe", r"(?i)heizkörper|fußbodenheizung", 15),
        ],
        mandatory: &[],
        never_ask: &[],
        prompt_notes: &[],
    },
    TradeRules {
        code: "TRO",
        owns: &["gipskarton", "rigips", "ständerwand", "trockenbau", "vorsatzschale", "abgehängte", "spachtel"],
        critical: &[
            fact("Fläche in m²", AREA_PATTERN, 30),
            fact("Bauteil", r"(?i)wand|decke|dachschräge", 15),
            fact("Anforderungen", r"(?i)schallschutz|brandschutz|feuchtraum", 10),
        ],
        mandatory: &[area_question("Wie groß ist die Trockenbaufläche (in m²)?")],
        never_ask: &["tür", "zarge"],
        prompt_notes: &["Türen und Zargen gehören zum Tischler, nicht zum Trockenbau."],
    },
    TradeRules {
        code: "ESTR",
        owns: &["estrich"],
        critical: &[
            fact("Fläche in m²", AREA_PATTERN, 35),
            fact("Estrichart", r"(?i)zement|anhydrit|fließ|trocken", 15),
            fact("Aufbauhöhe", r"(?i)dicke|stärke|\d+\s*cm", 10),
        ],
        mandatory: &[area_question("Wie groß ist die Estrichfläche (in m²)?")],
        never_ask: &[],
        prompt_notes: &[],
    },
    TradeRules {
        code: "FLI",
        owns: &["fliese", "feinsteinzeug", "mosaik", "verfugung"],
        critical: &[
            fact("Fläche in m²", AREA_PATTERN, 30),
            fact("Raum / Bereich", r"(?i)bad|küche|wand|boden|dusche", 15),
            fact("Fliesenart", r"(?i)fliese", 10),
            fact("Format", r"(?i)format|\d+\s*x\s*\d+", 10),
        ],
        mandatory: &[area_question("Wie groß ist die zu fliesende Fläche (in m²)?")],
        never_ask: &["parkett", "laminat", "vinyl"],
        prompt_notes: &["Parkett, Laminat und Vinyl gehören zum Bodenleger."],
    },
    TradeRules {
        code: "BOD",
        owns: &["parkett", "laminat", "vinyl", "teppich", "designbelag", "bodenbelag", "linoleum"],
        critical: &[
            fact("Fläche in m²", AREA_PATTERN, 30),
            fact("Belagsart", r"(?i)parkett|laminat|vinyl|teppich|linoleum", 20),
            fact("Räume", r"(?i)raum|zimmer|flur", 10),
        ],
        mandatory: &[area_question("Wie groß ist die zu belegende Bodenfläche (in m²)?")],
        never_ask: &["fliese"],
        prompt_notes: &["Fliesen gehören zum Fliesenleger."],
    },
    TradeRules {
        code: "MAL",
        owns: &["streichen", "anstrich", "tapete", "tapezier", "spachtel", "lackier", "wandfarbe"],
        critical: &[
            fact("Fläche in m²", AREA_PATTERN, 30),
            fact("Bauteil / Raum", r"(?i)wand|decke|fassade|raum|zimmer", 15),
            fact("Farbe / Oberfläche", r"(?i)weiß|farb|ton|tapete", 10),
        ],
        mandatory: &[area_question("Wie groß ist die zu streichende Fläche (in m²)?")],
        never_ask: &[],
        prompt_notes: &[],
    },
    TradeRules {
        code: "TIS",
        owns: &["tür", "innentür", "haustür", "zimmertür", "zarge", "türblatt", "einbauschrank"],
        critical: &[
            fact("Anzahl Türen", r"(?i)\d+\s*(?:innen|haus|zimmer)?türen?", 30),
            fact("Material / Oberfläche", r"(?i)holz|weißlack|glas|cpl", 15),
            fact("Einzelmaße", r"(?i)maß|breite|höhe|\d+\s*x\s*\d+", 15),
        ],
        mandatory: &[
            MandatoryQuestion {
                key: "door_count",
                text: "Wie viele Türen sollen erneuert werden?",
                kind: QuestionType::Number,
                options: &[],
                unit: Some("Stück"),
                covered_by: r"(?i)wie viele (?:innen|zimmer)?türen|anzahl (?:der )?türen",
                skip_when_known: Some(KnownTopic::DoorCount),
                position: 0,
            },
            MandatoryQuestion {
                key: "door_material",
                text: "Welches Material bzw. welche Oberfläche sollen die Türen haben?",
                kind: QuestionType::Select,
                options: &["Weißlack", "CPL", "Holzfurnier", "Glas"],
                unit: None,
                covered_by: r"(?i)material|oberfläche",
                skip_when_known: None,
                position: 1,
            },
            MandatoryQuestion {
                key: "door_dimensions",
                text: "Bitte geben Sie für jede Tür einzeln die Maße an (Breite x Höhe in cm).",
                kind: QuestionType::Text,
                options: &[],
                unit: None,
                covered_by: r"(?i)\bmaße|abmessung|breite",
                skip_when_known: None,
                position: 2,
            },
        ],
        never_ask: &[],
        prompt_notes: &[],
    },
    TradeRules {
        code: "SCHL",
        owns: &["geländer", "metalltreppe", "stahltreppe", "gitter", "zaun"],
        critical: &[
            fact("Bauteil", r"(?i)geländer|treppe|balkon|gitter|zaun", 25),
            fact("Länge", r"(?i)länge|meter|\d+\s*m\b", 20),
            fact("Material", r"(?i)stahl|edelstahl|verzinkt|alu", 15),
        ],
        mandatory: &[],
        never_ask: &[],
        prompt_notes: &[],
    },
    TradeRules {
        code: "PV",
        owns: &["photovoltaik", "wechselrichter", "solarmodul", "batteriespeicher", "pv-"],
        critical: &[
            fact("Anlagenleistung", r"(?i)kwp|\d+\s*kw\b|leistung", 25),
            fact("Dachfläche", r"(?i)\d+(?:[.,]\d+)?\s*(?:m²|m2|qm)|dachfläche", 20),
            fact("Speicher", r"(?i)speicher|batterie", 10),
            fact("Ausrichtung", r"(?i)ausrichtung|süd|ost|west", 10),
        ],
        mandatory: &[],
        never_ask: &["gerüst"],
        prompt_notes: &[NO_SCAFFOLD_NOTE],
    },
];

pub static EXCLUSIVITY: &[Exclusivity] = &[
    Exclusivity {
        code: "BOD",
        rival: "FLI",
    },
    Exclusivity {
        code: "FLI",
        rival: "BOD",
    },
];

pub static COUNT_OVERRIDES: &[CountOverride] = &[
    CountOverride {
        code: "MAL",
        all_of: &[
            r"(?i)streich|anstrich|\bmalen",
            r"(?i)zimmer|raum|küche|flur|bad",
        ],
        none_of: &[r"(?i)fassade|treppenhaus|komplett|\d+\s*(?:zimmer|räume)"],
        requires_area: true,
        count: 5,
        reason: "Einzelraum-Anstrich mit bekannter Fläche",
    },
    CountOverride {
        code: "FLI",
        all_of: &[r"(?i)fliese", r"(?i)ausbesser|reparatur|reparier|einzelne"],
        none_of: &[r"(?i)komplett|neu verfliesen|sanier"],
        requires_area: false,
        count: 12,
        reason: "Reparatur einzelner Fliesen",
    },
];

/// Regex-compiled view of a [`TradeRules`] entry.
pub struct CompiledRules {
    pub rules: &'static TradeRules,
    owns: Vec<(&'static str, Regex)>,
    never_ask: Vec<(&'static str, Regex)>,
    pub critical: Vec<(CriticalFact, Regex)>,
    pub mandatory: Vec<(MandatoryQuestion, Regex)>,
}

impl CompiledRules {
    /// First responsibility keyword of this trade found in `text`.
    pub fn owned_keyword(&self, text: &str) -> Option<&'static str> {
        self.owns
            .iter()
            .find(|(_, re)| re.is_match(text))
            .map(|(kw, _)| *kw)
    }

    pub fn forbidden_topic(&self, text: &str) -> Option<&'static str> {
        self.never_ask
            .iter()
            .find(|(_, re)| re.is_match(text))
            .map(|(kw, _)| *kw)
    }

    pub fn owns_keyword(&self, keyword: &str) -> bool {
        self.owns.iter().any(|(kw, _)| *kw == keyword)
    }
}

/// Regex that matches `keyword` at the start of a word, case-insensitively.
pub fn keyword_regex(keyword: &str) -> Result<Regex, regex::Error> {
    Regex::new(&format!(r"(?i)\b{}", regex::escape(keyword)))
}

fn table_keyword(keyword: &'static str) -> (&'static str, Regex) {
    (keyword, keyword_regex(keyword).expect("rule table keywords are valid regexes"))
}

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("rule table patterns are valid regexes")
}

static COMPILED: Lazy<HashMap<&'static str, CompiledRules>> = Lazy::new(|| {
    TRADE_RULES
        .iter()
        .map(|rules| {
            let compiled = CompiledRules {
                rules,
                owns: rules.owns.iter().copied().map(table_keyword).collect(),
                never_ask: rules
                    .never_ask
                    .iter()
                    .copied()
                    .map(table_keyword)
                    .collect(),
                critical: rules
                    .critical
                    .iter()
                    .map(|f| (*f, compile(f.pattern)))
                    .collect(),
                mandatory: rules
                    .mandatory
                    .iter()
                    .map(|m| (*m, compile(m.covered_by)))
                    .collect(),
            };
            (rules.code, compiled)
        })
        .collect()
});

static AREA_RE: Lazy<Regex> = Lazy::new(|| compile(AREA_PATTERN));
static SOLAR_RE: Lazy<Regex> = Lazy::new(|| compile(SOLAR_PATTERN));
static OVERRIDE_RES: Lazy<Vec<(&'static CountOverride, Vec<Regex>, Vec<Regex>)>> =
    Lazy::new(|| {
        COUNT_OVERRIDES
            .iter()
            .map(|o| {
                (
                    o,
                    o.all_of.iter().map(|p| compile(p)).collect(),
                    o.none_of.iter().map(|p| compile(p)).collect(),
                )
            })
            .collect()
    });

/// Rules for a trade code. Trades without special rules (intake) yield `None`.
pub fn compiled(code: &str) -> Option<&'static CompiledRules> {
    COMPILED.get(code)
}

pub fn mentions_area(text: &str) -> bool {
    AREA_RE.is_match(text)
}

pub fn mentions_solar(text: &str) -> bool {
    SOLAR_RE.is_match(text)
}

/// The sibling trade (and keyword) that owns a topic mentioned in `text`.
///
/// Keywords the current trade owns itself never count as a conflict.
pub fn sibling_owner<'a>(
    current: &str,
    siblings: impl IntoIterator<Item = &'a str>,
    text: &str,
) -> Option<(&'a str, &'static str)> {
    let own = compiled(current);
    for sibling in siblings {
        if sibling == current {
            continue;
        }
        let Some(rules) = compiled(sibling) else {
            continue;
        };
        if let Some(kw) = rules.owned_keyword(text) {
            if own.map_or(false, |o| o.owns_keyword(kw)) {
                continue;
            }
            return Some((sibling, kw));
        }
    }
    None
}

/// Fixed question count for trivially scoped work, if one applies.
pub fn count_override(code: &str, text: &str, area_known: bool) -> Option<&'static CountOverride> {
    OVERRIDE_RES
        .iter()
        .filter(|(o, _, _)| o.code == code)
        .find(|(o, all, none)| {
            (!o.requires_area || area_known)
                && all.iter().all(|re| re.is_match(text))
                && !none.iter().any(|re| re.is_match(text))
        })
        .map(|(o, _, _)| *o)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog;

    #[test]
    fn every_rule_targets_a_catalog_trade() {
        for rules in TRADE_RULES {
            assert!(catalog::find(rules.code).is_some(), "{}", rules.code);
        }
        for code in NEEDS_SCAFFOLDING {
            assert!(catalog::find(code).is_some());
        }
        for o in COUNT_OVERRIDES {
            assert!(catalog::find(o.code).is_some());
        }
    }

    #[test]
    fn all_patterns_compile() {
        for rules in TRADE_RULES {
            let c = compiled(rules.code).unwrap();
            assert_eq!(c.critical.len(), rules.critical.len());
            assert_eq!(c.mandatory.len(), rules.mandatory.len());
        }
        assert!(!OVERRIDE_RES.is_empty());
    }

    #[test]
    fn override_counts_fit_the_trade_range() {
        for o in COUNT_OVERRIDES {
            let range = catalog::find(o.code).unwrap().question_range();
            assert_eq!(range.clamp(o.count), o.count, "{}", o.code);
        }
    }

    #[test]
    fn flooring_owns_parquet_and_tiling_owns_tiles() {
        let bod = compiled("BOD").unwrap();
        let fli = compiled("FLI").unwrap();
        assert_eq!(bod.owned_keyword("Soll Parkett verlegt werden?"), Some("parkett"));
        assert_eq!(fli.owned_keyword("Welche Fliesen wünschen Sie?"), Some("fliese"));
        assert_eq!(bod.owned_keyword("Welche Fliesen wünschen Sie?"), None);
    }

    #[test]
    fn keywords_match_at_word_start_only() {
        let tis = compiled("TIS").unwrap();
        assert_eq!(tis.owned_keyword("Wie viele Türen?"), Some("tür"));
        assert_eq!(tis.owned_keyword("Natürlich gedämmt?"), None);
    }

    #[test]
    fn sibling_owner_ignores_shared_keywords() {
        // Spachteln belongs to both drywall and painting.
        assert!(sibling_owner("TRO", ["MAL"], "Welche Spachtelqualität (Q2/Q3)?").is_none());
        assert_eq!(
            sibling_owner("SAN", ["FLI", "ELEKT"], "Sollen die Fliesen erneuert werden?"),
            Some(("FLI", "fliese"))
        );
    }

    #[test]
    fn area_and_solar_detection() {
        assert!(mentions_area("Badezimmer sanieren, 8m², neue Fliesen"));
        assert!(mentions_area("ca. 12,5 qm"));
        assert!(!mentions_area("drei Zimmer"));
        assert!(mentions_solar("Dach neu mit Photovoltaik"));
        assert!(!mentions_solar("Dach neu decken"));
    }

    #[test]
    fn simple_repaint_override() {
        let o = count_override("MAL", "Wohnzimmer streichen, 20 m²", true).unwrap();
        assert_eq!(o.count, 5);
        assert!(count_override("MAL", "Wohnzimmer streichen", false).is_none());
        assert!(count_override("MAL", "Fassade streichen, 200 m²", true).is_none());
    }
}
