//! Fact extraction and the read-only "known facts" view.
//!
//! [`extract_facts`] runs once over a project description. [`KnownFacts`]
//! merges those facts with answers from earlier phases and answers two
//! questions for the orchestrator: what to list as "never ask again" in the
//! generation instruction, and whether a drafted question re-asks something
//! already known.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

use super::assumptions::PLACEHOLDER_ANSWER;
use super::text;
use crate::catalog::rules::{self, KnownTopic};
use crate::domain::{BuildingFlags, ExtractedFacts, PriorAnswer, ProjectContext};

/// Token similarity above which a drafted question repeats an answered one.
const NEAR_DUPLICATE: f64 = 0.6;

fn re(pattern: &str) -> Regex {
    Regex::new(pattern).expect("fact patterns are valid regexes")
}

const COUNT_WORDS: &[(&str, u32)] = &[
    ("ein", 1),
    ("eine", 1),
    ("einen", 1),
    ("zwei", 2),
    ("drei", 3),
    ("vier", 4),
    ("fünf", 5),
    ("sechs", 6),
    ("sieben", 7),
    ("acht", 8),
    ("neun", 9),
    ("zehn", 10),
    ("elf", 11),
    ("zwölf", 12),
];

const COUNT: &str = r"(\d+|ein|eine|einen|zwei|drei|vier|fünf|sechs|sieben|acht|neun|zehn|elf|zwölf)";

static WINDOW_COUNT: Lazy<Regex> =
    Lazy::new(|| re(&format!(r"(?i)\b{COUNT}\s+(?:\w+\s+)?fenster\b")));
static DOOR_COUNT: Lazy<Regex> = Lazy::new(|| {
    re(&format!(
        r"(?i)\b{COUNT}\s+(?:\w+\s+)?(?:innen|zimmer|haus)?türen?\b"
    ))
});
static ROOM_COUNT: Lazy<Regex> =
    Lazy::new(|| re(&format!(r"(?i)\b{COUNT}[\s-]*(?:zimmer|räume)\b")));
static AREA: Lazy<Regex> =
    Lazy::new(|| re(r"(?i)(\d+(?:[.,]\d+)?)\s*(?:m²|m2|qm|quadratmeter)"));

static MEASURES: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    [
        ("Fassadendämmung", r"(?i)fassad\w*dämm|wdvs|dämmung der fassade"),
        ("Dachdämmung", r"(?i)dach\w*dämm|dämmung des dach"),
        ("Dachsanierung", r"(?i)dach\w*(?:sanier|erneuer|neu eindeck)|neues dach"),
        ("Fenstertausch", r"(?i)fenster\w*(?:tausch|erneuer|wechsel)|neue fenster"),
        ("Heizungstausch", r"(?i)heizung\w*(?:tausch|erneuer|wechsel)|neue heizung|wärmepumpe"),
        ("Photovoltaik", rules::SOLAR_PATTERN),
        ("Badsanierung", r"(?i)bad\w*\s+(?:\w+\s+)?(?:sanier|renovier|modernisier)|badsanierung"),
        ("Elektrosanierung", r"(?i)elektr\w*\s*(?:sanier|erneuer)|neue elektrik"),
        ("Kernsanierung", r"(?i)kernsanier|entkern"),
    ]
    .into_iter()
    .map(|(label, pattern)| (label, re(pattern)))
    .collect()
});

static ROOMS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    [
        ("Bad", r"(?i)\bbad(?:ezimmer)?\b|\bbäder\b"),
        ("Gäste-WC", r"(?i)gäste-?wc"),
        ("Küche", r"(?i)\bküche"),
        ("Wohnzimmer", r"(?i)wohnzimmer"),
        ("Schlafzimmer", r"(?i)schlafzimmer"),
        ("Kinderzimmer", r"(?i)kinderzimmer"),
        ("Arbeitszimmer", r"(?i)arbeitszimmer"),
        ("Flur", r"(?i)\bflur|\bdiele\b"),
        ("Keller", r"(?i)\bkeller"),
        ("Dachgeschoss", r"(?i)dachgeschoss|\bdg\b"),
    ]
    .into_iter()
    .map(|(label, pattern)| (label, re(pattern)))
    .collect()
});

static APARTMENT: Lazy<Regex> = Lazy::new(|| re(r"(?i)\bwohnung|\betw\b|eigentumswohnung"));
static DETACHED: Lazy<Regex> = Lazy::new(|| re(r"(?i)einfamilienhaus|\befh\b|freistehend"));
static MULTI_FAMILY: Lazy<Regex> = Lazy::new(|| re(r"(?i)mehrfamilienhaus|\bmfh\b"));
static OLD_BUILDING: Lazy<Regex> =
    Lazy::new(|| re(r"(?i)altbau|denkmal|baujahr\s+1[89]\d\d|baujahr\s+19[0-6]\d"));

fn parse_count(token: &str) -> Option<u32> {
    let token = token.to_lowercase();
    token.parse().ok().or_else(|| {
        COUNT_WORDS
            .iter()
            .find(|(word, _)| *word == token)
            .map(|(_, n)| *n)
    })
}

fn first_count(re: &Regex, text: &str) -> Option<u32> {
    re.captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| parse_count(m.as_str()))
}

/// Derive structured facts from a free-text description.
pub fn extract_facts(description: &str) -> ExtractedFacts {
    let floor_area_m2 = AREA
        .captures(description)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().replace(',', ".").parse::<f64>().ok());

    ExtractedFacts {
        window_count: first_count(&WINDOW_COUNT, description),
        door_count: first_count(&DOOR_COUNT, description),
        room_count: first_count(&ROOM_COUNT, description),
        floor_area_m2,
        measures: MEASURES
            .iter()
            .filter(|(_, re)| re.is_match(description))
            .map(|(label, _)| label.to_string())
            .collect(),
        rooms: ROOMS
            .iter()
            .filter(|(_, re)| re.is_match(description))
            .map(|(label, _)| label.to_string())
            .collect(),
        building: BuildingFlags {
            apartment: APARTMENT.is_match(description),
            detached_house: DETACHED.is_match(description),
            multi_family: MULTI_FAMILY.is_match(description),
            old_building: OLD_BUILDING.is_match(description),
        },
    }
}

/// A fact topic a drafted question can re-ask.
struct Topic {
    name: &'static str,
    question: Regex,
}

static TOPICS: Lazy<Vec<Topic>> = Lazy::new(|| {
    [
        (
            "area",
            r"(?i)wie (?:groß|viel)[^?]*(?:fläche|m²|qm|quadratmeter)|welche (?:gesamt)?fläche|(?:fläche|größe)[^?]*\(?in (?:m²|qm|quadratmeter)|gesamtfläche|\bquadratmeter",
        ),
        ("window_count", r"(?i)wie viele fenster|anzahl (?:der )?fenster"),
        (
            "door_count",
            r"(?i)wie viele (?:innen|zimmer|haus)?türen|anzahl (?:der )?(?:innen|zimmer)?türen",
        ),
        ("room_count", r"(?i)wie viele (?:zimmer|räume)|anzahl (?:der )?(?:zimmer|räume)"),
        ("rooms", r"(?i)welche[rn]? (?:räume|raum|zimmer)\b|um welchen raum|in welchem raum"),
        (
            "building",
            r"(?i)gebäudetyp|gebäudeart|art des gebäudes|welche art von (?:gebäude|immobilie)|(?:wohnung|haus) oder|einfamilienhaus oder",
        ),
        ("budget", r"(?i)budget|kostenrahmen|wie viel (?:möchten|wollen) sie ausgeben"),
        ("timeframe", r"(?i)zeitraum|zeitrahmen|zeitplan|bis wann|wann soll"),
    ]
    .into_iter()
    .map(|(name, pattern)| Topic {
        name,
        question: re(pattern),
    })
    .collect()
});

fn topic_of(kind: KnownTopic) -> &'static str {
    match kind {
        KnownTopic::Area => "area",
        KnownTopic::WindowCount => "window_count",
        KnownTopic::DoorCount => "door_count",
    }
}

fn is_area_question(question: &str) -> bool {
    TOPICS
        .iter()
        .any(|t| t.name == "area" && t.question.is_match(question))
}

/// Everything already known about a project, as seen by one generation run.
#[derive(Debug, Clone, Default)]
pub struct KnownFacts {
    known_topics: HashSet<&'static str>,
    lines: Vec<String>,
    answered: Vec<(String, HashSet<String>)>,
}

impl KnownFacts {
    /// Merge extracted facts, project context and prior-phase answers.
    pub fn new(context: &ProjectContext, facts: &ExtractedFacts, prior: &[PriorAnswer]) -> Self {
        let mut known = Self::default();

        if let Some(area) = facts.floor_area_m2 {
            known.learn("area", format!("Fläche: {area} m²"));
        }
        if let Some(n) = facts.window_count {
            known.learn("window_count", format!("Anzahl Fenster: {n}"));
        }
        if let Some(n) = facts.door_count {
            known.learn("door_count", format!("Anzahl Türen: {n}"));
        }
        if let Some(n) = facts.room_count {
            known.learn("room_count", format!("Anzahl Zimmer: {n}"));
        }
        if !facts.rooms.is_empty() {
            known.learn("rooms", format!("Räume: {}", facts.rooms.join(", ")));
        }
        if facts.building.any() {
            known.learn("building", format!("Gebäude: {}", building_label(&facts.building)));
        }
        if !facts.measures.is_empty() {
            known
                .lines
                .push(format!("Geplante Maßnahmen: {}", facts.measures.join(", ")));
        }
        if let Some(budget) = context.budget.as_deref().filter(|b| !b.trim().is_empty()) {
            known.learn("budget", format!("Budget: {budget}"));
        }
        if let Some(timeframe) = context.timeframe.as_deref().filter(|t| !t.trim().is_empty()) {
            known.learn("timeframe", format!("Zeitrahmen: {timeframe}"));
        }

        for answer in prior {
            let value = answer.answer.trim();
            if value.is_empty() {
                continue;
            }
            known
                .lines
                .push(format!("{} → {}", answer.question.trim(), value));
            known
                .answered
                .push((answer.question.clone(), text::tokens(&answer.question)));
            if value == PLACEHOLDER_ANSWER {
                continue;
            }
            for topic in TOPICS.iter().filter(|t| t.question.is_match(&answer.question)) {
                known.known_topics.insert(topic.name);
            }
        }

        known
    }

    fn learn(&mut self, topic: &'static str, line: String) {
        self.known_topics.insert(topic);
        self.lines.push(line);
    }

    pub fn knows(&self, topic: KnownTopic) -> bool {
        self.known_topics.contains(topic_of(topic))
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Known topic a drafted question asks about again, if any.
    pub fn covered_topic(&self, question: &str) -> Option<&'static str> {
        TOPICS
            .iter()
            .filter(|t| self.known_topics.contains(t.name))
            .find(|t| t.question.is_match(question))
            .map(|t| t.name)
    }

    /// An already answered question the draft repeats in other words.
    pub fn near_duplicate(&self, question: &str) -> Option<&str> {
        let tokens = text::tokens(question);
        self.answered
            .iter()
            .find(|(_, answered)| text::jaccard(&tokens, answered) >= NEAR_DUPLICATE)
            .map(|(q, _)| q.as_str())
    }

    /// The "never ask again" block of a generation instruction.
    pub fn prompt_block(&self) -> String {
        if self.lines.is_empty() {
            return String::new();
        }
        let mut block = String::from("BEREITS BEKANNT (NIEMALS ERNEUT FRAGEN):\n");
        for line in &self.lines {
            block.push_str("- ");
            block.push_str(line);
            block.push('\n');
        }
        block
    }
}

fn building_label(flags: &BuildingFlags) -> String {
    let mut parts = Vec::new();
    if flags.apartment {
        parts.push("Wohnung");
    }
    if flags.detached_house {
        parts.push("Einfamilienhaus");
    }
    if flags.multi_family {
        parts.push("Mehrfamilienhaus");
    }
    if flags.old_building {
        parts.push("Altbau");
    }
    parts.join(", ")
}

/// Text a completeness pattern can match for one prior answer.
///
/// A bare number given for an area question is rendered with its unit so
/// area patterns see it.
pub fn answer_fact_text(answer: &PriorAnswer) -> String {
    let value = answer.answer.trim();
    let numeric = value.replace(',', ".").parse::<f64>().is_ok();
    if numeric && is_area_question(&answer.question) {
        format!("{value} m²")
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn prior(question: &str, answer: &str) -> PriorAnswer {
        PriorAnswer {
            question: question.into(),
            answer: answer.into(),
        }
    }

    #[test]
    fn extracts_bathroom_facts() {
        let facts = extract_facts("Badezimmer sanieren, 8m², neue Fliesen");
        assert_eq!(facts.floor_area_m2, Some(8.0));
        assert_eq!(facts.rooms, vec!["Bad".to_string()]);
        assert_eq!(facts.measures, vec!["Badsanierung".to_string()]);
        assert_eq!(facts.window_count, None);
    }

    #[test]
    fn extracts_counts_in_digits_and_words() {
        let facts = extract_facts(
            "Einfamilienhaus, Altbau: 6 neue Fenster, drei Innentüren, 4-Zimmer, 12,5 qm Flur",
        );
        assert_eq!(facts.window_count, Some(6));
        assert_eq!(facts.door_count, Some(3));
        assert_eq!(facts.room_count, Some(4));
        assert_eq!(facts.floor_area_m2, Some(12.5));
        assert!(facts.building.detached_house && facts.building.old_building);
        assert!(facts.measures.contains(&"Fenstertausch".to_string()));
    }

    #[test]
    fn empty_description_yields_empty_facts() {
        assert!(extract_facts("Hallo").is_empty());
    }

    #[test]
    fn known_area_covers_area_questions() {
        let facts = extract_facts("Badezimmer sanieren, 8m², neue Fliesen");
        let known = KnownFacts::new(&ProjectContext::default(), &facts, &[]);
        assert!(known.knows(KnownTopic::Area));
        assert_eq!(
            known.covered_topic("Wie groß ist die zu fliesende Fläche (in m²)?"),
            Some("area")
        );
        assert_eq!(known.covered_topic("Welches Fliesenformat wünschen Sie?"), None);
        assert!(known.prompt_block().contains("Fläche: 8 m²"));
    }

    #[test]
    fn prior_answers_become_known() {
        let known = KnownFacts::new(
            &ProjectContext::default(),
            &ExtractedFacts::default(),
            &[prior("Wie viele Fenster sollen getauscht werden?", "5")],
        );
        assert!(known.knows(KnownTopic::WindowCount));
        assert!(known
            .near_duplicate("Wie viele Fenster sollen insgesamt getauscht werden?")
            .is_some());
    }

    #[test]
    fn uncertain_answers_do_not_establish_a_topic() {
        let known = KnownFacts::new(
            &ProjectContext::default(),
            &ExtractedFacts::default(),
            &[prior("Wie groß ist die Wohnfläche (in m²)?", PLACEHOLDER_ANSWER)],
        );
        assert!(!known.knows(KnownTopic::Area));
    }

    #[test]
    fn numeric_area_answer_gets_its_unit() {
        let a = prior("Wie groß ist die Fläche in m²?", "8");
        assert_eq!(answer_fact_text(&a), "8 m²");
        assert_eq!(answer_fact_text(&prior("Welche Farbe?", "weiß")), "weiß");
    }
}
