//! Parser for delimited extraction output.
//!
//! Wire format, with the default delimiters:
//!
//! ```text
//! ("Entity" | <name> | <type> | <description> | <additional_properties>)
//! ("Low-order Hyperedge" | <name1> | <name2> | <description> | <keywords> | <strength>)
//! ("High-level keywords" | <keyword1, keyword2, ...>)
//! ("High-order Hyperedge" | <name1> | ... | <nameN> | <description> | <generalization> | <keywords> | <strength>)
//! <|COMPLETE|>
//! ```
//!
//! Bad lines are skipped and counted; parsing never fails.

use std::collections::BTreeSet;

use tracing::debug;

use hyperrag_config::{Delimiters, DomainProfile};
use hyperrag_graph::{
    Batch, EdgeObservation, EntityObservation, HyperedgeObservation, MAX_STRENGTH, MIN_STRENGTH,
    NEUTRAL_STRENGTH, Origin, UNKNOWN_TYPE, clean_name,
};

pub const ENTITY_TAG: &str = "Entity";
pub const LOW_ORDER_TAG: &str = "Low-order Hyperedge";
pub const KEYWORDS_TAG: &str = "High-level keywords";
pub const HIGH_ORDER_TAG: &str = "High-order Hyperedge";

/// Fields after the participant names of a high-order record.
const HIGH_ORDER_TRAILING: usize = 4;

// ─────────────────────────────────────────────────────────────────────────────
// Records
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityRecord {
    pub name: String,
    pub entity_type: String,
    pub description: String,
    pub properties: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeRecord {
    pub source: String,
    pub target: String,
    pub description: String,
    pub keywords: Vec<String>,
    pub strength: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HyperedgeRecord {
    pub participants: Vec<String>,
    pub description: String,
    pub generalization: String,
    pub keywords: Vec<String>,
    pub strength: u8,
}

/// One tagged line of extraction output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    Entity(EntityRecord),
    LowOrderEdge(EdgeRecord),
    ThematicKeywords(Vec<String>),
    HighOrderEdge(HyperedgeRecord),
}

/// Records from one completion plus diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedRecords {
    pub records: Vec<Record>,
    /// Lines turned into records.
    pub parsed: usize,
    /// Non-blank lines dropped as unknown or malformed.
    pub skipped: usize,
}

impl ParsedRecords {
    pub fn extend(&mut self, other: ParsedRecords) {
        self.records.extend(other.records);
        self.parsed += other.parsed;
        self.skipped += other.skipped;
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Parsing
// ─────────────────────────────────────────────────────────────────────────────

/// Parse one block of completion text.
pub fn parse_records(text: &str, delimiters: &Delimiters) -> ParsedRecords {
    let body = match text.find(&delimiters.completion) {
        Some(end) => &text[..end],
        None => text,
    };

    let mut out = ParsedRecords::default();
    for raw in body.split(delimiters.record.as_str()) {
        let line = strip_parens(raw.trim());
        if line.is_empty() {
            continue;
        }
        match parse_line(line, &delimiters.tuple) {
            Some(record) => {
                out.records.push(record);
                out.parsed += 1;
            }
            None => {
                debug!(line, "Skipping unparseable record");
                out.skipped += 1;
            }
        }
    }
    out
}

fn strip_parens(line: &str) -> &str {
    let line = line.strip_prefix('(').unwrap_or(line);
    line.strip_suffix(')').unwrap_or(line).trim()
}

fn parse_line(line: &str, tuple: &str) -> Option<Record> {
    let fields: Vec<&str> = line.split(tuple).map(str::trim).collect();
    let (tag, rest) = fields.split_first()?;
    let tag = unquote(tag);
    let field = |i: usize| rest.get(i).map_or(String::new(), |f| unquote(f).to_string());

    if tag.eq_ignore_ascii_case(ENTITY_TAG) {
        let name = clean_name(rest.first()?);
        if name.is_empty() {
            return None;
        }
        Some(Record::Entity(EntityRecord {
            name,
            entity_type: field(1),
            description: field(2),
            properties: field(3),
        }))
    } else if tag.eq_ignore_ascii_case(LOW_ORDER_TAG) {
        let source = clean_name(rest.first()?);
        let target = clean_name(rest.get(1)?);
        if source.is_empty() || target.is_empty() {
            return None;
        }
        Some(Record::LowOrderEdge(EdgeRecord {
            source,
            target,
            description: field(2),
            keywords: split_keywords(&field(3)),
            strength: parse_strength(&field(4)),
        }))
    } else if tag.eq_ignore_ascii_case(KEYWORDS_TAG) {
        let keywords: Vec<String> = rest.iter().flat_map(|f| split_keywords(f)).collect();
        if keywords.is_empty() {
            return None;
        }
        Some(Record::ThematicKeywords(keywords))
    } else if tag.eq_ignore_ascii_case(HIGH_ORDER_TAG) {
        if rest.len() < 2 + HIGH_ORDER_TRAILING {
            return None;
        }
        let split = rest.len() - HIGH_ORDER_TRAILING;
        let participants: Vec<String> = rest[..split]
            .iter()
            .map(|n| clean_name(n))
            .filter(|n| !n.is_empty())
            .collect();
        if participants.len() < 2 {
            return None;
        }
        Some(Record::HighOrderEdge(HyperedgeRecord {
            participants,
            description: field(split),
            generalization: field(split + 1),
            keywords: split_keywords(&field(split + 2)),
            strength: parse_strength(&field(split + 3)),
        }))
    } else {
        None
    }
}

fn unquote(field: &str) -> &str {
    field.trim().trim_matches(|c| c == '"' || c == '\'').trim()
}

fn split_keywords(field: &str) -> Vec<String> {
    field
        .split([',', '，'])
        .map(|k| unquote(k).to_string())
        .filter(|k| !k.is_empty())
        .collect()
}

/// Integer, else rounded float, else the neutral midpoint; clamped to `[1, 10]`.
pub fn parse_strength(raw: &str) -> u8 {
    let raw = unquote(raw);
    let value = if let Ok(n) = raw.parse::<i64>() {
        n
    } else if let Ok(f) = raw.parse::<f64>()
        && f.is_finite()
    {
        f.round() as i64
    } else {
        i64::from(NEUTRAL_STRENGTH)
    };
    value.clamp(i64::from(MIN_STRENGTH), i64::from(MAX_STRENGTH)) as u8
}

// ─────────────────────────────────────────────────────────────────────────────
// Batch construction
// ─────────────────────────────────────────────────────────────────────────────

/// Turn a chunk's record stream into a merge batch.
///
/// Record positions become origin sequence numbers; entity types are mapped
/// onto the profile's vocabulary, anything else becomes `UNKNOWN`.
pub fn build_batch(chunk_id: &str, records: &[Record], profile: &DomainProfile) -> Batch {
    let mut batch = Batch::new(chunk_id);
    let mut thematic = BTreeSet::new();

    for (seq, record) in records.iter().enumerate() {
        let origin = Origin::new(chunk_id, u32::try_from(seq).unwrap_or(u32::MAX));
        match record {
            Record::Entity(r) => batch.entities.push(EntityObservation {
                name: r.name.clone(),
                entity_type: profile
                    .canonical_type(&r.entity_type)
                    .unwrap_or(UNKNOWN_TYPE)
                    .to_string(),
                description: r.description.clone(),
                properties: r.properties.clone(),
                origin,
            }),
            Record::LowOrderEdge(r) => batch.edges.push(EdgeObservation {
                source: r.source.clone(),
                target: r.target.clone(),
                description: r.description.clone(),
                keywords: r.keywords.clone(),
                strength: r.strength,
                origin,
            }),
            Record::ThematicKeywords(keywords) => thematic.extend(keywords.iter().cloned()),
            Record::HighOrderEdge(r) => batch.hyperedges.push(HyperedgeObservation {
                participants: r.participants.clone(),
                description: r.description.clone(),
                generalization: r.generalization.clone(),
                keywords: r.keywords.clone(),
                strength: r.strength,
                origin,
            }),
        }
    }

    batch.thematic_keywords = thematic.into_iter().collect();
    batch
}
