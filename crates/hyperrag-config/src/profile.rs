//! Domain profiles and their prompt templates.
//!
//! A [`DomainProfile`] bundles everything that varies between knowledge
//! domains: the entity-type vocabulary, output language, few-shot examples,
//! wire delimiters, the continuation cap, and an immutable [`PromptSet`].
//! Two profiles ship built in (`technical` and `social`); configuration can
//! patch them or derive new ones.
//!
//! Templates use `{name}` placeholders. Rendering substitutes only the names
//! it is given, so literal braces (JSON examples) pass through untouched.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::{ConfigError, HyperragConfig, ProfileOverride, Result};

/// Default tuple (field) delimiter.
pub const DEFAULT_TUPLE_DELIMITER: &str = " | ";
/// Default record delimiter.
pub const DEFAULT_RECORD_DELIMITER: &str = "\n";
/// Default completion delimiter.
pub const DEFAULT_COMPLETION_DELIMITER: &str = "<|COMPLETE|>";

// ─────────────────────────────────────────────────────────────────────────────
// Templates
// ─────────────────────────────────────────────────────────────────────────────

/// Every prompt the engine issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TemplateKind {
    EntityExtraction,
    ContinueExtraction,
    LoopCheck,
    SummarizeEntityDescriptions,
    SummarizeEntityProperties,
    SummarizeRelationDescriptions,
    KeywordsExtraction,
    RagResponse,
}

impl TemplateKind {
    pub const ALL: [TemplateKind; 8] = [
        TemplateKind::EntityExtraction,
        TemplateKind::ContinueExtraction,
        TemplateKind::LoopCheck,
        TemplateKind::SummarizeEntityDescriptions,
        TemplateKind::SummarizeEntityProperties,
        TemplateKind::SummarizeRelationDescriptions,
        TemplateKind::KeywordsExtraction,
        TemplateKind::RagResponse,
    ];

    /// Name used in config files.
    pub fn name(&self) -> &'static str {
        match self {
            TemplateKind::EntityExtraction => "entity_extraction",
            TemplateKind::ContinueExtraction => "entity_continue_extraction",
            TemplateKind::LoopCheck => "entity_if_loop_extraction",
            TemplateKind::SummarizeEntityDescriptions => "summarize_entity_descriptions",
            TemplateKind::SummarizeEntityProperties => "summarize_entity_additional_properties",
            TemplateKind::SummarizeRelationDescriptions => "summarize_relation_descriptions",
            TemplateKind::KeywordsExtraction => "keywords_extraction",
            TemplateKind::RagResponse => "rag_response",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name() == name)
    }

    /// Placeholders the engine relies on; a template missing one is rejected.
    pub fn required_placeholders(&self) -> &'static [&'static str] {
        match self {
            TemplateKind::EntityExtraction => &[
                "tuple_delimiter",
                "record_delimiter",
                "completion_delimiter",
                "entity_types",
                "examples",
                "input_text",
            ],
            TemplateKind::ContinueExtraction | TemplateKind::LoopCheck => &[],
            TemplateKind::SummarizeEntityDescriptions => &["entity_name", "description_list"],
            TemplateKind::SummarizeEntityProperties => {
                &["entity_name", "additional_properties_list"]
            }
            TemplateKind::SummarizeRelationDescriptions => {
                &["relation_name", "relation_description_list"]
            }
            TemplateKind::KeywordsExtraction => &["query"],
            TemplateKind::RagResponse => &["context_data", "response_type"],
        }
    }
}

impl fmt::Display for TemplateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Substitute `{key}` occurrences whose key appears in `vars`.
///
/// Single pass: substituted values are never re-scanned, so input text that
/// happens to contain `{input_text}` stays literal.
pub fn render_template(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        if let Some(end) = after.find('}') {
            let key = &after[..end];
            if let Some((_, value)) = vars.iter().find(|(k, _)| *k == key) {
                out.push_str(value);
                rest = &after[end + 1..];
                continue;
            }
        }
        out.push('{');
        rest = after;
    }

    out.push_str(rest);
    out
}

fn has_placeholder(template: &str, name: &str) -> bool {
    template.contains(&format!("{{{name}}}"))
}

/// Immutable set of prompt templates, validated once at load time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptSet {
    templates: BTreeMap<TemplateKind, String>,
}

impl PromptSet {
    /// The built-in templates.
    pub fn builtin() -> Self {
        let templates = TemplateKind::ALL
            .into_iter()
            .map(|kind| (kind, builtin_template(kind).to_string()))
            .collect();
        Self { templates }
    }

    /// Copy of this set with named templates replaced.
    pub fn with_overrides(&self, profile: &str, overrides: &BTreeMap<String, String>) -> Result<Self> {
        let mut templates = self.templates.clone();
        for (name, text) in overrides {
            let kind = TemplateKind::from_name(name).ok_or_else(|| ConfigError::UnknownTemplate {
                profile: profile.to_string(),
                template: name.clone(),
            })?;
            templates.insert(kind, text.clone());
        }
        let set = Self { templates };
        set.validate()?;
        Ok(set)
    }

    /// Check every template carries its required placeholders.
    pub fn validate(&self) -> Result<()> {
        for kind in TemplateKind::ALL {
            let template = self.get(kind);
            for placeholder in kind.required_placeholders() {
                if !has_placeholder(template, placeholder) {
                    return Err(ConfigError::MissingPlaceholder {
                        template: kind.name().to_string(),
                        placeholder: (*placeholder).to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Raw template text.
    pub fn get(&self, kind: TemplateKind) -> &str {
        self.templates
            .get(&kind)
            .map(String::as_str)
            .unwrap_or_else(|| builtin_template(kind))
    }

    /// Render a template with the given substitutions.
    pub fn render(&self, kind: TemplateKind, vars: &[(&str, &str)]) -> String {
        render_template(self.get(kind), vars)
    }
}

impl Default for PromptSet {
    fn default() -> Self {
        Self::builtin()
    }
}

fn builtin_template(kind: TemplateKind) -> &'static str {
    match kind {
        TemplateKind::EntityExtraction => ENTITY_EXTRACTION,
        TemplateKind::ContinueExtraction => CONTINUE_EXTRACTION,
        TemplateKind::LoopCheck => LOOP_CHECK,
        TemplateKind::SummarizeEntityDescriptions => SUMMARIZE_ENTITY_DESCRIPTIONS,
        TemplateKind::SummarizeEntityProperties => SUMMARIZE_ENTITY_PROPERTIES,
        TemplateKind::SummarizeRelationDescriptions => SUMMARIZE_RELATION_DESCRIPTIONS,
        TemplateKind::KeywordsExtraction => KEYWORDS_EXTRACTION,
        TemplateKind::RagResponse => RAG_RESPONSE,
    }
}

const ENTITY_EXTRACTION: &str = r#"-Role-
You are a knowledge graph engineer. {domain}

-Goal-
Turn the text below into entities, pairwise relationships, thematic keywords,
and multi-entity relationships. Keep entity names exactly as written in the
text. Write descriptions in {language}.

-Entity types-
{entity_types}

-Steps-
1. Identify entities. For each one output:
("Entity"{tuple_delimiter}<entity_name>{tuple_delimiter}<entity_type>{tuple_delimiter}<entity_description>{tuple_delimiter}<additional_properties>)

2. Identify pairs of entities that are clearly related. For each pair output:
("Low-order Hyperedge"{tuple_delimiter}<entity_name1>{tuple_delimiter}<entity_name2>{tuple_delimiter}<description>{tuple_delimiter}<keywords>{tuple_delimiter}<strength 1-10>)

3. Summarize the main themes of the text:
("High-level keywords"{tuple_delimiter}<keyword1, keyword2, ...>)

4. Identify groups of three or more entities that take part in one scenario. For each group output:
("High-order Hyperedge"{tuple_delimiter}<entity1>{tuple_delimiter}<entity2>{tuple_delimiter}<entityN>{tuple_delimiter}<description>{tuple_delimiter}<generalization>{tuple_delimiter}<keywords>{tuple_delimiter}<strength 1-10>)

5. Separate records with {record_delimiter}

6. Finish with {completion_delimiter}

######################
-Examples-
######################
{examples}
######################
-Real data-
######################
Text: {input_text}
######################
Output:
"#;

const CONTINUE_EXTRACTION: &str =
    "MANY entities were missed in the last extraction. Add them below using the same format:\n";

const LOOP_CHECK: &str = "It appears some entities may have still been missed. Answer YES | NO if there are still entities that need to be added.\n";

const SUMMARIZE_ENTITY_DESCRIPTIONS: &str = r#"You are responsible for merging several descriptions of one entity into a single precise definition.
Remove duplicated details, resolve contradictions, and keep key technical terms as written.
Write in {language}, in the third person.
#######
-Data-
Entity: {entity_name}
Description List: {description_list}
#######
Output:
"#;

const SUMMARIZE_ENTITY_PROPERTIES: &str = r#"You are responsible for generating a comprehensive summary of the data provided below.
Given one entity and a list of its additional properties, concatenate them into a single, coherent description that keeps information from every property.
If the properties are contradictory, resolve the contradictions.
#######
-Data-
Entity: {entity_name}
Additional Properties List: {additional_properties_list}
#######
Output:
"#;

const SUMMARIZE_RELATION_DESCRIPTIONS: &str = r#"You are responsible for summarizing how a set of entities relate to each other.
State dependencies, data flow, or cause and effect explicitly. Write in {language}.
#######
-Data-
Entity Set: {relation_name}
Relation Description List: {relation_description_list}
#######
Output:
"#;

const KEYWORDS_EXTRACTION: &str = r#"---Role---
You turn a user's question into retrieval keywords for a knowledge graph.

---Goal---
Output a JSON object with two lists:
1. "high_level_keywords": overarching concepts or themes.
2. "low_level_keywords": specific entities, file names, commands, parameters, or errors.

---Example---
Query: "Why does the certificate cause an error?"
Output: {"high_level_keywords": ["Certificate Management", "Troubleshooting"], "low_level_keywords": ["SSL Certificate", "Thumbprint", "Error"]}

---Real query---
{query}
"#;

const RAG_RESPONSE: &str = r#"---Role---
You are a helpful assistant answering questions from the knowledge graph tables below.
If the tables do not contain the answer, say so. Do not make anything up.

---Data tables---
{context_data}

---Target response length and format---
{response_type}
"#;

// ─────────────────────────────────────────────────────────────────────────────
// Domain Profile
// ─────────────────────────────────────────────────────────────────────────────

/// Wire delimiters of the extraction format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delimiters {
    pub tuple: String,
    pub record: String,
    pub completion: String,
}

impl Default for Delimiters {
    fn default() -> Self {
        Self {
            tuple: DEFAULT_TUPLE_DELIMITER.to_string(),
            record: DEFAULT_RECORD_DELIMITER.to_string(),
            completion: DEFAULT_COMPLETION_DELIMITER.to_string(),
        }
    }
}

/// Named bundle of extraction settings for one knowledge domain.
#[derive(Debug, Clone)]
pub struct DomainProfile {
    pub name: String,
    /// One-paragraph brief inserted into the extraction prompt.
    pub domain: String,
    pub entity_types: Vec<String>,
    pub language: String,
    /// Few-shot examples; may reference the delimiter placeholders.
    pub examples: Vec<String>,
    pub delimiters: Delimiters,
    /// Continuation rounds allowed per chunk.
    pub max_gleaning: u32,
    pub prompts: Arc<PromptSet>,
}

/// Names of the profiles that ship with hyperrag.
pub const BUILTIN_PROFILES: [&str; 2] = ["technical", "social"];

impl DomainProfile {
    /// Technical documentation: installation guides, runbooks, manuals.
    pub fn technical() -> Self {
        Self {
            name: "technical".to_string(),
            domain: "You extract deployment and operations knowledge from technical documentation: \
                     which components exist, how they are configured, and how failures are fixed."
                .to_string(),
            entity_types: to_strings(&[
                "Component",
                "Role",
                "Artifact",
                "Action",
                "Parameter",
                "Error",
                "Concept",
            ]),
            language: "English".to_string(),
            examples: vec![TECHNICAL_EXAMPLE.to_string()],
            delimiters: Delimiters::default(),
            max_gleaning: 1,
            prompts: Arc::new(PromptSet::builtin()),
        }
    }

    /// Social dynamics: values, preferences, and behaviour patterns in conversation.
    pub fn social() -> Self {
        Self {
            name: "social".to_string(),
            domain: "You extract a person's values, preferences, and behaviour patterns from \
                     conversations and personal writing."
                .to_string(),
            entity_types: to_strings(&[
                "Value",
                "Preference",
                "DefenseMechanism",
                "CommunicationStyle",
                "RedFlag",
                "Context",
                "Action",
            ]),
            language: "English".to_string(),
            examples: vec![SOCIAL_EXAMPLE.to_string()],
            delimiters: Delimiters::default(),
            max_gleaning: 1,
            prompts: Arc::new(PromptSet::builtin()),
        }
    }

    /// Look up a built-in profile by name.
    pub fn builtin(name: &str) -> Option<Self> {
        match name {
            "technical" => Some(Self::technical()),
            "social" => Some(Self::social()),
            _ => None,
        }
    }

    /// Map a type string from completion output onto this profile's vocabulary
    /// (case-insensitive). `None` when the type is not part of it.
    pub fn canonical_type(&self, raw: &str) -> Option<&str> {
        let raw = raw.trim().trim_matches(|c| c == '"' || c == '\'');
        self.entity_types
            .iter()
            .find(|t| t.eq_ignore_ascii_case(raw))
            .map(String::as_str)
    }

    /// Few-shot examples with this profile's delimiters filled in.
    pub fn rendered_examples(&self) -> String {
        let vars = self.delimiter_vars();
        self.examples
            .iter()
            .map(|e| render_template(e, &vars))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Substitutions for the three delimiter placeholders.
    pub fn delimiter_vars(&self) -> [(&'static str, &str); 3] {
        [
            ("tuple_delimiter", self.delimiters.tuple.as_str()),
            ("record_delimiter", self.delimiters.record.as_str()),
            ("completion_delimiter", self.delimiters.completion.as_str()),
        ]
    }

    /// Reject profiles the parser or prompts cannot work with.
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: &str| ConfigError::InvalidProfile {
            profile: self.name.clone(),
            reason: reason.to_string(),
        };

        if self.entity_types.is_empty() {
            return Err(invalid("entity type set is empty"));
        }
        if self.entity_types.iter().any(|t| t.trim().is_empty()) {
            return Err(invalid("entity types must not be blank"));
        }
        if self.delimiters.tuple.is_empty()
            || self.delimiters.record.is_empty()
            || self.delimiters.completion.is_empty()
        {
            return Err(invalid("delimiters must not be empty"));
        }
        if self.delimiters.tuple == self.delimiters.record {
            return Err(invalid("tuple and record delimiters must differ"));
        }
        if self.language.trim().is_empty() {
            return Err(invalid("language must not be empty"));
        }

        self.prompts.validate()
    }

    /// Apply a config override on top of this profile.
    fn with_override(mut self, name: &str, ov: &ProfileOverride) -> Result<Self> {
        self.name = name.to_string();
        if let Some(ref types) = ov.entity_types {
            self.entity_types = types.iter().map(|t| t.trim().to_string()).collect();
        }
        if let Some(ref language) = ov.language {
            self.language = language.clone();
        }
        if let Some(ref examples) = ov.examples {
            self.examples = examples.clone();
        }
        if let Some(ref d) = ov.tuple_delimiter {
            self.delimiters.tuple = d.clone();
        }
        if let Some(ref d) = ov.record_delimiter {
            self.delimiters.record = d.clone();
        }
        if let Some(ref d) = ov.completion_delimiter {
            self.delimiters.completion = d.clone();
        }
        if let Some(n) = ov.max_gleaning {
            self.max_gleaning = n;
        }
        if !ov.templates.is_empty() {
            self.prompts = Arc::new(self.prompts.with_overrides(name, &ov.templates)?);
        }
        Ok(self)
    }
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

/// Resolve a profile by name: built-ins, patched or extended by `[profile.<name>]`.
///
/// `[extraction] max_gleaning` applies last. The result is validated.
pub fn resolve_profile(config: &HyperragConfig, name: &str) -> Result<DomainProfile> {
    let profile = match config.profile.get(name) {
        Some(ov) => {
            let base_name = ov.base.as_deref().unwrap_or(
                if DomainProfile::builtin(name).is_some() {
                    name
                } else {
                    "technical"
                },
            );
            let base = DomainProfile::builtin(base_name)
                .ok_or_else(|| ConfigError::UnknownProfile(base_name.to_string()))?;
            base.with_override(name, ov)?
        }
        None => DomainProfile::builtin(name)
            .ok_or_else(|| ConfigError::UnknownProfile(name.to_string()))?,
    };

    let mut profile = profile;
    if let Some(n) = config.extraction.as_ref().and_then(|e| e.max_gleaning) {
        profile.max_gleaning = n;
    }

    profile.validate()?;
    tracing::debug!(
        profile = %profile.name,
        entity_types = profile.entity_types.len(),
        max_gleaning = profile.max_gleaning,
        "Resolved domain profile"
    );
    Ok(profile)
}

/// Every profile name usable with this config, sorted.
pub fn available_profiles(config: &HyperragConfig) -> Vec<String> {
    let mut names: Vec<String> = BUILTIN_PROFILES.iter().map(|s| s.to_string()).collect();
    names.extend(config.profile.keys().cloned());
    names.sort();
    names.dedup();
    names
}

const TECHNICAL_EXAMPLE: &str = r#"Example 1:

Text:
"To configure TouchPoint authentication, the Administrator must edit the Web.config file. Verify that the thumbprint value in the issuerNameRegistry section matches the AD FS signing certificate."

################
Output:
("Entity"{tuple_delimiter}TouchPoint{tuple_delimiter}Component{tuple_delimiter}Application whose authentication is being configured.{tuple_delimiter}status: target system){record_delimiter}
("Entity"{tuple_delimiter}Administrator{tuple_delimiter}Role{tuple_delimiter}User who performs the configuration change.{tuple_delimiter}privilege: elevated){record_delimiter}
("Entity"{tuple_delimiter}Web.config{tuple_delimiter}Artifact{tuple_delimiter}Main XML configuration file of TouchPoint.{tuple_delimiter}format: XML){record_delimiter}
("Entity"{tuple_delimiter}thumbprint{tuple_delimiter}Parameter{tuple_delimiter}Fingerprint value identifying a certificate.{tuple_delimiter}importance: critical){record_delimiter}
("Entity"{tuple_delimiter}AD FS signing certificate{tuple_delimiter}Artifact{tuple_delimiter}Certificate AD FS uses to sign tokens.{tuple_delimiter}source: AD FS){record_delimiter}
("Low-order Hyperedge"{tuple_delimiter}Web.config{tuple_delimiter}TouchPoint{tuple_delimiter}Web.config controls how TouchPoint behaves.{tuple_delimiter}CONFIGURES{tuple_delimiter}10){record_delimiter}
("Low-order Hyperedge"{tuple_delimiter}thumbprint{tuple_delimiter}AD FS signing certificate{tuple_delimiter}The configured thumbprint must match the real certificate.{tuple_delimiter}MUST_MATCH{tuple_delimiter}10){record_delimiter}
("High-level keywords"{tuple_delimiter}Authentication Config, Certificate Trust, XML Editing){record_delimiter}
("High-order Hyperedge"{tuple_delimiter}TouchPoint{tuple_delimiter}Web.config{tuple_delimiter}thumbprint{tuple_delimiter}AD FS signing certificate{tuple_delimiter}The administrator authorizes AD FS as identity provider by copying the signing certificate thumbprint into the TouchPoint Web.config.{tuple_delimiter}Certificate trust setup{tuple_delimiter}Configuration, Security{tuple_delimiter}9){completion_delimiter}
#############################"#;

const SOCIAL_EXAMPLE: &str = r#"Example 1:

Text:
"She lights up at K-Pop concerts and loves sharing that energy with the crowd. When her date looked bored and checked his phone, she walked out."

################
Output:
("Entity"{tuple_delimiter}K-Pop culture{tuple_delimiter}Preference{tuple_delimiter}Strong attachment to K-Pop groups and idol culture.{tuple_delimiter}intensity: high){record_delimiter}
("Entity"{tuple_delimiter}Collective excitement{tuple_delimiter}Value{tuple_delimiter}Values sharing emotional energy with a crowd in the moment.{tuple_delimiter}intensity: high){record_delimiter}
("Entity"{tuple_delimiter}Indifference{tuple_delimiter}RedFlag{tuple_delimiter}Partner ignoring or dampening her excitement reads as lack of empathy.{tuple_delimiter}intensity: high){record_delimiter}
("Entity"{tuple_delimiter}Walking out{tuple_delimiter}Action{tuple_delimiter}Ends the interaction when emotional needs are ignored.{tuple_delimiter}type: conflict response){record_delimiter}
("Low-order Hyperedge"{tuple_delimiter}Indifference{tuple_delimiter}Walking out{tuple_delimiter}Indifference toward her excitement triggers her leaving.{tuple_delimiter}TRIGGERS{tuple_delimiter}9){record_delimiter}
("High-level keywords"{tuple_delimiter}Emotional resonance, Boundaries, Shared experiences){record_delimiter}
("High-order Hyperedge"{tuple_delimiter}K-Pop culture{tuple_delimiter}Collective excitement{tuple_delimiter}Indifference{tuple_delimiter}Walking out{tuple_delimiter}Sharing a passion is a test of resonance; indifference at that moment ends the relationship.{tuple_delimiter}Resonance test through shared passion{tuple_delimiter}Compatibility, Boundaries{tuple_delimiter}9){completion_delimiter}
#############################"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_profiles_validate() {
        for name in BUILTIN_PROFILES {
            let profile = DomainProfile::builtin(name).unwrap();
            profile.validate().unwrap();
            assert_eq!(profile.delimiters, Delimiters::default());
        }
    }

    #[test]
    fn test_render_only_known_keys() {
        let out = render_template(
            r#"{a} and {"json": 1} and {missing}"#,
            &[("a", "x{missing}")],
        );
        assert_eq!(out, r#"x{missing} and {"json": 1} and {missing}"#);
    }

    #[test]
    fn test_render_unclosed_brace() {
        assert_eq!(render_template("tail {open", &[("open", "no")]), "tail {open");
    }

    #[test]
    fn test_examples_use_profile_delimiters() {
        let mut profile = DomainProfile::technical();
        profile.delimiters.tuple = "<|>".to_string();
        let examples = profile.rendered_examples();
        assert!(examples.contains("(\"Entity\"<|>TouchPoint<|>Component"));
        assert!(examples.contains(DEFAULT_COMPLETION_DELIMITER));
        assert!(!examples.contains("{tuple_delimiter}"));
    }

    #[test]
    fn test_canonical_type_is_case_insensitive() {
        let profile = DomainProfile::technical();
        assert_eq!(profile.canonical_type("component"), Some("Component"));
        assert_eq!(profile.canonical_type("\"ERROR\""), Some("Error"));
        assert_eq!(profile.canonical_type("Planet"), None);
    }

    #[test]
    fn test_override_with_missing_placeholder_fails() {
        let mut templates = BTreeMap::new();
        templates.insert("rag_response".to_string(), "Answer: {context_data}".to_string());
        let err = PromptSet::builtin()
            .with_overrides("custom", &templates)
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::MissingPlaceholder { ref placeholder, .. } if placeholder == "response_type"
        ));
    }

    #[test]
    fn test_override_with_unknown_template_fails() {
        let mut templates = BTreeMap::new();
        templates.insert("naive_rag".to_string(), "{x}".to_string());
        let err = PromptSet::builtin()
            .with_overrides("custom", &templates)
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownTemplate { .. }));
    }

    #[test]
    fn test_resolve_unknown_profile() {
        let err = resolve_profile(&HyperragConfig::new(), "astrology").unwrap_err();
        assert!(matches!(err, ConfigError::UnknownProfile(_)));
    }

    #[test]
    fn test_resolve_custom_profile_extends_base() {
        let config = HyperragConfig::from_toml(
            r#"
[extraction]
max_gleaning = 3

[profile.legal]
entity_types = ["Statute", "Party"]
tuple_delimiter = "<|>"

[profile.legal.templates]
rag_response = "Tables: {context_data}\nFormat: {response_type}"
"#,
        )
        .unwrap();

        let profile = resolve_profile(&config, "legal").unwrap();
        assert_eq!(profile.name, "legal");
        assert_eq!(profile.entity_types, vec!["Statute", "Party"]);
        assert_eq!(profile.delimiters.tuple, "<|>");
        assert_eq!(profile.delimiters.record, "\n");
        assert_eq!(profile.max_gleaning, 3);
        assert!(profile.prompts.get(TemplateKind::RagResponse).starts_with("Tables:"));
        assert_eq!(
            profile.prompts.get(TemplateKind::LoopCheck),
            PromptSet::builtin().get(TemplateKind::LoopCheck)
        );
    }

    #[test]
    fn test_resolve_rejects_empty_entity_types() {
        let config = HyperragConfig::from_toml("[profile.social]\nentity_types = []\n").unwrap();
        let err = resolve_profile(&config, "social").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidProfile { .. }));
    }

    #[test]
    fn test_resolve_rejects_empty_delimiter() {
        let config =
            HyperragConfig::from_toml("[profile.technical]\ncompletion_delimiter = \"\"\n").unwrap();
        assert!(resolve_profile(&config, "technical").is_err());
    }

    #[test]
    fn test_available_profiles_lists_custom() {
        let config = HyperragConfig::from_toml("[profile.legal]\n").unwrap();
        assert_eq!(available_profiles(&config), vec!["legal", "social", "technical"]);
    }
}
