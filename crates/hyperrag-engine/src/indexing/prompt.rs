//! Prompt builders over a profile's template set.

use hyperrag_config::{DomainProfile, TemplateKind};
use hyperrag_graph::{FragmentTarget, GRAPH_FIELD_SEP};

/// Extraction conversation prompts.
pub struct ExtractionPrompt;

impl ExtractionPrompt {
    /// First request for a chunk.
    pub fn build(profile: &DomainProfile, input_text: &str) -> String {
        let entity_types = profile.entity_types.join(", ");
        let examples = profile.rendered_examples();
        let [tuple, record, completion] = profile.delimiter_vars();

        profile.prompts.render(
            TemplateKind::EntityExtraction,
            &[
                tuple,
                record,
                completion,
                ("entity_types", entity_types.as_str()),
                ("examples", examples.as_str()),
                ("domain", profile.domain.as_str()),
                ("language", profile.language.as_str()),
                ("input_text", input_text),
            ],
        )
    }

    /// Follow-up asking for records the previous answers missed.
    pub fn continuation(profile: &DomainProfile) -> String {
        let [tuple, record, completion] = profile.delimiter_vars();
        profile.prompts.render(
            TemplateKind::ContinueExtraction,
            &[tuple, record, completion, ("language", profile.language.as_str())],
        )
    }

    /// Yes/no probe deciding whether to continue.
    pub fn loop_check(profile: &DomainProfile) -> String {
        profile.prompts.render(TemplateKind::LoopCheck, &[])
    }
}

/// Condense a fragment list into one description.
pub struct SummaryPrompt;

impl SummaryPrompt {
    /// `label` is the display name of the entity or edge.
    pub fn build(
        profile: &DomainProfile,
        target: &FragmentTarget,
        label: &str,
        fragments: &[String],
    ) -> String {
        let list = fragments.join(GRAPH_FIELD_SEP);
        let language = ("language", profile.language.as_str());

        match target {
            FragmentTarget::EntityDescription(_) => profile.prompts.render(
                TemplateKind::SummarizeEntityDescriptions,
                &[("entity_name", label), ("description_list", list.as_str()), language],
            ),
            FragmentTarget::EntityProperties(_) => profile.prompts.render(
                TemplateKind::SummarizeEntityProperties,
                &[
                    ("entity_name", label),
                    ("additional_properties_list", list.as_str()),
                    language,
                ],
            ),
            FragmentTarget::EdgeDescription(_) | FragmentTarget::HyperedgeDescription(_) => {
                profile.prompts.render(
                    TemplateKind::SummarizeRelationDescriptions,
                    &[
                        ("relation_name", label),
                        ("relation_description_list", list.as_str()),
                        language,
                    ],
                )
            }
        }
    }
}

/// Query-side prompts.
pub struct QueryPrompt;

impl QueryPrompt {
    pub fn keywords(profile: &DomainProfile, query: &str) -> String {
        profile.prompts.render(
            TemplateKind::KeywordsExtraction,
            &[("query", query), ("language", profile.language.as_str())],
        )
    }

    pub fn response(profile: &DomainProfile, context_data: &str, response_type: &str) -> String {
        profile.prompts.render(
            TemplateKind::RagResponse,
            &[
                ("context_data", context_data),
                ("response_type", response_type),
                ("language", profile.language.as_str()),
            ],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyperrag_graph::PairKey;

    #[test]
    fn test_extraction_prompt_fills_placeholders() {
        let profile = DomainProfile::technical();
        let prompt = ExtractionPrompt::build(&profile, "Edit the Web.config file.");
        assert!(prompt.contains("Text: Edit the Web.config file."));
        assert!(prompt.contains("Component, Role, Artifact"));
        assert!(prompt.contains("(\"Entity\" | <entity_name>"));
        assert!(prompt.contains("<|COMPLETE|>"));
        assert!(!prompt.contains("{tuple_delimiter}"));
        assert!(!prompt.contains("{examples}"));
    }

    #[test]
    fn test_input_text_is_not_rescanned() {
        let profile = DomainProfile::technical();
        let prompt = ExtractionPrompt::build(&profile, "literal {entity_types} here");
        assert!(prompt.contains("literal {entity_types} here"));
    }

    #[test]
    fn test_summary_prompt_per_target() {
        let profile = DomainProfile::technical();
        let fragments = vec!["d1".to_string(), "d2".to_string()];

        let entity = SummaryPrompt::build(
            &profile,
            &FragmentTarget::EntityDescription("X".into()),
            "X",
            &fragments,
        );
        assert!(entity.contains("Entity: X"));
        assert!(entity.contains("d1<SEP>d2"));

        let props = SummaryPrompt::build(
            &profile,
            &FragmentTarget::EntityProperties("X".into()),
            "X",
            &fragments,
        );
        assert!(props.contains("Additional Properties List: d1<SEP>d2"));

        let key = PairKey::new("A", "B").unwrap();
        let edge = SummaryPrompt::build(
            &profile,
            &FragmentTarget::EdgeDescription(key.clone()),
            &key.to_string(),
            &fragments,
        );
        assert!(edge.contains("Relation Description List: d1<SEP>d2"));
    }

    #[test]
    fn test_query_prompts() {
        let profile = DomainProfile::technical();
        assert!(QueryPrompt::keywords(&profile, "Why does login fail?").contains("Why does login fail?"));
        let response = QueryPrompt::response(&profile, "-----Entities-----", "Single Paragraph");
        assert!(response.contains("-----Entities-----"));
        assert!(response.contains("Single Paragraph"));
    }
}
