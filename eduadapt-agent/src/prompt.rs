//! Prompt assembly for adaptation requests.
//!
//! Builds system prompts that describe the reader profile and the response
//! grammar the page formatter understands.

use crate::types::*;

/// Assembles prompts from a profile and its options.
pub struct PromptAssembler;

impl PromptAssembler {
    /// Build the system prompt for one adaptation request.
    pub fn build_system_prompt(profile: Profile, options: &AdaptationOptions) -> String {
        let mut prompt = String::new();

        prompt.push_str("# ROLE\n\n");
        prompt.push_str("You rewrite web page text so that a student can read it more easily.\n");
        prompt.push_str("Keep every fact. Never add information that is not in the original.\n\n");

        prompt.push_str("## READER PROFILE\n\n");
        prompt.push_str(&Self::profile_guidance(profile, options));
        prompt.push('\n');

        prompt.push_str("## GRADE GUIDANCE\n\n");
        prompt.push_str(Self::grade_guidance(options.grade_level));
        prompt.push('\n');

        prompt.push_str("## OUTPUT FORMAT\n\n");
        prompt.push_str("Use only these plain-text conventions:\n");
        prompt.push_str("- `## Heading` lines for short section titles\n");
        prompt.push_str("- lines starting with `- ` for list items\n");
        prompt.push_str("- `**word**` to mark a key word\n");
        prompt.push_str("- a line `Glossary:` followed by `term - definition` lines for hard words\n");
        if options.grade_level != GradeLevel::Lower {
            prompt.push_str("- `Question: ...` lines for check-your-understanding questions\n");
        }
        prompt.push_str("\nDo not describe what you did. Do not mention the audience or the reading level.\n");
        prompt.push_str("Return only the rewritten text.\n");

        prompt
    }

    /// Build the user message carrying the original text.
    pub fn build_user_prompt(text: &str) -> String {
        format!("Rewrite the following text:\n\n{}", text.trim())
    }

    fn profile_guidance(profile: Profile, options: &AdaptationOptions) -> String {
        match profile {
            Profile::Dyslexia => {
                let level = match options.dyslexia_level {
                    DyslexiaLevel::Low => {
                        "Keep most of the original wording. Split sentences longer than 25 words."
                    }
                    DyslexiaLevel::Medium => {
                        "Use short sentences of at most 15 words and common everyday words."
                    }
                    DyslexiaLevel::High => {
                        "Use very short sentences of at most 10 words. Replace every uncommon word with a simple one."
                    }
                };
                format!(
                    "The reader has dyslexia. {}\nKeep one idea per sentence and avoid dense paragraphs.\n",
                    level
                )
            }
            Profile::Adhd => {
                let length = match options.adhd_summary_length {
                    AdhdSummaryLength::Short => "Use at most 3 bullet points.",
                    AdhdSummaryLength::Long => "Use 4 to 6 bullet points.",
                };
                format!(
                    "The reader has ADHD. Summarize the text as action-focused bullet points. {}\nPut the most important point first and mark one key word per bullet in bold.\n",
                    length
                )
            }
            Profile::Autism => "The reader is autistic. Use literal, explicit language.\nAvoid idioms, metaphors, sarcasm and vague words like \"soon\" or \"some\".\nKeep a predictable structure: a heading, then short factual lines.\n".to_string(),
            Profile::Default => "Simplify the text for a general student audience.\nKeep paragraphs short and the vocabulary clear.\n".to_string(),
        }
    }

    fn grade_guidance(grade: GradeLevel) -> &'static str {
        match grade {
            GradeLevel::Lower => {
                "Write for early primary grades. Use the simplest words. Do not ask any questions.\n"
            }
            GradeLevel::Middle => {
                "Write for middle school. You may add one question that checks understanding.\n"
            }
            GradeLevel::Upper => {
                "Write for high school. You may add up to two questions that invite deeper thinking.\n"
            }
        }
    }
}
