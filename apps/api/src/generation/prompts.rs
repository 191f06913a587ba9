//! Prompt construction for post generation.
//!
//! Pure and deterministic: the same brand profile and past posts always produce the
//! same strings. The debug endpoint relies on this to reproduce production prompts.

use std::fmt::Write as _;

use crate::generation::models::{BrandProfile, PastPost};

/// Past posts beyond this count are ignored.
pub const MAX_PAST_POSTS: usize = 5;
/// Characters of each past post kept in the few-shot block.
pub const PAST_POST_CHARS: usize = 150;
/// Common phrases beyond this count are ignored.
const MAX_COMMON_PHRASES: usize = 5;

/// System message for post generation — enforces schema-only output.
pub const GENERATION_SYSTEM: &str = "You are an expert social media creator. \
    You strictly output JSON data matching the provided schema.";

/// Post generation prompt template.
/// Replace: {niche}, {audience}, {tone}, {style_summary}, {emotional_tone},
///          {common_phrases}, {topic_preferences}, {storytelling_style},
///          {avg_sentence_length}, {vocabulary_complexity}, {past_examples}
pub const GENERATION_PROMPT_TEMPLATE: &str = r#"You are a professional social media copywriter specializing in {niche}.

BRAND PROFILE:
- Niche: {niche}
- Target Audience: {audience}
- Brand Tone: {tone}
- Style: {style_summary}
- Emotional Tone: {emotional_tone}
- Common Phrases: {common_phrases}
- Topic Preferences: {topic_preferences}
- Storytelling Style: {storytelling_style}
- Average Sentence Length: {avg_sentence_length} words
- Vocabulary: {vocabulary_complexity}

SUCCESSFUL PAST POSTS:
{past_examples}

TASK:
Create 3 distinct Instagram content pieces. You must generate content for ALL three types:

1. TEXT-ONLY POST: Engaging caption and hashtags.
2. IMAGE POST: Visual-optimized caption and a detailed image generation prompt.
3. VIDEO POST: A full Reel script including hook, shooting instructions, and engagement strategy.

REQUIREMENTS:
- Match the brand's tone ({tone})
- Be educational yet promotional
- Use single quotes (') instead of double quotes (") for emphasis.
- Do NOT include markdown formatting."#;

/// Collapses newlines to spaces, swaps double quotes for single quotes, and trims,
/// so the value can sit on one line of a JSON-oriented prompt.
pub fn clean_str(text: &str) -> String {
    text.replace("\r\n", " ")
        .replace(['\n', '\r'], " ")
        .replace('"', "'")
        .trim()
        .to_string()
}

pub fn build_system_message(_brand: &BrandProfile) -> String {
    GENERATION_SYSTEM.to_string()
}

/// Builds the user prompt from the brand profile and at most the first
/// `MAX_PAST_POSTS` past posts, preserving their order.
pub fn build_prompt(brand: &BrandProfile, past_posts: &[PastPost]) -> String {
    let tone = clean_str(&brand.tone);

    let common_phrases = brand
        .common_phrases
        .iter()
        .take(MAX_COMMON_PHRASES)
        .map(|p| clean_str(p))
        .collect::<Vec<_>>()
        .join(", ");

    let topic_preferences = brand
        .topic_preferences
        .iter()
        .map(|t| clean_str(t))
        .collect::<Vec<_>>()
        .join(", ");

    GENERATION_PROMPT_TEMPLATE
        .replace("{niche}", &clean_str(&brand.niche))
        .replace("{audience}", &clean_str(&brand.audience))
        .replace("{tone}", &tone)
        .replace("{style_summary}", &clean_str(&brand.style_summary))
        .replace("{emotional_tone}", &clean_str(&brand.emotional_tone))
        .replace("{common_phrases}", &common_phrases)
        .replace("{topic_preferences}", &topic_preferences)
        .replace("{storytelling_style}", &clean_str(&brand.storytelling_style))
        .replace("{avg_sentence_length}", &brand.avg_sentence_length.to_string())
        .replace("{vocabulary_complexity}", &clean_str(&brand.vocabulary_complexity))
        .replace("{past_examples}", &build_past_examples(past_posts))
        .trim()
        .to_string()
}

/// Numbered few-shot block. Content is cut to `PAST_POST_CHARS` characters before cleaning.
fn build_past_examples(past_posts: &[PastPost]) -> String {
    let mut block = String::new();

    for (i, post) in past_posts.iter().take(MAX_PAST_POSTS).enumerate() {
        let content: String = post.content.chars().take(PAST_POST_CHARS).collect();
        let cta = post
            .call_to_action
            .as_deref()
            .map(clean_str)
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| "None".to_string());
        let hashtags = post
            .hashtags
            .iter()
            .map(|h| clean_str(h))
            .collect::<Vec<_>>()
            .join(" ");

        // Writing to a String cannot fail.
        let _ = write!(
            block,
            "{}. Tone: {} | Platform: {} | CTA: {}\n   Hashtags: {}\n   Content: {}...\n\n",
            i + 1,
            clean_str(&post.tone),
            clean_str(&post.platform),
            cta,
            hashtags,
            clean_str(&content),
        );
    }

    if block.is_empty() {
        block.push_str("(none provided)\n");
    }

    block
}
