// Cross-cutting prompt fragments applied to every text-generation call.
// Brand-specific prompt text lives in generation::prompts.

/// Appended to the system instruction. The provider's schema mode is advisory, so the
/// model is told explicitly that no variant may be skipped.
pub const ALL_KEYS_INSTRUCTION: &str = "IMPORTANT: You must generate content for ALL three keys: \
    'text', 'image', and 'video'. Do not skip any section.";

/// Appended after the user prompt.
pub const JSON_ONLY_SUFFIX: &str = "Return ONLY valid JSON, no markdown.";
