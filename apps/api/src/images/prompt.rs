//! Turns a model-written image description into a provider-bound prompt.

/// Characters of the cleaned caption kept in the prompt. Some providers put the
/// prompt in the URL path, so it has to stay short.
pub const MAX_CAPTION_CHARS: usize = 200;

const STYLE_CUES: &str = "Style: clean, bright, Instagram-worthy. \
    Lighting: natural daylight, soft shadows. \
    Composition: rule of thirds, shallow depth of field. \
    Quality: high resolution, sharp focus. \
    No text, no watermarks.";

/// Single-line prompt: niche + cleaned caption (whitespace collapsed, newlines
/// removed, at most `MAX_CAPTION_CHARS`) + fixed style cues.
pub fn optimize_image_prompt(caption: &str, niche: &str) -> String {
    let caption: String = collapse_whitespace(caption)
        .chars()
        .take(MAX_CAPTION_CHARS)
        .collect();
    let caption = caption.trim().trim_end_matches('.');
    let niche = collapse_whitespace(niche);

    if niche.is_empty() {
        format!("Professional photography: {caption}. {STYLE_CUES}")
    } else {
        format!("Professional photography of {niche}: {caption}. {STYLE_CUES}")
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
