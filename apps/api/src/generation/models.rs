//! Request, response, and model-facing data types for post generation.
//!
//! Wire names are camelCase to match the public API.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

// ────────────────────────────────────────────────────────────────────────────
// Inputs
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrandProfile {
    pub tone: String,
    pub niche: String,
    pub audience: String,
    pub style_summary: String,
    pub avg_sentence_length: u32,
    pub vocabulary_complexity: String,
    pub common_phrases: Vec<String>,
    pub topic_preferences: Vec<String>,
    pub emotional_tone: String,
    pub storytelling_style: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PastPost {
    pub content: String,
    pub platform: String,
    pub tone: String,
    pub hashtags: Vec<String>,
    #[serde(default)]
    pub call_to_action: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratePostRequest {
    pub brand_profile: BrandProfile,
    pub past_posts: Vec<PastPost>,
}

// ────────────────────────────────────────────────────────────────────────────
// Outputs
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextPost {
    pub caption: String,
    pub hashtags: Vec<String>,
}

/// Image variant as the text model produces it. No URL yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageDraft {
    pub caption: String,
    pub hashtags: Vec<String>,
    pub image_prompt: String,
}

/// Image variant as returned to API callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImagePost {
    pub caption: String,
    pub hashtags: Vec<String>,
    pub image_prompt: String,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoPost {
    pub hook: String,
    pub caption: String,
    pub script: String,
    pub shooting_instructions: String,
    pub audience_engagement: String,
    pub hashtags: Vec<String>,
}

/// The structured object the text model must return. Every field is required:
/// deserializing into this type is the schema check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftContent {
    pub text: TextPost,
    pub image: ImageDraft,
    pub video: VideoPost,
}

/// Final three-variant response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedContent {
    pub text: TextPost,
    pub image: ImagePost,
    pub video: VideoPost,
}

impl GeneratedContent {
    /// Attaches the resolved image reference to a validated draft.
    pub fn assemble(draft: DraftContent, image_url: String) -> Self {
        let DraftContent { text, image, video } = draft;
        Self {
            text,
            image: ImagePost {
                caption: image.caption,
                hashtags: image.hashtags,
                image_prompt: image.image_prompt,
                image_url: Some(image_url),
            },
            video,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugPromptResponse {
    pub system_message: String,
    pub prompt: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
}

// ────────────────────────────────────────────────────────────────────────────
// Provider-facing response schema
// ────────────────────────────────────────────────────────────────────────────

/// OpenAPI-style schema sent with every text-generation call. Mirrors `DraftContent`.
pub fn response_schema() -> Value {
    let string = json!({ "type": "STRING" });
    let tags = json!({ "type": "ARRAY", "items": { "type": "STRING" } });

    json!({
        "type": "OBJECT",
        "properties": {
            "text": {
                "type": "OBJECT",
                "properties": { "caption": string, "hashtags": tags },
                "required": ["caption", "hashtags"]
            },
            "image": {
                "type": "OBJECT",
                "properties": { "caption": string, "hashtags": tags, "imagePrompt": string },
                "required": ["caption", "hashtags", "imagePrompt"]
            },
            "video": {
                "type": "OBJECT",
                "properties": {
                    "hook": string,
                    "caption": string,
                    "script": string,
                    "shootingInstructions": string,
                    "audienceEngagement": string,
                    "hashtags": tags
                },
                "required": [
                    "hook",
                    "caption",
                    "script",
                    "shootingInstructions",
                    "audienceEngagement",
                    "hashtags"
                ]
            }
        },
        "required": ["text", "image", "video"]
    })
}
