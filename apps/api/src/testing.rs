//! Fakes and fixtures shared by unit tests.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::generation::models::{BrandProfile, GeneratePostRequest, PastPost};
use crate::images::{ImageError, ImageProvider, ImageRequest, ProviderResult};
use crate::llm_client::{LlmError, TextGenerator};

type Responder = dyn Fn(u32) -> Result<String, LlmError> + Send + Sync;

/// Text generator driven by a closure over the 1-based call number.
pub(crate) struct FakeText {
    pub calls: Arc<AtomicU32>,
    respond: Box<Responder>,
}

impl FakeText {
    pub(crate) fn new(respond: impl Fn(u32) -> Result<String, LlmError> + Send + Sync + 'static) -> Self {
        Self {
            calls: Arc::new(AtomicU32::new(0)),
            respond: Box::new(respond),
        }
    }

    pub(crate) fn always_valid() -> Self {
        Self::new(|_| Ok(valid_payload()))
    }
}

#[async_trait]
impl TextGenerator for FakeText {
    async fn generate(&self, _system: &str, _prompt: &str, _schema: &Value) -> Result<String, LlmError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        (self.respond)(call)
    }
}

/// Image provider that fails or succeeds on demand and records every request.
pub(crate) struct FakeProvider {
    pub name: &'static str,
    pub outcome: Result<String, u16>,
    pub calls: Arc<AtomicU32>,
    pub seen: Arc<Mutex<Vec<ImageRequest>>>,
}

impl FakeProvider {
    pub(crate) fn ok(name: &'static str, url: &str) -> Self {
        Self::with(name, Ok(url.to_string()))
    }

    pub(crate) fn failing(name: &'static str, status: u16) -> Self {
        Self::with(name, Err(status))
    }

    fn with(name: &'static str, outcome: Result<String, u16>) -> Self {
        Self {
            name,
            outcome,
            calls: Arc::new(AtomicU32::new(0)),
            seen: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

#[async_trait]
impl ImageProvider for FakeProvider {
    fn name(&self) -> &str {
        self.name
    }

    async fn attempt(&self, request: &ImageRequest) -> Result<ProviderResult, ImageError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(request.clone());
        match &self.outcome {
            Ok(url) => Ok(ProviderResult {
                image_url: url.clone(),
                local_path: None,
                error: None,
            }),
            Err(status) => Err(ImageError::Rejected {
                status: *status,
                message: "boom".to_string(),
            }),
        }
    }
}

pub(crate) fn valid_value() -> Value {
    json!({
        "text": { "caption": "Spores to supper in 10 days", "hashtags": ["#mushrooms", "#growyourown"] },
        "image": {
            "caption": "Golden oysters, fresh off the block",
            "hashtags": ["#oystermushroom"],
            "imagePrompt": "A cluster of golden oyster mushrooms\non a rustic wooden board"
        },
        "video": {
            "hook": "You can grow these on your counter",
            "caption": "Day 1 to harvest",
            "script": "Open the kit. Mist twice a day. Harvest.",
            "shootingInstructions": "Vertical, natural light, close-ups",
            "audienceEngagement": "Ask viewers what they'd cook first",
            "hashtags": ["#reels"]
        }
    })
}

pub(crate) fn valid_payload() -> String {
    valid_value().to_string()
}

pub(crate) fn brand() -> BrandProfile {
    BrandProfile {
        tone: "friendly".to_string(),
        niche: "gourmet mushrooms".to_string(),
        audience: "home cooks".to_string(),
        style_summary: "short, warm, practical".to_string(),
        avg_sentence_length: 12,
        vocabulary_complexity: "simple".to_string(),
        common_phrases: vec!["grow your own".to_string()],
        topic_preferences: vec!["recipes".to_string()],
        emotional_tone: "upbeat".to_string(),
        storytelling_style: "behind the scenes".to_string(),
    }
}

pub(crate) fn request() -> GeneratePostRequest {
    GeneratePostRequest {
        brand_profile: brand(),
        past_posts: vec![PastPost {
            content: "Our lion's mane flush came in overnight!".to_string(),
            platform: "instagram".to_string(),
            tone: "excited".to_string(),
            hashtags: vec!["#lionsmane".to_string()],
            call_to_action: Some("Order a kit".to_string()),
        }],
    }
}
