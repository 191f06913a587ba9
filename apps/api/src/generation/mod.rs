// Post generation: prompt construction, model output repair, retry, and the
// pipeline that ties them to the image provider chain.
// All text-model calls go through llm_client.

pub mod handlers;
pub mod models;
pub mod pipeline;
pub mod prompts;
pub mod repair;
pub mod retry;
