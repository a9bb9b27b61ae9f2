// Department extraction: turns a job title into the backend's structured unit guess.
// Backend calls go through ollama_client; this module only builds prompts and reads replies.

pub mod handlers;
pub mod normalizer;
