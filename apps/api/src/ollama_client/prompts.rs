// Prompt construction for the department extraction call.
// The instruction text itself comes from the settings file or the caller.

/// Label placed in front of the job title, matching the Swedish instruction prompts.
const TITLE_LABEL: &str = "Titel";

/// Joins the instruction prompt and the job title into the prompt sent to Ollama.
pub fn build_prompt(instruction: &str, title: &str) -> String {
    format!("{instruction}\n\n{TITLE_LABEL}: {title}")
}
