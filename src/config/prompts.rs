//! Prompt templates for Undre.
//!
//! Prompts can be customized by placing TOML files in the custom prompts directory.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Collection of all prompt templates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Prompts {
    /// Prompt for extracting episode metadata from free-text queries.
    pub extraction: ExtractionPrompts,
    /// Prompt for generating suggested questions from transcript text.
    pub generation: GenerationPrompts,
    /// Custom variables from config, available in all prompts.
    #[serde(skip)]
    pub variables: std::collections::HashMap<String, String>,
}


/// Prompts for metadata extraction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionPrompts {
    pub user: String,
}

impl Default for ExtractionPrompts {
    fn default() -> Self {
        Self {
            user: r#"User query: {{user_intent}}

Extract related metadata from the user query.
Valid metadata fields are episode number, episode title, episode date, and topic.
Only include fields in the response if they are explicitly mentioned or clearly implied in the query.

Return valid JSON (not in markdown) with a single top-level object, no backticks and no additional quotes around the entire object.
For example:
{
    "episode_number": 510,
    "episode_title": "The Title",
    "episode_date": "2022-01-01",
    "topic": "The Topic"
}"#
            .to_string(),
        }
    }
}

/// Prompts for question generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationPrompts {
    pub user: String,
}

impl Default for GenerationPrompts {
    fn default() -> Self {
        Self {
            user: r#"Here is some transcript text from a podcast episode:
'{{transcript}}'
I want you to provide 3-5 short questions, each question should be between 3-8 words and each question should focus on specific people, places, events or ideas.
Be on the lookout for movie references, art, music, and other pop culture references and ask questions about those.
Word the questions in such a way that the question is only answerable from the text itself, if the answer to your question cannot be answered by only the text, do not include it in the list.
Most importantly, each question should be interesting and creative enough to engage the reader and entice them to click on it.
Please return the questions as a JSON array of strings without any formatting artifacts such as backticks."#
                .to_string(),
        }
    }
}

impl Prompts {
    /// Load prompts from the default location, with optional custom directory and variables.
    pub fn load(
        custom_dir: Option<&str>,
        custom_variables: Option<&std::collections::HashMap<String, String>>,
    ) -> crate::error::Result<Self> {
        let mut prompts = Prompts::default();

        // Store custom variables
        if let Some(vars) = custom_variables {
            prompts.variables = vars.clone();
        }

        if let Some(dir) = custom_dir {
            let custom_path = PathBuf::from(shellexpand::tilde(dir).to_string());

            // Load extraction prompts if file exists
            let extraction_path = custom_path.join("extraction.toml");
            if extraction_path.exists() {
                let content = std::fs::read_to_string(&extraction_path)?;
                prompts.extraction = toml::from_str(&content)?;
            }

            // Load generation prompts if file exists
            let generation_path = custom_path.join("generation.toml");
            if generation_path.exists() {
                let content = std::fs::read_to_string(&generation_path)?;
                prompts.generation = toml::from_str(&content)?;
            }
        }

        Ok(prompts)
    }

    /// Render a prompt template with the given variables.
    pub fn render(template: &str, vars: &std::collections::HashMap<String, String>) -> String {
        let mut result = template.to_string();
        for (key, value) in vars {
            result = result.replace(&format!("{{{{{}}}}}", key), value);
        }
        result
    }

    /// Render a prompt template with both provided variables and custom config variables.
    /// Provided variables take precedence over custom config variables.
    pub fn render_with_custom(
        &self,
        template: &str,
        vars: &std::collections::HashMap<String, String>,
    ) -> String {
        // Start with custom variables, then override with provided vars
        let mut merged = self.variables.clone();
        for (key, value) in vars {
            merged.insert(key.clone(), value.clone());
        }
        Self::render(template, &merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_prompts() {
        let prompts = Prompts::default();
        assert!(!prompts.extraction.user.is_empty());
        assert!(!prompts.generation.user.is_empty());
    }

    #[test]
    fn test_render_template() {
        let template = "Hello {{name}}, you have {{count}} messages.";
        let mut vars = std::collections::HashMap::new();
        vars.insert("name".to_string(), "Alice".to_string());
        vars.insert("count".to_string(), "5".to_string());

        let result = Prompts::render(template, &vars);
        assert_eq!(result, "Hello Alice, you have 5 messages.");
    }
}
