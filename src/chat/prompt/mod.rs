#[cfg(test)]
mod tests;

use std::fmt::Write as _;

use super::{ChatMessage, Role};

/// Retrieved material placed in front of the model
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContextBlock {
    /// Chunk texts that passed the confidence gate, best first
    InternalDocuments(Vec<String>),
    /// Answer from the web-search model
    WebSearch(String),
}

impl ContextBlock {
    fn render(&self, out: &mut String) {
        match self {
            Self::InternalDocuments(texts) => {
                out.push_str("--- INTERNAL DOCUMENTS ---\n");
                out.push_str(&texts.join("\n\n"));
            }
            Self::WebSearch(result) => {
                out.push_str("--- WEB SEARCH RESULTS ---\n");
                out.push_str(result.trim());
            }
        }
        out.push_str("\n\n");
    }
}

/// Everything the answer prompt is assembled from
#[derive(Debug, Clone, Copy)]
pub struct PromptParts<'a> {
    pub system_prompt: &'a str,
    pub context: &'a [ContextBlock],
    /// Earlier turns, oldest first, without the current query
    pub history: &'a [ChatMessage],
    pub query: &'a str,
    pub assistant_name: &'a str,
}

/// Render the single user-turn prompt sent to the answer model
#[inline]
pub fn build_prompt(parts: &PromptParts<'_>) -> String {
    let mut context = String::new();
    for block in parts.context {
        block.render(&mut context);
    }

    let mut prompt = String::with_capacity(
        parts.system_prompt.len() + context.len() + parts.query.len() + 256,
    );
    prompt.push_str(parts.system_prompt.trim());
    prompt.push_str("\n\nContext Information (Use this to inform your answer if relevant):\n---\n");
    prompt.push_str(&context);
    prompt.push_str("---\n\n");

    let turns: Vec<(&str, &str)> = parts
        .history
        .iter()
        .filter_map(|message| {
            let speaker = match message.role {
                Role::User => "User",
                Role::Model => "Assistant",
                Role::Other => return None,
            };
            Some((speaker, message.content.trim()))
        })
        .collect();
    if !turns.is_empty() {
        prompt.push_str("Conversation so far:\n");
        for (speaker, content) in turns {
            let _ = writeln!(prompt, "{}: {}", speaker, content);
        }
        prompt.push('\n');
    }

    let _ = write!(
        prompt,
        "User Query: {}\n\nAnswer the user query acting as {}:",
        parts.query.trim(),
        parts.assistant_name
    );
    prompt
}
