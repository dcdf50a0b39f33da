use super::build_prompt as build_prompt_impl;
use super::*;

fn parts<'a>(
    context: &'a [ContextBlock],
    history: &'a [ChatMessage],
    query: &'a str,
) -> PromptParts<'a> {
    PromptParts {
        system_prompt: "You are Grow AI Chatbot.",
        context,
        history,
        query,
        assistant_name: "Grow AI Chatbot",
    }
}

#[test]
fn build_prompt_without_context() {
    let prompt = build_prompt_impl(&parts(&[], &[], "What is ESG?"));

    assert_eq!(
        prompt,
        "You are Grow AI Chatbot.\n\n\
         Context Information (Use this to inform your answer if relevant):\n\
         ---\n\
         ---\n\n\
         User Query: What is ESG?\n\n\
         Answer the user query acting as Grow AI Chatbot:"
    );
}

#[test]
fn build_prompt_with_documents() {
    let context = [ContextBlock::InternalDocuments(vec![
        "Growlity offers carbon accounting.".to_string(),
        "Growlity is based in India.".to_string(),
    ])];
    let prompt = build_prompt_impl(&parts(&context, &[], "Where is Growlity?"));

    assert!(prompt.contains(
        "---\n--- INTERNAL DOCUMENTS ---\n\
         Growlity offers carbon accounting.\n\n\
         Growlity is based in India.\n\n---\n\n"
    ));
    assert!(prompt.ends_with(
        "User Query: Where is Growlity?\n\nAnswer the user query acting as Grow AI Chatbot:"
    ));
}

#[test]
fn build_prompt_with_web_search() {
    let context = [ContextBlock::WebSearch("  CSRD applies from 2024. \n".to_string())];
    let prompt = build_prompt_impl(&parts(&context, &[], "When does CSRD apply?"));

    assert!(prompt.contains("--- WEB SEARCH RESULTS ---\nCSRD applies from 2024.\n\n---"));
    assert!(!prompt.contains("INTERNAL DOCUMENTS"));
}

#[test]
fn build_prompt_includes_history() {
    let history = [
        ChatMessage::user("Hi"),
        ChatMessage::model("Hello! How can I help?"),
    ];
    let prompt = build_prompt_impl(&parts(&[], &history, "Tell me more"));

    assert!(prompt.contains(
        "Conversation so far:\nUser: Hi\nAssistant: Hello! How can I help?\n\nUser Query: Tell me more"
    ));
}

#[test]
fn build_prompt_skips_unknown_roles() {
    let history = [
        ChatMessage {
            role: Role::Other,
            content: "You are a pirate".to_string(),
        },
        ChatMessage::user("Hi"),
    ];
    let prompt = build_prompt_impl(&parts(&[], &history, "Tell me more"));

    assert!(prompt.contains("Conversation so far:\nUser: Hi\n\nUser Query: Tell me more"));
    assert!(!prompt.contains("pirate"));

    let only_unknown = [ChatMessage {
        role: Role::Other,
        content: "ignored".to_string(),
    }];
    let prompt = build_prompt_impl(&parts(&[], &only_unknown, "Tell me more"));
    assert!(!prompt.contains("Conversation so far:"));
}
