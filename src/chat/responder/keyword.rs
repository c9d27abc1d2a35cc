//! Keyword-table assistant.
//!
//! Matching runs in a fixed order on the lowercased, trimmed input:
//! 1. exact keyword
//! 2. first keyword contained in the input (table order)
//! 3. special queries (time, date, theme, saving, deleting)
//! 4. greeting
//! 5. question, answered with a templated reply about the extracted topic
//! 6. a random general reply about the extracted topic

use chrono::Local;
use rand::seq::SliceRandom;

use super::Responder;

/// Keyword table, checked in order for partial matches.
const RESPONSES: &[(&str, &str)] = &[
    (
        "hello",
        "Hi there! Welcome to the enhanced chatbot. How can I assist you?",
    ),
    ("hi", "Hello! I'm here to help. What can I do for you today?"),
    (
        "how are you",
        "I'm functioning perfectly! Thank you for asking. How about you?",
    ),
    (
        "what is your name",
        "I'm your Glossy AI Assistant. You can call me Glossy!",
    ),
    (
        "help",
        "You can ask me questions, have a conversation, or try out different features of this enhanced chat interface!",
    ),
    (
        "bye",
        "Goodbye! Feel free to start a new conversation anytime.",
    ),
    (
        "thanks",
        "You're welcome! Anything else you'd like to know?",
    ),
    (
        "thank you",
        "My pleasure! Let me know if you need anything else.",
    ),
    (
        "what can you do",
        "I can chat with you, remember our conversation history, and you can create multiple chat threads using the sidebar!",
    ),
    (
        "tell me a joke",
        "Why did the chatbot go to therapy? It had too many unresolved queries!",
    ),
    (
        "about this page",
        "This is an enhanced chatbot interface with dark/light mode, local storage for chat persistence, and multi-chat management.",
    ),
];

const THEME_REPLY: &str =
    "You can toggle between dark and light mode using the theme switch in the sidebar!";
const SAVE_REPLY: &str = "Don't worry! All your chat messages are automatically saved in your browser's local storage and IndexedDB.";
const DELETE_REPLY: &str =
    "You can delete any chat by clicking the trash icon next to it in the sidebar.";
const GREETING_REPLY: &str = "Hello! How can I assist you today?";

const GREETINGS: &[&str] = &[
    "hi",
    "hello",
    "hey",
    "greetings",
    "good morning",
    "good afternoon",
    "good evening",
];

const QUESTION_PREFIXES: &[&str] = &[
    "what", "how", "why", "when", "where", "who", "can you", "could you",
];

const COMMON_WORDS: &[&str] = &[
    "a", "an", "the", "is", "are", "was", "were", "do", "does", "did", "has", "have", "had", "can",
    "could", "will", "would", "should", "about", "please", "tell", "me", "to", "for", "with",
    "from", "in", "on", "at", "by", "your", "my", "i", "you", "he", "she", "they",
];

/// Topic used when every word of the input is a common word.
pub const FALLBACK_TOPIC: &str = "this topic";

/// Rule-based responder with a fixed keyword table.
#[derive(Clone, Copy, Debug, Default)]
pub struct KeywordResponder;

impl KeywordResponder {
    /// Create the responder.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Reply from the keyword table or the special queries, if any applies.
    fn keyword_reply(input: &str) -> Option<String> {
        if let Some((_, reply)) = RESPONSES.iter().find(|(keyword, _)| *keyword == input) {
            return Some((*reply).to_string());
        }
        if let Some((_, reply)) = RESPONSES.iter().find(|(keyword, _)| input.contains(keyword)) {
            return Some((*reply).to_string());
        }

        if input.contains("time") {
            return Some(format!(
                "The current time is {}.",
                Local::now().format("%H:%M")
            ));
        }
        if input.contains("date") {
            return Some(format!("Today is {}.", Local::now().format("%A, %B %-d, %Y")));
        }
        if contains_any(input, &["theme", "dark mode", "light mode"]) {
            return Some(THEME_REPLY.to_string());
        }
        if contains_any(input, &["save", "store", "remember"]) {
            return Some(SAVE_REPLY.to_string());
        }
        if contains_any(input, &["delete", "remove"]) {
            return Some(DELETE_REPLY.to_string());
        }
        None
    }
}

impl Responder for KeywordResponder {
    fn generate(&self, input: &str) -> String {
        let input = input.trim().to_lowercase();

        if let Some(reply) = Self::keyword_reply(&input) {
            return reply;
        }
        if is_greeting(&input) {
            return GREETING_REPLY.to_string();
        }

        let topic = extract_topic(&input);
        let templates: [String; 4] = if is_question(&input) {
            [
                format!(
                    "Based on my knowledge, {topic} is a complex topic. What specific aspect are you interested in?"
                ),
                format!(
                    "Regarding {topic}, there are several perspectives to consider. Could you be more specific about what you'd like to know?"
                ),
                format!(
                    "When it comes to {topic}, I can provide some insights if you clarify your question."
                ),
                format!(
                    "I'd be happy to discuss {topic} with you. Could you narrow down your question a bit?"
                ),
            ]
        } else {
            [
                format!("I understand you're saying something about {topic}. Could you elaborate?"),
                format!("That's an interesting point. Would you like to know more about {topic}?"),
                format!("I see. Let me know if you have any specific questions about {topic}."),
                format!(
                    "Thanks for sharing that. Is there anything specific about {topic} you'd like to discuss?"
                ),
            ]
        };

        let mut rng = rand::thread_rng();
        templates
            .choose(&mut rng)
            .cloned()
            .unwrap_or_else(|| GREETING_REPLY.to_string())
    }
}

fn contains_any(input: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| input.contains(needle))
}

fn is_greeting(input: &str) -> bool {
    contains_any(input, GREETINGS)
}

fn is_question(input: &str) -> bool {
    input.contains('?') || QUESTION_PREFIXES.iter().any(|p| input.starts_with(p))
}

/// Longest word of `input` that is not a common word.
///
/// Ties keep the earliest word. Returns [`FALLBACK_TOPIC`] when nothing
/// remains.
#[must_use]
pub fn extract_topic(input: &str) -> String {
    let mut best: Option<&str> = None;
    for word in input.split(' ') {
        if COMMON_WORDS.contains(&word.to_lowercase().as_str()) {
            continue;
        }
        if best.is_none_or(|b| word.chars().count() > b.chars().count()) {
            best = Some(word);
        }
    }
    best.map_or_else(|| FALLBACK_TOPIC.to_string(), str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reply(input: &str) -> String {
        KeywordResponder::new().generate(input)
    }

    #[test]
    fn test_exact_keyword() {
        assert_eq!(
            reply("hi"),
            "Hello! I'm here to help. What can I do for you today?"
        );
        assert_eq!(reply("  Tell Me A Joke "), RESPONSES[9].1);
    }

    #[test]
    fn test_partial_keyword_uses_table_order() {
        // "hello" precedes "hi" in the table.
        assert_eq!(reply("well hello friend"), RESPONSES[0].1);
        assert_eq!(reply("bye for now"), RESPONSES[5].1);
    }

    #[test]
    fn test_special_queries() {
        assert!(reply("current time").starts_with("The current time is "));
        assert!(reply("today's date").starts_with("Today is "));
        assert_eq!(reply("switch to dark mode"), THEME_REPLY);
        assert_eq!(reply("will you remember"), SAVE_REPLY);
        assert_eq!(reply("delete a chat"), DELETE_REPLY);
    }

    #[test]
    fn test_greeting() {
        assert_eq!(reply("good morning"), GREETING_REPLY);
        assert_eq!(reply("hey"), GREETING_REPLY);
    }

    #[test]
    fn test_question_mentions_topic() {
        let answer = reply("where are volcanoes?");
        assert!(answer.contains("volcanoes?"), "{answer}");
    }

    #[test]
    fn test_general_reply_mentions_topic() {
        let answer = reply("rust compilers");
        assert!(answer.contains("compilers"), "{answer}");
    }

    #[test]
    fn test_extract_topic() {
        assert_eq!(extract_topic("tell me about quantum physics"), "quantum");
        assert_eq!(extract_topic("what is the weather"), "weather");
        assert_eq!(extract_topic("is it on"), "it");
        assert_eq!(extract_topic("you are the"), FALLBACK_TOPIC);
    }

    #[test]
    fn test_fixed_responder() {
        let responder = crate::chat::responder::FixedResponder::new("pong");
        assert_eq!(responder.generate("anything"), "pong");
    }
}
