// Keyword-based prompt intent classification

use serde::{Deserialize, Serialize};

/// What the user is asking for
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    /// Produce or change files
    Generate,
    /// Answer a question without touching files
    Chat,
}

pub const DEFAULT_GENERATION_KEYWORDS: &[&str] = &[
    "create", "build", "make", "generate", "add", "implement", "design", "write", "develop",
    "update", "change", "modify", "fix", "refactor", "remove", "delete", "replace", "rename",
    "convert", "style", "scaffold", "set up", "setup",
];

pub const DEFAULT_QUESTION_KEYWORDS: &[&str] = &[
    "what", "why", "how", "explain", "which", "when", "where", "who", "describe", "tell me",
    "can you tell", "is it", "does", "should i",
];

/// Classifies prompts by the earliest keyword occurrence
#[derive(Debug, Clone)]
pub struct IntentClassifier {
    generation_keywords: Vec<String>,
    question_keywords: Vec<String>,
}

impl Default for IntentClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_GENERATION_KEYWORDS, DEFAULT_QUESTION_KEYWORDS)
    }
}

impl IntentClassifier {
    pub fn new<S: AsRef<str>>(generation_keywords: &[S], question_keywords: &[S]) -> Self {
        let normalize = |keywords: &[S]| -> Vec<String> {
            keywords
                .iter()
                .map(|k| k.as_ref().trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect()
        };
        Self {
            generation_keywords: normalize(generation_keywords),
            question_keywords: normalize(question_keywords),
        }
    }

    /// Earliest keyword wins; ties go to chat; no keyword means generate
    pub fn classify(&self, prompt: &str) -> Intent {
        let text = prompt.to_lowercase();
        let generation = earliest_match(&text, &self.generation_keywords);
        let question = earliest_match(&text, &self.question_keywords);

        let intent = match (generation, question) {
            (Some(g), Some(q)) if g < q => Intent::Generate,
            (_, Some(_)) => Intent::Chat,
            _ => Intent::Generate,
        };
        log::debug!(
            "Classified prompt as {:?} (generation at {:?}, question at {:?})",
            intent,
            generation,
            question
        );
        intent
    }
}

/// Byte offset of the earliest whole-word occurrence of any keyword
fn earliest_match(text: &str, keywords: &[String]) -> Option<usize> {
    keywords
        .iter()
        .filter_map(|keyword| find_word(text, keyword))
        .min()
}

/// Byte offset of the first whole-word occurrence of `word` in `text`
pub fn find_word(text: &str, word: &str) -> Option<usize> {
    let is_word_char = |c: char| c.is_alphanumeric() || c == '_';
    let mut from = 0;
    while let Some(offset) = text[from..].find(word) {
        let start = from + offset;
        let end = start + word.len();
        let before_ok = text[..start].chars().next_back().map_or(true, |c| !is_word_char(c));
        let after_ok = text[end..].chars().next().map_or(true, |c| !is_word_char(c));
        if before_ok && after_ok {
            return Some(start);
        }
        from = start + word.chars().next().map_or(1, char::len_utf8);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_prompt() {
        let classifier = IntentClassifier::default();
        assert_eq!(classifier.classify("Build a todo app with dark mode"), Intent::Generate);
        assert_eq!(classifier.classify("Add a footer. What color? Blue."), Intent::Generate);
    }

    #[test]
    fn test_question_prompt() {
        let classifier = IntentClassifier::default();
        assert_eq!(classifier.classify("How do I build a todo app?"), Intent::Chat);
        assert_eq!(classifier.classify("Explain what App.tsx does"), Intent::Chat);
    }

    #[test]
    fn test_no_keywords_defaults_to_generate() {
        let classifier = IntentClassifier::default();
        assert_eq!(classifier.classify("a pomodoro timer"), Intent::Generate);
        assert_eq!(classifier.classify(""), Intent::Generate);
    }

    #[test]
    fn test_whole_words_only() {
        let classifier = IntentClassifier::default();
        // "showcase" contains "how", "address" contains "add"
        assert_eq!(classifier.classify("showcase page"), Intent::Generate);
        assert_eq!(classifier.classify("address book, somehow"), Intent::Generate);
    }

    #[test]
    fn test_tie_goes_to_chat() {
        let keywords: &[&str] = &["fix"];
        let classifier = IntentClassifier::new(keywords, keywords);
        assert_eq!(classifier.classify("fix the header"), Intent::Chat);
    }
}
