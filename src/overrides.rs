/// Answer-generation overrides — the user-tunable settings sent with every
/// question (settings view, key 2).
///
/// This is a plain value holder: setters validate and normalize, nothing here
/// ever triggers a request. Invalid input is silently dropped and the previous
/// value retained, so the settings view never has to render a validation error.
use serde::{Deserialize, Serialize};

// ── Bounds ────────────────────────────────────────────────────────────────────

pub const RETRIEVAL_COUNT_MIN: u32 = 1;
pub const RETRIEVAL_COUNT_MAX: u32 = 50;

// ── Conversation style ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConversationStyle {
    Creative,
    #[default]
    Balance,
    Precise,
}

impl ConversationStyle {
    pub const ALL: [ConversationStyle; 3] = [
        ConversationStyle::Creative,
        ConversationStyle::Balance,
        ConversationStyle::Precise,
    ];

    /// Value the backend expects in the request overrides.
    pub fn wire_value(self) -> &'static str {
        match self {
            ConversationStyle::Creative => "Creative",
            ConversationStyle::Balance => "Balance",
            ConversationStyle::Precise => "Precise",
        }
    }

    /// Label shown in the settings view.
    pub fn label(self) -> &'static str {
        match self {
            ConversationStyle::Creative => "More Creative",
            ConversationStyle::Balance => "More Balance",
            ConversationStyle::Precise => "More Precise",
        }
    }
}

// ── Search index ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SearchIndex {
    Group1,
    Group2,
    Group3,
    Group4,
    Group5,
    #[default]
    Default,
}

impl SearchIndex {
    pub const ALL: [SearchIndex; 6] = [
        SearchIndex::Group1,
        SearchIndex::Group2,
        SearchIndex::Group3,
        SearchIndex::Group4,
        SearchIndex::Group5,
        SearchIndex::Default,
    ];

    pub fn wire_value(self) -> &'static str {
        match self {
            SearchIndex::Group1 => "Group 1",
            SearchIndex::Group2 => "Group 2",
            SearchIndex::Group3 => "Group 3",
            SearchIndex::Group4 => "Group 4",
            SearchIndex::Group5 => "Group 5",
            SearchIndex::Default => "Default",
        }
    }

    /// Parse a config-file / CLI value ("group1", "Group 3", "default", ...).
    /// Unrecognised input maps to the default index.
    pub fn parse(raw: &str) -> Self {
        let key: String = raw
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_lowercase();
        match key.as_str() {
            "group1" => SearchIndex::Group1,
            "group2" => SearchIndex::Group2,
            "group3" => SearchIndex::Group3,
            "group4" => SearchIndex::Group4,
            "group5" => SearchIndex::Group5,
            _ => SearchIndex::Default,
        }
    }
}

// ── AnswerOverrides ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerOverrides {
    /// Prompt template override; empty = use the backend default.
    prompt_template: String,
    /// How many documents retrieval fetches, clamped to [1,50].
    retrieval_count: u32,
    pub use_semantic_ranker: bool,
    /// Only meaningful while the semantic ranker is on, but stored
    /// independently so toggling the ranker back on restores the choice.
    pub use_semantic_captions: bool,
    /// Category to exclude from retrieval; empty = no exclusion.
    exclude_category: String,
    /// Stock filter expression; empty = no filter.
    stock_filter: String,
    pub suggest_followups: bool,
    pub conversation_style: ConversationStyle,
    pub index: SearchIndex,
}

impl Default for AnswerOverrides {
    fn default() -> Self {
        Self {
            prompt_template: String::new(),
            retrieval_count: 3,
            use_semantic_ranker: true,
            use_semantic_captions: false,
            exclude_category: String::new(),
            stock_filter: String::new(),
            suggest_followups: false,
            conversation_style: ConversationStyle::default(),
            index: SearchIndex::default(),
        }
    }
}

impl AnswerOverrides {
    pub fn retrieval_count(&self) -> u32 {
        self.retrieval_count
    }

    pub fn prompt_template(&self) -> &str {
        &self.prompt_template
    }

    pub fn exclude_category(&self) -> &str {
        &self.exclude_category
    }

    pub fn stock_filter(&self) -> &str {
        &self.stock_filter
    }

    /// Whether the captions toggle is actionable in the UI.
    pub fn captions_enabled(&self) -> bool {
        self.use_semantic_ranker
    }

    /// Set the retrieval count from raw text input. Non-numeric input keeps
    /// the previous value; numeric input is clamped to [1,50].
    pub fn set_retrieval_count(&mut self, raw: &str) {
        if let Ok(n) = raw.trim().parse::<u32>() {
            self.retrieval_count = n.clamp(RETRIEVAL_COUNT_MIN, RETRIEVAL_COUNT_MAX);
        }
    }

    pub fn set_prompt_template(&mut self, raw: &str) {
        self.prompt_template = normalize(raw);
    }

    pub fn set_exclude_category(&mut self, raw: &str) {
        self.exclude_category = normalize(raw);
    }

    pub fn set_stock_filter(&mut self, raw: &str) {
        self.stock_filter = normalize(raw);
    }
}

/// Whitespace-only input is stored as empty, never as whitespace.
fn normalize(raw: &str) -> String {
    if raw.trim().is_empty() {
        String::new()
    } else {
        raw.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retrieval_count_clamps_to_bounds() {
        let mut o = AnswerOverrides::default();
        o.set_retrieval_count("0");
        assert_eq!(o.retrieval_count(), 1);
        o.set_retrieval_count("51");
        assert_eq!(o.retrieval_count(), 50);
        o.set_retrieval_count("25");
        assert_eq!(o.retrieval_count(), 25);
    }

    #[test]
    fn retrieval_count_keeps_previous_on_parse_failure() {
        let mut o = AnswerOverrides::default();
        o.set_retrieval_count("7");
        o.set_retrieval_count("not-a-number");
        assert_eq!(o.retrieval_count(), 7);
        o.set_retrieval_count("");
        assert_eq!(o.retrieval_count(), 7);
    }

    #[test]
    fn blank_strings_stored_as_empty() {
        let mut o = AnswerOverrides::default();
        o.set_exclude_category("   ");
        assert_eq!(o.exclude_category(), "");
        o.set_stock_filter("\t");
        assert_eq!(o.stock_filter(), "");
        o.set_prompt_template("Answer tersely.");
        assert_eq!(o.prompt_template(), "Answer tersely.");
    }

    #[test]
    fn captions_stored_independently_of_ranker() {
        let mut o = AnswerOverrides::default();
        o.use_semantic_captions = true;
        o.use_semantic_ranker = false;
        assert!(!o.captions_enabled());
        assert!(o.use_semantic_captions);
    }

    #[test]
    fn index_parse_accepts_config_spellings() {
        assert_eq!(SearchIndex::parse("group3"), SearchIndex::Group3);
        assert_eq!(SearchIndex::parse("Group 5"), SearchIndex::Group5);
        assert_eq!(SearchIndex::parse("default"), SearchIndex::Default);
        assert_eq!(SearchIndex::parse("whatever"), SearchIndex::Default);
    }
}
