/// Focus state — which turn is selected and which inspection panel is open.
///
/// Two-axis state driven entirely by the two toggle operations below. Both are
/// idempotent toggles: repeating the same gesture collapses the panel instead
/// of re-opening it. The selected turn always follows the last-interacted
/// turn, even when the gesture collapsed the panel.
///
/// The active citation only exists while the citation panel is open — it is
/// carried inside the `Citation` variant rather than stored alongside it.

// ── Panels ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ActivePanel {
    #[default]
    None,
    /// Citation panel, holding the citation reference being inspected.
    Citation(String),
    ThoughtProcess,
    SupportingContent,
}

/// The two tab-style panels (`show_citation` covers the third).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelTab {
    ThoughtProcess,
    SupportingContent,
}

impl From<PanelTab> for ActivePanel {
    fn from(tab: PanelTab) -> Self {
        match tab {
            PanelTab::ThoughtProcess => ActivePanel::ThoughtProcess,
            PanelTab::SupportingContent => ActivePanel::SupportingContent,
        }
    }
}

// ── FocusState ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FocusState {
    /// Index into the completed turn history. Callers only pass indices of
    /// existing turns, so this is always valid while a panel is open.
    pub selected_turn: usize,
    pub panel: ActivePanel,
}

impl FocusState {
    /// Toggle the citation panel for `citation` on `turn`. A second invocation
    /// with the same citation and turn collapses the panel; anything else
    /// opens (or re-targets) it. The selection moves to `turn` either way.
    pub fn show_citation(&mut self, citation: &str, turn: usize) {
        let same = self.selected_turn == turn
            && matches!(&self.panel, ActivePanel::Citation(c) if c == citation);
        self.panel = if same {
            ActivePanel::None
        } else {
            ActivePanel::Citation(citation.to_string())
        };
        self.selected_turn = turn;
    }

    /// Toggle a tab panel for `turn`. Same panel + same turn collapses;
    /// same panel on a different turn switches turns and stays open.
    pub fn toggle_tab(&mut self, tab: PanelTab, turn: usize) {
        let same = self.selected_turn == turn && self.panel == ActivePanel::from(tab);
        self.panel = if same {
            ActivePanel::None
        } else {
            ActivePanel::from(tab)
        };
        self.selected_turn = turn;
    }

    /// Collapse whatever panel is open. Called when a new request begins.
    pub fn close_panel(&mut self) {
        self.panel = ActivePanel::None;
    }

    pub fn is_open(&self) -> bool {
        self.panel != ActivePanel::None
    }

    /// The citation under inspection, if the citation panel is open.
    pub fn citation(&self) -> Option<&str> {
        match &self.panel {
            ActivePanel::Citation(c) => Some(c.as_str()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn show_citation_opens_then_collapses() {
        let mut f = FocusState::default();
        f.show_citation("doc1.pdf", 2);
        assert_eq!(f.panel, ActivePanel::Citation("doc1.pdf".into()));
        assert_eq!(f.selected_turn, 2);
        assert_eq!(f.citation(), Some("doc1.pdf"));

        f.show_citation("doc1.pdf", 2);
        assert_eq!(f.panel, ActivePanel::None);
        // Selection still follows the gesture that collapsed the panel.
        assert_eq!(f.selected_turn, 2);
        assert_eq!(f.citation(), None);
    }

    #[test]
    fn different_citation_same_turn_retargets() {
        let mut f = FocusState::default();
        f.show_citation("doc1.pdf", 0);
        f.show_citation("doc2.pdf", 0);
        assert_eq!(f.panel, ActivePanel::Citation("doc2.pdf".into()));
    }

    #[test]
    fn same_citation_other_turn_stays_open() {
        let mut f = FocusState::default();
        f.show_citation("doc1.pdf", 0);
        f.show_citation("doc1.pdf", 1);
        assert_eq!(f.panel, ActivePanel::Citation("doc1.pdf".into()));
        assert_eq!(f.selected_turn, 1);
    }

    #[test]
    fn toggle_tab_collapses_only_on_same_turn() {
        let mut f = FocusState::default();
        f.toggle_tab(PanelTab::ThoughtProcess, 0);
        assert_eq!(f.panel, ActivePanel::ThoughtProcess);

        // Switching turns opens rather than collapses.
        f.toggle_tab(PanelTab::ThoughtProcess, 1);
        assert_eq!(f.panel, ActivePanel::ThoughtProcess);
        assert_eq!(f.selected_turn, 1);

        f.toggle_tab(PanelTab::ThoughtProcess, 1);
        assert_eq!(f.panel, ActivePanel::None);
        assert_eq!(f.selected_turn, 1);
    }

    #[test]
    fn switching_tabs_on_same_turn_swaps_panel() {
        let mut f = FocusState::default();
        f.toggle_tab(PanelTab::ThoughtProcess, 0);
        f.toggle_tab(PanelTab::SupportingContent, 0);
        assert_eq!(f.panel, ActivePanel::SupportingContent);
        f.show_citation("ref.md", 0);
        assert_eq!(f.panel, ActivePanel::Citation("ref.md".into()));
    }
}
