//! Record extraction from a rendered listings page.
//!
//! Odds buttons are the anchor: they are the most stable unit of the markup.
//! Every moneyline button leads up to its event container, and each distinct
//! container is then mined independently for teams, prices and start time.

use std::collections::HashSet;

use oddslog_core::GameRecord;
use scraper::{ElementRef, Html};
use tracing::debug;

use crate::dom::closest;
use crate::strategy::{
    first_success, is_moneyline_button, is_parlay_container, start_time, Selectors,
    MONEYLINE_STRATEGIES, TEAM_STRATEGIES,
};

/// Glyphs the page uses in place of an ASCII hyphen-minus.
const MINUS_VARIANTS: &[char] = &['\u{2212}', '\u{2012}', '\u{2013}', '\u{FE63}', '\u{FF0D}'];

pub fn normalize_moneyline(text: &str) -> String {
    text.chars()
        .map(|c| if MINUS_VARIANTS.contains(&c) { '-' } else { c })
        .collect()
}

pub struct RecordExtractor {
    selectors: Selectors,
}

impl RecordExtractor {
    pub fn new() -> Self {
        Self {
            selectors: Selectors::new(),
        }
    }

    /// All games found on the page, in document order. Duplicates are kept.
    pub fn extract(&self, html: &str) -> Vec<GameRecord> {
        let document = Html::parse_document(html);
        let containers = self.game_containers(&document);
        let total = containers.len();

        let games: Vec<GameRecord> = containers
            .into_iter()
            .filter_map(|container| self.extract_game(container))
            .collect();

        debug!(
            containers = total,
            games = games.len(),
            skipped = total - games.len(),
            "Extracted game records"
        );
        games
    }

    /// Distinct event containers reachable from a moneyline button, in the
    /// order their first button appears.
    pub fn game_containers<'a>(&self, document: &'a Html) -> Vec<ElementRef<'a>> {
        let mut seen = HashSet::new();
        let mut containers = Vec::new();

        for button in document.select(&self.selectors.odds_button) {
            if !is_moneyline_button(button) {
                continue;
            }
            let Some(container) = closest(button, is_parlay_container) else {
                continue;
            };
            if seen.insert(container.id()) {
                containers.push(container);
            }
        }

        containers
    }

    /// Record for one container, or `None` when it lacks two teams or any price.
    pub fn extract_game(&self, container: ElementRef<'_>) -> Option<GameRecord> {
        let teams = first_success(TEAM_STRATEGIES, &self.selectors, container).unwrap_or_default();
        let mut teams = teams.into_iter();
        let (Some(team1), Some(team2)) = (teams.next(), teams.next()) else {
            debug!("Skipping container without two team labels");
            return None;
        };

        let Some(moneylines) = first_success(MONEYLINE_STRATEGIES, &self.selectors, container)
        else {
            debug!(team1 = %team1, team2 = %team2, "Skipping container without moneylines");
            return None;
        };
        let mut moneylines = moneylines.into_iter();

        Some(GameRecord {
            team1,
            team2,
            team1_moneyline: moneylines.next(),
            team2_moneyline: moneylines.next(),
            start_time: start_time(&self.selectors, container),
        })
    }
}

impl Default for RecordExtractor {
    fn default() -> Self {
        Self::new()
    }
}
