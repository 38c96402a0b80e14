//! Selector fallback chains.
//!
//! Each field of a game is located by an ordered list of strategies. A strategy
//! either produces a value or declines with `None`, and the first one that
//! produces a value wins. Later strategies are broader or rely on positional
//! guesses, so they only run when the precise ones found nothing.

use scraper::{ElementRef, Selector};

use crate::dom::{class_contains, closest, parent_element, stripped_text, subtree_attr_contains};
use crate::extractor::normalize_moneyline;

pub const ODDS_BUTTON: &str = r#"[data-testid="button-odds-market-board"]"#;
/// Present inside spread/total buttons only.
pub const POINTS_MARKER: &str = "button-points-market-board";
pub const TITLE_MARKER: &str = "button-title-market-board";
/// Class substring of the element wrapping one event and all its markets.
pub const PARLAY_CLASS: &str = "cb-static-parlay";

const TEAM_LABEL_PARLAY: &str = ".cb-market__label-inner.cb-market__label-inner--parlay";
const TEAM_LABEL: &str = ".cb-market__label-inner";
const START_TIME_TESTID: &str = r#"[data-testid="cb-event-cell__start-time"]"#;
const START_TIME_CLASS: &str = ".cb-event-cell__start-time";

const STOP_WORDS: &[&str] = &["at", "AT", "vs", "VS"];

/// Fixed slots of the moneyline buttons in the usual six-button layout
/// (spread, total, moneyline for each team).
pub const MONEYLINE_SLOTS: [usize; 2] = [2, 5];

/// Compiled selectors shared by every strategy.
pub struct Selectors {
    pub odds_button: Selector,
    team_label_parlay: Selector,
    team_label: Selector,
    start_time_testid: Selector,
    start_time_class: Selector,
}

impl Selectors {
    pub fn new() -> Self {
        Self {
            odds_button: compile(ODDS_BUTTON),
            team_label_parlay: compile(TEAM_LABEL_PARLAY),
            team_label: compile(TEAM_LABEL),
            start_time_testid: compile(START_TIME_TESTID),
            start_time_class: compile(START_TIME_CLASS),
        }
    }
}

impl Default for Selectors {
    fn default() -> Self {
        Self::new()
    }
}

fn compile(css: &'static str) -> Selector {
    Selector::parse(css).unwrap_or_else(|e| panic!("invalid built-in selector {css}: {e:?}"))
}

pub type Strategy<T> = fn(&Selectors, ElementRef<'_>) -> Option<T>;

pub fn first_success<T>(
    strategies: &[Strategy<T>],
    selectors: &Selectors,
    container: ElementRef<'_>,
) -> Option<T> {
    strategies
        .iter()
        .find_map(|strategy| strategy(selectors, container))
}

// ── Classification ────────────────────────────────────────────────────

/// Spread and total buttons carry a points or title marker; moneyline buttons carry neither.
pub fn is_moneyline_button(button: ElementRef<'_>) -> bool {
    !subtree_attr_contains(button, POINTS_MARKER) && !subtree_attr_contains(button, TITLE_MARKER)
}

pub fn is_parlay_container(el: &ElementRef<'_>) -> bool {
    class_contains(el, PARLAY_CLASS)
}

pub fn is_team_name(text: &str) -> bool {
    !text.is_empty() && text.chars().count() > 2 && !STOP_WORDS.contains(&text)
}

fn team_names<'a>(labels: impl Iterator<Item = ElementRef<'a>>) -> Vec<String> {
    labels
        .map(stripped_text)
        .filter(|text| is_team_name(text))
        .collect()
}

// ── Teams ─────────────────────────────────────────────────────────────

/// Parlay-specific labels; declines unless at least two label elements exist.
pub fn teams_from_parlay_labels(sel: &Selectors, container: ElementRef<'_>) -> Option<Vec<String>> {
    let labels: Vec<_> = container.select(&sel.team_label_parlay).collect();
    if labels.len() < 2 {
        return None;
    }
    Some(team_names(labels.into_iter()))
}

pub fn teams_from_any_labels(sel: &Selectors, container: ElementRef<'_>) -> Option<Vec<String>> {
    Some(team_names(container.select(&sel.team_label)))
}

pub const TEAM_STRATEGIES: &[Strategy<Vec<String>>] =
    &[teams_from_parlay_labels, teams_from_any_labels];

// ── Moneylines ────────────────────────────────────────────────────────

fn moneyline_text(button: ElementRef<'_>) -> Option<String> {
    if !is_moneyline_button(button) {
        return None;
    }
    let text = stripped_text(button);
    if text.is_empty() {
        None
    } else {
        Some(normalize_moneyline(&text))
    }
}

/// Buttons at the fixed moneyline slots; succeeds only when both slots qualify.
pub fn moneylines_from_slots(sel: &Selectors, container: ElementRef<'_>) -> Option<Vec<String>> {
    let buttons: Vec<_> = container.select(&sel.odds_button).collect();
    let values: Vec<String> = MONEYLINE_SLOTS
        .iter()
        .filter_map(|&i| buttons.get(i).copied())
        .filter_map(moneyline_text)
        .collect();
    if values.len() == MONEYLINE_SLOTS.len() {
        Some(values)
    } else {
        None
    }
}

/// Every moneyline-classified button in order, keeping the last two.
pub fn moneylines_from_scan(sel: &Selectors, container: ElementRef<'_>) -> Option<Vec<String>> {
    let mut values: Vec<String> = container
        .select(&sel.odds_button)
        .filter_map(moneyline_text)
        .collect();
    if values.is_empty() {
        return None;
    }
    if values.len() > 2 {
        values.drain(..values.len() - 2);
    }
    Some(values)
}

pub const MONEYLINE_STRATEGIES: &[Strategy<Vec<String>>] =
    &[moneylines_from_slots, moneylines_from_scan];

// ── Start time ────────────────────────────────────────────────────────

// Start-time strategies succeed on the first matching element, whatever its
// text; `start_time` then decides whether that text is usable.
fn start_time_in(scope: ElementRef<'_>, selector: &Selector) -> Option<String> {
    scope.select(selector).next().map(stripped_text)
}

pub fn start_time_by_testid(sel: &Selectors, container: ElementRef<'_>) -> Option<String> {
    start_time_in(container, &sel.start_time_testid)
}

pub fn start_time_by_class(sel: &Selectors, container: ElementRef<'_>) -> Option<String> {
    start_time_in(container, &sel.start_time_class)
}

/// Containers sometimes sit one level below the event cell that holds the time.
pub fn start_time_in_parent(sel: &Selectors, container: ElementRef<'_>) -> Option<String> {
    start_time_in(parent_element(container)?, &sel.start_time_testid)
}

pub fn start_time_in_outer_parlay(sel: &Selectors, container: ElementRef<'_>) -> Option<String> {
    start_time_in(closest(container, is_parlay_container)?, &sel.start_time_testid)
}

pub const START_TIME_STRATEGIES: &[Strategy<String>] = &[
    start_time_by_testid,
    start_time_by_class,
    start_time_in_parent,
    start_time_in_outer_parlay,
];

/// Text of the first start-time element found, if it is longer than five
/// characters. A short first match is not replaced by a later strategy.
pub fn start_time(sel: &Selectors, container: ElementRef<'_>) -> Option<String> {
    first_success(START_TIME_STRATEGIES, sel, container).filter(|text| text.chars().count() > 5)
}
