use std::collections::HashSet;

use oddslog_core::GameRecord;

/// Team pair and moneyline pair, each sorted, so swapped extractions collide.
type IdentityKey = (String, String, String, String);

fn sorted_pair(a: &str, b: &str) -> (String, String) {
    if a <= b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}

pub fn identity_key(game: &GameRecord) -> IdentityKey {
    let (t1, t2) = sorted_pair(&game.team1, &game.team2);
    let (m1, m2) = sorted_pair(
        game.team1_moneyline.as_deref().unwrap_or(""),
        game.team2_moneyline.as_deref().unwrap_or(""),
    );
    (t1, t2, m1, m2)
}

/// Drops records whose identity key was already seen, keeping the first.
pub fn dedup_games(games: Vec<GameRecord>) -> Vec<GameRecord> {
    let mut seen = HashSet::new();
    games
        .into_iter()
        .filter(|game| seen.insert(identity_key(game)))
        .collect()
}
