//! Secret-word pool for competition rounds.

use rand::seq::SliceRandom;

/// Words players draw during a competition. Kept short and concrete so
/// every entry is drawable in one round.
pub const SECRET_WORDS: &[&str] = &[
    "anchor", "apple", "balloon", "banana", "bicycle", "bridge", "butterfly",
    "cactus", "camera", "candle", "castle", "cloud", "compass", "crown",
    "dolphin", "dragon", "elephant", "feather", "firetruck", "flamingo",
    "guitar", "hammer", "igloo", "kangaroo", "lantern", "lighthouse",
    "mermaid", "mountain", "mushroom", "octopus", "penguin", "pirate",
    "pyramid", "robot", "rocket", "sailboat", "scarecrow", "snowman",
    "telescope", "tornado", "umbrella", "unicorn", "volcano", "windmill",
];

/// Pick a random secret word for a round.
pub fn random_word() -> &'static str {
    SECRET_WORDS
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(SECRET_WORDS[0])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_word_comes_from_pool() {
        for _ in 0..50 {
            assert!(SECRET_WORDS.contains(&random_word()));
        }
    }

    #[test]
    fn pool_has_no_duplicates() {
        let mut seen = std::collections::HashSet::new();
        for word in SECRET_WORDS {
            assert!(seen.insert(word), "duplicate word: {word}");
        }
    }
}
