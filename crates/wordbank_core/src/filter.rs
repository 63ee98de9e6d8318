/// Characters that disqualify a token even when the source list carries them.
const FORBIDDEN_CHARS: [char; 4] = ['\'', '-', '.', ' '];

/// Decide whether a raw token qualifies as a usable game word.
///
/// Rejects non-alphabetic tokens, tokens shorter than two characters,
/// fully-uppercase tokens (treated as acronyms), and tokens carrying
/// apostrophes, hyphens, periods, or spaces.
pub fn is_usable(token: &str) -> bool {
    if token.is_empty() || !token.chars().all(char::is_alphabetic) {
        return false;
    }
    if token.chars().count() < 2 {
        return false;
    }
    if token.chars().all(char::is_uppercase) {
        return false;
    }
    if token.chars().any(|ch| FORBIDDEN_CHARS.contains(&ch)) {
        return false;
    }
    true
}
