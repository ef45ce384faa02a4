//! Splitting of review text into words.

/// Characters that are treated as word separators.
pub const FILTERS: &str = "!\"#$%&()*+,-./:;<=>?@[\\]^_`{|}~\t\n";

/// Split text into lowercased words.
///
/// All characters in [`FILTERS`] are treated as whitespace. This is the
/// normalization that was used to construct the IMDB word index, so
/// e.g. the HTML line breaks in reviews end up as the word `br`.
pub fn text_to_words(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| c.is_whitespace() || FILTERS.contains(c))
        .filter(|word| !word.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::text_to_words;

    #[test]
    fn punctuation_separates_words() {
        assert_eq!(
            text_to_words("Great movie!<br /><br />Loved it... 10/10"),
            vec!["great", "movie", "br", "br", "loved", "it", "10", "10"]
        );
    }

    #[test]
    fn apostrophes_are_kept() {
        assert_eq!(
            text_to_words("I didn't   like\tit."),
            vec!["i", "didn't", "like", "it"]
        );
    }

    #[test]
    fn empty_text_has_no_words() {
        assert!(text_to_words(" ... ").is_empty());
    }
}
