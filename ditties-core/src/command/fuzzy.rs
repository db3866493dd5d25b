//! Fuzzy song-title search.

use tracing::debug;

use crate::catalog::Song;

/// Pluggable string similarity. Higher means more similar; equal inputs must
/// always produce equal scores.
pub trait SimilarityScorer: Send + Sync + 'static {
    fn score(&self, candidate: &str, query: &str) -> f64;
}

/// Case-insensitive normalised Levenshtein similarity in [0.0, 1.0].
#[derive(Debug, Clone, Copy, Default)]
pub struct LevenshteinRatio;

impl SimilarityScorer for LevenshteinRatio {
    fn score(&self, candidate: &str, query: &str) -> f64 {
        strsim::normalized_levenshtein(&candidate.to_lowercase(), &query.to_lowercase())
    }
}

/// Highest-scoring song for `query`.
///
/// Ties resolve to the song encountered first. An empty query or an empty
/// candidate list yields `None`.
pub fn best_match<'a>(
    scorer: &dyn SimilarityScorer,
    songs: &'a [Song],
    query: &str,
) -> Option<(&'a Song, f64)> {
    let query = query.trim();
    if query.is_empty() {
        return None;
    }

    let mut ranked: Vec<(&Song, f64)> = songs
        .iter()
        .map(|song| (song, scorer.score(&song.title, query)))
        .collect();
    // Stable sort keeps catalog order among equal scores.
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));

    for (song, score) in ranked.iter().take(3) {
        debug!(title = %song.title, score = format_args!("{score:.3}"), "song match");
    }
    ranked.into_iter().next()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn songs(titles: &[&str]) -> Vec<Song> {
        titles
            .iter()
            .enumerate()
            .map(|(i, t)| Song::new(i.to_string(), *t, format!("https://x/{i}")))
            .collect()
    }

    #[test]
    fn picks_the_closest_title() {
        let catalog = songs(&["Never Gonna Give You Up", "All Star"]);
        let (song, _) = best_match(&LevenshteinRatio, &catalog, "give you up").unwrap();
        assert_eq!(song.title, "Never Gonna Give You Up");
    }

    #[test]
    fn tolerates_case_and_typos() {
        let catalog = songs(&["Sandstorm", "All Star"]);
        let (song, _) = best_match(&LevenshteinRatio, &catalog, "al STARR").unwrap();
        assert_eq!(song.title, "All Star");
        assert_relative_eq!(LevenshteinRatio.score("ALL STAR", "all star"), 1.0);
    }

    #[test]
    fn ties_resolve_to_catalog_order() {
        let catalog = songs(&["abc", "abd", "abc"]);
        let (song, score) = best_match(&LevenshteinRatio, &catalog, "xyz").unwrap();
        assert_eq!(song.id.as_str(), "0");
        assert_relative_eq!(score, 0.0);
    }

    #[test]
    fn empty_query_or_catalog_has_no_match() {
        assert!(best_match(&LevenshteinRatio, &songs(&["All Star"]), "  ").is_none());
        assert!(best_match(&LevenshteinRatio, &[], "all star").is_none());
    }
}
