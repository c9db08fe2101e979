//! String and duration similarity for metadata matching.
//!
//! Everything here is pure. Titles and artists coming from video platforms
//! carry a lot of noise ("(Official Video)", "- Topic", "VEVO"), which is
//! stripped before comparison.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns.iter().filter_map(|p| Regex::new(p).ok()).collect()
}

static TITLE_NOISE: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"(?i)\s*[\(\[](?:official[^\)\]]*|lyrics?[^\)\]]*|audio[^\)\]]*|video[^\)\]]*|visuali[sz]er|hd|hq|4k|m/?v)[\)\]]",
        r"(?i)\s*[\(\[][^\)\]]*remaster[^\)\]]*[\)\]]",
        r"(?i)\s+-\s+(?:\d{4}\s+)?remaster(?:ed)?(?:\s+\d{4})?(?:\s+version)?\s*$",
        r"(?i)\s*[\(\[]\s*(?:feat\.?|ft\.?|featuring)\s[^\)\]]*[\)\]]",
        r"(?i)\s+(?:feat\.?|ft\.?|featuring)\s.*$",
        r"(?i)\s*-\s*topic\s*$",
        r"\s*\|.*$",
    ])
});

static ARTIST_NOISE: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"(?i)\s*-\s*topic\s*$",
        r"(?i)\s*vevo\s*$",
        r"(?i)\s+official\s*$",
        r"(?i)\s+(?:feat\.?|ft\.?|featuring)\s.*$",
    ])
});

fn strip_all(input: &str, patterns: &[Regex]) -> String {
    let mut out = input.to_string();
    for re in patterns {
        out = re.replace_all(&out, "").into_owned();
    }
    out.trim().to_string()
}

/// Remove platform noise from a title.
pub fn clean_title(title: &str) -> String {
    let cleaned = strip_all(title, &TITLE_NOISE);
    if cleaned.is_empty() { title.trim().to_string() } else { cleaned }
}

/// Remove platform noise from an artist / uploader name.
pub fn clean_artist(artist: &str) -> String {
    let cleaned = strip_all(artist, &ARTIST_NOISE);
    if cleaned.is_empty() { artist.trim().to_string() } else { cleaned }
}

/// Lowercase and fold common Latin diacritics to ASCII.
pub fn fold_to_ascii(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars().flat_map(char::to_lowercase) {
        match c {
            'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' | 'ā' | 'ą' => out.push('a'),
            'æ' => out.push_str("ae"),
            'ç' | 'ć' | 'č' => out.push('c'),
            'ď' | 'đ' => out.push('d'),
            'è' | 'é' | 'ê' | 'ë' | 'ē' | 'ę' | 'ě' => out.push('e'),
            'ğ' => out.push('g'),
            'ì' | 'í' | 'î' | 'ï' | 'ı' | 'ī' => out.push('i'),
            'ł' => out.push('l'),
            'ñ' | 'ń' | 'ň' => out.push('n'),
            'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' | 'ō' | 'ő' => out.push('o'),
            'œ' => out.push_str("oe"),
            'ř' => out.push('r'),
            'ś' | 'š' | 'ş' => out.push('s'),
            'ß' => out.push_str("ss"),
            'ť' => out.push('t'),
            'ù' | 'ú' | 'û' | 'ü' | 'ū' | 'ů' | 'ű' => out.push('u'),
            'ý' | 'ÿ' => out.push('y'),
            'ź' | 'ż' | 'ž' => out.push('z'),
            other => out.push(other),
        }
    }
    out
}

/// Comparable form: folded, articles and punctuation dropped, whitespace
/// collapsed.
pub fn normalize(s: &str) -> String {
    let folded = fold_to_ascii(s);
    let words: Vec<&str> = folded
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();
    let start = match words.first() {
        Some(&("the" | "a" | "an")) if words.len() > 1 => 1,
        _ => 0,
    };
    words[start..].join(" ")
}

/// Similarity of two already-normalized strings in `[0,1]`: the best of
/// word overlap, containment ratio and normalized edit distance.
pub fn text_similarity(a: &str, b: &str) -> f32 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a == b {
        return 1.0;
    }

    let (shorter, longer) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    let containment = if longer.contains(shorter) {
        shorter.len() as f32 / longer.len() as f32
    } else {
        0.0
    };

    let edit = strsim::normalized_levenshtein(a, b) as f32;

    word_overlap(a, b).max(containment).max(edit).clamp(0.0, 1.0)
}

/// Jaccard index over words longer than one character.
fn word_overlap(a: &str, b: &str) -> f32 {
    let words = |s: &str| -> HashSet<String> {
        s.split_whitespace()
            .filter(|w| w.len() > 1)
            .map(str::to_string)
            .collect()
    };
    let wa = words(a);
    let wb = words(b);
    let union = wa.union(&wb).count();
    if union == 0 {
        return 0.0;
    }
    wa.intersection(&wb).count() as f32 / union as f32
}

pub fn title_similarity(a: &str, b: &str) -> f32 {
    text_similarity(&normalize(&clean_title(a)), &normalize(&clean_title(b)))
}

pub fn artist_similarity(a: &str, b: &str) -> f32 {
    text_similarity(&normalize(&clean_artist(a)), &normalize(&clean_artist(b)))
}

/// `1 - min(1, |a - b| / max(a, b))`: the gap relative to the longer track.
pub fn duration_closeness(a: u32, b: u32) -> f32 {
    let longest = a.max(b);
    if longest == 0 {
        return 1.0;
    }
    let delta = a.abs_diff(b) as f32 / longest as f32;
    1.0 - delta.min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_fold_to_ascii() {
        assert_eq!(fold_to_ascii("Beyoncé"), "beyonce");
        assert_eq!(fold_to_ascii("naïve"), "naive");
        assert_eq!(fold_to_ascii("Motörhead"), "motorhead");
        assert_eq!(fold_to_ascii("Sigur Rós"), "sigur ros");
    }

    #[test]
    fn test_clean_title() {
        assert_eq!(clean_title("Numb (Official Video) [HD]"), "Numb");
        assert_eq!(clean_title("Numb [Official Music Video]"), "Numb");
        assert_eq!(clean_title("Numb (Lyrics)"), "Numb");
        assert_eq!(clean_title("Yesterday (Remastered 2009)"), "Yesterday");
        assert_eq!(clean_title("Yesterday - Remastered 2009"), "Yesterday");
        assert_eq!(clean_title("Lose Yourself | 8 Mile"), "Lose Yourself");
        assert_eq!(clean_title("Stay (feat. Justin Bieber)"), "Stay");
    }

    #[test]
    fn test_clean_title_never_empties() {
        assert_eq!(clean_title("(Official Video)"), "(Official Video)");
    }

    #[test]
    fn test_clean_artist() {
        assert_eq!(clean_artist("Linkin Park - Topic"), "Linkin Park");
        assert_eq!(clean_artist("TaylorSwiftVEVO"), "TaylorSwift");
        assert_eq!(clean_artist("Adele Official"), "Adele");
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("The Beatles"), "beatles");
        assert_eq!(normalize("  Sigur   Rós!! "), "sigur ros");
        assert_eq!(normalize("The The"), "the");
        assert_eq!(normalize("A"), "a");
    }

    #[test]
    fn test_similarity_basics() {
        assert_eq!(title_similarity("Yesterday", "yesterday"), 1.0);
        assert_eq!(artist_similarity("The Beatles", "Beatles"), 1.0);
        assert!(title_similarity("Yesterday", "Let It Be") < 0.5);
        assert_eq!(text_similarity("", "x"), 0.0);
    }

    #[test]
    fn test_duration_closeness() {
        assert_eq!(duration_closeness(125, 125), 1.0);
        assert!((duration_closeness(100, 200) - 0.5).abs() < 1e-6);
        assert!((duration_closeness(200, 100) - 0.5).abs() < 1e-6);
        assert_eq!(duration_closeness(0, 300), 0.0);
    }

    #[test]
    fn test_duration_gap_is_relative_to_length() {
        let short = duration_closeness(90, 100);
        let long = duration_closeness(710, 720);
        assert!((short - 0.9).abs() < 1e-6);
        assert!((long - (1.0 - 10.0 / 720.0)).abs() < 1e-6);
        assert!(long > short);
    }

    proptest! {
        #[test]
        fn prop_similarity_in_unit_range(a in "\\PC{0,40}", b in "\\PC{0,40}") {
            let s = title_similarity(&a, &b);
            prop_assert!((0.0..=1.0).contains(&s));
        }

        #[test]
        fn prop_duration_closeness_in_unit_range(a in 0u32..100_000, b in 0u32..100_000) {
            let c = duration_closeness(a, b);
            prop_assert!((0.0..=1.0).contains(&c));
            prop_assert_eq!(c, duration_closeness(b, a));
        }

        #[test]
        fn prop_normalize_is_plain_ascii(s in "[a-zA-Zéöü ,.!]{0,40}") {
            let out = normalize(&s);
            prop_assert!(!out.contains("  "));
            prop_assert_eq!(out.trim(), out.as_str());
            prop_assert!(out.chars().all(|c| c.is_ascii_lowercase() || c == ' '));
        }

        #[test]
        fn prop_identical_titles_score_one(s in "[a-zA-Z]{2,12}( [a-zA-Z]{2,12}){0,3}") {
            prop_assert_eq!(title_similarity(&s, &s), 1.0);
        }
    }
}
