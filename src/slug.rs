use once_cell::sync::Lazy;
use rand::Rng;
use regex::Regex;

static SLUG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z][a-z-]*[a-z]-\d{6}$").expect("slug pattern compiles"));

const MAX_BASE_LEN: usize = 60;
const FALLBACK_BASE: &str = "showcase";

pub fn is_valid_slug(slug: &str) -> bool {
    SLUG_RE.is_match(slug)
}

/// Lowercase ASCII letters separated by single hyphens, never starting or ending with one.
fn slug_base(title: &str) -> String {
    let mut base = String::with_capacity(title.len());
    for ch in title.chars() {
        let ch = ch.to_ascii_lowercase();
        if ch.is_ascii_lowercase() {
            base.push(ch);
        } else if !base.is_empty() && !base.ends_with('-') {
            base.push('-');
        }
    }
    base.truncate(MAX_BASE_LEN);
    let base = base.trim_end_matches('-');
    if base.len() < 2 {
        FALLBACK_BASE.to_string()
    } else {
        base.to_string()
    }
}

pub fn generate_slug<R: Rng + ?Sized>(title: &str, rng: &mut R) -> String {
    format!("{}-{:06}", slug_base(title), rng.gen_range(0..1_000_000u32))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_slugs_match_pattern() {
        let mut rng = rand::thread_rng();
        for title in ["Tiny Forge", "  --Rust 2024!! --", "é", "X", "a b", "Über Cool Tool 3000"] {
            let slug = generate_slug(title, &mut rng);
            assert!(is_valid_slug(&slug), "{title:?} -> {slug}");
        }
    }

    #[test]
    fn base_collapses_separators() {
        assert_eq!(slug_base("Hello,   World 42"), "hello-world");
        assert_eq!(slug_base("42"), FALLBACK_BASE);
    }

    #[test]
    fn pattern_rejects_malformed() {
        assert!(is_valid_slug("tiny-forge-123456"));
        assert!(!is_valid_slug("tiny-forge-12345"));
        assert!(!is_valid_slug("-tiny-123456"));
        assert!(!is_valid_slug("Tiny-123456"));
        assert!(!is_valid_slug("t-123456"));
    }
}
