use rand::Rng;

use crate::directory::{Directory, DirectoryError};

pub const MIN_LEN: usize = 5;
pub const MAX_LEN: usize = 18;

/// First `n` characters of `s`, or all of it when shorter.
fn prefix(s: &str, n: usize) -> &str {
    match s.char_indices().nth(n) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Builds login name candidates for a person, in preference order, keeping
/// only those between [`MIN_LEN`] and [`MAX_LEN`] characters.
pub fn generate(first_name: &str, last_name: &str) -> Vec<String> {
    let suffix = rand::thread_rng().gen_range(1..=99);
    generate_with_suffix(first_name, last_name, suffix)
}

pub fn generate_with_suffix(first_name: &str, last_name: &str, suffix: u32) -> Vec<String> {
    let first = first_name.trim().to_lowercase();
    let last = last_name.trim().to_lowercase();

    let candidates = [
        format!("{first}{last}"),
        format!("{}{last}", prefix(&first, 3)),
        format!("{}{last}", prefix(&first, 2)),
        format!("{first}{}", prefix(&last, 2)),
        format!("{}{last}{suffix}", prefix(&first, 1)),
    ];

    let mut names: Vec<String> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        let len = candidate.chars().count();
        if (MIN_LEN..=MAX_LEN).contains(&len) && !names.contains(&candidate) {
            names.push(candidate);
        }
    }
    names
}

/// Candidates for the person that the directory reports as unused.
pub async fn login_options(
    directory: &dyn Directory,
    first_name: &str,
    last_name: &str,
) -> Result<Vec<String>, DirectoryError> {
    let candidates = generate(first_name, last_name);
    if candidates.is_empty() {
        return Ok(candidates);
    }
    directory.available_login_names(&candidates).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_suffixed(name: &str, stem: &str) -> bool {
        name.strip_prefix(stem).is_some_and(|digits| {
            (1..=2).contains(&digits.len()) && digits.bytes().all(|b| b.is_ascii_digit())
        })
    }

    #[test]
    fn test_generate_test_user() {
        let names = generate("Test", "User");
        assert_eq!(&names[..4], &["testuser", "tesuser", "teuser", "testus"]);
        assert_eq!(names.len(), 5);
        assert!(is_suffixed(&names[4], "tuser"));
    }

    #[test]
    fn test_long_names_drop_unabridged() {
        let names = generate_with_suffix("longfirstname", "longlastname", 7);
        assert!(!names.contains(&"longfirstnamelonglastname".to_string()));
        assert_eq!(
            names,
            vec!["lonlonglastname", "lolonglastname", "longfirstnamelo", "llonglastname7"]
        );
    }

    #[test]
    fn test_short_names_truncate_instead_of_panicking() {
        let names = generate_with_suffix("Al", "Li", 42);
        // "alli" and "ali" are too short; the slices clamp to the name length.
        assert_eq!(names, vec!["ali42"]);
    }

    #[test]
    fn test_duplicate_candidates_collapse() {
        // Both the unabridged and three-letter forms are "bobsmith".
        let names = generate_with_suffix("Bob", "Smith", 3);
        assert_eq!(names, vec!["bobsmith", "bosmith", "bobsm", "bsmith3"]);
    }

    #[test]
    fn test_prefix_is_char_safe() {
        assert_eq!(prefix("émile", 2), "ém");
        assert_eq!(prefix("jo", 3), "jo");
        assert_eq!(prefix("", 1), "");
    }
}
