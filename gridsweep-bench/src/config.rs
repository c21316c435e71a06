use serde::{Deserialize, Serialize};

use crate::harness::RunOptions;

/// A benchmark profile: size cap and trial override.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BenchProfile {
    pub name: String,
    /// Largest `memsrc_size` to run; `None` runs every declared size.
    pub max_size: Option<u64>,
    /// Trials per configuration; `None` keeps each test's own count.
    pub trials: Option<u32>,
}

static PROFILES: [(&str, Option<u64>, Option<u32>); 3] = [
    ("quick", Some(1 << 20), Some(2)),
    ("standard", Some(16 << 20), None),
    ("thorough", None, None),
];

/// Names of the built-in profiles.
pub fn profile_names() -> impl Iterator<Item = &'static str> {
    PROFILES.iter().map(|(name, _, _)| *name)
}

/// Built-in profile by name: quick (sizes up to 1M, 2 trials), standard
/// (up to 16M, declared trials) or thorough (everything declared).
pub fn get_profile(name: &str) -> Option<BenchProfile> {
    PROFILES
        .iter()
        .find(|(n, _, _)| n.eq_ignore_ascii_case(name))
        .map(|&(name, max_size, trials)| BenchProfile {
            name: name.to_string(),
            max_size,
            trials,
        })
}

impl BenchProfile {
    /// Run options from this profile, with explicit flags taking precedence.
    pub fn run_options(&self, trials: Option<u32>, max_size: Option<u64>) -> RunOptions {
        RunOptions {
            trials: trials.or(self.trials),
            max_size: max_size.or(self.max_size),
        }
    }
}

/// Parse a size such as `1M`, `64k`, `0.5M` or `1_000_000`.
///
/// Suffixes are binary to match the power-of-two sweeps.
pub fn parse_size(text: &str) -> Result<u64, String> {
    let cleaned = text.trim().replace('_', "");
    let (digits, scale) = match cleaned.chars().last().map(|c| c.to_ascii_uppercase()) {
        Some('K') => (&cleaned[..cleaned.len() - 1], 1u64 << 10),
        Some('M') => (&cleaned[..cleaned.len() - 1], 1u64 << 20),
        _ => (cleaned.as_str(), 1),
    };
    if scale == 1 {
        return digits
            .parse::<u64>()
            .map_err(|e| format!("invalid size '{text}': {e}"));
    }
    let value: f64 = digits
        .parse()
        .map_err(|e| format!("invalid size '{text}': {e}"))?;
    if !value.is_finite() || value < 0.0 {
        return Err(format!("invalid size '{text}'"));
    }
    Ok((value * scale as f64) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_size_suffixes() {
        assert_eq!(parse_size("1M").unwrap(), 1 << 20);
        assert_eq!(parse_size("16m").unwrap(), 16 << 20);
        assert_eq!(parse_size("64K").unwrap(), 65_536);
        assert_eq!(parse_size("0.5M").unwrap(), 1 << 19);
    }

    #[test]
    fn test_parse_size_raw() {
        assert_eq!(parse_size("1000000").unwrap(), 1_000_000);
        assert_eq!(parse_size("1_000_000").unwrap(), 1_000_000);
        assert_eq!(parse_size("  256 ").unwrap(), 256);
    }

    #[test]
    fn test_parse_size_invalid() {
        assert!(parse_size("abc").is_err());
        assert!(parse_size("").is_err());
        assert!(parse_size("xM").is_err());
        assert!(parse_size("-1K").is_err());
    }

    #[test]
    fn test_profiles() {
        let quick = get_profile("quick").unwrap();
        assert_eq!(quick.max_size, Some(1 << 20));
        assert_eq!(quick.trials, Some(2));
        assert_eq!(get_profile("Standard").unwrap().max_size, Some(16 << 20));
        assert_eq!(get_profile("thorough").unwrap().max_size, None);
        assert!(get_profile("unknown").is_none());
        assert_eq!(profile_names().count(), 3);
    }

    #[test]
    fn test_flags_override_profile() {
        let opts = get_profile("quick").unwrap().run_options(Some(7), None);
        assert_eq!(opts.trials, Some(7));
        assert_eq!(opts.max_size, Some(1 << 20));

        let opts = get_profile("thorough").unwrap().run_options(None, Some(4096));
        assert_eq!(opts.trials, None);
        assert_eq!(opts.max_size, Some(4096));
    }
}
