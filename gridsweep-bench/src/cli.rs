use clap::Parser;

/// Parameter-sweep compute benchmark harness
#[derive(Parser, Debug)]
#[command(name = "gridsweep", version, about)]
pub struct GridsweepArgs {
    /// Test names or categories to run (e.g., membw madd subgroups).
    /// Use "all" to run every built-in test.
    #[arg(value_name = "TESTS")]
    pub tests: Vec<String>,

    /// List the available tests and exit
    #[arg(long)]
    pub list: bool,

    /// Expand and plan every configuration without touching buffers or
    /// submitting work
    #[arg(long)]
    pub plan: bool,

    /// Benchmark profile: quick (<=1M, 2 trials), standard (<=16M), thorough (no cap)
    #[arg(long, default_value = "standard")]
    pub profile: String,

    /// Trials per configuration, overriding the profile and the tests
    #[arg(long)]
    pub trials: Option<u32>,

    /// Largest source size to run (e.g., 1M, 64K, 1_000_000)
    #[arg(long)]
    pub max_size: Option<String>,

    /// Write JSON results to file
    #[arg(long)]
    pub json_file: Option<String>,

    /// Write CSV results to file
    #[arg(long)]
    pub csv_file: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = GridsweepArgs::parse_from(["gridsweep"]);
        assert!(args.tests.is_empty());
        assert_eq!(args.profile, "standard");
        assert!(!args.plan && !args.list && !args.verbose);
    }

    #[test]
    fn test_flags() {
        let args = GridsweepArgs::parse_from([
            "gridsweep",
            "membw",
            "madd",
            "--profile",
            "quick",
            "--trials",
            "3",
            "--max-size",
            "64K",
            "-v",
        ]);
        assert_eq!(args.tests, vec!["membw", "madd"]);
        assert_eq!(args.trials, Some(3));
        assert_eq!(args.max_size.as_deref(), Some("64K"));
        assert!(args.verbose);
    }
}
