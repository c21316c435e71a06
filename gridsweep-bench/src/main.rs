use clap::Parser;

use gridsweep_bench::cli::GridsweepArgs;
use gridsweep_bench::config::{get_profile, parse_size, profile_names};
use gridsweep_bench::output::progress::BenchProgress;
use gridsweep_bench::output::table::{render_plan, render_report};
use gridsweep_bench::output::{csv, json};
use gridsweep_bench::suites::select_tests;
use gridsweep_bench::{plan_test, run_suite};
use gridsweep_primitives::{ComputeDevice, DeviceLimits, WgpuContext};

fn init_tracing(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn fail(msg: impl std::fmt::Display) -> ! {
    eprintln!("Error: {msg}");
    std::process::exit(1);
}

fn main() {
    let args = GridsweepArgs::parse();
    init_tracing(args.verbose);

    if args.list {
        for t in gridsweep_bench::suites::all_tests() {
            println!(
                "{:<28} {:<10} {:>4} configs  {}",
                t.name,
                t.category,
                t.parameters.len(),
                t.description
            );
        }
        return;
    }

    let profile = get_profile(&args.profile).unwrap_or_else(|| {
        fail(format!(
            "Unknown profile '{}'. Valid: {}",
            args.profile,
            profile_names().collect::<Vec<_>>().join(", ")
        ))
    });
    let max_size = args
        .max_size
        .as_deref()
        .map(parse_size)
        .transpose()
        .unwrap_or_else(|e| fail(e));
    let options = profile.run_options(args.trials, max_size);

    let (tests, unknown) = select_tests(&args.tests);
    if !unknown.is_empty() {
        let available: Vec<_> = gridsweep_bench::suites::all_tests()
            .iter()
            .map(|t| t.name)
            .collect();
        fail(format!(
            "Unknown test(s) {}. Available: {}",
            unknown.join(", "),
            available.join(", ")
        ));
    }

    let ctx = WgpuContext::new();

    if args.plan {
        let limits = match &ctx {
            Ok(ctx) => *ctx.limits(),
            Err(e) => {
                tracing::warn!("{e}; planning against baseline limits");
                DeviceLimits::default()
            }
        };
        for test in &tests {
            match plan_test(test, &options, &limits) {
                Ok(runs) => render_plan(test.name, &runs),
                Err(e) => tracing::error!(test = test.name, "cannot plan: {e}"),
            }
        }
        return;
    }

    // No device is fatal for the whole run.
    let ctx = ctx.unwrap_or_else(|e| fail(format!("{e}. No usable compute device.")));

    tracing::info!(
        device = %ctx.info().name,
        backend = %ctx.info().backend,
        profile = %profile.name,
        tests = tests.len(),
        "gridsweep starting"
    );

    let progress = BenchProgress::new(&tests);
    let cb = progress.callback();
    let result = pollster::block_on(run_suite(&ctx, &tests, &options, Some(&cb)));
    progress.finish();

    let report = result.unwrap_or_else(|e| fail(e));
    render_report(&report);

    if let Some(path) = &args.json_file {
        if let Err(e) = json::write_json(path, &report, &profile.name) {
            fail(e);
        }
    }
    if let Some(path) = &args.csv_file {
        if let Err(e) = csv::write_csv(path, &report) {
            fail(e);
        }
    }
}
