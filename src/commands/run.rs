use anyhow::{Result, bail};
use clap::Args;
use std::path::PathBuf;
use tracing::info;

use cukeprobe::config::{AiSettings, BrowserSettings, CacheSettings};
use cukeprobe::executor::StepStatus;
use cukeprobe::{
    Browser, CukeprobeError, ElementCache, ElementDetector, ExecutorOptions, OutputFormat,
    RunReport, SelectorResolver, TestExecutor, parse_feature_file,
};

use super::print_json;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Feature file to run
    pub feature: PathBuf,

    #[command(flatten)]
    pub browser: BrowserSettings,

    #[command(flatten)]
    pub ai: AiSettings,

    #[command(flatten)]
    pub cache: CacheSettings,

    /// Base URL for relative navigation targets ("the login page", "/cart")
    #[arg(long, env = "BASE_URL")]
    pub base_url: Option<String>,

    /// Only run scenarios with one of these tags (comma separated, @ optional)
    #[arg(long, value_delimiter = ',')]
    pub tags: Vec<String>,

    /// Keep executing a scenario after a step fails
    #[arg(long)]
    pub continue_on_failure: bool,

    /// Save a screenshot of each failed scenario here
    #[arg(long)]
    pub screenshot_dir: Option<PathBuf>,

    /// Resolve elements with the cache and heuristics only
    #[arg(long)]
    pub no_ai: bool,

    /// Output format
    #[arg(short, long, default_value = "simple")]
    pub format: OutputFormat,
}

pub async fn handle_run(args: RunArgs) -> Result<()> {
    let mut feature = parse_feature_file(&args.feature)?;
    feature.filter_tags(&args.tags);
    if feature.scenarios.is_empty() {
        bail!(CukeprobeError::InvalidInput(format!(
            "No scenarios to run in {}",
            args.feature.display()
        )));
    }

    // Fail on bad configuration before a browser is started
    let detector = if args.no_ai {
        info!("AI fallback disabled");
        None
    } else {
        Some(ElementDetector::from_settings(&args.ai)?)
    };
    let viewport = args.browser.viewport()?;
    let cache = ElementCache::load(&args.cache.cache_file);

    let browser = Browser::new(
        args.browser.browser,
        viewport,
        args.browser.is_headless(),
        args.browser.timeout(),
    )
    .await?;

    let options = ExecutorOptions {
        timeout: args.browser.timeout(),
        stop_on_failure: !args.continue_on_failure,
        base_url: args.base_url,
        screenshot_dir: args.screenshot_dir,
        ..Default::default()
    };
    let mut executor = TestExecutor::new(
        Box::new(browser),
        SelectorResolver::new(cache, detector),
        options,
    );

    let report = executor.run_feature(&feature).await;
    report.log_summary();

    match args.format {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Simple => print_simple(&report),
    }

    match report.failure() {
        Some(err) => Err(err.into()),
        None => Ok(()),
    }
}

fn print_simple(report: &RunReport) {
    println!("Feature: {}", report.feature);
    for scenario in &report.scenarios {
        let mark = if scenario.passed { "PASS" } else { "FAIL" };
        println!(
            "  {} {} ({}/{} steps, {:.2}s)",
            mark,
            scenario.name,
            scenario.steps_passed,
            scenario.steps_executed,
            scenario.duration_secs
        );
        for step in &scenario.steps {
            match &step.status {
                StepStatus::Failed(reason) => println!("      x {}: {}", step.text, reason),
                StepStatus::Skipped(reason) => println!("      - {} ({})", step.text, reason),
                StepStatus::Passed => {}
            }
        }
        if let Some(path) = &scenario.screenshot {
            println!("      screenshot: {}", path.display());
        }
    }

    let s = &report.summary;
    println!();
    println!(
        "Scenarios: {} passed, {} failed, {} total",
        s.scenarios_passed, s.scenarios_failed, s.scenarios_total
    );
    println!(
        "Steps: {} passed, {} failed, {} skipped",
        s.steps_passed, s.steps_failed, s.steps_skipped
    );
    println!(
        "Resolution: {} cache hits, {} heuristic hits, {} AI calls",
        s.cache_hits, s.heuristic_hits, s.ai_calls
    );
    println!("Time: {:.2}s", s.total_time_secs);
}
