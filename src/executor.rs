//! Scenario execution
//!
//! Walks parsed scenarios step by step, resolves element descriptions through
//! the [`SelectorResolver`] and drives the [`PageDriver`].

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use url::Url;
use uuid::Uuid;

use crate::errors::CukeprobeError;
use crate::feature::{Feature, Scenario, Step, StepAction};
use crate::page::PageDriver;
use crate::resolver::{Resolution, SelectorResolver};
use crate::xpath;

/// Verify steps wait at most this long for expected text
const VERIFY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct ExecutorOptions {
    /// Element wait timeout
    pub timeout: Duration,
    /// Stop a scenario at its first failing step
    pub stop_on_failure: bool,
    /// Base for relative navigation targets
    pub base_url: Option<String>,
    /// Where screenshots of failed scenarios go; `None` disables them
    pub screenshot_dir: Option<PathBuf>,
    /// Sleep for a bare `wait` step
    pub default_wait: Duration,
}

impl Default for ExecutorOptions {
    fn default() -> Self {
        ExecutorOptions {
            timeout: Duration::from_secs(30),
            stop_on_failure: true,
            base_url: None,
            screenshot_dir: None,
            default_wait: Duration::from_secs(2),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "lowercase")]
pub enum StepStatus {
    Passed,
    Failed(String),
    Skipped(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct StepResult {
    pub text: String,
    pub line: usize,
    pub background: bool,
    #[serde(flatten)]
    pub status: StepStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<Resolution>,
    pub duration_secs: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScenarioResult {
    pub name: String,
    pub tags: Vec<String>,
    pub passed: bool,
    pub steps_executed: usize,
    pub steps_passed: usize,
    pub steps_failed: usize,
    pub steps_skipped: usize,
    pub failed_steps: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub duration_secs: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<PathBuf>,
    pub steps: Vec<StepResult>,
}

impl ScenarioResult {
    fn new(scenario: &Scenario) -> Self {
        ScenarioResult {
            name: scenario.name.clone(),
            tags: scenario.tags.clone(),
            passed: false,
            steps_executed: 0,
            steps_passed: 0,
            steps_failed: 0,
            steps_skipped: 0,
            failed_steps: Vec::new(),
            error_message: None,
            duration_secs: 0.0,
            screenshot: None,
            steps: Vec::new(),
        }
    }

    fn record(&mut self, result: StepResult) {
        match &result.status {
            StepStatus::Passed => {
                self.steps_executed += 1;
                self.steps_passed += 1;
            }
            StepStatus::Failed(reason) => {
                self.steps_executed += 1;
                self.steps_failed += 1;
                let prefix = if result.background { "Background: " } else { "" };
                self.failed_steps
                    .push(format!("{prefix}{}: {reason}", result.text));
                if self.error_message.is_none() {
                    self.error_message = Some(reason.clone());
                }
            }
            StepStatus::Skipped(_) => self.steps_skipped += 1,
        }
        self.steps.push(result);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub scenarios_total: usize,
    pub scenarios_passed: usize,
    pub scenarios_failed: usize,
    pub steps_total: usize,
    pub steps_passed: usize,
    pub steps_failed: usize,
    pub steps_skipped: usize,
    pub cache_hits: usize,
    pub heuristic_hits: usize,
    pub ai_calls: usize,
    pub total_time_secs: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub feature: String,
    pub started_at: DateTime<Utc>,
    pub scenarios: Vec<ScenarioResult>,
    pub summary: RunSummary,
}

impl RunReport {
    pub fn passed(&self) -> bool {
        self.summary.scenarios_failed == 0
    }

    /// Error to exit with when any scenario failed
    pub fn failure(&self) -> Option<CukeprobeError> {
        (!self.passed()).then(|| CukeprobeError::ScenariosFailed {
            failed: self.summary.scenarios_failed,
            total: self.summary.scenarios_total,
        })
    }

    /// Human-readable summary through `tracing`
    pub fn log_summary(&self) {
        let s = &self.summary;
        info!("{}", "=".repeat(50));
        info!("TEST EXECUTION SUMMARY: {}", self.feature);
        info!("{}", "=".repeat(50));
        info!("Total Scenarios: {}", s.scenarios_total);
        info!("Passed Scenarios: {}", s.scenarios_passed);
        info!("Failed Scenarios: {}", s.scenarios_failed);
        info!("Total Steps: {}", s.steps_total);
        info!("Passed Steps: {}", s.steps_passed);
        info!("Failed Steps: {}", s.steps_failed);
        info!("Skipped Steps: {}", s.steps_skipped);
        info!("Cache Hits: {}", s.cache_hits);
        info!("Heuristic Hits: {}", s.heuristic_hits);
        info!("AI Calls: {}", s.ai_calls);
        info!("Total Time: {:.2}s", s.total_time_secs);

        let failed: Vec<&ScenarioResult> = self.scenarios.iter().filter(|r| !r.passed).collect();
        if !failed.is_empty() {
            info!("Failed scenarios:");
            for result in failed {
                info!(
                    "  - {}: {}",
                    result.name,
                    result.error_message.as_deref().unwrap_or("failed")
                );
                for step in &result.failed_steps {
                    info!("      {}", step);
                }
                if let Some(path) = &result.screenshot {
                    info!("      screenshot: {}", path.display());
                }
            }
        }
    }
}

/// Map a navigation target to a URL.
///
/// Absolute URLs pass through. Anything else is joined onto `base_url`; page
/// names such as `login page` become `login`, and `home page` is the base.
pub fn resolve_target(target: &str, base_url: Option<&str>) -> Result<String> {
    let target = target.trim();
    if let Ok(url) = Url::parse(target)
        && (url.has_host() || matches!(url.scheme(), "file" | "about" | "data"))
    {
        return Ok(url.to_string());
    }

    let Some(base) = base_url else {
        bail!(CukeprobeError::InvalidInput(format!(
            "Cannot navigate to '{target}': not an absolute URL and no base URL set"
        )));
    };
    let mut base = Url::parse(base).with_context(|| format!("Invalid base URL: {base}"))?;
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }

    let path = page_path(target);
    Ok(base
        .join(&path)
        .with_context(|| format!("Cannot join '{path}' onto {base}"))?
        .to_string())
}

fn page_path(target: &str) -> String {
    if target.contains('/') || target.contains('.') || !target.contains(char::is_whitespace) {
        let name = target.to_lowercase();
        return match name.as_str() {
            "home" | "homepage" => String::new(),
            _ => target.to_string(),
        };
    }

    let lower = target.to_lowercase();
    let name = lower.strip_prefix("the ").unwrap_or(&lower);
    let name = name.strip_suffix(" page").unwrap_or(name).trim();
    match name {
        "home" | "main" | "landing" => String::new(),
        _ => name.split_whitespace().collect::<Vec<_>>().join("-"),
    }
}

fn screenshot_name(scenario: &str) -> String {
    let slug: String = scenario
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect();
    let slug = slug.trim_matches('_');
    format!("{}_{}.png", slug, Utc::now().format("%Y%m%d_%H%M%S"))
}

pub struct TestExecutor {
    page: Box<dyn PageDriver>,
    resolver: SelectorResolver,
    options: ExecutorOptions,
}

impl TestExecutor {
    pub fn new(page: Box<dyn PageDriver>, resolver: SelectorResolver, options: ExecutorOptions) -> Self {
        TestExecutor {
            page,
            resolver,
            options,
        }
    }

    pub fn resolver(&self) -> &SelectorResolver {
        &self.resolver
    }

    /// Run every scenario of `feature`, then close the page
    pub async fn run_feature(&mut self, feature: &Feature) -> RunReport {
        info!("Executing feature: {}", feature.name);
        let started_at = Utc::now();
        let start = Instant::now();

        let mut scenarios = Vec::with_capacity(feature.scenarios.len());
        for scenario in &feature.scenarios {
            scenarios.push(self.run_scenario(scenario).await);
        }

        if let Err(e) = self.page.close().await {
            warn!("Error closing browser: {:#}", e);
        }

        let stats = self.resolver.stats();
        let summary = RunSummary {
            scenarios_total: scenarios.len(),
            scenarios_passed: scenarios.iter().filter(|r| r.passed).count(),
            scenarios_failed: scenarios.iter().filter(|r| !r.passed).count(),
            steps_total: scenarios
                .iter()
                .map(|r| r.steps_executed + r.steps_skipped)
                .sum(),
            steps_passed: scenarios.iter().map(|r| r.steps_passed).sum(),
            steps_failed: scenarios.iter().map(|r| r.steps_failed).sum(),
            steps_skipped: scenarios.iter().map(|r| r.steps_skipped).sum(),
            cache_hits: stats.cache_hits,
            heuristic_hits: stats.heuristic_hits,
            ai_calls: stats.ai_calls,
            total_time_secs: start.elapsed().as_secs_f64(),
        };

        RunReport {
            run_id: Uuid::new_v4(),
            feature: feature.name.clone(),
            started_at,
            scenarios,
            summary,
        }
    }

    pub async fn run_scenario(&mut self, scenario: &Scenario) -> ScenarioResult {
        info!("Executing scenario: {}", scenario.name);
        let start = Instant::now();
        let mut result = ScenarioResult::new(scenario);

        // Background failures are recorded but never stop the scenario
        for step in &scenario.background {
            let step_result = self.run_step(step, true).await;
            result.record(step_result);
        }

        let mut stopped = false;
        for step in &scenario.steps {
            if stopped {
                result.record(StepResult {
                    text: step.text.clone(),
                    line: step.line,
                    background: false,
                    status: StepStatus::Skipped("previous step failed".to_string()),
                    resolution: None,
                    duration_secs: 0.0,
                });
                continue;
            }

            let step_result = self.run_step(step, false).await;
            let failed = matches!(step_result.status, StepStatus::Failed(_));
            result.record(step_result);
            if failed && self.options.stop_on_failure {
                stopped = true;
            }
        }

        result.passed = result.steps_failed == 0;
        if !result.passed {
            result.screenshot = self.capture_failure(&scenario.name).await;
        }
        result.duration_secs = start.elapsed().as_secs_f64();

        if result.passed {
            info!(
                "Scenario passed: {} ({}/{} steps)",
                scenario.name, result.steps_passed, result.steps_executed
            );
        } else {
            error!(
                "Scenario failed: {} ({} failed steps)",
                scenario.name, result.steps_failed
            );
        }
        result
    }

    async fn run_step(&mut self, step: &Step, background: bool) -> StepResult {
        info!("{} {}", step.keyword.as_str(), step.text);
        let start = Instant::now();

        let (status, resolution) = match step.action {
            None => {
                warn!("Unknown step type, skipping: {}", step.text);
                (StepStatus::Skipped("no action recognized".to_string()), None)
            }
            Some(action) => match self.perform(action, step).await {
                Ok(resolution) => (StepStatus::Passed, resolution),
                Err(e) => {
                    let reason = format!("{:#}", e);
                    error!("Step failed: {}: {}", step.text, reason);
                    (StepStatus::Failed(reason), None)
                }
            },
        };

        StepResult {
            text: step.text.clone(),
            line: step.line,
            background,
            status,
            resolution,
            duration_secs: start.elapsed().as_secs_f64(),
        }
    }

    /// Resolve the step's element or fail the step
    async fn locate(&mut self, step: &Step) -> Result<Resolution> {
        let Some(description) = step.element.as_deref() else {
            bail!("Step names no element");
        };
        match self.resolver.resolve(self.page.as_ref(), description).await? {
            Some(resolution) => Ok(resolution),
            None => bail!("Could not find element: {description}"),
        }
    }

    fn required_value<'a>(step: &'a Step, what: &str) -> Result<&'a str> {
        step.value
            .as_deref()
            .with_context(|| format!("Step needs a quoted {what}"))
    }

    async fn perform(&mut self, action: StepAction, step: &Step) -> Result<Option<Resolution>> {
        match action {
            StepAction::Navigate => {
                let Some(target) = step.value.as_deref().or(step.element.as_deref()) else {
                    bail!("Navigate step has no target");
                };
                let url = resolve_target(target, self.options.base_url.as_deref())?;
                self.page.navigate(&url).await?;
                Ok(None)
            }
            StepAction::Click => {
                let found = self.locate(step).await?;
                self.page.click(&found.selector).await?;
                Ok(Some(found))
            }
            StepAction::Type => {
                let text = Self::required_value(step, "text to type")?;
                let found = self.locate(step).await?;
                self.page.fill(&found.selector, text).await?;
                Ok(Some(found))
            }
            StepAction::Select => {
                let label = Self::required_value(step, "option label")?;
                let found = self.locate(step).await?;
                self.page.select_option(&found.selector, label).await?;
                Ok(Some(found))
            }
            StepAction::Clear => {
                let found = self.locate(step).await?;
                self.page.clear(&found.selector).await?;
                Ok(Some(found))
            }
            StepAction::Check | StepAction::Uncheck => {
                let found = self.locate(step).await?;
                self.page
                    .set_checked(&found.selector, action == StepAction::Check)
                    .await?;
                Ok(Some(found))
            }
            StepAction::Hover => {
                let found = self.locate(step).await?;
                self.page.hover(&found.selector).await?;
                Ok(Some(found))
            }
            StepAction::Scroll => {
                let found = self.locate(step).await?;
                self.page.scroll_into_view(&found.selector).await?;
                Ok(Some(found))
            }
            StepAction::Verify => self.verify(step).await,
            StepAction::Wait => self.wait(step).await,
        }
    }

    async fn verify(&mut self, step: &Step) -> Result<Option<Resolution>> {
        let timeout = VERIFY_TIMEOUT.min(self.options.timeout);
        if let Some(expected) = step.value.as_deref() {
            let selector = xpath::text_selector(expected);
            if let Err(e) = self.page.wait_for(&selector, timeout).await {
                debug!("Text check failed: {:#}", e);
                bail!("Text not found on page: {expected}");
            }
            info!("Verified text: {}", expected);
            return Ok(None);
        }

        let found = self.locate(step).await?;
        self.page
            .wait_for(&found.selector, timeout)
            .await
            .with_context(|| format!("Element not visible: {}", found.selector))?;
        info!("Verified {} is visible", found.selector);
        Ok(Some(found))
    }

    async fn wait(&mut self, step: &Step) -> Result<Option<Resolution>> {
        if let Some(raw) = step.value.as_deref() {
            let seconds: f64 = raw
                .trim()
                .parse()
                .with_context(|| format!("Invalid wait duration: {raw}"))?;
            let duration = Duration::try_from_secs_f64(seconds)
                .with_context(|| format!("Invalid wait duration: {raw}"))?;
            info!("Waiting {:.1}s", seconds);
            tokio::time::sleep(duration).await;
            return Ok(None);
        }

        if step.element.is_some() {
            let found = self.locate(step).await?;
            self.page.wait_for(&found.selector, self.options.timeout).await?;
            return Ok(Some(found));
        }

        tokio::time::sleep(self.options.default_wait).await;
        Ok(None)
    }

    async fn capture_failure(&self, scenario: &str) -> Option<PathBuf> {
        let dir = self.options.screenshot_dir.as_deref()?;
        match self.save_screenshot(dir, scenario).await {
            Ok(path) => {
                info!("Saved failure screenshot: {}", path.display());
                Some(path)
            }
            Err(e) => {
                warn!("Could not save screenshot: {:#}", e);
                None
            }
        }
    }

    async fn save_screenshot(&self, dir: &Path, scenario: &str) -> Result<PathBuf> {
        let png = self.page.screenshot().await?;
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("Failed to create {}", dir.display()))?;
        let path = dir.join(screenshot_name(scenario));
        tokio::fs::write(&path, png)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(path)
    }
}

#[cfg(test)]
#[path = "executor_test.rs"]
mod executor_test;
