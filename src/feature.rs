//! Gherkin feature file parsing
//!
//! Turns `.feature` text into scenarios made of steps. Each step keeps its
//! literal text and, when one of the known phrasings matches, the UI action it
//! asks for, the plain-language description of the element it targets and the
//! quoted argument (text to type, option to pick, URL to open...).

use anyhow::{Context, Result};
use lazy_static::lazy_static;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::errors::CukeprobeError;

/// Gherkin step keyword
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepKeyword {
    Given,
    When,
    Then,
    And,
    But,
    /// The `*` bullet keyword
    Star,
}

impl StepKeyword {
    fn parse(word: &str) -> Option<Self> {
        match word.to_lowercase().as_str() {
            "given" => Some(StepKeyword::Given),
            "when" => Some(StepKeyword::When),
            "then" => Some(StepKeyword::Then),
            "and" => Some(StepKeyword::And),
            "but" => Some(StepKeyword::But),
            "*" => Some(StepKeyword::Star),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StepKeyword::Given => "Given",
            StepKeyword::When => "When",
            StepKeyword::Then => "Then",
            StepKeyword::And => "And",
            StepKeyword::But => "But",
            StepKeyword::Star => "*",
        }
    }
}

/// UI action a step asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepAction {
    Navigate,
    Click,
    Type,
    Select,
    Verify,
    Wait,
    Hover,
    Scroll,
    Clear,
    Check,
    Uncheck,
}

impl fmt::Display for StepAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StepAction::Navigate => "navigate",
            StepAction::Click => "click",
            StepAction::Type => "type",
            StepAction::Select => "select",
            StepAction::Verify => "verify",
            StepAction::Wait => "wait",
            StepAction::Hover => "hover",
            StepAction::Scroll => "scroll",
            StepAction::Clear => "clear",
            StepAction::Check => "check",
            StepAction::Uncheck => "uncheck",
        };
        f.write_str(name)
    }
}

/// A single scenario step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub keyword: StepKeyword,
    /// Step text after the keyword, verbatim
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<StepAction>,
    /// Plain-language element description, quotes removed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub element: Option<String>,
    /// Quoted argument: text to type, option label, expected text, URL or seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// 1-based line in the feature file
    pub line: usize,
}

/// A runnable scenario with its background steps already attached
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    pub tags: Vec<String>,
    pub background: Vec<Step>,
    pub steps: Vec<Step>,
    pub line: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    pub name: String,
    pub tags: Vec<String>,
    pub scenarios: Vec<Scenario>,
}

impl Feature {
    fn all_steps(&self) -> impl Iterator<Item = &Step> {
        self.scenarios
            .iter()
            .flat_map(|s| s.background.iter().chain(s.steps.iter()))
    }

    /// Unique element descriptions in first-seen order
    pub fn elements(&self) -> Vec<String> {
        let mut seen = Vec::new();
        for element in self.all_steps().filter_map(|s| s.element.as_ref()) {
            if !seen.contains(element) {
                seen.push(element.clone());
            }
        }
        seen
    }

    /// Number of steps per recognised action
    pub fn action_summary(&self) -> BTreeMap<StepAction, usize> {
        let mut summary = BTreeMap::new();
        for action in self.all_steps().filter_map(|s| s.action) {
            *summary.entry(action).or_insert(0) += 1;
        }
        summary
    }

    /// Keep only scenarios carrying at least one of `tags` (`@` prefix optional)
    pub fn filter_tags(&mut self, tags: &[String]) {
        if tags.is_empty() {
            return;
        }
        let wanted: Vec<String> = tags
            .iter()
            .map(|t| {
                let t = t.trim();
                if t.starts_with('@') {
                    t.to_string()
                } else {
                    format!("@{t}")
                }
            })
            .collect();

        let before = self.scenarios.len();
        self.scenarios
            .retain(|s| s.tags.iter().any(|tag| wanted.contains(tag)));
        debug!(
            "Tag filter {:?} kept {} of {} scenarios",
            wanted,
            self.scenarios.len(),
            before
        );
    }
}

/// Read and parse a feature file
pub fn parse_feature_file(path: &Path) -> Result<Feature> {
    if !path.exists() {
        return Err(CukeprobeError::InvalidInput(format!(
            "Feature file not found: {}",
            path.display()
        ))
        .into());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read feature file {}", path.display()))?;

    Ok(parse_feature(&content))
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Section {
    Preamble,
    Background,
    Scenario,
    Examples,
}

#[derive(Debug, Default)]
struct ExamplesTable {
    header: Vec<String>,
    rows: Vec<Vec<String>>,
}

#[derive(Debug)]
struct ScenarioDraft {
    name: String,
    tags: Vec<String>,
    background: Vec<Step>,
    steps: Vec<Step>,
    line: usize,
    outline: bool,
    examples: Vec<ExamplesTable>,
}

impl ScenarioDraft {
    fn finish(self, out: &mut Vec<Scenario>) {
        if self.steps.is_empty() {
            warn!(
                "Skipping scenario '{}' (line {}): it has no steps",
                self.name, self.line
            );
            return;
        }

        let has_rows = self.examples.iter().any(|t| !t.rows.is_empty());
        if !self.outline || !has_rows {
            out.push(Scenario {
                name: self.name,
                tags: self.tags,
                background: self.background,
                steps: self.steps,
                line: self.line,
            });
            return;
        }

        let mut example = 0;
        for table in &self.examples {
            for row in &table.rows {
                example += 1;
                let steps = self
                    .steps
                    .iter()
                    .map(|step| {
                        let mut text = step.text.clone();
                        for (column, cell) in table.header.iter().zip(row) {
                            text = text.replace(&format!("<{column}>"), cell);
                        }
                        parse_step(step.keyword, &text, step.line)
                    })
                    .collect();

                out.push(Scenario {
                    name: format!("{} (example {})", self.name, example),
                    tags: self.tags.clone(),
                    background: self.background.clone(),
                    steps,
                    line: self.line,
                });
            }
        }
    }
}

/// Split `Keyword: rest` for the structural Gherkin keywords
fn structural_keyword(line: &str) -> Option<(String, String)> {
    let (keyword, rest) = line.split_once(':')?;
    let keyword = keyword.trim().to_lowercase();
    match keyword.as_str() {
        "feature" | "background" | "scenario" | "example" | "scenario outline"
        | "scenario template" | "examples" | "scenarios" | "rule" => {
            Some((keyword, rest.trim().to_string()))
        }
        _ => None,
    }
}

fn table_cells(line: &str) -> Vec<String> {
    line.trim_matches('|')
        .split('|')
        .map(|cell| cell.trim().to_string())
        .collect()
}

/// Parse feature file content
pub fn parse_feature(content: &str) -> Feature {
    let mut feature = Feature::default();
    let mut scenarios = Vec::new();
    let mut pending_tags: Vec<String> = Vec::new();
    let mut background: Vec<Step> = Vec::new();
    let mut current: Option<ScenarioDraft> = None;
    let mut section = Section::Preamble;
    let mut doc_string: Option<&'static str> = None;

    for (idx, raw) in content.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw.trim();

        if let Some(delimiter) = doc_string {
            if line.starts_with(delimiter) {
                doc_string = None;
            }
            continue;
        }

        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if line.starts_with("\"\"\"") {
            doc_string = Some("\"\"\"");
            continue;
        }
        if line.starts_with("```") {
            doc_string = Some("```");
            continue;
        }

        if line.starts_with('@') {
            pending_tags.extend(
                line.split_whitespace()
                    .filter(|t| t.starts_with('@'))
                    .map(String::from),
            );
            continue;
        }

        if let Some((keyword, rest)) = structural_keyword(line) {
            match keyword.as_str() {
                "feature" => {
                    feature.name = rest;
                    feature.tags = std::mem::take(&mut pending_tags);
                    section = Section::Preamble;
                }
                "rule" => {
                    if let Some(draft) = current.take() {
                        draft.finish(&mut scenarios);
                    }
                    section = Section::Preamble;
                }
                "background" => {
                    if let Some(draft) = current.take() {
                        draft.finish(&mut scenarios);
                    }
                    background.clear();
                    section = Section::Background;
                }
                "examples" | "scenarios" => {
                    if let Some(draft) = current.as_mut() {
                        draft.examples.push(ExamplesTable::default());
                        section = Section::Examples;
                    }
                    pending_tags.clear();
                }
                _ => {
                    if let Some(draft) = current.take() {
                        draft.finish(&mut scenarios);
                    }
                    let mut tags = feature.tags.clone();
                    tags.append(&mut pending_tags);
                    current = Some(ScenarioDraft {
                        name: rest,
                        tags,
                        background: background.clone(),
                        steps: Vec::new(),
                        line: line_no,
                        outline: keyword != "scenario" && keyword != "example",
                        examples: Vec::new(),
                    });
                    section = Section::Scenario;
                }
            }
            continue;
        }

        if line.starts_with('|') {
            if section == Section::Examples
                && let Some(table) = current.as_mut().and_then(|d| d.examples.last_mut())
            {
                let cells = table_cells(line);
                if table.header.is_empty() {
                    table.header = cells;
                } else {
                    table.rows.push(cells);
                }
            } else {
                debug!("Ignoring data table row on line {}", line_no);
            }
            continue;
        }

        let Some(step) = parse_step_line(line, line_no) else {
            // Free-form description text under Feature/Scenario
            continue;
        };

        match (section, current.as_mut()) {
            (Section::Background, _) => background.push(step),
            (Section::Scenario | Section::Examples, Some(draft)) => draft.steps.push(step),
            _ => debug!("Ignoring step outside of a scenario on line {}", line_no),
        }
    }

    if let Some(draft) = current.take() {
        draft.finish(&mut scenarios);
    }

    feature.scenarios = scenarios;
    info!("Parsed {} scenarios", feature.scenarios.len());
    feature
}

fn parse_step_line(line: &str, line_no: usize) -> Option<Step> {
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };
    let keyword = StepKeyword::parse(word)?;
    Some(parse_step(keyword, rest, line_no))
}

lazy_static! {
    static ref QUOTED: Regex = Regex::new(r#""([^"]*)"|\B'([^']*)'\B"#).expect("valid regex");
    static ref PLACEHOLDER: Regex = Regex::new(r"\{(\d+)\}").expect("valid regex");
    static ref SUBJECT: Regex = Regex::new(
        r"(?i)^(?:i|we|you|they|the user|a user|user|the customer|the visitor)\s+"
    )
    .expect("valid regex");
    static ref AUXILIARY: Regex =
        Regex::new(r"(?i)^(?:(?:should|can|must|will|also|then|do|does|try\s+to)\s+)+")
            .expect("valid regex");
    static ref CLICK: Regex =
        Regex::new(r"(?i)^(?:click|clicks|press|presses|tap|taps)(?:\s+on)?(?:\s+the)?\s+(.+)$")
            .expect("valid regex");
    static ref FILL_WITH: Regex =
        Regex::new(r"(?i)^fills?\s+(?:in\s+)?(?:the\s+)?(.+?)\s+with\s+(\{\d+\})")
            .expect("valid regex");
    static ref TYPE: Regex = Regex::new(
        r"(?i)^(?:types?|enters?|inputs?)\s+(\{\d+\})(?:\s+(?:in|into|on|to)(?:\s+the)?\s+(.+))?$"
    )
    .expect("valid regex");
    static ref SELECT: Regex =
        Regex::new(r"(?i)^selects?\s+(\{\d+\})(?:\s+(?:from|in)(?:\s+the)?\s+(.+))?$")
            .expect("valid regex");
    static ref CLEAR: Regex = Regex::new(r"(?i)^clears?\s+(?:the\s+)?(.+)$").expect("valid regex");
    static ref UNCHECK: Regex =
        Regex::new(r"(?i)^unchecks?\s+(?:the\s+)?(.+)$").expect("valid regex");
    static ref VERIFY: Regex = Regex::new(
        r"(?i)^(?:sees?|verify|verifies|check\s+that|expects?\s+to\s+see)\s+(?:that\s+)?(?:the\s+)?(?:text\s+)?(.+)$"
    )
    .expect("valid regex");
    static ref VISIBLE: Regex = Regex::new(
        r"(?i)^(?:the\s+)?(.+?)\s+(?:should\s+)?(?:be\s+visible|be\s+displayed|is\s+visible|is\s+displayed|appears?)$"
    )
    .expect("valid regex");
    static ref CHECK: Regex = Regex::new(r"(?i)^checks?\s+(?:the\s+)?(.+)$").expect("valid regex");
    static ref HOVER: Regex =
        Regex::new(r"(?i)^hovers?\s+(?:over\s+)?(?:the\s+)?(.+)$").expect("valid regex");
    static ref SCROLL: Regex =
        Regex::new(r"(?i)^scrolls?\s+(?:down\s+|up\s+)?(?:to\s+)?(?:the\s+)?(.+)$")
            .expect("valid regex");
    static ref NAVIGATE: Regex = Regex::new(
        r"(?i)^(?:go(?:es)?\s+to|navigates?\s+to|visits?|(?:am|is|are)\s+on)\s+(?:the\s+)?(.+)$"
    )
    .expect("valid regex");
    static ref WAIT_SECONDS: Regex =
        Regex::new(r"(?i)^waits?\s+(?:for\s+)?(\d+(?:\.\d+)?|\{\d+\})\s+seconds?$")
            .expect("valid regex");
    static ref WAIT: Regex =
        Regex::new(r"(?i)^waits?(?:\s+for)?(?:\s+the)?(?:\s+(.+))?$").expect("valid regex");
}

/// Replace quoted arguments with `{n}` placeholders
fn lift_quotes(text: &str) -> (String, Vec<String>) {
    let mut args = Vec::new();
    let template = QUOTED.replace_all(text, |caps: &Captures| {
        let arg = caps
            .get(1)
            .or_else(|| caps.get(2))
            .map(|m| m.as_str().to_string())
            .unwrap_or_default();
        args.push(arg);
        format!("{{{}}}", args.len() - 1)
    });
    (template.into_owned(), args)
}

/// Put quoted arguments back (without their quotes)
fn restore(fragment: &str, args: &[String]) -> String {
    // Sentence punctuation belongs to the template, never to a quoted value
    let fragment = fragment.trim().trim_end_matches(['.', '!', ',']).trim_end();
    PLACEHOLDER
        .replace_all(fragment, |caps: &Captures| {
            caps[1]
                .parse::<usize>()
                .ok()
                .and_then(|i| args.get(i))
                .cloned()
                .unwrap_or_default()
        })
        .into_owned()
}

/// First quoted argument referenced in a template fragment
fn first_arg(fragment: &str, args: &[String]) -> Option<String> {
    PLACEHOLDER
        .captures(fragment)
        .and_then(|caps| caps[1].parse::<usize>().ok())
        .and_then(|i| args.get(i))
        .cloned()
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() { None } else { Some(s) }
}

/// Build a step, extracting action, element description and quoted value
pub fn parse_step(keyword: StepKeyword, text: &str, line: usize) -> Step {
    let (template, args) = lift_quotes(text);
    let (action, element, value) = match_action(&template, &args);

    let (action, element) = match action {
        Some(action) => (Some(action), element),
        None => (None, args.first().cloned().and_then(non_empty)),
    };

    Step {
        keyword,
        text: text.to_string(),
        action,
        element,
        value,
        line,
    }
}

type Extracted = (Option<StepAction>, Option<String>, Option<String>);

fn match_action(template: &str, args: &[String]) -> Extracted {
    let subjectless = SUBJECT.replace(template.trim(), "");
    let core = AUXILIARY.replace(&subjectless, "");
    let core = core.trim();

    let capture = |caps: &Captures, i: usize| caps.get(i).map(|m| m.as_str().to_string());
    let element = |fragment: Option<String>| fragment.map(|f| restore(&f, args)).and_then(non_empty);
    let value = |fragment: Option<String>| fragment.map(|f| restore(&f, args)).and_then(non_empty);

    if let Some(caps) = CLICK.captures(core) {
        return (Some(StepAction::Click), element(capture(&caps, 1)), None);
    }
    if let Some(caps) = FILL_WITH.captures(core) {
        return (
            Some(StepAction::Type),
            element(capture(&caps, 1)),
            value(capture(&caps, 2)),
        );
    }
    if let Some(caps) = TYPE.captures(core) {
        return (
            Some(StepAction::Type),
            element(capture(&caps, 2)),
            value(capture(&caps, 1)),
        );
    }
    if let Some(caps) = SELECT.captures(core) {
        return (
            Some(StepAction::Select),
            element(capture(&caps, 2)),
            value(capture(&caps, 1)),
        );
    }
    if let Some(caps) = CLEAR.captures(core) {
        return (Some(StepAction::Clear), element(capture(&caps, 1)), None);
    }
    if let Some(caps) = UNCHECK.captures(core) {
        return (Some(StepAction::Uncheck), element(capture(&caps, 1)), None);
    }
    if let Some(caps) = VERIFY.captures(core) {
        let fragment = capture(&caps, 1).unwrap_or_default();
        let expected = first_arg(&fragment, args).or_else(|| non_empty(restore(&fragment, args)));
        return (Some(StepAction::Verify), element(Some(fragment)), expected);
    }
    if let Some(caps) = VISIBLE.captures(core) {
        let fragment = capture(&caps, 1).unwrap_or_default();
        return (Some(StepAction::Verify), element(Some(fragment)), None);
    }
    if let Some(caps) = CHECK.captures(core) {
        return (Some(StepAction::Check), element(capture(&caps, 1)), None);
    }
    if let Some(caps) = HOVER.captures(core) {
        return (Some(StepAction::Hover), element(capture(&caps, 1)), None);
    }
    if let Some(caps) = SCROLL.captures(core) {
        return (Some(StepAction::Scroll), element(capture(&caps, 1)), None);
    }
    if let Some(caps) = NAVIGATE.captures(core) {
        let fragment = capture(&caps, 1).unwrap_or_default();
        let url = first_arg(&fragment, args);
        return (Some(StepAction::Navigate), element(Some(fragment)), url);
    }
    if let Some(caps) = WAIT_SECONDS.captures(core) {
        return (Some(StepAction::Wait), None, value(capture(&caps, 1)));
    }
    if let Some(caps) = WAIT.captures(core) {
        return (Some(StepAction::Wait), element(capture(&caps, 1)), None);
    }

    (None, None, None)
}

#[cfg(test)]
#[path = "feature_test.rs"]
mod feature_test;
