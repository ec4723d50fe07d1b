use anyhow::Result;
use serde_json::json;
use std::path::Path;

use cukeprobe::{Feature, OutputFormat, parse_feature_file};

use super::print_json;

pub fn handle_parse(feature: &Path, tags: &[String], format: OutputFormat) -> Result<()> {
    let mut parsed = parse_feature_file(feature)?;
    parsed.filter_tags(tags);

    match format {
        OutputFormat::Json => print_json(&parse_summary(&parsed)),
        OutputFormat::Simple => {
            print_simple(&parsed);
            Ok(())
        }
    }
}

/// JSON view: scenarios plus unique elements and action counts
pub fn parse_summary(feature: &Feature) -> serde_json::Value {
    let actions: serde_json::Map<String, serde_json::Value> = feature
        .action_summary()
        .into_iter()
        .map(|(action, count)| (action.to_string(), json!(count)))
        .collect();

    json!({
        "feature": feature.name,
        "tags": feature.tags,
        "scenario_count": feature.scenarios.len(),
        "scenarios": feature.scenarios,
        "elements": feature.elements(),
        "actions": actions,
    })
}

fn print_simple(feature: &Feature) {
    println!("Feature: {}", feature.name);
    for scenario in &feature.scenarios {
        println!();
        if scenario.tags.is_empty() {
            println!("  Scenario: {}", scenario.name);
        } else {
            println!("  Scenario: {} {}", scenario.name, scenario.tags.join(" "));
        }
        for step in scenario.background.iter().chain(&scenario.steps) {
            let action = step
                .action
                .map(|a| a.to_string())
                .unwrap_or_else(|| "?".to_string());
            let mut line = format!("    [{:>8}] {} {}", action, step.keyword.as_str(), step.text);
            if let Some(element) = &step.element {
                line.push_str(&format!(" -> element: {element}"));
            }
            if let Some(value) = &step.value {
                line.push_str(&format!(", value: {value}"));
            }
            println!("{line}");
        }
    }

    let elements = feature.elements();
    println!();
    println!("Unique elements ({}):", elements.len());
    for element in elements {
        println!("  - {element}");
    }

    println!("Actions:");
    for (action, count) in feature.action_summary() {
        println!("  {action}: {count}");
    }
}
