// Unit tests for the feature parser

use super::*;
use pretty_assertions::assert_eq;

const LOGIN_FEATURE: &str = r#"
@auth
Feature: User login
  As a registered user
  I want to sign in

  Background:
    Given I am on "https://example.com/login"

  @smoke
  Scenario: Successful login
    When I enter "john.doe" into the "Username" field
    And I type "S3cret!" into the "Password" field
    And I click on the "Login" button
    Then I should see "Welcome back"

  # trailing comment
  Scenario: Remember me
    When I check the "Remember me" checkbox
    And I click the "Login" button
"#;

fn step(text: &str) -> Step {
    parse_step(StepKeyword::When, text, 1)
}

#[test]
fn test_parse_scenarios_and_background() {
    let feature = parse_feature(LOGIN_FEATURE);

    assert_eq!(feature.name, "User login");
    assert_eq!(feature.tags, vec!["@auth".to_string()]);
    assert_eq!(feature.scenarios.len(), 2);

    let first = &feature.scenarios[0];
    assert_eq!(first.name, "Successful login");
    assert_eq!(first.tags, vec!["@auth".to_string(), "@smoke".to_string()]);
    assert_eq!(first.background.len(), 1);
    assert_eq!(first.steps.len(), 4);
    assert_eq!(first.steps[0].keyword, StepKeyword::When);
    assert_eq!(first.steps[1].keyword, StepKeyword::And);
    assert_eq!(first.steps[3].keyword, StepKeyword::Then);

    let second = &feature.scenarios[1];
    assert_eq!(second.tags, vec!["@auth".to_string()]);
    assert_eq!(second.background, first.background);
}

#[test]
fn test_background_navigate_step() {
    let feature = parse_feature(LOGIN_FEATURE);
    let nav = &feature.scenarios[0].background[0];

    assert_eq!(nav.action, Some(StepAction::Navigate));
    assert_eq!(nav.value.as_deref(), Some("https://example.com/login"));
    assert_eq!(nav.text, r#"I am on "https://example.com/login""#);
}

#[test]
fn test_type_step_preserves_case() {
    let s = step(r#"I type "S3cret!" into the "Password" field"#);
    assert_eq!(s.action, Some(StepAction::Type));
    assert_eq!(s.value.as_deref(), Some("S3cret!"));
    assert_eq!(s.element.as_deref(), Some("Password field"));
}

#[test]
fn test_fill_in_with_step() {
    let s = step(r#"I fill in the "Email" field with "a@b.c""#);
    assert_eq!(s.action, Some(StepAction::Type));
    assert_eq!(s.element.as_deref(), Some("Email field"));
    assert_eq!(s.value.as_deref(), Some("a@b.c"));
}

#[test]
fn test_click_step() {
    let s = step(r#"I click on the "Login" button"#);
    assert_eq!(s.action, Some(StepAction::Click));
    assert_eq!(s.element.as_deref(), Some("Login button"));
    assert_eq!(s.value, None);

    let s = step("the user presses the submit button.");
    assert_eq!(s.action, Some(StepAction::Click));
    assert_eq!(s.element.as_deref(), Some("submit button"));
}

#[test]
fn test_select_step() {
    let s = step(r#"I select "Canada" from the "Country" dropdown"#);
    assert_eq!(s.action, Some(StepAction::Select));
    assert_eq!(s.value.as_deref(), Some("Canada"));
    assert_eq!(s.element.as_deref(), Some("Country dropdown"));
}

#[test]
fn test_verify_steps() {
    let s = step(r#"I should see "Welcome back""#);
    assert_eq!(s.action, Some(StepAction::Verify));
    assert_eq!(s.value.as_deref(), Some("Welcome back"));

    let s = step("I should see the order summary");
    assert_eq!(s.action, Some(StepAction::Verify));
    assert_eq!(s.element.as_deref(), Some("order summary"));
    assert_eq!(s.value.as_deref(), Some("order summary"));

    let s = step(r#"the "Dashboard" heading should be visible"#);
    assert_eq!(s.action, Some(StepAction::Verify));
    assert_eq!(s.element.as_deref(), Some("Dashboard heading"));
    assert_eq!(s.value, None);
}

#[test]
fn test_quoted_values_keep_trailing_punctuation() {
    let s = step(r#"I type "Hello, world." into the "Message" field"#);
    assert_eq!(s.value.as_deref(), Some("Hello, world."));
    assert_eq!(s.element.as_deref(), Some("Message field"));

    let s = step(r#"I select "Yes!" from the "Answer" dropdown."#);
    assert_eq!(s.value.as_deref(), Some("Yes!"));
    assert_eq!(s.element.as_deref(), Some("Answer dropdown"));

    let s = step(r#"I should see "Thanks, see you soon.""#);
    assert_eq!(s.value.as_deref(), Some("Thanks, see you soon."));
}

#[test]
fn test_check_and_uncheck_are_distinct() {
    let s = step(r#"I check the "Remember me" checkbox"#);
    assert_eq!(s.action, Some(StepAction::Check));
    assert_eq!(s.element.as_deref(), Some("Remember me checkbox"));

    let s = step(r#"I uncheck the "Newsletter" checkbox"#);
    assert_eq!(s.action, Some(StepAction::Uncheck));
    assert_eq!(s.element.as_deref(), Some("Newsletter checkbox"));

    // "check that" asserts instead of ticking a box
    let s = step(r#"I check that "Saved" is shown"#);
    assert_eq!(s.action, Some(StepAction::Verify));
    assert_eq!(s.value.as_deref(), Some("Saved"));
}

#[test]
fn test_hover_scroll_clear_steps() {
    assert_eq!(
        step("I hover over the profile menu").action,
        Some(StepAction::Hover)
    );
    let s = step("I scroll down to the footer");
    assert_eq!(s.action, Some(StepAction::Scroll));
    assert_eq!(s.element.as_deref(), Some("footer"));
    let s = step(r#"I clear the "Search" box"#);
    assert_eq!(s.action, Some(StepAction::Clear));
    assert_eq!(s.element.as_deref(), Some("Search box"));
}

#[test]
fn test_wait_steps() {
    let s = step("I wait for 2 seconds");
    assert_eq!(s.action, Some(StepAction::Wait));
    assert_eq!(s.value.as_deref(), Some("2"));
    assert_eq!(s.element, None);

    let s = step("I wait for the results table");
    assert_eq!(s.action, Some(StepAction::Wait));
    assert_eq!(s.element.as_deref(), Some("results table"));

    let s = step("I wait");
    assert_eq!(s.action, Some(StepAction::Wait));
    assert_eq!(s.element, None);
}

#[test]
fn test_navigate_without_url() {
    let s = step("I navigate to the settings page");
    assert_eq!(s.action, Some(StepAction::Navigate));
    assert_eq!(s.element.as_deref(), Some("settings page"));
    assert_eq!(s.value, None);
}

#[test]
fn test_unknown_step_keeps_first_quoted_arg() {
    let s = step(r#"the "Cart" badge shows 3 items"#);
    assert_eq!(s.action, None);
    assert_eq!(s.element.as_deref(), Some("Cart"));

    let s = step("something entirely different");
    assert_eq!(s.action, None);
    assert_eq!(s.element, None);
}

#[test]
fn test_apostrophes_are_not_quotes() {
    let s = step("I click the user's avatar");
    assert_eq!(s.action, Some(StepAction::Click));
    assert_eq!(s.element.as_deref(), Some("user's avatar"));

    let s = step("I type 'hello' into the search box");
    assert_eq!(s.value.as_deref(), Some("hello"));
    assert_eq!(s.element.as_deref(), Some("search box"));
}

#[test]
fn test_scenario_outline_expansion() {
    let content = r#"
Feature: Search
  Scenario Outline: Search for <term>
    Given I am on "https://example.com"
    When I type "<term>" into the search box
    Then I should see "<result>"

    Examples:
      | term  | result        |
      | rust  | Rust language |
      | cargo | Cargo book    |
"#;
    let feature = parse_feature(content);
    assert_eq!(feature.scenarios.len(), 2);
    assert_eq!(feature.scenarios[0].name, "Search for <term> (example 1)");
    assert_eq!(feature.scenarios[1].name, "Search for <term> (example 2)");
    assert_eq!(
        feature.scenarios[1].steps[1].value.as_deref(),
        Some("cargo")
    );
    assert_eq!(
        feature.scenarios[1].steps[2].value.as_deref(),
        Some("Cargo book")
    );
}

#[test]
fn test_outline_without_examples_runs_once() {
    let content = "Feature: x\nScenario Outline: plain\n  Given I wait\n";
    let feature = parse_feature(content);
    assert_eq!(feature.scenarios.len(), 1);
    assert_eq!(feature.scenarios[0].name, "plain");
}

#[test]
fn test_empty_scenarios_are_dropped() {
    let content = "Feature: x\nScenario: empty\nScenario: full\n  * I wait\n";
    let feature = parse_feature(content);
    assert_eq!(feature.scenarios.len(), 1);
    assert_eq!(feature.scenarios[0].name, "full");
    assert_eq!(feature.scenarios[0].steps[0].keyword, StepKeyword::Star);
}

#[test]
fn test_doc_strings_and_tables_are_skipped() {
    let content = r#"
Feature: x
  Scenario: doc
    Given I am on "https://example.com"
    """
    When I click the ghost button
    """
    And I wait
      | a | b |
"#;
    let feature = parse_feature(content);
    assert_eq!(feature.scenarios[0].steps.len(), 2);
}

#[test]
fn test_step_keyword_needs_word_boundary() {
    let content = "Feature: x\nScenario: s\n  Andrew clicks things\n  And I wait\n";
    let feature = parse_feature(content);
    assert_eq!(feature.scenarios[0].steps.len(), 1);
}

#[test]
fn test_elements_and_action_summary() {
    let feature = parse_feature(LOGIN_FEATURE);

    assert_eq!(
        feature.elements(),
        vec![
            "https://example.com/login".to_string(),
            "Username field".to_string(),
            "Password field".to_string(),
            "Login button".to_string(),
            "Welcome back".to_string(),
            "Remember me checkbox".to_string(),
        ]
    );

    let summary = feature.action_summary();
    assert_eq!(summary[&StepAction::Navigate], 2);
    assert_eq!(summary[&StepAction::Type], 2);
    assert_eq!(summary[&StepAction::Click], 2);
    assert_eq!(summary[&StepAction::Verify], 1);
    assert_eq!(summary[&StepAction::Check], 1);
}

#[test]
fn test_filter_tags() {
    let mut feature = parse_feature(LOGIN_FEATURE);
    feature.filter_tags(&["smoke".to_string()]);
    assert_eq!(feature.scenarios.len(), 1);
    assert_eq!(feature.scenarios[0].name, "Successful login");

    let mut feature = parse_feature(LOGIN_FEATURE);
    feature.filter_tags(&[]);
    assert_eq!(feature.scenarios.len(), 2);
}

#[test]
fn test_parse_missing_file() {
    let err = parse_feature_file(Path::new("/nonexistent/login.feature")).unwrap_err();
    assert!(err.to_string().contains("Feature file not found"));
}

#[test]
fn test_parse_feature_file_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("login.feature");
    std::fs::write(&path, LOGIN_FEATURE).unwrap();

    let feature = parse_feature_file(&path).unwrap();
    assert_eq!(feature.scenarios.len(), 2);
}
