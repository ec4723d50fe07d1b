//! Heuristic XPath candidates for common UI phrasings
//!
//! Given a description such as `Login button` or `Email field` this produces
//! an ordered list of XPath expressions worth trying before asking an LLM.

use lazy_static::lazy_static;
use regex::Regex;

use crate::types::Selector;

/// Quote a string as an XPath literal.
///
/// XPath 1.0 has no escape sequences, so strings containing both quote kinds
/// are built with `concat()`.
pub fn xpath_literal(s: &str) -> String {
    if !s.contains('\'') {
        return format!("'{}'", s);
    }
    if !s.contains('"') {
        return format!("\"{}\"", s);
    }

    let parts: Vec<String> = s
        .split('\'')
        .map(|part| format!("'{}'", part))
        .collect();
    format!("concat({})", parts.join(", \"'\", "))
}

/// Selector for an element whose own text contains `text`
///
/// Text inside `<head>`, `<script>` and `<style>` is never rendered, so it is skipped.
pub fn text_selector(text: &str) -> Selector {
    let lit = xpath_literal(text.trim());
    Selector::xpath(format!(
        "//*[contains(normalize-space(.), {lit}) and not(*[contains(normalize-space(.), {lit})]) \
         and not(ancestor-or-self::head or ancestor-or-self::script or ancestor-or-self::style)]"
    ))
}

lazy_static! {
    static ref BUTTON: Regex = Regex::new(r"(?i)\bbutton\b").expect("valid regex");
    static ref LINK: Regex = Regex::new(r"(?i)\blink\b").expect("valid regex");
    static ref INPUT: Regex =
        Regex::new(r"(?i)\b(?:input|field|textbox|text box|box|textarea)\b").expect("valid regex");
    static ref DROPDOWN: Regex =
        Regex::new(r"(?i)\b(?:dropdown|drop-down|select|list|menu)\b").expect("valid regex");
    static ref CHECKBOX: Regex =
        Regex::new(r"(?i)\b(?:checkbox|check box|radio button|radio)\b").expect("valid regex");
    static ref LEADING_ARTICLE: Regex = Regex::new(r"(?i)^(?:the|a|an)\s+").expect("valid regex");
    static ref SPACES: Regex = Regex::new(r"\s+").expect("valid regex");
}

/// Remove a keyword from the description, leaving the visible label
fn strip_keyword(description: &str, keyword: &Regex) -> String {
    let stripped = keyword.replace_all(description, " ");
    SPACES.replace_all(stripped.trim(), " ").into_owned()
}

/// Lowercase identifier-style variants (`First name` -> `first_name`, `first-name`, `firstname`)
fn identifier_variants(label: &str) -> Vec<String> {
    let lower = label.to_lowercase();
    let words: Vec<&str> = lower.split_whitespace().collect();
    let mut variants = vec![lower.clone()];
    if words.len() > 1 {
        variants.push(words.join("_"));
        variants.push(words.join("-"));
        variants.push(words.concat());
    }
    variants
}

fn button_candidates(label: &str, out: &mut Vec<String>) {
    let lit = xpath_literal(label);
    out.push(format!("//button[normalize-space(.)={lit}]"));
    out.push(format!("//button[contains(normalize-space(.), {lit})]"));
    out.push(format!("//input[@type='button' and @value={lit}]"));
    out.push(format!("//input[@type='submit' and @value={lit}]"));
    out.push(format!("//*[@role='button' and contains(normalize-space(.), {lit})]"));
    out.push(format!("//button[@aria-label={lit}]"));
}

fn link_candidates(label: &str, out: &mut Vec<String>) {
    let lit = xpath_literal(label);
    out.push(format!("//a[normalize-space(.)={lit}]"));
    out.push(format!("//a[contains(normalize-space(.), {lit})]"));
}

fn input_candidates(label: &str, out: &mut Vec<String>) {
    let lit = xpath_literal(label);
    out.push(format!("//input[@placeholder={lit}]"));
    out.push(format!("//textarea[@placeholder={lit}]"));
    out.push(format!("//input[@id=//label[normalize-space(.)={lit}]/@for]"));
    out.push(format!("//textarea[@id=//label[normalize-space(.)={lit}]/@for]"));
    out.push(format!("//label[contains(normalize-space(.), {lit})]//input"));
    out.push(format!("//input[@aria-label={lit}]"));
    for ident in identifier_variants(label) {
        let ident = xpath_literal(&ident);
        out.push(format!("//input[@name={ident}]"));
        out.push(format!("//input[@id={ident}]"));
        out.push(format!("//textarea[@name={ident}]"));
    }
}

fn dropdown_candidates(label: &str, out: &mut Vec<String>) {
    let lit = xpath_literal(label);
    out.push(format!("//select[@id=//label[normalize-space(.)={lit}]/@for]"));
    out.push(format!("//label[contains(normalize-space(.), {lit})]//select"));
    out.push(format!("//select[@aria-label={lit}]"));
    for ident in identifier_variants(label) {
        let ident = xpath_literal(&ident);
        out.push(format!("//select[@name={ident}]"));
        out.push(format!("//select[@id={ident}]"));
    }
}

fn checkbox_candidates(label: &str, out: &mut Vec<String>) {
    let lit = xpath_literal(label);
    out.push(format!(
        "//input[(@type='checkbox' or @type='radio') and @id=//label[normalize-space(.)={lit}]/@for]"
    ));
    out.push(format!(
        "//label[contains(normalize-space(.), {lit})]//input[@type='checkbox' or @type='radio']"
    ));
    for ident in identifier_variants(label) {
        let ident = xpath_literal(&ident);
        out.push(format!(
            "//input[(@type='checkbox' or @type='radio') and (@name={ident} or @id={ident})]"
        ));
    }
}

/// Ordered, deduplicated XPath candidates for an element description
pub fn candidates(description: &str) -> Vec<Selector> {
    let text = LEADING_ARTICLE.replace(description.trim(), "").into_owned();
    if text.is_empty() {
        return Vec::new();
    }

    let mut out = Vec::new();
    let label_for = |group: &Regex| Some(strip_keyword(&text, group)).filter(|l| !l.is_empty());

    // Checkbox goes first so "Remember me checkbox" does not match "box" as an input
    if CHECKBOX.is_match(&text) {
        if let Some(label) = label_for(&*CHECKBOX) {
            checkbox_candidates(&label, &mut out);
        }
    } else {
        if let Some(label) = INPUT.is_match(&text).then(|| label_for(&*INPUT)).flatten() {
            input_candidates(&label, &mut out);
        }
        if let Some(label) = BUTTON.is_match(&text).then(|| label_for(&*BUTTON)).flatten() {
            button_candidates(&label, &mut out);
        }
    }
    if let Some(label) = LINK.is_match(&text).then(|| label_for(&*LINK)).flatten() {
        link_candidates(&label, &mut out);
    }
    if let Some(label) = DROPDOWN.is_match(&text).then(|| label_for(&*DROPDOWN)).flatten() {
        dropdown_candidates(&label, &mut out);
    }

    // Generic text search, by label first then by the whole phrase
    for group in [&*CHECKBOX, &*INPUT, &*BUTTON, &*LINK, &*DROPDOWN] {
        if group.is_match(&text)
            && let Some(label) = label_for(group)
        {
            out.push(format!("//*[contains(text(), {})]", xpath_literal(&label)));
        }
    }
    out.push(format!("//*[contains(text(), {})]", xpath_literal(&text)));

    let mut seen = Vec::with_capacity(out.len());
    for xpath in out {
        if !seen.contains(&xpath) {
            seen.push(xpath);
        }
    }
    seen.into_iter().map(Selector::xpath).collect()
}

#[cfg(test)]
#[path = "xpath_test.rs"]
mod xpath_test;
