use abgleich_core::{PatternKind, Rule};
use regex::{Regex, RegexBuilder};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuleError {
    #[error("Invalid pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },
}

/// A rule paired with its prebuilt matcher. Built once per classification
/// pass, never persisted.
#[derive(Debug)]
pub struct CompiledRule {
    pub rule: Rule,
    matcher: Regex,
}

impl CompiledRule {
    pub fn is_match(&self, text: &str) -> bool {
        self.matcher.is_match(text)
    }
}

/// Build the matcher for one rule. Exact and Substring kinds escape every
/// regex metacharacter in the user's text; Exact additionally anchors the
/// pattern to the whole field. FullRegex uses the text unmodified. All
/// matching is case-insensitive.
pub fn compile(rule: &Rule) -> Result<CompiledRule, RuleError> {
    let source = match rule.kind {
        PatternKind::Exact => format!("^{}$", regex::escape(&rule.pattern)),
        PatternKind::Substring => regex::escape(&rule.pattern),
        PatternKind::FullRegex => rule.pattern.clone(),
    };

    let matcher = RegexBuilder::new(&source)
        .case_insensitive(true)
        .build()
        .map_err(|e| RuleError::InvalidPattern {
            pattern: rule.pattern.clone(),
            message: e.to_string(),
        })?;

    Ok(CompiledRule { rule: rule.clone(), matcher })
}

/// Compile a whole ruleset, preserving the caller's order. All-or-nothing:
/// a single broken rule means no rules are returned, and every failure is
/// collected (not fail-fast) so the caller can report all broken rules in
/// one pass. Classification must never run on a silently thinned ruleset.
pub fn compile_all(rules: &[Rule]) -> Result<Vec<CompiledRule>, Vec<RuleError>> {
    let mut compiled = Vec::with_capacity(rules.len());
    let mut failures = Vec::new();

    for rule in rules {
        match compile(rule) {
            Ok(c) => compiled.push(c),
            Err(e) => failures.push(e),
        }
    }

    if failures.is_empty() {
        Ok(compiled)
    } else {
        Err(failures)
    }
}
