//! JavaScript/TypeScript-specific taint tracking.
//!
//! Constructs that do not exist in other languages: object destructuring,
//! rest/spread targets, bracket-notation access, array higher-order methods,
//! and taint-preserving type conversions. All checks run over the indexed
//! assignment expressions, never over source text.

use seep_core::errors::StoreError;
use seep_core::types::collections::FxHashSet;

use crate::index::TaintIndex;
use crate::types::SourceOccurrence;

use super::TaintedElement;

/// Array methods whose callbacks receive tainted elements.
const ARRAY_METHODS: &[&str] = &[
    "map",
    "filter",
    "forEach",
    "reduce",
    "find",
    "findIndex",
    "some",
    "every",
    "flatMap",
    "reduceRight",
];

/// Conversions that propagate taint from argument to result.
const TYPE_CONVERTERS: &[&str] = &[
    "parseInt",
    "parseFloat",
    "Number",
    "String",
    "JSON.parse",
    "JSON.stringify",
    "atob",
    "btoa",
    "encodeURIComponent",
    "decodeURIComponent",
    "encodeURI",
    "decodeURI",
];

/// Apply every JavaScript-specific pass to the tainted set.
pub fn enhance<I: TaintIndex>(
    index: &I,
    source: &SourceOccurrence,
    tainted: &mut FxHashSet<TaintedElement>,
) -> Result<(), StoreError> {
    let assignments = index.assignments_in_file(&source.file)?;
    let pattern = source.pattern.as_str();

    // Destructuring: const { a, b: c } = req.body taints a and c; array
    // destructuring taints every element.
    for assignment in &assignments {
        if !assignment.source_expr.contains(pattern) {
            continue;
        }
        let target = assignment.target_var.as_str();
        if let Some(props) = between(target, '{', '}') {
            for prop in props.split(',') {
                let name = match prop.split_once(':') {
                    Some((_, renamed)) => renamed.trim(),
                    None => prop.trim(),
                };
                if is_identifier(name) {
                    tainted.insert(TaintedElement::new(&assignment.in_function, name));
                }
            }
        } else if let Some(elements) = between(target, '[', ']') {
            for element in elements.split(',') {
                let name = element.trim();
                if is_identifier(name) && name != "_" {
                    tainted.insert(TaintedElement::new(&assignment.in_function, name));
                }
            }
        }
    }

    // Rest/spread: const { ...rest } = req.body taints rest; spreading the
    // source into a new object taints the target.
    let spread_of_pattern = format!("...{pattern}");
    for assignment in &assignments {
        if assignment.source_expr.contains(pattern) && assignment.target_var.contains("...") {
            if let Some(rest) = assignment.target_var.split("...").nth(1) {
                let name: String = rest
                    .chars()
                    .take_while(|c| c.is_alphanumeric() || *c == '_')
                    .collect();
                if is_identifier(&name) {
                    tainted.insert(TaintedElement::new(&assignment.in_function, name));
                }
            }
        }
        if assignment.source_expr.contains(&spread_of_pattern) {
            tainted.insert(TaintedElement::new(&assignment.in_function, &assignment.target_var));
        }
    }

    // Bracket notation: req.query['key'] accesses contribute taint.
    let bracket = format!("{pattern}[");
    for assignment in &assignments {
        if assignment.source_expr.contains(&bracket) {
            tainted.insert(TaintedElement::new(&assignment.in_function, &assignment.target_var));
        }
    }

    // Per-variable passes over a snapshot; each pass may grow the set.
    let snapshot: Vec<TaintedElement> = tainted.iter().cloned().collect();
    for element in snapshot {
        let var = element.var.as_str();

        // Array operations: tainted.map(x => ...) and tainted[0].
        for assignment in &assignments {
            let expr = assignment.source_expr.as_str();
            let from_method = ARRAY_METHODS
                .iter()
                .any(|m| expr.starts_with(&format!("{var}.{m}")));
            let from_indexing = expr.starts_with(&format!("{var}["));
            if from_method || from_indexing {
                tainted.insert(TaintedElement::new(&assignment.in_function, &assignment.target_var));
            }
        }

        // Type conversions: parseInt(tainted), String(tainted), toString.
        for assignment in &assignments {
            let expr = assignment.source_expr.as_str();
            let converts = TYPE_CONVERTERS
                .iter()
                .any(|c| expr.contains(c) && expr.contains(var));
            if converts || expr.starts_with(&format!("{var}.toString")) {
                tainted.insert(TaintedElement::new(&assignment.in_function, &assignment.target_var));
            }
        }
    }

    Ok(())
}

fn between(text: &str, open: char, close: char) -> Option<&str> {
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    (end > start).then(|| &text[start + 1..end])
}

fn is_identifier(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with("...")
        && name
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '$')
        && !name.chars().next().is_some_and(|c| c.is_ascii_digit())
}
