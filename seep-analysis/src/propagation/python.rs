//! Python-specific taint tracking.
//!
//! F-strings and %-formatting, comprehensions (including the loop
//! variable), tuple unpacking, `with ... as` bindings, taint-preserving
//! string methods, concatenation, and `except ... as` propagation. All
//! checks run over the indexed assignment expressions.

use seep_core::errors::StoreError;
use seep_core::types::collections::FxHashSet;

use crate::index::TaintIndex;
use crate::types::SourceOccurrence;

use super::TaintedElement;

/// String methods that propagate taint from receiver to result.
const STRING_METHODS: &[&str] = &[
    "split",
    "join",
    "replace",
    "strip",
    "lstrip",
    "rstrip",
    "upper",
    "lower",
    "capitalize",
    "title",
    "encode",
    "decode",
    "format",
    "center",
    "ljust",
    "rjust",
    "zfill",
    "partition",
    "rpartition",
    "splitlines",
    "translate",
    "swapcase",
];

/// Apply every Python-specific pass to the tainted set.
pub fn enhance<I: TaintIndex>(
    index: &I,
    source: &SourceOccurrence,
    tainted: &mut FxHashSet<TaintedElement>,
) -> Result<(), StoreError> {
    let assignments = index.assignments_in_file(&source.file)?;

    let snapshot: Vec<TaintedElement> = tainted.iter().cloned().collect();
    for element in snapshot {
        let var = element.var.as_str();

        for assignment in &assignments {
            let expr = assignment.source_expr.as_str();
            let target = TaintedElement::new(&assignment.in_function, &assignment.target_var);

            if !expr.contains(var) {
                continue;
            }

            // F-strings, str.format, and %-formatting taint their result.
            let formats = expr.starts_with("f\"")
                || expr.starts_with("f'")
                || expr.contains(".format(")
                || expr.contains('%');
            if formats {
                tainted.insert(target.clone());
            }

            // Comprehension results are tainted, and so is the loop
            // variable iterating the tainted source.
            let comprehension = (expr.starts_with('[') || expr.starts_with('{') || expr.starts_with('('))
                && expr.contains(" for ")
                && expr.contains(" in ");
            if comprehension {
                tainted.insert(target.clone());
                if let Some(loop_var) = comprehension_loop_var(expr) {
                    tainted.insert(TaintedElement::new(&assignment.in_function, loop_var));
                }
            }

            // Tuple unpacking: a, b, c = tainted.
            if expr == var && assignment.target_var.contains(',') {
                for part in assignment.target_var.split(',') {
                    let name = part.trim();
                    if is_identifier(name) {
                        tainted.insert(TaintedElement::new(&assignment.in_function, name));
                    }
                }
            }

            // with tainted_expr as x: binds x tainted.
            if expr.starts_with("with ") {
                if let Some(bound) = expr.split(" as ").nth(1) {
                    let name = bound.trim_end_matches(':').trim();
                    if is_identifier(name) {
                        tainted.insert(TaintedElement::new(&assignment.in_function, name));
                    }
                }
            }

            // String methods and concatenation propagate.
            let method_call = STRING_METHODS
                .iter()
                .any(|m| expr.starts_with(&format!("{var}.{m}")));
            let concatenation = expr.contains('+');
            let join = expr.contains(".join(");
            if method_call || concatenation || join {
                tainted.insert(target.clone());
            }
        }

        // except X as e: propagates when the protected block references the
        // tainted variable above the handler.
        for assignment in &assignments {
            let expr = assignment.source_expr.as_str();
            if !expr.starts_with("except") || !expr.contains(" as ") {
                continue;
            }
            let referenced_before = assignments.iter().any(|a| {
                a.line < assignment.line
                    && (a.target_var == var || a.source_expr.contains(var))
            });
            if referenced_before {
                if let Some(bound) = expr.split(" as ").nth(1) {
                    let name = bound.trim_end_matches(':').trim();
                    if is_identifier(name) {
                        tainted.insert(TaintedElement::new(&assignment.in_function, name));
                    }
                }
            }
        }
    }

    Ok(())
}

/// The loop variable of a comprehension: the identifier between ` for ` and
/// ` in `.
fn comprehension_loop_var(expr: &str) -> Option<&str> {
    let after_for = expr.split(" for ").nth(1)?;
    let loop_part = after_for.split(" in ").next()?.trim();
    is_identifier(loop_part).then_some(loop_part)
}

fn is_identifier(name: &str) -> bool {
    !name.is_empty()
        && name.chars().all(|c| c.is_alphanumeric() || c == '_')
        && !name.chars().next().is_some_and(|c| c.is_ascii_digit())
}
