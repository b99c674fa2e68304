//! Native filter evaluation
//!
//! Evaluates the filter documents produced by the query compiler against
//! stored JSON documents. Dotted paths descend through embedded objects and
//! fan out over arrays, so `versions.type` matches when any version has the
//! requested type.

use regex::RegexBuilder;
use serde_json::{Map, Value};
use std::cmp::Ordering;

/// Returns `true` when `doc` satisfies every condition in `filter`.
pub fn matches(doc: &Map<String, Value>, filter: &Map<String, Value>) -> bool {
    filter.iter().all(|(key, condition)| match key.as_str() {
        "$and" => sub_filters(condition).is_some_and(|fs| fs.iter().all(|f| matches(doc, f))),
        "$or" => sub_filters(condition).is_some_and(|fs| fs.iter().any(|f| matches(doc, f))),
        "$nor" => sub_filters(condition).is_some_and(|fs| !fs.iter().any(|f| matches(doc, f))),
        "$not" => sub_filters(condition).is_some_and(|fs| !fs.iter().all(|f| matches(doc, f))),
        path => field_matches(&resolve(doc, path), condition),
    })
}

fn sub_filters(condition: &Value) -> Option<Vec<&Map<String, Value>>> {
    condition
        .as_array()?
        .iter()
        .map(Value::as_object)
        .collect::<Option<Vec<_>>>()
}

/// Collects every value reachable at a dotted `path`.
pub fn resolve<'a>(doc: &'a Map<String, Value>, path: &str) -> Vec<&'a Value> {
    let segments: Vec<&str> = path.split('.').collect();
    let mut found = Vec::new();
    if let Some((head, rest)) = segments.split_first() {
        if let Some(value) = doc.get(*head) {
            descend(value, rest, &mut found);
        }
    }
    found
}

fn descend<'a>(value: &'a Value, segments: &[&str], found: &mut Vec<&'a Value>) {
    let Some((head, rest)) = segments.split_first() else {
        found.push(value);
        return;
    };

    match value {
        Value::Object(map) => {
            if let Some(next) = map.get(*head) {
                descend(next, rest, found);
            }
        }
        Value::Array(items) => {
            if let Ok(index) = head.parse::<usize>() {
                if let Some(next) = items.get(index) {
                    descend(next, rest, found);
                }
                return;
            }
            for item in items.iter().filter(|item| item.is_object()) {
                descend(item, segments, found);
            }
        }
        _ => {}
    }
}

fn is_operator_document(condition: &Value) -> bool {
    condition
        .as_object()
        .is_some_and(|map| !map.is_empty() && map.keys().all(|k| k.starts_with('$')))
}

fn field_matches(candidates: &[&Value], condition: &Value) -> bool {
    if !is_operator_document(condition) {
        return equals_any(candidates, condition);
    }

    let Some(operators) = condition.as_object() else {
        return false;
    };

    operators.iter().all(|(operator, operand)| match operator.as_str() {
        "$eq" => equals_any(candidates, operand),
        "$ne" => !equals_any(candidates, operand),
        "$lt" => compares_any(candidates, operand, |o| o == Ordering::Less),
        "$lte" => compares_any(candidates, operand, |o| o != Ordering::Greater),
        "$gt" => compares_any(candidates, operand, |o| o == Ordering::Greater),
        "$gte" => compares_any(candidates, operand, |o| o != Ordering::Less),
        "$exists" => operand.as_bool().unwrap_or(true) == !candidates.is_empty(),
        "$in" => operand
            .as_array()
            .is_some_and(|options| options.iter().any(|o| equals_any(candidates, o))),
        "$nin" => operand
            .as_array()
            .is_some_and(|options| !options.iter().any(|o| equals_any(candidates, o))),
        "$all" => operand
            .as_array()
            .is_some_and(|required| required.iter().all(|r| equals_any(candidates, r))),
        "$regex" => {
            let options = operators
                .get("$options")
                .and_then(Value::as_str)
                .unwrap_or("");
            regex_any(candidates, operand, options)
        }
        "$options" => true,
        "$not" => !field_matches(candidates, operand),
        other => {
            tracing::debug!("Unsupported filter operator '{}'", other);
            false
        }
    })
}

/// Array-valued fields match when the whole array or any element equals.
fn equals_any(candidates: &[&Value], expected: &Value) -> bool {
    if candidates.is_empty() {
        return expected.is_null();
    }

    candidates.iter().any(|candidate| {
        *candidate == expected
            || candidate
                .as_array()
                .is_some_and(|items| items.iter().any(|item| item == expected))
    })
}

fn compares_any(candidates: &[&Value], operand: &Value, accept: impl Fn(Ordering) -> bool) -> bool {
    candidates
        .iter()
        .flat_map(|candidate| match candidate {
            Value::Array(items) => items.iter().collect::<Vec<_>>(),
            scalar => vec![*scalar],
        })
        .any(|value| compare_same_type(value, operand).is_some_and(&accept))
}

fn compare_same_type(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

fn regex_any(candidates: &[&Value], pattern: &Value, options: &str) -> bool {
    let Some(pattern) = pattern.as_str() else {
        return false;
    };

    let regex = match RegexBuilder::new(pattern)
        .case_insensitive(options.contains('i'))
        .multi_line(options.contains('m'))
        .build()
    {
        Ok(regex) => regex,
        Err(e) => {
            tracing::debug!("Invalid pattern '{}': {}", pattern, e);
            return false;
        }
    };

    candidates.iter().any(|candidate| match candidate {
        Value::String(s) => regex.is_match(s),
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .any(|s| regex.is_match(s)),
        _ => false,
    })
}

/// Total order used for sorting: missing/null < numbers < strings <
/// objects < arrays < booleans.
pub fn sort_order(left: Option<&Value>, right: Option<&Value>) -> Ordering {
    fn rank(value: Option<&Value>) -> u8 {
        match value {
            None | Some(Value::Null) => 0,
            Some(Value::Number(_)) => 1,
            Some(Value::String(_)) => 2,
            Some(Value::Object(_)) => 3,
            Some(Value::Array(_)) => 4,
            Some(Value::Bool(_)) => 5,
        }
    }

    match (left, right) {
        (Some(a), Some(b)) => compare_same_type(a, b).unwrap_or_else(|| rank(left).cmp(&rank(right))),
        _ => rank(left).cmp(&rank(right)),
    }
}
