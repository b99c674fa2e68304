//! Filter DSL compiler
//!
//! Compiles a list of `{field, action, value}` clauses into a native store
//! filter. Compilation is a fold: every clause yields a [`Fragment`] and the
//! fragments are merged into one document, in clause order.
//!
//! Merge rules:
//! - a field fragment is stored under its field name; a later clause on the
//!   same field overwrites the earlier one (last write wins)
//! - a boolean composition with an explicit clause list is stored under its
//!   reserved key (`$and`, `$or`, `$nor`, `$not`)
//! - a boolean composition without a value wraps everything compiled so far:
//!   the accumulator becomes `{"$op": [accumulator]}`
//!
//! Unknown actions, non-sequence values for sequence operators and boolean
//! actions with a non-empty field compile to nothing.

use serde_json::{json, Value};

use super::{Document, FilterClause};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Equals,
    NotEquals,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    Like,
    Exists,
    NotExists,
    In,
    NotIn,
    All,
    And,
    Or,
    Nor,
    Not,
}

impl Operator {
    /// Looks up a DSL action name in the operator table.
    pub fn from_action(action: &str) -> Option<Self> {
        match action {
            "=" | "equals" => Some(Self::Equals),
            "!=" | "not-equals" => Some(Self::NotEquals),
            "<" => Some(Self::LessThan),
            "<=" => Some(Self::LessThanOrEqual),
            ">" => Some(Self::GreaterThan),
            ">=" => Some(Self::GreaterThanOrEqual),
            "like" => Some(Self::Like),
            "exists" => Some(Self::Exists),
            "nexists" => Some(Self::NotExists),
            "in" => Some(Self::In),
            "not in" => Some(Self::NotIn),
            "all" => Some(Self::All),
            "and" => Some(Self::And),
            "or" => Some(Self::Or),
            "nor" => Some(Self::Nor),
            "not" => Some(Self::Not),
            _ => None,
        }
    }

    /// Native operator key, `None` for plain equality.
    pub fn native_key(self) -> Option<&'static str> {
        match self {
            Self::Equals => None,
            Self::NotEquals => Some("$ne"),
            Self::LessThan => Some("$lt"),
            Self::LessThanOrEqual => Some("$lte"),
            Self::GreaterThan => Some("$gt"),
            Self::GreaterThanOrEqual => Some("$gte"),
            Self::Like => Some("$regex"),
            Self::Exists | Self::NotExists => Some("$exists"),
            Self::In => Some("$in"),
            Self::NotIn => Some("$nin"),
            Self::All => Some("$all"),
            Self::And => Some("$and"),
            Self::Or => Some("$or"),
            Self::Nor => Some("$nor"),
            Self::Not => Some("$not"),
        }
    }

    pub fn is_boolean(self) -> bool {
        matches!(self, Self::And | Self::Or | Self::Nor | Self::Not)
    }
}

/// What a single clause contributes to the compiled filter.
#[derive(Debug, Clone, PartialEq)]
pub enum Fragment {
    Field(String, Value),
    Composite(&'static str, Vec<Value>),
    WrapAccumulator(&'static str),
    Nothing,
}

/// Compiles `clauses` into a native filter.
///
/// In sub-expression mode only the first clause is compiled; a nested clause
/// list always stands for exactly one fragment.
pub fn compile(clauses: &[FilterClause], is_sub_expression: bool) -> Document {
    let mut accumulator = Document::new();

    for clause in clauses {
        let fragment = match Operator::from_action(&clause.action) {
            Some(operator) => fragment_for(operator, clause),
            None => {
                tracing::debug!("Ignoring unknown filter action '{}'", clause.action);
                Fragment::Nothing
            }
        };
        accumulator = merge(accumulator, fragment);

        if is_sub_expression {
            return accumulator;
        }
    }

    accumulator
}

fn merge(mut accumulator: Document, fragment: Fragment) -> Document {
    match fragment {
        Fragment::Field(field, value) => {
            accumulator.insert(field, value);
            accumulator
        }
        Fragment::Composite(key, parts) => {
            accumulator.insert(key.to_string(), Value::Array(parts));
            accumulator
        }
        Fragment::WrapAccumulator(key) => {
            let mut wrapped = Document::new();
            wrapped.insert(
                key.to_string(),
                Value::Array(vec![Value::Object(accumulator)]),
            );
            wrapped
        }
        Fragment::Nothing => accumulator,
    }
}

fn fragment_for(operator: Operator, clause: &FilterClause) -> Fragment {
    if operator.is_boolean() {
        return boolean_fragment(operator, clause);
    }

    let field = clause.field.clone();
    let value = clause.value.clone().unwrap_or(Value::Null);

    match operator {
        Operator::Equals => Fragment::Field(field, value),
        Operator::NotEquals
        | Operator::LessThan
        | Operator::LessThanOrEqual
        | Operator::GreaterThan
        | Operator::GreaterThanOrEqual => match operator.native_key() {
            Some(key) => Fragment::Field(field, json!({ key: value })),
            None => Fragment::Nothing,
        },
        Operator::Like => match like_pattern(&value) {
            Some(pattern) => Fragment::Field(field, json!({ "$regex": pattern, "$options": "i" })),
            None => Fragment::Nothing,
        },
        Operator::Exists => Fragment::Field(field, json!({ "$exists": true })),
        Operator::NotExists => Fragment::Field(field, json!({ "$exists": false })),
        Operator::In | Operator::NotIn | Operator::All => match (&value, operator.native_key()) {
            (Value::Array(_), Some(key)) => Fragment::Field(field, json!({ key: value })),
            _ => Fragment::Nothing,
        },
        Operator::And | Operator::Or | Operator::Nor | Operator::Not => Fragment::Nothing,
    }
}

fn boolean_fragment(operator: Operator, clause: &FilterClause) -> Fragment {
    let Some(key) = operator.native_key() else {
        return Fragment::Nothing;
    };

    if !clause.field.is_empty() {
        return Fragment::Nothing;
    }

    match &clause.value {
        None => Fragment::WrapAccumulator(key),
        Some(Value::Array(items)) if !items.is_empty() => {
            let parts = items.iter().filter_map(compile_nested).collect::<Vec<_>>();
            if parts.is_empty() {
                return Fragment::Nothing;
            }
            Fragment::Composite(key, parts)
        }
        Some(_) => Fragment::Nothing,
    }
}

/// Compiles one element of a boolean clause's value as a sub-expression.
fn compile_nested(item: &Value) -> Option<Value> {
    let clauses: Vec<FilterClause> = match item {
        Value::Object(_) => vec![serde_json::from_value(item.clone()).ok()?],
        Value::Array(_) => serde_json::from_value(item.clone()).ok()?,
        _ => return None,
    };

    Some(Value::Object(compile(&clauses, true)))
}

fn like_pattern(value: &Value) -> Option<String> {
    match value {
        Value::String(pattern) => Some(pattern.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn clauses(value: Value) -> Vec<FilterClause> {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_equality_clause() {
        let filter = compile(&clauses(json!([{"field": "x", "action": "=", "value": 5}])), false);
        assert_eq!(Value::Object(filter), json!({"x": 5}));

        let filter = compile(
            &clauses(json!([{"field": "slug", "action": "equals", "value": "worldedit"}])),
            false,
        );
        assert_eq!(Value::Object(filter), json!({"slug": "worldedit"}));
    }

    #[test]
    fn test_comparison_and_existence_operators() {
        let filter = compile(
            &clauses(json!([
                {"field": "server", "action": "!=", "value": "spigot"},
                {"field": "popularity.daily", "action": ">=", "value": 10},
                {"field": "popularity.total", "action": "<", "value": 500},
                {"field": "deleted", "action": "nexists"},
                {"field": "website", "action": "exists"}
            ])),
            false,
        );

        assert_eq!(
            Value::Object(filter),
            json!({
                "server": {"$ne": "spigot"},
                "popularity.daily": {"$gte": 10},
                "popularity.total": {"$lt": 500},
                "deleted": {"$exists": false},
                "website": {"$exists": true}
            })
        );
    }

    #[test]
    fn test_like_is_case_insensitive_regex() {
        let filter = compile(
            &clauses(json!([{"field": "plugin_name", "action": "like", "value": "^world"}])),
            false,
        );
        assert_eq!(
            Value::Object(filter),
            json!({"plugin_name": {"$regex": "^world", "$options": "i"}})
        );
    }

    #[test]
    fn test_sequence_operators_require_arrays() {
        let filter = compile(
            &clauses(json!([
                {"field": "categories", "action": "in", "value": ["Admin Tools", "Fun"]},
                {"field": "authors", "action": "all", "value": ["sk89q", "wizjany"]},
                {"field": "server", "action": "not in", "value": ["spigot"]}
            ])),
            false,
        );
        assert_eq!(
            Value::Object(filter),
            json!({
                "categories": {"$in": ["Admin Tools", "Fun"]},
                "authors": {"$all": ["sk89q", "wizjany"]},
                "server": {"$nin": ["spigot"]}
            })
        );

        let filter = compile(
            &clauses(json!([
                {"field": "categories", "action": "in", "value": "Fun"},
                {"field": "authors", "action": "all", "value": 3},
                {"field": "server", "action": "not in"}
            ])),
            false,
        );
        assert!(filter.is_empty());
    }

    #[test]
    fn test_unknown_action_is_ignored() {
        let filter = compile(&clauses(json!([{"field": "x", "action": "bogus", "value": 1}])), false);
        assert!(filter.is_empty());
    }

    #[test]
    fn test_or_compiles_each_nested_clause() {
        let filter = compile(
            &clauses(json!([{
                "field": "",
                "action": "or",
                "value": [
                    {"field": "a", "action": "=", "value": 1},
                    {"field": "b", "action": "=", "value": 2}
                ]
            }])),
            false,
        );
        assert_eq!(Value::Object(filter), json!({"$or": [{"a": 1}, {"b": 2}]}));
    }

    #[test]
    fn test_nested_clause_list_is_one_fragment() {
        // only the first clause of a nested list is compiled
        let filter = compile(
            &clauses(json!([{
                "field": "",
                "action": "and",
                "value": [
                    [
                        {"field": "a", "action": "=", "value": 1},
                        {"field": "b", "action": "=", "value": 2}
                    ],
                    {"field": "c", "action": "like", "value": "x"}
                ]
            }])),
            false,
        );
        assert_eq!(
            Value::Object(filter),
            json!({"$and": [{"a": 1}, {"c": {"$regex": "x", "$options": "i"}}]})
        );
    }

    #[test]
    fn test_recursive_composition() {
        let filter = compile(
            &clauses(json!([{
                "field": "",
                "action": "nor",
                "value": [{
                    "field": "",
                    "action": "or",
                    "value": [
                        {"field": "a", "action": "=", "value": 1},
                        {"field": "b", "action": ">", "value": 2}
                    ]
                }]
            }])),
            false,
        );
        assert_eq!(
            Value::Object(filter),
            json!({"$nor": [{"$or": [{"a": 1}, {"b": {"$gt": 2}}]}]})
        );
    }

    #[test]
    fn test_boolean_without_value_wraps_accumulator() {
        let filter = compile(
            &[
                FilterClause::new("server", "=", json!("bukkit")),
                FilterClause::new("deleted", "exists", Value::Null),
                FilterClause::wrap_previous("not"),
            ],
            false,
        );
        assert_eq!(
            Value::Object(filter),
            json!({"$not": [{"server": "bukkit", "deleted": {"$exists": true}}]})
        );
    }

    #[test]
    fn test_boolean_requires_empty_field_and_sequence() {
        let filter = compile(
            &clauses(json!([
                {"field": "x", "action": "or", "value": [{"field": "a", "action": "=", "value": 1}]},
                {"field": "", "action": "and", "value": "nope"},
                {"field": "", "action": "or", "value": []},
                {"field": "", "action": "nor", "value": [5, "x"]}
            ])),
            false,
        );
        assert!(filter.is_empty());

        let filter = compile(
            &clauses(json!([
                {"field": "server", "action": "=", "value": "bukkit"},
                {"field": "", "action": "or", "value": [5, "x"]}
            ])),
            false,
        );
        assert_eq!(Value::Object(filter), json!({"server": "bukkit"}));
    }

    #[test]
    fn test_sub_expression_mode_stops_after_first_clause() {
        let list = clauses(json!([
            {"field": "a", "action": "=", "value": 1},
            {"field": "b", "action": "=", "value": 2}
        ]));
        assert_eq!(Value::Object(compile(&list, true)), json!({"a": 1}));
        assert_eq!(Value::Object(compile(&list, false)), json!({"a": 1, "b": 2}));

        // an unrecognised first clause still ends a sub-expression
        let list = clauses(json!([
            {"field": "a", "action": "~", "value": 1},
            {"field": "b", "action": "=", "value": 2}
        ]));
        assert!(compile(&list, true).is_empty());
    }

    #[test]
    fn test_last_write_wins_on_duplicate_fields() {
        let filter = compile(
            &clauses(json!([
                {"field": "server", "action": "=", "value": "bukkit"},
                {"field": "server", "action": "!=", "value": "spigot"}
            ])),
            false,
        );
        assert_eq!(Value::Object(filter), json!({"server": {"$ne": "spigot"}}));
    }

    #[test]
    fn test_compilation_is_deterministic() {
        let list = clauses(json!([
            {"field": "server", "action": "=", "value": "bukkit"},
            {"field": "", "action": "or", "value": [
                {"field": "slug", "action": "like", "value": "edit"},
                {"field": "authors", "action": "in", "value": ["sk89q"]}
            ]}
        ]));
        assert_eq!(compile(&list, false), compile(&list, false));
    }
}
