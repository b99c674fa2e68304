use serde_json::{Map, Value};

use super::matcher::{matches, resolve, sort_order};
use super::FindQuery;
use crate::query::{Document, Projection, SortDirection};

/// Runs a find over an in-order document sequence: filter, sort, skip,
/// limit, then project.
pub fn run_find<'a, I>(documents: I, query: &FindQuery) -> Vec<Document>
where
    I: IntoIterator<Item = &'a Document>,
{
    let mut selected: Vec<&Document> = documents
        .into_iter()
        .filter(|doc| matches(doc, &query.filter))
        .collect();

    if let Some(sort) = &query.sort {
        selected.sort_by(|a, b| {
            let ordering = sort_order(
                resolve(a, &sort.field).first().copied(),
                resolve(b, &sort.field).first().copied(),
            );
            match sort.direction {
                SortDirection::Ascending => ordering,
                SortDirection::Descending => ordering.reverse(),
            }
        });
    }

    let skip = query.skip.unwrap_or(0) as usize;
    let limit = query.limit.map(|l| l as usize).unwrap_or(usize::MAX);

    selected
        .into_iter()
        .skip(skip)
        .take(limit)
        .map(|doc| apply_projection(doc, &query.projection))
        .collect()
}

pub fn apply_projection(doc: &Document, projection: &Projection) -> Document {
    if projection.as_map().is_empty() {
        return doc.clone();
    }

    let keep_id = projection.is_included("_id") != Some(false);

    if projection.is_inclusive() {
        let mut projected = Map::new();
        if keep_id {
            if let Some(id) = doc.get("_id") {
                projected.insert("_id".to_string(), id.clone());
            }
        }
        for path in projection.inclusions() {
            let segments: Vec<&str> = path.split('.').collect();
            copy_path(doc, &mut projected, &segments);
        }
        return projected;
    }

    let mut projected = doc.clone();
    if !keep_id {
        projected.remove("_id");
    }
    for path in projection.exclusions() {
        let segments: Vec<&str> = path.split('.').collect();
        remove_path(&mut projected, &segments);
    }
    projected
}

fn copy_path(source: &Map<String, Value>, target: &mut Map<String, Value>, segments: &[&str]) {
    let Some((head, rest)) = segments.split_first() else {
        return;
    };
    let Some(value) = source.get(*head) else {
        return;
    };

    if rest.is_empty() {
        target.insert(head.to_string(), value.clone());
        return;
    }

    match value {
        Value::Object(inner) => {
            let entry = target
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if let Value::Object(inner_target) = entry {
                copy_path(inner, inner_target, rest);
            }
        }
        Value::Array(items) => {
            let objects: Vec<&Map<String, Value>> =
                items.iter().filter_map(Value::as_object).collect();
            let entry = target.entry(head.to_string()).or_insert_with(|| {
                Value::Array(objects.iter().map(|_| Value::Object(Map::new())).collect())
            });
            if let Value::Array(targets) = entry {
                for (item, item_target) in objects.iter().zip(targets.iter_mut()) {
                    if let Value::Object(item_target) = item_target {
                        copy_path(item, item_target, rest);
                    }
                }
            }
        }
        _ => {}
    }
}

fn remove_path(target: &mut Map<String, Value>, segments: &[&str]) {
    let Some((head, rest)) = segments.split_first() else {
        return;
    };

    if rest.is_empty() {
        target.remove(*head);
        return;
    }

    match target.get_mut(*head) {
        Some(Value::Object(inner)) => remove_path(inner, rest),
        Some(Value::Array(items)) => {
            for item in items.iter_mut() {
                if let Value::Object(inner) = item {
                    remove_path(inner, rest);
                }
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{project, SortSpec};
    use serde_json::json;

    fn docs(value: Value) -> Vec<Document> {
        serde_json::from_value(value).unwrap()
    }

    fn plugins() -> Vec<Document> {
        docs(json!([
            {"_id": 1, "slug": "worldedit", "popularity": {"daily": 40}, "secret": "a",
             "versions": [{"version": "6.0", "type": "Release", "md5": "x"},
                          {"version": "6.0-b", "type": "Beta", "md5": "y"}]},
            {"_id": 2, "slug": "essentials", "popularity": {"daily": 90}, "secret": "b",
             "versions": [{"version": "2.9", "type": "Release", "md5": "z"}]},
            {"_id": 3, "slug": "dynmap", "popularity": {"daily": 10}, "secret": "c",
             "versions": []}
        ]))
    }

    fn slugs(found: &[Document]) -> Vec<&str> {
        found.iter().filter_map(|d| d["slug"].as_str()).collect()
    }

    #[test]
    fn test_sort_skip_limit() {
        let data = plugins();
        let query = FindQuery::all()
            .sort(SortSpec::parse("-popularity.daily"))
            .skip(1)
            .limit(1);
        assert_eq!(slugs(&run_find(&data, &query)), vec!["worldedit"]);

        let query = FindQuery::all().sort(SortSpec::parse("slug"));
        assert_eq!(
            slugs(&run_find(&data, &query)),
            vec!["dynmap", "essentials", "worldedit"]
        );
    }

    #[test]
    fn test_inclusion_projection_reaches_into_arrays() {
        let data = plugins();
        let projection = project(&["slug", "versions.version", "versions.type", "-secret"]);
        let projected = apply_projection(&data[0], &projection);

        assert_eq!(
            Value::Object(projected),
            json!({
                "slug": "worldedit",
                "versions": [
                    {"version": "6.0", "type": "Release"},
                    {"version": "6.0-b", "type": "Beta"}
                ]
            })
        );
    }

    #[test]
    fn test_exclusion_projection() {
        let data = plugins();
        let projection = project(&["-secret", "-versions.md5"]);
        let projected = apply_projection(&data[1], &projection);

        assert_eq!(
            Value::Object(projected),
            json!({
                "slug": "essentials",
                "popularity": {"daily": 90},
                "versions": [{"version": "2.9", "type": "Release"}]
            })
        );
    }

    #[test]
    fn test_everything_projection_keeps_id() {
        let data = plugins();
        let projected = apply_projection(&data[2], &Projection::everything());
        assert_eq!(projected, data[2]);

        let projected = apply_projection(&data[2], &Projection::everything().include("slug"));
        assert_eq!(Value::Object(projected), json!({"_id": 3, "slug": "dynmap"}));
    }
}
