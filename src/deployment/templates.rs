//! # Parameter Template Checker
//!
//! Validates user overrides against the parameter templates of every
//! application and produces the raw and masked views of the overrides plus
//! the per-application secret blobs.

use super::model::OverrideValues;
use crate::catalog::ResolvedApp;
use crate::constants::{MASK, MAX_DEPTH};
use crate::error::{AdmError, AdmResult};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Outcome of the template check
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CheckedOverrides {
    /// Overrides with empty values dropped and typed values coerced
    pub values: Vec<OverrideValues>,
    /// Same as `values` with every secret parameter replaced by the mask
    pub masked: Vec<OverrideValues>,
    /// Application name to JSON object of its secret parameters
    pub secrets: BTreeMap<String, String>,
}

/// Flatten a nested object into dotted keys
pub fn flatten(values: &Map<String, Value>) -> AdmResult<BTreeMap<String, Value>> {
    let mut flat = BTreeMap::new();
    flatten_into(values, "", 0, &mut flat)?;
    Ok(flat)
}

fn flatten_into(
    values: &Map<String, Value>,
    prefix: &str,
    depth: usize,
    flat: &mut BTreeMap<String, Value>,
) -> AdmResult<()> {
    if depth > MAX_DEPTH {
        return Err(depth_exceeded());
    }
    for (key, value) in values {
        let full_key = join_key(prefix, key);
        match value {
            Value::Object(inner) => flatten_into(inner, &full_key, depth + 1, flat)?,
            other => {
                flat.insert(full_key, other.clone());
            }
        }
    }
    Ok(())
}

fn join_key(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}.{key}")
    }
}

fn depth_exceeded() -> AdmError {
    AdmError::internal(format!(
        "override values exceed the maximum nesting depth of {MAX_DEPTH}"
    ))
}

fn set_path(values: &mut Map<String, Value>, path: &str, value: Value) {
    let mut parts = path.split('.').peekable();
    let mut current = values;
    while let Some(part) = parts.next() {
        if parts.peek().is_none() {
            current.insert(part.to_string(), value);
            return;
        }
        let entry = current
            .entry(part.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }
        match entry {
            Value::Object(next) => current = next,
            _ => return,
        }
    }
}

fn remove_path(values: &mut Map<String, Value>, path: &str) {
    match path.split_once('.') {
        None => {
            values.remove(path);
        }
        Some((head, rest)) => {
            if let Some(Value::Object(next)) = values.get_mut(head) {
                remove_path(next, rest);
            }
        }
    }
}

fn coerce(kind: &str, value: &Value) -> Value {
    match (kind, value) {
        ("number", Value::String(s)) => Value::from(s.trim().parse::<i64>().unwrap_or(0)),
        ("boolean", Value::String(s)) => Value::Bool(s == "true"),
        _ => value.clone(),
    }
}

/// Check `overrides` against the templates of `apps`
pub fn check_parameter_templates(
    apps: &[ResolvedApp],
    overrides: &[OverrideValues],
) -> AdmResult<CheckedOverrides> {
    let mut checked = CheckedOverrides {
        values: overrides.to_vec(),
        masked: overrides.to_vec(),
        secrets: BTreeMap::new(),
    };
    let mut missing: Vec<String> = Vec::new();

    for app in apps {
        let index = checked.values.iter().position(|o| o.app_name == app.name);
        let mut values = index
            .and_then(|i| checked.values[i].values.clone())
            .unwrap_or_default();

        let flat = flatten(&values)?;
        let mut present: BTreeMap<String, Value> = BTreeMap::new();
        for (key, value) in flat {
            if value.as_str() == Some("") {
                remove_path(&mut values, &key);
            } else {
                present.insert(key, value);
            }
        }

        let mut masked = values.clone();
        let mut secret_values = Map::new();
        for template in &app.parameter_templates {
            match present.get(&template.name) {
                Some(value) => {
                    let typed = coerce(&template.r#type, value);
                    set_path(&mut values, &template.name, typed.clone());
                    if template.secret {
                        set_path(&mut masked, &template.name, Value::String(MASK.to_string()));
                        secret_values.insert(template.name.clone(), typed);
                    } else {
                        set_path(&mut masked, &template.name, typed);
                    }
                }
                None if template.mandatory => {
                    if !missing.contains(&app.name) {
                        missing.push(app.name.clone());
                    }
                }
                None => {}
            }
        }

        if !secret_values.is_empty() {
            checked
                .secrets
                .insert(app.name.clone(), Value::Object(secret_values).to_string());
        }
        if let Some(i) = index {
            checked.values[i].values = Some(values);
            checked.masked[i].values = Some(masked);
        }
    }

    match missing.as_slice() {
        [] => Ok(checked),
        [app] => Err(AdmError::invalid(format!(
            "application {app} is missing mandatory override profile values"
        ))),
        many => {
            let names: Vec<&str> = many.iter().rev().map(String::as_str).collect();
            Err(AdmError::invalid(format!(
                "applications {} are missing mandatory override profile values",
                names.join(", ")
            )))
        }
    }
}

/// Put back secret values a caller sent as the mask on update
pub fn unmask_secrets(
    values: &mut Map<String, Value>,
    previous: &Map<String, Value>,
) -> AdmResult<()> {
    unmask_into(values, previous, "", 0)
}

fn unmask_into(
    values: &mut Map<String, Value>,
    previous: &Map<String, Value>,
    prefix: &str,
    depth: usize,
) -> AdmResult<()> {
    if depth > MAX_DEPTH {
        return Err(depth_exceeded());
    }
    for (key, value) in values.iter_mut() {
        let full_key = join_key(prefix, key);
        match value {
            Value::String(s) if s == MASK => {
                if let Some(original) = previous.get(&full_key) {
                    *value = original.clone();
                }
            }
            Value::Object(inner) => unmask_into(inner, previous, &full_key, depth + 1)?,
            _ => {}
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ParameterTemplate;
    use serde_json::json;

    fn app(templates: Vec<ParameterTemplate>) -> ResolvedApp {
        ResolvedApp {
            name: "wordpress".to_string(),
            parameter_templates: templates,
            ..Default::default()
        }
    }

    fn template(name: &str, kind: &str, mandatory: bool, secret: bool) -> ParameterTemplate {
        ParameterTemplate {
            name: name.to_string(),
            display_name: name.to_string(),
            r#type: kind.to_string(),
            mandatory,
            secret,
            ..Default::default()
        }
    }

    fn overrides(values: Value) -> Vec<OverrideValues> {
        vec![OverrideValues {
            app_name: "wordpress".to_string(),
            target_namespace: String::new(),
            values: values.as_object().cloned(),
        }]
    }

    #[test]
    fn test_flatten_dotted_keys() {
        let flat = flatten(json!({"a": {"b": {"c": 1}}, "d": "x"}).as_object().unwrap()).unwrap();
        assert_eq!(flat.get("a.b.c"), Some(&json!(1)));
        assert_eq!(flat.get("d"), Some(&json!("x")));
    }

    #[test]
    fn test_flatten_depth_bound() {
        let mut value = json!("leaf");
        for _ in 0..=MAX_DEPTH + 1 {
            value = json!({ "k": value });
        }
        let err = flatten(value.as_object().unwrap()).unwrap_err();
        assert_eq!(err.as_str(), "internal");
    }

    #[test]
    fn test_missing_mandatory() {
        let apps = vec![app(vec![template("global.admin_password", "string", true, false)])];
        let err = check_parameter_templates(&apps, &[]).unwrap_err();
        assert_eq!(
            err,
            AdmError::invalid("application wordpress is missing mandatory override profile values")
        );
    }

    #[test]
    fn test_empty_value_counts_as_missing() {
        let apps = vec![app(vec![template("global.admin_password", "string", true, false)])];
        let err = check_parameter_templates(
            &apps,
            &overrides(json!({"global": {"admin_password": ""}})),
        )
        .unwrap_err();
        assert_eq!(err.as_str(), "invalid");
    }

    #[test]
    fn test_several_apps_missing() {
        let mut second = app(vec![template("x", "string", true, false)]);
        second.name = "mariadb".to_string();
        let apps = vec![app(vec![template("y", "string", true, false)]), second];
        let err = check_parameter_templates(&apps, &[]).unwrap_err();
        assert_eq!(
            err.message(),
            "applications mariadb, wordpress are missing mandatory override profile values"
        );
    }

    #[test]
    fn test_secret_is_masked_and_extracted() {
        let apps = vec![app(vec![template("global.admin_password", "string", true, true)])];
        let checked = check_parameter_templates(
            &apps,
            &overrides(json!({"global": {"admin_password": "foo"}, "replicas": "2"})),
        )
        .unwrap();
        assert_eq!(
            checked.values[0].values.clone().unwrap(),
            json!({"global": {"admin_password": "foo"}, "replicas": "2"})
                .as_object()
                .cloned()
                .unwrap()
        );
        assert_eq!(
            checked.masked[0].values.clone().unwrap()["global"]["admin_password"],
            json!("********")
        );
        assert_eq!(
            checked.secrets.get("wordpress").map(String::as_str),
            Some(r#"{"global.admin_password":"foo"}"#)
        );
    }

    #[test]
    fn test_type_coercion() {
        let apps = vec![app(vec![
            template("replicas", "number", false, false),
            template("debug", "boolean", false, false),
            template("ratio", "number", false, false),
        ])];
        let checked = check_parameter_templates(
            &apps,
            &overrides(json!({"replicas": "3", "debug": "true", "ratio": "abc"})),
        )
        .unwrap();
        let values = checked.values[0].values.clone().unwrap();
        assert_eq!(values["replicas"], json!(3));
        assert_eq!(values["debug"], json!(true));
        assert_eq!(values["ratio"], json!(0));
        assert!(checked.secrets.is_empty());
    }

    #[test]
    fn test_unmask_restores_previous_values() {
        let mut values = json!({"global": {"admin_password": "********", "user": "bob"}})
            .as_object()
            .cloned()
            .unwrap();
        let previous = json!({"global.admin_password": "foo"}).as_object().cloned().unwrap();
        unmask_secrets(&mut values, &previous).unwrap();
        assert_eq!(values["global"]["admin_password"], json!("foo"));
        assert_eq!(values["global"]["user"], json!("bob"));
    }
}
