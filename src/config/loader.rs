//! Configuration loading and environment parsing.

use super::Config;
use serde_json::Value;
use std::path::Path;

/// Environment prefix for nested overrides, e.g. `QUIZ_RALLY__PORT=8080` or
/// `QUIZ_RALLY__LOGGING__LEVEL=debug` ("__" separates nesting levels).
const ENV_PREFIX: &str = "QUIZ_RALLY__";

/// Load configuration. Sources are layered onto the compiled-in defaults in
/// this order (later wins):
/// 1) config.json in the current working directory
/// 2) the file named by `QUIZ_RALLY_CONFIG_PATH`
/// 3) raw JSON in `QUIZ_RALLY_CONFIG_JSON`
/// 4) nested `QUIZ_RALLY__*` environment overrides
/// 5) the deployment shorthands `PORT`, `CLIENT_ORIGIN`, `APP_ENV`,
///    `QUIZ_RALLY_AUTH_SECRET`, `QUIZ_RALLY_AUTH_SECRET_PATH`
///
/// A source that cannot be read or parsed is skipped with a note on stderr;
/// `load()` always returns a usable `Config`.
#[must_use]
pub fn load() -> Config {
    use std::env;
    use std::path::PathBuf;

    let defaults = Config::default();
    let mut layered =
        serde_json::to_value(&defaults).unwrap_or_else(|_| Value::Object(serde_json::Map::new()));

    merge_json_file(&mut layered, &PathBuf::from("config.json"));

    if let Ok(path) = env::var("QUIZ_RALLY_CONFIG_PATH") {
        merge_json_file(&mut layered, &PathBuf::from(path));
    }

    if let Ok(raw) = env::var("QUIZ_RALLY_CONFIG_JSON") {
        merge_json_str(&mut layered, &raw, "QUIZ_RALLY_CONFIG_JSON");
    }

    apply_env_overrides(&mut layered);

    let mut config = match serde_json::from_value::<Config>(layered) {
        Ok(cfg) => cfg,
        Err(err) => {
            eprintln!("Layered config did not deserialize ({err}); using defaults");
            defaults
        }
    };

    apply_shorthand_env(&mut config);
    config
}

/// Deployment-facing shorthand variables, applied over everything else.
fn apply_shorthand_env(config: &mut Config) {
    use super::security::Environment;
    use std::env;

    if let Ok(raw) = env::var("PORT") {
        match raw.trim().parse::<u16>() {
            Ok(port) => config.port = port,
            Err(_) => eprintln!("Ignoring invalid PORT value '{raw}'"),
        }
    }

    if let Ok(origin) = env::var("CLIENT_ORIGIN") {
        if !origin.trim().is_empty() {
            config.security.client_origin = Some(origin.trim().to_string());
        }
    }

    if let Ok(app_env) = env::var("APP_ENV") {
        config.security.environment = match app_env.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Environment::Production,
            _ => Environment::Development,
        };
    }

    if let Ok(secret) = env::var("QUIZ_RALLY_AUTH_SECRET") {
        if !secret.trim().is_empty() {
            config.security.auth_secret = Some(secret);
        }
    }

    if let Ok(path) = env::var("QUIZ_RALLY_AUTH_SECRET_PATH") {
        if !path.trim().is_empty() {
            config.security.auth_secret_path = Some(path);
        }
    }
}

/// Deep-merge `patch` into `base`: objects merge key by key, every other
/// JSON type replaces the current value wholesale.
fn overlay(base: &mut Value, patch: Value) {
    match (base, patch) {
        (Value::Object(base_map), Value::Object(patch_map)) => {
            for (key, value) in patch_map {
                overlay(base_map.entry(key).or_insert(Value::Null), value);
            }
        }
        (slot, replacement) => *slot = replacement,
    }
}

fn merge_json_str(target: &mut Value, raw: &str, label: &str) {
    if raw.trim().is_empty() {
        return;
    }
    match serde_json::from_str(raw) {
        Ok(patch) => overlay(target, patch),
        Err(err) => eprintln!("Ignoring config from {label}: {err}"),
    }
}

fn merge_json_file(target: &mut Value, path: &Path) {
    if !path.is_file() {
        return;
    }
    match std::fs::read_to_string(path) {
        Ok(contents) => merge_json_str(target, &contents, &path.display().to_string()),
        Err(err) => eprintln!("Ignoring config file {}: {err}", path.display()),
    }
}

fn apply_env_overrides(root: &mut Value) {
    for (key, raw) in std::env::vars() {
        let Some(suffix) = key.strip_prefix(ENV_PREFIX) else {
            continue;
        };

        let path: Vec<String> = suffix
            .split("__")
            .filter(|segment| !segment.is_empty())
            .map(str::to_ascii_lowercase)
            .collect();
        if path.is_empty() {
            continue;
        }

        place(root, &path, coerce_env_value(raw.trim()));
    }
}

/// Walk (and create) the object path, then drop `value` into the leaf slot.
/// Non-object values along the way are displaced by fresh objects, so an
/// override can always land.
fn place(root: &mut Value, path: &[String], value: Value) {
    let mut slot = root;
    for segment in path {
        if !slot.is_object() {
            *slot = Value::Object(serde_json::Map::new());
        }
        slot = match slot {
            Value::Object(map) => map.entry(segment.clone()).or_insert(Value::Null),
            // Coerced to an object just above.
            _ => return,
        };
    }
    *slot = value;
}

/// Environment values arrive as strings; numbers, booleans and quoted JSON
/// pass through as their JSON types, anything else stays a string.
fn coerce_env_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}
