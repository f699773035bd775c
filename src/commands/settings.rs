use crate::analysis::classifier::{
    ClassifierThresholds, DEFAULT_CASH_FLOW_FLOOR, DEFAULT_MARGINAL_MIN_CAP_RATE,
    DEFAULT_MARGINAL_MIN_CASH_ON_CASH, DEFAULT_WORTH_MIN_CAP_RATE, DEFAULT_WORTH_MIN_CASH_ON_CASH,
    DEFAULT_WORTH_MIN_MONTHLY_CASH_FLOW,
};
use crate::errors::{Error, Result};
use crate::models::deal::DEFAULT_VACANCY_RATE;
use serde_json::{json, Map, Value};
use std::fs;
use std::path::{Path, PathBuf};

const SETTINGS_SCHEMA_VERSION: i64 = 1;
const SETTINGS_FILE: &str = "settings.json";
const DEFAULT_DATABASE_FILE: &str = "deals.db";

#[derive(Debug, Clone, PartialEq)]
pub struct EffectiveSettings {
    pub thresholds: ClassifierThresholds,
    pub default_vacancy_rate: f64,
    pub database_path: PathBuf,
}

pub fn get_settings(data_dir: &Path) -> Result<Value> {
    load_settings_from_disk(data_dir)
}

pub fn save_settings(data_dir: &Path, settings: Value) -> Result<Value> {
    save_settings_to_disk(data_dir, settings)
}

pub fn load_effective_settings(data_dir: &Path) -> Result<EffectiveSettings> {
    let settings = load_settings_from_disk(data_dir)?;
    Ok(effective_from_value(data_dir, &settings))
}

fn effective_from_value(data_dir: &Path, settings: &Value) -> EffectiveSettings {
    let classifier = settings.get("classifier").cloned().unwrap_or_else(|| json!({}));
    let number = |key: &str, default: f64| classifier.get(key).and_then(Value::as_f64).unwrap_or(default);

    let thresholds = ClassifierThresholds {
        cash_flow_floor: number("cashFlowFloor", DEFAULT_CASH_FLOW_FLOOR),
        worth_min_cash_on_cash: number("worthMinCashOnCash", DEFAULT_WORTH_MIN_CASH_ON_CASH),
        worth_min_cap_rate: number("worthMinCapRate", DEFAULT_WORTH_MIN_CAP_RATE),
        worth_min_monthly_cash_flow: number(
            "worthMinMonthlyCashFlow",
            DEFAULT_WORTH_MIN_MONTHLY_CASH_FLOW,
        ),
        marginal_min_cash_on_cash: number(
            "marginalMinCashOnCash",
            DEFAULT_MARGINAL_MIN_CASH_ON_CASH,
        ),
        marginal_min_cap_rate: number("marginalMinCapRate", DEFAULT_MARGINAL_MIN_CAP_RATE),
    };

    let default_vacancy_rate = settings
        .get("defaultVacancyRate")
        .and_then(Value::as_f64)
        .unwrap_or(DEFAULT_VACANCY_RATE);

    let database_file = settings
        .get("databaseFile")
        .and_then(Value::as_str)
        .unwrap_or(DEFAULT_DATABASE_FILE);

    EffectiveSettings {
        thresholds,
        default_vacancy_rate,
        database_path: data_dir.join(database_file),
    }
}

pub fn load_settings_from_disk(data_dir: &Path) -> Result<Value> {
    let path = settings_path(data_dir);
    ensure_data_dir(data_dir)?;

    let original = if path.exists() {
        let raw = fs::read_to_string(&path)
            .map_err(|e| Error::Settings(format!("Failed to read {SETTINGS_FILE}: {e}")))?;
        serde_json::from_str::<Value>(&raw).unwrap_or_else(|e| {
            log::warn!("Ignoring malformed {}: {e}", path.display());
            json!({})
        })
    } else {
        json!({})
    };

    let migrated = migrate_settings(original.clone());
    if migrated != original || !path.exists() {
        write_settings_file(&path, &migrated)?;
        log::debug!("Wrote migrated settings to {}", path.display());
    }

    Ok(migrated)
}

pub fn save_settings_to_disk(data_dir: &Path, settings: Value) -> Result<Value> {
    let path = settings_path(data_dir);
    ensure_data_dir(data_dir)?;

    let mut merged = load_settings_from_disk(data_dir).unwrap_or_else(|_| default_settings());
    merge_settings(&mut merged, &settings);

    let migrated = migrate_settings(merged);
    write_settings_file(&path, &migrated)?;
    log::info!("Saved settings to {}", path.display());
    Ok(migrated)
}

fn settings_path(data_dir: &Path) -> PathBuf {
    data_dir.join(SETTINGS_FILE)
}

fn ensure_data_dir(data_dir: &Path) -> Result<()> {
    fs::create_dir_all(data_dir).map_err(|e| {
        Error::Settings(format!(
            "Failed to create data directory {}: {e}",
            data_dir.display()
        ))
    })
}

fn write_settings_file(path: &Path, settings: &Value) -> Result<()> {
    let raw = serde_json::to_string_pretty(settings)
        .map_err(|e| Error::Settings(format!("Failed to serialize settings: {e}")))?;
    fs::write(path, raw)
        .map_err(|e| Error::Settings(format!("Failed to write {SETTINGS_FILE}: {e}")))
}

fn migrate_settings(input: Value) -> Value {
    let defaults = default_settings();
    let mut out = match input {
        Value::Object(map) => Value::Object(map),
        _ => Value::Object(Map::new()),
    };

    let version = out
        .get("schema_version")
        .and_then(Value::as_i64)
        .unwrap_or(SETTINGS_SCHEMA_VERSION);
    if version > SETTINGS_SCHEMA_VERSION {
        log::warn!("Settings schema version {version} is newer than supported {SETTINGS_SCHEMA_VERSION}");
    }

    deep_merge_defaults(&mut out, &defaults);
    sanitize_settings(&mut out);
    if let Some(obj) = out.as_object_mut() {
        obj.insert("schema_version".to_string(), json!(SETTINGS_SCHEMA_VERSION));
    }

    out
}

fn default_settings() -> Value {
    json!({
        "schema_version": SETTINGS_SCHEMA_VERSION,
        "classifier": {
            "cashFlowFloor": DEFAULT_CASH_FLOW_FLOOR,
            "worthMinCashOnCash": DEFAULT_WORTH_MIN_CASH_ON_CASH,
            "worthMinCapRate": DEFAULT_WORTH_MIN_CAP_RATE,
            "worthMinMonthlyCashFlow": DEFAULT_WORTH_MIN_MONTHLY_CASH_FLOW,
            "marginalMinCashOnCash": DEFAULT_MARGINAL_MIN_CASH_ON_CASH,
            "marginalMinCapRate": DEFAULT_MARGINAL_MIN_CAP_RATE
        },
        "defaultVacancyRate": DEFAULT_VACANCY_RATE,
        "databaseFile": DEFAULT_DATABASE_FILE
    })
}

fn deep_merge_defaults(target: &mut Value, defaults: &Value) {
    let (Some(target_obj), Some(default_obj)) = (target.as_object_mut(), defaults.as_object()) else {
        return;
    };

    for (key, default_value) in default_obj {
        match target_obj.get_mut(key) {
            Some(existing) => {
                if existing.is_object() && default_value.is_object() {
                    deep_merge_defaults(existing, default_value);
                }
            }
            None => {
                target_obj.insert(key.clone(), default_value.clone());
            }
        }
    }
}

fn merge_settings(target: &mut Value, incoming: &Value) {
    match (target, incoming) {
        (Value::Object(target_obj), Value::Object(incoming_obj)) => {
            for (key, value) in incoming_obj {
                if let Some(existing) = target_obj.get_mut(key) {
                    merge_settings(existing, value);
                } else {
                    target_obj.insert(key.clone(), value.clone());
                }
            }
        }
        (target_slot, incoming_value) => {
            *target_slot = incoming_value.clone();
        }
    }
}

fn sanitize_settings(settings: &mut Value) {
    let Some(obj) = settings.as_object_mut() else {
        return;
    };

    clamp_f64(obj, "defaultVacancyRate", 0.0, 1.0, DEFAULT_VACANCY_RATE);

    let valid_file = obj
        .get("databaseFile")
        .and_then(Value::as_str)
        .filter(|name| !name.trim().is_empty() && !name.contains(['/', '\\']))
        .unwrap_or(DEFAULT_DATABASE_FILE)
        .to_string();
    obj.insert("databaseFile".to_string(), json!(valid_file));

    let classifier = obj
        .entry("classifier".to_string())
        .or_insert_with(|| json!({}));
    if !classifier.is_object() {
        *classifier = json!({});
    }
    if let Some(c) = classifier.as_object_mut() {
        // The floor may be raised but never dropped below zero cash flow.
        clamp_f64(c, "cashFlowFloor", 0.0, 100_000.0, DEFAULT_CASH_FLOW_FLOOR);
        clamp_f64(c, "worthMinCashOnCash", 0.0, 1.0, DEFAULT_WORTH_MIN_CASH_ON_CASH);
        clamp_f64(c, "worthMinCapRate", 0.0, 1.0, DEFAULT_WORTH_MIN_CAP_RATE);
        clamp_f64(
            c,
            "worthMinMonthlyCashFlow",
            0.0,
            100_000.0,
            DEFAULT_WORTH_MIN_MONTHLY_CASH_FLOW,
        );
        clamp_f64(c, "marginalMinCashOnCash", 0.0, 1.0, DEFAULT_MARGINAL_MIN_CASH_ON_CASH);
        clamp_f64(c, "marginalMinCapRate", 0.0, 1.0, DEFAULT_MARGINAL_MIN_CAP_RATE);
    }
}

fn clamp_f64(map: &mut Map<String, Value>, key: &str, min: f64, max: f64, default: f64) {
    let raw = map
        .get(key)
        .and_then(Value::as_f64)
        .filter(|v| v.is_finite())
        .unwrap_or(default);
    map.insert(key.to_string(), json!(raw.clamp(min, max)));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unversioned_or_malformed_documents_become_current_defaults() {
        for input in [json!({}), json!([1, 2]), json!("settings")] {
            let migrated = migrate_settings(input);
            assert_eq!(migrated, default_settings());
            assert_eq!(
                migrated.get("schema_version").and_then(Value::as_i64).unwrap(),
                SETTINGS_SCHEMA_VERSION
            );
        }
    }

    #[test]
    fn marginal_minimums_are_read_and_clamped() {
        let migrated = migrate_settings(json!({
            "classifier": { "marginalMinCashOnCash": 0.03, "marginalMinCapRate": 4.5 }
        }));
        assert_eq!(migrated["classifier"]["marginalMinCapRate"], json!(1.0));

        let effective = effective_from_value(Path::new("data"), &migrated);
        assert_eq!(effective.thresholds.marginal_min_cash_on_cash, 0.03);
        assert_eq!(effective.thresholds.marginal_min_cap_rate, 1.0);
    }

    #[test]
    fn negative_cash_flow_floor_is_clamped_to_zero() {
        let migrated = migrate_settings(json!({
            "schema_version": 1,
            "classifier": { "cashFlowFloor": -500 }
        }));
        assert_eq!(migrated["classifier"]["cashFlowFloor"], json!(0.0));

        let effective = effective_from_value(Path::new("/tmp"), &migrated);
        assert_eq!(effective.thresholds.cash_flow_floor, 0.0);
    }

    #[test]
    fn merges_partial_settings_without_losing_existing_values() {
        let mut existing = default_settings();
        merge_settings(&mut existing, &json!({ "classifier": { "worthMinCapRate": 0.07 } }));
        let migrated = migrate_settings(existing);

        assert_eq!(migrated["classifier"]["worthMinCapRate"], json!(0.07));
        assert_eq!(
            migrated["classifier"]["worthMinCashOnCash"],
            json!(DEFAULT_WORTH_MIN_CASH_ON_CASH)
        );
        assert_eq!(migrated["databaseFile"], json!(DEFAULT_DATABASE_FILE));
    }

    #[test]
    fn rejects_database_file_outside_data_dir() {
        let migrated = migrate_settings(json!({ "databaseFile": "../elsewhere.db" }));
        assert_eq!(migrated["databaseFile"], json!(DEFAULT_DATABASE_FILE));
    }

    #[test]
    fn defaults_produce_default_thresholds() {
        let effective = effective_from_value(Path::new("data"), &default_settings());
        assert_eq!(effective.thresholds, ClassifierThresholds::default());
        assert_eq!(effective.default_vacancy_rate, DEFAULT_VACANCY_RATE);
        assert_eq!(effective.database_path, Path::new("data").join("deals.db"));
    }
}
