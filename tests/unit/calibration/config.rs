use super::*;
use crate::calibration::transform::ScaleBounds;
use serde_json::json;

fn defaults() -> BTreeMap<String, LayerDefaults> {
    let mut m = BTreeMap::new();
    m.insert(
        "legs".to_owned(),
        LayerDefaults {
            transform: LayerTransform {
                offset: Vec2::new(0.0, 40.0),
                ..LayerTransform::default()
            },
            scale_bounds: ScaleBounds::new(0.5, 2.0).unwrap(),
        },
    );
    m.insert(
        "head".to_owned(),
        LayerDefaults {
            transform: LayerTransform {
                crop_top: 0.28,
                crop_height: 0.72,
                ..LayerTransform::default()
            },
            scale_bounds: ScaleBounds::default(),
        },
    );
    m
}

#[test]
fn empty_blob_yields_every_default() {
    let d = defaults();
    let (cfg, found) = CalibrationConfig::from_value_lenient(&json!({}), &d);
    assert_eq!(found, 0);
    assert_eq!(cfg.layers.len(), 2);
    assert_eq!(cfg.layers["legs"], d["legs"].transform);
    assert_eq!(cfg.layers["head"], d["head"].transform);
}

#[test]
fn partial_entries_fill_missing_fields_from_defaults() {
    let d = defaults();
    let blob = json!({ "legs": { "offset": { "y": 12 } }, "head": { "scale": 1.5 } });
    let (cfg, found) = CalibrationConfig::from_value_lenient(&blob, &d);
    assert_eq!(found, 2);
    assert_eq!(cfg.layers["legs"].offset, Vec2::new(0.0, 12.0));
    assert_eq!(cfg.layers["legs"].scale, 1.0);
    assert_eq!(cfg.layers["head"].scale, 1.5);
    assert_eq!(cfg.layers["head"].crop_top, 0.28);
}

#[test]
fn malformed_values_fall_back_per_field() {
    let d = defaults();
    let blob = json!({
        "legs": { "scale": "big", "offset": [1, 2], "cropTop": null },
        "head": 7,
        "unknown": { "scale": 2.0 }
    });
    let (cfg, _) = CalibrationConfig::from_value_lenient(&blob, &d);
    assert_eq!(cfg.layers["legs"], d["legs"].transform);
    assert_eq!(cfg.layers["head"], d["head"].transform);
    assert!(!cfg.layers.contains_key("unknown"));
}

#[test]
fn non_object_blob_is_treated_as_empty() {
    let d = defaults();
    let (cfg, found) = CalibrationConfig::from_value_lenient(&json!([1, 2, 3]), &d);
    assert_eq!(found, 0);
    assert_eq!(cfg.layers["legs"], d["legs"].transform);
}

#[test]
fn loaded_scale_is_clamped_into_bounds() {
    let d = defaults();
    let (cfg, _) = CalibrationConfig::from_value_lenient(&json!({"legs": {"scale": 9.0}}), &d);
    assert_eq!(cfg.layers["legs"].scale, 2.0);
}

#[test]
fn legacy_flat_keys_are_accepted_and_nested_entries_win() {
    let d = defaults();
    let blob = json!({
        "legsOffset": { "x": 5, "y": 6 },
        "legsScale": 1.2,
        "headScale": 0.9,
        "head": { "scale": 1.1 }
    });
    let (cfg, found) = CalibrationConfig::from_value_lenient(&blob, &d);
    assert_eq!(found, 2);
    assert_eq!(cfg.layers["legs"].offset, Vec2::new(5.0, 6.0));
    assert_eq!(cfg.layers["legs"].scale, 1.2);
    assert_eq!(cfg.layers["head"].scale, 1.1);
}

#[test]
fn snake_case_crop_keys_are_accepted() {
    let d = defaults();
    let blob = json!({ "head": { "crop_top": 0.1, "crop_height": 0.5 } });
    let (cfg, _) = CalibrationConfig::from_value_lenient(&blob, &d);
    assert_eq!(cfg.layers["head"].crop_top, 0.1);
    assert_eq!(cfg.layers["head"].crop_height, 0.5);
}

#[test]
fn overflowing_crop_is_clamped_on_load() {
    let d = defaults();
    let blob = json!({ "head": { "cropTop": 0.6, "cropHeight": 0.9 } });
    let (cfg, _) = CalibrationConfig::from_value_lenient(&blob, &d);
    let t = cfg.layers["head"];
    assert_eq!(t.crop_top, 0.6);
    assert!(t.crop_top + t.crop_height <= 1.0 + 1e-12);
}

#[test]
fn serializes_to_nested_camel_case_objects() {
    let mut cfg = CalibrationConfig::default();
    cfg.layers.insert(
        "legs".to_owned(),
        LayerTransform {
            offset: Vec2::new(1.5, -2.0),
            scale: 1.25,
            crop_top: 0.0,
            crop_height: 1.0,
        },
    );
    assert_eq!(
        cfg.to_value().unwrap(),
        json!({
            "legs": {
                "offset": { "x": 1.5, "y": -2.0 },
                "scale": 1.25,
                "cropTop": 0.0,
                "cropHeight": 1.0
            }
        })
    );
}

#[test]
fn strict_deserialize_defaults_missing_fields() {
    let cfg: CalibrationConfig =
        serde_json::from_value(json!({"legs": {"scale": 1.5}, "junk": 3})).unwrap();
    assert_eq!(cfg.layers.len(), 1);
    assert_eq!(cfg.layers["legs"].scale, 1.5);
    assert_eq!(cfg.layers["legs"].crop_height, 1.0);
}

#[test]
fn file_backend_missing_file_is_not_an_error() {
    let path = std::env::temp_dir().join(format!("avatar-cal-missing-{}.json", std::process::id()));
    let _ = std::fs::remove_file(&path);
    let backend = JsonFileBackend::new(&path);
    assert!(backend.load().unwrap().is_none());
}

#[test]
fn file_backend_round_trips_pretty_json() {
    let dir = std::env::temp_dir().join(format!("avatar-cal-{}", std::process::id()));
    let path = dir.join("public").join("avatar-config.json");
    let _ = std::fs::remove_dir_all(&dir);

    let backend = JsonFileBackend::new(&path);
    let d = defaults();
    let (cfg, _) = CalibrationConfig::from_value_lenient(&json!({}), &d);
    backend.save(&cfg).unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.contains("\n  \"head\""));
    let loaded = backend.load().unwrap().unwrap();
    let (back, found) = CalibrationConfig::from_value_lenient(&loaded, &d);
    assert_eq!(found, 2);
    assert_eq!(back, cfg);

    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn file_backend_reports_invalid_json() {
    let path = std::env::temp_dir().join(format!("avatar-cal-bad-{}.json", std::process::id()));
    std::fs::write(&path, "{ nope").unwrap();
    let err = JsonFileBackend::new(&path).load().unwrap_err();
    assert!(err.to_string().starts_with("config error:"));
    std::fs::remove_file(&path).unwrap();
}

#[test]
fn memory_backend_shares_state_between_clones() {
    let a = MemoryBackend::new();
    let b = a.clone();
    let mut cfg = CalibrationConfig::default();
    cfg.layers.insert("x".to_owned(), LayerTransform::default());
    a.save(&cfg).unwrap();
    assert_eq!(b.saves(), 1);
    assert!(b.load().unwrap().is_some());

    b.set_fail_saves(true);
    assert!(a.save(&cfg).is_err());
    b.set_fail_loads(true);
    assert!(a.load().is_err());
}
