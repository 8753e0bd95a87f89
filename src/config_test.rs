#![allow(clippy::float_cmp)]

use super::*;

#[test]
fn empty_object_gives_defaults() {
    let config = EditorConfig::from_json("{}").unwrap();
    assert_eq!(config, EditorConfig::default());
}

#[test]
fn defaults_match_documented_values() {
    let config = EditorConfig::default();
    assert_eq!(config.history_limit, 50);
    assert_eq!(config.history_debounce_ms, 300.0);
    assert!(config.clamp_to_scene);
    assert_eq!(config.default_font_family, "Impact");
}

#[test]
fn partial_object_overrides_only_given_keys() {
    let config = EditorConfig::from_json(r#"{"history_limit": 10, "clamp_to_scene": false}"#).unwrap();
    assert_eq!(config.history_limit, 10);
    assert!(!config.clamp_to_scene);
    assert_eq!(config.nudge_step, 1.0);
}

#[test]
fn unknown_keys_are_ignored() {
    let config = EditorConfig::from_json(r#"{"theme": "dark"}"#).unwrap();
    assert_eq!(config, EditorConfig::default());
}

#[test]
fn zero_history_limit_is_rejected() {
    let err = EditorConfig::from_json(r#"{"history_limit": 0}"#).unwrap_err();
    assert!(matches!(err, EditorError::InvalidConfig(ref msg) if msg.contains("history_limit")));
}

#[test]
fn negative_nudge_is_rejected() {
    let err = EditorConfig::from_json(r#"{"nudge_step": -1}"#).unwrap_err();
    assert!(matches!(err, EditorError::InvalidConfig(ref msg) if msg.contains("nudge_step")));
}

#[test]
fn zero_handle_radius_is_rejected() {
    let err = EditorConfig::from_json(r#"{"handle_radius_px": 0}"#).unwrap_err();
    assert!(matches!(err, EditorError::InvalidConfig(_)));
}

#[test]
fn blank_font_family_is_rejected() {
    let err = EditorConfig::from_json(r#"{"default_font_family": "  "}"#).unwrap_err();
    assert!(matches!(err, EditorError::InvalidConfig(_)));
}

#[test]
fn malformed_json_is_a_json_error() {
    let err = EditorConfig::from_json("{").unwrap_err();
    assert!(matches!(err, EditorError::Json(_)));
}
