// MIT License - Copyright (c) 2026 Peter Wright
//
// Schema validation for the retained Home Assistant discovery payloads.
// Payloads are serialized from the real discovery builders and checked
// against the JSON Schema in schemas/mqtt/.

use ring2mqtt::device::DeviceIdent;
use ring2mqtt::devices::{chime, security_panel};
use ring2mqtt::Config;

fn load_validator() -> jsonschema::Validator {
    let path = format!(
        "{}/schemas/mqtt/discovery.schema.json",
        env!("CARGO_MANIFEST_DIR")
    );
    let text = std::fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("Failed to read schema {path}: {e}"));
    let schema: serde_json::Value = serde_json::from_str(&text)
        .unwrap_or_else(|e| panic!("Failed to parse schema {path}: {e}"));
    jsonschema::validator_for(&schema)
        .unwrap_or_else(|e| panic!("Failed to compile schema {path}: {e}"))
}

fn validate(validator: &jsonschema::Validator, instance: &serde_json::Value) {
    let errors: Vec<_> = validator.iter_errors(instance).collect();
    if !errors.is_empty() {
        let msgs: Vec<String> = errors.iter().map(|e| format!("  - {e}")).collect();
        panic!(
            "Schema validation failed:\n{}\nInstance: {}",
            msgs.join("\n"),
            serde_json::to_string_pretty(instance).unwrap()
        );
    }
}

fn test_config(enable_panic: bool) -> Config {
    let toml = format!(
        "[mqtt]\nurl = \"mqtt://localhost:1883\"\n\n[bridge]\nenable_panic = {enable_panic}\n"
    );
    Config::from_toml(&toml).unwrap()
}

fn panel_ident() -> DeviceIdent {
    DeviceIdent {
        device_id: "panel1".to_string(),
        location_id: "loc1".to_string(),
        name: "Home Alarm".to_string(),
    }
}

fn chime_ident() -> DeviceIdent {
    DeviceIdent {
        device_id: "chime1".to_string(),
        location_id: "loc1".to_string(),
        name: "Kitchen Chime".to_string(),
    }
}

#[test]
fn panel_discovery_payloads_match_schema() {
    let validator = load_validator();
    let (_, _, discovery) = security_panel::build_discovery(&test_config(false), &panel_ident());
    assert_eq!(discovery.len(), 3, "alarm, siren, bypass");
    for entry in &discovery {
        let value = serde_json::to_value(&entry.payload).unwrap();
        validate(&validator, &value);
    }
}

#[test]
fn panel_discovery_with_panic_switches_matches_schema() {
    let validator = load_validator();
    let (_, _, discovery) = security_panel::build_discovery(&test_config(true), &panel_ident());
    assert_eq!(discovery.len(), 5, "alarm, siren, bypass, police, fire");
    for entry in &discovery {
        let value = serde_json::to_value(&entry.payload).unwrap();
        validate(&validator, &value);
    }
}

#[test]
fn chime_discovery_payloads_match_schema() {
    let validator = load_validator();
    let (_, _, discovery) = chime::build_discovery(&test_config(false), &chime_ident());
    assert_eq!(discovery.len(), 2, "volume, snooze");
    for entry in &discovery {
        let value = serde_json::to_value(&entry.payload).unwrap();
        validate(&validator, &value);
    }
}

#[test]
fn config_topics_live_under_the_hass_prefix() {
    let config = test_config(true);
    let (_, _, panel) = security_panel::build_discovery(&config, &panel_ident());
    let (_, _, chime) = chime::build_discovery(&config, &chime_ident());
    for entry in panel.iter().chain(chime.iter()) {
        assert!(
            entry.config_topic.starts_with("homeassistant/"),
            "unexpected config topic: {}",
            entry.config_topic
        );
        assert!(entry.config_topic.ends_with("/config"));
    }
}

#[test]
fn discovery_builds_are_deterministic() {
    let config = test_config(true);
    let a = security_panel::build_discovery(&config, &panel_ident());
    let b = security_panel::build_discovery(&config, &panel_ident());
    let a_json: Vec<_> = a.2.iter().map(|e| serde_json::to_value(&e.payload).unwrap()).collect();
    let b_json: Vec<_> = b.2.iter().map(|e| serde_json::to_value(&e.payload).unwrap()).collect();
    assert_eq!(a_json, b_json);
}
