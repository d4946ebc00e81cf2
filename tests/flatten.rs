use std::collections::BTreeSet;
use std::fs;
use std::path::PathBuf;

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde_json::{Value, json};

use match_features::catalog::{GroupKind, PLAYER_FIELDS};
use match_features::{ColumnCatalog, FeatureError, MatchPayload, flatten};

fn read_fixture(name: &str) -> Value {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    let raw = fs::read_to_string(path).expect("fixture file should be readable");
    serde_json::from_str(&raw).expect("fixture should be valid json")
}

fn payload(value: Value) -> MatchPayload {
    MatchPayload::from_value(value).expect("fixture should be a match")
}

#[test]
fn row_has_exactly_the_catalog_columns() {
    let catalog = ColumnCatalog::standard().unwrap();
    let row = flatten(&payload(read_fixture("match_small.json")), &catalog).unwrap();
    assert_eq!(row.len(), catalog.len());

    let keys = row.to_object(&catalog).keys().cloned().collect::<BTreeSet<_>>();
    let names = catalog.names().map(str::to_string).collect::<BTreeSet<_>>();
    assert_eq!(keys, names);
    assert!(!catalog.contains("chat"));
    assert!(!catalog.contains("objectives"));
}

#[test]
fn flatten_is_deterministic() {
    let catalog = ColumnCatalog::standard().unwrap();
    let p = payload(read_fixture("match_small.json"));
    assert_eq!(flatten(&p, &catalog).unwrap(), flatten(&p, &catalog).unwrap());
}

#[test]
fn draft_arrival_order_does_not_matter() {
    let catalog = ColumnCatalog::standard().unwrap();
    let base = read_fixture("match_small.json");
    let expected = flatten(&payload(base.clone()), &catalog).unwrap();

    for seed in 0..8u64 {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut shuffled = base.clone();
        shuffled["draft_timings"]
            .as_array_mut()
            .unwrap()
            .shuffle(&mut rng);
        let row = flatten(&payload(shuffled), &catalog).unwrap();
        assert_eq!(row, expected, "seed {seed}");
    }
}

#[test]
fn draft_slots_follow_order() {
    let catalog = ColumnCatalog::standard().unwrap();
    let base = read_fixture("match_small.json");
    let row = flatten(&payload(base.clone()), &catalog).unwrap();

    let events = base["draft_timings"].as_array().unwrap();
    let first = events.iter().find(|e| e["order"] == json!(0)).unwrap();
    assert_eq!(row.get(&catalog, "draft_order_0").unwrap(), &json!(0));
    assert_eq!(row.get(&catalog, "draft_hero_id_0").unwrap(), &first["hero_id"]);
    assert_eq!(row.get(&catalog, "draft_order_21").unwrap(), &json!(21));
    // 22 events in the fixture, 25 slots in the schema.
    assert_eq!(row.get(&catalog, "draft_order_22").unwrap(), &Value::Null);
    assert_eq!(row.get(&catalog, "draft_hero_id_24").unwrap(), &Value::Null);
}

#[test]
fn duplicate_draft_order_is_rejected() {
    let catalog = ColumnCatalog::standard().unwrap();
    let mut value = read_fixture("match_small.json");
    let events = value["draft_timings"].as_array_mut().unwrap();
    events[1]["order"] = events[0]["order"].clone();
    let err = flatten(&payload(value), &catalog).unwrap_err();
    assert!(matches!(err, FeatureError::InvalidMatch { .. }));
}

#[test]
fn missing_players_leave_their_slots_null() {
    let catalog = ColumnCatalog::standard().unwrap();
    let mut value = read_fixture("match_small.json");
    value["players"].as_array_mut().unwrap().truncate(8);
    let row = flatten(&payload(value), &catalog).unwrap();

    let players = catalog.group(GroupKind::Players).unwrap();
    for slot in 8..12 {
        for (field, _) in PLAYER_FIELDS {
            let name = players.column_name(field, slot);
            assert_eq!(row.get(&catalog, &name).unwrap(), &Value::Null, "{name}");
        }
    }
    // Dire tags 128..=130 land on 5..=7.
    for slot in 0..8 {
        let name = players.column_name("player_slot", slot);
        assert_ne!(row.get(&catalog, &name).unwrap(), &Value::Null, "{name}");
    }
    assert_eq!(row.get(&catalog, "player_slot_5").unwrap(), &json!(128));
}

#[test]
fn advantage_series_stop_at_their_length() {
    let catalog = ColumnCatalog::standard().unwrap();
    let value = read_fixture("match_small.json");
    let row = flatten(&payload(value.clone()), &catalog).unwrap();

    let gold = value["radiant_gold_adv"].as_array().unwrap();
    let last = gold.len() - 1;
    assert_eq!(
        row.get(&catalog, &format!("radiant_gold_adv_{last}")).unwrap(),
        &gold[last]
    );
    assert_eq!(
        row.get(&catalog, &format!("radiant_gold_adv_{}", gold.len()))
            .unwrap(),
        &Value::Null
    );
    assert_eq!(
        row.get(&catalog, "radiant_xp_adv_0").unwrap(),
        &value["radiant_xp_adv"][0]
    );
}

#[test]
fn invalid_marker_is_rejected() {
    let catalog = ColumnCatalog::standard().unwrap();
    for marker in [json!("-1"), json!(-1), Value::Null] {
        let p = MatchPayload::from_value(marker.clone()).unwrap();
        assert!(p.is_invalid(), "{marker}");
        let err = flatten(&p, &catalog).unwrap_err();
        assert!(matches!(err, FeatureError::InvalidMatch { .. }), "{marker}");
    }
}

#[test]
fn unknown_column_lookup_fails() {
    let catalog = ColumnCatalog::standard().unwrap();
    let row = flatten(&payload(read_fixture("match_small.json")), &catalog).unwrap();
    let err = row.get(&catalog, "kills_12").unwrap_err();
    assert_eq!(err.column(), Some("kills_12"));
}
