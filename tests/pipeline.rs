use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value, json};

use match_features::config::PipelineConfig;
use match_features::coerce::ColumnData;
use match_features::pipeline::{backup_files, run};
use match_features::{ColumnCatalog, HistoryStore, StatFields, export, history_db};

fn read_fixture(name: &str) -> Value {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    let raw = fs::read_to_string(path).expect("fixture file should be readable");
    serde_json::from_str(&raw).expect("fixture should be valid json")
}

fn fixture_match(match_id: i64, start_time: i64) -> Value {
    let mut value = read_fixture("match_small.json");
    value["match_id"] = json!(match_id);
    value["start_time"] = json!(start_time);
    value
}

fn write_backup(dir: &Path, n: usize, entries: Vec<(&str, Value)>) {
    let map = entries
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect::<Map<_, _>>();
    fs::write(
        dir.join(format!("backup_{n}.json")),
        serde_json::to_string(&Value::Object(map)).unwrap(),
    )
    .unwrap();
}

fn config(dir: &Path) -> PipelineConfig {
    PipelineConfig {
        input_dir: dir.to_path_buf(),
        build_pregame: true,
        ..PipelineConfig::default()
    }
}

#[test]
fn backup_files_stop_at_the_first_gap() {
    let dir = tempfile::tempdir().unwrap();
    for n in [1, 2, 4] {
        write_backup(dir.path(), n, vec![]);
    }
    let files = backup_files(dir.path(), "backup_");
    assert_eq!(files.len(), 2);
    assert!(files[1].ends_with("backup_2.json"));
}

#[test]
fn pipeline_builds_match_and_pregame_tables() {
    let dir = tempfile::tempdir().unwrap();
    let mut other_mode = fixture_match(3, 1_706_050_000);
    other_mode["game_mode"] = json!(1);
    let mut broken = fixture_match(4, 1_706_060_000);
    broken["players"][1]["player_slot"] = json!(0);

    write_backup(
        dir.path(),
        1,
        vec![
            ("1", fixture_match(1, 1_706_000_000)),
            ("9", json!("-1")),
            ("3", other_mode),
            ("4", broken),
        ],
    );
    write_backup(
        dir.path(),
        2,
        vec![
            ("2", fixture_match(2, 1_706_100_000)),
            ("1", fixture_match(1, 1_706_000_000)),
        ],
    );

    let catalog = ColumnCatalog::standard().unwrap();
    let store = HistoryStore::new();
    let fields = StatFields::default();
    let out = run(&config(dir.path()), &catalog, &store, &fields).unwrap();

    let summary = &out.summary;
    assert_eq!(summary.files_read, 2);
    assert_eq!(summary.matches_seen, 6);
    assert_eq!(summary.invalid_skipped, 1);
    assert_eq!(summary.mode_skipped, 1);
    assert_eq!(summary.duplicate_skipped, 1);
    assert_eq!(summary.flatten_failed, 1);
    assert_eq!(summary.rows, 2);
    assert_eq!(summary.batches_rejected, 0);
    assert_eq!(summary.history_appended, 18);

    assert_eq!(out.table.row_count(), 2);
    let ColumnData::Int(ids) = &out.table.column("match_id").unwrap().data else {
        panic!("match_id is an integer column");
    };
    assert_eq!(ids, &vec![Some(1), Some(2)]);

    let pregame = out.pregame.expect("pre-game table requested");
    assert_eq!(pregame.row_count(), 2);
    let ColumnData::Float(kills) = &pregame.column("kills_0").unwrap().data else {
        panic!("pre-game stats are floats");
    };
    let fixture = read_fixture("match_small.json");
    assert_eq!(kills[0], None);
    assert_eq!(kills[1], fixture["players"][0]["kills"].as_f64());
    let ColumnData::Text(heroes) = &pregame.column("hero_id_0").unwrap().data else {
        panic!("pre-game categories are text");
    };
    assert_eq!(heroes[1].as_deref(), Some("14"));
}

#[test]
fn match_without_start_time_stays_in_the_table_only() {
    let dir = tempfile::tempdir().unwrap();
    let mut undated = fixture_match(2, 0);
    undated.as_object_mut().unwrap().remove("start_time");
    write_backup(
        dir.path(),
        1,
        vec![("1", fixture_match(1, 1_706_000_000)), ("2", undated)],
    );

    let catalog = ColumnCatalog::standard().unwrap();
    let store = HistoryStore::new();
    let out = run(&config(dir.path()), &catalog, &store, &StatFields::default()).unwrap();

    assert_eq!(out.table.row_count(), 2);
    assert_eq!(out.table.column("start_time").unwrap().data.null_count(), 1);

    let summary = &out.summary;
    assert_eq!(summary.history_appended, 9);
    assert_eq!(summary.history_skipped, 1);
    assert_eq!(summary.pregame_skipped, 1);
    assert_eq!(
        summary
            .errors
            .iter()
            .filter(|e| e.contains("start_time"))
            .count(),
        2
    );
    assert_eq!(store.len(), 9);

    let pregame = out.pregame.expect("pre-game table requested");
    assert_eq!(pregame.row_count(), 1);
    let ColumnData::Int(ids) = &pregame.column("match_id").unwrap().data else {
        panic!("match_id is an integer column");
    };
    assert_eq!(ids, &vec![Some(1)]);
}

#[test]
fn zero_window_is_refused_before_reading() {
    let dir = tempfile::tempdir().unwrap();
    write_backup(dir.path(), 1, vec![("1", fixture_match(1, 1_706_000_000))]);
    let zero = PipelineConfig {
        window_size: 0,
        ..config(dir.path())
    };
    let catalog = ColumnCatalog::standard().unwrap();
    let result = run(&zero, &catalog, &HistoryStore::new(), &StatFields::default());
    assert!(result.is_err());
}

#[test]
fn bad_batch_is_skipped_unless_fail_fast() {
    let dir = tempfile::tempdir().unwrap();
    let mut bad = fixture_match(2, 1_706_100_000);
    bad["duration"] = json!("long");
    write_backup(dir.path(), 1, vec![("1", fixture_match(1, 1_706_000_000))]);
    write_backup(dir.path(), 2, vec![("2", bad)]);
    write_backup(dir.path(), 3, vec![("5", fixture_match(5, 1_706_200_000))]);

    let catalog = ColumnCatalog::standard().unwrap();
    let fields = StatFields::default();

    let out = run(&config(dir.path()), &catalog, &HistoryStore::new(), &fields).unwrap();
    assert_eq!(out.summary.batches_rejected, 1);
    assert_eq!(out.table.row_count(), 2);
    assert!(out.summary.errors.iter().any(|e| e.contains("duration")));

    let strict = PipelineConfig {
        fail_fast: true,
        ..config(dir.path())
    };
    assert!(run(&strict, &catalog, &HistoryStore::new(), &fields).is_err());
}

#[test]
fn missing_input_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = ColumnCatalog::standard().unwrap();
    let result = run(
        &config(dir.path()),
        &catalog,
        &HistoryStore::new(),
        &StatFields::default(),
    );
    assert!(result.is_err());
}

#[test]
fn outputs_persist_to_parquet_and_sqlite() {
    let dir = tempfile::tempdir().unwrap();
    write_backup(
        dir.path(),
        1,
        vec![
            ("1", fixture_match(1, 1_706_000_000)),
            ("2", fixture_match(2, 1_706_100_000)),
        ],
    );
    let catalog = ColumnCatalog::standard().unwrap();
    let store = HistoryStore::new();
    let out = run(&config(dir.path()), &catalog, &store, &StatFields::default()).unwrap();

    let parquet = dir.path().join("out").join("matches.parquet");
    assert_eq!(export::write_parquet(&out.table, &parquet).unwrap(), 2);
    let pregame_path = dir.path().join("out").join("pregame.parquet");
    assert_eq!(
        export::write_parquet(out.pregame.as_ref().unwrap(), &pregame_path).unwrap(),
        2
    );

    let db_path = dir.path().join("history.sqlite");
    let mut conn = history_db::open_db(&db_path).unwrap();
    assert_eq!(history_db::save_store(&mut conn, &store).unwrap(), 18);
    let reloaded = history_db::load_store(&conn).unwrap();
    assert_eq!(reloaded.len(), store.len());
    assert_eq!(reloaded.accounts(), store.accounts());
}
