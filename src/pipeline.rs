use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use log::{debug, info, warn};
use rayon::prelude::*;
use serde_json::Value;

use crate::catalog::ColumnCatalog;
use crate::config::PipelineConfig;
use crate::error::{FeatureError, FeatureResult};
use crate::flatten::{FlatRow, flatten_match};
use crate::history::{HistoryStore, StatFields};
use crate::payload::{MatchPayload, RawMatch};
use crate::pregame::{pregame_catalog, pregame_row};
use crate::table::{TypedTable, assemble};

#[derive(Debug, Clone, Default)]
pub struct IngestSummary {
    pub files_read: usize,
    pub matches_seen: usize,
    pub invalid_skipped: usize,
    pub mode_skipped: usize,
    pub duplicate_skipped: usize,
    pub flatten_failed: usize,
    pub rows: usize,
    pub batches_rejected: usize,
    pub history_appended: usize,
    pub history_duplicates: usize,
    /// Matches that could not be keyed into player history.
    pub history_skipped: usize,
    /// Matches left out of the pre-game table.
    pub pregame_skipped: usize,
    pub errors: Vec<String>,
}

#[derive(Debug)]
pub struct PipelineOutput {
    pub table: TypedTable,
    pub pregame: Option<TypedTable>,
    pub summary: IngestSummary,
}

/// `<prefix>1.json`, `<prefix>2.json`, ... up to the first gap.
pub fn backup_files(dir: &Path, prefix: &str) -> Vec<PathBuf> {
    (1..)
        .map(|n| dir.join(format!("{prefix}{n}.json")))
        .take_while(|path| path.is_file())
        .collect()
}

/// A backup file maps match ids to payloads, in fetch order. Entries that
/// are neither a match object nor the invalid marker come back as errors so
/// one bad entry does not sink the file.
pub fn read_batch(path: &Path) -> Result<Vec<(String, FeatureResult<MatchPayload>)>> {
    let raw = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let value: Value = serde_json::from_str(raw.trim())
        .with_context(|| format!("invalid json in {}", path.display()))?;
    let Value::Object(entries) = value else {
        return Err(anyhow!("{} is not a match_id -> match object", path.display()));
    };
    let mut out = Vec::with_capacity(entries.len());
    for (id, payload) in entries {
        out.push((id, MatchPayload::from_value(payload)));
    }
    Ok(out)
}

pub fn run(
    config: &PipelineConfig,
    catalog: &ColumnCatalog,
    store: &HistoryStore,
    fields: &StatFields,
) -> Result<PipelineOutput> {
    if config.build_pregame && config.window_size == 0 {
        return Err(FeatureError::InvalidWindow { size: 0 }.into());
    }
    let files = backup_files(&config.input_dir, &config.file_prefix);
    if files.is_empty() {
        return Err(anyhow!(
            "no {}1.json found in {}",
            config.file_prefix,
            config.input_dir.display()
        ));
    }

    let mut table = TypedTable::empty(catalog);
    let mut summary = IngestSummary::default();
    let mut seen_ids = HashSet::new();
    let mut kept_rows: Vec<FlatRow> = Vec::new();

    for path in &files {
        let batch = match read_batch(path) {
            Ok(batch) => batch,
            Err(err) if !config.fail_fast => {
                warn!("skipping {}: {err:#}", path.display());
                summary.errors.push(format!("{}: {err:#}", path.display()));
                continue;
            }
            Err(err) => return Err(err),
        };
        summary.files_read += 1;
        summary.matches_seen += batch.len();

        let mut selected: Vec<(String, RawMatch)> = Vec::with_capacity(batch.len());
        for (id, payload) in batch {
            let raw = match payload {
                Ok(MatchPayload::Match(raw)) => raw,
                Ok(MatchPayload::Invalid) => {
                    summary.invalid_skipped += 1;
                    continue;
                }
                Err(err) => {
                    debug!("match {id} unreadable: {err}");
                    summary.flatten_failed += 1;
                    summary.errors.push(format!("match {id}: {err}"));
                    continue;
                }
            };
            if let Some(mode) = config.game_mode
                && raw.game_mode() != Some(mode)
            {
                summary.mode_skipped += 1;
                continue;
            }
            if !seen_ids.insert(id.clone()) {
                summary.duplicate_skipped += 1;
                continue;
            }
            selected.push((id, raw));
        }

        let flattened = selected
            .par_iter()
            .map(|(id, raw)| (id, flatten_match(raw, catalog)))
            .collect::<Vec<_>>();
        let mut rows = Vec::with_capacity(flattened.len());
        for (id, result) in flattened {
            match result {
                Ok(row) => rows.push(row),
                Err(err) => {
                    debug!("match {id} not flattened: {err}");
                    summary.flatten_failed += 1;
                    summary.errors.push(format!("match {id}: {err}"));
                }
            }
        }
        if rows.is_empty() {
            info!("{}: no usable matches", path.display());
            continue;
        }

        match table.append_batch(&rows, catalog) {
            Ok(n) => summary.rows += n,
            Err(err) => {
                summary.batches_rejected += 1;
                summary.errors.push(format!("{}: {err}", path.display()));
                if config.fail_fast {
                    return Err(anyhow::Error::new(err)
                        .context(format!("batch {} rejected", path.display())));
                }
                warn!("batch {} rejected: {err}", path.display());
                continue;
            }
        }

        for row in &rows {
            ingest_history(store, row, catalog, fields, &mut summary);
        }
        if config.build_pregame {
            kept_rows.extend(rows);
        }
        info!("read {}: {} rows total", path.display(), table.row_count());
    }

    let pregame = if config.build_pregame {
        Some(build_pregame_table(
            &kept_rows,
            catalog,
            store,
            fields,
            config,
            &mut summary,
        )?)
    } else {
        None
    };

    Ok(PipelineOutput {
        table,
        pregame,
        summary,
    })
}

fn ingest_history(
    store: &HistoryStore,
    row: &FlatRow,
    catalog: &ColumnCatalog,
    fields: &StatFields,
    summary: &mut IngestSummary,
) {
    let outcomes = match store.ingest_match(row, catalog, fields) {
        Ok(outcomes) => outcomes,
        Err(err) => {
            warn!("history not updated: {err}");
            summary.history_skipped += 1;
            summary.errors.push(format!("history: {err}"));
            return;
        }
    };
    for outcome in outcomes {
        match outcome.result {
            Ok(()) => summary.history_appended += 1,
            Err(FeatureError::DuplicateTimestamp { .. }) => summary.history_duplicates += 1,
            Err(err) => summary.errors.push(format!("history slot {}: {err}", outcome.slot)),
        }
    }
}

fn build_pregame_table(
    rows: &[FlatRow],
    catalog: &ColumnCatalog,
    store: &HistoryStore,
    fields: &StatFields,
    config: &PipelineConfig,
    summary: &mut IngestSummary,
) -> Result<TypedTable> {
    let pregame = pregame_catalog(fields).context("build pre-game catalog")?;
    let results = rows
        .par_iter()
        .map(|row| pregame_row(row, catalog, store, fields, config.window_size, &pregame))
        .collect::<Vec<_>>();

    let mut pregame_rows = Vec::with_capacity(results.len());
    for result in results {
        match result {
            Ok(row) => pregame_rows.push(row),
            Err(err) => {
                warn!("pre-game row skipped: {err}");
                summary.pregame_skipped += 1;
                summary.errors.push(format!("pre-game: {err}"));
            }
        }
    }
    assemble(&pregame_rows, &pregame).context("assemble pre-game table")
}
