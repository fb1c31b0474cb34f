//! Ledger session: one open SQLite connection and the queries the pipeline
//! runs against it.
//!
//! A session is opened per batch window and dropped when the window is
//! done. Every multi-row write runs in a single transaction, so a failure
//! leaves the window exactly as it was before.

use std::path::{Path, PathBuf};

use chrono::Utc;
use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use tracing::debug;

use super::models::{
    InputRecord, MetadataRecord, NewInput, NewMetadata, NewOutput, OutputRecord,
};
use super::pool::{establish, DieselError, LedgerError};
use crate::models::{ExtractionResult, Granularity, SourceAsset, Window};
use crate::schema::{transcription_input, transcription_metadata, transcription_output};

const SCHEMA_SQL: &str = include_str!("schema_sqlite.sql");

const DROP_SQL: &str = "
DROP TABLE IF EXISTS transcription_metadata;
DROP TABLE IF EXISTS transcription_output;
DROP TABLE IF EXISTS transcription_input;
";

#[derive(QueryableByName)]
struct LastInsertRowId {
    #[diesel(sql_type = diesel::sql_types::BigInt, column_name = "last_insert_rowid()")]
    id: i64,
}

/// A file to register as a source asset.
#[derive(Debug, Clone, PartialEq)]
pub struct AssetRegistration {
    pub input_file: PathBuf,
    pub subject_id: Option<String>,
}

/// An extraction result together with the asset it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputWithAsset {
    pub asset: SourceAsset,
    pub output: ExtractionResult,
}

/// Paths produced by the scrub stage for one output row.
#[derive(Debug, Clone, PartialEq)]
pub struct ScrubUpdate {
    pub output_id: i32,
    pub scrubbed_file: PathBuf,
    pub confidence_file: PathBuf,
}

/// Path produced by the list replacement stage for one output row.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplacementUpdate {
    pub output_id: i32,
    pub replaced_file: PathBuf,
}

fn path_str(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Open connection to the transcription ledger.
pub struct LedgerSession {
    conn: SqliteConnection,
}

impl LedgerSession {
    pub fn open(database_url: &str) -> Result<Self, LedgerError> {
        Ok(Self {
            conn: establish(database_url)?,
        })
    }

    /// Create all ledger tables and indexes if they do not exist.
    pub fn install_schema(&mut self) -> Result<(), LedgerError> {
        self.conn.batch_execute(SCHEMA_SQL)?;
        Ok(())
    }

    /// Drop all ledger tables.
    pub fn drop_schema(&mut self) -> Result<(), LedgerError> {
        self.conn.batch_execute(DROP_SQL)?;
        Ok(())
    }

    /// Register files as source assets, each with a metadata row carrying
    /// its subject ID. Returns the new asset IDs in input order.
    pub fn register_assets(
        &mut self,
        document_type: Granularity,
        files: &[AssetRegistration],
    ) -> Result<Vec<i32>, LedgerError> {
        let now = Utc::now().to_rfc3339();
        let ids = self.conn.transaction::<_, DieselError, _>(|conn| {
            let mut ids = Vec::with_capacity(files.len());
            for file in files {
                let input_file = path_str(&file.input_file);
                diesel::insert_into(transcription_input::table)
                    .values(NewInput {
                        document_type: document_type.as_str(),
                        input_file: &input_file,
                        created_at: &now,
                    })
                    .execute(conn)?;
                let row: LastInsertRowId =
                    diesel::sql_query("SELECT last_insert_rowid()").get_result(conn)?;
                let input_id = row.id as i32;

                diesel::insert_into(transcription_metadata::table)
                    .values(NewMetadata {
                        input_id,
                        subject_id: file.subject_id.as_deref(),
                        year_in_study: None,
                        visit_date: None,
                    })
                    .execute(conn)?;
                ids.push(input_id);
            }
            Ok(ids)
        })?;

        debug!("Registered {} {} asset(s)", ids.len(), document_type);
        Ok(ids)
    }

    /// Assets of `document_type` with a `.pdf` input file and no result
    /// carrying an output file yet, in ID order, bounded by the window.
    pub fn select_pending(
        &mut self,
        document_type: Granularity,
        window: Window,
    ) -> Result<Vec<SourceAsset>, LedgerError> {
        let completed = transcription_output::table
            .filter(transcription_output::ocr_output_file.is_not_null())
            .select(transcription_output::input_id);

        let records = transcription_input::table
            .filter(transcription_input::document_type.eq(document_type.as_str()))
            .filter(transcription_input::input_file.like("%.pdf"))
            .filter(transcription_input::id.ne_all(completed))
            .order(transcription_input::id.asc())
            .limit(window.limit())
            .offset(window.sql_offset())
            .select(InputRecord::as_select())
            .load(&mut self.conn)?;

        Ok(records.into_iter().map(SourceAsset::from).collect())
    }

    /// Insert a window's results in one transaction.
    pub fn persist_results(&mut self, results: &[ExtractionResult]) -> Result<usize, LedgerError> {
        let now = Utc::now().to_rfc3339();
        let inserted = self.conn.transaction::<_, DieselError, _>(|conn| {
            let mut inserted = 0;
            for result in results {
                inserted += diesel::insert_into(transcription_output::table)
                    .values(NewOutput::from_result(result, &now))
                    .execute(conn)?;
            }
            Ok(inserted)
        })?;
        Ok(inserted)
    }

    pub fn get_asset(&mut self, id: i32) -> Result<Option<SourceAsset>, LedgerError> {
        let record = transcription_input::table
            .find(id)
            .select(InputRecord::as_select())
            .first(&mut self.conn)
            .optional()?;
        Ok(record.map(SourceAsset::from))
    }

    pub fn list_assets(
        &mut self,
        document_type: Granularity,
    ) -> Result<Vec<SourceAsset>, LedgerError> {
        let records = transcription_input::table
            .filter(transcription_input::document_type.eq(document_type.as_str()))
            .order(transcription_input::id.asc())
            .select(InputRecord::as_select())
            .load(&mut self.conn)?;
        Ok(records.into_iter().map(SourceAsset::from).collect())
    }

    pub fn results_for_asset(
        &mut self,
        input_id: i32,
    ) -> Result<Vec<ExtractionResult>, LedgerError> {
        let records = transcription_output::table
            .filter(transcription_output::input_id.eq(input_id))
            .order((
                transcription_output::page.asc(),
                transcription_output::block.asc(),
                transcription_output::id.asc(),
            ))
            .select(OutputRecord::as_select())
            .load(&mut self.conn)?;
        Ok(records.into_iter().map(ExtractionResult::from).collect())
    }

    pub fn metadata_for_asset(
        &mut self,
        input_id: i32,
    ) -> Result<Option<MetadataRecord>, LedgerError> {
        Ok(transcription_metadata::table
            .filter(transcription_metadata::input_id.eq(input_id))
            .select(MetadataRecord::as_select())
            .first(&mut self.conn)
            .optional()?)
    }

    /// Outputs with a text artifact that have not been scrubbed yet.
    pub fn outputs_needing_scrub(
        &mut self,
        document_type: Granularity,
        window: Window,
    ) -> Result<Vec<OutputWithAsset>, LedgerError> {
        let rows = transcription_output::table
            .inner_join(transcription_input::table)
            .filter(transcription_input::document_type.eq(document_type.as_str()))
            .filter(transcription_output::ocr_output_file.is_not_null())
            .filter(transcription_output::pii_scrubber_output_file.is_null())
            .order(transcription_output::id.asc())
            .limit(window.limit())
            .offset(window.sql_offset())
            .select((InputRecord::as_select(), OutputRecord::as_select()))
            .load::<(InputRecord, OutputRecord)>(&mut self.conn)?;
        Ok(rows.into_iter().map(into_output_with_asset).collect())
    }

    /// Every output with a text artifact.
    pub fn outputs_with_text(
        &mut self,
        document_type: Granularity,
        window: Window,
    ) -> Result<Vec<OutputWithAsset>, LedgerError> {
        let rows = transcription_output::table
            .inner_join(transcription_input::table)
            .filter(transcription_input::document_type.eq(document_type.as_str()))
            .filter(transcription_output::ocr_output_file.is_not_null())
            .order(transcription_output::id.asc())
            .limit(window.limit())
            .offset(window.sql_offset())
            .select((InputRecord::as_select(), OutputRecord::as_select()))
            .load::<(InputRecord, OutputRecord)>(&mut self.conn)?;
        Ok(rows.into_iter().map(into_output_with_asset).collect())
    }

    pub fn record_scrub_outputs(&mut self, updates: &[ScrubUpdate]) -> Result<usize, LedgerError> {
        let updated = self.conn.transaction::<_, DieselError, _>(|conn| {
            let mut updated = 0;
            for update in updates {
                updated += diesel::update(transcription_output::table.find(update.output_id))
                    .set((
                        transcription_output::pii_scrubber_output_file
                            .eq(Some(path_str(&update.scrubbed_file))),
                        transcription_output::pii_scrubber_confidence_file
                            .eq(Some(path_str(&update.confidence_file))),
                    ))
                    .execute(conn)?;
            }
            Ok(updated)
        })?;
        Ok(updated)
    }

    pub fn record_list_replacements(
        &mut self,
        updates: &[ReplacementUpdate],
    ) -> Result<usize, LedgerError> {
        let updated = self.conn.transaction::<_, DieselError, _>(|conn| {
            let mut updated = 0;
            for update in updates {
                updated += diesel::update(transcription_output::table.find(update.output_id))
                    .set(
                        transcription_output::list_replacement_output_file
                            .eq(Some(path_str(&update.replaced_file))),
                    )
                    .execute(conn)?;
            }
            Ok(updated)
        })?;
        Ok(updated)
    }

    /// Delete an asset. Its outputs and metadata go with it through the
    /// schema's `ON DELETE CASCADE`.
    pub fn delete_asset(&mut self, id: i32) -> Result<bool, LedgerError> {
        let deleted = diesel::delete(transcription_input::table.find(id)).execute(&mut self.conn)?;
        debug!("Deleted asset {} ({} row)", id, deleted);
        Ok(deleted > 0)
    }
}

fn into_output_with_asset((input, output): (InputRecord, OutputRecord)) -> OutputWithAsset {
    OutputWithAsset {
        asset: input.into(),
        output: output.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UnitStatus;
    use tempfile::{tempdir, TempDir};

    fn setup_ledger() -> (LedgerSession, TempDir) {
        let dir = tempdir().unwrap();
        let url = dir.path().join("ledger.db").display().to_string();
        let mut ledger = LedgerSession::open(&url).unwrap();
        ledger.install_schema().unwrap();
        (ledger, dir)
    }

    fn registration(path: &str, subject: &str) -> AssetRegistration {
        AssetRegistration {
            input_file: PathBuf::from(path),
            subject_id: Some(subject.to_string()),
        }
    }

    fn written(input_id: i32, page: u32, file: &str) -> ExtractionResult {
        let mut result = ExtractionResult::new(input_id, page, 0, UnitStatus::Processed);
        result.ocr_output_file = Some(PathBuf::from(file));
        result.ocr_confidence = Some(90.0);
        result
    }

    #[test]
    fn test_register_assets_writes_metadata() {
        let (mut ledger, _dir) = setup_ledger();
        let ids = ledger
            .register_assets(
                Granularity::Page,
                &[
                    registration("/r/094-000001/a.pdf", "094-000001"),
                    registration("/r/094-000002/b.pdf", "094-000002"),
                ],
            )
            .unwrap();
        assert_eq!(ids.len(), 2);

        let asset = ledger.get_asset(ids[1]).unwrap().unwrap();
        assert_eq!(asset.document_type, Granularity::Page);
        assert_eq!(asset.input_file, PathBuf::from("/r/094-000002/b.pdf"));

        let meta = ledger.metadata_for_asset(ids[1]).unwrap().unwrap();
        assert_eq!(meta.subject_id.as_deref(), Some("094-000002"));
    }

    #[test]
    fn test_select_pending_filters_type_extension_and_completed() {
        let (mut ledger, _dir) = setup_ledger();
        let page_ids = ledger
            .register_assets(
                Granularity::Page,
                &[
                    registration("/r/a.pdf", "094-000001"),
                    registration("/r/b.tif", "094-000001"),
                    registration("/r/c.pdf", "094-000001"),
                    registration("/r/d.pdf", "094-000001"),
                ],
            )
            .unwrap();
        ledger
            .register_assets(Granularity::Block, &[registration("/r/e.pdf", "094-000001")])
            .unwrap();

        // a.pdf has output, c.pdf only has a blank row.
        ledger
            .persist_results(&[
                written(page_ids[0], 1, "/out/a-1-0.txt"),
                ExtractionResult::new(page_ids[2], 1, 0, UnitStatus::Processed),
            ])
            .unwrap();

        let pending = ledger
            .select_pending(Granularity::Page, Window::new(0, 10))
            .unwrap();
        let files: Vec<_> = pending.iter().map(|a| a.input_file.clone()).collect();
        assert_eq!(files, vec![PathBuf::from("/r/c.pdf"), PathBuf::from("/r/d.pdf")]);

        let windowed = ledger
            .select_pending(Granularity::Page, Window::new(1, 1))
            .unwrap();
        assert_eq!(windowed.len(), 1);
        assert_eq!(windowed[0].input_file, PathBuf::from("/r/d.pdf"));
    }

    #[test]
    fn test_unique_output_per_unit() {
        let (mut ledger, _dir) = setup_ledger();
        let ids = ledger
            .register_assets(Granularity::Page, &[registration("/r/a.pdf", "094-000001")])
            .unwrap();

        let err = ledger
            .persist_results(&[
                written(ids[0], 1, "/out/a-1-0.txt"),
                written(ids[0], 1, "/out/a-1-0.txt"),
            ])
            .unwrap_err();
        assert!(matches!(err, LedgerError::Query(_)));

        // The failed transaction left nothing behind.
        assert!(ledger.results_for_asset(ids[0]).unwrap().is_empty());

        // Rows without an output file are not constrained.
        ledger
            .persist_results(&[
                ExtractionResult::new(ids[0], 1, 0, UnitStatus::Error),
                ExtractionResult::new(ids[0], 1, 0, UnitStatus::Error),
            ])
            .unwrap();
        assert_eq!(ledger.results_for_asset(ids[0]).unwrap().len(), 2);
    }

    #[test]
    fn test_scrub_and_replacement_updates() {
        let (mut ledger, _dir) = setup_ledger();
        let ids = ledger
            .register_assets(Granularity::Page, &[registration("/r/a.pdf", "094-000001")])
            .unwrap();
        ledger
            .persist_results(&[
                written(ids[0], 1, "/out/a-1-0.txt"),
                written(ids[0], 2, "/out/a-2-0.txt"),
                ExtractionResult::new(ids[0], 3, 0, UnitStatus::Processed),
            ])
            .unwrap();

        let todo = ledger
            .outputs_needing_scrub(Granularity::Page, Window::default())
            .unwrap();
        assert_eq!(todo.len(), 2);
        assert_eq!(todo[0].asset.id, ids[0]);

        ledger
            .record_scrub_outputs(&[ScrubUpdate {
                output_id: todo[0].output.id,
                scrubbed_file: PathBuf::from("/out/s/a-1-0.txt"),
                confidence_file: PathBuf::from("/out/c/confidence-a-1-0.json"),
            }])
            .unwrap();
        let todo = ledger
            .outputs_needing_scrub(Granularity::Page, Window::default())
            .unwrap();
        assert_eq!(todo.len(), 1);
        assert_eq!(todo[0].output.page, 2);

        let with_text = ledger
            .outputs_with_text(Granularity::Page, Window::default())
            .unwrap();
        assert_eq!(with_text.len(), 2);
        ledger
            .record_list_replacements(&[ReplacementUpdate {
                output_id: with_text[1].output.id,
                replaced_file: PathBuf::from("/out/l/a-2-0.txt"),
            }])
            .unwrap();
        let results = ledger.results_for_asset(ids[0]).unwrap();
        assert_eq!(
            results[1].list_replacement_output_file,
            Some(PathBuf::from("/out/l/a-2-0.txt"))
        );
        assert_eq!(results[1].ocr_output_file, Some(PathBuf::from("/out/a-2-0.txt")));
    }

    #[test]
    fn test_delete_asset_cascades_to_children() {
        let (mut ledger, _dir) = setup_ledger();
        let ids = ledger
            .register_assets(Granularity::Page, &[registration("/r/a.pdf", "094-000001")])
            .unwrap();
        ledger
            .persist_results(&[written(ids[0], 1, "/out/a-1-0.txt")])
            .unwrap();

        assert!(ledger.delete_asset(ids[0]).unwrap());
        assert!(ledger.get_asset(ids[0]).unwrap().is_none());
        assert!(ledger.results_for_asset(ids[0]).unwrap().is_empty());
        assert!(ledger.metadata_for_asset(ids[0]).unwrap().is_none());
        assert!(!ledger.delete_asset(ids[0]).unwrap());
    }

    #[test]
    fn test_drop_schema_then_reinstall() {
        let (mut ledger, _dir) = setup_ledger();
        ledger.drop_schema().unwrap();
        assert!(ledger.list_assets(Granularity::Page).is_err());
        ledger.install_schema().unwrap();
        assert!(ledger.list_assets(Granularity::Page).unwrap().is_empty());
    }
}
