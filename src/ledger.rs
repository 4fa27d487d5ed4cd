use std::fs;
use std::io::Write;
use std::path::PathBuf;

use serde::Serialize;

use crate::config::AppConfig;
use crate::error::{IntakeError, Result};
use crate::mirror::{DriveMirror, MirrorStatus};
use crate::model::IntakeRecord;
use crate::util::utc_timestamp;

pub(crate) const LEDGER_COLUMNS: [&str; 9] = [
    "timestamp",
    "date",
    "stream",
    "founder_name",
    "venture_name",
    "venture_manager_name",
    "password",
    "link",
    "comments",
];

/// Persisted projection of an intake record plus the server-assigned
/// timestamp. Written once, never mutated or deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct LedgerRow {
    pub(crate) timestamp: String,
    pub(crate) date: String,
    pub(crate) stream: String,
    pub(crate) founder_name: String,
    pub(crate) venture_name: String,
    pub(crate) venture_manager_name: String,
    pub(crate) password: String,
    pub(crate) link: String,
    pub(crate) comments: String,
}

impl LedgerRow {
    pub(crate) fn from_record(record: &IntakeRecord, timestamp: String) -> Self {
        LedgerRow {
            timestamp,
            date: record.date.format("%Y-%m-%d").to_string(),
            stream: record.stream.clone(),
            founder_name: record.founder_name.clone(),
            venture_name: record.venture_name.clone(),
            venture_manager_name: record.venture_manager_name.clone(),
            password: record.password.clone(),
            link: record.link.to_string(),
            comments: record.comments.clone().unwrap_or_default(),
        }
    }

    fn fields(&self) -> [&str; 9] {
        [
            &self.timestamp,
            &self.date,
            &self.stream,
            &self.founder_name,
            &self.venture_name,
            &self.venture_manager_name,
            &self.password,
            &self.link,
            &self.comments,
        ]
    }

    fn from_fields(fields: &[String]) -> Self {
        LedgerRow {
            timestamp: fields[0].clone(),
            date: fields[1].clone(),
            stream: fields[2].clone(),
            founder_name: fields[3].clone(),
            venture_name: fields[4].clone(),
            venture_manager_name: fields[5].clone(),
            password: fields[6].clone(),
            link: fields[7].clone(),
            comments: fields[8].clone(),
        }
    }
}

/// What one submission produced: the persisted row and the mirror outcome.
#[derive(Debug, Clone)]
pub(crate) struct AppendReceipt {
    pub(crate) row: LedgerRow,
    pub(crate) mirror: MirrorStatus,
}

/// Append-only CSV ledger. Appends are a single open-for-append write of
/// one encoded row, so concurrent writers interleave rows instead of
/// overwriting each other.
pub(crate) struct LedgerStore {
    data_dir: PathBuf,
    ledger_path: PathBuf,
    remote_name: String,
    mirror: DriveMirror,
}

impl LedgerStore {
    pub(crate) fn new(config: &AppConfig) -> Self {
        LedgerStore {
            data_dir: config.data_dir.clone(),
            ledger_path: config.ledger_path(),
            remote_name: config.remote_name.clone(),
            mirror: DriveMirror::new(config),
        }
    }

    pub(crate) fn ledger_path(&self) -> &PathBuf {
        &self.ledger_path
    }

    /// Idempotently creates the storage location.
    pub(crate) fn ensure_ready(&self) -> Result<()> {
        fs::create_dir_all(&self.data_dir).map_err(|e| IntakeError::io(e, &self.data_dir))
    }

    /// Stamps and persists one row, then attempts a best-effort mirror
    /// sync. The local write is the durable source of truth; a mirror
    /// failure is logged and reported but never fails the append.
    pub(crate) fn append(&self, record: &IntakeRecord) -> Result<AppendReceipt> {
        self.ensure_ready()?;
        let row = LedgerRow::from_record(record, utc_timestamp());

        // Header probe and row land in one write call, so concurrent
        // appends to an existing file cannot splice into each other.
        let mut payload = String::new();
        if !self.ledger_path.exists() {
            payload.push_str(&encode_row(&LEDGER_COLUMNS));
        }
        payload.push_str(&encode_row(&row.fields()));

        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.ledger_path)
            .map_err(|e| IntakeError::io(e, &self.ledger_path))?;
        file.write_all(payload.as_bytes())
            .map_err(|e| IntakeError::io(e, &self.ledger_path))?;

        let mirror = self.try_mirror();
        Ok(AppendReceipt { row, mirror })
    }

    fn try_mirror(&self) -> MirrorStatus {
        match self.mirror.sync(&self.ledger_path, &self.remote_name) {
            Ok(outcome) => {
                eprintln!(
                    "[mirror] ledger synced to Drive (file id {}, {})",
                    outcome.file_id,
                    if outcome.created { "created" } else { "updated" }
                );
                MirrorStatus::Synced(outcome)
            }
            Err(err) if err.is_mirror_side() => {
                eprintln!("[mirror] sync skipped: {err}");
                MirrorStatus::Skipped {
                    reason: err.to_string(),
                }
            }
            Err(err) => {
                // Local read failures while uploading are mirror-fatal
                // only; the appended row is already durable.
                eprintln!("[mirror] sync failed: {err}");
                MirrorStatus::Skipped {
                    reason: err.to_string(),
                }
            }
        }
    }

    /// Reads the full ledger back. A missing file is an empty ledger.
    pub(crate) fn load(&self) -> Result<Vec<LedgerRow>> {
        if !self.ledger_path.exists() {
            return Ok(Vec::new());
        }
        let text = fs::read_to_string(&self.ledger_path)
            .map_err(|e| IntakeError::io(e, &self.ledger_path))?;
        parse_ledger(&text)
    }
}

// ── CSV codec ───────────────────────────────────────────────────────────

/// Fields containing separator, quote or line-break characters are quoted
/// with internal quotes doubled.
pub(crate) fn escape_csv_field(field: &str) -> String {
    if field.contains(['"', ',', '\n', '\r']) {
        let mut out = String::with_capacity(field.len() + 2);
        out.push('"');
        for ch in field.chars() {
            if ch == '"' {
                out.push('"');
            }
            out.push(ch);
        }
        out.push('"');
        out
    } else {
        field.to_string()
    }
}

pub(crate) fn encode_row(fields: &[&str]) -> String {
    let mut row = fields
        .iter()
        .map(|f| escape_csv_field(f))
        .collect::<Vec<_>>()
        .join(",");
    row.push('\n');
    row
}

/// Minimal CSV reader: quoted fields, doubled quotes, quoted line breaks.
/// Returns each record with the line number it started on.
fn parse_csv(text: &str) -> Result<Vec<(usize, Vec<String>)>> {
    let mut records = Vec::new();
    let mut fields: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut line = 1usize;
    let mut record_line = 1usize;
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        if in_quotes {
            match ch {
                '"' => {
                    if chars.peek() == Some(&'"') {
                        chars.next();
                        field.push('"');
                    } else {
                        in_quotes = false;
                    }
                }
                '\n' => {
                    line += 1;
                    field.push('\n');
                }
                _ => field.push(ch),
            }
        } else {
            match ch {
                '"' => {
                    if field.is_empty() {
                        in_quotes = true;
                    } else {
                        return Err(IntakeError::CorruptLedger {
                            line,
                            reason: "quote inside unquoted field".to_string(),
                        });
                    }
                }
                ',' => fields.push(std::mem::take(&mut field)),
                '\r' => {}
                '\n' => {
                    line += 1;
                    fields.push(std::mem::take(&mut field));
                    records.push((record_line, std::mem::take(&mut fields)));
                    record_line = line;
                }
                _ => field.push(ch),
            }
        }
    }

    if in_quotes {
        return Err(IntakeError::CorruptLedger {
            line,
            reason: "unterminated quoted field".to_string(),
        });
    }
    if !field.is_empty() || !fields.is_empty() {
        fields.push(field);
        records.push((record_line, fields));
    }
    Ok(records)
}

pub(crate) fn parse_ledger(text: &str) -> Result<Vec<LedgerRow>> {
    let mut records = parse_csv(text)?.into_iter();

    let Some((line, header)) = records.next() else {
        return Err(IntakeError::CorruptLedger {
            line: 1,
            reason: "missing header row".to_string(),
        });
    };
    if header.len() != LEDGER_COLUMNS.len()
        || header.iter().zip(LEDGER_COLUMNS).any(|(a, b)| a != b)
    {
        return Err(IntakeError::CorruptLedger {
            line,
            reason: format!("unexpected header: {}", header.join(",")),
        });
    }

    let mut rows = Vec::new();
    for (line, fields) in records {
        if fields.len() != LEDGER_COLUMNS.len() {
            return Err(IntakeError::CorruptLedger {
                line,
                reason: format!(
                    "expected {} fields, found {}",
                    LEDGER_COLUMNS.len(),
                    fields.len()
                ),
            });
        }
        rows.push(LedgerRow::from_fields(&fields));
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LEDGER_FILENAME;
    use crate::model::{IntakeRecord, sample_raw};

    fn temp_store(name: &str) -> (LedgerStore, PathBuf) {
        let dir = std::env::temp_dir().join(format!(
            "intakeledger_ledger_{}_{name}",
            std::process::id()
        ));
        std::fs::remove_dir_all(&dir).ok();
        let config = AppConfig {
            data_dir: dir.clone(),
            credentials_path: dir.join("credentials.json"),
            token_path: dir.join("token.json"),
            auth_code: None,
            remote_folder: "Intake Ledger".to_string(),
            remote_name: LEDGER_FILENAME.to_string(),
        };
        (LedgerStore::new(&config), dir)
    }

    fn sample_record() -> IntakeRecord {
        IntakeRecord::from_raw(&sample_raw()).unwrap()
    }

    #[test]
    fn escape_plain_field_unchanged() {
        assert_eq!(escape_csv_field("Jane Doe"), "Jane Doe");
    }

    #[test]
    fn escape_comma_quotes_the_field() {
        assert_eq!(escape_csv_field("Doe, Jane"), "\"Doe, Jane\"");
    }

    #[test]
    fn escape_doubles_quotes() {
        assert_eq!(escape_csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn escape_newline_quotes_the_field() {
        assert_eq!(escape_csv_field("a\nb"), "\"a\nb\"");
    }

    #[test]
    fn ensure_ready_is_idempotent() {
        let (store, dir) = temp_store("ensure_ready");
        store.ensure_ready().unwrap();
        store.ensure_ready().unwrap();
        assert!(dir.is_dir());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn fresh_file_is_header_plus_one_row() {
        let (store, dir) = temp_store("fresh");
        let receipt = store.append(&sample_record()).unwrap();
        assert!(matches!(receipt.mirror, MirrorStatus::Skipped { .. }));

        let text = std::fs::read_to_string(store.ledger_path()).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("timestamp,date,stream,founder_name,venture_name,venture_manager_name,password,link,comments")
        );
        assert!(lines.next().is_some());
        assert_eq!(lines.next(), None);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn sequential_appends_preserve_order_and_timestamps() {
        let (store, dir) = temp_store("sequential");
        let mut raw = sample_raw();
        for i in 0..5 {
            raw.venture_name = format!("Venture {i}");
            store
                .append(&IntakeRecord::from_raw(&raw).unwrap())
                .unwrap();
        }
        let rows = store.load().unwrap();
        assert_eq!(rows.len(), 5);
        for (i, row) in rows.iter().enumerate() {
            assert_eq!(row.venture_name, format!("Venture {i}"));
        }
        for pair in rows.windows(2) {
            assert!(pair[0].timestamp <= pair[1].timestamp);
        }
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn round_trip_reproduces_field_values() {
        let (store, dir) = temp_store("round_trip");
        let mut raw = sample_raw();
        raw.comments = "has, comma and \"quotes\"\nand a newline".to_string();
        let record = IntakeRecord::from_raw(&raw).unwrap();
        let receipt = store.append(&record).unwrap();

        let rows = store.load().unwrap();
        assert_eq!(rows, vec![receipt.row]);
        assert_eq!(rows[0].date, "2024-01-15");
        assert_eq!(rows[0].stream, "AI");
        assert_eq!(rows[0].link, "https://acme.example/");
        assert_eq!(rows[0].comments, "has, comma and \"quotes\"\nand a newline");
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn absent_comments_round_trip_as_empty_string() {
        let (store, dir) = temp_store("no_comments");
        let receipt = store.append(&sample_record()).unwrap();
        assert_eq!(receipt.row.comments, "");
        let rows = store.load().unwrap();
        assert_eq!(rows[0].comments, "");
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn missing_file_loads_as_empty() {
        let (store, dir) = temp_store("missing_file");
        assert!(store.load().unwrap().is_empty());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn interleaved_writers_lose_no_rows() {
        let (store_a, dir) = temp_store("interleaved");
        let store_b = {
            let config = AppConfig {
                data_dir: dir.clone(),
                credentials_path: dir.join("credentials.json"),
                token_path: dir.join("token.json"),
                auth_code: None,
                remote_folder: "Intake Ledger".to_string(),
                remote_name: LEDGER_FILENAME.to_string(),
            };
            LedgerStore::new(&config)
        };
        let mut raw = sample_raw();
        for i in 0..4 {
            raw.founder_name = format!("A {i}");
            store_a
                .append(&IntakeRecord::from_raw(&raw).unwrap())
                .unwrap();
            raw.founder_name = format!("B {i}");
            store_b
                .append(&IntakeRecord::from_raw(&raw).unwrap())
                .unwrap();
        }
        assert_eq!(store_a.load().unwrap().len(), 8);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn wrong_header_is_corrupt() {
        let err = parse_ledger("nope,columns\n").unwrap_err();
        match err {
            IntakeError::CorruptLedger { line, .. } => assert_eq!(line, 1),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn short_row_is_corrupt_with_line_number() {
        let text = format!("{}too,short\n", encode_row(&LEDGER_COLUMNS));
        let err = parse_ledger(&text).unwrap_err();
        match err {
            IntakeError::CorruptLedger { line, reason } => {
                assert_eq!(line, 2);
                assert!(reason.contains("expected 9 fields"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn unterminated_quote_is_corrupt() {
        let text = format!("{}\"open", encode_row(&LEDGER_COLUMNS));
        assert!(matches!(
            parse_ledger(&text),
            Err(IntakeError::CorruptLedger { .. })
        ));
    }
}
