use std::fs;
use std::path::Path;

use crate::auth::CredentialProvider;
use crate::config::AppConfig;
use crate::error::{IntakeError, Result};
use crate::util::{no_deadline_agent, response_json};

// ── Drive v3 endpoints ──────────────────────────────────────────────────

const DRIVE_FILES_URL: &str = "https://www.googleapis.com/drive/v3/files";
const DRIVE_UPLOAD_URL: &str = "https://www.googleapis.com/upload/drive/v3/files";
const FOLDER_MIME: &str = "application/vnd.google-apps.folder";
const LEDGER_MIME: &str = "text/csv";
const MULTIPART_BOUNDARY: &str = "intakeledger-related-boundary";

/// Result of one sync cycle: the remote file's identifier and whether it
/// was newly created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SyncOutcome {
    pub(crate) file_id: String,
    pub(crate) created: bool,
}

/// Outcome of the best-effort sync attempt made after a local append.
#[derive(Debug, Clone)]
pub(crate) enum MirrorStatus {
    Synced(SyncOutcome),
    Skipped { reason: String },
}

/// Best-effort mirror of the ledger file into a named Drive folder.
///
/// Remote identity is re-resolved by name lookup on every sync; nothing is
/// cached locally. Repeated syncs with the same remote name converge to a
/// single file holding the latest local snapshot (last writer wins).
pub(crate) struct DriveMirror {
    credentials: CredentialProvider,
    folder_name: String,
}

impl DriveMirror {
    pub(crate) fn new(config: &AppConfig) -> Self {
        DriveMirror {
            credentials: CredentialProvider::new(config),
            folder_name: config.remote_folder.clone(),
        }
    }

    /// Uploads or updates `local_path` as `remote_name` inside the folder.
    /// Full overwrite, attempt-once, no conflict detection.
    pub(crate) fn sync(&self, local_path: &Path, remote_name: &str) -> Result<SyncOutcome> {
        let token = self.credentials.access_token()?;
        let bytes = fs::read(local_path).map_err(|e| IntakeError::io(e, local_path))?;
        let agent = no_deadline_agent();

        let folder_id = match self.find_folder(&agent, &token)? {
            Some(id) => id,
            None => self.create_folder(&agent, &token)?,
        };

        match find_file_in_folder(&agent, &token, remote_name, &folder_id)? {
            Some(file_id) => {
                replace_file_content(&agent, &token, &file_id, &bytes)?;
                Ok(SyncOutcome {
                    file_id,
                    created: false,
                })
            }
            None => {
                let file_id =
                    create_file_with_content(&agent, &token, remote_name, &folder_id, &bytes)?;
                Ok(SyncOutcome {
                    file_id,
                    created: true,
                })
            }
        }
    }

    fn find_folder(&self, agent: &ureq::Agent, token: &str) -> Result<Option<String>> {
        let query = folder_query(&self.folder_name);
        let url = format!(
            "{DRIVE_FILES_URL}?q={}&fields=files(id,name)",
            urlencoding::encode(&query)
        );
        let resp = agent
            .get(&url)
            .set("authorization", &format!("Bearer {token}"))
            .call();
        let payload = response_json(resp, "folder lookup")?;
        Ok(first_file_id(&payload))
    }

    fn create_folder(&self, agent: &ureq::Agent, token: &str) -> Result<String> {
        let metadata = serde_json::json!({
            "name": self.folder_name,
            "mimeType": FOLDER_MIME,
        });
        let url = format!("{DRIVE_FILES_URL}?fields=id");
        let resp = agent
            .post(&url)
            .set("authorization", &format!("Bearer {token}"))
            .set("content-type", "application/json")
            .send_json(metadata);
        let payload = response_json(resp, "folder create")?;
        payload_id(&payload, "folder create")
    }
}

fn find_file_in_folder(
    agent: &ureq::Agent,
    token: &str,
    name: &str,
    folder_id: &str,
) -> Result<Option<String>> {
    let query = file_query(name, folder_id);
    let url = format!(
        "{DRIVE_FILES_URL}?q={}&fields=files(id,name)",
        urlencoding::encode(&query)
    );
    let resp = agent
        .get(&url)
        .set("authorization", &format!("Bearer {token}"))
        .call();
    let payload = response_json(resp, "file lookup")?;
    Ok(first_file_id(&payload))
}

fn create_file_with_content(
    agent: &ureq::Agent,
    token: &str,
    name: &str,
    folder_id: &str,
    content: &[u8],
) -> Result<String> {
    let metadata = serde_json::json!({ "name": name, "parents": [folder_id] });
    let body = multipart_related(&metadata, LEDGER_MIME, content);
    let url = format!("{DRIVE_UPLOAD_URL}?uploadType=multipart&fields=id");
    let resp = agent
        .post(&url)
        .set("authorization", &format!("Bearer {token}"))
        .set(
            "content-type",
            &format!("multipart/related; boundary={MULTIPART_BOUNDARY}"),
        )
        .send_bytes(&body);
    let payload = response_json(resp, "file create")?;
    payload_id(&payload, "file create")
}

fn replace_file_content(
    agent: &ureq::Agent,
    token: &str,
    file_id: &str,
    content: &[u8],
) -> Result<()> {
    let url = format!("{DRIVE_UPLOAD_URL}/{file_id}?uploadType=media");
    let resp = agent
        .request("PATCH", &url)
        .set("authorization", &format!("Bearer {token}"))
        .set("content-type", LEDGER_MIME)
        .send_bytes(content);
    response_json(resp, "file update")?;
    Ok(())
}

// ── Query and body builders ─────────────────────────────────────────────

/// Drive query string values are single-quoted; escape backslash and quote.
pub(crate) fn escape_query_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

pub(crate) fn folder_query(folder_name: &str) -> String {
    format!(
        "mimeType='{FOLDER_MIME}' and name='{}' and trashed=false",
        escape_query_value(folder_name)
    )
}

pub(crate) fn file_query(name: &str, folder_id: &str) -> String {
    format!(
        "name='{}' and '{}' in parents and trashed=false",
        escape_query_value(name),
        escape_query_value(folder_id)
    )
}

/// multipart/related body: a JSON metadata part, then the content part.
pub(crate) fn multipart_related(
    metadata: &serde_json::Value,
    content_type: &str,
    content: &[u8],
) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{MULTIPART_BOUNDARY}\r\ncontent-type: application/json; charset=UTF-8\r\n\r\n{metadata}\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(
        format!("--{MULTIPART_BOUNDARY}\r\ncontent-type: {content_type}\r\n\r\n").as_bytes(),
    );
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{MULTIPART_BOUNDARY}--\r\n").as_bytes());
    body
}

fn first_file_id(payload: &serde_json::Value) -> Option<String> {
    payload
        .get("files")
        .and_then(|v| v.as_array())
        .and_then(|files| files.first())
        .and_then(|file| file.get("id"))
        .and_then(|id| id.as_str())
        .map(|id| id.to_string())
}

fn payload_id(payload: &serde_json::Value, context: &str) -> Result<String> {
    payload
        .get("id")
        .and_then(|id| id.as_str())
        .map(|id| id.to_string())
        .ok_or_else(|| IntakeError::RemoteService {
            reason: format!("{context}: response missing id: {payload}"),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_escapes_single_quotes() {
        let query = folder_query("Founder's Ledger");
        assert!(query.contains("name='Founder\\'s Ledger'"));
        assert!(query.contains("trashed=false"));
        assert!(query.contains(FOLDER_MIME));
    }

    #[test]
    fn file_query_binds_parent_folder() {
        let query = file_query("entries.csv", "folder123");
        assert_eq!(
            query,
            "name='entries.csv' and 'folder123' in parents and trashed=false"
        );
    }

    #[test]
    fn multipart_body_has_both_parts_and_terminator() {
        let metadata = serde_json::json!({ "name": "entries.csv", "parents": ["f1"] });
        let body = multipart_related(&metadata, "text/csv", b"a,b\n1,2\n");
        let text = String::from_utf8(body).unwrap();
        assert!(text.contains("content-type: application/json; charset=UTF-8"));
        assert!(text.contains("\"name\":\"entries.csv\""));
        assert!(text.contains("content-type: text/csv"));
        assert!(text.contains("a,b\n1,2\n"));
        assert!(text.ends_with(&format!("\r\n--{MULTIPART_BOUNDARY}--\r\n")));
    }

    #[test]
    fn first_file_id_reads_lookup_payload() {
        let payload = serde_json::json!({
            "files": [ { "id": "abc", "name": "entries.csv" }, { "id": "def" } ]
        });
        assert_eq!(first_file_id(&payload), Some("abc".to_string()));
        assert_eq!(first_file_id(&serde_json::json!({ "files": [] })), None);
        assert_eq!(first_file_id(&serde_json::json!({})), None);
    }
}
