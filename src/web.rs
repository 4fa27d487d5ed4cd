use std::collections::HashMap;
use std::io;
use std::io::Read;

use tiny_http::{Header, Method, Response, Server};
use url::form_urlencoded;

use crate::config::AppConfig;
use crate::error::Result;
use crate::ledger::{AppendReceipt, LedgerStore};
use crate::mirror::MirrorStatus;
use crate::model::{IntakeRecord, RawIntake, STREAM_OPTIONS, STREAM_SENTINEL};
use crate::precheck::readiness;
use crate::util::parse_date;

pub(crate) fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

/// One form submission handled start-to-finish before the next is read.
pub(crate) fn run_form_server(bind: &str, port: u16, config: &AppConfig) -> Result<()> {
    let store = LedgerStore::new(config);
    store.ensure_ready()?;

    let addr = format!("{bind}:{port}");
    let server = Server::http(&addr)
        .map_err(|e| io::Error::new(io::ErrorKind::Other, format!("server: {e}")))?;
    eprintln!("intake form listening on http://{addr}");

    let html_header = Header::from_bytes("Content-Type", "text/html; charset=utf-8")
        .map_err(|_| io::Error::new(io::ErrorKind::Other, "invalid header"))?;

    for mut request in server.incoming_requests() {
        let method = request.method().clone();
        let url = request.url().to_string();
        let (status, page) = match (method, url.as_str()) {
            (Method::Get, "/") => (200, render_form(&RawIntake::default(), &[], None)),
            (Method::Post, "/") => {
                let mut body = String::new();
                match request.as_reader().read_to_string(&mut body) {
                    Ok(_) => handle_submission(&store, parse_raw_intake(&form_params(&body))),
                    Err(e) => (400, render_error(&format!("read body: {e}"))),
                }
            }
            _ => (404, "not found".to_string()),
        };
        let response = Response::from_string(page)
            .with_status_code(status)
            .with_header(html_header.clone());
        let _ = request.respond(response);
    }
    Ok(())
}

pub(crate) fn form_params(body: &str) -> HashMap<String, String> {
    form_urlencoded::parse(body.as_bytes()).into_owned().collect()
}

pub(crate) fn parse_raw_intake(params: &HashMap<String, String>) -> RawIntake {
    let get = |key: &str| params.get(key).cloned().unwrap_or_default();
    let date_value = get("date");
    RawIntake {
        date: parse_date(&date_value),
        stream: get("stream"),
        founder_name: get("founder_name"),
        venture_name: get("venture_name"),
        venture_manager_name: get("venture_manager_name"),
        link: get("link"),
        password: get("password"),
        comments: get("comments"),
    }
}

/// Pre-check for the banner, record model for the decision, ledger for the
/// write. Incomplete or invalid input redisplays the form and persists
/// nothing; a storage failure is a hard error page.
pub(crate) fn handle_submission(store: &LedgerStore, raw: RawIntake) -> (u16, String) {
    let check = readiness(&raw);
    if !check.ready {
        let problems: Vec<String> = check.missing.iter().map(|m| m.to_string()).collect();
        return (200, render_form(&raw, &problems, None));
    }

    // The pick-list sentinel never reaches the model as valid input.
    let mut for_model = raw.clone();
    if for_model.stream == STREAM_SENTINEL {
        for_model.stream.clear();
    }

    let record = match IntakeRecord::from_raw(&for_model) {
        Ok(record) => record,
        Err(err) => {
            let problems: Vec<String> = err.problems.iter().map(|p| p.to_string()).collect();
            return (200, render_form(&raw, &problems, None));
        }
    };

    match store.append(&record) {
        Ok(receipt) => (200, render_form(&RawIntake::default(), &[], Some(&receipt))),
        Err(err) => (500, render_error(&err.to_string())),
    }
}

// ── Page rendering ──────────────────────────────────────────────────────

pub(crate) fn render_form(
    raw: &RawIntake,
    problems: &[String],
    saved: Option<&AppendReceipt>,
) -> String {
    let mut page = String::new();
    page.push_str(
        "<!doctype html>\n<html>\n<head><meta charset=\"utf-8\"><title>Intake Ledger</title></head>\n<body>\n",
    );
    page.push_str("<h1>Intake Ledger</h1>\n<p>Enter the details below.</p>\n");

    if let Some(receipt) = saved {
        page.push_str(&render_saved(receipt));
    }
    if !problems.is_empty() {
        page.push_str("<p>Please complete all required fields:</p>\n<ul>\n");
        for problem in problems {
            page.push_str(&format!("<li>{}</li>\n", escape_html(problem)));
        }
        page.push_str("</ul>\n");
    }

    let date_value = raw
        .date
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_default();

    page.push_str("<form method=\"post\" action=\"/\">\n");
    page.push_str(&format!(
        "<label>Date <input type=\"date\" name=\"date\" value=\"{}\"></label><br>\n",
        escape_html(&date_value)
    ));
    page.push_str("<label>Stream <select name=\"stream\">\n");
    for option in std::iter::once(STREAM_SENTINEL).chain(STREAM_OPTIONS.iter().copied()) {
        let selected = if option == raw.stream
            || (option == STREAM_SENTINEL && raw.stream.is_empty())
        {
            " selected"
        } else {
            ""
        };
        page.push_str(&format!(
            "<option{selected}>{}</option>\n",
            escape_html(option)
        ));
    }
    page.push_str("</select></label><br>\n");
    page.push_str(&text_input("Founder name", "founder_name", &raw.founder_name, "Jane Doe"));
    page.push_str(&text_input("Venture name", "venture_name", &raw.venture_name, "Acme Robotics"));
    page.push_str(&text_input(
        "Venture manager name",
        "venture_manager_name",
        &raw.venture_manager_name,
        "Alex Manager",
    ));
    page.push_str(&text_input("Link", "link", &raw.link, "https://example.com"));
    page.push_str(&format!(
        "<label>Password <input type=\"password\" name=\"password\" value=\"{}\"></label><br>\n",
        escape_html(&raw.password)
    ));
    page.push_str(&format!(
        "<label>Comments (optional) <textarea name=\"comments\">{}</textarea></label><br>\n",
        escape_html(&raw.comments)
    ));
    page.push_str("<button type=\"submit\">Submit</button>\n</form>\n</body>\n</html>\n");
    page
}

fn text_input(label: &str, name: &str, value: &str, placeholder: &str) -> String {
    format!(
        "<label>{label} <input type=\"text\" name=\"{name}\" value=\"{}\" placeholder=\"{placeholder}\"></label><br>\n",
        escape_html(value)
    )
}

fn render_saved(receipt: &AppendReceipt) -> String {
    let row = &receipt.row;
    let mut block = String::from("<p><strong>Entry saved.</strong></p>\n");
    block.push_str("<details><summary>Preview last submission</summary>\n<ul>\n");
    for (name, value) in [
        ("timestamp", &row.timestamp),
        ("date", &row.date),
        ("stream", &row.stream),
        ("founder_name", &row.founder_name),
        ("venture_name", &row.venture_name),
        ("venture_manager_name", &row.venture_manager_name),
        ("password", &row.password),
        ("link", &row.link),
        ("comments", &row.comments),
    ] {
        block.push_str(&format!(
            "<li>{name}: {}</li>\n",
            escape_html(value)
        ));
    }
    block.push_str("</ul>\n</details>\n");
    match &receipt.mirror {
        MirrorStatus::Synced(outcome) => {
            block.push_str(&format!(
                "<p>Mirrored to Drive (file id {}, {}).</p>\n",
                escape_html(&outcome.file_id),
                if outcome.created { "created" } else { "updated" }
            ));
        }
        MirrorStatus::Skipped { reason } => {
            block.push_str(&format!(
                "<p>Note: remote sync did not occur: {}</p>\n",
                escape_html(reason)
            ));
        }
    }
    block
}

fn render_error(message: &str) -> String {
    format!(
        "<!doctype html>\n<html>\n<head><meta charset=\"utf-8\"><title>Intake Ledger</title></head>\n<body>\n<h1>Intake Ledger</h1>\n<p><strong>Submission failed:</strong> {}</p>\n<p><a href=\"/\">Back to the form</a></p>\n</body>\n</html>\n",
        escape_html(message)
    )
}
