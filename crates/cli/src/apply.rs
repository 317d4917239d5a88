//! `sgrid apply`: replay an edit script over a month and optionally save.

use std::path::{Path, PathBuf};

use shiftgrid_backend_client::HttpBackend;
use shiftgrid_config::Settings;
use shiftgrid_engine::shift_code;
use shiftgrid_engine::{
    EditorOptions, EngineError, MemoryBackend, MonthKey, SaveReport, ScheduleBackend, ScheduleEditor,
};
use shiftgrid_protocol::MonthData;

use crate::script::{self, Script};
use crate::CliError;

pub struct ApplyArgs {
    pub month_file: Option<PathBuf>,
    pub year: Option<i32>,
    pub month: Option<u32>,
    pub script: PathBuf,
    pub save: bool,
    pub offline: bool,
    pub comment: Option<String>,
    pub notify: Vec<String>,
    pub json: bool,
}

pub fn cmd_apply(args: ApplyArgs, settings: &Settings) -> Result<(), CliError> {
    let script = Script::load(&args.script).map_err(CliError::args)?;
    if args.offline && args.month_file.is_none() {
        return Err(CliError::args("--offline requires --month-file"));
    }

    let data = match &args.month_file {
        Some(path) => read_month_file(path)?,
        None => {
            let (year, month) = match (args.year, args.month) {
                (Some(y), Some(m)) => (y, m),
                _ => return Err(CliError::args("either --month-file or both --year and --month are required")),
            };
            let key = MonthKey::new(year, month).map_err(CliError::engine)?;
            http_backend(settings)?
                .fetch_month(key)
                .map_err(CliError::backend)?
        }
    };

    let mut editor = ScheduleEditor::new(EditorOptions { max_groups: settings.history_max_groups });
    editor.init(&data).map_err(CliError::engine)?;
    script::replay(&mut editor, &script.steps)
        .map_err(|(step, e)| CliError::engine(e).with_context(format!("step {}", step)))?;

    let save = if args.save {
        let comment = args.comment.clone().or(script.comment.clone()).unwrap_or_default();
        let notify = if args.notify.is_empty() { settings.default_notify.clone() } else { args.notify.clone() };
        Some(if args.offline {
            let backend = MemoryBackend::new().with_author(settings.author.clone());
            backend.insert_month(data.clone());
            editor.save(&backend, &backend, &comment, &notify)
        } else {
            let backend = http_backend(settings)?;
            editor.save(&backend, &backend, &comment, &notify)
        })
    } else {
        None
    };

    if args.json {
        print_json(&editor, save.as_ref());
    } else {
        print_text(&editor, save.as_ref());
    }

    match save {
        Some(Err(e)) => Err(CliError::engine(e)),
        _ => Ok(()),
    }
}

fn read_month_file(path: &Path) -> Result<MonthData, CliError> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| CliError::args(format!("{}: {}", path.display(), e)))?;
    serde_json::from_str(&text).map_err(|e| CliError::args(format!("{}: {}", path.display(), e)))
}

fn http_backend(settings: &Settings) -> Result<HttpBackend, CliError> {
    HttpBackend::from_settings(settings).map_err(CliError::backend)
}

fn print_text(editor: &ScheduleEditor, save: Option<&Result<SaveReport, EngineError>>) {
    let pending = editor.pending();
    let month = editor.month().map(|m| m.to_string()).unwrap_or_default();
    println!("{}: {} pending change(s)", month, pending.len());
    for cell in pending.cells() {
        let marker = if editor.annotation(&cell.key).is_some() { "  !" } else { "" };
        println!(
            "  {:<12} day {:>2}  {} -> {}{}",
            cell.key.employee_id,
            cell.key.day,
            shift_code::display(&cell.old_value),
            shift_code::display(&cell.new_value),
            marker
        );
    }
    let mut rejections: Vec<_> = editor.annotations().collect();
    rejections.sort_by(|a, b| a.key.cmp(&b.key));
    for rejection in rejections {
        println!("  rejected {}", rejection);
    }
    match save {
        Some(Ok(report)) => println!(
            "saved: {} change(s) accepted (request {}){}",
            report.accepted,
            report.request_id,
            if report.notified { ", recipients notified" } else { "" }
        ),
        Some(Err(e)) => println!("save failed: {}", e),
        None => {}
    }
}

fn print_json(editor: &ScheduleEditor, save: Option<&Result<SaveReport, EngineError>>) {
    let pending = editor.pending();
    let mut annotations: Vec<_> = editor.annotations().collect();
    annotations.sort_by(|a, b| a.key.cmp(&b.key));
    let rejections: Vec<_> = annotations
        .iter()
        .map(|r| {
            serde_json::json!({
                "employee_id": r.key.employee_id,
                "day": r.key.day,
                "kind": r.kind,
                "reason": r.reason,
            })
        })
        .collect();

    let save = match save {
        Some(Ok(report)) => serde_json::json!({
            "status": "applied",
            "request_id": report.request_id.to_string(),
            "accepted": report.accepted,
            "notified": report.notified,
        }),
        Some(Err(e)) => serde_json::json!({
            "status": "failed",
            "error": e.to_string(),
            "retryable": e.is_retryable(),
        }),
        None => serde_json::Value::Null,
    };

    let out = serde_json::json!({
        "month": editor.month().map(|m| m.to_string()),
        "pending_count": pending.len(),
        "pending": pending.to_wire(),
        "rejections": rejections,
        "save": save,
    });
    println!("{}", out);
}
