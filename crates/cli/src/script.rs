//! Edit scripts: a TOML list of editor gestures replayed in order.
//!
//! ```toml
//! comment = "cobertura licencias"
//!
//! [[step]]
//! action = "edit"
//! employee = "e1"
//! day = 5
//! value = "T"
//!
//! [[step]]
//! action = "batch"
//! kind = "assign"
//! employee_ids = ["e1", "e2"]
//! target_days = [1, 2, 3]
//! value = "V"
//!
//! [[step]]
//! action = "undo_change"
//! change = 1
//! ```
//!
//! Change ids are assigned from 1 in recording order, so a script can name
//! the change made by an earlier step.

use std::path::Path;

use serde::Deserialize;
use shiftgrid_engine::{BatchOperationSpec, ChangeId, EngineError, ScheduleEditor};

#[derive(Debug, Deserialize)]
pub struct Script {
    /// Save comment, unless given on the command line.
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default, rename = "step")]
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Step {
    Edit { employee: String, day: u32, value: String },
    Batch(BatchOperationSpec),
    Undo,
    Redo,
    UndoChange { change: u64 },
}

impl Script {
    pub fn load(path: &Path) -> Result<Self, String> {
        let text = std::fs::read_to_string(path).map_err(|e| format!("{}: {}", path.display(), e))?;
        Self::parse(&text).map_err(|e| format!("{}: {}", path.display(), e))
    }

    pub fn parse(text: &str) -> Result<Self, String> {
        toml::from_str(text).map_err(|e| e.to_string())
    }
}

/// Replay every step. Stops at the first step the editor refuses; earlier
/// steps stay applied.
pub fn replay(editor: &mut ScheduleEditor, steps: &[Step]) -> Result<(), (usize, EngineError)> {
    for (index, step) in steps.iter().enumerate() {
        let number = index + 1;
        let result = match step {
            Step::Edit { employee, day, value } => editor.edit_cell(employee, *day, value).map(|c| {
                if c.is_none() {
                    log::info!("step {}: {}/{} already {:?}", number, employee, day, value);
                }
            }),
            Step::Batch(spec) => editor.apply_batch(spec).map(|group| {
                log::info!("step {}: {} produced {} change(s)", number, spec.kind, group.len());
            }),
            Step::Undo => editor.undo().map(|step| {
                if step.is_none() {
                    log::warn!("step {}: nothing to undo", number);
                }
            }),
            Step::Redo => editor.redo().map(|step| {
                if step.is_none() {
                    log::warn!("step {}: nothing to redo", number);
                }
            }),
            Step::UndoChange { change } => editor.undo_change(ChangeId::from_raw(*change)).map(|_| ()),
        };
        result.map_err(|e| (number, e))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use shiftgrid_engine::BatchKind;

    #[test]
    fn test_parse_all_step_kinds() {
        let script = Script::parse(
            r#"
comment = "ajuste"

[[step]]
action = "edit"
employee = "e1"
day = 5
value = "t"

[[step]]
action = "batch"
kind = "copy"
employee_ids = ["e1"]
source_day = 5
target_days = [6, 7]

[[step]]
action = "undo"

[[step]]
action = "redo"

[[step]]
action = "undo_change"
change = 2
"#,
        )
        .unwrap();

        assert_eq!(script.comment.as_deref(), Some("ajuste"));
        assert_eq!(script.steps.len(), 5);
        match &script.steps[1] {
            Step::Batch(spec) => {
                assert_eq!(spec.kind, BatchKind::Copy);
                assert_eq!(spec.source_day, Some(5));
            }
            other => panic!("expected batch, got {other:?}"),
        }
        assert_eq!(script.steps[4], Step::UndoChange { change: 2 });
    }

    #[test]
    fn test_unknown_action_is_rejected() {
        let err = Script::parse("[[step]]\naction = \"explode\"\n").unwrap_err();
        assert!(err.contains("explode") || err.contains("variant"));
    }

    #[test]
    fn test_empty_script() {
        assert!(Script::parse("").unwrap().steps.is_empty());
    }
}
