use super::synthesize;
use crate::error::OutputError;
use crate::record::{file_stem, RunState};
use std::fs;
use std::path::{Path, PathBuf};

/// Write `<parcel>.md` (the synthesized report) and `<parcel>.json` (the
/// full run state). Returns the markdown path.
pub fn write_run_report(report_dir: &Path, state: &RunState) -> Result<PathBuf, OutputError> {
    let stem = file_stem(state.parcel_id()).ok_or(OutputError::EmptyParcelId)?;
    fs::create_dir_all(report_dir).map_err(OutputError::CreateDir)?;

    let markdown = match &state.report {
        Some(report) => report.clone(),
        None => synthesize(state).0,
    };
    let report_path = report_dir.join(format!("{}.md", stem));
    fs::write(&report_path, format!("{}\n", markdown)).map_err(OutputError::WriteReport)?;

    let state_path = report_dir.join(format!("{}.json", stem));
    let json = serde_json::to_string_pretty(state)?;
    fs::write(&state_path, json).map_err(OutputError::WriteReport)?;

    Ok(report_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Recommendation, StageId};
    use tempfile::TempDir;

    #[test]
    fn test_writes_markdown_and_state() {
        let dir = TempDir::new().unwrap();
        let mut state = RunState::new("2512345", None);
        state.mark_failed(StageId::Zoning, "zoning agent error: offline".to_string());
        let (report, recommendation) = synthesize(&state);
        state.report = Some(report);
        state.recommendation = Some(recommendation);

        let out = dir.path().join("reports");
        let path = write_run_report(&out, &state).unwrap();
        assert_eq!(path, out.join("2512345.md"));

        let markdown = fs::read_to_string(&path).unwrap();
        assert!(markdown.contains("zoning agent error: offline"));

        let json = fs::read_to_string(out.join("2512345.json")).unwrap();
        let restored: RunState = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.run_id, state.run_id);
        assert_eq!(restored.recommendation, Some(Recommendation::Incomplete));
        assert_eq!(restored.errors, state.errors);
    }

    #[test]
    fn test_unsynthesized_state_still_gets_report() {
        let dir = TempDir::new().unwrap();
        let state = RunState::new("7", None);
        let path = write_run_report(dir.path(), &state).unwrap();
        let markdown = fs::read_to_string(path).unwrap();
        assert!(markdown.contains("**INCOMPLETE**"));
    }

    #[test]
    fn test_ids_that_differ_only_in_punctuation_do_not_collide() {
        let dir = TempDir::new().unwrap();
        let slash = write_run_report(dir.path(), &RunState::new("a/b", None)).unwrap();
        let underscore = write_run_report(dir.path(), &RunState::new("a_b", None)).unwrap();

        assert_ne!(slash, underscore);
        assert_eq!(slash.parent(), Some(dir.path()));
        assert!(fs::read_to_string(&slash).unwrap().contains("**Parcel ID:** a/b"));
        assert!(fs::read_to_string(&underscore)
            .unwrap()
            .contains("**Parcel ID:** a_b"));
    }

    #[test]
    fn test_empty_parcel_id_is_rejected() {
        let dir = TempDir::new().unwrap();
        let err = write_run_report(dir.path(), &RunState::new("", None)).unwrap_err();
        assert!(matches!(err, OutputError::EmptyParcelId));
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
