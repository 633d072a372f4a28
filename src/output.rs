//! Output planning and writing
//!
//! Maps an input identity plus the run's output mode onto a destination and
//! an append-vs-overwrite decision. Overwrites are atomic (temp file +
//! rename); aggregate mode appends to a destination that was truncated once
//! at the start of the full build.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{RefractError, RefractResult};
use crate::processor::InputId;

/// How destinations are derived for the whole run. Determined once from the
/// CLI flags and the resolved input cardinality.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputMode {
    /// No destination file; pipeline output goes to stdout
    Stdout,
    /// One input, explicit `--output` path
    Single { dest: PathBuf },
    /// Rewrite each input in place
    Replace,
    /// One destination per input under `--dir`
    Dir { dir: PathBuf },
    /// All inputs append, in resolution order, into one destination
    Aggregate { dest: PathBuf },
}

impl OutputMode {
    pub fn determine(
        output: Option<&Path>,
        dir: Option<&Path>,
        replace: bool,
        input_count: usize,
    ) -> Self {
        match output {
            Some(dest) if input_count > 1 => OutputMode::Aggregate {
                dest: dest.to_path_buf(),
            },
            Some(dest) => OutputMode::Single {
                dest: dest.to_path_buf(),
            },
            None if replace => OutputMode::Replace,
            None => match dir {
                Some(dir) => OutputMode::Dir {
                    dir: dir.to_path_buf(),
                },
                None => OutputMode::Stdout,
            },
        }
    }

    pub fn is_aggregate(&self) -> bool {
        matches!(self, OutputMode::Aggregate { .. })
    }

    pub fn aggregate_dest(&self) -> Option<&Path> {
        match self {
            OutputMode::Aggregate { dest } => Some(dest),
            _ => None,
        }
    }
}

/// Destination decision for one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPlan {
    /// `None` means stdout
    pub dest: Option<PathBuf>,
    /// Append instead of overwrite (aggregate mode only)
    pub append: bool,
}

/// Compute the destination for `input` under `mode`.
pub fn plan(
    mode: &OutputMode,
    input: &InputId,
    base: Option<&Path>,
    ext: Option<&str>,
) -> RefractResult<OutputPlan> {
    let dest = match (mode, input) {
        (OutputMode::Stdout, _) => {
            return Ok(OutputPlan {
                dest: None,
                append: false,
            })
        }
        (OutputMode::Single { dest }, _) => dest.clone(),
        (OutputMode::Aggregate { dest }, _) => {
            return Ok(OutputPlan {
                dest: Some(swap_ext(dest, ext)),
                append: true,
            })
        }
        (OutputMode::Replace, InputId::Path(path)) => path.clone(),
        (OutputMode::Dir { dir }, InputId::Path(path)) => {
            let relative = match base {
                Some(base) => {
                    let base = std::path::absolute(base)?;
                    path.strip_prefix(&base)
                        .map(Path::to_path_buf)
                        .unwrap_or_else(|_| file_name(path))
                }
                None => file_name(path),
            };
            dir.join(relative)
        }
        (OutputMode::Replace | OutputMode::Dir { .. }, InputId::Stdin) => {
            // guarded by CLI validation
            return Err(RefractError::Input(
                "Cannot use --dir or --replace when reading from stdin".to_string(),
            ));
        }
    };

    Ok(OutputPlan {
        dest: Some(swap_ext(&dest, ext)),
        append: false,
    })
}

fn file_name(path: &Path) -> PathBuf {
    path.file_name()
        .map(PathBuf::from)
        .unwrap_or_else(|| path.to_path_buf())
}

/// Swap the destination extension when `--ext` is given.
fn swap_ext(path: &Path, ext: Option<&str>) -> PathBuf {
    match ext {
        Some(ext) => path.with_extension(ext.trim_start_matches('.')),
        None => path.to_path_buf(),
    }
}

/// Sibling path for an external source map: `out.css` -> `out.css.map`.
pub fn map_sibling(dest: &Path) -> PathBuf {
    match dest.extension() {
        Some(ext) => dest.with_extension(format!("{}.map", ext.to_string_lossy())),
        None => dest.with_extension("map"),
    }
}

/// Truncate an existing aggregate destination so successive appends never
/// compound across runs. A missing destination is fine.
pub fn truncate_destination(dest: &Path) -> RefractResult<()> {
    if !dest.exists() {
        return Ok(());
    }
    fs::OpenOptions::new()
        .write(true)
        .truncate(true)
        .open(dest)
        .map_err(|e| {
            RefractError::Output(format!(
                "Cannot truncate output file {}: {e}",
                dest.display()
            ))
        })?;
    Ok(())
}

/// Write `text` according to `plan`: stdout, append, or atomic overwrite.
pub fn write_plan(plan: &OutputPlan, text: &str) -> RefractResult<()> {
    match &plan.dest {
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(text.as_bytes())?;
            stdout.flush()?;
            Ok(())
        }
        Some(dest) if plan.append => {
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut file = fs::OpenOptions::new().append(true).create(true).open(dest)?;
            file.write_all(text.as_bytes())?;
            Ok(())
        }
        Some(dest) => write_atomic(dest, text),
    }
}

/// Overwrite via temp file + persist so readers never observe a torn write.
pub fn write_atomic(dest: &Path, text: &str) -> RefractResult<()> {
    let parent = match dest.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent)?;

    let mut tmp = tempfile::NamedTempFile::new_in(&parent)?;
    tmp.write_all(text.as_bytes())?;
    tmp.persist(dest).map_err(|e| RefractError::Io(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(path: &str) -> InputId {
        InputId::Path(PathBuf::from(path))
    }

    #[test]
    fn test_determine_modes() {
        let out = Path::new("out.css");
        assert!(matches!(
            OutputMode::determine(Some(out), None, false, 2),
            OutputMode::Aggregate { .. }
        ));
        assert!(matches!(
            OutputMode::determine(Some(out), None, false, 1),
            OutputMode::Single { .. }
        ));
        assert!(matches!(
            OutputMode::determine(None, None, true, 1),
            OutputMode::Replace
        ));
        assert!(matches!(
            OutputMode::determine(None, Some(Path::new("build")), false, 3),
            OutputMode::Dir { .. }
        ));
        assert_eq!(
            OutputMode::determine(None, None, false, 1),
            OutputMode::Stdout
        );
    }

    #[test]
    fn test_stdout_plan_has_no_destination() {
        let plan = plan(&OutputMode::Stdout, &input("/src/a.css"), None, None).unwrap();
        assert_eq!(plan, OutputPlan { dest: None, append: false });
    }

    #[test]
    fn test_dir_mode_uses_basename() {
        let mode = OutputMode::Dir {
            dir: PathBuf::from("/build"),
        };
        let plan = plan(&mode, &input("/src/styles/a.css"), None, None).unwrap();
        assert_eq!(plan.dest, Some(PathBuf::from("/build/a.css")));
        assert!(!plan.append);
    }

    #[test]
    fn test_dir_mode_preserves_structure_relative_to_base() {
        let mode = OutputMode::Dir {
            dir: PathBuf::from("/build"),
        };
        let plan = plan(
            &mode,
            &input("/src/components/button.css"),
            Some(Path::new("/src")),
            None,
        )
        .unwrap();
        assert_eq!(plan.dest, Some(PathBuf::from("/build/components/button.css")));
    }

    #[test]
    fn test_ext_swap() {
        let mode = OutputMode::Dir {
            dir: PathBuf::from("/build"),
        };
        let plan = plan(&mode, &input("/src/a.css"), None, Some(".min.css")).unwrap();
        assert_eq!(plan.dest, Some(PathBuf::from("/build/a.min.css")));
    }

    #[test]
    fn test_replace_targets_the_input_itself() {
        let plan = plan(&OutputMode::Replace, &input("/src/a.css"), None, None).unwrap();
        assert_eq!(plan.dest, Some(PathBuf::from("/src/a.css")));
        assert!(!plan.append);
    }

    #[test]
    fn test_aggregate_plans_append_to_shared_destination() {
        let mode = OutputMode::Aggregate {
            dest: PathBuf::from("/build/all.css"),
        };
        let a = plan(&mode, &input("/src/a.css"), None, None).unwrap();
        let b = plan(&mode, &input("/src/b.css"), None, None).unwrap();
        assert_eq!(a.dest, Some(PathBuf::from("/build/all.css")));
        assert_eq!(a, b);
        assert!(a.append);
    }

    #[test]
    fn test_single_mode_with_stdin_uses_output_path() {
        let mode = OutputMode::Single {
            dest: PathBuf::from("out.css"),
        };
        let plan = plan(&mode, &InputId::Stdin, None, None).unwrap();
        assert_eq!(plan.dest, Some(PathBuf::from("out.css")));
    }

    #[test]
    fn test_map_sibling_keeps_extension() {
        assert_eq!(
            map_sibling(Path::new("/build/out.css")),
            PathBuf::from("/build/out.css.map")
        );
        assert_eq!(map_sibling(Path::new("/build/out")), PathBuf::from("/build/out.map"));
    }

    #[test]
    fn test_truncate_missing_destination_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        assert!(truncate_destination(&dir.path().join("gone.css")).is_ok());
    }

    #[test]
    fn test_truncate_empties_existing_destination() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("all.css");
        fs::write(&dest, "stale content").unwrap();
        truncate_destination(&dest).unwrap();
        assert_eq!(fs::read_to_string(&dest).unwrap(), "");
    }

    #[test]
    fn test_append_plan_accumulates_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("all.css");
        let plan = OutputPlan {
            dest: Some(dest.clone()),
            append: true,
        };
        write_plan(&plan, "a { }\n").unwrap();
        write_plan(&plan, "b { }\n").unwrap();
        assert_eq!(fs::read_to_string(&dest).unwrap(), "a { }\nb { }\n");
    }

    #[test]
    fn test_overwrite_plan_replaces_content() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("sub/out.css");
        let plan = OutputPlan {
            dest: Some(dest.clone()),
            append: false,
        };
        write_plan(&plan, "first\n").unwrap();
        write_plan(&plan, "second\n").unwrap();
        assert_eq!(fs::read_to_string(&dest).unwrap(), "second\n");
    }
}
