//! Run configuration loading and validation.

use anyhow::{Context, Result};
use lib_types::{parse_tensor_literal, OwnedTensor};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A run file as written on disk. Every field may also come from flags.
///
/// ```toml
/// library = "/opt/iree/lib/libiree_runtime.so"
/// module = "add.vmfb"
/// entry = "module.main"
/// inputs = ["2x3xf32=1 2 3 4 5 6", "2x3xf32=4 5 6 4 5 6"]
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunFile {
    /// Runtime library to try before the defaults.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub library: Option<PathBuf>,

    /// Compiled module. Relative paths are resolved against the run file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module: Option<PathBuf>,

    /// Fully qualified entry point.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry: Option<String>,

    /// Input tensor literals, in argument order.
    #[serde(default)]
    pub inputs: Vec<String>,
}

impl RunFile {
    /// Overlay `overrides` on top of `self`. Inputs are replaced, not appended.
    pub fn merge(self, overrides: RunFile) -> RunFile {
        RunFile {
            library: overrides.library.or(self.library),
            module: overrides.module.or(self.module),
            entry: overrides.entry.or(self.entry),
            inputs: if overrides.inputs.is_empty() {
                self.inputs
            } else {
                overrides.inputs
            },
        }
    }
}

/// A validated run, ready to execute.
#[derive(Clone, Debug)]
pub struct RunConfig {
    pub library: Option<PathBuf>,
    pub module: PathBuf,
    pub entry: String,
    pub inputs: Vec<OwnedTensor>,
}

/// Load a run file from disk.
pub fn load_run_file(path: &Path) -> Result<RunFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let mut file: RunFile = if path.extension().map_or(false, |e| e == "json") {
        serde_json::from_str(&content)
            .with_context(|| "Failed to parse config as JSON")?
    } else {
        // Assume TOML
        toml::from_str(&content)
            .with_context(|| "Failed to parse config as TOML")?
    };

    if let (Some(module), Some(dir)) = (&file.module, path.parent()) {
        if module.is_relative() {
            file.module = Some(dir.join(module));
        }
    }

    Ok(file)
}

impl TryFrom<RunFile> for RunConfig {
    type Error = anyhow::Error;

    fn try_from(file: RunFile) -> Result<Self> {
        let module = file
            .module
            .context("No module given; pass --module or set `module` in the config")?;
        if !module.exists() {
            anyhow::bail!("Module file not found: {:?}", module);
        }

        let entry = file
            .entry
            .context("No entry point given; pass --entry or set `entry` in the config")?;
        if !entry.contains('.') || entry.starts_with('.') || entry.ends_with('.') {
            anyhow::bail!(
                "Entry point must be fully qualified as <module>.<function>, got {:?}",
                entry
            );
        }

        if let Some(ref library) = file.library {
            if !library.exists() {
                anyhow::bail!("Runtime library not found: {:?}", library);
            }
        }

        let inputs = file
            .inputs
            .iter()
            .enumerate()
            .map(|(i, literal)| {
                parse_tensor_literal(literal)
                    .with_context(|| format!("Input {} is not a valid tensor literal", i))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(RunConfig {
            library: file.library,
            module,
            entry,
            inputs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lib_types::ElementType;
    use std::io::Write;

    fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_load_toml_run_file() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "add.vmfb", "vmfb");
        let path = write_file(
            dir.path(),
            "run.toml",
            r#"
module = "add.vmfb"
entry = "module.add"
inputs = ["2x3xf32=1 2 3 4 5 6", "f32=2"]
"#,
        );

        let file = load_run_file(&path).unwrap();
        assert_eq!(file.module, Some(dir.path().join("add.vmfb")));

        let run = RunConfig::try_from(file).unwrap();
        assert_eq!(run.entry, "module.add");
        assert_eq!(run.inputs.len(), 2);
        assert_eq!(run.inputs[0].shape, vec![2, 3]);
        assert_eq!(run.inputs[1].element_type, ElementType::F32);
        assert!(run.library.is_none());
    }

    #[test]
    fn test_load_json_run_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            dir.path(),
            "run.json",
            r#"{"entry": "module.main", "inputs": ["4xi32=1,2,3,4"]}"#,
        );
        let file = load_run_file(&path).unwrap();
        assert_eq!(file.entry.as_deref(), Some("module.main"));
        assert!(file.module.is_none());
    }

    #[test]
    fn test_unknown_fields_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "run.toml", "modul = \"typo.vmfb\"\n");
        assert!(load_run_file(&path).is_err());
    }

    #[test]
    fn test_flags_override_file() {
        let file = RunFile {
            library: Some(PathBuf::from("/a/libiree_runtime.so")),
            module: Some(PathBuf::from("a.vmfb")),
            entry: Some("module.a".into()),
            inputs: vec!["f32=1".into()],
        };
        let merged = file.clone().merge(RunFile {
            entry: Some("module.b".into()),
            ..RunFile::default()
        });
        assert_eq!(merged.entry.as_deref(), Some("module.b"));
        assert_eq!(merged.module, file.module);
        assert_eq!(merged.inputs, file.inputs);

        let merged = file.merge(RunFile {
            inputs: vec!["i64=3".into()],
            ..RunFile::default()
        });
        assert_eq!(merged.inputs, vec!["i64=3".to_string()]);
    }

    #[test]
    fn test_validation_failures() {
        let dir = tempfile::tempdir().unwrap();
        let module = write_file(dir.path(), "m.vmfb", "vmfb");

        let missing_module = RunFile {
            entry: Some("module.main".into()),
            ..RunFile::default()
        };
        assert!(RunConfig::try_from(missing_module).is_err());

        let unqualified = RunFile {
            module: Some(module.clone()),
            entry: Some("main".into()),
            ..RunFile::default()
        };
        assert!(RunConfig::try_from(unqualified).is_err());

        let bad_input = RunFile {
            module: Some(module.clone()),
            entry: Some("module.main".into()),
            inputs: vec!["2xf32=1".into()],
            ..RunFile::default()
        };
        let err = RunConfig::try_from(bad_input).unwrap_err();
        assert!(err.to_string().contains("Input 0"));

        let missing_library = RunFile {
            library: Some(dir.path().join("missing.so")),
            module: Some(module),
            entry: Some("module.main".into()),
            ..RunFile::default()
        };
        assert!(RunConfig::try_from(missing_library).is_err());
    }
}
