//! Toolchain configuration.
//!
//! Every field has a default, so an absent or partial `eqflow.toml` is
//! valid. Lookup order for the file: explicit path, `EQFLOW_CONFIG`,
//! `./eqflow.toml`, built-in defaults.

use eqflow_manifest::{Backend, Libraries, SynthesisTools, TargetKind};
use eqflow_process::DEFAULT_CHANNEL_CAPACITY;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_ENV: &str = "EQFLOW_CONFIG";
pub const SHARE_DIR_ENV: &str = "EQFLOW_SHARE_DIR";
pub const DEFAULT_CONFIG_FILE: &str = "eqflow.toml";
const VERIFIER_SCRIPT: &str = "equiv.sh";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolNames {
    /// Build-manifest interpreter.
    pub make: String,
    pub yosys: String,
    pub vivado: String,
    pub fpga_backend: String,
    pub asic_backend: String,
    /// Producer of the chained variant.
    pub frontend: String,
    /// Consumer of the chained variant.
    pub transformer: String,
    /// Equivalence checker; `<share_dir>/equiv.sh` when unset.
    pub verifier: Option<String>,
}

impl Default for ToolNames {
    fn default() -> Self {
        Self {
            make: "make".to_string(),
            yosys: "yosys".to_string(),
            vivado: "vivado".to_string(),
            fpga_backend: Backend::Fpga.default_program().to_string(),
            asic_backend: Backend::Asic.default_program().to_string(),
            frontend: "parse-verilog".to_string(),
            transformer: "eqmap".to_string(),
            verifier: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SharePaths {
    /// Holds `lutlang.v`, `celllang.v`, `simlib.v` and `equiv.sh`.
    pub share_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Limits {
    /// Per-process bound; `None` waits forever.
    pub timeout_secs: Option<u64>,
    /// Chunks in flight between chained processes.
    pub chain_buffer: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            timeout_secs: None,
            chain_buffer: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Toolchain {
    pub tools: ToolNames,
    pub paths: SharePaths,
    pub limits: Limits,
}

impl Toolchain {
    pub fn from_toml_str(text: &str, origin: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: origin.to_string(),
            source,
        })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text, &path.display().to_string())
    }

    /// Load from `explicit`, else `EQFLOW_CONFIG`, else `./eqflow.toml` if
    /// present, else defaults.
    pub fn discover(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let from_env = std::env::var_os(CONFIG_ENV).map(PathBuf::from);
        match config_path(explicit, from_env, Path::new(DEFAULT_CONFIG_FILE)) {
            Some(path) => {
                tracing::debug!(path = %path.display(), "loading toolchain config");
                Self::load(path)
            }
            None => Ok(Self::default()),
        }
    }

    pub fn share_dir(&self) -> PathBuf {
        if let Some(dir) = &self.paths.share_dir {
            return dir.clone();
        }
        if let Some(dir) = std::env::var_os(SHARE_DIR_ENV) {
            return PathBuf::from(dir);
        }
        std::env::current_exe()
            .ok()
            .and_then(|exe| share_dir_beside(&exe))
            .unwrap_or_else(|| PathBuf::from("verilog"))
    }

    pub fn libraries(&self) -> Libraries {
        Libraries::from_share_dir(self.share_dir())
    }

    pub fn synthesis_tools(&self) -> SynthesisTools {
        SynthesisTools {
            yosys: self.tools.yosys.clone(),
            vivado: self.tools.vivado.clone(),
        }
    }

    pub fn backend_program(&self, backend: Backend) -> &str {
        match backend {
            Backend::Fpga => &self.tools.fpga_backend,
            Backend::Asic => &self.tools.asic_backend,
        }
    }

    /// Synthesis program the manifest's rule for `target` runs.
    pub fn synthesis_program(&self, target: TargetKind) -> &str {
        match target {
            TargetKind::VendorPlaced => &self.tools.vivado,
            TargetKind::LutMapped | TargetKind::CellMapped | TargetKind::FlattenedInline => {
                &self.tools.yosys
            }
        }
    }

    pub fn verifier_program(&self) -> String {
        match &self.tools.verifier {
            Some(program) => program.clone(),
            None => self
                .share_dir()
                .join(VERIFIER_SCRIPT)
                .to_string_lossy()
                .into_owned(),
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.limits.timeout_secs.map(Duration::from_secs)
    }
}

fn config_path(
    explicit: Option<&Path>,
    from_env: Option<PathBuf>,
    default_file: &Path,
) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    if let Some(path) = from_env {
        return Some(path);
    }
    default_file.is_file().then(|| default_file.to_path_buf())
}

/// `<exe dir>/../verilog` for an installed `bin/runtool`.
fn share_dir_beside(exe: &Path) -> Option<PathBuf> {
    let root = exe.parent()?.parent()?;
    Some(root.join("verilog"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_is_all_defaults() {
        let toolchain = Toolchain::from_toml_str("", "inline").expect("parse");
        assert_eq!(toolchain, Toolchain::default());
        assert_eq!(toolchain.backend_program(Backend::Asic), "eqmap_asic");
        assert_eq!(toolchain.limits.chain_buffer, DEFAULT_CHANNEL_CAPACITY);
        assert!(toolchain.timeout().is_none());
    }

    #[test]
    fn partial_config_overrides_named_fields() {
        let text = r#"
            [tools]
            fpga_backend = "/opt/eqmap/bin/eqmap_fpga"
            verifier = "/opt/eqmap/verilog/equiv.sh"

            [paths]
            share_dir = "/opt/eqmap/verilog"

            [limits]
            timeout_secs = 600
        "#;
        let toolchain = Toolchain::from_toml_str(text, "inline").expect("parse");
        assert_eq!(
            toolchain.backend_program(Backend::Fpga),
            "/opt/eqmap/bin/eqmap_fpga"
        );
        assert_eq!(toolchain.tools.make, "make");
        assert_eq!(toolchain.verifier_program(), "/opt/eqmap/verilog/equiv.sh");
        assert_eq!(
            toolchain.libraries().simlib,
            PathBuf::from("/opt/eqmap/verilog/simlib.v")
        );
        assert_eq!(toolchain.timeout(), Some(Duration::from_secs(600)));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = Toolchain::from_toml_str("[tools]\nmakee = \"gmake\"\n", "eqflow.toml")
            .expect_err("typo must not be ignored");
        assert!(err.to_string().starts_with("failed to parse config eqflow.toml"));
    }

    #[test]
    fn verifier_defaults_into_share_dir() {
        let mut toolchain = Toolchain::default();
        toolchain.paths.share_dir = Some(PathBuf::from("/srv/eqmap/verilog"));
        assert_eq!(toolchain.verifier_program(), "/srv/eqmap/verilog/equiv.sh");
    }

    #[test]
    fn synthesis_program_follows_target() {
        let toolchain = Toolchain::default();
        assert_eq!(toolchain.synthesis_program(TargetKind::VendorPlaced), "vivado");
        assert_eq!(toolchain.synthesis_program(TargetKind::CellMapped), "yosys");
    }

    #[test]
    fn config_path_precedence() {
        let missing_default = Path::new("/nonexistent/eqflow.toml");
        assert_eq!(
            config_path(
                Some(Path::new("a.toml")),
                Some(PathBuf::from("b.toml")),
                missing_default
            ),
            Some(PathBuf::from("a.toml"))
        );
        assert_eq!(
            config_path(None, Some(PathBuf::from("b.toml")), missing_default),
            Some(PathBuf::from("b.toml"))
        );
        assert_eq!(config_path(None, None, missing_default), None);
    }

    #[test]
    fn share_dir_sits_next_to_bin() {
        assert_eq!(
            share_dir_beside(Path::new("/opt/eqmap/bin/runtool")),
            Some(PathBuf::from("/opt/eqmap/verilog"))
        );
    }
}
