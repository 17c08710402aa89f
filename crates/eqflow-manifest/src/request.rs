//! Pipeline requests: the immutable input that fully determines a manifest.

use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Mapping backend family. Selects both the backend program and the
/// technology library used by the manifest's `techmap` rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Backend {
    /// LUT-oriented FPGA mapper (`eqmap_fpga`).
    Fpga,
    /// Standard-cell ASIC mapper (`eqmap_asic`).
    Asic,
}

impl Backend {
    pub const ALL: [Backend; 2] = [Backend::Fpga, Backend::Asic];

    pub fn as_str(self) -> &'static str {
        match self {
            Backend::Fpga => "fpga",
            Backend::Asic => "asic",
        }
    }

    /// Program invoked when the toolchain does not override it.
    pub fn default_program(self) -> &'static str {
        match self {
            Backend::Fpga => "eqmap_fpga",
            Backend::Asic => "eqmap_asic",
        }
    }

    pub fn library(self) -> TechLibrary {
        match self {
            Backend::Fpga => TechLibrary::LutLang,
            Backend::Asic => TechLibrary::CellLang,
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fpga" | "eqmap_fpga" => Ok(Backend::Fpga),
            "asic" | "eqmap_asic" => Ok(Backend::Asic),
            other => Err(format!("unknown backend `{other}` (expected fpga or asic)")),
        }
    }
}

/// Technology-mapping library, one per backend family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TechLibrary {
    LutLang,
    CellLang,
}

impl TechLibrary {
    pub fn file_name(self) -> &'static str {
        match self {
            TechLibrary::LutLang => "lutlang.v",
            TechLibrary::CellLang => "celllang.v",
        }
    }
}

/// Derived-artifact flavor requested from the manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetKind {
    /// Yosys `synth_xilinx` down to LUTs.
    LutMapped,
    /// Yosys `techmap` onto the backend's cell library.
    CellMapped,
    /// Vivado out-of-context synthesis.
    VendorPlaced,
    /// Flattened against the simulation library.
    FlattenedInline,
}

impl TargetKind {
    pub const ALL: [TargetKind; 4] = [
        TargetKind::LutMapped,
        TargetKind::CellMapped,
        TargetKind::VendorPlaced,
        TargetKind::FlattenedInline,
    ];

    /// File suffix appended to the input path to name the artifact.
    pub fn suffix(self) -> &'static str {
        match self {
            TargetKind::LutMapped => "yxil",
            TargetKind::CellMapped => "synth",
            TargetKind::VendorPlaced => "vxil",
            TargetKind::FlattenedInline => "inline",
        }
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

impl FromStr for TargetKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TargetKind::ALL
            .into_iter()
            .find(|kind| kind.suffix() == s)
            .ok_or_else(|| format!("unknown target kind `{s}` (expected yxil, synth, vxil, inline)"))
    }
}

/// How `splitnets` is emitted in a synthesis script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortSplitMode {
    /// Split multi-bit ports only.
    PortsOnly,
    /// Split every multi-bit net.
    All,
}

impl PortSplitMode {
    pub fn splitnets_command(self) -> &'static str {
        match self {
            PortSplitMode::PortsOnly => "splitnets -ports -format _",
            PortSplitMode::All => "splitnets -format _",
        }
    }
}

/// Manifest-shape toggles chosen by the command layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ManifestFlags {
    /// When false, the cell-mapping yosys run writes to `/dev/null`.
    pub diagnostics_visible: bool,
    /// `splitnets` mode in the LUT-mapping script.
    pub lut_port_split: PortSplitMode,
    /// `splitnets` mode in the library-mapping script.
    pub cell_port_split: PortSplitMode,
}

impl Default for ManifestFlags {
    fn default() -> Self {
        Self {
            diagnostics_visible: true,
            lut_port_split: PortSplitMode::PortsOnly,
            cell_port_split: PortSplitMode::All,
        }
    }
}

impl ManifestFlags {
    /// ASIC mapping: silent yosys, port-only splitting in the techmap script.
    pub fn asic_mapping() -> Self {
        Self {
            diagnostics_visible: false,
            cell_port_split: PortSplitMode::PortsOnly,
            ..Self::default()
        }
    }

    /// FPGA resynthesis: split every net in the LUT script.
    pub fn resynthesis() -> Self {
        Self {
            lut_port_split: PortSplitMode::All,
            ..Self::default()
        }
    }
}

/// Everything needed to generate a manifest and drive one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineRequest {
    input: PathBuf,
    output: PathBuf,
    backend: Backend,
    target: TargetKind,
    options: Vec<String>,
    flags: ManifestFlags,
}

impl PipelineRequest {
    pub fn new(
        input: impl Into<PathBuf>,
        output: impl Into<PathBuf>,
        backend: Backend,
        target: TargetKind,
    ) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            backend,
            target,
            options: Vec::new(),
            flags: ManifestFlags::default(),
        }
    }

    pub fn with_options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options = options.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_flags(mut self, flags: ManifestFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn input(&self) -> &Path {
        &self.input
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    pub fn backend(&self) -> Backend {
        self.backend
    }

    pub fn target(&self) -> TargetKind {
        self.target
    }

    pub fn options(&self) -> &[String] {
        &self.options
    }

    pub fn flags(&self) -> ManifestFlags {
        self.flags
    }

    /// `<input>.mk`, next to the input.
    pub fn manifest_path(&self) -> PathBuf {
        sidecar_path(&self.input, "mk")
    }

    /// `<input>.<suffix>`: the artifact the manifest materializes.
    pub fn artifact_path(&self) -> PathBuf {
        sidecar_path(&self.input, self.target.suffix())
    }
}

/// Append `.<extension>` to the full path, keeping the existing extension.
pub fn sidecar_path(path: &Path, extension: &str) -> PathBuf {
    let mut raw: OsString = path.as_os_str().to_os_string();
    raw.push(".");
    raw.push(extension);
    PathBuf::from(raw)
}
