//! Build-manifest generation.
//!
//! A manifest is a make-compatible file with one rule family per target
//! kind: an artifact rule (`%.v.<suffix>`) that runs a synthesis script, and
//! a script rule that writes that script from the raw design file. The
//! manifest's default target is the artifact named by the request.

use crate::error::ManifestError;
use crate::request::{Backend, PipelineRequest, TargetKind};
use sha2::{Digest, Sha256};
use std::fmt::Write as _;
use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};

const FAMILY: &str = "xcup";
const PART: &str = "xczu3eg-sbva484-1-i";
const SYNTH_OPT: &str = "-flatten -noclkbuf -noiopad -nocarry -nowidelut -nosrl -ise";
const CLEAN_RECIPE: &str = "rm -f *.xil *.synth *.ys *.dot *.png";
const SIMLIB_FILE: &str = "simlib.v";

/// Verilog libraries read by the generated scripts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Libraries {
    pub lutlang: PathBuf,
    pub celllang: PathBuf,
    pub simlib: PathBuf,
}

impl Libraries {
    pub fn from_share_dir(share_dir: impl AsRef<Path>) -> Self {
        let dir = share_dir.as_ref();
        Self {
            lutlang: dir.join(crate::TechLibrary::LutLang.file_name()),
            celllang: dir.join(crate::TechLibrary::CellLang.file_name()),
            simlib: dir.join(SIMLIB_FILE),
        }
    }

    /// Library handed to `techmap`; a pure function of the backend.
    pub fn techmap(&self, backend: Backend) -> &Path {
        match backend.library() {
            crate::TechLibrary::LutLang => &self.lutlang,
            crate::TechLibrary::CellLang => &self.celllang,
        }
    }
}

/// Program names substituted into the manifest's tool variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesisTools {
    pub yosys: String,
    pub vivado: String,
}

impl Default for SynthesisTools {
    fn default() -> Self {
        Self {
            yosys: "yosys".to_string(),
            vivado: "vivado".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variable {
    pub comment: Option<String>,
    pub name: String,
    /// `?=` instead of `=`.
    pub conditional: bool,
    pub value: String,
}

impl Variable {
    fn set(name: &str, value: impl Into<String>) -> Self {
        Self {
            comment: None,
            name: name.to_string(),
            conditional: false,
            value: value.into(),
        }
    }

    fn commented(mut self, comment: &str) -> Self {
        self.comment = Some(comment.to_string());
        self
    }

    fn conditional(mut self) -> Self {
        self.conditional = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub comment: Option<String>,
    pub target: String,
    pub inputs: Vec<String>,
    pub recipe: Vec<String>,
}

impl Rule {
    fn new(target: impl Into<String>, inputs: &[&str]) -> Self {
        Self {
            comment: None,
            target: target.into(),
            inputs: inputs.iter().map(|s| s.to_string()).collect(),
            recipe: Vec::new(),
        }
    }

    fn commented(mut self, comment: &str) -> Self {
        self.comment = Some(comment.to_string());
        self
    }

    fn step(mut self, line: impl Into<String>) -> Self {
        self.recipe.push(line.into());
        self
    }

    /// Script rule: each line is echoed into `$@`, the first one truncating.
    fn script(mut self, lines: &[String]) -> Self {
        for (idx, line) in lines.iter().enumerate() {
            let redirect = if idx == 0 { ">" } else { ">>" };
            self.recipe.push(format!("@echo \"{line}\" {redirect} $@"));
        }
        self
    }
}

/// Generated manifest plus the sidecar path it is persisted to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildManifest {
    pub path: PathBuf,
    pub default_target: String,
    pub variables: Vec<Variable>,
    pub phony: Vec<String>,
    pub rules: Vec<Rule>,
}

impl BuildManifest {
    /// Build the manifest for `request` without touching the filesystem.
    pub fn build(
        request: &PipelineRequest,
        libraries: &Libraries,
        tools: &SynthesisTools,
    ) -> Self {
        let flags = request.flags();
        let default_target = request.artifact_path().to_string_lossy().into_owned();

        let variables = vec![
            Variable::set("SRCS", "$(wildcard *.v)"),
            Variable::set("FAMILY", FAMILY)
                .commented("Set both Yosys and Vivado to use Ultrascale+ Arch"),
            Variable::set("PART", PART),
            Variable::set("SYNTH_OPT", SYNTH_OPT).commented(
                "flatten design before synthesis, no clock buffers, no IO buffers, no carry logic, no MUXes",
            ),
            Variable::set("YOSYS", tools.yosys.as_str()),
            Variable::set(
                "XILINX_VIVADO",
                format!("$(realpath $(dir $(shell which {}))/..)", tools.vivado),
            )
            .conditional(),
            Variable::set("VIVADO", "$(XILINX_VIVADO)/bin/vivado"),
        ];

        let quiet = if flags.diagnostics_visible {
            ""
        } else {
            " >> /dev/null"
        };
        let techmap_lib = libraries.techmap(request.backend()).to_string_lossy();

        let mut rules = vec![
            Rule::new("all", &[default_target.as_str()]),
            Rule::new("clean", &[]).step(CLEAN_RECIPE),
        ];
        rules.extend([
            Rule::new(artifact_pattern(TargetKind::CellMapped), &["%_synth.ys"])
                .step(format!("+$(YOSYS) -s $<{quiet}")),
            Rule::new(artifact_pattern(TargetKind::LutMapped), &["%_yxil.ys"])
                .step("+$(YOSYS) -s $<"),
            Rule::new(artifact_pattern(TargetKind::VendorPlaced), &["%_vxil.tcl"])
                .step("+$(VIVADO) -mode tcl -source $< -nolog -nojournal"),
            Rule::new(artifact_pattern(TargetKind::FlattenedInline), &["%_inline.ys"])
                .step("+$(YOSYS) -s $<"),
            Rule::new("%_yxil.ys", &["%.v"])
                .commented("This script synthesizes to LUTs")
                .script(&[
                    "read_verilog $<".to_string(),
                    "synth_xilinx -family $(FAMILY) $(SYNTH_OPT)".to_string(),
                    "clean -purge".to_string(),
                    flags.lut_port_split.splitnets_command().to_string(),
                    "write_verilog -simple-lhs $<.yxil".to_string(),
                ]),
            Rule::new("%_synth.ys", &["%.v"])
                .commented("This script synthesizes to AND, NOR, XOR, INV, MUXes")
                .script(&[
                    "read_verilog $<".to_string(),
                    format!("techmap -map {techmap_lib}"),
                    "clean -purge".to_string(),
                    flags.cell_port_split.splitnets_command().to_string(),
                    "write_verilog -simple-lhs $<.synth".to_string(),
                ]),
            Rule::new("%_vxil.tcl", &["%.v"]).script(&[
                "add_files $<".to_string(),
                "synth_design -top $* -mode out_of_context -part $(PART)".to_string(),
                "write_verilog -force $<.vxil".to_string(),
                "quit".to_string(),
            ]),
            Rule::new("%_inline.ys", &["%.v"]).script(&[
                format!("read_verilog {}", libraries.simlib.to_string_lossy()),
                "read_verilog $<".to_string(),
                "flatten".to_string(),
                "clean -purge".to_string(),
                "write_verilog -simple-lhs -noattr $<.inline".to_string(),
            ]),
        ]);

        Self {
            path: request.manifest_path(),
            default_target,
            variables,
            phony: vec!["all".to_string(), "clean".to_string()],
            rules,
        }
    }

    pub fn rule(&self, target: &str) -> Option<&Rule> {
        self.rules.iter().find(|rule| rule.target == target)
    }

    /// Render to make syntax. Identical inputs give byte-identical text.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for var in &self.variables {
            if let Some(comment) = &var.comment {
                let _ = writeln!(out, "# {comment}");
            }
            let op = if var.conditional { "?=" } else { "=" };
            let _ = writeln!(out, "{}{op}{}", var.name, var.value);
        }
        let _ = writeln!(out);
        let _ = writeln!(out, ".PHONY: {}", self.phony.join(" "));

        for rule in &self.rules {
            let _ = writeln!(out);
            if let Some(comment) = &rule.comment {
                let _ = writeln!(out, "# {comment}");
            }
            if rule.inputs.is_empty() {
                let _ = writeln!(out, "{}:", rule.target);
            } else {
                let _ = writeln!(out, "{}: {}", rule.target, rule.inputs.join(" "));
            }
            for line in &rule.recipe {
                let _ = writeln!(out, "\t{line}");
            }
        }
        out
    }

    /// Hex SHA-256 of the rendered text.
    pub fn digest(&self) -> String {
        let hash = Sha256::digest(self.render().as_bytes());
        hash.iter().fold(String::with_capacity(64), |mut acc, b| {
            let _ = write!(acc, "{b:02x}");
            acc
        })
    }

    /// Persist to `self.path`, synced before returning.
    pub fn write(&self) -> Result<&Path, ManifestError> {
        let write_err = |source| ManifestError::Write {
            path: self.path.display().to_string(),
            source,
        };
        let mut file = fs::File::create(&self.path).map_err(write_err)?;
        file.write_all(self.render().as_bytes()).map_err(write_err)?;
        file.sync_all().map_err(write_err)?;
        tracing::debug!(path = %self.path.display(), "manifest written");
        Ok(&self.path)
    }
}

fn artifact_pattern(kind: TargetKind) -> String {
    format!("%.v.{}", kind.suffix())
}

/// Generate the manifest for `request`, failing before any filesystem
/// mutation when the input file does not exist.
pub fn generate(
    request: &PipelineRequest,
    libraries: &Libraries,
    tools: &SynthesisTools,
) -> Result<BuildManifest, ManifestError> {
    if !request.input().is_file() {
        return Err(ManifestError::InputMissing {
            path: request.input().display().to_string(),
        });
    }
    Ok(BuildManifest::build(request, libraries, tools))
}
