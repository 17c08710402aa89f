use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "runtool",
    about = "Run synthesis, mapping, and equivalence-checking pipelines over Verilog designs",
    version
)]
pub struct Cli {
    /// Toolchain config (TOML); defaults to $EQFLOW_CONFIG, then ./eqflow.toml
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory holding lutlang.v, celllang.v, simlib.v, and equiv.sh
    #[arg(long, global = true)]
    pub share_dir: Option<PathBuf>,

    /// Per-process timeout in seconds
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    /// Print a JSON run report on stdout
    #[arg(long, global = true)]
    pub json: bool,

    /// Log stage progress to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// `<input.v> <output.v> [options...]`; options go verbatim to the backend.
#[derive(Args, Debug, Clone)]
pub struct PassThrough {
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, num_args = 0..)]
    pub args: Vec<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// LUT-map with yosys, optimize with the FPGA backend, verify
    Eqmap(PassThrough),

    /// Vivado out-of-context synthesis, FPGA backend, verify
    #[command(name = "eqmap-vivado", alias = "eqmap_vivado")]
    EqmapVivado(PassThrough),

    /// Map onto the ASIC cell library, optimize with the ASIC backend, verify
    Msynth(PassThrough),

    /// Resynthesize through the LUT library with the FPGA backend, verify
    Resynth(PassThrough),

    /// Run the FPGA backend on the input as-is, verify
    Fam(PassThrough),

    /// `eqmap`, then verify the result a second time
    Lvv(PassThrough),

    /// `eqmap-vivado`, then verify the result a second time
    #[command(name = "lvv-vivado", alias = "lvv_vivado")]
    LvvVivado(PassThrough),

    /// Stream the frontend parser into the transformer, verify
    #[command(name = "opt-verilog", disable_help_flag = true)]
    OptVerilog(PassThrough),

    /// Print the build manifest a staged command would run
    Manifest {
        /// Staged command whose manifest to render (eqmap, msynth, ...)
        command: String,

        #[command(flatten)]
        rest: PassThrough,
    },
}
