//! eqflow CLI: the `runtool` command.

mod cli;
mod commands;
mod support;

use clap::Parser;
use cli::{Cli, Commands};
use support::Globals;

fn main() {
    let cli = Cli::parse();
    support::init_tracing(cli.verbose);
    let globals = Globals::from_cli(&cli);
    tracing::debug!(?globals, "parsed command line");
    let runtime = support::runtime_or_exit();

    let code = match cli.command {
        Commands::Eqmap(pass) => {
            runtime.block_on(commands::staged::run("eqmap", pass.args, &globals))
        }
        Commands::EqmapVivado(pass) => {
            runtime.block_on(commands::staged::run("eqmap-vivado", pass.args, &globals))
        }
        Commands::Msynth(pass) => {
            runtime.block_on(commands::staged::run("msynth", pass.args, &globals))
        }
        Commands::Resynth(pass) => {
            runtime.block_on(commands::staged::run("resynth", pass.args, &globals))
        }
        Commands::Lvv(pass) => runtime.block_on(commands::staged::run("lvv", pass.args, &globals)),
        Commands::LvvVivado(pass) => {
            runtime.block_on(commands::staged::run("lvv-vivado", pass.args, &globals))
        }
        Commands::Fam(pass) => runtime.block_on(commands::direct::run("fam", pass.args, &globals)),
        Commands::OptVerilog(pass) => {
            runtime.block_on(commands::opt_verilog::run("opt-verilog", pass.args, &globals))
        }
        Commands::Manifest { command, rest } => {
            commands::manifest::run(&command, rest.args, &globals)
        }
    };

    drop(runtime);
    std::process::exit(code);
}
