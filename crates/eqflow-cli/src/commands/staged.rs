use crate::support::{self, Globals};
use eqflow_manifest::{Backend, ManifestFlags, PipelineRequest, TargetKind};

/// What a staged command asks the manifest for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StagedPreset {
    pub backend: Backend,
    pub target: TargetKind,
    pub flags: ManifestFlags,
    /// Verify the output a second time after the pipeline succeeds.
    pub reverify: bool,
}

pub const STAGED_COMMANDS: [&str; 6] = [
    "eqmap",
    "eqmap-vivado",
    "msynth",
    "resynth",
    "lvv",
    "lvv-vivado",
];

pub fn preset(command: &str) -> Option<StagedPreset> {
    let fpga = |target| StagedPreset {
        backend: Backend::Fpga,
        target,
        flags: ManifestFlags::default(),
        reverify: false,
    };
    let preset = match command {
        "eqmap" => fpga(TargetKind::LutMapped),
        "eqmap-vivado" | "eqmap_vivado" => fpga(TargetKind::VendorPlaced),
        "msynth" => StagedPreset {
            backend: Backend::Asic,
            target: TargetKind::CellMapped,
            flags: ManifestFlags::asic_mapping(),
            reverify: false,
        },
        "resynth" => StagedPreset {
            flags: ManifestFlags::resynthesis(),
            ..fpga(TargetKind::CellMapped)
        },
        "lvv" => StagedPreset {
            reverify: true,
            ..fpga(TargetKind::LutMapped)
        },
        "lvv-vivado" | "lvv_vivado" => StagedPreset {
            reverify: true,
            ..fpga(TargetKind::VendorPlaced)
        },
        _ => return None,
    };
    Some(preset)
}

pub fn request(preset: StagedPreset, invocation: support::Invocation) -> PipelineRequest {
    PipelineRequest::new(
        invocation.input,
        invocation.output,
        preset.backend,
        preset.target,
    )
    .with_options(invocation.options)
    .with_flags(preset.flags)
}

pub async fn run(command: &str, args: Vec<String>, globals: &Globals) -> i32 {
    let Some(preset) = preset(command) else {
        eprintln!("error: unknown staged command: {command}");
        return 1;
    };
    let invocation = support::invocation_or_usage(command, args);
    let pipeline = support::pipeline_or_exit(globals);
    let request = request(preset, invocation);

    let report = if preset.reverify {
        pipeline.run_verified(command, &request).await
    } else {
        pipeline.run_staged(command, &request).await
    };
    support::finish_report(&report, globals.json)
}
