use crate::commands::staged;
use crate::support::{self, Globals};
use serde_json::json;

/// Render (but never write or run) the manifest for a staged command.
pub fn run(command: &str, args: Vec<String>, globals: &Globals) -> i32 {
    let Some(preset) = staged::preset(command) else {
        eprintln!(
            "error: {command} does not use a build manifest (expected one of: {})",
            staged::STAGED_COMMANDS.join(", ")
        );
        return 1;
    };
    let invocation = support::invocation_or_usage(&format!("manifest {command}"), args);
    let pipeline = support::pipeline_or_exit(globals);
    let request = staged::request(preset, invocation);

    let manifest = match pipeline.manifest_for(&request) {
        Ok(manifest) => manifest,
        Err(e) => {
            eprintln!("error: preflight stage failed: {e}");
            return 1;
        }
    };

    let text = manifest.render();
    if globals.json {
        let payload = json!({
            "command": command,
            "path": manifest.path.display().to_string(),
            "defaultTarget": manifest.default_target,
            "digest": manifest.digest(),
            "text": text,
        });
        match serde_json::to_string_pretty(&payload) {
            Ok(rendered) => println!("{rendered}"),
            Err(e) => {
                eprintln!("error: failed to render manifest payload: {e}");
                return 1;
            }
        }
    } else {
        print!("{text}");
    }
    0
}
