#![cfg(unix)]

use eqflow_manifest::{Backend, ManifestFlags, PipelineRequest, TargetKind};
use eqflow_pipeline::{
    EXIT_PREFLIGHT, EXIT_TIMEOUT, ErrorClass, Pipeline, Stage, Toolchain, TransformRequest,
};
use eqflow_process::{ProcessRunner, SearchPath, ToolLocator};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

const DESIGN: &str = "module adder(input a, input b, output y); assign y = a ^ b; endmodule\n";

struct Fixture {
    bin: TempDir,
    work: TempDir,
}

impl Fixture {
    fn new() -> Self {
        let fixture = Self {
            bin: tempfile::tempdir().expect("bin dir"),
            work: tempfile::tempdir().expect("work dir"),
        };
        let log = fixture.log_path();
        let log = log.display();
        fixture.tool(
            "make",
            &format!("test -f \"$2\" || exit 9\necho \"make $3\" >> {log}\necho mapped > \"$3\""),
        );
        fixture.tool("yosys", "exit 0");
        fixture.tool("vivado", "exit 0");
        fixture.tool(
            "eqmap_fpga",
            &format!("echo \"backend $*\" >> {log}\ncp \"$1\" \"$2\""),
        );
        fixture.tool(
            "eqmap_asic",
            &format!("echo \"backend $*\" >> {log}\ncp \"$1\" \"$2\""),
        );
        fixture.tool(
            "equiv.sh",
            &format!("echo \"verify $(pwd -P) $1 $2\" >> {log}"),
        );
        fixture.tool("parse-verilog", "cat \"$2\"");
        fixture.tool("eqmap", "cat");
        fixture
    }

    fn tool(&self, name: &str, body: &str) {
        let path = self.bin.path().join(name);
        fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("tool should be written");
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755))
            .expect("tool should be executable");
    }

    fn remove_tool(&self, name: &str) {
        fs::remove_file(self.bin.path().join(name)).expect("tool should be removed");
    }

    fn log_path(&self) -> PathBuf {
        self.work.path().join("calls.log")
    }

    fn calls(&self) -> Vec<String> {
        fs::read_to_string(self.log_path())
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }

    fn input(&self, name: &str) -> PathBuf {
        let path = self.work.path().join(name);
        fs::write(&path, DESIGN).expect("input should be written");
        path
    }

    fn output(&self) -> PathBuf {
        self.work.path().join("mapped.v")
    }

    fn toolchain(&self) -> Toolchain {
        let mut toolchain = Toolchain::default();
        toolchain.paths.share_dir = Some(self.bin.path().to_path_buf());
        toolchain.tools.verifier = Some(
            self.bin
                .path()
                .join("equiv.sh")
                .to_string_lossy()
                .into_owned(),
        );
        toolchain
    }

    fn pipeline(&self) -> Pipeline {
        self.pipeline_with(self.toolchain())
    }

    fn pipeline_with(&self, toolchain: Toolchain) -> Pipeline {
        let locator = SearchPath::new([self.bin.path()]);
        Pipeline::new(toolchain, ProcessRunner::new(Arc::new(locator)))
    }

    fn leftover_files(&self) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(self.work.path())
            .expect("work dir readable")
            .map(|entry| entry.expect("entry").file_name().to_string_lossy().into_owned())
            .filter(|name| name != "calls.log")
            .collect();
        names.sort();
        names
    }
}

fn lut_request(input: &Path, output: &Path) -> PipelineRequest {
    PipelineRequest::new(input, output, Backend::Fpga, TargetKind::LutMapped)
}

#[tokio::test]
async fn staged_success_cleans_intermediates_and_keeps_output() {
    let fx = Fixture::new();
    let input = fx.input("design.v");
    let request = lut_request(&input, &fx.output()).with_options(["--assert-sat", "-k", "4"]);

    let report = fx.pipeline().run_staged("eqmap", &request).await;

    assert_eq!(report.exit_code, 0, "error: {:?}", report.error);
    assert!(report.success());
    assert_eq!(fx.leftover_files(), vec!["design.v", "mapped.v"]);
    assert_eq!(fs::read_to_string(&input).expect("input"), DESIGN);
    assert_eq!(fs::read_to_string(fx.output()).expect("output"), "mapped\n");

    let calls = fx.calls();
    assert_eq!(calls.len(), 3);
    assert!(calls[0].starts_with("make ") && calls[0].ends_with("design.v.yxil"));
    assert!(calls[1].starts_with("backend ") && calls[1].contains("design.v.yxil"));
    assert!(calls[1].ends_with("mapped.v --assert-sat -k 4"));
    assert!(calls[2].starts_with("verify "));

    let manifest = report.manifest.as_ref().expect("manifest recorded");
    assert!(manifest.path.ends_with("design.v.mk"));
    assert_eq!(manifest.digest.len(), 64);
    assert_eq!(report.cleaned.len(), 2);
}

#[tokio::test]
async fn backend_failure_short_circuits_verification() {
    let fx = Fixture::new();
    fx.tool("eqmap_fpga", "exit 3");
    let input = fx.input("design.v");

    let report = fx
        .pipeline()
        .run_staged("eqmap", &lut_request(&input, &fx.output()))
        .await;

    assert_eq!(report.exit_code, 3);
    assert_eq!(report.error_class, Some(ErrorClass::Backend));
    assert!(!report.ran(Stage::Verify));
    assert!(fx.calls().iter().all(|line| !line.starts_with("verify")));
    assert_eq!(fx.leftover_files(), vec!["design.v"]);
}

#[tokio::test]
async fn verifier_failure_propagates_and_leaves_output() {
    let fx = Fixture::new();
    fx.tool("equiv.sh", "exit 5");
    let input = fx.input("design.v");

    let report = fx
        .pipeline()
        .run_staged("eqmap", &lut_request(&input, &fx.output()))
        .await;

    assert_eq!(report.exit_code, 5);
    assert_eq!(report.error_class, Some(ErrorClass::Verification));
    assert_eq!(
        report.error.as_deref(),
        Some(
            format!(
                "verify stage failed: {} exited with code 5",
                fx.bin.path().join("equiv.sh").display()
            )
            .as_str()
        )
    );
    assert_eq!(fx.leftover_files(), vec!["design.v", "mapped.v"]);
}

#[tokio::test]
async fn interpreter_failure_propagates_its_code() {
    let fx = Fixture::new();
    fx.tool("make", "exit 2");
    let input = fx.input("design.v");

    let report = fx
        .pipeline()
        .run_staged("eqmap", &lut_request(&input, &fx.output()))
        .await;

    assert_eq!(report.exit_code, 2);
    assert_eq!(report.error_class, Some(ErrorClass::ManifestInterpretation));
    assert!(!report.ran(Stage::Backend));
    assert_eq!(fx.leftover_files(), vec!["design.v"]);
}

#[tokio::test]
async fn missing_input_fails_before_any_write() {
    let fx = Fixture::new();
    let input = fx.work.path().join("absent.v");

    let report = fx
        .pipeline()
        .run_staged("eqmap", &lut_request(&input, &fx.output()))
        .await;

    assert_eq!(report.exit_code, EXIT_PREFLIGHT);
    assert_eq!(report.error_class, Some(ErrorClass::Preflight));
    assert!(report.stages.is_empty());
    assert!(fx.leftover_files().is_empty());
}

#[tokio::test]
async fn missing_backend_is_caught_in_preflight() {
    let fx = Fixture::new();
    fx.remove_tool("eqmap_asic");
    let input = fx.input("design.v");
    let request = PipelineRequest::new(&input, fx.output(), Backend::Asic, TargetKind::CellMapped)
        .with_flags(ManifestFlags::asic_mapping());

    let report = fx.pipeline().run_staged("msynth", &request).await;

    assert_eq!(report.exit_code, EXIT_PREFLIGHT);
    assert_eq!(
        report.error.as_deref(),
        Some("preflight stage failed: eqmap_asic not found in PATH")
    );
    assert!(report.stages.is_empty());
    assert_eq!(fx.leftover_files(), vec!["design.v"]);
}

struct VanishingBackend {
    inner: SearchPath,
    ghost: PathBuf,
}

impl ToolLocator for VanishingBackend {
    fn locate(&self, program: &str) -> Option<PathBuf> {
        if program == "eqmap_fpga" {
            Some(self.ghost.clone())
        } else {
            self.inner.locate(program)
        }
    }
}

#[tokio::test]
async fn backend_missing_at_spawn_still_cleans_up() {
    let fx = Fixture::new();
    let input = fx.input("design.v");
    let locator = VanishingBackend {
        inner: SearchPath::new([fx.bin.path()]),
        ghost: fx.bin.path().join("gone").join("eqmap_fpga"),
    };
    let pipeline = Pipeline::new(fx.toolchain(), ProcessRunner::new(Arc::new(locator)));

    let report = pipeline
        .run_staged("eqmap", &lut_request(&input, &fx.output()))
        .await;

    assert_eq!(report.exit_code, EXIT_PREFLIGHT);
    assert_eq!(report.error_class, Some(ErrorClass::Backend));
    assert!(report.ran(Stage::Interpret));
    assert!(!report.ran(Stage::Verify));
    assert_eq!(fx.leftover_files(), vec!["design.v"]);
}

#[tokio::test]
async fn missing_verifier_is_a_verification_failure() {
    let fx = Fixture::new();
    fx.remove_tool("equiv.sh");
    let input = fx.input("design.v");

    let report = fx
        .pipeline()
        .run_staged("eqmap", &lut_request(&input, &fx.output()))
        .await;

    assert_eq!(report.exit_code, EXIT_PREFLIGHT);
    assert_eq!(report.error_class, Some(ErrorClass::Verification));
    assert_eq!(fx.leftover_files(), vec!["design.v", "mapped.v"]);
}

#[tokio::test]
async fn verifier_runs_from_input_directory_with_absolute_paths() {
    let fx = Fixture::new();
    let input = fx.input("design.v");

    let report = fx
        .pipeline()
        .run_staged("eqmap", &lut_request(&input, &fx.output()))
        .await;
    assert!(report.success());

    let root = fs::canonicalize(fx.work.path()).expect("canonical work dir");
    let verify = fx
        .calls()
        .into_iter()
        .find(|line| line.starts_with("verify "))
        .expect("verifier ran");
    assert_eq!(
        verify,
        format!(
            "verify {} {} {}",
            root.display(),
            root.join("design.v").display(),
            root.join("mapped.v").display()
        )
    );
}

#[tokio::test]
async fn hung_backend_times_out_and_cleans_up() {
    let fx = Fixture::new();
    fx.tool("eqmap_fpga", "exec sleep 30");
    let input = fx.input("design.v");
    let mut toolchain = fx.toolchain();
    toolchain.limits.timeout_secs = Some(1);

    let report = fx
        .pipeline_with(toolchain)
        .run_staged("eqmap", &lut_request(&input, &fx.output()))
        .await;

    assert_eq!(report.exit_code, EXIT_TIMEOUT);
    assert_eq!(report.error_class, Some(ErrorClass::Timeout));
    assert_eq!(fx.leftover_files(), vec!["design.v"]);
}

#[tokio::test]
async fn timed_out_interpreter_cannot_write_artifacts_after_cleanup() {
    let fx = Fixture::new();
    // The recipe's synthesis step outlives make and writes the artifact late.
    fx.tool(
        "make",
        "test -f \"$2\" || exit 9\n( sleep 2; echo late > \"$3\" ) &\nwait",
    );
    let input = fx.input("design.v");
    let mut toolchain = fx.toolchain();
    toolchain.limits.timeout_secs = Some(1);

    let report = fx
        .pipeline_with(toolchain)
        .run_staged("eqmap", &lut_request(&input, &fx.output()))
        .await;

    assert_eq!(report.exit_code, EXIT_TIMEOUT);
    assert_eq!(fx.leftover_files(), vec!["design.v"]);

    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(fx.leftover_files(), vec!["design.v"]);
}

#[tokio::test]
async fn vendor_target_requires_vivado() {
    let fx = Fixture::new();
    fx.remove_tool("vivado");
    let input = fx.input("design.v");
    let request = PipelineRequest::new(&input, fx.output(), Backend::Fpga, TargetKind::VendorPlaced);

    let report = fx.pipeline().run_staged("eqmap-vivado", &request).await;

    assert_eq!(report.exit_code, EXIT_PREFLIGHT);
    assert_eq!(
        report.error.as_deref(),
        Some("preflight stage failed: vivado not found in PATH")
    );
}

#[tokio::test]
async fn concurrent_runs_on_distinct_inputs_do_not_collide() {
    let fx = Fixture::new();
    let a = fx.input("a.v");
    let b = fx.input("b.v");
    let out_a = fx.work.path().join("a_out.v");
    let out_b = fx.work.path().join("b_out.v");
    let pipeline = fx.pipeline();

    let req_a = lut_request(&a, &out_a);
    let req_b = lut_request(&b, &out_b);
    let (ra, rb) = tokio::join!(
        pipeline.run_staged("eqmap", &req_a),
        pipeline.run_staged("eqmap", &req_b)
    );

    assert!(ra.success() && rb.success());
    assert_ne!(ra.manifest, rb.manifest);
    assert_eq!(
        fx.leftover_files(),
        vec!["a.v", "a_out.v", "b.v", "b_out.v"]
    );
}

#[tokio::test]
async fn verified_variant_checks_equivalence_twice() {
    let fx = Fixture::new();
    let input = fx.input("design.v");

    let report = fx
        .pipeline()
        .run_verified("lvv", &lut_request(&input, &fx.output()))
        .await;

    assert!(report.success());
    let verifications = fx
        .calls()
        .iter()
        .filter(|line| line.starts_with("verify "))
        .count();
    assert_eq!(verifications, 2);
    assert_eq!(fx.leftover_files(), vec!["design.v", "mapped.v"]);
}

#[tokio::test]
async fn direct_variant_maps_raw_input_then_verifies() {
    let fx = Fixture::new();
    let input = fx.input("design.v");
    let request = TransformRequest::new(&input, fx.output()).with_options(["-k", "6"]);

    let report = fx.pipeline().run_direct("fam", Backend::Fpga, &request).await;

    assert!(report.success(), "error: {:?}", report.error);
    assert!(report.manifest.is_none());
    assert_eq!(fs::read_to_string(fx.output()).expect("output"), DESIGN);
    let calls = fx.calls();
    assert!(calls[0].starts_with("backend ") && calls[0].ends_with("-k 6"));
    assert!(calls[1].starts_with("verify "));
}

#[tokio::test]
async fn direct_variant_propagates_verifier_code() {
    let fx = Fixture::new();
    fx.tool("equiv.sh", "exit 5");
    let input = fx.input("design.v");

    let report = fx
        .pipeline()
        .run_direct("fam", Backend::Fpga, &TransformRequest::new(&input, fx.output()))
        .await;

    assert_eq!(report.exit_code, 5);
}

#[tokio::test]
async fn chained_variant_streams_frontend_into_transformer() {
    let fx = Fixture::new();
    let input = fx.input("design.v");

    let report = fx
        .pipeline()
        .run_chained("opt-verilog", &TransformRequest::new(&input, fx.output()))
        .await;

    assert!(report.success(), "error: {:?}", report.error);
    assert!(report.ran(Stage::Frontend));
    assert!(report.ran(Stage::Transform));
    assert!(report.ran(Stage::Verify));
    assert_eq!(fs::read_to_string(fx.output()).expect("output"), DESIGN);
}

#[tokio::test]
async fn chained_variant_reports_missing_transformer_before_verifying() {
    let fx = Fixture::new();
    fx.remove_tool("eqmap");
    let input = fx.input("design.v");

    let report = fx
        .pipeline()
        .run_chained("opt-verilog", &TransformRequest::new(&input, fx.output()))
        .await;

    assert_eq!(report.exit_code, EXIT_PREFLIGHT);
    assert_eq!(
        report.error.as_deref(),
        Some("transform stage failed: eqmap not found in PATH")
    );
    assert!(!report.ran(Stage::Verify));
    assert!(fx.calls().is_empty());
}

#[tokio::test]
async fn chained_variant_reports_missing_frontend_before_verifying() {
    let fx = Fixture::new();
    fx.remove_tool("parse-verilog");
    let input = fx.input("design.v");

    let report = fx
        .pipeline()
        .run_chained("opt-verilog", &TransformRequest::new(&input, fx.output()))
        .await;

    assert_eq!(report.exit_code, EXIT_PREFLIGHT);
    assert_eq!(
        report.error.as_deref(),
        Some("frontend stage failed: parse-verilog not found in PATH")
    );
    assert!(!report.ran(Stage::Verify));
    assert!(!fx.output().exists());
}

#[tokio::test]
async fn chained_variant_tolerates_transformer_that_stops_reading() {
    let fx = Fixture::new();
    fx.tool("parse-verilog", "seq 1 500000");
    fx.tool("eqmap", "head -n 1");
    let input = fx.input("design.v");

    let report = fx
        .pipeline()
        .run_chained("opt-verilog", &TransformRequest::new(&input, fx.output()))
        .await;

    assert!(report.success(), "error: {:?}", report.error);
    assert!(report.ran(Stage::Verify));
    assert_eq!(fs::read_to_string(fx.output()).expect("output"), "1\n");
    assert_eq!(fx.calls().len(), 1);
}

#[tokio::test]
async fn chained_variant_propagates_transformer_failure() {
    let fx = Fixture::new();
    fx.tool("eqmap", "cat >/dev/null; exit 4");
    let input = fx.input("design.v");

    let report = fx
        .pipeline()
        .run_chained("opt-verilog", &TransformRequest::new(&input, fx.output()))
        .await;

    assert_eq!(report.exit_code, 4);
    assert_eq!(report.error_class, Some(ErrorClass::Backend));
    assert!(!report.ran(Stage::Verify));
}
