#![cfg(unix)]

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use gldmodel::{
    run_model, BootstrapCache, Dispatcher, EngineError, EngineGateway, ErrorKind, ExitStatus,
    GatewayConfig, ModelError, ProcessGateway,
};
use pretty_assertions::assert_eq;

/// Stand-in engine. Writes a model to the `-o` path, echoing an input model
/// back when one is given; `--modhelp M` declares module `M` with a class
/// `node`; `--fail` exits 3.
const FAKE_ENGINE: &str = r#"
out=""
module=""
input=""
fail=""
log=""
version_file=""
while [ $# -gt 0 ]; do
    case "$1" in
        -o) out="$2"; shift 2 ;;
        --modhelp) module="$2"; shift 2 ;;
        --fail) fail=1; shift ;;
        --log=*) log="${1#--log=}"; shift ;;
        --version-file=*) version_file="${1#--version-file=}"; shift ;;
        *) input="$1"; shift ;;
    esac
done
if [ -n "$log" ]; then echo "$out" > "$log"; fi
if [ -n "$fail" ]; then
    echo "fatal: model rejected" >&2
    exit 3
fi
echo "engine ran"
if [ -n "$input" ]; then
    cat "$input" > "$out"
    exit 0
fi
version="4.3.1"
if [ -n "$version_file" ]; then version=$(cat "$version_file"); fi
modules='{}'
classes='{}'
if [ -n "$module" ]; then
    modules="{\"$module\": {\"major\": 4, \"minor\": 3}}"
    classes="{\"node\": {\"module\": \"$module\", \"phases\": {\"type\": \"set\", \"flags\": \"REQUIRED\"}}}"
fi
cat > "$out" <<EOF
{
    "application": "gridlabd",
    "version": "$version",
    "types": {"set": {}, "double": {}, "object": {}},
    "header": {"id": {"type": "double"}, "parent": {"type": "object"}},
    "globals": {},
    "modules": $modules,
    "classes": $classes,
    "objects": {}
}
EOF
"#;

struct Fixture {
    dir: tempfile::TempDir,
    script: PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("engine.sh");
        fs::write(&script, FAKE_ENGINE).unwrap();
        Self { dir, script }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Runs the script through `/bin/sh` so it never needs the exec bit.
    fn gateway(&self, extra: &[String]) -> ProcessGateway {
        let mut options = vec![self.script.display().to_string()];
        options.extend_from_slice(extra);
        ProcessGateway::new(
            GatewayConfig::default()
                .with_command("/bin/sh")
                .with_options(options),
        )
    }
}

fn scratch_dir_removed(log: &Path) -> bool {
    let output = fs::read_to_string(log).unwrap();
    let output = PathBuf::from(output.trim());
    assert!(output.ends_with("output.json"));
    !output.parent().unwrap().exists()
}

#[test]
fn bootstrap_then_import_module() {
    let fixture = Fixture::new();
    let gateway = fixture.gateway(&[]);

    let mut cache = BootstrapCache::new();
    let mut model = cache.fresh_model(&gateway).unwrap();
    assert!(cache.is_cached());
    assert_eq!(gateway.session_version(), Some("4.3.1"));
    assert!(model.schema.classes.is_empty());

    let module = model.add_module(&gateway, "powerflow").unwrap();
    assert_eq!(module.version(), "4.3");
    assert!(model.schema.classes.contains_key("node"));

    let err = model.add_object("node", None, BTreeMap::new()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MissingValue);
    let props = BTreeMap::from([("phases".to_string(), "ABC".to_string())]);
    assert_eq!(model.add_object("node", None, props).unwrap().name, "node:0");
}

#[test]
fn engine_failure_reports_exit_code_and_stderr() {
    let fixture = Fixture::new();
    let log = fixture.path("run.log");
    let gateway = fixture.gateway(&["--fail".to_string(), format!("--log={}", log.display())]);

    let err = gateway.run(&[]).unwrap_err();
    match &err {
        ModelError::Engine(EngineError::Failed { code, stderr }) => {
            assert_eq!(*code, Some(3));
            assert_eq!(stderr, "fatal: model rejected");
        }
        other => panic!("expected Failed, got {other}"),
    }
    assert_eq!(ExitStatus::from(&err), ExitStatus::EngineFailed);
    assert!(scratch_dir_removed(&log));
    assert!(gateway.session_version().is_none());
}

#[test]
fn scratch_output_is_removed_after_success() {
    let fixture = Fixture::new();
    let log = fixture.path("run.log");
    let gateway = fixture.gateway(&[format!("--log={}", log.display())]);

    gateway.run(&[]).unwrap();
    assert!(scratch_dir_removed(&log));
}

#[test]
fn version_change_within_session_is_rejected() {
    let fixture = Fixture::new();
    let version = fixture.path("version");
    fs::write(&version, "4.3.1").unwrap();
    let gateway = fixture.gateway(&[format!("--version-file={}", version.display())]);

    gateway.run(&[]).unwrap();
    fs::write(&version, "4.4.0").unwrap();
    let err = gateway.run(&[]).unwrap_err();
    assert!(matches!(err, ModelError::Engine(EngineError::Payload { .. })));
    assert_eq!(gateway.session_version(), Some("4.3.1"));
}

#[test]
fn model_round_trips_through_engine() {
    let fixture = Fixture::new();
    let gateway = fixture.gateway(&[]);
    let mut model = gateway.run(&[]).unwrap();
    model.add_schedule("load_shape", "* * * * * 1.0").unwrap();

    let returned = run_model(&model, &gateway, &[]).unwrap();
    assert_eq!(returned, model);
}

#[test]
fn dispatcher_creates_model_through_process_engine() {
    let fixture = Fixture::new();
    let gateway = fixture.gateway(&[]);
    let mut dispatcher = Dispatcher::new(&gateway);
    let mut model = None;

    assert_eq!(dispatcher.run(["create"], &mut model), ExitStatus::Ok);
    assert_eq!(dispatcher.run(["insert", "module", "powerflow"], &mut model), ExitStatus::Ok);
    assert_eq!(
        dispatcher.run(["insert", "object", "node", "n1", "phases=A"], &mut model),
        ExitStatus::Ok
    );
    assert_eq!(
        dispatcher.run(["delete", "module", "powerflow"], &mut model),
        ExitStatus::InvalidArguments
    );
    assert_eq!(
        dispatcher.run(["delete", "module", "powerflow", "found=delete"], &mut model),
        ExitStatus::Ok
    );

    let model = model.unwrap();
    assert!(model.schema.modules.is_empty());
    assert!(model.graph.objects.is_empty());
    assert!(dispatcher.cache().is_cached());
}
