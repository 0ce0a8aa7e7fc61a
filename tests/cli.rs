use std::fs;
use std::path::Path;
use std::process::{Command, Output};

const CONDITIONAL: &str = "\
a = input a
b = input b
c = a < b
if c
r = const 3
else
r = const 4
endif
output y = r
";

const FOLDABLE: &str = "\
x = input x
zero = const 0
y = x + zero
output f = y
";

fn symgen(args: &[&str], dir: &Path) -> Output {
    Command::new(env!("CARGO_BIN_EXE_symgen"))
        .args(args)
        .current_dir(dir)
        .env_remove("RUST_LOG")
        .env_remove("SYMGEN_LOG")
        .output()
        .expect("failed to run symgen")
}

fn stderr(out: &Output) -> String {
    String::from_utf8_lossy(&out.stderr).into_owned()
}

#[test]
fn test_build_writes_c_next_to_input() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("cond.sym"), CONDITIONAL).unwrap();

    let out = symgen(&["build", "cond.sym"], dir.path());
    assert!(out.status.success(), "{}", stderr(&out));
    assert!(stderr(&out).contains("Compiled -> cond.c"));

    let c = fs::read_to_string(dir.path().join("cond.c")).unwrap();
    assert!(c.starts_with("double v_4;\n"));
    assert!(c.contains("if (v_2) {\n"));
    assert!(c.contains("  v_4 = v_3;\n} else {\n"));
    assert!(c.contains("  v_4 = v_5;\n}\n"));
    assert!(c.ends_with("y = v_4;\n"));
}

#[test]
fn test_build_rust_to_stdout() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("fold.sym"), FOLDABLE).unwrap();

    let out = symgen(&["build", "fold.sym", "--target", "rust", "-o", "-"], dir.path());
    assert!(out.status.success(), "{}", stderr(&out));
    assert_eq!(
        String::from_utf8_lossy(&out.stdout),
        "let v_0 = x;\nf = v_0;\n"
    );
}

#[test]
fn test_build_without_optimization() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("fold.sym"), FOLDABLE).unwrap();

    let out = symgen(&["build", "fold.sym", "-O0", "--stats", "-o", "-"], dir.path());
    assert!(out.status.success(), "{}", stderr(&out));
    assert_eq!(String::from_utf8_lossy(&out.stdout).lines().count(), 4);
    assert!(stderr(&out).contains("iterations: 1"));
}

#[test]
fn test_build_stats_and_json() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("fold.sym"), FOLDABLE).unwrap();

    let out = symgen(&["build", "fold.sym", "--format", "json", "--stats"], dir.path());
    assert!(out.status.success(), "{}", stderr(&out));
    assert!(stderr(&out).contains("constant folding: 1"));

    let text = fs::read_to_string(dir.path().join("fold.json")).unwrap();
    let json: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(json["target"], "c");
    assert_eq!(json["lines"][1], "f = v_0;");
    assert_eq!(json["report"]["changes"]["dead-code-elimination"], 1);
}

#[test]
fn test_build_many_inputs() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("one.sym"), CONDITIONAL).unwrap();
    fs::write(dir.path().join("two.sym"), FOLDABLE).unwrap();

    let out = symgen(&["build", "one.sym", "two.sym", "--target", "rust"], dir.path());
    assert!(out.status.success(), "{}", stderr(&out));
    assert!(dir.path().join("one.rs").exists());
    assert!(dir.path().join("two.rs").exists());

    let out = symgen(&["build", "one.sym", "two.sym", "-o", "x.c"], dir.path());
    assert!(!out.status.success());
}

#[test]
fn test_disabled_passes_keep_graph() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("fold.sym"), FOLDABLE).unwrap();

    let out = symgen(&["build", "fold.sym", "--no-fold", "-o", "-"], dir.path());
    assert!(out.status.success(), "{}", stderr(&out));
    assert!(String::from_utf8_lossy(&out.stdout).contains("v_0 + v_1"));
}

#[test]
fn test_build_reports_capture_errors() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("bad.sym"), "x = input x\ny = x + z\n").unwrap();

    let out = symgen(&["build", "bad.sym"], dir.path());
    assert!(!out.status.success());
    assert!(stderr(&out).contains("unknown name `z`"));
    assert!(!dir.path().join("bad.c").exists());
}

#[test]
fn test_unknown_target() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("fold.sym"), FOLDABLE).unwrap();

    let out = symgen(&["build", "fold.sym", "--target", "cobol"], dir.path());
    assert!(!out.status.success());
    assert!(stderr(&out).contains("unknown target `cobol`"));
}

#[test]
fn test_optimizer_limit() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("fold.sym"), FOLDABLE).unwrap();

    let out = symgen(&["build", "fold.sym", "--max-iterations", "1"], dir.path());
    assert!(!out.status.success());
    assert!(stderr(&out).contains("did not converge after 1 iterations"));
}

#[test]
fn test_check() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("cond.sym"), CONDITIONAL).unwrap();
    fs::write(dir.path().join("open.sym"), "a = input a\nt = test isnan(a)\nif t\n").unwrap();

    let out = symgen(&["check", "cond.sym"], dir.path());
    assert!(out.status.success(), "{}", stderr(&out));
    assert!(stderr(&out).contains("OK: cond.sym (11 expressions, 4 names)"));

    let out = symgen(&["check", "cond.sym", "open.sym"], dir.path());
    assert!(!out.status.success());
    assert!(stderr(&out).contains("is never closed"));
}

#[test]
fn test_graph_dot() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("fold.sym"), FOLDABLE).unwrap();

    let out = symgen(&["graph", "fold.sym"], dir.path());
    assert!(out.status.success(), "{}", stderr(&out));
    let dot = String::from_utf8_lossy(&out.stdout).into_owned();
    assert!(dot.starts_with("digraph {"));
    assert!(dot.contains("v_2 = v_0 + v_1"));

    let out = symgen(&["graph", "fold.sym", "--optimized", "-o", "g.dot"], dir.path());
    assert!(out.status.success(), "{}", stderr(&out));
    let dot = fs::read_to_string(dir.path().join("g.dot")).unwrap();
    assert!(!dot.contains("v_2 = v_0 + v_1"));
}
