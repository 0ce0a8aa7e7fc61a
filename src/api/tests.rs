use super::*;
use crate::ir::optimize::Pass;

const SQUARE_SUM: &str = "\
x = input x
y = input y
zero = const 0
xx = x * x
yy = y * y
xx2 = x * x
s = xx + yy
t = s + zero
u = xx2 + yy
output f = t
output g = u
";

#[test]
fn test_compile_valid_script() {
    let source = compile(SQUARE_SUM, "sum.sym").unwrap();
    assert_eq!(
        source,
        "const double v_0 = x;\n\
         const double v_1 = y;\n\
         const double v_3 = v_0 * v_0;\n\
         const double v_4 = v_1 * v_1;\n\
         const double v_6 = v_3 + v_4;\n\
         f = v_6;\n\
         g = v_6;"
    );
}

#[test]
fn test_compile_reports_pass_totals() {
    let options = CodegenOptions::for_target("rust");
    let generated = compile_with_options(SQUARE_SUM, "sum.sym", &options).unwrap();
    assert_eq!(generated.target, "rust");
    assert_eq!(generated.lines[0], "let v_0 = x;");
    assert_eq!(generated.report.changes.get(&Pass::ConstantFolding), Some(&1));
    assert!(generated.report.changes[&Pass::CommonSubexpressionElimination] >= 2);
}

#[test]
fn test_compile_without_optimization_keeps_everything() {
    let options = CodegenOptions::default().with_optimizer(OptimizerConfig::none());
    let generated = compile_with_options(SQUARE_SUM, "sum.sym", &options).unwrap();
    assert_eq!(generated.lines.len(), 11);
    assert_eq!(generated.report.total_changes(), 0);
}

#[test]
fn test_compile_syntax_error_returns_err() {
    let result = compile("x = input x\ny = x +\n", "bad.cap");
    let errors = result.unwrap_err();
    assert_eq!(errors.len(), 1);
}

#[test]
fn test_unknown_target() {
    let mut g = ExprGraph::new();
    let x = g.input("x");
    g.output(x, "y").unwrap();
    let err = compile_graph(&mut g, &CodegenOptions::for_target("cobol")).unwrap_err();
    assert_eq!(err, CodegenError::UnknownTarget("cobol".into()));
    assert_eq!(
        err.to_string(),
        "unknown target `cobol` (expected one of: c, rust)"
    );
    // nothing ran
    assert_eq!(g.len(), 2);
    assert!(g.live().count() == 2);

    let errors = compile_silent("x = input x\n", &CodegenOptions::for_target("cobol")).unwrap_err();
    assert!(errors[0].message.starts_with("unknown target `cobol`"));
}

#[test]
fn test_compile_graph_optimizer_failure() {
    let mut g = ExprGraph::new();
    let zero = g.constant(0.0);
    let x = g.input("x");
    let s = g.binary("+", x, zero).unwrap();
    g.output(s, "y").unwrap();
    let options =
        CodegenOptions::default().with_optimizer(OptimizerConfig::default().with_max_iterations(1));
    assert!(matches!(
        compile_graph(&mut g, &options),
        Err(CodegenError::Optimize(OptimizeError::NoConvergence { .. }))
    ));
}

#[test]
fn test_check_returns_capture() {
    let capture = check(SQUARE_SUM, "sum.sym").unwrap();
    assert_eq!(capture.names.len(), 9);
    assert_eq!(capture.graph.len(), 11);
}

#[test]
fn test_compile_many_preserves_order() {
    let graphs: Vec<ExprGraph> = (0..8)
        .map(|i| {
            let mut g = ExprGraph::new();
            let c = g.constant(f64::from(i));
            g.output(c, &format!("out{}", i)).unwrap();
            g
        })
        .collect();
    let results = compile_many(graphs, &CodegenOptions::default());
    assert_eq!(results.len(), 8);
    for (i, result) in results.into_iter().enumerate() {
        let generated = result.unwrap();
        assert_eq!(generated.lines[1], format!("out{} = v_0;", i));
    }
}

#[test]
fn test_generated_serializes_to_json() {
    let generated = compile_with_options(SQUARE_SUM, "sum.sym", &CodegenOptions::default()).unwrap();
    let json = serde_json::to_value(&generated).unwrap();
    assert_eq!(json["target"], "c");
    assert_eq!(json["statements"][0]["kind"]["kind"], "declaration");
    assert_eq!(json["report"]["changes"]["constant-folding"], 1);
}
