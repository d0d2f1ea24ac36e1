//! End-to-end compilation scenarios.

use planter_compiler::{
    parse_tree, Class, CompileError, Feature, FeatureSet, Manifest, QuantizationFault,
    TreeBuilder, TreeCompiler,
};

const MANIFEST: &str = r#"
[budget]
max_stages = 8
max_table_entries = 4096

[[features]]
id = 0
name = "sttl"
bit_width = 8
min = 0
max = 255
extraction = { source = "ip_ttl", bits = 8 }

[[features]]
id = 1
name = "sport"
bit_width = 16
min = 0
max = 65535
extraction = { source = "src_port", bits = 16 }

[[features]]
id = 2
name = "dsport"
bit_width = 16
min = 0
max = 65535
extraction = { source = "dst_port", bits = 16 }
"#;

/// sttl <= 64 -> Normal, else (dsport <= 1023 -> Attack, else Normal)
const REFERENCE_TREE: &str = r#"{"nodes": [
    {"kind": "split", "feature": 0, "threshold": 64, "left": 1, "right": 2},
    {"kind": "leaf", "class": "normal"},
    {"kind": "split", "feature": 2, "threshold": 1023, "left": 3, "right": 4},
    {"kind": "leaf", "class": "attack"},
    {"kind": "leaf", "class": "normal"}
]}"#;

fn manifest() -> Manifest {
    Manifest::from_toml(MANIFEST).unwrap()
}

#[test]
fn test_reference_tree_end_to_end() {
    let manifest = manifest();
    let features = manifest.feature_set().unwrap();
    let tree = parse_tree(REFERENCE_TREE).unwrap();
    let compilation = TreeCompiler::new(manifest.config())
        .compile(&tree, &features)
        .unwrap();

    let text = compilation.emit();
    assert!(text.starts_with("table_set_default ml_feature_0 set_code_0 0\n"));
    assert!(text.contains("table_add ml_feature_0 set_code_0 0->64 => 0 1\n"));
    assert!(text.contains("table_add ml_feature_1 set_code_1 0->65535 => 0 1\n"));
    assert!(text.contains("table_add ml_feature_2 set_code_2 0->1023 => 0 1\n"));
    assert!(text.contains("table_add ml_classify set_class 1 0 0 => 1\n"));
    assert_eq!(text.lines().filter(|l| l.contains("ml_classify")).count(), 1 + 4);

    let program = &compilation.program;
    assert_eq!(program.classify(&[64, 40000, 80]), Class::Normal);
    assert_eq!(program.classify(&[65, 40000, 80]), Class::Attack);
    assert_eq!(program.classify(&[65, 40000, 1024]), Class::Normal);
    assert_eq!(program.classify(&[255, 0, 1023]), Class::Attack);
}

#[test]
fn test_sklearn_artifact_matches_native() {
    let sklearn = r#"{
        "children_left": [1, -1, 3, -1, -1],
        "children_right": [2, -1, 4, -1, -1],
        "feature": [0, -2, 2, -2, -2],
        "threshold": [64.5, -2.0, 1023.5, -2.0, -2.0],
        "value": [[[50, 50]], [[40, 2]], [[10, 48]], [[1, 45]], [[9, 3]]]
    }"#;
    let features = manifest().feature_set().unwrap();
    let compiler = TreeCompiler::default();

    let from_sklearn = compiler.compile(&parse_tree(sklearn).unwrap(), &features).unwrap();
    let native = compiler
        .compile(&parse_tree(REFERENCE_TREE).unwrap(), &features)
        .unwrap();
    assert_eq!(from_sklearn.emit(), native.emit());
}

#[test]
fn test_threshold_outside_domain() {
    let features = FeatureSet::new(vec![Feature::new(0, "sttl", 8)]).unwrap();
    let mut b = TreeBuilder::new();
    let l = b.leaf(Class::Normal);
    let r = b.leaf(Class::Attack);
    let root = b.split(0, 300, l, r);

    let err = TreeCompiler::default()
        .compile(&b.build(root), &features)
        .unwrap_err();
    assert!(matches!(
        err,
        CompileError::Quantization {
            fault: QuantizationFault::ThresholdOutOfDomain { threshold: 300, .. },
            ..
        }
    ));
    assert_eq!(err.kind(), "QuantizationError");
    assert!(err.to_string().contains("300"));
}

#[test]
fn test_unknown_feature() {
    let features = manifest().feature_set().unwrap();
    let mut b = TreeBuilder::new();
    let l = b.leaf(Class::Normal);
    let r = b.leaf(Class::Attack);
    let root = b.split(7, 10, l, r);

    let err = TreeCompiler::default()
        .compile(&b.build(root), &features)
        .unwrap_err();
    assert_eq!(err.kind(), "UnknownFeatureError");
}

#[test]
fn test_dangling_child_is_malformed() {
    let tree = parse_tree(
        r#"{"nodes": [
            {"kind": "split", "feature": 0, "threshold": 10, "left": 1, "right": 9},
            {"kind": "leaf", "class": "normal"}
        ]}"#,
    )
    .unwrap();
    let err = TreeCompiler::default()
        .compile(&tree, &manifest().feature_set().unwrap())
        .unwrap_err();
    assert_eq!(err.kind(), "MalformedTreeError");
}

#[test]
fn test_stage_budget_counts_feature_tables() {
    let features = FeatureSet::new((0..9).map(|i| Feature::new(i, format!("f{}", i), 8)).collect()).unwrap();
    let tree = planter_compiler::DecisionTree::constant(Class::Normal);
    let err = TreeCompiler::default().compile(&tree, &features).unwrap_err();
    assert!(matches!(
        err,
        CompileError::StageBudgetExceeded { tables: 9, budget: 8 }
    ));
}

#[test]
fn test_errors_map_to_distinct_exit_codes() {
    let features = manifest().feature_set().unwrap();
    let compiler = TreeCompiler::default();

    let mut b = TreeBuilder::new();
    let l = b.leaf(Class::Normal);
    let r = b.leaf(Class::Attack);
    let root = b.split(0, 1000, l, r);
    let quantization = compiler.compile(&b.build(root), &features).unwrap_err();

    let mut b = TreeBuilder::new();
    let l = b.leaf(Class::Normal);
    let r = b.leaf(Class::Attack);
    let root = b.split(9, 1, l, r);
    let unknown = compiler.compile(&b.build(root), &features).unwrap_err();

    assert_ne!(quantization.exit_code(), unknown.exit_code());
    assert_ne!(quantization.exit_code(), 0);
    assert_ne!(unknown.exit_code(), 0);
}

#[test]
fn test_demo_inputs_compile() {
    let demos = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("../../demos");
    let manifest = Manifest::load(demos.join("features.toml")).unwrap();
    let features = manifest.feature_set().unwrap();
    let compiler = TreeCompiler::new(manifest.config());

    let native = planter_compiler::load_tree(demos.join("tree.json")).unwrap();
    let compilation = compiler.compile(&native, &features).unwrap();
    assert_eq!(compilation.stats.stages, 5);
    assert_eq!(compilation.stats.table_rows, 8);
    assert_eq!(compilation.program.classify(&[100, 5000, 80, 6]), Class::Attack);
    assert_eq!(compilation.program.classify(&[100, 5000, 80, 17]), Class::Normal);

    let sklearn = planter_compiler::load_tree(demos.join("tree_sklearn.json")).unwrap();
    assert!(compiler.compile(&sklearn, &features).is_ok());
}
