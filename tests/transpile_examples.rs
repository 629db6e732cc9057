use std::collections::BTreeSet;
use std::fs;

use rspu::config::output;
use rspu::project::Project;
use rspu::syntax::parse_source_file;

/// Wrap members in a one-class source file.
fn source_file(path: &str, class: &str, members: &str) -> String {
    format!(
        r#"{{ "path": "{}", "classes": [ {{ "name": {{ "node": "{}" }}, "members": [ {} ] }} ] }}"#,
        path, class, members
    )
}

const ID_PARAM: &str = r#"{
    "attributes": [ { "attributes": [ { "name": { "node": "SV_DispatchThreadID" } } ] } ],
    "ty": { "node": { "kind": "Identifier", "name": "uint3" } },
    "name": { "node": "id" }
}"#;

fn numthreads(x: u32, y: u32, z: u32) -> String {
    let arg = |n: u32| format!(r#"{{ "node": {{ "kind": "NumericLiteral", "text": "{}" }} }}"#, n);
    format!(
        r#"{{ "attributes": [ {{ "name": {{ "node": "numthreads" }}, "args": [ {}, {}, {} ] }} ] }}"#,
        arg(x),
        arg(y),
        arg(z)
    )
}

fn entry_method(name: &str, body: &str) -> String {
    format!(
        r#"{{ "node": {{
            "kind": "Method",
            "attributes": [ {} ],
            "return_ty": {{ "node": {{ "kind": "Predefined", "name": "void" }} }},
            "name": {{ "node": "{}" }},
            "params": [ {} ],
            "body": {{ "node": {{ "stmts": [ {} ] }} }}
        }} }}"#,
        numthreads(1, 1, 1),
        name,
        ID_PARAM,
        body
    )
}

const ID_X: &str = r#"{ "node": { "kind": "MemberAccess",
    "target": { "node": { "kind": "Identifier", "name": "id" } },
    "name": { "node": "x" } } }"#;

fn counter_members() -> String {
    let store = format!(
        r#"{{ "node": {{ "kind": "Expression", "expr": {{ "node": {{
            "kind": "Assignment", "op": "Assign",
            "lhs": {{ "node": {{ "kind": "ElementAccess",
                "target": {{ "node": {{ "kind": "Identifier", "name": "values" }} }},
                "indices": [ {id} ] }} }},
            "rhs": {{ "node": {{ "kind": "Binary", "op": "Multiply",
                "lhs": {id},
                "rhs": {{ "node": {{ "kind": "NumericLiteral", "text": "2" }} }} }} }}
        }} }} }}, "span": {{ "start": 0, "end": 0, "line": 9 }} }}"#,
        id = ID_X
    );
    format!(
        r#"{{ "node": {{ "kind": "Field",
            "ty": {{ "node": {{ "kind": "Generic", "name": "RWStructuredBuffer",
                "args": [ {{ "node": {{ "kind": "Predefined", "name": "uint" }} }} ] }} }},
            "variables": [ {{ "name": {{ "node": "values" }} }} ] }} }},
        {{ "node": {{ "kind": "Constructor", "name": "Counter" }} }},
        {}"#,
        entry_method("CSMain", &store)
    )
}

#[test]
fn test_counter_class_from_json() {
    let json = source_file("Kernels/Counter.cs", "Counter", &counter_members());
    let file = parse_source_file(&json).unwrap();
    let (kernels, errors) = rspu::transpile_source_file(&file, None);
    assert!(errors.is_empty(), "unexpected diagnostics: {:?}", errors);
    assert_eq!(kernels.len(), 1);
    assert_eq!(kernels[0].0, "Counter");
    assert_eq!(
        kernels[0].1,
        "#pragma kernel CSMain\n\
         \n\
         RWStructuredBuffer<uint> values;\n\
         \n\
         [numthreads(1, 1, 1)]\n\
         void CSMain (uint3 id : SV_DispatchThreadID)\n\
         {\n    values[id.x] = id.x * 2;\n}\n\n"
    );
}

/// `x = true ? 1 : 2;` on line 12.
const TERNARY: &str = r#"{ "node": { "kind": "Expression", "expr": { "node": {
        "kind": "Assignment", "op": "Assign",
        "lhs": { "node": { "kind": "Identifier", "name": "x" } },
        "rhs": { "node": { "kind": "Conditional",
            "condition": { "node": { "kind": "BoolLiteral", "value": true } },
            "when_true": { "node": { "kind": "NumericLiteral", "text": "1" } },
            "when_false": { "node": { "kind": "NumericLiteral", "text": "2" } } },
            "span": { "start": 120, "end": 138, "line": 12 } }
    } } }, "span": { "start": 116, "end": 139, "line": 12 } }"#;

#[test]
fn test_ternary_points_at_its_line() {
    let json = source_file(
        "Assets\\\\Kernels\\\\Pick.cs",
        "Pick",
        &entry_method("Main", TERNARY),
    );
    let file = parse_source_file(&json).unwrap();

    let errors = rspu::transpile(std::path::Path::new(&file.path), &file.classes[0]).unwrap_err();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].message.contains("ConditionalExpression"));
    assert_eq!(errors[0].link().as_deref(), Some("Assets/Kernels/Pick.cs:12"));

    let partial = rspu::transpile_lossy(std::path::Path::new(&file.path), &file.classes[0]);
    assert!(partial.source.starts_with("#pragma kernel Main\n"));
}

#[test]
fn test_project_sync_writes_and_prunes() {
    let dir = tempfile::tempdir().unwrap();
    let toml_path = dir.path().join("rspu.toml");
    fs::write(&toml_path, "[project]\nname = \"demo\"\noutput = \"shaders\"\n").unwrap();
    let project = Project::load(&toml_path).unwrap();

    // A kernel from a class that has since been deleted.
    output::write_kernel(&project, "Old", "#pragma kernel Main\n").unwrap();

    let json = source_file("kernels/Counter.cs", "Counter", &counter_members());
    let file = parse_source_file(&json).unwrap();
    let (kernels, errors) = rspu::transpile_source_file(&file, Some(dir.path()));
    assert!(errors.is_empty());

    // A failing class links to its file relative to the project root.
    let broken_path = dir.path().join("kernels").join("Broken.cs");
    let json = source_file(
        &broken_path.to_string_lossy(),
        "Broken",
        &entry_method("Main", TERNARY),
    );
    let broken = parse_source_file(&json).unwrap();
    let (none, errors) = rspu::transpile_source_file(&broken, Some(dir.path()));
    assert!(none.is_empty());
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].link().as_deref(), Some("kernels/Broken.cs:12"));

    let mut live = BTreeSet::new();
    for (class, source) in &kernels {
        output::write_kernel(&project, class, source).unwrap();
        live.insert(class.clone());
    }
    let removed = output::prune(&project, &live).unwrap();

    assert_eq!(removed, vec![dir.path().join("shaders/rspu-Old.compute")]);
    let written = fs::read_to_string(dir.path().join("shaders/rspu-Counter.compute")).unwrap();
    assert!(written.contains("RWStructuredBuffer<uint> values;"));
}
