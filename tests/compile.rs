use awlc::{
    CompileError,
    backend::{CodegenOptions, isa::OpCode, pretty_print::format_program},
    compile,
    frontend::CompilationUnit,
    middle::diagnostic::DiagnosticKind,
};
use indoc::indoc;
use pretty_assertions::assert_eq;

const COUNTER: &str = indoc! {r#"
    {
      "enums": [{ "name": "Color", "values": ["Red", "Green"] }],
      "classes": [
        {
          "name": "Box",
          "fields": [
            { "ty": "Int", "name": "value", "initializer": { "kind": { "Literal": { "Int": 1 } } } }
          ],
          "methods": [
            {
              "name": "get",
              "parameters": [],
              "return_type": "Int",
              "body": { "Expression": { "kind": { "Identifier": "value" } } }
            }
          ]
        }
      ],
      "functions": [
        {
          "name": "worker",
          "parameters": [],
          "return_type": "Void",
          "is_thread": true,
          "body": { "Block": { "statements": [
            { "kind": { "Acquire": { "kind": { "Identifier": "l" } } } },
            { "kind": { "Assignment": {
              "target": { "kind": { "Identifier": "total" } },
              "value": { "kind": { "Binary": {
                "operator": "Add",
                "left": { "kind": { "Identifier": "total" } },
                "right": { "kind": { "Literal": { "Int": 1 } } }
              } } }
            } } },
            { "kind": { "Release": { "kind": { "Identifier": "l" } } } }
          ] } }
        },
        {
          "name": "square",
          "parameters": [{ "name": "n", "ty": "Int" }],
          "return_type": "Int",
          "body": { "Expression": { "kind": { "Binary": {
            "operator": "Multiply",
            "left": { "kind": { "Identifier": "n" } },
            "right": { "kind": { "Identifier": "n" } }
          } } } }
        }
      ],
      "statements": [
        { "kind": { "Declaration": { "ty": "Lock", "name": "l" } } },
        { "kind": { "Declaration": {
          "ty": "Int",
          "name": "total",
          "initializer": { "kind": { "Call": {
            "function": "square",
            "arguments": [{ "kind": { "Literal": { "Int": 3 } } }]
          } } }
        } } },
        { "kind": { "Expression": { "kind": { "Call": { "function": "worker", "arguments": [] } } } } },
        { "kind": { "Declaration": {
          "ty": { "Named": "Box" },
          "name": "b",
          "initializer": { "kind": { "New": { "class": "Box", "arguments": [] } } }
        } } },
        { "kind": { "Declaration": {
          "ty": "Int",
          "name": "v",
          "initializer": { "kind": { "MethodCall": {
            "receiver": { "kind": { "Identifier": "b" } },
            "method": "get",
            "arguments": []
          } } }
        } } },
        { "kind": { "Declaration": {
          "ty": { "Named": "Color" },
          "name": "c",
          "initializer": { "kind": { "EnumValue": { "enumeration": "Color", "member": "Green" } } }
        } } }
      ]
    }
"#};

#[test]
fn json_program_compiles_to_a_listing() {
    let unit = CompilationUnit::from_json(COUNTER).unwrap();
    let program = compile(&unit, &CodegenOptions::default()).unwrap();

    assert_eq!(program.cores, 2);

    let ends = program
        .instructions
        .iter()
        .filter(|i| i.opcode == OpCode::EndProg)
        .count();
    assert_eq!(ends, 2);

    let listing = strip_ansi_escapes::strip_str(format_program(&program));
    let lines = listing.lines().collect::<Vec<_>>();

    assert_eq!(lines[..4], ["import Sprockell", "", "prog :: [Instruction]", "prog = ["]);
    assert_eq!(lines.last(), Some(&"main = run (replicate 2 prog)"));

    for label in ["worker_", "square_", "Box.get_", "alloc_", "main_exit_"] {
        assert!(
            lines.iter().any(|line| line.trim_start().starts_with(&format!("-- {label}"))),
            "listing has no {label} label"
        );
    }

    assert!(listing.contains("TestAndSet (DirAddr"));
    assert!(listing.contains("Compute Equal regSprID regA regA"));
}

#[test]
fn listing_without_comments_has_only_positions() {
    let unit = CompilationUnit::from_json(COUNTER).unwrap();
    let options = CodegenOptions {
        emit_comments: false,
        ..CodegenOptions::default()
    };
    let program = compile(&unit, &options).unwrap();
    let listing = strip_ansi_escapes::strip_str(format_program(&program));

    assert!(!listing.contains(": call"));
    assert!(!listing.contains(": declare"));
}

#[test]
fn diagnostics_carry_positions() {
    let unit = CompilationUnit::from_json(indoc! {r#"
        {
          "statements": [
            { "span": { "line": 1, "column": 1 }, "kind": { "Declaration": {
              "span": { "line": 1, "column": 1 },
              "ty": "Int",
              "name": "x",
              "initializer": { "span": { "line": 1, "column": 9 }, "kind": { "Literal": { "Bool": true } } }
            } } },
            { "span": { "line": 2, "column": 1 }, "kind": { "Expression": {
              "span": { "line": 2, "column": 1 },
              "kind": { "Identifier": "missing" }
            } } }
          ]
        }
    "#})
    .unwrap();

    let Err(CompileError::Diagnostics(diagnostics)) = compile(&unit, &CodegenOptions::default())
    else {
        panic!("expected diagnostics");
    };

    assert_eq!(
        diagnostics.iter().map(|d| d.kind).collect::<Vec<_>>(),
        [DiagnosticKind::TypeMismatch, DiagnosticKind::Undeclared]
    );
    assert!(diagnostics[0].to_string().ends_with("(line 1:9)"));
    assert_eq!(
        diagnostics[1].to_string(),
        "use of undeclared identifier `missing` (line 2:1)"
    );
}

#[test]
fn merged_units_see_each_other() {
    let mut unit = CompilationUnit::from_json(indoc! {r#"
        {
          "functions": [
            {
              "name": "twice",
              "parameters": [{ "name": "n", "ty": "Int" }],
              "return_type": "Int",
              "body": { "Expression": { "kind": { "Binary": {
                "operator": "Add",
                "left": { "kind": { "Identifier": "n" } },
                "right": { "kind": { "Identifier": "n" } }
              } } } }
            }
          ]
        }
    "#})
    .unwrap();
    let main = CompilationUnit::from_json(indoc! {r#"
        {
          "statements": [
            { "kind": { "Declaration": {
              "ty": "Int",
              "name": "x",
              "initializer": { "kind": { "Call": {
                "function": "twice",
                "arguments": [{ "kind": { "Literal": { "Int": 21 } } }]
              } } }
            } } }
          ]
        }
    "#})
    .unwrap();

    assert!(compile(&main, &CodegenOptions::default()).is_err());

    unit.merge(main);
    let program = compile(&unit, &CodegenOptions::default()).unwrap();

    assert_eq!(program.cores, 1);
}

#[test]
fn malformed_json_is_rejected() {
    assert!(CompilationUnit::from_json(r#"{ "statements": [ { "kind": "Nope" } ] }"#).is_err());
}
