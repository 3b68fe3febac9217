//! Integration tests for the structural type checker against full source
//! snippets (parsed with `saffron::parse`), in the flat-file `tests/*.rs`
//! style `ouros`'s own integration suite uses.

use pretty_assertions::assert_eq;
use saffron_typecheck::check;

fn diagnostics(source: &str) -> Vec<String> {
    let statements = saffron::parse(source).expect("parses");
    check(&statements).into_iter().map(|d| d.message).collect()
}

#[test]
fn well_typed_program_has_no_diagnostics() {
    let source = "\
        fun add(a: Number, b: Number): Number { return a + b; }\n\
        var x: Number = add(1, 2);\n\
        println(x);";
    assert!(diagnostics(source).is_empty());
}

#[test]
fn calling_a_function_with_the_wrong_argument_type_is_reported() {
    let source = "\
        fun needs_number(n: Number): Number { return n; }\n\
        needs_number(\"not a number\");";
    let diags = diagnostics(source);
    assert!(!diags.is_empty());
}

#[test]
fn assigning_an_incompatible_value_to_a_declared_type_is_reported() {
    let source = "var x: Number = \"hello\";";
    let diags = diagnostics(source);
    assert!(!diags.is_empty());
}

#[test]
fn undefined_variable_reference_is_reported() {
    let diags = diagnostics("println(totally_undefined);");
    assert!(diags.iter().any(|m| m.to_lowercase().contains("undefined")));
}

#[test]
fn subclass_field_access_type_checks_against_the_declared_field_type() {
    let source = "\
        class Animal { var name: String; init(name) { this.name = name; } }\n\
        class Dog < Animal {}\n\
        var d = Dog(\"Rex\");\n\
        var n: String = d.name;";
    assert!(diagnostics(source).is_empty());
}

#[test]
fn accessing_an_unknown_field_is_reported() {
    let source = "\
        class Animal { var name: String; init(name) { this.name = name; } }\n\
        var a = Animal(\"Rex\");\n\
        println(a.nonexistent_field);";
    let diags = diagnostics(source);
    assert!(!diags.is_empty());
}

#[test]
fn an_import_alias_is_permissively_typed_as_any() {
    // saffron-typecheck runs over a single file's AST with no filesystem
    // access, so it cannot type an import's exports; the alias is bound to
    // `Any` and using it in any way never produces a diagnostic.
    let source = "import \"helpers.saf\" as helpers;\nprintln(helpers.whatever());";
    assert!(diagnostics(source).is_empty());
}

#[test]
fn type_checker_diagnostics_never_abort_after_the_first_error() {
    let source = "\
        fun needs_number(n: Number): Number { return n; }\n\
        needs_number(\"one\");\n\
        needs_number(\"two\");";
    let diags = diagnostics(source);
    assert_eq!(diags.len(), 2, "expected both calls to be reported, got {diags:?}");
}

#[test]
fn time_clock_is_a_known_member_of_the_time_namespace() {
    let source = "var t: Number = time.clock();\nprintln(t);";
    assert!(diagnostics(source).is_empty());
}
