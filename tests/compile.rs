//! End-to-end tests over the compilation pipeline: compile a source text
//! and assert over the result, or over the emitted textual IR.

use argand::{compile, CompileError, Lexer, Token, TokenKind};

fn compile_ok(source: &str) -> String {
    let mut output = Vec::new();
    compile("test", source, &mut output).expect("compilation failed");
    String::from_utf8(output).expect("emitted IR is not UTF-8")
}

fn compile_err(source: &str) -> CompileError {
    let mut output = Vec::new();
    compile("test", source, &mut output).expect_err("expected a compile error")
}

#[test]
fn minimal_program() {
    let ir = compile_ok("fun main : int () { return 0; }");
    assert!(ir.contains("define main () -> i64"));
    assert!(ir.contains("ret"));
}

#[test]
fn body_must_end_with_return() {
    let err = compile_err("fun main : int () int a = 1;");
    assert!(matches!(err, CompileError::Codegen(_)));
    assert!(err
        .to_string()
        .contains("does not end with a return statement"));
}

#[test]
fn branches_returning_do_not_satisfy_the_trailing_return_rule() {
    let err =
        compile_err("fun main : int () { if (1 == 1) { return 1; } else { return 2; } }");
    assert!(err
        .to_string()
        .contains("does not end with a return statement"));
}

#[test]
fn dead_trailing_return_is_accepted() {
    let ir = compile_ok(
        "fun main : int () { if (1 == 1) { return 1; } else { return 2; } return 3; }",
    );
    assert!(ir.contains("define main"));
}

#[test]
fn assignment_to_undeclared_variable() {
    let err = compile_err("fun main : int () { a = 1; return 0; }");
    assert!(err.to_string().contains("Undefined identifier a"));
}

#[test]
fn call_to_undeclared_function() {
    let err = compile_err("fun main : int () { int x = f(0); return x; }");
    assert!(err.to_string().contains("Function f not defined"));
}

#[test]
fn forward_calls_are_rejected() {
    let err = compile_err(
        "fun main : int () { return g(); } \
         fun g : int () { return 1; }",
    );
    assert!(err.to_string().contains("Function g not defined"));
}

#[test]
fn int_plus_double_widens_to_double() {
    let ir = compile_ok("fun main : int () { double d = 1 + 2.5; return 0; }");
    assert!(ir.contains("sitofp"));
    assert!(ir.contains("fadd"));
}

#[test]
fn int_widens_to_complex_through_double() {
    let ir = compile_ok("fun main : int () { complex z = 1 + 2i; return 0; }");
    assert!(ir.contains("sitofp"));
    assert!(ir.contains("alloca {f64, f64}"));
    assert!(ir.contains("getfieldptr"));
}

#[test]
fn complex_multiplication_lowering() {
    let ir = compile_ok("fun main : int () { complex z = (1 + 2i) * (3 + 4i); return 0; }");
    // (ac - bd) + (ad + bc)i
    assert!(ir.contains("fmul"));
    assert!(ir.contains("fsub"));
    assert!(ir.contains("fadd"));
}

#[test]
fn complex_division_divides_by_real_denominator() {
    let ir = compile_ok("fun main : int () { complex z = (1 + 2i) / (3 + 4i); return 0; }");
    assert!(ir.contains("fdiv"));
}

#[test]
fn integer_absolute_value_calls_labs() {
    let ir = compile_ok("fun main : int () { int a = |5|; return a; }");
    assert!(ir.contains("declare labs (i64) -> i64"));
    assert!(ir.contains("call labs("));
}

#[test]
fn complex_absolute_value_is_sqrt_of_component_squares() {
    let ir = compile_ok("fun main : int () { double m = |1 + 2i|; return 0; }");
    assert!(ir.contains("declare sqrt (f64) -> f64"));
    assert!(ir.contains("call sqrt("));
}

#[test]
fn re_and_im_projections() {
    let ir = compile_ok(
        "fun main : int () { \
           complex z = 1 + 2i; \
           double r = Re(z); \
           double j = Im(z); \
           int k = Im(3); \
           return k; \
         }",
    );
    assert!(ir.contains("getfieldptr"));
}

#[test]
fn relational_operators_on_doubles_use_fcmp() {
    let ir = compile_ok("fun main : int () { if (1.5 < 2.5) { return 1; } return 0; }");
    assert!(ir.contains("fcmp lt"));
}

#[test]
fn while_loop_compares_and_branches() {
    let ir = compile_ok(
        "fun main : int () { int n = 0; while (n < 10) { n = n + 1; } return n; }",
    );
    assert!(ir.contains("icmp lt"));
    assert!(ir.contains("br"));
}

#[test]
fn return_value_widens_to_declared_type() {
    let ir = compile_ok(
        "fun f : double (x : int) { return x; } \
         fun main : int () { return 0; }",
    );
    assert!(ir.contains("sitofp"));
}

#[test]
fn global_initializers_run_in_source_order() {
    let ir = compile_ok(
        "int x = 1; \
         int y = 2; \
         fun main : int () { return x; }",
    );
    assert!(ir.contains("@x = common global i64 0"));
    assert!(ir.contains("@y = common global i64 0"));
    let x_store = ir.find("globalref @x").expect("no store to @x");
    let y_store = ir.find("globalref @y").expect("no store to @y");
    assert!(x_store < y_store, "x must be initialized before y");
}

#[test]
fn global_string_is_null_initialized() {
    let ir = compile_ok("string s = \"hi\"; fun main : int () { return 0; }");
    assert!(ir.contains("@s = common global *i8 null"));
    assert!(ir.contains("constant [3 x i8] \"hi\""));
}

#[test]
fn program_without_main_is_rejected() {
    let err = compile_err("int x = 1;");
    assert!(matches!(err, CompileError::Codegen(_)));
    assert!(err.to_string().contains("main"));
}

#[test]
fn main_must_take_no_parameters() {
    let err = compile_err("fun main : int (a : int) { return 0; }");
    assert!(err.to_string().contains("Invalid main function signature"));
}

#[test]
fn main_must_return_int() {
    let err = compile_err("fun main : double () { return 0.0; }");
    assert!(err.to_string().contains("Invalid main function signature"));
}

#[test]
fn function_bodies_cannot_be_redefined() {
    let err = compile_err(
        "fun f : int () { return 1; } \
         fun f : int () { return 2; } \
         fun main : int () { return 0; }",
    );
    assert!(err.to_string().contains("Two functions with the same name: f"));
}

#[test]
fn declaration_then_definition_is_accepted() {
    let ir = compile_ok(
        "fun f : int (a : int); \
         fun f : int (a : int) { return a; } \
         fun main : int () { return f(1); }",
    );
    assert!(ir.contains("define f"));
    assert!(ir.contains("call f("));
}

#[test]
fn definition_must_match_declared_signature() {
    let err = compile_err(
        "fun f : int (a : int); \
         fun f : int (a : double) { return 1; } \
         fun main : int () { return 0; }",
    );
    assert!(err
        .to_string()
        .contains("Mismatch between signatures in definition and declaration of f"));
}

#[test]
fn keyword_function_names_are_rejected() {
    let err = compile_err("fun if : int (); fun main : int () { return 0; }");
    assert!(err
        .to_string()
        .contains("Cannot redefine reserved keyword if"));
}

#[test]
fn call_arity_is_checked() {
    let err = compile_err(
        "fun f : int (a : int) { return a; } \
         fun main : int () { return f(); }",
    );
    assert!(err
        .to_string()
        .contains("Incorrect number of parameters in call to f"));
}

#[test]
fn arguments_widen_to_parameter_types() {
    let ir = compile_ok(
        "fun f : double (a : double) { return a; } \
         fun main : int () { double d = f(1); return 0; }",
    );
    assert!(ir.contains("sitofp"));
}

#[test]
fn strings_do_not_widen() {
    let err = compile_err("fun main : int () { int a = 1 + \"x\"; return a; }");
    assert!(err
        .to_string()
        .contains("Strings cannot be converted to other types"));
}

#[test]
fn absolute_value_of_string_is_rejected() {
    let err = compile_err("fun main : int () { int a = |\"x\"|; return a; }");
    assert!(err
        .to_string()
        .contains("Unsupported type inside absolute value"));
}

#[test]
fn assignment_widens_to_target_type() {
    let ir = compile_ok("fun main : int () { double d = 0.0; d = 1; return 0; }");
    assert!(ir.contains("sitofp"));
}

#[test]
fn narrowing_is_rejected() {
    let err = compile_err("fun main : int () { int a = 1.5; return a; }");
    assert!(err.to_string().contains("Unsupported type conversion"));
}

#[test]
fn lexer_failures_surface_as_lexer_errors() {
    let err = compile_err("fun main : int () { int a = 1 ! 2; return a; }");
    assert!(matches!(err, CompileError::Lexer(_)));
}

#[test]
fn parser_failures_surface_as_parse_errors() {
    let err = compile_err("fun main : int () { int a = 1 return a; }");
    assert!(matches!(err, CompileError::Parse(_)));
    assert!(err.to_string().contains("Missing semicolon ';'"));
}

// Re-lexing the canonical spelling of a token stream yields the same
// stream; the imaginary-unit marker survives because spacing preserves
// the previous-token context it depends on.
#[test]
fn token_stream_unparse_round_trip() {
    let source = "int x = 1 + 2.5i; \
                  string s = \"a\\tb\\nc\"; \
                  fun f : double (a : complex, b : int); \
                  fun main : int () { \
                    if (x <= 2 and not x == 0 or x != 3) { x = |x| * 4 / 2 - 1; } \
                    while (x > 0) { x = x - 1; } \
                    return Re(0 + 1i); \
                  }";
    let tokens = Lexer::new(source).tokenize().expect("lexing failed");
    let spelled: Vec<String> = tokens
        .iter()
        .filter(|t| t.kind != TokenKind::Eof)
        .map(unparse)
        .collect();
    let relexed = Lexer::new(&spelled.join(" "))
        .tokenize()
        .expect("re-lexing failed");
    assert_eq!(tokens, relexed);
}

fn unparse(token: &Token) -> String {
    match token.kind {
        TokenKind::IntLiteral => token.as_int().expect("int token").to_string(),
        TokenKind::DoubleLiteral => {
            let value = token.as_double().expect("double token");
            if value.fract() == 0.0 {
                format!("{:.1}", value)
            } else {
                value.to_string()
            }
        }
        TokenKind::StringLiteral => format!("{:?}", token.text()),
        TokenKind::Type => token.as_type().expect("type token").to_string(),
        TokenKind::Ident
        | TokenKind::Imag
        | TokenKind::Fun
        | TokenKind::Main
        | TokenKind::Or
        | TokenKind::And
        | TokenKind::Not
        | TokenKind::If
        | TokenKind::Else
        | TokenKind::While
        | TokenKind::Return
        | TokenKind::Re
        | TokenKind::Im => token.text().to_string(),
        other => other.to_string(),
    }
}
