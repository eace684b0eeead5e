use pmlx_core::{
    ExprErrorKind, Frontend, FrontendError, FrontendErrorKind, MTypeCode, Model, SimpleFrontend,
    VariableType,
};
use std::fs;
use tempfile::TempDir;

const MODEL: &str = r#"/* declarations */
mtype = { RED, GREEN, BLUE };

#define N 4

byte x = 2;
int a[N];
bool done = false;
mtype color = RED;
chan c = [2] of { mtype, byte };

typedef Msg {
    byte kind;
    int val[2]
};
Msg m;
Msg box[2];

#define ready (color == BLUE && len(c) > 0)
#define total (a[x] + m.val[1])
#define pick ((x > 1) -> box[x].kind : GREEN)
#define waiting c?[RED, x]
"#;

fn parse(input: &str) -> Result<Model, FrontendError> {
    SimpleFrontend::default()
        .parse_and_resolve(input, "model.pml")
        .map(|output| output.ir)
}

fn parse_err(input: &str) -> FrontendError {
    match parse(input) {
        Ok(_) => panic!("expected error"),
        Err(err) => err,
    }
}

#[test]
fn declarations_resolve() {
    let output = SimpleFrontend::default()
        .parse_and_resolve(MODEL, "model.pml")
        .expect("parse_and_resolve");
    let model = output.ir;
    assert!(output.diagnostics.is_empty());

    assert_eq!(model.mtypes.code("BLUE"), Some(MTypeCode::new(2)));
    assert_eq!(model.variables.len(), 7);
    assert_eq!(model.variables.lookup("a").and_then(|v| v.array_len()), Some(4));
    let channel = model.variables.lookup("c").and_then(|v| v.channel().cloned());
    assert_eq!(
        channel.map(|signature| (signature.capacity, signature.fields)),
        Some((2, vec![VariableType::Mtype, VariableType::Byte]))
    );

    let names: Vec<_> = model
        .definitions
        .iter()
        .map(|definition| definition.name.value.as_str())
        .collect();
    assert_eq!(names, vec!["N", "ready", "total", "pick", "waiting"]);
    assert_eq!(model.initializers.len(), 3);
    assert_eq!(model.stats().definitions, 5);
}

#[test]
fn definitions_carry_types_and_code() {
    let model = parse(MODEL).expect("parse");
    let ready = &model.definition("ready").expect("ready").expr;
    assert_eq!(ready.result_type(), VariableType::Bool);
    assert_eq!(ready.bool_code(), "((color == 2) && (chan_len(c) > 0))");

    let total = &model.definition("total").expect("total").expr;
    assert_eq!(total.result_type(), VariableType::Int);
    assert_eq!(total.int_code(), "(a[x] + m.val[1])");

    let pick = &model.definition("pick").expect("pick").expr;
    assert_eq!(pick.int_code(), "((x > 1) ? box[x].kind : 1)");

    let waiting = &model.definition("waiting").expect("waiting").expr;
    assert_eq!(waiting.bool_code(), "chan_poll(c, 0, ANY)");
}

#[test]
fn mtype_base_is_configurable() {
    let output = SimpleFrontend::with_mtype_base(1)
        .parse_and_resolve("mtype = { A, B };\n#define first (A < B)\n", "model.pml")
        .expect("parse_and_resolve");
    let first = &output.ir.definition("first").expect("first").expr;
    assert_eq!(first.bool_code(), "(1 < 2)");
}

#[test]
fn macros_expand_to_their_body() {
    let model = parse("byte x;\n#define big (x > 10)\n#define flag !big\n").expect("parse");
    let flag = &model.definition("flag").expect("flag").expr;
    assert_eq!(flag.bool_code(), "!(x > 10)");
}

#[test]
fn unused_mtype_constants_are_warned() {
    let output = SimpleFrontend::default()
        .parse_and_resolve("mtype = { USED, SPARE };\nmtype m = USED;\n", "model.pml")
        .expect("parse_and_resolve");
    assert_eq!(output.diagnostics.len(), 1);
    assert_eq!(
        output.diagnostics[0].message,
        "mtype constant SPARE is never used"
    );
    let span = output.diagnostics[0].span.clone().expect("span");
    assert_eq!((span.start_line, span.start_col), (1, 17));
}

#[test]
fn syntax_error_is_invalid_input_with_span() {
    let err = parse_err("byte x;\n#define bad (x + )\n");
    assert_eq!(err.kind, FrontendErrorKind::InvalidInput);
    let span = err.span.expect("span");
    assert_eq!((span.start_line, span.start_col), (2, 18));
}

#[test]
fn undefined_name_is_unresolved() {
    let err = parse_err("byte x;\n#define bad (x + y)\n");
    assert_eq!(
        err.kind,
        FrontendErrorKind::Semantic(ExprErrorKind::UnresolvedReference)
    );
    assert_eq!(err.to_string(), "model.pml:2:18: undefined variable: y");
}

#[test]
fn type_errors_surface_as_semantic() {
    let err = parse_err("chan c = [1] of { byte };\n#define bad (c + 1)\n");
    assert_eq!(
        err.kind,
        FrontendErrorKind::Semantic(ExprErrorKind::TypeMismatch)
    );

    let err = parse_err("chan c = [1] of { byte };\nbyte x = c;\n");
    assert_eq!(
        err.kind,
        FrontendErrorKind::Semantic(ExprErrorKind::TypeMismatch)
    );

    let err = parse_err("byte a[2];\n#define bad a[2]\n");
    assert_eq!(
        err.kind,
        FrontendErrorKind::Semantic(ExprErrorKind::InvalidIndex)
    );

    let err = parse_err("byte x;\n#define bad (x / 0)\n");
    assert_eq!(
        err.kind,
        FrontendErrorKind::Semantic(ExprErrorKind::InvalidOperand)
    );
}

#[test]
fn duplicate_names_are_rejected() {
    let err = parse_err("mtype = { RED, RED };\n");
    assert_eq!(
        err.kind,
        FrontendErrorKind::Semantic(ExprErrorKind::DuplicateDeclaration)
    );

    let err = parse_err("mtype = { RED };\nbyte RED;\n");
    assert_eq!(
        err.kind,
        FrontendErrorKind::Semantic(ExprErrorKind::DuplicateDeclaration)
    );

    let err = parse_err("byte x;\nint x;\n");
    assert_eq!(
        err.kind,
        FrontendErrorKind::Semantic(ExprErrorKind::DuplicateDeclaration)
    );
}

#[test]
fn process_bodies_are_unsupported() {
    let err = parse_err("byte x;\nactive proctype P() {\n  x = 1\n}\n");
    assert_eq!(err.kind, FrontendErrorKind::UnsupportedSyntax);
    let span = err.span.expect("span");
    assert_eq!((span.start_line, span.start_col), (2, 1));

    let err = parse_err("#include \"other.pml\"\nbyte x;\n");
    assert_eq!(err.kind, FrontendErrorKind::UnsupportedSyntax);

    let err = parse_err("#define twice(v) (v * 2)\n");
    assert_eq!(err.kind, FrontendErrorKind::UnsupportedSyntax);
}

#[test]
fn empty_input_is_invalid() {
    let err = parse_err("// nothing here\n");
    assert_eq!(err.kind, FrontendErrorKind::InvalidInput);
    assert_eq!(err.to_string(), "empty input");
}

#[test]
fn array_size_must_be_constant() {
    let err = parse_err("byte n;\nbyte a[n];\n");
    assert_eq!(
        err.kind,
        FrontendErrorKind::Semantic(ExprErrorKind::UnresolvedReference)
    );

    let err = parse_err("byte a[0];\n");
    assert_eq!(
        err.kind,
        FrontendErrorKind::Semantic(ExprErrorKind::InvalidIndex)
    );
}

#[test]
fn resolve_file_uses_the_given_path() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("model.pml");
    fs::write(&path, "byte x;\n#define big (x > 3)\n").expect("write model");

    let output = SimpleFrontend::default()
        .resolve_file(&path)
        .expect("resolve_file");
    let big = &output.ir.definition("big").expect("big").expr;
    assert_eq!(big.span().path, path.to_string_lossy());

    let missing = dir.path().join("missing.pml");
    let err = match SimpleFrontend::default().resolve_file(&missing) {
        Ok(_) => panic!("expected error"),
        Err(err) => err,
    };
    assert_eq!(err.kind, FrontendErrorKind::InvalidInput);
    assert!(err.span.is_none());
    assert!(err.to_string().starts_with("cannot read input: "));
}

#[test]
fn constant_indexes_are_folded_before_bounds_checks() {
    for body in ["a[-1]", "a[2 + 2]", "a[((1 < 2) -> 4 : 0)]"] {
        let err = parse_err(&format!("int a[4];\n#define g ({body} > 0)\n"));
        assert_eq!(
            err.kind,
            FrontendErrorKind::Semantic(ExprErrorKind::InvalidIndex),
            "{body}"
        );
    }

    let model = parse("int a[4];\n#define g a[1 + 2]\n").expect("parse");
    let g = &model.definition("g").expect("g").expr;
    let reads: Vec<_> = g.read_variables().iter().map(ToString::to_string).collect();
    assert_eq!(reads, vec!["a[3]"]);
    assert_eq!(g.int_code(), "a[(1 + 2)]");

    let model = parse("#define N (2 * 3)\nbyte a[N];\n").expect("parse");
    assert_eq!(model.variables.lookup("a").and_then(|v| v.array_len()), Some(6));
}

#[test]
fn negative_literals_reach_the_int_minimum() {
    let model = parse("int low = -2147483648;\n").expect("parse");
    let low = &model.initializers[0].value;
    assert_eq!(low.result_type(), VariableType::Int);
    assert_eq!(low.int_code(), "(-2147483648)");
    assert_eq!(low.constant_value(), Some(i64::from(i32::MIN)));

    let err = parse_err("int low = -2147483649;\n");
    assert_eq!(
        err.kind,
        FrontendErrorKind::Semantic(ExprErrorKind::InvalidLiteral)
    );
}

#[test]
fn mtype_codes_fit_in_a_byte() {
    let err = match SimpleFrontend::with_mtype_base(255)
        .parse_and_resolve("mtype = { LAST, OVER };\nmtype m = LAST;\n", "model.pml")
    {
        Ok(_) => panic!("expected error"),
        Err(err) => err,
    };
    assert_eq!(
        err.kind,
        FrontendErrorKind::Semantic(ExprErrorKind::Capacity)
    );
    let span = err.span.expect("span");
    assert_eq!((span.start_line, span.start_col), (1, 17));
}
