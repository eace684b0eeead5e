mod common;

use common::{at, bin, int, member, mtype, span, table, var, RED};
use pmlx_core::{
    AccessIndex, BinaryOp, ChannelOp, Expression, MTypeCode, UnaryOp, VariableAccess,
    VariableType,
};
use std::collections::BTreeSet;

fn reads(expr: &Expression) -> Vec<String> {
    expr.read_variables().iter().map(ToString::to_string).collect()
}

#[test]
fn constants_read_nothing() {
    assert!(int(7).read_variables().is_empty());
    assert!(mtype(RED).read_variables().is_empty());
    assert!(Expression::bool_literal(&span(), true)
        .read_variables()
        .is_empty());
}

#[test]
fn repeated_reads_collapse() {
    let t = table();
    let twice = bin(BinaryOp::Mul, var(&t, "x"), var(&t, "x"));
    assert_eq!(reads(&twice), vec!["x"]);
}

#[test]
fn reads_are_ordered_by_declaration() {
    let t = table();
    let expr = bin(
        BinaryOp::Add,
        var(&t, "i"),
        bin(BinaryOp::Sub, var(&t, "x"), var(&t, "b")),
    );
    assert_eq!(reads(&expr), vec!["b", "x", "i"]);
}

#[test]
fn array_elements() {
    let t = table();
    assert_eq!(reads(&at(&t, "a", int(2))), vec!["a[2]"]);
    assert_eq!(reads(&at(&t, "a", var(&t, "i"))), vec!["i", "a[*]"]);
    assert_eq!(reads(&var(&t, "a")), vec!["a[0]"]);

    let nested = at(&t, "a", at(&t, "a", var(&t, "i")));
    assert_eq!(reads(&nested), vec!["i", "a[*]"]);

    let access = at(&t, "a", var(&t, "x"))
        .read_variables()
        .into_iter()
        .find(|access| access.variable().name() == "a")
        .unwrap();
    assert_eq!(access.index(), AccessIndex::AnyElement);
}

#[test]
fn typedef_fields() {
    let t = table();
    let expr = member(&t, "box", Some(var(&t, "y")), "val", Some(int(1)));
    assert_eq!(reads(&expr), vec!["y", "box[*].val[1]"]);

    let expr = member(&t, "msg", None, "kind", None);
    assert_eq!(reads(&expr), vec!["msg.kind"]);
}

#[test]
fn operators_read_all_operands() {
    let t = table();
    let neg = Expression::unary(&span(), UnaryOp::Neg, var(&t, "s")).unwrap();
    assert_eq!(reads(&neg), vec!["s"]);

    let pick = Expression::ternary(&span(), var(&t, "b"), var(&t, "x"), var(&t, "y")).unwrap();
    assert_eq!(reads(&pick), vec!["b", "x", "y"]);

    let len = Expression::channel_query(&span(), ChannelOp::Len, var(&t, "c")).unwrap();
    let guard = bin(BinaryOp::Gt, len, var(&t, "x"));
    assert_eq!(reads(&guard), vec!["x", "c"]);

    let evaluated = Expression::eval(&span(), var(&t, "m")).unwrap();
    assert_eq!(reads(&evaluated), vec!["m"]);
}

#[test]
fn poll_reads_channel_and_compared_arguments() {
    let t = table();
    let poll = Expression::poll(&span(), var(&t, "c"), vec![mtype(RED), var(&t, "x")]).unwrap();
    assert_eq!(reads(&poll), vec!["c"]);
    assert_eq!(poll.bool_code(), "chan_poll(c, 0, ANY)");

    let evaluated = Expression::eval(&span(), var(&t, "x")).unwrap();
    let poll = Expression::poll(&span(), var(&t, "c"), vec![var(&t, "m"), evaluated]).unwrap();
    assert_eq!(reads(&poll), vec!["x", "c"]);

    let poll = Expression::poll(
        &span(),
        var(&t, "c"),
        vec![mtype(RED), member(&t, "box", Some(var(&t, "y")), "kind", None)],
    )
    .unwrap();
    assert_eq!(reads(&poll), vec!["y", "c"]);
}

#[test]
fn reads_cover_every_child() {
    let t = table();
    let expr = bin(
        BinaryOp::Or,
        bin(BinaryOp::Eq, at(&t, "a", var(&t, "i")), var(&t, "s")),
        Expression::poll(
            &span(),
            var(&t, "c"),
            vec![Expression::eval(&span(), var(&t, "m")).unwrap(), int(3)],
        )
        .unwrap(),
    );
    let all = expr.read_variables();
    let mut pending = vec![&expr];
    while let Some(node) = pending.pop() {
        assert!(node.read_variables().is_subset(&all));
        pending.extend(node.children());
    }
}

#[test]
fn comparing_with_an_mtype_reads_only_the_variable() {
    let t = table();
    let guard = bin(BinaryOp::Eq, var(&t, "x"), mtype(MTypeCode::new(2)));
    assert_eq!(guard.result_type(), VariableType::Bool);

    let x = t.resolve("x", &span()).unwrap();
    let expected = BTreeSet::from([VariableAccess::new(x, AccessIndex::Scalar)]);
    assert_eq!(guard.read_variables(), expected);
    assert_eq!(guard.bool_code(), "(x == 2)");
}
