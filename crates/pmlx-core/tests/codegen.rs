mod common;

use common::{at, bin, int, member, mtype, span, table, var, GREEN, RED};
use pmlx_core::{BinaryOp, ChannelOp, Expression, UnaryOp};

#[test]
fn literals() {
    assert_eq!(int(5).int_code(), "5");
    assert_eq!(int(5).bool_code(), "true");
    assert_eq!(int(0).bool_code(), "false");
    assert_eq!(int(-5).int_code(), "(-5)");

    let yes = Expression::bool_literal(&span(), true);
    assert_eq!(yes.int_code(), "1");
    assert_eq!(yes.bool_code(), "true");
    let no = Expression::bool_literal(&span(), false);
    assert_eq!(no.int_code(), "0");
    assert_eq!(no.bool_code(), "false");
}

#[test]
fn mtype_constants_render_their_code() {
    assert_eq!(mtype(GREEN).int_code(), "1");
    assert_eq!(mtype(GREEN).bool_code(), "true");
    assert_eq!(mtype(RED).int_code(), "0");
    assert_eq!(mtype(RED).bool_code(), "false");
}

#[test]
fn arithmetic_in_both_contexts() {
    let t = table();
    let sum = bin(BinaryOp::Add, var(&t, "x"), int(1));
    assert_eq!(sum.int_code(), "(x + 1)");
    assert_eq!(sum.bool_code(), "((x + 1) != 0)");

    let shifted = bin(BinaryOp::Shl, var(&t, "x"), int(2));
    assert_eq!(shifted.int_code(), "(x << 2)");
}

#[test]
fn comparisons_in_both_contexts() {
    let t = table();
    let less = bin(BinaryOp::Lt, var(&t, "x"), int(3));
    assert_eq!(less.bool_code(), "(x < 3)");
    assert_eq!(less.int_code(), "((x < 3) ? 1 : 0)");

    let same = bin(BinaryOp::Eq, var(&t, "m"), mtype(GREEN));
    assert_eq!(same.bool_code(), "(m == 1)");
}

#[test]
fn logical_operands_render_as_conditions() {
    let t = table();
    let both = bin(BinaryOp::And, var(&t, "b"), var(&t, "x"));
    assert_eq!(both.bool_code(), "((b != 0) && (x != 0))");
    assert_eq!(both.int_code(), "(((b != 0) && (x != 0)) ? 1 : 0)");

    let either = bin(
        BinaryOp::Or,
        bin(BinaryOp::Gt, var(&t, "x"), int(0)),
        var(&t, "b"),
    );
    assert_eq!(either.bool_code(), "((x > 0) || (b != 0))");
}

#[test]
fn unary_operators() {
    let t = table();
    let not = Expression::unary(&span(), UnaryOp::Not, var(&t, "x")).unwrap();
    assert_eq!(not.bool_code(), "!(x != 0)");
    assert_eq!(not.int_code(), "(!(x != 0) ? 1 : 0)");

    let neg = Expression::unary(&span(), UnaryOp::Neg, var(&t, "x")).unwrap();
    assert_eq!(neg.int_code(), "(-x)");
    assert_eq!(neg.bool_code(), "((-x) != 0)");

    let flipped = Expression::unary(&span(), UnaryOp::BitNot, var(&t, "x")).unwrap();
    assert_eq!(flipped.int_code(), "(~x)");
}

#[test]
fn ternary_renders_the_condition_as_bool() {
    let t = table();
    let pick = Expression::ternary(&span(), var(&t, "b"), var(&t, "x"), int(1)).unwrap();
    assert_eq!(pick.int_code(), "((b != 0) ? x : 1)");
    assert_eq!(pick.bool_code(), "((b != 0) ? (x != 0) : true)");
}

#[test]
fn channel_helpers() {
    let t = table();
    let len = Expression::channel_query(&span(), ChannelOp::Len, var(&t, "c")).unwrap();
    assert_eq!(len.int_code(), "chan_len(c)");
    assert_eq!(len.bool_code(), "(chan_len(c) != 0)");

    let nempty = Expression::channel_query(&span(), ChannelOp::NonEmpty, var(&t, "c")).unwrap();
    assert_eq!(nempty.bool_code(), "chan_nempty(c)");
    assert_eq!(nempty.int_code(), "(chan_nempty(c) ? 1 : 0)");

    let full = Expression::channel_query(&span(), ChannelOp::Full, var(&t, "d")).unwrap();
    assert_eq!(full.bool_code(), "chan_full(d)");
}

#[test]
fn poll_uses_wildcards_for_variables() {
    let t = table();
    let poll = Expression::poll(&span(), var(&t, "c"), vec![mtype(RED), var(&t, "x")]).unwrap();
    assert_eq!(poll.bool_code(), "chan_poll(c, 0, ANY)");
    assert_eq!(poll.int_code(), "(chan_poll(c, 0, ANY) ? 1 : 0)");

    let by_value = Expression::poll(
        &span(),
        var(&t, "c"),
        vec![mtype(GREEN), bin(BinaryOp::Add, var(&t, "x"), int(1))],
    )
    .unwrap();
    assert_eq!(by_value.bool_code(), "chan_poll(c, 1, (x + 1))");
}

#[test]
fn variable_locations() {
    let t = table();
    assert_eq!(at(&t, "a", var(&t, "x")).int_code(), "a[x]");
    assert_eq!(var(&t, "a").int_code(), "a[0]");
    assert_eq!(
        at(&t, "a", bin(BinaryOp::Add, var(&t, "i"), int(1))).int_code(),
        "a[(i + 1)]"
    );
    assert_eq!(
        member(&t, "box", Some(int(1)), "val", Some(var(&t, "y"))).int_code(),
        "box[1].val[y]"
    );
    assert_eq!(member(&t, "msg", None, "kind", None).int_code(), "msg.kind");
}

#[test]
fn eval_is_transparent() {
    let t = table();
    let evaluated = Expression::eval(&span(), var(&t, "x")).unwrap();
    assert_eq!(evaluated.int_code(), "x");
    assert_eq!(evaluated.bool_code(), "(x != 0)");
}

#[test]
fn code_is_deterministic() {
    let t = table();
    let expr = bin(
        BinaryOp::And,
        bin(BinaryOp::Le, at(&t, "a", var(&t, "i")), var(&t, "s")),
        Expression::channel_query(&span(), ChannelOp::NonFull, var(&t, "c")).unwrap(),
    );
    assert_eq!(expr.bool_code(), expr.clone().bool_code());
    assert_eq!(expr.int_code(), expr.int_code());
}
