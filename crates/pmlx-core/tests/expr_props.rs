mod common;

use common::{bin, int, mtype, span, table, var};
use pmlx_core::typing::literal_type;
use pmlx_core::{BinaryOp, Expression, MTypeCode, SourceSpan, VariableType};
use proptest::prelude::*;
use std::collections::BTreeSet;

const NAMES: [&str; 5] = ["b", "x", "y", "s", "i"];
const OPS: [BinaryOp; 6] = [
    BinaryOp::Add,
    BinaryOp::Sub,
    BinaryOp::Mul,
    BinaryOp::BitXor,
    BinaryOp::Lt,
    BinaryOp::Or,
];

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        .. ProptestConfig::default()
    })]

    #[test]
    fn literal_type_holds_the_value(value in i64::from(i32::MIN)..=i64::from(i32::MAX)) {
        let expr = Expression::int_literal(&span(), value).unwrap();
        let ty = expr.result_type();
        prop_assert!(ty.contains(value));
        prop_assert_eq!(literal_type(value), Some(ty));
        prop_assert_eq!(expr.bool_code(), if value == 0 { "false" } else { "true" });
    }

    #[test]
    fn literals_outside_int_are_rejected(value in prop_oneof![
        i64::MIN..i64::from(i32::MIN),
        (i64::from(i32::MAX) + 1)..=i64::MAX,
    ]) {
        prop_assert!(Expression::int_literal(&span(), value).is_err());
    }

    /// Folds `leaves` left to right into a chain of binary operators.
    #[test]
    fn chains_read_exactly_their_leaves(
        leaves in prop::collection::vec((0..NAMES.len(), 0..OPS.len()), 1..12),
    ) {
        let t = table();
        let (first, _) = leaves[0];
        let mut expr = var(&t, NAMES[first]);
        let mut expected = BTreeSet::from([NAMES[first]]);
        for &(name, op) in &leaves[1..] {
            expr = bin(OPS[op], expr, var(&t, NAMES[name]));
            expected.insert(NAMES[name]);
        }

        let reads: BTreeSet<_> = expr
            .read_variables()
            .iter()
            .map(|access| access.variable().name().to_string())
            .collect();
        let expected: BTreeSet<_> = expected.into_iter().map(str::to_string).collect();
        prop_assert_eq!(reads, expected);

        prop_assert_eq!(expr.int_code(), expr.clone().int_code());
        prop_assert_eq!(expr.bool_code(), expr.bool_code());
        prop_assert_ne!(expr.result_type(), VariableType::Chan);
    }

    #[test]
    fn mtype_nodes_are_their_code(k in 0u32..=254, j in 0u32..=254) {
        let node = mtype(MTypeCode::new(k));
        prop_assert_eq!(node.int_code(), k.to_string());
        prop_assert_eq!(node.result_type(), VariableType::Mtype);
        prop_assert!(node.read_variables().is_empty());
        prop_assert_eq!(node.constant_value(), Some(i64::from(k)));

        let elsewhere = SourceSpan {
            start_line: 7,
            end_line: 7,
            ..span()
        };
        let twin = Expression::mtype(&elsewhere, MTypeCode::new(k));
        prop_assert_eq!(&twin, &node);
        prop_assert_eq!(twin.int_code(), node.int_code());
        prop_assert_eq!(twin.bool_code(), node.bool_code());
        prop_assert_eq!(twin.result_type(), node.result_type());
        prop_assert_eq!(twin.read_variables(), node.read_variables());

        let other = mtype(MTypeCode::new(j));
        if j == k {
            prop_assert_eq!(&other, &node);
        } else {
            prop_assert_ne!(&other, &node);
            prop_assert_ne!(other.int_code(), node.int_code());
        }
    }

    #[test]
    fn constant_arithmetic_never_reads(a in 0i64..1000, b in 1i64..1000) {
        let expr = bin(BinaryOp::Div, bin(BinaryOp::Add, int(a), int(b)), int(b));
        prop_assert!(expr.read_variables().is_empty());
        prop_assert_eq!(expr.int_code(), format!("(({a} + {b}) / {b})"));
    }
}
