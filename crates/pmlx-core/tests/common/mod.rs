#![allow(dead_code)]

use pmlx_core::{
    BinaryOp, ChannelSignature, Expression, FieldDecl, MTypeCode, SourceSpan, VariableRef,
    VariableTable, VariableType,
};

pub const RED: MTypeCode = MTypeCode::new(0);
pub const GREEN: MTypeCode = MTypeCode::new(1);

pub fn span() -> SourceSpan {
    SourceSpan {
        path: "model.pml".to_string(),
        start_line: 1,
        start_col: 1,
        end_line: 1,
        end_col: 1,
    }
}

/// bool b; byte x, y; short s; int i; mtype m; int a[4];
/// chan c = [2] of { mtype, byte }; chan d;
/// typedef Msg { byte kind; int val[2] }; Msg msg; Msg box[2];
pub fn table() -> VariableTable {
    let mut table = VariableTable::new();
    let scalars = [
        ("b", VariableType::Bool),
        ("x", VariableType::Byte),
        ("y", VariableType::Byte),
        ("s", VariableType::Short),
        ("i", VariableType::Int),
        ("m", VariableType::Mtype),
    ];
    for (name, ty) in scalars {
        table.declare_scalar(name, ty, None, &span()).unwrap();
    }
    table
        .declare_scalar("a", VariableType::Int, Some(4), &span())
        .unwrap();
    table
        .declare_channel(
            "c",
            Some(ChannelSignature {
                capacity: 2,
                fields: vec![VariableType::Mtype, VariableType::Byte],
            }),
            None,
            &span(),
        )
        .unwrap();
    table.declare_channel("d", None, None, &span()).unwrap();
    table
        .define_struct(
            "Msg",
            vec![
                FieldDecl {
                    name: "kind".to_string(),
                    ty: VariableType::Byte,
                    array_len: None,
                },
                FieldDecl {
                    name: "val".to_string(),
                    ty: VariableType::Int,
                    array_len: Some(2),
                },
            ],
            &span(),
        )
        .unwrap();
    table.declare_struct_var("msg", "Msg", None, &span()).unwrap();
    table
        .declare_struct_var("box", "Msg", Some(2), &span())
        .unwrap();
    table
}

pub fn int(value: i64) -> Expression {
    Expression::int_literal(&span(), value).unwrap()
}

pub fn mtype(code: MTypeCode) -> Expression {
    Expression::mtype(&span(), code)
}

pub fn reference(table: &VariableTable, name: &str, index: Option<Expression>) -> VariableRef {
    let variable = table.resolve(name, &span()).unwrap();
    VariableRef::new(variable, index, &span()).unwrap()
}

pub fn var(table: &VariableTable, name: &str) -> Expression {
    Expression::variable(&span(), reference(table, name, None)).unwrap()
}

pub fn at(table: &VariableTable, name: &str, index: Expression) -> Expression {
    Expression::variable(&span(), reference(table, name, Some(index))).unwrap()
}

/// `name[index].field[field_index]` on a variable of type `Msg`.
pub fn member(
    table: &VariableTable,
    name: &str,
    index: Option<Expression>,
    field: &str,
    field_index: Option<Expression>,
) -> Expression {
    let layout = table.struct_type("Msg").unwrap();
    let field_var = layout.field(field).unwrap().clone();
    let inner = VariableRef::new(field_var, field_index, &span()).unwrap();
    let outer = reference(table, name, index)
        .with_field(inner, &span())
        .unwrap();
    Expression::variable(&span(), outer).unwrap()
}

pub fn bin(op: BinaryOp, left: Expression, right: Expression) -> Expression {
    Expression::binary(&span(), op, left, right).unwrap()
}
