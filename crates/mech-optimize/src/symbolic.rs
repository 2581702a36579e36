//! Small owned expression algebra for the solver lowerings: conversion from
//! and to the arena, simplification, substitution and differentiation.

use mech_core::ast::nodes::*;
use mech_core::ast::{Ast, BinaryOp, NodeId, NodeKind, UnaryOp};
use mech_core::span::Span;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum SymExpr {
    Num(f64),
    Var(String),
    /// `name[index]`; never an unknown.
    Indexed(String, Box<SymExpr>),
    Neg(Box<SymExpr>),
    Add(Box<SymExpr>, Box<SymExpr>),
    Sub(Box<SymExpr>, Box<SymExpr>),
    Mul(Box<SymExpr>, Box<SymExpr>),
    Div(Box<SymExpr>, Box<SymExpr>),
    Pow(Box<SymExpr>, Box<SymExpr>),
    Call(String, Vec<SymExpr>),
}

use SymExpr::*;

pub fn num(value: f64) -> SymExpr {
    Num(value)
}

pub fn var(name: impl Into<String>) -> SymExpr {
    Var(name.into())
}

impl SymExpr {
    /// Convert an arithmetic expression. Comparisons, logical operators and
    /// strings have no algebraic meaning here and are rejected with the
    /// offending node.
    pub fn from_ast(ast: &Ast, id: NodeId) -> Result<SymExpr, NodeId> {
        Ok(match ast.kind(id) {
            NodeKind::Integer(value) => Num(value.value as f64),
            NodeKind::Double(value) => Num(value.as_f64().ok_or(id)?),
            NodeKind::Name(name) => Var(name.name.clone()),
            NodeKind::IndexedName(indexed) => Indexed(
                indexed.name.clone(),
                Box::new(SymExpr::from_ast(ast, indexed.index)?),
            ),
            NodeKind::ParenExpression(paren) => SymExpr::from_ast(ast, paren.expr)?,
            NodeKind::UnaryExpression(UnaryExpression {
                op: UnaryOp::Neg,
                operand,
            }) => Neg(Box::new(SymExpr::from_ast(ast, *operand)?)),
            NodeKind::BinaryExpression(binary) => {
                let lhs = Box::new(SymExpr::from_ast(ast, binary.lhs)?);
                let rhs = Box::new(SymExpr::from_ast(ast, binary.rhs)?);
                match binary.op {
                    BinaryOp::Add => Add(lhs, rhs),
                    BinaryOp::Sub => Sub(lhs, rhs),
                    BinaryOp::Mul => Mul(lhs, rhs),
                    BinaryOp::Div => Div(lhs, rhs),
                    BinaryOp::Pow => Pow(lhs, rhs),
                    _ => return Err(id),
                }
            }
            NodeKind::FunctionCall(call) => Call(
                call.name.clone(),
                call.arguments
                    .iter()
                    .map(|&argument| SymExpr::from_ast(ast, argument))
                    .collect::<Result<_, _>>()?,
            ),
            _ => return Err(id),
        })
    }

    /// Allocate fresh nodes for this expression, all carrying `span`.
    /// Numbers become float literals so generated divisions stay in floating
    /// point; literal array indices stay integers.
    pub fn to_ast(&self, ast: &mut Ast, span: Span) -> NodeId {
        match self {
            Num(value) if *value < 0.0 => {
                let magnitude = ast.alloc(Double::from_f64(-value), span);
                ast.unary(UnaryOp::Neg, magnitude, span)
            }
            Num(value) => ast.double(*value, span),
            Var(name) => ast.name(name.clone(), span),
            Indexed(name, index) => {
                let index = match **index {
                    Num(value) if value.fract() == 0.0 => ast.integer(value as i64, span),
                    ref other => other.to_ast(ast, span),
                };
                ast.alloc(
                    IndexedName {
                        name: name.clone(),
                        index,
                    },
                    span,
                )
            }
            Neg(operand) => {
                let operand = operand.to_ast(ast, span);
                ast.unary(UnaryOp::Neg, operand, span)
            }
            Add(l, r) => binary_to_ast(ast, BinaryOp::Add, l, r, span),
            Sub(l, r) => binary_to_ast(ast, BinaryOp::Sub, l, r, span),
            Mul(l, r) => binary_to_ast(ast, BinaryOp::Mul, l, r, span),
            Div(l, r) => binary_to_ast(ast, BinaryOp::Div, l, r, span),
            Pow(l, r) => binary_to_ast(ast, BinaryOp::Pow, l, r, span),
            Call(name, arguments) => {
                let arguments = arguments.iter().map(|a| a.to_ast(ast, span)).collect();
                ast.call(name.clone(), arguments, span)
            }
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Num(value) => Some(*value),
            _ => None,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.as_number() == Some(0.0)
    }

    pub fn is_one(&self) -> bool {
        self.as_number() == Some(1.0)
    }

    pub fn depends_on(&self, name: &str) -> bool {
        match self {
            Num(_) => false,
            Var(var) => var == name,
            Indexed(_, index) => index.depends_on(name),
            Neg(operand) => operand.depends_on(name),
            Add(l, r) | Sub(l, r) | Mul(l, r) | Div(l, r) | Pow(l, r) => {
                l.depends_on(name) || r.depends_on(name)
            }
            Call(_, arguments) => arguments.iter().any(|a| a.depends_on(name)),
        }
    }

    pub fn depends_on_any<S: AsRef<str>>(&self, names: &[S]) -> bool {
        names.iter().any(|name| self.depends_on(name.as_ref()))
    }

    /// Plain variables in order of first appearance.
    pub fn variables(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_variables(&mut out);
        out
    }

    fn collect_variables(&self, out: &mut Vec<String>) {
        match self {
            Num(_) => {}
            Var(name) => {
                if !out.contains(name) {
                    out.push(name.clone());
                }
            }
            Indexed(_, index) => index.collect_variables(out),
            Neg(operand) => operand.collect_variables(out),
            Add(l, r) | Sub(l, r) | Mul(l, r) | Div(l, r) | Pow(l, r) => {
                l.collect_variables(out);
                r.collect_variables(out);
            }
            Call(_, arguments) => arguments.iter().for_each(|a| a.collect_variables(out)),
        }
    }

    /// Replace every occurrence of the variable `name` with `with`.
    pub fn substitute(&self, name: &str, with: &SymExpr) -> SymExpr {
        self.map_vars(&|var| (var == name).then(|| with.clone()))
    }

    /// Rename variables through `rename`; names it does not map stay.
    pub fn map_vars(&self, rename: &dyn Fn(&str) -> Option<SymExpr>) -> SymExpr {
        match self {
            Num(value) => Num(*value),
            Var(name) => rename(name).unwrap_or_else(|| Var(name.clone())),
            Indexed(name, index) => Indexed(name.clone(), Box::new(index.map_vars(rename))),
            Neg(operand) => Neg(Box::new(operand.map_vars(rename))),
            Add(l, r) => Add(Box::new(l.map_vars(rename)), Box::new(r.map_vars(rename))),
            Sub(l, r) => Sub(Box::new(l.map_vars(rename)), Box::new(r.map_vars(rename))),
            Mul(l, r) => Mul(Box::new(l.map_vars(rename)), Box::new(r.map_vars(rename))),
            Div(l, r) => Div(Box::new(l.map_vars(rename)), Box::new(r.map_vars(rename))),
            Pow(l, r) => Pow(Box::new(l.map_vars(rename)), Box::new(r.map_vars(rename))),
            Call(name, arguments) => Call(
                name.clone(),
                arguments.iter().map(|a| a.map_vars(rename)).collect(),
            ),
        }
    }

    /// Partial derivative with respect to `name`, simplified. `None` when a
    /// call to a function without a known derivative depends on `name`.
    pub fn derivative(&self, name: &str) -> Option<SymExpr> {
        if !self.depends_on(name) {
            return Some(Num(0.0));
        }
        let d = match self {
            Num(_) | Indexed(..) => Num(0.0),
            Var(var) => Num(if var == name { 1.0 } else { 0.0 }),
            Neg(operand) => Neg(Box::new(operand.derivative(name)?)),
            Add(l, r) => Add(Box::new(l.derivative(name)?), Box::new(r.derivative(name)?)),
            Sub(l, r) => Sub(Box::new(l.derivative(name)?), Box::new(r.derivative(name)?)),
            Mul(l, r) => Add(
                Box::new(Mul(Box::new(l.derivative(name)?), r.clone())),
                Box::new(Mul(l.clone(), Box::new(r.derivative(name)?))),
            ),
            Div(l, r) if !r.depends_on(name) => Div(Box::new(l.derivative(name)?), r.clone()),
            Div(l, r) => Div(
                Box::new(Sub(
                    Box::new(Mul(Box::new(l.derivative(name)?), r.clone())),
                    Box::new(Mul(l.clone(), Box::new(r.derivative(name)?))),
                )),
                Box::new(Pow(r.clone(), Box::new(Num(2.0)))),
            ),
            Pow(base, exponent) if !exponent.depends_on(name) => Mul(
                Box::new(Mul(
                    exponent.clone(),
                    Box::new(Pow(
                        base.clone(),
                        Box::new(Sub(exponent.clone(), Box::new(Num(1.0)))),
                    )),
                )),
                Box::new(base.derivative(name)?),
            ),
            // d(b^e) = b^e * (e' * log(b) + e * b' / b)
            Pow(base, exponent) => Mul(
                Box::new(self.clone()),
                Box::new(Add(
                    Box::new(Mul(
                        Box::new(exponent.derivative(name)?),
                        Box::new(Call("log".into(), vec![(**base).clone()])),
                    )),
                    Box::new(Div(
                        Box::new(Mul(exponent.clone(), Box::new(base.derivative(name)?))),
                        base.clone(),
                    )),
                )),
            ),
            Call(function, arguments) if arguments.len() == 1 => {
                let inner = &arguments[0];
                let outer = match function.as_str() {
                    "exp" => self.clone(),
                    "log" => Div(Box::new(Num(1.0)), Box::new(inner.clone())),
                    "sqrt" => Div(
                        Box::new(Num(1.0)),
                        Box::new(Mul(Box::new(Num(2.0)), Box::new(self.clone()))),
                    ),
                    "sin" => Call("cos".into(), vec![inner.clone()]),
                    "cos" => Neg(Box::new(Call("sin".into(), vec![inner.clone()]))),
                    _ => return None,
                };
                Mul(Box::new(outer), Box::new(inner.derivative(name)?))
            }
            Call(function, arguments) if function == "pow" && arguments.len() == 2 => {
                return Pow(Box::new(arguments[0].clone()), Box::new(arguments[1].clone()))
                    .derivative(name);
            }
            Call(..) => return None,
        };
        Some(d.simplify())
    }

    /// Constant folding and identity removal.
    pub fn simplify(&self) -> SymExpr {
        match self {
            Num(_) | Var(_) => self.clone(),
            Indexed(name, index) => Indexed(name.clone(), Box::new(index.simplify())),
            Neg(operand) => match operand.simplify() {
                Num(value) => Num(-value),
                Neg(inner) => *inner,
                other => Neg(Box::new(other)),
            },
            Add(l, r) => match (l.simplify(), r.simplify()) {
                (Num(a), Num(b)) => Num(a + b),
                (zero, other) | (other, zero) if zero.is_zero() => other,
                (a, Neg(b)) => Sub(Box::new(a), b),
                (a, b) => Add(Box::new(a), Box::new(b)),
            },
            Sub(l, r) => match (l.simplify(), r.simplify()) {
                (Num(a), Num(b)) => Num(a - b),
                (a, zero) if zero.is_zero() => a,
                (zero, b) if zero.is_zero() => Neg(Box::new(b)).simplify(),
                (a, Neg(b)) => Add(Box::new(a), b),
                (a, b) => Sub(Box::new(a), Box::new(b)),
            },
            Mul(l, r) => match (l.simplify(), r.simplify()) {
                (Num(a), Num(b)) => Num(a * b),
                (zero, _) | (_, zero) if zero.is_zero() => Num(0.0),
                (one, other) | (other, one) if one.is_one() => other,
                (Num(m), other) | (other, Num(m)) if m == -1.0 => Neg(Box::new(other)),
                (a, b) => Mul(Box::new(a), Box::new(b)),
            },
            Div(l, r) => match (l.simplify(), r.simplify()) {
                (Num(a), Num(b)) if b != 0.0 => Num(a / b),
                (zero, _) if zero.is_zero() => Num(0.0),
                (a, one) if one.is_one() => a,
                (a, b) => Div(Box::new(a), Box::new(b)),
            },
            Pow(l, r) => match (l.simplify(), r.simplify()) {
                (_, zero) if zero.is_zero() => Num(1.0),
                (a, one) if one.is_one() => a,
                (a, b) => Pow(Box::new(a), Box::new(b)),
            },
            Call(name, arguments) => {
                Call(name.clone(), arguments.iter().map(SymExpr::simplify).collect())
            }
        }
    }
}

fn binary_to_ast(ast: &mut Ast, op: BinaryOp, lhs: &SymExpr, rhs: &SymExpr, span: Span) -> NodeId {
    let lhs = lhs.to_ast(ast, span);
    let rhs = rhs.to_ast(ast, span);
    ast.binary(op, lhs, rhs, span)
}

impl fmt::Display for SymExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Num(value) => write!(f, "{}", render_float(*value)),
            Var(name) => f.write_str(name),
            Indexed(name, index) => write!(f, "{name}[{index}]"),
            Neg(operand) => write!(f, "-({operand})"),
            Add(l, r) => write!(f, "({l} + {r})"),
            Sub(l, r) => write!(f, "({l} - {r})"),
            Mul(l, r) => write!(f, "({l} * {r})"),
            Div(l, r) => write!(f, "({l} / {r})"),
            Pow(l, r) => write!(f, "({l} ^ {r})"),
            Call(name, arguments) => {
                write!(f, "{name}(")?;
                for (i, argument) in arguments.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{argument}")?;
                }
                f.write_str(")")
            }
        }
    }
}

impl std::ops::Add for SymExpr {
    type Output = SymExpr;

    fn add(self, rhs: SymExpr) -> SymExpr {
        Add(Box::new(self), Box::new(rhs))
    }
}

impl std::ops::Sub for SymExpr {
    type Output = SymExpr;

    fn sub(self, rhs: SymExpr) -> SymExpr {
        Sub(Box::new(self), Box::new(rhs))
    }
}

impl std::ops::Mul for SymExpr {
    type Output = SymExpr;

    fn mul(self, rhs: SymExpr) -> SymExpr {
        Mul(Box::new(self), Box::new(rhs))
    }
}

impl std::ops::Div for SymExpr {
    type Output = SymExpr;

    fn div(self, rhs: SymExpr) -> SymExpr {
        Div(Box::new(self), Box::new(rhs))
    }
}

impl std::ops::Neg for SymExpr {
    type Output = SymExpr;

    fn neg(self) -> SymExpr {
        Neg(Box::new(self))
    }
}
