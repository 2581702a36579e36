//! `a ^ b` has no C operator; every power becomes a `pow(a, b)` call.

use crate::pass::{OptimizePass, PassName};
use mech_core::ast::nodes::{BinaryExpression, FunctionCall};
use mech_core::ast::{Ast, BinaryOp, NodeId};
use mech_core::visitor::{transform_ast, AstTransformer};
use mech_core::{CompilationContext, Result};

pub struct PowPass;

impl OptimizePass for PowPass {
    fn name(&self) -> PassName {
        PassName::Pow
    }

    fn run(&self, ast: &mut Ast, _ctx: &mut CompilationContext) -> Result<()> {
        let mut rewriter = PowRewriter::default();
        transform_ast(&mut rewriter, ast)?;
        mech_core::debug!("pow: {} power(s) rewritten", rewriter.rewritten);
        Ok(())
    }
}

#[derive(Default)]
struct PowRewriter {
    rewritten: usize,
}

impl AstTransformer for PowRewriter {
    fn transform_binary_expression(&mut self, ast: &mut Ast, id: NodeId) -> Result<()> {
        let power = match ast.cast::<BinaryExpression>(id) {
            Some(binary) if binary.op == BinaryOp::Pow => Some((binary.lhs, binary.rhs)),
            _ => None,
        };
        if let Some((base, exponent)) = power {
            ast.replace_node(
                id,
                FunctionCall {
                    name: "pow".into(),
                    arguments: vec![base, exponent],
                },
            );
            self.rewritten += 1;
        }
        self.transform_children(ast, id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mech_core::visitor::ModPrinter;
    use pretty_assertions::assert_eq;

    #[test]
    fn nested_powers_become_calls() {
        let mut ast = mech_lang::parse_source("ASSIGNED { a b c }\nINITIAL { a = b ^ c ^ 2 + (a ^ 3) }\n")
            .value
            .expect("parses");
        let mut ctx = CompilationContext::new("pow.mod");
        PowPass.run(&mut ast, &mut ctx).unwrap();
        let initial = ast.top_level()[1];
        assert_eq!(
            ModPrinter::print(&ast, initial),
            "INITIAL {\n    a = pow(b, pow(c, 2)) + (pow(a, 3))\n}"
        );
        assert!(ast.verify_tree().is_ok());
    }
}
