//! KINETIC schemes become DERIVATIVE blocks.
//!
//! Every reaction contributes `delta * (fflux - bflux)` to the equation of
//! each state whose stoichiometry it changes, where `fflux` is the forward
//! rate times the reactants and `bflux` the backward rate times the products.
//! `<<` fluxes are added as they are, and a COMPARTMENT volume divides the
//! whole right-hand side of the states it lists.
//!
//! Reaction statements must sit at the top level of the scheme. One nested in
//! IF or a loop is reported and the block is left as it is.

use crate::error::unsupported_diagnostic;
use crate::opt_bail;
use crate::pass::{OptimizePass, PassName};
use mech_core::ast::nodes::*;
use mech_core::ast::{Ast, BinaryOp, NodeId, NodeKind, NodeType, ReactionOp, UnaryOp};
use mech_core::diagnostics::Diagnostic;
use mech_core::span::Span;
use mech_core::symtab::SymbolProperties;
use mech_core::visitor::AstLookupVisitor;
use mech_core::{CompilationContext, Result};

pub struct KineticPass;

impl OptimizePass for KineticPass {
    fn name(&self) -> PassName {
        PassName::Kinetic
    }

    fn run(&self, ast: &mut Ast, ctx: &mut CompilationContext) -> Result<()> {
        let states: Vec<String> = ctx
            .symtab(PassName::Kinetic.as_str())?
            .globals_with(SymbolProperties::STATE)
            .into_iter()
            .map(|symbol| symbol.name.clone())
            .collect();
        let mut warnings = Vec::new();
        let mut lowered = 0;
        for block in ast.top_level() {
            if ast.cast::<KineticBlock>(block).is_some() && lower_block(ast, block, &states, &mut warnings)? {
                lowered += 1;
            }
        }
        mech_core::debug!("kinetic: {lowered} block(s) lowered");
        ctx.diagnostics.add_diagnostics(warnings);
        Ok(())
    }
}

fn warning(message: impl Into<String>, span: Span) -> Diagnostic {
    Diagnostic::warning(message)
        .with_span(span)
        .with_source_context(PassName::Kinetic.as_str())
}

struct Reaction {
    span: Span,
    reactants: Vec<u32>,
    products: Vec<u32>,
    forward_rate: NodeId,
    backward_rate: Option<NodeId>,
    forward_factors: Vec<String>,
    backward_factors: Vec<String>,
}

struct ReactionSystem<'s> {
    states: &'s [String],
    reactions: Vec<Reaction>,
    fluxes: Vec<Vec<NodeId>>,
    volumes: Vec<Option<NodeId>>,
}

impl<'s> ReactionSystem<'s> {
    fn new(states: &'s [String]) -> Self {
        ReactionSystem {
            states,
            reactions: Vec::new(),
            fluxes: vec![Vec::new(); states.len()],
            volumes: vec![None; states.len()],
        }
    }

    fn state_index(&self, name: &str) -> Option<usize> {
        self.states.iter().position(|state| state == name)
    }

    /// Stoichiometry per state plus the non-state species, repeated by
    /// coefficient.
    fn species(&self, ast: &Ast, side: &[NodeId]) -> (Vec<u32>, Vec<String>) {
        let mut counts = vec![0; self.states.len()];
        let mut others = Vec::new();
        for var in side.iter().filter_map(|&id| ast.cast::<ReactVarName>(id)) {
            let coefficient = var.coefficient.unwrap_or(1);
            match self.state_index(&var.name) {
                Some(index) => counts[index] += coefficient,
                None => others.extend((0..coefficient).map(|_| var.name.clone())),
            }
        }
        (counts, others)
    }

    fn add_reaction(&mut self, ast: &Ast, span: Span, reaction: &ReactionStatement, warnings: &mut Vec<Diagnostic>) {
        if reaction.op == ReactionOp::Flux {
            let target = match reaction.lhs.as_slice() {
                [only] => ast
                    .cast::<ReactVarName>(*only)
                    .filter(|var| var.coefficient.unwrap_or(1) == 1)
                    .and_then(|var| self.state_index(&var.name)),
                _ => None,
            };
            match target {
                Some(index) => self.fluxes[index].push(reaction.forward_rate),
                None => warnings.push(warning(
                    "`<<` flux must name exactly one STATE with coefficient 1; statement ignored",
                    span,
                )),
            }
            return;
        }
        let (reactants, forward_factors) = self.species(ast, &reaction.lhs);
        let (products, backward_factors) = self.species(ast, &reaction.rhs);
        self.reactions.push(Reaction {
            span,
            reactants,
            products,
            forward_rate: reaction.forward_rate,
            backward_rate: reaction.backward_rate,
            forward_factors,
            backward_factors,
        });
    }

    fn set_volume(&mut self, ast: &Ast, compartment: &Compartment) {
        for name in compartment.names.iter().filter_map(|&id| ast.cast::<Name>(id)) {
            if let Some(index) = self.state_index(&name.name) {
                self.volumes[index] = Some(compartment.volume);
            }
        }
    }

    /// `rate * s1^n1 * ... * others`, built from copies.
    fn flux(&self, ast: &mut Ast, rate: NodeId, counts: &[u32], others: &[String], span: Span) -> NodeId {
        let mut product = ast.deep_clone(rate);
        let factors = counts
            .iter()
            .enumerate()
            .flat_map(|(index, &count)| (0..count).map(move |_| index))
            .map(|index| self.states[index].clone())
            .chain(others.iter().cloned())
            .collect::<Vec<_>>();
        for factor in factors {
            let factor = ast.name(factor, span);
            product = ast.binary(BinaryOp::Mul, product, factor, span);
        }
        product
    }

    /// `x' = ...` for every state that changes, in declaration order.
    fn equations(&self, ast: &mut Ast, span: Span) -> Vec<NodeId> {
        let mut equations = Vec::new();
        for (index, state) in self.states.iter().enumerate() {
            // (negated, term)
            let mut terms: Vec<(bool, NodeId)> = self.fluxes[index]
                .iter()
                .map(|&flux| (false, ast.deep_clone(flux)))
                .collect();
            for reaction in &self.reactions {
                let delta = reaction.products[index] as i64 - reaction.reactants[index] as i64;
                if delta == 0 {
                    continue;
                }
                let forward = self.flux(
                    ast,
                    reaction.forward_rate,
                    &reaction.reactants,
                    &reaction.forward_factors,
                    reaction.span,
                );
                let net = match reaction.backward_rate {
                    Some(rate) => {
                        let backward = self.flux(
                            ast,
                            rate,
                            &reaction.products,
                            &reaction.backward_factors,
                            reaction.span,
                        );
                        ast.binary(BinaryOp::Sub, forward, backward, reaction.span)
                    }
                    None => forward,
                };
                let term = match delta {
                    1 => (false, net),
                    -1 => (true, net),
                    _ => {
                        let scale = ast.double(delta as f64, reaction.span);
                        (false, ast.binary(BinaryOp::Mul, scale, net, reaction.span))
                    }
                };
                terms.push(term);
            }

            let mut terms = terms.into_iter();
            let Some((negated, first)) = terms.next() else {
                continue;
            };
            let mut rhs = if negated {
                ast.unary(UnaryOp::Neg, first, span)
            } else {
                first
            };
            for (negated, term) in terms {
                let op = if negated { BinaryOp::Sub } else { BinaryOp::Add };
                rhs = ast.binary(op, rhs, term, span);
            }
            if let Some(volume) = self.volumes[index] {
                let volume = ast.deep_clone(volume);
                rhs = ast.binary(BinaryOp::Div, rhs, volume, span);
            }
            let lhs = ast.alloc(
                PrimeName {
                    name: state.clone(),
                    order: 1,
                },
                span,
            );
            equations.push(ast.alloc(DiffEquation { lhs, rhs }, span));
        }
        equations
    }
}

const SCHEME_STATEMENTS: [NodeType; 3] = [
    NodeType::ReactionStatement,
    NodeType::Compartment,
    NodeType::Conserve,
];

/// Returns whether the block became a DERIVATIVE.
fn lower_block(ast: &mut Ast, block: NodeId, states: &[String], warnings: &mut Vec<Diagnostic>) -> Result<bool> {
    let span = ast.span(block);
    let (name, body) = match ast.cast::<KineticBlock>(block) {
        Some(kinetic) => (kinetic.name.clone(), kinetic.body),
        None => opt_bail!(PassName::Kinetic, ast, block, "expected a KINETIC block"),
    };
    let Some(statements) = ast.cast::<StatementBlock>(body).map(|b| b.statements.clone()) else {
        opt_bail!(PassName::Kinetic, ast, body, "KINETIC body is not a statement block");
    };
    let nested: Vec<NodeId> = AstLookupVisitor::lookup(ast, body, &SCHEME_STATEMENTS)
        .into_iter()
        .filter(|id| !statements.contains(id))
        .collect();
    if !nested.is_empty() {
        for id in nested {
            warnings.push(unsupported_diagnostic(
                PassName::Kinetic,
                format!(
                    "{} inside control flow of KINETIC `{name}` is not supported",
                    ast.node_type(id)
                ),
                ast.span(id),
            ));
        }
        return Ok(false);
    }

    let mut system = ReactionSystem::new(states);
    let mut kept = Vec::with_capacity(statements.len());
    for statement in statements {
        let at = ast.span(statement);
        match ast.kind(statement) {
            NodeKind::ReactionStatement(reaction) => {
                let reaction = reaction.clone();
                system.add_reaction(ast, at, &reaction, warnings);
            }
            NodeKind::Compartment(compartment) => {
                let compartment = compartment.clone();
                system.set_volume(ast, &compartment);
            }
            NodeKind::Conserve(_) => {
                warnings.push(warning("CONSERVE statement ignored", at));
            }
            _ => kept.push(statement),
        }
    }
    kept.extend(system.equations(ast, span));

    match ast.cast_mut::<StatementBlock>(body) {
        Some(block_body) => block_body.statements = kept,
        None => opt_bail!(PassName::Kinetic, ast, body, "KINETIC body is not a statement block"),
    }
    ast.replace_node(block, DerivativeBlock { name, body });
    Ok(true)
}
