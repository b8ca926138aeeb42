//! Association links and the deferred sources behind them.

use materia_core::{Sequence, Ty, Value};
use materia_plan::{ClientWhen, Global, Link, PlanKind, PlanNode, RowContext, RuntimeError};

use super::compiler::{CompileCtx, Eval, coerced, eval_fn, values_equal};
use super::error::CompileError;

/// Produces the source sequence of a link, or `None` when a case over
/// links selects no branch.
pub(super) type SourceEval =
    Box<dyn Fn(&mut dyn RowContext, Option<&Value>) -> Result<Option<Sequence>, RuntimeError> + Send + Sync>;

fn source_fn<F>(f: F) -> SourceEval
where
    F: Fn(&mut dyn RowContext, Option<&Value>) -> Result<Option<Sequence>, RuntimeError> + Send + Sync + 'static,
{
    Box::new(f)
}

/// Whether `node` can be served by a deferred source: a link without an
/// inline expansion, or a client case whose branches all are.
pub(super) fn is_link_source(node: &PlanNode) -> bool {
    match node.kind() {
        PlanKind::Link(link) => link.expansion.is_none(),
        PlanKind::ClientCase { whens, .. } => !whens.is_empty() && whens.iter().all(|w| is_link_source(&w.value)),
        _ => false,
    }
}

impl CompileCtx<'_> {
    /// Compiles a link in value position.
    ///
    /// An inline expansion is evaluated directly. Otherwise the deferred
    /// source is fetched and coerced to the node's type.
    pub(super) fn link(&mut self, node: &PlanNode, link: &Link) -> Result<Eval, CompileError> {
        if let Some(expansion) = &link.expansion {
            return self.compile_for_type(expansion, node.ty());
        }

        let source = self.link_source(node)?;
        let element = link.member.association_element().clone();
        let to_node = self.coercion(node, &Ty::seq(element.clone()), node.ty())?;
        let fetch = eval_fn(move |ctx, owner| {
            Ok(match source(ctx, owner)? {
                Some(seq) => Value::Sequence(seq),
                None => Value::Null,
            })
        });
        Ok(coerced(fetch, to_node))
    }

    /// Compiles the deferred source behind a link or a case over links.
    pub(super) fn link_source(&mut self, node: &PlanNode) -> Result<SourceEval, CompileError> {
        match node.kind() {
            PlanKind::Link(link) => self.keyed_source(link),
            PlanKind::ClientCase { discriminant, whens } => self.case_source(discriminant, whens),
            _ => Err(CompileError::translation(node, "expected an association link")),
        }
    }

    /// Links bind to the owning instance when one is in scope and are
    /// keyed by their key values otherwise.
    fn keyed_source(&mut self, link: &Link) -> Result<SourceEval, CompileError> {
        let slot = self.routine.local();
        self.routine.global(Global::Member(link.member.clone()));
        let keys = link
            .keys
            .iter()
            .map(|key| self.compile_node(key))
            .collect::<Result<Vec<_>, _>>()?;
        let member = link.member.clone();

        Ok(source_fn(move |ctx, owner| {
            if let Some(owner) = owner {
                return ctx.nested_link_source(slot, &member, owner).map(Some);
            }
            let values = keys.iter().map(|key| key(ctx, owner)).collect::<Result<Vec<_>, _>>()?;
            ctx.link_source(slot, &member, values).map(Some)
        }))
    }

    fn case_source(&mut self, discriminant: &PlanNode, whens: &[ClientWhen]) -> Result<SourceEval, CompileError> {
        let discriminant = self.compile_node(discriminant)?;
        let mut branches = Vec::with_capacity(whens.len());
        for when in whens {
            let matches = when.matches.as_ref().map(|m| self.compile_node(m)).transpose()?;
            branches.push((matches, self.link_source(&when.value)?));
        }

        Ok(source_fn(move |ctx, owner| {
            let value = discriminant(ctx, owner)?;
            let mut fallback = None;
            for (matches, source) in &branches {
                match matches {
                    Some(matches) => {
                        if values_equal(&value, &matches(ctx, owner)?) {
                            return source(ctx, owner);
                        }
                    }
                    None => {
                        fallback.get_or_insert(source);
                    }
                }
            }
            match fallback {
                Some(source) => source(ctx, owner),
                None => Ok(None),
            }
        }))
    }
}
