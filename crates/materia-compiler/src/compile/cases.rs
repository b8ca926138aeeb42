//! Conditional nodes. The discriminant is evaluated once, then `when`
//! clauses are tried in order; with no match and no default the result is
//! the node type's absence value.

use materia_core::{Ty, Value};
use materia_plan::{ClientWhen, Global, Literal, MetaTypeRef, PlanNode, SearchedWhen, TypeWhen};

use super::compiler::{CompileCtx, Eval, eval_fn, values_equal};
use super::error::CompileError;

impl CompileCtx<'_> {
    pub(super) fn client_case(
        &mut self,
        node: &PlanNode,
        discriminant: &PlanNode,
        whens: &[ClientWhen],
    ) -> Result<Eval, CompileError> {
        let discriminant = self.compile_node(discriminant)?;
        let mut branches = Vec::with_capacity(whens.len());
        let mut default = None;
        for when in whens {
            let value = self.compile_for_type(&when.value, node.ty())?;
            match &when.matches {
                Some(matches) => branches.push((self.compile_node(matches)?, value)),
                None => {
                    default.get_or_insert(value);
                }
            }
        }
        let ty = node.ty().clone();

        Ok(eval_fn(move |ctx, owner| {
            let value = discriminant(ctx, owner)?;
            for (matches, result) in &branches {
                if values_equal(&value, &matches(ctx, owner)?) {
                    return result(ctx, owner);
                }
            }
            match &default {
                Some(result) => result(ctx, owner),
                None => Ok(ty.default_value()),
            }
        }))
    }

    pub(super) fn searched_case(
        &mut self,
        node: &PlanNode,
        whens: &[SearchedWhen],
        otherwise: Option<&PlanNode>,
    ) -> Result<Eval, CompileError> {
        let mut branches = Vec::with_capacity(whens.len());
        for when in whens {
            let condition = self.compile_for_type(&when.condition, &Ty::nullable(Ty::Bool))?;
            let value = self.compile_for_type(&when.value, node.ty())?;
            branches.push((condition, value));
        }
        let otherwise = otherwise.map(|o| self.compile_for_type(o, node.ty())).transpose()?;
        let ty = node.ty().clone();

        Ok(eval_fn(move |ctx, owner| {
            for (condition, value) in &branches {
                if matches!(condition(ctx, owner)?, Value::Bool(true)) {
                    return value(ctx, owner);
                }
            }
            match &otherwise {
                Some(result) => result(ctx, owner),
                None => Ok(ty.default_value()),
            }
        }))
    }

    pub(super) fn type_case(
        &mut self,
        node: &PlanNode,
        discriminator: &PlanNode,
        whens: &[TypeWhen],
    ) -> Result<Eval, CompileError> {
        if let Some(pos) = whens.iter().position(|w| w.matches.is_none())
            && pos + 1 != whens.len()
        {
            return Err(CompileError::translation(node, "the default type binding must come last"));
        }

        let discriminator = self.compile_node(discriminator)?;
        let mut branches: Vec<(Option<Literal>, Eval)> = Vec::with_capacity(whens.len());
        for when in whens {
            if let Some(code) = &when.matches {
                self.routine.global(Global::Literal(code.clone()));
            }
            branches.push((when.matches.clone(), self.compile_for_type(&when.binding, node.ty())?));
        }
        let ty = node.ty().clone();

        Ok(eval_fn(move |ctx, owner| {
            let code = discriminator(ctx, owner)?;
            for (matches, binding) in &branches {
                match matches {
                    Some(lit) if !lit.matches(&code) => continue,
                    _ => return binding(ctx, owner),
                }
            }
            Ok(ty.default_value())
        }))
    }

    /// Picks the concrete type for an inheritance code.
    pub(super) fn discriminated_type(
        &mut self,
        discriminator: &PlanNode,
        target: &MetaTypeRef,
    ) -> Result<Eval, CompileError> {
        let discriminator = self.compile_node(discriminator)?;
        self.routine.global(Global::Type(target.clone()));
        let cases: Vec<(Literal, Ty)> = target
            .inheritance()
            .iter()
            .map(|case| (case.code.clone(), case.ty.clone()))
            .collect();
        let default = target
            .inheritance()
            .iter()
            .find(|case| case.is_default)
            .map(|case| case.ty.clone());

        Ok(eval_fn(move |ctx, owner| {
            let code = discriminator(ctx, owner)?;
            let found = cases
                .iter()
                .find(|(lit, _)| lit.matches(&code))
                .map(|(_, ty)| ty)
                .or(default.as_ref());
            Ok(found.map_or(Value::Null, |ty| Value::Type(ty.clone())))
        }))
    }
}
