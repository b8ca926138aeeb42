//! Compiler state, options and entry points.

use materia_core::{Coercion, CoercionOptions, Ty, Value};
use materia_plan::{
    CompiledRoutine, LoadOptions, MappingIdentity, PlanKind, PlanNode, RoutineBuilder, RowContext, RuntimeError,
    SourceShape, is_cacheable,
};

use crate::cache::{CacheKey, RoutineStore};

use super::error::CompileError;

/// Compiled evaluator for one plan node. The second argument is the
/// instance under construction, if any.
pub(crate) type Eval =
    Box<dyn Fn(&mut dyn RowContext, Option<&Value>) -> Result<Value, RuntimeError> + Send + Sync>;

pub(crate) fn eval_fn<F>(f: F) -> Eval
where
    F: Fn(&mut dyn RowContext, Option<&Value>) -> Result<Value, RuntimeError> + Send + Sync + 'static,
{
    Box::new(f)
}

/// Wraps `inner` with a coercion applied to its result.
pub(crate) fn coerced(inner: Eval, coercion: Coercion) -> Eval {
    if coercion.is_identity() {
        return inner;
    }
    eval_fn(move |ctx, owner| Ok(coercion.apply(inner(ctx, owner)?)?))
}

/// Equality used by case dispatch: integers compare by value across widths.
pub(crate) fn values_equal(a: &Value, b: &Value) -> bool {
    match (a.as_i64(), b.as_i64()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

/// Structural limits applied while compiling.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CompileLimits {
    pub(crate) max_depth: usize,
}

impl Default for CompileLimits {
    fn default() -> Self {
        Self { max_depth: 500 }
    }
}

impl CompileLimits {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum plan nesting depth.
    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn get_max_depth(&self) -> usize {
        self.max_depth
    }
}

/// Everything besides the plan that affects the compiled routine.
///
/// All fields take part in the cache key.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CompileOptions {
    pub(crate) shape: SourceShape,
    pub(crate) mapping: MappingIdentity,
    pub(crate) load_options: LoadOptions,
    pub(crate) coercion: CoercionOptions,
    pub(crate) null_substitution: bool,
    pub(crate) limits: CompileLimits,
}

impl CompileOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shape(mut self, shape: SourceShape) -> Self {
        self.shape = shape;
        self
    }

    pub fn mapping(mut self, mapping: MappingIdentity) -> Self {
        self.mapping = mapping;
        self
    }

    pub fn load_options(mut self, load_options: LoadOptions) -> Self {
        self.load_options = load_options;
        self
    }

    pub fn coercion(mut self, coercion: CoercionOptions) -> Self {
        self.coercion = coercion;
        self
    }

    /// Substitute the type default when a non-nullable column reads null.
    pub fn null_substitution(mut self, enabled: bool) -> Self {
        self.null_substitution = enabled;
        self
    }

    pub fn limits(mut self, limits: CompileLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn get_shape(&self) -> &SourceShape {
        &self.shape
    }

    pub fn get_mapping(&self) -> &MappingIdentity {
        &self.mapping
    }

    pub fn get_load_options(&self) -> &LoadOptions {
        &self.load_options
    }

    pub fn get_coercion(&self) -> &CoercionOptions {
        &self.coercion
    }

    pub fn get_null_substitution(&self) -> bool {
        self.null_substitution
    }

    pub fn get_limits(&self) -> CompileLimits {
        self.limits
    }
}

/// Turns projection plans into compiled routines.
#[derive(Clone, Debug, Default)]
pub struct MaterializerCompiler {
    options: CompileOptions,
}

impl MaterializerCompiler {
    pub fn new(options: CompileOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    /// Compiles `plan`, reusing a cached routine for structurally equal plans.
    ///
    /// Plans that are not cacheable are compiled fresh and never stored.
    pub fn compile<S: RoutineStore>(
        &self,
        plan: &PlanNode,
        element: &Ty,
        mut cache: S,
    ) -> Result<CompiledRoutine, CompileError> {
        self.check_depth(plan)?;
        if !is_cacheable(plan) {
            tracing::debug!(element = %element, "plan is not cacheable");
            return self.compile_uncached(plan, element);
        }

        let key = CacheKey::new(element, &self.options, plan);
        if let Some(routine) = cache.lookup(&key) {
            return Ok(routine);
        }

        let routine = self.compile_uncached(plan, element)?;
        tracing::debug!(element = %element, "storing compiled routine");
        cache.store(key, routine.clone());
        Ok(routine)
    }

    /// Compiles `plan` without consulting any cache.
    pub fn compile_uncached(&self, plan: &PlanNode, element: &Ty) -> Result<CompiledRoutine, CompileError> {
        self.check_depth(plan)?;
        let mut ctx = CompileCtx::new(&self.options, element);
        let root = ctx.compile_for_type(plan, element)?;
        let routine = ctx.routine.build(move |row| root(row, None));
        tracing::debug!(
            element = %element,
            named_columns = routine.named_columns().len(),
            locals = routine.locals(),
            "compiled routine"
        );
        Ok(routine)
    }

    /// Rejects over-deep plans before any recursive walk touches them.
    fn check_depth(&self, plan: &PlanNode) -> Result<(), CompileError> {
        let limit = self.options.limits.max_depth;
        if plan.exceeds_depth(limit) {
            return Err(CompileError::DepthLimitExceeded { limit });
        }
        Ok(())
    }
}

/// Per-compilation state.
pub(crate) struct CompileCtx<'o> {
    pub(super) options: &'o CompileOptions,
    pub(super) routine: RoutineBuilder,
    depth: usize,
}

impl<'o> CompileCtx<'o> {
    pub(crate) fn new(options: &'o CompileOptions, element: &Ty) -> Self {
        Self {
            options,
            routine: CompiledRoutine::builder(element.clone()),
            depth: 0,
        }
    }

    /// Compiles `node` producing a value of the node's own type.
    pub(crate) fn compile_node(&mut self, node: &PlanNode) -> Result<Eval, CompileError> {
        let limit = self.options.limits.max_depth;
        if self.depth >= limit {
            return Err(CompileError::DepthLimitExceeded { limit });
        }
        self.depth += 1;
        let result = self.dispatch(node);
        self.depth -= 1;
        result
    }

    /// Compiles `node` and coerces its result to `target`.
    pub(crate) fn compile_for_type(&mut self, node: &PlanNode, target: &Ty) -> Result<Eval, CompileError> {
        let eval = self.compile_node(node)?;
        let coercion = self.coercion(node, node.ty(), target)?;
        Ok(coerced(eval, coercion))
    }

    pub(crate) fn coercion(&self, node: &PlanNode, actual: &Ty, expected: &Ty) -> Result<Coercion, CompileError> {
        Coercion::resolve(actual, expected, &self.options.coercion).map_err(|e| CompileError::coercion(node, e))
    }

    fn dispatch(&mut self, node: &PlanNode) -> Result<Eval, CompileError> {
        match node.kind() {
            PlanKind::ColumnRef { ordinal, column_type } => self.column_ref(node, *ordinal, column_type, node.ty()),
            PlanKind::UserColumn { name, required } => self.user_column(node, name.as_ref(), *required),
            PlanKind::Value(lit) => Ok(self.literal(lit)),
            PlanKind::ClientParameter { index } => Ok(self.parameter(*index)),
            PlanKind::New(new) => self.new_object(node, new),
            PlanKind::Link(link) => self.link(node, link),
            PlanKind::JoinedCollection { expression, count } => self.joined_collection(node, expression, count),
            PlanKind::Grouping { key, group } => self.grouping(node, key, group),
            PlanKind::ClientArray { elements, .. } => self.client_array(node, elements),
            PlanKind::ClientCase { discriminant, whens } => self.client_case(node, discriminant, whens),
            PlanKind::SearchedCase { whens, otherwise } => self.searched_case(node, whens, otherwise.as_deref()),
            PlanKind::TypeCase { discriminator, whens } => self.type_case(node, discriminator, whens),
            PlanKind::DiscriminatedType { discriminator, target } => {
                self.discriminated_type(discriminator, target)
            }
            PlanKind::Member { expr, member } => self.member(node, expr, member),
            PlanKind::MethodCall { object, method, args } => {
                self.method_call(node, object.as_deref(), method, args)
            }
            PlanKind::ClientQuery { subquery, args } => self.client_query(node, *subquery, args),
            PlanKind::OptionalValue { has_value, value } => self.optional_value(node, has_value, value),
            PlanKind::ValueOf(inner) => self.value_of(node, inner),
            PlanKind::OuterJoinedValue(inner) | PlanKind::Lift(inner) => self.compile_for_type(inner, node.ty()),
        }
    }
}
