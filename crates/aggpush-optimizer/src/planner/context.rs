use aggpush_ir::{Attribute, Expr, ExprId};
use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use tracing::trace;

use crate::PushdownSettings;
use crate::query_builder::QueryBuilder;
use crate::script::{GeneratedFunction, ScriptCompiler, ScriptContext};
use crate::store::ColumnDescriptor;

/// One row of an expansion node, seen through an optional interposed projection.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ExpansionContext<'a> {
    pub project: Option<&'a [Expr]>,
    pub output: &'a [Attribute],
    pub row: &'a [Expr],
}

impl<'a> ExpansionContext<'a> {
    /// Position in the row of the expansion attribute `attr` designates.
    pub fn position(&self, attr: &Attribute) -> Option<usize> {
        let target = match self.projected(attr) {
            Some(projected) => match projected.strip_alias() {
                Expr::Column(inner) => inner.id,
                _ => return None,
            },
            None => attr.id,
        };
        self.output.iter().position(|a| a.id == target)
    }

    /// Rewrites `expr` in terms of the expansion node's input for this row.
    pub fn resolve(&self, expr: &Expr) -> Expr {
        expr.transform_columns(&|attr| self.resolve_attribute(attr))
    }

    pub fn resolve_attribute(&self, attr: &Attribute) -> Option<Expr> {
        match self.projected(attr) {
            Some(projected) => Some(
                projected
                    .strip_alias()
                    .transform_columns(&|inner| self.row_value(inner)),
            ),
            None => self.row_value(attr),
        }
    }

    fn projected(&self, attr: &Attribute) -> Option<&'a Expr> {
        self.project?
            .iter()
            .find(|e| e.output_id() == Some(attr.id))
    }

    fn row_value(&self, attr: &Attribute) -> Option<Expr> {
        let pos = self.output.iter().position(|a| a.id == attr.id)?;
        self.row.get(pos).cloned()
    }
}

/// Everything a translator needs besides the builder it extends.
pub(crate) struct TranslationContext<'a> {
    pub settings: &'a PushdownSettings,
    pub scripts: &'a dyn ScriptCompiler,
    pub expansion: Option<ExpansionContext<'a>>,
    pub overrides: &'a IndexMap<ExprId, Expr>,
    /// Store column names of attributes renamed by the pushed child.
    pub store_columns: &'a FxHashMap<ExprId, String>,
}

impl<'a> TranslationContext<'a> {
    /// `expr` over the store relation: expansion indirection removed and
    /// every attribute named after the store column it reads.
    pub fn resolve(&self, expr: &Expr) -> Expr {
        let resolved = match &self.expansion {
            Some(expansion) => expansion.resolve(expr),
            None => expr.clone(),
        };
        self.with_store_names(&resolved)
    }

    pub fn with_store_names(&self, expr: &Expr) -> Expr {
        if self.store_columns.is_empty() {
            return expr.clone();
        }
        expr.transform_columns(&|attr: &Attribute| {
            let name = self.store_columns.get(&attr.id)?;
            Some(Expr::column(&Attribute {
                name: name.clone(),
                ..attr.clone()
            }))
        })
    }

    pub fn is_overridden(&self, id: ExprId) -> bool {
        self.overrides.contains_key(&id)
    }

    /// Store column `expr` ultimately reads, looking through expansion
    /// indirection and numeric casts.
    pub fn resolve_column<'b>(
        &self,
        builder: &'b QueryBuilder,
        expr: &Expr,
    ) -> Option<&'b ColumnDescriptor> {
        match self.resolve(expr).strip_numeric_casts() {
            Expr::Column(attr) => builder.relation().column(&attr.name),
            _ => None,
        }
    }

    pub fn compile(
        &self,
        builder: &QueryBuilder,
        expr: &Expr,
        is_aggregate: bool,
    ) -> Option<GeneratedFunction> {
        if !self.settings.script_fallback {
            trace!(expr = %expr, "Script fallback disabled");
            return None;
        }
        let ctx = ScriptContext {
            relation: builder.relation(),
            builder,
        };
        match self
            .scripts
            .compile(&ctx, expr, is_aggregate, &self.settings.timezone)
        {
            Ok(function) => Some(function),
            Err(e) => {
                trace!(expr = %expr, error = %e, "Script compilation failed");
                None
            }
        }
    }
}
