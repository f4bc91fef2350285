use aggpush_common::error::Result;
use aggpush_ir::Expr;
use serde::{Deserialize, Serialize};

use crate::query_builder::QueryBuilder;
use crate::store::StoreRelation;

/// Function produced by the scripting code generator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GeneratedFunction {
    /// Store columns bound to the function's inputs, in call order.
    pub params: Vec<String>,
    pub body: String,
}

impl GeneratedFunction {
    pub fn new(params: Vec<String>, body: impl Into<String>) -> Self {
        Self {
            params,
            body: body.into(),
        }
    }

    pub fn sole_param(&self) -> Option<&str> {
        match self.params.as_slice() {
            [p] => Some(p.as_str()),
            _ => None,
        }
    }
}

/// What the code generator may see while compiling one expression.
#[derive(Debug, Clone, Copy)]
pub struct ScriptContext<'a> {
    pub relation: &'a StoreRelation,
    pub builder: &'a QueryBuilder,
}

/// The embedded scripting code generator.
///
/// Implementations are deterministic and side-effect free; a failure only
/// means the expression has no scripted form.
pub trait ScriptCompiler {
    fn compile(
        &self,
        ctx: &ScriptContext<'_>,
        expr: &Expr,
        is_aggregate: bool,
        timezone: &str,
    ) -> Result<GeneratedFunction>;
}

/// A compiler that never produces a function. Disables every scripted path.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoScripts;

impl ScriptCompiler for NoScripts {
    fn compile(
        &self,
        _ctx: &ScriptContext<'_>,
        expr: &Expr,
        _is_aggregate: bool,
        _timezone: &str,
    ) -> Result<GeneratedFunction> {
        Err(aggpush_common::Error::script_compilation(format!(
            "scripting disabled: {}",
            expr
        )))
    }
}
