// src/processor/builtin.rs

//! Processors available in every registry built with
//! [`ProcessorRegistry::with_builtins`](super::ProcessorRegistry::with_builtins).

use tracing::{debug, info};

use crate::data::DataContext;
use crate::params::Params;

use super::{ExecContext, Execution, Processor};

/// Default condition evaluator.
///
/// Reads the `expr` parameter:
/// - `true` / `false` are literals, an empty expression is false
/// - a leading `!` negates the rest
/// - a name holding a `bool` in the data context evaluates to that bool
/// - any other name is true when some value is stored under it
///
/// Returns code `0` for true and `1` for false.
#[derive(Debug, Default)]
pub struct ExistsProcessor {
    expr: String,
}

impl ExistsProcessor {
    pub const NAME: &'static str = "exists";

    pub fn evaluate(expr: &str, data: &DataContext) -> bool {
        let expr = expr.trim();
        if let Some(rest) = expr.strip_prefix('!') {
            return !Self::evaluate(rest, data);
        }
        match expr {
            "" | "false" => false,
            "true" => true,
            name => data
                .flag(name)
                .unwrap_or_else(|| data.contains_name(name)),
        }
    }
}

impl Processor for ExistsProcessor {
    fn setup(&mut self, params: &Params) -> i32 {
        self.expr = params.get_str("expr").unwrap_or_default().to_string();
        0
    }

    fn execute(&mut self, ctx: &mut ExecContext<'_>) -> Execution {
        let expr = ctx.param_str("expr").unwrap_or(self.expr.as_str());
        let value = Self::evaluate(expr, ctx.data());
        debug!(vertex = %ctx.vertex_id(), expr, value, "evaluated condition");
        Execution::Done(if value { 0 } else { 1 })
    }
}

/// Logs its parameters and succeeds.
#[derive(Debug, Default)]
pub struct LogProcessor;

impl LogProcessor {
    pub const NAME: &'static str = "log";
}

impl Processor for LogProcessor {
    fn execute(&mut self, ctx: &mut ExecContext<'_>) -> Execution {
        match ctx.param_str("message") {
            Some(message) => info!(vertex = %ctx.vertex_id(), "{message}"),
            None => info!(vertex = %ctx.vertex_id(), params = ?ctx.params().table(), "log"),
        }
        Execution::Done(0)
    }
}
