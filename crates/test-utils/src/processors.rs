#![allow(dead_code)]

//! Recording processors for engine tests.
//!
//! Every processor here appends a [`Record`] to a shared [`ExecLog`] when it
//! runs, so tests can assert which vertices ran, how often, with which
//! parameters and inputs.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use flowdag::params::Params;
use flowdag::processor::{
    ExecContext, Execution, FieldSchema, Processor, ProcessorRegistry,
};

#[derive(Debug, Clone)]
pub struct Record {
    pub vertex: String,
    pub params: Params,
    pub inputs: Vec<i64>,
}

#[derive(Debug, Clone, Default)]
pub struct ExecLog {
    records: Arc<Mutex<Vec<Record>>>,
    resets: Arc<AtomicUsize>,
    setups: Arc<AtomicUsize>,
}

impl ExecLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, record: Record) {
        self.records.lock().unwrap().push(record);
    }

    pub fn records(&self) -> Vec<Record> {
        self.records.lock().unwrap().clone()
    }

    /// Vertex ids in execution order.
    pub fn vertices(&self) -> Vec<String> {
        self.records().into_iter().map(|r| r.vertex).collect()
    }

    pub fn count(&self, vertex: &str) -> usize {
        self.records().iter().filter(|r| r.vertex == vertex).count()
    }

    pub fn ran(&self, vertex: &str) -> bool {
        self.count(vertex) > 0
    }

    /// Last record of `vertex`.
    pub fn last(&self, vertex: &str) -> Option<Record> {
        self.records().into_iter().rev().find(|r| r.vertex == vertex)
    }

    pub fn resets(&self) -> usize {
        self.resets.load(Ordering::SeqCst)
    }

    pub fn setups(&self) -> usize {
        self.setups.load(Ordering::SeqCst)
    }

    pub fn clear(&self) {
        self.records.lock().unwrap().clear();
    }
}

/// Sums every `in` input plus the `add` parameter into `out`.
///
/// Parameters:
/// - `add`: integer added to the inputs (default 0)
/// - `code`: return code (default 0)
/// - `setup_code`: return code of `setup` (default 0)
pub struct Probe {
    log: ExecLog,
}

impl Probe {
    pub const NAME: &'static str = "probe";

    pub fn new(log: ExecLog) -> Self {
        Self { log }
    }

    fn schema() -> FieldSchema {
        FieldSchema::new().input::<i64>("in").output::<i64>("out")
    }
}

fn observe(log: &ExecLog, ctx: &ExecContext<'_>) -> i64 {
    let inputs: Vec<i64> = ctx.inputs::<i64>("in").iter().map(|v| **v).collect();
    let sum = inputs.iter().sum::<i64>() + ctx.param_i64("add").unwrap_or(0);
    log.record(Record {
        vertex: ctx.vertex_id().to_string(),
        params: ctx.params().clone(),
        inputs,
    });
    sum
}

impl Processor for Probe {
    fn schema(&self) -> FieldSchema {
        Probe::schema()
    }

    fn setup(&mut self, params: &Params) -> i32 {
        self.log.setups.fetch_add(1, Ordering::SeqCst);
        params.get_i64("setup_code").unwrap_or(0) as i32
    }

    fn execute(&mut self, ctx: &mut ExecContext<'_>) -> Execution {
        let sum = observe(&self.log, ctx);
        ctx.set_output("out", sum);
        Execution::Done(ctx.param_i64("code").unwrap_or(0) as i32)
    }

    fn reset(&mut self) {
        self.log.resets.fetch_add(1, Ordering::SeqCst);
    }
}

/// Like [`Probe`], but completes from another thread after `delay_ms`.
pub struct AsyncProbe {
    log: ExecLog,
}

impl AsyncProbe {
    pub const NAME: &'static str = "async_probe";

    pub fn new(log: ExecLog) -> Self {
        Self { log }
    }
}

impl Processor for AsyncProbe {
    fn schema(&self) -> FieldSchema {
        Probe::schema()
    }

    fn execute(&mut self, ctx: &mut ExecContext<'_>) -> Execution {
        let sum = observe(&self.log, ctx);
        let code = ctx.param_i64("code").unwrap_or(0) as i32;
        let delay = ctx.param_i64("delay_ms").unwrap_or(10) as u64;
        let drop_it = ctx.param_bool("drop_completion").unwrap_or(false);

        Execution::pending(move |mut completion| {
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(delay));
                if drop_it {
                    drop(completion);
                    return;
                }
                completion.set_output("out", sum);
                completion.complete(code);
            });
        })
    }
}

/// Panics when executed.
#[derive(Default)]
pub struct PanicProcessor;

impl PanicProcessor {
    pub const NAME: &'static str = "panic";
}

impl Processor for PanicProcessor {
    fn execute(&mut self, _ctx: &mut ExecContext<'_>) -> Execution {
        panic!("processor failure for tests");
    }
}

/// Writes the `text` parameter to a `String` output `text`.
#[derive(Default)]
pub struct TextProcessor;

impl TextProcessor {
    pub const NAME: &'static str = "text";
}

impl Processor for TextProcessor {
    fn schema(&self) -> FieldSchema {
        FieldSchema::new()
            .input::<String>("text")
            .output::<String>("text")
    }

    fn execute(&mut self, ctx: &mut ExecContext<'_>) -> Execution {
        let text = match ctx.input::<String>("text") {
            Some(input) => format!("{}{}", input, ctx.param_str("suffix").unwrap_or_default()),
            None => ctx.param_str("text").unwrap_or_default().to_string(),
        };
        ctx.set_output("text", text);
        Execution::Done(0)
    }
}

/// Registry with the builtins plus every test processor, all recording to
/// `log`.
pub fn test_registry(log: &ExecLog) -> ProcessorRegistry {
    let mut registry = ProcessorRegistry::with_builtins();

    let probe_log = log.clone();
    registry.register(Probe::NAME, move || {
        Box::new(Probe::new(probe_log.clone())) as Box<dyn Processor>
    });

    let async_log = log.clone();
    registry.register(AsyncProbe::NAME, move || {
        Box::new(AsyncProbe::new(async_log.clone())) as Box<dyn Processor>
    });

    registry.register_default::<PanicProcessor>(PanicProcessor::NAME);
    registry.register_default::<TextProcessor>(TextProcessor::NAME);
    registry
}
