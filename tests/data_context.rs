// tests/data_context.rs

use std::sync::Arc;
use std::thread;

use flowdag::data::{DataContext, DataKey, TypeTag};
use flowdag::params::Params;
use flowdag::processor::builtin::ExistsProcessor;
use flowdag::processor::{ExecContext, FieldSchema, ProcessorRegistry};

#[test]
fn one_name_holds_several_types() {
    let data = DataContext::new();
    data.set("value", 7_i64);
    data.set("value", "seven".to_string());

    assert_eq!(*data.get::<i64>("value").unwrap(), 7);
    assert_eq!(data.get::<String>("value").unwrap().as_str(), "seven");
    assert!(data.get::<bool>("value").is_none());
    assert_eq!(data.len(), 2);
    assert_eq!(data.entries_named("value").len(), 2);
}

#[test]
fn type_tags_are_stable_per_type() {
    assert_eq!(TypeTag::of::<i64>(), TypeTag::of::<i64>());
    assert_ne!(TypeTag::of::<i64>(), TypeTag::of::<i32>());
    assert!(TypeTag::of::<String>().type_name().contains("String"));

    let key = DataKey::of::<i64>("rows");
    assert_eq!(key, DataKey::new("rows", TypeTag::of::<i64>()));
    assert_eq!(key.to_string(), "rows<i64>");
}

#[test]
fn lookups_fall_through_to_parent() {
    let parent = Arc::new(DataContext::new());
    parent.set("shared", 1_i64);
    parent.set("both", 1_i64);

    let child = DataContext::with_parent(Arc::clone(&parent));
    child.set("both", 2_i64);
    child.set("local", 3_i64);

    assert_eq!(*child.get::<i64>("shared").unwrap(), 1);
    assert_eq!(*child.get::<i64>("both").unwrap(), 2);
    assert!(parent.get::<i64>("local").is_none());
    assert!(child.get_local_value(&DataKey::of::<i64>("shared")).is_none());
    assert!(child.contains_name("shared"));
    assert!(!parent.contains_name("local"));
}

#[test]
fn prepared_slot_does_not_shadow_parent() {
    let parent = Arc::new(DataContext::new());
    parent.set("seed", 42_i64);

    let child = DataContext::with_parent(parent);
    child.prepare(DataKey::of::<i64>("seed"));
    child.prepare(DataKey::of::<i64>("empty"));

    assert_eq!(*child.get::<i64>("seed").unwrap(), 42);
    assert!(child.get::<i64>("empty").is_none());
    assert!(!child.contains_name("empty"));
    assert!(child.is_empty());
}

#[test]
fn reset_clears_values_and_parent() {
    let parent = Arc::new(DataContext::new());
    parent.set("p", true);
    let child = DataContext::with_parent(parent);
    child.set("c", 1_i64);

    child.reset();
    assert!(child.is_empty());
    assert!(child.parent().is_none());
    assert!(child.get::<bool>("p").is_none());
}

#[test]
fn snapshot_is_detached() {
    let parent = Arc::new(DataContext::new());
    parent.set("from_parent", 1_i64);
    let data = DataContext::with_parent(parent);
    data.set("x", 10_i64);

    let snapshot = data.snapshot();
    data.set("x", 20_i64);
    data.reset();

    assert_eq!(*snapshot.get::<i64>("x").unwrap(), 10);
    assert!(snapshot.get::<i64>("from_parent").is_none());
    assert!(snapshot.parent().is_none());
}

#[test]
fn concurrent_writers() {
    let data = Arc::new(DataContext::new());
    let handles: Vec<_> = (0..8)
        .map(|t| {
            let data = Arc::clone(&data);
            thread::spawn(move || {
                for i in 0..100_i64 {
                    data.set(format!("k{t}_{i}"), i);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(data.len(), 800);
    assert_eq!(*data.get::<i64>("k7_99").unwrap(), 99);
}

#[test]
fn flags_read_bools_only() {
    let data = DataContext::new();
    data.set("on", true);
    data.set("count", 1_i64);

    assert_eq!(data.flag("on"), Some(true));
    assert_eq!(data.flag("count"), None);
    assert_eq!(data.flag("missing"), None);
}

#[test]
fn exists_expressions() {
    let data = DataContext::new();
    data.set("enabled", true);
    data.set("disabled", false);
    data.set("rows", 3_i64);

    assert!(ExistsProcessor::evaluate("true", &data));
    assert!(!ExistsProcessor::evaluate("false", &data));
    assert!(!ExistsProcessor::evaluate("", &data));
    assert!(ExistsProcessor::evaluate("enabled", &data));
    assert!(!ExistsProcessor::evaluate("disabled", &data));
    assert!(ExistsProcessor::evaluate("!disabled", &data));
    assert!(ExistsProcessor::evaluate("rows", &data));
    assert!(!ExistsProcessor::evaluate("nothing", &data));
    assert!(ExistsProcessor::evaluate(" !nothing ", &data));
    assert!(ExistsProcessor::evaluate("!!rows", &data));
}

#[test]
fn params_accessors() {
    let mut params = Params::new();
    params
        .insert("name", "probe")
        .insert("count", 3)
        .insert("ratio", 0.25)
        .insert("on", true);

    assert_eq!(params.get_str("name"), Some("probe"));
    assert_eq!(params.get_i64("count"), Some(3));
    assert_eq!(params.get_f64("count"), Some(3.0));
    assert_eq!(params.get_f64("ratio"), Some(0.25));
    assert_eq!(params.get_bool("on"), Some(true));
    assert_eq!(params.get_i64("name"), None);
    assert!(!params.is_empty());
    assert_eq!(params.table().len(), 4);
}

#[test]
fn exec_context_inputs_and_param_fallback() {
    let data = DataContext::new();
    let mut params = Params::new();
    params.insert("add", 1);
    let mut base = Params::new();
    base.insert("add", 100).insert("extra", "base");

    let mut ctx = ExecContext::new("v", &params, Some(&base), &data);
    ctx.add_input("in", Arc::new(2_i64));
    ctx.add_input("in", Arc::new(3_i64));
    ctx.add_input("in", Arc::new("wrong type".to_string()));

    assert_eq!(ctx.vertex_id(), "v");
    assert_eq!(ctx.param_i64("add"), Some(1));
    assert_eq!(ctx.param_str("extra"), Some("base"));
    assert!(ctx.has_input("in"));
    assert!(!ctx.has_input("out"));
    assert_eq!(*ctx.input::<i64>("in").unwrap(), 2);
    let values: Vec<i64> = ctx.inputs::<i64>("in").iter().map(|v| **v).collect();
    assert_eq!(values, vec![2, 3]);

    ctx.set_output("out", 5_i64);
    let outputs = ctx.into_outputs();
    assert_eq!(outputs.len(), 1);
    assert_eq!(outputs[0].field, "out");
    assert_eq!(outputs[0].tag, TypeTag::of::<i64>());
}

#[test]
fn registry_probes_schema_once() {
    let mut registry = ProcessorRegistry::with_builtins();
    registry.register_default::<ExistsProcessor>("cond");

    assert!(registry.contains("exists"));
    assert!(registry.contains("log"));
    assert!(registry.contains("cond"));
    assert!(registry.create("missing").is_none());
    assert_eq!(registry.names(), vec!["cond", "exists", "log"]);

    let schema = FieldSchema::new().input::<i64>("a").output::<String>("b");
    assert_eq!(schema.input_field("a").unwrap().tag, TypeTag::of::<i64>());
    assert!(schema.input_field("b").is_none());
    assert_eq!(schema.output_field("b").unwrap().tag, TypeTag::of::<String>());
}
