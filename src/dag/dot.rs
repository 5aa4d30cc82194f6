// src/dag/dot.rs

//! Graphviz rendering of built graphs, for `--dry-run` and debugging.

use std::fmt::Write;

use super::cluster::GraphCluster;
use super::graph::Graph;
use super::vertex::{Vertex, VertexKind};

impl Graph {
    pub fn to_dot(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "digraph {} {{", quote(self.name()));
        let _ = writeln!(out, "  rankdir=LR;");
        write_body(&mut out, self, "", "  ");
        out.push_str("}\n");
        out
    }
}

impl GraphCluster {
    /// One `subgraph cluster_*` block per graph. Node names are prefixed
    /// with the graph name.
    pub fn to_dot(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "digraph {} {{", quote(self.name()));
        let _ = writeln!(out, "  rankdir=LR;");
        for graph in self.graphs() {
            let _ = writeln!(out, "  subgraph {} {{", quote(&format!("cluster_{}", graph.name())));
            let _ = writeln!(out, "    label={};", quote(graph.name()));
            write_body(&mut out, graph, &format!("{}.", graph.name()), "    ");
            out.push_str("  }\n");
        }
        out.push_str("}\n");
        out
    }
}

fn write_body(out: &mut String, graph: &Graph, prefix: &str, indent: &str) {
    for vertex in graph.vertices() {
        let (label, shape) = node_style(vertex);
        let _ = writeln!(
            out,
            "{indent}{} [label={}, shape={shape}];",
            quote(&format!("{prefix}{}", vertex.id())),
            quote(&label),
        );
    }
    for vertex in graph.vertices() {
        for dep in vertex.dependencies() {
            let Some(pred) = graph.vertex(dep.vertex) else {
                continue;
            };
            let _ = writeln!(
                out,
                "{indent}{} -> {} [label={}];",
                quote(&format!("{prefix}{}", pred.id())),
                quote(&format!("{prefix}{}", vertex.id())),
                quote(dep.mask.label()),
            );
        }
    }
}

fn node_style(vertex: &Vertex) -> (String, &'static str) {
    match vertex.kind() {
        _ if vertex.is_condition() => (format!("{}\\n[{}]", vertex.id(), vertex.cond()), "diamond"),
        VertexKind::Processor(name) => (format!("{}\\n{}", vertex.id(), name), "box"),
        VertexKind::SubGraph { cluster, graph } if cluster.is_empty() => {
            (format!("{}\\n=> {}", vertex.id(), graph), "box3d")
        }
        VertexKind::SubGraph { cluster, graph } => {
            (format!("{}\\n=> {}::{}", vertex.id(), cluster, graph), "box3d")
        }
        VertexKind::Control => (vertex.id().to_string(), "circle"),
    }
}

fn quote(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\\\""))
}
