//! Component C: Graph Builder. Alias expansion, matrix expansion, and the
//! arena-plus-integer-indices dependency graph with three-color cycle
//! detection and level computation.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use crate::config::{AliasTarget, Config, Task};
use crate::constants::MAX_ALIAS_DEPTH;
use crate::error::{InvalidConfigKind, ZrError};

/// Recursively resolves alias names in `targets` to concrete task-name
/// tails. A depth cap (rather than a visited-set) matches the documented
/// behavior of the system this was distilled from: either approach is
/// sound, the cap is simply the one this implementation commits to.
///
/// Takes the already-merged alias map rather than a bare `Config` so every
/// caller resolves against the same sources `alias show`/`alias list` do —
/// project config *and* the per-user alias store — instead of silently
/// dropping aliases a user only ever added via `zr alias add`.
pub fn expand_aliases(
    aliases: &BTreeMap<String, AliasTarget>,
    targets: &[String],
) -> Result<Vec<String>, ZrError> {
    let mut out = Vec::new();
    for target in targets {
        expand_one(aliases, target, 0, &mut out)?;
    }
    Ok(out)
}

fn expand_one(
    aliases: &BTreeMap<String, crate::config::AliasTarget>,
    name: &str,
    depth: usize,
    out: &mut Vec<String>,
) -> Result<(), ZrError> {
    if depth > MAX_ALIAS_DEPTH {
        return Err(ZrError::CyclicAlias {
            name: name.to_string(),
        });
    }
    match aliases.get(name) {
        None => {
            out.push(name.to_string());
            Ok(())
        }
        Some(target) => {
            for next in target.targets() {
                expand_one(aliases, &next, depth + 1, out)?;
            }
            Ok(())
        }
    }
}

/// Cartesian product of a task's matrix dimensions, iterated in the
/// dimension-name order the `BTreeMap` already gives us (lexicographic, as
/// required for deterministic graphs).
fn matrix_product(matrix: &BTreeMap<String, Vec<String>>) -> Vec<BTreeMap<String, String>> {
    let mut combos = vec![BTreeMap::new()];
    for (dim, values) in matrix {
        let mut next = Vec::with_capacity(combos.len() * values.len());
        for combo in &combos {
            for value in values {
                let mut extended = combo.clone();
                extended.insert(dim.clone(), value.clone());
                next.push(extended);
            }
        }
        combos = next;
    }
    combos
}

fn matrix_suffix(assignment: &BTreeMap<String, String>) -> String {
    assignment
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(",")
}

fn parse_cache_timeout(
    def: &crate::config::TaskDef,
) -> Result<Option<u64>, ZrError> {
    def.timeout
        .as_deref()
        .map(crate::config::duration::parse_duration_ms)
        .transpose()
        .map_err(ZrError::from)
}

fn to_task(name: String, def: &crate::config::TaskDef) -> Result<Task, ZrError> {
    let cmd = def
        .cmd
        .clone()
        .filter(|c| !c.trim().is_empty())
        .ok_or(InvalidConfigKind::EmptyCmd)?;
    Ok(Task {
        name,
        cmd,
        cwd: def.cwd.clone(),
        description: def.description.clone(),
        deps: def.deps.clone(),
        deps_serial: def.deps_serial.clone(),
        env: def.env.clone(),
        timeout_ms: parse_cache_timeout(def)?,
        retry: def.retry,
        allow_failure: def.allow_failure,
        condition: def.condition.clone(),
        cache: def.cache.clone(),
        max_concurrent: def.max_concurrent,
        tags: def.tags.clone(),
        variant_of: None,
    })
}

/// Template-merges and matrix-expands every task in `config.tasks`,
/// producing the full set of concrete [`Task`]s by name. This is the
/// "tagged variant resolved before graph construction" step the design
/// calls for: everything downstream only ever sees `Task`.
pub fn resolve_all_tasks(config: &Config) -> Result<BTreeMap<String, Task>, ZrError> {
    let mut resolved = BTreeMap::new();
    for (name, raw_def) in &config.tasks {
        let def = crate::config::loader::resolve_template(config, raw_def)?;

        if def.matrix.is_empty() {
            resolved.insert(name.clone(), to_task(name.clone(), &def)?);
            continue;
        }

        for assignment in matrix_product(&def.matrix) {
            let suffix = matrix_suffix(&assignment);
            let variant_name = format!("{name}/{suffix}");
            let mut task = to_task(variant_name.clone(), &def)?;
            task.variant_of = Some((name.clone(), assignment));
            resolved.insert(variant_name, task);
        }
    }
    Ok(resolved)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
    Parallel,
    Serial,
}

#[derive(Debug, Clone)]
pub struct Node {
    pub task: Task,
    /// Parallel-group dependency indices (`deps`), as declared.
    pub deps: Vec<usize>,
    /// Serial chain dependency indices, in declared order (`deps_serial`),
    /// kept for display/rendering only — see `incoming` for what the
    /// scheduler actually waits on.
    pub deps_serial: Vec<usize>,
    /// The dependency indices this node's readiness actually waits on:
    /// `deps` plus, for a `deps_serial` chain `[s0, s1, ..., sn]` declared
    /// by *this* node, just `sn` — the chain `s0 -> s1 -> ... -> sn` is
    /// realized as edges on `s1..=sn`'s own `incoming`, not duplicated here.
    pub incoming: Vec<usize>,
    pub level: usize,
}

#[derive(Debug, Clone)]
pub struct Graph {
    pub nodes: Vec<Node>,
    pub index_of: BTreeMap<String, usize>,
}

impl Graph {
    pub fn index(&self, name: &str) -> Option<usize> {
        self.index_of.get(name).copied()
    }

    pub fn node(&self, idx: usize) -> &Node {
        &self.nodes[idx]
    }

    /// Declared edges for the `graph` command's rendering: `deps` as
    /// parallel edges, `deps_serial` as the literal chain
    /// `s0 -> s1 -> ... -> sn -> dependent` the design describes.
    pub fn edges(&self) -> Vec<(usize, usize, EdgeKind)> {
        let mut edges = Vec::new();
        for (dependent, node) in self.nodes.iter().enumerate() {
            for &dep in &node.deps {
                edges.push((dep, dependent, EdgeKind::Parallel));
            }
            let mut chain = node.deps_serial.iter();
            if let Some(&first) = chain.next() {
                let mut prev = first;
                for &next in chain {
                    edges.push((prev, next, EdgeKind::Serial));
                    prev = next;
                }
                edges.push((prev, dependent, EdgeKind::Serial));
            }
        }
        edges
    }
}

/// Builds the execution graph reachable from `targets` (after alias
/// expansion has already turned them into concrete task-name roots).
pub fn build(all_tasks: &BTreeMap<String, Task>, roots: &[String]) -> Result<Graph, ZrError> {
    // Discover the reachable task-name set first so indices can be assigned
    // in sorted order regardless of traversal order (determinism, P1).
    let mut discovered: BTreeSet<String> = BTreeSet::new();
    let mut queue: VecDeque<String> = roots.iter().cloned().collect();
    while let Some(name) = queue.pop_front() {
        if !discovered.insert(name.clone()) {
            continue;
        }
        let task = all_tasks
            .get(&name)
            .ok_or_else(|| InvalidConfigKind::UnknownTask(name.clone()))?;
        for dep in task.deps.iter().chain(task.deps_serial.iter()) {
            if !discovered.contains(dep) {
                queue.push_back(dep.clone());
            }
        }
    }

    let index_of: BTreeMap<String, usize> = discovered
        .iter()
        .enumerate()
        .map(|(i, name)| (name.clone(), i))
        .collect();

    let mut nodes = Vec::with_capacity(index_of.len());
    for name in &discovered {
        let task = all_tasks
            .get(name)
            .ok_or_else(|| InvalidConfigKind::UnknownTask(name.clone()))?
            .clone();

        let resolve_idx = |dep_name: &String| -> Result<usize, ZrError> {
            index_of
                .get(dep_name)
                .copied()
                .ok_or_else(|| InvalidConfigKind::UnknownTask(dep_name.clone()).into())
        };

        let deps = task
            .deps
            .iter()
            .map(resolve_idx)
            .collect::<Result<Vec<_>, ZrError>>()?;
        let deps_serial = task
            .deps_serial
            .iter()
            .map(resolve_idx)
            .collect::<Result<Vec<_>, ZrError>>()?;

        nodes.push(Node {
            incoming: deps.clone(),
            task,
            deps,
            deps_serial,
            level: 0,
        });
    }

    // Realize each node's `deps_serial` as the literal chain the design
    // calls for: s0 -> s1 -> ... -> sn -> dependent. The chain edges land
    // on the *siblings'* `incoming`, not the dependent's.
    for dependent in 0..nodes.len() {
        let chain = nodes[dependent].deps_serial.clone();
        let mut iter = chain.into_iter();
        if let Some(first) = iter.next() {
            let mut prev = first;
            for next in iter {
                nodes[next].incoming.push(prev);
                prev = next;
            }
            nodes[dependent].incoming.push(prev);
        }
    }

    let mut graph = Graph { nodes, index_of };
    detect_cycles(&graph)?;
    level(&mut graph);
    Ok(graph)
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Color {
    White,
    Gray,
    Black,
}

/// Depth-first three-coloring over the combined (`deps` + `deps_serial`)
/// edge set. On the first back edge, reconstructs the cyclic path.
fn detect_cycles(graph: &Graph) -> Result<(), ZrError> {
    let n = graph.nodes.len();
    let mut color = vec![Color::White; n];
    let mut stack_path: Vec<usize> = Vec::new();

    fn visit(
        graph: &Graph,
        idx: usize,
        color: &mut [Color],
        stack_path: &mut Vec<usize>,
    ) -> Result<(), ZrError> {
        color[idx] = Color::Gray;
        stack_path.push(idx);

        let node = graph.node(idx);
        for &dep in node.deps.iter().chain(node.deps_serial.iter()) {
            match color[dep] {
                Color::White => visit(graph, dep, color, stack_path)?,
                Color::Gray => {
                    let cycle_start = stack_path.iter().position(|&i| i == dep).unwrap_or(0);
                    let mut path: Vec<String> = stack_path[cycle_start..]
                        .iter()
                        .map(|&i| graph.node(i).task.name.clone())
                        .collect();
                    path.push(graph.node(dep).task.name.clone());
                    return Err(ZrError::CycleDetected { path });
                }
                Color::Black => {}
            }
        }

        stack_path.pop();
        color[idx] = Color::Black;
        Ok(())
    }

    for idx in 0..n {
        if color[idx] == Color::White {
            visit(graph, idx, &mut color, &mut stack_path)?;
        }
    }
    Ok(())
}

/// Execution level = length of the longest path from a root (a node with
/// no incoming dependency edges within the discovered set). Informational
/// only (exposed to `graph`); not used by the scheduler's ready-set logic.
fn level(graph: &mut Graph) {
    let n = graph.nodes.len();
    let mut levels = vec![None; n];

    fn compute(graph: &Graph, idx: usize, levels: &mut Vec<Option<usize>>) -> usize {
        if let Some(l) = levels[idx] {
            return l;
        }
        let node = graph.node(idx);
        let deps: Vec<usize> = node.deps.iter().chain(node.deps_serial.iter()).copied().collect();
        let l = if deps.is_empty() {
            0
        } else {
            deps.iter().map(|&d| compute(graph, d, levels) + 1).max().unwrap_or(0)
        };
        levels[idx] = Some(l);
        l
    }

    for idx in 0..n {
        let l = compute(graph, idx, &mut levels);
        graph.nodes[idx].level = l;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TaskDef;

    fn task_def(cmd: &str, deps: &[&str], deps_serial: &[&str]) -> TaskDef {
        TaskDef {
            cmd: Some(cmd.to_string()),
            deps: deps.iter().map(|s| s.to_string()).collect(),
            deps_serial: deps_serial.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    fn config_with(tasks: &[(&str, TaskDef)]) -> Config {
        let mut config = Config::default();
        for (name, def) in tasks {
            config.tasks.insert((*name).to_string(), def.clone());
        }
        config
    }

    #[test]
    fn deterministic_across_repeated_builds() {
        let config = config_with(&[
            ("a", task_def("echo a", &[], &[])),
            ("b", task_def("echo b", &["a"], &[])),
            ("c", task_def("echo c", &["b"], &[])),
        ]);
        let tasks = resolve_all_tasks(&config).unwrap();
        let g1 = build(&tasks, &["c".to_string()]).unwrap();
        let g2 = build(&tasks, &["c".to_string()]).unwrap();
        assert_eq!(g1.index_of, g2.index_of);
        let levels1: Vec<usize> = g1.nodes.iter().map(|n| n.level).collect();
        let levels2: Vec<usize> = g2.nodes.iter().map(|n| n.level).collect();
        assert_eq!(levels1, levels2);
    }

    #[test]
    fn detects_simple_cycle() {
        let config = config_with(&[
            ("a", task_def("echo a", &["b"], &[])),
            ("b", task_def("echo b", &["c"], &[])),
            ("c", task_def("echo c", &["a"], &[])),
        ]);
        let tasks = resolve_all_tasks(&config).unwrap();
        let err = build(&tasks, &["a".to_string()]).unwrap_err();
        assert!(matches!(err, ZrError::CycleDetected { .. }));
    }

    #[test]
    fn serial_chain_becomes_edges_in_order() {
        let config = config_with(&[
            ("a", task_def("echo a", &[], &[])),
            ("b", task_def("echo b", &[], &[])),
            ("parent", task_def("echo p", &[], &["a", "b"])),
        ]);
        let tasks = resolve_all_tasks(&config).unwrap();
        let graph = build(&tasks, &["parent".to_string()]).unwrap();
        let parent_idx = graph.index("parent").unwrap();
        let a_idx = graph.index("a").unwrap();
        let b_idx = graph.index("b").unwrap();
        assert_eq!(graph.node(parent_idx).deps_serial, vec![a_idx, b_idx]);
    }

    #[test]
    fn matrix_expansion_is_complete() {
        let mut def = task_def("echo hi", &[], &[]);
        def.matrix.insert("os".to_string(), vec!["linux".to_string(), "mac".to_string()]);
        def.matrix.insert("arch".to_string(), vec!["x64".to_string(), "arm".to_string(), "arm64".to_string()]);
        let config = config_with(&[("build", def)]);
        let tasks = resolve_all_tasks(&config).unwrap();
        let variant_names: Vec<&String> = tasks.keys().filter(|k| k.starts_with("build/")).collect();
        assert_eq!(variant_names.len(), 6);
        assert!(tasks.contains_key("build/arch=arm,os=linux"));
    }

    #[test]
    fn unknown_dependency_is_an_error() {
        let config = config_with(&[("a", task_def("echo a", &["ghost"], &[]))]);
        let tasks = resolve_all_tasks(&config).unwrap();
        let err = build(&tasks, &["a".to_string()]).unwrap_err();
        assert!(matches!(
            err,
            ZrError::InvalidConfig(InvalidConfigKind::UnknownTask(_))
        ));
    }

    #[test]
    fn alias_expands_to_targets() {
        let mut config = config_with(&[("a", task_def("echo a", &[], &[]))]);
        config.alias.insert(
            "shortcut".to_string(),
            crate::config::AliasTarget::Single("a".to_string()),
        );
        let expanded = expand_aliases(&config.all_aliases(), &["shortcut".to_string()]).unwrap();
        assert_eq!(expanded, vec!["a".to_string()]);
    }

    #[test]
    fn alias_depth_cap_is_enforced() {
        let mut config = Config::default();
        // self-referential alias: always expands to itself, so the depth cap
        // is the only thing that stops this from hanging.
        config.alias.insert(
            "loop".to_string(),
            crate::config::AliasTarget::Single("loop".to_string()),
        );
        let err = expand_aliases(&config.all_aliases(), &["loop".to_string()]).unwrap_err();
        assert!(matches!(err, ZrError::CyclicAlias { .. }));
    }
}
