use std::collections::{HashMap, HashSet};

use petgraph::graph::{DiGraph, NodeIndex};
use tracing::debug;

use crate::domain::models::{
    EdgeRelation, FileRecord, GraphData, GraphEdge, GraphNode, ReferenceKind, SymbolKind,
    SymbolRecord, SymbolReference,
};

/// Builds the repository structure graph from parsed files, symbols and
/// references. Runs as a single pass once every file has been parsed, so
/// references can resolve to files parsed after their own.
///
/// References that resolve to nothing inside the repository (external
/// packages, unknown names) are dropped; the graph never contains dangling
/// edges. Output order is deterministic regardless of input order.
pub fn build_graph(
    files: &[FileRecord],
    symbols: &[SymbolRecord],
    references: &[SymbolReference],
) -> GraphData {
    let mut graph: DiGraph<GraphNode, EdgeRelation> = DiGraph::new();
    let mut index_of: HashMap<String, NodeIndex> = HashMap::new();

    let mut file_order: Vec<&FileRecord> = files.iter().collect();
    file_order.sort_by(|a, b| a.path().cmp(b.path()));
    for file in &file_order {
        let node = GraphNode::file(file.path(), file.language());
        let idx = graph.add_node(node.clone());
        index_of.insert(node.id, idx);
    }

    let mut symbol_order: Vec<&SymbolRecord> = symbols.iter().collect();
    symbol_order.sort_by(|a, b| a.id().cmp(b.id()));
    for symbol in &symbol_order {
        let node = GraphNode::symbol(
            symbol.id(),
            symbol.name(),
            symbol.kind(),
            symbol.file_path(),
            symbol.start_line(),
            symbol.end_line(),
        );
        let idx = graph.add_node(node.clone());
        index_of.insert(node.id, idx);
    }

    let mut seen: HashSet<(NodeIndex, NodeIndex, EdgeRelation)> = HashSet::new();
    let mut add_edge = |graph: &mut DiGraph<GraphNode, EdgeRelation>,
                        source: NodeIndex,
                        target: NodeIndex,
                        relation: EdgeRelation| {
        if source != target && seen.insert((source, target, relation)) {
            graph.add_edge(source, target, relation);
        }
    };

    // Containment: file -> each of its symbols.
    for symbol in &symbol_order {
        let file_id = crate::domain::models::file_node_id(symbol.file_path());
        let sym_id = crate::domain::models::symbol_node_id(symbol.id());
        if let (Some(&f), Some(&s)) = (index_of.get(&file_id), index_of.get(&sym_id)) {
            add_edge(&mut graph, f, s, EdgeRelation::Contains);
        }
    }

    let file_set: HashSet<&str> = files.iter().map(|f| f.path()).collect();
    let mut classes_by_name: HashMap<&str, Vec<&SymbolRecord>> = HashMap::new();
    for symbol in symbols {
        if symbol.kind() == SymbolKind::Class {
            classes_by_name.entry(symbol.name()).or_default().push(symbol);
        }
    }

    let mut dropped = 0usize;
    for reference in references {
        let resolved = match reference.kind() {
            ReferenceKind::Imports => {
                resolve_import(reference, &file_set).and_then(|target_path| {
                    let source = index_of.get(&crate::domain::models::file_node_id(reference.file_path()));
                    let target = index_of.get(&crate::domain::models::file_node_id(&target_path));
                    match (source, target) {
                        (Some(&s), Some(&t)) => Some((s, t, EdgeRelation::Imports)),
                        _ => None,
                    }
                })
            }
            ReferenceKind::Extends => resolve_extends(reference, symbols, &classes_by_name)
                .and_then(|(subclass, parent)| {
                    let source = index_of.get(&crate::domain::models::symbol_node_id(subclass.id()));
                    let target = index_of.get(&crate::domain::models::symbol_node_id(parent.id()));
                    match (source, target) {
                        (Some(&s), Some(&t)) => Some((s, t, EdgeRelation::Extends)),
                        _ => None,
                    }
                }),
        };
        match resolved {
            Some((source, target, relation)) => add_edge(&mut graph, source, target, relation),
            None => dropped += 1,
        }
    }
    if dropped > 0 {
        debug!("Dropped {} references that did not resolve in-repository", dropped);
    }

    let mut nodes: Vec<GraphNode> = graph.node_weights().cloned().collect();
    nodes.sort_by(|a, b| a.id.cmp(&b.id));

    let mut edges: Vec<GraphEdge> = graph
        .edge_indices()
        .filter_map(|e| {
            let (s, t) = graph.edge_endpoints(e)?;
            Some(GraphEdge::new(
                graph[s].id.clone(),
                graph[t].id.clone(),
                graph[e],
            ))
        })
        .collect();
    edges.sort_by(|a, b| {
        a.relation
            .cmp(&b.relation)
            .then_with(|| a.source.cmp(&b.source))
            .then_with(|| a.target.cmp(&b.target))
    });

    GraphData { nodes, edges }
}

/// Resolves an import reference to a file path inside the repository.
fn resolve_import(reference: &SymbolReference, file_set: &HashSet<&str>) -> Option<String> {
    let importer_dir = parent_dir(reference.file_path());
    let target = reference.target();

    if target.starts_with("./") || target.starts_with("../") {
        return resolve_script_import(target, importer_dir, file_set);
    }
    if target.starts_with('.') {
        return resolve_relative_module(target, importer_dir, file_set);
    }
    resolve_dotted_module(target, importer_dir, file_set)
}

/// `import a.b` / `from a.b import c`: try the importing file's directory
/// first, then the repository root. A dotted path maps to either a module
/// file or a package directory.
fn resolve_dotted_module(
    target: &str,
    importer_dir: &str,
    file_set: &HashSet<&str>,
) -> Option<String> {
    let rel = target.replace('.', "/");
    for base in [importer_dir, ""] {
        for candidate in [
            join_path(base, &format!("{}.py", rel)),
            join_path(base, &format!("{}/__init__.py", rel)),
        ] {
            if file_set.contains(candidate.as_str()) {
                return Some(candidate);
            }
        }
    }
    None
}

/// Python relative imports: one leading dot is the current package, each
/// further dot walks one package up.
fn resolve_relative_module(
    target: &str,
    importer_dir: &str,
    file_set: &HashSet<&str>,
) -> Option<String> {
    let dots = target.chars().take_while(|c| *c == '.').count();
    let rest = &target[dots..];

    let mut base: Vec<&str> = importer_dir.split('/').filter(|s| !s.is_empty()).collect();
    for _ in 1..dots {
        base.pop()?;
    }
    let base = base.join("/");

    if rest.is_empty() {
        let candidate = join_path(&base, "__init__.py");
        return file_set.contains(candidate.as_str()).then_some(candidate);
    }
    let rel = rest.replace('.', "/");
    for candidate in [
        join_path(&base, &format!("{}.py", rel)),
        join_path(&base, &format!("{}/__init__.py", rel)),
    ] {
        if file_set.contains(candidate.as_str()) {
            return Some(candidate);
        }
    }
    None
}

/// JavaScript/TypeScript relative specifiers. Bare specifiers name external
/// packages and are never resolved.
fn resolve_script_import(
    target: &str,
    importer_dir: &str,
    file_set: &HashSet<&str>,
) -> Option<String> {
    let raw = join_path(importer_dir, target);
    let base = normalize_path(&raw)?;
    let candidates = [
        base.clone(),
        format!("{}.js", base),
        format!("{}.jsx", base),
        format!("{}.ts", base),
        format!("{}.tsx", base),
        format!("{}/index.js", base),
        format!("{}/index.ts", base),
    ];
    candidates
        .into_iter()
        .find(|c| file_set.contains(c.as_str()))
}

/// Resolves an extends reference to `(subclass, parent)` symbols.
///
/// The parent is looked up by name among class symbols, preferring the same
/// file, then the same directory, then anywhere. Remaining ambiguity breaks
/// on shortest file path (component count, then length, then lexical order),
/// then earliest start line.
fn resolve_extends<'a>(
    reference: &SymbolReference,
    symbols: &'a [SymbolRecord],
    classes_by_name: &HashMap<&str, Vec<&'a SymbolRecord>>,
) -> Option<(&'a SymbolRecord, &'a SymbolRecord)> {
    let subclass = find_subclass(reference, symbols)?;
    let candidates = classes_by_name.get(reference.target())?;

    let eligible: Vec<&SymbolRecord> = candidates
        .iter()
        .copied()
        .filter(|c| c.id() != subclass.id())
        .collect();
    if eligible.is_empty() {
        return None;
    }

    let importer_dir = parent_dir(reference.file_path());
    let same_file: Vec<&SymbolRecord> = eligible
        .iter()
        .copied()
        .filter(|c| c.file_path() == reference.file_path())
        .collect();
    let pool: Vec<&SymbolRecord> = if !same_file.is_empty() {
        same_file
    } else {
        let same_dir: Vec<&SymbolRecord> = eligible
            .iter()
            .copied()
            .filter(|c| parent_dir(c.file_path()) == importer_dir)
            .collect();
        if !same_dir.is_empty() {
            same_dir
        } else {
            eligible
        }
    };

    let parent = pool.into_iter().min_by(|a, b| {
        let a_components = a.file_path().split('/').count();
        let b_components = b.file_path().split('/').count();
        a_components
            .cmp(&b_components)
            .then_with(|| a.file_path().len().cmp(&b.file_path().len()))
            .then_with(|| a.file_path().cmp(b.file_path()))
            .then_with(|| a.start_line().cmp(&b.start_line()))
    })?;
    Some((subclass, parent))
}

/// Finds the subclass symbol the reference was extracted from: a class with
/// the recorded name in the same file, preferring one whose span covers the
/// reference line.
fn find_subclass<'a>(
    reference: &SymbolReference,
    symbols: &'a [SymbolRecord],
) -> Option<&'a SymbolRecord> {
    let name = reference.symbol_name()?;
    let mut fallback: Option<&SymbolRecord> = None;
    for symbol in symbols {
        if symbol.file_path() != reference.file_path() || symbol.name() != name {
            continue;
        }
        if symbol.contains_line(reference.line()) {
            return Some(symbol);
        }
        match fallback {
            Some(existing) if existing.start_line() <= symbol.start_line() => {}
            _ => fallback = Some(symbol),
        }
    }
    fallback
}

fn parent_dir(path: &str) -> &str {
    path.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
}

fn join_path(base: &str, rest: &str) -> String {
    if base.is_empty() {
        rest.to_string()
    } else {
        format!("{}/{}", base, rest)
    }
}

/// Lexically normalizes `.` and `..` segments. Returns `None` when the path
/// escapes the repository root.
fn normalize_path(path: &str) -> Option<String> {
    let mut stack: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                stack.pop()?;
            }
            other => stack.push(other),
        }
    }
    Some(stack.join("/"))
}
