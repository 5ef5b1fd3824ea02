// Copyright 2023-2026 the Scratchpack authors. All rights reserved. MIT license.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::GraphError;
use crate::module::resolve_relative;
use crate::module::SourceModule;

/// A static import statement, with an optional binding clause. Anchored to a
/// line start so import-shaped text inside longer expressions is ignored; the
/// clause may span lines but cannot contain quotes or semicolons, which keeps
/// the lazy match from swallowing the statements that follow.
pub(crate) static IMPORT_STMT_RE: Lazy<Regex> = Lazy::new(|| {
  Regex::new(r#"(?m)^[ \t]*import\s+(?:([^;"']+?)\s+from\s+)?["']([^"']+)["'][ \t]*;?"#)
    .unwrap()
});

/// A re-export statement: `export { a } from './m'` or `export * from './m'`.
pub(crate) static EXPORT_FROM_RE: Lazy<Regex> = Lazy::new(|| {
  Regex::new(
    r#"(?m)^[ \t]*export\s+(\{[^{};]*\}|\*(?:\s+as\s+[A-Za-z_$][\w$]*)?)\s+from\s+["']([^"']+)["'][ \t]*;?"#,
  )
  .unwrap()
});

static DYNAMIC_IMPORT_RE: Lazy<Regex> =
  Lazy::new(|| Regex::new(r"\bimport\s*\(").unwrap());

/// References extracted from one code module, grouped by target class.
/// Stylesheet and markup references are excluded from dependency ordering.
#[derive(Debug, Default, Clone)]
pub struct ModuleReferences {
  pub code: Vec<String>,
  pub stylesheets: Vec<String>,
  pub markup: Vec<String>,
  pub external: Vec<String>,
  pub has_dynamic_import: bool,
}

pub fn extract_references(module: &SourceModule) -> ModuleReferences {
  let mut references = ModuleReferences::default();
  let mut specifiers: Vec<(usize, &str)> = Vec::new();
  for captures in IMPORT_STMT_RE.captures_iter(&module.raw) {
    if let Some(specifier) = captures.get(2) {
      specifiers.push((specifier.start(), specifier.as_str()));
    }
  }
  for captures in EXPORT_FROM_RE.captures_iter(&module.raw) {
    if let Some(specifier) = captures.get(2) {
      specifiers.push((specifier.start(), specifier.as_str()));
    }
  }
  specifiers.sort_by_key(|(offset, _)| *offset);

  for (_, specifier) in specifiers {
    if specifier.starts_with("./") || specifier.starts_with("../") {
      let id = resolve_relative(&module.id, specifier);
      let target = if id.ends_with(".css") {
        &mut references.stylesheets
      } else if id.ends_with(".html") || id.ends_with(".htm") {
        &mut references.markup
      } else {
        &mut references.code
      };
      if !target.contains(&id) {
        target.push(id);
      }
    } else if !references.external.contains(&specifier.to_string()) {
      references.external.push(specifier.to_string());
    }
  }
  references.has_dynamic_import = DYNAMIC_IMPORT_RE.is_match(&module.raw);
  references
}

/// The result of dependency resolution. `order` is a valid compilation order
/// (every module after its non-circular dependencies) only when `errors` is
/// empty; compilation must not proceed to rewriting otherwise.
#[derive(Debug, Default)]
pub struct GraphOutput {
  pub order: Vec<String>,
  pub references: HashMap<String, ModuleReferences>,
  pub errors: Vec<GraphError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
  InProgress,
  Done,
}

struct Frame {
  id: String,
  deps: Vec<String>,
  next: usize,
}

/// Resolves the dependency graph rooted at `entry_id` with a three-color
/// depth-first traversal. Cycles and missing modules are collected rather
/// than aborting the walk, so one pass reports every reachable error. The
/// traversal keeps its own frame stack, so import-chain depth is not limited
/// by the call stack.
pub fn resolve_graph(
  modules: &HashMap<String, SourceModule>,
  entry_id: &str,
) -> GraphOutput {
  let mut output = GraphOutput::default();
  if !modules.contains_key(entry_id) {
    output
      .errors
      .push(GraphError::MissingEntry(entry_id.to_string()));
    return output;
  }

  let mut marks = HashMap::new();
  let mut stack = Vec::new();
  stack.push(open_frame(entry_id, modules, &mut marks, &mut output));

  while let Some(frame) = stack.last_mut() {
    if frame.next >= frame.deps.len() {
      marks.insert(frame.id.clone(), Mark::Done);
      output.order.push(frame.id.clone());
      stack.pop();
      continue;
    }
    let dep = frame.deps[frame.next].clone();
    frame.next += 1;
    let referrer = frame.id.clone();
    match marks.get(dep.as_str()) {
      Some(Mark::Done) => {}
      Some(Mark::InProgress) => {
        output.errors.push(GraphError::Cycle { from: referrer, to: dep });
      }
      None => {
        if modules.contains_key(dep.as_str()) {
          stack.push(open_frame(&dep, modules, &mut marks, &mut output));
        } else {
          output.errors.push(GraphError::MissingModule {
            referrer,
            specifier: dep,
          });
        }
      }
    }
  }
  output
}

fn open_frame(
  id: &str,
  modules: &HashMap<String, SourceModule>,
  marks: &mut HashMap<String, Mark>,
  output: &mut GraphOutput,
) -> Frame {
  marks.insert(id.to_string(), Mark::InProgress);
  let references = extract_references(&modules[id]);
  for referenced in references.stylesheets.iter().chain(&references.markup) {
    if !modules.contains_key(referenced.as_str()) {
      output.errors.push(GraphError::MissingModule {
        referrer: id.to_string(),
        specifier: referenced.clone(),
      });
    }
  }
  let deps = references.code.clone();
  output.references.insert(id.to_string(), references);
  Frame {
    id: id.to_string(),
    deps,
    next: 0,
  }
}
