// Copyright 2023-2026 the Scratchpack authors. All rights reserved. MIT license.

use std::collections::HashMap;
use std::collections::HashSet;
use std::ops::Range;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::CompileError;
use crate::error::RewriteError;
use crate::error::TransformError;
use crate::graph::EXPORT_FROM_RE;
use crate::graph::IMPORT_STMT_RE;
use crate::module::resolve_relative;
use crate::module::root_package_name;
use crate::module::SourceModule;
use crate::text::apply_text_changes;
use crate::text::TextChange;

// Rewriting is text-pattern based: statements are recognized with anchored
// regular expressions and replaced through collected text changes. Statement
// shapes inside string literals that happen to start a line, and export
// clauses holding object literals, are known blind spots of this technique.

static EXPORT_DEFAULT_DECL_RE: Lazy<Regex> = Lazy::new(|| {
  Regex::new(
    r"(?m)^[ \t]*(export\s+default\s+)((?:async\s+)?function\*?|class)\s+([A-Za-z_$][\w$]*)",
  )
  .unwrap()
});

static EXPORT_DEFAULT_EXPR_RE: Lazy<Regex> =
  Lazy::new(|| Regex::new(r"(?m)^[ \t]*(export\s+default)[ \t]").unwrap());

static EXPORT_DECL_RE: Lazy<Regex> = Lazy::new(|| {
  Regex::new(
    r"(?m)^[ \t]*(export)\s+((?:async\s+)?function\*?|class|const|let|var)\s+([A-Za-z_$][\w$]*)",
  )
  .unwrap()
});

static EXPORT_NAMED_RE: Lazy<Regex> =
  Lazy::new(|| Regex::new(r"(?m)^[ \t]*export\s+\{([^{};]*)\}[ \t]*;?").unwrap());

/// Lowers non-standard syntax (JSX, TypeScript annotations) ahead of linkage
/// rewriting. The rewriter itself concerns only module linkage; hosts plug a
/// real lowering engine through this seam.
pub trait SyntaxLowering {
  fn lower(&self, module: &SourceModule) -> Result<String, TransformError>;
}

/// The default lowering: sources are passed through untouched.
#[derive(Debug, Default)]
pub struct IdentityLowering;

impl SyntaxLowering for IdentityLowering {
  fn lower(&self, module: &SourceModule) -> Result<String, TransformError> {
    Ok(module.raw.clone())
  }
}

/// One module's rewritten factory body plus the stylesheet payloads it owns.
#[derive(Debug, Clone)]
pub struct RewrittenModule {
  pub id: String,
  pub body: String,
  pub stylesheets: Vec<String>,
}

enum Target {
  Code(String),
  Stylesheet(String),
  Markup(String),
  External(String),
}

impl Target {
  fn accessor(&self) -> Option<String> {
    match self {
      Target::Code(id) | Target::External(id) => {
        Some(format!("__modules.request(\"{}\")", id))
      }
      Target::Stylesheet(_) | Target::Markup(_) => None,
    }
  }
}

#[derive(Debug, Default)]
struct ImportClause {
  default: Option<String>,
  namespace: Option<String>,
  named: Vec<(String, String)>,
}

/// Rewrites one module's imports and exports against the runtime module
/// registry. Operates independently of graph ordering; only the id
/// normalization is shared with resolution.
pub fn rewrite_module(
  module: &SourceModule,
  modules: &HashMap<String, SourceModule>,
  externals: &HashSet<String>,
  lowering: &dyn SyntaxLowering,
) -> Result<RewrittenModule, CompileError> {
  let source = lowering.lower(module)?;
  let mut changes: Vec<TextChange> = Vec::new();
  let mut claimed: Vec<Range<usize>> = Vec::new();
  let mut epilogue: Vec<(usize, String)> = Vec::new();
  let mut stylesheets: Vec<String> = Vec::new();

  // Re-exports claim their statement range first so the plain named-export
  // pass cannot match the same text.
  for captures in EXPORT_FROM_RE.captures_iter(&source) {
    let whole = captures.get(0).unwrap();
    let clause = captures.get(1).unwrap().as_str();
    let specifier = captures.get(2).unwrap().as_str();
    let target = classify_specifier(module, specifier, modules, externals)?;
    claimed.push(whole.range());
    changes.push(TextChange {
      range: whole.range(),
      new_text: String::new(),
    });
    let accessor = match target.accessor() {
      Some(accessor) => accessor,
      None => continue,
    };
    if clause.starts_with('*') {
      match clause.split_once(" as ") {
        Some((_, name)) => epilogue.push((
          whole.start(),
          format!("__exports.{} = {};", name.trim(), accessor),
        )),
        None => epilogue.push((
          whole.start(),
          format!("Object.assign(__exports, {});", accessor),
        )),
      }
    } else {
      let inner = clause.trim_start_matches('{').trim_end_matches('}');
      for entry in inner.split(',') {
        let entry = entry.trim();
        if entry.is_empty() {
          continue;
        }
        let (imported, exported) = split_as(entry);
        epilogue.push((
          whole.start(),
          format!("__exports.{} = {}.{};", exported, accessor, imported),
        ));
      }
    }
  }

  for captures in IMPORT_STMT_RE.captures_iter(&source) {
    let whole = captures.get(0).unwrap();
    if overlaps(&claimed, &whole.range()) {
      continue;
    }
    let clause = captures.get(1).map(|c| c.as_str());
    let specifier = captures.get(2).unwrap().as_str();
    let target = classify_specifier(module, specifier, modules, externals)?;
    let new_text = match &target {
      Target::Stylesheet(id) => {
        if !stylesheets.contains(id) {
          stylesheets.push(id.clone());
        }
        String::new()
      }
      Target::Markup(_) => String::new(),
      Target::Code(_) | Target::External(_) => {
        let accessor = target.accessor().unwrap();
        match clause {
          // type-only imports carry no runtime binding
          Some(clause) if is_type_only(clause) => String::new(),
          Some(clause) => bind_clause(&parse_import_clause(clause), &accessor),
          None => format!("{};", accessor),
        }
      }
    };
    changes.push(TextChange {
      range: whole.range(),
      new_text,
    });
  }

  for captures in EXPORT_DEFAULT_DECL_RE.captures_iter(&source) {
    let keyword = captures.get(1).unwrap();
    let name = captures.get(3).unwrap().as_str();
    claimed.push(keyword.range());
    changes.push(TextChange {
      range: keyword.range(),
      new_text: String::new(),
    });
    epilogue.push((keyword.start(), format!("__exports.{} = {};", name, name)));
    epilogue.push((keyword.start(), format!("__exports.default = {};", name)));
  }

  for captures in EXPORT_DEFAULT_EXPR_RE.captures_iter(&source) {
    let keyword = captures.get(1).unwrap();
    if overlaps(&claimed, &keyword.range()) {
      continue;
    }
    changes.push(TextChange {
      range: keyword.range(),
      new_text: "__exports.default =".to_string(),
    });
  }

  for captures in EXPORT_DECL_RE.captures_iter(&source) {
    let keyword = captures.get(1).unwrap();
    let declarator = captures.get(2).unwrap();
    let name = captures.get(3).unwrap().as_str();
    if overlaps(&claimed, &keyword.range()) {
      continue;
    }
    changes.push(TextChange {
      range: keyword.start()..declarator.start(),
      new_text: String::new(),
    });
    epilogue.push((keyword.start(), format!("__exports.{} = {};", name, name)));
  }

  for captures in EXPORT_NAMED_RE.captures_iter(&source) {
    let whole = captures.get(0).unwrap();
    if overlaps(&claimed, &whole.range()) {
      continue;
    }
    changes.push(TextChange {
      range: whole.range(),
      new_text: String::new(),
    });
    for entry in captures.get(1).unwrap().as_str().split(',') {
      let entry = entry.trim();
      if entry.is_empty() {
        continue;
      }
      let (local, exported) = split_as(entry);
      epilogue.push((
        whole.start(),
        format!("__exports.{} = {};", exported, local),
      ));
    }
  }

  let mut body = apply_text_changes(&source, changes);
  body.truncate(body.trim_end().len());
  epilogue.sort_by_key(|(offset, _)| *offset);
  for (_, line) in epilogue {
    body.push('\n');
    body.push_str(&line);
  }
  Ok(RewrittenModule {
    id: module.id.clone(),
    body,
    stylesheets,
  })
}

fn classify_specifier(
  module: &SourceModule,
  specifier: &str,
  modules: &HashMap<String, SourceModule>,
  externals: &HashSet<String>,
) -> Result<Target, RewriteError> {
  if specifier.starts_with("./") || specifier.starts_with("../") {
    let id = resolve_relative(&module.id, specifier);
    if id.ends_with(".css") {
      return Ok(Target::Stylesheet(id));
    }
    if id.ends_with(".html") || id.ends_with(".htm") {
      return Ok(Target::Markup(id));
    }
    if modules.contains_key(&id) {
      return Ok(Target::Code(id));
    }
  } else {
    if externals.contains(specifier) {
      return Ok(Target::External(specifier.to_string()));
    }
    // a subpath import binds to its root package's global
    let root = root_package_name(specifier);
    if externals.contains(&root) {
      return Ok(Target::External(root));
    }
  }
  Err(RewriteError::ModuleNotFound {
    referrer: module.id.clone(),
    specifier: specifier.to_string(),
  })
}

fn is_type_only(clause: &str) -> bool {
  let clause = clause.trim_start();
  clause == "type" || clause.starts_with("type ") || clause.starts_with("type{")
}

fn parse_import_clause(clause: &str) -> ImportClause {
  let mut result = ImportClause::default();
  let clause = clause.trim();
  let (head, braced) = match clause.find('{') {
    Some(open) => {
      let close = clause.rfind('}').unwrap_or(clause.len());
      (&clause[..open], Some(&clause[open + 1..close]))
    }
    None => (clause, None),
  };
  for part in head.split(',') {
    let part = part.trim();
    if part.is_empty() {
      continue;
    }
    if let Some(rest) = part.strip_prefix('*') {
      if let Some(name) = rest.trim().strip_prefix("as") {
        result.namespace = Some(name.trim().to_string());
      }
    } else {
      result.default = Some(part.to_string());
    }
  }
  if let Some(braced) = braced {
    for entry in braced.split(',') {
      let entry = entry.trim();
      if entry.is_empty() {
        continue;
      }
      let (imported, local) = split_as(entry);
      result.named.push((imported, local));
    }
  }
  result
}

fn bind_clause(clause: &ImportClause, accessor: &str) -> String {
  let mut declarations = Vec::new();
  if let Some(name) = &clause.default {
    // prefer the default export, fall back to the exports object itself
    declarations.push(format!(
      "const {} = ({}.default ?? {});",
      name, accessor, accessor
    ));
  }
  if let Some(name) = &clause.namespace {
    declarations.push(format!("const {} = {};", name, accessor));
  }
  if !clause.named.is_empty() {
    let bindings = clause
      .named
      .iter()
      .map(|(imported, local)| {
        if imported == local {
          imported.clone()
        } else {
          format!("{}: {}", imported, local)
        }
      })
      .collect::<Vec<_>>()
      .join(", ");
    declarations.push(format!("const {{ {} }} = {};", bindings, accessor));
  }
  declarations.join("\n")
}

fn split_as(entry: &str) -> (String, String) {
  match entry.split_once(" as ") {
    Some((left, right)) => (left.trim().to_string(), right.trim().to_string()),
    None => (entry.to_string(), entry.to_string()),
  }
}

fn overlaps(claimed: &[Range<usize>], range: &Range<usize>) -> bool {
  claimed
    .iter()
    .any(|c| range.start < c.end && c.start < range.end)
}
