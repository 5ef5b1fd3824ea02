// Copyright 2023-2026 the Scratchpack authors. All rights reserved. MIT license.

use std::collections::HashMap;

use serde::Deserialize;
use serde::Serialize;

use crate::error::GraphError;
use crate::strategy::Strategy;
use crate::text;

/// File extensions that identify code modules. These are stripped when a
/// file name is normalized into a module id; stylesheet and markup ids keep
/// their extension.
pub const CODE_EXTENSIONS: &[&str] = &["js", "jsx", "ts", "tsx", "mjs"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleKind {
  Code,
  Stylesheet,
  Markup,
}

/// One source file submitted for compilation. Immutable for the duration of
/// a compile.
#[derive(Debug, Clone)]
pub struct SourceModule {
  pub id: String,
  pub raw: String,
  pub kind: ModuleKind,
}

impl SourceModule {
  pub fn new(file_name: &str, content: &str) -> Self {
    Self {
      id: normalize_id(file_name),
      raw: text::strip_bom(content).to_string(),
      kind: kind_for_file(file_name),
    }
  }
}

pub fn kind_for_file(file_name: &str) -> ModuleKind {
  match file_name.rsplit_once('.').map(|(_, ext)| ext) {
    Some("css") => ModuleKind::Stylesheet,
    Some("html") | Some("htm") => ModuleKind::Markup,
    _ => ModuleKind::Code,
  }
}

/// Normalizes a file name into a module id: a leading `./` is dropped and
/// code extensions are stripped.
pub fn normalize_id(file_name: &str) -> String {
  let name = file_name.trim_start_matches("./");
  if let Some((stem, ext)) = name.rsplit_once('.') {
    if CODE_EXTENSIONS.contains(&ext) {
      return stem.to_string();
    }
  }
  name.to_string()
}

/// Resolves a `./` or `../` specifier against the directory of the importing
/// module and normalizes the result into a module id.
pub fn resolve_relative(importer_id: &str, specifier: &str) -> String {
  let mut segments: Vec<&str> = importer_id.split('/').collect();
  segments.pop();
  for part in specifier.split('/') {
    match part {
      "" | "." => {}
      ".." => {
        segments.pop();
      }
      other => segments.push(other),
    }
  }
  normalize_id(&segments.join("/"))
}

/// Reduces an import specifier to the package name it belongs to:
/// `react-dom/client` -> `react-dom`, `@scope/pkg/util` -> `@scope/pkg`.
pub fn root_package_name(specifier: &str) -> String {
  let mut segments = specifier.splitn(3, '/');
  match (segments.next(), segments.next()) {
    (Some(scope), Some(name)) if scope.starts_with('@') => {
      format!("{}/{}", scope, name)
    }
    (Some(name), _) => name.to_string(),
    (None, _) => specifier.to_string(),
  }
}

/// The request shape supplied by the editor side.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompileRequest {
  pub request_id: String,
  pub modules: HashMap<String, RequestModule>,
  #[serde(default)]
  pub dependencies: Vec<RequestDependency>,
  pub entry_module_id: String,
}

impl CompileRequest {
  /// Builds the per-compile module map, keyed by normalized module id.
  /// File names are visited in sorted order so the map is the same for the
  /// same request; colliding ids are reported by [`Self::id_collisions`].
  pub fn source_modules(&self) -> HashMap<String, SourceModule> {
    let mut result = HashMap::with_capacity(self.modules.len());
    for file_name in self.sorted_file_names() {
      let module = SourceModule::new(file_name, &self.modules[file_name].content);
      result.insert(module.id.clone(), module);
    }
    result
  }

  /// File names whose normalized ids collide (`A.js` and `A.ts` both become
  /// `A`). A collision drops a file from the module map, so compilation
  /// reports it instead of proceeding.
  pub fn id_collisions(&self) -> Vec<GraphError> {
    let mut first_by_id: HashMap<String, &str> = HashMap::new();
    let mut errors = Vec::new();
    for file_name in self.sorted_file_names() {
      let id = normalize_id(file_name);
      match first_by_id.get(id.as_str()) {
        Some(first) => errors.push(GraphError::IdCollision {
          id,
          first: first.to_string(),
          second: file_name.clone(),
        }),
        None => {
          first_by_id.insert(id, file_name.as_str());
        }
      }
    }
    errors
  }

  fn sorted_file_names(&self) -> Vec<&String> {
    let mut file_names: Vec<&String> = self.modules.keys().collect();
    file_names.sort();
    file_names
  }

  pub fn entry_id(&self) -> String {
    normalize_id(&self.entry_module_id)
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestModule {
  pub content: String,
}

/// An external package entry. When `cdn_url` is pre-resolved by the
/// dependency-manager side it is used as-is; otherwise the binder resolves
/// one.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestDependency {
  pub name: String,
  pub version: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub cdn_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompileResponse {
  pub request_id: String,
  pub success: bool,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub bundle_text: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub error: Option<String>,
  pub strategy_used: Strategy,
}

impl CompileResponse {
  pub fn success(
    request_id: String,
    strategy: Strategy,
    bundle_text: String,
  ) -> Self {
    Self {
      request_id,
      success: true,
      bundle_text: Some(bundle_text),
      error: None,
      strategy_used: strategy,
    }
  }

  pub fn failure(request_id: String, strategy: Strategy, error: String) -> Self {
    Self {
      request_id,
      success: false,
      bundle_text: None,
      error: Some(error),
      strategy_used: strategy,
    }
  }
}
