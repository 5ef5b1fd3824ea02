// Copyright 2023-2026 the Scratchpack authors. All rights reserved. MIT license.

use std::collections::BTreeSet;
use std::collections::HashMap;

use serde::Deserialize;
use serde::Serialize;

use crate::graph::extract_references;
use crate::module::root_package_name;
use crate::module::ModuleKind;
use crate::module::SourceModule;

/// The execution environment that performs a compilation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Strategy {
  /// In-process transform, run off the interactive thread.
  LocalTransform,
  /// Sandboxed in-browser runtime.
  SandboxedRuntime,
  /// Full remote build service.
  RemoteBuild,
}

/// Packages the sandboxed runtime preloads; references to these alone do
/// not force a heavier strategy.
pub const BASE_RUNTIME_PACKAGES: &[&str] = &["react", "react-dom"];

/// Above this many distinct external packages the project is treated as a
/// real dependency tree and handed to the remote build.
pub const REMOTE_EXTERNAL_THRESHOLD: usize = 8;

pub const LIGHT_TOTAL_BYTES: usize = 128 * 1024;
pub const LIGHT_FILE_COUNT: usize = 16;

/// Aggregate characteristics of one compilation's sources, the only input
/// to strategy selection.
#[derive(Debug, Default, Clone)]
pub struct SourceMetrics {
  pub total_source_bytes: usize,
  pub file_count: usize,
  pub external_packages: BTreeSet<String>,
  pub has_dynamic_import: bool,
}

impl SourceMetrics {
  pub fn collect(modules: &HashMap<String, SourceModule>) -> Self {
    let mut metrics = Self {
      file_count: modules.len(),
      ..Default::default()
    };
    for module in modules.values() {
      metrics.total_source_bytes += module.raw.len();
      if module.kind != ModuleKind::Code {
        continue;
      }
      let references = extract_references(module);
      metrics.has_dynamic_import |= references.has_dynamic_import;
      for specifier in &references.external {
        metrics.external_packages.insert(root_package_name(specifier));
      }
    }
    metrics
  }

  fn beyond_base_runtime(&self) -> usize {
    self
      .external_packages
      .iter()
      .filter(|name| !BASE_RUNTIME_PACKAGES.contains(&name.as_str()))
      .count()
  }
}

/// Picks the execution environment for a compilation. Pure: re-evaluated on
/// every source change by the orchestrator, never by UI reactivity, and a
/// switch never touches already-resolved package bindings. First match wins.
pub fn select_strategy(metrics: &SourceMetrics) -> Strategy {
  if metrics.has_dynamic_import
    || (metrics.external_packages.len() > REMOTE_EXTERNAL_THRESHOLD
      && metrics.beyond_base_runtime() > 0)
  {
    return Strategy::RemoteBuild;
  }
  if metrics.beyond_base_runtime() > 0
    || metrics.total_source_bytes > LIGHT_TOTAL_BYTES
    || metrics.file_count > LIGHT_FILE_COUNT
  {
    return Strategy::SandboxedRuntime;
  }
  Strategy::LocalTransform
}
