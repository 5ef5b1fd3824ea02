// Copyright 2023-2026 the Scratchpack authors. All rights reserved. MIT license.

use thiserror::Error;

/// A problem found while resolving the dependency graph. These are collected
/// rather than short-circuited so one compile reports every reachable issue.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
  #[error("Circular dependency between \"{from}\" and \"{to}\".")]
  Cycle { from: String, to: String },
  #[error("Module \"{specifier}\" imported by \"{referrer}\" was not found.")]
  MissingModule { referrer: String, specifier: String },
  #[error("Files \"{first}\" and \"{second}\" both normalize to module id \"{id}\".")]
  IdCollision {
    id: String,
    first: String,
    second: String,
  },
  #[error("Entry module \"{0}\" was not found.")]
  MissingEntry(String),
}

/// A problem found while rewriting a single module's linkage.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RewriteError {
  #[error("Module not found: \"{specifier}\" imported by \"{referrer}\".")]
  ModuleNotFound { referrer: String, specifier: String },
}

/// A syntax-lowering failure reported by the pluggable lowering engine.
/// Aborts the whole compilation; later modules cannot be safely rewritten
/// once one module failed to lower.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Failed lowering \"{module_id}\": {message}")]
pub struct TransformError {
  pub module_id: String,
  pub message: String,
}

#[derive(Debug, Error)]
pub enum CompileError {
  #[error("{}", join_errors(.0))]
  Graph(Vec<GraphError>),
  #[error(transparent)]
  Rewrite(#[from] RewriteError),
  #[error(transparent)]
  Transform(#[from] TransformError),
  /// A strategy's infrastructure (remote build service, sandbox bridge,
  /// CDN prober) failed. Surfaced verbatim, never substituted with another
  /// strategy.
  #[error("{0}")]
  Infrastructure(String),
}

fn join_errors(errors: &[GraphError]) -> String {
  errors
    .iter()
    .map(|e| e.to_string())
    .collect::<Vec<_>>()
    .join("\n")
}
