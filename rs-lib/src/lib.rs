// Copyright 2023-2026 the Scratchpack authors. All rights reserved. MIT license.

use std::collections::HashSet;

use log::debug;

mod assemble;
mod binder;
mod error;
mod graph;
mod module;
mod orchestrator;
mod rewrite;
mod strategy;
mod text;

pub use crate::assemble::assemble;
pub use crate::assemble::BundleInputs;
pub use crate::binder::resolve_global;
pub use crate::binder::ExternalDependencyBinder;
pub use crate::binder::GlobalBinding;
pub use crate::binder::ProbeFuture;
pub use crate::binder::ResolvedPackage;
pub use crate::binder::UrlProber;
pub use crate::binder::DEFAULT_CDN_HOST;
pub use crate::error::CompileError;
pub use crate::error::GraphError;
pub use crate::error::RewriteError;
pub use crate::error::TransformError;
pub use crate::graph::resolve_graph;
pub use crate::graph::GraphOutput;
pub use crate::graph::ModuleReferences;
pub use crate::module::CompileRequest;
pub use crate::module::CompileResponse;
pub use crate::module::RequestDependency;
pub use crate::module::RequestModule;
pub use crate::module::SourceModule;
pub use crate::orchestrator::CompileOrchestrator;
pub use crate::orchestrator::DebouncePolicy;
pub use crate::orchestrator::ExecuteFuture;
pub use crate::orchestrator::RequestTracker;
pub use crate::orchestrator::StrategyExecutor;
pub use crate::rewrite::rewrite_module;
pub use crate::rewrite::IdentityLowering;
pub use crate::rewrite::RewrittenModule;
pub use crate::rewrite::SyntaxLowering;
pub use crate::strategy::select_strategy;
pub use crate::strategy::SourceMetrics;
pub use crate::strategy::Strategy;

#[cfg(feature = "http")]
pub use crate::binder::HttpProber;

/// Compiles one request in-process and shapes the outcome into the wire
/// response. Convenience over [`compile_bundle`] for hosts that do not run
/// a full orchestrator.
pub async fn compile(
  request: &CompileRequest,
  binder: &ExternalDependencyBinder,
  prober: &mut dyn UrlProber,
) -> CompileResponse {
  match compile_bundle(request, binder, prober).await {
    Ok(bundle) => CompileResponse::success(
      request.request_id.clone(),
      Strategy::LocalTransform,
      bundle,
    ),
    Err(err) => CompileResponse::failure(
      request.request_id.clone(),
      Strategy::LocalTransform,
      err.to_string(),
    ),
  }
}

/// Compiles one request into a single executable script with sources passed
/// through as-is.
pub async fn compile_bundle(
  request: &CompileRequest,
  binder: &ExternalDependencyBinder,
  prober: &mut dyn UrlProber,
) -> Result<String, CompileError> {
  compile_bundle_with(request, binder, prober, &IdentityLowering).await
}

/// Compiles one request into a single executable script, lowering each code
/// module through `lowering` before its linkage is rewritten.
pub async fn compile_bundle_with(
  request: &CompileRequest,
  binder: &ExternalDependencyBinder,
  prober: &mut dyn UrlProber,
  lowering: &dyn SyntaxLowering,
) -> Result<String, CompileError> {
  let collisions = request.id_collisions();
  if !collisions.is_empty() {
    return Err(CompileError::Graph(collisions));
  }
  let modules = request.source_modules();
  let entry_id = request.entry_id();

  let graph = graph::resolve_graph(&modules, &entry_id);
  if !graph.errors.is_empty() {
    return Err(CompileError::Graph(graph.errors));
  }
  debug!("resolved {} modules from \"{}\"", graph.order.len(), entry_id);

  let external_names: HashSet<String> = request
    .dependencies
    .iter()
    .map(|dependency| dependency.name.clone())
    .collect();

  let mut externals = Vec::with_capacity(request.dependencies.len());
  for dependency in &request.dependencies {
    let resolved = match &dependency.cdn_url {
      Some(url) => ResolvedPackage {
        name: dependency.name.clone(),
        version: dependency.version.clone(),
        url: url.clone(),
        global: resolve_global(&dependency.name),
      },
      None => binder
        .resolve(&dependency.name, &dependency.version, prober)
        .await
        .map_err(|err| CompileError::Infrastructure(format!("{:#}", err)))?,
    };
    externals.push(resolved);
  }

  let mut rewritten = Vec::with_capacity(graph.order.len());
  for id in &graph.order {
    rewritten.push(rewrite::rewrite_module(
      &modules[id.as_str()],
      &modules,
      &external_names,
      lowering,
    )?);
  }

  Ok(assemble::assemble(&BundleInputs {
    modules: &modules,
    rewritten: &rewritten,
    externals: &externals,
    entry_id: &entry_id,
  }))
}
