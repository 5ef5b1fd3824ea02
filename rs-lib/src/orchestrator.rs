// Copyright 2023-2026 the Scratchpack authors. All rights reserved. MIT license.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::Result;
use futures::future::LocalBoxFuture;
use log::debug;

use crate::binder::ExternalDependencyBinder;
use crate::binder::UrlProber;
use crate::module::CompileRequest;
use crate::module::CompileResponse;
use crate::strategy::select_strategy;
use crate::strategy::SourceMetrics;
use crate::strategy::Strategy;

/// Scheduling knobs for edit-driven compiles. The first edit after an idle
/// period compiles sooner than edits inside a typing burst, and two compiles
/// never start closer together than `min_interval`.
#[derive(Debug, Clone)]
pub struct DebouncePolicy {
  pub first_delay: Duration,
  pub steady_delay: Duration,
  pub min_interval: Duration,
  pub idle_reset: Duration,
}

impl Default for DebouncePolicy {
  fn default() -> Self {
    Self {
      first_delay: Duration::from_millis(150),
      steady_delay: Duration::from_millis(500),
      min_interval: Duration::from_millis(1_000),
      idle_reset: Duration::from_secs(3),
    }
  }
}

impl DebouncePolicy {
  /// How long to wait before starting a compile for the edit that just
  /// happened. Pure in its arguments so hosts on any clock can drive it:
  /// `since_previous_edit` is the gap to the edit before this one and
  /// `since_last_compile_start` the time since a compile last began.
  pub fn delay(
    &self,
    since_previous_edit: Option<Duration>,
    since_last_compile_start: Option<Duration>,
  ) -> Duration {
    let base = match since_previous_edit {
      Some(gap) if gap < self.idle_reset => self.steady_delay,
      _ => self.first_delay,
    };
    let spacing = match since_last_compile_start {
      Some(elapsed) => self.min_interval.saturating_sub(elapsed),
      None => Duration::ZERO,
    };
    base.max(spacing)
  }
}

/// Issues monotonically increasing request ids and recognizes the latest
/// one. A response whose id is not the latest issued is stale and must be
/// dropped, which keeps an earlier slow compile from overwriting the result
/// of a later fast one.
#[derive(Debug, Default)]
pub struct RequestTracker {
  counter: u64,
  latest: Option<String>,
}

impl RequestTracker {
  pub fn issue(&mut self) -> String {
    self.counter += 1;
    let id = format!("req-{}", self.counter);
    self.latest = Some(id.clone());
    id
  }

  pub fn accept(&self, response: &CompileResponse) -> bool {
    self.latest.as_deref() == Some(response.request_id.as_str())
  }
}

pub type ExecuteFuture = LocalBoxFuture<'static, Result<CompileResponse>>;

/// One execution environment the orchestrator can dispatch to. The local
/// transform is built in; sandboxed-runtime and remote-build executors are
/// plugged in by the host.
pub trait StrategyExecutor {
  fn strategy(&self) -> Strategy;
  fn execute(&self, request: CompileRequest) -> ExecuteFuture;
}

/// Drives compiles for an edit session: re-selects the strategy on every
/// request, dispatches, and shapes every outcome into a `CompileResponse`.
/// The binder and its package cache live here so resolved bindings survive
/// strategy switches.
pub struct CompileOrchestrator {
  binder: ExternalDependencyBinder,
  policy: DebouncePolicy,
  tracker: RequestTracker,
  executors: HashMap<Strategy, Box<dyn StrategyExecutor>>,
}

impl Default for CompileOrchestrator {
  fn default() -> Self {
    Self {
      binder: ExternalDependencyBinder::default(),
      policy: DebouncePolicy::default(),
      tracker: RequestTracker::default(),
      executors: HashMap::new(),
    }
  }
}

impl CompileOrchestrator {
  pub fn with_policy(policy: DebouncePolicy) -> Self {
    Self {
      policy,
      ..Default::default()
    }
  }

  pub fn register_executor(&mut self, executor: Box<dyn StrategyExecutor>) {
    self.executors.insert(executor.strategy(), executor);
  }

  pub fn binder(&self) -> &ExternalDependencyBinder {
    &self.binder
  }

  pub fn policy(&self) -> &DebouncePolicy {
    &self.policy
  }

  pub fn issue_request_id(&mut self) -> String {
    self.tracker.issue()
  }

  /// Whether a finished compile is still the one the editor is waiting for.
  pub fn accept(&self, response: &CompileResponse) -> bool {
    self.tracker.accept(response)
  }

  /// Runs one compile request to completion. Infrastructure failures of the
  /// chosen strategy are reported verbatim; no other strategy is substituted.
  pub async fn run(
    &self,
    request: CompileRequest,
    prober: &mut dyn UrlProber,
  ) -> CompileResponse {
    let metrics = SourceMetrics::collect(&request.source_modules());
    let strategy = select_strategy(&metrics);
    debug!(
      "request {} selected {:?} ({} files, {} externals)",
      request.request_id,
      strategy,
      metrics.file_count,
      metrics.external_packages.len()
    );

    if strategy == Strategy::LocalTransform {
      let request_id = request.request_id.clone();
      return match crate::compile_bundle(&request, &self.binder, prober).await
      {
        Ok(bundle) => CompileResponse::success(request_id, strategy, bundle),
        Err(err) => {
          CompileResponse::failure(request_id, strategy, err.to_string())
        }
      };
    }

    let executor = match self.executors.get(&strategy) {
      Some(executor) => executor,
      None => {
        return CompileResponse::failure(
          request.request_id.clone(),
          strategy,
          format!("No executor is registered for the {:?} strategy.", strategy),
        );
      }
    };
    let request_id = request.request_id.clone();
    match executor.execute(request).await {
      Ok(response) => response,
      Err(err) => {
        CompileResponse::failure(request_id, strategy, format!("{:#}", err))
      }
    }
  }
}

#[cfg(test)]
mod test {
  use super::*;
  use crate::module::RequestModule;
  use futures::future;

  struct NeverResolves;

  impl UrlProber for NeverResolves {
    fn probe(&mut self, _url: &str) -> crate::binder::ProbeFuture {
      Box::pin(future::ready(Ok(None)))
    }
  }

  fn request_with(
    request_id: &str,
    files: &[(&str, &str)],
    entry: &str,
  ) -> CompileRequest {
    CompileRequest {
      request_id: request_id.to_string(),
      modules: files
        .iter()
        .map(|(name, content)| {
          (
            name.to_string(),
            RequestModule {
              content: content.to_string(),
            },
          )
        })
        .collect(),
      dependencies: Vec::new(),
      entry_module_id: entry.to_string(),
    }
  }

  #[test]
  fn first_edit_after_idle_compiles_sooner() {
    let policy = DebouncePolicy::default();
    assert_eq!(policy.delay(None, None), policy.first_delay);
    assert_eq!(
      policy.delay(Some(Duration::from_secs(10)), None),
      policy.first_delay
    );
    assert_eq!(
      policy.delay(Some(Duration::from_millis(200)), None),
      policy.steady_delay
    );
  }

  #[test]
  fn min_interval_spaces_compile_starts() {
    let policy = DebouncePolicy::default();
    let delay = policy.delay(
      Some(Duration::from_secs(10)),
      Some(Duration::from_millis(100)),
    );
    assert_eq!(delay, Duration::from_millis(900));
  }

  #[test]
  fn only_the_latest_request_is_accepted() {
    let mut tracker = RequestTracker::default();
    let first = tracker.issue();
    let second = tracker.issue();
    let stale = CompileResponse::failure(
      first,
      Strategy::LocalTransform,
      "too slow".to_string(),
    );
    let current = CompileResponse::success(
      second,
      Strategy::LocalTransform,
      String::new(),
    );
    assert!(!tracker.accept(&stale));
    assert!(tracker.accept(&current));
  }

  #[tokio::test]
  async fn local_strategy_compiles_in_process() {
    let orchestrator = CompileOrchestrator::default();
    let request = request_with(
      "req-1",
      &[("App.js", "export default function main() { return 42; }")],
      "App.js",
    );
    let response = orchestrator.run(request, &mut NeverResolves).await;
    assert!(response.success);
    assert_eq!(response.strategy_used, Strategy::LocalTransform);
    assert!(response.bundle_text.unwrap().contains("__modules.register"));
  }

  #[tokio::test]
  async fn missing_executor_is_an_infrastructure_failure() {
    let orchestrator = CompileOrchestrator::default();
    let request = request_with(
      "req-1",
      &[("App.js", "import m from './missing-at-runtime'; import('./x');")],
      "App.js",
    );
    let response = orchestrator.run(request, &mut NeverResolves).await;
    assert!(!response.success);
    assert_eq!(response.strategy_used, Strategy::RemoteBuild);
    assert!(response.error.unwrap().contains("RemoteBuild"));
  }

  #[tokio::test]
  async fn executor_errors_surface_verbatim() {
    struct FailingRemote;
    impl StrategyExecutor for FailingRemote {
      fn strategy(&self) -> Strategy {
        Strategy::RemoteBuild
      }
      fn execute(&self, _request: CompileRequest) -> ExecuteFuture {
        Box::pin(future::ready(Err(anyhow::anyhow!(
          "build service returned 503"
        ))))
      }
    }

    let mut orchestrator = CompileOrchestrator::default();
    orchestrator.register_executor(Box::new(FailingRemote));
    let request = request_with("req-1", &[("App.js", "import('./x');")], "App.js");
    let response = orchestrator.run(request, &mut NeverResolves).await;
    assert!(!response.success);
    assert_eq!(
      response.error.as_deref(),
      Some("build service returned 503")
    );
  }
}
