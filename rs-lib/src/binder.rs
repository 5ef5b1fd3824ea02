// Copyright 2023-2026 the Scratchpack authors. All rights reserved. MIT license.

use std::collections::HashMap;

use anyhow::Result;
use futures::future::LocalBoxFuture;
use log::debug;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use url::Url;

use crate::text;

pub const DEFAULT_CDN_HOST: &str = "https://unpkg.com";

/// Distribution paths for packages whose layout is known ahead of time.
/// Consulted before any probing; an entry here is authoritative.
static KNOWN_CDN_PATHS: Lazy<HashMap<&'static str, &'static str>> =
  Lazy::new(|| {
    HashMap::from([
      ("axios", "dist/axios.min.js"),
      ("d3", "dist/d3.min.js"),
      ("jquery", "dist/jquery.min.js"),
      ("lodash", "lodash.min.js"),
      ("moment", "min/moment.min.js"),
      ("react", "umd/react.production.min.js"),
      ("react-dom", "umd/react-dom.production.min.js"),
      ("redux", "dist/redux.min.js"),
      ("rxjs", "dist/bundles/rxjs.umd.min.js"),
      ("three", "build/three.min.js"),
      ("vue", "dist/vue.global.prod.js"),
    ])
  });

/// Host global names for packages whose UMD binding is known ahead of time.
static KNOWN_GLOBALS: Lazy<HashMap<&'static str, &'static str>> =
  Lazy::new(|| {
    HashMap::from([
      ("axios", "axios"),
      ("d3", "d3"),
      ("jquery", "jQuery"),
      ("lodash", "_"),
      ("moment", "moment"),
      ("react", "React"),
      ("react-dom", "ReactDOM"),
      ("redux", "Redux"),
      ("rxjs", "rxjs"),
      ("three", "THREE"),
      ("vue", "Vue"),
    ])
  });

/// Conventional distribution paths probed in order when a package has no
/// known entry. `{name}` is the unscoped package name.
const PROBE_PATH_TEMPLATES: &[&str] = &[
  "{name}.min.js",
  "dist/{name}.min.js",
  "dist/umd/{name}.min.js",
  "umd/{name}.min.js",
  "dist/{name}.js",
  "index.js",
];

/// Candidate global-name generation rules, tried in order against the host
/// global object at bundle execution time.
const GLOBAL_NAME_RULES: &[fn(&str) -> String] = &[
  |name| name.to_string(),
  text::capitalize_first,
  |name| name.to_uppercase(),
  text::camel_case_from_hyphens,
  text::pascal_case_from_hyphens,
  text::strip_punctuation,
  |name| text::strip_punctuation(name).to_uppercase(),
];

/// How a package's API is reachable on the host global object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GlobalBinding {
  /// Authoritative name from the known-mapping table.
  Known(String),
  /// Convention-derived guesses; the bundle tries each at execution time
  /// and raises an error naming all of them when none is present.
  Candidates(Vec<String>),
}

impl GlobalBinding {
  pub fn candidate_list(&self) -> &[String] {
    match self {
      GlobalBinding::Known(name) => std::slice::from_ref(name),
      GlobalBinding::Candidates(names) => names,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPackage {
  pub name: String,
  pub version: String,
  pub url: String,
  pub global: GlobalBinding,
}

pub type ProbeFuture = LocalBoxFuture<'static, Result<Option<String>>>;

/// Checks whether a distribution file exists on the CDN. Implementations
/// return the leading bytes of the body when the URL loads and `None` when
/// it does not.
pub trait UrlProber {
  fn probe(&mut self, url: &str) -> ProbeFuture;
}

/// Resolves package name+version pairs to a CDN URL and a host global name.
/// Results are cached for the edit session; resolving a new version of a
/// name evicts that name's older entries.
#[derive(Debug)]
pub struct ExternalDependencyBinder {
  cdn_host: Url,
  cache: Mutex<HashMap<(String, String), ResolvedPackage>>,
}

impl Default for ExternalDependencyBinder {
  fn default() -> Self {
    Self {
      cdn_host: Url::parse(DEFAULT_CDN_HOST).unwrap(),
      cache: Mutex::new(HashMap::new()),
    }
  }
}

impl ExternalDependencyBinder {
  pub fn with_cdn_host(cdn_host: &str) -> Result<Self> {
    Ok(Self {
      cdn_host: Url::parse(cdn_host)?,
      cache: Mutex::new(HashMap::new()),
    })
  }

  pub async fn resolve(
    &self,
    name: &str,
    version: &str,
    prober: &mut dyn UrlProber,
  ) -> Result<ResolvedPackage> {
    let key = (name.to_string(), version.to_string());
    if let Some(hit) = self.cache.lock().get(&key) {
      return Ok(hit.clone());
    }

    let url = self.resolve_url(name, version, prober).await?;
    let resolved = ResolvedPackage {
      name: name.to_string(),
      version: version.to_string(),
      url,
      global: resolve_global(name),
    };
    let mut cache = self.cache.lock();
    cache.retain(|(cached_name, _), _| cached_name != name);
    cache.insert(key, resolved.clone());
    Ok(resolved)
  }

  pub fn cached_count(&self) -> usize {
    self.cache.lock().len()
  }

  async fn resolve_url(
    &self,
    name: &str,
    version: &str,
    prober: &mut dyn UrlProber,
  ) -> Result<String> {
    if let Some(path) = KNOWN_CDN_PATHS.get(name) {
      return Ok(self.package_url(name, version, path));
    }

    let file_name = unscoped_name(name);
    for template in PROBE_PATH_TEMPLATES {
      let path = template.replace("{name}", file_name);
      let url = self.package_url(name, version, &path);
      match prober.probe(&url).await {
        Ok(Some(body)) if text::looks_like_script(&body) => {
          debug!("resolved {}@{} to {}", name, version, url);
          return Ok(url);
        }
        Ok(_) => {}
        Err(err) => {
          debug!("probe failed for {}: {:#}", url, err);
        }
      }
    }

    // Best guess when every probe misses; the binding fails loudly at
    // bundle execution time if it is wrong.
    let fallback = PROBE_PATH_TEMPLATES[0].replace("{name}", file_name);
    Ok(self.package_url(name, version, &fallback))
  }

  fn package_url(&self, name: &str, version: &str, path: &str) -> String {
    format!("{}{}@{}/{}", self.cdn_host, name, version, path)
  }
}

/// The host global name for a package: the known table first, otherwise the
/// ordered candidate list derived from naming conventions.
pub fn resolve_global(name: &str) -> GlobalBinding {
  if let Some(global) = KNOWN_GLOBALS.get(name) {
    return GlobalBinding::Known(global.to_string());
  }
  let base = unscoped_name(name);
  let mut candidates = Vec::new();
  for rule in GLOBAL_NAME_RULES {
    let candidate = rule(base);
    if !candidate.is_empty() && !candidates.contains(&candidate) {
      candidates.push(candidate);
    }
  }
  GlobalBinding::Candidates(candidates)
}

fn unscoped_name(name: &str) -> &str {
  match name.rsplit_once('/') {
    Some((_, tail)) => tail,
    None => name,
  }
}

/// A `reqwest`-backed prober for native hosts. The wasm build supplies a
/// JS-callback prober instead.
#[cfg(feature = "http")]
#[derive(Debug, Default)]
pub struct HttpProber {
  client: reqwest::Client,
}

#[cfg(feature = "http")]
impl UrlProber for HttpProber {
  fn probe(&mut self, url: &str) -> ProbeFuture {
    let client = self.client.clone();
    let url = url.to_string();
    Box::pin(async move {
      let response = client.get(&url).send().await?;
      if !response.status().is_success() {
        return Ok(None);
      }
      let body = response.text().await?;
      Ok(Some(body.chars().take(512).collect()))
    })
  }
}

#[cfg(test)]
mod test {
  use super::*;
  use futures::future;

  struct TableProber {
    responses: HashMap<String, String>,
    requests: Vec<String>,
  }

  impl TableProber {
    fn new(entries: &[(&str, &str)]) -> Self {
      Self {
        responses: entries
          .iter()
          .map(|(url, body)| (url.to_string(), body.to_string()))
          .collect(),
        requests: Vec::new(),
      }
    }
  }

  impl UrlProber for TableProber {
    fn probe(&mut self, url: &str) -> ProbeFuture {
      self.requests.push(url.to_string());
      let result = self.responses.get(url).cloned();
      Box::pin(future::ready(Ok(result)))
    }
  }

  #[tokio::test]
  async fn known_path_skips_probing() {
    let binder = ExternalDependencyBinder::default();
    let mut prober = TableProber::new(&[]);
    let resolved = binder
      .resolve("lodash", "4.17.21", &mut prober)
      .await
      .unwrap();
    assert_eq!(
      resolved.url,
      "https://unpkg.com/lodash@4.17.21/lodash.min.js"
    );
    assert_eq!(resolved.global, GlobalBinding::Known("_".to_string()));
    assert!(prober.requests.is_empty());
  }

  #[tokio::test]
  async fn probes_paths_in_order_and_skips_error_pages() {
    let binder = ExternalDependencyBinder::default();
    let mut prober = TableProber::new(&[
      (
        "https://unpkg.com/my-lib@1.0.0/my-lib.min.js",
        "<!DOCTYPE html><html>Not Found</html>",
      ),
      (
        "https://unpkg.com/my-lib@1.0.0/dist/my-lib.min.js",
        "!function(){}();",
      ),
    ]);
    let resolved = binder.resolve("my-lib", "1.0.0", &mut prober).await.unwrap();
    assert_eq!(
      resolved.url,
      "https://unpkg.com/my-lib@1.0.0/dist/my-lib.min.js"
    );
    assert_eq!(prober.requests.len(), 2);
  }

  #[tokio::test]
  async fn falls_back_to_best_guess() {
    let binder = ExternalDependencyBinder::default();
    let mut prober = TableProber::new(&[]);
    let resolved = binder.resolve("my-lib", "1.0.0", &mut prober).await.unwrap();
    assert_eq!(
      resolved.url,
      "https://unpkg.com/my-lib@1.0.0/my-lib.min.js"
    );
    assert_eq!(prober.requests.len(), PROBE_PATH_TEMPLATES.len());
  }

  #[tokio::test]
  async fn caches_per_name_and_version() {
    let binder = ExternalDependencyBinder::default();
    let mut prober = TableProber::new(&[(
      "https://unpkg.com/my-lib@1.0.0/my-lib.min.js",
      "var myLib = {};",
    )]);
    binder.resolve("my-lib", "1.0.0", &mut prober).await.unwrap();
    let probes_after_first = prober.requests.len();
    binder.resolve("my-lib", "1.0.0", &mut prober).await.unwrap();
    assert_eq!(prober.requests.len(), probes_after_first);
  }

  #[tokio::test]
  async fn version_change_invalidates_cache_entry() {
    let binder = ExternalDependencyBinder::default();
    let mut prober = TableProber::new(&[]);
    binder.resolve("my-lib", "1.0.0", &mut prober).await.unwrap();
    binder.resolve("my-lib", "2.0.0", &mut prober).await.unwrap();
    assert_eq!(binder.cached_count(), 1);
  }

  #[test]
  fn candidate_rules_in_order() {
    let binding = resolve_global("socket.io-client");
    let candidates = binding.candidate_list();
    assert_eq!(
      candidates,
      &[
        "socket.io-client".to_string(),
        "Socket.io-client".to_string(),
        "SOCKET.IO-CLIENT".to_string(),
        "socket.ioClient".to_string(),
        "Socket.ioClient".to_string(),
        "socketioclient".to_string(),
        "SOCKETIOCLIENT".to_string(),
      ]
    );
  }

  #[test]
  fn scoped_packages_use_unscoped_tail() {
    let binding = resolve_global("@angular/core");
    assert!(binding
      .candidate_list()
      .contains(&"Core".to_string()));
  }
}
