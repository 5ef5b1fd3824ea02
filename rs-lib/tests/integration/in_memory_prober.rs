// Copyright 2023-2026 the Scratchpack authors. All rights reserved. MIT license.

use std::collections::HashMap;

use futures::future;
use scratchpack::ProbeFuture;
use scratchpack::UrlProber;

/// A prober over a fixed URL table. Every probed URL is recorded so tests
/// can assert on probe traffic.
#[derive(Clone, Default)]
pub struct InMemoryProber {
  urls: HashMap<String, String>,
  pub requests: Vec<String>,
}

impl InMemoryProber {
  pub fn add_url(
    &mut self,
    url: impl AsRef<str>,
    body: impl AsRef<str>,
  ) -> &mut Self {
    self
      .urls
      .insert(url.as_ref().to_string(), body.as_ref().to_string());
    self
  }
}

impl UrlProber for InMemoryProber {
  fn probe(&mut self, url: &str) -> ProbeFuture {
    self.requests.push(url.to_string());
    let result = self.urls.get(url).cloned();
    Box::pin(future::ready(Ok(result)))
  }
}
