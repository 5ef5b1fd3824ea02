// Copyright 2023-2026 the Scratchpack authors. All rights reserved. MIT license.

use std::collections::HashMap;

use scratchpack::compile_bundle;
use scratchpack::CompileError;
use scratchpack::CompileRequest;
use scratchpack::ExternalDependencyBinder;
use scratchpack::RequestDependency;
use scratchpack::RequestModule;

use super::InMemoryProber;

pub struct TestBuilder {
  prober: InMemoryProber,
  files: HashMap<String, String>,
  dependencies: Vec<RequestDependency>,
  entry_point: String,
}

impl TestBuilder {
  pub fn new() -> Self {
    Self {
      prober: InMemoryProber::default(),
      files: HashMap::new(),
      dependencies: Vec::new(),
      entry_point: "App.js".to_string(),
    }
  }

  pub fn with_prober(
    &mut self,
    mut action: impl FnMut(&mut InMemoryProber),
  ) -> &mut Self {
    action(&mut self.prober);
    self
  }

  pub fn add_file(
    &mut self,
    file_name: impl AsRef<str>,
    content: impl AsRef<str>,
  ) -> &mut Self {
    self
      .files
      .insert(file_name.as_ref().to_string(), content.as_ref().to_string());
    self
  }

  pub fn entry_point(&mut self, value: impl AsRef<str>) -> &mut Self {
    self.entry_point = value.as_ref().to_string();
    self
  }

  pub fn dependency(
    &mut self,
    name: impl AsRef<str>,
    version: impl AsRef<str>,
  ) -> &mut Self {
    self.dependencies.push(RequestDependency {
      name: name.as_ref().to_string(),
      version: version.as_ref().to_string(),
      cdn_url: None,
    });
    self
  }

  pub fn request(&self) -> CompileRequest {
    CompileRequest {
      request_id: "req-1".to_string(),
      modules: self
        .files
        .iter()
        .map(|(name, content)| {
          (
            name.clone(),
            RequestModule {
              content: content.clone(),
            },
          )
        })
        .collect(),
      dependencies: self.dependencies.clone(),
      entry_module_id: self.entry_point.clone(),
    }
  }

  pub async fn compile(&mut self) -> Result<String, CompileError> {
    let binder = ExternalDependencyBinder::default();
    let request = self.request();
    compile_bundle(&request, &binder, &mut self.prober).await
  }

  pub fn probed_urls(&self) -> &[String] {
    &self.prober.requests
  }
}
