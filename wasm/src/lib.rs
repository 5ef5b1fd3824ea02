// Copyright 2023-2026 the Scratchpack authors. All rights reserved. MIT license.

use std::rc::Rc;

use anyhow::anyhow;
use scratchpack::CompileRequest;
use scratchpack::ExternalDependencyBinder;
use scratchpack::ProbeFuture;
use scratchpack::UrlProber;
use wasm_bindgen::prelude::*;

thread_local! {
  /// One binder per wasm instance so resolved package bindings survive
  /// across compiles for the whole edit session.
  static SESSION_BINDER: Rc<ExternalDependencyBinder> =
    Rc::new(ExternalDependencyBinder::default());
}

/// A prober backed by a JS callback. The callback receives a URL and returns
/// a promise resolving to the leading bytes of the body, or to `null` when
/// the URL does not load.
struct JsProber {
  probe: js_sys::Function,
}

impl JsProber {
  pub fn new(probe: js_sys::Function) -> Self {
    Self { probe }
  }
}

impl UrlProber for JsProber {
  fn probe(&mut self, url: &str) -> ProbeFuture {
    let this = JsValue::null();
    let arg0 = JsValue::from(url.to_string());
    let result = self.probe.call1(&this, &arg0);
    let f = async move {
      let response = match result {
        Ok(result) => {
          wasm_bindgen_futures::JsFuture::from(js_sys::Promise::resolve(
            &result,
          ))
          .await
        }
        Err(err) => Err(err),
      };

      response
        .map_err(|err| anyhow!("probe rejected or errored: {:#?}", err))
        .and_then(|value| {
          serde_wasm_bindgen::from_value(value)
            .map_err(|err| anyhow!("unexpected probe result: {}", err))
        })
    };
    Box::pin(f)
  }
}

#[wasm_bindgen]
pub async fn compile(
  request: JsValue,
  probe: js_sys::Function,
) -> Result<JsValue, JsValue> {
  console_error_panic_hook::set_once();
  let request: CompileRequest = serde_wasm_bindgen::from_value(request)
    .map_err(|err| JsValue::from(js_sys::Error::new(&err.to_string())))?;
  let binder = SESSION_BINDER.with(|binder| binder.clone());
  let mut prober = JsProber::new(probe);
  let response = scratchpack::compile(&request, &binder, &mut prober).await;
  serde_wasm_bindgen::to_value(&response)
    .map_err(|err| JsValue::from(js_sys::Error::new(&err.to_string())))
}
