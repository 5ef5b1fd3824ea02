// Copyright 2023-2026 the Scratchpack authors. All rights reserved. MIT license.

use std::collections::HashMap;

use crate::binder::ResolvedPackage;
use crate::module::ModuleKind;
use crate::module::SourceModule;
use crate::rewrite::RewrittenModule;
use crate::text::js_string;

/// The runtime module registry embedded at the top of every bundle. Factory
/// evaluation is memoized: the first `request` invokes the factory, later
/// calls return the cached exports object. Emitted fresh per bundle, so each
/// execution starts from an empty registry.
const REGISTRY_RUNTIME: &str = r#"var __modules = (function() {
  var factories = Object.create(null);
  var cache = Object.create(null);
  return {
    register: function(id, factory) {
      factories[id] = factory;
    },
    request: function(id) {
      if (id in cache) {
        return cache[id];
      }
      var factory = factories[id];
      if (factory === undefined) {
        throw new Error('Module "' + id + '" is not registered in this bundle.');
      }
      var exports = {};
      cache[id] = exports;
      var result = factory(exports);
      if (result !== undefined) {
        cache[id] = result;
      }
      return cache[id];
    }
  };
})();
"#;

pub struct BundleInputs<'a> {
  pub modules: &'a HashMap<String, SourceModule>,
  /// Rewritten code modules, already in dependency order.
  pub rewritten: &'a [RewrittenModule],
  pub externals: &'a [ResolvedPackage],
  pub entry_id: &'a str,
}

/// Emits the final executable script. Every section is ordered by stable
/// keys so two runs over identical inputs produce byte-identical output.
pub fn assemble(inputs: &BundleInputs) -> String {
  let mut bundle = String::new();
  bundle.push_str("(function() {\n\"use strict\";\n");
  bundle.push_str(
    "var __scope = typeof globalThis !== \"undefined\" ? globalThis : typeof self !== \"undefined\" ? self : window;\n\n",
  );
  emit_styles(&mut bundle, inputs);
  bundle.push_str(REGISTRY_RUNTIME);
  bundle.push('\n');
  emit_externals(&mut bundle, inputs.externals);
  emit_modules(&mut bundle, inputs.rewritten);
  emit_trailer(&mut bundle, inputs.entry_id);
  bundle.push_str("})();\n");
  bundle
}

fn emit_styles(bundle: &mut String, inputs: &BundleInputs) {
  let mut stylesheet_ids: Vec<&str> = inputs
    .rewritten
    .iter()
    .flat_map(|module| module.stylesheets.iter().map(|s| s.as_str()))
    .collect();
  stylesheet_ids.sort_unstable();
  stylesheet_ids.dedup();
  if stylesheet_ids.is_empty() {
    return;
  }

  bundle.push_str("(function() {\n");
  bundle.push_str("  if (typeof document === \"undefined\") {\n    return;\n  }\n");
  bundle.push_str("  var ensureStyle = function(id, css) {\n");
  bundle.push_str("    var nodeId = \"__scratchpack_style_\" + id;\n");
  // re-running the same bundle must not duplicate style nodes
  bundle.push_str("    if (document.getElementById(nodeId)) {\n      return;\n    }\n");
  bundle.push_str("    var node = document.createElement(\"style\");\n");
  bundle.push_str("    node.id = nodeId;\n");
  bundle.push_str("    node.setAttribute(\"data-scratchpack-owner\", id);\n");
  bundle.push_str("    node.appendChild(document.createTextNode(css));\n");
  bundle.push_str("    document.head.appendChild(node);\n");
  bundle.push_str("  };\n");
  for id in stylesheet_ids {
    let css = inputs
      .modules
      .get(id)
      .filter(|module| module.kind == ModuleKind::Stylesheet)
      .map(|module| module.raw.as_str())
      .unwrap_or_default();
    bundle.push_str(&format!(
      "  ensureStyle({}, {});\n",
      js_string(id),
      js_string(css)
    ));
  }
  bundle.push_str("})();\n\n");
}

fn emit_externals(bundle: &mut String, externals: &[ResolvedPackage]) {
  for package in externals {
    let candidates = package
      .global
      .candidate_list()
      .iter()
      .map(|name| js_string(name))
      .collect::<Vec<_>>()
      .join(", ");
    bundle.push_str(&format!(
      "__modules.register({}, function() {{\n",
      js_string(&package.name)
    ));
    bundle.push_str(&format!("  var candidates = [{}];\n", candidates));
    bundle.push_str("  for (var i = 0; i < candidates.length; i++) {\n");
    bundle.push_str("    if (__scope[candidates[i]] !== undefined) {\n");
    bundle.push_str("      return __scope[candidates[i]];\n");
    bundle.push_str("    }\n");
    bundle.push_str("  }\n");
    bundle.push_str(&format!(
      "  throw new Error(\"Global binding for package \" + {} + \" not found (tried: \" + candidates.join(\", \") + \"); load its script before the bundle runs.\");\n",
      js_string(&package.name)
    ));
    bundle.push_str("});\n\n");
  }
}

fn emit_modules(bundle: &mut String, rewritten: &[RewrittenModule]) {
  for module in rewritten {
    bundle.push_str(&format!(
      "__modules.register({}, function(__exports) {{\n",
      js_string(&module.id)
    ));
    bundle.push_str(&module.body);
    bundle.push_str("\n});\n\n");
  }
}

fn emit_trailer(bundle: &mut String, entry_id: &str) {
  let entry = js_string(entry_id);
  bundle.push_str(&format!("var __entry = __modules.request({});\n", entry));
  bundle.push_str(
    "var __root = __entry.default !== undefined ? __entry.default : __entry;\n",
  );
  bundle.push_str("if (typeof __root !== \"function\") {\n");
  bundle.push_str(&format!(
    "  throw new Error(\"Entry module \" + {} + \" does not provide an invocable root; export a function as its default export.\");\n",
    entry
  ));
  bundle.push_str("}\n");
  bundle.push_str("if (typeof __scope.__scratchpackMount === \"function\") {\n");
  bundle.push_str("  __scope.__scratchpackMount(__root);\n");
  bundle.push_str("} else {\n");
  bundle.push_str("  __root();\n");
  bundle.push_str("}\n");
}
