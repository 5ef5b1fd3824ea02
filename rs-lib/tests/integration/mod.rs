// Copyright 2023-2026 the Scratchpack authors. All rights reserved. MIT license.

mod in_memory_prober;
mod test_builder;

pub use in_memory_prober::InMemoryProber;
pub use test_builder::TestBuilder;
