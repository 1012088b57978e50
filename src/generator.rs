// This module drives a complete generation run. The pipeline is strictly staged: load and
// validate every descriptor, filter, partition by surface, then for each configured surface
// group descriptors by base name (alphabetically), cluster each name into overload groups,
// plan and render its dispatch function, and assemble the surface units. Every unit of
// every surface is produced in memory before the sink sees anything, so a failure at any
// stage leaves no partial output behind. Because descriptors are sorted on load and names
// are walked in map order, permuting the input table cannot change the generated text.

//! Generation pipeline.

use std::collections::BTreeMap;

use crate::core::{DescriptorSource, GenResult, GenerationSession, GenerationStats, GeneratorConfig, UnitSink};
use crate::descriptor::{load_functions, Function};
use crate::dispatch::{plan_method, render_method};
use crate::emitter::{emit_surface, write_surfaces, GeneratedSurface, RenderedMethod};
use crate::filter::{filter_functions, partition, Surface};
use crate::overload::group_overloads;

/// Result of a successful in-memory run.
#[derive(Debug, Clone)]
pub struct Generation {
    /// Generated surfaces in configured order.
    pub surfaces: Vec<GeneratedSurface>,
    pub stats: GenerationStats,
}

impl Generation {
    pub fn surface(&self, surface: Surface) -> Option<&GeneratedSurface> {
        self.surfaces.iter().find(|s| s.surface == surface)
    }
}

/// Binding generator configured for one or more runs.
pub struct Generator {
    config: GeneratorConfig,
}

impl Generator {
    pub fn new(config: GeneratorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Generate every configured surface without writing anything.
    pub fn generate(&self, source: &dyn DescriptorSource) -> GenResult<Generation> {
        let session = GenerationSession::new(self.config.clone());

        let functions = load_functions(source)?;
        session.record_loaded(functions.len());
        let functions = filter_functions(functions, &session);
        let partitioned = partition(&functions, &session)?;

        let mut surfaces = Vec::with_capacity(self.config.surfaces.len());
        for &surface in &self.config.surfaces {
            let members = partitioned.get(&surface).map(Vec::as_slice).unwrap_or_default();
            let methods = generate_methods(surface, members, &session)?;
            log::debug!("Generated {} names for {}", methods.len(), surface);
            surfaces.push(emit_surface(surface, &methods, &self.config));
        }

        let stats = session.stats();
        log::info!("Generation finished\n{}", stats);
        Ok(Generation { surfaces, stats })
    }

    /// Generate every configured surface, then hand the units to `sink`.
    pub fn run(&self, source: &dyn DescriptorSource, sink: &mut dyn UnitSink) -> GenResult<GenerationStats> {
        let generation = self.generate(source)?;
        write_surfaces(&generation.surfaces, sink)?;
        Ok(generation.stats)
    }
}

fn generate_methods(
    surface: Surface,
    functions: &[&Function],
    session: &GenerationSession,
) -> GenResult<Vec<RenderedMethod>> {
    let mut by_name: BTreeMap<&str, Vec<&Function>> = BTreeMap::new();
    for &function in functions {
        by_name.entry(function.base_name.as_str()).or_default().push(function);
    }

    by_name
        .into_iter()
        .map(|(name, members)| {
            let groups = group_overloads(name, &members, surface, session)?;
            let plan = plan_method(name, &groups, surface, session)?;
            Ok(RenderedMethod {
                name: plan.name.clone(),
                symbol: plan.symbol.clone(),
                code: render_method(&plan),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{MemorySink, RawRecord, RecordSource};

    fn source(records: Vec<RawRecord>) -> RecordSource {
        RecordSource::new(records)
    }

    #[test]
    fn test_generates_every_configured_surface() {
        let generator = Generator::new(GeneratorConfig::default());
        let generation = generator
            .generate(&source(vec![RawRecord::new("abs(Tensor self) -> Tensor")]))
            .unwrap();

        assert_eq!(generation.surfaces.len(), 4);
        let torch = generation.surface(Surface::Torch).unwrap();
        assert!(torch.body.contains("static VALUE torch_abs("));
        let nn = generation.surface(Surface::Nn).unwrap();
        assert!(nn.body.ends_with("void add_nn_functions(Rice::Module& m) {\n}\n"));
        assert_eq!(generation.stats.records_loaded, 1);
    }

    #[test]
    fn test_surface_selection() {
        let config = GeneratorConfig {
            surfaces: vec![Surface::Tensor],
            ..GeneratorConfig::default()
        };
        let mut sink = MemorySink::new();
        Generator::new(config)
            .run(
                &source(vec![RawRecord::new("neg(Tensor self) -> Tensor").with_variants("function, method")]),
                &mut sink,
            )
            .unwrap();

        let names: Vec<&str> = sink.units.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["tensor_functions.cpp", "tensor_functions.h"]);
    }

    #[test]
    fn test_names_are_emitted_alphabetically() {
        let generator = Generator::new(GeneratorConfig::default());
        let generation = generator
            .generate(&source(vec![
                RawRecord::new("neg(Tensor self) -> Tensor"),
                RawRecord::new("abs(Tensor self) -> Tensor"),
            ]))
            .unwrap();

        let body = &generation.surface(Surface::Torch).unwrap().body;
        let abs = body.find("// abs\n").unwrap();
        let neg = body.find("// neg\n").unwrap();
        assert!(abs < neg);
    }

    #[test]
    fn test_failure_writes_nothing() {
        let mut sink = MemorySink::new();
        let err = Generator::new(GeneratorConfig::default())
            .run(
                &source(vec![
                    RawRecord::new("abs(Tensor self) -> Tensor"),
                    RawRecord::new("zeta(Tensor self, Quaternion q) -> Tensor"),
                ]),
                &mut sink,
            )
            .unwrap_err();

        assert_eq!(err.to_string(), "Unknown type: Quaternion (zeta)");
        assert!(sink.units.is_empty());
    }
}
