use anyhow::Result;
use dashmap::DashMap;
use rayon::prelude::*;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use super::scanner::{FileScanner, RepositoryInfo};
use super::{FlowReport, UnitFacts, UnitOrigin};
use crate::bytecode::{BytecodePublisherExtractor, JsonModuleReader, ModuleDef, ModuleReader, ModuleSet};
use crate::config::{AnalysisOptions, IndicatorSets};
use crate::error::ExtractError;
use crate::extractors::{ExtractorSet, SourceUnit};

/// A unit that contributed no facts because it could not be read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitFailure {
    pub path: PathBuf,
    pub reason: String,
}

impl UnitFailure {
    fn new(path: &Path, error: &ExtractError) -> Self {
        Self {
            path: path.to_path_buf(),
            reason: error.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
    pub report: FlowReport,
    pub failures: Vec<UnitFailure>,
}

/// Runs discovery, per-unit extraction and merging for a whole input root.
///
/// Every unit is scanned with its own state, in parallel. Partial results are
/// collected per unit path and merged into one report, sorted once at the end.
pub struct FlowAnalyzer {
    options: AnalysisOptions,
    file_scanner: FileScanner,
    extractors: ExtractorSet,
    bytecode: BytecodePublisherExtractor,
    module_reader: Box<dyn ModuleReader + Send + Sync>,
}

impl FlowAnalyzer {
    pub fn new(indicators: IndicatorSets, options: AnalysisOptions) -> Result<Self> {
        indicators.validate()?;
        let indicators = Arc::new(indicators);
        let extractors = ExtractorSet::new(Arc::clone(&indicators), &options)?;
        debug!(extractors = ?extractors.names(), "source extractors ready");
        Ok(Self {
            file_scanner: FileScanner::new(Arc::clone(&indicators), options.exclude_tests),
            bytecode: BytecodePublisherExtractor::new(indicators),
            module_reader: Box::new(JsonModuleReader::new()),
            extractors,
            options,
        })
    }

    /// Swap the bytecode-reading collaborator.
    pub fn with_module_reader(mut self, reader: Box<dyn ModuleReader + Send + Sync>) -> Self {
        self.module_reader = reader;
        self
    }

    pub fn analyze(&self, root: &Path) -> Result<AnalysisOutcome> {
        info!(root = %root.display(), "discovering repositories");
        let repositories = self.file_scanner.discover_repositories(root)?;
        info!(count = repositories.len(), "repositories found");

        let collected: DashMap<PathBuf, UnitFacts> = DashMap::new();
        let failures: DashMap<PathBuf, UnitFailure> = DashMap::new();
        let mut projects: HashSet<(String, String)> = HashSet::new();

        for repository in &repositories {
            let units = self.file_scanner.scan_sources(repository);
            info!(repository = %repository.name, units = units.len(), "scanning source units");
            projects.extend(
                units
                    .iter()
                    .map(|u| (u.repository.clone(), u.project.clone())),
            );

            units.par_iter().for_each(|origin| match self.scan_source(origin) {
                Ok(facts) => {
                    debug!(
                        unit = %origin.path.display(),
                        events = facts.events.len(),
                        publishers = facts.publishers.len(),
                        consumers = facts.consumers.len(),
                        subscriptions = facts.subscriptions.len(),
                        "unit scanned"
                    );
                    merge_into(&collected, &origin.path, facts);
                }
                Err(err) => {
                    debug!(unit = %origin.path.display(), error = %err, "unreadable unit");
                    failures.insert(origin.path.clone(), UnitFailure::new(&origin.path, &err));
                }
            });

            if self.options.bytecode_publishers {
                self.scan_modules(repository, &collected, &failures, &mut projects);
            }
        }

        let mut report = FlowReport::from_partials(
            repositories.len(),
            collected.into_iter().map(|(_, facts)| facts),
        );
        report.project_count = projects.len();

        if self.options.background_jobs_only {
            report.retain_background_jobs();
        }

        let mut failures: Vec<UnitFailure> = failures.into_iter().map(|(_, f)| f).collect();
        failures.sort_by(|a, b| a.path.cmp(&b.path));

        info!(
            events = report.events.len(),
            publishers = report.publishers.len(),
            consumers = report.consumers.len(),
            subscriptions = report.subscriptions.len(),
            failed_units = failures.len(),
            "analysis complete"
        );

        Ok(AnalysisOutcome { report, failures })
    }

    /// Run every source extractor over one in-memory unit.
    pub fn extract_unit(&self, unit: &SourceUnit) -> UnitFacts {
        self.extractors.extract(unit)
    }

    fn scan_source(&self, origin: &UnitOrigin) -> Result<UnitFacts, ExtractError> {
        let unit = SourceUnit::read(origin.clone())?;
        Ok(self.extract_unit(&unit))
    }

    /// Load every module of a repository first so type references across its
    /// assemblies resolve, then trace publish sites module by module.
    fn scan_modules(
        &self,
        repository: &RepositoryInfo,
        collected: &DashMap<PathBuf, UnitFacts>,
        failures: &DashMap<PathBuf, UnitFailure>,
        projects: &mut HashSet<(String, String)>,
    ) {
        let units = self.file_scanner.scan_modules(repository);
        info!(repository = %repository.name, modules = units.len(), "scanning compiled modules");

        let loaded: Vec<(UnitOrigin, ModuleDef)> = units
            .par_iter()
            .filter_map(|origin| match self.module_reader.read(&origin.path) {
                Ok(module) => Some((origin.clone(), module)),
                Err(err) => {
                    debug!(unit = %origin.path.display(), error = %err, "unreadable module");
                    failures.insert(origin.path.clone(), UnitFailure::new(&origin.path, &err));
                    None
                }
            })
            .collect();

        let (origins, modules): (Vec<UnitOrigin>, Vec<ModuleDef>) = loaded.into_iter().unzip();
        let module_set = ModuleSet::new(modules);
        debug!(types = module_set.type_count(), "type graph built");

        origins
            .par_iter()
            .zip(module_set.modules().par_iter())
            .for_each(|(origin, module)| {
                let publishers = self.bytecode.extract_module(module, &module_set, origin);
                debug!(unit = %origin.path.display(), publishers = publishers.len(), "module scanned");
                merge_into(
                    collected,
                    &origin.path,
                    UnitFacts {
                        publishers,
                        ..UnitFacts::default()
                    },
                );
            });

        projects.extend(
            origins
                .iter()
                .map(|o| (o.repository.clone(), o.project.clone())),
        );
    }
}

fn merge_into(collected: &DashMap<PathBuf, UnitFacts>, path: &Path, facts: UnitFacts) {
    collected.entry(path.to_path_buf()).or_default().absorb(facts);
}
