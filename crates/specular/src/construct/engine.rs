//! Construction traversal and constructor rounds

use super::constructor::{FieldSet, Interrupt};
use super::context::Context;
use super::{Artifacts, Constructions};
use crate::compile::predicate_key;
use crate::error::{Error, What};
use crate::node::Node;
use crate::path::{is_reserved, key_to_path, Path, PREDICATES};
use crate::settings::Settings;
use crate::spec::Spec;
use crate::walk::Walk;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, trace, warn};

static NO_OUTPUTS: BTreeMap<Path, Value> = BTreeMap::new();

/// Failure of a construction run
#[derive(Debug, thiserror::Error)]
pub enum ConstructError {
    /// Constructors failed; `construction-failed` wraps the collected errors
    #[error(transparent)]
    Failed(#[from] Error),
    /// Constructors kept deferring without progress
    #[error("'{loc}'/{predicate:?}: constructor deadlock {deferred:?} in construction {construction:?}")]
    Deadlock {
        /// Node location
        loc: Path,
        /// Construction being run
        construction: String,
        /// Last predicate attempted
        predicate: String,
        /// Predicates still deferred
        deferred: Vec<String>,
    },
}

/// Overrides for a construction run
#[derive(Debug, Clone, Default)]
pub struct ConstructOptions {
    /// Constructions to run, default every construction
    pub constructibles: Option<Vec<String>>,
    /// Settings, default extracted from the spec
    pub settings: Option<Settings>,
    /// Constructor tables, default the domain's
    pub constructions: Option<Constructions>,
}

impl ConstructOptions {
    /// Default options
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Run only these constructions, in this order
    #[must_use]
    pub fn with_constructibles<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.constructibles = Some(names.into_iter().map(Into::into).collect());
        self
    }

    /// With explicit settings
    #[must_use]
    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = Some(settings);
        self
    }

    /// With explicit constructor tables
    #[must_use]
    pub fn with_constructions(mut self, constructions: Constructions) -> Self {
        self.constructions = Some(constructions);
        self
    }
}

struct Run<'r> {
    top: &'r Node,
    constructions: &'r Constructions,
    constructibles: &'r [String],
    schemata: &'r Node,
    max_rounds: usize,
}

pub(crate) fn construct_tree(
    spec: &Spec,
    artifacts: &mut Artifacts,
    options: &ConstructOptions,
    errs: Option<&mut Vec<Error>>,
) -> Result<(), ConstructError> {
    let domain = spec.domain();
    let registered;
    let constructions = match &options.constructions {
        Some(constructions) => constructions,
        None => {
            registered = domain.constructions();
            &registered
        }
    };

    let constructibles: Vec<String> = match &options.constructibles {
        Some(names) => names.clone(),
        None => constructions.keys().cloned().collect(),
    };
    if let Some(missing) = constructibles
        .iter()
        .find(|name| !constructions.contains_key(name.as_str()))
    {
        return Err(Error::not_found(format!("no construction named {missing:?}"))
            .with_data("construction", missing.as_str())
            .into());
    }

    let extracted;
    let settings = match &options.settings {
        Some(settings) => settings,
        None => {
            extracted = spec.extract_settings();
            &extracted
        }
    };

    let schemata = domain.schemata();
    let run = Run {
        top: spec.root(),
        constructions,
        constructibles: &constructibles,
        schemata: &schemata,
        max_rounds: domain.config().max_construct_rounds,
    };

    let mut own = Vec::new();
    let sink = errs.unwrap_or(&mut own);
    run.visit(spec.root(), &Path::root(), settings, artifacts, sink)?;

    if !own.is_empty() {
        debug!(errors = own.len(), "construction failed");
        return Err(Error::aggregate(What::ConstructionFailed, own)
            .with_message("construction failed")
            .into());
    }
    Ok(())
}

impl Run<'_> {
    // Post-order: predicates, then regular children, then the node itself.
    // Templates are never constructed.
    fn visit(
        &self,
        node: &Node,
        loc: &Path,
        settings: &Settings,
        artifacts: &mut Artifacts,
        errs: &mut Vec<Error>,
    ) -> Result<(), ConstructError> {
        if let Some(predicates) = node.predicates() {
            self.visit(predicates, &loc.child(PREDICATES), settings, artifacts, errs)?;
        }

        for (key, child) in node.nodes() {
            if is_reserved(key) || child.is_any() {
                continue;
            }
            let child_loc = loc.child(key.as_str());
            self.visit(child, &child_loc, settings.section(key), artifacts, errs)?;
        }

        if errs.is_empty() {
            for construction in self.constructibles {
                self.call_constructors(node, loc, construction, settings, artifacts, errs)?;
            }
        }
        Ok(())
    }

    fn call_constructors(
        &self,
        node: &Node,
        loc: &Path,
        construction: &str,
        settings: &Settings,
        artifacts: &mut Artifacts,
        errs: &mut Vec<Error>,
    ) -> Result<(), ConstructError> {
        let Some(predicates) = node.predicates() else {
            return Ok(());
        };
        let Some(constructors) = self.constructions.get(construction) else {
            return Ok(());
        };

        let dependencies: Vec<String> = Walk::postorder()
            .collect(predicates)
            .into_iter()
            .filter(|(path, _)| !path.is_empty())
            .map(|(path, _)| predicate_key(&path))
            .collect();

        artifacts.declare(construction);

        let mut constructed = BTreeSet::new();
        let mut skipped = BTreeSet::new();
        let mut working = dependencies.clone();
        let mut previous: Option<Vec<String>> = None;
        let mut round = 0;

        loop {
            let mut deferred = Vec::new();

            for predicate in &working {
                let Some(constructor) = constructors.get(predicate) else {
                    skipped.insert(predicate.clone());
                    continue;
                };
                let args = node
                    .getpath(key_to_path(predicate))
                    .map(Node::kwargs)
                    .unwrap_or_default();

                let outcome = {
                    let context = Context {
                        grants: FieldSet::all(),
                        constructor: constructor.name(),
                        spec: node,
                        loc,
                        top_spec: self.top,
                        constructions: self.constructions,
                        construction,
                        constructors,
                        value: node.value(),
                        output: artifacts.get(construction, loc),
                        artifacts: artifacts.construction(construction).unwrap_or(&NO_OUTPUTS),
                        global_artifacts: artifacts,
                        settings,
                        dependencies: &dependencies,
                        schemata: self.schemata,
                        constructed: &constructed,
                        skipped: &skipped,
                        round,
                        errs: errs.as_slice(),
                        predicate,
                        args: &args,
                    };
                    trace!(loc = %loc, construction, predicate = predicate.as_str(), round, "calling constructor");
                    constructor.call(&context)
                };

                match outcome {
                    Ok(output) => {
                        constructed.insert(predicate.clone());
                        artifacts.insert(construction, loc, output);
                    }
                    Err(Interrupt::Skip) => {
                        skipped.insert(predicate.clone());
                    }
                    Err(Interrupt::Defer) => deferred.push(predicate.clone()),
                    Err(Interrupt::Fail(err)) => {
                        debug!(loc = %loc, construction, predicate = predicate.as_str(), what = %err.what, "constructor failed");
                        errs.push(err);
                    }
                }
            }

            if deferred.is_empty() {
                break;
            }

            if previous.as_ref() == Some(&deferred) || round + 1 >= self.max_rounds {
                let predicate = working.last().cloned().unwrap_or_default();
                warn!(loc = %loc, construction, ?deferred, round, "constructor deadlock");
                return Err(ConstructError::Deadlock {
                    loc: loc.clone(),
                    construction: construction.to_string(),
                    predicate,
                    deferred,
                });
            }

            debug!(loc = %loc, construction, ?deferred, round, "constructors deferred");
            previous = Some(deferred.clone());
            working = deferred;
            round += 1;
        }

        if !skipped.is_empty() {
            artifacts.record_skipped(construction, loc.clone(), skipped);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::construct::{construct_last, Constructor};
    use crate::domain::Domain;
    use serde_json::json;

    fn looping_domain(rounds: usize) -> Domain {
        let domain = Domain::with_config(crate::SpecularConfig::new().with_max_construct_rounds(rounds));
        domain
            .compile_schemata([(".one", json!({".one": {}})), (".two", json!({".two": {}}))])
            .unwrap();
        domain
    }

    #[test]
    fn unknown_constructible_is_not_found() {
        let spec = Spec::new();
        let options = ConstructOptions::new().with_constructibles(["missing"]);
        let err = spec
            .construct_into(&mut Artifacts::new(), &options, None)
            .unwrap_err();
        match err {
            ConstructError::Failed(err) => assert_eq!(err.what, What::NotFound),
            ConstructError::Deadlock { .. } => panic!("expected not-found"),
        }
    }

    #[test]
    fn round_ceiling_reports_deadlock() {
        let domain = looping_domain(1);
        // `.one` waits on `.two`, which succeeds in round 0
        domain.register_constructor(
            "base",
            ".one",
            Constructor::with_context("one", |ctx| {
                construct_last(ctx)?;
                Ok(json!(1))
            }),
        );
        domain.register_constructor(
            "base",
            ".two",
            Constructor::with_fields("two", [], |_| Ok(json!(2))),
        );
        let spec = domain.compile_spec(&json!({".one": {}, ".two": {}})).unwrap();
        let err = spec.construct().unwrap_err();
        assert!(err.to_string().contains("deadlock"));
    }

    #[test]
    fn unmatched_predicates_are_skipped_silently() {
        let domain = looping_domain(8);
        domain.register_constructor(
            "base",
            ".one",
            Constructor::with_fields("one", [], |_| Ok(json!(1))),
        );
        let spec = domain.compile_spec(&json!({".one": {}, ".two": {}})).unwrap();
        let artifacts = spec.construct().unwrap();
        assert_eq!(artifacts.get("base", ()), Some(&json!(1)));
        assert!(artifacts.skipped("base", ()).is_some_and(|s| s.contains(".two")));
    }

    #[test]
    fn nodes_without_predicates_produce_nothing() {
        let domain = looping_domain(8);
        domain.register_constructor(
            "base",
            ".one",
            Constructor::with_fields("one", [], |_| Ok(json!(1))),
        );
        let spec = domain.compile_spec(&json!({"plain": 3})).unwrap();
        let artifacts = spec.construct().unwrap();
        assert!(!artifacts.contains("base"));
    }
}
