//! Negotiation over signed positions
//!
//! Each signer submits a partial document for the same base spec. A
//! position is valid when it configures a fresh copy of the base spec,
//! and compatible when it also merges into the running candidate built
//! from the positions accepted before it.

use crate::analysis::{analyze, compare, NodeStatus, PathStatus, StatusChange, Statuses};
use crate::consensus::Consensus;
use serde_json::Value;
use specular::{Error, Result, Spec, What};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Error tags per path key
pub type ErrorPaths = BTreeMap<String, What>;

/// Outcome of a negotiation
#[derive(Debug, Clone)]
pub struct Analysis {
    /// Base spec merged with every compatible position
    pub candidate: Spec,
    /// Every signer that submitted a position
    pub signers: BTreeSet<String>,
    /// Values asserted per path
    pub consensus: Consensus,
    /// Paths rejected by the base spec, per signer
    pub validation_errors: BTreeMap<String, ErrorPaths>,
    /// Positions accepted by the base spec, in submission order
    pub valid_positions: Vec<(String, Spec)>,
    /// Paths rejected by the candidate, per signer
    pub compatibility_errors: BTreeMap<String, ErrorPaths>,
    /// Positions merged into the candidate, in submission order
    pub compatible_positions: Vec<(String, Spec)>,
    /// Status of every consensus path
    pub path_statuses: BTreeMap<String, PathStatus>,
    /// Aggregated status of every node
    pub node_statuses: BTreeMap<String, NodeStatus>,
    /// Path statuses before and after adopting our position
    pub our_path_analysis: Option<BTreeMap<String, StatusChange<PathStatus>>>,
    /// Node statuses before and after adopting our position
    pub our_node_analysis: Option<BTreeMap<String, StatusChange<NodeStatus>>>,
}

/// Per-call accumulators for one batch of positions
#[derive(Default)]
struct Extracted {
    validation_errors: BTreeMap<String, ErrorPaths>,
    valid_positions: Vec<(String, Spec)>,
    compatibility_errors: BTreeMap<String, ErrorPaths>,
    compatible_positions: Vec<(String, Spec)>,
}

/// Analyze the `positions` of several signers against `spec`
///
/// With `our_position`, the analysis is repeated as if `our_signer` had
/// submitted it, and both outcomes are compared.
///
/// # Errors
/// Compile errors of a position, config errors other than
/// `config-failed`, and `invalid` when our position fails validation.
pub fn negotiate(
    spec: &Spec,
    positions: &[(String, Value)],
    our_signer: Option<&str>,
    our_position: Option<&Value>,
) -> Result<Analysis> {
    let mut consensus = Consensus::seed(spec);
    let mut candidate = spec.clone();
    let mut signers = BTreeSet::new();

    let compiled = positions
        .iter()
        .map(|(signer, source)| Ok((signer.clone(), spec.domain().compile_spec(source)?)))
        .collect::<Result<Vec<_>>>()?;

    let mut extracted = Extracted::default();
    extract_positions(
        spec,
        compiled,
        &mut consensus,
        &mut candidate,
        &mut signers,
        &mut extracted,
    )?;

    let Statuses {
        paths: path_statuses,
        nodes: node_statuses,
    } = analyze(&consensus, our_signer, signers.len());

    let mut our_path_analysis = None;
    let mut our_node_analysis = None;

    if let Some(position) = our_position {
        let signer = our_signer.unwrap_or_default().to_string();
        let position = spec.domain().compile_spec(position)?;

        let mut ours = Extracted::default();
        extract_positions(
            spec,
            vec![(signer, position)],
            &mut consensus,
            &mut candidate,
            &mut signers,
            &mut ours,
        )?;

        if !ours.validation_errors.is_empty() {
            return Err(Error::invalid("our position is invalid"));
        }

        extracted.valid_positions.extend(ours.valid_positions);
        if ours.compatibility_errors.is_empty() {
            extracted
                .compatible_positions
                .extend(ours.compatible_positions);
        }

        let after = analyze(&consensus, our_signer, signers.len());
        our_path_analysis = Some(compare(&path_statuses, &after.paths));
        our_node_analysis = Some(compare(&node_statuses, &after.nodes));
    }

    debug!(
        signers = signers.len(),
        valid = extracted.valid_positions.len(),
        compatible = extracted.compatible_positions.len(),
        "negotiation analyzed"
    );

    Ok(Analysis {
        candidate,
        signers,
        consensus,
        validation_errors: extracted.validation_errors,
        valid_positions: extracted.valid_positions,
        compatibility_errors: extracted.compatibility_errors,
        compatible_positions: extracted.compatible_positions,
        path_statuses,
        node_statuses,
        our_path_analysis,
        our_node_analysis,
    })
}

fn extract_positions(
    spec: &Spec,
    positions: Vec<(String, Spec)>,
    consensus: &mut Consensus,
    candidate: &mut Spec,
    signers: &mut BTreeSet<String>,
    extracted: &mut Extracted,
) -> Result<()> {
    for (signer, position) in positions {
        signers.insert(signer.clone());

        let mut validated = spec.clone();
        let error_paths = match validated.config_spec(&position) {
            Ok(()) => ErrorPaths::new(),
            Err(error) => error_paths(error)?,
        };

        for (path, value) in position.items() {
            let key = path.to_key();
            if error_paths.contains_key(&key) {
                continue;
            }
            consensus.record(key, value.cloned(), &signer);
        }

        if error_paths.is_empty() {
            extracted.valid_positions.push((signer, position));
        } else {
            debug!(signer = %signer, errors = error_paths.len(), "position invalid");
            extracted.validation_errors.insert(signer, error_paths);
        }
    }

    for (signer, position) in &extracted.valid_positions {
        let mut merged = candidate.clone();
        match merged.config_spec(position) {
            Ok(()) => {
                *candidate = merged;
                extracted
                    .compatible_positions
                    .push((signer.clone(), position.clone()));
            }
            Err(error) => {
                let error_paths = error_paths(error)?;
                debug!(signer = %signer, errors = error_paths.len(), "position incompatible");
                extracted
                    .compatibility_errors
                    .insert(signer.clone(), error_paths);
            }
        }
    }
    Ok(())
}

fn error_paths(error: Error) -> Result<ErrorPaths> {
    if error.what != What::ConfigFailed {
        return Err(error);
    }
    Ok(error
        .errs
        .iter()
        .map(|err| (err.loc.to_key(), err.what.clone()))
        .collect())
}
