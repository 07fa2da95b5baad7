//! Compile, config and clone
//!
//! These operate on a [`Node`] at a location `loc` below the spec root,
//! with the owning [`Domain`] passed alongside. Recoverable conflicts are
//! pushed to `errs`; only conditions that make the source unusable are
//! returned as `Err`.

use crate::domain::Domain;
use crate::error::{Error, Result, What};
use crate::node::Node;
use crate::path::{Path, CONSTRUCTIONS, PREDICATES, SCHEMATA, TEMPLATE};
use crate::source::Source;
use crate::walk::Walk;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use tracing::trace;

/// Predicate key of a path below a predicates node: `["a", "b"]` → `.a.b`
#[must_use]
pub fn predicate_key(path: &Path) -> String {
    format!("{PREDICATES}{}", path.join(PREDICATES))
}

/// Build `source` into `node`
///
/// Returns the predicates referenced by the source whose schema is not
/// registered yet.
pub(crate) fn compile(
    node: &mut Node,
    loc: &Path,
    domain: &Domain,
    mut source: Source,
    errs: &mut Vec<Error>,
    register: bool,
) -> Result<BTreeSet<String>> {
    let mut unknown = BTreeSet::new();

    if let Some(schemata) = source.children.remove(SCHEMATA) {
        if !register {
            return Err(Error::new(What::SchemataConfigNotAllowed)
                .with_message("compile with register to allow schemata config at global path '$'")
                .at(loc.clone()));
        }
        unknown.extend(domain.config_schemata(schemata, errs)?);
    }

    if let Some(constructions) = source.children.remove(CONSTRUCTIONS) {
        if !register {
            return Err(Error::new(What::ConstructionsConfigNotAllowed)
                .with_message(
                    "compile with register to allow constructions config at global path '#'",
                )
                .at(loc.clone()));
        }
        for name in constructions.children.keys() {
            domain.declare_construction(name);
        }
    }

    if let Some(predicates_source) = source.children.remove(PREDICATES) {
        let predicates_loc = loc.child(PREDICATES);
        let mut predicates = Node::new();
        unknown.extend(compile(
            &mut predicates,
            &predicates_loc,
            domain,
            predicates_source,
            errs,
            register,
        )?);
        unknown.extend(config_deps(node, loc, domain, &predicates, errs, true, false));

        match node.nodes.get_mut(PREDICATES) {
            Some(existing) => config(existing, &predicates_loc, domain, &predicates, errs, true, false),
            None => {
                node.nodes.insert(PREDICATES.to_string(), predicates);
            }
        }
    }

    if let Some(value) = source.value.take() {
        node.value = Some(value);
    }

    if let Some(template_source) = source.children.remove(TEMPLATE) {
        // templates never register schemata
        let mut template = Node::new();
        compile(
            &mut template,
            &loc.child(TEMPLATE),
            domain,
            template_source,
            errs,
            false,
        )?;
        node.nodes.insert(TEMPLATE.to_string(), template);
    }

    for (key, child_source) in source.children {
        if child_source.is_empty() {
            node.nodes.entry(key).or_default();
            continue;
        }

        let child_loc = loc.child(key.as_str());
        let mut compiled = Node::new();
        unknown.extend(compile(&mut compiled, &child_loc, domain, child_source, errs, register)?);

        match node.nodes.get_mut(&key) {
            Some(existing) if !existing.is_any() => {
                config(existing, &child_loc, domain, &compiled, errs, true, false);
            }
            _ => {
                node.nodes.insert(key, compiled);
            }
        }
    }

    Ok(unknown)
}

/// Merge an already compiled `source` into `node`
pub(crate) fn config(
    node: &mut Node,
    loc: &Path,
    domain: &Domain,
    source: &Node,
    errs: &mut Vec<Error>,
    mutable: bool,
    strict: bool,
) {
    let mutable = mutable && node.value.is_none();

    if !source.nodes.is_empty() {
        config_nodes(node, loc, domain, &source.nodes, errs, mutable, strict);
    }
    if let Some(value) = &source.value {
        config_value(node, loc, value, errs, mutable);
    }
}

fn config_nodes(
    node: &mut Node,
    loc: &Path,
    domain: &Domain,
    source_nodes: &BTreeMap<String, Node>,
    errs: &mut Vec<Error>,
    mutable: bool,
    strict: bool,
) {
    let template = node.nodes.get(TEMPLATE).cloned();

    for (key, source) in source_nodes {
        let subloc = loc.child(key.as_str());

        if !node.nodes.contains_key(key) {
            if !mutable {
                errs.push(
                    Error::new(What::ImmutableKey)
                        .with_message(format!("cannot add key {key:?} to an immutable node"))
                        .at(subloc),
                );
                continue;
            }

            let target = if (template.is_none() && !strict) || node.nodes.is_empty() {
                Node::new()
            } else {
                match &template {
                    Some(template) if template.value.is_none() => {
                        trace!(loc = %subloc, "instantiating template");
                        clone_node(template, &subloc, domain, errs, true)
                    }
                    _ => {
                        errs.push(
                            Error::new(What::NoTemplate)
                                .with_message(format!("no template to accept new key {key:?}"))
                                .at(subloc),
                        );
                        continue;
                    }
                }
            };
            node.nodes.insert(key.clone(), target);
        }

        if source.is_any() {
            continue;
        }
        if let Some(target) = node.nodes.get_mut(key) {
            config(target, &subloc, domain, source, errs, mutable, strict);
        }
    }
}

pub(crate) fn config_value(
    node: &mut Node,
    loc: &Path,
    value: &Value,
    errs: &mut Vec<Error>,
    mutable: bool,
) {
    if node.value.is_none() {
        if mutable {
            node.value = Some(value.clone());
        } else {
            errs.push(
                Error::new(What::ImmutableValue)
                    .with_message("cannot set a value on an immutable node")
                    .at(loc.clone())
                    .with_data("source", value.clone()),
            );
        }
        return;
    }

    if let Some(existing) = &node.value {
        if existing != value {
            errs.push(
                Error::new(What::ValueMismatch)
                    .with_message(format!("{existing} != {value}"))
                    .at(loc.clone())
                    .with_data("target", existing.clone())
                    .with_data("source", value.clone()),
            );
        }
    }
}

/// Merge the registered schema of every predicate under `predicates` into
/// `node`, returning the predicate keys with no schema yet
pub(crate) fn config_deps(
    node: &mut Node,
    loc: &Path,
    domain: &Domain,
    predicates: &Node,
    errs: &mut Vec<Error>,
    mutable: bool,
    strict: bool,
) -> Vec<String> {
    let mut unresolved = Vec::new();
    for (path, _) in Walk::preorder().collect(predicates) {
        if path.is_empty() {
            continue;
        }
        let key = predicate_key(&path);
        match domain.schema(&key) {
            Some(schema) => config(node, loc, domain, &schema, errs, mutable, strict),
            None => unresolved.push(key),
        }
    }
    unresolved
}

/// Deep copy of `node` placed at `loc`
///
/// With `deps`, every copied predicates node re-applies its schemata from
/// the domain as it is now, so template instances pick up schema
/// extensions registered after the template was compiled.
pub(crate) fn clone_node(
    node: &Node,
    loc: &Path,
    domain: &Domain,
    errs: &mut Vec<Error>,
    deps: bool,
) -> Node {
    let mut out = Node {
        value: node.value.clone(),
        nodes: BTreeMap::new(),
    };
    for (key, child) in &node.nodes {
        let child = clone_node(child, &loc.child(key.as_str()), domain, errs, deps);
        out.nodes.insert(key.clone(), child);
    }

    if deps {
        if let Some(predicates) = out.nodes.get(PREDICATES).cloned() {
            let unresolved = config_deps(&mut out, loc, domain, &predicates, errs, true, false);
            if !unresolved.is_empty() {
                errs.push(
                    Error::new(What::TemplatePredicatesUnknown)
                        .with_message(
                            "all template predicates need a registered schema \
                             before a node is cloned from the template",
                        )
                        .at(loc.clone())
                        .with_data("predicates", unresolved),
                );
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::normalize_source;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn build(domain: &Domain, doc: Value) -> (Node, Vec<Error>) {
        let mut node = Node::new();
        let mut errs = Vec::new();
        let source = normalize_source(&doc).unwrap();
        compile(&mut node, &Path::root(), domain, source, &mut errs, false).unwrap();
        (node, errs)
    }

    #[test]
    fn predicate_keys() {
        assert_eq!(predicate_key(&Path::from(["integer"])), ".integer");
        assert_eq!(predicate_key(&Path::from(["text", "minlen"])), ".text.minlen");
    }

    #[test]
    fn schemata_need_register() {
        let domain = Domain::new();
        let source = normalize_source(&json!({"$/.x": {}})).unwrap();
        let err = compile(&mut Node::new(), &Path::root(), &domain, source, &mut Vec::new(), false)
            .unwrap_err();
        assert_eq!(err.what, What::SchemataConfigNotAllowed);

        let source = normalize_source(&json!({"#/base": {}})).unwrap();
        let err = compile(&mut Node::new(), &Path::root(), &domain, source, &mut Vec::new(), false)
            .unwrap_err();
        assert_eq!(err.what, What::ConstructionsConfigNotAllowed);
    }

    #[test]
    fn constructions_are_declared() {
        let domain = Domain::new();
        let source = normalize_source(&json!({"#/render": {}})).unwrap();
        compile(&mut Node::new(), &Path::root(), &domain, source, &mut Vec::new(), true).unwrap();
        assert_eq!(domain.construction_names(), vec!["render".to_string()]);
    }

    #[test]
    fn config_value_rules() {
        let loc = Path::single("x");
        let mut errs = Vec::new();
        let mut node = Node::new();

        config_value(&mut node, &loc, &json!(1), &mut errs, false);
        assert_eq!(errs.pop().map(|e| e.what), Some(What::ImmutableValue));

        config_value(&mut node, &loc, &json!(1), &mut errs, true);
        assert_eq!(node.value(), Some(&json!(1)));

        config_value(&mut node, &loc, &json!(1), &mut errs, false);
        assert!(errs.is_empty());

        config_value(&mut node, &loc, &json!(2), &mut errs, true);
        let err = errs.pop().unwrap();
        assert_eq!(err.what, What::ValueMismatch);
        assert_eq!(err.data["target"], json!(1));
        assert_eq!(err.data["source"], json!(2));
    }

    #[test]
    fn strict_config_needs_template() {
        let domain = Domain::new();
        let (mut node, errs) = build(&domain, json!({"a": 1}));
        assert!(errs.is_empty());
        let (incoming, _) = build(&domain, json!({"b": 2}));

        let mut errs = Vec::new();
        config(&mut node, &Path::root(), &domain, &incoming, &mut errs, true, true);
        assert_eq!(errs.len(), 1);
        assert_eq!(errs[0].what, What::NoTemplate);
        assert_eq!(errs[0].loc, Path::single("b"));

        let mut errs = Vec::new();
        config(&mut node, &Path::root(), &domain, &incoming, &mut errs, true, false);
        assert!(errs.is_empty());
        assert_eq!(node.get("b"), json!(2));
    }

    #[test]
    fn strict_config_accepts_first_child() {
        let domain = Domain::new();
        let mut node = Node::new();
        let (incoming, _) = build(&domain, json!({"a": 1, "b": 2}));
        let mut errs = Vec::new();
        config(&mut node, &Path::root(), &domain, &incoming, &mut errs, true, true);
        assert!(errs.is_empty());
        assert_eq!(node.len(), 2);
    }

    #[test]
    fn clone_resolves_template_deps() {
        let domain = Domain::new();
        domain
            .compile_schema(".leg", &json!({".leg": {}, "length": {}}))
            .unwrap();
        let (template, errs) = build(&domain, json!({".leg": {}}));
        assert!(errs.is_empty());

        domain.config_schema(".leg", &json!({"length": 3})).unwrap();

        let mut errs = Vec::new();
        let cloned = clone_node(&template, &Path::single("x"), &domain, &mut errs, true);
        assert!(errs.is_empty());
        assert_eq!(cloned.get("length"), json!(3));

        let plain = clone_node(&template, &Path::single("x"), &domain, &mut errs, false);
        assert_eq!(plain, template);
    }

    #[test]
    fn clone_reports_unknown_template_predicates() {
        let domain = Domain::new();
        let (template, _) = build(&domain, json!({".object": {}}));
        let mut errs = Vec::new();
        clone_node(&template, &Path::single("beta"), &domain, &mut errs, true);
        assert_eq!(errs.len(), 1);
        assert_eq!(errs[0].what, What::TemplatePredicatesUnknown);
        assert_eq!(errs[0].data["predicates"], json!([".object"]));
    }
}
