//! Testing utilities for the specular workspace
//!
//! Shared domains, documents and tracing setup used by the integration
//! tests of every crate.

#![allow(missing_docs)]
#![allow(clippy::missing_panics_doc)]

use serde_json::{json, Value};
use specular::{Constructor, Context, Domain, Error, Field, Interrupt, Node, Path, BASE};
use std::sync::Once;

static TRACING: Once = Once::new();

/// Install a test subscriber honoring `RUST_LOG`, once per process
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Domain with the built-in `base` construction
pub fn base_domain() -> Domain {
    init_tracing();
    Domain::base().expect("base domain compiles")
}

/// Base domain extended with `.massive` and `.colorful`
pub fn stone_domain() -> Domain {
    let domain = base_domain();
    domain
        .compile_schema(
            ".massive",
            &json!({".massive": {}, "mass": {".integer": {}}}),
        )
        .expect("massive schema");
    domain
        .compile_schema(
            ".colorful",
            &json!({".colorful": {}, "color": {".text": {}}}),
        )
        .expect("colorful schema");
    domain
}

/// A domain with a self-referencing `.tree` predicate
pub fn tree_domain() -> Domain {
    let domain = Domain::new();
    domain
        .compile_schema(
            ".tree",
            &json!({
                ".tree": {},
                "value": {},
                "nodes": {"?": {".tree": {}}},
            }),
        )
        .expect("tree schema");
    domain
}

/// `.style` with `.style.bar` and `.style.frame` refinements
pub fn style_domain() -> Domain {
    let domain = Domain::new();
    domain
        .compile_schemata([
            (
                ".style",
                json!({".style": {}, "background": {}, "text": {}, "border": {}}),
            ),
            (".style.bar", json!({"menu": {}})),
            (".style.frame", json!({"content": {}})),
        ])
        .expect("style schemata");
    domain
}

/// Schema of arithmetic expressions over nested terms
pub fn expression_schema() -> Value {
    json!({
        ".expression": {},
        "operator": {},
        "terms": {"?": {".expression": {}}},
    })
}

/// Base domain with `.expression` and the `eval` and `repr` constructions
pub fn expression_domain() -> Domain {
    let domain = base_domain();
    domain
        .compile_schema(".expression", &expression_schema())
        .expect("expression schema");

    let base = domain.construction(BASE).unwrap_or_default();

    let mut eval = base.clone();
    eval.insert(
        ".expression".into(),
        Constructor::with_fields(
            "construct_eval_expression",
            [Field::Spec, Field::Loc, Field::Artifacts],
            construct_eval_expression,
        ),
    );
    domain.add_construction("eval", eval);

    let mut repr = base;
    repr.insert(
        ".expression".into(),
        Constructor::with_fields(
            "construct_repr_expression",
            [Field::Spec, Field::Loc, Field::Artifacts],
            construct_repr_expression,
        ),
    );
    domain.add_construction("repr", repr);
    domain
}

fn operator<'a>(spec: &'a Node, loc: &Path) -> Result<&'a str, Error> {
    spec.get("operator")
        .value()
        .and_then(Value::as_str)
        .ok_or_else(|| Error::invalid("expression without operator").at(loc.clone()))
}

fn construct_eval_expression(ctx: &Context<'_>) -> Result<Value, Interrupt> {
    let spec = ctx.spec()?;
    if spec.value().is_some() {
        return Err(Interrupt::Skip);
    }
    let loc = ctx.loc()?;
    let artifacts = ctx.artifacts()?;
    let terms_loc = loc.child("terms");

    let mut values = Vec::new();
    if let Some(terms) = spec.child("terms") {
        for (key, value) in terms.iter_level_values() {
            let value = value.or_else(|| artifacts.get(&terms_loc.child(key)));
            let number = value
                .and_then(Value::as_i64)
                .ok_or_else(|| Error::invalid(format!("term {key:?} is not a number")).at(loc.clone()))?;
            values.push(number);
        }
    }

    let output: i64 = match operator(spec, loc)? {
        "+" => values.iter().sum(),
        "*" => values.iter().product(),
        other => {
            return Err(Error::invalid(format!("unknown operator {other:?}"))
                .at(loc.clone())
                .into())
        }
    };
    Ok(json!(output))
}

fn construct_repr_expression(ctx: &Context<'_>) -> Result<Value, Interrupt> {
    let spec = ctx.spec()?;
    if let Some(value) = spec.value() {
        return Ok(Value::String(match value {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        }));
    }
    let loc = ctx.loc()?;
    let artifacts = ctx.artifacts()?;
    let op = operator(spec, loc)?;

    let mut parts = Vec::new();
    if let Some(terms) = spec.child("terms") {
        for (subloc, output) in terms.iter_level_outputs(&loc.child("terms"), artifacts) {
            let part = output
                .and_then(Value::as_str)
                .ok_or_else(|| Error::invalid("term has no representation").at(subloc))?;
            parts.push(part.to_string());
        }
    }
    Ok(Value::String(format!("({})", parts.join(op))))
}

/// Expression spec with a single-character operator
pub fn demo_source() -> Value {
    json!({
        "demo": {
            ".expression": {},
            "operator": {
                ".text": {"minlen": 1, "maxlen": 1, "alphabet": "+*"},
            },
        },
    })
}

/// Configuration of the demo expression
pub fn demo_config() -> Value {
    json!({
        "demo": {
            "operator": "+",
            "terms": [
                1,
                2,
                3,
                {"operator": "*", "terms": [3, 5, 7]},
                {
                    "operator": "*",
                    "terms": [{"operator": "+", "terms": [1, 5, 9]}, 6, 8],
                    "foo": 9,
                },
            ],
        },
    })
}

/// Value of the demo expression
pub const DEMO_RESULT: i64 = 1 + 2 + 3 + (3 * 5 * 7) + ((1 + 5 + 9) * 6 * 8);

/// Party planning spec shared by the negotiation tests
pub fn party_source() -> Value {
    json!({
        "party": {
            "members": {
                "?": {"willing_host": {}, "address": {}, "capacity": {}},
            },
            "theme": {
                "proposals": {"?": {"?": null}},
            },
            "host": {"?": null},
        },
    })
}

/// Alice's and Bob's accepted contributions
pub fn party_contributions() -> Vec<(String, Value)> {
    vec![
        (
            "alice".to_string(),
            json!({
                "party": {
                    "members": {
                        "alice": {
                            "willing_host": "yes",
                            "address": "aliceplace",
                            "food": "good",
                            "music": "best",
                        },
                    },
                    "theme": {"proposals": {"alice": "cyberpunk"}},
                    "host": "alice",
                },
            }),
        ),
        (
            "bob".to_string(),
            json!({
                "party": {
                    "members": {
                        "bob": {
                            "willing_host": "yes",
                            "address": "bobplace",
                            "food": "best",
                            "music": "good",
                        },
                        "alice": {"food": "bad"},
                    },
                    "theme": {"proposals": {"bob": "forest"}},
                    "host": "bob",
                },
            }),
        ),
    ]
}

/// Eve's proposed contribution
pub fn eve_proposal() -> Value {
    json!({
        "party": {
            "members": {
                "eve": {"willing_host": "no", "music": "worst", "food": "worst"},
            },
            "theme": {"proposals": {"eve": "murder"}},
            "host": "alice",
        },
    })
}
