//! Compile Tests
//!
//! Key splitting, normalization and schema application while compiling
//! documents into specs.

use pretty_assertions::assert_eq;
use serde_json::json;
use specular::{Domain, Lookup, Node, Spec, What};
use specular_test_utils::{init_tracing, stone_domain, tree_domain};

#[test]
fn test_compile_unicode_names() {
    let spec = Domain::new()
        .compile_spec(&json!({"hello": {}, "καλημέρα": {}}))
        .unwrap();
    assert!(spec.contains("hello"));
    assert!(spec.contains("καλημέρα"));
}

#[test]
fn test_compile_paths_as_names() {
    init_tracing();
    let source = json!({
        "one.two": 0,
        "one.two.three.four": 1,
        "one.foo": 2,
        ".alpha.beta": 3,
        ".alpha.beta.gamma.delta": 4,
        ".alpha.omega": 5,
        "one?two": 12,
        "one?two?three?four": 13,
        "one?foo": 14,
        "?alpha?beta": 15,
        "?alpha?beta?gamma?delta": 16,
        "?alpha?omega": 17,
        "/one.two/three": 1000,
        "/one.two/three?four:five": 1002,
        "/one?two/three": 1003,
        "a.b.": 1004,
        "a.b..": 1005,
        "a?b?": 1008,
        "a?b??": 1009,
        "a/b/": 1010,
        "a/b/c": 1011,
        "a/b/c//": 1012,
        "x": {"=": 1013, "y": 1014, "g": 1015},
        "x/y/a": 1016,
        "x/z/b": 1017,
    });

    let spec = Domain::new().compile_spec(&source).unwrap();

    assert_eq!(spec.get(["one", ".", "two"]), json!(0));
    assert_eq!(spec.get(["one", ".", "two", "three", "four"]), json!(1));
    assert_eq!(spec.get(["one", ".", "foo"]), json!(2));
    assert_eq!(spec.get([".", "alpha", "beta"]), json!(3));
    assert_eq!(spec.get([".", "alpha", "beta", "gamma", "delta"]), json!(4));
    assert_eq!(spec.get([".", "alpha", "omega"]), json!(5));

    assert_eq!(spec.get(["one", "?", "two"]), json!(12));
    assert_eq!(spec.get(["one", "?", "two", "three", "four"]), json!(13));
    assert_eq!(spec.get(["one", "?", "foo"]), json!(14));
    assert_eq!(spec.get(["?", "alpha", "beta"]), json!(15));
    assert_eq!(spec.get(["?", "alpha", "beta", "gamma", "delta"]), json!(16));
    assert_eq!(spec.get(["?", "alpha", "omega"]), json!(17));

    assert_eq!(spec.get(["", "one.two", "three"]), json!(1000));
    assert_eq!(spec.get(["", "one.two", "three?four:five"]), json!(1002));
    assert_eq!(spec.get(["", "one?two", "three"]), json!(1003));

    assert_eq!(spec.get(["a", ".", "b"]), json!(1004));
    assert_eq!(spec.get(["a", ".", "b", ""]), json!(1005));
    assert_eq!(spec.get(["a", "?", "b"]), json!(1008));
    assert_eq!(spec.get(["a", "?", "b", ""]), json!(1009));

    assert_eq!(spec.get(["a", "b"]), json!(1010));
    assert_eq!(spec.get(["a", "b", "c"]), json!(1011));
    assert_eq!(spec.get(["a", "b", "c", ""]), json!(1012));

    assert_eq!(spec.get(["x"]), json!(1013));
    assert_eq!(spec.get(["x", "y"]), json!(1014));
    assert_eq!(spec.get(["x", "g"]), json!(1015));
    assert_eq!(spec.get(["x", "y", "a"]), json!(1016));
    assert_eq!(spec.get(["x", "z", "b"]), json!(1017));
}

#[test]
fn test_compile_value_in_path() {
    let err = Domain::new()
        .compile_spec(&json!({"a/b/=": 1}))
        .unwrap_err();
    assert_eq!(err.what, What::Invalid);
    assert!(err.message.contains("'='"));
}

#[test]
fn test_compile_path_clash() {
    let domain = Domain::new();

    let err = domain
        .compile_spec(&json!({"x": {"y": 0}, "x/y": 1}))
        .unwrap_err();
    assert_eq!(err.what, What::CannotNormalize);

    let spec = domain
        .compile_spec(&json!({"x": {"y": 999}, "x/y": 999}))
        .unwrap();
    assert_eq!(spec.get("x/y"), json!(999));

    let spec = domain
        .compile_spec(&json!({"x": {"y": {"z": 999}}, "x/y": {"z": 999}}))
        .unwrap();
    assert_eq!(spec.get("x/y/z"), json!(999));

    let spec = domain
        .compile_spec(&json!({
            "x/y": 1,
            "x/y/z": 2,
            "x/y/z/.": 3,
            "x/y/z/./?": 4,
            "x/y/z/./?/a": 5,
        }))
        .unwrap();
    assert_eq!(spec.get(["x", "y"]), json!(1));
    assert_eq!(spec.get(["x", "y", "z"]), json!(2));
    assert_eq!(spec.get(["x", "y", "z", "."]), json!(3));
    assert_eq!(spec.get(["x", "y", "z", ".", "?"]), json!(4));
    assert_eq!(spec.get(["x", "y", "z", ".", "?", "a"]), json!(5));
}

#[test]
fn test_compile_autoregister() {
    let domain = Domain::new();
    let animal = json!({".animal": {}, "feet": {}, "diet": {}});

    domain.compile_schema(".animal", &animal).unwrap();
    let animal_spec = domain.compile_spec(&animal).unwrap();
    assert_eq!(domain.schema(".animal/").as_ref(), Some(animal_spec.root()));

    let err = domain
        .compile_schema(".thing.property", &json!({".thing.property": {}}))
        .unwrap_err();
    assert_eq!(err.what, What::CompileFailed);
    assert_eq!(err.errs.len(), 1);
    assert_eq!(err.errs[0].what, What::ParentPredicateNotFound);
}

#[test]
fn test_register_through_document() {
    let domain = Domain::new();
    let spec = domain
        .compile_spec_with(
            &json!({
                "$/.color": {".color": {}, "rgb": {}},
                "#": {"paint": {}},
                "wall": {".color": {}},
            }),
            true,
            false,
        )
        .unwrap();
    assert!(domain.has_schema(".color"));
    assert!(domain.construction_names().contains(&"paint".to_string()));
    assert_eq!(spec.get("wall/rgb"), Lookup::Any);

    let err = domain
        .compile_spec(&json!({"$/.other": {}}))
        .unwrap_err();
    assert_eq!(err.what, What::SchemataConfigNotAllowed);
}

#[test]
fn test_complete_compile_rejects_unknown_predicates() {
    let domain = Domain::new();
    let err = domain
        .compile_spec_with(&json!({"a": {".mystery": {}}}), false, true)
        .unwrap_err();
    assert_eq!(err.what, What::UnknownPredicates);

    let mut spec = Spec::with_domain(domain);
    let unknown = spec.compile(&json!({"a": {".mystery": {}}})).unwrap();
    assert!(unknown.contains(".mystery"));
}

#[test]
fn test_template_predicates_unknown() {
    let domain = Domain::new();
    let mut spec = domain
        .compile_spec_with(&json!({"alpha": {"?": {".object": {}}}}), true, false)
        .unwrap();
    let err = spec.config(&json!({"alpha/beta": {}})).unwrap_err();
    assert_eq!(err.what, What::ConfigFailed);
    assert_eq!(err.errs.len(), 1);
    assert_eq!(err.errs[0].what, What::TemplatePredicatesUnknown);
}

#[test]
fn test_compile_apply_schemata() {
    let stone = json!({".colorful": {}, ".massive": {}});

    let spec = stone_domain().compile_spec(&stone).unwrap();
    assert_eq!(spec.get("color"), Lookup::Any);
    assert_eq!(spec.get("mass"), Lookup::Any);
    assert_eq!(spec.get("mass/./integer"), Lookup::Any);

    let dry = Domain::new().compile_spec(&stone).unwrap();
    assert_eq!(dry.get("color"), Lookup::NotFound);
    assert_eq!(dry.get("mass"), Lookup::NotFound);
}

#[test]
fn test_compile_dependencies() {
    let domain = Domain::new();
    domain
        .compile_schema(".painted", &json!({".painted": {}, "color": {}}))
        .unwrap();
    domain
        .compile_schema(
            ".painted.material",
            &json!({".painted.material": {}, "material": {}, "density": {}}),
        )
        .unwrap();

    let spec = domain
        .compile_spec(&json!({"wall": {".painted.material": {}}}))
        .unwrap();

    assert_eq!(spec.get(["wall", "material"]), Lookup::Any);
    assert_eq!(spec.get(["wall", "density"]), Lookup::Any);
    assert_eq!(spec.get(["wall", "color"]), Lookup::Any);
    assert_eq!(spec.get(["wall", ".", "painted"]), Lookup::Any);
    assert_eq!(spec.get(["wall", ".", "painted", "material"]), Lookup::Any);
}

#[test]
fn test_compile_simple_nodes_values() {
    let spec = Domain::new()
        .compile_spec(&json!({
            "hello": {
                "world": {"=": {"one": 1}},
                "there": {"one": 1},
                "you": {"=": [1, 2, 3]},
            },
        }))
        .unwrap();
    assert_eq!(spec.get("hello/world"), json!({"one": 1}));
    assert_eq!(spec.get("hello/there/one"), json!(1));
    assert_eq!(spec.get("hello/you"), json!([1, 2, 3]));
}

#[test]
fn test_compile_empty_key() {
    let spec = Domain::new()
        .compile_spec(&json!({
            "one": {"/": 1},
            "two": {"": 2},
            "three": {
                "": {
                    "four": 4,
                    "": {
                        "five": 5,
                        "": {"six": 6},
                    },
                },
            },
        }))
        .unwrap();
    assert_eq!(spec.get(["one", ""]), json!(1));
    assert_eq!(spec.get(["two"]), json!(2));
    assert_eq!(spec.get(["three", "four"]), json!(4));
    assert_eq!(spec.get(["three", "five"]), json!(5));
    assert_eq!(spec.get(["three", "six"]), json!(6));
}

#[test]
fn test_really_empty() {
    let spec = Domain::new()
        .compile_spec(&json!({"hello": {"": {}}}))
        .unwrap();
    assert!(spec.getpath("hello").is_some_and(Node::is_any));
}

#[test]
fn test_compile_extend_deps() {
    let domain = Domain::new();
    domain
        .compile_schemata([
            (
                ".thing",
                json!({".thing": {}, "properties": {"?": {}}, "something": {}}),
            ),
            (
                ".colored",
                json!({
                    ".colored": {},
                    ".thing": {},
                    "properties": {"color": {}, "reflectivity": {}},
                    "something": {},
                }),
            ),
            (
                ".massive",
                json!({
                    ".massive": {},
                    ".thing": {},
                    "properties": {"mass": {}, "strength": {}},
                }),
            ),
            (
                ".paint",
                json!({
                    ".paint": {},
                    ".colored": {},
                    ".massive": {},
                    "properties": {
                        "color": {"cmyk": {}},
                        "mass": {"per_volume": {}},
                    },
                }),
            ),
        ])
        .unwrap();

    let paint = domain.schema(".paint").unwrap();
    assert_eq!(paint.get(["properties", "color", "cmyk"]), Lookup::Any);
    assert_eq!(paint.get(["properties", "reflectivity"]), Lookup::Any);
    assert_eq!(paint.get(["properties", "mass", "per_volume"]), Lookup::Any);
    assert_eq!(paint.get(["properties", "strength"]), Lookup::Any);
}

#[test]
fn test_compile_node_literals() {
    let mut spec = Spec::new();
    spec.domain()
        .compile_schemata([
            (".alpha", json!({".alpha": {}, "thing": 1, "entity": {}})),
            (
                ".beta",
                json!({".beta": {}, ".alpha": {}, "thing": 1, "entity": 2}),
            ),
        ])
        .unwrap();
    spec.compile(&json!({".beta": {}})).unwrap();
    assert_eq!(spec.get("thing"), json!(1));
    assert_eq!(spec.get("entity"), json!(2));
}

#[test]
fn test_fields() {
    let domain = Domain::new();
    domain.compile_schema(".flag", &json!({".flag": {}})).unwrap();
    domain
        .compile_schema(
            ".field",
            &json!({
                ".field": {},
                "source": {".string": {}},
                "default": {},
                ".flag": {},
            }),
        )
        .unwrap();
    domain
        .compile_schema(
            ".field.string",
            &json!({".field": {"string": {}}, "default": {".string": {}}}),
        )
        .unwrap();

    let schema = domain.schema(".field.string").unwrap();
    assert!(schema.child("source").is_some());
    assert!(schema.getpath("default/./string").is_some());
}

#[test]
fn test_recursion() {
    let mut spec = tree_domain().compile_spec(&json!({".tree": {}})).unwrap();
    spec.config(&json!({"nodes/alpha": {}})).unwrap();
    spec.config(&json!({"nodes/alpha/nodes/beta": {}})).unwrap();
    spec.config(&json!({"nodes/gamma": {}})).unwrap();
    spec.config(&json!({"nodes/gamma/nodes/delta": {}})).unwrap();

    assert_eq!(spec.get(["nodes", "alpha", ".", "tree"]), Lookup::Any);
    assert_eq!(
        spec.get(["nodes", "alpha", "nodes", "beta", ".", "tree"]),
        Lookup::Any
    );
    assert_eq!(spec.get(["nodes", "gamma", ".", "tree"]), Lookup::Any);
    assert_eq!(
        spec.get(["nodes", "gamma", "nodes", "delta", ".", "tree"]),
        Lookup::Any
    );
    assert_eq!(spec.get(["nodes", "delta", ".", "tree"]), Lookup::NotFound);
}

#[test]
fn test_incomplete_schemata() {
    let domain = Domain::new();
    domain
        .compile_schemata([
            (".incomplete", json!({".incomplete": {}})),
            (".incomplete.zero", json!({".incomplete.zero": {}, "zero": 0})),
            (".incomplete.one", json!({".incomplete.one": {}, "one": 1})),
        ])
        .unwrap();

    let mut spec = domain
        .compile_spec(&json!({"hello": {"?": {".incomplete": {}}}}))
        .unwrap();

    spec.config(&json!({"hello/alpha": {}})).unwrap();
    assert_eq!(spec.get("hello/alpha/zero"), Lookup::NotFound);
    assert_eq!(spec.get("hello/alpha/one"), Lookup::NotFound);

    domain
        .compile_schema(".incomplete", &json!({".incomplete.zero": {}}))
        .unwrap();
    spec.config(&json!({"hello/beta": {}})).unwrap();
    assert_eq!(spec.get("hello/beta/zero"), json!(0));
    assert_eq!(spec.get("hello/beta/one"), Lookup::NotFound);

    domain
        .compile_schema(".incomplete", &json!({"=": null}))
        .unwrap();
    let err = domain
        .compile_schema(".incomplete", &json!({".incomplete.one": {}}))
        .unwrap_err();
    assert_eq!(err.what, What::CompileFailed);
    assert!(!err.errs.is_empty());
    assert!(err.errs.iter().all(|e| e.what == What::ImmutableKey));
}
