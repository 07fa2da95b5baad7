//! Config Tests
//!
//! Merging documents into compiled specs: conflicts, immutability,
//! templates and schema extension.

use pretty_assertions::assert_eq;
use serde_json::json;
use specular::{
    normalize_source, ConfigMode, Domain, Lookup, Path, Spec, SpecularConfig, What,
};
use specular_test_utils::{init_tracing, style_domain};

#[test]
fn test_config_basic() {
    init_tracing();
    let mut stone = Domain::new().compile_spec(&json!({".stone": {}})).unwrap();
    stone
        .config(&json!({".massive": {}, "mass": {".integer": {}}}))
        .unwrap();
    stone
        .config(&json!({".colorful": {}, "color": {".text": {}}}))
        .unwrap();
    stone
        .config(&json!({"mass/measure": {".text": {}}}))
        .unwrap();
    stone.config(&json!({"color": "black", "mass": 9})).unwrap();

    assert_eq!(stone.get("mass/measure"), Lookup::Any);
    assert_eq!(stone.get("color"), json!("black"));
    assert_eq!(stone.get("mass"), json!(9));

    let err = stone
        .config(&json!({"color/rgb": {".text": {}}}))
        .unwrap_err();
    assert_eq!(err.what, What::ConfigFailed);
    assert_eq!(err.errs.len(), 1);
    assert_eq!(err.errs[0].what, What::ImmutableKey);

    stone.config(&json!({"mass": 9})).unwrap();
    assert_eq!(stone.get("mass"), json!(9));

    let err = stone.config(&json!({"mass": 0})).unwrap_err();
    assert_eq!(err.errs.len(), 1);
    assert_eq!(err.errs[0].what, What::ValueMismatch);

    let err = stone.config(&json!({"mass/measure": "oz"})).unwrap_err();
    assert_eq!(err.errs.len(), 1);
    assert_eq!(err.errs[0].what, What::ImmutableValue);
    assert_eq!(err.errs[0].loc, Path::from(["mass", "measure"]));
}

#[test]
fn test_clone_empty() {
    let spec = Spec::new();
    let cloned = spec.clone();
    assert!(cloned.is_empty());
    assert_eq!(cloned.get(()), Lookup::Any);
}

#[test]
fn test_config_existing_value() {
    let mut spec = Domain::new().compile_spec(&json!({"alpha": 1})).unwrap();
    spec.config(&json!({"alpha": 1})).unwrap();
    assert_eq!(spec.get("alpha"), json!(1));

    let err = spec.config(&json!({"alpha": 2})).unwrap_err();
    assert_eq!(err.what, What::ConfigFailed);
    assert_eq!(err.errs.len(), 1);
    assert_eq!(err.errs[0].what, What::ValueMismatch);
}

#[test]
fn test_config_specify_value() {
    let mut spec = Domain::new().compile_spec(&json!({"alpha": {}})).unwrap();
    spec.config(&json!({"alpha": 1})).unwrap();
    assert_eq!(spec.getpath("alpha").and_then(|n| n.value()), Some(&json!(1)));

    let before = spec.to_source();
    let mut errs = Vec::new();
    spec.config_value(None, &mut errs, true);
    assert!(errs.is_empty());
    assert_eq!(spec.to_source(), before);
}

#[test]
fn test_config_immutable_mode() {
    let mut spec = Domain::new()
        .compile_spec(&json!({"alpha": {}, "beta": 2}))
        .unwrap();
    let mut errs = Vec::new();
    spec.config_with(
        &json!({"alpha": 1, "gamma": 3}),
        Some(&mut errs),
        ConfigMode::new().with_mutable(false),
    )
    .unwrap();

    let whats: Vec<&What> = errs.iter().map(|e| &e.what).collect();
    assert_eq!(whats, vec![&What::ImmutableValue, &What::ImmutableKey]);
    assert_eq!(spec.get("alpha"), Lookup::Any);
    assert!(!spec.contains("gamma"));
}

#[test]
fn test_spec_round_trip_and_config_sequence() {
    let source = json!({
        ".hello": {"friend": 6},
        "hello.there": {".nine": {}, "ten": {}},
        "one": {
            "2two": 2,
            "@three": 3,
            "?": {"foo": 5},
        },
        "four": 4,
        "five": {"=": 5, "someting": {}},
        "six": {"=": {"one": 1}},
    });

    let mut spec = Domain::new().compile_spec(&source).unwrap();
    assert_eq!(
        normalize_source(&spec.to_source()).unwrap(),
        normalize_source(&source).unwrap()
    );

    spec.config(&json!({"?": {"foo": {"bar": 4}}})).unwrap();
    spec.config(&json!({"zoo": {"moo": {"=": 1}}})).unwrap();
    assert_eq!(spec.get("zoo/foo/bar"), json!(4));
    assert_eq!(spec.get("zoo/moo"), json!(1));

    spec.config(&json!({"?": {"=": 9}})).unwrap();
    let err = spec.config(&json!({"goo": {"daz": 11}})).unwrap_err();
    assert_eq!(err.what, What::ConfigFailed);
    assert_eq!(err.errs[0].what, What::NoTemplate);

    spec.config(&json!({"zoo": {"foo": {}}})).unwrap();
    spec.config(&json!({"zoo": {"foo": {"a": 1}}})).unwrap();
    spec.config(&json!({"zoo": 0})).unwrap();

    let err = spec.config(&json!({"zoo": {"foo": {"b": 2}}})).unwrap_err();
    assert_eq!(err.errs[0].what, What::ImmutableKey);

    let err = spec.config(&json!({"zoo": {"foo": 3}})).unwrap_err();
    assert_eq!(err.errs[0].what, What::ImmutableValue);

    spec.config(&json!({"six": {"=": {"one": 1}}})).unwrap();
}

#[test]
fn test_config_strict_requires_template() {
    let domain = Domain::with_config(SpecularConfig::new().with_strict(true));
    let mut spec = domain
        .compile_spec(&json!({"items": {"first": 1, "?": {"price": {}}}, "meta": {"a": 1}}))
        .unwrap();

    spec.config(&json!({"items/second": {"price": 3}})).unwrap();
    assert_eq!(spec.get("items/second/price"), json!(3));

    let err = spec.config(&json!({"meta/b": 2})).unwrap_err();
    assert_eq!(err.errs[0].what, What::NoTemplate);
}

#[test]
fn test_config_spec_merges_trees() {
    let domain = Domain::new();
    let mut left = domain.compile_spec(&json!({"a": 1, "b": {}})).unwrap();
    let right = domain.compile_spec(&json!({"b": 2, "c": 3})).unwrap();
    left.config_spec(&right).unwrap();
    assert_eq!(left.get("b"), json!(2));
    assert_eq!(left.get("c"), json!(3));

    let clash = domain.compile_spec(&json!({"a": 5})).unwrap();
    let err = left.config_spec(&clash).unwrap_err();
    assert_eq!(err.errs[0].what, What::ValueMismatch);
}

#[test]
fn test_schema_extension() {
    let domain = style_domain();

    let mut page = domain
        .compile_spec(&json!({"?": {"header": {}, "body": {}, "footer": {}}}))
        .unwrap();

    page.config(&json!({
        "?": {
            "header": {".style.bar": {}},
            "body": {
                ".style.frame": {},
                "dialog": {".style.frame": {}},
            },
            "footer": {".style.bar": {}},
        },
    }))
    .unwrap();

    page.config(&json!({"test_page": {"body": {"content": "test"}}}))
        .unwrap();
    assert_eq!(page.get("test_page/body/content"), json!("test"));
    assert_eq!(page.get("test_page/body/background"), Lookup::Any);

    domain
        .config_schema(".style.bar", &json!({"background": "deepblue", "text": "white"}))
        .unwrap();
    domain
        .config_schema(".style.frame", &json!({"background": "darkgray", "text": "white"}))
        .unwrap();

    page.config(&json!({
        "landing": {
            "header": {"menu": ["account", "navigate"]},
            "body": {"content": "Welcome"},
            "footer": {"menu": ["contact", "settings"]},
        },
    }))
    .unwrap();

    assert_eq!(page.get("landing/body/background"), json!("darkgray"));
    assert_eq!(page.get("landing/body/dialog/text"), json!("white"));
    assert_eq!(page.get("landing/header/background"), json!("deepblue"));
    assert_eq!(page.get("landing/footer/background"), json!("deepblue"));
    assert_eq!(page.get("landing/header/menu/0"), json!("account"));
}
