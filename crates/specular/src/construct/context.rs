//! Constructor context

use super::constructor::{Field, FieldSet};
use super::{Artifacts, ConstructorTable, Constructions};
use crate::error::{Error, Result};
use crate::node::Node;
use crate::path::Path;
use crate::settings::Settings;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};

/// Everything a constructor may read while it runs
///
/// Accessors fail with `invalid` for fields the constructor did not ask
/// for at registration.
#[derive(Debug, Clone, Copy)]
pub struct Context<'a> {
    pub(crate) grants: FieldSet,
    pub(crate) constructor: &'a str,
    pub(crate) spec: &'a Node,
    pub(crate) loc: &'a Path,
    pub(crate) top_spec: &'a Node,
    pub(crate) constructions: &'a Constructions,
    pub(crate) construction: &'a str,
    pub(crate) constructors: &'a ConstructorTable,
    pub(crate) value: Option<&'a Value>,
    pub(crate) output: Option<&'a Value>,
    pub(crate) artifacts: &'a BTreeMap<Path, Value>,
    pub(crate) global_artifacts: &'a Artifacts,
    pub(crate) settings: &'a Settings,
    pub(crate) dependencies: &'a [String],
    pub(crate) schemata: &'a Node,
    pub(crate) constructed: &'a BTreeSet<String>,
    pub(crate) skipped: &'a BTreeSet<String>,
    pub(crate) round: usize,
    pub(crate) errs: &'a [Error],
    pub(crate) predicate: &'a str,
    pub(crate) args: &'a Map<String, Value>,
}

macro_rules! context_fields {
    ($($(#[$doc:meta])* $name:ident: $field:ident => $ty:ty;)*) => {
        impl<'a> Context<'a> {
            $(
                $(#[$doc])*
                ///
                /// # Errors
                /// `invalid` when the field was not requested.
                pub fn $name(&self) -> Result<$ty> {
                    self.require(Field::$field)?;
                    Ok(self.$name)
                }
            )*
        }
    };
}

context_fields! {
    /// Node being constructed
    spec: Spec => &'a Node;
    /// Location of the node
    loc: Loc => &'a Path;
    /// Root node of the spec
    top_spec: TopSpec => &'a Node;
    /// Every construction in use
    constructions: Constructions => &'a Constructions;
    /// Name of the running construction
    construction: Construction => &'a str;
    /// Constructor table of the running construction
    constructors: Constructors => &'a ConstructorTable;
    /// Node value, `None` when unset
    value: Value => Option<&'a Value>;
    /// Current output of the running construction at this node
    output: Output => Option<&'a Value>;
    /// Outputs of the running construction by location
    artifacts: Artifacts => &'a BTreeMap<Path, Value>;
    /// Outputs of every construction
    global_artifacts: GlobalArtifacts => &'a Artifacts;
    /// Settings in effect at this node
    settings: Settings => &'a Settings;
    /// Predicate keys of the node in construction order
    dependencies: Dependencies => &'a [String];
    /// Schema registry snapshot
    schemata: Schemata => &'a Node;
    /// Predicates constructed so far
    constructed: Constructed => &'a BTreeSet<String>;
    /// Predicates skipped so far
    skipped: Skipped => &'a BTreeSet<String>;
    /// Current round
    round: Round => usize;
    /// Errors collected so far
    errs: Errs => &'a [Error];
    /// Predicate being constructed
    predicate: Predicate => &'a str;
    /// Arguments under the predicate, `__`-joined
    args: Args => &'a Map<String, Value>;
}

impl<'a> Context<'a> {
    fn require(&self, field: Field) -> Result<()> {
        if self.grants.contains(field) {
            Ok(())
        } else {
            Err(Error::invalid(format!(
                "constructor {:?} did not request context field {field:?}",
                self.constructor
            ))
            .at(self.loc.clone())
            .with_data("field", field.as_str()))
        }
    }

    pub(crate) fn restrict<'b>(&self, grants: FieldSet, constructor: &'b str) -> Context<'b>
    where
        'a: 'b,
    {
        let base: Context<'b> = *self;
        Context {
            grants,
            constructor,
            ..base
        }
    }

    /// Output of the running construction at `loc`
    ///
    /// # Errors
    /// `invalid` unless `artifacts` was requested.
    pub fn artifact(&self, loc: &Path) -> Result<Option<&'a Value>> {
        Ok(self.artifacts()?.get(loc))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::What;
    use serde_json::json;

    #[test]
    fn grants_gate_access() {
        let node = Node::leaf(json!(4));
        let loc = Path::from(["alpha"]);
        let constructions = Constructions::new();
        let table = ConstructorTable::new();
        let outputs = BTreeMap::new();
        let artifacts = Artifacts::new();
        let settings = Settings::new();
        let sets = BTreeSet::new();
        let args = Map::new();
        let context = Context {
            grants: FieldSet::all(),
            constructor: "engine",
            spec: &node,
            loc: &loc,
            top_spec: &node,
            constructions: &constructions,
            construction: "base",
            constructors: &table,
            value: node.value(),
            output: None,
            artifacts: &outputs,
            global_artifacts: &artifacts,
            settings: &settings,
            dependencies: &[],
            schemata: &node,
            constructed: &sets,
            skipped: &sets,
            round: 2,
            errs: &[],
            predicate: ".integer",
            args: &args,
        };
        assert_eq!(context.round().unwrap(), 2);

        let narrow = context.restrict([Field::Value].into_iter().collect(), "construct_value");
        assert_eq!(narrow.value().unwrap(), Some(&json!(4)));
        let err = narrow.loc().unwrap_err();
        assert_eq!(err.what, What::Invalid);
        assert!(err.message.contains("construct_value"));
        assert_eq!(err.loc, loc);
        assert!(narrow.artifact(&loc).is_err());
        assert_eq!(context.artifact(&loc).unwrap(), None);
    }
}
