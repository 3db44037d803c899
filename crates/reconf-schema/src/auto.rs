//! Schema derivation from a live property tree
//!
//! Every leaf becomes a parameter whose default is its current value. Nested
//! bags and composites become groups named by their dotted prefix.

use crate::descriptor::{GroupDescriptor, ParamDescriptor, ROOT_GROUP};
use crate::error::SchemaError;
use crate::schema::Schema;
use reconf_property::{PropertyBag, PropertyPath, ScalarKind, Walker};
use reconf_protocol::{codec, FieldValue};
use std::collections::HashMap;

/// Options for [`Schema::from_properties`]
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoSchemaOptions {
    /// Level assigned to every derived parameter
    pub level: u32,
    /// Walker used to enumerate leaves
    pub walker: Walker,
}

impl AutoSchemaOptions {
    /// Set the level
    #[must_use]
    pub fn with_level(mut self, level: u32) -> Self {
        self.level = level;
        self
    }

    /// Set the walker
    #[must_use]
    pub fn with_walker(mut self, walker: Walker) -> Self {
        self.walker = walker;
        self
    }
}

impl Schema {
    /// Describe every leaf of `bag`
    ///
    /// # Errors
    /// - [`SchemaError::Walk`] if the tree exceeds the walker's depth bound
    /// - [`SchemaError::Codec`] if a current value has no protocol form
    pub fn from_properties(
        bag: &PropertyBag,
        options: &AutoSchemaOptions,
    ) -> Result<Self, SchemaError> {
        let mut groups = vec![GroupDescriptor::root()];
        let mut group_ids: HashMap<String, u32> = HashMap::new();
        let mut params = Vec::new();

        for leaf in options.walker.leaves(bag) {
            let leaf = leaf?;
            let path: PropertyPath = leaf
                .name
                .parse()
                .map_err(|source| SchemaError::InvalidName {
                    name: leaf.name.clone(),
                    source,
                })?;

            let mut group = ROOT_GROUP;
            for ancestor in path.ancestors() {
                let prefix = ancestor.to_string();
                group = match group_ids.get(&prefix) {
                    Some(&id) => id,
                    None => {
                        let id = u32::try_from(groups.len()).unwrap_or(u32::MAX);
                        groups.push(GroupDescriptor::new(id, group, prefix.clone()));
                        group_ids.insert(prefix, id);
                        id
                    }
                };
            }

            let default = codec::encode(leaf.value).map_err(|source| SchemaError::Codec {
                name: leaf.name.clone(),
                source,
            })?;
            let mut param = ParamDescriptor::new(leaf.name, default)
                .with_level(options.level)
                .in_group(group);
            if let Some((min, max)) = bounds_for(leaf.value.kind()) {
                param = param.with_range(min, max);
            }
            params.push(param);
        }

        Schema::with_groups(groups, params)
    }
}

/// Bounds the protocol can carry but the property kind cannot
fn bounds_for(kind: ScalarKind) -> Option<(FieldValue, FieldValue)> {
    match kind {
        ScalarKind::UInt => Some((FieldValue::Int(0), FieldValue::Int(i32::MAX))),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use reconf_property::{Composite, PropertyBag, Scalar};
    use reconf_protocol::FieldType;

    fn bag() -> PropertyBag {
        PropertyBag::new()
            .with("int_param", Scalar::Int(0))
            .with("uint_param", Scalar::UInt(5))
            .with("bag_param", PropertyBag::new().with("str_param", Scalar::from("s")))
            .with("vector3_param", Composite::vector3(1.0, 2.0, 3.0))
    }

    #[test]
    fn derives_params_and_groups() {
        let schema =
            Schema::from_properties(&bag(), &AutoSchemaOptions::default().with_level(4)).unwrap();

        assert_eq!(
            schema.names().collect::<Vec<_>>(),
            vec![
                "int_param",
                "uint_param",
                "bag_param.str_param",
                "vector3_param.x",
                "vector3_param.y",
                "vector3_param.z",
            ]
        );
        let names: Vec<_> = schema.groups().iter().map(|g| g.name.as_str()).collect();
        assert_eq!(names, vec!["Default", "bag_param", "vector3_param"]);

        let x = schema.lookup("vector3_param.x").unwrap();
        assert_eq!(x.ty, FieldType::Double);
        assert_eq!(x.default, FieldValue::Double(1.0));
        assert_eq!(x.level, 4);
        assert_eq!(x.group, 2);
    }

    #[test]
    fn uint_gets_protocol_bounds() {
        let schema = Schema::from_properties(&bag(), &AutoSchemaOptions::default()).unwrap();
        let p = schema.lookup("uint_param").unwrap();
        assert_eq!(p.min, Some(FieldValue::Int(0)));
        assert_eq!(p.max, Some(FieldValue::Int(i32::MAX)));
        assert_eq!(schema.lookup("int_param").unwrap().min, None);
    }

    #[test]
    fn unencodable_value_fails() {
        let bag = PropertyBag::new().with("big", Scalar::UInt(u32::MAX));
        assert!(matches!(
            Schema::from_properties(&bag, &AutoSchemaOptions::default()),
            Err(SchemaError::Codec { .. })
        ));
    }

    #[test]
    fn depth_bound_applies() {
        let bag = PropertyBag::new().with("a", PropertyBag::new().with("b", Scalar::Int(1)));
        let options = AutoSchemaOptions::default().with_walker(Walker::new(1));
        assert!(matches!(
            Schema::from_properties(&bag, &options),
            Err(SchemaError::Walk(_))
        ));
    }
}
