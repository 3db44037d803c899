//! The schema: an indexed, validated set of parameter descriptors

use crate::descriptor::{GroupDescriptor, ParamDescriptor, RangePolicy, ROOT_GROUP};
use crate::error::{SchemaError, ValueError};
use reconf_property::{Fingerprint, FingerprintBuilder, PathError, PropertyPath};
use reconf_protocol::{ConfigMessage, FieldValue};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Serializable form of a schema
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SchemaDefinition {
    /// Groups; the root group is added when absent
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<GroupDescriptor>,
    /// Parameters in declaration order
    #[serde(default)]
    pub parameters: Vec<ParamDescriptor>,
}

/// Validated parameter schema
///
/// Names are unique, every default lies within its bounds and every
/// parameter belongs to a declared group. Lookups by name are O(1).
#[derive(Debug, Clone)]
pub struct Schema {
    params: Vec<ParamDescriptor>,
    index: HashMap<String, usize>,
    groups: Vec<GroupDescriptor>,
    fingerprint: Fingerprint,
}

impl Schema {
    /// Schema with only the root group
    ///
    /// # Errors
    /// See [`Self::with_groups`].
    pub fn new(params: Vec<ParamDescriptor>) -> Result<Self, SchemaError> {
        Self::with_groups(Vec::new(), params)
    }

    /// Schema with explicit groups
    ///
    /// # Errors
    /// - [`SchemaError::InvalidName`] for a name that is not a dotted path
    /// - [`SchemaError::DuplicateName`] / [`SchemaError::DuplicateGroup`]
    /// - [`SchemaError::OverlappingNames`] when one name is a prefix path of
    ///   another, since a leaf cannot also hold children
    /// - [`SchemaError::InvalidDefault`] / [`SchemaError::InvalidBound`] /
    ///   [`SchemaError::InvalidRange`] for inconsistent values
    /// - [`SchemaError::UnknownGroup`] / [`SchemaError::UnknownParentGroup`]
    pub fn with_groups(
        mut groups: Vec<GroupDescriptor>,
        mut params: Vec<ParamDescriptor>,
    ) -> Result<Self, SchemaError> {
        if !groups.iter().any(|g| g.id == ROOT_GROUP) {
            groups.insert(0, GroupDescriptor::root());
        }

        let mut ids = HashSet::with_capacity(groups.len());
        for group in &groups {
            if !ids.insert(group.id) {
                return Err(SchemaError::DuplicateGroup(group.id));
            }
        }
        for group in &groups {
            if !ids.contains(&group.parent) {
                return Err(SchemaError::UnknownParentGroup {
                    group: group.id,
                    parent: group.parent,
                });
            }
        }

        let mut index = HashMap::with_capacity(params.len());
        let mut paths = Vec::with_capacity(params.len());
        for (i, param) in params.iter_mut().enumerate() {
            let path = param
                .name
                .parse::<PropertyPath>()
                .and_then(|path| {
                    if path.is_empty() {
                        Err(PathError::EmptySegment(param.name.clone()))
                    } else {
                        Ok(path)
                    }
                });
            match path {
                Ok(path) => paths.push(path),
                Err(source) => {
                    return Err(SchemaError::InvalidName {
                        name: param.name.clone(),
                        source,
                    })
                }
            }
            if !ids.contains(&param.group) {
                return Err(SchemaError::UnknownGroup {
                    name: param.name.clone(),
                    group: param.group,
                });
            }
            param.normalize()?;
            if index.insert(param.name.clone(), i).is_some() {
                return Err(SchemaError::DuplicateName(param.name.clone()));
            }
        }

        // sorted by segments, every subtree is contiguous after its root
        paths.sort_unstable();
        for pair in paths.windows(2) {
            if pair[0].is_ancestor_of(&pair[1]) {
                return Err(SchemaError::OverlappingNames {
                    leaf: pair[0].to_string(),
                    nested: pair[1].to_string(),
                });
            }
        }

        let fingerprint = fingerprint_of(&groups, &params);
        Ok(Self {
            params,
            index,
            groups,
            fingerprint,
        })
    }

    /// Build from a definition
    ///
    /// # Errors
    /// See [`Self::with_groups`].
    pub fn from_definition(definition: SchemaDefinition) -> Result<Self, SchemaError> {
        Self::with_groups(definition.groups, definition.parameters)
    }

    /// Parse a YAML schema document
    ///
    /// # Errors
    /// [`SchemaError::Yaml`] or any validation error.
    pub fn from_yaml(yaml: &str) -> Result<Self, SchemaError> {
        Self::from_definition(serde_yaml::from_str(yaml)?)
    }

    /// Parse a JSON schema document
    ///
    /// # Errors
    /// [`SchemaError::Json`] or any validation error.
    pub fn from_json(json: &str) -> Result<Self, SchemaError> {
        Self::from_definition(serde_json::from_str(json)?)
    }

    /// Serializable copy
    #[must_use]
    pub fn definition(&self) -> SchemaDefinition {
        SchemaDefinition {
            groups: self.groups.clone(),
            parameters: self.params.clone(),
        }
    }

    /// Descriptor by name
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ParamDescriptor> {
        self.index.get(name).map(|&i| &self.params[i])
    }

    /// Descriptor by name
    ///
    /// # Errors
    /// [`SchemaError::NotFound`] if undeclared.
    pub fn lookup(&self, name: &str) -> Result<&ParamDescriptor, SchemaError> {
        self.get(name)
            .ok_or_else(|| SchemaError::NotFound(name.to_string()))
    }

    /// Whether `name` is declared
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Level bits of a declared parameter
    #[must_use]
    pub fn level_of(&self, name: &str) -> Option<u32> {
        self.get(name).map(|p| p.level)
    }

    /// Check a request value for `name`, `Ok(None)` if undeclared
    ///
    /// # Errors
    /// [`ValueError`] if the value fails the declared type or range.
    pub fn check_value(
        &self,
        name: &str,
        value: &FieldValue,
        policy: RangePolicy,
    ) -> Result<Option<FieldValue>, ValueError> {
        self.get(name).map(|p| p.check(value, policy)).transpose()
    }

    /// Parameters in declaration order
    #[inline]
    pub fn params(&self) -> &[ParamDescriptor] {
        &self.params
    }

    /// Parameter names in declaration order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.params.iter().map(|p| p.name.as_str())
    }

    /// Declared groups, root first
    #[inline]
    pub fn groups(&self) -> &[GroupDescriptor] {
        &self.groups
    }

    /// Parameters owned directly by `group`
    pub fn params_in_group(&self, group: u32) -> impl Iterator<Item = &ParamDescriptor> {
        self.params.iter().filter(move |p| p.group == group)
    }

    /// Identity over names, types, levels and groups
    ///
    /// Defaults, bounds and descriptions do not contribute.
    #[inline]
    #[must_use]
    pub fn fingerprint(&self) -> Fingerprint {
        self.fingerprint
    }

    /// Number of parameters
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// Whether no parameters are declared
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Message carrying every parameter's default
    #[must_use]
    pub fn defaults(&self) -> ConfigMessage {
        self.message(|p| Some(&p.default))
    }

    /// Message carrying every declared minimum
    #[must_use]
    pub fn minimums(&self) -> ConfigMessage {
        self.message(|p| p.min.as_ref())
    }

    /// Message carrying every declared maximum
    #[must_use]
    pub fn maximums(&self) -> ConfigMessage {
        self.message(|p| p.max.as_ref())
    }

    fn message<'a, F>(&'a self, pick: F) -> ConfigMessage
    where
        F: Fn(&'a ParamDescriptor) -> Option<&'a FieldValue>,
    {
        let mut message = ConfigMessage::new();
        for param in &self.params {
            if let Some(value) = pick(param) {
                message.insert(param.name.clone(), value.clone());
            }
        }
        message
    }
}

impl PartialEq for Schema {
    fn eq(&self, other: &Self) -> bool {
        self.params == other.params && self.groups == other.groups
    }
}

fn fingerprint_of(groups: &[GroupDescriptor], params: &[ParamDescriptor]) -> Fingerprint {
    let mut builder = FingerprintBuilder::new();
    for group in groups {
        builder
            .token("group")
            .token(&group.id.to_string())
            .token(&group.parent.to_string())
            .token(&group.name);
    }
    for param in params {
        builder
            .token("param")
            .token(&param.name)
            .token(param.ty.name())
            .token(&param.level.to_string())
            .token(&param.group.to_string());
    }
    builder.finish()
}
