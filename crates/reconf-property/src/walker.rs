//! Property tree walker
//!
//! Maps dotted names onto a [`PropertyBag`]: bags are recursed into, composite
//! properties are decomposed into one leaf per field (`outer.x`, `outer.y`).
//! Every walk is bounded by a maximum path length.

use crate::fingerprint::{Fingerprint, FingerprintBuilder};
use crate::path::{PathError, PropertyPath};
use crate::value::{Property, PropertyBag, PropertyValue, Scalar};

/// Default bound on the number of segments in any leaf path
pub const DEFAULT_MAX_DEPTH: usize = 32;

/// A leaf yielded by [`Walker::leaves`]
#[derive(Debug, Clone, PartialEq)]
pub struct Leaf<'a> {
    /// Dotted name of the leaf
    pub name: String,
    /// Current value
    pub value: &'a Scalar,
}

/// Whether a path already resolves to a leaf or would have to be created
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    /// Leaf exists
    Existing,
    /// Leaf (and possibly some ancestors) would be created by `materialize`
    Missing,
}

/// Depth-bounded walker over property trees
#[derive(Debug, Clone, Copy)]
pub struct Walker {
    max_depth: usize,
}

impl Walker {
    /// Walker with a custom depth bound (at least 1)
    #[inline]
    #[must_use]
    pub fn new(max_depth: usize) -> Self {
        Self {
            max_depth: max_depth.max(1),
        }
    }

    /// Configured depth bound
    #[inline]
    #[must_use]
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Lazy iteration over every leaf, in bag order
    ///
    /// The iterator yields an error (and then stops) when a container would
    /// push leaf paths past the depth bound. Call again to restart.
    #[must_use]
    pub fn leaves<'a>(&self, bag: &'a PropertyBag) -> Leaves<'a> {
        Leaves {
            max_depth: self.max_depth,
            stack: vec![Frame::Bag {
                prefix: PropertyPath::root(),
                iter: bag.iter(),
            }],
        }
    }

    /// Visit every leaf mutably, in bag order
    ///
    /// # Errors
    /// Returns the first error produced by the visitor, or
    /// [`WalkError::DepthExceeded`] for over-deep trees.
    pub fn for_each_leaf_mut<F, E>(&self, bag: &mut PropertyBag, mut visitor: F) -> Result<(), E>
    where
        F: FnMut(&PropertyPath, &mut Scalar) -> Result<(), E>,
        E: From<WalkError>,
    {
        self.visit_bag_mut(bag, &PropertyPath::root(), &mut visitor)
    }

    fn visit_bag_mut<F, E>(
        &self,
        bag: &mut PropertyBag,
        prefix: &PropertyPath,
        visitor: &mut F,
    ) -> Result<(), E>
    where
        F: FnMut(&PropertyPath, &mut Scalar) -> Result<(), E>,
        E: From<WalkError>,
    {
        for (name, property) in bag.iter_mut() {
            let path = prefix.child(name.as_str());
            match &mut property.value {
                PropertyValue::Scalar(value) => visitor(&path, value)?,
                PropertyValue::Composite(composite) => {
                    self.check_children(&path)?;
                    for (field, value) in composite.fields_mut() {
                        visitor(&path.child(field.as_str()), value)?;
                    }
                }
                PropertyValue::Bag(inner) => {
                    self.check_children(&path)?;
                    self.visit_bag_mut(inner, &path, visitor)?;
                }
            }
        }
        Ok(())
    }

    fn check_children(&self, container: &PropertyPath) -> Result<(), WalkError> {
        if container.len() + 1 > self.max_depth {
            return Err(WalkError::DepthExceeded {
                path: container.to_string(),
                max_depth: self.max_depth,
            });
        }
        Ok(())
    }

    fn check_path(&self, path: &PropertyPath) -> Result<(), WalkError> {
        if path.is_empty() {
            return Err(WalkError::EmptyPath);
        }
        if path.len() > self.max_depth {
            return Err(WalkError::DepthExceeded {
                path: path.to_string(),
                max_depth: self.max_depth,
            });
        }
        Ok(())
    }

    /// Resolve a dotted path to its leaf
    ///
    /// # Errors
    /// - [`WalkError::NotFound`] if any segment is missing
    /// - [`WalkError::NotALeaf`] if the path ends at a bag or composite
    /// - [`WalkError::NotAContainer`] if the path descends through a scalar
    pub fn resolve<'a>(
        &self,
        bag: &'a PropertyBag,
        path: &PropertyPath,
    ) -> Result<&'a Scalar, WalkError> {
        self.check_path(path)?;
        resolve_in(bag, path.segments(), path)
    }

    /// Mutable variant of [`Self::resolve`]
    ///
    /// # Errors
    /// Same as [`Self::resolve`].
    pub fn resolve_mut<'a>(
        &self,
        bag: &'a mut PropertyBag,
        path: &PropertyPath,
    ) -> Result<&'a mut Scalar, WalkError> {
        self.check_path(path)?;
        resolve_in_mut(bag, path.segments(), path)
    }

    /// Check, without mutating, whether `materialize` would succeed
    ///
    /// # Errors
    /// The error `materialize` would return.
    pub fn can_materialize(
        &self,
        bag: &PropertyBag,
        path: &PropertyPath,
    ) -> Result<Presence, WalkError> {
        self.check_path(path)?;
        probe_in(bag, path.segments(), path)
    }

    /// Resolve a leaf, creating missing intermediate bags and the leaf itself
    ///
    /// An existing leaf is returned untouched; `initial` is only used when the
    /// leaf has to be created. Composites have a fixed layout, so a missing
    /// composite field is an error rather than a creation.
    ///
    /// # Errors
    /// - [`WalkError::NotAContainer`] if an ancestor is a scalar
    /// - [`WalkError::FixedLayout`] if a composite lacks the field
    /// - [`WalkError::NotALeaf`] if the path ends at a container
    pub fn materialize<'a>(
        &self,
        bag: &'a mut PropertyBag,
        path: &PropertyPath,
        initial: Scalar,
    ) -> Result<&'a mut Scalar, WalkError> {
        self.check_path(path)?;
        // Probe first so a failing call never leaves half-built bags behind
        probe_in(bag, path.segments(), path)?;
        materialize_in(bag, path.segments(), path, initial)
    }

    /// Fingerprint of the tree's leaf names and kinds
    ///
    /// # Errors
    /// [`WalkError::DepthExceeded`] for over-deep trees.
    pub fn shape_fingerprint(&self, bag: &PropertyBag) -> Result<Fingerprint, WalkError> {
        let mut builder = FingerprintBuilder::new();
        for leaf in self.leaves(bag) {
            let leaf = leaf?;
            builder.token(&leaf.name).token(leaf.value.kind().name());
        }
        Ok(builder.finish())
    }
}

impl Default for Walker {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DEPTH)
    }
}

fn resolve_in<'a>(
    bag: &'a PropertyBag,
    segments: &[String],
    path: &PropertyPath,
) -> Result<&'a Scalar, WalkError> {
    let (head, rest) = segments.split_first().ok_or(WalkError::EmptyPath)?;
    let property = bag.get(head).ok_or_else(|| WalkError::not_found(path))?;
    match (&property.value, rest) {
        (PropertyValue::Scalar(value), []) => Ok(value),
        (PropertyValue::Bag(inner), [_, ..]) => resolve_in(inner, rest, path),
        (PropertyValue::Composite(composite), [field]) => composite
            .field(field)
            .ok_or_else(|| WalkError::not_found(path)),
        (PropertyValue::Scalar(_) | PropertyValue::Composite(_), [_, ..]) => {
            Err(WalkError::not_a_container(path, segments, rest))
        }
        (PropertyValue::Bag(_) | PropertyValue::Composite(_), []) => {
            Err(WalkError::NotALeaf {
                path: path.to_string(),
            })
        }
    }
}

fn resolve_in_mut<'a>(
    bag: &'a mut PropertyBag,
    segments: &[String],
    path: &PropertyPath,
) -> Result<&'a mut Scalar, WalkError> {
    let (head, rest) = segments.split_first().ok_or(WalkError::EmptyPath)?;
    let property = bag.get_mut(head).ok_or_else(|| WalkError::not_found(path))?;
    match (&mut property.value, rest) {
        (PropertyValue::Scalar(value), []) => Ok(value),
        (PropertyValue::Bag(inner), [_, ..]) => resolve_in_mut(inner, rest, path),
        (PropertyValue::Composite(composite), [field]) => composite
            .field_mut(field)
            .ok_or_else(|| WalkError::not_found(path)),
        (PropertyValue::Scalar(_) | PropertyValue::Composite(_), [_, ..]) => {
            Err(WalkError::not_a_container(path, segments, rest))
        }
        (PropertyValue::Bag(_) | PropertyValue::Composite(_), []) => {
            Err(WalkError::NotALeaf {
                path: path.to_string(),
            })
        }
    }
}

fn probe_in(
    bag: &PropertyBag,
    segments: &[String],
    path: &PropertyPath,
) -> Result<Presence, WalkError> {
    let (head, rest) = segments.split_first().ok_or(WalkError::EmptyPath)?;
    let Some(property) = bag.get(head) else {
        return Ok(Presence::Missing);
    };
    match (&property.value, rest) {
        (PropertyValue::Scalar(_), []) => Ok(Presence::Existing),
        (PropertyValue::Bag(inner), [_, ..]) => probe_in(inner, rest, path),
        (PropertyValue::Composite(composite), [field]) => {
            if composite.field(field).is_some() {
                Ok(Presence::Existing)
            } else {
                Err(WalkError::FixedLayout {
                    composite: composite.type_name().to_string(),
                    field: path.to_string(),
                })
            }
        }
        (PropertyValue::Scalar(_) | PropertyValue::Composite(_), [_, ..]) => {
            Err(WalkError::not_a_container(path, segments, rest))
        }
        (PropertyValue::Bag(_) | PropertyValue::Composite(_), []) => {
            Err(WalkError::NotALeaf {
                path: path.to_string(),
            })
        }
    }
}

fn materialize_in<'a>(
    bag: &'a mut PropertyBag,
    segments: &[String],
    path: &PropertyPath,
    initial: Scalar,
) -> Result<&'a mut Scalar, WalkError> {
    let (head, rest) = segments.split_first().ok_or(WalkError::EmptyPath)?;
    if !bag.contains(head) {
        let value = if rest.is_empty() {
            PropertyValue::Scalar(initial.clone())
        } else {
            PropertyValue::Bag(PropertyBag::new())
        };
        bag.add(head.clone(), Property::new(value));
    }
    let property = bag.get_mut(head).ok_or_else(|| WalkError::not_found(path))?;
    match (&mut property.value, rest) {
        (PropertyValue::Scalar(value), []) => Ok(value),
        (PropertyValue::Bag(inner), [_, ..]) => materialize_in(inner, rest, path, initial),
        (PropertyValue::Composite(composite), [field]) => {
            let type_name = composite.type_name().to_string();
            composite.field_mut(field).ok_or_else(|| WalkError::FixedLayout {
                composite: type_name,
                field: path.to_string(),
            })
        }
        (PropertyValue::Scalar(_) | PropertyValue::Composite(_), [_, ..]) => {
            Err(WalkError::not_a_container(path, segments, rest))
        }
        (PropertyValue::Bag(_) | PropertyValue::Composite(_), []) => {
            Err(WalkError::NotALeaf {
                path: path.to_string(),
            })
        }
    }
}

/// Lazy leaf iterator returned by [`Walker::leaves`]
#[derive(Debug)]
pub struct Leaves<'a> {
    max_depth: usize,
    stack: Vec<Frame<'a>>,
}

#[derive(Debug)]
enum Frame<'a> {
    Bag {
        prefix: PropertyPath,
        iter: indexmap::map::Iter<'a, String, Property>,
    },
    Composite {
        prefix: PropertyPath,
        iter: indexmap::map::Iter<'a, String, Scalar>,
    },
}

enum Step<'a> {
    Yield(Leaf<'a>),
    Push(Frame<'a>),
    Pop,
    Fail(WalkError),
}

impl<'a> Iterator for Leaves<'a> {
    type Item = Result<Leaf<'a>, WalkError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let step = match self.stack.last_mut()? {
                Frame::Composite { prefix, iter } => match iter.next() {
                    Some((field, value)) => Step::Yield(Leaf {
                        name: prefix.child(field.as_str()).to_string(),
                        value,
                    }),
                    None => Step::Pop,
                },
                Frame::Bag { prefix, iter } => match iter.next() {
                    None => Step::Pop,
                    Some((name, property)) => {
                        let path = prefix.child(name.as_str());
                        match &property.value {
                            PropertyValue::Scalar(value) => Step::Yield(Leaf {
                                name: path.to_string(),
                                value,
                            }),
                            _ if path.len() + 1 > self.max_depth => {
                                Step::Fail(WalkError::DepthExceeded {
                                    path: path.to_string(),
                                    max_depth: self.max_depth,
                                })
                            }
                            PropertyValue::Composite(composite) => Step::Push(Frame::Composite {
                                prefix: path,
                                iter: composite.fields(),
                            }),
                            PropertyValue::Bag(inner) => Step::Push(Frame::Bag {
                                prefix: path,
                                iter: inner.iter(),
                            }),
                        }
                    }
                },
            };

            match step {
                Step::Yield(leaf) => return Some(Ok(leaf)),
                Step::Push(frame) => self.stack.push(frame),
                Step::Pop => {
                    self.stack.pop();
                }
                Step::Fail(err) => {
                    self.stack.clear();
                    return Some(Err(err));
                }
            }
        }
    }
}

/// Errors while walking a property tree
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WalkError {
    /// No property at this path
    #[error("no property at '{path}'")]
    NotFound {
        /// Requested path
        path: String,
    },

    /// Path ends at a bag or composite, not a leaf
    #[error("'{path}' is a container, not a leaf")]
    NotALeaf {
        /// Requested path
        path: String,
    },

    /// Path descends through a scalar
    #[error("'{path}' is a scalar and cannot contain '{child}'")]
    NotAContainer {
        /// The scalar (or composite field) blocking the descent
        path: String,
        /// The segment that could not be entered
        child: String,
    },

    /// Composite has no such field and cannot grow one
    #[error("composite {composite} has a fixed layout without '{field}'")]
    FixedLayout {
        /// Composite type name
        composite: String,
        /// Requested field path
        field: String,
    },

    /// Leaf kind does not match what the caller requires
    #[error("'{path}' holds a {found} but {expected} is required")]
    KindMismatch {
        /// Leaf path
        path: String,
        /// Required kind or type
        expected: String,
        /// Actual kind
        found: String,
    },

    /// Path longer than the configured bound
    #[error("'{path}' exceeds the maximum depth of {max_depth}")]
    DepthExceeded {
        /// Offending path
        path: String,
        /// Configured bound
        max_depth: usize,
    },

    /// The root itself is not addressable
    #[error("empty property path")]
    EmptyPath,

    /// Malformed dotted name
    #[error("invalid path: {0}")]
    Path(#[from] PathError),
}

impl WalkError {
    fn not_found(path: &PropertyPath) -> Self {
        Self::NotFound {
            path: path.to_string(),
        }
    }

    fn not_a_container(path: &PropertyPath, segments: &[String], rest: &[String]) -> Self {
        let consumed = path.len() - segments.len() + 1;
        Self::NotAContainer {
            path: path.segments()[..consumed].join("."),
            child: rest.first().cloned().unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Composite;

    fn sample() -> PropertyBag {
        PropertyBag::new()
            .with("int_param", Scalar::Int(0))
            .with(
                "bag_param",
                PropertyBag::new().with("str_param", Scalar::from("inner")),
            )
            .with("vector3_param", Composite::vector3(1.0, 2.0, 3.0))
    }

    fn path(s: &str) -> PropertyPath {
        s.parse().unwrap()
    }

    #[test]
    fn leaves_in_order_with_dotted_names() {
        let bag = sample();
        let names: Vec<String> = Walker::default()
            .leaves(&bag)
            .map(|leaf| leaf.unwrap().name)
            .collect();
        assert_eq!(
            names,
            vec![
                "int_param",
                "bag_param.str_param",
                "vector3_param.x",
                "vector3_param.y",
                "vector3_param.z",
            ]
        );
    }

    #[test]
    fn leaves_restartable() {
        let bag = sample();
        let walker = Walker::default();
        assert_eq!(walker.leaves(&bag).count(), walker.leaves(&bag).count());
    }

    #[test]
    fn leaves_fail_past_depth() {
        let deep = PropertyBag::new().with(
            "a",
            PropertyBag::new().with("b", PropertyBag::new().with("c", Scalar::Int(1))),
        );
        let items: Vec<_> = Walker::new(2).leaves(&deep).collect();
        assert_eq!(items.len(), 1);
        assert!(matches!(
            items[0],
            Err(WalkError::DepthExceeded { ref path, max_depth: 2 }) if path == "a.b"
        ));
        assert_eq!(Walker::new(3).leaves(&deep).count(), 1);
    }

    #[test]
    fn resolve_scalar_bag_and_composite() {
        let bag = sample();
        let walker = Walker::default();
        assert_eq!(walker.resolve(&bag, &path("int_param")), Ok(&Scalar::Int(0)));
        assert_eq!(
            walker.resolve(&bag, &path("bag_param.str_param")),
            Ok(&Scalar::from("inner"))
        );
        assert_eq!(
            walker.resolve(&bag, &path("vector3_param.y")),
            Ok(&Scalar::Double(2.0))
        );
    }

    #[test]
    fn resolve_errors() {
        let bag = sample();
        let walker = Walker::default();
        assert!(matches!(
            walker.resolve(&bag, &path("missing")),
            Err(WalkError::NotFound { .. })
        ));
        assert!(matches!(
            walker.resolve(&bag, &path("vector3_param.w")),
            Err(WalkError::NotFound { .. })
        ));
        assert!(matches!(
            walker.resolve(&bag, &path("bag_param")),
            Err(WalkError::NotALeaf { .. })
        ));
        assert_eq!(
            walker.resolve(&bag, &path("int_param.x")),
            Err(WalkError::NotAContainer {
                path: "int_param".into(),
                child: "x".into()
            })
        );
        assert_eq!(
            walker.resolve(&bag, &PropertyPath::root()),
            Err(WalkError::EmptyPath)
        );
    }

    #[test]
    fn resolve_mut_writes_composite_field() {
        let mut bag = sample();
        let walker = Walker::default();
        *walker.resolve_mut(&mut bag, &path("vector3_param.x")).unwrap() = Scalar::Double(5.0);
        assert_eq!(
            walker.resolve(&bag, &path("vector3_param.x")),
            Ok(&Scalar::Double(5.0))
        );
    }

    #[test]
    fn materialize_creates_intermediate_bags() {
        let mut bag = sample();
        let walker = Walker::default();
        let target = path("new_bag.inner.flag");
        assert_eq!(walker.can_materialize(&bag, &target), Ok(Presence::Missing));

        let leaf = walker.materialize(&mut bag, &target, Scalar::Bool(true)).unwrap();
        assert_eq!(leaf, &Scalar::Bool(true));
        assert_eq!(walker.can_materialize(&bag, &target), Ok(Presence::Existing));
        assert!(matches!(
            bag.get("new_bag").unwrap().value,
            PropertyValue::Bag(_)
        ));
    }

    #[test]
    fn materialize_keeps_existing_value() {
        let mut bag = sample();
        let leaf = Walker::default()
            .materialize(&mut bag, &path("int_param"), Scalar::Int(99))
            .unwrap();
        assert_eq!(leaf, &Scalar::Int(0));
    }

    #[test]
    fn materialize_rejects_fixed_layout_without_mutation() {
        let mut bag = sample();
        let before = bag.clone();
        let result = Walker::default().materialize(
            &mut bag,
            &path("vector3_param.w"),
            Scalar::Double(0.0),
        );
        assert!(matches!(result, Err(WalkError::FixedLayout { .. })));
        assert_eq!(bag, before);
    }

    #[test]
    fn materialize_rejects_scalar_ancestor() {
        let mut bag = sample();
        let result =
            Walker::default().materialize(&mut bag, &path("int_param.sub"), Scalar::Int(1));
        assert!(matches!(result, Err(WalkError::NotAContainer { .. })));
    }

    #[test]
    fn materialize_respects_depth() {
        let mut bag = PropertyBag::new();
        let result = Walker::new(2).materialize(&mut bag, &path("a.b.c"), Scalar::Int(1));
        assert!(matches!(result, Err(WalkError::DepthExceeded { .. })));
        assert!(bag.is_empty());
    }

    #[test]
    fn for_each_leaf_mut_visits_all() {
        let mut bag = PropertyBag::new()
            .with("a", Scalar::Int(1))
            .with("v", Composite::vector3(1.0, 1.0, 1.0));
        let mut seen = Vec::new();
        Walker::default()
            .for_each_leaf_mut::<_, WalkError>(&mut bag, |path, value| {
                seen.push(path.to_string());
                if let Scalar::Double(d) = value {
                    *d *= 2.0;
                }
                Ok(())
            })
            .unwrap();
        assert_eq!(seen, vec!["a", "v.x", "v.y", "v.z"]);
        assert_eq!(
            Walker::default().resolve(&bag, &path("v.z")),
            Ok(&Scalar::Double(2.0))
        );
    }

    #[test]
    fn shape_fingerprint_ignores_values() {
        let walker = Walker::default();
        let a = sample();
        let mut b = sample();
        *walker.resolve_mut(&mut b, &path("int_param")).unwrap() = Scalar::Int(42);
        assert_eq!(
            walker.shape_fingerprint(&a).unwrap(),
            walker.shape_fingerprint(&b).unwrap()
        );

        b.add_property("extra", Scalar::Bool(false));
        assert_ne!(
            walker.shape_fingerprint(&a).unwrap(),
            walker.shape_fingerprint(&b).unwrap()
        );
    }

    #[test]
    fn shape_fingerprint_sees_kind_change() {
        let walker = Walker::default();
        let a = PropertyBag::new().with("p", Scalar::Int(1));
        let b = PropertyBag::new().with("p", Scalar::UInt(1));
        assert_ne!(
            walker.shape_fingerprint(&a).unwrap(),
            walker.shape_fingerprint(&b).unwrap()
        );
    }
}
