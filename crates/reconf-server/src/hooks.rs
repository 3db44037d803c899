//! Update and notify hooks
//!
//! The update hook runs before any write and may veto the request. Its
//! mutable form may also adjust or drop proposed values. The notify hook runs
//! after the write with the resulting level bits.

use indexmap::IndexMap;
use parking_lot::RwLock;
use reconf_property::Scalar;
use std::fmt;
use std::sync::Arc;

/// One pending property change
#[derive(Debug, Clone, PartialEq)]
pub struct Change {
    /// Value before the request (`None` if the leaf will be created)
    pub old: Option<Scalar>,
    /// Value the request will write
    pub new: Scalar,
}

/// Ordered set of pending changes, keyed by dotted name
///
/// Only entries whose new value differs from the live value are present.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSet {
    changes: IndexMap<String, Change>,
}

impl ChangeSet {
    /// Empty change set
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record(&mut self, name: impl Into<String>, old: Option<Scalar>, new: Scalar) {
        self.changes.insert(name.into(), Change { old, new });
    }

    /// Change by name
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Change> {
        self.changes.get(name)
    }

    /// Pre-image of a changed property
    #[must_use]
    pub fn old(&self, name: &str) -> Option<&Scalar> {
        self.changes.get(name).and_then(|c| c.old.as_ref())
    }

    /// Proposed value of a changed property
    #[must_use]
    pub fn proposed(&self, name: &str) -> Option<&Scalar> {
        self.changes.get(name).map(|c| &c.new)
    }

    /// Whether `name` is about to change
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.changes.contains_key(name)
    }

    /// Replace the proposed value of a pending change
    ///
    /// # Errors
    /// - [`ProposalError::NotPending`] if `name` is not in the set
    /// - [`ProposalError::KindMismatch`] if `value` has a different kind
    pub fn propose(&mut self, name: &str, value: Scalar) -> Result<(), ProposalError> {
        let change = self
            .changes
            .get_mut(name)
            .ok_or_else(|| ProposalError::NotPending(name.to_string()))?;
        if change.new.kind() != value.kind() {
            return Err(ProposalError::KindMismatch {
                name: name.to_string(),
                expected: change.new.kind().to_string(),
                found: value.kind().to_string(),
            });
        }
        change.new = value;
        Ok(())
    }

    /// Drop a pending change, leaving the property untouched
    pub fn discard(&mut self, name: &str) -> Option<Change> {
        self.changes.shift_remove(name)
    }

    /// Changed names in request order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.changes.keys().map(String::as_str)
    }

    /// Changes in request order
    #[inline]
    pub fn iter(&self) -> indexmap::map::Iter<'_, String, Change> {
        self.changes.iter()
    }

    /// Number of changes
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.changes.len()
    }

    /// Whether nothing changes
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Drop entries whose proposed value equals the pre-image
    pub(crate) fn prune_unchanged(&mut self) {
        self.changes.retain(|_, c| c.old.as_ref() != Some(&c.new));
    }
}

impl<'a> IntoIterator for &'a ChangeSet {
    type Item = (&'a String, &'a Change);
    type IntoIter = indexmap::map::Iter<'a, String, Change>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Invalid adjustment by a mutable update hook
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProposalError {
    /// Name is not part of the change set
    #[error("'{0}' is not a pending change")]
    NotPending(String),

    /// Replacement has a different kind than the property
    #[error("'{name}': expected {expected}, got {found}")]
    KindMismatch {
        name: String,
        expected: String,
        found: String,
    },
}

/// Failure reported by a hook
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct HookError(pub String);

impl HookError {
    /// Hook error with a reason
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }
}

impl From<ProposalError> for HookError {
    fn from(err: ProposalError) -> Self {
        Self(err.to_string())
    }
}

/// Update hook that may adjust the change set
pub type MutableUpdateFn = dyn Fn(&mut ChangeSet, u32) -> Result<(), HookError> + Send + Sync;
/// Update hook that only inspects the change set
pub type ReadOnlyUpdateFn = dyn Fn(&ChangeSet, u32) -> Result<(), HookError> + Send + Sync;
/// Notify hook, called with the level bits after a commit
pub type NotifyFn = dyn Fn(u32) -> Result<(), HookError> + Send + Sync;

/// Registered update hook
#[derive(Clone)]
pub enum UpdateHook {
    /// May change or drop proposed values
    Mutable(Arc<MutableUpdateFn>),
    /// Inspects only
    ReadOnly(Arc<ReadOnlyUpdateFn>),
}

impl UpdateHook {
    /// Wrap a mutable hook
    pub fn mutable<F>(f: F) -> Self
    where
        F: Fn(&mut ChangeSet, u32) -> Result<(), HookError> + Send + Sync + 'static,
    {
        Self::Mutable(Arc::new(f))
    }

    /// Wrap a read-only hook
    pub fn read_only<F>(f: F) -> Self
    where
        F: Fn(&ChangeSet, u32) -> Result<(), HookError> + Send + Sync + 'static,
    {
        Self::ReadOnly(Arc::new(f))
    }

    /// Whether this is the mutable form
    #[inline]
    #[must_use]
    pub fn is_mutable(&self) -> bool {
        matches!(self, Self::Mutable(_))
    }

    pub(crate) fn invoke(&self, changes: &mut ChangeSet, level: u32) -> Result<(), HookError> {
        match self {
            Self::Mutable(f) => f(changes, level),
            Self::ReadOnly(f) => f(&*changes, level),
        }
    }
}

impl fmt::Debug for UpdateHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mutable(_) => f.write_str("UpdateHook::Mutable"),
            Self::ReadOnly(_) => f.write_str("UpdateHook::ReadOnly"),
        }
    }
}

/// Hook registry owned by a server
#[derive(Default)]
pub struct Hooks {
    update: RwLock<Option<UpdateHook>>,
    notify: RwLock<Option<Arc<NotifyFn>>>,
}

impl Hooks {
    /// Install an update hook, returning whether it was installed
    ///
    /// A read-only hook never displaces a mutable one.
    pub fn set_update_hook(&self, hook: UpdateHook) -> bool {
        let mut slot = self.update.write();
        if !hook.is_mutable() && slot.as_ref().is_some_and(UpdateHook::is_mutable) {
            tracing::warn!("read-only update hook ignored: a mutable update hook is installed");
            return false;
        }
        *slot = Some(hook);
        true
    }

    /// Remove the update hook
    pub fn clear_update_hook(&self) {
        *self.update.write() = None;
    }

    /// Install the notify hook, replacing any previous one
    pub fn set_notify_hook<F>(&self, f: F)
    where
        F: Fn(u32) -> Result<(), HookError> + Send + Sync + 'static,
    {
        *self.notify.write() = Some(Arc::new(f));
    }

    /// Remove the notify hook
    pub fn clear_notify_hook(&self) {
        *self.notify.write() = None;
    }

    /// Current update hook
    #[must_use]
    pub fn update_hook(&self) -> Option<UpdateHook> {
        self.update.read().clone()
    }

    /// Current notify hook
    #[must_use]
    pub fn notify_hook(&self) -> Option<Arc<NotifyFn>> {
        self.notify.read().clone()
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("update", &*self.update.read())
            .field("notify", &self.notify.read().is_some())
            .finish()
    }
}
