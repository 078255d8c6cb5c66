//! Port set model shared by discovery and the tunnel supervisor.
//!
//! Forwarding is always same-port local-to-remote, so a single port number
//! identifies both ends of a forward. Sets are compared for equality
//! irrespective of the order (or duplication) of the ports they were built
//! from; that comparison is what decides whether the tunnel gets restarted.

use std::collections::BTreeSet;
use std::fmt;

/// An order-independent set of TCP ports.
///
/// Building a `PortSet` from an iterator deduplicates, so two sets built
/// from `[443, 80, 80]` and `[80, 443]` compare equal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PortSet(BTreeSet<u16>);

impl PortSet {
    /// Create an empty port set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a port. Returns `false` if it was already present.
    pub fn insert(&mut self, port: u16) -> bool {
        self.0.insert(port)
    }

    /// Check whether a port is in the set.
    pub fn contains(&self, port: u16) -> bool {
        self.0.contains(&port)
    }

    /// Number of ports in the set.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Remove all ports.
    pub fn clear(&mut self) {
        self.0.clear();
    }

    /// Iterate over the ports in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = u16> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<u16> for PortSet {
    fn from_iter<I: IntoIterator<Item = u16>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Extend<u16> for PortSet {
    fn extend<I: IntoIterator<Item = u16>>(&mut self, iter: I) {
        self.0.extend(iter);
    }
}

impl fmt::Display for PortSet {
    /// Newline-joined port list, the control surface's `/ports` format.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for port in &self.0 {
            if !first {
                writeln!(f)?;
            }
            write!(f, "{}", port)?;
            first = false;
        }
        Ok(())
    }
}

/// Check whether two port sets differ.
///
/// Returns `true` iff the symmetric difference of `a` and `b` is non-empty.
/// Symmetric (`differs(a, b) == differs(b, a)`) and insensitive to the order
/// or duplication of the inputs the sets were built from.
pub fn differs(a: &PortSet, b: &PortSet) -> bool {
    a != b
}
