//! Abstract Heap Location
//!
//! Field-based heap abstraction: every instance of a field shares one
//! location, and all array contents share one location. Locations are
//! interned by the [`LocationFactory`], so asking for the same field twice
//! yields the same id.

use crate::shared::models::FieldRef;
use dashmap::DashMap;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Unique identifier for abstract locations
pub type LocationId = u32;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LocationKind {
    Field(FieldRef),
    ArrayContents,
}

/// Abstract representation of a set of heap cells
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AbstractLocation {
    /// Unique numeric ID for efficient set operations
    pub id: LocationId,
    pub kind: LocationKind,
}

impl AbstractLocation {
    #[inline]
    pub fn new(id: LocationId, kind: LocationKind) -> Self {
        Self { id, kind }
    }

    #[inline]
    pub fn is_array_contents(&self) -> bool {
        matches!(self.kind, LocationKind::ArrayContents)
    }
}

impl fmt::Display for AbstractLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            LocationKind::Field(field) => write!(f, "loc{}:{}", self.id, field),
            LocationKind::ArrayContents => write!(f, "loc{}:[]", self.id),
        }
    }
}

/// Interning factory for abstract locations; safe to share between threads
#[derive(Debug)]
pub struct LocationFactory {
    next_id: AtomicU32,
    interned: DashMap<LocationKind, Arc<AbstractLocation>>,
}

impl Default for LocationFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl LocationFactory {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU32::new(1), // 0 is reserved for null
            interned: DashMap::new(),
        }
    }

    /// Location for `kind`, created on first request
    pub fn intern(&self, kind: LocationKind) -> Arc<AbstractLocation> {
        self.interned
            .entry(kind.clone())
            .or_insert_with(|| {
                let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                Arc::new(AbstractLocation::new(id, kind))
            })
            .clone()
    }

    pub fn field(&self, field: &FieldRef) -> Arc<AbstractLocation> {
        self.intern(LocationKind::Field(field.clone()))
    }

    pub fn array_contents(&self) -> Arc<AbstractLocation> {
        self.intern(LocationKind::ArrayContents)
    }

    /// Current count of created locations
    #[inline]
    pub fn count(&self) -> usize {
        self.interned.len()
    }
}
