//! Identity and association registry.
//!
//! Declares which side of each relationship owns the foreign key or bridge
//! rows, and derives the write order the cascade resolver follows. The
//! mapping is static; nothing here is inferred at runtime.

use std::collections::{HashMap, VecDeque};
use std::fmt;

use crate::error::{DbError, Result};
use crate::model::Entity;

/// The four entity kinds known to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityKind {
    User,
    Detail,
    Post,
    Tag,
}

impl EntityKind {
    pub const ALL: [EntityKind; 4] = [
        EntityKind::User,
        EntityKind::Detail,
        EntityKind::Post,
        EntityKind::Tag,
    ];

    /// Backing table name for this kind.
    pub fn table_name(self) -> &'static str {
        match self {
            EntityKind::User => "t_user",
            EntityKind::Detail => "t_detail",
            EntityKind::Post => "t_post",
            EntityKind::Tag => "t_tag",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityKind::User => "User",
            EntityKind::Detail => "Detail",
            EntityKind::Post => "Post",
            EntityKind::Tag => "Tag",
        };
        f.write_str(name)
    }
}

/// Relationship shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationShape {
    OneToOne,
    OneToMany,
    ManyToMany,
}

/// Per-relationship rule governing whether saving one side saves the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CascadePolicy {
    /// Related entities are inserted or updated along with the source
    Full,
    /// New related entities are inserted; persisted ones are only referenced
    PersistOnly,
    /// The caller must have saved the related entity beforehand
    None,
}

/// A declared relationship between two entity kinds.
///
/// `owning` names the side whose table holds the foreign key column (or the
/// bridge rows) and is the source of truth when writing. The other side is a
/// mirror kept consistent in memory but never itself persisted.
#[derive(Debug, Clone, Copy)]
pub struct Relationship {
    pub name: &'static str,
    pub shape: RelationShape,
    pub source: EntityKind,
    pub target: EntityKind,
    pub owning: EntityKind,
    pub cascade: CascadePolicy,
}

/// The three canonical relationships.
pub const RELATIONSHIPS: &[Relationship] = &[
    Relationship {
        name: "user_detail",
        shape: RelationShape::OneToOne,
        source: EntityKind::User,
        target: EntityKind::Detail,
        owning: EntityKind::Detail,
        cascade: CascadePolicy::Full,
    },
    Relationship {
        name: "user_posts",
        shape: RelationShape::OneToMany,
        source: EntityKind::User,
        target: EntityKind::Post,
        owning: EntityKind::Post,
        cascade: CascadePolicy::Full,
    },
    Relationship {
        name: "post_tags",
        shape: RelationShape::ManyToMany,
        source: EntityKind::Post,
        target: EntityKind::Tag,
        owning: EntityKind::Post,
        cascade: CascadePolicy::PersistOnly,
    },
];

/// Returns true iff the entity has no assigned identifier.
pub fn is_new<E: Entity>(entity: &E) -> bool {
    entity.entity_id().is_none()
}

/// Returns the side of the relationship whose save operation writes the
/// foreign key or bridge rows.
pub fn owning_side_of(rel: &Relationship) -> EntityKind {
    rel.owning
}

/// A lookup helper for tests and diagnostics.
pub fn relationship(name: &str) -> Option<&'static Relationship> {
    RELATIONSHIPS.iter().find(|rel| rel.name == name)
}

/// Derives a write order over entity kinds from foreign-key ownership edges.
///
/// For one-to-one and one-to-many relationships the referenced kind must be
/// written before the owning kind, so its identifier exists when the foreign
/// key row is committed. Many-to-many relationships contribute no row
/// ordering edge; their bridge rows are reconciled after all entity rows.
///
/// Fails with [`DbError::CyclicDependency`] when the edges contain a cycle.
pub fn dependency_order(rels: &[Relationship]) -> Result<Vec<EntityKind>> {
    let mut indegree: HashMap<EntityKind, usize> =
        EntityKind::ALL.iter().map(|kind| (*kind, 0)).collect();
    let mut outgoing: Vec<(EntityKind, EntityKind)> = Vec::new();

    for rel in rels {
        if rel.shape == RelationShape::ManyToMany {
            continue;
        }
        let owning = owning_side_of(rel);
        let referenced = if owning == rel.source {
            rel.target
        } else {
            rel.source
        };
        outgoing.push((referenced, owning));
        if let Some(count) = indegree.get_mut(&owning) {
            *count += 1;
        }
    }

    let mut ready: VecDeque<EntityKind> = EntityKind::ALL
        .iter()
        .copied()
        .filter(|kind| indegree[kind] == 0)
        .collect();
    let mut order = Vec::with_capacity(EntityKind::ALL.len());

    while let Some(kind) = ready.pop_front() {
        order.push(kind);
        for (from, to) in &outgoing {
            if *from != kind {
                continue;
            }
            let count = indegree
                .get_mut(to)
                .ok_or_else(|| DbError::CyclicDependency(to.to_string()))?;
            *count -= 1;
            if *count == 0 {
                ready.push_back(*to);
            }
        }
    }

    if order.len() != EntityKind::ALL.len() {
        let mut stuck: Vec<String> = indegree
            .iter()
            .filter(|(_, count)| **count > 0)
            .map(|(kind, _)| kind.to_string())
            .collect();
        stuck.sort();
        return Err(DbError::CyclicDependency(stuck.join(", ")));
    }

    Ok(order)
}
