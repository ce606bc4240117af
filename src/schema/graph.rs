//! Dependency graph over one database snapshot.
//!
//! Provides:
//! - Graph construction from foreign-key relationships (table → table edges)
//!   plus heuristic textual references (view/routine → table edges)
//! - Read-only structural queries: child foreign keys, referencing views,
//!   referencing routines
//! - A dependency-sorted table order (parents before children) that
//!   tolerates cycles and self-references

use super::{references_table, Database, ForeignKey, Routine, SchemaError, Table, View};
use ahash::AHashMap;
use std::collections::VecDeque;

/// Dependency graph built from a snapshot's foreign-key relationships.
///
/// Edges run parent → child, where the parent is the referenced table and
/// the child holds the foreign key. Self-referencing foreign keys contribute
/// no edge; they cannot affect ordering.
#[derive(Debug)]
pub struct DependencyGraph<'a> {
    db: &'a Database,
    /// Exact full name → index into `db.tables()`
    index: AHashMap<String, usize>,
    /// For each table, indexes of tables it references via FK
    parents: Vec<Vec<usize>>,
    /// For each table, indexes of tables referencing it via FK
    children: Vec<Vec<usize>>,
}

/// Result of a dependency sort.
#[derive(Debug)]
pub struct DependencyOrder<'a> {
    /// Every table exactly once, parents before children wherever the edge
    /// set permits. Cycle members are placed at the end in snapshot order.
    pub tables: Vec<&'a Table>,
    /// Tables that could not be strictly ordered: members of an FK cycle,
    /// or reachable only through one.
    pub cyclic: Vec<&'a Table>,
}

impl<'a> DependencyGraph<'a> {
    /// Build the graph from a database snapshot.
    pub fn new(db: &'a Database) -> Self {
        let n = db.tables().len();
        let mut index = AHashMap::with_capacity(n);
        for (i, table) in db.tables().iter().enumerate() {
            index.insert(table.full_name(), i);
        }

        let mut parents: Vec<Vec<usize>> = vec![Vec::new(); n];
        let mut children: Vec<Vec<usize>> = vec![Vec::new(); n];

        let mut graph = Self {
            db,
            index,
            parents: Vec::new(),
            children: Vec::new(),
        };

        for fk in db.foreign_keys() {
            let parent = graph.table_index(fk.parent_table());
            let child = graph.table_index(fk.child_table());

            if let (Some(parent), Some(child)) = (parent, child) {
                // Self-references are handled separately by the orderer.
                if parent != child {
                    if !parents[child].contains(&parent) {
                        parents[child].push(parent);
                    }
                    if !children[parent].contains(&child) {
                        children[parent].push(child);
                    }
                }
            }
        }

        graph.parents = parents;
        graph.children = children;
        graph
    }

    /// Index of a table in the snapshot, exact match first, then
    /// case-insensitive fallback.
    fn table_index(&self, table: &Table) -> Option<usize> {
        let full_name = table.full_name();
        if let Some(&i) = self.index.get(&full_name) {
            return Some(i);
        }
        let lower = full_name.to_lowercase();
        self.index
            .iter()
            .find(|(k, _)| k.to_lowercase() == lower)
            .map(|(_, &i)| i)
    }

    /// The snapshot this graph was built from.
    pub fn database(&self) -> &Database {
        self.db
    }

    /// All foreign keys whose parent (referenced) side equals `table`.
    ///
    /// Empty for unknown tables, never an error.
    pub fn child_foreign_keys(&self, table: &Table) -> Vec<&'a ForeignKey> {
        self.db
            .foreign_keys()
            .iter()
            .filter(|fk| fk.parent_table() == table)
            .collect()
    }

    /// Views whose definition textually references `table`.
    ///
    /// A pattern failure aborts only this query; each view appears at most
    /// once regardless of how many times its text matches.
    pub fn views_referencing(&self, table: &Table) -> Result<Vec<&'a View>, SchemaError> {
        let mut found = Vec::new();
        for view in self.db.views() {
            if references_table(view.definition(), table)? {
                found.push(view);
            }
        }
        Ok(found)
    }

    /// Routines whose definition textually references `table`.
    pub fn routines_referencing(&self, table: &Table) -> Result<Vec<&'a Routine>, SchemaError> {
        let mut found = Vec::new();
        for routine in self.db.routines() {
            if references_table(routine.definition(), table)? {
                found.push(routine);
            }
        }
        Ok(found)
    }

    /// Order tables so that parents precede children, using Kahn's
    /// algorithm over the FK edges.
    ///
    /// Deterministic: the queue is seeded in snapshot order and children are
    /// visited in FK enumeration order. Tables still unresolved when the
    /// queue empties are in a cycle; they are appended in snapshot order, so
    /// the result always covers every table exactly once and the sort
    /// terminates regardless of the edge set's shape.
    pub fn dependency_order(&self) -> DependencyOrder<'a> {
        let n = self.db.tables().len();

        let mut in_degree: Vec<usize> = self.parents.iter().map(Vec::len).collect();

        let mut queue: VecDeque<usize> = VecDeque::new();
        for (i, &deg) in in_degree.iter().enumerate() {
            if deg == 0 {
                queue.push_back(i);
            }
        }

        let mut order = Vec::with_capacity(n);
        while let Some(i) = queue.pop_front() {
            order.push(i);
            for &child in &self.children[i] {
                in_degree[child] -= 1;
                if in_degree[child] == 0 {
                    queue.push_back(child);
                }
            }
        }

        // Remaining in-degree > 0 means the table is part of a cycle.
        let cyclic: Vec<usize> = in_degree
            .iter()
            .enumerate()
            .filter(|(_, &deg)| deg > 0)
            .map(|(i, _)| i)
            .collect();

        order.extend(cyclic.iter().copied());

        let tables = self.db.tables();
        DependencyOrder {
            tables: order.iter().map(|&i| &tables[i]).collect(),
            cyclic: cyclic.iter().map(|&i| &tables[i]).collect(),
        }
    }
}
