//! Flattening dependency trees into graph edges for export.

use serde::Serialize;

use crate::models::{DependencyRecord, RepositoryRecord, RepositoryRef};

/// One row of the flattened dependency graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DependencyEdge {
    pub declaring_repo: RepositoryRef,
    pub package_url: String,
    pub version: String,
    pub depth: u32,
    /// Location of the dependency whose manifest declared this one; `None`
    /// for dependencies declared directly by a crawled repository.
    pub parent_package: Option<String>,
}

/// Flatten every dependency tree of every record, pre-order.
pub fn flatten_edges(records: &[RepositoryRecord]) -> Vec<DependencyEdge> {
    let mut edges = Vec::new();
    for record in records {
        for dep in &record.dependencies {
            push_edges(dep, None, &mut edges);
        }
    }
    edges
}

fn push_edges(dep: &DependencyRecord, parent: Option<&str>, edges: &mut Vec<DependencyEdge>) {
    edges.push(DependencyEdge {
        declaring_repo: dep.declaring_repo.clone(),
        package_url: dep.package_location.clone(),
        version: dep.version_constraint.clone(),
        depth: dep.depth,
        parent_package: parent.map(str::to_string),
    });
    for child in &dep.sub_dependencies {
        push_edges(child, Some(&dep.package_location), edges);
    }
}

/// Deepest `depth` in a tree (the root's own depth if it has no children).
pub fn max_depth(dep: &DependencyRecord) -> u32 {
    dep.sub_dependencies
        .iter()
        .map(max_depth)
        .max()
        .unwrap_or(dep.depth)
}

/// Total number of records in a list of trees.
pub fn count_records(deps: &[DependencyRecord]) -> usize {
    deps.iter()
        .map(|d| 1 + count_records(&d.sub_dependencies))
        .sum()
}
