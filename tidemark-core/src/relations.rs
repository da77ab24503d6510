//! Eager-load (fetch-graph) expression shapes.
//!
//! These types describe which relations to load alongside a query result and
//! how paged results travel back. They carry no behavior; they exist so the
//! JSON shapes used by ORM fetch-graph calls can be built and checked in Rust.
//!
//! ```json
//! {
//!   "author": true,
//!   "posts": { "$modify": ["published"], "comments": true },
//!   "parent": { "$recursive": 3 }
//! }
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Map from relation name to what to load for it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LoadRelSchema(pub BTreeMap<String, RelationNode>);

impl LoadRelSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, relation: impl Into<String>, node: impl Into<RelationNode>) -> Self {
        self.0.insert(relation.into(), node.into());
        self
    }

    pub fn get(&self, relation: &str) -> Option<&RelationNode> {
        self.0.get(relation)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Either a plain on/off flag or a nested expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RelationNode {
    Flag(bool),
    Nested(NestedLoadRelSchema),
}

impl From<bool> for RelationNode {
    fn from(flag: bool) -> Self {
        RelationNode::Flag(flag)
    }
}

impl From<NestedLoadRelSchema> for RelationNode {
    fn from(nested: NestedLoadRelSchema) -> Self {
        RelationNode::Nested(nested)
    }
}

/// `$recursive`: recurse without limit (`true`) or up to a depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Recursion {
    Flag(bool),
    Depth(u32),
}

/// A relation with options and its own child relations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NestedLoadRelSchema {
    #[serde(rename = "$recursive", default, skip_serializing_if = "Option::is_none")]
    pub recursive: Option<Recursion>,
    /// Actual relation name when the key is an alias.
    #[serde(rename = "$relation", default, skip_serializing_if = "Option::is_none")]
    pub relation: Option<String>,
    /// Named modifiers applied to the relation query.
    #[serde(rename = "$modify", default, skip_serializing_if = "Vec::is_empty")]
    pub modify: Vec<String>,
    #[serde(flatten)]
    pub children: LoadRelSchema,
}

/// Paging metadata returned with a page of results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    pub current_page: u64,
    pub total_pages: u64,
    pub per_page: u64,
    pub total: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u64>,
}

/// A page of results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pagination<T> {
    pub data: Vec<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pagination: Option<PageMeta>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extras: Option<serde_json::Map<String, serde_json::Value>>,
}

/// Query options for a sortable, eager-loadable, paged listing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SortableSchema {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eager: Option<LoadRelSchema>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub per_page: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deserialize_nested_expression() {
        let schema: LoadRelSchema = serde_json::from_value(json!({
            "author": true,
            "drafts": false,
            "posts": {
                "$modify": ["published", "recent"],
                "comments": { "$relation": "replies", "author": true }
            },
            "parent": { "$recursive": 3 },
            "children": { "$recursive": true }
        }))
        .unwrap();

        assert_eq!(schema.get("author"), Some(&RelationNode::Flag(true)));
        assert_eq!(schema.get("drafts"), Some(&RelationNode::Flag(false)));

        let posts = match schema.get("posts") {
            Some(RelationNode::Nested(n)) => n,
            other => panic!("expected nested posts, got {:?}", other),
        };
        assert_eq!(posts.modify, vec!["published", "recent"]);
        assert!(posts.recursive.is_none());

        let comments = match posts.children.get("comments") {
            Some(RelationNode::Nested(n)) => n,
            other => panic!("expected nested comments, got {:?}", other),
        };
        assert_eq!(comments.relation.as_deref(), Some("replies"));
        assert_eq!(comments.children.get("author"), Some(&RelationNode::Flag(true)));

        match schema.get("parent") {
            Some(RelationNode::Nested(n)) => assert_eq!(n.recursive, Some(Recursion::Depth(3))),
            other => panic!("unexpected parent {:?}", other),
        }
        match schema.get("children") {
            Some(RelationNode::Nested(n)) => assert_eq!(n.recursive, Some(Recursion::Flag(true))),
            other => panic!("unexpected children {:?}", other),
        }
    }

    #[test]
    fn test_serialize_builder_output() {
        let schema = LoadRelSchema::new().with("author", true).with(
            "posts",
            NestedLoadRelSchema {
                modify: vec!["published".to_string()],
                children: LoadRelSchema::new().with("comments", true),
                ..Default::default()
            },
        );

        assert_eq!(
            serde_json::to_value(&schema).unwrap(),
            json!({
                "author": true,
                "posts": { "$modify": ["published"], "comments": true }
            })
        );
    }

    #[test]
    fn test_invalid_relation_value_is_rejected() {
        let result: Result<LoadRelSchema, _> = serde_json::from_value(json!({ "author": "yes" }));
        assert!(result.is_err());
    }

    #[test]
    fn test_sortable_schema_camel_case() {
        let sortable: SortableSchema = serde_json::from_value(json!({
            "sort": "-createdAt",
            "page": 2,
            "perPage": 25,
            "eager": { "author": true }
        }))
        .unwrap();

        assert_eq!(sortable.sort.as_deref(), Some("-createdAt"));
        assert_eq!(sortable.page, Some(2));
        assert_eq!(sortable.per_page, Some(25));
        assert!(sortable.eager.map(|e| !e.is_empty()).unwrap_or(false));
    }

    #[test]
    fn test_pagination_shape() {
        let page = Pagination {
            data: vec![1, 2, 3],
            pagination: Some(PageMeta {
                current_page: 1,
                total_pages: 4,
                per_page: 3,
                total: 11,
                count: None,
            }),
            extras: None,
        };

        assert_eq!(
            serde_json::to_value(&page).unwrap(),
            json!({
                "data": [1, 2, 3],
                "pagination": { "currentPage": 1, "totalPages": 4, "perPage": 3, "total": 11 }
            })
        );
    }
}
