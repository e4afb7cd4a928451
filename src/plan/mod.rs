//! Logical plans.
//!
//! A [`LogicalNode`] tree describes a statement independent of storage
//! layout; the planner lowers it to a physical operator tree. The node tag
//! set and each node's field order are part of the wire format (`wire`).

pub mod params;
pub mod wire;

use crate::config::StorageKind;
use crate::document::Document;
use crate::expr::{CompareExpr, Expression, FunctionExpr, SortExpr, UpdateExpr};
use crate::types::LogicalType;
use crate::vector::DataChunk;

/// Wire tags of logical plan nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum NodeKind {
    Aggregate = 0,
    CreateCollection = 1,
    CreateDatabase = 2,
    CreateIndex = 3,
    CreateType = 4,
    Data = 5,
    Delete = 6,
    DropCollection = 7,
    DropDatabase = 8,
    DropIndex = 9,
    DropType = 10,
    Insert = 11,
    Join = 12,
    Limit = 13,
    Match = 14,
    Group = 15,
    Sort = 16,
    Function = 17,
    Update = 18,
    Invalid = 255,
}

impl NodeKind {
    pub fn from_u8(v: u8) -> NodeKind {
        use NodeKind::*;
        match v {
            0 => Aggregate,
            1 => CreateCollection,
            2 => CreateDatabase,
            3 => CreateIndex,
            4 => CreateType,
            5 => Data,
            6 => Delete,
            7 => DropCollection,
            8 => DropDatabase,
            9 => DropIndex,
            10 => DropType,
            11 => Insert,
            12 => Join,
            13 => Limit,
            14 => Match,
            15 => Group,
            16 => Sort,
            17 => Function,
            18 => Update,
            _ => Invalid,
        }
    }
}

/// Join kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum JoinType {
    Inner = 0,
    Left = 1,
    Right = 2,
    Full = 3,
    Cross = 4,
}

impl JoinType {
    pub fn from_u8(v: u8) -> Option<JoinType> {
        Some(match v {
            0 => JoinType::Inner,
            1 => JoinType::Left,
            2 => JoinType::Right,
            3 => JoinType::Full,
            4 => JoinType::Cross,
            _ => return None,
        })
    }
}

/// Row cap applied to a statement. `-1` is unbounded, `0` short-circuits to
/// an empty result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limit(i64);

impl Limit {
    pub fn unbounded() -> Self {
        Limit(-1)
    }

    pub fn new(n: i64) -> Self {
        Limit(n)
    }

    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn is_unbounded(&self) -> bool {
        self.0 < 0
    }

    /// Whether a result of `count` rows may still grow.
    pub fn allows(&self, count: usize) -> bool {
        self.0 < 0 || (count as i64) < self.0
    }

    /// Cap `count` to the limit.
    pub fn clamp(&self, count: usize) -> usize {
        if self.0 < 0 {
            count
        } else {
            count.min(self.0 as usize)
        }
    }
}

impl Default for Limit {
    fn default() -> Self {
        Limit::unbounded()
    }
}

/// Fully qualified collection name: namespace path plus collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct CollectionName {
    pub namespace: Vec<String>,
    pub name: String,
}

impl CollectionName {
    pub fn new(namespace: Vec<String>, name: impl Into<String>) -> Self {
        Self {
            namespace,
            name: name.into(),
        }
    }
}

impl std::fmt::Display for CollectionName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for segment in &self.namespace {
            write!(f, "{segment}.")?;
        }
        write!(f, "{}", self.name)
    }
}

/// Payload of a `Data` node: raw documents from the API, or a pre-shredded
/// chunk from the SQL front-end.
#[derive(Debug, Clone)]
pub enum DataPayload {
    Documents(Vec<Document>),
    Chunk(DataChunk),
}

impl DataPayload {
    pub fn uses_documents(&self) -> bool {
        matches!(self, DataPayload::Documents(_))
    }

    pub fn uses_chunk(&self) -> bool {
        matches!(self, DataPayload::Chunk(_))
    }
}

/// A logical plan node.
#[derive(Debug, Clone)]
pub enum LogicalNode {
    /// Statement orchestrator: wraps match/group/sort sub-nodes over one
    /// collection.
    Aggregate {
        collection: CollectionName,
        children: Vec<LogicalNode>,
    },
    CreateCollection {
        collection: CollectionName,
        storage: Option<StorageKind>,
    },
    CreateDatabase {
        namespace: Vec<String>,
    },
    /// Parsed for wire compatibility; plans to `Unsupported`.
    CreateIndex {
        collection: CollectionName,
        name: String,
    },
    CreateType {
        ty: LogicalType,
    },
    Data {
        payload: DataPayload,
    },
    Delete {
        collection: CollectionName,
        predicate: Option<CompareExpr>,
        children: Vec<LogicalNode>,
    },
    DropCollection {
        collection: CollectionName,
    },
    DropDatabase {
        namespace: Vec<String>,
    },
    /// Parsed for wire compatibility; plans to `Unsupported`.
    DropIndex {
        collection: CollectionName,
        name: String,
    },
    DropType {
        alias: String,
    },
    Insert {
        collection: CollectionName,
        child: Box<LogicalNode>,
    },
    Join {
        join_type: JoinType,
        predicate: Option<CompareExpr>,
        children: Vec<LogicalNode>,
    },
    Limit {
        limit: Limit,
        child: Box<LogicalNode>,
    },
    Match {
        collection: CollectionName,
        predicate: Option<CompareExpr>,
    },
    Group {
        collection: CollectionName,
        expressions: Vec<Expression>,
    },
    Sort {
        collection: CollectionName,
        expressions: Vec<SortExpr>,
    },
    Function {
        function: FunctionExpr,
    },
    Update {
        collection: CollectionName,
        updates: Vec<UpdateExpr>,
        upsert: bool,
        predicate: Option<CompareExpr>,
        children: Vec<LogicalNode>,
    },
}

impl LogicalNode {
    pub fn kind(&self) -> NodeKind {
        match self {
            LogicalNode::Aggregate { .. } => NodeKind::Aggregate,
            LogicalNode::CreateCollection { .. } => NodeKind::CreateCollection,
            LogicalNode::CreateDatabase { .. } => NodeKind::CreateDatabase,
            LogicalNode::CreateIndex { .. } => NodeKind::CreateIndex,
            LogicalNode::CreateType { .. } => NodeKind::CreateType,
            LogicalNode::Data { .. } => NodeKind::Data,
            LogicalNode::Delete { .. } => NodeKind::Delete,
            LogicalNode::DropCollection { .. } => NodeKind::DropCollection,
            LogicalNode::DropDatabase { .. } => NodeKind::DropDatabase,
            LogicalNode::DropIndex { .. } => NodeKind::DropIndex,
            LogicalNode::DropType { .. } => NodeKind::DropType,
            LogicalNode::Insert { .. } => NodeKind::Insert,
            LogicalNode::Join { .. } => NodeKind::Join,
            LogicalNode::Limit { .. } => NodeKind::Limit,
            LogicalNode::Match { .. } => NodeKind::Match,
            LogicalNode::Group { .. } => NodeKind::Group,
            LogicalNode::Sort { .. } => NodeKind::Sort,
            LogicalNode::Function { .. } => NodeKind::Function,
            LogicalNode::Update { .. } => NodeKind::Update,
        }
    }

    /// The collection this node addresses, when it addresses one.
    pub fn collection(&self) -> Option<&CollectionName> {
        match self {
            LogicalNode::Aggregate { collection, .. }
            | LogicalNode::CreateCollection { collection, .. }
            | LogicalNode::CreateIndex { collection, .. }
            | LogicalNode::Delete { collection, .. }
            | LogicalNode::DropCollection { collection }
            | LogicalNode::DropIndex { collection, .. }
            | LogicalNode::Insert { collection, .. }
            | LogicalNode::Match { collection, .. }
            | LogicalNode::Group { collection, .. }
            | LogicalNode::Sort { collection, .. }
            | LogicalNode::Update { collection, .. } => Some(collection),
            _ => None,
        }
    }
}
