use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationType {
    Move,
    Copy,
    Rename,
    Delete,
}

impl std::fmt::Display for OperationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Move => write!(f, "move"),
            Self::Copy => write!(f, "copy"),
            Self::Rename => write!(f, "rename"),
            Self::Delete => write!(f, "delete"),
        }
    }
}

impl std::str::FromStr for OperationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "move" => Ok(Self::Move),
            "copy" => Ok(Self::Copy),
            "rename" => Ok(Self::Rename),
            "delete" => Ok(Self::Delete),
            _ => Err(format!("unknown operation type: {s}")),
        }
    }
}

/// One proposed filesystem mutation inside a plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannedOperation {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub operation_type: OperationType,
    pub confidence: f32,
}

/// Ordered set of operations sharing one batch id. Built once, validated,
/// then executed; never mutated after construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrganizationPlan {
    batch_id: String,
    operations: Vec<PlannedOperation>,
}

impl OrganizationPlan {
    pub fn new(batch_id: impl Into<String>, operations: Vec<PlannedOperation>) -> Self {
        Self {
            batch_id: batch_id.into(),
            operations,
        }
    }

    pub fn batch_id(&self) -> &str {
        &self.batch_id
    }

    pub fn operations(&self) -> &[PlannedOperation] {
        &self.operations
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

/// Durable journal row for one executed operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationRecord {
    pub batch_id: String,
    pub operation_type: OperationType,
    pub source_path: String,
    pub target_path: String,
    pub content_hash: Option<String>,
    pub timestamp: String,
    pub undone: bool,
}
