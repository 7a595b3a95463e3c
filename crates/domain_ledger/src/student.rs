//! Student reference data

use serde::{Deserialize, Serialize};

use core_kernel::{InstanceId, StudentId};

/// A student enrolled in one instance (school)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    pub id: StudentId,
    pub instance_id: InstanceId,
    pub name: String,
    pub is_deleted: bool,
}

impl Student {
    pub fn new(instance_id: InstanceId, name: impl Into<String>) -> Self {
        Self {
            id: StudentId::new_v7(),
            instance_id,
            name: name.into(),
            is_deleted: false,
        }
    }

    pub fn is_active(&self) -> bool {
        !self.is_deleted
    }
}
