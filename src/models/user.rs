use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Master,
    CollegeAdmin,
    Faculty,
    Student,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Master => "master",
            Role::CollegeAdmin => "college_admin",
            Role::Faculty => "faculty",
            Role::Student => "student",
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "master" => Ok(Role::Master),
            "college_admin" => Ok(Role::CollegeAdmin),
            "faculty" => Ok(Role::Faculty),
            "student" => Ok(Role::Student),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

/// Authenticated caller as issued by the identity collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: Uuid,
    pub role: Role,
    pub college_id: Option<Uuid>,
}

impl Actor {
    /// College scope for college-level roles; missing scope is a forbidden caller.
    pub fn college_scope(&self) -> Result<Uuid> {
        self.college_id
            .ok_or_else(|| Error::Forbidden("Actor is not bound to a college".to_string()))
    }

    pub fn ensure_college(&self, college_id: Uuid) -> Result<()> {
        if self.college_scope()? != college_id {
            return Err(Error::Forbidden(
                "Resource belongs to another college".to_string(),
            ));
        }
        Ok(())
    }
}
