use tracing::info;
use uuid::Uuid;

use crate::database::store::SharedStore;
use crate::dto::directory_dto::{CreateCollegePayload, CreateStudentPayload};
use crate::error::Result;
use crate::models::directory::{College, Student};
use crate::models::user::Actor;
use crate::utils::validation;

/// Minimal provisioning of the records targeting and reporting read.
#[derive(Clone)]
pub struct DirectoryService {
    store: SharedStore,
}

impl DirectoryService {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    pub async fn register_college(&self, payload: CreateCollegePayload) -> Result<College> {
        validation::validate(&payload)?;
        let college = College {
            id: Uuid::new_v4(),
            name: payload.name.trim().to_string(),
            email: payload.email,
            is_active: true,
        };
        self.store.upsert_college(&college).await?;
        info!(college_id = %college.id, "college registered");
        Ok(college)
    }

    /// Adds a student to the caller's own college.
    pub async fn register_student(&self, actor: &Actor, payload: CreateStudentPayload) -> Result<Student> {
        validation::validate(&payload)?;
        let college_id = actor.college_scope()?;
        let student = Student {
            id: Uuid::new_v4(),
            college_id,
            name: payload.name.trim().to_string(),
            email: payload.email,
            branch: payload.branch.trim().to_string(),
            batch: payload.batch.trim().to_string(),
            section: payload.section.trim().to_string(),
            is_active: true,
        };
        self.store.upsert_student(&student).await?;
        info!(student_id = %student.id, college_id = %college_id, "student registered");
        Ok(student)
    }

    pub async fn list_students(&self, actor: &Actor) -> Result<Vec<Student>> {
        self.store.list_students(actor.college_scope()?).await
    }
}
