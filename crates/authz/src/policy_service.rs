use crate::error::Result;
use crate::privilege::PrivilegeService;
use uuid::Uuid;
use visor_database::Database;
use visor_models::{NewPolicy, Policy, UpdatePolicy};

#[derive(Clone)]
pub struct PolicyService {
    db: Database,
    privileges: PrivilegeService,
}

impl PolicyService {
    pub fn new(db: Database, privileges: PrivilegeService) -> Self {
        Self { db, privileges }
    }

    pub async fn list(&self) -> Result<Vec<Policy>> {
        Ok(self.db.policies().list().await?)
    }

    pub async fn get(&self, id: Uuid) -> Result<Policy> {
        Ok(self.db.policies().find_by_id(id).await?)
    }

    pub async fn create(&self, new_policy: NewPolicy) -> Result<Policy> {
        new_policy.validate_all()?;

        let policy = self.db.policies().create(&new_policy).await?;
        tracing::info!(policy_id = %policy.id, name = %policy.name, "Policy created");
        Ok(policy)
    }

    pub async fn update(&self, id: Uuid, update: UpdatePolicy) -> Result<Policy> {
        update.validate_all()?;

        let policy = self.db.policies().update(id, &update).await?;
        self.privileges.invalidate_all().await?;
        Ok(policy)
    }

    pub async fn delete(&self, id: Uuid) -> Result<()> {
        self.db.policies().delete(id).await?;
        self.privileges.invalidate_all().await?;

        tracing::info!(policy_id = %id, "Policy deleted");
        Ok(())
    }
}
