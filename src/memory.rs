use std::collections::HashMap;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;

use crate::analytics::pipeline::{self, Bucket, GroupCount};
use crate::applications::{
    query::{ApplicationFilter, ApplicationQuery},
    repo::ApplicationStore,
    repo_types::Application,
};
use crate::auth::{
    repo::UserStore,
    repo_types::{PreferencesPatch, User},
};
use crate::db::DeletePolicy;
use crate::resumes::{repo::ResumeStore, repo_types::Resume};

type Key = (String, String);

fn key(user_id: &str, id: &str) -> Key {
    (user_id.to_string(), id.to_string())
}

/// Process-local store backing tests and database-less runs.
#[derive(Default)]
pub struct MemoryStore {
    users: RwLock<HashMap<String, User>>,
    applications: RwLock<HashMap<Key, Application>>,
    resumes: RwLock<HashMap<Key, Resume>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_user(&self, user_id: &str) -> anyhow::Result<Option<User>> {
        Ok(self.users.read().await.get(user_id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|u| u.email.as_deref() == Some(email))
            .cloned())
    }

    async fn insert_user(&self, user: &User) -> anyhow::Result<bool> {
        let mut users = self.users.write().await;
        let taken = users.contains_key(&user.user_id)
            || (user.email.is_some() && users.values().any(|u| u.email == user.email));
        if taken {
            return Ok(false);
        }
        users.insert(user.user_id.clone(), user.clone());
        Ok(true)
    }

    async fn touch_user(&self, user_id: &str, at: OffsetDateTime) -> anyhow::Result<()> {
        if let Some(user) = self.users.write().await.get_mut(user_id) {
            user.last_active = at;
        }
        Ok(())
    }

    async fn update_preferences(
        &self,
        user_id: &str,
        patch: &PreferencesPatch,
    ) -> anyhow::Result<Option<User>> {
        let mut users = self.users.write().await;
        Ok(users.get_mut(user_id).map(|user| {
            patch.apply(&mut user.preferences);
            user.clone()
        }))
    }
}

#[async_trait]
impl ApplicationStore for MemoryStore {
    async fn find_application(&self, user_id: &str, id: &str) -> anyhow::Result<Option<Application>> {
        Ok(self.applications.read().await.get(&key(user_id, id)).cloned())
    }

    async fn list_applications(
        &self,
        user_id: &str,
        query: &ApplicationQuery,
    ) -> anyhow::Result<Vec<Application>> {
        let apps = self.applications.read().await;
        let mut hits: Vec<&Application> = apps
            .values()
            .filter(|a| a.user_id == user_id && query.filter.matches(a))
            .collect();
        hits.sort_by(|a, b| query.compare(a, b));
        Ok(hits
            .into_iter()
            .skip(query.offset.max(0) as usize)
            .take(query.limit.max(0).try_into().unwrap_or(usize::MAX))
            .cloned()
            .collect())
    }

    async fn count_applications(&self, user_id: &str, filter: &ApplicationFilter) -> anyhow::Result<i64> {
        let apps = self.applications.read().await;
        Ok(apps
            .values()
            .filter(|a| a.user_id == user_id && filter.matches(a))
            .count() as i64)
    }

    async fn insert_application(&self, app: &Application) -> anyhow::Result<()> {
        let mut apps = self.applications.write().await;
        let k = key(&app.user_id, &app.id);
        if apps.contains_key(&k) {
            anyhow::bail!("duplicate application {}", app.id);
        }
        apps.insert(k, app.clone());
        Ok(())
    }

    async fn replace_application(&self, app: &Application) -> anyhow::Result<bool> {
        let mut apps = self.applications.write().await;
        match apps.get_mut(&key(&app.user_id, &app.id)) {
            Some(stored) => {
                let date_created = stored.date_created;
                *stored = app.clone();
                stored.date_created = date_created;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_application(&self, user_id: &str, id: &str) -> anyhow::Result<bool> {
        match Application::DELETE_POLICY {
            DeletePolicy::Hard => Ok(self.applications.write().await.remove(&key(user_id, id)).is_some()),
            DeletePolicy::Soft => anyhow::bail!("applications do not carry an active flag"),
        }
    }

    async fn group_applications(&self, user_id: &str, query: &GroupCount) -> anyhow::Result<Vec<Bucket>> {
        let apps = self.applications.read().await;
        Ok(query.evaluate(apps.values().filter(|a| a.user_id == user_id)))
    }

    async fn mean_response_millis(
        &self,
        user_id: &str,
        filter: &ApplicationFilter,
    ) -> anyhow::Result<Option<f64>> {
        let apps = self.applications.read().await;
        Ok(pipeline::mean_response_millis(
            filter,
            apps.values().filter(|a| a.user_id == user_id),
        ))
    }

    async fn latest_application_update(&self, user_id: &str) -> anyhow::Result<Option<OffsetDateTime>> {
        let apps = self.applications.read().await;
        Ok(apps
            .values()
            .filter(|a| a.user_id == user_id)
            .map(|a| a.last_updated)
            .max())
    }
}

#[async_trait]
impl ResumeStore for MemoryStore {
    async fn find_active_resume(&self, user_id: &str, id: &str) -> anyhow::Result<Option<Resume>> {
        Ok(self
            .resumes
            .read()
            .await
            .get(&key(user_id, id))
            .filter(|r| r.is_active)
            .cloned())
    }

    async fn find_resume(&self, user_id: &str, id: &str) -> anyhow::Result<Option<Resume>> {
        Ok(self.resumes.read().await.get(&key(user_id, id)).cloned())
    }

    async fn list_active_resumes(
        &self,
        user_id: &str,
        since: Option<OffsetDateTime>,
    ) -> anyhow::Result<Vec<Resume>> {
        let resumes = self.resumes.read().await;
        let mut out: Vec<Resume> = resumes
            .values()
            .filter(|r| r.user_id == user_id && r.is_active)
            .filter(|r| since.map_or(true, |s| r.last_modified > s))
            .map(|r| r.clone().without_pdf())
            .collect();
        out.sort_by(|a, b| b.date_added.cmp(&a.date_added).then_with(|| b.id.cmp(&a.id)));
        Ok(out)
    }

    async fn count_active_resumes(&self, user_id: &str) -> anyhow::Result<i64> {
        let resumes = self.resumes.read().await;
        Ok(resumes
            .values()
            .filter(|r| r.user_id == user_id && r.is_active)
            .count() as i64)
    }

    async fn insert_resume(&self, resume: &Resume) -> anyhow::Result<()> {
        let mut resumes = self.resumes.write().await;
        let k = key(&resume.user_id, &resume.id);
        if resumes.contains_key(&k) {
            anyhow::bail!("duplicate resume {}", resume.id);
        }
        resumes.insert(k, resume.clone());
        Ok(())
    }

    async fn replace_resume(&self, resume: &Resume) -> anyhow::Result<bool> {
        let mut resumes = self.resumes.write().await;
        match resumes.get_mut(&key(&resume.user_id, &resume.id)) {
            Some(stored) => {
                let pdf = resume.pdf_data.clone().or_else(|| stored.pdf_data.take());
                *stored = resume.clone();
                stored.pdf_data = pdf;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_resume(&self, user_id: &str, id: &str) -> anyhow::Result<bool> {
        let mut resumes = self.resumes.write().await;
        let k = key(user_id, id);
        match Resume::DELETE_POLICY {
            DeletePolicy::Soft => Ok(match resumes.get_mut(&k) {
                Some(r) if r.is_active => {
                    r.is_active = false;
                    true
                }
                _ => false,
            }),
            DeletePolicy::Hard => Ok(resumes.remove(&k).is_some()),
        }
    }

    async fn latest_resume_update(&self, user_id: &str) -> anyhow::Result<Option<OffsetDateTime>> {
        let resumes = self.resumes.read().await;
        Ok(resumes
            .values()
            .filter(|r| r.user_id == user_id && r.is_active)
            .map(|r| r.last_modified)
            .max())
    }
}
