use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, Pool, Postgres};

use super::{
    actions::{labels, recipes, users},
    error::QueryError,
    schema::{
        Id, Label, LabelKind, NewUser, Recipe, RecipeChanges, RecipeDraft, RecipeFilter, User,
    },
    store::Store,
};

pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// `Store` backed by a Postgres connection pool.
#[derive(Clone)]
pub struct PgStore {
    pool: Pool<Postgres>,
}

impl PgStore {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, QueryError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;

        log::info!("Connected to Postgres (max {max_connections} connections)");
        Ok(Self::new(pool))
    }

    pub async fn migrate(&self) -> Result<(), QueryError> {
        MIGRATOR.run(&self.pool).await?;
        log::info!("Database migrations applied");
        Ok(())
    }

    pub fn pool(&self) -> &Pool<Postgres> {
        &self.pool
    }
}

#[async_trait]
impl Store for PgStore {
    async fn create_user(&self, user: NewUser) -> Result<User, QueryError> {
        users::register_user(&self.pool, user).await
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, QueryError> {
        users::get_user_by_email(&self.pool, email).await
    }

    async fn update_user(&self, user: &User) -> Result<User, QueryError> {
        users::update_user(&self.pool, user).await
    }

    async fn insert_token(
        &self,
        user_id: Id,
        digest: &str,
        issued_at: DateTime<Utc>,
    ) -> Result<(), QueryError> {
        users::insert_token(&self.pool, user_id, digest, issued_at).await
    }

    async fn find_token_user(
        &self,
        digest: &str,
        issued_after: Option<DateTime<Utc>>,
    ) -> Result<Option<User>, QueryError> {
        users::find_token_user(&self.pool, digest, issued_after).await
    }

    async fn delete_token(&self, digest: &str) -> Result<bool, QueryError> {
        users::delete_token(&self.pool, digest).await
    }

    async fn prune_tokens(
        &self,
        user_id: Id,
        issued_before: DateTime<Utc>,
    ) -> Result<u64, QueryError> {
        users::prune_tokens(&self.pool, user_id, issued_before).await
    }

    async fn list_recipes(
        &self,
        user_id: Id,
        filter: &RecipeFilter,
    ) -> Result<Vec<Recipe>, QueryError> {
        recipes::list_recipes(&self.pool, user_id, filter).await
    }

    async fn get_recipe(&self, user_id: Id, id: Id) -> Result<Option<Recipe>, QueryError> {
        recipes::get_recipe(&self.pool, user_id, id).await
    }

    async fn create_recipe(&self, user_id: Id, draft: RecipeDraft) -> Result<Recipe, QueryError> {
        recipes::create_recipe(&self.pool, user_id, draft).await
    }

    async fn update_recipe(
        &self,
        user_id: Id,
        id: Id,
        changes: RecipeChanges,
    ) -> Result<Option<Recipe>, QueryError> {
        recipes::update_recipe(&self.pool, user_id, id, changes).await
    }

    async fn set_recipe_image(
        &self,
        user_id: Id,
        id: Id,
        image: Option<String>,
    ) -> Result<Option<(Recipe, Option<String>)>, QueryError> {
        recipes::set_recipe_image(&self.pool, user_id, id, image).await
    }

    async fn delete_recipe(&self, user_id: Id, id: Id) -> Result<bool, QueryError> {
        recipes::delete_recipe(&self.pool, user_id, id).await
    }

    async fn create_label(
        &self,
        kind: LabelKind,
        user_id: Id,
        name: &str,
    ) -> Result<Label, QueryError> {
        labels::create_label(&self.pool, kind, user_id, name).await
    }

    async fn list_labels(
        &self,
        kind: LabelKind,
        user_id: Id,
        assigned_only: bool,
    ) -> Result<Vec<Label>, QueryError> {
        labels::list_labels(&self.pool, kind, user_id, assigned_only).await
    }

    async fn get_label(
        &self,
        kind: LabelKind,
        user_id: Id,
        id: Id,
    ) -> Result<Option<Label>, QueryError> {
        labels::get_label(&self.pool, kind, user_id, id).await
    }

    async fn rename_label(
        &self,
        kind: LabelKind,
        user_id: Id,
        id: Id,
        name: &str,
    ) -> Result<Option<Label>, QueryError> {
        labels::rename_label(&self.pool, kind, user_id, id, name).await
    }

    async fn delete_label(
        &self,
        kind: LabelKind,
        user_id: Id,
        id: Id,
    ) -> Result<bool, QueryError> {
        labels::delete_label(&self.pool, kind, user_id, id).await
    }
}
