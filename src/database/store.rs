use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{
    error::QueryError,
    schema::{
        Id, Label, LabelKind, NewUser, Recipe, RecipeChanges, RecipeDraft, RecipeFilter, User,
    },
};

/// Persistence for accounts, tokens, recipes and labels.
///
/// Every recipe and label operation takes the owning user's id and only ever
/// sees that user's rows; a row owned by someone else behaves exactly like a
/// missing one (`None` / `false`). Writes that touch several rows (a recipe
/// and its label links) are atomic.
#[async_trait]
pub trait Store: Send + Sync {
    async fn create_user(&self, user: NewUser) -> Result<User, QueryError>;
    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, QueryError>;
    /// Persists every mutable column of `user`. Fails with
    /// `QueryError::DuplicateEmail` when the email belongs to another account.
    async fn update_user(&self, user: &User) -> Result<User, QueryError>;

    async fn insert_token(
        &self,
        user_id: Id,
        digest: &str,
        issued_at: DateTime<Utc>,
    ) -> Result<(), QueryError>;
    /// When `issued_after` is set, tokens issued at or before it are treated
    /// as missing.
    async fn find_token_user(
        &self,
        digest: &str,
        issued_after: Option<DateTime<Utc>>,
    ) -> Result<Option<User>, QueryError>;
    async fn delete_token(&self, digest: &str) -> Result<bool, QueryError>;
    /// Drops the user's tokens issued at or before `issued_before`.
    async fn prune_tokens(&self, user_id: Id, issued_before: DateTime<Utc>)
        -> Result<u64, QueryError>;

    /// Newest first.
    async fn list_recipes(
        &self,
        user_id: Id,
        filter: &RecipeFilter,
    ) -> Result<Vec<Recipe>, QueryError>;
    async fn get_recipe(&self, user_id: Id, id: Id) -> Result<Option<Recipe>, QueryError>;
    async fn create_recipe(&self, user_id: Id, draft: RecipeDraft) -> Result<Recipe, QueryError>;
    async fn update_recipe(
        &self,
        user_id: Id,
        id: Id,
        changes: RecipeChanges,
    ) -> Result<Option<Recipe>, QueryError>;
    /// Also returns the image path that was replaced.
    async fn set_recipe_image(
        &self,
        user_id: Id,
        id: Id,
        image: Option<String>,
    ) -> Result<Option<(Recipe, Option<String>)>, QueryError>;
    async fn delete_recipe(&self, user_id: Id, id: Id) -> Result<bool, QueryError>;

    async fn create_label(
        &self,
        kind: LabelKind,
        user_id: Id,
        name: &str,
    ) -> Result<Label, QueryError>;
    /// Ordered by name, descending. `assigned_only` keeps labels linked to at
    /// least one recipe, each listed once.
    async fn list_labels(
        &self,
        kind: LabelKind,
        user_id: Id,
        assigned_only: bool,
    ) -> Result<Vec<Label>, QueryError>;
    async fn get_label(
        &self,
        kind: LabelKind,
        user_id: Id,
        id: Id,
    ) -> Result<Option<Label>, QueryError>;
    async fn rename_label(
        &self,
        kind: LabelKind,
        user_id: Id,
        id: Id,
        name: &str,
    ) -> Result<Option<Label>, QueryError>;
    async fn delete_label(&self, kind: LabelKind, user_id: Id, id: Id)
        -> Result<bool, QueryError>;
}
