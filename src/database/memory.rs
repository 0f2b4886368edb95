use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    sync::{Mutex, MutexGuard},
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use super::{
    error::QueryError,
    schema::{
        Id, Label, LabelKind, NewUser, Recipe, RecipeChanges, RecipeDraft, RecipeFilter,
        RecipeRow, User, UserRole,
    },
    store::Store,
};
use crate::constants::PRICE_DECIMAL_PLACES;

#[derive(Debug, Default)]
struct LabelTable {
    seq: Id,
    rows: BTreeMap<Id, Label>,
    /// (recipe id, label id)
    links: BTreeSet<(Id, Id)>,
}

impl LabelTable {
    fn insert(&mut self, user_id: Id, name: &str) -> Label {
        self.seq += 1;
        let label = Label {
            id: self.seq,
            user_id,
            name: name.to_string(),
        };
        self.rows.insert(label.id, label.clone());
        label
    }

    fn owned(&self, user_id: Id, id: Id) -> Option<&Label> {
        self.rows.get(&id).filter(|label| label.user_id == user_id)
    }

    /// Rows iterate in id order, so the first match is the oldest.
    fn find_or_create(&mut self, user_id: Id, name: &str) -> Id {
        let existing = self
            .rows
            .values()
            .find(|label| label.user_id == user_id && label.name == name)
            .map(|label| label.id);

        match existing {
            Some(id) => id,
            None => self.insert(user_id, name).id,
        }
    }

    fn set_links(&mut self, recipe_id: Id, user_id: Id, names: &[String]) {
        self.links.retain(|(recipe, _)| *recipe != recipe_id);
        for name in names {
            let label_id = self.find_or_create(user_id, name);
            self.links.insert((recipe_id, label_id));
        }
    }

    fn for_recipe(&self, recipe_id: Id) -> Vec<Label> {
        self.links
            .range((recipe_id, Id::MIN)..=(recipe_id, Id::MAX))
            .filter_map(|(_, label_id)| self.rows.get(label_id).cloned())
            .collect()
    }

    fn is_assigned(&self, label_id: Id) -> bool {
        self.links.iter().any(|(_, id)| *id == label_id)
    }

    fn unlink_recipe(&mut self, recipe_id: Id) {
        self.links.retain(|(recipe, _)| *recipe != recipe_id);
    }
}

#[derive(Debug, Default)]
struct State {
    user_seq: Id,
    users: BTreeMap<Id, User>,
    tokens: HashMap<String, (Id, DateTime<Utc>)>,
    recipe_seq: Id,
    recipes: BTreeMap<Id, RecipeRow>,
    tags: LabelTable,
    ingredients: LabelTable,
}

impl State {
    fn labels(&self, kind: LabelKind) -> &LabelTable {
        match kind {
            LabelKind::Tag => &self.tags,
            LabelKind::Ingredient => &self.ingredients,
        }
    }

    fn labels_mut(&mut self, kind: LabelKind) -> &mut LabelTable {
        match kind {
            LabelKind::Tag => &mut self.tags,
            LabelKind::Ingredient => &mut self.ingredients,
        }
    }

    fn email_taken(&self, email: &str, except: Option<Id>) -> bool {
        self.users
            .values()
            .any(|user| user.email == email && Some(user.id) != except)
    }

    fn owned_recipe(&self, user_id: Id, id: Id) -> Option<&RecipeRow> {
        self.recipes.get(&id).filter(|row| row.user_id == user_id)
    }

    fn hydrate(&self, row: &RecipeRow) -> Recipe {
        Recipe::from_row(
            row.clone(),
            self.tags.for_recipe(row.id),
            self.ingredients.for_recipe(row.id),
        )
    }

    fn matches(&self, row: &RecipeRow, filter: &RecipeFilter) -> bool {
        [LabelKind::Tag, LabelKind::Ingredient]
            .into_iter()
            .all(|kind| {
                let wanted = filter.ids(kind);
                wanted.is_empty()
                    || wanted
                        .iter()
                        .any(|id| self.labels(kind).links.contains(&(row.id, *id)))
            })
    }
}

/// Mirrors the NUMERIC(5, 2) column.
fn stored_price(price: Decimal) -> Decimal {
    let mut price = price;
    price.rescale(PRICE_DECIMAL_PLACES);
    price
}

/// `Store` kept entirely in process memory behind a single mutex.
///
/// Used by the test suites and when no database is configured. Every
/// operation holds the lock for its whole duration, so multi-row writes are
/// atomic with respect to each other.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>, QueryError> {
        self.state.lock().map_err(|_| QueryError::Poisoned)
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_user(&self, user: NewUser) -> Result<User, QueryError> {
        let mut state = self.lock()?;

        if state.email_taken(&user.email, None) {
            return Err(QueryError::DuplicateEmail);
        }

        state.user_seq += 1;
        let is_superuser = user.role == UserRole::Superuser;
        let row = User {
            id: state.user_seq,
            email: user.email,
            password: user.password,
            first_name: user.first_name,
            last_name: user.last_name,
            is_active: true,
            is_staff: is_superuser,
            is_superuser,
            date_joined: Utc::now(),
            last_login: None,
        };

        state.users.insert(row.id, row.clone());
        Ok(row)
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, QueryError> {
        Ok(self
            .lock()?
            .users
            .values()
            .find(|user| user.email == email)
            .cloned())
    }

    async fn update_user(&self, user: &User) -> Result<User, QueryError> {
        let mut state = self.lock()?;

        if state.email_taken(&user.email, Some(user.id)) {
            return Err(QueryError::DuplicateEmail);
        }

        let Some(row) = state.users.get_mut(&user.id) else {
            return Err(QueryError::Sqlx(sqlx::Error::RowNotFound));
        };

        // date_joined is not writable
        let date_joined = row.date_joined;
        *row = User {
            date_joined,
            ..user.clone()
        };

        Ok(row.clone())
    }

    async fn insert_token(
        &self,
        user_id: Id,
        digest: &str,
        issued_at: DateTime<Utc>,
    ) -> Result<(), QueryError> {
        self.lock()?
            .tokens
            .insert(digest.to_string(), (user_id, issued_at));
        Ok(())
    }

    async fn find_token_user(
        &self,
        digest: &str,
        issued_after: Option<DateTime<Utc>>,
    ) -> Result<Option<User>, QueryError> {
        let state = self.lock()?;

        Ok(state
            .tokens
            .get(digest)
            .filter(|(_, created_at)| issued_after.map_or(true, |cutoff| *created_at > cutoff))
            .and_then(|(user_id, _)| state.users.get(user_id))
            .cloned())
    }

    async fn delete_token(&self, digest: &str) -> Result<bool, QueryError> {
        Ok(self.lock()?.tokens.remove(digest).is_some())
    }

    async fn prune_tokens(
        &self,
        user_id: Id,
        issued_before: DateTime<Utc>,
    ) -> Result<u64, QueryError> {
        let mut state = self.lock()?;
        let before = state.tokens.len();

        state
            .tokens
            .retain(|_, (owner, created_at)| *owner != user_id || *created_at > issued_before);
        Ok((before - state.tokens.len()) as u64)
    }

    async fn list_recipes(
        &self,
        user_id: Id,
        filter: &RecipeFilter,
    ) -> Result<Vec<Recipe>, QueryError> {
        let state = self.lock()?;

        Ok(state
            .recipes
            .values()
            .rev()
            .filter(|row| row.user_id == user_id && state.matches(row, filter))
            .map(|row| state.hydrate(row))
            .collect())
    }

    async fn get_recipe(&self, user_id: Id, id: Id) -> Result<Option<Recipe>, QueryError> {
        let state = self.lock()?;
        Ok(state.owned_recipe(user_id, id).map(|row| state.hydrate(row)))
    }

    async fn create_recipe(&self, user_id: Id, draft: RecipeDraft) -> Result<Recipe, QueryError> {
        let mut state = self.lock()?;

        state.recipe_seq += 1;
        let row = RecipeRow {
            id: state.recipe_seq,
            user_id,
            title: draft.title.clone(),
            time_minutes: draft.time_minutes,
            price: stored_price(draft.price),
            description: draft.description.clone(),
            link: draft.link.clone(),
            image: None,
        };

        for kind in [LabelKind::Tag, LabelKind::Ingredient] {
            state
                .labels_mut(kind)
                .set_links(row.id, user_id, draft.labels(kind));
        }

        state.recipes.insert(row.id, row.clone());
        Ok(state.hydrate(&row))
    }

    async fn update_recipe(
        &self,
        user_id: Id,
        id: Id,
        changes: RecipeChanges,
    ) -> Result<Option<Recipe>, QueryError> {
        let mut state = self.lock()?;

        let Some(row) = state.recipes.get_mut(&id).filter(|row| row.user_id == user_id) else {
            return Ok(None);
        };

        if let Some(title) = &changes.title {
            row.title = title.clone();
        }
        if let Some(time_minutes) = changes.time_minutes {
            row.time_minutes = time_minutes;
        }
        if let Some(price) = changes.price {
            row.price = stored_price(price);
        }
        if let Some(description) = &changes.description {
            row.description = description.clone();
        }
        if let Some(link) = &changes.link {
            row.link = link.clone();
        }
        let row = row.clone();

        for kind in [LabelKind::Tag, LabelKind::Ingredient] {
            if let Some(names) = changes.labels(kind) {
                state.labels_mut(kind).set_links(id, user_id, names);
            }
        }

        Ok(Some(state.hydrate(&row)))
    }

    async fn set_recipe_image(
        &self,
        user_id: Id,
        id: Id,
        image: Option<String>,
    ) -> Result<Option<(Recipe, Option<String>)>, QueryError> {
        let mut state = self.lock()?;

        let Some(row) = state.recipes.get_mut(&id).filter(|row| row.user_id == user_id) else {
            return Ok(None);
        };
        let previous = std::mem::replace(&mut row.image, image);
        let row = row.clone();

        Ok(Some((state.hydrate(&row), previous)))
    }

    async fn delete_recipe(&self, user_id: Id, id: Id) -> Result<bool, QueryError> {
        let mut state = self.lock()?;

        if state.owned_recipe(user_id, id).is_none() {
            return Ok(false);
        }

        state.recipes.remove(&id);
        state.tags.unlink_recipe(id);
        state.ingredients.unlink_recipe(id);
        Ok(true)
    }

    async fn create_label(
        &self,
        kind: LabelKind,
        user_id: Id,
        name: &str,
    ) -> Result<Label, QueryError> {
        Ok(self.lock()?.labels_mut(kind).insert(user_id, name))
    }

    async fn list_labels(
        &self,
        kind: LabelKind,
        user_id: Id,
        assigned_only: bool,
    ) -> Result<Vec<Label>, QueryError> {
        let state = self.lock()?;
        let table = state.labels(kind);

        let mut labels: Vec<Label> = table
            .rows
            .values()
            .filter(|label| label.user_id == user_id)
            .filter(|label| !assigned_only || table.is_assigned(label.id))
            .cloned()
            .collect();

        labels.sort_by(|a, b| b.name.cmp(&a.name).then(b.id.cmp(&a.id)));
        Ok(labels)
    }

    async fn get_label(
        &self,
        kind: LabelKind,
        user_id: Id,
        id: Id,
    ) -> Result<Option<Label>, QueryError> {
        Ok(self.lock()?.labels(kind).owned(user_id, id).cloned())
    }

    async fn rename_label(
        &self,
        kind: LabelKind,
        user_id: Id,
        id: Id,
        name: &str,
    ) -> Result<Option<Label>, QueryError> {
        let mut state = self.lock()?;

        let Some(label) = state
            .labels_mut(kind)
            .rows
            .get_mut(&id)
            .filter(|label| label.user_id == user_id)
        else {
            return Ok(None);
        };

        label.name = name.to_string();
        Ok(Some(label.clone()))
    }

    async fn delete_label(
        &self,
        kind: LabelKind,
        user_id: Id,
        id: Id,
    ) -> Result<bool, QueryError> {
        let mut state = self.lock()?;
        let table = state.labels_mut(kind);

        if table.owned(user_id, id).is_none() {
            return Ok(false);
        }

        table.rows.remove(&id);
        table.links.retain(|(_, label_id)| *label_id != id);
        Ok(true)
    }
}
