use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub type Id = i64;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    User,
    Superuser,
}

#[derive(sqlx::FromRow, Debug, Clone, PartialEq)]
pub struct User {
    pub id: Id,
    pub email: String,
    /// argon2 PHC string
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub is_active: bool,
    pub is_staff: bool,
    pub is_superuser: bool,
    pub date_joined: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

impl User {
    pub fn role(&self) -> UserRole {
        if self.is_superuser {
            UserRole::Superuser
        } else {
            UserRole::User
        }
    }
}

/// A validated account ready to be inserted; `email` is already normalized
/// and `password` already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub role: UserRole,
}

/// Tags and ingredients share one shape and differ only in where they live.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LabelKind {
    Tag,
    Ingredient,
}

impl LabelKind {
    pub fn table(&self) -> &'static str {
        match self {
            LabelKind::Tag => "tags",
            LabelKind::Ingredient => "ingredients",
        }
    }

    pub fn link_table(&self) -> &'static str {
        match self {
            LabelKind::Tag => "recipe_tags",
            LabelKind::Ingredient => "recipe_ingredients",
        }
    }

    pub fn link_column(&self) -> &'static str {
        match self {
            LabelKind::Tag => "tag_id",
            LabelKind::Ingredient => "ingredient_id",
        }
    }

    /// Top-level route segment and recipe payload key.
    pub fn path(&self) -> &'static str {
        self.table()
    }

    pub fn noun(&self) -> &'static str {
        match self {
            LabelKind::Tag => "tag",
            LabelKind::Ingredient => "ingredient",
        }
    }
}

#[derive(sqlx::FromRow, Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Label {
    pub id: Id,
    #[serde(skip)]
    pub user_id: Id,
    pub name: String,
}

#[derive(sqlx::FromRow, Debug, Clone)]
pub struct LinkedLabel {
    pub recipe_id: Id,
    pub id: Id,
    pub user_id: Id,
    pub name: String,
}

impl From<LinkedLabel> for Label {
    fn from(value: LinkedLabel) -> Self {
        Self {
            id: value.id,
            user_id: value.user_id,
            name: value.name,
        }
    }
}

#[derive(sqlx::FromRow, Debug, Clone, PartialEq)]
pub struct RecipeRow {
    pub id: Id,
    pub user_id: Id,
    pub title: String,
    pub time_minutes: i32,
    pub price: Decimal,
    pub description: String,
    pub link: String,
    /// Path relative to the media root.
    pub image: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Recipe {
    pub id: Id,
    pub user_id: Id,
    pub title: String,
    pub time_minutes: i32,
    pub price: Decimal,
    pub description: String,
    pub link: String,
    pub image: Option<String>,
    pub tags: Vec<Label>,
    pub ingredients: Vec<Label>,
}

impl Recipe {
    pub fn from_row(row: RecipeRow, tags: Vec<Label>, ingredients: Vec<Label>) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            title: row.title,
            time_minutes: row.time_minutes,
            price: row.price,
            description: row.description,
            link: row.link,
            image: row.image,
            tags,
            ingredients,
        }
    }
}

/// Fields for a new recipe. Label names are resolved with get-or-create.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecipeDraft {
    pub title: String,
    pub time_minutes: i32,
    pub price: Decimal,
    pub description: String,
    pub link: String,
    pub tags: Vec<String>,
    pub ingredients: Vec<String>,
}

/// `None` leaves a column untouched; `Some(vec![])` clears a label set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecipeChanges {
    pub title: Option<String>,
    pub time_minutes: Option<i32>,
    pub price: Option<Decimal>,
    pub description: Option<String>,
    pub link: Option<String>,
    pub tags: Option<Vec<String>>,
    pub ingredients: Option<Vec<String>>,
}

impl RecipeChanges {
    pub fn labels(&self, kind: LabelKind) -> Option<&[String]> {
        match kind {
            LabelKind::Tag => self.tags.as_deref(),
            LabelKind::Ingredient => self.ingredients.as_deref(),
        }
    }
}

impl RecipeDraft {
    pub fn labels(&self, kind: LabelKind) -> &[String] {
        match kind {
            LabelKind::Tag => &self.tags,
            LabelKind::Ingredient => &self.ingredients,
        }
    }
}

/// Recipe list restriction: any of `tags` and any of `ingredients`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecipeFilter {
    pub tags: Vec<Id>,
    pub ingredients: Vec<Id>,
}

impl RecipeFilter {
    pub fn ids(&self, kind: LabelKind) -> &[Id] {
        match kind {
            LabelKind::Tag => &self.tags,
            LabelKind::Ingredient => &self.ingredients,
        }
    }
}
