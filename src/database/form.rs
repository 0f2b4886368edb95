use rust_decimal::Decimal;
use serde::Deserialize;

use super::{
    error::{FieldErrors, TypeError},
    schema::{Id, RecipeChanges, RecipeDraft, RecipeFilter},
};
use crate::constants::{
    EMAIL_MAX_LENGTH, LABEL_MAX_LENGTH, LINK_MAX_LENGTH, NAME_MAX_LENGTH, PASSWORD_MAX_LENGTH,
    PASSWORD_MIN_LENGTH, PRICE_DECIMAL_PLACES, PRICE_MAX_DIGITS, TITLE_MAX_LENGTH,
};

const REQUIRED: &str = "This field is required.";
const BLANK: &str = "This field may not be blank.";

/// How strictly a write payload is checked: `Full` demands every required
/// field, `Partial` only validates what was sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    Full,
    Partial,
}

/// Lower-cases the domain part of an email address; the local part is kept verbatim.
pub fn normalize_email(email: &str) -> String {
    let email = email.trim();
    match email.rsplit_once('@') {
        Some((local, domain)) => format!("{local}@{}", domain.to_lowercase()),
        None => email.to_string(),
    }
}

fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.rsplit_once('@') else {
        return false;
    };

    !local.is_empty()
        && !domain.is_empty()
        && !email.chars().any(char::is_whitespace)
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
}

/// Checks a text field, returning its trimmed value when it passed.
fn check_text(
    errors: &mut FieldErrors,
    field: &str,
    value: Option<String>,
    max_length: usize,
    required: bool,
    allow_blank: bool,
) -> Option<String> {
    let value = value.map(|value| value.trim().to_string());
    check_untrimmed(errors, field, value, max_length, required, allow_blank)
}

/// Like `check_text`, but surrounding whitespace is part of the value.
fn check_untrimmed(
    errors: &mut FieldErrors,
    field: &str,
    value: Option<String>,
    max_length: usize,
    required: bool,
    allow_blank: bool,
) -> Option<String> {
    let Some(value) = value else {
        if required {
            errors.add(field, REQUIRED);
        }
        return None;
    };

    if !allow_blank && value.trim().is_empty() {
        errors.add(field, BLANK);
        return None;
    }

    if value.chars().count() > max_length {
        errors.add(
            field,
            format!("Ensure this field has no more than {max_length} characters."),
        );
        return None;
    }

    Some(value)
}

fn check_email(errors: &mut FieldErrors, value: Option<String>, required: bool) -> Option<String> {
    let email = check_text(errors, "email", value, EMAIL_MAX_LENGTH, required, false)?;
    let email = normalize_email(&email);

    if !is_valid_email(&email) {
        errors.add("email", "Enter a valid email address.");
        return None;
    }

    Some(email)
}

fn check_password(
    errors: &mut FieldErrors,
    value: Option<String>,
    required: bool,
) -> Option<String> {
    let password = check_untrimmed(
        errors,
        "password",
        value,
        PASSWORD_MAX_LENGTH,
        required,
        false,
    )?;

    if password.chars().count() < PASSWORD_MIN_LENGTH {
        errors.add(
            "password",
            format!("Ensure this field has at least {PASSWORD_MIN_LENGTH} characters."),
        );
        return None;
    }

    Some(password)
}

fn check_price(errors: &mut FieldErrors, value: Option<Decimal>, required: bool) -> Option<Decimal> {
    let Some(price) = value else {
        if required {
            errors.add("price", REQUIRED);
        }
        return None;
    };

    let normalized = price.normalize();
    if normalized.scale() > PRICE_DECIMAL_PLACES {
        errors.add(
            "price",
            format!("Ensure that there are no more than {PRICE_DECIMAL_PLACES} decimal places."),
        );
        return None;
    }

    let whole_digits = normalized.trunc().abs().to_string().trim_start_matches('0').len() as u32;
    if whole_digits > PRICE_MAX_DIGITS - PRICE_DECIMAL_PLACES {
        errors.add(
            "price",
            format!(
                "Ensure that there are no more than {} digits before the decimal point.",
                PRICE_MAX_DIGITS - PRICE_DECIMAL_PLACES
            ),
        );
        return None;
    }

    let mut price = normalized;
    price.rescale(PRICE_DECIMAL_PLACES);
    Some(price)
}

fn check_labels(
    errors: &mut FieldErrors,
    field: &str,
    value: Option<Vec<LabelForm>>,
) -> Option<Vec<String>> {
    let labels = value?;
    let mut names = Vec::with_capacity(labels.len());

    for label in labels {
        if let Some(name) = check_text(errors, field, label.name, LABEL_MAX_LENGTH, true, false) {
            names.push(name);
        }
    }

    Some(names)
}

#[derive(Debug, Default, Deserialize)]
pub struct SignupForm {
    pub email: Option<String>,
    pub password: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

/// Signup payload after validation; the password is still plain text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidSignup {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
}

impl SignupForm {
    pub fn validate(self) -> Result<ValidSignup, FieldErrors> {
        let mut errors = FieldErrors::new();

        let email = check_email(&mut errors, self.email, true);
        let password = check_password(&mut errors, self.password, true);
        let first_name = check_text(
            &mut errors,
            "first_name",
            self.first_name,
            NAME_MAX_LENGTH,
            false,
            true,
        );
        let last_name = check_text(
            &mut errors,
            "last_name",
            self.last_name,
            NAME_MAX_LENGTH,
            false,
            true,
        );

        match (email, password) {
            (Some(email), Some(password)) if errors.is_empty() => Ok(ValidSignup {
                email,
                password,
                first_name: first_name.unwrap_or_default(),
                last_name: last_name.unwrap_or_default(),
            }),
            _ => Err(errors),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ProfileForm {
    pub email: Option<String>,
    pub password: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileChanges {
    pub email: Option<String>,
    pub password: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl ProfileForm {
    pub fn validate(self, mode: WriteMode) -> Result<ProfileChanges, FieldErrors> {
        let mut errors = FieldErrors::new();
        let required = mode == WriteMode::Full;

        let changes = ProfileChanges {
            email: check_email(&mut errors, self.email, required),
            password: check_password(&mut errors, self.password, required),
            first_name: check_text(
                &mut errors,
                "first_name",
                self.first_name,
                NAME_MAX_LENGTH,
                false,
                true,
            ),
            last_name: check_text(
                &mut errors,
                "last_name",
                self.last_name,
                NAME_MAX_LENGTH,
                false,
                true,
            ),
        };

        if errors.is_empty() {
            Ok(changes)
        } else {
            Err(errors)
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct TokenForm {
    pub email: Option<String>,
    pub password: Option<String>,
}

impl TokenForm {
    /// Presence check only; credentials are compared by the caller.
    pub fn validate(self) -> Result<(String, String), FieldErrors> {
        let mut errors = FieldErrors::new();

        let email = check_text(&mut errors, "email", self.email, EMAIL_MAX_LENGTH, true, false);
        let password = check_untrimmed(
            &mut errors,
            "password",
            self.password,
            PASSWORD_MAX_LENGTH,
            true,
            false,
        );

        match (email, password) {
            (Some(email), Some(password)) => Ok((normalize_email(&email), password)),
            _ => Err(errors),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LabelForm {
    pub name: Option<String>,
}

impl LabelForm {
    pub fn validate(self, mode: WriteMode) -> Result<Option<String>, FieldErrors> {
        let mut errors = FieldErrors::new();
        let name = check_text(
            &mut errors,
            "name",
            self.name,
            LABEL_MAX_LENGTH,
            mode == WriteMode::Full,
            false,
        );

        if errors.is_empty() {
            Ok(name)
        } else {
            Err(errors)
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct RecipeForm {
    pub title: Option<String>,
    pub time_minutes: Option<i32>,
    pub price: Option<Decimal>,
    pub description: Option<String>,
    pub link: Option<String>,
    pub tags: Option<Vec<LabelForm>>,
    pub ingredients: Option<Vec<LabelForm>>,
}

impl RecipeForm {
    pub fn validate(self, mode: WriteMode) -> Result<RecipeChanges, FieldErrors> {
        let mut errors = FieldErrors::new();
        let required = mode == WriteMode::Full;

        let title = check_text(
            &mut errors,
            "title",
            self.title,
            TITLE_MAX_LENGTH,
            required,
            false,
        );
        if required && self.time_minutes.is_none() {
            errors.add("time_minutes", REQUIRED);
        }
        let price = check_price(&mut errors, self.price, required);
        let description = self.description.map(|description| description.trim().to_string());
        let link = check_text(&mut errors, "link", self.link, LINK_MAX_LENGTH, false, true);
        let tags = check_labels(&mut errors, "tags", self.tags);
        let ingredients = check_labels(&mut errors, "ingredients", self.ingredients);

        if !errors.is_empty() {
            return Err(errors);
        }

        Ok(RecipeChanges {
            title,
            time_minutes: self.time_minutes,
            price,
            description,
            link,
            tags,
            ingredients,
        })
    }

    pub fn into_draft(self) -> Result<RecipeDraft, FieldErrors> {
        let changes = self.validate(WriteMode::Full)?;

        match (changes.title, changes.time_minutes, changes.price) {
            (Some(title), Some(time_minutes), Some(price)) => Ok(RecipeDraft {
                title,
                time_minutes,
                price,
                description: changes.description.unwrap_or_default(),
                link: changes.link.unwrap_or_default(),
                tags: changes.tags.unwrap_or_default(),
                ingredients: changes.ingredients.unwrap_or_default(),
            }),
            _ => Err(FieldErrors::single(FieldErrors::NON_FIELD, REQUIRED)),
        }
    }
}

fn parse_id_list(key: &str, value: Option<&str>) -> Result<Vec<Id>, TypeError> {
    let Some(value) = value.filter(|value| !value.is_empty()) else {
        return Ok(vec![]);
    };

    value
        .split(',')
        .map(|id| {
            id.trim()
                .parse::<Id>()
                .map_err(|_| TypeError::new(&format!("{key} must be a comma separated list of ids")))
        })
        .collect()
}

#[derive(Debug, Default, Deserialize)]
pub struct RecipeQuery {
    pub tags: Option<String>,
    pub ingredients: Option<String>,
}

impl TryFrom<RecipeQuery> for RecipeFilter {
    type Error = TypeError;

    fn try_from(value: RecipeQuery) -> Result<Self, Self::Error> {
        Ok(Self {
            tags: parse_id_list("tags", value.tags.as_deref())?,
            ingredients: parse_id_list("ingredients", value.ingredients.as_deref())?,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct LabelQuery {
    pub assigned_only: Option<String>,
}

impl LabelQuery {
    /// Any non-zero integer enables the filter.
    pub fn assigned_only(&self) -> Result<bool, TypeError> {
        match self.assigned_only.as_deref() {
            None | Some("") => Ok(false),
            Some(value) => value
                .trim()
                .parse::<i64>()
                .map(|flag| flag != 0)
                .map_err(|_| TypeError::new("assigned_only must be an integer")),
        }
    }
}
