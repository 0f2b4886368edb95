use chrono::Utc;

use crate::{
    cryptography::Hasher,
    error::{Error, ErrorKind, FieldErrors},
    form::{ProfileChanges, ValidSignup},
    schema::{NewUser, User, UserRole},
    store::Store,
};

const BAD_CREDENTIALS: &str = "Unable to authenticate with provided credentials.";

fn hash(hasher: &Hasher, password: &str) -> Result<String, Error> {
    hasher.hash_password(password).map_err(|e| {
        log::error!("Password hashing failed: {e}");
        ErrorKind::InternalServerError.default()
    })
}

pub async fn register(
    store: &dyn Store,
    hasher: &Hasher,
    signup: ValidSignup,
    role: UserRole,
) -> Result<User, Error> {
    let user = store
        .create_user(NewUser {
            password: hash(hasher, &signup.password)?,
            email: signup.email,
            first_name: signup.first_name,
            last_name: signup.last_name,
            role,
        })
        .await?;

    log::info!("Registered user {} ({:?})", user.id, role);
    Ok(user)
}

/// Checks credentials and records the login time. Every failure, inactive
/// accounts included, looks the same to the caller.
pub async fn authenticate(
    store: &dyn Store,
    hasher: &Hasher,
    email: &str,
    password: &str,
) -> Result<User, Error> {
    let rejected = || Error::from(FieldErrors::single(FieldErrors::NON_FIELD, BAD_CREDENTIALS));

    let Some(mut user) = store.get_user_by_email(email).await? else {
        log::debug!("Login for unknown email");
        return Err(rejected());
    };

    let verified = hasher.verify_password(password, &user.password).unwrap_or_else(|e| {
        log::warn!("Stored password of user {} is unreadable: {e}", user.id);
        false
    });

    if !verified || !user.is_active {
        log::debug!("Login refused for user {}", user.id);
        return Err(rejected());
    }

    user.last_login = Some(Utc::now());
    Ok(store.update_user(&user).await?)
}

pub async fn update_profile(
    store: &dyn Store,
    hasher: &Hasher,
    user: &User,
    changes: ProfileChanges,
) -> Result<User, Error> {
    let mut user = user.clone();

    if let Some(email) = changes.email {
        user.email = email;
    }
    if let Some(password) = changes.password {
        user.password = hash(hasher, &password)?;
    }
    if let Some(first_name) = changes.first_name {
        user.first_name = first_name;
    }
    if let Some(last_name) = changes.last_name {
        user.last_name = last_name;
    }

    Ok(store.update_user(&user).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;

    fn signup(email: &str, password: &str) -> ValidSignup {
        ValidSignup {
            email: email.to_string(),
            password: password.to_string(),
            first_name: String::from("Test"),
            last_name: String::from("User"),
        }
    }

    #[tokio::test]
    async fn passwords_are_hashed() {
        let store = MemoryStore::new();
        let hasher = Hasher::new(true);

        let user = register(&store, &hasher, signup("a@b.com", "pass1234"), UserRole::User)
            .await
            .unwrap();

        assert_ne!(user.password, "pass1234");
        assert!(hasher.verify_password("pass1234", &user.password).unwrap());
    }

    #[tokio::test]
    async fn login_records_last_login() {
        let store = MemoryStore::new();
        let hasher = Hasher::new(true);
        register(&store, &hasher, signup("a@b.com", "pass1234"), UserRole::User)
            .await
            .unwrap();

        let user = authenticate(&store, &hasher, "a@b.com", "pass1234")
            .await
            .unwrap();
        assert!(user.last_login.is_some());
    }

    #[tokio::test]
    async fn bad_credentials_are_a_validation_error() {
        let store = MemoryStore::new();
        let hasher = Hasher::new(true);
        let mut user = register(&store, &hasher, signup("a@b.com", "pass1234"), UserRole::User)
            .await
            .unwrap();

        for (email, password) in [("a@b.com", "wrongpass"), ("x@b.com", "pass1234")] {
            let err = authenticate(&store, &hasher, email, password)
                .await
                .unwrap_err();
            assert_eq!(err.code, 400);
            assert_eq!(
                err.fields.unwrap().get(FieldErrors::NON_FIELD),
                Some(&[BAD_CREDENTIALS.to_string()][..])
            );
        }

        user.is_active = false;
        store.update_user(&user).await.unwrap();
        assert!(authenticate(&store, &hasher, "a@b.com", "pass1234")
            .await
            .is_err());
    }

    #[tokio::test]
    async fn profile_password_is_rehashed() {
        let store = MemoryStore::new();
        let hasher = Hasher::new(true);
        let user = register(&store, &hasher, signup("a@b.com", "pass1234"), UserRole::User)
            .await
            .unwrap();

        let updated = update_profile(
            &store,
            &hasher,
            &user,
            ProfileChanges {
                password: Some(String::from("newpass123")),
                first_name: Some(String::from("New")),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        assert_eq!(updated.first_name, "New");
        assert_eq!(updated.last_name, "User");
        assert!(hasher.verify_password("newpass123", &updated.password).unwrap());
    }
}
