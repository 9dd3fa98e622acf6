use std::sync::{Arc, OnceLock};

use argon2::{
    Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier, Version,
    password_hash::{SaltString, rand_core::OsRng},
};
use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

use forum_db::Database;
use forum_db::models::{NewUserOutcome, UniqueField, UserRow};
use forum_types::models::User;

use crate::error::ForumError;

const MIN_PASSWORD_LEN: usize = 8;
const MAX_PASSWORD_LEN: usize = 1024;
const MIN_USERNAME_LEN: usize = 3;
const MAX_USERNAME_LEN: usize = 32;
const MAX_EMAIL_LEN: usize = 254;

/// Owns password hashing and write access to user records.
///
/// Passwords are hashed with Argon2id into PHC strings (salt and parameters
/// embedded), so verification keeps working if the cost is raised later.
#[derive(Clone)]
pub struct CredentialStore {
    db: Arc<Database>,
    argon2: Argon2<'static>,
    /// Hash checked against when the login names no account, so that path
    /// costs the same as a wrong password.
    dummy_hash: Arc<OnceLock<String>>,
}

impl CredentialStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self::with_params(db, Params::default())
    }

    pub fn with_params(db: Arc<Database>, params: Params) -> Self {
        Self {
            db,
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
            dummy_hash: Arc::new(OnceLock::new()),
        }
    }

    pub fn hash_password(&self, plaintext: &str) -> Result<String, ForumError> {
        let salt = SaltString::generate(&mut OsRng);
        self.argon2
            .hash_password(plaintext.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| ForumError::HashingError(e.to_string()))
    }

    /// False on mismatch and on any malformed hash; callers cannot tell the two apart.
    pub fn verify_password(&self, plaintext: &str, hash: &str) -> bool {
        match PasswordHash::new(hash) {
            Ok(parsed) => self.argon2.verify_password(plaintext.as_bytes(), &parsed).is_ok(),
            Err(_) => false,
        }
    }

    pub fn find_user_by_email(&self, email: &str) -> Result<Option<User>, ForumError> {
        let row = self.db.get_user_by_email(&normalize_email(email))?;
        Ok(row.map(UserRow::into_user).transpose()?)
    }

    pub fn find_user_by_username(&self, username: &str) -> Result<Option<User>, ForumError> {
        let row = self.db.get_user_by_username(username.trim())?;
        Ok(row.map(UserRow::into_user).transpose()?)
    }

    /// Insert a user whose password has already been hashed. The store's
    /// unique constraints are the final arbiter, so a registration racing
    /// this one still surfaces as `ConstraintViolation`.
    pub fn create_user(
        &self,
        email: &str,
        username: &str,
        password_hash: &str,
    ) -> Result<User, ForumError> {
        let user = User {
            id: Uuid::new_v4(),
            email: normalize_email(email),
            username: username.trim().to_string(),
            created_at: Utc::now(),
        };

        let outcome = self.db.create_user(
            &user.id.to_string(),
            &user.email,
            &user.username,
            password_hash,
            &user.created_at.to_rfc3339(),
        )?;

        match outcome {
            NewUserOutcome::Created => {
                info!("Created user {} ({})", user.username, user.id);
                Ok(user)
            }
            NewUserOutcome::Conflict(field) => Err(ForumError::ConstraintViolation(field)),
        }
    }

    /// Validate, check both unique fields, hash, insert.
    pub fn register(&self, email: &str, username: &str, password: &str) -> Result<User, ForumError> {
        validate_registration(email, username, password)?;

        if self.find_user_by_email(email)?.is_some() {
            return Err(ForumError::ConstraintViolation(UniqueField::Email));
        }
        if self.find_user_by_username(username)?.is_some() {
            return Err(ForumError::ConstraintViolation(UniqueField::Username));
        }

        let password_hash = self.hash_password(password)?;
        self.create_user(email, username, &password_hash)
    }

    /// Check a login (email if it contains '@', username otherwise) against
    /// the stored hash. Unknown account and wrong password both come back as
    /// `Unauthenticated`.
    pub fn authenticate(&self, login: &str, password: &str) -> Result<User, ForumError> {
        let login = login.trim();
        let row = if login.contains('@') {
            self.db.get_user_by_email(&normalize_email(login))?
        } else {
            self.db.get_user_by_username(login)?
        };

        let Some(row) = row else {
            let dummy = self.dummy_hash()?;
            self.verify_password(password, dummy);
            debug!("Login rejected: no matching account");
            return Err(ForumError::Unauthenticated);
        };

        if !self.verify_password(password, &row.password_hash) {
            debug!("Login rejected for user {}", row.id);
            return Err(ForumError::Unauthenticated);
        }

        Ok(row.into_user()?)
    }

    /// Computed on first use. A hashing failure is returned, not cached, so
    /// the next call tries again.
    fn dummy_hash(&self) -> Result<&str, ForumError> {
        if let Some(hash) = self.dummy_hash.get() {
            return Ok(hash);
        }
        let hash = self.hash_password("not-a-real-password")?;
        Ok(self.dummy_hash.get_or_init(|| hash))
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn validate_registration(email: &str, username: &str, password: &str) -> Result<(), ForumError> {
    let email = email.trim();
    if email.is_empty() || email.len() > MAX_EMAIL_LEN || !email.contains('@') {
        return Err(ForumError::InvalidInput("email must be a valid address"));
    }

    let username = username.trim();
    let username_len = username.chars().count();
    if !(MIN_USERNAME_LEN..=MAX_USERNAME_LEN).contains(&username_len) {
        return Err(ForumError::InvalidInput("username must be 3 to 32 characters"));
    }
    if username.contains('@') {
        return Err(ForumError::InvalidInput("username must not contain '@'"));
    }

    if password.len() < MIN_PASSWORD_LEN {
        return Err(ForumError::InvalidInput("password must be at least 8 characters"));
    }
    if password.len() > MAX_PASSWORD_LEN {
        return Err(ForumError::InvalidInput("password must be at most 1024 characters"));
    }

    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Cheap Argon2 parameters so tests don't spend seconds per hash.
    pub(crate) fn test_store(db: Arc<Database>) -> CredentialStore {
        let params = Params::new(1024, 1, 1, None).unwrap();
        CredentialStore::with_params(db, params)
    }

    fn store() -> CredentialStore {
        test_store(Arc::new(Database::open_in_memory().unwrap()))
    }

    #[test]
    fn test_hash_then_verify() {
        let store = store();
        let hash = store.hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(!hash.contains("correct horse"));
        assert!(store.verify_password("correct horse", &hash));
        assert!(!store.verify_password("correct horsf", &hash));
        assert!(!store.verify_password("", &hash));
    }

    #[test]
    fn test_salts_differ() {
        let store = store();
        let a = store.hash_password("same-password").unwrap();
        let b = store.hash_password("same-password").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_malformed_hash_is_a_mismatch() {
        let store = store();
        assert!(!store.verify_password("anything", "not-a-phc-string"));
        assert!(!store.verify_password("anything", ""));
    }

    #[test]
    fn test_duplicate_registration() {
        let store = store();
        store.register("a@x.com", "alice", "password123").unwrap();

        let again = store.register("a@x.com", "alice", "password123");
        assert!(matches!(again, Err(ForumError::ConstraintViolation(UniqueField::Email))));

        let same_name = store.register("b@x.com", "alice", "password123");
        assert!(matches!(same_name, Err(ForumError::ConstraintViolation(UniqueField::Username))));

        let same_email_other_case = store.register(" A@X.com ", "bob", "password123");
        assert!(matches!(
            same_email_other_case,
            Err(ForumError::ConstraintViolation(UniqueField::Email))
        ));
    }

    #[test]
    fn test_create_user_falls_back_on_store_constraint() {
        let store = store();
        store.create_user("a@x.com", "alice", "hash").unwrap();
        let clash = store.create_user("c@x.com", "alice", "hash");
        assert!(matches!(clash, Err(ForumError::ConstraintViolation(UniqueField::Username))));
    }

    #[test]
    fn test_registration_validation() {
        let store = store();
        assert!(matches!(store.register("nope", "alice", "password123"), Err(ForumError::InvalidInput(_))));
        assert!(matches!(store.register("a@x.com", "al", "password123"), Err(ForumError::InvalidInput(_))));
        assert!(matches!(store.register("a@x.com", "alice", "short"), Err(ForumError::InvalidInput(_))));
        assert!(store.find_user_by_email("a@x.com").unwrap().is_none());
    }

    #[test]
    fn test_password_length_messages() {
        let store = store();
        let short = store.register("a@x.com", "alice", "short").unwrap_err();
        assert_eq!(short.to_string(), "invalid input: password must be at least 8 characters");

        let long = store.register("a@x.com", "alice", &"p".repeat(MAX_PASSWORD_LEN + 1)).unwrap_err();
        assert_eq!(long.to_string(), "invalid input: password must be at most 1024 characters");

        store.register("a@x.com", "alice", &"p".repeat(MAX_PASSWORD_LEN)).unwrap();
    }

    #[test]
    fn test_unknown_account_checks_a_real_hash() {
        let store = store();
        assert!(store.dummy_hash.get().is_none());

        let err = store.authenticate("ghost@x.com", "password123").unwrap_err();
        assert!(matches!(err, ForumError::Unauthenticated));
        let dummy = store.dummy_hash.get().unwrap().clone();
        assert!(dummy.starts_with("$argon2id$"));
        assert!(PasswordHash::new(&dummy).is_ok());

        store.authenticate("ghost", "password123").unwrap_err();
        assert_eq!(store.dummy_hash.get().unwrap(), &dummy);
    }

    #[test]
    fn test_authenticate() {
        let store = store();
        let alice = store.register("a@x.com", "alice", "password123").unwrap();

        assert_eq!(store.authenticate("a@x.com", "password123").unwrap().id, alice.id);
        assert_eq!(store.authenticate("alice", "password123").unwrap().id, alice.id);

        let wrong = store.authenticate("a@x.com", "password124").unwrap_err();
        let unknown = store.authenticate("z@x.com", "password123").unwrap_err();
        assert!(matches!(wrong, ForumError::Unauthenticated));
        assert!(matches!(unknown, ForumError::Unauthenticated));
        assert_eq!(wrong.to_string(), unknown.to_string());
    }

    #[test]
    fn test_lookups_return_absent() {
        let store = store();
        assert!(store.find_user_by_email("ghost@x.com").unwrap().is_none());
        assert!(store.find_user_by_username("ghost").unwrap().is_none());

        let alice = store.register("a@x.com", "alice", "password123").unwrap();
        let found = store.find_user_by_username("alice").unwrap().unwrap();
        assert_eq!(found, alice);
    }
}
