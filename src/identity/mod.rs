//! Accounts and their one-to-one profiles.
//!
//! An account and its profile are written in one transaction, so a persisted
//! account without a profile only ever comes from `create_superuser`.

use chrono::NaiveDate;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};
use serde::Deserialize;

use crate::auth::password;
use crate::db::models::{Account, Gender, Profile};
use crate::error::{AppError, AppResult};
use crate::validation::{looks_like_email, FieldErrors, REQUIRED};

pub const MIN_PASSWORD_CHARS: usize = 8;

const NAME_MAX: usize = 255;
const EMAIL_MAX: usize = 254;
const PHONE_MAX: usize = 20;
const USER_REF_MAX: usize = 100;

const ACCOUNT_COLUMNS: &str =
    "id, username, password_hash, user_ref_uid, is_active, is_staff, is_superuser, created_at";

pub(crate) const PROFILE_COLUMNS: &str = "id, account_id, first_name, last_name, other_name, \
     email, phone_number, gender, date_of_birth, address, profile_photo, created_at, updated_at";

// Unique indexes and the field/message each violation is reported under.
const UNIQUE_FIELDS: &[(&str, &str, &str)] = &[
    ("accounts.username", "username", "Username already exists"),
    (
        "accounts.user_ref_uid",
        "user_ref_uid",
        "Reference id already in use",
    ),
    (
        "profiles.email",
        "profile.email",
        "A profile with this email already exists",
    ),
    (
        "profiles.phone_number",
        "profile.phone_number",
        "A profile with this phone number already exists",
    ),
];

// --- Input ---

/// Registration payload as received. Every field is optional here so that
/// missing values surface as field errors rather than decode failures.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegistrationInput {
    pub username: Option<String>,
    pub password: Option<String>,
    /// Optional external reference, unique when present
    pub user_ref_uid: Option<String>,
    pub profile: Option<ProfileInput>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileInput {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub other_name: Option<String>,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub gender: Option<String>,
    pub date_of_birth: Option<String>,
    pub address: Option<String>,
    pub profile_photo: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewAccount {
    pub username: String,
    pub password: String,
    pub user_ref_uid: Option<String>,
    pub profile: NewProfile,
}

#[derive(Debug, Clone)]
pub struct NewProfile {
    pub first_name: String,
    pub last_name: String,
    pub other_name: Option<String>,
    pub email: String,
    pub phone_number: String,
    pub gender: Option<Gender>,
    pub date_of_birth: Option<NaiveDate>,
    pub address: Option<String>,
    pub profile_photo: Option<String>,
}

impl RegistrationInput {
    pub fn validate(self) -> AppResult<NewAccount> {
        let mut errors = FieldErrors::new();

        let username = errors.text("username", self.username.as_deref(), NAME_MAX);

        let password = match self.password.as_deref().map(str::trim) {
            Some(pw) if pw.chars().count() >= MIN_PASSWORD_CHARS => Some(pw.to_string()),
            Some("") => {
                errors.add("password", REQUIRED);
                None
            }
            Some(_) => {
                errors.add(
                    "password",
                    format!("Ensure this field has at least {MIN_PASSWORD_CHARS} characters."),
                );
                None
            }
            None => {
                errors.add("password", REQUIRED);
                None
            }
        };

        let user_ref_uid =
            errors.optional_text("user_ref_uid", self.user_ref_uid.as_deref(), USER_REF_MAX);

        let profile = match self.profile {
            Some(profile) => profile.validate_into(&mut errors),
            None => {
                errors.add("profile", REQUIRED);
                None
            }
        };

        errors.into_result()?;
        match (username, password, profile) {
            (Some(username), Some(password), Some(profile)) => Ok(NewAccount {
                username,
                password,
                user_ref_uid,
                profile,
            }),
            _ => Err(AppError::Internal(
                "registration passed validation with missing fields".into(),
            )),
        }
    }
}

impl ProfileInput {
    fn validate_into(self, errors: &mut FieldErrors) -> Option<NewProfile> {
        let first_name = errors.text("profile.first_name", self.first_name.as_deref(), NAME_MAX);
        let last_name = errors.text("profile.last_name", self.last_name.as_deref(), NAME_MAX);
        let other_name =
            errors.optional_text("profile.other_name", self.other_name.as_deref(), NAME_MAX);
        let phone_number =
            errors.text("profile.phone_number", self.phone_number.as_deref(), PHONE_MAX);
        let address = errors.optional_text("profile.address", self.address.as_deref(), usize::MAX);
        let profile_photo =
            errors.optional_text("profile.profile_photo", self.profile_photo.as_deref(), 255);

        let email = errors
            .text("profile.email", self.email.as_deref(), EMAIL_MAX)
            .filter(|email| {
                let ok = looks_like_email(email);
                if !ok {
                    errors.add("profile.email", "Enter a valid email address.");
                }
                ok
            });

        let gender = match self.gender.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            None => None,
            Some(raw) => {
                let parsed = Gender::parse(raw);
                if parsed.is_none() {
                    errors.add(
                        "profile.gender",
                        format!("\"{raw}\" is not a valid choice."),
                    );
                }
                parsed
            }
        };

        let date_of_birth = match self
            .date_of_birth
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
        {
            None => None,
            Some(raw) => match NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
                Ok(date) => Some(date),
                Err(_) => {
                    errors.add(
                        "profile.date_of_birth",
                        "Date has wrong format. Use YYYY-MM-DD.",
                    );
                    None
                }
            },
        };

        Some(NewProfile {
            first_name: first_name?,
            last_name: last_name?,
            other_name,
            email: email?,
            phone_number: phone_number?,
            gender,
            date_of_birth,
            address,
            profile_photo,
        })
    }
}

// --- Writes ---

/// Create an account and its profile atomically. The password is hashed here;
/// the raw value never reaches the database.
pub fn create_account(conn: &mut Connection, new: &NewAccount, cost: u32) -> AppResult<Account> {
    if username_taken(conn, &new.username)? {
        return Err(AppError::conflict("username", "Username already exists"));
    }

    let password_hash = password::hash_password(&new.password, cost)?;
    let account_id = uuid::Uuid::now_v7().to_string();
    let profile = &new.profile;

    let tx = conn.transaction()?;
    tx.execute(
        "INSERT INTO accounts (id, username, password_hash, user_ref_uid)
         VALUES (?1, ?2, ?3, ?4)",
        params![account_id, new.username, password_hash, new.user_ref_uid],
    )
    .map_err(translate_constraint)?;
    tx.execute(
        "INSERT INTO profiles (account_id, first_name, last_name, other_name, email,
                               phone_number, gender, date_of_birth, address, profile_photo)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            account_id,
            profile.first_name,
            profile.last_name,
            profile.other_name,
            profile.email,
            profile.phone_number,
            profile.gender.map(|g| g.as_str()),
            profile.date_of_birth,
            profile.address,
            profile.profile_photo,
        ],
    )
    .map_err(translate_constraint)?;
    tx.commit()?;

    tracing::info!("Registered account {} ({})", new.username, account_id);
    find_account_by_id(conn, &account_id)
}

/// Staff account with every flag set and no profile.
pub fn create_superuser(
    conn: &Connection,
    username: &str,
    raw_password: &str,
    cost: u32,
) -> AppResult<Account> {
    let username = username.trim();
    if username.is_empty() {
        return Err(AppError::invalid("username", REQUIRED));
    }
    if raw_password.is_empty() {
        return Err(AppError::invalid("password", REQUIRED));
    }

    let password_hash = password::hash_password(raw_password, cost)?;
    let account_id = uuid::Uuid::now_v7().to_string();
    conn.execute(
        "INSERT INTO accounts (id, username, password_hash, is_active, is_staff, is_superuser)
         VALUES (?1, ?2, ?3, 1, 1, 1)",
        params![account_id, username, password_hash],
    )
    .map_err(translate_constraint)?;

    tracing::info!("Created superuser {}", username);
    find_account_by_id(conn, &account_id)
}

/// Soft delete: the account stays, but can no longer sign in.
pub fn deactivate_account(conn: &Connection, username: &str) -> AppResult<()> {
    let updated = conn.execute(
        "UPDATE accounts SET is_active = 0 WHERE username = ?1",
        params![username],
    )?;
    if updated == 0 {
        return Err(AppError::NotFound);
    }
    tracing::info!("Deactivated account {}", username);
    Ok(())
}

// --- Reads ---

pub fn find_account_by_username(conn: &Connection, username: &str) -> AppResult<Account> {
    conn.query_row(
        &format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE username = ?1"),
        params![username],
        account_from_row,
    )
    .optional()?
    .ok_or(AppError::NotFound)
}

pub fn find_account_by_id(conn: &Connection, id: &str) -> AppResult<Account> {
    conn.query_row(
        &format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = ?1"),
        params![id],
        account_from_row,
    )
    .optional()?
    .ok_or(AppError::NotFound)
}

pub fn find_profile(conn: &Connection, profile_id: i64) -> AppResult<Profile> {
    conn.query_row(
        &format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE id = ?1"),
        params![profile_id],
        profile_from_row,
    )
    .optional()?
    .ok_or(AppError::NotFound)
}

pub fn find_profile_by_account(conn: &Connection, account_id: &str) -> AppResult<Profile> {
    conn.query_row(
        &format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE account_id = ?1"),
        params![account_id],
        profile_from_row,
    )
    .optional()?
    .ok_or(AppError::NotFound)
}

fn username_taken(conn: &Connection, username: &str) -> AppResult<bool> {
    let taken = conn.query_row(
        "SELECT COUNT(*) > 0 FROM accounts WHERE username = ?1",
        params![username],
        |row| row.get(0),
    )?;
    Ok(taken)
}

// --- Row mapping ---

fn account_from_row(row: &Row<'_>) -> rusqlite::Result<Account> {
    Ok(Account {
        id: row.get(0)?,
        username: row.get(1)?,
        password_hash: row.get(2)?,
        user_ref_uid: row.get(3)?,
        is_active: row.get(4)?,
        is_staff: row.get(5)?,
        is_superuser: row.get(6)?,
        created_at: row.get(7)?,
    })
}

pub(crate) fn profile_from_row(row: &Row<'_>) -> rusqlite::Result<Profile> {
    let gender: Option<String> = row.get(7)?;
    Ok(Profile {
        id: row.get(0)?,
        account_id: row.get(1)?,
        first_name: row.get(2)?,
        last_name: row.get(3)?,
        other_name: row.get(4)?,
        email: row.get(5)?,
        phone_number: row.get(6)?,
        gender: gender.as_deref().and_then(Gender::parse),
        date_of_birth: row.get(8)?,
        address: row.get(9)?,
        profile_photo: row.get(10)?,
        created_at: row.get(11)?,
        updated_at: row.get(12)?,
    })
}

/// Map unique-index violations to field conflicts; anything else stays a
/// database error.
fn translate_constraint(err: rusqlite::Error) -> AppError {
    if let rusqlite::Error::SqliteFailure(code, Some(message)) = &err {
        if code.code == ErrorCode::ConstraintViolation {
            if let Some((_, field, text)) = UNIQUE_FIELDS
                .iter()
                .find(|(column, _, _)| message.contains(column))
            {
                return AppError::conflict(field, *text);
            }
        }
    }
    AppError::Database(err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;

    const COST: u32 = 4;

    fn input(username: &str, email: &str, phone: &str) -> RegistrationInput {
        RegistrationInput {
            username: Some(username.into()),
            password: Some("strongpassword123".into()),
            user_ref_uid: None,
            profile: Some(ProfileInput {
                first_name: Some("John".into()),
                last_name: Some("Doe".into()),
                email: Some(email.into()),
                phone_number: Some(phone.into()),
                gender: Some("Male".into()),
                date_of_birth: Some("2000-01-01".into()),
                address: Some("123 Street".into()),
                ..Default::default()
            }),
        }
    }

    fn field_of(err: AppError) -> String {
        match err {
            AppError::Conflict { field, .. } => field,
            other => panic!("expected conflict, got {other:?}"),
        }
    }

    #[test]
    fn signup_creates_account_and_profile() {
        let pool = test_pool();
        let mut conn = pool.get().unwrap();

        let new = input("newuser", "john@example.com", "+1234567890")
            .validate()
            .unwrap();
        let account = create_account(&mut conn, &new, COST).unwrap();

        assert_eq!(account.username, "newuser");
        assert!(account.is_active);
        assert!(!account.is_staff);
        assert!(!account.is_superuser);
        assert_ne!(account.password_hash, "strongpassword123");
        assert!(password::verify_password("strongpassword123", &account.password_hash));

        let profile = find_profile_by_account(&conn, &account.id).unwrap();
        assert_eq!(profile.first_name, "John");
        assert_eq!(profile.email, "john@example.com");
        assert_eq!(profile.gender, Some(Gender::Male));
        assert_eq!(profile.date_of_birth, NaiveDate::from_ymd_opt(2000, 1, 1));
        assert_eq!(profile.to_string(), "John Doe");
    }

    #[test]
    fn duplicate_username_is_a_conflict_and_leaves_first_intact() {
        let pool = test_pool();
        let mut conn = pool.get().unwrap();

        let first = input("newuser", "a@x.com", "+100").validate().unwrap();
        let created = create_account(&mut conn, &first, COST).unwrap();

        let second = input("newuser", "b@x.com", "+200").validate().unwrap();
        let err = create_account(&mut conn, &second, COST).unwrap_err();
        assert_eq!(field_of(err), "username");

        let still = find_account_by_username(&conn, "newuser").unwrap();
        assert_eq!(still.id, created.id);
        assert_eq!(find_profile_by_account(&conn, &still.id).unwrap().email, "a@x.com");
    }

    #[test]
    fn duplicate_email_rolls_back_the_account() {
        let pool = test_pool();
        let mut conn = pool.get().unwrap();

        let first = input("user1", "unique@example.com", "+100").validate().unwrap();
        create_account(&mut conn, &first, COST).unwrap();

        let second = input("user2", "unique@example.com", "+200").validate().unwrap();
        let err = create_account(&mut conn, &second, COST).unwrap_err();
        assert_eq!(field_of(err), "profile.email");

        assert!(matches!(
            find_account_by_username(&conn, "user2"),
            Err(AppError::NotFound)
        ));
    }

    #[test]
    fn duplicate_phone_is_a_conflict() {
        let pool = test_pool();
        let mut conn = pool.get().unwrap();

        let first = input("user1", "a@x.com", "+1234567890").validate().unwrap();
        create_account(&mut conn, &first, COST).unwrap();

        let second = input("user3", "alice@example.com", "+1234567890")
            .validate()
            .unwrap();
        let err = create_account(&mut conn, &second, COST).unwrap_err();
        assert_eq!(field_of(err), "profile.phone_number");

        let accounts: i64 = conn
            .query_row("SELECT COUNT(*) FROM accounts", [], |r| r.get(0))
            .unwrap();
        assert_eq!(accounts, 1);
    }

    #[test]
    fn validation_collects_every_field_error() {
        let err = RegistrationInput {
            username: Some("  ".into()),
            password: Some("short".into()),
            user_ref_uid: None,
            profile: Some(ProfileInput {
                email: Some("not-an-email".into()),
                gender: Some("Other".into()),
                date_of_birth: Some("01/01/2000".into()),
                ..Default::default()
            }),
        }
        .validate()
        .unwrap_err();

        let AppError::Validation(errors) = err else {
            panic!("expected validation error");
        };
        for field in [
            "username",
            "password",
            "profile.first_name",
            "profile.last_name",
            "profile.email",
            "profile.phone_number",
            "profile.gender",
            "profile.date_of_birth",
        ] {
            assert!(errors.get(field).is_some(), "missing error for {field}");
        }
    }

    #[test]
    fn missing_profile_is_reported() {
        let err = RegistrationInput {
            username: Some("bob".into()),
            password: Some("longenough".into()),
            user_ref_uid: None,
            profile: None,
        }
        .validate()
        .unwrap_err();
        let AppError::Validation(errors) = err else {
            panic!("expected validation error");
        };
        assert_eq!(errors.get("profile"), Some(&[REQUIRED.to_string()][..]));
    }

    #[test]
    fn blank_password_counts_as_missing() {
        let mut registration = input("bob", "b@x.com", "+200");
        registration.password = Some("        ".into());
        let AppError::Validation(errors) = registration.validate().unwrap_err() else {
            panic!("expected validation error");
        };
        assert_eq!(errors.get("password"), Some(&[REQUIRED.to_string()][..]));

        let mut registration = input("bob", "b@x.com", "+200");
        registration.password = Some("  short  ".into());
        assert!(registration.validate().is_err());
    }

    #[test]
    fn password_is_trimmed_before_hashing() {
        let mut registration = input("bob", "b@x.com", "+200");
        registration.password = Some("  longenough  ".into());
        assert_eq!(registration.validate().unwrap().password, "longenough");
    }

    #[test]
    fn duplicate_user_ref_is_a_conflict() {
        let pool = test_pool();
        let mut conn = pool.get().unwrap();

        let mut first = input("user1", "a@x.com", "+100");
        first.user_ref_uid = Some("ref-1".into());
        let created = create_account(&mut conn, &first.validate().unwrap(), COST).unwrap();
        assert_eq!(created.user_ref_uid.as_deref(), Some("ref-1"));

        let mut second = input("user2", "b@x.com", "+200");
        second.user_ref_uid = Some("ref-1".into());
        let err = create_account(&mut conn, &second.validate().unwrap(), COST).unwrap_err();
        assert_eq!(field_of(err), "user_ref_uid");

        // Absent references never collide
        for (name, email, phone) in [("user3", "c@x.com", "+300"), ("user4", "d@x.com", "+400")] {
            let new = input(name, email, phone).validate().unwrap();
            assert!(create_account(&mut conn, &new, COST).unwrap().user_ref_uid.is_none());
        }
    }

    #[test]
    fn superuser_has_all_flags_and_no_profile() {
        let pool = test_pool();
        let conn = pool.get().unwrap();

        let admin = create_superuser(&conn, "admin", "adminpass123", COST).unwrap();
        assert!(admin.is_staff);
        assert!(admin.is_superuser);
        assert!(admin.is_active);
        assert!(password::verify_password("adminpass123", &admin.password_hash));
        assert!(matches!(
            find_profile_by_account(&conn, &admin.id),
            Err(AppError::NotFound)
        ));
    }

    #[test]
    fn superuser_requires_username() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        assert!(matches!(
            create_superuser(&conn, "", "testpass123", COST),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn deactivation_is_soft() {
        let pool = test_pool();
        let mut conn = pool.get().unwrap();
        let new = input("alice", "a@x.com", "+100").validate().unwrap();
        create_account(&mut conn, &new, COST).unwrap();

        deactivate_account(&conn, "alice").unwrap();
        let account = find_account_by_username(&conn, "alice").unwrap();
        assert!(!account.is_active);

        assert!(matches!(
            deactivate_account(&conn, "nobody"),
            Err(AppError::NotFound)
        ));
    }
}
