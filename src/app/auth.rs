use anyhow::{anyhow, Result};
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use pasetors::claims::{Claims, ClaimsValidationRules};
use pasetors::keys::SymmetricKey;
use pasetors::token::UntrustedToken;
use pasetors::{local, version4::V4, Local};
use sqlx::postgres::PgRow;
use sqlx::Row;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::domain::user::{Actor, Role, User};
use crate::infra::db::Db;

const TOKEN_ISSUER: &str = "basecamp";

#[derive(Debug, Clone)]
pub struct AccessToken {
    pub token: String,
    pub expires_at: OffsetDateTime,
}

#[derive(Clone)]
pub struct AuthService {
    db: Db,
    access_key: [u8; 32],
    access_ttl_minutes: u64,
}

impl AuthService {
    pub fn new(db: Db, access_key: [u8; 32], access_ttl_minutes: u64) -> Self {
        Self {
            db,
            access_key,
            access_ttl_minutes,
        }
    }

    /// Returns `None` for an unknown email or a wrong password.
    pub async fn login(&self, email: &str, password: &str) -> Result<Option<(AccessToken, User)>> {
        let row = sqlx::query(
            "SELECT id, name, email, role::text AS role, password_hash, created_at \
             FROM users WHERE lower(email) = lower($1)",
        )
        .bind(email.trim())
        .fetch_optional(self.db.pool())
        .await?;

        let row = match row {
            Some(row) => row,
            None => return Ok(None),
        };

        let password_hash: String = row.get("password_hash");
        if password_hash.is_empty() || !verify_password(password, &password_hash)? {
            return Ok(None);
        }

        let user = user_from_row(&row)?;
        let token = self.issue_access_token(&user)?;
        Ok(Some((token, user)))
    }

    pub fn issue_access_token(&self, user: &User) -> Result<AccessToken> {
        let duration = std::time::Duration::from_secs(self.access_ttl_minutes * 60);
        let mut claims = Claims::new_expires_in(&duration)?;
        claims.issuer(TOKEN_ISSUER)?;
        claims.audience(TOKEN_ISSUER)?;
        claims.subject(&user.id.to_string())?;
        claims.add_additional("role", user.role.as_db())?;
        claims.add_additional("typ", "access")?;

        let key = SymmetricKey::<V4>::from(&self.access_key)?;
        let token = local::encrypt(&key, &claims, None, None)?;
        let expires_at =
            OffsetDateTime::now_utc() + Duration::minutes(self.access_ttl_minutes as i64);

        Ok(AccessToken { token, expires_at })
    }

    /// `None` for anything that fails decryption or claim validation.
    pub fn authenticate_access_token(&self, token: &str) -> Result<Option<Actor>> {
        let claims = match self.decrypt_claims(token)? {
            Some(claims) => claims,
            None => return Ok(None),
        };
        if claim_str(&claims, "typ") != Some("access") {
            return Ok(None);
        }

        let user_id = claim_str(&claims, "sub")
            .and_then(|value| Uuid::parse_str(value).ok())
            .ok_or_else(|| anyhow!("missing sub claim"))?;
        let role = claim_str(&claims, "role")
            .and_then(Role::from_db)
            .ok_or_else(|| anyhow!("missing role claim"))?;

        Ok(Some(Actor { user_id, role }))
    }

    /// Creates the account if the email is unused, otherwise returns the
    /// existing user untouched.
    pub async fn ensure_user(
        &self,
        name: &str,
        email: &str,
        password: &str,
        role: Role,
    ) -> Result<User> {
        let password_hash = hash_password(password)?;
        let inserted = sqlx::query(
            "INSERT INTO users (name, email, password_hash, role) \
             VALUES ($1, $2, $3, $4::user_role) \
             ON CONFLICT (email) DO NOTHING \
             RETURNING id, name, email, role::text AS role, created_at",
        )
        .bind(name)
        .bind(email)
        .bind(password_hash)
        .bind(role.as_db())
        .fetch_optional(self.db.pool())
        .await?;

        if let Some(row) = inserted {
            return user_from_row(&row);
        }

        let row = sqlx::query(
            "SELECT id, name, email, role::text AS role, created_at FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_one(self.db.pool())
        .await?;
        user_from_row(&row)
    }

    fn decrypt_claims(&self, token: &str) -> Result<Option<Claims>> {
        let key = SymmetricKey::<V4>::from(&self.access_key)?;
        let mut rules = ClaimsValidationRules::new();
        rules.validate_issuer_with(TOKEN_ISSUER);
        rules.validate_audience_with(TOKEN_ISSUER);

        let untrusted = match UntrustedToken::<Local, V4>::try_from(token) {
            Ok(token) => token,
            Err(_) => return Ok(None),
        };
        let trusted = match local::decrypt(&key, &untrusted, &rules, None, None) {
            Ok(token) => token,
            Err(_) => return Ok(None),
        };
        Ok(trusted.payload_claims().cloned())
    }
}

fn user_from_row(row: &PgRow) -> Result<User> {
    let role: String = row.get("role");
    let role = Role::from_db(&role).ok_or_else(|| anyhow!("unknown user role: {}", role))?;
    Ok(User {
        id: row.get("id"),
        name: row.get("name"),
        email: row.get("email"),
        role,
        created_at: row.get("created_at"),
    })
}

pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut argon2::password_hash::rand_core::OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|err| anyhow!("failed to hash password: {}", err))?;
    Ok(hash.to_string())
}

fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed = PasswordHash::new(hash)
        .map_err(|err| anyhow!("failed to parse password hash: {}", err))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

fn claim_str<'a>(claims: &'a Claims, name: &str) -> Option<&'a str> {
    claims.get_claim(name).and_then(|value| value.as_str())
}
