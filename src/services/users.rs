//! Authentication and staff user management service

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::Utc;

use super::audit::AuditService;
use crate::{
    config::AuthConfig,
    error::{AppError, AppResult},
    models::{
        enums::Role,
        user::{CreateUser, UpdateProfile, UpdateUser, User, UserClaims},
        validation::normalize_cpf,
        SearchQuery,
    },
    repository::{users::NewUser, Repository},
};

#[derive(Clone)]
pub struct UsersService {
    repository: Repository,
    config: AuthConfig,
    audit: AuditService,
}

impl UsersService {
    pub fn new(repository: Repository, config: AuthConfig, audit: AuditService) -> Self {
        Self {
            repository,
            config,
            audit,
        }
    }

    /// Authenticate by CPF and password, returning a JWT and the user
    pub async fn authenticate(&self, cpf: &str, password: &str) -> AppResult<(String, User)> {
        let invalid = || AppError::Authentication("Invalid credentials".to_string());

        let user = self
            .repository
            .users
            .get_by_cpf(&normalize_cpf(cpf))
            .await?
            .ok_or_else(invalid)?;

        if !user.active || !self.verify_password(&user, password)? {
            return Err(invalid());
        }

        let token = self.create_token_for_user(&user)?;
        tracing::info!(user_id = user.id, "User logged in");
        self.audit.record(user.id, "LOGIN".to_string()).await;

        Ok((token, user))
    }

    fn create_token_for_user(&self, user: &User) -> AppResult<String> {
        let now = Utc::now().timestamp();
        let exp = now + (self.config.jwt_expiration_hours as i64 * 3600);

        let claims = UserClaims {
            sub: user.cpf.clone(),
            user_id: user.id,
            role: user.role,
            exp,
            iat: now,
        };

        claims
            .create_token(&self.config.jwt_secret)
            .map_err(|e| AppError::Internal(format!("Failed to create token: {}", e)))
    }

    /// Verify user password
    fn verify_password(&self, user: &User, password: &str) -> AppResult<bool> {
        let parsed_hash = PasswordHash::new(&user.password_hash)
            .map_err(|_| AppError::Internal("Invalid password hash".to_string()))?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok())
    }

    /// Hash a password using Argon2
    pub fn hash_password(&self, password: &str) -> AppResult<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))?;
        Ok(hash.to_string())
    }

    /// Create the first administrator when the users table is empty
    pub async fn ensure_admin(&self) -> AppResult<Option<User>> {
        if self.repository.users.count().await? > 0 {
            return Ok(None);
        }

        let cpf = normalize_cpf(&self.config.bootstrap_admin_cpf);
        let password_hash = self.hash_password(&self.config.bootstrap_admin_password)?;
        let admin = self
            .repository
            .users
            .create(
                NewUser {
                    name: "Administrator",
                    cpf: &cpf,
                    phone: "",
                    address: "",
                    email: None,
                    photo: None,
                    role: Role::Admin,
                    password_hash: &password_hash,
                },
                Utc::now(),
            )
            .await?;

        tracing::warn!(
            user_id = admin.id,
            cpf = %admin.cpf,
            "Bootstrapped administrator account; change its password"
        );
        Ok(Some(admin))
    }

    pub async fn get_by_id(&self, id: i64) -> AppResult<User> {
        self.repository.users.get_by_id(id).await
    }

    pub async fn list_users(&self, query: &SearchQuery) -> AppResult<(Vec<User>, i64)> {
        self.repository.users.list(query).await
    }

    pub async fn create_user(&self, actor_id: i64, user: CreateUser) -> AppResult<User> {
        let cpf = normalize_cpf(&user.cpf);
        if self.repository.users.get_by_cpf(&cpf).await?.is_some() {
            return Err(AppError::Conflict("CPF already registered".to_string()));
        }

        let password_hash = self.hash_password(&user.password)?;
        let created = self
            .repository
            .users
            .create(
                NewUser {
                    name: &user.name,
                    cpf: &cpf,
                    phone: &user.phone,
                    address: &user.address,
                    email: user.email.as_deref().filter(|e| !e.is_empty()),
                    photo: user.photo.as_deref().filter(|p| !p.is_empty()),
                    role: user.role,
                    password_hash: &password_hash,
                },
                Utc::now(),
            )
            .await?;

        self.audit
            .record(actor_id, format!("CREATE_USER:{}", created.id))
            .await;
        Ok(created)
    }

    pub async fn update_user(&self, actor_id: i64, id: i64, update: UpdateUser) -> AppResult<User> {
        let mut user = self.repository.users.get_by_id(id).await?;

        if let Some(name) = update.name {
            user.name = name;
        }
        if let Some(phone) = update.phone {
            user.phone = phone;
        }
        if let Some(address) = update.address {
            user.address = address;
        }
        if let Some(photo) = update.photo {
            user.photo = Some(photo).filter(|p| !p.is_empty());
        }
        if let Some(role) = update.role {
            user.role = role;
        }
        if let Some(ref password) = update.password {
            user.password_hash = self.hash_password(password)?;
        }

        let updated = self.repository.users.update(&user).await?;
        self.audit.record(actor_id, format!("UPDATE_USER:{}", id)).await;
        Ok(updated)
    }

    pub async fn set_active(&self, actor_id: i64, id: i64, active: bool) -> AppResult<User> {
        if !active && id == actor_id {
            return Err(AppError::BadRequest(
                "You cannot deactivate your own account".to_string(),
            ));
        }

        let user = self.repository.users.set_active(id, active).await?;
        let action = if active { "ACTIVATE_USER" } else { "DEACTIVATE_USER" };
        self.audit.record(actor_id, format!("{}:{}", action, id)).await;
        Ok(user)
    }

    pub async fn delete_user(&self, actor_id: i64, id: i64) -> AppResult<()> {
        if id == actor_id {
            return Err(AppError::BadRequest(
                "You cannot delete your own account. Ask another administrator to do it."
                    .to_string(),
            ));
        }

        self.repository.users.delete(id).await?;
        self.audit.record(actor_id, format!("DELETE_USER:{}", id)).await;
        Ok(())
    }

    /// Update the caller's own profile; only administrators may change
    /// their CPF
    pub async fn update_profile(
        &self,
        claims: &UserClaims,
        profile: UpdateProfile,
    ) -> AppResult<User> {
        let mut user = self.repository.users.get_by_id(claims.user_id).await?;

        if let Some(cpf) = profile.cpf.as_deref().map(normalize_cpf) {
            if cpf != user.cpf {
                if !claims.is_admin() {
                    return Err(AppError::Authorization(
                        "Only administrators can change the CPF".to_string(),
                    ));
                }
                if self.repository.users.get_by_cpf(&cpf).await?.is_some() {
                    return Err(AppError::Conflict("CPF already registered".to_string()));
                }
                user.cpf = cpf;
            }
        }

        if let Some(name) = profile.name {
            user.name = name;
        }
        if let Some(phone) = profile.phone {
            user.phone = phone;
        }
        if let Some(address) = profile.address {
            user.address = address;
        }
        if let Some(email) = profile.email {
            user.email = Some(email).filter(|e| !e.is_empty());
        }
        if let Some(photo) = profile.photo {
            user.photo = Some(photo).filter(|p| !p.is_empty());
        }
        if let Some(ref password) = profile.password {
            user.password_hash = self.hash_password(password)?;
        }

        let updated = self.repository.users.update(&user).await?;
        self.audit
            .record(claims.user_id, format!("UPDATE_PROFILE:{}", user.id))
            .await;
        Ok(updated)
    }
}
