use lazy_static::lazy_static;
use regex::Regex;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{SubscriptionTier, UserProfile};
use crate::state::AppState;
use crate::store::{NewUser, UserUpdate};

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

fn check_name(name: &str) -> Result<(), AppError> {
    if name.trim().is_empty() {
        return Err(AppError::validation("name", "is required"));
    }
    Ok(())
}

fn check_email(email: &str) -> Result<(), AppError> {
    if !is_valid_email(email) {
        return Err(AppError::validation("email", "is not a valid address"));
    }
    Ok(())
}

fn check_age(age: i32) -> Result<(), AppError> {
    if !(13..=120).contains(&age) {
        return Err(AppError::validation("age", "must be between 13 and 120"));
    }
    Ok(())
}

fn check_weight(weight: f64) -> Result<(), AppError> {
    if !weight.is_finite() || !(50.0..=1000.0).contains(&weight) {
        return Err(AppError::validation("weight", "must be between 50 and 1000 lbs"));
    }
    Ok(())
}

fn check_height(height: f64) -> Result<(), AppError> {
    if !height.is_finite() || !(36.0..=96.0).contains(&height) {
        return Err(AppError::validation("height", "must be between 36 and 96 inches"));
    }
    Ok(())
}

#[instrument(skip(st, input), fields(email = %input.email))]
pub async fn create_user(st: &AppState, mut input: NewUser) -> Result<UserProfile, AppError> {
    input.email = input.email.trim().to_lowercase();
    check_name(&input.name)?;
    check_email(&input.email)?;
    check_age(input.age)?;
    check_weight(input.weight)?;
    check_height(input.height)?;
    input.subscription_tier = SubscriptionTier::Free;

    // the unique email index decides; a taken address surfaces as Conflict
    let user = st.store.create_user(input).await.map_err(|e| {
        let err = AppError::from(e);
        if matches!(err, AppError::Conflict(_)) {
            debug!("email already registered");
        }
        err
    })?;
    info!(user_id = %user.id, "user created");
    Ok(user)
}

pub async fn get_user(st: &AppState, user_id: Uuid) -> Result<UserProfile, AppError> {
    st.store
        .get_user_by_id(user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("user".into()))
}

pub async fn find_user_by_email(st: &AppState, email: &str) -> Result<UserProfile, AppError> {
    let email = email.trim().to_lowercase();
    check_email(&email)?;
    st.store
        .get_user_by_email(&email)
        .await?
        .ok_or_else(|| AppError::NotFound("user".into()))
}

/// Partial profile edit. Tier and billing customer are owned by the
/// subscription flow and are never changed here.
#[instrument(skip(st, patch))]
pub async fn update_user(
    st: &AppState,
    user_id: Uuid,
    mut patch: UserUpdate,
) -> Result<UserProfile, AppError> {
    patch.subscription_tier = None;
    if let Some(name) = &patch.name {
        check_name(name)?;
    }
    if let Some(email) = patch.email.as_mut() {
        *email = email.trim().to_lowercase();
        check_email(email)?;
    }
    if let Some(age) = patch.age {
        check_age(age)?;
    }
    if let Some(weight) = patch.weight {
        check_weight(weight)?;
    }
    if let Some(height) = patch.height {
        check_height(height)?;
    }

    st.store
        .update_user(user_id, patch)
        .await?
        .ok_or_else(|| AppError::NotFound("user".into()))
}
