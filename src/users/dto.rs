use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::models::{ActivityLevel, SubscriptionTier, UserProfile};
use crate::store::{NewUser, UserUpdate};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    pub name: String,
    pub email: String,
    pub age: i32,
    pub weight: f64,
    pub height: f64,
    pub activity_level: ActivityLevel,
    #[serde(default)]
    pub dietary_preferences: BTreeSet<String>,
    #[serde(default)]
    pub health_goals: BTreeSet<String>,
}

impl From<CreateUserRequest> for NewUser {
    fn from(r: CreateUserRequest) -> Self {
        Self {
            name: r.name,
            email: r.email,
            age: r.age,
            weight: r.weight,
            height: r.height,
            activity_level: r.activity_level,
            dietary_preferences: r.dietary_preferences,
            health_goals: r.health_goals,
            subscription_tier: SubscriptionTier::Free,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub age: Option<i32>,
    pub weight: Option<f64>,
    pub height: Option<f64>,
    pub activity_level: Option<ActivityLevel>,
    pub dietary_preferences: Option<BTreeSet<String>>,
    pub health_goals: Option<BTreeSet<String>>,
}

impl From<UpdateUserRequest> for UserUpdate {
    fn from(r: UpdateUserRequest) -> Self {
        Self {
            name: r.name,
            email: r.email,
            age: r.age,
            weight: r.weight,
            height: r.height,
            activity_level: r.activity_level,
            dietary_preferences: r.dietary_preferences,
            health_goals: r.health_goals,
            subscription_tier: None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UserLookupQuery {
    pub email: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub age: i32,
    pub weight: f64,
    pub height: f64,
    pub activity_level: ActivityLevel,
    pub dietary_preferences: BTreeSet<String>,
    pub health_goals: BTreeSet<String>,
    pub subscription_tier: SubscriptionTier,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl From<UserProfile> for UserView {
    fn from(u: UserProfile) -> Self {
        Self {
            id: u.id,
            name: u.name,
            email: u.email,
            age: u.age,
            weight: u.weight,
            height: u.height,
            activity_level: u.activity_level,
            dietary_preferences: u.dietary_preferences,
            health_goals: u.health_goals,
            subscription_tier: u.subscription_tier,
            created_at: u.created_at,
            updated_at: u.updated_at,
        }
    }
}
