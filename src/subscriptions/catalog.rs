use serde::Serialize;

use crate::models::SubscriptionTier;

#[derive(Debug, Clone, Serialize)]
pub struct PlanInfo {
    pub id: SubscriptionTier,
    pub name: &'static str,
    pub description: &'static str,
    pub price: u32, // USD per interval
    pub interval: &'static str,
    pub features: &'static [&'static str],
}

pub static PLANS: [PlanInfo; 3] = [
    PlanInfo {
        id: SubscriptionTier::Free,
        name: "Free",
        description: "Basic nutrition tracking",
        price: 0,
        interval: "month",
        features: &[
            "Basic meal logging",
            "Simple progress tracking",
            "Limited recipe access",
        ],
    },
    PlanInfo {
        id: SubscriptionTier::Basic,
        name: "Basic",
        description: "Personalized nutrition plans",
        price: 9,
        interval: "month",
        features: &[
            "Personalized diet plans",
            "Advanced meal logging",
            "Progress analytics",
            "Recipe recommendations",
            "Email support",
        ],
    },
    PlanInfo {
        id: SubscriptionTier::Premium,
        name: "Premium",
        description: "Complete nutrition coaching",
        price: 19,
        interval: "month",
        features: &[
            "Personalized meal planning",
            "Advanced progress tracking",
            "Unlimited recipe access",
            "Community access",
            "Priority support",
            "Custom meal prep guides",
            "Nutritionist consultations",
        ],
    },
];

pub fn plan_for(tier: SubscriptionTier) -> &'static PlanInfo {
    match tier {
        SubscriptionTier::Free => &PLANS[0],
        SubscriptionTier::Basic => &PLANS[1],
        SubscriptionTier::Premium => &PLANS[2],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_tier_has_a_plan() {
        for tier in [
            SubscriptionTier::Free,
            SubscriptionTier::Basic,
            SubscriptionTier::Premium,
        ] {
            assert_eq!(plan_for(tier).id, tier);
        }
        assert_eq!(plan_for(SubscriptionTier::Free).price, 0);
    }
}
