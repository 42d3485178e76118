use serde::{Deserialize, Serialize};

use crate::config::Config;

/// Per-period cap handed to users who register without a subscription.
pub const FREE_GENERATION_LIMIT: i32 = 6;

const BASIC_GENERATION_LIMIT: i32 = 100;
const PRO_GENERATION_LIMIT: i32 = 500;

/// The plans a user can check out. Price ids come from configuration;
/// generation limits are owned here, not scattered through env lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanKey {
    Basic,
    Pro,
    Unlimited,
}

impl PlanKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanKey::Basic => "basic",
            PlanKey::Pro => "pro",
            PlanKey::Unlimited => "unlimited",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "basic" => Some(PlanKey::Basic),
            "pro" => Some(PlanKey::Pro),
            "unlimited" => Some(PlanKey::Unlimited),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Plan {
    pub key: PlanKey,
    pub price_id: String,
    /// None means unlimited.
    pub generation_limit: Option<i32>,
}

/// Static plan table resolving both directions: checkout goes key → price id,
/// webhook reconciliation goes price id → generation limit.
#[derive(Debug, Clone)]
pub struct PlanTable {
    plans: Vec<Plan>,
}

impl PlanTable {
    pub fn from_config(config: &Config) -> Self {
        Self {
            plans: vec![
                Plan {
                    key: PlanKey::Basic,
                    price_id: config.stripe_price_basic.clone(),
                    generation_limit: Some(BASIC_GENERATION_LIMIT),
                },
                Plan {
                    key: PlanKey::Pro,
                    price_id: config.stripe_price_pro.clone(),
                    generation_limit: Some(PRO_GENERATION_LIMIT),
                },
                Plan {
                    key: PlanKey::Unlimited,
                    price_id: config.stripe_price_unlimited.clone(),
                    generation_limit: None,
                },
            ],
        }
    }

    pub fn by_key(&self, key: PlanKey) -> &Plan {
        self.plans
            .iter()
            .find(|p| p.key == key)
            .expect("plan table covers every PlanKey variant")
    }

    pub fn by_price_id(&self, price_id: &str) -> Option<&Plan> {
        self.plans.iter().find(|p| p.price_id == price_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> PlanTable {
        PlanTable {
            plans: vec![
                Plan {
                    key: PlanKey::Basic,
                    price_id: "price_basic".into(),
                    generation_limit: Some(BASIC_GENERATION_LIMIT),
                },
                Plan {
                    key: PlanKey::Pro,
                    price_id: "price_pro".into(),
                    generation_limit: Some(PRO_GENERATION_LIMIT),
                },
                Plan {
                    key: PlanKey::Unlimited,
                    price_id: "price_unlimited".into(),
                    generation_limit: None,
                },
            ],
        }
    }

    #[test]
    fn test_lookup_by_key() {
        let t = table();
        assert_eq!(t.by_key(PlanKey::Basic).generation_limit, Some(100));
        assert_eq!(t.by_key(PlanKey::Pro).generation_limit, Some(500));
        assert_eq!(t.by_key(PlanKey::Unlimited).generation_limit, None);
    }

    #[test]
    fn test_lookup_by_price_id() {
        let t = table();
        assert_eq!(t.by_price_id("price_pro").unwrap().key, PlanKey::Pro);
        assert!(t.by_price_id("price_unknown").is_none());
    }

    #[test]
    fn test_plan_key_parse() {
        assert_eq!(PlanKey::parse("basic"), Some(PlanKey::Basic));
        assert_eq!(PlanKey::parse("pro"), Some(PlanKey::Pro));
        assert_eq!(PlanKey::parse("unlimited"), Some(PlanKey::Unlimited));
        assert_eq!(PlanKey::parse("enterprise"), None);
    }
}
