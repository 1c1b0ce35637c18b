//! Percentage promotions attached to a dish.
//!
//! A promotion is *effective* only when its manual flag is set and the
//! current instant lies inside `[starts_at, ends_at]`. Both halves are
//! reported separately so callers can tell "switched off" from "expired".

use bigdecimal::{BigDecimal, RoundingMode};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::errors::DomainError;

const DAY_MS: i64 = 24 * 60 * 60 * 1000;

/// `price × (1 − percentage/100)`, rounded half-up to cents.
pub fn discounted_price(price: &BigDecimal, percentage: &BigDecimal) -> BigDecimal {
    let hundred = BigDecimal::from(100);
    let remaining = &hundred - percentage;
    (price * remaining / hundred).with_scale_round(2, RoundingMode::HalfUp)
}

/// Whole days left until `ends_at`, rounded up, rendered for display.
///
/// The count depends on the time of day `now` falls on, so two calls a few
/// minutes apart around a day boundary may disagree.
pub fn days_left(ends_at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let diff_ms = (ends_at - now).num_milliseconds();
    let days = -((-diff_ms).div_euclid(DAY_MS));
    match days {
        d if d <= 0 => "Promotion terminée".to_string(),
        1 => "Il reste 1 jour".to_string(),
        d => format!("Il reste {d} jours"),
    }
}

pub fn within_window(starts_at: DateTime<Utc>, ends_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    starts_at <= now && now <= ends_at
}

/// Caller-supplied promotion parameters, validated before use.
#[derive(Debug, Clone)]
pub struct PromotionTerms {
    /// Percent off, 1 to 100, with at most two decimals.
    pub percentage: BigDecimal,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub is_active: bool,
    pub message: Option<String>,
}

impl PromotionTerms {
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.percentage < BigDecimal::from(1) || self.percentage > BigDecimal::from(100) {
            return Err(DomainError::InvalidInput(
                "percentage must be between 1 and 100".into(),
            ));
        }
        let (_, scale) = self.percentage.normalized().as_bigint_and_exponent();
        if scale > 2 {
            return Err(DomainError::InvalidInput(
                "percentage accepts at most two decimals".into(),
            ));
        }
        if self.ends_at <= self.starts_at {
            return Err(DomainError::InvalidInput(
                "end date must be after start date".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Promotion {
    pub is_active: bool,
    pub percentage: BigDecimal,
    pub discounted_price: BigDecimal,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromotionState {
    pub effective: bool,
    pub manually_disabled: bool,
    pub dates_expired: bool,
}

impl Promotion {
    pub fn from_terms(price: &BigDecimal, terms: PromotionTerms) -> Result<Self, DomainError> {
        terms.validate()?;
        Ok(Self {
            is_active: terms.is_active,
            discounted_price: discounted_price(price, &terms.percentage),
            percentage: terms.percentage.with_scale(2),
            starts_at: terms.starts_at,
            ends_at: terms.ends_at,
            message: terms.message,
        })
    }

    pub fn state(&self, now: DateTime<Utc>) -> PromotionState {
        let in_window = within_window(self.starts_at, self.ends_at, now);
        PromotionState {
            effective: self.is_active && in_window,
            manually_disabled: !self.is_active,
            dates_expired: !in_window,
        }
    }

    pub fn is_effective(&self, now: DateTime<Utc>) -> bool {
        self.state(now).effective
    }

    pub fn days_left(&self, now: DateTime<Utc>) -> String {
        days_left(self.ends_at, now)
    }
}

#[derive(Debug, Clone)]
pub struct Dish {
    pub id: Uuid,
    pub restaurant_id: Uuid,
    pub restaurant_owner_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub price: BigDecimal,
    pub images: Vec<String>,
    pub available: bool,
    pub promotion: Option<Promotion>,
}

impl Dish {
    /// The price a new order pays for this dish at `now`.
    pub fn unit_price_at(&self, now: DateTime<Utc>) -> BigDecimal {
        match &self.promotion {
            Some(promo) if promo.is_effective(now) => promo.discounted_price.clone(),
            _ => self.price.clone(),
        }
    }
}
