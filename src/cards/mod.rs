pub mod store;

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::money::Money;

pub use store::CardStore;

/// A prepaid transit card and the prices of its two trip legs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    pub key: u64,
    pub label: String,
    pub created: DateTime<Utc>,
    pub balance: Money,
    #[serde(rename = "outwardprice")]
    pub outward_price: Money,
    #[serde(rename = "returnprice")]
    pub return_price: Money,
}

impl Card {
    /// The card shown on first launch
    pub fn example() -> Self {
        Self {
            key: 0,
            label: "Example".to_string(),
            created: Utc::now(),
            balance: Money::ZERO,
            outward_price: Money::from_cents(696),
            return_price: Money::from_cents(696),
        }
    }

    pub fn daily_cost(&self) -> Money {
        crate::plan::daily_cost(self.outward_price, self.return_price)
    }

    /// `#<key> <label> - <created, local time>`
    pub fn title(&self) -> String {
        format!(
            "#{} {} - {}",
            self.key,
            self.label,
            self.created.with_timezone(&Local).format("%Y-%m-%d %H:%M")
        )
    }
}

/// Validated input for a card that has not been assigned a key yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewCard {
    pub label: String,
    pub balance: Money,
    pub outward_price: Money,
    pub return_price: Money,
}

impl NewCard {
    /// Parse the raw text typed into the add-card form.
    pub fn parse(label: &str, balance: &str, outward_price: &str, return_price: &str) -> Result<Self, ValidationError> {
        Ok(Self {
            label: label.trim().to_string(),
            balance: balance.parse()?,
            outward_price: outward_price.parse()?,
            return_price: return_price.parse()?,
        })
    }
}

/// Cards in creation order. Keys only ever grow.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CardCollection {
    cards: Vec<Card>,
}

impl CardCollection {
    pub fn new(cards: Vec<Card>) -> Self {
        Self { cards }
    }

    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    pub fn get(&self, key: u64) -> Option<&Card> {
        self.cards.iter().find(|c| c.key == key)
    }

    pub fn next_key(&self) -> u64 {
        self.cards.iter().map(|c| c.key).max().map_or(0, |k| k + 1)
    }

    /// Assign the next key, stamp the creation time and append.
    pub fn add(&mut self, draft: NewCard) -> &Card {
        let key = self.next_key();
        let label = if draft.label.is_empty() {
            format!("#{}", key)
        } else {
            draft.label
        };

        self.cards.push(Card {
            key,
            label,
            created: Utc::now(),
            balance: draft.balance,
            outward_price: draft.outward_price,
            return_price: draft.return_price,
        });
        tracing::info!("Added card #{}", key);

        &self.cards[self.cards.len() - 1]
    }

    pub fn remove(&mut self, key: u64) -> Result<Card, ValidationError> {
        let index = self
            .cards
            .iter()
            .position(|c| c.key == key)
            .ok_or(ValidationError::UnknownCard(key))?;
        tracing::info!("Removed card #{}", key);
        Ok(self.cards.remove(index))
    }
}
