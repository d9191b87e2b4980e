use serde::{Deserialize, Serialize};

use crate::{
    errors::ValidationError,
    time::{align_millis, from_epoch_millis},
};

/// The only product this service trades.
pub const PRODUCT_TYPE: &str = "ELECTRICITY";

/// Whether the order purchases or sells electricity.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderType {
    Buy,
    Sell,
}

/// Market segment the order trades in.
///
/// - `Dah` (Day-Ahead): default window sits on tomorrow's calendar day
/// - `Intraday`: default window is the next quarter-hour from now
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode,
)]
pub enum MarketType {
    #[serde(rename = "DAH")]
    Dah,
    #[serde(rename = "Intra-Day")]
    Intraday,
}

/// Product traded by an order. Single-valued, so a stored order can only
/// ever carry `"ELECTRICITY"`.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    bincode::Encode,
    bincode::Decode,
)]
pub enum ProductType {
    #[default]
    #[serde(rename = "ELECTRICITY")]
    Electricity,
}

/// A stored electricity order.
///
/// `start`/`end` are epoch milliseconds (UTC) describing the half-open
/// trading window `[start, end)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: String,
    pub order_type: OrderType,
    pub product_type: ProductType,
    #[serde(rename = "type", default)]
    pub market_type: Option<MarketType>,
    pub quantity: f64,
    pub created: i64,
    pub start: i64,
    pub end: i64,
}

/// Payload for creating an order.
///
/// Omitted `start`/`end` are filled in from the market's default window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderCreate {
    pub order_type: OrderType,
    #[serde(default)]
    pub product_type: Option<String>,
    #[serde(rename = "type", default)]
    pub market_type: Option<MarketType>,
    pub quantity: f64,
    #[serde(default)]
    pub start: Option<i64>,
    #[serde(default)]
    pub end: Option<i64>,
}

impl OrderCreate {
    pub fn new(order_type: OrderType, market_type: Option<MarketType>, quantity: f64) -> Self {
        Self {
            order_type,
            product_type: None,
            market_type,
            quantity,
            start: None,
            end: None,
        }
    }

    pub fn with_window(mut self, start: Option<i64>, end: Option<i64>) -> Self {
        self.start = start;
        self.end = end;
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(product) = &self.product_type {
            if product != PRODUCT_TYPE {
                return Err(ValidationError::ProductType(product.clone()));
            }
        }
        validate_quantity(self.quantity)?;
        validate_start(self.start)?;
        validate_timestamp(self.end)
    }
}

/// Partial update; `None` keeps the stored value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderUpdate {
    #[serde(default)]
    pub order_type: Option<OrderType>,
    #[serde(rename = "type", default)]
    pub market_type: Option<MarketType>,
    #[serde(default)]
    pub quantity: Option<f64>,
    #[serde(default)]
    pub start: Option<i64>,
    #[serde(default)]
    pub end: Option<i64>,
}

impl OrderUpdate {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(quantity) = self.quantity {
            validate_quantity(quantity)?;
        }
        validate_start(self.start)?;
        validate_timestamp(self.end)
    }
}

fn validate_quantity(quantity: f64) -> Result<(), ValidationError> {
    // NaN fails both checks
    if !(quantity.is_finite() && quantity > 0.0) {
        return Err(ValidationError::Quantity(quantity));
    }
    Ok(())
}

fn validate_timestamp(ms: Option<i64>) -> Result<(), ValidationError> {
    match ms {
        Some(ms) if from_epoch_millis(ms).is_none() => Err(ValidationError::Timestamp(ms)),
        _ => Ok(()),
    }
}

/// A start must also have a representable aligned value.
fn validate_start(ms: Option<i64>) -> Result<(), ValidationError> {
    match ms {
        Some(ms) if align_millis(ms).is_none() => Err(ValidationError::Timestamp(ms)),
        _ => Ok(()),
    }
}
