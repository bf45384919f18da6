use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::core::enums::TradeSide;
use crate::entity::trades;
use crate::services::trade::realized_pnl;

// validator 对 Copy 类型按值传入
fn positive(value: f64) -> Result<(), ValidationError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ValidationError::new("must_be_positive"))
    }
}

fn non_negative(value: f64) -> Result<(), ValidationError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ValidationError::new("must_not_be_negative"))
    }
}

#[derive(Deserialize, Validate, Debug)]
pub struct CreateTradeRequest {
    pub league_id: Option<Uuid>,

    #[validate(regex(path = *crate::dtos::SYMBOL_REGEX, message = "Invalid symbol"))]
    pub symbol: String,

    pub side: TradeSide,

    #[validate(custom(function = "positive", message = "Quantity must be positive"))]
    pub quantity: f64,

    #[validate(custom(function = "positive", message = "Entry price must be positive"))]
    pub entry_price: f64,

    #[validate(custom(function = "positive", message = "Exit price must be positive"))]
    pub exit_price: Option<f64>,

    #[validate(custom(function = "non_negative", message = "Fees cannot be negative"))]
    pub fees: Option<f64>,

    #[validate(length(min = 1, max = 32, message = "Emotion must be 1-32 characters"))]
    pub emotion: Option<String>,

    #[validate(range(min = 1, max = 10, message = "Confidence must be between 1 and 10"))]
    pub confidence: Option<i16>,

    #[validate(length(max = 5000, message = "Notes must be at most 5000 characters"))]
    pub notes: Option<String>,

    pub opened_at: Option<DateTime<FixedOffset>>,
    pub closed_at: Option<DateTime<FixedOffset>>,
}

/// 部分更新：未提供的字段保持不变
#[derive(Deserialize, Validate, Debug, Default)]
pub struct UpdateTradeRequest {
    #[validate(regex(path = *crate::dtos::SYMBOL_REGEX, message = "Invalid symbol"))]
    pub symbol: Option<String>,

    pub side: Option<TradeSide>,

    #[validate(custom(function = "positive", message = "Quantity must be positive"))]
    pub quantity: Option<f64>,

    #[validate(custom(function = "positive", message = "Entry price must be positive"))]
    pub entry_price: Option<f64>,

    #[validate(custom(function = "positive", message = "Exit price must be positive"))]
    pub exit_price: Option<f64>,

    #[validate(custom(function = "non_negative", message = "Fees cannot be negative"))]
    pub fees: Option<f64>,

    #[validate(length(min = 1, max = 32, message = "Emotion must be 1-32 characters"))]
    pub emotion: Option<String>,

    #[validate(range(min = 1, max = 10, message = "Confidence must be between 1 and 10"))]
    pub confidence: Option<i16>,

    #[validate(length(max = 5000, message = "Notes must be at most 5000 characters"))]
    pub notes: Option<String>,

    pub closed_at: Option<DateTime<FixedOffset>>,
}

#[derive(Deserialize, Debug, Default)]
pub struct TradeListQuery {
    pub page: Option<u64>,
    pub per_page: Option<u64>,
    pub symbol: Option<String>,
    pub league_id: Option<Uuid>,
    /// true 只看持仓中，false 只看已平仓
    pub open: Option<bool>,
}

#[derive(Serialize, Debug, Clone)]
pub struct TradeView {
    pub id: String,
    pub league_id: Option<String>,
    pub symbol: String,
    pub side: TradeSide,
    pub quantity: f64,
    pub entry_price: f64,
    pub exit_price: Option<f64>,
    pub fees: f64,
    pub realized_pnl: Option<f64>,
    pub emotion: Option<String>,
    pub confidence: Option<i16>,
    pub notes: Option<String>,
    pub opened_at: String,
    pub closed_at: Option<String>,
}

impl From<trades::Model> for TradeView {
    fn from(t: trades::Model) -> Self {
        let pnl = realized_pnl(&t);
        Self {
            id: t.id.to_string(),
            league_id: t.league_id.map(|id| id.to_string()),
            symbol: t.symbol,
            side: t.side,
            quantity: t.quantity,
            entry_price: t.entry_price,
            exit_price: t.exit_price,
            fees: t.fees,
            realized_pnl: pnl,
            emotion: t.emotion,
            confidence: t.confidence,
            notes: t.notes,
            opened_at: t.opened_at.to_rfc3339(),
            closed_at: t.closed_at.map(|c| c.to_rfc3339()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(quantity: f64, confidence: Option<i16>) -> CreateTradeRequest {
        CreateTradeRequest {
            league_id: None,
            symbol: "AAPL".to_string(),
            side: TradeSide::Long,
            quantity,
            entry_price: 100.0,
            exit_price: None,
            fees: None,
            emotion: None,
            confidence,
            notes: None,
            opened_at: None,
            closed_at: None,
        }
    }

    #[test]
    fn rejects_non_positive_quantity() {
        assert!(request(10.0, Some(5)).validate().is_ok());
        assert!(request(0.0, None).validate().is_err());
        assert!(request(f64::NAN, None).validate().is_err());
    }

    #[test]
    fn confidence_must_be_in_range() {
        assert!(request(1.0, Some(11)).validate().is_err());
        assert!(request(1.0, Some(0)).validate().is_err());
    }

    #[test]
    fn notes_length_counts_characters() {
        let mut req = request(1.0, None);
        // 多字节字符按字符计数
        req.notes = Some("情".repeat(5000));
        assert!(req.validate().is_ok());
        req.notes = Some("情".repeat(5001));
        assert!(req.validate().is_err());
    }

    #[test]
    fn optional_prices_and_fees_are_checked_when_present() {
        let mut req = request(1.0, None);
        req.fees = Some(-0.5);
        assert!(req.validate().is_err());
        req.fees = Some(0.0);
        req.exit_price = Some(-3.0);
        assert!(req.validate().is_err());

        let update = UpdateTradeRequest { quantity: Some(-1.0), ..Default::default() };
        assert!(update.validate().is_err());
        assert!(UpdateTradeRequest::default().validate().is_ok());
    }
}
