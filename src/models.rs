use chrono::{DateTime, Utc};
use core_types::Record;
use database::{DbError, Descriptor, Model};
use serde::{Deserialize, Serialize};

/// A single executed trade, as kept in a brokerage activity ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub id: Option<i64>,
    pub date: String,
    pub activity: String,
    pub symbol: String,
    pub quantity: i64,
    pub price: f64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Trade {
    pub fn new(date: &str, activity: &str, symbol: &str, quantity: i64, price: f64) -> Self {
        let now = Utc::now();
        Self {
            id: None,
            date: date.to_string(),
            activity: activity.to_string(),
            symbol: symbol.to_string(),
            quantity,
            price,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }
}

impl Model for Trade {
    fn descriptor() -> Result<Descriptor, DbError> {
        Descriptor::builder("Trade")
            .table("trades")
            .columns([
                "id INTEGER PRIMARY KEY",
                "date TEXT",
                "activity TEXT",
                "symbol TEXT NOT NULL",
                "quantity INTEGER",
                "price REAL",
            ])
            .inherit(&Descriptor::base())
            .sample(
                Record::new()
                    .with("date", "2024-01-19")
                    .with("activity", "BUY")
                    .with("symbol", "IBM")
                    .with("quantity", 100)
                    .with("price", 124.79),
            )
            .build()
    }

    fn validate(&self) -> Result<(), DbError> {
        if !matches!(self.activity.as_str(), "BUY" | "SELL") {
            return Err(DbError::Validation(format!(
                "unknown trade activity `{}`",
                self.activity
            )));
        }
        if self.quantity <= 0 {
            return Err(DbError::Validation(format!(
                "trade quantity must be positive, got {}",
                self.quantity
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::Role;

    #[test]
    fn descriptor_derives_role_tables() {
        let descriptor = Trade::descriptor().unwrap();
        assert_eq!(descriptor.table_for(Role::App), "trades");
        assert_eq!(descriptor.table_for(Role::Source), "trade_s");
        assert_eq!(descriptor.table_for(Role::Target), "trade_t");
        assert_eq!(descriptor.columns().len(), 9);
    }

    #[test]
    fn validation_rejects_unknown_activity() {
        assert!(Trade::new("2024-01-19", "BUY", "IBM", 100, 124.79).validate().is_ok());
        assert!(Trade::new("2024-01-19", "HOLD", "IBM", 100, 124.79).validate().is_err());
        assert!(Trade::new("2024-01-19", "SELL", "IBM", 0, 124.79).validate().is_err());
    }
}
