use std::sync::{Arc, RwLock};

use crate::commands::notify::Notifier;
use crate::config::AppConfig;
use crate::error::{DairyError, DairyResult};
use crate::graphql::{self, DairySchema};
use crate::store::DocumentStore;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn DocumentStore>,
    /// Report messages to the configured recipients.
    pub notifier: Arc<dyn Notifier>,
    /// Messages addressed to an account's email, such as reset links.
    pub mailer: Arc<dyn Notifier>,
    /// Replies to the messaging bot.
    pub bot: Arc<dyn Notifier>,
    pub market_price: MarketPrice,
    pub schema: DairySchema,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        store: Arc<dyn DocumentStore>,
        notifier: Arc<dyn Notifier>,
        mailer: Arc<dyn Notifier>,
        bot: Arc<dyn Notifier>,
    ) -> Self {
        let market_price = MarketPrice::new(config.market_price);
        Self {
            config: Arc::new(config),
            store,
            notifier,
            mailer,
            bot,
            market_price,
            schema: graphql::build_schema(),
        }
    }
}

/// Live average market price per unit of milk. Reports copy the value they
/// were computed with, so changing it never rewrites history.
#[derive(Clone, Debug)]
pub struct MarketPrice(Arc<RwLock<f64>>);

impl MarketPrice {
    pub fn new(price: f64) -> Self {
        Self(Arc::new(RwLock::new(price)))
    }

    pub fn get(&self) -> f64 {
        match self.0.read() {
            Ok(price) => *price,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    pub fn set(&self, price: f64) -> DairyResult<f64> {
        if !price.is_finite() || price <= 0.0 {
            return Err(DairyError::Validation(
                "Average market price must be a positive number.".to_string(),
            ));
        }
        let mut current = self
            .0
            .write()
            .map_err(|_| DairyError::Internal("Market price lock error".to_string()))?;
        *current = price;
        Ok(price)
    }
}
