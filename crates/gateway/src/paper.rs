// The paper gateway: live market data through an inner gateway, execution
// against a virtual balance. Fills settle immediately at the requested or
// current price; both balance legs move inside one lock so a rejected
// order can never leave the book half-adjusted.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use core_types::{OrderReceipt, PriceBar, Side, Symbol, Timeframe};
use rust_decimal::Decimal;
use tokio::sync::Mutex;
use tracing::info;

use crate::{Error, ExchangeGateway, Result};

pub struct PaperGateway<G> {
    inner: G,
    balances: Mutex<HashMap<String, Decimal>>,
}

impl<G: ExchangeGateway> PaperGateway<G> {
    /// Seeds the virtual book with `initial_balance` of `quote_currency`.
    pub fn new(inner: G, quote_currency: &str, initial_balance: Decimal) -> Self {
        let mut balances = HashMap::new();
        balances.insert(quote_currency.to_string(), initial_balance);
        Self {
            inner,
            balances: Mutex::new(balances),
        }
    }
}

#[async_trait]
impl<G: ExchangeGateway> ExchangeGateway for PaperGateway<G> {
    async fn fetch_bars(
        &self,
        symbol: &Symbol,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<Vec<PriceBar>> {
        self.inner.fetch_bars(symbol, timeframe, limit).await
    }

    async fn fetch_current_price(&self, symbol: &Symbol) -> Result<Decimal> {
        self.inner.fetch_current_price(symbol).await
    }

    async fn fetch_balance(&self) -> Result<HashMap<String, Decimal>> {
        Ok(self.balances.lock().await.clone())
    }

    async fn place_order(
        &self,
        symbol: &Symbol,
        side: Side,
        amount: Decimal,
        price: Option<Decimal>,
    ) -> Result<OrderReceipt> {
        // Resolve the fill price before taking the lock; an explicit price
        // avoids the network entirely.
        let fill_price = match price {
            Some(p) => p,
            None => self.inner.fetch_current_price(symbol).await?,
        };
        let cost = amount * fill_price;
        let base = symbol.base().to_string();
        let quote = symbol.quote().to_string();

        let mut balances = self.balances.lock().await;
        match side {
            Side::Buy => {
                let available = balances.get(&quote).copied().unwrap_or(Decimal::ZERO);
                if available < cost {
                    return Err(Error::InsufficientBalance {
                        currency: quote,
                        available,
                        required: cost,
                    });
                }
                *balances.entry(quote).or_insert(Decimal::ZERO) -= cost;
                *balances.entry(base).or_insert(Decimal::ZERO) += amount;
            }
            Side::Sell => {
                let available = balances.get(&base).copied().unwrap_or(Decimal::ZERO);
                if available < amount {
                    return Err(Error::InsufficientBalance {
                        currency: base,
                        available,
                        required: amount,
                    });
                }
                *balances.entry(base).or_insert(Decimal::ZERO) -= amount;
                *balances.entry(quote).or_insert(Decimal::ZERO) += cost;
            }
        }
        drop(balances);

        let timestamp = Utc::now().timestamp_millis();
        info!(
            symbol = %symbol.0,
            side = side.as_str(),
            %amount,
            price = %fill_price,
            "paper fill"
        );

        Ok(OrderReceipt {
            order_id: format!("PAPER-{timestamp}"),
            symbol: symbol.clone(),
            side,
            amount,
            price: fill_price,
            cost,
            timestamp,
            paper: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    /// Serves a fixed price and nothing else; the paper gateway under test
    /// only needs the ticker.
    struct FixedPrice(Decimal);

    #[async_trait]
    impl ExchangeGateway for FixedPrice {
        async fn fetch_bars(&self, _: &Symbol, _: Timeframe, _: usize) -> Result<Vec<PriceBar>> {
            Ok(Vec::new())
        }

        async fn fetch_current_price(&self, _: &Symbol) -> Result<Decimal> {
            Ok(self.0)
        }

        async fn fetch_balance(&self) -> Result<HashMap<String, Decimal>> {
            Ok(HashMap::new())
        }

        async fn place_order(
            &self,
            _: &Symbol,
            _: Side,
            _: Decimal,
            _: Option<Decimal>,
        ) -> Result<OrderReceipt> {
            unreachable!("paper gateway must not forward orders")
        }
    }

    fn symbol() -> Symbol {
        Symbol("BTC/USDT".to_string())
    }

    #[tokio::test]
    async fn buy_and_sell_round_trip_moves_both_legs() {
        let gw = PaperGateway::new(FixedPrice(dec!(100)), "USDT", dec!(1000));

        let receipt = gw.place_order(&symbol(), Side::Buy, dec!(4), None).await.unwrap();
        assert!(receipt.paper);
        assert_eq!(receipt.cost, dec!(400));

        let balances = gw.fetch_balance().await.unwrap();
        assert_eq!(balances["USDT"], dec!(600));
        assert_eq!(balances["BTC"], dec!(4));

        // Sell back at a higher explicit price without touching the inner
        // gateway's ticker.
        gw.place_order(&symbol(), Side::Sell, dec!(4), Some(dec!(110))).await.unwrap();
        let balances = gw.fetch_balance().await.unwrap();
        assert_eq!(balances["USDT"], dec!(1040));
        assert_eq!(balances["BTC"], dec!(0));
    }

    #[tokio::test]
    async fn underfunded_buy_is_rejected_and_changes_nothing() {
        let gw = PaperGateway::new(FixedPrice(dec!(100)), "USDT", dec!(300));

        let result = gw.place_order(&symbol(), Side::Buy, dec!(4), None).await;
        assert!(matches!(
            result,
            Err(Error::InsufficientBalance { ref currency, .. }) if currency == "USDT"
        ));

        let balances = gw.fetch_balance().await.unwrap();
        assert_eq!(balances["USDT"], dec!(300));
        assert!(!balances.contains_key("BTC"));
    }

    #[tokio::test]
    async fn selling_more_than_held_is_rejected() {
        let gw = PaperGateway::new(FixedPrice(dec!(100)), "USDT", dec!(1000));
        gw.place_order(&symbol(), Side::Buy, dec!(2), None).await.unwrap();

        let result = gw.place_order(&symbol(), Side::Sell, dec!(5), None).await;
        assert!(matches!(
            result,
            Err(Error::InsufficientBalance { ref currency, .. }) if currency == "BTC"
        ));

        let balances = gw.fetch_balance().await.unwrap();
        assert_eq!(balances["BTC"], dec!(2));
        assert_eq!(balances["USDT"], dec!(800));
    }
}
