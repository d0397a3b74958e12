#[cfg(test)]
mod tests {
    use chrono::{Duration, FixedOffset, TimeZone, Utc};

    use crate::commands::expense::{create_expense_record, ExpenseInput};
    use crate::commands::payment::{create_payment_record, PaymentInput};
    use crate::commands::production::{create_production_record, ProductionInput};
    use crate::commands::report::{fetch_window, summarize, ReportWindow};
    use crate::commands::utils::parse_timestamp;
    use crate::state::MarketPrice;
    use crate::store::MemoryStore;

    fn nairobi() -> FixedOffset {
        FixedOffset::east_opt(3 * 3600).unwrap()
    }

    fn production(name: &str, date: &str, yields: [f64; 3]) -> ProductionInput {
        ProductionInput {
            name: name.to_string(),
            morning_production: yields[0],
            afternoon_production: yields[1],
            evening_production: yields[2],
            production_date: date.to_string(),
        }
    }

    /// Records exactly on either bound belong to the window.
    #[tokio::test]
    async fn test_window_bounds_are_inclusive() {
        let store = MemoryStore::new();
        let start = parse_timestamp("2024-03-08T08:00", nairobi()).unwrap();
        let end = start - Duration::days(7);

        for (name, ts) in [
            ("on-start", start),
            ("on-end", end),
            ("too-old", end - Duration::seconds(1)),
            ("too-new", start + Duration::seconds(1)),
        ] {
            create_production_record(
                &store,
                nairobi(),
                production(name, &ts.to_rfc3339(), [1.0, 1.0, 1.0]),
            )
            .await
            .unwrap();
        }

        let records = fetch_window(&store, ReportWindow::new(start, end).unwrap())
            .await
            .unwrap();
        let mut names: Vec<_> = records.production.iter().map(|r| r.name.as_str()).collect();
        names.sort();
        assert_eq!(names, vec!["on-end", "on-start"]);
    }

    /// Earnings tie production, payments and expenses together.
    #[tokio::test]
    async fn test_weekly_numbers_from_stored_records() {
        let store = MemoryStore::new();
        let offset = nairobi();

        create_production_record(&store, offset, production("Daisy", "2024-03-02T06:00", [20.0, 30.0, 30.0]))
            .await
            .unwrap();
        create_production_record(&store, offset, production("Bella", "2024-03-03T06:00", [10.0, 10.0, 10.0]))
            .await
            .unwrap();

        for (amount, method) in [(3000.0, "Mpesa"), (1000.0, "Cash"), (500.0, "Bank")] {
            create_payment_record(
                &store,
                offset,
                PaymentInput {
                    name: "Kamau".to_string(),
                    amount,
                    payment_method: method.to_string(),
                    quantity: 10.0,
                    payment_date: "2024-03-04T10:00".to_string(),
                },
            )
            .await
            .unwrap();
        }

        create_expense_record(
            &store,
            offset,
            ExpenseInput {
                item: "Dairy meal".to_string(),
                category: "Raw Materials".to_string(),
                amount: 1500.0,
                date_of_action: "2024-03-05".to_string(),
            },
        )
        .await
        .unwrap();

        let window = ReportWindow::new(
            Utc.with_ymd_and_hms(2024, 3, 8, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap(),
        )
        .unwrap();
        let records = fetch_window(&store, window).await.unwrap();
        let price = MarketPrice::new(70.0);
        let summary = summarize(&records, price.get());

        assert_eq!(summary.production.total_milk_production, 110.0);
        assert_eq!(summary.production.average_milk_production, Some(55.0));
        assert_eq!(summary.payment.gross_earnings, 4500.0);
        assert_eq!(summary.payment.expected_gross_earnings, 7700.0);
        assert_eq!(summary.payment.net_earnings, 3000.0);
        assert_eq!(summary.payment.payment_methods_stats.mpesa, 1);
        assert_eq!(summary.payment.payment_methods_stats.cash, 1);
        assert_eq!(summary.payment.payment_methods_stats.other, 1);
        assert_eq!(summary.expenses.expense_category_stats.raw_materials, 1);
    }

    #[test]
    fn test_market_price_accepts_only_positive_values() {
        let price = MarketPrice::new(70.0);
        assert!(price.set(0.0).is_err());
        assert!(price.set(-5.0).is_err());
        assert!(price.set(f64::INFINITY).is_err());
        assert_eq!(price.get(), 70.0);

        let shared = price.clone();
        shared.set(82.5).unwrap();
        assert_eq!(price.get(), 82.5);
    }
}
