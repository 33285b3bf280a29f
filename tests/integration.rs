//! Integration tests for the association rule learning pipeline.
//!
//! These tests verify end-to-end workflows combining multiple components.

use arl_recommender::prelude::*;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Service purchases shaped like `UserId, ServiceId, CategoryId, CreateDate`.
///
/// Cleaning (2_0) is usually followed by upholstery (15_1) in the same month,
/// moving (25_0) goes with assembly (4_5), and 9_4 is bought by everyone.
fn service_records() -> Vec<RawRecord> {
    let mut records = Vec::new();
    for user in 0..40u32 {
        let month = 8 + (user % 3);
        let date = |day: u32| format!("2017-{month:02}-{day:02} 10:{:02}:00", user % 60);
        let uid = user.to_string();

        records.push(RawRecord::new(&uid, "9", "4", date(1)));
        if user % 2 == 0 {
            records.push(RawRecord::new(&uid, "2", "0", date(3)));
            if user % 4 != 2 {
                records.push(RawRecord::new(&uid, "15", "1", date(9)));
            }
        }
        if user % 5 == 0 {
            records.push(RawRecord::new(&uid, "25", "0", date(12)));
            records.push(RawRecord::new(&uid, "4", "5", date(13)));
        }
        if user % 7 == 0 {
            // Same raw service id under another category is another service
            records.push(RawRecord::new(&uid, "4", "7", date(20)));
        }
    }
    records
}

#[test]
fn test_service_recommendation_workflow() {
    init_tracing();
    let records = service_records();

    let config = ArlConfig::new()
        .with_min_support(0.05)
        .with_metric(Metric::Support)
        .with_min_threshold(0.01);
    let output = ArlPipeline::new(config)
        .expect("valid config")
        .run(&records)
        .expect("pipeline runs");

    // One basket per user: each user buys within a single month
    assert_eq!(output.matrix.n_baskets(), 40);
    assert_eq!(output.report.skipped_records, 0);
    assert!(output.matrix.item_index(&Item::new("4", "5")).is_some());
    assert!(output.matrix.item_index(&Item::new("4", "7")).is_some());

    // Every frequent itemset meets the threshold
    for entry in output.itemsets.iter() {
        assert!(entry.support >= 0.05);
    }

    // Cleaning customers get upholstery first
    let recommender = output.recommender();
    let picks = recommender
        .recommend_label("2_0", 1)
        .expect("valid label");
    assert_eq!(picks, vec![Item::new("15", "1")]);

    // Moving customers get assembly, not the other category's 4
    let picks = recommender.recommend(&Item::new("25", "0"), 1);
    assert_eq!(picks, vec![Item::new("4", "5")]);
}

#[test]
fn test_monthly_baskets_split_same_user() {
    let records = vec![
        RawRecord::new("7256", "9", "4", "2017-08-06 16:11:00"),
        RawRecord::new("7256", "46", "4", "2017-08-21 10:00:00"),
        RawRecord::new("7256", "9", "4", "2017-10-02 09:30:00"),
        RawRecord::new("7256", "38", "4", "2017-10-14 12:45:00"),
    ];
    let build = BasketBuilder::new().build(&records).expect("valid records");
    let m = &build.matrix;

    let aug = BasketId::new("7256", "2017-08");
    let oct = BasketId::new("7256", "2017-10");
    assert_eq!(m.baskets(), &[aug.clone(), oct.clone()]);
    assert!(m.contains(&aug, &Item::new("9", "4")));
    assert!(m.contains(&aug, &Item::new("46", "4")));
    assert!(!m.contains(&aug, &Item::new("38", "4")));
    assert!(m.contains(&oct, &Item::new("9", "4")));
    assert!(m.contains(&oct, &Item::new("38", "4")));
    assert!(!m.contains(&oct, &Item::new("46", "4")));
}

#[test]
fn test_skipped_records_are_reported() {
    init_tracing();
    let mut records = service_records();
    records.push(RawRecord {
        timestamp: Some("sometime in 2017".to_string()),
        ..RawRecord::new("99", "1", "1", "")
    });
    records.push(RawRecord {
        user_id: None,
        ..RawRecord::new("", "1", "1", "2017-08-01")
    });

    let output = ArlPipeline::new(ArlConfig::new().with_min_support(0.05))
        .unwrap()
        .run(&records)
        .unwrap();
    assert_eq!(output.report.skipped_records, 2);
    assert_eq!(output.report.total_records, records.len());
    assert_eq!(output.matrix.n_baskets(), 40);
}

#[test]
fn test_lift_threshold_filters_rules() {
    let config = ArlConfig::new()
        .with_min_support(0.05)
        .with_metric(Metric::Lift)
        .with_min_threshold(1.5);
    let output = ArlPipeline::new(config).unwrap().run(&service_records()).unwrap();

    assert!(!output.rules.is_empty());
    for rule in &output.rules {
        assert!(rule.lift >= 1.5);
    }
    for pair in output.rules.windows(2) {
        assert!(pair[0].lift >= pair[1].lift);
    }
}

#[test]
fn test_staged_api_matches_pipeline() {
    let records = service_records();
    let config = ArlConfig::new().with_min_support(0.1);

    let build = BasketBuilder::from_config(&config).build(&records).unwrap();
    let itemsets = Apriori::from_config(&config).mine(&build.matrix).unwrap();
    let rules = RuleGenerator::from_config(&config).generate(&itemsets).unwrap();

    let output = ArlPipeline::new(config).unwrap().run(&records).unwrap();
    assert_eq!(output.matrix, build.matrix);
    assert_eq!(output.itemsets, itemsets);
    assert_eq!(output.rules, rules);
}

#[test]
fn test_json_config_and_serialized_rules() {
    let config = ArlConfig::from_json_str(
        r#"{"min_support": 0.1, "metric": "confidence", "min_threshold": 0.5, "max_len": 2}"#,
    )
    .expect("valid json config");
    let output = ArlPipeline::new(config).unwrap().run(&service_records()).unwrap();

    assert!(output.itemsets.max_len() <= 2);
    let json = serde_json::to_string(&output.rules).expect("rules serialize");
    assert!(json.contains("\"antecedent\""));
    assert!(json.contains("\"lift\""));
}

#[test]
fn test_weekly_granularity_gives_more_baskets() {
    let records = service_records();
    let monthly = ArlPipeline::new(ArlConfig::new()).unwrap().run(&records).unwrap();
    let weekly = ArlPipeline::new(
        ArlConfig::new().with_basket_granularity(BasketGranularity::Week),
    )
    .unwrap()
    .run(&records)
    .unwrap();
    assert!(weekly.matrix.n_baskets() > monthly.matrix.n_baskets());
}
