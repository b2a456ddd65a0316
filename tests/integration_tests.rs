use ledger_reconciler::*;
use rust_decimal::Decimal;

fn dec(s: &str) -> Decimal {
    s.parse().unwrap()
}

fn csv_table(text: &str) -> RawTable {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::None)
        .from_reader(text.as_bytes());
    let columns: Vec<String> = reader.headers().unwrap().iter().map(str::to_string).collect();
    let rows: Vec<Vec<String>> = reader
        .records()
        .map(|r| r.unwrap().iter().map(str::to_string).collect())
        .collect();
    RawTable::from_text_rows(&columns, &rows)
}

const SALES_CSV: &str = "\
전표일자,거래처명,제품명,수량,원화환산액,수출/내수,제품구분
2025-01-05,Alpha Trading,Widget A,100,\"600,000\",내수,Industrial
2025-01-18,Beta Corp,Widget B,40,\"250,000\",수출,Industrial
2025-01-28,Alpha Trading,Widget C,15,\"150,000\",Domestic,Consumer
";

const PURCHASES_CSV: &str = "\
Date,Supplier Name,Material Name,Quantity,Net Amount,Material Type
2025-01-03,Steel Co,Coil,20,\"300,000\",원재료
2025-01-20,Resin Ltd,Pellets,10,\"100,000\",원재료
";

const PAYROLL_CSV: &str = "\
사번,성명,부서,기본급,지급총액,원가구분
E01,Kim,Production,90000,100000,직접노무비
E02,Lee,Production,45000,50000,Direct
E03,Park,Quality,45000,50000,간접노무비
";

const OVERHEAD_CSV: &str = "\
전표일자,계정과목,차변금액
2025-01-31,Electricity,60000
2025-01-31,Depreciation,40000
";

const SG_CSV: &str = "\
Date,Account,Debit,Memo
2025-01-10,Salaries,50000,office
2025-01-25,Advertising,30000,
";

const INVENTORY_CSV: &str = "\
품목명,품목분류,기초금액,기말금액,입고금액,출고금액
Coil,원재료,100000,120000,300000,280000
Frame,재공품,50000,50000,10000,10000
Widget,제품,80000,80000,0,0
";

async fn load_all(pipeline: &ReconciliationPipeline, session: &str) {
    for (dataset, text) in [
        (DatasetType::Sales, SALES_CSV),
        (DatasetType::Purchases, PURCHASES_CSV),
        (DatasetType::Payroll, PAYROLL_CSV),
        (DatasetType::ManufacturingOverhead, OVERHEAD_CSV),
        (DatasetType::SgExpenses, SG_CSV),
        (DatasetType::Inventory, INVENTORY_CSV),
    ] {
        let outcome = pipeline
            .ingest(Some(session), dataset, &csv_table(text), IngestOptions::default())
            .await
            .unwrap();
        assert!(outcome.accepted, "{} rejected: {:?}", dataset, outcome.rejection);
    }
}

async fn ingest_csv(
    pipeline: &ReconciliationPipeline,
    session: &str,
    dataset: DatasetType,
    text: &str,
) -> UploadOutcome {
    pipeline
        .ingest(Some(session), dataset, &csv_table(text), IngestOptions::default())
        .await
        .unwrap()
}

#[tokio::test]
async fn test_full_reconciliation() {
    let pipeline = ReconciliationPipeline::new(PipelineConfig::default()).unwrap();
    let session = pipeline.create_session();
    load_all(&pipeline, &session).await;

    let status = pipeline.status(&session).unwrap();
    assert!(status.ready_for_full_synthesis);
    assert!(status.ready_for_minimum_synthesis);

    let report = pipeline.synthesize(&session).unwrap();
    let statement = &report.statement;

    assert_eq!(report.period, "2025-01");
    assert_eq!(statement.revenue.total, dec("1000000"));
    assert_eq!(statement.revenue.export, dec("250000"));
    assert_eq!(statement.revenue.domestic, dec("750000"));
    assert_eq!(statement.revenue.by_category["Industrial"], dec("850000"));

    let cogs = &statement.cost_of_goods_sold;
    assert_eq!(cogs.breakdown.raw_materials, dec("380000"));
    assert_eq!(cogs.breakdown.direct_labor, dec("150000"));
    assert_eq!(cogs.breakdown.manufacturing_overhead, dec("100000"));
    assert_eq!(cogs.breakdown.inventory_adjustment, Decimal::ZERO);
    assert_eq!(cogs.total, dec("630000"));

    assert_eq!(statement.gross_profit, dec("370000"));
    assert_eq!(statement.selling_admin_expenses.total, dec("130000"));
    assert_eq!(statement.operating_profit, dec("240000"));
    assert_eq!(statement.ratios.cost_ratio, dec("63"));
    assert_eq!(statement.ratios.gross_margin, dec("37"));
    assert_eq!(statement.ratios.operating_margin, dec("24"));
    statement.verify_identity().unwrap();

    assert!(report.errors.is_empty(), "{:?}", report.errors);
    assert!(report.warnings.is_empty(), "{:?}", report.warnings);
    assert_eq!(report.data_sources.len(), 6);

    let sales = report.details.sales.as_ref().unwrap();
    assert_eq!(sales.top_customers[0].customer, "Alpha Trading");
    assert_eq!(sales.top_customers[0].amount, dec("750000"));
    assert_eq!(sales.daily_trend.len(), 3);
}

#[tokio::test]
async fn test_minimum_datasets_warn_about_absent_ones() {
    let pipeline = ReconciliationPipeline::new(PipelineConfig::default()).unwrap();
    let session = pipeline.create_session();
    for (dataset, text) in [
        (DatasetType::Sales, SALES_CSV),
        (DatasetType::Purchases, PURCHASES_CSV),
    ] {
        pipeline
            .ingest(Some(&session), dataset, &csv_table(text), IngestOptions::default())
            .await
            .unwrap();
    }

    let report = pipeline.synthesize(&session).unwrap();
    assert_eq!(report.statement.cost_of_goods_sold.total, dec("400000"));
    assert_eq!(report.statement.operating_profit, dec("600000"));
    assert_eq!(report.warnings.len(), 4);
    for label in [
        DatasetType::Payroll,
        DatasetType::ManufacturingOverhead,
        DatasetType::Inventory,
        DatasetType::SgExpenses,
    ]
    .map(|t| t.label())
    {
        assert!(report.warnings.iter().any(|w| w.contains(label)), "no warning for {}", label);
    }
}

#[tokio::test]
async fn test_rejected_reupload_keeps_previous_slot() {
    let pipeline = ReconciliationPipeline::new(PipelineConfig::default()).unwrap();
    let session = pipeline.create_session();
    load_all(&pipeline, &session).await;

    let broken = csv_table("전표일자,계정과목\n2025-01-31,Electricity\n");
    let outcome = pipeline
        .ingest(
            Some(&session),
            DatasetType::ManufacturingOverhead,
            &broken,
            IngestOptions::default(),
        )
        .await
        .unwrap();
    assert!(!outcome.accepted);
    assert_eq!(outcome.missing_required, vec![fields::DEBIT_AMOUNT]);

    let report = pipeline.synthesize(&session).unwrap();
    assert_eq!(report.statement.cost_of_goods_sold.breakdown.manufacturing_overhead, dec("100000"));

    let empty = RawTable::new(["전표일자", "계정과목", "차변금액"]);
    let outcome = pipeline
        .ingest(Some(&session), DatasetType::SgExpenses, &empty, IngestOptions::default())
        .await
        .unwrap();
    assert!(!outcome.accepted);
    assert!(outcome.rejection.unwrap().contains("Empty table"));
}

#[tokio::test]
async fn test_negative_amounts_lower_quality() {
    let pipeline = ReconciliationPipeline::new(PipelineConfig::default()).unwrap();
    let clean = pipeline
        .ingest(None, DatasetType::Purchases, &csv_table(PURCHASES_CSV), IngestOptions::default())
        .await
        .unwrap();

    let dirty = csv_table(
        "Date,Supplier Name,Material Name,Quantity,Net Amount\n\
         2025-01-03,Steel Co,Coil,20,-300000\n\
         2025-01-04,Steel Co,Coil,0,0\n",
    );
    let outcome = pipeline
        .ingest(None, DatasetType::Purchases, &dirty, IngestOptions::default())
        .await
        .unwrap();
    assert!(outcome.accepted);

    let negative = outcome
        .anomalies
        .iter()
        .find(|a| a.kind == AnomalyKind::NegativeValue)
        .unwrap();
    assert_eq!(negative.column, fields::SUPPLY_AMOUNT);
    assert_eq!(negative.severity, Severity::High);
    assert_eq!(negative.affected_rows.as_deref(), Some(&[0usize][..]));
    assert!(outcome
        .anomalies
        .iter()
        .any(|a| a.kind == AnomalyKind::ZeroValue && a.severity == Severity::Low));

    let clean_score = clean.quality.unwrap().score;
    let dirty_score = outcome.quality.unwrap().score;
    assert!(dirty_score < clean_score);
    assert_ne!(clean.session_id, outcome.session_id);
}

#[tokio::test]
async fn test_messy_headers_resolve() {
    let pipeline = ReconciliationPipeline::new(PipelineConfig::default()).unwrap();
    let table = csv_table(
        " VOUCHER_date ,BP Name,품목,Q'ty,DMBTR,비고\n\
         25.01.2025,Gamma,Bolt,3,\"(1,000)\",x\n",
    );
    let outcome = pipeline
        .ingest(None, DatasetType::Sales, &table, IngestOptions::default())
        .await
        .unwrap();

    assert!(outcome.accepted, "{:?}", outcome.rejection);
    let method = |field: &str| outcome.mapping.for_field(field).unwrap().method;
    assert_eq!(method(fields::VOUCHER_DATE), MatchMethod::Normalized);
    assert_eq!(method(fields::CUSTOMER_NAME), MatchMethod::Synonym);
    assert_eq!(method(fields::AMOUNT_KRW), MatchMethod::Synonym);
    assert_eq!(outcome.unmapped_columns, vec!["비고".to_string()]);
    assert_eq!(outcome.preview.rows[0][0], "2025-01-25");
    assert_eq!(outcome.preview.rows[0][4], "-1000");
}

#[tokio::test]
async fn test_manual_override_wins() {
    let pipeline = ReconciliationPipeline::new(PipelineConfig::default()).unwrap();
    let table = csv_table(
        "Date,Customer,Item,Qty,Value\n\
         2025-03-01,Delta,Nut,1,500\n",
    );
    let rejected = pipeline
        .ingest(None, DatasetType::Sales, &table, IngestOptions::default())
        .await
        .unwrap();
    assert!(!rejected.accepted);

    let options = IngestOptions {
        overrides: [("Value".to_string(), fields::AMOUNT_KRW.to_string())].into(),
        ..IngestOptions::default()
    };
    let outcome = pipeline
        .ingest(Some(&rejected.session_id), DatasetType::Sales, &table, options)
        .await
        .unwrap();
    assert!(outcome.accepted);
    let amount = outcome.mapping.for_field(fields::AMOUNT_KRW).unwrap();
    assert_eq!(amount.method, MatchMethod::Manual);
    assert_eq!(amount.confidence, 100);

    let report = pipeline.synthesize(&rejected.session_id).unwrap();
    assert_eq!(report.period, "2025-03");
    assert_eq!(report.statement.revenue.total, dec("500"));
}

#[tokio::test]
async fn test_similarity_inference_maps_near_misses() {
    let pipeline = ReconciliationPipeline::new(PipelineConfig::default())
        .unwrap()
        .with_inference(SimilarityInference::default());
    let table = csv_table(
        "Date,Customer,Item,Qty,Local Amounts\n\
         2025-03-01,Delta,Nut,1,500\n",
    );
    let outcome = pipeline
        .ingest(None, DatasetType::Sales, &table, IngestOptions::default())
        .await
        .unwrap();
    assert!(outcome.accepted);
    let amount = outcome.mapping.for_field(fields::AMOUNT_KRW).unwrap();
    assert_eq!(amount.column, "Local Amounts");
    assert_eq!(amount.method, MatchMethod::Inferred);
}

#[tokio::test]
async fn test_sessions_are_isolated() {
    let pipeline = ReconciliationPipeline::new(PipelineConfig::default()).unwrap();
    let first = pipeline.create_session();
    let second = pipeline.create_session();
    load_all(&pipeline, &first).await;

    assert!(pipeline.status(&second).unwrap().loaded_types.is_empty());
    assert!(matches!(
        pipeline.synthesize(&second),
        Err(ReconcileError::MissingMinimumData { .. })
    ));

    pipeline.delete_session(&first).unwrap();
    assert!(matches!(
        pipeline.status(&first),
        Err(ReconcileError::SessionNotFound(_))
    ));
}

#[tokio::test]
async fn test_reconcile_tables_one_shot() {
    let tables = vec![
        (DatasetType::Sales, csv_table(SALES_CSV)),
        (DatasetType::Purchases, csv_table(PURCHASES_CSV)),
        (DatasetType::Payroll, csv_table("부서,기본급\nProduction,1\n")),
    ];
    let report = reconcile_tables(&tables, PipelineConfig::default()).await.unwrap();
    assert_eq!(report.statement.gross_profit, dec("600000"));
    assert!(report.warnings.iter().any(|w| w.contains("gross_pay")));
}

#[test]
fn test_templates_and_custom_config() {
    let pipeline = ReconciliationPipeline::new(
        PipelineConfig::from_json_str(r#"{"preview_rows": 1, "top_customers": 3}"#).unwrap(),
    )
    .unwrap();
    assert_eq!(pipeline.config().preview_rows, 1);

    let template = pipeline.template(DatasetType::Payroll);
    assert_eq!(
        template.required_columns,
        vec![fields::DEPARTMENT, fields::BASE_SALARY, fields::GROSS_PAY, fields::COST_TYPE]
    );
    assert!(template.optional_columns.contains(&fields::NET_PAY.to_string()));
}

#[tokio::test]
async fn test_identities_hold_for_every_dataset_combination() {
    let optional = [
        (DatasetType::Purchases, PURCHASES_CSV),
        (DatasetType::Payroll, PAYROLL_CSV),
        (DatasetType::ManufacturingOverhead, OVERHEAD_CSV),
        (DatasetType::SgExpenses, SG_CSV),
        (DatasetType::Inventory, INVENTORY_CSV),
    ];
    let pipeline = ReconciliationPipeline::new(PipelineConfig::default()).unwrap();

    for subset in 0u32..(1 << optional.len()) {
        let session = pipeline.create_session();
        ingest_csv(&pipeline, &session, DatasetType::Sales, SALES_CSV).await;
        for (bit, (dataset, text)) in optional.iter().enumerate() {
            if subset & (1 << bit) != 0 {
                ingest_csv(&pipeline, &session, *dataset, text).await;
            }
        }

        let report = pipeline.synthesize(&session).unwrap();
        let statement = &report.statement;
        assert_eq!(
            statement.cost_of_goods_sold.total + statement.gross_profit,
            statement.revenue.total,
            "subset {:05b}",
            subset
        );
        assert_eq!(
            statement.gross_profit - statement.selling_admin_expenses.total,
            statement.operating_profit,
            "subset {:05b}",
            subset
        );
        statement.verify_identity().unwrap();

        let absent = optional.len() - subset.count_ones() as usize;
        assert_eq!(report.warnings.len(), absent, "subset {:05b}: {:?}", subset, report.warnings);
        assert_eq!(report.data_sources.len(), 1 + subset.count_ones() as usize);
    }
}

#[tokio::test]
async fn test_wip_and_finished_goods_changes_adjust_cogs() {
    let pipeline = ReconciliationPipeline::new(PipelineConfig::default()).unwrap();
    let session = pipeline.create_session();
    load_all(&pipeline, &session).await;
    ingest_csv(
        &pipeline,
        &session,
        DatasetType::Inventory,
        "품목명,품목분류,기초금액,기말금액\n\
         Coil,원재료,100000,120000\n\
         Frame,재공품,50000,70000\n\
         Widget,제품,80000,70000\n",
    )
    .await;

    let report = pipeline.synthesize(&session).unwrap();
    let inventory = report.details.inventory.as_ref().unwrap();
    assert_eq!(inventory.work_in_progress.change, dec("20000"));
    assert_eq!(inventory.finished_goods.change, dec("-10000"));

    let cogs = &report.statement.cost_of_goods_sold;
    // 380,000 + 150,000 + 100,000 - 20,000 WIP build-up
    assert_eq!(cogs.total_manufacturing_cost, dec("610000"));
    assert_eq!(cogs.breakdown.inventory_adjustment, dec("-10000"));
    assert_eq!(cogs.total, dec("620000"));
    assert_eq!(report.statement.gross_profit, dec("380000"));
    assert_eq!(report.statement.operating_profit, dec("250000"));
}

#[tokio::test]
async fn test_unknown_payroll_cost_type_is_indirect() {
    let pipeline = ReconciliationPipeline::new(PipelineConfig::default()).unwrap();
    let session = pipeline.create_session();
    ingest_csv(&pipeline, &session, DatasetType::Sales, SALES_CSV).await;
    ingest_csv(
        &pipeline,
        &session,
        DatasetType::Payroll,
        "부서,기본급,지급총액,원가구분\n\
         Production,90000,100000,직접노무비\n\
         Production,25000,30000,Contract\n\
         Quality,15000,20000,간접노무비\n",
    )
    .await;

    let report = pipeline.synthesize(&session).unwrap();
    let payroll = report.details.payroll.as_ref().unwrap();
    assert_eq!(payroll.direct_labor, dec("100000"));
    assert_eq!(payroll.indirect_labor, dec("50000"));
    assert_eq!(report.statement.selling_admin_expenses.breakdown.indirect_labor, dec("50000"));
    assert!(report
        .warnings
        .iter()
        .any(|w| w.contains("Unknown payroll cost type 'Contract'")));
}

#[tokio::test]
async fn test_unrecognized_flags_and_categories_warn() {
    let pipeline = ReconciliationPipeline::new(PipelineConfig::default()).unwrap();
    let session = pipeline.create_session();
    ingest_csv(
        &pipeline,
        &session,
        DatasetType::Sales,
        "전표일자,거래처명,제품명,수량,원화환산액,수출/내수\n\
         2025-01-05,Alpha,Widget,1,700,내수\n\
         2025-01-06,Beta,Widget,1,300,Consignment\n",
    )
    .await;
    ingest_csv(
        &pipeline,
        &session,
        DatasetType::Inventory,
        "품목명,품목분류,기초금액,기말금액\n\
         Coil,원재료,100,100\n\
         Gloves,Supplies,10,40\n",
    )
    .await;

    let report = pipeline.synthesize(&session).unwrap();
    let revenue = &report.statement.revenue;
    assert_eq!(revenue.total, dec("1000"));
    assert_eq!(revenue.domestic, dec("700"));
    assert_eq!(revenue.export, Decimal::ZERO);
    assert!(report
        .warnings
        .iter()
        .any(|w| w.contains("export/domestic") && w.contains("Consignment")));
    assert!(report
        .warnings
        .iter()
        .any(|w| w.contains("Inventory categories") && w.contains("Supplies")));

    let inventory = report.details.inventory.as_ref().unwrap();
    assert_eq!(inventory.by_category["Supplies"].ending, dec("40"));
    assert_eq!(report.statement.cost_of_goods_sold.breakdown.inventory_adjustment, Decimal::ZERO);
}

#[tokio::test]
async fn test_amounts_beyond_decimal_range_fail_synthesis_cleanly() {
    let pipeline = ReconciliationPipeline::new(PipelineConfig::default()).unwrap();
    let session = pipeline.create_session();
    let outcome = ingest_csv(
        &pipeline,
        &session,
        DatasetType::Sales,
        "전표일자,거래처명,제품명,수량,원화환산액\n\
         2025-01-05,Alpha,Widget,1,50000000000000000000000000000\n\
         2025-01-06,Beta,Widget,1,50000000000000000000000000000\n",
    )
    .await;
    assert!(outcome.accepted);
    assert!(outcome
        .anomalies
        .iter()
        .any(|a| a.kind == AnomalyKind::ValueTooHigh));

    match pipeline.synthesize(&session) {
        Err(ReconcileError::ArithmeticOverflow(context)) => {
            assert_eq!(context, "sales.amount_krw");
        }
        other => panic!("expected overflow error, got {:?}", other),
    }
}
