use anyhow::{Context, Result};
use ledger_reconciler::{
    DatasetType, IngestOptions, PipelineConfig, RawTable, ReconciliationPipeline,
};

const LEDGERS: &[(DatasetType, &str)] = &[
    (
        DatasetType::Sales,
        "전표일자,거래처명,제품명,수량,원화환산액,수출/내수\n\
         2025-01-05,Alpha Trading,Widget A,100,\"600,000\",내수\n\
         2025-01-18,Beta Corp,Widget B,40,\"400,000\",수출\n",
    ),
    (
        DatasetType::Purchases,
        "Date,Vendor,Item,Qty,Net Amount\n\
         2025-01-03,Steel Co,Coil,20,400000\n",
    ),
    (
        DatasetType::Payroll,
        "부서,기본급,지급총액,원가구분\n\
         Production,140000,150000,직접노무비\n\
         Office,45000,50000,간접노무비\n",
    ),
    (
        DatasetType::ManufacturingOverhead,
        "전표일자,계정과목,차변금액\n2025-01-31,Electricity,100000\n",
    ),
    (
        DatasetType::SgExpenses,
        "전표일자,계정과목,차변금액\n2025-01-31,Advertising,80000\n",
    ),
    (
        DatasetType::Inventory,
        "품목명,품목분류,기초금액,기말금액\nCoil,원재료,100000,120000\n",
    ),
];

fn parse_csv(text: &str) -> Result<RawTable> {
    let mut reader = csv::Reader::from_reader(text.as_bytes());
    let columns: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    let mut rows = Vec::new();
    for record in reader.records() {
        rows.push(record?.iter().map(str::to_string).collect::<Vec<_>>());
    }
    Ok(RawTable::from_text_rows(&columns, &rows))
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let pipeline = ReconciliationPipeline::new(PipelineConfig::default())?;
    let session = pipeline.create_session();
    println!("Session {}\n", session);

    for (dataset, text) in LEDGERS {
        let table = parse_csv(text).with_context(|| format!("parsing {} ledger", dataset))?;
        let outcome = pipeline
            .ingest(Some(&session), *dataset, &table, IngestOptions::default())
            .await?;

        match (&outcome.quality, &outcome.rejection) {
            (Some(quality), _) => println!(
                "{:<28} {} rows, {}/{} columns mapped, quality {:.1} ({})",
                dataset.label(),
                outcome.row_count,
                outcome.mapping.len(),
                outcome.observed_columns.len(),
                quality.score,
                quality.grade_label
            ),
            (None, reason) => println!("{:<28} rejected: {:?}", dataset.label(), reason),
        }
        for m in outcome.mapping.iter() {
            println!(
                "    {:<14} -> {:<18} {:?} ({}%)",
                m.column, m.canonical, m.method, m.confidence
            );
        }
    }

    let report = pipeline.synthesize(&session)?;
    println!("\nIncome statement for {}", report.period);
    for item in report.statement.line_items() {
        println!("  {:<36} {:>14}", item.account, item.amount);
    }
    for warning in &report.warnings {
        println!("  warning: {}", warning);
    }

    println!("\n{}", serde_json::to_string_pretty(&report.statement.ratios)?);
    Ok(())
}
