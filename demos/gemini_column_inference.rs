use anyhow::Result;
use dotenv::dotenv;
use ledger_reconciler::llm::{GeminiClient, GeminiColumnInference};
use ledger_reconciler::{
    DatasetType, IngestOptions, PipelineConfig, RawTable, ReconciliationPipeline,
};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    env_logger::init();
    let api_key = std::env::var("GEMINI_API_KEY")?;

    let config = PipelineConfig {
        inference_timeout_ms: 30_000,
        ..PipelineConfig::default()
    };
    let pipeline = ReconciliationPipeline::new(config)?
        .with_inference(GeminiColumnInference::new(GeminiClient::new(api_key)));

    // Headers no name tier recognizes.
    let table = RawTable::from_text_rows(
        &["Posting Day", "Client", "Article", "Units", "Booked Value (KRW)"],
        &[
            vec!["2025-02-03", "Alpha Trading", "Widget A", "12", "1,250,000"],
            vec!["2025-02-11", "Beta Corp", "Widget B", "4", "380,000"],
        ],
    );

    let outcome = pipeline
        .ingest(None, DatasetType::Sales, &table, IngestOptions::default())
        .await?;

    println!("accepted: {}", outcome.accepted);
    for m in outcome.mapping.iter() {
        println!("  {:<20} -> {:<16} {:?}", m.column, m.canonical, m.method);
    }
    for warning in &outcome.warnings {
        println!("  warning: {}", warning);
    }
    Ok(())
}
