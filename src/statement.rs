//! Absorption-costing income statement built from the datasets of one session.
//!
//! ```text
//! raw_material_used        = purchases - Δraw_material_inventory
//! total_manufacturing_cost = raw_material_used + direct_labor + overhead - ΔWIP
//! cost_of_goods_sold       = total_manufacturing_cost - Δfinished_goods
//! gross_profit             = revenue - cost_of_goods_sold
//! sg_a_total               = sg_expenses + indirect_labor
//! operating_profit         = gross_profit - sg_a_total
//! ```
//!
//! Only the sales ledger is mandatory. Every other absent dataset contributes
//! zero and adds a warning to the report.

use crate::config::PipelineConfig;
use crate::error::{ReconcileError, Result};
use crate::schema::fields::*;
use crate::schema::DatasetType;
use crate::session::SessionSnapshot;
use crate::table::{NormalizedTable, Value, UNASSIGNED};
use crate::utils::{accumulate, checked_add, checked_sub, flag_key, percent_of, period_label};
use chrono::{DateTime, NaiveDate, Utc};
use log::{debug, info};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

const EXPORT_FLAGS: &[&str] = &["수출", "export", "해외", "overseas"];
const DOMESTIC_FLAGS: &[&str] = &["내수", "domestic", "국내", "local"];
const DIRECT_LABOR_FLAGS: &[&str] = &["직접노무비", "직접", "direct", "directlabor", "dl"];
const INDIRECT_LABOR_FLAGS: &[&str] = &["간접노무비", "간접", "indirect", "indirectlabor", "idl"];
const RAW_MATERIAL_FLAGS: &[&str] = &["원재료", "rawmaterial", "rawmaterials", "rm"];
const WIP_FLAGS: &[&str] = &["재공품", "wip", "workinprogress", "workinprocess"];
const FINISHED_GOODS_FLAGS: &[&str] = &["제품", "finishedgoods", "products", "product", "fg"];

fn flag_in(value: &str, flags: &[&str]) -> bool {
    let key = flag_key(value);
    flags.iter().any(|f| *f == key)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RevenueBreakdown {
    pub total: Decimal,
    pub export: Decimal,
    pub domestic: Decimal,
    pub by_category: BTreeMap<String, Decimal>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CogsBreakdown {
    /// Purchases less the increase in raw material inventory.
    pub raw_materials: Decimal,
    pub direct_labor: Decimal,
    pub manufacturing_overhead: Decimal,
    /// Negated sum of the WIP and finished goods inventory changes.
    pub inventory_adjustment: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CostOfGoodsSold {
    pub total: Decimal,
    pub total_manufacturing_cost: Decimal,
    pub breakdown: CogsBreakdown,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SgaBreakdown {
    pub sg_expenses: Decimal,
    pub indirect_labor: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SellingAdminExpenses {
    pub total: Decimal,
    pub breakdown: SgaBreakdown,
}

/// Percentages of revenue, two decimal places; all zero when revenue is not positive.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ratios {
    pub cost_ratio: Decimal,
    pub gross_margin: Decimal,
    pub operating_margin: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IncomeStatement {
    pub revenue: RevenueBreakdown,
    pub cost_of_goods_sold: CostOfGoodsSold,
    pub gross_profit: Decimal,
    pub selling_admin_expenses: SellingAdminExpenses,
    pub operating_profit: Decimal,
    pub ratios: Ratios,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatementSection {
    Revenue,
    CostOfGoodsSold,
    GrossProfit,
    SellingAdminExpenses,
    OperatingProfit,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub section: StatementSection,
    pub account: String,
    pub amount: Decimal,
}

impl LineItem {
    fn new(section: StatementSection, account: &str, amount: Decimal) -> Self {
        Self {
            section,
            account: account.to_string(),
            amount,
        }
    }
}

/// Period amounts feeding the statement; absent datasets contribute zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CostComponents {
    pub purchases: Decimal,
    pub raw_material_change: Decimal,
    pub direct_labor: Decimal,
    pub manufacturing_overhead: Decimal,
    pub wip_change: Decimal,
    pub finished_goods_change: Decimal,
    pub sg_expenses: Decimal,
    pub indirect_labor: Decimal,
}

impl IncomeStatement {
    /// Derives every total and ratio from revenue and the cost components.
    ///
    /// Fails with [`ReconcileError::ArithmeticOverflow`] when a total leaves `Decimal`'s range.
    pub fn derive(revenue: RevenueBreakdown, costs: &CostComponents) -> Result<Self> {
        let CostComponents {
            purchases,
            raw_material_change,
            direct_labor,
            manufacturing_overhead,
            wip_change,
            finished_goods_change,
            sg_expenses,
            indirect_labor,
        } = *costs;

        let raw_materials = checked_sub(purchases, raw_material_change, "raw_materials")?;
        let total_manufacturing_cost = [direct_labor, manufacturing_overhead]
            .into_iter()
            .try_fold(raw_materials, |acc, v| checked_add(acc, v, "total_manufacturing_cost"))
            .and_then(|sum| checked_sub(sum, wip_change, "total_manufacturing_cost"))?;
        let cogs = checked_sub(
            total_manufacturing_cost,
            finished_goods_change,
            "cost_of_goods_sold",
        )?;
        let gross_profit = checked_sub(revenue.total, cogs, "gross_profit")?;
        let sga_total = checked_add(sg_expenses, indirect_labor, "sg_a_total")?;
        let operating_profit = checked_sub(gross_profit, sga_total, "operating_profit")?;
        let inventory_adjustment =
            -checked_add(wip_change, finished_goods_change, "inventory_adjustment")?;

        let ratios = Ratios {
            cost_ratio: percent_of(cogs, revenue.total, "cost_ratio")?,
            gross_margin: percent_of(gross_profit, revenue.total, "gross_margin")?,
            operating_margin: percent_of(operating_profit, revenue.total, "operating_margin")?,
        };

        Ok(Self {
            revenue,
            cost_of_goods_sold: CostOfGoodsSold {
                total: cogs,
                total_manufacturing_cost,
                breakdown: CogsBreakdown {
                    raw_materials,
                    direct_labor,
                    manufacturing_overhead,
                    inventory_adjustment,
                },
            },
            gross_profit,
            selling_admin_expenses: SellingAdminExpenses {
                total: sga_total,
                breakdown: SgaBreakdown {
                    sg_expenses,
                    indirect_labor,
                },
            },
            operating_profit,
            ratios,
        })
    }

    pub fn line_items(&self) -> Vec<LineItem> {
        use StatementSection as S;
        let cogs = &self.cost_of_goods_sold.breakdown;
        let sga = &self.selling_admin_expenses.breakdown;
        let mut items = vec![
            LineItem::new(S::Revenue, "export", self.revenue.export),
            LineItem::new(S::Revenue, "domestic", self.revenue.domestic),
            LineItem::new(S::Revenue, "total", self.revenue.total),
        ];
        items.extend(
            self.revenue
                .by_category
                .iter()
                .map(|(category, amount)| LineItem::new(S::Revenue, category, *amount)),
        );
        items.extend([
            LineItem::new(S::CostOfGoodsSold, "raw_materials", cogs.raw_materials),
            LineItem::new(S::CostOfGoodsSold, "direct_labor", cogs.direct_labor),
            LineItem::new(
                S::CostOfGoodsSold,
                "manufacturing_overhead",
                cogs.manufacturing_overhead,
            ),
            LineItem::new(S::CostOfGoodsSold, "inventory_adjustment", cogs.inventory_adjustment),
            LineItem::new(S::CostOfGoodsSold, "total", self.cost_of_goods_sold.total),
            LineItem::new(S::GrossProfit, "gross_profit", self.gross_profit),
            LineItem::new(S::SellingAdminExpenses, "sg_expenses", sga.sg_expenses),
            LineItem::new(S::SellingAdminExpenses, "indirect_labor", sga.indirect_labor),
            LineItem::new(S::SellingAdminExpenses, "total", self.selling_admin_expenses.total),
            LineItem::new(S::OperatingProfit, "operating_profit", self.operating_profit),
        ]);
        items
    }

    pub fn verify_identity(&self) -> Result<()> {
        let cogs = &self.cost_of_goods_sold;
        let b = &cogs.breakdown;
        let sga = &self.selling_admin_expenses;
        // Each identity as (total, signed parts); the total must equal the sum of the parts.
        let checks = [
            (
                "cost_of_goods_sold = raw_materials + direct_labor + manufacturing_overhead \
                 + inventory_adjustment",
                cogs.total,
                vec![
                    b.raw_materials,
                    b.direct_labor,
                    b.manufacturing_overhead,
                    b.inventory_adjustment,
                ],
            ),
            (
                "gross_profit = revenue - cost_of_goods_sold",
                self.gross_profit,
                vec![self.revenue.total, -cogs.total],
            ),
            (
                "sg_a_total = sg_expenses + indirect_labor",
                sga.total,
                vec![sga.breakdown.sg_expenses, sga.breakdown.indirect_labor],
            ),
            (
                "operating_profit = gross_profit - sg_a_total",
                self.operating_profit,
                vec![self.gross_profit, -sga.total],
            ),
        ];
        for (identity, total, parts) in checks {
            let difference = parts
                .into_iter()
                .try_fold(total, |acc, part| checked_sub(acc, part, identity))?;
            if !difference.is_zero() {
                return Err(ReconcileError::IdentityViolation {
                    identity: identity.to_string(),
                    difference: difference.to_string(),
                });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerRevenue {
    pub customer: String,
    pub amount: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SalesSummary {
    pub total: Decimal,
    pub export: Decimal,
    pub domestic: Decimal,
    pub by_category: BTreeMap<String, Decimal>,
    pub top_customers: Vec<CustomerRevenue>,
    pub daily_trend: BTreeMap<NaiveDate, Decimal>,
    pub transaction_count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PurchaseSummary {
    pub total: Decimal,
    pub by_category: BTreeMap<String, Decimal>,
    pub by_supplier: BTreeMap<String, Decimal>,
    pub transaction_count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PayrollSummary {
    pub total: Decimal,
    pub direct_labor: Decimal,
    pub indirect_labor: Decimal,
    pub by_department: BTreeMap<String, Decimal>,
    pub employee_count: usize,
}

/// Manufacturing overhead and SG&A ledgers share this shape.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LedgerSummary {
    pub total: Decimal,
    pub by_account: BTreeMap<String, Decimal>,
    pub transaction_count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InventoryMovement {
    pub beginning: Decimal,
    pub ending: Decimal,
    pub change: Decimal,
}

impl InventoryMovement {
    fn new(beginning: Decimal, ending: Decimal, context: &str) -> Result<Self> {
        Ok(Self {
            beginning,
            ending,
            change: checked_sub(ending, beginning, context)?,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryBalances {
    pub beginning: Decimal,
    pub receipts: Decimal,
    pub issues: Decimal,
    pub ending: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InventorySummary {
    pub by_category: BTreeMap<String, CategoryBalances>,
    pub raw_material: InventoryMovement,
    pub work_in_progress: InventoryMovement,
    pub finished_goods: InventoryMovement,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatementDetails {
    pub sales: Option<SalesSummary>,
    pub purchases: Option<PurchaseSummary>,
    pub payroll: Option<PayrollSummary>,
    pub manufacturing_overhead: Option<LedgerSummary>,
    pub inventory: Option<InventorySummary>,
    pub sg_expenses: Option<LedgerSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSource {
    pub dataset: DatasetType,
    pub rows: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatementReport {
    pub session_id: String,
    pub period: String,
    pub generated_at: DateTime<Utc>,
    pub data_sources: Vec<DataSource>,
    pub statement: IncomeStatement,
    pub details: StatementDetails,
    pub warnings: Vec<String>,
    /// Problems in stored data that forced a zero contribution, e.g. a missing amount column.
    pub errors: Vec<String>,
}

pub struct StatementSynthesizer<'a> {
    config: &'a PipelineConfig,
}

/// Warnings and errors gathered while summarizing one session.
#[derive(Default)]
struct Notes {
    warnings: Vec<String>,
    errors: Vec<String>,
}

impl Notes {
    /// Records an error and returns false when `table` lacks `field`.
    fn require(&mut self, table: &NormalizedTable, field: &str, consequence: &str) -> bool {
        if table.has_column(field) {
            return true;
        }
        self.errors.push(format!(
            "{} has no '{}' column; {}",
            table.dataset.label(),
            field,
            consequence
        ));
        false
    }

    fn absent(&mut self, dataset: DatasetType, consequence: &str) {
        self.warnings
            .push(format!("{} not loaded; {}", dataset.label(), consequence));
    }
}

impl<'a> StatementSynthesizer<'a> {
    pub fn new(config: &'a PipelineConfig) -> Self {
        Self { config }
    }

    pub fn synthesize(&self, snapshot: &SessionSnapshot) -> Result<StatementReport> {
        let Some(sales_table) = snapshot.table(DatasetType::Sales) else {
            return Err(ReconcileError::MissingMinimumData {
                missing: vec![DatasetType::Sales],
            });
        };

        let mut notes = Notes::default();
        let sales = self.summarize_sales(sales_table, &mut notes)?;

        let purchases = snapshot
            .table(DatasetType::Purchases)
            .map(|t| summarize_purchases(t, &mut notes))
            .transpose()?;
        if purchases.is_none() {
            notes.absent(DatasetType::Purchases, "raw material cost counted as zero");
        }

        let payroll = snapshot
            .table(DatasetType::Payroll)
            .map(|t| summarize_payroll(t, &mut notes))
            .transpose()?;
        if payroll.is_none() {
            notes.absent(DatasetType::Payroll, "direct and indirect labor counted as zero");
        }

        let overhead = snapshot
            .table(DatasetType::ManufacturingOverhead)
            .map(|t| summarize_ledger(t, &mut notes))
            .transpose()?;
        if overhead.is_none() {
            notes.absent(
                DatasetType::ManufacturingOverhead,
                "manufacturing overhead counted as zero",
            );
        }

        let inventory = snapshot
            .table(DatasetType::Inventory)
            .map(|t| summarize_inventory(t, &mut notes))
            .transpose()?;
        if inventory.is_none() {
            notes.absent(DatasetType::Inventory, "inventory changes not reflected");
        }

        let sg_expenses = snapshot
            .table(DatasetType::SgExpenses)
            .map(|t| summarize_ledger(t, &mut notes))
            .transpose()?;
        if sg_expenses.is_none() {
            notes.absent(DatasetType::SgExpenses, "SG&A expenses counted as zero");
        }

        let period = match sales_period(sales_table) {
            Some(period) => period,
            None => {
                notes.warnings.push(
                    "Sales ledger has no valid voucher dates; period set to the current month"
                        .to_string(),
                );
                Utc::now().format("%Y-%m").to_string()
            }
        };

        let inv = inventory.clone().unwrap_or_default();
        let pay = payroll.clone().unwrap_or_default();
        let costs = CostComponents {
            purchases: purchases.as_ref().map(|p| p.total).unwrap_or_default(),
            raw_material_change: inv.raw_material.change,
            direct_labor: pay.direct_labor,
            manufacturing_overhead: overhead.as_ref().map(|o| o.total).unwrap_or_default(),
            wip_change: inv.work_in_progress.change,
            finished_goods_change: inv.finished_goods.change,
            sg_expenses: sg_expenses.as_ref().map(|s| s.total).unwrap_or_default(),
            indirect_labor: pay.indirect_labor,
        };
        let statement = IncomeStatement::derive(
            RevenueBreakdown {
                total: sales.total,
                export: sales.export,
                domestic: sales.domestic,
                by_category: sales.by_category.clone(),
            },
            &costs,
        )?;
        statement.verify_identity()?;

        let data_sources = snapshot
            .loaded_types()
            .filter_map(|dataset| {
                snapshot.table(dataset).map(|t| DataSource {
                    dataset,
                    rows: t.row_count(),
                })
            })
            .collect();

        info!(
            "Session {}: statement for {} (revenue {}, operating profit {}, {} warning(s))",
            snapshot.session_id,
            period,
            statement.revenue.total,
            statement.operating_profit,
            notes.warnings.len()
        );

        Ok(StatementReport {
            session_id: snapshot.session_id.clone(),
            period,
            generated_at: Utc::now(),
            data_sources,
            statement,
            details: StatementDetails {
                sales: Some(sales),
                purchases,
                payroll,
                manufacturing_overhead: overhead,
                inventory,
                sg_expenses,
            },
            warnings: notes.warnings,
            errors: notes.errors,
        })
    }

    fn summarize_sales(&self, table: &NormalizedTable, notes: &mut Notes) -> Result<SalesSummary> {
        let mut summary = SalesSummary {
            transaction_count: table.row_count(),
            ..SalesSummary::default()
        };
        if !notes.require(table, AMOUNT_KRW, "revenue counted as zero") {
            return Ok(summary);
        }
        summary.total = table.sum(AMOUNT_KRW)?;
        let context = table.context(AMOUNT_KRW);

        if table.has_column(EXPORT_TYPE) {
            let mut unrecognized = BTreeSet::new();
            for row in 0..table.row_count() {
                let amount = table.value(row, AMOUNT_KRW).as_decimal().unwrap_or_default();
                let flag = table.value(row, EXPORT_TYPE).to_string();
                if flag_in(&flag, EXPORT_FLAGS) {
                    accumulate(&mut summary.export, amount, &context)?;
                } else if flag_in(&flag, DOMESTIC_FLAGS) {
                    accumulate(&mut summary.domestic, amount, &context)?;
                } else {
                    unrecognized.insert(flag);
                }
            }
            if !unrecognized.is_empty() {
                notes.warnings.push(format!(
                    "Unrecognized export/domestic flags counted in neither split: {}",
                    display_flags(&unrecognized)
                ));
            }
        } else {
            summary.domestic = summary.total;
        }

        if table.has_column(PRODUCT_CATEGORY) {
            summary.by_category = table.group_sum(PRODUCT_CATEGORY, AMOUNT_KRW)?;
        }

        let mut customers: Vec<CustomerRevenue> = table
            .group_sum(CUSTOMER_NAME, AMOUNT_KRW)?
            .into_iter()
            .map(|(customer, amount)| CustomerRevenue { customer, amount })
            .collect();
        customers.sort_by(|a, b| {
            b.amount
                .cmp(&a.amount)
                .then_with(|| a.customer.cmp(&b.customer))
        });
        customers.truncate(self.config.top_customers);
        summary.top_customers = customers;

        for row in 0..table.row_count() {
            if let Value::Date(date) = table.value(row, VOUCHER_DATE) {
                let amount = table.value(row, AMOUNT_KRW).as_decimal().unwrap_or_default();
                let day = summary.daily_trend.entry(*date).or_insert(Decimal::ZERO);
                accumulate(day, amount, &context)?;
            }
        }

        Ok(summary)
    }
}

fn display_flags(flags: &BTreeSet<String>) -> String {
    flags
        .iter()
        .map(|f| if f.is_empty() { "(blank)" } else { f.as_str() })
        .collect::<Vec<_>>()
        .join(", ")
}

fn sales_period(table: &NormalizedTable) -> Option<String> {
    let mut dates = table.column(VOUCHER_DATE).filter_map(Value::as_date);
    let first = dates.next()?;
    let (min, max) = dates.fold((first, first), |(lo, hi), d| (lo.min(d), hi.max(d)));
    Some(period_label(min, max))
}

fn summarize_purchases(table: &NormalizedTable, notes: &mut Notes) -> Result<PurchaseSummary> {
    let mut summary = PurchaseSummary {
        transaction_count: table.row_count(),
        ..PurchaseSummary::default()
    };
    if !notes.require(table, SUPPLY_AMOUNT, "raw material cost counted as zero") {
        return Ok(summary);
    }
    summary.total = table.sum(SUPPLY_AMOUNT)?;
    if table.has_column(MATERIAL_CATEGORY) {
        summary.by_category = table.group_sum(MATERIAL_CATEGORY, SUPPLY_AMOUNT)?;
    }
    summary.by_supplier = table.group_sum(SUPPLIER_NAME, SUPPLY_AMOUNT)?;
    Ok(summary)
}

fn summarize_payroll(table: &NormalizedTable, notes: &mut Notes) -> Result<PayrollSummary> {
    let mut summary = PayrollSummary {
        employee_count: table.row_count(),
        ..PayrollSummary::default()
    };
    if !notes.require(table, GROSS_PAY, "labor cost counted as zero") {
        return Ok(summary);
    }
    summary.total = table.sum(GROSS_PAY)?;
    summary.by_department = table.group_sum(DEPARTMENT, GROSS_PAY)?;

    if !notes.require(table, COST_TYPE, "all labor treated as indirect") {
        summary.indirect_labor = summary.total;
        return Ok(summary);
    }

    let context = table.context(GROSS_PAY);
    let mut unknown = BTreeSet::new();
    for row in 0..table.row_count() {
        let amount = table.value(row, GROSS_PAY).as_decimal().unwrap_or_default();
        let flag = table.value(row, COST_TYPE).to_string();
        if flag_in(&flag, DIRECT_LABOR_FLAGS) {
            accumulate(&mut summary.direct_labor, amount, &context)?;
        } else {
            if !flag_in(&flag, INDIRECT_LABOR_FLAGS) {
                unknown.insert(flag);
            }
            accumulate(&mut summary.indirect_labor, amount, &context)?;
        }
    }
    for flag in &unknown {
        debug!("Unknown payroll cost type '{}' treated as indirect", flag);
        notes.warnings.push(format!(
            "Unknown payroll cost type '{}' treated as indirect labor",
            if flag.is_empty() { "(blank)" } else { flag.as_str() }
        ));
    }
    Ok(summary)
}

fn summarize_ledger(table: &NormalizedTable, notes: &mut Notes) -> Result<LedgerSummary> {
    let mut summary = LedgerSummary {
        transaction_count: table.row_count(),
        ..LedgerSummary::default()
    };
    if !notes.require(table, DEBIT_AMOUNT, "ledger total counted as zero") {
        return Ok(summary);
    }
    summary.total = table.sum(DEBIT_AMOUNT)?;
    summary.by_account = table.group_sum(ACCOUNT, DEBIT_AMOUNT)?;
    Ok(summary)
}

/// Running beginning and ending balances of one inventory bucket.
#[derive(Default)]
struct Bucket {
    beginning: Decimal,
    ending: Decimal,
}

fn summarize_inventory(table: &NormalizedTable, notes: &mut Notes) -> Result<InventorySummary> {
    let mut summary = InventorySummary::default();
    let usable = notes.require(table, INVENTORY_CATEGORY, "inventory changes not reflected")
        & notes.require(table, BEGINNING_AMOUNT, "inventory changes not reflected")
        & notes.require(table, ENDING_AMOUNT, "inventory changes not reflected");
    if !usable {
        return Ok(summary);
    }

    let amount =
        |row: usize, field: &str| table.value(row, field).as_decimal().unwrap_or_default();
    let context = |field: &str| table.context(field);
    let mut unclassified = BTreeSet::new();
    let (mut rm, mut wip, mut fg) = (Bucket::default(), Bucket::default(), Bucket::default());

    for row in 0..table.row_count() {
        let category = match table.value(row, INVENTORY_CATEGORY) {
            Value::Missing => UNASSIGNED.to_string(),
            other => other.to_string(),
        };
        let beginning = amount(row, BEGINNING_AMOUNT);
        let ending = amount(row, ENDING_AMOUNT);

        let balances = summary.by_category.entry(category.clone()).or_default();
        accumulate(&mut balances.beginning, beginning, &context(BEGINNING_AMOUNT))?;
        accumulate(&mut balances.ending, ending, &context(ENDING_AMOUNT))?;
        accumulate(
            &mut balances.receipts,
            amount(row, RECEIPT_AMOUNT),
            &context(RECEIPT_AMOUNT),
        )?;
        accumulate(&mut balances.issues, amount(row, ISSUE_AMOUNT), &context(ISSUE_AMOUNT))?;

        let bucket = if flag_in(&category, RAW_MATERIAL_FLAGS) {
            &mut rm
        } else if flag_in(&category, WIP_FLAGS) {
            &mut wip
        } else if flag_in(&category, FINISHED_GOODS_FLAGS) {
            &mut fg
        } else {
            unclassified.insert(category);
            continue;
        };
        accumulate(&mut bucket.beginning, beginning, &context(BEGINNING_AMOUNT))?;
        accumulate(&mut bucket.ending, ending, &context(ENDING_AMOUNT))?;
    }

    if !unclassified.is_empty() {
        notes.warnings.push(format!(
            "Inventory categories outside raw material, WIP and finished goods \
             were not used in cost of goods sold: {}",
            unclassified.into_iter().collect::<Vec<_>>().join(", ")
        ));
    }

    let movement = |bucket: Bucket| {
        InventoryMovement::new(bucket.beginning, bucket.ending, &context(ENDING_AMOUNT))
    };
    summary.raw_material = movement(rm)?;
    summary.work_in_progress = movement(wip)?;
    summary.finished_goods = movement(fg)?;
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn revenue(total: &str) -> RevenueBreakdown {
        RevenueBreakdown {
            total: dec(total),
            domestic: dec(total),
            ..RevenueBreakdown::default()
        }
    }

    fn worked_example() -> IncomeStatement {
        let costs = CostComponents {
            purchases: dec("400000"),
            raw_material_change: dec("20000"),
            direct_labor: dec("150000"),
            manufacturing_overhead: dec("100000"),
            sg_expenses: dec("80000"),
            indirect_labor: dec("50000"),
            ..CostComponents::default()
        };
        IncomeStatement::derive(revenue("1000000"), &costs).unwrap()
    }

    #[test]
    fn test_worked_example() {
        let statement = worked_example();
        assert_eq!(statement.cost_of_goods_sold.breakdown.raw_materials, dec("380000"));
        assert_eq!(statement.cost_of_goods_sold.total, dec("630000"));
        assert_eq!(statement.gross_profit, dec("370000"));
        assert_eq!(statement.selling_admin_expenses.total, dec("130000"));
        assert_eq!(statement.operating_profit, dec("240000"));
        assert_eq!(statement.ratios.cost_ratio, dec("63"));
        assert_eq!(statement.ratios.gross_margin, dec("37"));
        assert_eq!(statement.ratios.operating_margin, dec("24"));
        statement.verify_identity().unwrap();
    }

    #[test]
    fn test_inventory_adjustment_sign() {
        let costs = CostComponents {
            purchases: dec("100"),
            wip_change: dec("30"),
            finished_goods_change: dec("20"),
            ..CostComponents::default()
        };
        let statement = IncomeStatement::derive(revenue("500"), &costs).unwrap();
        assert_eq!(statement.cost_of_goods_sold.breakdown.inventory_adjustment, dec("-50"));
        assert_eq!(statement.cost_of_goods_sold.total, dec("50"));
        assert_eq!(statement.cost_of_goods_sold.total_manufacturing_cost, dec("70"));
    }

    #[test]
    fn test_zero_revenue_ratios() {
        let costs = CostComponents {
            purchases: dec("10"),
            ..CostComponents::default()
        };
        let statement = IncomeStatement::derive(revenue("0"), &costs).unwrap();
        assert_eq!(statement.ratios, Ratios::default());
        assert_eq!(statement.gross_profit, dec("-10"));
    }

    #[test]
    fn test_derive_overflow_is_an_error() {
        let costs = CostComponents {
            purchases: Decimal::MAX,
            direct_labor: Decimal::MAX,
            ..CostComponents::default()
        };
        match IncomeStatement::derive(revenue("1"), &costs) {
            Err(ReconcileError::ArithmeticOverflow(context)) => {
                assert_eq!(context, "total_manufacturing_cost");
            }
            other => panic!("expected overflow, got {:?}", other),
        }
    }

    #[test]
    fn test_verify_identity_detects_tampering() {
        let mut statement = worked_example();
        statement.gross_profit += Decimal::ONE;
        match statement.verify_identity() {
            Err(ReconcileError::IdentityViolation { identity, difference }) => {
                assert!(identity.starts_with("gross_profit"));
                assert_eq!(difference, "1");
            }
            other => panic!("expected identity violation, got {:?}", other),
        }
    }

    #[test]
    fn test_line_items() {
        let mut statement = worked_example();
        statement.revenue.by_category =
            BTreeMap::from([("Industrial".to_string(), dec("1000000"))]);
        let items = statement.line_items();
        assert_eq!(items.len(), 14);
        assert_eq!(items[3].account, "Industrial");
        let operating = items.last().unwrap();
        assert_eq!(operating.section, StatementSection::OperatingProfit);
        assert_eq!(operating.amount, dec("240000"));
    }

    #[test]
    fn test_flags_are_case_and_space_insensitive() {
        assert!(flag_in(" Direct Labor ", DIRECT_LABOR_FLAGS));
        assert!(flag_in("직접노무비", DIRECT_LABOR_FLAGS));
        assert!(flag_in("Work In Progress", WIP_FLAGS));
        assert!(flag_in("EXPORT", EXPORT_FLAGS));
        assert!(!flag_in("contract", INDIRECT_LABOR_FLAGS));
    }
}
