use crate::error::{ReconcileError, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

/// Canonical field names shared across dataset types.
pub mod fields {
    pub const VOUCHER_DATE: &str = "voucher_date";
    pub const VOUCHER_NO: &str = "voucher_no";
    pub const CUSTOMER_CODE: &str = "customer_code";
    pub const CUSTOMER_NAME: &str = "customer_name";
    pub const PRODUCT_CODE: &str = "product_code";
    pub const PRODUCT_NAME: &str = "product_name";
    pub const PRODUCT_CATEGORY: &str = "product_category";
    pub const QUANTITY: &str = "quantity";
    pub const UNIT: &str = "unit";
    pub const UNIT_PRICE: &str = "unit_price";
    pub const SUPPLY_AMOUNT: &str = "supply_amount";
    pub const VAT: &str = "vat";
    pub const TOTAL_AMOUNT: &str = "total_amount";
    pub const CURRENCY: &str = "currency";
    pub const EXCHANGE_RATE: &str = "exchange_rate";
    pub const AMOUNT_KRW: &str = "amount_krw";
    pub const EXPORT_TYPE: &str = "export_type";
    pub const SUPPLIER_CODE: &str = "supplier_code";
    pub const SUPPLIER_NAME: &str = "supplier_name";
    pub const MATERIAL_CODE: &str = "material_code";
    pub const MATERIAL_NAME: &str = "material_name";
    pub const MATERIAL_CATEGORY: &str = "material_category";
    pub const EMPLOYEE_NO: &str = "employee_no";
    pub const EMPLOYEE_NAME: &str = "employee_name";
    pub const DEPARTMENT: &str = "department";
    pub const POSITION: &str = "position";
    pub const BASE_SALARY: &str = "base_salary";
    pub const ALLOWANCE: &str = "allowance";
    pub const DEDUCTION: &str = "deduction";
    pub const GROSS_PAY: &str = "gross_pay";
    pub const NET_PAY: &str = "net_pay";
    pub const COST_TYPE: &str = "cost_type";
    pub const ACCOUNT: &str = "account";
    pub const ACCOUNT_GROUP: &str = "account_group";
    pub const MEMO: &str = "memo";
    pub const DEBIT_AMOUNT: &str = "debit_amount";
    pub const CREDIT_AMOUNT: &str = "credit_amount";
    pub const COUNTERPARTY: &str = "counterparty";
    pub const PERIOD: &str = "period";
    pub const ITEM_CODE: &str = "item_code";
    pub const ITEM_NAME: &str = "item_name";
    pub const INVENTORY_CATEGORY: &str = "inventory_category";
    pub const BEGINNING_QTY: &str = "beginning_qty";
    pub const RECEIPT_QTY: &str = "receipt_qty";
    pub const ISSUE_QTY: &str = "issue_qty";
    pub const ENDING_QTY: &str = "ending_qty";
    pub const AVERAGE_COST: &str = "average_cost";
    pub const BEGINNING_AMOUNT: &str = "beginning_amount";
    pub const RECEIPT_AMOUNT: &str = "receipt_amount";
    pub const ISSUE_AMOUNT: &str = "issue_amount";
    pub const ENDING_AMOUNT: &str = "ending_amount";
    pub const WAREHOUSE: &str = "warehouse";
}

use fields::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatasetType {
    Sales,
    Purchases,
    Payroll,
    ManufacturingOverhead,
    Inventory,
    SgExpenses,
}

impl DatasetType {
    pub const ALL: [DatasetType; 6] = [
        DatasetType::Sales,
        DatasetType::Purchases,
        DatasetType::Payroll,
        DatasetType::ManufacturingOverhead,
        DatasetType::Inventory,
        DatasetType::SgExpenses,
    ];

    /// Datasets without which no basic statement can be produced.
    pub const MINIMUM: [DatasetType; 2] = [DatasetType::Sales, DatasetType::Purchases];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sales => "sales",
            Self::Purchases => "purchases",
            Self::Payroll => "payroll",
            Self::ManufacturingOverhead => "manufacturing_overhead",
            Self::Inventory => "inventory",
            Self::SgExpenses => "sg_expenses",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Sales => "Sales ledger",
            Self::Purchases => "Purchase ledger",
            Self::Payroll => "Payroll register",
            Self::ManufacturingOverhead => "Manufacturing overhead ledger",
            Self::Inventory => "Inventory roll-forward",
            Self::SgExpenses => "Selling, general & administrative ledger",
        }
    }
}

impl fmt::Display for DatasetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DatasetType {
    type Err = ReconcileError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "sales" => Ok(Self::Sales),
            "purchases" => Ok(Self::Purchases),
            "payroll" => Ok(Self::Payroll),
            "manufacturing_overhead" | "mfg_expenses" => Ok(Self::ManufacturingOverhead),
            "inventory" => Ok(Self::Inventory),
            "sg_expenses" => Ok(Self::SgExpenses),
            other => Err(ReconcileError::UnknownDatasetType(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    Category,
    Date,
    Number,
}

/// Value checks applied by the anomaly detector to a numeric field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationRule {
    #[serde(default)]
    pub max: Option<Decimal>,
    #[serde(default)]
    pub non_negative: bool,
    /// Zero is legal but unusual, e.g. a unit price or line amount.
    #[serde(default)]
    pub zero_suspicious: bool,
}

impl ValidationRule {
    pub fn non_negative(max: i64) -> Self {
        Self {
            max: Some(Decimal::from(max)),
            non_negative: true,
            zero_suspicious: false,
        }
    }

    pub fn monetary(max: i64) -> Self {
        Self {
            zero_suspicious: true,
            ..Self::non_negative(max)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalField {
    pub name: String,
    pub kind: FieldKind,
    #[serde(default)]
    pub required: bool,
    /// Declared alternate names, matched by the exact and normalized tiers.
    #[serde(default)]
    pub variants: Vec<String>,
    /// Curated dictionary used by the synonym tier.
    #[serde(default)]
    pub synonyms: Vec<String>,
    #[serde(default)]
    pub validation: Option<ValidationRule>,
    #[serde(default)]
    pub description: String,
}

impl CanonicalField {
    fn new(name: &str, kind: FieldKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            required: false,
            variants: Vec::new(),
            synonyms: Vec::new(),
            validation: None,
            description: String::new(),
        }
    }

    fn required(mut self) -> Self {
        self.required = true;
        self
    }

    fn variants(mut self, names: &[&str]) -> Self {
        self.variants = names.iter().map(|n| n.to_string()).collect();
        self
    }

    fn synonyms(mut self, names: &[&str]) -> Self {
        self.synonyms = names.iter().map(|n| n.to_string()).collect();
        self
    }

    fn validate(mut self, rule: ValidationRule) -> Self {
        self.validation = Some(rule);
        self
    }

    fn describe(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    /// Every label this field answers to: its own name, variants, then synonyms.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.name.as_str())
            .chain(self.variants.iter().map(String::as_str))
            .chain(self.synonyms.iter().map(String::as_str))
    }
}

fn text(name: &str) -> CanonicalField {
    CanonicalField::new(name, FieldKind::Text)
}

fn category(name: &str) -> CanonicalField {
    CanonicalField::new(name, FieldKind::Category)
}

fn date(name: &str) -> CanonicalField {
    CanonicalField::new(name, FieldKind::Date)
}

fn number(name: &str) -> CanonicalField {
    CanonicalField::new(name, FieldKind::Number)
}

/// Lower-cases and strips whitespace and underscores, the comparison key of the normalized tier.
pub fn normalize_label(label: &str) -> String {
    label
        .trim()
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '_')
        .flat_map(char::to_lowercase)
        .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetSchema {
    pub dataset: DatasetType,
    pub fields: Vec<CanonicalField>,
}

impl DatasetSchema {
    pub fn field(&self, name: &str) -> Option<&CanonicalField> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn required_fields(&self) -> impl Iterator<Item = &CanonicalField> {
        self.fields.iter().filter(|f| f.required)
    }

    pub fn template(&self) -> DatasetTemplate {
        DatasetTemplate {
            dataset: self.dataset,
            label: self.dataset.label().to_string(),
            required_columns: self
                .fields
                .iter()
                .filter(|f| f.required)
                .map(|f| f.name.clone())
                .collect(),
            optional_columns: self
                .fields
                .iter()
                .filter(|f| !f.required)
                .map(|f| f.name.clone())
                .collect(),
            accepted_names: self
                .fields
                .iter()
                .map(|f| {
                    (
                        f.name.clone(),
                        f.variants.iter().chain(&f.synonyms).cloned().collect(),
                    )
                })
                .collect(),
        }
    }

    fn check_integrity(&self) -> Result<()> {
        let mut owners: HashMap<String, &str> = HashMap::new();
        for field in &self.fields {
            for label in field.labels() {
                let key = normalize_label(label);
                if key.is_empty() {
                    return Err(ReconcileError::InvalidConfig(format!(
                        "Field '{}' of dataset '{}' has a blank label",
                        field.name, self.dataset
                    )));
                }
                if let Some(owner) = owners.insert(key, &field.name) {
                    if owner != field.name {
                        return Err(ReconcileError::InvalidConfig(format!(
                            "Label '{}' of dataset '{}' is claimed by both '{}' and '{}'",
                            label, self.dataset, owner, field.name
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}

/// Column layout a caller should provide for one dataset type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetTemplate {
    pub dataset: DatasetType,
    pub label: String,
    pub required_columns: Vec<String>,
    pub optional_columns: Vec<String>,
    pub accepted_names: BTreeMap<String, Vec<String>>,
}

/// Serialized as the list of dataset schemas; deserializing runs the same checks as
/// [`SchemaRegistry::from_schemas`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "Vec<DatasetSchema>", into = "Vec<DatasetSchema>")]
pub struct SchemaRegistry {
    schemas: BTreeMap<DatasetType, DatasetSchema>,
}

impl TryFrom<Vec<DatasetSchema>> for SchemaRegistry {
    type Error = ReconcileError;

    fn try_from(schemas: Vec<DatasetSchema>) -> Result<Self> {
        Self::from_schemas(schemas)
    }
}

impl From<SchemaRegistry> for Vec<DatasetSchema> {
    fn from(registry: SchemaRegistry) -> Self {
        registry.schemas.into_values().collect()
    }
}

impl SchemaRegistry {
    /// The built-in registry, constructed once per process.
    pub fn standard() -> &'static SchemaRegistry {
        static STANDARD: OnceLock<SchemaRegistry> = OnceLock::new();
        STANDARD.get_or_init(Self::builtin)
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let schemas: Vec<DatasetSchema> = serde_json::from_str(json)?;
        Self::from_schemas(schemas)
    }

    pub fn from_schemas(schemas: Vec<DatasetSchema>) -> Result<Self> {
        let mut map = BTreeMap::new();
        for schema in schemas {
            schema.check_integrity()?;
            let dataset = schema.dataset;
            if map.insert(dataset, schema).is_some() {
                return Err(ReconcileError::InvalidConfig(format!(
                    "Dataset '{}' is declared twice",
                    dataset
                )));
            }
        }
        for dataset in DatasetType::ALL {
            if !map.contains_key(&dataset) {
                return Err(ReconcileError::InvalidConfig(format!(
                    "Dataset '{}' has no schema",
                    dataset
                )));
            }
        }
        Ok(Self { schemas: map })
    }

    pub fn schema(&self, dataset: DatasetType) -> &DatasetSchema {
        // from_schemas guarantees every dataset type is present
        &self.schemas[&dataset]
    }

    pub fn template(&self, dataset: DatasetType) -> DatasetTemplate {
        self.schema(dataset).template()
    }

    pub fn to_json(&self) -> Result<String> {
        let schemas: Vec<&DatasetSchema> = self.schemas.values().collect();
        Ok(serde_json::to_string_pretty(&schemas)?)
    }

    fn builtin() -> Self {
        let schemas = DatasetType::ALL
            .iter()
            .map(|&dataset| DatasetSchema {
                dataset,
                fields: builtin_fields(dataset),
            })
            .map(|schema| (schema.dataset, schema))
            .collect();
        Self { schemas }
    }
}

fn builtin_fields(dataset: DatasetType) -> Vec<CanonicalField> {
    match dataset {
        DatasetType::Sales => sales_fields(),
        DatasetType::Purchases => purchase_fields(),
        DatasetType::Payroll => payroll_fields(),
        DatasetType::ManufacturingOverhead | DatasetType::SgExpenses => expense_ledger_fields(),
        DatasetType::Inventory => inventory_fields(),
    }
}

fn sales_fields() -> Vec<CanonicalField> {
    vec![
        date(VOUCHER_DATE)
            .required()
            .variants(&["전표일자", "Date", "Voucher Date"])
            .synonyms(&[
                "일자", "날짜", "거래일", "거래일자", "Transaction Date", "BUDAT", "전표날짜",
                "매출일자", "매출일", "판매일", "작성일", "Posting Date",
            ])
            .describe("Posting date of the sales voucher"),
        text(VOUCHER_NO)
            .variants(&["전표번호", "Document No"])
            .synonyms(&[
                "번호", "No", "전표No", "전표No.", "BELNR", "문서번호", "매출번호", "Invoice No",
                "Voucher No",
            ])
            .describe("Voucher or invoice identifier"),
        text(CUSTOMER_CODE)
            .variants(&["거래처코드", "Customer Code"])
            .synonyms(&["고객코드", "KUNNR", "Cust Code", "거래선코드", "BP Code", "고객ID"])
            .describe("Customer identifier"),
        text(CUSTOMER_NAME)
            .required()
            .variants(&["거래처명", "Customer Name"])
            .synonyms(&[
                "고객명", "거래처", "Customer", "NAME1", "거래선명", "BP Name", "매출처", "판매처",
                "바이어", "고객회사명",
            ])
            .describe("Customer the goods were sold to"),
        text(PRODUCT_CODE)
            .variants(&["제품코드", "Product Code"])
            .synonyms(&["품목코드", "Item Code", "MATNR", "상품코드", "SKU", "Material", "품목Code"])
            .describe("Product identifier"),
        text(PRODUCT_NAME)
            .required()
            .variants(&["제품명", "Product Name"])
            .synonyms(&[
                "품목명", "품명", "Item", "Product", "MAKTX", "상품명", "Description", "품목", "제품",
                "상품설명",
            ])
            .describe("Product sold"),
        number(QUANTITY)
            .required()
            .variants(&["수량", "Quantity"])
            .synonyms(&[
                "Qty", "MENGE", "판매수량", "Sales Qty", "매출수량", "개수", "FKIMG", "판매량",
                "Q'ty",
            ])
            .validate(ValidationRule::non_negative(100_000))
            .describe("Quantity sold"),
        text(UNIT)
            .variants(&["단위", "Unit"])
            .synonyms(&["UOM", "MEINS", "수량단위"])
            .describe("Unit of measure"),
        number(UNIT_PRICE)
            .variants(&["단가", "Unit Price"])
            .synonyms(&["Price", "판매단가", "NETPR", "매출단가", "판매가(원)"])
            .validate(ValidationRule::monetary(100_000_000))
            .describe("Price per unit in transaction currency"),
        number(SUPPLY_AMOUNT)
            .variants(&["공급가액", "Net Amount"])
            .synonyms(&[
                "금액", "Amount", "NETWR", "매출액", "Sales Amount", "판매금액", "공급가",
                "매출금액", "매출총액",
            ])
            .validate(ValidationRule::monetary(10_000_000_000))
            .describe("Net line amount in transaction currency"),
        number(VAT)
            .variants(&["부가세", "VAT"])
            .synonyms(&["Tax", "세금", "MWSBP", "부가가치세"])
            .describe("Value-added tax"),
        number(TOTAL_AMOUNT)
            .variants(&["합계금액", "Total Amount"])
            .synonyms(&["합계", "Total", "총액", "총금액", "Grand Total", "받을금액"])
            .describe("Gross line amount including tax"),
        text(CURRENCY)
            .variants(&["통화", "Currency"])
            .synonyms(&["WAERK", "화폐", "Curr"])
            .describe("Transaction currency code"),
        number(EXCHANGE_RATE)
            .variants(&["환율", "Exchange Rate"])
            .synonyms(&["Rate", "KURRF", "FX Rate", "환율적용", "적용환율", "달러환율"])
            .describe("Exchange rate to local currency"),
        number(AMOUNT_KRW)
            .required()
            .variants(&["원화환산액", "Local Amount"])
            .synonyms(&[
                "원화금액", "KRW Amount", "원화", "환산금액", "원화매출", "DMBTR",
                "Local Currency Amount", "원화정산액",
            ])
            .validate(ValidationRule::monetary(10_000_000_000))
            .describe("Line amount converted to local currency; the revenue basis"),
        category(EXPORT_TYPE)
            .variants(&["수출/내수", "Export/Domestic"])
            .synonyms(&[
                "내수/수출", "수출내수", "내수수출", "수출구분", "구분", "거래구분", "Type",
                "매출구분", "거래형태",
            ])
            .describe("Export or domestic sale flag"),
        category(PRODUCT_CATEGORY)
            .variants(&["제품구분", "Product Category"])
            .synonyms(&[
                "품목구분", "제품분류", "Category", "Product Type", "분류", "제품군", "제품카테고리",
                "용도구분", "용도", "품목분류", "제품TYPE",
            ])
            .describe("Product line or usage category"),
    ]
}

fn purchase_fields() -> Vec<CanonicalField> {
    vec![
        date(VOUCHER_DATE)
            .required()
            .variants(&["전표일자", "Date"])
            .synonyms(&[
                "일자", "날짜", "매입일자", "입고일자", "PO Date", "Receipt Date", "BUDAT", "작성일",
                "Posting Date",
            ])
            .describe("Posting or receipt date of the purchase"),
        text(VOUCHER_NO)
            .variants(&["전표번호", "PO No"])
            .synonyms(&["매입번호", "Receipt No", "BELNR", "전표No", "전표No."])
            .describe("Purchase voucher identifier"),
        text(SUPPLIER_CODE)
            .variants(&["공급업체코드", "Vendor Code"])
            .synonyms(&["업체코드", "LIFNR", "Supplier Code", "거래처코드"])
            .describe("Supplier identifier"),
        text(SUPPLIER_NAME)
            .required()
            .variants(&["공급업체명", "Supplier Name"])
            .synonyms(&[
                "업체명", "공급업체", "Vendor", "Vendor Name", "Supplier", "NAME1", "거래처명",
                "공급처", "매입처",
            ])
            .describe("Supplier the material was bought from"),
        text(MATERIAL_CODE)
            .variants(&["품목코드", "Material Code"])
            .synonyms(&["자재코드", "MATNR", "Item Code", "원자재코드", "Material"])
            .describe("Material identifier"),
        text(MATERIAL_NAME)
            .required()
            .variants(&["품목명", "Material Name"])
            .synonyms(&[
                "자재명", "MAKTX", "Item", "Description", "원자재명", "자재명칭", "제품명", "상품명",
                "품명",
            ])
            .describe("Material purchased"),
        category(MATERIAL_CATEGORY)
            .variants(&["품목분류", "Material Type"])
            .synonyms(&["자재분류", "Category", "분류", "Type"])
            .describe("Material category"),
        number(QUANTITY)
            .required()
            .variants(&["수량", "Quantity"])
            .synonyms(&[
                "Qty", "MENGE", "입고수량", "Receipt Qty", "매입수량", "입고QTY", "구매수량",
            ])
            .validate(ValidationRule::non_negative(100_000))
            .describe("Quantity received"),
        text(UNIT)
            .variants(&["단위", "Unit"])
            .synonyms(&["UOM", "MEINS"])
            .describe("Unit of measure"),
        number(UNIT_PRICE)
            .variants(&["단가", "Unit Price"])
            .synonyms(&["Price", "NETPR", "매입단가"])
            .validate(ValidationRule::monetary(100_000_000))
            .describe("Price per unit"),
        number(SUPPLY_AMOUNT)
            .required()
            .variants(&["공급가액", "Net Amount"])
            .synonyms(&[
                "금액", "Amount", "NETWR", "매입금액", "Purchase Amount", "매입액", "구매금액",
                "매입가액", "공급가",
            ])
            .validate(ValidationRule::monetary(10_000_000_000))
            .describe("Net purchase amount; the raw material cost basis"),
        number(VAT)
            .variants(&["부가세", "VAT"])
            .synonyms(&["Tax", "MWSBP", "세금"])
            .describe("Value-added tax"),
        number(TOTAL_AMOUNT)
            .variants(&["합계금액", "Total Amount"])
            .synonyms(&["합계", "Total", "총액", "Total Amt"])
            .describe("Gross amount including tax"),
    ]
}

fn payroll_fields() -> Vec<CanonicalField> {
    vec![
        text(EMPLOYEE_NO)
            .variants(&["사번", "Employee No"])
            .synonyms(&["직원번호", "Emp No", "PERNR", "ID"])
            .describe("Employee identifier"),
        text(EMPLOYEE_NAME)
            .variants(&["성명", "Employee Name"])
            .synonyms(&["이름", "Name", "ENAME", "직원명"])
            .describe("Employee name"),
        text(DEPARTMENT)
            .required()
            .variants(&["부서", "Department"])
            .synonyms(&["부서명", "Dept", "ORGEH", "소속", "소속부서"])
            .describe("Department the employee belongs to"),
        text(POSITION)
            .variants(&["직급", "Position"])
            .synonyms(&["직위", "Title", "PLANS", "직책"])
            .describe("Job grade or title"),
        number(BASE_SALARY)
            .required()
            .variants(&["기본급", "Base Salary"])
            .synonyms(&["Basic Pay", "BETRG", "본봉", "급여", "월급", "기본월급"])
            .validate(ValidationRule::non_negative(100_000_000))
            .describe("Base salary for the period"),
        number(ALLOWANCE)
            .variants(&["수당", "Allowance"])
            .synonyms(&["제수당", "Benefits"])
            .describe("Allowances paid on top of base salary"),
        number(DEDUCTION)
            .variants(&["공제액", "Deduction"])
            .synonyms(&["공제", "차감액", "공제총액"])
            .describe("Total deductions"),
        number(GROSS_PAY)
            .required()
            .variants(&["지급총액", "Gross Pay"])
            .synonyms(&["Total Pay", "지급액", "급여총액", "총지급액", "총급여"])
            .validate(ValidationRule::non_negative(200_000_000))
            .describe("Total pay before deductions; the labor cost basis"),
        number(NET_PAY)
            .variants(&["실지급액", "Net Pay"])
            .synonyms(&["실수령액", "차인지급액"])
            .describe("Pay after deductions"),
        category(COST_TYPE)
            .required()
            .variants(&["원가구분", "Cost Type"])
            .synonyms(&["원가분류", "노무비구분", "직접/간접", "Labor Type", "급여구분"])
            .describe("Direct or indirect labor flag"),
    ]
}

fn expense_ledger_fields() -> Vec<CanonicalField> {
    vec![
        date(VOUCHER_DATE)
            .required()
            .variants(&["전표일자", "Date"])
            .synonyms(&["일자", "날짜", "발생일자", "BUDAT", "Posting Date", "작성일"])
            .describe("Posting date of the expense voucher"),
        text(VOUCHER_NO)
            .variants(&["전표번호", "Document No"])
            .synonyms(&["번호", "BELNR", "전표No", "Voucher No"])
            .describe("Expense voucher identifier"),
        text(ACCOUNT)
            .required()
            .variants(&["계정과목", "Account"])
            .synonyms(&["계정", "비용항목", "경비항목", "Account Name", "GL Account", "계정명"])
            .describe("Expense account the amount was booked to"),
        category(ACCOUNT_GROUP)
            .variants(&["계정구분", "Account Group"])
            .synonyms(&["계정분류", "Account Type"])
            .describe("Grouping of the expense account"),
        text(MEMO)
            .variants(&["적요", "Memo"])
            .synonyms(&["Description", "비고", "내용"])
            .describe("Free-text description"),
        number(DEBIT_AMOUNT)
            .required()
            .variants(&["차변금액", "Debit"])
            .synonyms(&["금액", "지출금액", "발생금액", "비용금액", "Amount", "Debit Amount"])
            .validate(ValidationRule::monetary(10_000_000_000))
            .describe("Expense amount booked on the debit side"),
        number(CREDIT_AMOUNT)
            .variants(&["대변금액", "Credit"])
            .synonyms(&["Credit Amount"])
            .describe("Amount booked on the credit side"),
        text(DEPARTMENT)
            .variants(&["부서", "Department"])
            .synonyms(&["부서명", "Dept", "Cost Center"])
            .describe("Department that incurred the expense"),
        text(COUNTERPARTY)
            .variants(&["거래처", "Vendor"])
            .synonyms(&["거래처명", "Counterparty", "업체명"])
            .describe("Vendor or counterparty"),
    ]
}

fn inventory_fields() -> Vec<CanonicalField> {
    vec![
        text(PERIOD)
            .variants(&["기준년월", "Period"])
            .synonyms(&["년월", "기준월", "Fiscal Period"])
            .describe("Period the roll-forward refers to"),
        text(ITEM_CODE)
            .variants(&["품목코드", "Item Code"])
            .synonyms(&["자재코드", "제품코드", "MATNR"])
            .describe("Item identifier"),
        text(ITEM_NAME)
            .required()
            .variants(&["품목명", "Item Name"])
            .synonyms(&["제품명", "상품명", "품명", "자재명", "Material", "Item", "Description"])
            .describe("Item held in inventory"),
        category(INVENTORY_CATEGORY)
            .required()
            .variants(&["품목분류", "Inventory Category"])
            .synonyms(&["분류", "재고구분", "품목구분", "Category", "Inventory Type"])
            .describe("Raw material, work in progress or finished goods"),
        text(UNIT)
            .variants(&["단위", "Unit"])
            .synonyms(&["UOM", "MEINS"])
            .describe("Unit of measure"),
        number(BEGINNING_QTY)
            .variants(&["기초수량", "Opening Qty"])
            .synonyms(&["월초수량", "Beginning Qty"])
            .validate(ValidationRule::non_negative(100_000_000))
            .describe("Quantity on hand at period start"),
        number(RECEIPT_QTY)
            .variants(&["입고수량", "Receipt Qty"])
            .synonyms(&["In Qty"])
            .describe("Quantity received during the period"),
        number(ISSUE_QTY)
            .variants(&["출고수량", "Issue Qty"])
            .synonyms(&["Out Qty"])
            .describe("Quantity issued during the period"),
        number(ENDING_QTY)
            .variants(&["기말수량", "Closing Qty"])
            .synonyms(&["월말수량", "Ending Qty"])
            .validate(ValidationRule::non_negative(100_000_000))
            .describe("Quantity on hand at period end"),
        number(AVERAGE_COST)
            .variants(&["평균단가", "Average Cost"])
            .synonyms(&["단가", "Unit Cost"])
            .describe("Average cost per unit"),
        number(BEGINNING_AMOUNT)
            .required()
            .variants(&["기초금액", "Opening Amount"])
            .synonyms(&["기초재고금액", "기초재고", "Opening", "월초금액", "Beginning Amount"])
            .validate(ValidationRule::non_negative(100_000_000_000))
            .describe("Inventory value at period start"),
        number(RECEIPT_AMOUNT)
            .variants(&["입고금액", "Receipt Amount"])
            .synonyms(&["Receipts"])
            .describe("Value received during the period"),
        number(ISSUE_AMOUNT)
            .variants(&["출고금액", "Issue Amount"])
            .synonyms(&["Issues"])
            .describe("Value issued during the period"),
        number(ENDING_AMOUNT)
            .required()
            .variants(&["기말금액", "Closing Amount"])
            .synonyms(&["기말재고금액", "기말재고", "Closing", "월말금액", "Ending Amount"])
            .validate(ValidationRule::non_negative(100_000_000_000))
            .describe("Inventory value at period end"),
        text(WAREHOUSE)
            .variants(&["창고", "Warehouse"])
            .synonyms(&["보관장소", "Storage Location"])
            .describe("Storage location"),
    ]
}
