use anyhow::Result;
use chrono::{Datelike, Local, NaiveDate};
use rental_ledger::*;
use rust_decimal::Decimal;
use std::str::FromStr;

const EXPENSE_HEADERS: &str =
    "Month,Date,Purchaser,Description,Property,Category,Amount,Comments,Receipt Link";

/// Reads inline CSV into the raw value grid a spreadsheet would return.
fn csv_grid(text: &str) -> Result<Vec<Vec<String>>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::None)
        .from_reader(text.as_bytes());

    let mut grid = Vec::new();
    for record in reader.records() {
        grid.push(record?.iter().map(str::to_string).collect());
    }
    Ok(grid)
}

fn workbook(sheets: &[(&str, &str)]) -> Result<MemoryWorkbook> {
    let mut book = MemoryWorkbook::new();
    for (name, text) in sheets {
        book.insert_grid(name, csv_grid(text)?);
    }
    Ok(book)
}

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

struct FailingSource;

impl RowSource for FailingSource {
    fn fetch_values(&self, _table: &str) -> std::result::Result<Vec<Vec<String>>, CollaboratorError> {
        Err("quota exceeded".into())
    }
}

#[test]
fn test_mortgage_injection_is_idempotent() -> Result<()> {
    let config = LedgerConfig::default();
    let mut book = workbook(&[
        (
            "2025 Recurring Expenses",
            "Date,Item/Description,Amount\n2025-06-01,Mortgage,\"1,200\"\n",
        ),
        ("2025 OPP Expenses", EXPENSE_HEADERS),
    ])?;

    let first = inject_recurring_expenses(&config, &mut book, 2025)?;
    assert_eq!(first.inserted, 1);
    assert_eq!(first.already_present, 0);
    assert!(first.skipped.is_empty());

    let ledger = book.fetch_rows("2025 OPP Expenses")?;
    assert_eq!(ledger.len(), 1);
    let row = &ledger.rows[0];
    assert_eq!(row.get("Month"), Some("June"));
    assert_eq!(row.get("Date"), Some("2025-06-01"));
    assert_eq!(row.get("Description"), Some("Mortgage"));
    assert_eq!(row.get("Amount"), Some("1200"));
    assert_eq!(row.get("Comments"), Some("Recurring"));
    assert_eq!(row.get("Receipt Link"), Some(""));

    let second = LedgerProcessor::inject_recurring_expenses(&config, &mut book, 2025)?;
    assert_eq!(second.inserted, 0);
    assert_eq!(second.already_present, 1);
    assert_eq!(book.fetch_rows("2025 OPP Expenses")?.len(), 1);
    Ok(())
}

#[test]
fn test_injection_respects_existing_rows_in_any_case() -> Result<()> {
    let config = LedgerConfig::default();
    let ledger_csv = format!(
        "{}\nJuly,07/01/2025,OPP Checking,  mortgage  ,Standish,Property Expense,1200,Recurring,\n",
        EXPENSE_HEADERS
    );
    let mut book = workbook(&[
        (
            "2025 Recurring Expenses",
            "Date,Purchaser,Description,Property,Category,Amount,Comments\n\
             2025-07-01,OPP Checking,Mortgage,standish,prop. exp,1200,\n\
             2025-07-01,OPP Checking,Internet,Standish,Property Expense,79.99,autopay\n\
             2025-07-01,OPP Checking,Water,Standish,Property Expense,abc,\n",
        ),
        (
            "2025 OPP Expenses",
            ledger_csv.as_str(),
        ),
    ])?;

    let report = inject_recurring_expenses(&config, &mut book, 2025)?;
    assert_eq!(report.inserted, 1);
    assert_eq!(report.already_present, 1);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].row_number, 3);
    assert_eq!(report.skipped[0].raw.get("Description"), Some("Water"));

    let ledger = book.fetch_rows("2025 OPP Expenses")?;
    assert_eq!(ledger.len(), 2);
    let internet = &ledger.rows[1];
    assert_eq!(internet.get("Description"), Some("Internet"));
    assert_eq!(internet.get("Comments"), Some("autopay (Recurring)"));
    assert_eq!(internet.get("Category"), Some("Property Expense"));

    let again = inject_recurring_expenses(&config, &mut book, 2025)?;
    assert_eq!(again.inserted, 0);
    assert_eq!(again.already_present, 2);
    Ok(())
}

#[test]
fn test_missing_template_column_inserts_nothing() -> Result<()> {
    let config = LedgerConfig::default();
    let mut book = workbook(&[
        (
            "2025 Recurring Expenses",
            "Date,Description\n2025-06-01,Mortgage\n",
        ),
        ("2025 OPP Expenses", EXPENSE_HEADERS),
    ])?;

    let err = inject_recurring_expenses(&config, &mut book, 2025).unwrap_err();
    assert!(matches!(err, LedgerError::Schema { ref column, .. } if column == "Amount"));
    assert_eq!(book.grid("2025 OPP Expenses").map(|g| g.len()), Some(1));
    Ok(())
}

#[test]
fn test_income_rental_range_resolves_month() -> Result<()> {
    let config = LedgerConfig::default();
    let book = workbook(&[(
        "2025 OPP Income",
        "Rental Dates,Renter Name,Property,Amount\n2025-08-01 -- 2025-08-07,J. Guest,islamorada,\"$1,500.00\"\n",
    )])?;

    let table = book.fetch_rows("2025 OPP Income")?;
    let outcome = RowNormalizer::new(&config)?
        .with_fallback_year(2025)
        .normalize(&table, RecordKind::Income)?;

    assert_eq!(outcome.records.len(), 1);
    let record = &outcome.records[0];
    let income = record.as_income().unwrap();
    assert_eq!(income.rental_start, NaiveDate::from_ymd_opt(2025, 8, 1).unwrap());
    assert_eq!(income.rental_end, NaiveDate::from_ymd_opt(2025, 8, 7));
    assert_eq!(record.month, Month::August);
    assert_eq!(record.month.to_string(), "August");
    assert_eq!(record.property, "Islamorada");
    assert_eq!(record.amount, dec("1500.00"));
    Ok(())
}

#[test]
fn test_dashboard_orders_months_and_balances_totals() -> Result<()> {
    let config = LedgerConfig::default();
    let expenses_csv = format!(
        "{}\n\
         December,2025-12-01,OPP Checking,Mortgage,Standish,Property Expense,\"1,200\",Recurring,\n\
         April,2025-04-02,Cash,Bait,Islamorada,food,45.50,,\n\
         February,2025-02-14,Cash,Snow removal,Standish,misc,150,,\n\
         August,not yet,Cash,Kayak,Islamorada,,600,,\n",
        EXPENSE_HEADERS
    );
    let book = workbook(&[
        (
            "2025 OPP Income",
            "\n\nRental Dates,Property,Amount Received,Amount Owed,Status\n\
             12/20/2025 - 12/27/2025,Standish,2100,2100,Paid\n\
             2025-04-10 \u{2013} 2025-04-14,Islamorada,800,1000,\n\
             2025-08-01 -- 2025-08-07,Islamorada,1500,1500,\n\
             TBD,Standish,300,,\n",
        ),
        (
            "2025 OPP Expenses",
            expenses_csv.as_str(),
        ),
    ])?;

    let report = LedgerProcessor::dashboard(&config, &book, 2025)?;

    let months: Vec<Month> = report.aggregates.iter().map(|a| a.month).collect();
    assert_eq!(
        months,
        vec![Month::February, Month::April, Month::August, Month::December]
    );

    let income_total = dec("2100") + dec("800") + dec("1500");
    let expense_total = dec("1200") + dec("45.50") + dec("150");
    assert_eq!(report.total_profit(), income_total - expense_total);

    assert_eq!(report.income_skipped.len(), 1);
    assert_eq!(report.expense_skipped.len(), 1);
    assert!(matches!(
        report.expense_skipped[0].reason,
        RowError::UnparsableDate { .. }
    ));

    let late = overdue(&report.balances);
    assert_eq!(late.len(), 1);
    assert_eq!(late[0].property, "Islamorada");
    assert_eq!(late[0].month, Month::April);
    assert_eq!(late[0].due, dec("200"));

    let totals = property_totals(&report.aggregates);
    assert_eq!(totals.len(), 2);
    assert_eq!(totals[0].property, "Islamorada");
    assert_eq!(totals[0].profit, dec("2254.50"));

    let json = serde_json::to_string(&report)?;
    assert!(json.contains("\"income_skipped\""));
    Ok(())
}

#[test]
fn test_failing_source_surfaces_external_io() {
    let config = LedgerConfig::default();
    let err = build_dashboard(&config, &FailingSource, 2025).unwrap_err();
    match err {
        LedgerError::ExternalIo { operation, table, source } => {
            assert_eq!(operation, "fetch_rows");
            assert_eq!(table, "2025 OPP Income");
            assert_eq!(source.to_string(), "quota exceeded");
        }
        other => panic!("expected ExternalIo, got {other}"),
    }
}

#[test]
fn test_log_expense_with_receipt() -> Result<()> {
    let config = LedgerConfig::from_json(
        r#"{
            "business_name": "Oceanview Property Partners",
            "receipt_folders": { "2025": { "March": "drive-folder-march" } }
        }"#,
    )?;
    let mut book = workbook(&[("2025 OPP Expenses", EXPENSE_HEADERS)])?;
    let mut drive = MemoryFileStore::new();

    let date = NaiveDate::from_ymd_opt(2025, 3, 9).unwrap();
    let receipt = store_receipt(&config, &mut drive, date, "Lowes Receipt.JPG", b"jpeg")?;
    let entry = ExpenseEntry {
        date,
        purchaser: "Cash".to_string(),
        description: "Paint".to_string(),
        property: "Standish".to_string(),
        category: "improvements".to_string(),
        amount: dec("64.20"),
        comments: String::new(),
        receipt: Some(receipt.clone()),
    };
    log_expense(&config, &mut book, &entry)?;

    let records = RowNormalizer::new(&config)?
        .normalize_expenses(&book.fetch_rows("2025 OPP Expenses")?)?
        .records;
    assert_eq!(records.len(), 1);
    let expense = records[0].as_expense().unwrap();
    assert_eq!(expense.category, "Business Expansion & Improvements");
    assert_eq!(expense.receipt_reference.as_ref(), Some(&receipt));
    assert_eq!(drive.get(receipt.as_str()).unwrap().filename, "lowes_receipt.jpg");
    Ok(())
}

#[test]
fn test_date_extraction_properties() {
    assert_eq!(
        extract_first_valid_date("paid on 2025-03-14 via zelle"),
        NaiveDate::from_ymd_opt(2025, 3, 14)
    );
    assert_eq!(extract_first_valid_date("no dates here"), None);
    assert_eq!(extract_first_valid_date("2025-02-30"), None);

    let short = extract_first_valid_date("check-in 7/4").unwrap();
    assert_eq!(short.year(), Local::now().year());
    assert_eq!((short.month(), short.day()), (7, 4));

    // Pattern priority beats textual position.
    assert_eq!(
        extract_first_valid_date("06/30/2025 then 2025-07-02"),
        NaiveDate::from_ymd_opt(2025, 7, 2)
    );
}

#[test]
fn test_schema_generation() -> Result<()> {
    let schema = LedgerConfig::schema_as_json()?;
    assert!(schema.contains("category_aliases"));
    assert!(schema.contains("receipt_folders"));

    let config = LedgerConfig::from_json(&LedgerConfig::default().to_json()?)?;
    assert_eq!(config, LedgerConfig::default());
    Ok(())
}
