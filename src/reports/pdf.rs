use anyhow::Context;
use printpdf::{
    BuiltinFont, IndirectFontRef, Mm, PdfDocument, PdfDocumentReference, PdfLayerReference,
};

use crate::{accounts::Account, currency::Currency, transactions::Transaction};

use super::Period;

const PAGE_WIDTH: Mm = Mm(210.0);
const PAGE_HEIGHT: Mm = Mm(297.0);
const MARGIN: f32 = 20.0;
const LINE_HEIGHT: f32 = 6.0;
const FONT_SIZE: f32 = 10.0;

/// Everything printed on an account statement.
pub struct Statement {
    pub account: Account,
    pub currency: Currency,
    pub period: Period,
    /// The balance from every transaction before the period.
    pub opening_balance: i64,
    /// Transactions in the period, oldest first.
    pub transactions: Vec<Transaction>,
}

impl Statement {
    pub fn closing_balance(&self) -> i64 {
        self.opening_balance
            + self
                .transactions
                .iter()
                .map(Transaction::balance_effect)
                .sum::<i64>()
    }
}

/// Lays out lines top to bottom, starting a new page when one fills up.
struct Cursor<'a> {
    doc: &'a PdfDocumentReference,
    layer: PdfLayerReference,
    font: &'a IndirectFontRef,
    y: f32,
}

impl<'a> Cursor<'a> {
    fn line(&mut self, columns: &[(f32, &str)]) {
        if self.y < MARGIN {
            let (page, layer) = self.doc.add_page(PAGE_WIDTH, PAGE_HEIGHT, "Statement");
            self.layer = self.doc.get_page(page).get_layer(layer);
            self.y = PAGE_HEIGHT.0 - MARGIN;
        }

        for (x, text) in columns {
            self.layer
                .use_text(*text, FONT_SIZE, Mm(MARGIN + x), Mm(self.y), self.font);
        }
        self.y -= LINE_HEIGHT;
    }

    fn gap(&mut self) {
        self.y -= LINE_HEIGHT;
    }
}

/// Render a statement as a PDF document.
pub fn render_statement(statement: &Statement) -> anyhow::Result<Vec<u8>> {
    let title = format!("Statement for {}", statement.account.name);
    let (doc, page, layer) = PdfDocument::new(&title, PAGE_WIDTH, PAGE_HEIGHT, "Statement");
    let font = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .context("Failed to load statement font.")?;
    let bold = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .context("Failed to load statement font.")?;

    let currency = &statement.currency;
    let period = format!("{} to {}", statement.period.from, statement.period.to);
    let opening = currency.display(statement.opening_balance);
    let closing = currency.display(statement.closing_balance());

    let mut cursor = Cursor {
        doc: &doc,
        layer: doc.get_page(page).get_layer(layer),
        font: &bold,
        y: PAGE_HEIGHT.0 - MARGIN,
    };
    cursor.line(&[(0.0, &title)]);
    cursor.font = &font;
    cursor.line(&[(0.0, &period)]);
    cursor.gap();
    cursor.line(&[(0.0, "Opening balance"), (130.0, &opening)]);
    cursor.gap();

    cursor.font = &bold;
    cursor.line(&[
        (0.0, "Date"),
        (25.0, "Description"),
        (95.0, "Category"),
        (130.0, "Amount"),
    ]);
    cursor.font = &font;

    for transaction in &statement.transactions {
        let date = transaction.date.to_string();
        let description = truncate(&transaction.description, 36);
        let category = truncate(transaction.category_name.as_deref().unwrap_or("-"), 18);
        let amount = currency.display(transaction.balance_effect());

        cursor.line(&[
            (0.0, &date),
            (25.0, &description),
            (95.0, &category),
            (130.0, &amount),
        ]);
    }

    cursor.gap();
    cursor.font = &bold;
    cursor.line(&[(0.0, "Closing balance"), (130.0, &closing)]);

    doc.save_to_bytes().context("Failed to write statement PDF.")
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_owned();
    }

    let mut truncated: String = text.chars().take(max_chars.saturating_sub(3)).collect();
    truncated.push_str("...");

    truncated
}

#[cfg(test)]
mod test {
    use chrono::{NaiveDate, Utc};
    use uuid::Uuid;

    use crate::transactions::TransactionKind;

    use super::*;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 4, d).unwrap()
    }

    fn transaction(kind: TransactionKind, amount: i64, day: u32) -> Transaction {
        Transaction {
            id: Uuid::new_v4(),
            account_id: Uuid::new_v4(),
            category_id: None,
            category_name: None,
            created_by: Uuid::new_v4(),
            kind,
            amount,
            description: "Entry".to_owned(),
            date: date(day),
            recurrence: None,
            recurrence_end_date: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn statement(transactions: Vec<Transaction>) -> Statement {
        Statement {
            account: Account {
                id: Uuid::new_v4(),
                owner_id: Uuid::new_v4(),
                name: "Checking".to_owned(),
                description: None,
                balance: 0,
                is_default: true,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            },
            currency: Currency::usd(),
            period: Period {
                from: date(1),
                to: date(30),
            },
            opening_balance: 10_000,
            transactions,
        }
    }

    #[test]
    fn closing_balance_applies_each_entry() {
        let statement = statement(vec![
            transaction(TransactionKind::Income, 5_000, 2),
            transaction(TransactionKind::Expense, 2_500, 3),
        ]);

        assert_eq!(12_500, statement.closing_balance());
    }

    #[test]
    fn renders_pdf_spanning_pages() {
        let transactions = (0..120)
            .map(|i| transaction(TransactionKind::Expense, 100, 1 + i % 28))
            .collect();

        let bytes = render_statement(&statement(transactions)).unwrap();

        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn truncate_long_text() {
        assert_eq!("Groceries", truncate("Groceries", 10));
        assert_eq!("Groc...", truncate("Groceries at the market", 7));
    }
}
