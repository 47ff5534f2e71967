use std::collections::HashMap;

use chrono::NaiveDate;
use tracing::{debug, info};
use uuid::Uuid;
use validator::Validate;

use crate::{
    accounts::services::AccountService,
    categories::{name_key, services::CategoryService, Category, NewCategoryData},
    currency::Currency,
    dates,
    repos::DynTransactionRepo,
    service_err::{ServiceError, ServiceResult},
    transactions::{NewTransactionData, TransactionKind, TransactionQuery},
    users::services::UserService,
};

use super::{
    parse_rows, render_statement, write_rows, CsvRow, ImportReport, Period, RowError, Statement,
};

#[derive(Clone)]
pub struct ReportService {
    transaction_repo: DynTransactionRepo,
    category_service: CategoryService,
    account_service: AccountService,
    user_service: UserService,
}

impl ReportService {
    pub fn new(
        transaction_repo: DynTransactionRepo,
        category_service: CategoryService,
        account_service: AccountService,
        user_service: UserService,
    ) -> Self {
        Self {
            transaction_repo,
            category_service,
            account_service,
            user_service,
        }
    }

    /// Export the user's transactions as CSV, oldest first. Without an
    /// account every accessible account is included.
    pub async fn export_csv(
        &self,
        user_id: Uuid,
        account_id: Option<Uuid>,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> ServiceResult<String> {
        if let Some(account_id) = account_id {
            self.account_service.get_account(user_id, account_id).await?;
        }

        let currency = self.user_service.currency_for(user_id).await?;
        let account_names: HashMap<Uuid, String> = self
            .account_service
            .list_accounts(user_id)
            .await?
            .into_iter()
            .map(|a| (a.account.id, a.account.name))
            .collect();

        let transactions = self
            .transaction_repo
            .list_all_transactions(TransactionQuery {
                user_id,
                account_id,
                from,
                to,
                ..Default::default()
            })
            .await?;

        let rows: Vec<CsvRow> = transactions
            .into_iter()
            .map(|t| CsvRow {
                date: t.date.to_string(),
                account: account_names.get(&t.account_id).cloned().unwrap_or_default(),
                category: t.category_name.unwrap_or_default(),
                kind: t.kind.as_str().to_owned(),
                amount: currency.format_value(t.amount),
                description: t.description,
            })
            .collect();

        debug!(%user_id, rows = rows.len(), "Exporting transactions.");

        Ok(write_rows(&rows)?)
    }

    /// Import transactions from CSV into an account.
    ///
    /// Each row is checked on its own and rejected rows are listed in the
    /// report. Categories are matched by name ignoring case and surrounding
    /// whitespace, and created when missing. The
    /// accepted rows are saved together, so either all of them are imported
    /// or none are.
    pub async fn import_csv(
        &self,
        user_id: Uuid,
        account_id: Uuid,
        body: &str,
    ) -> ServiceResult<ImportReport> {
        self.account_service.get_account(user_id, account_id).await?;
        let currency = self.user_service.currency_for(user_id).await?;

        let mut categories: HashMap<String, Category> = self
            .category_service
            .list_categories(user_id)
            .await?
            .into_iter()
            .map(|c| (name_key(&c.name), c))
            .collect();

        let mut report = ImportReport::default();
        let mut entries = Vec::new();

        for (line, row) in parse_rows(body) {
            let row = match row {
                Ok(row) => row,
                Err(message) => {
                    report.errors.push(RowError { line, message });
                    continue;
                }
            };

            let mut entry = match to_entry(&row, account_id, &currency) {
                Ok(entry) => entry,
                Err(message) => {
                    report.errors.push(RowError { line, message });
                    continue;
                }
            };

            let key = name_key(&row.category);
            if !key.is_empty() {
                let category = match categories.get(&key) {
                    Some(category) => category.clone(),
                    None => {
                        let found = self
                            .category_service
                            .find_or_create(
                                user_id,
                                NewCategoryData {
                                    name: row.category.clone(),
                                    kind: entry.kind,
                                },
                            )
                            .await;
                        let category = match found {
                            Ok(category) => category,
                            Err(ServiceError::InvalidData(errors)) => {
                                report.errors.push(RowError {
                                    line,
                                    message: format!(
                                        "'{}' is not a valid category name: {}",
                                        row.category.trim(),
                                        errors
                                    ),
                                });
                                continue;
                            }
                            Err(error) => return Err(error),
                        };
                        categories.insert(key, category.clone());

                        category
                    }
                };

                if category.kind != entry.kind {
                    report.errors.push(RowError {
                        line,
                        message: format!(
                            "Category '{}' is for {} transactions.",
                            category.name,
                            category.kind.as_str()
                        ),
                    });
                    continue;
                }
                entry.category_id = Some(category.id);
            }

            entries.push(entry);
        }

        if !entries.is_empty() {
            self.transaction_repo
                .create_transactions(user_id, &entries)
                .await?;
        }
        report.imported = entries.len();

        info!(
            %user_id,
            %account_id,
            imported = report.imported,
            rejected = report.errors.len(),
            "Imported transactions."
        );

        Ok(report)
    }

    /// Render a PDF statement for an account. The period defaults to the
    /// start of the current month through `today`.
    pub async fn statement(
        &self,
        user_id: Uuid,
        account_id: Uuid,
        today: NaiveDate,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> ServiceResult<Vec<u8>> {
        let period = Period {
            from: from.unwrap_or_else(|| dates::month_start(today)),
            to: to.unwrap_or(today),
        };
        if period.from > period.to {
            return Err(ServiceError::Invalid(
                "The start of the period must not be after its end.".to_owned(),
            ));
        }

        let account = self
            .account_service
            .get_account(user_id, account_id)
            .await?
            .account;
        let currency = self.user_service.currency_for(user_id).await?;
        let opening_balance = self
            .transaction_repo
            .balance_before(account_id, period.from)
            .await?;
        let transactions = self
            .transaction_repo
            .list_all_transactions(TransactionQuery {
                user_id,
                account_id: Some(account_id),
                from: Some(period.from),
                to: Some(period.to),
                ..Default::default()
            })
            .await?;

        Ok(render_statement(&Statement {
            account,
            currency,
            period,
            opening_balance,
            transactions,
        })?)
    }
}

/// Convert a row into transaction data, or describe what is wrong with it.
fn to_entry(
    row: &CsvRow,
    account_id: Uuid,
    currency: &Currency,
) -> Result<NewTransactionData, String> {
    let date = NaiveDate::parse_from_str(&row.date, "%Y-%m-%d")
        .map_err(|_| format!("'{}' is not a date in the form YYYY-MM-DD.", row.date))?;
    let kind: TransactionKind = row.kind.parse()?;
    let amount = currency
        .parse_amount(&row.amount)
        .map_err(|error| error.to_string())?;

    let entry = NewTransactionData {
        account_id,
        category_id: None,
        kind,
        amount,
        description: row.description.clone(),
        date,
        recurrence: None,
    };
    entry.validate().map_err(|errors| errors.to_string())?;

    Ok(entry)
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use chrono::Utc;

    use crate::{
        accounts::services::test::FakeAccountRepo,
        categories::services::{test::FakeCategoryRepo, CategoryService},
        email::{clients::testing::RecordingMailer, Mailer, Templates},
        repos::TransactionRepo,
        transactions::services::test::FakeTransactionRepo,
        users::services::test::FakeUserRepo,
    };

    use super::*;

    struct Fixture {
        service: ReportService,
        user_id: Uuid,
        account_id: Uuid,
        transactions: Arc<FakeTransactionRepo>,
        categories: Arc<FakeCategoryRepo>,
    }

    fn fixture() -> Fixture {
        let (users, user) = FakeUserRepo::with_user("Robin", "robin@example.com", "password123");
        let accounts = Arc::new(FakeAccountRepo::default());
        let account = accounts.add_account(user.id, "Checking");
        let transactions = Arc::new(FakeTransactionRepo::default());
        let categories = Arc::new(FakeCategoryRepo::default());
        let mailer = Mailer::new(
            Arc::new(RecordingMailer::default()),
            Templates::new("https://app.example.com").unwrap(),
        );

        Fixture {
            service: ReportService::new(
                transactions.clone(),
                CategoryService::new(categories.clone()),
                AccountService::new(accounts),
                UserService::new(Arc::new(users), mailer),
            ),
            user_id: user.id,
            account_id: account.id,
            transactions,
            categories,
        }
    }

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 4, d).unwrap()
    }

    #[tokio::test]
    async fn import_reports_bad_rows_and_saves_the_rest() {
        let f = fixture();
        f.categories
            .add_category(f.user_id, "Salary", TransactionKind::Income);
        let body = "date,account,category,kind,amount,description\n\
                    2024-04-01,ignored,Salary,income,\"2,500.00\",Paycheck\n\
                    2024-04-02,,Groceries,expense,45.10,Market\n\
                    04/03/2024,,,expense,1.00,Bad date\n\
                    2024-04-04,,Salary,expense,9.99,Wrong kind\n\
                    2024-04-05,,,expense,0,Nothing\n";

        let report = f
            .service
            .import_csv(f.user_id, f.account_id, body)
            .await
            .unwrap();

        assert_eq!(2, report.imported);
        assert_eq!(
            vec![4, 5, 6],
            report.errors.iter().map(|e| e.line).collect::<Vec<_>>()
        );

        let saved = f.transactions.transactions.lock().unwrap().clone();
        assert_eq!(250_000, saved[0].amount);
        assert_eq!(4_510, saved[1].amount);

        let groceries = f
            .categories
            .categories
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.name == "Groceries")
            .cloned()
            .expect("category created on demand");
        assert_eq!(TransactionKind::Expense, groceries.kind);
        assert_eq!(Some(groceries.id), saved[1].category_id);
    }

    #[tokio::test]
    async fn import_matches_categories_ignoring_case_and_padding() {
        let f = fixture();
        let food = f
            .categories
            .add_category(f.user_id, "Food", TransactionKind::Expense);
        let long_name = "x".repeat(65);
        let body = format!(
            "date,account,category,kind,amount,description\n\
             2024-04-01,,food,expense,1.00,Lower\n\
             2024-04-02,,  FOOD ,expense,2.00,Padded\n\
             2024-04-03,,Travel,expense,3.00,New\n\
             2024-04-04,,travel ,expense,4.00,New again\n\
             2024-04-05,,{},expense,5.00,Too long\n",
            long_name
        );

        let report = f
            .service
            .import_csv(f.user_id, f.account_id, &body)
            .await
            .unwrap();

        assert_eq!(4, report.imported);
        assert_eq!(
            vec![6],
            report.errors.iter().map(|e| e.line).collect::<Vec<_>>()
        );

        let categories = f.categories.categories.lock().unwrap().clone();
        assert_eq!(2, categories.len());
        let travel = categories
            .iter()
            .find(|c| c.name == "Travel")
            .cloned()
            .expect("category created once");

        let saved = f.transactions.transactions.lock().unwrap().clone();
        assert_eq!(Some(food.id), saved[0].category_id);
        assert_eq!(Some(food.id), saved[1].category_id);
        assert_eq!(Some(travel.id), saved[2].category_id);
        assert_eq!(Some(travel.id), saved[3].category_id);
    }

    #[tokio::test]
    async fn import_into_unknown_account_fails() {
        let f = fixture();

        let result = f
            .service
            .import_csv(f.user_id, Uuid::new_v4(), "date,kind,amount\n")
            .await;

        assert!(matches!(result, Err(ServiceError::NotFound("Account"))));
    }

    #[tokio::test]
    async fn export_formats_amounts() {
        let f = fixture();
        f.transactions
            .create_transaction(
                f.user_id,
                &NewTransactionData {
                    account_id: f.account_id,
                    category_id: None,
                    kind: TransactionKind::Expense,
                    amount: 1_250,
                    description: "Lunch".to_owned(),
                    date: date(15),
                    recurrence: None,
                },
            )
            .await
            .unwrap();

        let csv = f
            .service
            .export_csv(f.user_id, None, None, None)
            .await
            .unwrap();

        assert_eq!(
            "date,account,category,kind,amount,description\n\
             2024-04-15,Checking,,expense,12.50,Lunch\n",
            csv
        );
    }

    #[tokio::test]
    async fn statement_rejects_inverted_period() {
        let f = fixture();

        let result = f
            .service
            .statement(
                f.user_id,
                f.account_id,
                Utc::now().date_naive(),
                Some(date(20)),
                Some(date(10)),
            )
            .await;

        assert!(matches!(result, Err(ServiceError::Invalid(_))));
    }

    #[tokio::test]
    async fn statement_renders_pdf() {
        let f = fixture();

        let bytes = f
            .service
            .statement(f.user_id, f.account_id, date(30), None, None)
            .await
            .unwrap();

        assert!(bytes.starts_with(b"%PDF"));
    }
}
