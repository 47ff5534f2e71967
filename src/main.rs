#[tokio::main]
async fn main() -> anyhow::Result<()> {
    expense_tracker_api::cli::run_with_sys_args().await
}
