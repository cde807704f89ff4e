use error_stack::{Result, ResultExt};

use super::CliError;
use agora::App;

pub async fn run(app: &App) -> Result<(), CliError> {
    let pool = app.db().change_context(CliError)?;
    pool.wait_until_healthy().await.change_context(CliError)?;
    pool.migrate().await.change_context(CliError)
}
