use crate::commands::{load_config, runtime, CommandResult, StepFailure};
use storefront_core::catalog::seed_catalog;
use storefront_db::{connect_with_config, migrations, CatalogSeed, SeedResult};

pub fn run() -> CommandResult {
    let config = match load_config("seed") {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match runtime("seed") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let products = seed_catalog();
    let result = runtime.block_on(async {
        let pool = connect_with_config(&config.database)
            .await
            .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;

        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), 5u8))?;

        let seed_result = CatalogSeed::load(&pool, &products)
            .await
            .map_err(|error| ("seed_execution", error.to_string(), 5u8))?;

        let verification = CatalogSeed::verify(&pool, &products)
            .await
            .map_err(|error| ("seed_verification", error.to_string(), 6u8))?;

        let run_result: Result<SeedResult, StepFailure> = if verification.all_present {
            Ok(seed_result)
        } else {
            Err(("seed_verification", verification_message(&verification.failed_checks()), 6u8))
        };

        pool.close().await;
        run_result
    });

    match result {
        Ok(seed_result) => {
            CommandResult::success("seed", summary_message(&seed_result, products.len()))
        }
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("seed", error_class, message, exit_code)
        }
    }
}

fn summary_message(result: &SeedResult, catalog_size: usize) -> String {
    format!(
        "catalog verified: {catalog_size} products present ({} inserted, {} already present)",
        result.inserted, result.skipped
    )
}

fn verification_message(failed_checks: &[&str]) -> String {
    if failed_checks.is_empty() {
        "Some catalog products failed to load".to_string()
    } else {
        format!("Seed verification failed for checks: {}", failed_checks.join(", "))
    }
}
