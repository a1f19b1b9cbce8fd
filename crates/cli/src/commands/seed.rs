use crate::commands::{with_pool, CommandResult};
use spendgate_db::{migrations, SeedDataset};

pub fn run() -> CommandResult {
    with_pool("seed", |pool| async move {
        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), 5u8))?;

        let seeded = SeedDataset::load(&pool)
            .await
            .map_err(|error| ("seed_execution", error.to_string(), 5u8))?;

        let verification = SeedDataset::verify(&pool)
            .await
            .map_err(|error| ("seed_verification", error.to_string(), 6u8))?;
        if !verification.passed {
            let failed = verification
                .checks
                .iter()
                .filter(|check| !check.passed)
                .map(|check| check.name.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            return Err(("seed_verification", format!("failed checks: {failed}"), 6u8));
        }

        Ok(format!(
            "seeded {} users and {} expense requests",
            seeded.users_seeded, seeded.expenses_seeded
        ))
    })
}
