use crate::connection::DbPool;
use crate::repositories::RepositoryError;
use sqlx::Executor;

/// Roster contract for the demo clinic seed.
const SEED_PROVIDERS: &[SeedProviderContract] = &[
    SeedProviderContract {
        provider_id: "prov-ivanov",
        display_name: "Dr. Elena Ivanov",
        timezone: "America/New_York",
        services: &["checkup", "cleaning", "whitening"],
        expected_window_count: 5,
    },
    SeedProviderContract {
        provider_id: "prov-adams",
        display_name: "Dr. Marcus Adams",
        timezone: "America/New_York",
        services: &["consult", "orthodontics"],
        expected_window_count: 3,
    },
    SeedProviderContract {
        provider_id: "prov-okafor",
        display_name: "Dr. Grace Okafor",
        timezone: "America/Chicago",
        services: &["checkup", "emergency"],
        expected_window_count: 11,
    },
    SeedProviderContract {
        provider_id: "prov-reyes",
        display_name: "Lucia Reyes, RDH",
        timezone: "America/Los_Angeles",
        services: &["cleaning", "consult", "insurance"],
        expected_window_count: 4,
    },
];

/// Demo clinic roster: four providers across three US zones, with split shifts and a
/// Saturday clinic so availability output has some texture.
pub struct DemoSeedDataset;

impl DemoSeedDataset {
    pub const SQL: &str = include_str!("../../../config/fixtures/demo_providers.sql");

    /// Load the roster. Existing rows are left alone, so this is safe to repeat.
    pub async fn load(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        let mut tx = pool.begin().await?;

        tx.execute(sqlx::query(Self::SQL)).await?;
        tx.commit().await?;

        let providers_seeded = SEED_PROVIDERS
            .iter()
            .map(|provider| ProviderSeedInfo {
                provider_id: provider.provider_id,
                display_name: provider.display_name,
                timezone: provider.timezone,
            })
            .collect::<Vec<_>>();

        Ok(SeedResult { providers_seeded })
    }

    /// Check that every seeded provider exists with its services and weekly hours.
    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let mut checks = Vec::new();

        for provider in SEED_PROVIDERS {
            let exists: i64 = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM provider WHERE id = ?1 AND timezone = ?2)",
            )
            .bind(provider.provider_id)
            .bind(provider.timezone)
            .fetch_one(pool)
            .await?;
            checks.push((provider.provider_id, exists == 1));

            let services: Vec<String> = sqlx::query_scalar(
                "SELECT service_key FROM provider_service WHERE provider_id = ?1
                 ORDER BY service_key",
            )
            .bind(provider.provider_id)
            .fetch_all(pool)
            .await?;
            checks.push((
                provider.services_label(),
                string_list_matches(&services, provider.services),
            ));

            let window_count: i64 = sqlx::query_scalar(
                "SELECT COUNT(1) FROM provider_working_hours WHERE provider_id = ?1",
            )
            .bind(provider.provider_id)
            .fetch_one(pool)
            .await?;
            checks.push((provider.hours_label(), window_count == provider.expected_window_count));
        }

        let all_present = checks.iter().all(|(_, passed)| *passed);
        Ok(VerificationResult { all_present, checks })
    }

    /// Remove the seeded roster along with any holds and appointments made against it.
    pub async fn clean(pool: &DbPool) -> Result<(), RepositoryError> {
        let mut tx = pool.begin().await?;
        let quoted = sql_array_from_ids(
            &SEED_PROVIDERS.iter().map(|provider| provider.provider_id).collect::<Vec<_>>(),
        );

        for table in ["appointment", "hold", "provider_working_hours", "provider_service"] {
            sqlx::query(&format!("DELETE FROM {table} WHERE provider_id IN {quoted}"))
                .execute(&mut *tx)
                .await?;
        }
        sqlx::query(&format!("DELETE FROM provider WHERE id IN {quoted}"))
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
struct SeedProviderContract {
    provider_id: &'static str,
    display_name: &'static str,
    timezone: &'static str,
    services: &'static [&'static str],
    expected_window_count: i64,
}

impl SeedProviderContract {
    fn services_label(&self) -> &'static str {
        match self.provider_id {
            "prov-ivanov" => "ivanov-services",
            "prov-adams" => "adams-services",
            "prov-okafor" => "okafor-services",
            _ => "reyes-services",
        }
    }

    fn hours_label(&self) -> &'static str {
        match self.provider_id {
            "prov-ivanov" => "ivanov-hours",
            "prov-adams" => "adams-hours",
            "prov-okafor" => "okafor-hours",
            _ => "reyes-hours",
        }
    }
}

fn string_list_matches(actual: &[String], expected: &[&str]) -> bool {
    actual.len() == expected.len() && actual.iter().zip(expected).all(|(a, b)| a == b)
}

fn sql_array_from_ids(ids: &[&str]) -> String {
    let quoted = ids.iter().map(|id| format!("'{}'", id)).collect::<Vec<_>>().join(",");
    format!("({quoted})")
}

#[derive(Debug)]
pub struct SeedResult {
    pub providers_seeded: Vec<ProviderSeedInfo>,
}

#[derive(Debug)]
pub struct ProviderSeedInfo {
    pub provider_id: &'static str,
    pub display_name: &'static str,
    pub timezone: &'static str,
}

#[derive(Debug)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(&'static str, bool)>,
}
