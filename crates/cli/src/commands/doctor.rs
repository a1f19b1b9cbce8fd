use serde::Serialize;

use spendgate_core::config::{AppConfig, LoadOptions};
use spendgate_db::repositories::SqlExpenseRepository;
use spendgate_db::{connect_with_settings, migrations, DbPool};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum Readiness {
    Ready,
    Broken,
    Unknown,
}

#[derive(Debug, Serialize)]
struct Probe {
    name: &'static str,
    readiness: Readiness,
    detail: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    ready: bool,
    probes: Vec<Probe>,
}

pub fn run(json_output: bool) -> String {
    let report = build_report();

    if json_output {
        return serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"ready\":false,\"error\":\"{}\"}}",
                error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
            )
        });
    }

    let mut lines = vec![if report.ready {
        "doctor: spendgate is ready".to_string()
    } else {
        "doctor: spendgate is not ready".to_string()
    }];
    for probe in &report.probes {
        let marker = match probe.readiness {
            Readiness::Ready => "ok",
            Readiness::Broken => "FAIL",
            Readiness::Unknown => "??",
        };
        lines.push(format!("  [{marker}] {}: {}", probe.name, probe.detail));
    }
    lines.join("\n")
}

fn build_report() -> DoctorReport {
    let mut probes = Vec::new();

    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            probes.push(Probe {
                name: "configuration",
                readiness: Readiness::Ready,
                detail: format!(
                    "database `{}`, log level `{}`",
                    config.database.url, config.logging.level
                ),
            });
            Some(config)
        }
        Err(error) => {
            probes.push(Probe {
                name: "configuration",
                readiness: Readiness::Broken,
                detail: error.to_string(),
            });
            None
        }
    };

    match config {
        Some(config) => probe_database(&config, &mut probes),
        None => {
            for name in ["database", "schema", "approval_queue"] {
                probes.push(Probe {
                    name,
                    readiness: Readiness::Unknown,
                    detail: "configuration did not load".to_string(),
                });
            }
        }
    }

    let ready = probes.iter().all(|probe| probe.readiness == Readiness::Ready);
    DoctorReport { ready, probes }
}

fn probe_database(config: &AppConfig, probes: &mut Vec<Probe>) {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            probes.push(Probe {
                name: "database",
                readiness: Readiness::Broken,
                detail: format!("failed to initialize async runtime: {error}"),
            });
            return;
        }
    };

    runtime.block_on(async {
        let pool = match connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        {
            Ok(pool) => {
                probes.push(Probe {
                    name: "database",
                    readiness: Readiness::Ready,
                    detail: "connection established".to_string(),
                });
                pool
            }
            Err(error) => {
                probes.push(Probe {
                    name: "database",
                    readiness: Readiness::Broken,
                    detail: error.to_string(),
                });
                return;
            }
        };

        let schema_ready = probe_schema(&pool, probes).await;
        if schema_ready {
            probe_queue_depth(&pool, probes).await;
        } else {
            probes.push(Probe {
                name: "approval_queue",
                readiness: Readiness::Unknown,
                detail: "schema is not current".to_string(),
            });
        }
        pool.close().await;
    });
}

async fn probe_schema(pool: &DbPool, probes: &mut Vec<Probe>) -> bool {
    let known = migrations::known_count();

    match migrations::applied_count(pool).await {
        Ok(applied) if applied as usize >= known => {
            probes.push(Probe {
                name: "schema",
                readiness: Readiness::Ready,
                detail: format!("{applied} of {known} migrations applied"),
            });
            true
        }
        Ok(applied) => {
            probes.push(Probe {
                name: "schema",
                readiness: Readiness::Broken,
                detail: format!(
                    "{applied} of {known} migrations applied, run `spendgate migrate`"
                ),
            });
            false
        }
        Err(_) => {
            probes.push(Probe {
                name: "schema",
                readiness: Readiness::Broken,
                detail: "no migrations applied yet, run `spendgate migrate`".to_string(),
            });
            false
        }
    }
}

async fn probe_queue_depth(pool: &DbPool, probes: &mut Vec<Probe>) {
    let requests = SqlExpenseRepository::new(pool.clone());

    match requests.count_pending().await {
        Ok(pending) => probes.push(Probe {
            name: "approval_queue",
            readiness: Readiness::Ready,
            detail: format!("{pending} expense requests awaiting decisions"),
        }),
        Err(error) => probes.push(Probe {
            name: "approval_queue",
            readiness: Readiness::Broken,
            detail: error.to_string(),
        }),
    }
}
