use std::env;
use std::sync::{Mutex, OnceLock};

use serde_json::Value;
use spendgate_cli::commands::{decide, expenses, migrate, seed, submit};

// One pooled connection keeps every statement on the same in-memory database.
const MEMORY_DB: &[(&str, &str)] = &[
    ("SPENDGATE_DATABASE_URL", "sqlite::memory:"),
    ("SPENDGATE_DATABASE_MAX_CONNECTIONS", "1"),
];

#[test]
fn migrate_returns_success_with_valid_env() {
    with_env(MEMORY_DB, || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 0, "expected successful migrate run");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "ok");
    });
}

#[test]
fn migrate_returns_config_failure_for_unsupported_database() {
    with_env(&[("SPENDGATE_DATABASE_URL", "postgres://localhost/spendgate")], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 2, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

#[test]
fn seed_reports_fixture_counts() {
    with_env(MEMORY_DB, || {
        let result = seed::run();
        assert_eq!(result.exit_code, 0, "expected successful seed run");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "seed");
        assert_eq!(payload["status"], "ok");

        let message = payload["message"].as_str().unwrap_or("");
        assert!(message.contains("6 users"), "unexpected seed summary: {message}");
        assert!(message.contains("4 expense requests"), "unexpected seed summary: {message}");
    });
}

#[test]
fn seed_is_idempotent_across_runs() {
    with_env(MEMORY_DB, || {
        let first = seed::run();
        assert_eq!(first.exit_code, 0, "expected first seed invocation success");
        let first_payload = parse_payload(&first.output);
        assert_eq!(first_payload["status"], "ok");

        let second = seed::run();
        assert_eq!(second.exit_code, 0, "expected second seed invocation success");
        let second_payload = parse_payload(&second.output);
        assert_eq!(second_payload["status"], "ok");

        assert_eq!(first_payload["message"], second_payload["message"]);
    });
}

#[test]
fn submit_rejects_malformed_date_before_touching_the_database() {
    let result = submit::run(submit::SubmitArgs {
        submitter: "user-emp-001".to_string(),
        description: "Team lunch".to_string(),
        date: "31-12-2025".to_string(),
        category: "food".to_string(),
        amount: "18.40".to_string(),
        currency: "USD".to_string(),
        paid_by: None,
        remarks: None,
        draft: false,
    });
    assert_eq!(result.exit_code, 2, "expected argument validation failure code");

    let payload = parse_payload(&result.output);
    assert_eq!(payload["command"], "submit");
    assert_eq!(payload["error_class"], "invalid_argument");
}

#[test]
fn submit_rejects_unknown_category() {
    let result = submit::run(submit::SubmitArgs {
        submitter: "user-emp-001".to_string(),
        description: "Team lunch".to_string(),
        date: "2025-12-31".to_string(),
        category: "entertainment".to_string(),
        amount: "18.40".to_string(),
        currency: "USD".to_string(),
        paid_by: None,
        remarks: None,
        draft: false,
    });
    assert_eq!(result.exit_code, 2, "expected argument validation failure code");

    let payload = parse_payload(&result.output);
    assert_eq!(payload["error_class"], "invalid_argument");
    let message = payload["message"].as_str().unwrap_or("");
    assert!(message.contains("entertainment"), "unexpected message: {message}");
}

// Separate command invocations each open their own pool, so listing what a
// prior seed run wrote needs a file-backed database instead of `:memory:`.
#[test]
fn expenses_lists_a_submitters_requests_newest_first() {
    let db_path = env::temp_dir().join(format!("spendgate-expenses-{}.db", std::process::id()));
    let _ = std::fs::remove_file(&db_path);
    let url = format!("sqlite://{}", db_path.display());

    with_env(&[("SPENDGATE_DATABASE_URL", url.as_str())], || {
        let seeded = seed::run();
        assert_eq!(seeded.exit_code, 0, "expected successful seed run");

        let result = expenses::run("user-emp-001".to_string());
        assert_eq!(result.exit_code, 0, "expected successful expenses run");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "expenses");
        assert_eq!(payload["status"], "ok");

        let message = payload["message"].as_str().unwrap_or("");
        assert!(message.starts_with("2 submitted by `user-emp-001`"), "unexpected: {message}");
        let newest = message.find("expense-seed-001").expect("newest request listed");
        let older = message.find("expense-seed-002").expect("older request listed");
        assert!(newest < older, "expected newest request first: {message}");
        assert!(message.contains("(approved, 54.00 EUR)"), "unexpected: {message}");

        let empty = expenses::run("user-mgr-001".to_string());
        assert_eq!(empty.exit_code, 0, "expected successful empty listing");
        let empty_payload = parse_payload(&empty.output);
        let empty_message = empty_payload["message"].as_str().unwrap_or("");
        assert!(
            empty_message.contains("no expense requests submitted by `user-mgr-001`"),
            "unexpected: {empty_message}"
        );
    });

    for suffix in ["", "-wal", "-shm"] {
        let _ = std::fs::remove_file(db_path.with_extension(format!("db{suffix}")));
    }
}

#[test]
fn decide_rejects_unknown_decision_word() {
    let result = decide::run(
        "expense-seed-001".to_string(),
        "user-mgr-001".to_string(),
        "maybe".to_string(),
    );
    assert_eq!(result.exit_code, 2, "expected argument validation failure code");

    let payload = parse_payload(&result.output);
    assert_eq!(payload["command"], "decide");
    assert_eq!(payload["error_class"], "invalid_argument");
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "SPENDGATE_DATABASE_URL",
        "SPENDGATE_DATABASE_MAX_CONNECTIONS",
        "SPENDGATE_DATABASE_TIMEOUT_SECS",
        "SPENDGATE_LOG_LEVEL",
        "SPENDGATE_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, previous) in previous_values {
        match previous {
            Some(value) => env::set_var(key, value),
            None => env::remove_var(key),
        }
    }
}
