// ABOUTME: State machine tests for deploy attempts against a scripted executor.
// ABOUTME: Covers backup-before-mutate, the health gate, and cancellation.

use std::time::Duration;

use async_trait::async_trait;
use flotilla::deploy::{
    Attempt, DeployError, DeployOptions, DeployPhase, RolloutLocks, deploy_with,
};
use flotilla::exec::{CommandOutput, Execute, Target};
use flotilla::plugin::{LaravelFramework, NodeFramework, UbuntuServer};
use flotilla::topology::ServiceEntry;
use flotilla::types::{DomainName, RepoName, ServiceKey};
use tokio::sync::watch;

/// Executor that answers from substring rules and records every command.
struct MockExecutor {
    rules: Vec<(&'static str, u32, &'static str)>,
    commands: parking_lot::Mutex<Vec<String>>,
}

impl MockExecutor {
    fn new(rules: Vec<(&'static str, u32, &'static str)>) -> Self {
        Self {
            rules,
            commands: parking_lot::Mutex::new(Vec::new()),
        }
    }

    fn ran(&self, needle: &str) -> bool {
        self.commands.lock().iter().any(|c| c.contains(needle))
    }
}

#[async_trait]
impl Execute for MockExecutor {
    async fn exec(&self, command: &str) -> flotilla::exec::Result<CommandOutput> {
        self.commands.lock().push(command.to_string());
        for (needle, exit_code, stdout) in &self.rules {
            if command.contains(needle) {
                return Ok(CommandOutput {
                    exit_code: *exit_code,
                    stdout: stdout.to_string(),
                    stderr: if *exit_code == 0 {
                        String::new()
                    } else {
                        "scripted failure".to_string()
                    },
                });
            }
        }
        Ok(CommandOutput {
            exit_code: 0,
            stdout: String::new(),
            stderr: String::new(),
        })
    }

    async fn exec_with_timeout(
        &self,
        command: &str,
        _timeout: Duration,
    ) -> flotilla::exec::Result<CommandOutput> {
        self.exec(command).await
    }
}

fn entry() -> ServiceEntry {
    ServiceEntry {
        key: ServiceKey::new(RepoName::new("api").unwrap(), "production"),
        domain: DomainName::new("api.example.com").unwrap(),
        port: 3001,
        health_check: "/health".to_string(),
        depends_on: Vec::new(),
        target: Target::Local,
        health_timeout: None,
    }
}

fn cancel_channel() -> (watch::Sender<bool>, watch::Receiver<bool>) {
    watch::channel(false)
}

const ROUTING: &str = "# routing\n";

#[tokio::test(start_paused = true)]
async fn full_attempt_reaches_verified_and_deletes_backup() {
    let exec = MockExecutor::new(vec![("inspect -f", 0, "running\n")]);
    let (_tx, mut cancel) = cancel_channel();

    let built = Attempt::new(entry(), Some(".env".to_string()))
        .build(&exec, "/srv/api")
        .await
        .unwrap();
    assert!(exec.ran("docker build -t flotilla/api-production:"));

    let backed_up = built.backup(&exec, &NodeFramework).await.unwrap();
    let backup_path = backed_up.backup().unwrap().path.clone();
    assert!(backup_path.contains("api-production"));
    assert!(exec.ran("pg_dump"));

    let migrated = backed_up.migrate(&exec, &NodeFramework).await.unwrap();
    assert!(exec.ran("npm run migrate --if-present"));

    let rolled_out = migrated.rollout(&exec, &UbuntuServer, ROUTING).await.unwrap();
    assert!(exec.ran("docker rm -f api-production"));
    assert!(exec.ran("docker run -d --name api-production"));
    assert!(exec.ran("--env-file '.env'"));
    assert!(exec.ran("sudo tee /etc/nginx/conf.d/flotilla.conf"));
    assert!(exec.ran("sudo systemctl reload nginx"));

    let verified = rolled_out
        .verify(&exec, Duration::from_secs(5), Duration::from_secs(120), &mut cancel)
        .await
        .unwrap();
    verified.finish(&exec).await;
    assert!(exec.ran(&format!("rm -f '{backup_path}'")));
}

#[tokio::test]
async fn first_deploy_skips_backup() {
    // No previous container: the existence probe fails.
    let exec = MockExecutor::new(vec![("> /dev/null 2>&1", 1, "")]);

    let built = Attempt::new(entry(), None).build(&exec, "/srv/api").await.unwrap();
    let backed_up = built.backup(&exec, &NodeFramework).await.unwrap();

    assert!(backed_up.backup().is_none());
    assert!(!exec.ran("pg_dump"));
}

#[tokio::test]
async fn backup_failure_is_fatal_before_any_mutation() {
    let exec = MockExecutor::new(vec![("pg_dump", 1, "")]);

    let built = Attempt::new(entry(), None).build(&exec, "/srv/api").await.unwrap();
    let (_, error) = built.backup(&exec, &NodeFramework).await.unwrap_err();

    assert!(error.to_string().contains("nothing was mutated"));
    assert!(!exec.ran("npm run migrate --if-present"));
    assert!(!exec.ran("docker run -d"));
}

#[tokio::test]
async fn no_pending_migrations_skip_backup_and_migrate() {
    // The pending probe finds nothing to run.
    let exec = MockExecutor::new(vec![("migrate:status", 1, "")]);

    let migrated = Attempt::new(entry(), None)
        .build(&exec, "/srv/api")
        .await
        .unwrap()
        .backup(&exec, &LaravelFramework)
        .await
        .unwrap()
        .migrate(&exec, &LaravelFramework)
        .await
        .unwrap();

    assert!(migrated.backup().is_none());
    assert!(!exec.ran("mysqldump"));
    assert!(!exec.ran("php artisan migrate --force"));
}

#[tokio::test(start_paused = true)]
async fn crashed_container_fails_the_health_gate_and_keeps_the_backup() {
    let exec = MockExecutor::new(vec![("inspect -f", 0, "exited\n")]);
    let (_tx, mut cancel) = cancel_channel();

    let rolled_out = Attempt::new(entry(), None)
        .build(&exec, "/srv/api")
        .await
        .unwrap()
        .backup(&exec, &LaravelFramework)
        .await
        .unwrap()
        .migrate(&exec, &LaravelFramework)
        .await
        .unwrap()
        .rollout(&exec, &UbuntuServer, ROUTING)
        .await
        .unwrap();

    let (failed, error) = rolled_out
        .verify(&exec, Duration::ZERO, Duration::from_secs(120), &mut cancel)
        .await
        .unwrap_err();

    assert!(error.to_string().contains("exited"));
    // The backup survives the failure so the caller can restore.
    assert!(failed.backup().is_some());
}

#[tokio::test(start_paused = true)]
async fn verify_times_out_when_the_container_never_settles() {
    let exec = MockExecutor::new(vec![("inspect -f", 0, "created\n")]);
    let (_tx, mut cancel) = cancel_channel();

    let rolled_out = Attempt::new(entry(), None)
        .build(&exec, "/srv/api")
        .await
        .unwrap()
        .backup(&exec, &NodeFramework)
        .await
        .unwrap()
        .migrate(&exec, &NodeFramework)
        .await
        .unwrap()
        .rollout(&exec, &UbuntuServer, ROUTING)
        .await
        .unwrap();

    let (_, error) = rolled_out
        .verify(&exec, Duration::ZERO, Duration::from_secs(30), &mut cancel)
        .await
        .unwrap_err();

    assert!(error.to_string().contains("timed out"));
}

#[tokio::test(start_paused = true)]
async fn cancellation_fails_the_verify_gate() {
    let exec = MockExecutor::new(vec![("inspect -f", 0, "running\n")]);
    let (tx, mut cancel) = cancel_channel();
    tx.send(true).unwrap();

    let rolled_out = Attempt::new(entry(), None)
        .build(&exec, "/srv/api")
        .await
        .unwrap()
        .backup(&exec, &NodeFramework)
        .await
        .unwrap()
        .migrate(&exec, &NodeFramework)
        .await
        .unwrap()
        .rollout(&exec, &UbuntuServer, ROUTING)
        .await
        .unwrap();

    let (_, error) = rolled_out
        .verify(&exec, Duration::from_secs(5), Duration::from_secs(120), &mut cancel)
        .await
        .unwrap_err();

    assert!(matches!(error, DeployError::Cancelled));
}

#[tokio::test]
async fn migrate_failure_restores_from_the_backup() {
    let exec = MockExecutor::new(vec![("npm run migrate --if-present", 1, "")]);
    let locks = RolloutLocks::new();
    let (_tx, cancel) = cancel_channel();

    let failure = deploy_with(
        &exec,
        entry(),
        Some(".env".to_string()),
        "/srv/api",
        &UbuntuServer,
        &NodeFramework,
        ROUTING,
        &locks,
        &DeployOptions::default(),
        cancel,
    )
    .await
    .unwrap_err();

    assert_eq!(failure.phase, DeployPhase::Migrate);
    assert_eq!(failure.restored, Some(true));
    assert!(exec.ran("pg_dump"));
    assert!(exec.ran("psql \"$DATABASE_URL\" <"));
    // Nothing was rolled out after the failed migration.
    assert!(!exec.ran("docker run -d"));
    assert!(failure.to_string().contains("restored from backup"));
}

#[tokio::test]
async fn failed_restore_escalates_and_names_the_backup() {
    let exec = MockExecutor::new(vec![
        ("npm run migrate --if-present", 1, ""),
        ("psql", 1, ""),
    ]);
    let locks = RolloutLocks::new();
    let (_tx, cancel) = cancel_channel();

    let failure = deploy_with(
        &exec,
        entry(),
        None,
        "/srv/api",
        &UbuntuServer,
        &NodeFramework,
        ROUTING,
        &locks,
        &DeployOptions::default(),
        cancel,
    )
    .await
    .unwrap_err();

    assert_eq!(failure.restored, Some(false));
    match &failure.error {
        DeployError::RestoreFailed { backup_path, .. } => {
            assert!(backup_path.contains("api-production"));
        }
        other => panic!("expected RestoreFailed, got {other:?}"),
    }
    assert!(failure.error.to_string().contains("backup retained at"));
}

#[tokio::test]
async fn migrate_runs_in_a_one_off_container() {
    let exec = MockExecutor::new(vec![]);

    let migrated = Attempt::new(entry(), Some(".env.production".to_string()))
        .build(&exec, "/srv/api")
        .await
        .unwrap()
        .backup(&exec, &LaravelFramework)
        .await
        .unwrap()
        .migrate(&exec, &LaravelFramework)
        .await
        .unwrap();

    assert!(exec.ran("docker run --rm --env-file '.env.production'"));
    assert!(exec.ran("php artisan migrate --force"));
    assert!(migrated.backup().is_some());
}
