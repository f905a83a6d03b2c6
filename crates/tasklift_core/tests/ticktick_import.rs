use rusqlite::Connection;
use tasklift_core::db::open_db_in_memory;
use tasklift_core::repo::task_repo::{SqliteTaskRepository, TaskRepository};
use tasklift_core::{MigrationError, MigrationService, MigratorRegistry, RelationKind, TaskRecord};
use uuid::Uuid;

const BACKUP: &str = include_str!("fixtures/ticktick_backup.csv");

fn count(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM {table};"), [], |row| row.get(0))
        .unwrap()
}

fn list_tasks(conn: &Connection, user: Uuid) -> Vec<(String, Vec<TaskRecord>)> {
    let repo = SqliteTaskRepository::try_new(conn).unwrap();
    let namespaces = repo.list_namespaces(user).unwrap();
    assert_eq!(namespaces.len(), 1);
    assert_eq!(namespaces[0].title, "Migrated from TickTick");
    repo.list_lists(namespaces[0].id)
        .unwrap()
        .into_iter()
        .map(|list| (list.title, repo.list_tasks(list.id).unwrap()))
        .collect()
}

#[test]
fn backup_is_imported_end_to_end() {
    let conn = open_db_in_memory().unwrap();
    let registry = MigratorRegistry::with_builtin();
    let user = Uuid::new_v4();

    let summary = MigrationService::new(&conn)
        .migrate_by_name(&registry, user, "ticktick", BACKUP.as_bytes())
        .unwrap();
    assert_eq!(summary.lists, 2);
    assert_eq!(summary.tasks, 4);
    assert_eq!(summary.labels, 5);
    assert_eq!(summary.relations, 1);

    let lists = list_tasks(&conn, user);
    let titles: Vec<(&str, Vec<&str>)> = lists
        .iter()
        .map(|(list, tasks)| {
            (
                list.as_str(),
                tasks.iter().map(|task| task.title.as_str()).collect(),
            )
        })
        .collect();
    assert_eq!(
        titles,
        vec![
            ("Home", vec!["Call plumber", "Water plants"]),
            ("Work", vec!["Collect figures", "Write quarterly report"]),
        ]
    );

    let (_, work) = &lists[1];
    let figures = &work[0];
    let report = &work[1];
    assert!(figures.done);
    assert!(!report.done);
    assert_eq!(report.priority, 5);
    assert_eq!(report.description, "Outline first\nthen draft");
    assert_eq!(report.due_date, Some(1_676_048_400_000));
    assert_eq!(report.end_date, report.due_date);

    let repo = SqliteTaskRepository::try_new(&conn).unwrap();
    assert_eq!(
        repo.task_reminders(report.id).unwrap(),
        vec![1_676_044_800_000]
    );
    let figures_due = figures.due_date.unwrap();
    assert_eq!(
        repo.task_reminders(figures.id).unwrap(),
        vec![figures_due - 45 * 60_000]
    );

    let edges = repo.task_relations(figures.id).unwrap();
    assert_eq!(edges.len(), 1);
    assert_eq!(edges[0].other_task_id, report.id);
    assert_eq!(edges[0].kind, RelationKind::ParentTask);
    assert_eq!(
        repo.task_relations(report.id).unwrap()[0].kind,
        RelationKind::Subtask
    );

    let (_, home) = &lists[0];
    let plumber = &home[0];
    let plants = &home[1];
    assert!(plumber.done);
    let plumber_due = plumber.due_date.unwrap();
    assert_eq!(
        repo.task_reminders(plumber.id).unwrap(),
        vec![plumber_due - 15 * 60_000, plumber_due]
    );
    assert!(repo.task_reminders(plants.id).unwrap().is_empty());
    assert_eq!(plants.repeat.as_deref(), Some("RRULE:FREQ=WEEKLY;INTERVAL=1"));
    assert!(repo.task_relations(plants.id).unwrap().is_empty());

    let plumber_labels: Vec<String> = repo
        .task_labels(plumber.id)
        .unwrap()
        .into_iter()
        .map(|label| label.title)
        .collect();
    assert_eq!(plumber_labels, vec!["home".to_string(), "urgent".to_string()]);

    let status = MigrationService::new(&conn)
        .status(user, "ticktick")
        .unwrap()
        .unwrap();
    assert!(status.completed);
}

#[test]
fn malformed_record_aborts_whole_import() {
    let conn = open_db_in_memory().unwrap();
    let registry = MigratorRegistry::with_builtin();
    let user = Uuid::new_v4();
    let broken = BACKUP.replace("2023-02-08T12:00:00+0000", "someday");

    let err = MigrationService::new(&conn)
        .migrate_by_name(&registry, user, "ticktick", broken.as_bytes())
        .unwrap_err();
    match err {
        MigrationError::MalformedInput(parse) => {
            assert_eq!(parse.record, 10);
            assert_eq!(parse.field, "Due Date");
            assert_eq!(parse.value, "someday");
        }
        other => panic!("unexpected error: {other}"),
    }

    for table in ["namespaces", "lists", "tasks", "labels", "migration_status"] {
        assert_eq!(count(&conn, table), 0, "{table} should be empty");
    }

    MigrationService::new(&conn)
        .migrate_by_name(&registry, user, "ticktick", BACKUP.as_bytes())
        .unwrap();
    assert_eq!(count(&conn, "tasks"), 4);
}

#[test]
fn completed_migration_is_rejected_before_parsing() {
    let conn = open_db_in_memory().unwrap();
    let registry = MigratorRegistry::with_builtin();
    let user = Uuid::new_v4();
    let service = MigrationService::new(&conn);

    service
        .migrate_by_name(&registry, user, "ticktick", BACKUP.as_bytes())
        .unwrap();
    let err = service
        .migrate_by_name(&registry, user, "ticktick", b"not a csv \"export")
        .unwrap_err();

    assert_eq!(err.code(), "already_migrated");
    assert_eq!(count(&conn, "namespaces"), 1);
}

#[test]
fn unknown_service_is_reported() {
    let conn = open_db_in_memory().unwrap();
    let registry = MigratorRegistry::with_builtin();

    let err = MigrationService::new(&conn)
        .migrate_by_name(&registry, Uuid::new_v4(), "wunderlist", BACKUP.as_bytes())
        .unwrap_err();

    assert!(matches!(err, MigrationError::UnknownService(ref name) if name == "wunderlist"));
    assert_eq!(count(&conn, "namespaces"), 0);
}

#[test]
fn status_is_absent_before_first_run() {
    let conn = open_db_in_memory().unwrap();
    let status = MigrationService::new(&conn)
        .status(Uuid::new_v4(), "ticktick")
        .unwrap();
    assert!(status.is_none());
}
