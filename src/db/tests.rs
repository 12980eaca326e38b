use super::*;
use crate::domain::state::TaskState;
use crate::task_id;

fn unique_db_path() -> String {
    std::env::temp_dir()
        .join(format!("taskdeck-db-{}.sqlite", task_id::fresh_id()))
        .display()
        .to_string()
}

fn cleanup_db_files(path: &str) {
    for suffix in ["", "-wal", "-shm"] {
        let candidate = format!("{path}{suffix}");
        let _ = std::fs::remove_file(candidate);
    }
}

fn schema_object_exists(conn: &Connection, kind: &str, name: &str) -> bool {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type=?1 AND name=?2)",
            params![kind, name],
            |row| row.get(0),
        )
        .expect("schema object query should be readable");
    exists == 1
}

fn sample_task(id: &str) -> CanonicalTask {
    CanonicalTask {
        id: id.to_string(),
        body: "water the plants".to_string(),
        state: TaskState::Open,
        priority_adjustment: None,
        created_utc: "2026-02-20T10:15:30Z".to_string(),
        modified_utc: "2026-02-20T10:15:30Z".to_string(),
        due_utc: None,
        closed_utc: None,
        metadata: None,
        user: "casey".to_string(),
    }
}

#[test]
fn configures_connection_pragmas() {
    let path = unique_db_path();
    let conn = open_connection(&path).expect("connection should open");

    let journal_mode: String = conn
        .query_row("PRAGMA journal_mode;", [], |row| row.get(0))
        .expect("journal_mode pragma should be readable");
    assert_eq!(journal_mode.to_uppercase(), "WAL");

    let synchronous: i64 = conn
        .query_row("PRAGMA synchronous;", [], |row| row.get(0))
        .expect("synchronous pragma should be readable");
    assert_eq!(synchronous, 1);

    let foreign_keys: i64 = conn
        .query_row("PRAGMA foreign_keys;", [], |row| row.get(0))
        .expect("foreign_keys pragma should be readable");
    assert_eq!(foreign_keys, 1);

    let temp_store: i64 = conn
        .query_row("PRAGMA temp_store;", [], |row| row.get(0))
        .expect("temp_store pragma should be readable");
    assert_eq!(temp_store, 2);

    let busy_timeout: i64 = conn
        .query_row("PRAGMA busy_timeout;", [], |row| row.get(0))
        .expect("busy_timeout pragma should be readable");
    assert_eq!(busy_timeout, 5000);

    cleanup_db_files(&path);
}

#[test]
fn initializes_schema_objects_and_version() {
    let path = unique_db_path();
    let conn = open_connection(&path).expect("connection should open");

    let objects = [
        ("table", "schema_migrations"),
        ("table", "meta"),
        ("table", "tasks"),
        ("table", "task_tags"),
        ("table", "task_notes"),
        ("view", "tasks_view"),
        ("trigger", "tasks_modified_after_update"),
        ("trigger", "tasks_closed_after_update"),
        ("trigger", "tasks_reopened_after_update"),
        ("trigger", "tasks_closed_after_insert"),
        ("trigger", "tasks_reopened_after_insert"),
    ];
    for (kind, name) in objects {
        assert!(
            schema_object_exists(&conn, kind, name),
            "expected {} '{}' to exist",
            kind,
            name
        );
    }

    let schema_version: String = conn
        .query_row(
            "SELECT value FROM meta WHERE key = 'schema_version'",
            [],
            |row| row.get(0),
        )
        .expect("schema version should be stored in meta table");
    assert_eq!(schema_version, CURRENT_SCHEMA_VERSION.to_string());

    cleanup_db_files(&path);
}

#[test]
fn reapplies_migrations_idempotently() {
    let path = unique_db_path();
    let conn_first = open_connection(&path).expect("first open should initialize schema");
    drop(conn_first);

    let conn_second = open_connection(&path).expect("second open should be idempotent");
    let applied_count: i64 = conn_second
        .query_row("SELECT COUNT(*) FROM schema_migrations", [], |row| {
            row.get(0)
        })
        .expect("schema_migrations count should be queryable");
    assert_eq!(applied_count, CURRENT_SCHEMA_VERSION);

    cleanup_db_files(&path);
}

#[test]
fn stores_and_reads_back_a_task() {
    let path = unique_db_path();
    let conn = open_connection(&path).expect("connection should open");

    let mut task = sample_task("01arz3ndektsv4rrffq69g5fav");
    task.priority_adjustment = Some(1.5);
    task.due_utc = Some("2026-03-01T00:00:00Z".to_string());
    let mut metadata = serde_json::Map::new();
    metadata.insert("origin".to_string(), serde_json::Value::String("inbox".to_string()));
    task.metadata = Some(metadata);
    insert_task(&conn, &task).expect("insert should succeed");

    let stored = get_task(&conn, &task.id)
        .expect("lookup should succeed")
        .expect("task should exist");
    assert_eq!(stored.id, task.id);
    assert_eq!(stored.body, "water the plants");
    assert_eq!(stored.state, "open");
    assert_eq!(stored.priority_adjustment, Some(1.5));
    assert_eq!(stored.due_utc.as_deref(), Some("2026-03-01T00:00:00Z"));
    assert_eq!(stored.closed_utc, None);
    assert_eq!(stored.metadata.as_deref(), Some(r#"{"origin":"inbox"}"#));
    assert_eq!(stored.user, "casey");

    assert!(get_task(&conn, "01bx5zzkbkactav9wevgemmvrz")
        .expect("lookup should succeed")
        .is_none());

    cleanup_db_files(&path);
}

#[test]
fn duplicate_tags_are_rejected_by_the_schema() {
    let path = unique_db_path();
    let conn = open_connection(&path).expect("connection should open");

    let task = sample_task("01arz3ndektsv4rrffq69g5fav");
    insert_task(&conn, &task).expect("insert should succeed");
    insert_tag(&conn, &task.id, "garden").expect("first tag should insert");
    assert!(insert_tag(&conn, &task.id, "garden").is_err());

    assert_eq!(
        task_tags(&conn, &task.id).expect("tags should be readable"),
        vec!["garden".to_string()]
    );

    cleanup_db_files(&path);
}

#[test]
fn notes_read_back_in_id_order() {
    let path = unique_db_path();
    let conn = open_connection(&path).expect("connection should open");

    let task = sample_task("01arz3ndektsv4rrffq69g5fav");
    insert_task(&conn, &task).expect("insert should succeed");
    insert_note(&conn, "01bx5zzkbkactav9wevgemmvrz", &task.id, "second").expect("note");
    insert_note(&conn, "01bb5zzkbkactav9wevgemmvrz", &task.id, "first").expect("note");

    let notes = task_notes(&conn, &task.id).expect("notes should be readable");
    let ids: Vec<&str> = notes.iter().map(|note| note.id.as_str()).collect();
    assert_eq!(
        ids,
        ["01bb5zzkbkactav9wevgemmvrz", "01bx5zzkbkactav9wevgemmvrz"]
    );

    cleanup_db_files(&path);
}

#[test]
fn an_update_that_keeps_modified_gets_it_recomputed() {
    let path = unique_db_path();
    let conn = open_connection(&path).expect("connection should open");

    let task = sample_task("01arz3ndektsv4rrffq69g5fav");
    insert_task(&conn, &task).expect("insert should succeed");

    let mut edited = task.clone();
    edited.body = "water the plants twice".to_string();
    update_task(&conn, &edited).expect("update should succeed");

    let stored = get_task(&conn, &task.id)
        .expect("lookup should succeed")
        .expect("task should exist");
    assert_eq!(stored.body, "water the plants twice");
    assert_ne!(stored.modified_utc, task.modified_utc);
    assert_eq!(stored.modified_utc.len(), 20);
    assert!(stored.modified_utc.ends_with('Z'));

    cleanup_db_files(&path);
}

#[test]
fn an_update_that_changes_modified_keeps_the_written_value() {
    let path = unique_db_path();
    let conn = open_connection(&path).expect("connection should open");

    let task = sample_task("01arz3ndektsv4rrffq69g5fav");
    insert_task(&conn, &task).expect("insert should succeed");

    let mut edited = task.clone();
    edited.modified_utc = "2026-02-21T09:30:00Z".to_string();
    update_task(&conn, &edited).expect("update should succeed");

    let stored = get_task(&conn, &task.id)
        .expect("lookup should succeed")
        .expect("task should exist");
    assert_eq!(stored.modified_utc, "2026-02-21T09:30:00Z");

    cleanup_db_files(&path);
}

#[test]
fn closing_copies_the_statements_modified_value_until_refreshed() {
    let path = unique_db_path();
    let conn = open_connection(&path).expect("connection should open");

    let task = sample_task("01arz3ndektsv4rrffq69g5fav");
    insert_task(&conn, &task).expect("insert should succeed");

    // A closing update that pins modified to its stored value: the modified
    // trigger recomputes the column, but the closed trigger still copies the
    // pinned value it saw in the statement.
    let mut closing = task.clone();
    closing.state = TaskState::Done;
    update_task(&conn, &closing).expect("update should succeed");

    let stale = get_task(&conn, &task.id)
        .expect("lookup should succeed")
        .expect("task should exist");
    assert_eq!(stale.closed_utc.as_deref(), Some(task.modified_utc.as_str()));
    assert_ne!(stale.modified_utc, task.modified_utc);

    // A second update carrying a fresh modified value repairs closed.
    refresh_modified(&conn, &task.id, "2026-03-01T12:00:00Z").expect("refresh should succeed");
    let repaired = get_task(&conn, &task.id)
        .expect("lookup should succeed")
        .expect("task should exist");
    assert_eq!(repaired.modified_utc, "2026-03-01T12:00:00Z");
    assert_eq!(repaired.closed_utc.as_deref(), Some("2026-03-01T12:00:00Z"));

    cleanup_db_files(&path);
}

#[test]
fn reopening_clears_the_closed_time() {
    let path = unique_db_path();
    let conn = open_connection(&path).expect("connection should open");

    let mut task = sample_task("01arz3ndektsv4rrffq69g5fav");
    task.state = TaskState::Done;
    task.closed_utc = Some("2026-02-22T00:00:00Z".to_string());
    insert_task(&conn, &task).expect("insert should succeed");

    let mut reopened = task.clone();
    reopened.state = TaskState::Open;
    reopened.modified_utc = "2026-02-23T00:00:00Z".to_string();
    update_task(&conn, &reopened).expect("update should succeed");

    let stored = get_task(&conn, &task.id)
        .expect("lookup should succeed")
        .expect("task should exist");
    assert_eq!(stored.state, "open");
    assert_eq!(stored.closed_utc, None);

    cleanup_db_files(&path);
}

#[test]
fn inserting_a_closed_task_derives_closed_from_modified() {
    let path = unique_db_path();
    let conn = open_connection(&path).expect("connection should open");

    let mut derived = sample_task("01arz3ndektsv4rrffq69g5fav");
    derived.state = TaskState::Obsolete;
    insert_task(&conn, &derived).expect("insert should succeed");
    let stored = get_task(&conn, &derived.id)
        .expect("lookup should succeed")
        .expect("task should exist");
    assert_eq!(
        stored.closed_utc.as_deref(),
        Some(derived.modified_utc.as_str())
    );

    let mut explicit = sample_task("01bx5zzkbkactav9wevgemmvrz");
    explicit.state = TaskState::Done;
    explicit.closed_utc = Some("2026-02-25T08:00:00Z".to_string());
    insert_task(&conn, &explicit).expect("insert should succeed");
    let stored = get_task(&conn, &explicit.id)
        .expect("lookup should succeed")
        .expect("task should exist");
    assert_eq!(stored.closed_utc.as_deref(), Some("2026-02-25T08:00:00Z"));

    cleanup_db_files(&path);
}

#[test]
fn inserting_an_open_task_drops_a_supplied_closed_time() {
    let path = unique_db_path();
    let conn = open_connection(&path).expect("connection should open");

    // Importers can hand over contradictory rows, e.g. a record carrying a
    // closed timestamp next to a non-terminal state. The insert trigger
    // keeps closed_utc aligned with the state, like the update path does.
    let mut task = sample_task("01arz3ndektsv4rrffq69g5fav");
    task.closed_utc = Some("2026-02-22T00:00:00Z".to_string());
    insert_task(&conn, &task).expect("insert should succeed");

    let stored = get_task(&conn, &task.id)
        .expect("lookup should succeed")
        .expect("task should exist");
    assert_eq!(stored.state, "open");
    assert_eq!(stored.closed_utc, None);

    let mut waiting = sample_task("01bx5zzkbkactav9wevgemmvrz");
    waiting.state = TaskState::Waiting;
    waiting.closed_utc = Some("2026-02-22T00:00:00Z".to_string());
    insert_task(&conn, &waiting).expect("insert should succeed");
    let stored = get_task(&conn, &waiting.id)
        .expect("lookup should succeed")
        .expect("task should exist");
    assert_eq!(stored.closed_utc, None);

    cleanup_db_files(&path);
}

#[test]
fn view_columns_match_the_declared_order() {
    let path = unique_db_path();
    let conn = open_connection(&path).expect("connection should open");

    let mut stmt = conn
        .prepare("SELECT name FROM pragma_table_info('tasks_view')")
        .expect("table_info should prepare");
    let mut rows = stmt.query([]).expect("table_info should run");
    let mut names: Vec<String> = Vec::new();
    while let Some(row) = rows.next().expect("table_info rows should read") {
        names.push(row.get(0).expect("column name should read"));
    }
    assert_eq!(names, TASK_VIEW_COLUMNS);

    cleanup_db_files(&path);
}

#[test]
fn view_rows_sort_by_id_and_join_tags() {
    let path = unique_db_path();
    let conn = open_connection(&path).expect("connection should open");

    let second = sample_task("01bx5zzkbkactav9wevgemmvrz");
    insert_task(&conn, &second).expect("insert should succeed");
    let first = sample_task("01arz3ndektsv4rrffq69g5fav");
    insert_task(&conn, &first).expect("insert should succeed");
    insert_tag(&conn, &first.id, "urgent").expect("tag should insert");
    insert_tag(&conn, &first.id, "garden").expect("tag should insert");

    let rows = list_view_rows(&conn).expect("view should be readable");
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].id, first.id);
    assert_eq!(rows[1].id, second.id);

    let mut tags: Vec<&str> = rows[0]
        .tags
        .as_deref()
        .expect("tagged task should have a tags column")
        .split(',')
        .collect();
    tags.sort_unstable();
    assert_eq!(tags, ["garden", "urgent"]);
    assert_eq!(rows[1].tags, None);

    cleanup_db_files(&path);
}

#[test]
fn apply_writes_degrades_tag_and_note_failures_to_warnings() {
    let path = unique_db_path();
    let conn = open_connection(&path).expect("connection should open");

    let task = sample_task("01arz3ndektsv4rrffq69g5fav");
    insert_task(&conn, &task).expect("insert should succeed");
    insert_tag(&conn, &task.id, "garden").expect("tag should insert");

    let mut edited = task.clone();
    edited.body = "water the plants twice".to_string();
    let writes = vec![
        TaskWrite::UpdateTask(edited),
        TaskWrite::AddTag {
            task_id: task.id.clone(),
            tag: "garden".to_string(),
        },
        TaskWrite::AddTag {
            task_id: task.id.clone(),
            tag: "home".to_string(),
        },
        TaskWrite::AddNote {
            id: "01bx5zzkbkactav9wevgemmvrz".to_string(),
            task_id: task.id.clone(),
            body: "bought a new can".to_string(),
        },
    ];

    let warnings = apply_writes(&conn, &writes).expect("writes should apply");
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].contains("tag 'garden' not recorded"));

    let stored = get_task(&conn, &task.id)
        .expect("lookup should succeed")
        .expect("task should exist");
    assert_eq!(stored.body, "water the plants twice");
    assert_eq!(
        task_tags(&conn, &task.id).expect("tags should be readable"),
        vec!["garden".to_string(), "home".to_string()]
    );
    assert_eq!(
        task_notes(&conn, &task.id)
            .expect("notes should be readable")
            .len(),
        1
    );

    cleanup_db_files(&path);
}
