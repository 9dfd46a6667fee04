//! Tests for the suggestion workflow: intake, apply with conflict
//! policies, rejection, and the path-guard backstop.

use std::path::{Path, PathBuf};
use tempfile::TempDir;

use shelf::extract::Extract;
use shelf::models::{OperationOutcome, OrganizationStatus};
use shelf::mover::ConflictPolicy;
use shelf::pipeline::Pipeline;
use shelf::{config, db, migrate, organize, store};

struct PlainText;

impl Extract for PlainText {
    fn extract(&self, path: &Path) -> Option<String> {
        std::fs::read_to_string(path).ok()
    }
}

async fn setup_with_file(name: &str, content: &str) -> (TempDir, PathBuf, sqlx::SqlitePool, i64) {
    let tmp = TempDir::new().unwrap();
    let root = config::init_repository(tmp.path()).unwrap();
    let pool = db::connect(&config::db_path(&root)).await.unwrap();
    migrate::run_migrations(&pool).await.unwrap();

    std::fs::write(root.join(name), content).unwrap();
    let pipeline = Pipeline::new(&PlainText);
    let (copy, _) = pipeline
        .process_file(&pool, &root, Path::new(name), false)
        .await
        .unwrap();
    let copy_id = copy.unwrap().id;
    (tmp, root, pool, copy_id)
}

#[tokio::test]
async fn apply_moves_file_and_records_history() {
    let (_tmp, root, pool, copy_id) = setup_with_file("a.pdf", "invoice 2024").await;

    store::upsert_pending_operation(
        &pool,
        copy_id,
        "Finance/2024",
        "invoice.pdf",
        "yearly invoice",
        0.95,
        "hash-1",
    )
    .await
    .unwrap();

    organize::run_apply(&root, None, ConflictPolicy::Skip)
        .await
        .unwrap();

    assert!(!root.join("a.pdf").exists());
    assert_eq!(
        std::fs::read_to_string(root.join("Finance/2024/invoice.pdf")).unwrap(),
        "invoice 2024"
    );

    let copy = store::copy(&pool, copy_id).await.unwrap();
    assert_eq!(copy.file_path, "Finance/2024/invoice.pdf");
    assert_eq!(copy.organization_status, OrganizationStatus::Organized);

    // Pending queue drained, history written with the original location
    assert!(store::pending_operation_for_copy(&pool, copy_id)
        .await
        .unwrap()
        .is_none());
    let ops = store::operations_for_copy(&pool, copy_id).await.unwrap();
    assert_eq!(ops.len(), 1);
    assert_eq!(ops[0].outcome, OperationOutcome::Applied);
    assert_eq!(ops[0].original_file_path, "a.pdf");
    assert_eq!(ops[0].final_file_path.as_deref(), Some("Finance/2024/invoice.pdf"));
}

#[tokio::test]
async fn conflicting_target_is_skipped_not_fatal() {
    let (_tmp, root, pool, copy_id) = setup_with_file("a.pdf", "new").await;

    std::fs::create_dir_all(root.join("Docs")).unwrap();
    std::fs::write(root.join("Docs/taken.pdf"), "old").unwrap();

    store::upsert_pending_operation(&pool, copy_id, "Docs", "taken.pdf", "r", 0.5, "h")
        .await
        .unwrap();

    organize::run_apply(&root, None, ConflictPolicy::Skip)
        .await
        .unwrap();

    // Both files untouched, suggestion still pending
    assert_eq!(std::fs::read_to_string(root.join("a.pdf")).unwrap(), "new");
    assert_eq!(
        std::fs::read_to_string(root.join("Docs/taken.pdf")).unwrap(),
        "old"
    );
    assert!(store::pending_operation_for_copy(&pool, copy_id)
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn overwrite_policy_replaces_existing_target() {
    let (_tmp, root, pool, copy_id) = setup_with_file("a.pdf", "new").await;

    std::fs::create_dir_all(root.join("Docs")).unwrap();
    std::fs::write(root.join("Docs/taken.pdf"), "old").unwrap();

    store::upsert_pending_operation(&pool, copy_id, "Docs", "taken.pdf", "r", 0.5, "h")
        .await
        .unwrap();

    organize::run_apply(&root, None, ConflictPolicy::Overwrite)
        .await
        .unwrap();

    assert!(!root.join("a.pdf").exists());
    assert_eq!(
        std::fs::read_to_string(root.join("Docs/taken.pdf")).unwrap(),
        "new"
    );
    let copy = store::copy(&pool, copy_id).await.unwrap();
    assert_eq!(copy.file_path, "Docs/taken.pdf");
    assert_eq!(copy.organization_status, OrganizationStatus::Organized);
    let ops = store::operations_for_copy(&pool, copy_id).await.unwrap();
    assert_eq!(ops[0].original_file_path, "a.pdf");
}

#[tokio::test]
async fn overwrite_onto_tracked_target_replaces_its_copy_record() {
    let tmp = TempDir::new().unwrap();
    let root = config::init_repository(tmp.path()).unwrap();
    let pool = db::connect(&config::db_path(&root)).await.unwrap();
    migrate::run_migrations(&pool).await.unwrap();

    std::fs::write(root.join("a.txt"), "new content").unwrap();
    std::fs::create_dir_all(root.join("Docs")).unwrap();
    std::fs::write(root.join("Docs/b.txt"), "old content").unwrap();

    let pipeline = Pipeline::new(&PlainText);
    let (copy_a, _) = pipeline
        .process_file(&pool, &root, Path::new("a.txt"), false)
        .await
        .unwrap();
    let (copy_b, _) = pipeline
        .process_file(&pool, &root, Path::new("Docs/b.txt"), false)
        .await
        .unwrap();
    let copy_a = copy_a.unwrap();
    let copy_b = copy_b.unwrap();

    store::upsert_pending_operation(&pool, copy_a.id, "Docs", "b.txt", "dedupe", 0.9, "h")
        .await
        .unwrap();

    organize::run_apply(&root, None, ConflictPolicy::Overwrite)
        .await
        .unwrap();

    assert!(!root.join("a.txt").exists());
    assert_eq!(
        std::fs::read_to_string(root.join("Docs/b.txt")).unwrap(),
        "new content"
    );

    // The moved copy owns the target path; the overwritten file's record
    // is gone, along with the document it was the last copy of
    let repository_path = root.to_string_lossy().into_owned();
    let at_target = store::find_copy(&pool, &repository_path, "Docs/b.txt")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(at_target.id, copy_a.id);
    assert_eq!(at_target.organization_status, OrganizationStatus::Organized);
    assert!(store::copy(&pool, copy_b.id).await.is_err());

    let counts = store::repository_counts(&pool, &repository_path)
        .await
        .unwrap();
    assert_eq!(counts.copies, 1);
    assert_eq!(counts.documents, 1);
    assert!(store::pending_operation_for_copy(&pool, copy_a.id)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn ignoring_a_file_drops_its_pending_suggestion() {
    let (_tmp, root, pool, copy_id) = setup_with_file("a.pdf", "data").await;

    store::upsert_pending_operation(&pool, copy_id, "Docs", "a.pdf", "r", 0.5, "h")
        .await
        .unwrap();

    shelf::mark::run_ignore(&root, &root.join("a.pdf"))
        .await
        .unwrap();

    let copy = store::copy(&pool, copy_id).await.unwrap();
    assert_eq!(copy.organization_status, OrganizationStatus::Ignored);
    assert!(store::pending_operation_for_copy(&pool, copy_id)
        .await
        .unwrap()
        .is_none());

    // Nothing left for apply to act on: the file stays where it is
    organize::run_apply(&root, None, ConflictPolicy::Overwrite)
        .await
        .unwrap();
    assert!(root.join("a.pdf").exists());
    let copy = store::copy(&pool, copy_id).await.unwrap();
    assert_eq!(copy.file_path, "a.pdf");
}

#[cfg(unix)]
#[tokio::test]
async fn apply_through_symlinked_root_stores_relative_path() {
    let tmp = TempDir::new().unwrap();
    let real = tmp.path().join("repo");
    std::fs::create_dir_all(&real).unwrap();
    let real = config::init_repository(&real).unwrap();
    let link = tmp.path().join("link");
    std::os::unix::fs::symlink(&real, &link).unwrap();

    // Every call uses the symlinked root, as a library caller might
    let pool = db::connect(&config::db_path(&link)).await.unwrap();
    migrate::run_migrations(&pool).await.unwrap();
    std::fs::write(link.join("a.txt"), "data").unwrap();

    let pipeline = Pipeline::new(&PlainText);
    let (copy, _) = pipeline
        .process_file(&pool, &link, Path::new("a.txt"), false)
        .await
        .unwrap();
    let copy_id = copy.unwrap().id;

    store::upsert_pending_operation(&pool, copy_id, "Docs", "a.txt", "r", 0.5, "h")
        .await
        .unwrap();
    organize::run_apply(&link, None, ConflictPolicy::Skip)
        .await
        .unwrap();

    let copy = store::copy(&pool, copy_id).await.unwrap();
    assert_eq!(copy.file_path, "Docs/a.txt");
    assert!(real.join("Docs/a.txt").is_file());
}

#[tokio::test]
async fn rename_policy_lands_at_a_free_sibling() {
    let (_tmp, root, pool, copy_id) = setup_with_file("a.pdf", "new").await;

    std::fs::create_dir_all(root.join("Docs")).unwrap();
    std::fs::write(root.join("Docs/taken.pdf"), "old").unwrap();

    store::upsert_pending_operation(&pool, copy_id, "Docs", "taken.pdf", "r", 0.5, "h")
        .await
        .unwrap();

    organize::run_apply(&root, None, ConflictPolicy::Rename)
        .await
        .unwrap();

    assert_eq!(
        std::fs::read_to_string(root.join("Docs/taken_1.pdf")).unwrap(),
        "new"
    );
    let copy = store::copy(&pool, copy_id).await.unwrap();
    assert_eq!(copy.file_path, "Docs/taken_1.pdf");
    let ops = store::operations_for_copy(&pool, copy_id).await.unwrap();
    assert_eq!(ops[0].final_file_path.as_deref(), Some("Docs/taken_1.pdf"));
}

#[tokio::test]
async fn unsafe_suggestion_is_dismissed_and_nothing_moves() {
    let (_tmp, root, pool, copy_id) = setup_with_file("a.pdf", "data").await;

    // Bypass intake validation to simulate a bad row already in the queue
    store::upsert_pending_operation(&pool, copy_id, "../../etc", "passwd", "r", 0.5, "h")
        .await
        .unwrap();

    organize::run_apply(&root, None, ConflictPolicy::Skip)
        .await
        .unwrap();

    assert!(root.join("a.pdf").exists());
    assert!(store::pending_operation_for_copy(&pool, copy_id)
        .await
        .unwrap()
        .is_none());
    let ops = store::operations_for_copy(&pool, copy_id).await.unwrap();
    assert_eq!(ops.len(), 1);
    assert_eq!(ops[0].outcome, OperationOutcome::Dismissed);

    let copy = store::copy(&pool, copy_id).await.unwrap();
    assert_eq!(copy.file_path, "a.pdf");
    assert_eq!(copy.organization_status, OrganizationStatus::Unorganized);
}

#[tokio::test]
async fn reject_dismisses_without_touching_files() {
    let (_tmp, root, pool, copy_id) = setup_with_file("a.pdf", "data").await;

    store::upsert_pending_operation(&pool, copy_id, "Docs", "a.pdf", "r", 0.5, "h")
        .await
        .unwrap();

    organize::run_reject(&root, None).await.unwrap();

    assert!(root.join("a.pdf").exists());
    assert!(store::pending_operation_for_copy(&pool, copy_id)
        .await
        .unwrap()
        .is_none());
    let ops = store::operations_for_copy(&pool, copy_id).await.unwrap();
    assert_eq!(ops.len(), 1);
    assert_eq!(ops[0].outcome, OperationOutcome::Dismissed);
    assert!(ops[0].final_file_path.is_none());
}

#[tokio::test]
async fn suggest_replaces_previous_suggestion_for_same_copy() {
    let (_tmp, root, pool, copy_id) = setup_with_file("a.pdf", "data").await;

    organize::run_suggest(
        &root,
        &root.join("a.pdf"),
        "First",
        "a.pdf",
        "first idea",
        0.5,
        None,
    )
    .await
    .unwrap();
    organize::run_suggest(
        &root,
        &root.join("a.pdf"),
        "Second",
        "a.pdf",
        "better idea",
        0.8,
        None,
    )
    .await
    .unwrap();

    let pending = store::pending_operation_for_copy(&pool, copy_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(pending.suggested_directory_path, "Second");
    assert_eq!(pending.confidence, 0.8);
}

#[tokio::test]
async fn suggest_rejects_untracked_file_and_bad_components() {
    let (_tmp, root, _pool, _copy_id) = setup_with_file("a.pdf", "data").await;

    std::fs::write(root.join("untracked.pdf"), "x").unwrap();
    assert!(organize::run_suggest(
        &root,
        &root.join("untracked.pdf"),
        "Docs",
        "u.pdf",
        "r",
        0.5,
        None,
    )
    .await
    .is_err());

    assert!(organize::run_suggest(
        &root,
        &root.join("a.pdf"),
        "../escape",
        "a.pdf",
        "r",
        0.5,
        None,
    )
    .await
    .is_err());

    assert!(organize::run_suggest(
        &root,
        &root.join("a.pdf"),
        "Docs",
        "a.pdf",
        "r",
        1.5,
        None,
    )
    .await
    .is_err());
}

#[tokio::test]
async fn ignored_copies_can_be_unmarked() {
    let (_tmp, root, pool, copy_id) = setup_with_file("a.pdf", "data").await;

    shelf::mark::run_ignore(&root, &root.join("a.pdf"))
        .await
        .unwrap();
    let copy = store::copy(&pool, copy_id).await.unwrap();
    assert_eq!(copy.organization_status, OrganizationStatus::Ignored);

    shelf::mark::run_unmark(&root, &root.join("a.pdf"))
        .await
        .unwrap();
    let copy = store::copy(&pool, copy_id).await.unwrap();
    assert_eq!(copy.organization_status, OrganizationStatus::Unorganized);
}
