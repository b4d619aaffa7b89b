//! Editor operation sequences keep the filesystem state consistent

use pybox::{FileSystemState, Language, MissionFile, VfsError};

fn project() -> FileSystemState {
    FileSystemState::from_mission(&[
        MissionFile::entry("main.py", "print('hi')\n"),
        MissionFile::new("utils.py", "X = 1\n"),
        MissionFile::new("notes.md", "# notes\n"),
    ])
}

#[test]
fn test_invariants_hold_through_an_editing_session() {
    let mut state = project();
    state.check_invariants().unwrap();

    let steps: Vec<Box<dyn Fn(&FileSystemState) -> FileSystemState>> = vec![
        Box::new(|s| s.open_file("/utils.py")),
        Box::new(|s| s.open_file("/notes.md")),
        Box::new(|s| s.create_file("extra.py", "/").unwrap()),
        Box::new(|s| s.update_file("/extra.py", "Y = 2\n")),
        Box::new(|s| s.set_active_file("/utils.py")),
        Box::new(|s| s.close_file("/utils.py")),
        Box::new(|s| s.rename_file("/extra.py", "renamed.py")),
        Box::new(|s| s.delete_file("/notes.md")),
        Box::new(|s| s.open_file("/missing.py")),
        Box::new(|s| s.delete_file("/renamed.py")),
        Box::new(|s| s.close_file("/main.py")),
    ];

    for step in &steps {
        state = step(&state);
        state.check_invariants().unwrap();
    }
    assert!(state.open_files().is_empty());
    assert!(state.active_file().is_none());
    assert_eq!(state.len(), 2);
}

#[test]
fn test_open_is_idempotent() {
    let once = project().open_file("/utils.py");
    let twice = once.open_file("/utils.py");
    assert_eq!(once, twice);
}

#[test]
fn test_close_then_open_restores_active_without_duplicates() {
    let state = project().open_file("/utils.py");
    let reopened = state.close_file("/utils.py").open_file("/utils.py");
    assert_eq!(reopened.active_file(), Some("/utils.py"));
    assert_eq!(
        reopened
            .open_files()
            .iter()
            .filter(|p| p.as_str() == "/utils.py")
            .count(),
        1
    );
}

#[test]
fn test_deleting_active_file_never_dangles() {
    let state = project().open_file("/utils.py").delete_file("/utils.py");
    assert_eq!(state.active_file(), Some("/main.py"));
    state.check_invariants().unwrap();

    let emptied = state.delete_file("/main.py");
    assert!(emptied.active_file().is_none());
    emptied.check_invariants().unwrap();
}

#[test]
fn test_rename_preserves_content_and_modified_flag() {
    let state = project().update_file("/utils.py", "X = 2\n");
    let renamed = state.rename_file("/utils.py", "helpers.txt");

    let file = renamed.file("/helpers.txt").unwrap();
    assert_eq!(file.content, "X = 2\n");
    assert!(file.is_modified);
    assert_eq!(file.language, Language::PlainText);
    assert!(!renamed.contains("/utils.py"));
}

#[test]
fn test_update_round_trip() {
    let state = project();
    let updated = state.update_file("/main.py", "print('bye')\n");
    assert_eq!(updated.file("/main.py").unwrap().content, "print('bye')\n");
    assert!(updated.file("/main.py").unwrap().is_modified);
    // The earlier value is untouched
    assert_eq!(state.file("/main.py").unwrap().content, "print('hi')\n");
}

#[test]
fn test_duplicate_create_is_rejected() {
    let err = project().create_file("main.py", "/").unwrap_err();
    assert_eq!(err, VfsError::DuplicatePath("/main.py".to_string()));
}

#[test]
fn test_snapshot_restore_marks_changed_files() {
    let edited = project().update_file("/utils.py", "X = 99\n");
    let snapshot = edited.snapshot();

    let restored = project().restore(&snapshot);
    assert_eq!(restored.file("/utils.py").unwrap().content, "X = 99\n");
    assert!(restored.file("/utils.py").unwrap().is_modified);
    assert!(!restored.file("/main.py").unwrap().is_modified);
}
