//! Integration tests for target resolution and extraction over an exported
//! filesystem tree.

use std::fs;
use std::path::Path;

use anyhow::Result;
use tempfile::TempDir;
use walkdir::WalkDir;

use vdi_collector::extraction::{resolve_and_extract, CancelToken, Workspace};
use vdi_collector::filesystem::HostDirView;

const CHUNK: usize = 4;

fn build_tree(base: &Path) -> Result<()> {
    fs::create_dir_all(base.join("Windows/Prefetch/Nested"))?;
    fs::create_dir_all(base.join("Windows/System32/winevt/Logs"))?;
    fs::create_dir_all(base.join("Users/Alice/Desktop"))?;
    fs::create_dir_all(base.join("Users/Bob/Desktop"))?;
    fs::create_dir_all(base.join("Users/Public/Desktop"))?;
    fs::create_dir_all(base.join("Users/Default/Desktop"))?;
    fs::create_dir_all(base.join("Users/$Recycle.Bin"))?;

    fs::write(base.join("Windows/Prefetch/CMD.EXE-4A81B364.pf"), b"prefetch one")?;
    fs::write(base.join("Windows/Prefetch/Nested/DEEP.pf"), b"deep")?;
    fs::write(base.join("Windows/Prefetch/$Secure"), b"metadata")?;
    fs::write(base.join("Windows/System32/winevt/Logs/Security.evtx"), b"ElfFile")?;
    fs::write(base.join("Users/Alice/Desktop/notes.txt"), b"alice notes")?;
    fs::write(base.join("Users/Bob/Desktop/report.docx"), b"bob report")?;
    fs::write(base.join("Users/Public/Desktop/shared.lnk"), b"public")?;
    fs::write(base.join("Users/notes.txt"), b"not a profile")?;
    Ok(())
}

fn workspace_files(root: &Path) -> Vec<String> {
    let mut files: Vec<String> = WalkDir::new(root)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| {
            entry
                .path()
                .strip_prefix(root)
                .map(|p| p.to_string_lossy().replace('\\', "/"))
                .unwrap_or_default()
        })
        .collect();
    files.sort();
    files
}

#[test]
fn test_wildcard_expands_user_profiles_only() -> Result<()> {
    let evidence = TempDir::new()?;
    build_tree(evidence.path())?;
    let output = TempDir::new()?;

    let mut view = HostDirView::new(evidence.path())?;
    let workspace = Workspace::create(output.path().join("VDI-01_vhd"))?;
    let results = resolve_and_extract(&mut view, &workspace, "Users/*/Desktop", CHUNK, &CancelToken::new());

    let mut paths: Vec<&str> = results.iter().map(|r| r.path.as_str()).collect();
    paths.sort();
    assert_eq!(paths, vec!["/Users/$Recycle.Bin/Desktop", "/Users/Alice/Desktop", "/Users/Bob/Desktop"]);

    let alice = results.iter().find(|r| r.user == "Alice").unwrap();
    assert!(alice.success);
    assert_eq!(alice.message, "1 files extracted, 0 failed");

    // A profile folder without the target is a failed result, not an error
    let recycle = results.iter().find(|r| r.user == "$Recycle.Bin").unwrap();
    assert!(!recycle.success);
    assert_eq!(recycle.message, "not found");

    assert_eq!(
        workspace_files(workspace.root()),
        vec!["Users_Alice_Desktop/notes.txt", "Users_Bob_Desktop/report.docx"]
    );
    Ok(())
}

#[test]
fn test_directory_target_flattens_each_parent() -> Result<()> {
    let evidence = TempDir::new()?;
    build_tree(evidence.path())?;
    let output = TempDir::new()?;

    let mut view = HostDirView::new(evidence.path())?;
    let workspace = Workspace::create(output.path())?;
    let results = resolve_and_extract(&mut view, &workspace, "\\Windows\\Prefetch", CHUNK, &CancelToken::new());

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].user, "System");
    assert_eq!(results[0].message, "2 files extracted, 0 failed");
    assert_eq!(
        workspace_files(workspace.root()),
        vec!["Windows_Prefetch/CMD.EXE-4A81B364.pf", "Windows_Prefetch_Nested/DEEP.pf"]
    );
    Ok(())
}

#[test]
fn test_file_target_and_missing_target() -> Result<()> {
    let evidence = TempDir::new()?;
    build_tree(evidence.path())?;
    let output = TempDir::new()?;

    let mut view = HostDirView::new(evidence.path())?;
    let workspace = Workspace::create(output.path())?;
    let cancel = CancelToken::new();

    let evtx = resolve_and_extract(
        &mut view,
        &workspace,
        "Windows/System32/winevt/Logs/Security.evtx",
        CHUNK,
        &cancel,
    );
    assert!(evtx[0].success);
    assert_eq!(evtx[0].message, "7 bytes extracted");

    let missing = resolve_and_extract(&mut view, &workspace, "Windows/System32/config/SAM", CHUNK, &cancel);
    assert_eq!(missing.len(), 1);
    assert!(!missing[0].success);
    assert_eq!(missing[0].path, "/Windows/System32/config/SAM");

    let copied = fs::read(workspace.root().join("Windows_System32_winevt_Logs/Security.evtx"))?;
    assert_eq!(copied, b"ElfFile");
    assert!(!workspace_files(workspace.root()).iter().any(|f| f.ends_with(".partial")));
    Ok(())
}

#[test]
fn test_unsupported_wildcard_and_missing_users() -> Result<()> {
    let evidence = TempDir::new()?;
    fs::create_dir_all(evidence.path().join("Windows"))?;
    let output = TempDir::new()?;

    let mut view = HostDirView::new(evidence.path())?;
    let workspace = Workspace::create(output.path())?;
    let cancel = CancelToken::new();

    let bad = resolve_and_extract(&mut view, &workspace, "Windows/*/config", CHUNK, &cancel);
    assert_eq!(bad.len(), 1);
    assert!(bad[0].message.contains("unsupported wildcard"));

    let no_users = resolve_and_extract(&mut view, &workspace, "Users/*/NTUSER.DAT", CHUNK, &cancel);
    assert_eq!(no_users.len(), 1);
    assert!(!no_users[0].success);
    assert_eq!(no_users[0].user, "System");
    Ok(())
}

#[test]
fn test_rerun_produces_identical_workspace() -> Result<()> {
    let evidence = TempDir::new()?;
    build_tree(evidence.path())?;
    let output = TempDir::new()?;
    let cancel = CancelToken::new();

    let mut snapshots = Vec::new();
    for _ in 0..2 {
        let mut view = HostDirView::new(evidence.path())?;
        let workspace = Workspace::create(output.path())?;
        for template in ["Windows/Prefetch", "Users/*/Desktop"] {
            resolve_and_extract(&mut view, &workspace, template, CHUNK, &cancel);
        }

        let snapshot: Vec<(String, Vec<u8>)> = workspace_files(workspace.root())
            .into_iter()
            .map(|name| {
                let bytes = fs::read(workspace.root().join(&name)).unwrap_or_default();
                (name, bytes)
            })
            .collect();
        snapshots.push(snapshot);
    }

    assert_eq!(snapshots[0], snapshots[1]);
    assert_eq!(snapshots[0].len(), 4);
    Ok(())
}

#[test]
fn test_cancelled_token_extracts_nothing() -> Result<()> {
    let evidence = TempDir::new()?;
    build_tree(evidence.path())?;
    let output = TempDir::new()?;

    let cancel = CancelToken::new();
    cancel.cancel();

    let mut view = HostDirView::new(evidence.path())?;
    let workspace = Workspace::create(output.path())?;
    let results = resolve_and_extract(&mut view, &workspace, "Windows/Prefetch", CHUNK, &cancel);

    assert!(!results[0].success);
    assert_eq!(results[0].message, "cancelled");
    assert!(workspace_files(workspace.root()).is_empty());
    Ok(())
}
