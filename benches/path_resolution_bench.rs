//! Benchmarks for target resolution and workspace path flattening.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::fs;
use tempfile::TempDir;
use vdi_collector::extraction::{resolve, Workspace};
use vdi_collector::filesystem::HostDirView;
use vdi_collector::security::{flatten_parent_path, sanitize_component};

/// Benchmark wildcard expansion against profile directories of varying count
fn bench_resolve(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolve");

    for profiles in [10usize, 200] {
        let temp_dir = TempDir::new().unwrap();
        for i in 0..profiles {
            fs::create_dir_all(temp_dir.path().join(format!("Users/user{}.V2", i))).unwrap();
        }
        fs::create_dir_all(temp_dir.path().join("Users/Public")).unwrap();
        let mut view = HostDirView::new(temp_dir.path()).unwrap();

        group.bench_with_input(BenchmarkId::new("users_wildcard", profiles), &profiles, |b, _| {
            b.iter(|| resolve(&mut view, black_box("Users/*/AppData/Local/Microsoft/Edge/User Data/Default/History")))
        });
    }

    group.finish();
}

/// Benchmark destination mapping for evidence paths
fn bench_destinations(c: &mut Criterion) {
    let mut group = c.benchmark_group("destinations");
    let temp_dir = TempDir::new().unwrap();
    let workspace = Workspace::create(temp_dir.path()).unwrap();

    let paths = [
        ("shallow", "/Windows/Prefetch/CMD.EXE-4A81B364.pf"),
        ("deep", "/Users/alice.V2/AppData/Roaming/Microsoft/Windows/PowerShell/PSReadLine/ConsoleHost_history.txt"),
        ("hostile", "/Users/a:b/<x>|y/..\\..\\evil?.txt"),
    ];

    for (name, path) in paths {
        group.bench_with_input(BenchmarkId::new("destination_for", name), path, |b, path| {
            b.iter(|| workspace.destination_for(black_box(path)))
        });
    }

    group.bench_function("flatten_parent_path", |b| {
        b.iter(|| flatten_parent_path(black_box("/Windows/System32/winevt/Logs")))
    });
    group.bench_function("sanitize_component", |b| {
        b.iter(|| sanitize_component(black_box("report<draft>:v2?.docx")))
    });

    group.finish();
}

criterion_group!(benches, bench_resolve, bench_destinations);
criterion_main!(benches);
