use criterion::{black_box, criterion_group, criterion_main, Criterion};
use patchkit::{apply, parse, ApplyOptions};
use tempfile::tempdir;

fn many_hunk_patch(files: usize) -> String {
    let mut out = String::new();
    for i in 0..files {
        out.push_str(&format!(
            "--- a/file{i}.txt\n+++ b/file{i}.txt\n@@ -1,3 +1,3 @@\n context line\n-old line {i}\n+new line {i}\n trailing context\n"
        ));
    }
    out
}

fn bench_parse(c: &mut Criterion) {
    let diff = many_hunk_patch(200);
    c.bench_function("parse_200_file_patch", |b| {
        b.iter(|| parse(black_box(diff.as_bytes())).unwrap())
    });
}

fn bench_apply(c: &mut Criterion) {
    let diff = many_hunk_patch(50);
    let set = parse(diff.as_bytes()).unwrap();
    let dir = tempdir().unwrap();
    for i in 0..50 {
        std::fs::write(
            dir.path().join(format!("file{i}.txt")),
            format!("context line\nold line {i}\ntrailing context\n"),
        )
        .unwrap();
    }
    let opts = ApplyOptions::new(dir.path());

    c.bench_function("apply_50_files", |b| {
        b.iter(|| {
            for i in 0..50 {
                std::fs::write(
                    dir.path().join(format!("file{i}.txt")),
                    format!("context line\nold line {i}\ntrailing context\n"),
                )
                .unwrap();
            }
            apply(black_box(&set), black_box(&opts)).unwrap()
        })
    });
}

criterion_group!(benches, bench_parse, bench_apply);
criterion_main!(benches);
