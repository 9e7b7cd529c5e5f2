use criterion::{Criterion, criterion_group, criterion_main};
use std::collections::BTreeMap;
use tokio::runtime::Runtime;
use tokio_util::sync::CancellationToken;
use tox_matrix::core::runner::HostEnv;
use tox_matrix::execution::{RunOptions, run_environment, run_matrix};
use tox_matrix::models::EnvironmentDescriptor;

fn descriptor(root: &std::path::Path, name: &str) -> EnvironmentDescriptor {
    EnvironmentDescriptor {
        name: name.to_string(),
        description: None,
        interpreter: "sh".to_string(),
        deps: vec!["bench-pkg".to_string()],
        setenv: BTreeMap::new(),
        passenv: vec![],
        commands: vec![vec!["echo".to_string(), "bench".to_string()]],
        skip_missing_interpreters: false,
        usedevelop: false,
        toxinidir: root.to_path_buf(),
        envdir: root.join(".tox").join(name),
        changedir: root.to_path_buf(),
        install_command: vec!["true".to_string(), "{packages}".to_string()],
        create_command: vec![],
        ignore_errors: false,
    }
}

fn bench_run_environment(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let root = tempfile::tempdir().unwrap();
    let options = RunOptions::new(HostEnv::capture());
    let env = descriptor(root.path(), "bench");

    // Warm the cache so iterations measure the cached path.
    rt.block_on(run_environment(&env, &options));

    c.bench_function("run_environment_cached", |b| {
        b.to_async(&rt).iter(|| async {
            let _ = run_environment(&env, &options).await;
        });
    });

    let envs: Vec<_> = (0..8)
        .map(|i| descriptor(root.path(), &format!("bench-{i}")))
        .collect();
    rt.block_on(run_matrix(envs.clone(), &options, CancellationToken::new()));

    c.bench_function("run_matrix_8_cached", |b| {
        b.to_async(&rt).iter(|| async {
            let _ = run_matrix(envs.clone(), &options, CancellationToken::new()).await;
        });
    });
}

criterion_group!(benches, bench_run_environment);
criterion_main!(benches);
