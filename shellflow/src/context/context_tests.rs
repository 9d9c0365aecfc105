use super::*;
use crate::cancellation::CancellationToken;
use crate::stages::{async_stage, chdir, echo, silent, stage_fn, BoxStage, Captured};
use crate::testing::{FailingStage, RecordingStage, SlowStage};
use crate::value::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[tokio::test]
async fn test_zero_stages_yield_nil() {
    let out = Shell::new().run(Vec::<BoxStage>::new()).await.unwrap();
    assert!(out.is_nil());
}

#[tokio::test]
async fn test_failure_stops_the_chain() {
    let before = RecordingStage::new("before");
    let after = RecordingStage::new("after");
    let err = Shell::new()
        .run([
            before.boxed(),
            FailingStage::boxed("boom", "exploded"),
            after.boxed(),
        ])
        .await
        .unwrap_err();

    assert_eq!(err.stage_index(), Some(1));
    assert_eq!(err.to_string(), "stage #1 (boom) failed: exploded");
    assert_eq!(before.call_count(), 1);
    assert_eq!(after.call_count(), 0);
}

#[tokio::test]
async fn test_explicit_next_runs_remainder_once() {
    let downstream = RecordingStage::new("downstream");
    let seen = Captured::<(usize, bool)>::new();
    let probe = seen.clone();
    let bracket = async_stage("bracket", move |ctx, input| {
        let probe = probe.clone();
        Box::pin(async move {
            let out = ctx.next(input).await?;
            probe.set((ctx.cursor(), ctx.has_next()));
            Ok(out)
        })
    });

    let out = Shell::new()
        .run([bracket, echo("inner"), downstream.boxed()])
        .await
        .unwrap();

    assert!(matches!(out, Value::Text(ref t) if t == "inner"));
    assert_eq!(downstream.call_count(), 1);
    assert_eq!(seen.get(), Some((3, false)));
}

#[tokio::test]
async fn test_next_past_the_end_returns_input() {
    let out = Shell::new()
        .run([async_stage("last", |ctx, _| {
            Box::pin(async move { ctx.next(Value::from("tail")).await })
        })])
        .await
        .unwrap();
    assert!(matches!(out, Value::Text(ref t) if t == "tail"));
}

#[tokio::test]
async fn test_cursor_and_len_are_visible_to_stages() {
    let seen = Captured::<Vec<(usize, usize)>>::new();
    let probe = seen.clone();
    let stage = move || {
        let probe = probe.clone();
        stage_fn("probe", move |ctx, input| {
            let mut positions = probe.take().unwrap_or_default();
            positions.push((ctx.cursor(), ctx.len()));
            probe.set(positions);
            Ok(input)
        })
    };

    Shell::new().run([stage(), stage()]).await.unwrap();
    assert_eq!(seen.get(), Some(vec![(1, 2), (2, 2)]));
}

#[test]
fn test_resolve_against_workdir() {
    let ctx = Shell::new()
        .with_workdir("/srv/app")
        .context(CancellationToken::new(), Vec::new());
    assert_eq!(ctx.resolve("logs/out.txt"), PathBuf::from("/srv/app/logs/out.txt"));
    assert_eq!(ctx.resolve("/etc/hosts"), PathBuf::from("/etc/hosts"));
    assert!(ctx.is_empty());
    assert!(!ctx.has_next());
}

#[test]
fn test_set_workdir_is_relative_to_current() {
    let mut ctx = Shell::new()
        .with_workdir("/srv")
        .context(CancellationToken::new(), Vec::new());
    ctx.set_workdir("app");
    assert_eq!(ctx.workdir(), Path::new("/srv/app"));
    ctx.set_workdir("/var");
    assert_eq!(ctx.workdir(), Path::new("/var"));
}

#[tokio::test]
async fn test_concurrent_runs_are_isolated() {
    let root = std::env::temp_dir();
    let shell = Shell::new().with_workdir("/");
    let changed = RecordingStage::new("changed");
    let untouched = RecordingStage::new("untouched");

    let (a, b) = tokio::join!(
        shell.run([chdir(root.clone()), silent(true), changed.boxed()]),
        shell.run([SlowStage::with_delay_ms(20), untouched.boxed()]),
    );
    a.unwrap();
    b.unwrap();

    let changed = changed.calls();
    assert_eq!(changed[0].workdir, root);
    assert!(changed[0].silent);

    let untouched = untouched.calls();
    assert_eq!(untouched[0].workdir, PathBuf::from("/"));
    assert!(!untouched[0].silent);
    assert_eq!(shell.workdir(), Path::new("/"));
    assert!(!shell.is_silent());
}

#[tokio::test]
async fn test_each_run_gets_a_fresh_id() {
    let ids = Captured::<Vec<uuid::Uuid>>::new();
    let probe = ids.clone();
    let shell = Shell::new();
    for _ in 0..2 {
        let probe = probe.clone();
        shell
            .run([stage_fn("id", move |ctx, input| {
                let mut seen = probe.take().unwrap_or_default();
                seen.push(ctx.run_id());
                probe.set(seen);
                Ok(input)
            })])
            .await
            .unwrap();
    }
    let ids = ids.get().unwrap();
    assert_eq!(ids.len(), 2);
    assert_ne!(ids[0], ids[1]);
}

#[tokio::test]
async fn test_cancelled_token_prevents_first_stage() {
    let token = CancellationToken::new();
    token.cancel("stop");
    let record = RecordingStage::new("record");
    let err = Shell::new()
        .run_with(token, [record.boxed()])
        .await
        .unwrap_err();
    assert!(err.is_cancelled());
    assert_eq!(err.stage_index(), Some(0));
    assert_eq!(record.call_count(), 0);
}

#[tokio::test]
async fn test_deadline_stops_before_next_stage() {
    let record = RecordingStage::new("record");
    let err = Shell::new()
        .with_timeout(Duration::from_millis(10))
        .run([SlowStage::with_delay_ms(50), record.boxed()])
        .await
        .unwrap_err();
    assert!(err.is_cancelled());
    assert_eq!(err.stage_index(), Some(1));
    assert_eq!(record.call_count(), 0);
}

#[test]
fn test_from_config_resolves_relative_workdir() {
    let cwd = std::env::current_dir().unwrap();
    let shell = Shell::from_config(
        &ShellConfig::new()
            .with_workdir("build")
            .with_silent(true)
            .with_trace(TraceMode::Off),
    )
    .unwrap();
    assert_eq!(shell.workdir(), cwd.join("build"));
    assert!(shell.is_silent());
}
