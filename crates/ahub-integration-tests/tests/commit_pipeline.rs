//! # Commit Pipeline
//!
//! Stage → reconcile → identity staging → push, under the workspace lock.

mod common;

use std::time::Duration;

use ahub_core::{AssetDraft, ErrorKind, FileStatus, Timestamp};
use common::{status, Fixture};

fn owned(refs: &[&str]) -> Vec<String> {
    refs.iter().map(|r| r.to_string()).collect()
}

#[tokio::test]
async fn commit_pushes_content_and_sidecars_together() {
    let fx = Fixture::new().await;
    let r = fx.resource("textures/r.png", b"r");
    fx.graph()
        .create("/assets/x.level", AssetDraft::with_main(&r))
        .await
        .unwrap();
    let asset_path = fx.path_of("/assets/x.level");
    fx.vcs.set_status(vec![
        status(FileStatus::New, &asset_path),
        status(FileStatus::New, "textures/r.png"),
    ]);
    fx.workspace.stage(&owned(&["/assets/x.level"])).await.unwrap();

    let outcome = fx.workspace.commit("add x", "main").await.unwrap();

    assert_eq!(outcome.commit_id, "commit-1");
    assert_eq!(outcome.commit_set.add_paths, vec![asset_path.clone(), "textures/r.png".into()]);
    let sidecar = fx.sidecar_of(&r);
    assert_eq!(outcome.identity_files.add_paths, vec![sidecar.clone()]);
    assert!(fx.exists(&sidecar));

    let pushes = fx.vcs.pushes();
    assert_eq!(pushes.len(), 1);
    assert_eq!(pushes[0].message, "add x");
    assert_eq!(pushes[0].branch, "main");
    assert_eq!(
        pushes[0].files.add_paths,
        vec![asset_path, "textures/r.png".to_string(), sidecar]
    );
    assert!(fx.workspace.staged().is_empty());
}

#[tokio::test]
async fn empty_commit_is_rejected_and_keeps_the_stage() {
    let fx = Fixture::new().await;
    fx.graph()
        .create("/assets/x.level", AssetDraft::default())
        .await
        .unwrap();
    fx.workspace.stage(&owned(&["/assets/x.level"])).await.unwrap();
    let err = fx.workspace.commit("nothing", "main").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PreconditionFailed);
    assert_eq!(fx.workspace.staged(), vec!["/assets/x.level"]);
    assert!(fx.vcs.pushes().is_empty());
}

#[tokio::test]
async fn identity_staging_is_idempotent_across_commits() {
    let fx = Fixture::new().await;
    let r = fx.resource("textures/r.png", b"r");
    fx.graph()
        .create("/assets/x.level", AssetDraft::with_main(&r))
        .await
        .unwrap();
    fx.vcs
        .set_status(vec![status(FileStatus::Modified, "textures/r.png")]);
    let sidecar = fx.sidecar_of(&r);

    fx.workspace.stage(&owned(&["/assets/x.level"])).await.unwrap();
    let first = fx.workspace.commit("first", "main").await.unwrap();
    assert_eq!(first.identity_files.add_paths, vec![sidecar.clone()]);
    let recorded = fx.graph().identity().get(&r).await.unwrap();

    fx.workspace.stage(&owned(&["/assets/x.level"])).await.unwrap();
    let second = fx.workspace.commit("second", "main").await.unwrap();
    assert!(second.identity_files.add_paths.is_empty());
    assert_eq!(second.identity_files.mod_paths, vec![sidecar]);
    assert_eq!(fx.graph().identity().get(&r).await.unwrap(), recorded);
}

#[tokio::test]
async fn deleted_resource_keeps_identity_while_shared() {
    let fx = Fixture::new().await;
    let r = fx.resource("textures/r.png", b"r");
    for reference in ["/assets/a.level", "/assets/b.level"] {
        fx.graph()
            .create(reference, AssetDraft::default().dependencies([r.clone()]))
            .await
            .unwrap();
    }
    fx.graph().identity().refresh(&r).await.unwrap();
    fx.remove("textures/r.png");
    fx.vcs
        .set_status(vec![status(FileStatus::Deleted, "textures/r.png")]);

    fx.workspace.stage(&owned(&["/assets/a.level"])).await.unwrap();
    let outcome = fx.workspace.commit("drop r from a", "main").await.unwrap();

    assert_eq!(outcome.commit_set.del_paths, vec!["textures/r.png"]);
    assert!(outcome.identity_files.is_empty());
    assert_eq!(outcome.preserved, vec![r.clone()]);
    assert!(fx.exists(&fx.sidecar_of(&r)));
}

#[tokio::test]
async fn deleted_resource_drops_identity_with_its_last_referrer() {
    let fx = Fixture::new().await;
    let r = fx.resource("textures/r.png", b"r");
    fx.graph()
        .create("/assets/a.level", AssetDraft::with_main(&r))
        .await
        .unwrap();
    let asset_path = fx.path_of("/assets/a.level");
    fx.vcs.commit_head(&asset_path, fx.read_asset("/assets/a.level"));
    fx.graph().identity().refresh(&r).await.unwrap();

    fx.graph().delete("/assets/a.level").await.unwrap();
    fx.remove("textures/r.png");
    fx.vcs.set_status(vec![
        status(FileStatus::Deleted, &asset_path),
        status(FileStatus::Deleted, "textures/r.png"),
    ]);

    fx.workspace.stage(&owned(&["/assets/a.level"])).await.unwrap();
    let outcome = fx.workspace.commit("remove a", "main").await.unwrap();

    let sidecar = fx.sidecar_of(&r);
    assert_eq!(outcome.identity_files.del_paths, vec![sidecar.clone()]);
    assert!(!fx.exists(&sidecar));
    assert_eq!(
        fx.vcs.pushes()[0].files.del_paths,
        vec![asset_path, "textures/r.png".to_string(), sidecar]
    );
}

#[tokio::test]
async fn rename_cascade_commits_new_old_and_referrer() {
    let fx = Fixture::new().await;
    fx.graph()
        .create("/assets/old.mesh", AssetDraft::default())
        .await
        .unwrap();
    fx.graph()
        .create(
            "/assets/level.level",
            AssetDraft::default().dependencies(["/assets/old.mesh"]),
        )
        .await
        .unwrap();
    let old = fx.graph().get_one("/assets/old.mesh").await.unwrap();
    fx.graph()
        .rename("/assets/old.mesh", "/assets/new.mesh", old.meta.modified)
        .await
        .unwrap();
    let level = fx.graph().get_one("/assets/level.level").await.unwrap();
    assert_eq!(level.dependencies, vec!["/assets/new.mesh"]);

    let (old_path, new_path, level_path) = (
        fx.path_of("/assets/old.mesh"),
        fx.path_of("/assets/new.mesh"),
        fx.path_of("/assets/level.level"),
    );
    fx.vcs.set_status(vec![
        status(FileStatus::Deleted, &old_path),
        status(FileStatus::New, &new_path),
        status(FileStatus::Modified, &level_path),
    ]);
    fx.workspace
        .stage(&owned(&[
            "/assets/old.mesh",
            "/assets/new.mesh",
            "/assets/level.level",
        ]))
        .await
        .unwrap();
    let outcome = fx.workspace.commit("rename", "main").await.unwrap();
    assert_eq!(outcome.commit_set.del_paths, vec![old_path]);
    assert_eq!(outcome.commit_set.add_paths, vec![new_path]);
    assert_eq!(outcome.commit_set.mod_paths, vec![level_path]);
}

#[tokio::test]
async fn mutations_fail_fast_while_a_commit_runs() {
    let fx = Fixture::new().await;
    let r = fx.resource("textures/r.png", b"r");
    fx.graph()
        .create("/assets/x.level", AssetDraft::with_main(&r))
        .await
        .unwrap();
    fx.vcs
        .set_status(vec![status(FileStatus::Modified, "textures/r.png")]);
    fx.workspace.stage(&owned(&["/assets/x.level"])).await.unwrap();
    fx.vcs.delay_status(Duration::from_millis(200));

    let (committed, staged, second_commit) = tokio::join!(
        fx.workspace.commit("slow", "main"),
        async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            fx.workspace.stage(&owned(&["/assets/y.level"])).await
        },
        async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            fx.workspace.commit("again", "main").await
        },
    );

    assert!(committed.is_ok());
    assert_eq!(staged.unwrap_err().kind(), ErrorKind::Locked);
    assert_eq!(second_commit.unwrap_err().kind(), ErrorKind::Locked);
    assert!(!fx.workspace.lock().is_locked());
    assert_eq!(fx.vcs.pushes().len(), 1);
}

#[tokio::test]
async fn commit_set_preview_does_not_take_the_lock() {
    let fx = Fixture::new().await;
    let _guard = fx.workspace.lock().try_acquire("commit").unwrap();
    assert!(fx.workspace.commit_set().await.unwrap().is_empty());
    assert!(fx.workspace.graph().all_refs().await.unwrap().is_empty());
}

#[tokio::test]
async fn stage_survives_reopening_the_workspace() {
    let fx = Fixture::new().await;
    fx.workspace
        .stage(&owned(&["/assets/b.level", "/assets/a.level", "/assets/b.level"]))
        .await
        .unwrap();
    let reopened = fx.reopen().await;
    assert_eq!(reopened.staged(), vec!["/assets/b.level", "/assets/a.level"]);
    reopened.unstage(&owned(&["/assets/b.level"])).await.unwrap();
    reopened.clear_stage().await.unwrap();
    assert!(fx.reopen().await.staged().is_empty());
}

#[tokio::test]
async fn history_and_branches_pass_through() {
    let fx = Fixture::new().await;
    let r = fx.resource("textures/r.png", b"r");
    fx.graph()
        .create("/assets/x.level", AssetDraft::with_main(&r))
        .await
        .unwrap();
    let asset_path = fx.path_of("/assets/x.level");
    fx.vcs
        .set_status(vec![status(FileStatus::New, &asset_path)]);
    fx.workspace.stage(&owned(&["/assets/x.level"])).await.unwrap();
    fx.workspace.commit("add x", "main").await.unwrap();

    let history = fx
        .workspace
        .history(Some("/assets/x.level"), None, Some(10))
        .await
        .unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].message, "add x");
    assert!(history[0].created_at <= Timestamp::now());

    fx.workspace.create_branch("feature").await.unwrap();
    fx.workspace.change_branch("feature").await.unwrap();
    assert_eq!(fx.workspace.current_branch().await.unwrap(), "feature");
    assert_eq!(fx.workspace.branches().await.unwrap().locals.len(), 2);
    assert!(fx.workspace.graph().get_one("/assets/x.level").await.is_ok());
    let err = fx.workspace.delete_branch("missing").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    assert_eq!(
        fx.workspace.project_id().await.unwrap(),
        "example.com/studio/game"
    );
}
