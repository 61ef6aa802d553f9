//! End-to-end behaviour of the offline cache over in-memory fakes

mod common;

use bridge_traits::{SongId, UserId};
use bytes::Bytes;
use common::{image_url, FakeHttp, TestContext};
use core_auth::SessionUser;
use core_offline::{OfflineStatus, PlaybackResolver, UNKNOWN_ARTIST};
use std::sync::Arc;
use std::time::Duration;

fn song(id: &str) -> SongId {
    SongId::from(id)
}

fn user(id: &str) -> UserId {
    UserId::from(id)
}

#[tokio::test]
async fn test_download_list_offline_delete_scenario() {
    let ctx = TestContext::new();
    ctx.catalog.add_user("artist-1", Some("Ana"));
    ctx.seed_song("s1", "artist-1", b"audio-one", None);
    ctx.seed_song("s2", "artist-1", b"audio-two", None);

    assert!(ctx.download("s1", "u1").await);
    let listed = ctx.store.list_by_user(&user("u1")).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, song("s1"));
    assert_eq!(listed[0].artista, "Ana");
    assert!(listed[0].file_size > 0);

    ctx.connectivity.set_online(false);
    assert!(!ctx.download("s2", "u1").await);
    assert_eq!(ctx.store.list_by_user(&user("u1")).await.unwrap().len(), 1);

    ctx.store.delete(&song("s1")).await.unwrap();
    assert!(ctx.store.list_by_user(&user("u1")).await.unwrap().is_empty());
    assert_eq!(ctx.store.get_audio_blob(&song("s1")).await.unwrap(), None);
}

#[tokio::test]
async fn test_offline_download_makes_no_calls() {
    let ctx = TestContext::new();
    ctx.seed_song("s1", "artist-1", b"audio", Some(&b"img"[..]));
    ctx.connectivity.set_online(false);

    assert!(!ctx.download("s1", "u1").await);
    assert_eq!(ctx.catalog.calls(), 0);
    assert_eq!(ctx.http.calls(), 0);
    assert!(ctx.store.get_song(&song("s1")).await.unwrap().is_none());
}

#[tokio::test]
async fn test_unauthenticated_download_makes_no_calls() {
    let ctx = TestContext::new();
    ctx.seed_song("s1", "artist-1", b"audio", None);
    ctx.session.sign_out();

    assert!(!ctx.download("s1", "u1").await);
    assert_eq!(ctx.catalog.calls(), 0);
    assert_eq!(ctx.http.calls(), 0);
}

#[tokio::test]
async fn test_aborted_write_leaves_nothing_behind() {
    let ctx = TestContext::new();
    ctx.seed_song("s1", "artist-1", b"audio", Some(&b"img"[..]));

    let pool = ctx.store.pool().await.unwrap();
    sqlx::query(
        "CREATE TRIGGER quota_exceeded BEFORE INSERT ON offline_audio \
         WHEN NEW.song_id = 's1' BEGIN SELECT RAISE(ABORT, 'quota exceeded'); END",
    )
    .execute(pool)
    .await
    .unwrap();

    assert!(!ctx.download("s1", "u1").await);
    assert!(ctx.store.get_song(&song("s1")).await.unwrap().is_none());
    assert!(ctx.store.get_audio_blob(&song("s1")).await.unwrap().is_none());
    assert!(ctx.store.get_image_blob(&song("s1")).await.unwrap().is_none());
    assert!(!ctx.orchestrator.is_downloading(&song("s1")));
}

#[tokio::test]
async fn test_listings_are_isolated_per_user() {
    let ctx = TestContext::new();
    ctx.seed_song("s1", "artist-1", b"a", None);
    ctx.seed_song("s2", "artist-1", b"b", None);

    assert!(ctx.download("s1", "u1").await);
    ctx.session.sign_in(core_auth::SessionUser::new("u2"));
    assert!(ctx.download("s2", "u2").await);

    let u1: Vec<_> = ctx.store.list_by_user(&user("u1")).await.unwrap();
    let u2: Vec<_> = ctx.store.list_by_user(&user("u2")).await.unwrap();
    assert_eq!(u1.iter().map(|s| s.id.clone()).collect::<Vec<_>>(), vec![song("s1")]);
    assert_eq!(u2.iter().map(|s| s.id.clone()).collect::<Vec<_>>(), vec![song("s2")]);
}

#[tokio::test]
async fn test_listing_is_newest_first() {
    let ctx = TestContext::new();
    for id in ["a", "b", "c"] {
        ctx.seed_song(id, "artist-1", b"x", None);
        assert!(ctx.download(id, "u1").await);
        ctx.clock.advance(chrono::Duration::seconds(10));
    }

    let ids: Vec<_> = ctx
        .store
        .list_by_user(&user("u1"))
        .await
        .unwrap()
        .into_iter()
        .map(|s| s.id.to_string())
        .collect();
    assert_eq!(ids, vec!["c", "b", "a"]);
}

#[tokio::test]
async fn test_missing_image_still_stores_song() {
    let ctx = TestContext::new();
    ctx.catalog.add_song("s1", "artist-1", true);
    ctx.http.serve(common::audio_url("s1"), 200, b"audio");
    ctx.http.serve(image_url("s1"), 500, b"");

    assert!(ctx.download("s1", "u1").await);
    let stored = ctx.store.get_song(&song("s1")).await.unwrap().unwrap();
    assert_eq!(stored.file_size, 5);
    assert_eq!(stored.imagen_url, Some(image_url("s1")));
    assert!(ctx.store.get_image_blob(&song("s1")).await.unwrap().is_none());
}

#[tokio::test]
async fn test_file_size_counts_audio_and_image() {
    let ctx = TestContext::new();
    ctx.seed_song("s1", "artist-1", &[7u8; 1000], Some(&[1u8; 24][..]));

    assert!(ctx.download("s1", "u1").await);
    let stored = ctx.store.get_song(&song("s1")).await.unwrap().unwrap();
    assert_eq!(stored.file_size, 1024);
}

#[tokio::test]
async fn test_artist_falls_back_to_sentinel() {
    let ctx = TestContext::new();
    ctx.seed_song("s1", "ghost", b"a", None);
    ctx.catalog.add_user("artist-2", Some("Luis"));
    ctx.seed_song("s2", "artist-2", b"b", None);
    ctx.catalog.fail_user_lookups();

    assert!(ctx.download("s1", "u1").await);
    assert!(ctx.download("s2", "u1").await);
    for id in ["s1", "s2"] {
        let stored = ctx.store.get_song(&song(id)).await.unwrap().unwrap();
        assert_eq!(stored.artista, UNKNOWN_ARTIST);
    }
}

#[tokio::test]
async fn test_redownload_keeps_single_record() {
    let ctx = TestContext::new();
    ctx.seed_song("s1", "artist-1", b"first", Some(&b"cover"[..]));
    assert!(ctx.download("s1", "u1").await);

    ctx.clock.advance(chrono::Duration::minutes(1));
    ctx.http.serve(common::audio_url("s1"), 200, b"second-take");
    assert!(ctx.download("s1", "u1").await);

    let listed = ctx.store.list_by_user(&user("u1")).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].file_size, 16);
    assert_eq!(
        ctx.store.get_audio_blob(&song("s1")).await.unwrap(),
        Some(Bytes::from_static(b"second-take"))
    );
}

#[tokio::test]
async fn test_delete_removes_all_parts() {
    let ctx = TestContext::new();
    ctx.seed_song("s1", "artist-1", b"audio", Some(&b"img"[..]));
    assert!(ctx.download("s1", "u1").await);

    assert!(ctx.store.delete(&song("s1")).await.unwrap());
    assert!(ctx.store.get_song(&song("s1")).await.unwrap().is_none());
    assert!(ctx.store.get_audio_blob(&song("s1")).await.unwrap().is_none());
    assert!(ctx.store.get_image_blob(&song("s1")).await.unwrap().is_none());
}

/// Records are keyed by song id, so a second user downloading the same song
/// takes the record over and it leaves the first user's list.
#[tokio::test]
async fn test_redownload_by_another_user_moves_ownership() {
    let ctx = TestContext::new();
    ctx.seed_song("s1", "artist-1", b"audio", Some(&b"img"[..]));
    assert!(ctx.download("s1", "u1").await);

    ctx.session.sign_in(SessionUser::new("u2"));
    assert!(ctx.download("s1", "u2").await);

    assert!(ctx.store.list_by_user(&user("u1")).await.unwrap().is_empty());
    let listed = ctx.store.list_by_user(&user("u2")).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].usuario_id, user("u2"));
    assert_eq!(ctx.store.usage_for_user(&user("u1")).await.unwrap().song_count, 0);
    assert_eq!(ctx.store.usage_for_user(&user("u2")).await.unwrap().total_bytes, 8);
    assert!(ctx.store.get_image_blob(&song("s1")).await.unwrap().is_some());
}

#[tokio::test]
async fn test_status_reports_in_flight_download() {
    let ctx = TestContext::with_http(FakeHttp::gated());
    ctx.seed_song("s1", "artist-1", b"audio", None);

    let orchestrator = ctx.orchestrator.clone();
    let task = tokio::spawn(async move {
        orchestrator
            .download_song(&SongId::from("s1"), &UserId::from("u1"))
            .await
    });

    tokio::time::timeout(Duration::from_secs(2), async {
        while !ctx.orchestrator.is_downloading(&song("s1")) {
            tokio::task::yield_now().await;
        }
    })
    .await
    .unwrap();
    assert_eq!(
        ctx.orchestrator.status(&song("s1"), &user("u1")).await,
        OfflineStatus::Downloading
    );
    assert_eq!(ctx.orchestrator.downloading_ids(), vec![song("s1")]);
    // u1's in-flight download is not reported to anyone else.
    assert_eq!(
        ctx.orchestrator.status(&song("s1"), &user("u2")).await,
        OfflineStatus::NotDownloaded
    );
    assert!(!ctx.orchestrator.is_downloading_for(&song("s1"), &user("u2")));

    ctx.http.release(8);
    assert!(task.await.unwrap());
    assert_eq!(
        ctx.orchestrator.status(&song("s1"), &user("u1")).await,
        OfflineStatus::Downloaded
    );
}

/// The downloading mark does not serialize requests: both run and the last
/// commit wins, leaving one record.
#[tokio::test]
async fn test_concurrent_duplicate_downloads_last_write_wins() {
    let ctx = TestContext::new();
    ctx.seed_song("s1", "artist-1", b"audio", None);

    let (first, second) = tokio::join!(ctx.download("s1", "u1"), ctx.download("s1", "u1"));
    assert!(first && second);
    assert_eq!(ctx.catalog.calls(), 4);
    assert_eq!(ctx.store.list_by_user(&user("u1")).await.unwrap().len(), 1);
    assert!(ctx.orchestrator.downloading_ids().is_empty());
}

#[tokio::test]
async fn test_playback_handle_released_after_ttl() {
    let ctx = TestContext::new();
    ctx.seed_song("s1", "artist-1", b"audio", Some(&b"img"[..]));
    assert!(ctx.download("s1", "u1").await);

    let resolver = PlaybackResolver::new(ctx.store.clone(), Duration::from_millis(50));
    let url = resolver.play_offline_song(&song("s1")).await.unwrap();
    let opened = resolver.open(&url).unwrap();
    assert_eq!(opened.data, Bytes::from_static(b"audio"));
    assert_eq!(opened.content_type, "audio/mpeg");

    let cover = resolver.get_offline_image_url(&song("s1")).await.unwrap();
    assert_eq!(resolver.open(&cover).unwrap().content_type, "image/jpeg");

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(resolver.open(&url).is_none());
    // Plain handles wait for an explicit release or sweep.
    assert!(resolver.open(&cover).is_some());
    assert_eq!(resolver.sweep_expired(), 1);
    assert!(resolver.registry().is_empty());
}

#[tokio::test]
async fn test_playback_of_missing_song_is_none() {
    let ctx = TestContext::new();
    let resolver = PlaybackResolver::new(ctx.store.clone(), Duration::from_secs(300));

    assert!(resolver.get_offline_audio_url(&song("nope")).await.is_none());
    assert!(resolver.play_offline_song(&song("nope")).await.is_none());
    assert!(resolver.registry().is_empty());
}
