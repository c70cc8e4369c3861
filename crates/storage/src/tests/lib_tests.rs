use super::*;
use shared::display::DisplayOption;

async fn memory_storage() -> Storage {
    Storage::new("sqlite::memory:").await.expect("db")
}

#[tokio::test]
async fn health_check_succeeds_for_live_pool() {
    let storage = memory_storage().await;
    storage.health_check().await.expect("health check");
}

#[tokio::test]
async fn creates_database_file_when_missing() {
    let suffix = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    let temp_root = std::env::temp_dir().join(format!("bgtool_storage_test_{suffix}"));
    let db_path = temp_root.join("nested").join("storage.db");
    let database_url = format!("sqlite://{}", db_path.to_string_lossy().replace('\\', "/"));

    let storage = Storage::new(&database_url).await.expect("db");
    drop(storage);

    assert!(
        db_path.exists(),
        "database file should exist: {}",
        db_path.display()
    );

    std::fs::remove_dir_all(temp_root).expect("cleanup");
}

#[tokio::test]
async fn stored_endpoint_carries_owner_token_and_visibility() {
    let storage = memory_storage().await;
    let bob = storage.create_user("bob").await.expect("user");
    storage
        .set_profile(bob, Some("Bobby"), Some("https://cdn.example.com/bob.png"))
        .await
        .expect("profile");
    let stored_url = storage
        .set_endpoint(bob, "https://Bob.Example.com/api/v1/", Some("reader-1"))
        .await
        .expect("endpoint");
    assert_eq!(stored_url, "https://bob.example.com");
    storage.set_visibility(bob, GuildId(10), true).await.expect("visible");
    storage.set_visibility(bob, GuildId(20), false).await.expect("hidden");

    let endpoint = storage
        .stored_endpoint(bob)
        .await
        .expect("lookup")
        .expect("endpoint");
    assert_eq!(endpoint.base_url, "https://bob.example.com");
    assert_eq!(endpoint.auth_token.as_deref(), Some("reader-1"));
    let owner = endpoint.owner.expect("owner");
    assert_eq!(owner.id, bob);
    assert_eq!(owner.display_name, "Bobby");
    assert_eq!(owner.avatar_url.as_deref(), Some("https://cdn.example.com/bob.png"));
    assert_eq!(
        endpoint.visibility,
        BTreeMap::from([(GuildId(10), true), (GuildId(20), false)])
    );
}

#[tokio::test]
async fn user_without_endpoint_has_none() {
    let storage = memory_storage().await;
    let alice = storage.create_user("alice").await.expect("user");
    assert!(storage.stored_endpoint(alice).await.expect("lookup").is_none());
    assert!(storage.display_options(alice).await.expect("options").is_none());
}

#[tokio::test]
async fn rejects_invalid_endpoint_urls() {
    let storage = memory_storage().await;
    let alice = storage.create_user("alice").await.expect("user");
    storage
        .set_endpoint(alice, "not a url", None)
        .await
        .expect_err("should fail");
}

#[tokio::test]
async fn finds_every_owner_of_a_url() {
    let storage = memory_storage().await;
    let bob = storage.create_user("bob").await.expect("user");
    let carol = storage.create_user("carol").await.expect("user");
    let dave = storage.create_user("dave").await.expect("user");
    storage
        .set_endpoint(bob, "https://shared.example.com", None)
        .await
        .expect("endpoint");
    storage
        .set_endpoint(carol, "https://shared.example.com/", None)
        .await
        .expect("endpoint");
    storage
        .set_endpoint(dave, "https://dave.example.com", None)
        .await
        .expect("endpoint");

    let owners: Vec<UserId> = storage
        .find_users_for_url("https://shared.example.com")
        .await
        .expect("lookup")
        .into_iter()
        .map(|(identity, _)| identity.id)
        .collect();
    assert_eq!(owners, vec![bob, carol]);
    assert!(storage
        .find_users_for_url("https://nobody.example.com")
        .await
        .expect("lookup")
        .is_empty());
}

#[tokio::test]
async fn finds_members_by_username_display_name_or_nickname() {
    let storage = memory_storage().await;
    let bob = storage.create_user("bob").await.expect("user");
    storage.set_profile(bob, Some("Robert"), None).await.expect("profile");
    storage
        .add_membership(GuildId(10), bob, Some("bobcat"))
        .await
        .expect("membership");

    for name in ["BOB", "robert", "BobCat"] {
        let found = storage
            .find_member_by_name(name, GuildId(10))
            .await
            .expect("lookup")
            .expect("member");
        assert_eq!(found.id, bob, "name={name}");
    }
    assert!(storage
        .find_member_by_name("bob", GuildId(20))
        .await
        .expect("lookup")
        .is_none());
}

#[tokio::test]
async fn mutual_scope_follows_membership() {
    let storage = memory_storage().await;
    let bob = storage.create_user("bob").await.expect("user");
    storage
        .add_membership(GuildId(10), bob, None)
        .await
        .expect("membership");
    assert!(storage.is_mutual_scope(bob, GuildId(10)).await.expect("mutual"));
    assert!(!storage.is_mutual_scope(bob, GuildId(20)).await.expect("mutual"));
}

#[tokio::test]
async fn display_options_round_trip_through_endpoint() {
    let storage = memory_storage().await;
    let bob = storage.create_user("bob").await.expect("user");
    let options = DisplayOptions::none()
        .with(DisplayOption::Trend)
        .with(DisplayOption::Simple);

    storage
        .set_display_options(bob, &options)
        .await
        .expect_err("no endpoint yet");

    storage
        .set_endpoint(bob, "https://bob.example.com", None)
        .await
        .expect("endpoint");
    storage
        .set_display_options(bob, &options)
        .await
        .expect("options");
    assert_eq!(
        storage.display_options(bob).await.expect("options"),
        Some(options)
    );
}

#[tokio::test]
async fn short_display_defaults_to_off() {
    let storage = memory_storage().await;
    assert!(!storage
        .has_short_display_preference(ChannelId(5))
        .await
        .expect("pref"));
    storage
        .set_short_display(ChannelId(5), true)
        .await
        .expect("set");
    assert!(storage
        .has_short_display_preference(ChannelId(5))
        .await
        .expect("pref"));
}
