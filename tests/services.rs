//! Service-level behaviour over in-memory repositories.

mod support;

use yatube::application::{
    follows::FollowOutcome,
    listing::ListingError,
    posts::{CommentOutcome, EditOutcome, ImageUpload, PostError, PostForm},
};
use yatube::domain::uploads::POST_IMAGE_PREFIX;

use support::{TestApp, hours_ago};

#[tokio::test]
async fn new_post_appears_on_index_profile_and_its_group() {
    let app = TestApp::new().await;
    let author = app.user("leo").await;
    let group = app.group("Cats", "cats").await;

    let post = app.post(&author, "  Tabby spotted on the roof  ", Some(&group)).await;
    assert_eq!(post.text, "Tabby spotted on the roof");
    assert_eq!(post.group_slug.as_deref(), Some("cats"));

    let index = app.listing.index(None).await.expect("index");
    assert_eq!(index.items.first().map(|p| p.id), Some(post.id));

    let profile = app
        .listing
        .profile("leo", None, None)
        .await
        .expect("profile");
    assert_eq!(profile.page.count, 1);
    assert_eq!(profile.page.items[0].id, post.id);

    let listing = app.listing.group("cats", None).await.expect("group");
    assert_eq!(listing.page.items[0].id, post.id);
}

#[tokio::test]
async fn group_listing_excludes_posts_of_other_groups() {
    let app = TestApp::new().await;
    let author = app.user("leo").await;
    let cats = app.group("Cats", "cats").await;
    let dogs = app.group("Dogs", "dogs").await;

    app.post(&author, "about cats", Some(&cats)).await;
    app.post(&author, "no group at all", None).await;

    let dogs_listing = app.listing.group("dogs", None).await.expect("group");
    assert_eq!(dogs_listing.group.id, dogs.id);
    assert_eq!(dogs_listing.page.count, 0);
    assert!(dogs_listing.page.items.is_empty());
    assert_eq!(dogs_listing.page.num_pages, 1);
}

#[tokio::test]
async fn unknown_group_and_author_are_reported() {
    let app = TestApp::new().await;
    assert!(matches!(
        app.listing.group("missing", None).await,
        Err(ListingError::UnknownGroup)
    ));
    assert!(matches!(
        app.listing.profile("nobody", None, None).await,
        Err(ListingError::UnknownAuthor)
    ));
}

#[tokio::test]
async fn listings_are_newest_first() {
    let app = TestApp::new().await;
    let author = app.user("leo").await;
    let oldest = app.store.insert_post_at(author.id, "oldest", None, hours_ago(3));
    let newest = app.store.insert_post_at(author.id, "newest", None, hours_ago(1));
    let middle = app.store.insert_post_at(author.id, "middle", None, hours_ago(2));

    let page = app.listing.index(None).await.expect("index");
    let ids: Vec<i64> = page.items.iter().map(|post| post.id).collect();
    assert_eq!(ids, vec![newest, middle, oldest]);
}

#[tokio::test]
async fn pagination_clamps_out_of_range_pages() {
    let app = TestApp::new().await;
    let author = app.user("leo").await;
    for n in 0..13 {
        app.store
            .insert_post_at(author.id, &format!("post {n}"), None, hours_ago(100 - n));
    }

    let first = app.listing.index(None).await.expect("first page");
    assert_eq!(first.number, 1);
    assert_eq!(first.items.len(), 10);
    assert_eq!(first.num_pages, 2);

    let second = app.listing.index(Some("2")).await.expect("second page");
    assert_eq!(second.items.len(), 3);

    let beyond = app.listing.index(Some("99")).await.expect("clamped page");
    assert_eq!(beyond.number, 2);
    assert_eq!(beyond.items.len(), 3);

    let garbage = app.listing.index(Some("abc")).await.expect("garbage page");
    assert_eq!(garbage.number, 1);
}

// 1x1 transparent GIF.
const GIF: &[u8] = &[
    0x47, 0x49, 0x46, 0x38, 0x39, 0x61, 0x01, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x21, 0xf9, 0x04,
    0x01, 0x00, 0x00, 0x00, 0x00, 0x2c, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x01, 0x00, 0x00, 0x02,
    0x00, 0x3b,
];

#[tokio::test]
async fn post_image_is_stored_under_the_post_prefix() {
    let app = TestApp::new().await;
    let author = app.user("leo").await;

    let post = app
        .posts
        .create_post(
            &author,
            PostForm {
                text: "with a picture".to_string(),
                image: Some(ImageUpload {
                    filename: "roof.gif".to_string(),
                    bytes: bytes::Bytes::from_static(GIF),
                }),
                ..PostForm::default()
            },
        )
        .await
        .expect("create post");

    let path = post.image.expect("image path");
    assert!(path.starts_with(&format!("{POST_IMAGE_PREFIX}/")));
    assert!(path.ends_with("-roof.gif"));
    let stored = app
        .state
        .upload_storage
        .read(&path)
        .await
        .expect("read image");
    assert_eq!(stored.as_ref(), GIF);
}

#[tokio::test]
async fn non_author_edit_leaves_post_unchanged() {
    let app = TestApp::new().await;
    let author = app.user("leo").await;
    let intruder = app.user("mallory").await;
    let post = app.post(&author, "original text", None).await;

    let outcome = app
        .posts
        .edit_post(
            &intruder,
            post.id,
            PostForm {
                text: "defaced".to_string(),
                ..PostForm::default()
            },
        )
        .await
        .expect("edit");
    assert!(matches!(outcome, EditOutcome::Forbidden));

    let detail = app.posts.post_detail(post.id).await.expect("detail");
    assert_eq!(detail.post.text, "original text");
}

#[tokio::test]
async fn author_edit_changes_text_and_group() {
    let app = TestApp::new().await;
    let author = app.user("leo").await;
    let group = app.group("Cats", "cats").await;
    let post = app.post(&author, "draft", None).await;

    let outcome = app
        .posts
        .edit_post(
            &author,
            post.id,
            PostForm {
                text: "final".to_string(),
                group: Some(group.id.to_string()),
                ..PostForm::default()
            },
        )
        .await
        .expect("edit");
    let EditOutcome::Updated(updated) = outcome else {
        panic!("author edit was refused");
    };
    assert_eq!(updated.id, post.id);
    assert_eq!(updated.text, "final");
    assert_eq!(updated.group_id, Some(group.id));
    assert_eq!(app.store.post_count(), 1);
}

#[tokio::test]
async fn invalid_post_form_creates_nothing() {
    let app = TestApp::new().await;
    let author = app.user("leo").await;

    let result = app
        .posts
        .create_post(
            &author,
            PostForm {
                text: "   ".to_string(),
                group: Some("999".to_string()),
                ..PostForm::default()
            },
        )
        .await;

    let Err(PostError::Invalid(errors)) = result else {
        panic!("blank post was accepted");
    };
    assert!(errors.has("text"));
    assert!(errors.has("group"));
    assert_eq!(app.store.post_count(), 0);
}

#[tokio::test]
async fn follow_is_idempotent_and_self_follow_is_refused() {
    let app = TestApp::new().await;
    let reader = app.user("reader").await;
    let author = app.user("author").await;

    let first = app.follows.follow(&reader, &author).await.expect("follow");
    let second = app.follows.follow(&reader, &author).await.expect("follow");
    assert_eq!(first, FollowOutcome::Created);
    assert_eq!(second, FollowOutcome::AlreadyFollowing);
    assert_eq!(app.store.follow_count(), 1);

    let own = app.follows.follow(&reader, &reader).await.expect("self");
    assert_eq!(own, FollowOutcome::SelfFollowIgnored);
    assert_eq!(app.store.follow_count(), 1);
}

#[tokio::test]
async fn unfollow_removes_author_posts_from_feed() {
    let app = TestApp::new().await;
    let reader = app.user("reader").await;
    let author = app.user("author").await;
    let stranger = app.user("stranger").await;
    let followed_post = app.post(&author, "followed", None).await;
    app.post(&stranger, "not followed", None).await;

    app.follows
        .follow_username(&reader, "author")
        .await
        .expect("follow");
    let feed = app.follows.feed(&reader, None).await.expect("feed");
    let ids: Vec<i64> = feed.items.iter().map(|post| post.id).collect();
    assert_eq!(ids, vec![followed_post.id]);

    assert!(
        app.follows
            .unfollow_username(&reader, "author")
            .await
            .expect("unfollow")
    );
    let feed = app.follows.feed(&reader, None).await.expect("feed");
    assert!(feed.items.is_empty());

    assert!(
        !app.follows
            .unfollow_username(&reader, "author")
            .await
            .expect("second unfollow")
    );
}

#[tokio::test]
async fn profile_reports_follow_counts_and_state() {
    let app = TestApp::new().await;
    let reader = app.user("reader").await;
    let author = app.user("author").await;
    app.follows.follow(&reader, &author).await.expect("follow");

    let listing = app
        .listing
        .profile("author", Some(&reader), None)
        .await
        .expect("profile");
    assert!(listing.following);
    assert_eq!(listing.followers, 1);
    assert_eq!(listing.follows, 0);

    let own = app
        .listing
        .profile("author", Some(&author), None)
        .await
        .expect("own profile");
    assert!(!own.following);
}

#[tokio::test]
async fn blank_comment_is_rejected_without_a_row() {
    let app = TestApp::new().await;
    let author = app.user("leo").await;
    let post = app.post(&author, "commentable", None).await;

    let outcome = app
        .posts
        .create_comment(&author, post.id, "   ")
        .await
        .expect("comment");
    assert!(matches!(outcome, CommentOutcome::Rejected(_)));
    assert_eq!(app.store.comment_count(), 0);

    let outcome = app
        .posts
        .create_comment(&author, post.id, "Nice roof")
        .await
        .expect("comment");
    assert!(matches!(outcome, CommentOutcome::Created(_)));

    let detail = app.posts.post_detail(post.id).await.expect("detail");
    assert_eq!(detail.comments.len(), 1);
    assert_eq!(detail.comments[0].text, "Nice roof");
    assert_eq!(detail.author_posts, 1);
}

#[tokio::test]
async fn comment_on_missing_post_is_not_found() {
    let app = TestApp::new().await;
    let author = app.user("leo").await;
    assert!(matches!(
        app.posts.create_comment(&author, 404, "hello").await,
        Err(PostError::NotFound)
    ));
}

#[tokio::test]
async fn deleting_a_group_keeps_its_posts() {
    let app = TestApp::new().await;
    let author = app.user("leo").await;
    let group = app.group("Cats", "cats").await;
    let post = app.post(&author, "orphaned soon", Some(&group)).await;

    app.groups.delete("cats").await.expect("delete group");

    let detail = app.posts.post_detail(post.id).await.expect("detail");
    assert_eq!(detail.post.group_id, None);
    assert_eq!(app.store.post_count(), 1);
}

#[tokio::test]
async fn password_change_ends_other_sessions() {
    let app = TestApp::new().await;
    let user = app.user("leo").await;
    let current = app.authenticated(&user).await;
    app.cookie(&user).await;
    assert_eq!(app.store.session_count(user.id), 2);

    app.accounts
        .change_password(
            &current,
            yatube::application::accounts::PasswordChangeForm {
                old_password: support::PASSWORD.to_string(),
                new_password1: "another-passphrase".to_string(),
                new_password2: "another-passphrase".to_string(),
            },
        )
        .await
        .expect("change password");

    assert_eq!(app.store.session_count(user.id), 1);
}
