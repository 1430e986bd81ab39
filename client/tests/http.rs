//! Drives the store over real HTTP against the API router.

use redline_api::corrections::BestChoicePolicy;
use redline_api::{auth, db, router, AppState};
use redline_client::{ClientError, FeedStore, HttpFeedService};
use redline_shared::{Category, CreatePost, VoteDirection};
use tempfile::TempDir;

const SECRET: &str = "e2e-secret";

async fn serve() -> (String, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("e2e.db");
    let pool = db::create_pool(db_path.to_str().unwrap()).unwrap();
    db::run_migrations(&pool).unwrap();

    let app = router(AppState {
        db: pool,
        jwt_secret: SECRET.to_string(),
        best_choice: BestChoicePolicy::Anyone,
        suggester: None,
    });

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{addr}"), temp_dir)
}

fn signed_in(base_url: &str, user_id: i64) -> FeedStore<HttpFeedService> {
    let token = auth::issue_token(user_id, SECRET).unwrap();
    FeedStore::new(HttpFeedService::new(base_url).with_token(token))
}

#[tokio::test]
async fn full_round_trip_over_http() {
    let (base_url, _temp) = serve().await;
    let author = signed_in(&base_url, 1);
    let voter = signed_in(&base_url, 2);

    let (post, suggestion) = author
        .create_post(CreatePost {
            title: "Homework".into(),
            content: "The cat sit on the mat.".into(),
            category: Category::Grammar,
        })
        .await
        .unwrap();
    // No upstream configured: the sidecar fails quietly.
    assert_eq!(suggestion.outcome().await, None);

    let correction = author
        .submit_correction(post.id, "The cat sits on the mat.", Some("Agreement".into()))
        .await
        .unwrap();
    let comment = author.create_comment(post.id, "Thanks!").await.unwrap();

    voter.load().await.unwrap();
    assert_eq!(voter.posts().await.len(), 1);
    assert_eq!(voter.corrections(post.id).await, vec![correction.clone()]);
    assert_eq!(voter.comments(post.id).await, vec![comment.clone()]);

    assert_eq!(voter.vote_correction(post.id, correction.id).await.unwrap(), 1);
    assert_eq!(voter.vote_correction(post.id, correction.id).await.unwrap(), 0);
    assert_eq!(voter.vote_correction(post.id, correction.id).await.unwrap(), 1);
    assert_eq!(voter.vote_comment(comment.id, VoteDirection::Down).await.unwrap(), -1);

    voter.choose_best(post.id, correction.id).await.unwrap();
    assert_eq!(
        voter.post(post.id).await.unwrap().best_correction_id,
        Some(correction.id)
    );

    author.load().await.unwrap();
    let reloaded = author.post(post.id).await.unwrap();
    assert_eq!(reloaded.best_correction_id, Some(correction.id));
    assert_eq!(reloaded.suggestion, None);
}

#[tokio::test]
async fn anonymous_mutations_are_unauthorized() {
    let (base_url, _temp) = serve().await;
    let author = signed_in(&base_url, 1);
    let anonymous = FeedStore::new(HttpFeedService::new(&base_url));
    assert!(!anonymous.service().has_token());

    let (post, _) = author
        .create_post(CreatePost {
            title: "T".into(),
            content: "C".into(),
            category: Category::Writing,
        })
        .await
        .unwrap();

    anonymous.load().await.unwrap();
    let err = anonymous.create_comment(post.id, "hi").await.unwrap_err();
    assert_eq!(err, ClientError::Unauthorized);
    assert!(anonymous.comments(post.id).await.is_empty());
}

#[tokio::test]
async fn server_errors_map_onto_client_errors() {
    let (base_url, _temp) = serve().await;
    let user = signed_in(&base_url, 1);

    let (p, _) = user
        .create_post(CreatePost {
            title: "P".into(),
            content: "first".into(),
            category: Category::Vocabulary,
        })
        .await
        .unwrap();
    let (q, _) = user
        .create_post(CreatePost {
            title: "Q".into(),
            content: "second".into(),
            category: Category::Vocabulary,
        })
        .await
        .unwrap();
    let foreign = user.submit_correction(q.id, "second!", None).await.unwrap();

    let err = user.choose_best(p.id, foreign.id).await.unwrap_err();
    assert!(matches!(err, ClientError::InvalidState(_)));
    assert_eq!(user.post(p.id).await.unwrap().best_correction_id, None);

    let err = user.vote_correction(p.id, foreign.id).await.unwrap_err();
    assert_eq!(err, ClientError::NotFound);
}
