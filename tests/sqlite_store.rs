//! Library-level tests for the SQLite-backed store driven through the
//! [`Retriever`], covering persistence, ordering, and deletion.

use std::sync::Arc;

use tempfile::TempDir;

use socratic_tutor::config::Config;
use socratic_tutor::sqlite_store::SqliteStore;
use socratic_tutor::{db, migrate};
use socratic_tutor_core::models::{Level, Subject};
use socratic_tutor_core::retriever::NewDocument;
use socratic_tutor_core::store::Store;
use socratic_tutor_core::{ChunkParams, RetrievalError, Retriever};

const NEWTON_NOTES: &str = "Newton's First Law states objects at rest stay at rest and objects in motion stay in motion unless a net force acts on them. This resistance to changes in motion is called inertia.\n\n\
Inertia depends on mass. A loaded cart has more inertia than an empty one, which is why the First Law explains that it is harder to start or stop.\n\n\
Photosynthesis converts sunlight, water and carbon dioxide into glucose and oxygen inside the chloroplasts of green plant cells.\n\n\
Mitochondria release energy from glucose through cellular respiration, producing carbon dioxide and water as waste products.\n\n\
Volcanoes form where magma rises through cracks in the crust, and repeated eruptions build tall cones of ash and hardened lava.\n\n\
The French Revolution began in 1789 and reshaped European politics, ending the absolute monarchy of Louis XVI.";

fn test_config(tmp: &TempDir) -> Config {
    let config_content = format!(
        r#"
[db]
path = "{}"

[chunking]
target_chars = 200
overlap_chars = 20

[server]
bind = "127.0.0.1:0"
"#,
        tmp.path().join("data").join("tutor.sqlite").display()
    );
    toml::from_str(&config_content).unwrap()
}

async fn open(tmp: &TempDir) -> (Retriever, Arc<SqliteStore>) {
    let cfg = test_config(tmp);
    let pool = db::connect(&cfg).await.unwrap();
    migrate::apply(&pool).await.unwrap();
    let store = Arc::new(SqliteStore::new(pool));
    let retriever = Retriever::new(store.clone(), cfg.chunking.params());
    (retriever, store)
}

fn new_doc(filename: &str, content: &str, user_id: Option<&str>) -> NewDocument {
    NewDocument {
        filename: filename.to_string(),
        subject: Subject::Physics,
        level: Level::Beginner,
        content: content.to_string(),
        user_id: user_id.map(str::to_string),
    }
}

#[tokio::test]
async fn test_add_get_roundtrip_preserves_document() {
    let tmp = TempDir::new().unwrap();
    let (retriever, _) = open(&tmp).await;

    let added = retriever
        .add_document(new_doc("newton.md", NEWTON_NOTES, Some("student-1")))
        .await
        .unwrap()
        .document;
    let fetched = retriever.get_document(&added.id).await.unwrap();

    assert_eq!(fetched, added);
    assert_eq!(fetched.content, NEWTON_NOTES);
    assert_eq!(fetched.user_id.as_deref(), Some("student-1"));
}

#[tokio::test]
async fn test_passages_persisted_in_order_and_match_content() {
    let tmp = TempDir::new().unwrap();
    let (retriever, _) = open(&tmp).await;

    let doc = retriever
        .add_document(new_doc("newton.md", NEWTON_NOTES, None))
        .await
        .unwrap()
        .document;
    let passages = retriever.passages(&doc.id).await.unwrap();

    assert!(passages.len() > 1);
    for (i, p) in passages.iter().enumerate() {
        assert_eq!(p.index, i);
        assert_eq!(&NEWTON_NOTES[p.offset..p.offset + p.text.len()], p.text);
        if i > 0 {
            assert!(p.offset > passages[i - 1].offset);
        }
    }
}

#[tokio::test]
async fn test_add_reports_persisted_passage_count() {
    let tmp = TempDir::new().unwrap();
    let (retriever, _) = open(&tmp).await;

    let added = retriever
        .add_document(new_doc("newton.md", NEWTON_NOTES, None))
        .await
        .unwrap();
    let persisted = retriever.passages(&added.document.id).await.unwrap().len();
    assert_eq!(added.passage_count, persisted);

    let listed = retriever.list_documents(None).await.unwrap();
    assert_eq!(listed, vec![added.metadata()]);
}

#[tokio::test]
async fn test_retrieve_ranks_inertia_passages_first() {
    let tmp = TempDir::new().unwrap();
    let (retriever, _) = open(&tmp).await;

    let doc = retriever
        .add_document(new_doc("newton.md", NEWTON_NOTES, None))
        .await
        .unwrap()
        .document;
    let first = retriever
        .retrieve(&doc.id, "inertia law of motion", 2)
        .await
        .unwrap();
    let second = retriever
        .retrieve(&doc.id, "inertia law of motion", 2)
        .await
        .unwrap();

    assert_eq!(first.len(), 2);
    assert_eq!(first, second);
    assert_eq!(first[0].passage.offset, 0);
    assert!(first[1].passage.text.to_lowercase().contains("inertia"));
}

#[tokio::test]
async fn test_list_orders_by_creation_and_filters_by_user() {
    let tmp = TempDir::new().unwrap();
    let (retriever, _) = open(&tmp).await;

    let a = retriever
        .add_document(new_doc("a.txt", "First set of notes.", Some("u1")))
        .await
        .unwrap()
        .document;
    let b = retriever
        .add_document(new_doc("b.txt", "Second set of notes.", Some("u2")))
        .await
        .unwrap()
        .document;
    let c = retriever
        .add_document(new_doc("c.txt", "Third set of notes.", Some("u1")))
        .await
        .unwrap()
        .document;

    let all: Vec<String> = retriever
        .list_documents(None)
        .await
        .unwrap()
        .into_iter()
        .map(|m| m.id)
        .collect();
    assert_eq!(all, vec![a.id.clone(), b.id.clone(), c.id.clone()]);

    let mine = retriever.list_documents(Some("u1")).await.unwrap();
    assert_eq!(mine.len(), 2);
    assert_eq!(mine[0].id, a.id);
    assert_eq!(mine[1].id, c.id);
    assert_eq!(mine[0].content_chars, "First set of notes.".chars().count());
    assert_eq!(mine[0].passage_count, 1);
}

#[tokio::test]
async fn test_delete_removes_document_and_passages() {
    let tmp = TempDir::new().unwrap();
    let (retriever, store) = open(&tmp).await;

    let doc = retriever
        .add_document(new_doc("newton.md", NEWTON_NOTES, None))
        .await
        .unwrap()
        .document;
    retriever.delete_document(&doc.id).await.unwrap();

    assert!(matches!(
        retriever.get_document(&doc.id).await,
        Err(RetrievalError::NotFound(_))
    ));
    assert!(matches!(
        retriever.retrieve(&doc.id, "inertia", 3).await,
        Err(RetrievalError::NotFound(_))
    ));
    assert!(store.passages(&doc.id).await.unwrap().is_none());

    let leftover: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM passages WHERE document_id = ?")
        .bind(&doc.id)
        .fetch_one(store.pool())
        .await
        .unwrap();
    assert_eq!(leftover, 0);
}

#[tokio::test]
async fn test_documents_survive_reopen() {
    let tmp = TempDir::new().unwrap();
    let id = {
        let (retriever, store) = open(&tmp).await;
        let doc = retriever
            .add_document(new_doc("notes.txt", "Energy is conserved in a closed system.", None))
            .await
            .unwrap()
            .document;
        store.pool().close().await;
        doc.id
    };

    let (retriever, _) = open(&tmp).await;
    let doc = retriever.get_document(&id).await.unwrap();
    assert_eq!(doc.content, "Energy is conserved in a closed system.");
}

#[tokio::test]
async fn test_migrations_idempotent() {
    let tmp = TempDir::new().unwrap();
    let cfg = test_config(&tmp);
    migrate::run_migrations(&cfg).await.unwrap();
    migrate::run_migrations(&cfg).await.unwrap();
}

#[tokio::test]
async fn test_concurrent_delete_and_retrieve() {
    let tmp = TempDir::new().unwrap();
    let (retriever, _) = open(&tmp).await;
    let retriever = Arc::new(retriever);

    for _ in 0..5 {
        let doc = retriever
            .add_document(new_doc("newton.md", NEWTON_NOTES, None))
            .await
            .unwrap()
            .document;
        let expected = retriever.passages(&doc.id).await.unwrap().len().min(3);

        let reader = {
            let r = Arc::clone(&retriever);
            let id = doc.id.clone();
            tokio::spawn(async move { r.retrieve(&id, "inertia", 3).await })
        };
        let deleter = {
            let r = Arc::clone(&retriever);
            let id = doc.id.clone();
            tokio::spawn(async move { r.delete_document(&id).await })
        };

        deleter.await.unwrap().unwrap();
        match reader.await.unwrap() {
            Ok(results) => assert_eq!(results.len(), expected),
            Err(RetrievalError::NotFound(_)) => {}
            Err(other) => panic!("unexpected error: {}", other),
        }
    }
}

#[test]
fn test_chunk_params_from_config_are_valid() {
    let tmp = TempDir::new().unwrap();
    let params = test_config(&tmp).chunking.params();
    assert_eq!(params, ChunkParams::new(200, 20).unwrap());
}
