mod common;

use common::TestDb;
use generic_data_api::{AppError, RelationshipResolver, ResourceService};
use serde_json::{json, Value};
use uuid::Uuid;

fn id_of(v: &Value) -> String {
    v["id"].as_str().expect("id").to_string()
}

fn sorted_ids(v: &Value) -> Vec<String> {
    let mut ids: Vec<String> = v
        .as_array()
        .expect("id list")
        .iter()
        .map(|x| x.as_str().expect("uuid").to_string())
        .collect();
    ids.sort();
    ids
}

async fn author(db: &TestDb, name: &str) -> String {
    let created = ResourceService::create(&db.pool, &db.catalog, "authors", &json!({ "name": name }))
        .await
        .unwrap();
    id_of(&created)
}

#[tokio::test]
async fn books_and_authors_lifecycle() {
    let Some(db) = TestDb::library().await else { return };

    let book = ResourceService::create(&db.pool, &db.catalog, "books", &json!({ "title": "X" }))
        .await
        .unwrap();
    assert_eq!(book["title"], "X");
    assert_eq!(book["authors"], json!([]));
    assert_eq!(book["reviews"], json!([]));
    assert_eq!(book["in_print"], true);
    let u = id_of(&book);

    let a1 = author(&db, "Ann").await;
    let a2 = author(&db, "Bo").await;

    ResourceService::update(&db.pool, &db.catalog, "books", &u, &json!({ "authors": [a1, a2] }))
        .await
        .unwrap();
    let got = ResourceService::get_one(&db.pool, &db.catalog, "books", &u).await.unwrap();
    let mut expected = vec![a1.clone(), a2.clone()];
    expected.sort();
    assert_eq!(sorted_ids(&got["authors"]), expected);

    let updated = ResourceService::update(&db.pool, &db.catalog, "books", &u, &json!({ "authors": [a1] }))
        .await
        .unwrap();
    assert_eq!(updated["authors"], json!([a1]));
    let links = db.table("books_authors");
    assert_eq!(
        db.count(&format!("{} WHERE books_id = '{}' AND authors_id = '{}'", links, u, a2)).await,
        0
    );
    assert_eq!(
        db.count(&format!("{} WHERE books_id = '{}' AND authors_id = '{}'", links, u, a1)).await,
        1
    );

    let deleted = ResourceService::delete(&db.pool, &db.catalog, "books", &u).await.unwrap();
    assert!(deleted["deleted_at"].is_string());
    assert!(matches!(
        ResourceService::get_one(&db.pool, &db.catalog, "books", &u).await,
        Err(AppError::NotFound(_))
    ));
    // the row stays, marked deleted; its links are gone
    assert_eq!(
        db.count(&format!("{} WHERE id = '{}' AND deleted_at IS NOT NULL", db.table("books"), u)).await,
        1
    );
    assert_eq!(db.count(&format!("{} WHERE books_id = '{}'", links, u)).await, 0);
    // deleting again finds nothing live
    assert!(matches!(
        ResourceService::delete(&db.pool, &db.catalog, "books", &u).await,
        Err(AppError::NotFound(_))
    ));

    db.teardown().await;
}

#[tokio::test]
async fn read_after_write() {
    let Some(db) = TestDb::library().await else { return };
    let a1 = author(&db, "Ann").await;

    let payload = json!({
        "title": "Dune",
        "subtitle": null,
        "pages": 412,
        "price": 9.5,
        "in_print": false,
        "published_at": "1965-08-01T00:00:00Z",
        "authors": [a1],
    });
    let created = ResourceService::create(&db.pool, &db.catalog, "books", &payload).await.unwrap();
    assert_eq!(created["authors"], json!([a1]));

    let got = ResourceService::get_one(&db.pool, &db.catalog, "books", &id_of(&created)).await.unwrap();
    for field in ["title", "subtitle", "pages", "price", "in_print"] {
        assert_eq!(got[field], payload[field], "{field}");
    }
    let published = chrono::DateTime::parse_from_rfc3339(got["published_at"].as_str().unwrap()).unwrap();
    assert_eq!(published, chrono::DateTime::parse_from_rfc3339("1965-08-01T00:00:00Z").unwrap());
    assert_eq!(got["authors"], json!([a1]));
    assert!(got["created_at"].is_string());

    db.teardown().await;
}

#[tokio::test]
async fn update_failures() {
    let Some(db) = TestDb::library().await else { return };
    let book = ResourceService::create(&db.pool, &db.catalog, "books", &json!({ "title": "X" }))
        .await
        .unwrap();
    let u = id_of(&book);

    assert!(matches!(
        ResourceService::update(&db.pool, &db.catalog, "books", &u, &json!({})).await,
        Err(AppError::Conflict(_))
    ));
    assert!(matches!(
        ResourceService::update(&db.pool, &db.catalog, "books", &u, &json!({ "isbn": "1" })).await,
        Err(AppError::InvalidArgument(_))
    ));
    assert!(matches!(
        ResourceService::update(&db.pool, &db.catalog, "books", &u, &json!({ "published_at": "yesterday" })).await,
        Err(AppError::InvalidArgument(_))
    ));
    // one-to-many fields are read-only
    assert!(matches!(
        ResourceService::update(&db.pool, &db.catalog, "books", &u, &json!({ "reviews": [] })).await,
        Err(AppError::InvalidArgument(_))
    ));
    let missing = Uuid::new_v4().to_string();
    assert!(matches!(
        ResourceService::update(&db.pool, &db.catalog, "books", &missing, &json!({ "title": "Y" })).await,
        Err(AppError::NotFound(_))
    ));

    // scalar update bumps updated_at
    let renamed = ResourceService::update(&db.pool, &db.catalog, "books", &u, &json!({ "title": "Y" }))
        .await
        .unwrap();
    assert_eq!(renamed["title"], "Y");
    let stamp = |v: &Value| chrono::DateTime::parse_from_rfc3339(v["updated_at"].as_str().unwrap()).unwrap();
    assert!(stamp(&renamed) > stamp(&book));

    db.teardown().await;
}

#[tokio::test]
async fn failed_sync_rolls_back_the_scalar_write() {
    let Some(db) = TestDb::library().await else { return };
    let book = ResourceService::create(&db.pool, &db.catalog, "books", &json!({ "title": "X" }))
        .await
        .unwrap();
    let u = id_of(&book);

    // unknown author id violates the link table's foreign key
    let ghost = Uuid::new_v4().to_string();
    let result = ResourceService::update(
        &db.pool,
        &db.catalog,
        "books",
        &u,
        &json!({ "title": "Changed", "authors": [ghost] }),
    )
    .await;
    assert!(result.is_err());
    let got = ResourceService::get_one(&db.pool, &db.catalog, "books", &u).await.unwrap();
    assert_eq!(got["title"], "X");

    db.teardown().await;
}

#[tokio::test]
async fn sync_is_idempotent() {
    let Some(db) = TestDb::library().await else { return };
    let book = ResourceService::create(&db.pool, &db.catalog, "books", &json!({ "title": "X" }))
        .await
        .unwrap();
    let u = Uuid::parse_str(&id_of(&book)).unwrap();
    let a1 = Uuid::parse_str(&author(&db, "Ann").await).unwrap();
    let a2 = Uuid::parse_str(&author(&db, "Bo").await).unwrap();

    let mut tx = db.pool.begin().await.unwrap();
    let first = RelationshipResolver::sync(&mut tx, &db.catalog, "books", u, "authors", &[a1, a2])
        .await
        .unwrap();
    assert_eq!(first.to_create.len(), 2);
    let second = RelationshipResolver::sync(&mut tx, &db.catalog, "books", u, "authors", &[a1, a2])
        .await
        .unwrap();
    assert!(second.is_empty());

    // from the other side the same link is visible
    let from_author = RelationshipResolver::sync(&mut tx, &db.catalog, "authors", a1, "books", &[u])
        .await
        .unwrap();
    assert!(from_author.is_empty());

    // no governing relationship
    assert!(matches!(
        RelationshipResolver::sync(&mut tx, &db.catalog, "authors", a1, "reviews", &[]).await,
        Err(AppError::NotFound(_))
    ));
    tx.rollback().await.unwrap();

    db.teardown().await;
}

#[tokio::test]
async fn listing() {
    let Some(db) = TestDb::library().await else { return };

    assert!(matches!(
        ResourceService::list_all(&db.pool, &db.catalog, "books").await,
        Err(AppError::NotFound(_))
    ));

    let x = ResourceService::create(&db.pool, &db.catalog, "books", &json!({ "title": "X" }))
        .await
        .unwrap();
    let y = ResourceService::create(&db.pool, &db.catalog, "books", &json!({ "title": "Y" }))
        .await
        .unwrap();
    let all = ResourceService::list_all(&db.pool, &db.catalog, "books").await.unwrap();
    assert_eq!(all.len(), 2);
    assert!(all.iter().all(|b| b["authors"].is_array()));

    let subset = ResourceService::list_subset(&db.pool, &db.catalog, "books", &[id_of(&y)]).await.unwrap();
    assert_eq!(subset.len(), 1);
    assert_eq!(subset[0]["title"], "Y");

    assert!(matches!(
        ResourceService::list_subset(&db.pool, &db.catalog, "books", &[id_of(&x), "nope".to_string()]).await,
        Err(AppError::InvalidArgument(_))
    ));
    assert!(matches!(
        ResourceService::list_subset(&db.pool, &db.catalog, "books", &[Uuid::new_v4().to_string()]).await,
        Err(AppError::NotFound(_))
    ));

    // soft-deleted rows drop out of every read
    ResourceService::delete(&db.pool, &db.catalog, "books", &id_of(&x)).await.unwrap();
    let all = ResourceService::list_all(&db.pool, &db.catalog, "books").await.unwrap();
    assert_eq!(all.len(), 1);
    assert!(matches!(
        ResourceService::list_subset(&db.pool, &db.catalog, "books", &[id_of(&x)]).await,
        Err(AppError::NotFound(_))
    ));

    db.teardown().await;
}

#[tokio::test]
async fn malformed_ids_fail_for_every_entity() {
    let Some(db) = TestDb::library().await else { return };
    for entity in db.catalog.entity_names() {
        assert!(
            matches!(
                ResourceService::get_one(&db.pool, &db.catalog, entity, "not-a-uuid").await,
                Err(AppError::InvalidArgument(_))
            ),
            "{entity}"
        );
    }
    db.teardown().await;
}

#[tokio::test]
async fn hard_delete_removes_row_and_links() {
    let Some(db) = TestDb::library().await else { return };
    let a1 = author(&db, "Ann").await;
    let book = ResourceService::create(&db.pool, &db.catalog, "books", &json!({ "title": "X", "authors": [a1] }))
        .await
        .unwrap();

    // the link is visible from the author side too
    let got = ResourceService::get_one(&db.pool, &db.catalog, "authors", &a1).await.unwrap();
    assert_eq!(got["books"], json!([id_of(&book)]));

    ResourceService::delete(&db.pool, &db.catalog, "authors", &a1).await.unwrap();
    assert_eq!(db.count(&format!("{} WHERE id = '{}'", db.table("authors"), a1)).await, 0);
    assert_eq!(db.count(&db.table("books_authors")).await, 0);
    let got = ResourceService::get_one(&db.pool, &db.catalog, "books", &id_of(&book)).await.unwrap();
    assert_eq!(got["authors"], json!([]));

    db.teardown().await;
}

#[tokio::test]
async fn one_to_many_is_resolved_from_the_foreign_key() {
    let Some(db) = TestDb::library().await else { return };
    let book = ResourceService::create(&db.pool, &db.catalog, "books", &json!({ "title": "X" }))
        .await
        .unwrap();
    let u = id_of(&book);
    let review = ResourceService::create(&db.pool, &db.catalog, "reviews", &json!({ "books_id": u, "body": "Great" }))
        .await
        .unwrap();
    // the "many" side carries no relationship field
    assert!(review.get("books").is_none());

    let got = ResourceService::get_one(&db.pool, &db.catalog, "books", &u).await.unwrap();
    assert_eq!(got["reviews"], json!([id_of(&review)]));

    // soft-deleted children are excluded
    sqlx::query(&format!("UPDATE {} SET deleted_at = now()", db.table("reviews")))
        .execute(&db.pool)
        .await
        .unwrap();
    let got = ResourceService::get_one(&db.pool, &db.catalog, "books", &u).await.unwrap();
    assert_eq!(got["reviews"], json!([]));

    db.teardown().await;
}

#[tokio::test]
async fn operations_fail_closed() {
    let Some(mut db) = TestDb::library().await else { return };
    let ops = ResourceService::operations(&db.catalog, "reviews");
    assert!(ops.read_op && ops.create_op && !ops.update_op && !ops.delete_op);
    assert!(!ResourceService::operations(&db.catalog, "books_authors").read_op);
    assert!(ResourceService::operations(&db.catalog, "operations").delete_op);

    ResourceService::create(
        &db.pool,
        &db.catalog,
        "operations",
        &json!({ "table_name": "books_authors", "read_op": true }),
    )
    .await
    .unwrap();
    db.reload().await;
    assert!(ResourceService::operations(&db.catalog, "books_authors").read_op);

    db.teardown().await;
}
