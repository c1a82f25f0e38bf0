mod common;

use std::collections::HashMap;
use serde_json::json;
use common::{database, database_with, doc, stored, Call, Reply};
use Dynadex::backend::*;
use Dynadex::key::boundary::prefix_upper_bound;
use Dynadex::{
    ChildQuery, Condition, Config, Error, ErrorKind, FindOptions, FindQuery, IdRange, ItemIdentity, SortDirection,
    TransactWriteDescriptor, UpdateSpec, WriteDescriptor,
};

fn condition_failed() -> Error {
    Error::new(ErrorKind::ConditionFailed, "conditional check failed".to_string())
}

#[tokio::test]
async fn insert_generates_id_and_guards_existence() {
    let (db, backend) = database();

    let document = db
        .insert("user", doc(json!({"name": "Ada", "team": "core", "role": "admin", "email": "Ada@X.io"})))
        .await
        .unwrap();
    let id = document.id().unwrap().unwrap().to_string();
    assert_eq!(id.len(), 24);

    let Call::Put(put) = backend.last_call() else { panic!("expected a put") };
    assert_eq!(put.table_name, "main");
    assert_eq!(put.condition_expression.as_deref(), Some("attribute_not_exists(pk)"));
    assert_eq!(put.item["pk"], AttributeValue::S(format!("user|-|{}", id)));
    assert_eq!(put.item["gsi1pk"], AttributeValue::S("user|-|core".into()));
    assert_eq!(put.item["gsi1sk"], AttributeValue::S("user|-|admin|-|Ada".into()));
    assert_eq!(put.item["gsi2pk"], AttributeValue::S("user|-|ada@x.io".into()));
    assert_eq!(put.item["type"], AttributeValue::S("user".into()));
}

#[tokio::test]
async fn insert_of_existing_record_is_a_conflict() {
    let (db, backend) = database();
    backend.reply(Reply::Fail(condition_failed()));

    let err = db.insert("user", doc(json!({"_id": "u1"}))).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Conflict);
}

#[tokio::test]
async fn replace_maps_condition_failures() {
    let (db, backend) = database();

    backend.reply(Reply::Fail(condition_failed()));
    let err = db.replace("user", doc(json!({"_id": "u1"})), None).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);

    backend.reply(Reply::Fail(condition_failed()));
    let condition = Condition::from_json(&json!({"version": 3})).unwrap();
    let err = db
        .replace("user", doc(json!({"_id": "u1"})), Some(&condition))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Conflict);

    backend.reply(Reply::Fail(Error::backend("throttled")));
    let err = db.replace("user", doc(json!({"_id": "u1"})), None).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Backend);
}

#[tokio::test]
async fn replace_requires_an_id() {
    let (db, backend) = database();
    let err = db.replace("user", doc(json!({"name": "Ada"})), None).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Identity);
    assert!(backend.calls().is_empty());
}

#[tokio::test]
async fn find_by_id_reads_the_primary_key() {
    let (db, backend) = database();
    let item = stored(db.registry(), "post", json!({"_id": "p1", "userId": "u1", "title": "Hello"}));
    backend.reply(Reply::Get(GetItemResponse { item: Some(item) }));

    let post = db.find_by_id("post", "p1", Some("u1")).await.unwrap().unwrap();
    assert_eq!(post, doc(json!({"_id": "p1", "userId": "u1", "title": "Hello"})));

    let Call::Get(get) = backend.last_call() else { panic!("expected a get") };
    assert_eq!(get.key["pk"], AttributeValue::S("user|-|u1".into()));
    assert_eq!(get.key["sk"], AttributeValue::S("post|-|p1".into()));
    assert!(!get.consistent_read);

    assert_eq!(db.find_by_id("user", "missing", None).await.unwrap(), None);
}

#[tokio::test]
async fn find_by_id_rejects_a_record_of_another_collection() {
    let (db, backend) = database();
    let item = stored(db.registry(), "comment", json!({"_id": "p1", "userId": "u1"}));
    backend.reply(Reply::Get(GetItemResponse { item: Some(item) }));

    let err = db.find_by_id("post", "p1", Some("u1")).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Internal);
}

#[tokio::test]
async fn find_routes_to_the_matching_pattern_and_pages() {
    let (db, backend) = database();
    let page_key: Item = HashMap::from([
        ("pk".to_string(), AttributeValue::S("user|-|u1".into())),
        ("sk".to_string(), AttributeValue::S("user|-|u1".into())),
        ("gsi1pk".to_string(), AttributeValue::S("user|-|core".into())),
        ("gsi1sk".to_string(), AttributeValue::S("user|-|admin|-|Ada".into())),
    ]);
    backend.reply(Reply::Query(QueryResponse {
        items: vec![stored(
            db.registry(),
            "user",
            json!({"_id": "u1", "team": "core", "role": "admin", "name": "Ada"}),
        )],
        last_evaluated_key: Some(page_key.clone()),
    }));

    let query = FindQuery::new().where_eq("team", "core").unwrap().where_eq("role", "admin").unwrap();
    let page = db.find("user", &query).await.unwrap();
    assert_eq!(page.items.len(), 1);
    let cursor = page.cursor.expect("more results");

    let Call::Query(request) = backend.last_call() else { panic!("expected a query") };
    assert_eq!(request.index_name.as_deref(), Some("gsi1"));
    assert_eq!(request.key_condition_expression, "gsi1pk = :value0 AND begins_with(gsi1sk, :value1)");
    assert!(!request.consistent_read);

    let next = query.with_options(FindOptions::new().with_cursor(cursor).with_limit(10));
    let page = db.find("user", &next).await.unwrap();
    assert!(page.items.is_empty());
    assert!(page.cursor.is_none());

    let Call::Query(request) = backend.last_call() else { panic!("expected a query") };
    assert_eq!(request.exclusive_start_key, Some(page_key));
    assert_eq!(request.limit, Some(10));
}

#[tokio::test]
async fn find_without_a_matching_pattern_is_a_routing_error() {
    let (db, backend) = database();

    // Sort prefix with a gap
    let query = FindQuery::new().where_eq("team", "core").unwrap().where_eq("name", "Ada").unwrap();
    assert_eq!(db.find("user", &query).await.unwrap_err().kind, ErrorKind::Routing);

    let query = FindQuery::new().where_eq("title", "x").unwrap();
    assert_eq!(db.find("post", &query).await.unwrap_err().kind, ErrorKind::Routing);

    assert_eq!(db.find("ghost", &FindQuery::new()).await.unwrap_err().kind, ErrorKind::Routing);
    assert!(backend.calls().is_empty());
}

#[tokio::test]
async fn find_children_stays_inside_the_child_collection() {
    let (db, backend) = database();
    backend.reply(Reply::Query(QueryResponse {
        items: vec![stored(db.registry(), "post", json!({"_id": "p2", "userId": "u1"}))],
        last_evaluated_key: None,
    }));

    let query = ChildQuery {
        range: Some(IdRange::Gte("p2".into())),
        options: FindOptions::new().with_direction(SortDirection::Descending),
    };
    let page = db.find_children("post", "u1", &query).await.unwrap();
    assert_eq!(page.items[0].id().unwrap(), Some("p2"));

    let Call::Query(request) = backend.last_call() else { panic!("expected a query") };
    assert_eq!(request.index_name, None);
    assert_eq!(request.key_condition_expression, "pk = :value0 AND sk BETWEEN :value1 AND :value2");
    assert_eq!(request.attributes.values[":value0"], AttributeValue::S("user|-|u1".into()));
    assert_eq!(request.attributes.values[":value1"], AttributeValue::S("post|-|p2".into()));
    assert_eq!(request.attributes.values[":value2"], AttributeValue::S(prefix_upper_bound("post|-|")));
    assert!(!request.scan_forward);
}

#[tokio::test]
async fn find_children_needs_a_child_collection() {
    let (db, _) = database();
    let err = db.find_children("user", "u1", &ChildQuery::default()).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Routing);

    let err = db.find_children("post", "", &ChildQuery::default()).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Identity);
}

#[tokio::test]
async fn consistent_reads_apply_to_the_primary_index_only() {
    let (db, backend) = database_with(Config::default().with_consistent_reads(true));

    db.find_by_id("user", "u1", None).await.unwrap();
    let Call::Get(get) = backend.last_call() else { panic!("expected a get") };
    assert!(get.consistent_read);

    db.find_children("post", "u1", &ChildQuery::default()).await.unwrap();
    let Call::Query(request) = backend.last_call() else { panic!("expected a query") };
    assert!(request.consistent_read);

    let query = FindQuery::new().where_eq("email", "ada@x.io").unwrap();
    db.find("user", &query).await.unwrap();
    let Call::Query(request) = backend.last_call() else { panic!("expected a query") };
    assert_eq!(request.index_name.as_deref(), Some("gsi2"));
    assert!(!request.consistent_read);
}

#[tokio::test]
async fn find_with_children_filters_on_the_discriminator() {
    let (db, backend) = database();
    let registry = db.registry().clone();
    // comment..user spans post as well
    backend.reply(Reply::Query(QueryResponse {
        items: vec![
            stored(&registry, "comment", json!({"_id": "c1", "userId": "u1"})),
            stored(&registry, "post", json!({"_id": "p1", "userId": "u1"})),
            stored(&registry, "user", json!({"_id": "u1"})),
        ],
        last_evaluated_key: None,
    }));

    let result = db.find_with_children("user", "u1", &["comment"], &FindOptions::new()).await.unwrap();
    assert_eq!(result.items.len(), 2);
    assert_eq!(result.of("comment").count(), 1);
    assert_eq!(result.of("user").count(), 1);
    assert_eq!(result.of("post").count(), 0);

    let Call::Query(request) = backend.last_call() else { panic!("expected a query") };
    assert_eq!(request.attributes.values[":value0"], AttributeValue::S("user|-|u1".into()));
    assert_eq!(request.attributes.values[":value1"], AttributeValue::S("comment|-|".into()));
    assert_eq!(request.attributes.values[":value2"], AttributeValue::S(prefix_upper_bound("user|-|")));
}

#[tokio::test]
async fn find_with_children_validates_the_hierarchy() {
    let (db, backend) = database();
    let err = db
        .find_with_children("post", "p1", &["comment"], &FindOptions::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Routing);

    let err = db.find_with_children("user", "u1", &["user"], &FindOptions::new()).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Routing);
    assert!(backend.calls().is_empty());
}

#[tokio::test]
async fn update_recomputes_index_attributes_and_returns_the_new_document() {
    let (db, backend) = database();
    let after = stored(db.registry(), "user", json!({"_id": "u1", "email": "ada@new.io"}));
    backend.reply(Reply::Update(UpdateItemResponse { attributes: Some(after) }));

    let update = UpdateSpec::new().set("email", json!("Ada@New.io")).unwrap();
    let document = db.update_by_id("user", "u1", None, &update, None).await.unwrap();
    assert_eq!(document, doc(json!({"_id": "u1", "email": "ada@new.io"})));

    let Call::Update(request) = backend.last_call() else { panic!("expected an update") };
    assert!(request.update_expression.contains("gsi2pk = "));
    assert!(!request.update_expression.contains("gsi1pk"));
    assert_eq!(request.condition_expression.as_deref(), Some("attribute_exists(pk)"));
    assert!(request
        .attributes
        .values
        .values()
        .any(|v| *v == AttributeValue::S("user|-|ada@new.io".into())));
}

#[tokio::test]
async fn update_of_missing_record_is_not_found() {
    let (db, backend) = database();
    backend.reply(Reply::Fail(condition_failed()));

    let update = UpdateSpec::new().set("name", json!("Ada")).unwrap();
    let err = db.update_by_id("user", "u1", None, &update, None).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);
}

#[tokio::test]
async fn invalid_updates_never_reach_the_backend() {
    let (db, backend) = database();

    let err = db.update_by_id("user", "u1", None, &UpdateSpec::new(), None).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::UpdateSpec);

    let update = UpdateSpec::new().set("_id", json!("u2")).unwrap();
    let err = db.update_by_id("user", "u1", None, &update, None).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::UpdateSpec);

    let update = UpdateSpec::new().add("team", json!(1)).unwrap();
    let err = db.update_by_id("user", "u1", None, &update, None).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::UpdateSpec);

    assert!(backend.calls().is_empty());
}

#[tokio::test]
async fn delete_returns_the_previous_document() {
    let (db, backend) = database();
    let before = stored(db.registry(), "post", json!({"_id": "p1", "userId": "u1"}));
    backend.reply(Reply::Delete(DeleteItemResponse { attributes: Some(before) }));

    let document = db.delete_by_id("post", "p1", Some("u1"), None).await.unwrap();
    assert_eq!(document.id().unwrap(), Some("p1"));

    let Call::Delete(request) = backend.last_call() else { panic!("expected a delete") };
    assert_eq!(request.key["sk"], AttributeValue::S("post|-|p1".into()));

    backend.reply(Reply::Fail(condition_failed()));
    let err = db.delete_by_id("post", "p1", Some("u1"), None).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);

    let err = db.delete_by_id("post", "p1", None, None).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Identity);
}

#[tokio::test]
async fn batch_reads_keep_request_order_and_report_leftovers() {
    let (db, backend) = database();
    let registry = db.registry().clone();
    backend.reply(Reply::BatchGet(BatchGetItemResponse {
        responses: HashMap::from([(
            "main".to_string(),
            vec![
                stored(&registry, "user", json!({"_id": "u2"})),
                stored(&registry, "user", json!({"_id": "u1"})),
            ],
        )]),
        unprocessed_keys: HashMap::from([(
            "main".to_string(),
            vec![HashMap::from([
                ("pk".to_string(), AttributeValue::S("user|-|u1".into())),
                ("sk".to_string(), AttributeValue::S("post|-|p1".into())),
            ])],
        )]),
    }));

    let result = db
        .batch_find_by_ids(vec![
            ItemIdentity::new("user", "u1"),
            ItemIdentity::child("post", "p1", "u1"),
            ItemIdentity::new("user", "u2"),
        ])
        .await
        .unwrap();
    let ids: Vec<_> = result.items.iter().map(|d| d.id().unwrap().unwrap().to_string()).collect();
    assert_eq!(ids, ["u1", "u2"]);
    assert_eq!(result.unprocessed, vec![ItemIdentity::child("post", "p1", "u1")]);
}

#[tokio::test]
async fn batch_writes_enforce_limits_before_calling() {
    let (db, backend) = database();
    let descriptors: Vec<WriteDescriptor> = (0..26)
        .map(|i| WriteDescriptor::Replace {
            collection: "user".into(),
            document: doc(json!({"_id": format!("u{}", i)})),
        })
        .collect();

    let err = db.batch_write(descriptors).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::InvalidArgument);
    assert!(db.batch_write(vec![]).await.is_err());
    assert!(backend.calls().is_empty());
}

#[tokio::test]
async fn batch_writes_return_unprocessed_descriptors() {
    let (db, backend) = database();
    let leftover = stored(db.registry(), "user", json!({"_id": "u2"}));
    backend.reply(Reply::BatchWrite(BatchWriteItemResponse {
        unprocessed_items: HashMap::from([("main".to_string(), vec![WriteRequest::Put { item: leftover }])]),
    }));

    let result = db
        .batch_write(vec![
            WriteDescriptor::Replace { collection: "user".into(), document: doc(json!({"_id": "u1"})) },
            WriteDescriptor::Replace { collection: "user".into(), document: doc(json!({"_id": "u2"})) },
        ])
        .await
        .unwrap();
    assert_eq!(
        result.unprocessed,
        vec![WriteDescriptor::Replace { collection: "user".into(), document: doc(json!({"_id": "u2"})) }]
    );
}

#[tokio::test]
async fn transactional_reads_return_one_slot_per_key() {
    let (db, backend) = database();
    backend.reply(Reply::TransactGet(TransactGetItemsResponse {
        items: vec![Some(stored(db.registry(), "user", json!({"_id": "u1"}))), None],
    }));

    let documents = db
        .transact_find_by_ids(vec![ItemIdentity::new("user", "u1"), ItemIdentity::new("user", "u9")])
        .await
        .unwrap();
    assert_eq!(documents.len(), 2);
    assert!(documents[0].is_some());
    assert!(documents[1].is_none());
}

#[tokio::test]
async fn transactional_writes_surface_failures_as_conflicts() {
    let (db, backend) = database();
    let descriptors = || {
        vec![
            TransactWriteDescriptor::Insert { collection: "user".into(), document: doc(json!({"_id": "u1"})) },
            TransactWriteDescriptor::Delete { identity: ItemIdentity::new("user", "u2"), condition: None },
        ]
    };

    let identities = db.transact_write(descriptors()).await.unwrap();
    assert_eq!(identities, vec![ItemIdentity::new("user", "u1"), ItemIdentity::new("user", "u2")]);
    let Call::TransactWrite(request) = backend.last_call() else { panic!("expected a transaction") };
    assert_eq!(request.items.len(), 2);

    backend.reply(Reply::Fail(condition_failed()));
    assert_eq!(db.transact_write(descriptors()).await.unwrap_err().kind, ErrorKind::Conflict);

    backend.reply(Reply::Fail(Error::new(ErrorKind::Conflict, "cancelled".to_string())));
    assert_eq!(db.transact_write(descriptors()).await.unwrap_err().kind, ErrorKind::Conflict);
}
