mod common;

use std::sync::Arc;
use serde_json::{json, Value};
use uuid::Uuid;
use common::{repository, Call, RecordingClient};
use searchsync::client::script::ScriptOp;
use searchsync::client::search_client::DocumentUpdate;
use searchsync::core::entity::*;
use searchsync::core::types::{ChangeDescription, EntityReference, FieldChange, TagLabel, TagSource};
use searchsync::query::ast::FieldMatch;

fn votes_update(entity_type: &str) -> EntityRecord {
    EntityRecord::new(entity_type, "orders", "svc.db.sales.orders")
        .with_version(0.2)
        .with_updated_at(1_700_000_000_000)
        .with_attribute(FIELD_VOTES, json!({"upVotes": 3, "downVotes": 0}))
        .with_change_description(
            ChangeDescription::new(0.2).with_updated(FieldChange::updated(
                FIELD_VOTES,
                json!({"upVotes": 2, "downVotes": 0}),
                json!({"upVotes": 3, "downVotes": 0}),
            )),
        )
}

#[test]
fn test_non_propagated_diff_issues_no_cascade() {
    let client = RecordingClient::new();
    let repo = repository(&client);

    repo.update_entity(&votes_update(TABLE));

    let calls = client.calls();
    assert_eq!(calls.len(), 1, "only the primary write: {:?}", calls);
    let Call::Update(index, _, DocumentUpdate::Patch(script)) = &calls[0] else {
        panic!("expected an incremental patch, got {:?}", calls[0]);
    };
    assert_eq!(index, "table_search_index");
    assert!(script.contains(&ScriptOp::SetUpdatedAt));
    assert!(script.contains(&ScriptOp::ReplaceField(FIELD_VOTES.to_string())));

    let stats = repo.stats();
    assert_eq!(stats.incremental_patches, 1);
    assert_eq!(stats.cascades_issued, 0);
}

#[test]
fn test_uncovered_field_forces_full_rebuild() {
    let client = RecordingClient::new();
    let repo = repository(&client);
    let entity = votes_update(TABLE)
        .with_attribute(FIELD_DESCRIPTION, json!("orders placed online"))
        .with_change_description(
            ChangeDescription::new(0.2)
                .with_updated(FieldChange::updated(FIELD_DESCRIPTION, json!("orders"), json!("orders placed online"))),
        );

    repo.update_entity(&entity);

    let calls = client.calls();
    assert!(matches!(&calls[0], Call::Update(_, _, DocumentUpdate::Replace(_))));
    assert_eq!(repo.stats().full_rebuilds, 1);
    assert!(client.cascade_calls().is_empty());
}

#[test]
fn test_service_domain_change_matches_on_service_id() {
    let client = RecordingClient::new();
    let repo = repository(&client);
    let domain = EntityReference::new(Uuid::new_v4(), DOMAIN).with_fqn("Finance");
    let service = EntityRecord::new(DATABASE_SERVICE, "warehouse", "warehouse")
        .with_version(0.2)
        .with_change_description(
            ChangeDescription::new(0.1)
                .with_added(FieldChange::added(FIELD_DOMAIN, serde_json::to_value(&domain).unwrap())),
        );

    repo.update_entity(&service);

    let cascades = client.cascade_calls();
    assert_eq!(cascades.len(), 1, "{:?}", cascades);
    let Call::UpdateChildren(aliases, matcher, script) = &cascades[0] else {
        panic!("expected a children update, got {:?}", cascades[0]);
    };
    assert_eq!(matcher, &FieldMatch::new("service.id", service.id.to_string()));
    assert!(aliases.contains(&"table".to_string()));
    assert!(script.contains(&ScriptOp::PropagateEntityReferenceField(FIELD_DOMAIN.to_string())));
}

#[test]
fn test_table_owner_change_matches_on_entity_type_id() {
    let client = RecordingClient::new();
    let repo = repository(&client);
    let owner = EntityReference::new(Uuid::new_v4(), USER).with_name("alice");
    let table = EntityRecord::new(TABLE, "orders", "svc.db.sales.orders")
        .with_version(0.2)
        .with_owners(vec![owner.clone()])
        .with_change_description(
            ChangeDescription::new(0.1)
                .with_added(FieldChange::added(FIELD_OWNERS, json!([owner]))),
        );

    repo.update_entity(&table);

    let cascades = client.cascade_calls();
    assert_eq!(cascades.len(), 1);
    let Call::UpdateChildren(aliases, matcher, _) = &cascades[0] else {
        panic!("expected a children update");
    };
    assert_eq!(matcher, &FieldMatch::new("table.id", table.id.to_string()));
    assert_eq!(aliases, &vec!["testCase".to_string(), "testSuite".to_string()]);
}

#[test]
fn test_glossary_tags_are_written_as_derived() {
    let client = RecordingClient::new();
    let repo = repository(&client);
    let label = TagLabel::new("PII.Sensitive", TagSource::Classification);
    let term = EntityRecord::new(GLOSSARY_TERM, "Revenue", "Business.Revenue")
        .with_version(0.2)
        .with_change_description(
            ChangeDescription::new(0.1).with_added(FieldChange::added(FIELD_TAGS, json!([label]))),
        );

    repo.update_entity(&term);

    let cascades = client.cascade_calls();
    assert_eq!(cascades.len(), 1, "{:?}", cascades);
    let Call::UpdateChildren(aliases, matcher, script) = &cascades[0] else {
        panic!("expected a children update");
    };
    assert_eq!(aliases, &vec!["all".to_string()]);
    assert_eq!(matcher, &FieldMatch::new("tags.tagFQN", "Business.Revenue"));
    let added = script.params["tagAdded"].as_array().unwrap();
    assert!(added.iter().all(|l| l["labelType"] == json!("Derived")));
    assert_eq!(script.params["tagDeleted"], json!([]));
}

#[test]
fn test_soft_delete_is_idempotent() {
    let client = RecordingClient::new();
    let repo = repository(&client);
    let table = EntityRecord::new(TABLE, "orders", "svc.db.sales.orders");
    let id = table.id.to_string();

    repo.soft_delete_or_restore_entity(&table, true);
    let once = client.doc("table_search_index", &id);
    let first_calls = client.calls();
    client.clear();

    repo.soft_delete_or_restore_entity(&table, true);
    assert_eq!(client.doc("table_search_index", &id), once);
    assert_eq!(client.calls(), first_calls);
    assert_eq!(once.unwrap()["deleted"], Value::Bool(true));
}

#[test]
fn test_soft_delete_reaches_table_children() {
    let client = RecordingClient::new();
    let repo = repository(&client);
    let table = EntityRecord::new(TABLE, "orders", "svc.db.sales.orders");

    repo.soft_delete_or_restore_entity(&table, false);

    let cascades = client.cascade_calls();
    assert_eq!(cascades.len(), 1);
    let Call::SoftDeleteChildren(aliases, script, matchers) = &cascades[0] else {
        panic!("expected a children soft delete");
    };
    assert_eq!(aliases, &vec!["testCase".to_string(), "testSuite".to_string()]);
    assert!(script.contains(&ScriptOp::SoftDeleteRestore(false)));
    assert_eq!(matchers, &vec![FieldMatch::new("table.id", table.id.to_string())]);
}

#[test]
fn test_dashboard_service_delete_hits_only_child_aliases() {
    let client = RecordingClient::new();
    let repo = repository(&client);
    let service = EntityRecord::new(DASHBOARD_SERVICE, "svc1", "svc1");

    repo.delete_entity(&service);

    let calls = client.calls();
    assert_eq!(
        calls[0],
        Call::Delete("dashboard_service_search_index".into(), service.id.into())
    );
    let cascades = client.cascade_calls();
    assert_eq!(
        cascades,
        vec![Call::DeleteByFields(
            vec!["dashboard".into(), "chart".into(), "dashboardDataModel".into()],
            vec![FieldMatch::new("service.id", service.id.to_string())],
        )]
    );
    assert_eq!(repo.stats().documents_deleted, 1);
}

#[test]
fn test_page_gaining_parent_rewrites_prefix() {
    let client = RecordingClient::new();
    let repo = repository(&client);
    let parent = EntityReference::new(Uuid::new_v4(), PAGE).with_fqn("root.B");
    let page = EntityRecord::new(PAGE, "A", "root.B.A")
        .with_version(0.2)
        .with_change_description(
            ChangeDescription::new(0.1)
                .with_added(FieldChange::added(FIELD_PARENT, serde_json::to_value(&parent).unwrap())),
        );

    repo.update_entity(&page);

    assert_eq!(
        client.cascade_calls(),
        vec![Call::UpdateByFqnPrefix {
            index: "page_search_index".into(),
            old_prefix: "A".into(),
            new_prefix: "root.B.A".into(),
            field: FIELD_FULLY_QUALIFIED_NAME.into(),
        }]
    );
}

#[test]
fn test_tag_rename_rewrites_global_alias() {
    let client = RecordingClient::new();
    let repo = repository(&client);
    let tag = EntityRecord::new(TAG, "Premium", "Tier.Premium")
        .with_version(0.2)
        .with_change_description(
            ChangeDescription::new(0.1)
                .with_updated(FieldChange::updated(FIELD_NAME, json!("Gold"), json!("Premium"))),
        );

    repo.update_entity(&tag);

    assert_eq!(
        client.cascade_calls(),
        vec![Call::UpdateByFqnPrefix {
            index: "all".into(),
            old_prefix: "Tier.Gold".into(),
            new_prefix: "Tier.Premium".into(),
            field: "tags.tagFQN".into(),
        }]
    );
}

#[test]
fn test_domain_delete_strips_references_globally() {
    let client = RecordingClient::new();
    let repo = repository(&client);
    let domain = EntityRecord::new(DOMAIN, "Finance", "Finance");

    repo.delete_entity(&domain);

    let cascades = client.cascade_calls();
    let Call::UpdateChildren(aliases, matcher, script) = &cascades[0] else {
        panic!("expected a global children update, got {:?}", cascades);
    };
    assert_eq!(aliases, &vec!["all".to_string()]);
    assert_eq!(matcher, &FieldMatch::new("domain.id", domain.id.to_string()));
    assert!(script.contains(&ScriptOp::RemoveDomainsChildren));
}

#[test]
fn test_write_failure_is_absorbed_and_counted() {
    let client = RecordingClient::new();
    client.fail("update_entity");
    let repo = repository(&client);

    repo.update_entity(&votes_update(TABLE));

    let stats = repo.stats();
    assert_eq!(stats.write_failures, 1);
    assert_eq!(stats.incremental_patches, 0);
    assert!(client.cascade_calls().is_empty());
}

#[test]
fn test_failing_cascade_does_not_stop_the_others() {
    let client = RecordingClient::new();
    client.fail("delete_entity_by_fields");
    let repo = repository(&client);
    let domain = EntityRecord::new(DOMAIN, "Finance", "Finance");

    repo.delete_entity(&domain);

    let stats = repo.stats();
    assert_eq!(stats.write_failures, 0);
    assert_eq!(stats.documents_deleted, 1);
    assert_eq!(stats.cascade_failures, 1);
    assert_eq!(stats.cascades_issued, 1);
}

#[test]
fn test_read_failure_propagates() {
    let client = RecordingClient::new();
    client.fail("get_doc_by_id");
    let repo = repository(&client);
    assert!(repo.get_document(TABLE, Uuid::new_v4()).is_err());
}

#[test]
fn test_bulk_create_chunks_by_batch_size() {
    let client = RecordingClient::new();
    let config = searchsync::SearchConfig {
        batch_size: 2,
        ..common::config()
    };
    let repo = searchsync::SearchRepository::with_client(config, client.clone()).unwrap();
    let tables: Vec<Arc<dyn EntityInterface>> = (0..5)
        .map(|n| {
            Arc::new(EntityRecord::new(TABLE, format!("t{}", n), format!("svc.db.s.t{}", n)))
                as Arc<dyn EntityInterface>
        })
        .collect();

    repo.create_entities(&tables);

    let sizes: Vec<usize> = client
        .calls()
        .iter()
        .filter_map(|c| match c {
            Call::Bulk(_, docs) => Some(docs.len()),
            _ => None,
        })
        .collect();
    assert_eq!(sizes, vec![2, 2, 1]);
    assert_eq!(repo.stats().documents_created, 5);
}

#[test]
fn test_create_indexes_skips_existing_and_adds_aliases() {
    let client = RecordingClient::new();
    client.indexes.lock().insert("table_search_index".to_string());
    let repo = repository(&client);

    repo.create_indexes();

    let calls = client.calls();
    assert!(!calls.contains(&Call::CreateIndex("table_search_index".into())));
    assert!(calls.contains(&Call::CreateIndex("page_search_index".into())));
    assert!(calls.contains(&Call::CreateAliases(
        "page_search_index".into(),
        vec!["page".into(), "all".into()]
    )));
}

#[test]
fn test_time_series_update_merges_every_field() {
    let client = RecordingClient::new();
    let repo = repository(&client);
    let result = TimeSeriesRecord::new(TEST_CASE_RESULT, 1_700_000_000_000)
        .with_attribute("testCaseStatus", json!("Failed"));

    repo.update_time_series_entity(&result);

    let calls = client.calls();
    let Call::Update(index, _, DocumentUpdate::Patch(script)) = &calls[0] else {
        panic!("expected a merge patch");
    };
    assert_eq!(index, "test_case_result_search_index");
    assert!(script.contains(&ScriptOp::MergeFields));
    assert_eq!(script.params["testCaseStatus"], json!("Failed"));
}

#[test]
fn test_update_by_reference_without_lookup_is_absorbed() {
    let client = RecordingClient::new();
    let repo = repository(&client);
    repo.update_entity_by_reference(&EntityReference::new(Uuid::new_v4(), TABLE));
    assert_eq!(repo.stats().write_failures, 1);
    assert!(client.calls().is_empty());
}

#[test]
fn test_document_build_is_repeatable() {
    let client = RecordingClient::new();
    let repo = repository(&client);
    let owner = EntityReference::new(Uuid::new_v4(), USER).with_name("alice");
    let table = EntityRecord::new(TABLE, "orders", "svc.db.sales.orders")
        .with_owners(vec![owner])
        .with_attribute(FIELD_DESCRIPTION, json!("orders placed online"))
        .with_attribute("columns", json!([{"name": "id"}, {"name": "amount"}]));

    let first = repo.builders().build_entity(&table).unwrap();
    let second = repo.builders().build_entity(&table).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_lazy_client_is_built_once() {
    let repo = Arc::new(searchsync::SearchRepository::new(common::config()).unwrap());
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let repo = Arc::clone(&repo);
            std::thread::spawn(move || Arc::as_ptr(repo.client().unwrap()) as *const () as usize)
        })
        .collect();
    let pointers: Vec<usize> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert!(pointers.windows(2).all(|w| w[0] == w[1]));
}

#[test]
fn test_search_resolves_cluster_prefix() {
    let client = RecordingClient::new();
    let config = searchsync::SearchConfig {
        cluster_alias: "tenant1".into(),
        ..common::config()
    };
    let repo = searchsync::SearchRepository::with_client(config, client.clone()).unwrap();

    repo.search(&searchsync::query::request::SearchRequest::new("orders", 10, "table,dashboard"))
        .unwrap();

    let Call::Search(request) = &client.calls()[0] else {
        panic!("expected a search");
    };
    assert_eq!(request.index, "tenant1_table,tenant1_dashboard");
}
