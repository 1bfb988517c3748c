mod common;

use common::{license_resource, machine_resource, process_resource};
use keyward_license::{
    Document, HeartbeatStatus, License, Linkage, Machine, MetadataValue, Process, ProcessStatus,
    decode_primary,
};
use pretty_assertions::assert_eq;
use serde_json::json;

#[test]
fn primary_takes_id_and_relationships_from_envelope() {
    let body = json!({ "data": license_resource("lic-9") }).to_string();
    let license: License = decode_primary(body.as_bytes()).unwrap();

    assert_eq!(license.id, "lic-9");
    assert_eq!(license.name.as_deref(), Some("Acme Pro"));
    assert_eq!(license.status.as_deref(), Some("ACTIVE"));
    assert_eq!(license.policy_id.as_deref(), Some("pol-1"));
    assert!(license.last_validation.is_none());
}

#[test]
fn metadata_keeps_nested_values() {
    let body = json!({
        "data": {
            "id": "lic-1",
            "type": "licenses",
            "attributes": {
                "key": "K",
                "metadata": {
                    "nullable": null,
                    "flag": true,
                    "ratio": 0.5,
                    "tags": ["a", "b"],
                    "nested": { "depth": 2 }
                }
            }
        }
    })
    .to_string();
    let license: License = decode_primary(body.as_bytes()).unwrap();
    let metadata = &license.metadata;

    assert!(metadata["nullable"].is_null());
    assert_eq!(metadata["flag"].as_bool(), Some(true));
    assert_eq!(metadata["ratio"].as_f64(), Some(0.5));
    assert_eq!(
        metadata["tags"],
        MetadataValue::Array(vec![
            MetadataValue::String("a".into()),
            MetadataValue::String("b".into()),
        ])
    );
    match &metadata["nested"] {
        MetadataValue::Object(map) => assert_eq!(map["depth"].as_i64(), Some(2)),
        other => panic!("expected object, got {other:?}"),
    }
}

#[test]
fn machine_status_and_license_link() {
    let body = json!({ "data": machine_resource("mach-1", "RESURRECTED") }).to_string();
    let machine: Machine = decode_primary(body.as_bytes()).unwrap();

    assert_eq!(machine.heartbeat_status, HeartbeatStatus::Resurrected);
    assert_eq!(machine.license_id.as_deref(), Some("lic-1"));
    assert_eq!(machine.cores, Some(8));
    assert!(machine.require_heartbeat);
}

#[test]
fn unknown_statuses_do_not_fail_decoding() {
    let body = json!({ "data": machine_resource("mach-1", "ZOMBIE") }).to_string();
    let machine: Machine = decode_primary(body.as_bytes()).unwrap();
    assert_eq!(machine.heartbeat_status, HeartbeatStatus::Unknown);

    let body = json!({ "data": process_resource("proc-1", "DEAD", 30) }).to_string();
    let process: Process = decode_primary(body.as_bytes()).unwrap();
    assert_eq!(process.status, ProcessStatus::Dead);
    assert_eq!(process.machine_id.as_deref(), Some("mach-1"));
}

#[test]
fn missing_attributes_take_defaults() {
    let body = json!({ "data": { "id": "m", "type": "machines", "attributes": {} } }).to_string();
    let machine: Machine = decode_primary(body.as_bytes()).unwrap();

    assert_eq!(machine.heartbeat_status, HeartbeatStatus::NotStarted);
    assert_eq!(machine.heartbeat_duration, None);
    assert!(machine.license_id.is_none());
}

#[test]
fn to_many_and_unloaded_relationships() {
    let body = json!({
        "data": {
            "id": "mach-1",
            "type": "machines",
            "attributes": {},
            "relationships": {
                "license": { "data": [
                    { "type": "licenses", "id": "a" },
                    { "type": "licenses", "id": "b" }
                ] },
                "product": { "links": { "related": "/v1/products/p" } }
            }
        }
    })
    .to_string();
    let document: Document<Machine> = serde_json::from_str(&body).unwrap();

    assert!(matches!(
        &document.data.relationships.license.data,
        Some(Linkage::Many(ids)) if ids.len() == 2
    ));
    assert!(document.data.relationships.product.data.is_none());
    assert!(document.into_primary().license_id.is_none());
}

#[test]
fn included_resources_decode_by_type() {
    let body = json!({
        "data": machine_resource("mach-1", "ALIVE"),
        "included": [license_resource("lic-1"), { "id": "x", "type": "groups", "attributes": {} }]
    })
    .to_string();
    let document: Document<Machine> = serde_json::from_str(&body).unwrap();

    let license = document.included[0].decode::<License>().unwrap().unwrap();
    assert_eq!(license.id, "lic-1");
    assert!(document.included[1].decode::<License>().is_none());
    assert!(document.included[0].decode::<Machine>().is_none());
}
