//! Crate-level tests across module boundaries

use crate::*;
use crate::test_utils::{observation, shop_bundle};

#[test]
fn test_entity_id_serializes_as_plain_string() {
    let id = EntityId::new("OrderView");
    let json = serde_json::to_string(&id).unwrap();
    assert_eq!(json, "\"OrderView\"");

    let back: EntityId = serde_json::from_str("\"orderview\"").unwrap();
    assert_eq!(back, id);
    assert_eq!(back.as_str(), "orderview");
}

#[test]
fn test_fact_bundle_reads_camel_case() {
    let json = r#"{
        "modules": [
            {
                "moduleId": "shop.models",
                "definedEntities": [{ "kind": "Model", "name": "Order" }]
            }
        ],
        "observations": [
            {
                "viewId": "OrderView",
                "moduleId": "shop.views",
                "tableId": "Order",
                "accessType": "Read",
                "occurrenceCount": 3
            }
        ]
    }"#;
    let bundle: FactBundle = serde_json::from_str(json).unwrap();

    assert_eq!(bundle.modules[0].defined_entities[0].relations, Vec::<String>::new());
    assert!(bundle.modules[0].imported_names.is_empty());
    assert_eq!(bundle.observations[0].access_type, AccessType::Read);
    assert!(bundle.routes.is_empty());
}

#[test]
fn test_third_level_isolates_coupon() {
    let config = PipelineConfig { level: 3, ..PipelineConfig::default() };
    let (pipeline, report) = Pipeline::run(config, &shop_bundle()).unwrap();

    assert_eq!(report.depth, 3);
    let cuts: Vec<Vec<&str>> = report
        .entries
        .iter()
        .map(|e| e.nodes.iter().map(EntityId::as_str).collect())
        .collect();
    assert_eq!(
        cuts,
        vec![
            vec!["Cart", "CartView", "Order", "OrderView"],
            vec!["Coupon"],
            vec!["Invoice", "InvoiceView", "Payment"],
        ]
    );

    let coupon = &report.entries[1];
    assert_eq!(coupon.instructions.len(), 2);
    assert!(coupon.instructions.iter().all(|i| i.needs_manual_review));
    assert_eq!(coupon.implicated_modules, vec!["shop.models", "shop.views"]);

    let level = pipeline.current_partition().unwrap().level();
    assert_eq!(level.severed.len(), 2);
}

#[test]
fn test_unreachable_level_falls_back_to_deepest() {
    let config = PipelineConfig { level: 50, max_levels: 50, ..PipelineConfig::default() };
    let (pipeline, report) = Pipeline::run(config, &shop_bundle()).unwrap();

    assert!(pipeline.current_partition().unwrap().is_exhausted());
    // every node ends up alone once all edges are severed
    assert_eq!(report.entries.len(), pipeline.graph().node_count());
    assert!(report.entries.iter().all(|e| e.nodes.len() == 1));
}

#[test]
fn test_route_attribution_shows_in_report() {
    let mut bundle = shop_bundle();
    bundle.observations.push(observation("InvoiceView", "billing.views", "Order", AccessType::Read, 1));
    let (pipeline, report) = Pipeline::run(PipelineConfig::default(), &bundle).unwrap();

    assert_eq!(pipeline.catalog().module_of(&"InvoiceView".into()), Some("billing.api"));
    assert!(report.entries[0].implicated_modules.contains(&"billing.api".to_string()));
}

#[test]
fn test_prune_isolated_drops_unused_models() {
    let mut bundle = shop_bundle();
    bundle.modules[0].defined_entities.push(crate::facts::DefinedEntity {
        kind: DeclaredKind::Model,
        name: "LegacyAudit".to_string(),
        relations: vec![],
    });

    let (kept, _) = Pipeline::run(PipelineConfig::default(), &bundle).unwrap();
    assert!(kept.graph().contains(&"LegacyAudit".into()));

    let config = PipelineConfig { prune_isolated: true, ..PipelineConfig::default() };
    let (pruned, report) = Pipeline::run(config, &bundle).unwrap();
    assert!(!pruned.graph().contains(&"LegacyAudit".into()));
    assert_eq!(report.entries.len(), 2);
    assert_eq!(report.summary.models, 5);
}

#[test]
fn test_report_serializes_camel_case() {
    let (_, report) = Pipeline::run(PipelineConfig::default(), &shop_bundle()).unwrap();
    let value = serde_json::to_value(&report).unwrap();

    assert_eq!(value["depth"], 2);
    assert_eq!(value["summary"]["modulesAnalyzed"], 4);
    assert_eq!(value["summary"]["unresolvedTables"][0], "django_session");
    assert_eq!(value["entries"][0]["cutIndex"], 0);
    assert_eq!(value["entries"][0]["instructions"][0]["needsManualReview"], true);
    assert!(value["generatedAt"].is_string());
}

#[test]
fn test_export_matches_pipeline_graph() {
    let (pipeline, _) = Pipeline::run(PipelineConfig::default(), &shop_bundle()).unwrap();
    let export = pipeline.graph().export();

    assert_eq!(export.nodes.len(), 8);
    assert_eq!(export.edges.len(), 11);
    let order_view = export
        .edges
        .iter()
        .find(|e| e.source == EntityId::new("Order") && e.target == EntityId::new("OrderView"))
        .unwrap();
    assert_eq!(order_view.weight, 6.0);
}
