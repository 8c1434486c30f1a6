//! Fixtures shared by the unit tests

use std::collections::BTreeSet;

use crate::catalog::EntityCatalog;
use crate::facts::{
    AccessType, DeclaredKind, DefinedEntity, FactBundle, ImportedName, ModuleAnalysis, RouteEntry,
    UsageObservation,
};
use crate::graph::DependencyGraph;
use crate::model::{BatchId, EntityId, EntityKind};

pub fn ids(names: &[&str]) -> BTreeSet<EntityId> {
    names.iter().map(|n| EntityId::new(*n)).collect()
}

fn declared(kind: DeclaredKind, name: &str, relations: &[&str]) -> DefinedEntity {
    DefinedEntity {
        kind,
        name: name.to_string(),
        relations: relations.iter().map(|r| r.to_string()).collect(),
    }
}

fn module(module_id: &str, defined_entities: Vec<DefinedEntity>, imports: &[(&str, u64)]) -> ModuleAnalysis {
    ModuleAnalysis {
        module_id: module_id.to_string(),
        defined_entities,
        imported_names: imports
            .iter()
            .map(|(name, usage_count)| ImportedName {
                name: name.to_string(),
                usage_count: *usage_count,
            })
            .collect(),
    }
}

pub fn observation(
    view_id: &str,
    module_id: &str,
    table_id: &str,
    access_type: AccessType,
    occurrence_count: u64,
) -> UsageObservation {
    UsageObservation {
        view_id: view_id.to_string(),
        module_id: module_id.to_string(),
        table_id: table_id.to_string(),
        access_type,
        occurrence_count,
    }
}

/// Two models with a schema link and one view per model.
pub fn catalogue_modules() -> Vec<ModuleAnalysis> {
    vec![
        module(
            "catalogue.models",
            vec![
                declared(DeclaredKind::Model, "Catalogue", &["Category"]),
                declared(DeclaredKind::Model, "Category", &[]),
            ],
            &[],
        ),
        module(
            "catalogue.views",
            vec![
                declared(DeclaredKind::View, "CatalogueView", &[]),
                declared(DeclaredKind::Other, "Paginator", &[]),
            ],
            &[("Catalogue", 4), ("Paginator", 2)],
        ),
        module(
            "category.views",
            vec![declared(DeclaredKind::View, "CategoryView", &[])],
            &[("Category", 1)],
        ),
    ]
}

/// View1 —10— ModelA —1— ModelB —10— View2
pub fn chain_fixture() -> DependencyGraph {
    let mut graph = DependencyGraph::new();
    graph.add_node("View1", EntityKind::View).unwrap();
    graph.add_node("ModelA", EntityKind::Model).unwrap();
    graph.add_node("ModelB", EntityKind::Model).unwrap();
    graph.add_node("View2", EntityKind::View).unwrap();
    graph.add_edge(&"View1".into(), &"ModelA".into(), 10.0, BatchId(1)).unwrap();
    graph.add_edge(&"ModelA".into(), &"ModelB".into(), 1.0, BatchId(1)).unwrap();
    graph.add_edge(&"ModelB".into(), &"View2".into(), 10.0, BatchId(1)).unwrap();
    graph
}

/// Catalog matching [`chain_fixture`], split across a shop and a billing module.
pub fn chain_catalog() -> EntityCatalog {
    let mut catalog = EntityCatalog::new();
    catalog.register(EntityKind::View, "View1", "shop.views").unwrap();
    catalog.register(EntityKind::Model, "ModelA", "shop.models").unwrap();
    catalog.register(EntityKind::Model, "ModelB", "billing.models").unwrap();
    catalog.register(EntityKind::View, "View2", "billing.views").unwrap();
    catalog
}

/// Triangles t1-t2-t3 and u1-u2-u3 joined by t3—u1.
pub fn two_triangles() -> DependencyGraph {
    let mut graph = DependencyGraph::new();
    for id in ["t1", "t2", "t3", "u1", "u2", "u3"] {
        graph.add_node(id, EntityKind::Model).unwrap();
    }
    let edges = [
        ("t1", "t2"),
        ("t2", "t3"),
        ("t1", "t3"),
        ("u1", "u2"),
        ("u2", "u3"),
        ("u1", "u3"),
        ("t3", "u1"),
    ];
    for (a, b) in edges {
        graph.add_edge(&a.into(), &b.into(), 1.0, BatchId(1)).unwrap();
    }
    graph
}

/// A small shop/billing monolith. The only coupling between the two halves
/// is the Invoice→Order schema link.
pub fn shop_bundle() -> FactBundle {
    FactBundle {
        modules: vec![
            module(
                "shop.models",
                vec![
                    declared(DeclaredKind::Model, "Order", &["Cart"]),
                    declared(DeclaredKind::Model, "Cart", &[]),
                    declared(DeclaredKind::Model, "Coupon", &[]),
                ],
                &[],
            ),
            module(
                "shop.views",
                vec![
                    declared(DeclaredKind::View, "OrderView", &[]),
                    declared(DeclaredKind::View, "CartView", &[]),
                ],
                &[("Order", 3), ("Cart", 2), ("Coupon", 1)],
            ),
            module(
                "billing.models",
                vec![
                    declared(DeclaredKind::Model, "Invoice", &["Payment", "Order"]),
                    declared(DeclaredKind::Model, "Payment", &[]),
                ],
                &[("Order", 1)],
            ),
            module(
                "billing.views",
                vec![declared(DeclaredKind::View, "InvoiceView", &[])],
                &[("Invoice", 2), ("Payment", 1)],
            ),
        ],
        observations: vec![
            observation("OrderView", "shop.views", "Order", AccessType::Read, 40),
            observation("CartView", "shop.views", "Cart", AccessType::Write, 20),
            observation("InvoiceView", "billing.views", "Invoice", AccessType::Write, 20),
            observation("InvoiceView", "billing.views", "Payment", AccessType::Write, 10),
            observation("InvoiceView", "billing.views", "django_session", AccessType::Read, 5),
        ],
        routes: vec![RouteEntry {
            route_name: "invoice-detail".to_string(),
            module_id: "billing.api".to_string(),
            handler_id: "InvoiceView".to_string(),
        }],
    }
}
